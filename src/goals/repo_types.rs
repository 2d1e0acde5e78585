use serde::Serialize;
use sqlx::FromRow;
use time::{Date, OffsetDateTime};
use uuid::Uuid;

use crate::dates::iso_date;

#[derive(Debug, Clone, PartialEq, Serialize, FromRow)]
pub struct CaloricGoal {
    pub id: Uuid,
    #[serde(skip)]
    pub user_id: Uuid,
    pub daily_calories: i32,
    pub label: Option<String>,
    #[serde(with = "iso_date")]
    pub start_date: Date,
    #[serde(with = "iso_date::option")]
    pub end_date: Option<Date>,
    pub notes: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339::option")]
    pub updated_at: Option<OffsetDateTime>,
}

/// Validated column values for an insert.
#[derive(Debug, Clone)]
pub struct GoalFields {
    pub daily_calories: i32,
    pub label: Option<String>,
    pub start_date: Date,
    pub end_date: Option<Date>,
    pub notes: Option<String>,
}
