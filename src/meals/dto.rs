use serde::{Deserialize, Serialize};
use time::Date;
use uuid::Uuid;

use crate::dates::{deserialize_some, iso_date};

/// `date` takes `YYYY-MM-DD` or an RFC 3339 timestamp.
#[derive(Debug, Deserialize)]
pub struct UpsertMealRequest {
    pub name: Option<String>,
    pub calories: Option<i64>,
    pub date: Option<String>,
    pub notes: Option<String>,
    pub meal_option_ids: Option<Vec<Uuid>>,
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateMealRequest {
    pub name: Option<String>,
    pub calories: Option<i64>,
    pub date: Option<String>,
    #[serde(default, deserialize_with = "deserialize_some")]
    pub notes: Option<Option<String>>,
    pub meal_option_ids: Option<Vec<Uuid>>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OptionSummary {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MealTimeGroup {
    pub name: &'static str,
    pub label: &'static str,
    pub options: Vec<OptionSummary>,
}

#[derive(Debug, Clone, Serialize)]
pub struct MealView {
    pub id: Uuid,
    pub name: String,
    pub calories: i32,
    #[serde(with = "iso_date")]
    pub date: Date,
    pub notes: Option<String>,
    pub meal_option_ids: Vec<Uuid>,
    pub meal_times: Vec<MealTimeGroup>,
}
