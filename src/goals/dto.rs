use serde::Deserialize;

use crate::dates::deserialize_some;

/// Dates arrive as strings so a malformed value is a 400 with our message.
#[derive(Debug, Deserialize)]
pub struct CreateGoalRequest {
    pub daily_calories: Option<i64>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub label: Option<String>,
    pub notes: Option<String>,
}

/// Absent fields stay untouched; `end_date`, `label` and `notes` may be set
/// to `null` explicitly.
#[derive(Debug, Default, Deserialize)]
pub struct UpdateGoalRequest {
    pub daily_calories: Option<i64>,
    pub start_date: Option<String>,
    #[serde(default, deserialize_with = "deserialize_some")]
    pub end_date: Option<Option<String>>,
    #[serde(default, deserialize_with = "deserialize_some")]
    pub label: Option<Option<String>>,
    #[serde(default, deserialize_with = "deserialize_some")]
    pub notes: Option<Option<String>>,
}

#[derive(Debug, Deserialize)]
pub struct ActiveQuery {
    pub date: Option<String>,
}
