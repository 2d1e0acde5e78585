use sqlx::FromRow;
use time::{Date, OffsetDateTime};
use uuid::Uuid;

use crate::meal_options::repo_types::MealTime;

#[derive(Debug, Clone, FromRow)]
pub struct Meal {
    pub id: Uuid,
    pub user_id: Uuid,
    pub name: String,
    pub calories: i32,
    pub date: Date,
    pub notes: Option<String>,
    pub created_at: OffsetDateTime,
    pub updated_at: Option<OffsetDateTime>,
}

#[derive(Debug, FromRow)]
pub struct UpsertedMeal {
    #[sqlx(flatten)]
    pub meal: Meal,
    /// false when an existing row for the date was overwritten
    pub inserted: bool,
}

/// One attached option of a meal.
#[derive(Debug, Clone, FromRow)]
pub struct MealOptionLink {
    pub meal_id: Uuid,
    pub option_id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub meal_time: MealTime,
}

#[derive(Debug, Clone)]
pub struct NewMeal {
    pub name: String,
    pub calories: i32,
    pub date: Date,
    pub notes: Option<String>,
}
