use serde::{Deserialize, Serialize};
use time::Date;
use uuid::Uuid;

use crate::dates::iso_date;

#[derive(Debug, Default, Deserialize)]
pub struct GeneratePlanRequest {
    pub date: Option<String>,
    pub target_calories: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct GenerateQuery {
    pub save: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ShoppingListQuery {
    pub start: Option<String>,
    pub end: Option<String>,
}

/// One catalogue entry as the planner prompt sees it.
#[derive(Debug, Serialize)]
pub struct CatalogueEntry<'a> {
    pub id: Uuid,
    pub name: &'a str,
    pub description: Option<&'a str>,
    pub meal_time: &'static str,
    pub estimated_calories: Option<f64>,
    pub ingredients: Vec<CatalogueIngredient<'a>>,
}

#[derive(Debug, Serialize)]
pub struct CatalogueIngredient<'a> {
    pub name: &'a str,
    pub quantity: f64,
    pub unit: &'a str,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SavedMeal {
    pub id: Uuid,
    pub name: String,
    #[serde(with = "iso_date")]
    pub date: Date,
    pub calories: i32,
    pub meal_option_ids: Vec<Uuid>,
}

/// Logged meal as handed to the shopping-list prompt.
#[derive(Debug, Serialize)]
pub struct ShoppingMeal<'a> {
    pub name: &'a str,
    pub calories: i32,
    pub date: String,
    pub notes: Option<&'a str>,
}
