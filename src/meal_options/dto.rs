use serde::{Deserialize, Serialize};

use crate::{dates::deserialize_some, meal_options::repo_types::MealOption};

#[derive(Debug, Clone, Deserialize)]
pub struct IngredientInput {
    pub name: Option<String>,
    pub quantity: Option<f64>,
    pub unit: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CreateMealOptionRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    pub meal_time: Option<String>,
    pub estimated_calories: Option<f64>,
    #[serde(default)]
    pub ingredients: Vec<IngredientInput>,
}

/// Supplying `ingredients` replaces the whole list.
#[derive(Debug, Default, Deserialize)]
pub struct UpdateMealOptionRequest {
    pub name: Option<String>,
    #[serde(default, deserialize_with = "deserialize_some")]
    pub description: Option<Option<String>>,
    pub meal_time: Option<String>,
    #[serde(default, deserialize_with = "deserialize_some")]
    pub estimated_calories: Option<Option<f64>>,
    pub ingredients: Option<Vec<IngredientInput>>,
}

#[derive(Debug, Serialize)]
pub struct ImportResponse {
    pub imported: usize,
    pub meal_options: Vec<MealOption>,
}
