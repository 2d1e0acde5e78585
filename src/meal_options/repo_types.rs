use serde::{Deserialize, Serialize, Serializer};
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize, sqlx::Type)]
#[sqlx(type_name = "meal_time", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum MealTime {
    Breakfast,
    Lunch,
    Snack,
    Dinner,
}

impl MealTime {
    pub const ALL: [MealTime; 4] = [
        MealTime::Breakfast,
        MealTime::Lunch,
        MealTime::Snack,
        MealTime::Dinner,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            MealTime::Breakfast => "breakfast",
            MealTime::Lunch => "lunch",
            MealTime::Snack => "snack",
            MealTime::Dinner => "dinner",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            MealTime::Breakfast => "Breakfast",
            MealTime::Lunch => "Lunch",
            MealTime::Snack => "Snack",
            MealTime::Dinner => "Dinner",
        }
    }

    /// Exact (case-insensitive) name only.
    pub fn parse(raw: &str) -> Option<MealTime> {
        let lower = raw.trim().to_ascii_lowercase();
        MealTime::ALL.into_iter().find(|t| t.as_str() == lower)
    }
}

/// Serialized as `{"name": "lunch", "label": "Lunch"}`.
impl Serialize for MealTime {
    fn serialize<S: Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        use serde::ser::SerializeStruct;
        let mut st = s.serialize_struct("MealTime", 2)?;
        st.serialize_field("name", self.as_str())?;
        st.serialize_field("label", self.label())?;
        st.end()
    }
}

pub const VALID_UNITS: [&str; 6] = ["g", "ml", "unit", "tbsp", "tsp", "cup"];

#[derive(Debug, Clone, FromRow)]
pub struct MealOptionRow {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub meal_time: MealTime,
    pub estimated_calories: Option<f64>,
    pub created_at: OffsetDateTime,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Ingredient {
    pub id: Uuid,
    #[serde(skip)]
    pub meal_option_id: Uuid,
    pub name: String,
    pub quantity: f64,
    pub unit: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct MealOption {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub estimated_calories: Option<f64>,
    pub meal_time: MealTime,
    pub ingredients: Vec<Ingredient>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl MealOption {
    pub fn from_parts(row: MealOptionRow, ingredients: Vec<Ingredient>) -> Self {
        Self {
            id: row.id,
            name: row.name,
            description: row.description,
            estimated_calories: row.estimated_calories,
            meal_time: row.meal_time,
            ingredients,
            created_at: row.created_at,
        }
    }
}

/// Validated values ready to insert.
#[derive(Debug, Clone, PartialEq)]
pub struct NewIngredient {
    pub name: String,
    pub quantity: f64,
    pub unit: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewMealOption {
    pub name: String,
    pub description: Option<String>,
    pub meal_time: MealTime,
    pub estimated_calories: Option<f64>,
    pub ingredients: Vec<NewIngredient>,
}
