//! Turning a nutritionist's diet document into catalogue entries.

use serde_json::Value;
use sqlx::PgPool;
use tracing::{info, warn};

use crate::{
    ai::{ensure_no_error_flag, TextGenerator},
    error::{AppError, AppResult},
    meal_options::{
        dto::ImportResponse,
        repo,
        repo_types::{MealOption, MealTime, NewIngredient, NewMealOption, VALID_UNITS},
    },
};

pub const SYSTEM_PROMPT: &str = r#"You are a professional nutrition data extraction assistant.
You will receive the text of a diet plan written by a nutritionist.

Your job is to:
1. Identify every distinct meal option mentioned in the document.
2. Classify each meal into its meal time (breakfast, lunch, snack, dinner).
3. ESTIMATE the total calories for each meal option based on standard
   nutritional databases. The nutritionist document usually does NOT
   include calorie counts; you must calculate them.
4. INFER the full ingredient list with realistic quantities for each meal.
   Nutritionist documents typically only name the dish (e.g. "Greek yogurt
   with granola and berries") without listing every ingredient. You must
   decompose each meal into its individual ingredients with estimated
   weights/volumes.

Return ONLY valid JSON with this exact structure:
{
  "meal_options": [
    {
      "name": "Greek yogurt with granola and berries",
      "description": "Healthy breakfast option recommended by nutritionist",
      "meal_time": "breakfast",
      "estimated_calories": 320,
      "ingredients": [
        { "name": "Greek yogurt", "quantity": 200, "unit": "g" },
        { "name": "granola",      "quantity": 40,  "unit": "g" },
        { "name": "mixed berries","quantity": 80,  "unit": "g" }
      ]
    }
  ]
}

Rules:
- meal_time must be one of: breakfast, lunch, snack, dinner
- Always estimate quantities even when the document does not specify them;
  use standard single-serving portions.
- Always estimate calories based on the inferred ingredients and quantities.
- unit must be one of: g, ml, unit, tbsp, tsp, cup
- Do not invent meals that are not mentioned in the document.
- If a meal is ambiguous, use the most common healthy interpretation.
- Do NOT include any text outside the JSON object."#;

/// Maps free-form meal-time labels onto the closed set; unknown means lunch.
pub fn normalize_meal_time(raw: &str) -> MealTime {
    let lower = raw.trim().to_lowercase();
    if let Some(exact) = MealTime::parse(&lower) {
        return exact;
    }
    if lower.contains("break") || lower.contains("morning") {
        MealTime::Breakfast
    } else if lower.contains("snack") || lower.contains("merienda") {
        MealTime::Snack
    } else if lower.contains("dinner") || lower.contains("supper") {
        MealTime::Dinner
    } else {
        MealTime::Lunch
    }
}

pub fn normalize_unit(raw: &str) -> String {
    let lower = raw.trim().to_lowercase();
    if VALID_UNITS.contains(&lower.as_str()) {
        lower
    } else {
        "g".to_string()
    }
}

fn non_empty_str(v: Option<&Value>) -> Option<String> {
    v.and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// Models sometimes send numbers as strings.
fn number(v: Option<&Value>) -> Option<f64> {
    match v? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn ingredient_from(item: &Value) -> Option<NewIngredient> {
    let name = non_empty_str(item.get("name"))?;
    let quantity = number(item.get("quantity"))?;
    let unit = non_empty_str(item.get("unit"))?;
    Some(NewIngredient {
        name: name.chars().take(150).collect(),
        quantity: quantity.max(0.0),
        unit: normalize_unit(&unit),
    })
}

/// One catalogue entry per usable item; items without a name are skipped.
pub fn options_from_reply(reply: &Value) -> AppResult<Vec<NewMealOption>> {
    ensure_no_error_flag(reply, "meal option list").map_err(AppError::Unprocessable)?;
    let items = reply
        .get("meal_options")
        .and_then(Value::as_array)
        .filter(|a| !a.is_empty())
        .ok_or_else(|| {
            AppError::Unprocessable(
                "AI response does not contain a valid \"meal_options\" array.".into(),
            )
        })?;

    Ok(items
        .iter()
        .filter_map(|item| {
            let name = non_empty_str(item.get("name"))?;
            let meal_time = item
                .get("meal_time")
                .and_then(Value::as_str)
                .map(normalize_meal_time)
                .unwrap_or(MealTime::Lunch);
            let ingredients = item
                .get("ingredients")
                .and_then(Value::as_array)
                .map(|list| list.iter().filter_map(ingredient_from).collect())
                .unwrap_or_default();
            Some(NewMealOption {
                name: name.chars().take(100).collect(),
                description: non_empty_str(item.get("description")),
                meal_time,
                estimated_calories: number(item.get("estimated_calories")),
                ingredients,
            })
        })
        .collect())
}

pub fn user_prompt(document_text: &str) -> String {
    format!("Nutritionist diet document:\n\n{document_text}")
}

/// Asks the model for options found in `document_text` and stores them in
/// one transaction.
pub async fn import_from_text(
    db: &PgPool,
    ai: &dyn TextGenerator,
    document_text: &str,
) -> AppResult<ImportResponse> {
    let reply = ai.chat_json(SYSTEM_PROMPT, &user_prompt(document_text)).await?;
    let options = options_from_reply(&reply).map_err(|e| {
        warn!(error = %e, "unusable meal option import reply");
        e
    })?;

    let mut tx = db.begin().await?;
    let mut created = Vec::with_capacity(options.len());
    for new in &options {
        let row = repo::insert_option_tx(&mut tx, new).await?;
        let ingredients = repo::replace_ingredients_tx(&mut tx, row.id, &new.ingredients).await?;
        created.push(MealOption::from_parts(row, ingredients));
    }
    tx.commit().await?;

    info!(imported = created.len(), "meal options imported");
    Ok(ImportResponse {
        imported: created.len(),
        meal_options: created,
    })
}
