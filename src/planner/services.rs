//! AI-assisted day planning and shopping lists.
//!
//! Both features are thin: gather rows, serialize them into a prompt, check
//! the reply for the shape the client relies on. The planner only ever picks
//! from the shared catalogue; ids it makes up are dropped before saving.

use serde_json::{Map, Value};
use sqlx::PgPool;
use time::Date;
use tracing::{info, warn};
use uuid::Uuid;

use crate::{
    ai::{ensure_no_error_flag, TextGenerator},
    dates::format_date,
    error::{AppError, AppResult},
    goals::services::{find_active, validate_daily_calories},
    meal_options::{repo as option_repo, repo_types::MealOption},
    meals::{
        dto::UpsertMealRequest,
        repo as meal_repo,
        repo_types::Meal,
        services::{upsert_meal, MAX_CALORIES},
    },
    planner::dto::{CatalogueEntry, CatalogueIngredient, SavedMeal, ShoppingMeal},
};

pub const PLAN_SYSTEM_PROMPT: &str = r#"You are a professional dietitian meal planner.

You will receive:
1. A daily caloric target in kcal.
2. A catalogue of available meal options, each with: id, name, meal_time,
   estimated_calories, and ingredients.

Your job is to:
1. Select ONE meal option for each meal time (breakfast, lunch, snack, dinner)
   from the catalogue.
2. The total calories of all selected meals must be as close as possible to
   the daily target without exceeding it by more than 10%.
3. Prioritise nutritional variety and balance across macronutrients.
4. If no combination can match the target within ±10%, select the closest
   combination and explain the gap.

Return ONLY valid JSON with this exact structure (no prose, no code fences):
{
  "target_calories": 2000,
  "total_calories": 1950,
  "difference": -50,
  "meals": [
    {
      "meal_time": "breakfast",
      "meal_option_id": "6f1c2d9e-4b7a-4c1e-9a55-0d3b8e2f7a10",
      "meal_option_name": "Greek yogurt with granola",
      "estimated_calories": 320,
      "reason": "High protein breakfast within calorie budget"
    }
  ],
  "notes": "Overall well-balanced plan..."
}

Rules:
- Only use meal_option_ids from the provided catalogue. Never invent new IDs.
- Each meal_time should have exactly one option (if available in the catalogue).
- If a meal_time has no options in the catalogue, skip it and mention it in notes."#;

pub const SHOPPING_SYSTEM_PROMPT: &str =
    "You are a helpful assistant that generates shopping lists from meal plans.";

pub fn plan_meal_name(date: Date) -> String {
    format!("AI Generated Plan — {}", format_date(date))
}

pub fn catalogue(options: &[MealOption]) -> Vec<CatalogueEntry<'_>> {
    options
        .iter()
        .map(|o| CatalogueEntry {
            id: o.id,
            name: &o.name,
            description: o.description.as_deref(),
            meal_time: o.meal_time.as_str(),
            estimated_calories: o.estimated_calories,
            ingredients: o
                .ingredients
                .iter()
                .map(|i| CatalogueIngredient {
                    name: &i.name,
                    quantity: i.quantity,
                    unit: &i.unit,
                })
                .collect(),
        })
        .collect()
}

pub fn plan_user_prompt(
    target_calories: i64,
    catalogue: &[CatalogueEntry<'_>],
) -> Result<String, serde_json::Error> {
    Ok(format!(
        "Daily caloric target: {target_calories} kcal\n\nAvailable meal options catalogue:\n{}",
        serde_json::to_string_pretty(catalogue)?
    ))
}

/// Needs a non-empty `meals` array and no `error` key.
pub fn validate_plan(value: Value) -> AppResult<Map<String, Value>> {
    ensure_no_error_flag(&value, "meal plan").map_err(AppError::Unprocessable)?;
    let unexpected = || {
        AppError::Unprocessable(
            "AI returned an unexpected response structure for the meal plan.".into(),
        )
    };
    let Value::Object(plan) = value else {
        return Err(unexpected());
    };
    match plan.get("meals") {
        Some(Value::Array(meals)) if !meals.is_empty() => Ok(plan),
        _ => Err(unexpected()),
    }
}

// models sometimes quote numbers
fn number_of(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn plan_entries(plan: &Map<String, Value>) -> &[Value] {
    plan.get("meals")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default()
}

/// Parsable option ids in reply order, duplicates removed.
pub fn plan_option_ids(plan: &Map<String, Value>) -> Vec<Uuid> {
    let mut ids = Vec::new();
    for entry in plan_entries(plan) {
        let id = entry
            .get("meal_option_id")
            .and_then(Value::as_str)
            .and_then(|raw| Uuid::parse_str(raw.trim()).ok());
        if let Some(id) = id {
            if !ids.contains(&id) {
                ids.push(id);
            }
        }
    }
    ids
}

/// `total_calories` from the reply, else the sum of the picked meals,
/// clamped into what a logged meal accepts.
pub fn plan_total_calories(plan: &Map<String, Value>) -> i64 {
    let total = plan.get("total_calories").and_then(number_of).unwrap_or_else(|| {
        plan_entries(plan)
            .iter()
            .filter_map(|e| e.get("estimated_calories").and_then(number_of))
            .sum()
    });
    (total.round() as i64).clamp(0, MAX_CALORIES)
}

/// Prompt, call, validate. Stamps the plan with its date.
pub async fn request_plan(
    ai: &dyn TextGenerator,
    date: Date,
    target_calories: i64,
    options: &[MealOption],
) -> AppResult<Map<String, Value>> {
    let user_prompt = plan_user_prompt(target_calories, &catalogue(options))?;
    let reply = ai.chat_json(PLAN_SYSTEM_PROMPT, &user_prompt).await?;
    let mut plan = validate_plan(reply).map_err(|e| {
        warn!(%date, error = %e, "rejected meal plan");
        e
    })?;
    plan.insert("date".into(), Value::String(format_date(date)));
    Ok(plan)
}

pub async fn generate_plan(
    db: &PgPool,
    ai: &dyn TextGenerator,
    user_id: Uuid,
    date: Date,
    target_calories: Option<i64>,
    save: bool,
) -> AppResult<Value> {
    let target = match target_calories {
        Some(t) => i64::from(validate_daily_calories(t)?),
        None => find_active(db, user_id, date)
            .await?
            .map(|g| i64::from(g.daily_calories))
            .ok_or_else(|| {
                AppError::not_found(
                    "No active caloric goal found for this date. \
                     Please create a caloric goal or provide target_calories.",
                )
            })?,
    };

    let options = option_repo::list_options(db).await?;
    if options.is_empty() {
        return Err(AppError::not_found(
            "No meal options are available in the catalogue. \
             Please import meal options first.",
        ));
    }

    let mut plan = request_plan(ai, date, target, &options).await?;
    info!(%user_id, %date, target, catalogue = options.len(), "meal plan generated");

    if save {
        let saved = save_plan(db, user_id, date, &plan).await?;
        plan.insert("saved_meal".into(), serde_json::to_value(saved)?);
    }
    Ok(Value::Object(plan))
}

/// Writes the plan as the day's meal, keeping only ids the catalogue knows.
async fn save_plan(
    db: &PgPool,
    user_id: Uuid,
    date: Date,
    plan: &Map<String, Value>,
) -> AppResult<SavedMeal> {
    let proposed = plan_option_ids(plan);
    let known = if proposed.is_empty() {
        Vec::new()
    } else {
        option_repo::existing_ids(db, &proposed).await?
    };
    let option_ids: Vec<Uuid> = proposed.into_iter().filter(|id| known.contains(id)).collect();

    let req = UpsertMealRequest {
        name: Some(plan_meal_name(date)),
        calories: Some(plan_total_calories(plan)),
        date: Some(format_date(date)),
        notes: None,
        meal_option_ids: Some(option_ids),
    };
    let (_, view) = upsert_meal(db, user_id, req).await?;
    info!(%user_id, %date, meal_id = %view.id, "meal plan saved");
    Ok(SavedMeal {
        id: view.id,
        name: view.name,
        date: view.date,
        calories: view.calories,
        meal_option_ids: view.meal_option_ids,
    })
}

pub fn shopping_prompt(meals: &[ShoppingMeal<'_>]) -> Result<String, serde_json::Error> {
    Ok(format!(
        "Given the following meal plan, generate a shopping list with quantities for each \
         ingredient. Consider portions and calories.\n{}\nReturn the list grouped by food type \
         (proteins, carbs, fats, etc) in JSON format.",
        serde_json::to_string_pretty(meals)?
    ))
}

pub async fn request_shopping_list(ai: &dyn TextGenerator, meals: &[Meal]) -> AppResult<Value> {
    let rows: Vec<ShoppingMeal<'_>> = meals
        .iter()
        .map(|m| ShoppingMeal {
            name: &m.name,
            calories: m.calories,
            date: format_date(m.date),
            notes: m.notes.as_deref(),
        })
        .collect();
    let reply = ai.chat_json(SHOPPING_SYSTEM_PROMPT, &shopping_prompt(&rows)?).await?;
    ensure_no_error_flag(&reply, "shopping list").map_err(AppError::Unprocessable)?;
    Ok(reply)
}

pub async fn shopping_list(
    db: &PgPool,
    ai: &dyn TextGenerator,
    user_id: Uuid,
    start: Date,
    end: Date,
) -> AppResult<Value> {
    if end < start {
        return Err(AppError::validation("end must not be before start"));
    }
    let meals = meal_repo::list_between(db, user_id, start, end).await?;
    if meals.is_empty() {
        return Err(AppError::not_found("No meals found for this range"));
    }
    let list = request_shopping_list(ai, &meals).await?;
    info!(%user_id, %start, %end, meals = meals.len(), "shopping list generated");
    Ok(list)
}

#[cfg(test)]
mod planner_tests {
    use super::*;
    use crate::ai::{testing::ScriptedGenerator, AiError};
    use crate::meal_options::repo_types::{Ingredient, MealTime};
    use serde_json::json;
    use time::macros::{date, datetime};

    fn option(name: &str, meal_time: MealTime, kcal: f64) -> MealOption {
        let id = Uuid::new_v4();
        MealOption {
            id,
            name: name.into(),
            description: None,
            estimated_calories: Some(kcal),
            meal_time,
            ingredients: vec![Ingredient {
                id: Uuid::new_v4(),
                meal_option_id: id,
                name: "oats".into(),
                quantity: 50.0,
                unit: "g".into(),
            }],
            created_at: datetime!(2026-01-01 00:00 UTC),
        }
    }

    fn meal(name: &str, day: Date, calories: i32, notes: Option<&str>) -> Meal {
        Meal {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            name: name.into(),
            calories,
            date: day,
            notes: notes.map(str::to_owned),
            created_at: datetime!(2026-01-05 20:00 UTC),
            updated_at: None,
        }
    }

    #[test]
    fn catalogue_prompt_lists_ids_and_ingredients() {
        let options = vec![option("Porridge", MealTime::Breakfast, 350.0)];
        let prompt = plan_user_prompt(1800, &catalogue(&options)).unwrap();
        assert!(prompt.starts_with("Daily caloric target: 1800 kcal\n\n"));
        assert!(prompt.contains(&options[0].id.to_string()));
        assert!(prompt.contains("\"meal_time\": \"breakfast\""));
        assert!(prompt.contains("\"unit\": \"g\""));
    }

    #[test]
    fn plan_needs_meals() {
        assert!(validate_plan(json!({"meals": [{"meal_time": "lunch"}]})).is_ok());
        assert!(matches!(
            validate_plan(json!({"meals": []})),
            Err(AppError::Unprocessable(_))
        ));
        assert!(matches!(
            validate_plan(json!({"notes": "nothing fits"})),
            Err(AppError::Unprocessable(_))
        ));
        assert!(matches!(validate_plan(json!([1, 2])), Err(AppError::Unprocessable(_))));
    }

    #[test]
    fn error_flagged_plan_carries_the_detail() {
        let err = validate_plan(json!({"error": "catalogue too small"})).unwrap_err();
        assert!(err.to_string().contains("meal plan"));
        assert!(err.to_string().contains("catalogue too small"));
    }

    #[test]
    fn option_ids_skip_garbage_and_duplicates() {
        let a = Uuid::new_v4();
        let plan = json!({"meals": [
            {"meal_option_id": a.to_string()},
            {"meal_option_id": 5},
            {"meal_option_id": "not-a-uuid"},
            {"meal_option_id": a.to_string()},
        ]});
        let Value::Object(plan) = plan else { unreachable!() };
        assert_eq!(plan_option_ids(&plan), vec![a]);
    }

    #[test]
    fn total_calories_fall_back_to_the_meal_sum() {
        let Value::Object(stated) = json!({"total_calories": "1950", "meals": []}) else {
            unreachable!()
        };
        assert_eq!(plan_total_calories(&stated), 1950);

        let Value::Object(summed) = json!({"meals": [
            {"estimated_calories": 320},
            {"estimated_calories": 640.4},
        ]}) else {
            unreachable!()
        };
        assert_eq!(plan_total_calories(&summed), 960);

        let Value::Object(silly) = json!({"total_calories": 99999}) else { unreachable!() };
        assert_eq!(plan_total_calories(&silly), MAX_CALORIES);
    }

    #[test]
    fn saved_meal_name_carries_the_date() {
        assert_eq!(
            plan_meal_name(date!(2026 - 01 - 05)),
            "AI Generated Plan — 2026-01-05"
        );
    }

    #[tokio::test]
    async fn plan_is_stamped_with_its_date() {
        let ai = ScriptedGenerator::with_replies(vec![
            r#"{"target_calories": 2000, "total_calories": 1950, "meals": [{"meal_time": "lunch"}]}"#
                .to_string(),
        ]);
        let options = vec![option("Salad", MealTime::Lunch, 500.0)];
        let plan = request_plan(&ai, date!(2026 - 01 - 07), 2000, &options)
            .await
            .unwrap();
        assert_eq!(plan["date"], "2026-01-07");
        assert_eq!(plan["total_calories"], 1950);

        let calls = ai.calls.lock().unwrap();
        assert_eq!(calls[0].0, PLAN_SYSTEM_PROMPT);
        assert!(calls[0].1.contains("Salad"));
    }

    #[tokio::test]
    async fn provider_failure_surfaces_as_provider_error() {
        let ai = ScriptedGenerator::failing(AiError::Status(503));
        let options = vec![option("Salad", MealTime::Lunch, 500.0)];
        let err = request_plan(&ai, date!(2026 - 01 - 07), 2000, &options)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Provider(_)));
    }

    #[tokio::test]
    async fn shopping_list_is_returned_as_is() {
        let ai = ScriptedGenerator::with_replies(vec![
            r#"{"proteins": [{"item": "chicken breast", "quantity": "400 g"}]}"#.to_string(),
        ]);
        let meals = vec![
            meal("Monday log", date!(2026 - 01 - 05), 1900, Some("felt hungry")),
            meal("Tuesday log", date!(2026 - 01 - 06), 2100, None),
        ];
        let list = request_shopping_list(&ai, &meals).await.unwrap();
        assert_eq!(list["proteins"][0]["item"], "chicken breast");

        let calls = ai.calls.lock().unwrap();
        assert_eq!(calls[0].0, SHOPPING_SYSTEM_PROMPT);
        assert!(calls[0].1.contains("\"date\": \"2026-01-05\""));
        assert!(calls[0].1.contains("felt hungry"));
        assert!(calls[0].1.ends_with("in JSON format."));
    }

    #[tokio::test]
    async fn error_flagged_shopping_list_is_unprocessable() {
        let ai = ScriptedGenerator::with_replies(vec![r#"{"error": "no data"}"#.to_string()]);
        let meals = vec![meal("Log", date!(2026 - 01 - 05), 1900, None)];
        let err = request_shopping_list(&ai, &meals).await.unwrap_err();
        assert!(matches!(err, AppError::Unprocessable(_)));
    }
}
