use std::collections::{BTreeMap, HashMap};

use sqlx::PgPool;
use tracing::{info, warn};
use uuid::Uuid;

use crate::{
    dates::parse_day,
    error::{db_error_code, AppError, AppResult},
    meal_options::{repo as option_repo, repo_types::MealTime},
    meals::{
        dto::{MealTimeGroup, MealView, OptionSummary, UpdateMealRequest, UpsertMealRequest},
        repo,
        repo_types::{Meal, MealOptionLink, NewMeal},
    },
};

pub const MAX_NAME_LEN: usize = 100;
pub const MAX_CALORIES: i64 = 20_000;

pub fn validate_meal_name(raw: &str) -> AppResult<String> {
    let name = raw.trim();
    if name.is_empty() {
        return Err(AppError::validation("name must not be blank"));
    }
    if name.chars().count() > MAX_NAME_LEN {
        return Err(AppError::validation("name must be at most 100 characters"));
    }
    Ok(name.to_string())
}

pub fn validate_calories(calories: i64) -> AppResult<i32> {
    if !(0..=MAX_CALORIES).contains(&calories) {
        return Err(AppError::validation("calories must be between 0 and 20000"));
    }
    // range-checked above
    Ok(calories as i32)
}

/// Options bucketed by meal time, buckets in breakfast→dinner order.
pub fn group_options(links: &[MealOptionLink]) -> Vec<MealTimeGroup> {
    let mut buckets: BTreeMap<MealTime, Vec<OptionSummary>> = BTreeMap::new();
    for link in links {
        buckets.entry(link.meal_time).or_default().push(OptionSummary {
            id: link.option_id,
            name: link.name.clone(),
            description: link.description.clone(),
        });
    }
    buckets
        .into_iter()
        .map(|(time, options)| MealTimeGroup {
            name: time.as_str(),
            label: time.label(),
            options,
        })
        .collect()
}

pub fn to_view(meal: Meal, links: &[MealOptionLink]) -> MealView {
    MealView {
        id: meal.id,
        name: meal.name,
        calories: meal.calories,
        date: meal.date,
        notes: meal.notes,
        meal_option_ids: links.iter().map(|l| l.option_id).collect(),
        meal_times: group_options(links),
    }
}

fn dedup(ids: &[Uuid]) -> Vec<Uuid> {
    let mut out = Vec::with_capacity(ids.len());
    for id in ids {
        if !out.contains(id) {
            out.push(*id);
        }
    }
    out
}

/// Every id must name an existing catalogue entry.
async fn check_option_ids(db: &PgPool, ids: &[Uuid]) -> AppResult<Vec<Uuid>> {
    let ids = dedup(ids);
    if ids.is_empty() {
        return Ok(ids);
    }
    let known = option_repo::existing_ids(db, &ids).await?;
    let unknown: Vec<String> = ids
        .iter()
        .filter(|id| !known.contains(id))
        .map(Uuid::to_string)
        .collect();
    if !unknown.is_empty() {
        return Err(AppError::validation(format!(
            "Unknown meal option id(s): {}",
            unknown.join(", ")
        )));
    }
    Ok(ids)
}

fn date_taken(e: sqlx::Error) -> AppError {
    if db_error_code(&e).as_deref() == Some("23505") {
        AppError::Conflict("A meal already exists for this date.".into())
    } else {
        e.into()
    }
}

async fn load_view(db: &PgPool, meal: Meal) -> AppResult<MealView> {
    let links = repo::options_for_meals(db, &[meal.id]).await?;
    Ok(to_view(meal, &links))
}

pub async fn list_meals(db: &PgPool, user_id: Uuid) -> AppResult<Vec<MealView>> {
    let meals = repo::list_by_user(db, user_id).await?;
    let ids: Vec<Uuid> = meals.iter().map(|m| m.id).collect();
    let mut by_meal: HashMap<Uuid, Vec<MealOptionLink>> = HashMap::new();
    for link in repo::options_for_meals(db, &ids).await? {
        by_meal.entry(link.meal_id).or_default().push(link);
    }
    Ok(meals
        .into_iter()
        .map(|m| {
            let links = by_meal.remove(&m.id).unwrap_or_default();
            to_view(m, &links)
        })
        .collect())
}

/// Creates the day's meal or overwrites it. `true` means a new row.
pub async fn upsert_meal(
    db: &PgPool,
    user_id: Uuid,
    req: UpsertMealRequest,
) -> AppResult<(bool, MealView)> {
    let (Some(name), Some(calories), Some(date)) =
        (req.name.as_deref(), req.calories, req.date.as_deref())
    else {
        return Err(AppError::validation("name, calories, and date are required"));
    };
    let new = NewMeal {
        name: validate_meal_name(name)?,
        calories: validate_calories(calories)?,
        date: parse_day(date)?,
        notes: req.notes,
    };
    let option_ids = match req.meal_option_ids.as_deref() {
        Some(ids) => Some(check_option_ids(db, ids).await?),
        None => None,
    };

    let mut tx = db.begin().await?;
    let upserted = repo::upsert_by_date_tx(&mut tx, user_id, &new).await?;
    if let Some(ids) = &option_ids {
        repo::set_options_tx(&mut tx, upserted.meal.id, ids).await?;
    }
    tx.commit().await?;

    info!(
        %user_id,
        meal_id = %upserted.meal.id,
        date = %upserted.meal.date,
        created = upserted.inserted,
        "meal saved"
    );
    let view = load_view(db, upserted.meal).await?;
    Ok((upserted.inserted, view))
}

pub async fn update_meal(
    db: &PgPool,
    user_id: Uuid,
    id: Uuid,
    patch: UpdateMealRequest,
) -> AppResult<MealView> {
    let mut meal = repo::find_by_id(db, user_id, id)
        .await?
        .ok_or_else(|| AppError::not_found("Meal not found"))?;

    if let Some(name) = patch.name.as_deref() {
        meal.name = validate_meal_name(name)?;
    }
    if let Some(calories) = patch.calories {
        meal.calories = validate_calories(calories)?;
    }
    if let Some(date) = patch.date.as_deref() {
        meal.date = parse_day(date)?;
    }
    if let Some(notes) = patch.notes {
        meal.notes = notes;
    }
    let option_ids = match patch.meal_option_ids.as_deref() {
        Some(ids) => Some(check_option_ids(db, ids).await?),
        None => None,
    };

    let mut tx = db.begin().await?;
    let saved = repo::update_tx(&mut tx, &meal).await.map_err(|e| {
        warn!(%user_id, meal_id = %id, error = %e, "meal update rejected");
        date_taken(e)
    })?;
    if let Some(ids) = &option_ids {
        repo::set_options_tx(&mut tx, saved.id, ids).await?;
    }
    tx.commit().await?;

    info!(%user_id, meal_id = %id, "meal updated");
    load_view(db, saved).await
}

pub async fn delete_meal(db: &PgPool, user_id: Uuid, id: Uuid) -> AppResult<()> {
    if !repo::delete(db, user_id, id).await? {
        return Err(AppError::not_found("Meal not found"));
    }
    info!(%user_id, meal_id = %id, "meal deleted");
    Ok(())
}

#[cfg(test)]
mod meal_tests {
    use super::*;
    use time::macros::{date, datetime};

    fn link(meal_id: Uuid, name: &str, meal_time: MealTime) -> MealOptionLink {
        MealOptionLink {
            meal_id,
            option_id: Uuid::new_v4(),
            name: name.into(),
            description: None,
            meal_time,
        }
    }

    #[test]
    fn name_rules() {
        assert!(validate_meal_name("  ").is_err());
        assert_eq!(validate_meal_name(" Lunch ").unwrap(), "Lunch");
        assert!(validate_meal_name(&"a".repeat(100)).is_ok());
        assert!(validate_meal_name(&"a".repeat(101)).is_err());
    }

    #[test]
    fn calorie_rules() {
        assert!(validate_calories(-1).is_err());
        assert_eq!(validate_calories(0).unwrap(), 0);
        assert_eq!(validate_calories(20_000).unwrap(), 20_000);
        assert!(validate_calories(20_001).is_err());
    }

    #[test]
    fn options_grouped_in_meal_time_order() {
        let meal_id = Uuid::new_v4();
        let links = vec![
            link(meal_id, "Steak", MealTime::Dinner),
            link(meal_id, "Oats", MealTime::Breakfast),
            link(meal_id, "Eggs", MealTime::Breakfast),
        ];
        let groups = group_options(&links);
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].name, "breakfast");
        assert_eq!(groups[0].label, "Breakfast");
        assert_eq!(groups[0].options.len(), 2);
        assert_eq!(groups[1].name, "dinner");
        assert_eq!(groups[1].options[0].name, "Steak");
    }

    #[test]
    fn view_serializes_plain_date() {
        let meal = Meal {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            name: "Day log".into(),
            calories: 1900,
            date: date!(2026 - 01 - 05),
            notes: None,
            created_at: datetime!(2026-01-05 20:00 UTC),
            updated_at: None,
        };
        let v = serde_json::to_value(to_view(meal, &[])).unwrap();
        assert_eq!(v["date"], "2026-01-05");
        assert_eq!(v["meal_times"], serde_json::json!([]));
    }

    #[test]
    fn duplicate_option_ids_collapse() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        assert_eq!(dedup(&[a, b, a]), vec![a, b]);
    }
}
