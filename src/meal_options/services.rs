use sqlx::PgPool;
use tracing::info;
use uuid::Uuid;

use crate::{
    error::{AppError, AppResult},
    meal_options::{
        dto::{CreateMealOptionRequest, IngredientInput, UpdateMealOptionRequest},
        repo,
        repo_types::{MealOption, MealTime, NewIngredient, NewMealOption, VALID_UNITS},
    },
};

pub const MAX_NAME_LEN: usize = 100;
pub const MAX_INGREDIENT_NAME_LEN: usize = 150;

pub fn validate_option_name(raw: Option<&str>) -> AppResult<String> {
    let name = raw.map(str::trim).unwrap_or_default();
    if name.is_empty() {
        return Err(AppError::validation("name is required"));
    }
    if name.chars().count() > MAX_NAME_LEN {
        return Err(AppError::validation("name must be at most 100 characters"));
    }
    Ok(name.to_string())
}

pub fn parse_meal_time(raw: Option<&str>) -> AppResult<MealTime> {
    let raw = raw.ok_or_else(|| AppError::validation("meal_time is required"))?;
    MealTime::parse(raw).ok_or_else(|| {
        AppError::validation("meal_time must be one of: breakfast, lunch, snack, dinner")
    })
}

pub fn validate_ingredient(input: &IngredientInput) -> AppResult<NewIngredient> {
    let name = input.name.as_deref().map(str::trim).unwrap_or_default();
    let unit = input
        .unit
        .as_deref()
        .map(|u| u.trim().to_ascii_lowercase())
        .unwrap_or_default();
    let (false, Some(quantity), false) = (name.is_empty(), input.quantity, unit.is_empty()) else {
        return Err(AppError::validation(
            "Each ingredient requires name, quantity and unit",
        ));
    };
    if name.chars().count() > MAX_INGREDIENT_NAME_LEN {
        return Err(AppError::validation(
            "ingredient name must be at most 150 characters",
        ));
    }
    if !quantity.is_finite() || quantity < 0.0 {
        return Err(AppError::validation("ingredient quantity must be >= 0"));
    }
    if !VALID_UNITS.contains(&unit.as_str()) {
        return Err(AppError::validation(
            "ingredient unit must be one of: g, ml, unit, tbsp, tsp, cup",
        ));
    }
    Ok(NewIngredient {
        name: name.to_string(),
        quantity,
        unit,
    })
}

fn validate_calories(calories: Option<f64>) -> AppResult<Option<f64>> {
    match calories {
        Some(c) if !c.is_finite() || c < 0.0 => Err(AppError::validation(
            "estimated_calories must be >= 0",
        )),
        other => Ok(other),
    }
}

pub fn validate_create(req: CreateMealOptionRequest) -> AppResult<NewMealOption> {
    Ok(NewMealOption {
        name: validate_option_name(req.name.as_deref())?,
        description: req.description,
        meal_time: parse_meal_time(req.meal_time.as_deref())?,
        estimated_calories: validate_calories(req.estimated_calories)?,
        ingredients: req
            .ingredients
            .iter()
            .map(validate_ingredient)
            .collect::<AppResult<_>>()?,
    })
}

/// Applies a patch on top of the stored option. Returns the new values and
/// whether the ingredient list has to be rewritten.
pub fn apply_patch(
    current: &MealOption,
    patch: UpdateMealOptionRequest,
) -> AppResult<(NewMealOption, bool)> {
    let name = match patch.name.as_deref() {
        Some(raw) => validate_option_name(Some(raw))?,
        None => current.name.clone(),
    };
    let meal_time = match patch.meal_time.as_deref() {
        Some(raw) => parse_meal_time(Some(raw))?,
        None => current.meal_time,
    };
    let description = patch
        .description
        .unwrap_or_else(|| current.description.clone());
    let estimated_calories = match patch.estimated_calories {
        Some(c) => validate_calories(c)?,
        None => current.estimated_calories,
    };
    let replace = patch.ingredients.is_some();
    let ingredients = match patch.ingredients {
        Some(list) => list
            .iter()
            .map(validate_ingredient)
            .collect::<AppResult<_>>()?,
        None => current
            .ingredients
            .iter()
            .map(|i| NewIngredient {
                name: i.name.clone(),
                quantity: i.quantity,
                unit: i.unit.clone(),
            })
            .collect(),
    };
    Ok((
        NewMealOption {
            name,
            description,
            meal_time,
            estimated_calories,
            ingredients,
        },
        replace,
    ))
}

pub async fn list_options(db: &PgPool) -> AppResult<Vec<MealOption>> {
    Ok(repo::list_options(db).await?)
}

pub async fn get_option(db: &PgPool, id: Uuid) -> AppResult<MealOption> {
    repo::find_option(db, id)
        .await?
        .ok_or_else(|| AppError::not_found("MealOption not found"))
}

pub async fn create_option(db: &PgPool, req: CreateMealOptionRequest) -> AppResult<MealOption> {
    let new = validate_create(req)?;
    let mut tx = db.begin().await?;
    let row = repo::insert_option_tx(&mut tx, &new).await?;
    let ingredients = repo::replace_ingredients_tx(&mut tx, row.id, &new.ingredients).await?;
    tx.commit().await?;

    info!(option_id = %row.id, meal_time = row.meal_time.as_str(), "meal option created");
    Ok(MealOption::from_parts(row, ingredients))
}

pub async fn update_option(
    db: &PgPool,
    id: Uuid,
    patch: UpdateMealOptionRequest,
) -> AppResult<MealOption> {
    let current = get_option(db, id).await?;
    let (new, replace_ingredients) = apply_patch(&current, patch)?;

    let mut tx = db.begin().await?;
    let row = repo::update_option_tx(&mut tx, id, &new)
        .await?
        .ok_or_else(|| AppError::not_found("MealOption not found"))?;
    let ingredients = if replace_ingredients {
        repo::replace_ingredients_tx(&mut tx, id, &new.ingredients).await?
    } else {
        current.ingredients
    };
    tx.commit().await?;

    info!(option_id = %id, replace_ingredients, "meal option updated");
    Ok(MealOption::from_parts(row, ingredients))
}

pub async fn delete_option(db: &PgPool, id: Uuid) -> AppResult<()> {
    if !repo::delete_option(db, id).await? {
        return Err(AppError::not_found("MealOption not found"));
    }
    info!(option_id = %id, "meal option deleted");
    Ok(())
}
