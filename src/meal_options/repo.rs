use std::collections::HashMap;

use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use crate::meal_options::repo_types::{
    Ingredient, MealOption, MealOptionRow, NewIngredient, NewMealOption,
};

const OPTION_COLUMNS: &str = "id, name, description, meal_time, estimated_calories, created_at";

/// Attaches ingredients (in stored order) to their options.
async fn hydrate(db: &PgPool, rows: Vec<MealOptionRow>) -> sqlx::Result<Vec<MealOption>> {
    let ids: Vec<Uuid> = rows.iter().map(|r| r.id).collect();
    let ingredients = sqlx::query_as::<_, Ingredient>(
        r#"
        SELECT id, meal_option_id, name, quantity, unit
          FROM ingredients
         WHERE meal_option_id = ANY($1)
         ORDER BY meal_option_id, position
        "#,
    )
    .bind(&ids)
    .fetch_all(db)
    .await?;

    let mut by_option: HashMap<Uuid, Vec<Ingredient>> = HashMap::new();
    for ing in ingredients {
        by_option.entry(ing.meal_option_id).or_default().push(ing);
    }
    Ok(rows
        .into_iter()
        .map(|row| {
            let ings = by_option.remove(&row.id).unwrap_or_default();
            MealOption::from_parts(row, ings)
        })
        .collect())
}

/// Whole catalogue ordered by meal time, then name.
pub async fn list_options(db: &PgPool) -> sqlx::Result<Vec<MealOption>> {
    let rows = sqlx::query_as::<_, MealOptionRow>(&format!(
        "SELECT {OPTION_COLUMNS} FROM meal_options ORDER BY meal_time, name"
    ))
    .fetch_all(db)
    .await?;
    hydrate(db, rows).await
}

pub async fn find_option(db: &PgPool, id: Uuid) -> sqlx::Result<Option<MealOption>> {
    let row = sqlx::query_as::<_, MealOptionRow>(&format!(
        "SELECT {OPTION_COLUMNS} FROM meal_options WHERE id = $1"
    ))
    .bind(id)
    .fetch_optional(db)
    .await?;
    match row {
        Some(row) => Ok(hydrate(db, vec![row]).await?.pop()),
        None => Ok(None),
    }
}

/// Which of `ids` exist in the catalogue.
pub async fn existing_ids(db: &PgPool, ids: &[Uuid]) -> sqlx::Result<Vec<Uuid>> {
    sqlx::query_scalar::<_, Uuid>("SELECT id FROM meal_options WHERE id = ANY($1)")
        .bind(ids)
        .fetch_all(db)
        .await
}

pub async fn insert_option_tx(
    tx: &mut Transaction<'_, Postgres>,
    option: &NewMealOption,
) -> sqlx::Result<MealOptionRow> {
    let row = sqlx::query_as::<_, MealOptionRow>(&format!(
        r#"
        INSERT INTO meal_options (name, description, meal_time, estimated_calories)
        VALUES ($1, $2, $3, $4)
        RETURNING {OPTION_COLUMNS}
        "#
    ))
    .bind(&option.name)
    .bind(&option.description)
    .bind(option.meal_time)
    .bind(option.estimated_calories)
    .fetch_one(&mut **tx)
    .await?;
    Ok(row)
}

pub async fn update_option_tx(
    tx: &mut Transaction<'_, Postgres>,
    id: Uuid,
    option: &NewMealOption,
) -> sqlx::Result<Option<MealOptionRow>> {
    sqlx::query_as::<_, MealOptionRow>(&format!(
        r#"
        UPDATE meal_options
           SET name = $2, description = $3, meal_time = $4, estimated_calories = $5
         WHERE id = $1
        RETURNING {OPTION_COLUMNS}
        "#
    ))
    .bind(id)
    .bind(&option.name)
    .bind(&option.description)
    .bind(option.meal_time)
    .bind(option.estimated_calories)
    .fetch_optional(&mut **tx)
    .await
}

/// Drops the option's ingredients and writes `ingredients` in order.
pub async fn replace_ingredients_tx(
    tx: &mut Transaction<'_, Postgres>,
    option_id: Uuid,
    ingredients: &[NewIngredient],
) -> sqlx::Result<Vec<Ingredient>> {
    sqlx::query("DELETE FROM ingredients WHERE meal_option_id = $1")
        .bind(option_id)
        .execute(&mut **tx)
        .await?;

    let mut out = Vec::with_capacity(ingredients.len());
    for (position, ing) in ingredients.iter().enumerate() {
        let row = sqlx::query_as::<_, Ingredient>(
            r#"
            INSERT INTO ingredients (meal_option_id, position, name, quantity, unit)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, meal_option_id, name, quantity, unit
            "#,
        )
        .bind(option_id)
        .bind(position as i32)
        .bind(&ing.name)
        .bind(ing.quantity)
        .bind(&ing.unit)
        .fetch_one(&mut **tx)
        .await?;
        out.push(row);
    }
    Ok(out)
}

pub async fn delete_option(db: &PgPool, id: Uuid) -> sqlx::Result<bool> {
    let res = sqlx::query("DELETE FROM meal_options WHERE id = $1")
        .bind(id)
        .execute(db)
        .await?;
    Ok(res.rows_affected() > 0)
}
