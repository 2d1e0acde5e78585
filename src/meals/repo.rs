use sqlx::{PgPool, Postgres, Transaction};
use time::Date;
use uuid::Uuid;

use crate::meals::repo_types::{Meal, MealOptionLink, NewMeal, UpsertedMeal};

const MEAL_COLUMNS: &str = "id, user_id, name, calories, date, notes, created_at, updated_at";

pub async fn list_by_user(db: &PgPool, user_id: Uuid) -> sqlx::Result<Vec<Meal>> {
    sqlx::query_as::<_, Meal>(&format!(
        "SELECT {MEAL_COLUMNS} FROM meals WHERE user_id = $1 ORDER BY date DESC"
    ))
    .bind(user_id)
    .fetch_all(db)
    .await
}

/// Both bounds inclusive, oldest first.
pub async fn list_between(
    db: &PgPool,
    user_id: Uuid,
    start: Date,
    end: Date,
) -> sqlx::Result<Vec<Meal>> {
    sqlx::query_as::<_, Meal>(&format!(
        "SELECT {MEAL_COLUMNS} FROM meals
          WHERE user_id = $1 AND date BETWEEN $2 AND $3
          ORDER BY date"
    ))
    .bind(user_id)
    .bind(start)
    .bind(end)
    .fetch_all(db)
    .await
}

pub async fn find_by_id(db: &PgPool, user_id: Uuid, id: Uuid) -> sqlx::Result<Option<Meal>> {
    sqlx::query_as::<_, Meal>(&format!(
        "SELECT {MEAL_COLUMNS} FROM meals WHERE id = $1 AND user_id = $2"
    ))
    .bind(id)
    .bind(user_id)
    .fetch_optional(db)
    .await
}

pub async fn options_for_meals(
    db: &PgPool,
    meal_ids: &[Uuid],
) -> sqlx::Result<Vec<MealOptionLink>> {
    sqlx::query_as::<_, MealOptionLink>(
        r#"
        SELECT mmo.meal_id, o.id AS option_id, o.name, o.description, o.meal_time
          FROM meal_meal_options mmo
          JOIN meal_options o ON o.id = mmo.meal_option_id
         WHERE mmo.meal_id = ANY($1)
         ORDER BY o.meal_time, o.name
        "#,
    )
    .bind(meal_ids)
    .fetch_all(db)
    .await
}

/// One row per (user, date): insert, or overwrite the existing one.
pub async fn upsert_by_date_tx(
    tx: &mut Transaction<'_, Postgres>,
    user_id: Uuid,
    meal: &NewMeal,
) -> sqlx::Result<UpsertedMeal> {
    sqlx::query_as::<_, UpsertedMeal>(&format!(
        r#"
        INSERT INTO meals (user_id, name, calories, date, notes)
        VALUES ($1, $2, $3, $4, $5)
        ON CONFLICT (user_id, date) DO UPDATE SET
            name = EXCLUDED.name,
            calories = EXCLUDED.calories,
            notes = EXCLUDED.notes,
            updated_at = now()
        RETURNING {MEAL_COLUMNS}, (xmax = 0) AS inserted
        "#
    ))
    .bind(user_id)
    .bind(&meal.name)
    .bind(meal.calories)
    .bind(meal.date)
    .bind(&meal.notes)
    .fetch_one(&mut **tx)
    .await
}

pub async fn update_tx(tx: &mut Transaction<'_, Postgres>, meal: &Meal) -> sqlx::Result<Meal> {
    sqlx::query_as::<_, Meal>(&format!(
        r#"
        UPDATE meals
           SET name = $3, calories = $4, date = $5, notes = $6, updated_at = now()
         WHERE id = $1 AND user_id = $2
        RETURNING {MEAL_COLUMNS}
        "#
    ))
    .bind(meal.id)
    .bind(meal.user_id)
    .bind(&meal.name)
    .bind(meal.calories)
    .bind(meal.date)
    .bind(&meal.notes)
    .fetch_one(&mut **tx)
    .await
}

pub async fn set_options_tx(
    tx: &mut Transaction<'_, Postgres>,
    meal_id: Uuid,
    option_ids: &[Uuid],
) -> sqlx::Result<()> {
    sqlx::query("DELETE FROM meal_meal_options WHERE meal_id = $1")
        .bind(meal_id)
        .execute(&mut **tx)
        .await?;
    sqlx::query(
        r#"
        INSERT INTO meal_meal_options (meal_id, meal_option_id)
        SELECT $1, UNNEST($2::uuid[])
        ON CONFLICT DO NOTHING
        "#,
    )
    .bind(meal_id)
    .bind(option_ids)
    .execute(&mut **tx)
    .await?;
    Ok(())
}

pub async fn delete(db: &PgPool, user_id: Uuid, id: Uuid) -> sqlx::Result<bool> {
    let res = sqlx::query("DELETE FROM meals WHERE id = $1 AND user_id = $2")
        .bind(id)
        .bind(user_id)
        .execute(db)
        .await?;
    Ok(res.rows_affected() > 0)
}
