use async_trait::async_trait;
use sqlx::PgPool;
use time::Date;
use uuid::Uuid;

use crate::goals::{
    repo_types::{CaloricGoal, GoalFields},
    services::{count_overlapping, find_active_in},
};

const GOAL_COLUMNS: &str =
    "id, user_id, daily_calories, label, start_date, end_date, notes, created_at, updated_at";

/// Persistence for caloric goals. Every query is scoped to one user.
///
/// Active-goal and overlap lookups are matched in Rust over `list_goals`.
/// The schema's exclusion constraint enforces non-overlap on write.
#[async_trait]
pub trait GoalStore: Send + Sync {
    /// Ordered by `start_date` descending.
    async fn list_goals(&self, user_id: Uuid) -> sqlx::Result<Vec<CaloricGoal>>;

    async fn find_goal(&self, user_id: Uuid, id: Uuid) -> sqlx::Result<Option<CaloricGoal>>;

    /// Goal whose range contains `date`; latest start wins.
    async fn find_active_goal(
        &self,
        user_id: Uuid,
        date: Date,
    ) -> sqlx::Result<Option<CaloricGoal>> {
        let goals = self.list_goals(user_id).await?;
        Ok(find_active_in(&goals, date).cloned())
    }

    /// Number of the user's goals intersecting `[start, end-or-∞]`, ignoring `exclude`.
    async fn count_overlaps(
        &self,
        user_id: Uuid,
        start: Date,
        end: Option<Date>,
        exclude: Option<Uuid>,
    ) -> sqlx::Result<i64> {
        let goals = self.list_goals(user_id).await?;
        Ok(count_overlapping(&goals, start, end, exclude) as i64)
    }

    async fn insert_goal(&self, user_id: Uuid, fields: &GoalFields) -> sqlx::Result<CaloricGoal>;

    /// Writes every mutable column and stamps `updated_at`.
    async fn save_goal(&self, goal: &CaloricGoal) -> sqlx::Result<CaloricGoal>;

    async fn delete_goal(&self, user_id: Uuid, id: Uuid) -> sqlx::Result<bool>;
}

#[async_trait]
impl GoalStore for PgPool {
    async fn list_goals(&self, user_id: Uuid) -> sqlx::Result<Vec<CaloricGoal>> {
        sqlx::query_as::<_, CaloricGoal>(&format!(
            "SELECT {GOAL_COLUMNS} FROM caloric_goals WHERE user_id = $1 ORDER BY start_date DESC"
        ))
        .bind(user_id)
        .fetch_all(self)
        .await
    }

    async fn find_goal(&self, user_id: Uuid, id: Uuid) -> sqlx::Result<Option<CaloricGoal>> {
        sqlx::query_as::<_, CaloricGoal>(&format!(
            "SELECT {GOAL_COLUMNS} FROM caloric_goals WHERE id = $1 AND user_id = $2"
        ))
        .bind(id)
        .bind(user_id)
        .fetch_optional(self)
        .await
    }

    async fn insert_goal(&self, user_id: Uuid, fields: &GoalFields) -> sqlx::Result<CaloricGoal> {
        sqlx::query_as::<_, CaloricGoal>(&format!(
            r#"
            INSERT INTO caloric_goals (user_id, daily_calories, label, start_date, end_date, notes)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {GOAL_COLUMNS}
            "#
        ))
        .bind(user_id)
        .bind(fields.daily_calories)
        .bind(&fields.label)
        .bind(fields.start_date)
        .bind(fields.end_date)
        .bind(&fields.notes)
        .fetch_one(self)
        .await
    }

    async fn save_goal(&self, goal: &CaloricGoal) -> sqlx::Result<CaloricGoal> {
        sqlx::query_as::<_, CaloricGoal>(&format!(
            r#"
            UPDATE caloric_goals
            SET daily_calories = $3, label = $4, start_date = $5, end_date = $6, notes = $7,
                updated_at = now()
            WHERE id = $1 AND user_id = $2
            RETURNING {GOAL_COLUMNS}
            "#
        ))
        .bind(goal.id)
        .bind(goal.user_id)
        .bind(goal.daily_calories)
        .bind(&goal.label)
        .bind(goal.start_date)
        .bind(goal.end_date)
        .bind(&goal.notes)
        .fetch_one(self)
        .await
    }

    async fn delete_goal(&self, user_id: Uuid, id: Uuid) -> sqlx::Result<bool> {
        let res = sqlx::query("DELETE FROM caloric_goals WHERE id = $1 AND user_id = $2")
            .bind(id)
            .bind(user_id)
            .execute(self)
            .await?;
        Ok(res.rows_affected() > 0)
    }
}
