use async_trait::async_trait;
use sqlx::PgPool;
use time::Date;
use uuid::Uuid;

use crate::reports::{
    repo_types::{NewReport, WeeklyReport},
    stats::LoggedMeal,
};

const REPORT_COLUMNS: &str = "id, user_id, week_start, week_end, target_calories, \
     average_calories, total_calories, days_tracked, analysis, summary, generated_at";

#[async_trait]
pub trait ReportStore: Send + Sync {
    async fn find_report(&self, user_id: Uuid, week_start: Date)
        -> sqlx::Result<Option<WeeklyReport>>;

    /// Inserts or overwrites the (user, week_start) row and stamps `generated_at`.
    async fn upsert_report(&self, report: &NewReport) -> sqlx::Result<WeeklyReport>;

    /// Newest week first.
    async fn recent_reports(&self, user_id: Uuid, limit: i64) -> sqlx::Result<Vec<WeeklyReport>>;

    /// Meals logged on `[start, end]` with their option names.
    async fn meals_between(
        &self,
        user_id: Uuid,
        start: Date,
        end: Date,
    ) -> sqlx::Result<Vec<LoggedMeal>>;
}

#[async_trait]
impl ReportStore for PgPool {
    async fn find_report(
        &self,
        user_id: Uuid,
        week_start: Date,
    ) -> sqlx::Result<Option<WeeklyReport>> {
        sqlx::query_as::<_, WeeklyReport>(&format!(
            "SELECT {REPORT_COLUMNS} FROM weekly_reports WHERE user_id = $1 AND week_start = $2"
        ))
        .bind(user_id)
        .bind(week_start)
        .fetch_optional(self)
        .await
    }

    async fn upsert_report(&self, r: &NewReport) -> sqlx::Result<WeeklyReport> {
        sqlx::query_as::<_, WeeklyReport>(&format!(
            r#"
            INSERT INTO weekly_reports
                (user_id, week_start, week_end, target_calories, average_calories,
                 total_calories, days_tracked, analysis, summary, generated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, now())
            ON CONFLICT (user_id, week_start) DO UPDATE SET
                week_end = EXCLUDED.week_end,
                target_calories = EXCLUDED.target_calories,
                average_calories = EXCLUDED.average_calories,
                total_calories = EXCLUDED.total_calories,
                days_tracked = EXCLUDED.days_tracked,
                analysis = EXCLUDED.analysis,
                summary = EXCLUDED.summary,
                generated_at = EXCLUDED.generated_at
            RETURNING {REPORT_COLUMNS}
            "#
        ))
        .bind(r.user_id)
        .bind(r.week_start)
        .bind(r.week_end)
        .bind(r.target_calories)
        .bind(r.average_calories)
        .bind(r.total_calories)
        .bind(r.days_tracked)
        .bind(&r.analysis)
        .bind(&r.summary)
        .fetch_one(self)
        .await
    }

    async fn recent_reports(&self, user_id: Uuid, limit: i64) -> sqlx::Result<Vec<WeeklyReport>> {
        sqlx::query_as::<_, WeeklyReport>(&format!(
            r#"
            SELECT {REPORT_COLUMNS}
            FROM weekly_reports
            WHERE user_id = $1
            ORDER BY week_start DESC
            LIMIT $2
            "#
        ))
        .bind(user_id)
        .bind(limit)
        .fetch_all(self)
        .await
    }

    async fn meals_between(
        &self,
        user_id: Uuid,
        start: Date,
        end: Date,
    ) -> sqlx::Result<Vec<LoggedMeal>> {
        sqlx::query_as::<_, LoggedMeal>(
            r#"
            SELECT m.date, m.calories, m.notes,
                   COALESCE(
                       array_agg(o.name || ' (' || initcap(o.meal_time::text) || ')'
                                 ORDER BY o.meal_time, o.name)
                           FILTER (WHERE o.id IS NOT NULL),
                       '{}'
                   ) AS options
            FROM meals m
            LEFT JOIN meal_meal_options mmo ON mmo.meal_id = m.id
            LEFT JOIN meal_options o ON o.id = mmo.meal_option_id
            WHERE m.user_id = $1 AND m.date BETWEEN $2 AND $3
            GROUP BY m.id
            ORDER BY m.date, m.created_at
            "#,
        )
        .bind(user_id)
        .bind(start)
        .bind(end)
        .fetch_all(self)
        .await
    }
}
