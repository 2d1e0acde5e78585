use serde_json::{Map, Value};
use time::Date;
use tracing::{info, warn};
use uuid::Uuid;

use crate::{
    ai::{ensure_no_error_flag, TextGenerator},
    dates::{add_days, is_monday},
    error::{AppError, AppResult},
    goals::repo::GoalStore,
    reports::{
        prompt::{build_user_prompt, enrich, SYSTEM_PROMPT},
        repo::ReportStore,
        repo_types::{HistoryItem, NewReport, WeeklyReportView},
        stats::compute_stats,
    },
};

pub const REQUIRED_ANALYSIS_KEYS: [&str; 3] = ["goal_adherence", "summary", "recommendations"];

pub const DEFAULT_HISTORY_LIMIT: i64 = 8;
pub const MAX_HISTORY_LIMIT: i64 = 52;

pub fn clamp_history_limit(limit: Option<i64>) -> i64 {
    limit
        .unwrap_or(DEFAULT_HISTORY_LIMIT)
        .clamp(1, MAX_HISTORY_LIMIT)
}

/// The reply must be an object, not flagged as an error, and carry the keys
/// the report view relies on.
pub fn validate_analysis(value: Value) -> AppResult<Map<String, Value>> {
    ensure_no_error_flag(&value, "weekly analysis").map_err(AppError::Unprocessable)?;
    let Value::Object(map) = value else {
        return Err(AppError::Unprocessable(
            "AI could not generate a valid weekly analysis: expected a JSON object".into(),
        ));
    };
    if let Some(missing) = REQUIRED_ANALYSIS_KEYS.iter().find(|k| !map.contains_key(**k)) {
        return Err(AppError::Unprocessable(format!(
            "AI could not generate a valid weekly analysis: missing `{missing}`"
        )));
    }
    Ok(map)
}

pub async fn generate_weekly_report<S>(
    store: &S,
    ai: &dyn TextGenerator,
    user_id: Uuid,
    week_start: Date,
    regenerate: bool,
) -> AppResult<WeeklyReportView>
where
    S: GoalStore + ReportStore + ?Sized,
{
    if !is_monday(week_start) {
        return Err(AppError::validation("week_start must be a Monday (ISO 8601)."));
    }
    let week_end = add_days(week_start, 6)
        .map_err(|_| AppError::validation("week_start out of range"))?;

    if !regenerate {
        if let Some(cached) = store.find_report(user_id, week_start).await? {
            info!(%user_id, %week_start, "serving cached weekly report");
            return Ok(cached.into());
        }
    }

    let goal = store
        .find_active_goal(user_id, week_start)
        .await?
        .ok_or_else(|| {
            AppError::not_found(
                "No caloric goal found for this week. \
                 Please create a caloric goal that covers the requested period.",
            )
        })?;
    let target = i64::from(goal.daily_calories);

    let meals = store.meals_between(user_id, week_start, week_end).await?;
    let stats = compute_stats(&meals, week_start, target)?;
    let days = enrich(&stats.daily_breakdown, &meals);
    let user_prompt = build_user_prompt(week_start, target, &days)?;

    let reply = ai.chat_json(SYSTEM_PROMPT, &user_prompt).await?;
    let analysis = validate_analysis(reply).map_err(|e| {
        warn!(%user_id, %week_start, error = %e, "rejected weekly analysis");
        e
    })?;
    let summary = analysis
        .get("summary")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();

    let saved = store
        .upsert_report(&NewReport {
            user_id,
            week_start,
            week_end,
            target_calories: target,
            average_calories: stats.average_calories,
            total_calories: stats.total_calories,
            days_tracked: stats.days_tracked,
            analysis: Value::Object(analysis),
            summary,
        })
        .await?;

    info!(
        %user_id,
        %week_start,
        days_tracked = stats.days_tracked,
        total_calories = stats.total_calories,
        regenerate,
        "weekly report generated"
    );
    Ok(saved.into())
}

pub async fn history<S: ReportStore + ?Sized>(
    store: &S,
    user_id: Uuid,
    limit: Option<i64>,
) -> AppResult<Vec<HistoryItem>> {
    let reports = store
        .recent_reports(user_id, clamp_history_limit(limit))
        .await?;
    Ok(reports.into_iter().map(HistoryItem::from).collect())
}

#[cfg(test)]
mod report_tests {
    use super::*;
    use crate::ai::{testing::ScriptedGenerator, AiError};
    use crate::goals::repo_types::GoalFields;
    use crate::test_utils::MemStore;
    use serde_json::json;
    use time::macros::date;

    const MONDAY: Date = date!(2026 - 01 - 05);

    fn analysis_reply(summary: &str) -> String {
        json!({
            "goal_adherence": {"score": 81, "days_on_target": 3},
            "calorie_analysis": {"weekly_total": 6000},
            "nutritional_gaps": [],
            "achievements": ["Logged three days"],
            "notes_analysis": {"patterns": [], "concerns": [], "mood_trend": "neutral"},
            "recommendations": ["a", "b", "c"],
            "summary": summary
        })
        .to_string()
    }

    async fn seeded_store(user: Uuid) -> MemStore {
        let store = MemStore::default();
        store
            .insert_goal(
                user,
                &GoalFields {
                    daily_calories: 2000,
                    label: None,
                    start_date: date!(2026 - 01 - 01),
                    end_date: None,
                    notes: None,
                },
            )
            .await
            .unwrap();
        store.log_meal(user, MONDAY, 2000, Some("good energy"), &["Oatmeal (Breakfast)"]);
        store.log_meal(user, date!(2026 - 01 - 06), 1800, None, &[]);
        store.log_meal(user, date!(2026 - 01 - 08), 2200, Some("party"), &[]);
        store
    }

    #[tokio::test]
    async fn first_request_generates_and_persists() {
        let user = Uuid::new_v4();
        let store = seeded_store(user).await;
        let ai = ScriptedGenerator::with_replies(vec![analysis_reply("Nice week.")]);

        let view = generate_weekly_report(&store, &ai, user, MONDAY, false).await.unwrap();
        assert_eq!(view.week_end, date!(2026 - 01 - 11));
        assert_eq!(view.target_calories, 2000);
        assert_eq!(view.days_tracked, 3);
        assert_eq!(view.total_calories, 6000);
        assert_eq!(view.average_calories, 2000);
        assert_eq!(view.analysis["summary"], "Nice week.");

        let (_, prompt) = ai.calls.lock().unwrap()[0].clone();
        assert!(prompt.contains("Week: 2026-01-05 to 2026-01-11"));
        assert!(prompt.contains("Oatmeal (Breakfast)"));
        assert!(prompt.contains("good energy"));
    }

    #[tokio::test]
    async fn cached_report_is_returned_unchanged() {
        let user = Uuid::new_v4();
        let store = seeded_store(user).await;
        let ai = ScriptedGenerator::with_replies(vec![analysis_reply("First.")]);

        let first = generate_weekly_report(&store, &ai, user, MONDAY, false).await.unwrap();
        let second = generate_weekly_report(&store, &ai, user, MONDAY, false).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(ai.call_count(), 1);
    }

    #[tokio::test]
    async fn regenerate_calls_again_and_overwrites() {
        let user = Uuid::new_v4();
        let store = seeded_store(user).await;
        let ai = ScriptedGenerator::with_replies(vec![
            analysis_reply("First."),
            analysis_reply("Second."),
        ]);

        let first = generate_weekly_report(&store, &ai, user, MONDAY, false).await.unwrap();
        let again = generate_weekly_report(&store, &ai, user, MONDAY, true).await.unwrap();
        assert_eq!(ai.call_count(), 2);
        assert_eq!(again.id, first.id);
        assert_eq!(again.analysis["summary"], "Second.");
        assert_eq!(store.report_count(), 1);

        let cached = generate_weekly_report(&store, &ai, user, MONDAY, false).await.unwrap();
        assert_eq!(cached.analysis["summary"], "Second.");
    }

    #[tokio::test]
    async fn missing_goal_is_not_found() {
        let store = MemStore::default();
        let ai = ScriptedGenerator::default();
        let err = generate_weekly_report(&store, &ai, Uuid::new_v4(), MONDAY, false)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
        assert_eq!(ai.call_count(), 0);
    }

    #[tokio::test]
    async fn non_monday_is_rejected() {
        let store = MemStore::default();
        let ai = ScriptedGenerator::default();
        let err = generate_weekly_report(&store, &ai, Uuid::new_v4(), date!(2026 - 01 - 06), false)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[tokio::test]
    async fn last_week_of_the_calendar_is_out_of_range() {
        // 9999-12-27 is a Monday whose Sunday does not exist
        let ai = ScriptedGenerator::default();
        let err = generate_weekly_report(
            &MemStore::default(),
            &ai,
            Uuid::new_v4(),
            date!(9999 - 12 - 27),
            false,
        )
        .await
        .unwrap_err();
        assert!(matches!(&err, AppError::Validation(m) if m == "week_start out of range"));
        assert_eq!(ai.call_count(), 0);
    }

    #[tokio::test]
    async fn flagged_or_incomplete_replies_are_unprocessable_and_not_stored() {
        let user = Uuid::new_v4();
        let store = seeded_store(user).await;
        let ai = ScriptedGenerator::with_replies(vec![
            json!({"error": "Could not analyse"}).to_string(),
            json!({"summary": "no adherence"}).to_string(),
            "not json at all".to_string(),
        ]);
        for _ in 0..3 {
            let err = generate_weekly_report(&store, &ai, user, MONDAY, false)
                .await
                .unwrap_err();
            assert!(matches!(err, AppError::Unprocessable(_)), "{err:?}");
        }
        assert_eq!(store.report_count(), 0);
    }

    #[tokio::test]
    async fn provider_failure_maps_to_provider_error() {
        let user = Uuid::new_v4();
        let store = seeded_store(user).await;
        let ai = ScriptedGenerator::failing(AiError::Status(503));
        let err = generate_weekly_report(&store, &ai, user, MONDAY, false)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Provider(_)));
    }

    #[tokio::test]
    async fn history_is_light_and_newest_first() {
        let user = Uuid::new_v4();
        let store = seeded_store(user).await;
        let ai = ScriptedGenerator::with_replies(vec![
            analysis_reply("Week one."),
            analysis_reply("Week two."),
        ]);
        generate_weekly_report(&store, &ai, user, MONDAY, false).await.unwrap();
        generate_weekly_report(&store, &ai, user, date!(2026 - 01 - 12), false)
            .await
            .unwrap();

        let items = history(&store, user, None).await.unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].week_start, date!(2026 - 01 - 12));
        assert_eq!(items[0].summary, "Week two.");
        assert_eq!(items[0].score, Some(json!(81)));

        assert_eq!(history(&store, user, Some(1)).await.unwrap().len(), 1);
    }

    #[test]
    fn history_limit_is_clamped() {
        assert_eq!(clamp_history_limit(None), 8);
        assert_eq!(clamp_history_limit(Some(0)), 1);
        assert_eq!(clamp_history_limit(Some(-3)), 1);
        assert_eq!(clamp_history_limit(Some(500)), 52);
        assert_eq!(clamp_history_limit(Some(12)), 12);
    }

    #[test]
    fn analysis_must_be_a_complete_object() {
        assert!(validate_analysis(json!(["a"])).is_err());
        assert!(validate_analysis(json!({"goal_adherence": {}, "summary": "x"})).is_err());
        let ok = validate_analysis(json!({
            "goal_adherence": {}, "summary": "x", "recommendations": []
        }))
        .unwrap();
        assert_eq!(ok.len(), 3);
    }
}
