use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sqlx::FromRow;
use time::{Date, OffsetDateTime};
use uuid::Uuid;

use crate::dates::iso_date;

#[derive(Debug, Clone, FromRow)]
pub struct WeeklyReport {
    pub id: Uuid,
    pub user_id: Uuid,
    pub week_start: Date,
    pub week_end: Date,
    pub target_calories: i64,
    pub average_calories: i64,
    pub total_calories: i64,
    pub days_tracked: i64,
    pub analysis: Value,
    pub summary: String,
    pub generated_at: OffsetDateTime,
}

/// Everything written on generation; the row is keyed by (user, week_start).
#[derive(Debug, Clone)]
pub struct NewReport {
    pub user_id: Uuid,
    pub week_start: Date,
    pub week_end: Date,
    pub target_calories: i64,
    pub average_calories: i64,
    pub total_calories: i64,
    pub days_tracked: i64,
    pub analysis: Value,
    pub summary: String,
}

const RESERVED_KEYS: [&str; 8] = [
    "id",
    "week_start",
    "week_end",
    "target_calories",
    "average_calories",
    "total_calories",
    "days_tracked",
    "generated_at",
];

/// Report as served: the stored scalars with the analysis keys flattened
/// next to them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeeklyReportView {
    pub id: Uuid,
    #[serde(with = "iso_date")]
    pub week_start: Date,
    #[serde(with = "iso_date")]
    pub week_end: Date,
    pub target_calories: i64,
    pub average_calories: i64,
    pub total_calories: i64,
    pub days_tracked: i64,
    #[serde(with = "time::serde::rfc3339")]
    pub generated_at: OffsetDateTime,
    #[serde(flatten)]
    pub analysis: Map<String, Value>,
}

impl From<WeeklyReport> for WeeklyReportView {
    fn from(r: WeeklyReport) -> Self {
        let mut analysis = match r.analysis {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        for key in RESERVED_KEYS {
            analysis.remove(key);
        }
        Self {
            id: r.id,
            week_start: r.week_start,
            week_end: r.week_end,
            target_calories: r.target_calories,
            average_calories: r.average_calories,
            total_calories: r.total_calories,
            days_tracked: r.days_tracked,
            generated_at: r.generated_at,
            analysis,
        }
    }
}

/// History entry without the full analysis payload.
#[derive(Debug, Clone, Serialize)]
pub struct HistoryItem {
    pub id: Uuid,
    #[serde(with = "iso_date")]
    pub week_start: Date,
    #[serde(with = "iso_date")]
    pub week_end: Date,
    pub score: Option<Value>,
    pub target_calories: i64,
    pub average_calories: i64,
    pub total_calories: i64,
    pub days_tracked: i64,
    pub summary: String,
    #[serde(with = "time::serde::rfc3339")]
    pub generated_at: OffsetDateTime,
}

impl From<WeeklyReport> for HistoryItem {
    fn from(r: WeeklyReport) -> Self {
        let score = r
            .analysis
            .get("goal_adherence")
            .and_then(|a| a.get("score"))
            .filter(|s| !s.is_null())
            .cloned();
        Self {
            id: r.id,
            week_start: r.week_start,
            week_end: r.week_end,
            score,
            target_calories: r.target_calories,
            average_calories: r.average_calories,
            total_calories: r.total_calories,
            days_tracked: r.days_tracked,
            summary: r.summary,
            generated_at: r.generated_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use time::macros::{date, datetime};

    fn report(analysis: Value) -> WeeklyReport {
        WeeklyReport {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            week_start: date!(2026 - 01 - 05),
            week_end: date!(2026 - 01 - 11),
            target_calories: 2000,
            average_calories: 2000,
            total_calories: 6000,
            days_tracked: 3,
            analysis,
            summary: "Solid week.".into(),
            generated_at: datetime!(2026-01-12 08:30 UTC),
        }
    }

    #[test]
    fn view_survives_a_trip_through_json() {
        let view = WeeklyReportView::from(report(json!({
            "goal_adherence": {"score": 78},
            "summary": "Solid week.",
            "recommendations": ["a", "b", "c"]
        })));
        let text = serde_json::to_string(&view).unwrap();
        let flat: Value = serde_json::from_str(&text).unwrap();
        assert_eq!(flat["week_start"], "2026-01-05");
        assert_eq!(flat["week_end"], "2026-01-11");
        assert_eq!(flat["goal_adherence"]["score"], 78);

        let back: WeeklyReportView = serde_json::from_str(&text).unwrap();
        assert_eq!(back, view);
        assert_eq!(back.total_calories, 6000);
        assert_eq!(back.days_tracked, 3);
    }

    #[test]
    fn analysis_cannot_shadow_stored_scalars() {
        let view = WeeklyReportView::from(report(json!({"total_calories": 1, "summary": "x"})));
        assert!(!view.analysis.contains_key("total_calories"));
        let flat = serde_json::to_value(&view).unwrap();
        assert_eq!(flat["total_calories"], 6000);
    }

    #[test]
    fn history_item_pulls_the_score() {
        let item = HistoryItem::from(report(json!({"goal_adherence": {"score": 64}})));
        assert_eq!(item.score, Some(json!(64)));
        let missing = HistoryItem::from(report(json!({"summary": "x"})));
        assert_eq!(missing.score, None);
        let v = serde_json::to_value(&missing).unwrap();
        assert!(v["score"].is_null());
    }
}
