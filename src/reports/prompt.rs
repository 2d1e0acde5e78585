use serde::Serialize;
use time::Date;

use crate::{
    dates::{add_days, format_date, iso_date},
    error::AppResult,
    reports::stats::{DayBreakdown, LoggedMeal},
};

pub const SYSTEM_PROMPT: &str = r#"You are a professional nutritionist reviewing a client's weekly diet log.

You will receive:
1. The client's daily caloric goal.
2. A day-by-day breakdown of what they ate (meals chosen, calories consumed, the difference from their target, and status).
3. The client's personal notes for each day (may include feelings, energy levels, symptoms, or general observations).

Provide a comprehensive weekly analysis. Return ONLY valid JSON (no prose, no code fences) with this exact structure:
{
  "goal_adherence": {
    "score": 78,
    "days_on_target": 4,
    "days_over": 1,
    "days_under": 1,
    "days_not_tracked": 1
  },
  "calorie_analysis": {
    "daily_breakdown": [...],
    "weekly_total": 12950,
    "weekly_target": 14000,
    "weekly_difference": -1050,
    "average_daily": 1850
  },
  "nutritional_gaps": [
    { "area": "protein", "severity": "moderate", "detail": "..." }
  ],
  "achievements": [
    "Met caloric goal on 4 out of 7 days"
  ],
  "notes_analysis": {
    "patterns": ["..."],
    "concerns": ["..."],
    "mood_trend": "mixed"
  },
  "recommendations": [
    "Add a vegetable serving to lunch on days it was missing"
  ],
  "summary": "2-3 motivational sentences summarising the week."
}

Rules:
- severity in nutritional_gaps must be one of: low, moderate, high.
- mood_trend must be one of: positive, neutral, negative, mixed.
- recommendations must contain 3 to 5 items.
- All text values must be in the same language as the user's notes (default: English).
- Return ONLY the JSON object, nothing else."#;

/// A breakdown row plus what was eaten and written that day.
#[derive(Debug, Serialize)]
pub struct EnrichedDay<'a> {
    #[serde(with = "iso_date")]
    pub date: Date,
    pub target: i64,
    pub actual: i64,
    pub difference: i64,
    pub status: crate::reports::stats::DayStatus,
    pub meals_chosen: Vec<&'a str>,
    pub notes: Option<&'a str>,
}

pub fn enrich<'a>(breakdown: &[DayBreakdown], meals: &'a [LoggedMeal]) -> Vec<EnrichedDay<'a>> {
    breakdown
        .iter()
        .map(|day| {
            let same_day = || meals.iter().filter(move |m| m.date == day.date);
            EnrichedDay {
                date: day.date,
                target: day.target,
                actual: day.actual,
                difference: day.difference,
                status: day.status,
                meals_chosen: same_day()
                    .flat_map(|m| m.options.iter().map(String::as_str))
                    .collect(),
                // last non-empty note of the day wins
                notes: same_day()
                    .filter_map(|m| m.notes.as_deref())
                    .filter(|n| !n.is_empty())
                    .last(),
            }
        })
        .collect()
}

pub fn build_user_prompt(
    week_start: Date,
    target: i64,
    days: &[EnrichedDay<'_>],
) -> AppResult<String> {
    Ok(format!(
        "Week: {} to {}\nDaily caloric goal: {} kcal\n\nDay-by-day data:\n{}",
        format_date(week_start),
        format_date(add_days(week_start, 6)?),
        target,
        serde_json::to_string_pretty(days)?
    ))
}
