//! Pure weekly aggregation: calories per day against a fixed daily target.

use std::collections::BTreeMap;

use serde::Serialize;
use sqlx::FromRow;
use time::Date;

use crate::{
    dates::{add_days, iso_date},
    error::AppResult,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DayStatus {
    NotTracked,
    OnTarget,
    Over,
    Under,
}

/// One logged meal as the aggregator sees it.
#[derive(Debug, Clone, FromRow)]
pub struct LoggedMeal {
    pub date: Date,
    pub calories: i32,
    pub notes: Option<String>,
    /// "Name (Meal time)" of every attached option.
    pub options: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DayBreakdown {
    #[serde(with = "iso_date")]
    pub date: Date,
    pub target: i64,
    pub actual: i64,
    pub difference: i64,
    pub status: DayStatus,
}

#[derive(Debug, Clone, PartialEq)]
pub struct WeekStats {
    pub daily_breakdown: Vec<DayBreakdown>,
    pub total_calories: i64,
    pub average_calories: i64,
    pub days_tracked: i64,
}

/// Within 10% of target either way counts as on target, boundary included.
pub fn day_status(actual: i64, target: i64) -> DayStatus {
    let difference = actual - target;
    if actual == 0 {
        DayStatus::NotTracked
    } else if difference.abs() * 10 <= target {
        DayStatus::OnTarget
    } else if difference > 0 {
        DayStatus::Over
    } else {
        DayStatus::Under
    }
}

pub fn calories_by_date(meals: &[LoggedMeal]) -> BTreeMap<Date, i64> {
    let mut by_date = BTreeMap::new();
    for meal in meals {
        *by_date.entry(meal.date).or_insert(0) += i64::from(meal.calories);
    }
    by_date
}

pub fn compute_stats(
    meals: &[LoggedMeal],
    week_start: Date,
    target: i64,
) -> AppResult<WeekStats> {
    let by_date = calories_by_date(meals);

    let days_tracked = by_date.len() as i64;
    let total_calories: i64 = by_date.values().sum();
    let average_calories = if days_tracked > 0 {
        (total_calories as f64 / days_tracked as f64).round() as i64
    } else {
        0
    };

    let daily_breakdown = (0..7)
        .map(|offset| {
            let date = add_days(week_start, offset)?;
            let actual = by_date.get(&date).copied().unwrap_or(0);
            Ok(DayBreakdown {
                date,
                target,
                actual,
                difference: actual - target,
                status: day_status(actual, target),
            })
        })
        .collect::<AppResult<_>>()?;

    Ok(WeekStats {
        daily_breakdown,
        total_calories,
        average_calories,
        days_tracked,
    })
}
