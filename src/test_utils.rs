//! In-memory stores for service tests.

use std::sync::Mutex;

use async_trait::async_trait;
use time::{Date, OffsetDateTime};
use uuid::Uuid;

use crate::{
    goals::{
        repo::GoalStore,
        repo_types::{CaloricGoal, GoalFields},
    },
    reports::{
        repo::ReportStore,
        repo_types::{NewReport, WeeklyReport},
        stats::LoggedMeal,
    },
};

#[derive(Default)]
pub struct MemStore {
    goals: Mutex<Vec<CaloricGoal>>,
    reports: Mutex<Vec<WeeklyReport>>,
    meals: Mutex<Vec<(Uuid, LoggedMeal)>>,
}

impl MemStore {
    pub fn log_meal(
        &self,
        user_id: Uuid,
        date: Date,
        calories: i32,
        notes: Option<&str>,
        options: &[&str],
    ) {
        self.meals.lock().unwrap().push((
            user_id,
            LoggedMeal {
                date,
                calories,
                notes: notes.map(str::to_owned),
                options: options.iter().map(|o| o.to_string()).collect(),
            },
        ));
    }

    pub fn report_count(&self) -> usize {
        self.reports.lock().unwrap().len()
    }

    fn goals_of(&self, user_id: Uuid) -> Vec<CaloricGoal> {
        self.goals
            .lock()
            .unwrap()
            .iter()
            .filter(|g| g.user_id == user_id)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl GoalStore for MemStore {
    async fn list_goals(&self, user_id: Uuid) -> sqlx::Result<Vec<CaloricGoal>> {
        let mut goals = self.goals_of(user_id);
        goals.sort_by(|a, b| b.start_date.cmp(&a.start_date));
        Ok(goals)
    }

    async fn find_goal(&self, user_id: Uuid, id: Uuid) -> sqlx::Result<Option<CaloricGoal>> {
        Ok(self.goals_of(user_id).into_iter().find(|g| g.id == id))
    }

    async fn insert_goal(&self, user_id: Uuid, fields: &GoalFields) -> sqlx::Result<CaloricGoal> {
        let goal = CaloricGoal {
            id: Uuid::new_v4(),
            user_id,
            daily_calories: fields.daily_calories,
            label: fields.label.clone(),
            start_date: fields.start_date,
            end_date: fields.end_date,
            notes: fields.notes.clone(),
            created_at: OffsetDateTime::now_utc(),
            updated_at: None,
        };
        self.goals.lock().unwrap().push(goal.clone());
        Ok(goal)
    }

    async fn save_goal(&self, goal: &CaloricGoal) -> sqlx::Result<CaloricGoal> {
        let mut goals = self.goals.lock().unwrap();
        let slot = goals
            .iter_mut()
            .find(|g| g.id == goal.id && g.user_id == goal.user_id)
            .ok_or(sqlx::Error::RowNotFound)?;
        *slot = CaloricGoal {
            updated_at: Some(OffsetDateTime::now_utc()),
            ..goal.clone()
        };
        Ok(slot.clone())
    }

    async fn delete_goal(&self, user_id: Uuid, id: Uuid) -> sqlx::Result<bool> {
        let mut goals = self.goals.lock().unwrap();
        let before = goals.len();
        goals.retain(|g| !(g.id == id && g.user_id == user_id));
        Ok(goals.len() < before)
    }
}

#[async_trait]
impl ReportStore for MemStore {
    async fn find_report(
        &self,
        user_id: Uuid,
        week_start: Date,
    ) -> sqlx::Result<Option<WeeklyReport>> {
        Ok(self
            .reports
            .lock()
            .unwrap()
            .iter()
            .find(|r| r.user_id == user_id && r.week_start == week_start)
            .cloned())
    }

    async fn upsert_report(&self, new: &NewReport) -> sqlx::Result<WeeklyReport> {
        let mut reports = self.reports.lock().unwrap();
        let existing = reports
            .iter()
            .position(|r| r.user_id == new.user_id && r.week_start == new.week_start);
        let row = WeeklyReport {
            id: existing.map_or_else(Uuid::new_v4, |i| reports[i].id),
            user_id: new.user_id,
            week_start: new.week_start,
            week_end: new.week_end,
            target_calories: new.target_calories,
            average_calories: new.average_calories,
            total_calories: new.total_calories,
            days_tracked: new.days_tracked,
            analysis: new.analysis.clone(),
            summary: new.summary.clone(),
            generated_at: OffsetDateTime::now_utc(),
        };
        match existing {
            Some(i) => reports[i] = row.clone(),
            None => reports.push(row.clone()),
        }
        Ok(row)
    }

    async fn recent_reports(&self, user_id: Uuid, limit: i64) -> sqlx::Result<Vec<WeeklyReport>> {
        let mut rows: Vec<WeeklyReport> = self
            .reports
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.user_id == user_id)
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.week_start.cmp(&a.week_start));
        rows.truncate(usize::try_from(limit).unwrap_or(0));
        Ok(rows)
    }

    async fn meals_between(
        &self,
        user_id: Uuid,
        start: Date,
        end: Date,
    ) -> sqlx::Result<Vec<LoggedMeal>> {
        let mut rows: Vec<LoggedMeal> = self
            .meals
            .lock()
            .unwrap()
            .iter()
            .filter(|(owner, m)| *owner == user_id && m.date >= start && m.date <= end)
            .map(|(_, m)| m.clone())
            .collect();
        rows.sort_by_key(|m| m.date);
        Ok(rows)
    }
}
