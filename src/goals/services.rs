use time::Date;
use tracing::{info, warn};
use uuid::Uuid;

use crate::{
    dates::parse_date,
    error::{AppError, AppResult},
    goals::{
        dto::{CreateGoalRequest, UpdateGoalRequest},
        repo::GoalStore,
        repo_types::{CaloricGoal, GoalFields},
    },
};

pub const MIN_DAILY_CALORIES: i64 = 500;
pub const MAX_DAILY_CALORIES: i64 = 10_000;

pub const OVERLAP_MESSAGE: &str = "The date range overlaps with an existing caloric goal.";

pub fn validate_daily_calories(calories: i64) -> AppResult<i32> {
    if !(MIN_DAILY_CALORIES..=MAX_DAILY_CALORIES).contains(&calories) {
        return Err(AppError::validation(
            "daily_calories must be between 500 and 10000 kcal.",
        ));
    }
    // range-checked above
    Ok(calories as i32)
}

pub fn validate_date_range(start: Date, end: Option<Date>) -> AppResult<()> {
    match end {
        Some(end) if end < start => Err(AppError::validation(
            "end_date must be equal to or after start_date.",
        )),
        _ => Ok(()),
    }
}

/// Two inclusive ranges, `None` meaning open-ended, intersect.
pub fn ranges_overlap(
    a_start: Date,
    a_end: Option<Date>,
    b_start: Date,
    b_end: Option<Date>,
) -> bool {
    a_end.map_or(true, |a_end| b_start <= a_end) && b_end.map_or(true, |b_end| b_end >= a_start)
}

pub fn covers(goal: &CaloricGoal, date: Date) -> bool {
    goal.start_date <= date && goal.end_date.map_or(true, |end| end >= date)
}

/// The goal containing `date`. If stored goals ever overlap, the one that
/// started last wins.
pub fn find_active_in(goals: &[CaloricGoal], date: Date) -> Option<&CaloricGoal> {
    goals
        .iter()
        .filter(|g| covers(g, date))
        .max_by_key(|g| g.start_date)
}

pub fn count_overlapping(
    goals: &[CaloricGoal],
    start: Date,
    end: Option<Date>,
    exclude: Option<Uuid>,
) -> usize {
    goals
        .iter()
        .filter(|g| Some(g.id) != exclude)
        .filter(|g| ranges_overlap(start, end, g.start_date, g.end_date))
        .count()
}

/// Optional end date; blank means open-ended.
fn parse_end_date(raw: Option<&str>) -> AppResult<Option<Date>> {
    match raw.map(str::trim) {
        Some(raw) if !raw.is_empty() => Ok(Some(parse_date(raw)?)),
        _ => Ok(None),
    }
}

pub async fn has_overlap<S: GoalStore + ?Sized>(
    store: &S,
    user_id: Uuid,
    start: Date,
    end: Option<Date>,
    exclude: Option<Uuid>,
) -> AppResult<bool> {
    Ok(store.count_overlaps(user_id, start, end, exclude).await? > 0)
}

async fn assert_no_overlap<S: GoalStore + ?Sized>(
    store: &S,
    user_id: Uuid,
    start: Date,
    end: Option<Date>,
    exclude: Option<Uuid>,
) -> AppResult<()> {
    if has_overlap(store, user_id, start, end, exclude).await? {
        warn!(%user_id, %start, end = ?end, "caloric goal overlaps an existing one");
        return Err(AppError::Conflict(OVERLAP_MESSAGE.into()));
    }
    Ok(())
}

pub async fn list_for_user<S: GoalStore + ?Sized>(
    store: &S,
    user_id: Uuid,
) -> AppResult<Vec<CaloricGoal>> {
    Ok(store.list_goals(user_id).await?)
}

pub async fn get_goal<S: GoalStore + ?Sized>(
    store: &S,
    user_id: Uuid,
    id: Uuid,
) -> AppResult<CaloricGoal> {
    store
        .find_goal(user_id, id)
        .await?
        .ok_or_else(|| AppError::not_found("Caloric goal not found."))
}

pub async fn find_active<S: GoalStore + ?Sized>(
    store: &S,
    user_id: Uuid,
    date: Date,
) -> AppResult<Option<CaloricGoal>> {
    Ok(store.find_active_goal(user_id, date).await?)
}

pub async fn create_goal<S: GoalStore + ?Sized>(
    store: &S,
    user_id: Uuid,
    req: CreateGoalRequest,
) -> AppResult<CaloricGoal> {
    let (Some(calories), Some(start_raw)) = (req.daily_calories, req.start_date.as_deref()) else {
        return Err(AppError::validation(
            "daily_calories and start_date are required.",
        ));
    };

    let daily_calories = validate_daily_calories(calories)?;
    let start_date = parse_date(start_raw)?;
    let end_date = parse_end_date(req.end_date.as_deref())?;
    validate_date_range(start_date, end_date)?;
    assert_no_overlap(store, user_id, start_date, end_date, None).await?;

    let fields = GoalFields {
        daily_calories,
        label: req.label,
        start_date,
        end_date,
        notes: req.notes,
    };
    let goal = store.insert_goal(user_id, &fields).await?;
    info!(%user_id, goal_id = %goal.id, daily_calories, "caloric goal created");
    Ok(goal)
}

pub async fn update_goal<S: GoalStore + ?Sized>(
    store: &S,
    user_id: Uuid,
    id: Uuid,
    patch: UpdateGoalRequest,
) -> AppResult<CaloricGoal> {
    let mut goal = get_goal(store, user_id, id).await?;

    if let Some(calories) = patch.daily_calories {
        goal.daily_calories = validate_daily_calories(calories)?;
    }
    if let Some(raw) = patch.start_date.as_deref() {
        goal.start_date = parse_date(raw)?;
    }
    if let Some(end) = patch.end_date {
        goal.end_date = parse_end_date(end.as_deref())?;
    }
    if let Some(label) = patch.label {
        goal.label = label;
    }
    if let Some(notes) = patch.notes {
        goal.notes = notes;
    }

    validate_date_range(goal.start_date, goal.end_date)?;
    assert_no_overlap(store, user_id, goal.start_date, goal.end_date, Some(goal.id)).await?;

    let saved = store.save_goal(&goal).await?;
    info!(%user_id, goal_id = %saved.id, "caloric goal updated");
    Ok(saved)
}

pub async fn delete_goal<S: GoalStore + ?Sized>(
    store: &S,
    user_id: Uuid,
    id: Uuid,
) -> AppResult<()> {
    if !store.delete_goal(user_id, id).await? {
        return Err(AppError::not_found("Caloric goal not found."));
    }
    info!(%user_id, goal_id = %id, "caloric goal deleted");
    Ok(())
}

#[cfg(test)]
mod goal_tests {
    use super::*;
    use crate::test_utils::MemStore;
    use time::macros::date;

    fn create_req(calories: i64, start: &str, end: Option<&str>) -> CreateGoalRequest {
        CreateGoalRequest {
            daily_calories: Some(calories),
            start_date: Some(start.into()),
            end_date: end.map(Into::into),
            label: None,
            notes: None,
        }
    }

    #[test]
    fn daily_calorie_bounds_are_inclusive() {
        assert!(validate_daily_calories(499).is_err());
        assert_eq!(validate_daily_calories(500).unwrap(), 500);
        assert_eq!(validate_daily_calories(10_000).unwrap(), 10_000);
        assert!(validate_daily_calories(10_001).is_err());
    }

    #[test]
    fn open_ended_ranges_overlap_everything_after_them() {
        let jan1 = date!(2026 - 01 - 01);
        let jan31 = date!(2026 - 01 - 31);
        let feb1 = date!(2026 - 02 - 01);
        assert!(ranges_overlap(jan1, None, date!(2030 - 01 - 01), Some(date!(2030 - 02 - 01))));
        assert!(ranges_overlap(jan1, Some(jan31), jan31, None));
        assert!(!ranges_overlap(jan1, Some(jan31), feb1, None));
        assert!(!ranges_overlap(feb1, None, jan1, Some(jan31)));
    }

    fn stored(start: Date, end: Option<Date>) -> CaloricGoal {
        CaloricGoal {
            id: Uuid::new_v4(),
            user_id: Uuid::nil(),
            daily_calories: 2000,
            label: None,
            start_date: start,
            end_date: end,
            notes: None,
            created_at: time::OffsetDateTime::UNIX_EPOCH,
            updated_at: None,
        }
    }

    #[test]
    fn overlap_count_skips_adjacent_and_excluded_goals() {
        let jan = stored(date!(2026 - 01 - 01), Some(date!(2026 - 01 - 31)));
        let open = stored(date!(2026 - 03 - 01), None);
        let goals = vec![jan.clone(), open.clone()];

        // starts the day after January ends, stops before March
        assert_eq!(
            count_overlapping(&goals, date!(2026 - 02 - 01), Some(date!(2026 - 02 - 28)), None),
            0
        );
        assert_eq!(count_overlapping(&goals, date!(2026 - 01 - 31), None, None), 2);
        assert_eq!(count_overlapping(&goals, date!(2027 - 01 - 01), None, None), 1);
        let mid_jan = (date!(2026 - 01 - 10), Some(date!(2026 - 01 - 20)));
        assert_eq!(count_overlapping(&goals, mid_jan.0, mid_jan.1, None), 1);
        assert_eq!(count_overlapping(&goals, mid_jan.0, mid_jan.1, Some(jan.id)), 0);
    }

    #[test]
    fn active_lookup_handles_open_ends_and_gaps() {
        let jan = stored(date!(2026 - 01 - 01), Some(date!(2026 - 01 - 31)));
        let open = stored(date!(2026 - 03 - 01), None);
        let goals = vec![open.clone(), jan.clone()];

        assert_eq!(find_active_in(&goals, date!(2026 - 01 - 01)).map(|g| g.id), Some(jan.id));
        assert_eq!(find_active_in(&goals, date!(2026 - 01 - 31)).map(|g| g.id), Some(jan.id));
        assert!(find_active_in(&goals, date!(2026 - 02 - 01)).is_none());
        assert!(find_active_in(&goals, date!(2025 - 12 - 31)).is_none());
        assert_eq!(find_active_in(&goals, date!(2099 - 01 - 01)).map(|g| g.id), Some(open.id));
    }

    #[tokio::test]
    async fn blank_end_date_means_open_ended_on_create_and_update() {
        let store = MemStore::default();
        let user = Uuid::new_v4();
        let goal = create_goal(&store, user, create_req(2000, "2026-01-01", Some("  ")))
            .await
            .unwrap();
        assert_eq!(goal.end_date, None);

        let bounded = update_goal(
            &store,
            user,
            goal.id,
            UpdateGoalRequest {
                end_date: Some(Some("2026-01-31".into())),
                ..Default::default()
            },
        )
        .await
        .unwrap();
        assert_eq!(bounded.end_date, Some(date!(2026 - 01 - 31)));

        let reopened = update_goal(
            &store,
            user,
            goal.id,
            UpdateGoalRequest {
                end_date: Some(Some(String::new())),
                ..Default::default()
            },
        )
        .await
        .unwrap();
        assert_eq!(reopened.end_date, None);
    }

    #[test]
    fn end_before_start_is_invalid() {
        let err = validate_date_range(date!(2026 - 02 - 01), Some(date!(2026 - 01 - 31)));
        assert!(matches!(err, Err(AppError::Validation(_))));
        assert!(validate_date_range(date!(2026 - 02 - 01), Some(date!(2026 - 02 - 01))).is_ok());
    }

    #[tokio::test]
    async fn create_rejects_out_of_range_calories() {
        let store = MemStore::default();
        let user = Uuid::new_v4();
        let err = create_goal(&store, user, create_req(499, "2026-01-01", None))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
        assert!(create_goal(&store, user, create_req(10_000, "2026-01-01", None)).await.is_ok());
    }

    #[tokio::test]
    async fn overlapping_create_conflicts_adjacent_succeeds() {
        let store = MemStore::default();
        let user = Uuid::new_v4();
        create_goal(&store, user, create_req(2000, "2026-01-01", Some("2026-01-31")))
            .await
            .unwrap();

        let err = create_goal(&store, user, create_req(1800, "2026-01-15", Some("2026-02-15")))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Conflict(ref m) if m == OVERLAP_MESSAGE));

        let open = create_goal(&store, user, create_req(1800, "2026-02-01", None))
            .await
            .unwrap();
        assert_eq!(open.end_date, None);

        // another user's calendar is independent
        assert!(create_goal(&store, Uuid::new_v4(), create_req(1800, "2026-01-15", None))
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn invalid_range_fails_before_overlap_check() {
        let store = MemStore::default();
        let user = Uuid::new_v4();
        let err = create_goal(&store, user, create_req(2000, "2026-03-10", Some("2026-03-01")))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[tokio::test]
    async fn missing_required_fields_and_bad_dates_are_validation_errors() {
        let store = MemStore::default();
        let user = Uuid::new_v4();
        let req = CreateGoalRequest {
            daily_calories: None,
            start_date: Some("2026-01-01".into()),
            end_date: None,
            label: None,
            notes: None,
        };
        assert!(matches!(
            create_goal(&store, user, req).await,
            Err(AppError::Validation(_))
        ));
        assert!(matches!(
            create_goal(&store, user, create_req(2000, "01/01/2026", None)).await,
            Err(AppError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn active_goal_follows_the_calendar() {
        let store = MemStore::default();
        let user = Uuid::new_v4();
        let jan = create_goal(&store, user, create_req(2000, "2026-01-01", Some("2026-01-31")))
            .await
            .unwrap();
        let mar = create_goal(&store, user, create_req(1700, "2026-03-01", None))
            .await
            .unwrap();

        let hit = find_active(&store, user, date!(2026 - 01 - 31)).await.unwrap();
        assert_eq!(hit.map(|g| g.id), Some(jan.id));
        assert!(find_active(&store, user, date!(2026 - 02 - 10)).await.unwrap().is_none());
        let later = find_active(&store, user, date!(2027 - 06 - 01)).await.unwrap();
        assert_eq!(later.map(|g| g.id), Some(mar.id));
        assert!(find_active(&store, Uuid::new_v4(), date!(2026 - 01 - 10)).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn update_excludes_itself_and_can_clear_end_date() {
        let store = MemStore::default();
        let user = Uuid::new_v4();
        let goal = create_goal(&store, user, create_req(2000, "2026-01-01", Some("2026-01-31")))
            .await
            .unwrap();

        let widened = update_goal(
            &store,
            user,
            goal.id,
            UpdateGoalRequest {
                start_date: Some("2026-01-05".into()),
                end_date: Some(None),
                ..Default::default()
            },
        )
        .await
        .unwrap();
        assert_eq!(widened.start_date, date!(2026 - 01 - 05));
        assert_eq!(widened.end_date, None);
        assert!(widened.updated_at.is_some());
    }

    #[tokio::test]
    async fn update_into_a_sibling_conflicts() {
        let store = MemStore::default();
        let user = Uuid::new_v4();
        create_goal(&store, user, create_req(2000, "2026-01-01", Some("2026-01-31")))
            .await
            .unwrap();
        let feb = create_goal(&store, user, create_req(1900, "2026-02-01", Some("2026-02-28")))
            .await
            .unwrap();

        let err = update_goal(
            &store,
            user,
            feb.id,
            UpdateGoalRequest {
                start_date: Some("2026-01-20".into()),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));

        let err = update_goal(
            &store,
            user,
            feb.id,
            UpdateGoalRequest {
                daily_calories: Some(10_001),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[tokio::test]
    async fn foreign_goals_are_not_found() {
        let store = MemStore::default();
        let owner = Uuid::new_v4();
        let goal = create_goal(&store, owner, create_req(2000, "2026-01-01", None))
            .await
            .unwrap();
        let stranger = Uuid::new_v4();
        assert!(matches!(
            get_goal(&store, stranger, goal.id).await,
            Err(AppError::NotFound(_))
        ));
        assert!(matches!(
            delete_goal(&store, stranger, goal.id).await,
            Err(AppError::NotFound(_))
        ));
        delete_goal(&store, owner, goal.id).await.unwrap();
        assert!(list_for_user(&store, owner).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn list_is_newest_start_first() {
        let store = MemStore::default();
        let user = Uuid::new_v4();
        create_goal(&store, user, create_req(2000, "2026-01-01", Some("2026-01-31")))
            .await
            .unwrap();
        create_goal(&store, user, create_req(2100, "2026-03-01", Some("2026-03-31")))
            .await
            .unwrap();
        let starts: Vec<_> = list_for_user(&store, user)
            .await
            .unwrap()
            .into_iter()
            .map(|g| g.start_date)
            .collect();
        assert_eq!(starts, vec![date!(2026 - 03 - 01), date!(2026 - 01 - 01)]);
    }
}
