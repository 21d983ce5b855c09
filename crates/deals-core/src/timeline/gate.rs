//! Completion gating for tasks and meetings.
//!
//! Completion may only change on the activity's own civil date: a task on
//! its due date, a meeting on its end date. Before that the activity is
//! pending; after it, an uncompleted activity is locked.
//!
//! ```text
//! Pending --(midnight)--> Actionable --(midnight)--> Locked
//!                           |    ^
//!                  complete |    | uncomplete   (only on the relevant date)
//!                           v    |
//!                          Completed
//! ```
//!
//! Once the relevant date has passed, the schedule itself is frozen too, so
//! rescheduling cannot lead a locked activity back to `Actionable`.

use chrono::NaiveDate;
use serde::Serialize;
use tracing::debug;

use crate::clock::{BusinessCalendar, RequestContext};
use crate::error::ErrorCode;
use crate::model::activity::{Activity, ActivityKind, ActivityPatch};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum GateState {
    /// Relevant date is still ahead.
    Pending,
    /// Relevant date is today; completion can change.
    Actionable,
    /// Relevant date has passed without completion.
    Locked,
    Completed,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GateError {
    #[error("{kind} activity '{activity_id}' has no completion state")]
    NotCompletable {
        activity_id: String,
        kind: ActivityKind,
    },

    #[error("activity '{activity_id}' can only change completion on its own date ({}), not {reference_date}", relevant_date.map_or_else(|| "undated".to_string(), |d| d.to_string()))]
    NotEditableToday {
        activity_id: String,
        relevant_date: Option<NaiveDate>,
        reference_date: NaiveDate,
    },

    #[error("activity '{activity_id}' was scheduled for {relevant_date}; its schedule can no longer change")]
    SchedulePassed {
        activity_id: String,
        relevant_date: NaiveDate,
    },
}

impl GateError {
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::NotCompletable { .. } => ErrorCode::NotCompletable,
            Self::NotEditableToday { .. } | Self::SchedulePassed { .. } => ErrorCode::NotEditableToday,
        }
    }
}

/// Civil date of the instant the gate compares against.
#[must_use]
pub fn relevant_date(activity: &Activity, calendar: &BusinessCalendar) -> Option<NaiveDate> {
    activity
        .relevant_instant()
        .map(|instant| calendar.civil_date(instant))
}

/// Where a completable activity sits in its lifecycle.
///
/// `None` for kinds without completion and for undated tasks/meetings.
#[must_use]
pub fn gate_state(
    activity: &Activity,
    calendar: &BusinessCalendar,
    reference_date: NaiveDate,
) -> Option<GateState> {
    if !activity.kind.is_completable() {
        return None;
    }
    if activity.completed {
        return Some(GateState::Completed);
    }
    let date = relevant_date(activity, calendar)?;
    Some(match date.cmp(&reference_date) {
        std::cmp::Ordering::Greater => GateState::Pending,
        std::cmp::Ordering::Equal => GateState::Actionable,
        std::cmp::Ordering::Less => GateState::Locked,
    })
}

/// Uncompleted task or meeting whose date is before `reference_date`.
#[must_use]
pub fn is_overdue(activity: &Activity, calendar: &BusinessCalendar, reference_date: NaiveDate) -> bool {
    activity.kind.is_completable()
        && !activity.completed
        && relevant_date(activity, calendar).is_some_and(|date| date < reference_date)
}

#[must_use]
pub fn can_toggle_completion(
    activity: &Activity,
    calendar: &BusinessCalendar,
    reference_date: NaiveDate,
) -> bool {
    activity.kind.is_completable() && relevant_date(activity, calendar) == Some(reference_date)
}

/// Refuse `patch` if it reschedules a task or meeting whose date is behind
/// `reference_date`. Content-only edits always pass.
///
/// # Errors
///
/// [`GateError::SchedulePassed`].
pub fn ensure_reschedulable(
    activity: &Activity,
    patch: &ActivityPatch,
    calendar: &BusinessCalendar,
    reference_date: NaiveDate,
) -> Result<(), GateError> {
    if !activity.kind.is_completable() || !patch.touches_schedule() {
        return Ok(());
    }
    match relevant_date(activity, calendar) {
        Some(date) if date < reference_date => Err(GateError::SchedulePassed {
            activity_id: activity.id.clone(),
            relevant_date: date,
        }),
        _ => Ok(()),
    }
}

/// Flip the completion flag of `activity`.
///
/// # Errors
///
/// See [`set_completion`].
pub fn toggle_completion(
    activity: &Activity,
    acting_user: &str,
    ctx: &RequestContext,
) -> Result<Activity, GateError> {
    set_completion(activity, !activity.completed, acting_user, ctx)
}

/// Set the completion flag of `activity` to `desired`.
///
/// Completing records who and when; uncompleting clears both. Asking for
/// the current value returns the activity unchanged once the gate passes.
///
/// # Errors
///
/// [`GateError::NotCompletable`] for kinds without completion,
/// [`GateError::NotEditableToday`] when today is not the relevant date.
pub fn set_completion(
    activity: &Activity,
    desired: bool,
    acting_user: &str,
    ctx: &RequestContext,
) -> Result<Activity, GateError> {
    if !activity.kind.is_completable() {
        return Err(GateError::NotCompletable {
            activity_id: activity.id.clone(),
            kind: activity.kind,
        });
    }
    if !can_toggle_completion(activity, &ctx.calendar, ctx.today) {
        debug!(
            activity = %activity.id,
            today = %ctx.today,
            "completion change refused outside the activity's date"
        );
        return Err(GateError::NotEditableToday {
            activity_id: activity.id.clone(),
            relevant_date: relevant_date(activity, &ctx.calendar),
            reference_date: ctx.today,
        });
    }
    if activity.completed == desired {
        return Ok(activity.clone());
    }

    let mut next = activity.clone();
    next.completed = desired;
    if desired {
        next.completed_by = Some(acting_user.to_string());
        next.completed_at = Some(ctx.now);
    } else {
        next.completed_by = None;
        next.completed_at = None;
    }
    next.touch(ctx.now);
    Ok(next)
}
