//! Request-level operations over a [`Store`].
//!
//! Each function loads a snapshot, runs the pure engine on it, and writes the
//! result back guarded by the `updated_at` token it read. Every call receives
//! a [`RequestContext`] resolved once by the caller, so a request never sees
//! two different "today"s.

use serde::Serialize;
use tracing::{debug, info};
use uuid::Uuid;

use crate::clock::{ReferenceFrame, RequestContext};
use crate::db::Store;
use crate::error::DealsError;
use crate::forecast::{Forecast, compute_forecast};
use crate::model::activity::{Activity, ActivityDraft, ActivityPatch};
use crate::model::opportunity::{Opportunity, OpportunityDraft, OpportunityEdit};
use crate::model::reason::ReasonCatalog;
use crate::model::stage::{CatalogError, Stage, StageCatalog};
use crate::pipeline::{Board, BoardFilter, MoveRequest, Transition, build_board, set_archived};
use crate::timeline::{self, TimelineSection};

/// Fresh random identifier with a short type prefix, e.g. `opp-1f0c…`.
#[must_use]
pub fn new_id(prefix: &str) -> String {
    format!("{prefix}-{}", Uuid::new_v4().simple())
}

/// Load and validate the stage list of `pipeline_id`.
///
/// # Errors
///
/// [`CatalogError::NoStages`] for an unknown or empty pipeline.
pub fn list_stages(store: &Store, pipeline_id: &str) -> Result<StageCatalog, DealsError> {
    let stages = store.list_stages(pipeline_id)?;
    Ok(StageCatalog::new(pipeline_id, stages)?)
}

/// Add a stage to a pipeline.
///
/// A blank name falls back to the id.
///
/// # Errors
///
/// [`CatalogError::DuplicateStage`] if the id is already used anywhere.
pub fn add_stage(store: &Store, mut stage: Stage) -> Result<Stage, DealsError> {
    stage.id = stage.id.trim().to_string();
    if store.stage_exists(&stage.id)? {
        return Err(CatalogError::DuplicateStage { stage_id: stage.id }.into());
    }
    let name = stage.name.trim();
    stage.name = if name.is_empty() {
        stage.id.clone()
    } else {
        name.to_string()
    };
    store.insert_stage(&stage)?;
    info!(stage = %stage.id, pipeline = %stage.pipeline_id, role = %stage.system_role, "stage added");
    Ok(stage)
}

/// Open a new opportunity in `pipeline_id`.
///
/// An empty `draft.id` gets a generated one.
///
/// # Errors
///
/// Catalog problems, validation failures from [`Opportunity::open`], or storage errors.
pub fn create_opportunity(
    store: &Store,
    pipeline_id: &str,
    mut draft: OpportunityDraft,
    ctx: &RequestContext,
) -> Result<Opportunity, DealsError> {
    let catalog = list_stages(store, pipeline_id)?;
    if draft.id.trim().is_empty() {
        draft.id = new_id("opp");
    }
    let opportunity = Opportunity::open(draft, &catalog, ctx.now)?;
    store.insert_opportunity(&opportunity)?;
    info!(opportunity = %opportunity.id, stage = %opportunity.stage_id, "opportunity created");
    Ok(opportunity)
}

/// # Errors
///
/// [`crate::db::StoreError::NotFound`] for an unknown id.
pub fn get_opportunity(store: &Store, opportunity_id: &str) -> Result<Opportunity, DealsError> {
    Ok(store.get_opportunity(opportunity_id)?)
}

/// Apply plain field edits. Stage and reasons only change through [`move_opportunity`].
///
/// # Errors
///
/// Validation failures, `NotFound`, or `ConcurrentModification`.
pub fn update_opportunity(
    store: &Store,
    opportunity_id: &str,
    edit: &OpportunityEdit,
    ctx: &RequestContext,
) -> Result<Opportunity, DealsError> {
    let current = store.get_opportunity(opportunity_id)?;
    if edit.is_empty() {
        return Ok(current);
    }
    let next = current.apply_edit(edit, ctx.now)?;
    store.save_opportunity(&next, current.updated_at)?;
    Ok(next)
}

/// Kanban view of one pipeline.
///
/// # Errors
///
/// Catalog or storage errors; `AmountOverflow` if a column total leaves the decimal range.
pub fn board(store: &Store, pipeline_id: &str, filter: &BoardFilter) -> Result<Board, DealsError> {
    let catalog = list_stages(store, pipeline_id)?;
    let opportunities = store.list_opportunities(pipeline_id)?;
    build_board(&catalog, &opportunities, filter).map_err(Into::into)
}

/// Move an opportunity and record the stage change in one write.
///
/// # Errors
///
/// Transition errors leave storage untouched; a concurrent writer yields
/// `ConcurrentModification`.
pub fn move_opportunity(
    store: &Store,
    reasons: &ReasonCatalog,
    opportunity_id: &str,
    target_stage_id: &str,
    reason: Option<&str>,
    actor: &str,
    ctx: &RequestContext,
) -> Result<Transition, DealsError> {
    let current = store.get_opportunity(opportunity_id)?;
    let catalog = list_stages(store, &current.pipeline_id)?;
    let activity_id = new_id("act");
    let request = MoveRequest {
        target_stage_id,
        reason,
        actor,
        activity_id: &activity_id,
        now: ctx.now,
    };

    let transition = crate::pipeline::move_opportunity(&current, &catalog, reasons, &request)?;
    if let Transition::Moved {
        opportunity,
        stage_change,
    } = &transition
    {
        store.record_move(opportunity, current.updated_at, stage_change)?;
        info!(
            opportunity = %opportunity.id,
            from = %current.stage_id,
            to = %opportunity.stage_id,
            "opportunity moved"
        );
    } else {
        debug!(opportunity = %current.id, "move to current stage ignored");
    }
    Ok(transition)
}

/// Pipeline projection over the current snapshot.
///
/// # Errors
///
/// Catalog or storage errors; `AmountOverflow` if a total leaves the decimal range.
pub fn forecast(store: &Store, pipeline_id: &str) -> Result<Forecast, DealsError> {
    let catalog = list_stages(store, pipeline_id)?;
    let opportunities = store.list_opportunities(pipeline_id)?;
    compute_forecast(&catalog, &opportunities).map_err(Into::into)
}

/// Set or clear the archived flag.
///
/// # Errors
///
/// `NotFound` or `ConcurrentModification`.
pub fn archive(
    store: &Store,
    opportunity_id: &str,
    archived: bool,
    ctx: &RequestContext,
) -> Result<Opportunity, DealsError> {
    let current = store.get_opportunity(opportunity_id)?;
    let next = set_archived(&current, archived, ctx.now);
    if next != current {
        store.save_opportunity(&next, current.updated_at)?;
        info!(opportunity = %next.id, archived, "archive flag changed");
    }
    Ok(next)
}

/// Grouped, annotated activity history of one opportunity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Timeline {
    pub opportunity_id: String,
    pub reference: ReferenceFrame,
    pub groups: Vec<TimelineSection>,
}

/// # Errors
///
/// `NotFound` for an unknown opportunity, or storage errors.
pub fn timeline(store: &Store, opportunity_id: &str, ctx: &RequestContext) -> Result<Timeline, DealsError> {
    let opportunity = store.get_opportunity(opportunity_id)?;
    let activities = store.list_activities(&opportunity.id)?;
    Ok(Timeline {
        opportunity_id: opportunity.id,
        reference: ReferenceFrame::from(ctx),
        groups: timeline::annotated_timeline(&activities, ctx),
    })
}

/// Attach a caller-created activity to an opportunity.
///
/// An empty `draft.id` gets a generated one.
///
/// # Errors
///
/// `NotFound` for an unknown opportunity, or [`crate::model::activity::ActivityError`].
pub fn add_activity(
    store: &Store,
    mut draft: ActivityDraft,
    actor: &str,
    ctx: &RequestContext,
) -> Result<Activity, DealsError> {
    store.get_opportunity(&draft.opportunity_id)?;
    if draft.id.trim().is_empty() {
        draft.id = new_id("act");
    }
    let activity = Activity::create(draft, actor, ctx.now)?;
    store.insert_activity(&activity)?;
    debug!(activity = %activity.id, kind = %activity.kind, "activity added");
    Ok(activity)
}

/// Complete, uncomplete, or (with `desired = None`) toggle a task or meeting.
///
/// # Errors
///
/// Gate errors when today is not the activity's date; `NotFound` or
/// `ConcurrentModification` from storage.
pub fn set_activity_completion(
    store: &Store,
    activity_id: &str,
    desired: Option<bool>,
    actor: &str,
    ctx: &RequestContext,
) -> Result<Activity, DealsError> {
    let current = store.get_activity(activity_id)?;
    let desired = desired.unwrap_or(!current.completed);
    let next = timeline::set_completion(&current, desired, actor, ctx)?;
    if next != current {
        store.save_activity(&next, current.updated_at)?;
        info!(activity = %next.id, completed = next.completed, "completion changed");
    }
    Ok(next)
}

/// Edit an activity's fields. Stage changes are read-only, and a task or
/// meeting whose date has passed keeps its schedule.
///
/// # Errors
///
/// [`crate::model::activity::ActivityError`], `SchedulePassed`, or storage errors.
pub fn update_activity(
    store: &Store,
    activity_id: &str,
    patch: &ActivityPatch,
    ctx: &RequestContext,
) -> Result<Activity, DealsError> {
    let current = store.get_activity(activity_id)?;
    timeline::ensure_reschedulable(&current, patch, &ctx.calendar, ctx.today)?;
    let next = current.apply_patch(patch, ctx.now)?;
    store.save_activity(&next, current.updated_at)?;
    Ok(next)
}

/// Remove an activity. Stage changes are read-only.
///
/// # Errors
///
/// `SystemGenerated` for stage changes, `NotFound` for unknown ids.
pub fn delete_activity(store: &Store, activity_id: &str) -> Result<(), DealsError> {
    let current = store.get_activity(activity_id)?;
    current.ensure_editable()?;
    store.delete_activity(activity_id)?;
    info!(activity = %activity_id, "activity deleted");
    Ok(())
}
