//! Stage-to-stage moves.
//!
//! A move is validated completely before anything is produced: the input
//! opportunity is only borrowed, and the updated copy plus its stage-change
//! entry exist only on success. Terminal stages demand a reason up front,
//! so no reader can ever observe a closed opportunity without one.

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::error::ErrorCode;
use crate::model::activity::Activity;
use crate::model::opportunity::Opportunity;
use crate::model::reason::{ReasonCatalog, ReasonRejection};
use crate::model::stage::{StageCatalog, SystemRole};

/// Why a move was refused.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransitionError {
    #[error("stage '{stage_id}' does not exist in pipeline '{pipeline_id}'")]
    UnknownStage {
        stage_id: String,
        pipeline_id: String,
    },

    #[error("moving to {role} stage '{stage_id}' requires a reason")]
    ReasonRequired { stage_id: String, role: SystemRole },

    #[error("'{reason}' is not a valid {role} reason")]
    UnknownReason { reason: String, role: SystemRole },
}

impl TransitionError {
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::UnknownStage { .. } => ErrorCode::UnknownStage,
            Self::ReasonRequired { .. } => ErrorCode::ReasonRequired,
            Self::UnknownReason { .. } => ErrorCode::UnknownReason,
        }
    }
}

/// A requested move.
#[derive(Debug, Clone, Copy)]
pub struct MoveRequest<'a> {
    pub target_stage_id: &'a str,
    pub reason: Option<&'a str>,
    pub actor: &'a str,
    /// Id for the stage-change entry, supplied by the caller.
    pub activity_id: &'a str,
    pub now: DateTime<Utc>,
}

/// Outcome of a successful move.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition {
    /// Target equals the current stage; nothing changed.
    Unchanged(Opportunity),
    Moved {
        opportunity: Opportunity,
        stage_change: Activity,
    },
}

impl Transition {
    #[must_use]
    pub const fn opportunity(&self) -> &Opportunity {
        match self {
            Self::Unchanged(opportunity) | Self::Moved { opportunity, .. } => opportunity,
        }
    }

    #[must_use]
    pub const fn stage_change(&self) -> Option<&Activity> {
        match self {
            Self::Unchanged(_) => None,
            Self::Moved { stage_change, .. } => Some(stage_change),
        }
    }

    #[must_use]
    pub fn into_opportunity(self) -> Opportunity {
        match self {
            Self::Unchanged(opportunity) | Self::Moved { opportunity, .. } => opportunity,
        }
    }

    #[must_use]
    pub const fn is_moved(&self) -> bool {
        matches!(self, Self::Moved { .. })
    }
}

/// Move `opportunity` to `request.target_stage_id`.
///
/// Terminal targets require a reason from the matching closed set: Lost sets
/// `loss_reason` and clears `win_reason`, Won does the opposite, and Normal
/// clears both.
///
/// # Errors
///
/// [`TransitionError::UnknownStage`], [`TransitionError::ReasonRequired`] or
/// [`TransitionError::UnknownReason`]; `opportunity` is never modified.
pub fn move_opportunity(
    opportunity: &Opportunity,
    catalog: &StageCatalog,
    reasons: &ReasonCatalog,
    request: &MoveRequest<'_>,
) -> Result<Transition, TransitionError> {
    if request.target_stage_id == opportunity.stage_id {
        return Ok(Transition::Unchanged(opportunity.clone()));
    }

    let target = catalog
        .find(request.target_stage_id)
        .ok_or_else(|| TransitionError::UnknownStage {
            stage_id: request.target_stage_id.to_string(),
            pipeline_id: catalog.pipeline_id().to_string(),
        })?;

    let role = target.system_role;
    let reason = if role.is_terminal() {
        Some(
            reasons
                .validate(role, request.reason)
                .map_err(|rejection| match rejection {
                    ReasonRejection::Missing => TransitionError::ReasonRequired {
                        stage_id: target.id.clone(),
                        role,
                    },
                    ReasonRejection::NotInSet(reason) => {
                        TransitionError::UnknownReason { reason, role }
                    }
                })?,
        )
    } else {
        None
    };

    let mut next = opportunity.clone();
    match role {
        SystemRole::Normal => {
            next.loss_reason = None;
            next.win_reason = None;
        }
        SystemRole::Won => {
            next.win_reason = reason;
            next.loss_reason = None;
        }
        SystemRole::Lost => {
            next.loss_reason = reason;
            next.win_reason = None;
        }
    }
    next.stage_id.clone_from(&target.id);
    next.touch(request.now);

    let stage_change = Activity::stage_change(
        request.activity_id,
        &opportunity.id,
        &opportunity.stage_id,
        &target.id,
        request.actor,
        request.now,
    );

    debug!(
        opportunity = %opportunity.id,
        from = %opportunity.stage_id,
        to = %target.id,
        %role,
        "opportunity moved"
    );

    Ok(Transition::Moved {
        opportunity: next,
        stage_change,
    })
}

/// Flip the archived flag. Stage and reasons are untouched.
///
/// Archiving stamps `archived_at`; unarchiving clears it. Requesting the
/// current value returns the opportunity unchanged.
#[must_use]
pub fn set_archived(opportunity: &Opportunity, archived: bool, now: DateTime<Utc>) -> Opportunity {
    if opportunity.archived == archived {
        return opportunity.clone();
    }
    let mut next = opportunity.clone();
    next.archived = archived;
    next.archived_at = archived.then_some(now);
    next.touch(now);
    next
}
