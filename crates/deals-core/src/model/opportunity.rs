use chrono::{DateTime, Duration, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

use super::stage::{StageCatalog, SystemRole};
use crate::error::ErrorCode;

/// Largest estimated amount accepted on create or edit (10^15).
///
/// Totals over any realistic number of opportunities stay far inside the
/// decimal range at this bound.
pub const MAX_AMOUNT: Decimal = Decimal::from_parts(2_764_472_320, 232_830, 0, false, 0);

/// Win probability in percent, always within `0..=100`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "u8")]
pub struct Probability(u8);

impl Probability {
    pub const MAX: Self = Self(100);

    #[must_use]
    pub const fn percent(self) -> u8 {
        self.0
    }

    /// Apply this probability to an amount. `None` on decimal overflow.
    #[must_use]
    pub fn weigh(self, amount: Decimal) -> Option<Decimal> {
        amount
            .checked_mul(Decimal::from(self.0))?
            .checked_div(Decimal::ONE_HUNDRED)
    }
}

impl TryFrom<i64> for Probability {
    type Error = OpportunityError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        u8::try_from(value)
            .ok()
            .filter(|percent| *percent <= 100)
            .map(Self)
            .ok_or(OpportunityError::ProbabilityOutOfRange { value })
    }
}

impl From<Probability> for u8 {
    fn from(value: Probability) -> Self {
        value.0
    }
}

impl fmt::Display for Probability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}%", self.0)
    }
}

/// Validation failures for opportunity creation and edits.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum OpportunityError {
    #[error("probability {value} is outside 0..=100")]
    ProbabilityOutOfRange { value: i64 },

    #[error("estimated amount {amount} is negative")]
    NegativeAmount { amount: Decimal },

    #[error("estimated amount {amount} exceeds the maximum of {max}", max = MAX_AMOUNT)]
    AmountTooLarge { amount: Decimal },

    #[error("title must not be empty")]
    EmptyTitle,

    #[error("stage '{stage_id}' does not exist in pipeline '{pipeline_id}'")]
    UnknownStage {
        stage_id: String,
        pipeline_id: String,
    },

    #[error("cannot create an opportunity in {role} stage '{stage_id}'")]
    TerminalStageOnCreate { stage_id: String, role: SystemRole },

    #[error(transparent)]
    Catalog(#[from] super::stage::CatalogError),
}

impl OpportunityError {
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::ProbabilityOutOfRange { .. }
            | Self::NegativeAmount { .. }
            | Self::AmountTooLarge { .. }
            | Self::EmptyTitle => ErrorCode::InvalidField,
            Self::UnknownStage { .. } => ErrorCode::UnknownStage,
            Self::TerminalStageOnCreate { .. } => ErrorCode::TerminalStageOnCreate,
            Self::Catalog(e) => e.code(),
        }
    }
}

/// A tracked sales deal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Opportunity {
    pub id: String,
    pub contact_id: String,
    pub pipeline_id: String,
    pub stage_id: String,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub estimated_amount: Option<Decimal>,
    pub probability: Probability,
    #[serde(default)]
    pub expected_close_date: Option<NaiveDate>,
    #[serde(default)]
    pub owner_id: Option<String>,
    pub archived: bool,
    #[serde(default)]
    pub archived_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub loss_reason: Option<String>,
    #[serde(default)]
    pub win_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input for [`Opportunity::open`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OpportunityDraft {
    pub id: String,
    pub contact_id: String,
    pub title: String,
    pub description: Option<String>,
    /// Explicit starting stage; the pipeline default when `None`.
    pub stage_id: Option<String>,
    pub estimated_amount: Option<Decimal>,
    pub probability: Probability,
    pub expected_close_date: Option<NaiveDate>,
    pub owner_id: Option<String>,
}

/// Field edits. `None` leaves a field alone; `Some(None)` clears it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OpportunityEdit {
    pub title: Option<String>,
    pub description: Option<Option<String>>,
    pub estimated_amount: Option<Option<Decimal>>,
    pub probability: Option<Probability>,
    pub expected_close_date: Option<Option<NaiveDate>>,
    pub owner_id: Option<Option<String>>,
}

impl OpportunityEdit {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

impl Opportunity {
    /// Create an opportunity in a normal stage of `catalog`'s pipeline.
    ///
    /// # Errors
    ///
    /// Rejects an empty title, a negative amount, an explicit stage that is
    /// unknown or terminal, and a pipeline with no normal stage.
    pub fn open(
        draft: OpportunityDraft,
        catalog: &StageCatalog,
        now: DateTime<Utc>,
    ) -> Result<Self, OpportunityError> {
        let title = validate_title(&draft.title)?;
        validate_amount(draft.estimated_amount)?;

        let stage = match draft.stage_id.as_deref() {
            Some(stage_id) => {
                let stage =
                    catalog
                        .find(stage_id)
                        .ok_or_else(|| OpportunityError::UnknownStage {
                            stage_id: stage_id.to_string(),
                            pipeline_id: catalog.pipeline_id().to_string(),
                        })?;
                if stage.system_role.is_terminal() {
                    return Err(OpportunityError::TerminalStageOnCreate {
                        stage_id: stage.id.clone(),
                        role: stage.system_role,
                    });
                }
                stage
            }
            None => catalog.default_stage()?,
        };

        Ok(Self {
            id: draft.id,
            contact_id: draft.contact_id,
            pipeline_id: catalog.pipeline_id().to_string(),
            stage_id: stage.id.clone(),
            title,
            description: draft.description.filter(|d| !d.trim().is_empty()),
            estimated_amount: draft.estimated_amount,
            probability: draft.probability,
            expected_close_date: draft.expected_close_date,
            owner_id: draft.owner_id,
            archived: false,
            archived_at: None,
            loss_reason: None,
            win_reason: None,
            created_at: now,
            updated_at: now,
        })
    }

    /// Return a copy with `edit` applied. Stage and reasons are never touched.
    ///
    /// # Errors
    ///
    /// Rejects an empty title or a negative amount; `self` is unaffected.
    pub fn apply_edit(&self, edit: &OpportunityEdit, now: DateTime<Utc>) -> Result<Self, OpportunityError> {
        if edit.is_empty() {
            return Ok(self.clone());
        }

        let mut next = self.clone();
        if let Some(title) = &edit.title {
            next.title = validate_title(title)?;
        }
        if let Some(description) = &edit.description {
            next.description = description.clone().filter(|d| !d.trim().is_empty());
        }
        if let Some(amount) = edit.estimated_amount {
            validate_amount(amount)?;
            next.estimated_amount = amount;
        }
        if let Some(probability) = edit.probability {
            next.probability = probability;
        }
        if let Some(date) = edit.expected_close_date {
            next.expected_close_date = date;
        }
        if let Some(owner) = &edit.owner_id {
            next.owner_id.clone_from(owner);
        }
        next.touch(now);
        Ok(next)
    }

    /// Amount used in sums; a missing estimate counts as zero.
    #[must_use]
    pub fn amount(&self) -> Decimal {
        self.estimated_amount.unwrap_or(Decimal::ZERO)
    }

    /// `amount × probability / 100`, or `None` if a stored amount is too
    /// large to weigh.
    #[must_use]
    pub fn weighted_amount(&self) -> Option<Decimal> {
        self.probability.weigh(self.amount())
    }

    /// Advance `updated_at` strictly past its previous value.
    ///
    /// Storage compares `updated_at` on write, so two successive writes must
    /// never carry the same value even when the clock has not moved.
    pub fn touch(&mut self, now: DateTime<Utc>) {
        self.updated_at = if now > self.updated_at {
            now
        } else {
            self.updated_at + Duration::microseconds(1)
        };
    }
}

fn validate_title(raw: &str) -> Result<String, OpportunityError> {
    let title = raw.trim();
    if title.is_empty() {
        return Err(OpportunityError::EmptyTitle);
    }
    Ok(title.to_string())
}

fn validate_amount(amount: Option<Decimal>) -> Result<(), OpportunityError> {
    match amount {
        Some(amount) if amount.is_sign_negative() && !amount.is_zero() => {
            Err(OpportunityError::NegativeAmount { amount })
        }
        Some(amount) if amount > MAX_AMOUNT => Err(OpportunityError::AmountTooLarge { amount }),
        _ => Ok(()),
    }
}
