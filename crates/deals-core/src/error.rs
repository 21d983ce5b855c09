use std::fmt;

use crate::clock::CalendarError;
use crate::db::StoreError;
use crate::forecast::AmountOverflow;
use crate::model::activity::ActivityError;
use crate::model::opportunity::OpportunityError;
use crate::model::stage::CatalogError;
use crate::pipeline::transition::TransitionError;
use crate::timeline::gate::GateError;

/// Machine-readable error codes for callers that branch on failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    NotInitialized,
    ConfigParseError,
    UnknownTimezone,
    NoStages,
    NoOpenStage,
    DuplicateStage,
    UnknownStage,
    ReasonRequired,
    UnknownReason,
    TerminalStageOnCreate,
    InvalidField,
    AmountOverflow,
    NotCompletable,
    NotEditableToday,
    SystemGenerated,
    InvalidSchedule,
    NotFound,
    ConcurrentModification,
    StorageFailure,
    InternalUnexpected,
}

impl ErrorCode {
    /// Stable code identifier (`E####`) for machine parsing.
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::NotInitialized => "E1001",
            Self::ConfigParseError => "E1002",
            Self::UnknownTimezone => "E1003",
            Self::NoStages => "E2001",
            Self::NoOpenStage => "E2002",
            Self::DuplicateStage => "E2003",
            Self::UnknownStage => "E2004",
            Self::ReasonRequired => "E2005",
            Self::UnknownReason => "E2006",
            Self::TerminalStageOnCreate => "E2007",
            Self::InvalidField => "E2008",
            Self::AmountOverflow => "E2009",
            Self::NotCompletable => "E3001",
            Self::NotEditableToday => "E3002",
            Self::SystemGenerated => "E3003",
            Self::InvalidSchedule => "E3004",
            Self::NotFound => "E5001",
            Self::ConcurrentModification => "E5002",
            Self::StorageFailure => "E5003",
            Self::InternalUnexpected => "E9001",
        }
    }

    /// Short human-facing summary for logs and terminal output.
    #[must_use]
    pub const fn message(self) -> &'static str {
        match self {
            Self::NotInitialized => "Project not initialized",
            Self::ConfigParseError => "Config file parse error",
            Self::UnknownTimezone => "Unknown timezone",
            Self::NoStages => "Pipeline has no stages",
            Self::NoOpenStage => "Pipeline has no open stage",
            Self::DuplicateStage => "Duplicate stage id",
            Self::UnknownStage => "Unknown stage",
            Self::ReasonRequired => "Reason required",
            Self::UnknownReason => "Unknown reason code",
            Self::TerminalStageOnCreate => "Cannot create in a terminal stage",
            Self::InvalidField => "Invalid field value",
            Self::AmountOverflow => "Amount totals out of range",
            Self::NotCompletable => "Activity cannot be completed",
            Self::NotEditableToday => "Activity not editable today",
            Self::SystemGenerated => "System-generated activity is read-only",
            Self::InvalidSchedule => "Invalid activity schedule",
            Self::NotFound => "Record not found",
            Self::ConcurrentModification => "Concurrent modification",
            Self::StorageFailure => "Storage failure",
            Self::InternalUnexpected => "Internal unexpected error",
        }
    }

    /// Optional remediation hint that can be surfaced to operators.
    #[must_use]
    pub const fn hint(self) -> Option<&'static str> {
        match self {
            Self::NotInitialized => Some("Run `deals init` to initialize this directory."),
            Self::ConfigParseError => Some("Fix syntax in .deals/config.toml and retry."),
            Self::UnknownTimezone => {
                Some("Use an IANA zone name such as `America/Sao_Paulo` in [calendar].timezone.")
            }
            Self::NoStages | Self::NoOpenStage => {
                Some("Add at least one normal stage with `deals stage add`.")
            }
            Self::DuplicateStage => Some("Pick a stage id that is not already in use."),
            Self::UnknownStage => Some("List valid stages with `deals stage list`."),
            Self::ReasonRequired => Some("Resubmit the move with `--reason <code>`."),
            Self::UnknownReason => Some("Use one of the reason codes from [reasons] in config."),
            Self::TerminalStageOnCreate => {
                Some("Create the opportunity in a normal stage, then move it.")
            }
            Self::InvalidField => None,
            Self::AmountOverflow => {
                Some("Lower the estimated amounts of this pipeline with `deals update <id> --amount`.")
            }
            Self::NotCompletable => Some("Only tasks and meetings carry a completion state."),
            Self::NotEditableToday => {
                Some("Completion can only change on the activity's due/end date.")
            }
            Self::SystemGenerated => Some("Stage changes are recorded by moves and cannot be edited."),
            Self::InvalidSchedule => Some("Meetings need a start, and the end must not precede it."),
            Self::NotFound => None,
            Self::ConcurrentModification => Some("Reload the record and retry the change."),
            Self::StorageFailure => Some("Check that .deals/deals.sqlite3 is writable."),
            Self::InternalUnexpected => Some("Retry once. If persistent, report a bug with logs."),
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Every failure the service layer can report.
///
/// Engine errors pass through unchanged; nothing here is retried.
#[derive(Debug, thiserror::Error)]
pub enum DealsError {
    #[error(transparent)]
    Calendar(#[from] CalendarError),

    #[error(transparent)]
    Catalog(#[from] CatalogError),

    #[error(transparent)]
    Opportunity(#[from] OpportunityError),

    #[error(transparent)]
    Transition(#[from] TransitionError),

    #[error(transparent)]
    Gate(#[from] GateError),

    #[error(transparent)]
    Activity(#[from] ActivityError),

    #[error(transparent)]
    Amount(#[from] AmountOverflow),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl DealsError {
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::Calendar(_) => ErrorCode::UnknownTimezone,
            Self::Catalog(e) => e.code(),
            Self::Opportunity(e) => e.code(),
            Self::Transition(e) => e.code(),
            Self::Gate(e) => e.code(),
            Self::Activity(e) => e.code(),
            Self::Amount(e) => e.code(),
            Self::Store(e) => e.code(),
        }
    }

    /// Stable `E####` string for this error.
    #[must_use]
    pub const fn error_code(&self) -> &'static str {
        self.code().code()
    }

    /// Remediation text, falling back to the code's summary.
    #[must_use]
    pub fn suggestion(&self) -> String {
        let code = self.code();
        code.hint().unwrap_or(code.message()).to_string()
    }
}
