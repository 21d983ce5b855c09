use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

use super::ParseEnumError;
use crate::error::ErrorCode;

/// Kinds of timeline entries attached to an opportunity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityKind {
    Note,
    Call,
    Email,
    #[serde(rename = "whatsapp")]
    WhatsApp,
    Meeting,
    Task,
    Reminder,
    StageChange,
}

impl ActivityKind {
    pub const ALL: [Self; 8] = [
        Self::Note,
        Self::Call,
        Self::Email,
        Self::WhatsApp,
        Self::Meeting,
        Self::Task,
        Self::Reminder,
        Self::StageChange,
    ];

    const fn as_str(self) -> &'static str {
        match self {
            Self::Note => "note",
            Self::Call => "call",
            Self::Email => "email",
            Self::WhatsApp => "whatsapp",
            Self::Meeting => "meeting",
            Self::Task => "task",
            Self::Reminder => "reminder",
            Self::StageChange => "stage_change",
        }
    }

    /// Only tasks and meetings carry a completion flag.
    #[must_use]
    pub const fn is_completable(self) -> bool {
        matches!(self, Self::Task | Self::Meeting)
    }

    /// Recorded by the engine, never by callers.
    #[must_use]
    pub const fn is_system(self) -> bool {
        matches!(self, Self::StageChange)
    }
}

impl fmt::Display for ActivityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ActivityKind {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match super::normalize(s).replace('-', "_").as_str() {
            "note" => Ok(Self::Note),
            "call" => Ok(Self::Call),
            "email" => Ok(Self::Email),
            "whatsapp" | "whats_app" => Ok(Self::WhatsApp),
            "meeting" => Ok(Self::Meeting),
            "task" => Ok(Self::Task),
            "reminder" => Ok(Self::Reminder),
            "stage_change" => Ok(Self::StageChange),
            _ => Err(ParseEnumError {
                expected: "activity kind",
                got: s.to_string(),
            }),
        }
    }
}

/// Payload of a system-generated stage change entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageChange {
    pub from_stage_id: String,
    pub to_stage_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ActivityError {
    #[error("activity '{activity_id}' is system-generated and read-only")]
    SystemGenerated { activity_id: String },

    #[error("{kind} requires a start time")]
    MissingSchedule { kind: ActivityKind },

    #[error("end {end_at} precedes start {start_at}")]
    InvalidSchedule {
        start_at: DateTime<Utc>,
        end_at: DateTime<Utc>,
    },
}

impl ActivityError {
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::SystemGenerated { .. } => ErrorCode::SystemGenerated,
            Self::MissingSchedule { .. } | Self::InvalidSchedule { .. } => {
                ErrorCode::InvalidSchedule
            }
        }
    }
}

/// A dated or undated interaction attached to one opportunity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Activity {
    pub id: String,
    pub opportunity_id: String,
    pub kind: ActivityKind,
    #[serde(default)]
    pub content: Option<String>,
    pub created_at: DateTime<Utc>,
    pub created_by: String,
    #[serde(default)]
    pub start_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub end_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub due_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub location: Option<String>,
    pub completed: bool,
    #[serde(default)]
    pub completed_by: Option<String>,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub assigned_to: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stage_change: Option<StageChange>,
    pub updated_at: DateTime<Utc>,
}

/// Caller input for [`Activity::create`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActivityDraft {
    pub id: String,
    pub opportunity_id: String,
    pub kind: ActivityKind,
    pub content: Option<String>,
    pub start_at: Option<DateTime<Utc>>,
    pub end_at: Option<DateTime<Utc>>,
    pub due_at: Option<DateTime<Utc>>,
    pub location: Option<String>,
    pub assigned_to: Option<String>,
}

impl ActivityDraft {
    #[must_use]
    pub fn new(id: impl Into<String>, opportunity_id: impl Into<String>, kind: ActivityKind) -> Self {
        Self {
            id: id.into(),
            opportunity_id: opportunity_id.into(),
            kind,
            content: None,
            start_at: None,
            end_at: None,
            due_at: None,
            location: None,
            assigned_to: None,
        }
    }
}

/// Plain field edits. Completion is not patchable; see `timeline::gate`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ActivityPatch {
    pub content: Option<Option<String>>,
    pub start_at: Option<Option<DateTime<Utc>>>,
    pub end_at: Option<Option<DateTime<Utc>>>,
    pub due_at: Option<Option<DateTime<Utc>>>,
    pub location: Option<Option<String>>,
    pub assigned_to: Option<Option<String>>,
}

impl ActivityPatch {
    /// Whether the patch moves `start_at`, `end_at` or `due_at`.
    #[must_use]
    pub const fn touches_schedule(&self) -> bool {
        self.start_at.is_some() || self.end_at.is_some() || self.due_at.is_some()
    }
}

impl Activity {
    /// Record a caller-created activity.
    ///
    /// # Errors
    ///
    /// `StageChange` cannot be created this way; meetings need a start and
    /// an end that does not precede it.
    pub fn create(
        draft: ActivityDraft,
        actor: &str,
        now: DateTime<Utc>,
    ) -> Result<Self, ActivityError> {
        if draft.kind.is_system() {
            return Err(ActivityError::SystemGenerated {
                activity_id: draft.id,
            });
        }

        let activity = Self {
            id: draft.id,
            opportunity_id: draft.opportunity_id,
            kind: draft.kind,
            content: non_blank(draft.content),
            created_at: now,
            created_by: actor.to_string(),
            start_at: draft.start_at,
            end_at: draft.end_at,
            due_at: draft.due_at,
            location: non_blank(draft.location),
            completed: false,
            completed_by: None,
            completed_at: None,
            assigned_to: non_blank(draft.assigned_to),
            stage_change: None,
            updated_at: now,
        };
        activity.validate_schedule()?;
        Ok(activity)
    }

    /// System entry recording a move between stages.
    #[must_use]
    pub fn stage_change(
        id: impl Into<String>,
        opportunity_id: impl Into<String>,
        from_stage_id: impl Into<String>,
        to_stage_id: impl Into<String>,
        actor: &str,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: id.into(),
            opportunity_id: opportunity_id.into(),
            kind: ActivityKind::StageChange,
            content: None,
            created_at: now,
            created_by: actor.to_string(),
            start_at: None,
            end_at: None,
            due_at: None,
            location: None,
            completed: false,
            completed_by: None,
            completed_at: None,
            assigned_to: None,
            stage_change: Some(StageChange {
                from_stage_id: from_stage_id.into(),
                to_stage_id: to_stage_id.into(),
            }),
            updated_at: now,
        }
    }

    /// Instant the completion gate compares against "today".
    ///
    /// Tasks use the due time; meetings use the end, or the start when no
    /// end was recorded.
    #[must_use]
    pub fn relevant_instant(&self) -> Option<DateTime<Utc>> {
        match self.kind {
            ActivityKind::Task => self.due_at,
            ActivityKind::Meeting => self.end_at.or(self.start_at),
            _ => None,
        }
    }

    /// Instant used to decide and order the "Upcoming" bucket.
    #[must_use]
    pub fn upcoming_instant(&self) -> Option<DateTime<Utc>> {
        match self.kind {
            ActivityKind::Task => self.due_at,
            ActivityKind::Meeting => self.start_at,
            _ => None,
        }
    }

    /// Return a copy with `patch` applied.
    ///
    /// # Errors
    ///
    /// Stage changes are read-only; the patched schedule must still be valid.
    pub fn apply_patch(&self, patch: &ActivityPatch, now: DateTime<Utc>) -> Result<Self, ActivityError> {
        self.ensure_editable()?;

        let mut next = self.clone();
        if let Some(content) = &patch.content {
            next.content = non_blank(content.clone());
        }
        if let Some(start_at) = patch.start_at {
            next.start_at = start_at;
        }
        if let Some(end_at) = patch.end_at {
            next.end_at = end_at;
        }
        if let Some(due_at) = patch.due_at {
            next.due_at = due_at;
        }
        if let Some(location) = &patch.location {
            next.location = non_blank(location.clone());
        }
        if let Some(assigned_to) = &patch.assigned_to {
            next.assigned_to = non_blank(assigned_to.clone());
        }
        next.validate_schedule()?;
        next.touch(now);
        Ok(next)
    }

    /// Reject edits and deletion of system entries.
    ///
    /// # Errors
    ///
    /// [`ActivityError::SystemGenerated`] for stage changes.
    pub fn ensure_editable(&self) -> Result<(), ActivityError> {
        if self.kind.is_system() {
            return Err(ActivityError::SystemGenerated {
                activity_id: self.id.clone(),
            });
        }
        Ok(())
    }

    /// Advance `updated_at` strictly; see `Opportunity::touch`.
    pub fn touch(&mut self, now: DateTime<Utc>) {
        self.updated_at = if now > self.updated_at {
            now
        } else {
            self.updated_at + Duration::microseconds(1)
        };
    }

    fn validate_schedule(&self) -> Result<(), ActivityError> {
        if self.kind == ActivityKind::Meeting && self.start_at.is_none() {
            return Err(ActivityError::MissingSchedule { kind: self.kind });
        }
        if let (Some(start_at), Some(end_at)) = (self.start_at, self.end_at) {
            if end_at < start_at {
                return Err(ActivityError::InvalidSchedule { start_at, end_at });
            }
        }
        Ok(())
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use chrono::TimeZone;

    pub(crate) fn instant(y: i32, m: u32, d: u32, h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, 0, 0)
            .single()
            .expect("valid instant")
    }

    pub(crate) fn task(id: &str, due_at: Option<DateTime<Utc>>, created_at: DateTime<Utc>) -> Activity {
        let mut draft = ActivityDraft::new(id, "o1", ActivityKind::Task);
        draft.due_at = due_at;
        Activity::create(draft, "ana", created_at).expect("valid task")
    }

    pub(crate) fn meeting(
        id: &str,
        start_at: DateTime<Utc>,
        end_at: Option<DateTime<Utc>>,
        created_at: DateTime<Utc>,
    ) -> Activity {
        let mut draft = ActivityDraft::new(id, "o1", ActivityKind::Meeting);
        draft.start_at = Some(start_at);
        draft.end_at = end_at;
        Activity::create(draft, "ana", created_at).expect("valid meeting")
    }

    pub(crate) fn note(id: &str, created_at: DateTime<Utc>) -> Activity {
        let mut draft = ActivityDraft::new(id, "o1", ActivityKind::Note);
        draft.content = Some(format!("note {id}"));
        Activity::create(draft, "ana", created_at).expect("valid note")
    }

    #[test]
    fn kind_parse_and_display_roundtrip() {
        for kind in ActivityKind::ALL {
            assert_eq!(kind.to_string().parse::<ActivityKind>().expect("parse"), kind);
        }
        assert_eq!("WhatsApp".parse::<ActivityKind>().expect("parse"), ActivityKind::WhatsApp);
        assert_eq!(
            "stage-change".parse::<ActivityKind>().expect("parse"),
            ActivityKind::StageChange
        );
        assert!("fax".parse::<ActivityKind>().is_err());
    }

    #[test]
    fn kind_serializes_snake_case() {
        assert_eq!(
            serde_json::to_string(&ActivityKind::StageChange).expect("serialize"),
            "\"stage_change\""
        );
        assert_eq!(
            serde_json::to_string(&ActivityKind::WhatsApp).expect("serialize"),
            "\"whatsapp\""
        );
    }

    #[test]
    fn only_tasks_and_meetings_are_completable() {
        let completable: Vec<ActivityKind> = ActivityKind::ALL
            .into_iter()
            .filter(|kind| kind.is_completable())
            .collect();
        assert_eq!(completable, [ActivityKind::Meeting, ActivityKind::Task]);
    }

    #[test]
    fn callers_cannot_create_stage_changes() {
        let draft = ActivityDraft::new("a1", "o1", ActivityKind::StageChange);
        assert_eq!(
            Activity::create(draft, "ana", instant(2024, 6, 10, 12)).expect_err("system kind").code(),
            ErrorCode::SystemGenerated
        );
    }

    #[test]
    fn meetings_need_a_valid_schedule() {
        let now = instant(2024, 6, 10, 12);
        let draft = ActivityDraft::new("m1", "o1", ActivityKind::Meeting);
        assert!(matches!(
            Activity::create(draft, "ana", now),
            Err(ActivityError::MissingSchedule { .. })
        ));

        let mut backwards = ActivityDraft::new("m2", "o1", ActivityKind::Meeting);
        backwards.start_at = Some(instant(2024, 6, 11, 15));
        backwards.end_at = Some(instant(2024, 6, 11, 14));
        assert!(matches!(
            Activity::create(backwards, "ana", now),
            Err(ActivityError::InvalidSchedule { .. })
        ));
    }

    #[test]
    fn relevant_instant_per_kind() {
        let created = instant(2024, 6, 1, 12);
        let due = instant(2024, 6, 10, 18);
        assert_eq!(task("t", Some(due), created).relevant_instant(), Some(due));

        let start = instant(2024, 6, 12, 13);
        let end = instant(2024, 6, 12, 14);
        let with_end = meeting("m", start, Some(end), created);
        assert_eq!(with_end.relevant_instant(), Some(end));
        assert_eq!(with_end.upcoming_instant(), Some(start));
        assert_eq!(meeting("m2", start, None, created).relevant_instant(), Some(start));
        assert_eq!(note("n", created).relevant_instant(), None);
    }

    #[test]
    fn patch_edits_fields_and_rejects_stage_changes() {
        let created = instant(2024, 6, 1, 12);
        let original = task("t1", None, created);
        let patch = ActivityPatch {
            content: Some(Some("call back".into())),
            due_at: Some(Some(instant(2024, 6, 5, 12))),
            ..ActivityPatch::default()
        };
        let patched = original
            .apply_patch(&patch, instant(2024, 6, 2, 12))
            .expect("patched");
        assert_eq!(patched.content.as_deref(), Some("call back"));
        assert_eq!(patched.due_at, Some(instant(2024, 6, 5, 12)));
        assert!(original.due_at.is_none());

        let change = Activity::stage_change("s1", "o1", "lead", "won", "ana", created);
        assert!(matches!(
            change.apply_patch(&patch, created),
            Err(ActivityError::SystemGenerated { .. })
        ));
        assert!(change.ensure_editable().is_err());
    }
}
