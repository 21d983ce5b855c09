//! Activity timeline: grouping by civil day and the completion gate.

pub mod gate;
pub mod group;

use serde::Serialize;

use crate::clock::RequestContext;
use crate::model::activity::Activity;

pub use gate::{
    GateError, GateState, can_toggle_completion, ensure_reschedulable, gate_state, is_overdue,
    set_completion, toggle_completion,
};
pub use group::{GroupKey, TimelineGroup, day_label, group_timeline};

/// One activity with its gate flags for the request's reference date.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TimelineEntry {
    #[serde(flatten)]
    pub activity: Activity,
    pub overdue: bool,
    pub can_toggle: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gate: Option<GateState>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TimelineSection {
    pub key: GroupKey,
    pub label: String,
    pub entries: Vec<TimelineEntry>,
}

/// Group `activities` and annotate each entry against `ctx.today`.
#[must_use]
pub fn annotated_timeline(activities: &[Activity], ctx: &RequestContext) -> Vec<TimelineSection> {
    group_timeline(activities, &ctx.calendar, ctx.today)
        .into_iter()
        .map(|group| TimelineSection {
            key: group.key,
            label: group.label,
            entries: group
                .activities
                .into_iter()
                .map(|activity| TimelineEntry {
                    overdue: is_overdue(&activity, &ctx.calendar, ctx.today),
                    can_toggle: can_toggle_completion(&activity, &ctx.calendar, ctx.today),
                    gate: gate_state(&activity, &ctx.calendar, ctx.today),
                    activity,
                })
                .collect(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::BusinessCalendar;
    use crate::model::activity::tests::{instant, note, task};

    #[test]
    fn entries_carry_gate_flags() {
        let ctx = RequestContext::at(BusinessCalendar::default(), instant(2024, 6, 10, 15));
        let activities = [
            task("late", Some(instant(2024, 6, 9, 15)), instant(2024, 6, 10, 13)),
            task("due", Some(instant(2024, 6, 10, 18)), instant(2024, 6, 10, 12)),
            note("n", instant(2024, 6, 10, 14)),
        ];
        let sections = annotated_timeline(&activities, &ctx);
        assert_eq!(sections.len(), 1);
        let flags: Vec<(&str, bool, bool)> = sections[0]
            .entries
            .iter()
            .map(|e| (e.activity.id.as_str(), e.overdue, e.can_toggle))
            .collect();
        assert_eq!(flags, [("late", true, false), ("due", false, true), ("n", false, false)]);
        assert_eq!(sections[0].entries[0].gate, Some(GateState::Locked));
        assert_eq!(sections[0].entries[2].gate, None);
    }
}
