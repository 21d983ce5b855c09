use chrono::{Datelike, Duration, NaiveDate};
use serde::Serialize;
use std::collections::BTreeMap;

use crate::clock::BusinessCalendar;
use crate::model::activity::Activity;

/// Identity of a timeline section.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "type", content = "date", rename_all = "lowercase")]
pub enum GroupKey {
    /// Tasks and meetings scheduled after the reference date.
    Upcoming,
    /// Everything created on this civil date.
    Day(NaiveDate),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TimelineGroup {
    pub key: GroupKey,
    pub label: String,
    pub activities: Vec<Activity>,
}

/// Scheduled for a civil date after `reference_date`.
fn is_upcoming(activity: &Activity, calendar: &BusinessCalendar, reference_date: NaiveDate) -> bool {
    activity
        .upcoming_instant()
        .is_some_and(|instant| calendar.civil_date(instant) > reference_date)
}

/// Split an opportunity's activities into "Upcoming" plus one group per day.
///
/// Upcoming entries are sorted by scheduled instant, then creation time.
/// Day groups run newest first and keep the input order inside each day.
#[must_use]
pub fn group_timeline(
    activities: &[Activity],
    calendar: &BusinessCalendar,
    reference_date: NaiveDate,
) -> Vec<TimelineGroup> {
    let mut upcoming: Vec<&Activity> = Vec::new();
    let mut by_day: BTreeMap<NaiveDate, Vec<Activity>> = BTreeMap::new();

    for activity in activities {
        if is_upcoming(activity, calendar, reference_date) {
            upcoming.push(activity);
        } else {
            by_day
                .entry(calendar.civil_date(activity.created_at))
                .or_default()
                .push(activity.clone());
        }
    }

    upcoming.sort_by(|a, b| {
        a.upcoming_instant()
            .cmp(&b.upcoming_instant())
            .then_with(|| a.created_at.cmp(&b.created_at))
    });

    let mut groups = Vec::with_capacity(by_day.len() + 1);
    if !upcoming.is_empty() {
        groups.push(TimelineGroup {
            key: GroupKey::Upcoming,
            label: "Upcoming".to_string(),
            activities: upcoming.into_iter().cloned().collect(),
        });
    }
    groups.extend(by_day.into_iter().rev().map(|(date, activities)| TimelineGroup {
        key: GroupKey::Day(date),
        label: day_label(date, reference_date),
        activities,
    }));
    groups
}

/// Human label for a day section relative to `reference_date`.
///
/// Weeks start on Sunday.
#[must_use]
pub fn day_label(date: NaiveDate, reference_date: NaiveDate) -> String {
    if date == reference_date {
        return "Today".to_string();
    }
    if Some(date) == reference_date.pred_opt() {
        return "Yesterday".to_string();
    }
    let days_into_week = i64::from(reference_date.weekday().num_days_from_sunday());
    let week_start = reference_date - Duration::days(days_into_week);
    if date >= week_start && date < reference_date {
        date.format("%A").to_string()
    } else {
        format!("{} {}, {}", date.format("%B"), date.day(), date.year())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::activity::tests::{instant, meeting, note, task};

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
    }

    fn ids(group: &TimelineGroup) -> Vec<&str> {
        group.activities.iter().map(|a| a.id.as_str()).collect()
    }

    #[test]
    fn labels_relative_to_a_wednesday() {
        // 2024-06-12 is a Wednesday; its week started Sunday 2024-06-09.
        let reference = day(2024, 6, 12);
        assert_eq!(day_label(day(2024, 6, 12), reference), "Today");
        assert_eq!(day_label(day(2024, 6, 11), reference), "Yesterday");
        assert_eq!(day_label(day(2024, 6, 10), reference), "Monday");
        assert_eq!(day_label(day(2024, 6, 9), reference), "Sunday");
        assert_eq!(day_label(day(2024, 6, 8), reference), "June 8, 2024");
        assert_eq!(day_label(day(2023, 12, 25), reference), "December 25, 2023");
    }

    #[test]
    fn yesterday_wins_across_a_week_boundary() {
        // Sunday reference: Saturday is yesterday, not a full date.
        assert_eq!(day_label(day(2024, 6, 8), day(2024, 6, 9)), "Yesterday");
        assert_eq!(day_label(day(2024, 6, 7), day(2024, 6, 9)), "June 7, 2024");
    }

    #[test]
    fn groups_upcoming_then_days_newest_first() {
        let cal = BusinessCalendar::default();
        let reference = day(2024, 6, 10);
        let activities = [
            note("n-old", instant(2024, 6, 3, 15)),
            task("t-later", Some(instant(2024, 6, 14, 15)), instant(2024, 6, 10, 13)),
            note("n-today-1", instant(2024, 6, 10, 14)),
            meeting("m-soon", instant(2024, 6, 12, 15), None, instant(2024, 6, 9, 15)),
            note("n-today-2", instant(2024, 6, 10, 12)),
            task("t-today", Some(instant(2024, 6, 10, 20)), instant(2024, 6, 9, 16)),
        ];

        let groups = group_timeline(&activities, &cal, reference);
        let keys: Vec<GroupKey> = groups.iter().map(|g| g.key).collect();
        assert_eq!(
            keys,
            [
                GroupKey::Upcoming,
                GroupKey::Day(day(2024, 6, 10)),
                GroupKey::Day(day(2024, 6, 9)),
                GroupKey::Day(day(2024, 6, 3)),
            ]
        );
        assert_eq!(ids(&groups[0]), ["m-soon", "t-later"]);
        assert_eq!(ids(&groups[1]), ["n-today-1", "n-today-2"]);
        assert_eq!(groups[1].label, "Today");
        assert_eq!(ids(&groups[2]), ["t-today"]);
        assert_eq!(groups[2].label, "Yesterday");
        assert_eq!(groups[3].label, "June 3, 2024");
    }

    #[test]
    fn upcoming_ties_break_on_creation() {
        let cal = BusinessCalendar::default();
        let due = instant(2024, 6, 20, 15);
        let activities = [
            task("b", Some(due), instant(2024, 6, 10, 14)),
            task("a", Some(due), instant(2024, 6, 10, 13)),
        ];
        let groups = group_timeline(&activities, &cal, day(2024, 6, 10));
        assert_eq!(groups.len(), 1);
        assert_eq!(ids(&groups[0]), ["a", "b"]);
    }

    #[test]
    fn stage_changes_and_past_tasks_land_on_their_creation_day() {
        let cal = BusinessCalendar::default();
        let activities = [
            Activity::stage_change("s1", "o1", "lead", "negotiation", "ana", instant(2024, 6, 9, 15)),
            task("overdue", Some(instant(2024, 6, 8, 15)), instant(2024, 6, 9, 17)),
        ];
        let groups = group_timeline(&activities, &cal, day(2024, 6, 10));
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].label, "Yesterday");
        assert_eq!(ids(&groups[0]), ["s1", "overdue"]);
    }

    #[test]
    fn creation_day_uses_the_fixed_zone() {
        // 02:00 UTC on June 10 was still June 9 in Sao Paulo.
        let cal = BusinessCalendar::default();
        let groups = group_timeline(&[note("n", instant(2024, 6, 10, 2))], &cal, day(2024, 6, 10));
        assert_eq!(groups[0].key, GroupKey::Day(day(2024, 6, 9)));
    }

    #[test]
    fn empty_input_yields_no_groups() {
        assert!(group_timeline(&[], &BusinessCalendar::default(), day(2024, 6, 10)).is_empty());
    }
}
