//! `deals timeline`: activity history grouped by civil day.

use clap::Args;
use deals_core::BusinessCalendar;
use deals_core::model::activity::Activity;
use deals_core::service;
use deals_core::timeline::{GateState, TimelineEntry};
use std::io::{self, Write};
use std::path::Path;

use super::report;
use crate::output::{OutputMode, pretty_rule, render_mode};
use crate::project::open_project;

#[derive(Args, Debug)]
pub struct TimelineArgs {
    /// Opportunity ID.
    pub id: String,
}

const fn gate_label(gate: GateState) -> &'static str {
    match gate {
        GateState::Pending => "pending",
        GateState::Actionable => "due today",
        GateState::Locked => "locked",
        GateState::Completed => "done",
    }
}

/// `HH:MM` of the activity's relevant instant in the business zone.
fn local_time(activity: &Activity, calendar: &BusinessCalendar) -> String {
    activity
        .relevant_instant()
        .map(|instant| {
            instant
                .with_timezone(&calendar.timezone())
                .format("%H:%M")
                .to_string()
        })
        .unwrap_or_default()
}

fn summary(activity: &Activity) -> String {
    if let Some(change) = &activity.stage_change {
        return format!("{} -> {}", change.from_stage_id, change.to_stage_id);
    }
    activity.content.clone().unwrap_or_default()
}

fn entry_text(entry: &TimelineEntry, calendar: &BusinessCalendar, w: &mut dyn Write) -> io::Result<()> {
    let a = &entry.activity;
    writeln!(
        w,
        "{}\t{}\t{}\t{}\t{}",
        a.id,
        a.kind,
        local_time(a, calendar),
        entry.gate.map_or("-", gate_label),
        summary(a)
    )
}

fn entry_pretty(entry: &TimelineEntry, calendar: &BusinessCalendar, w: &mut dyn Write) -> io::Result<()> {
    let a = &entry.activity;
    let marker = match entry.gate {
        Some(GateState::Completed) => "[x]",
        Some(_) => "[ ]",
        None => "   ",
    };
    let mut flags = Vec::new();
    if entry.overdue {
        flags.push("overdue");
    }
    if entry.can_toggle {
        flags.push("toggleable");
    }
    let flags = if flags.is_empty() {
        String::new()
    } else {
        format!("  ({})", flags.join(", "))
    };
    writeln!(
        w,
        "  {marker} {:>5}  {:<12} {}{flags}",
        local_time(a, calendar),
        a.kind.to_string(),
        summary(a)
    )?;
    writeln!(w, "        {}  by {}", a.id, a.created_by)
}

pub fn run_timeline(args: &TimelineArgs, output: OutputMode, project_root: &Path) -> anyhow::Result<()> {
    let project = open_project(project_root, output)?;
    let calendar = &project.ctx.calendar;
    let timeline =
        service::timeline(&project.store, &args.id, &project.ctx).map_err(|e| report(output, &e))?;

    render_mode(
        output,
        &timeline,
        |t, w| {
            for group in &t.groups {
                writeln!(w, "# {}", group.label)?;
                for entry in &group.entries {
                    entry_text(entry, calendar, w)?;
                }
            }
            Ok(())
        },
        |t, w| {
            writeln!(
                w,
                "Timeline: {}  (today {} {})",
                t.opportunity_id, t.reference.today, t.reference.timezone
            )?;
            if t.groups.is_empty() {
                pretty_rule(w)?;
                writeln!(w, "  no activity yet")?;
            }
            for group in &t.groups {
                pretty_rule(w)?;
                writeln!(w, "{}", group.label)?;
                for entry in &group.entries {
                    entry_pretty(entry, calendar, w)?;
                }
            }
            pretty_rule(w)
        },
    )
}
