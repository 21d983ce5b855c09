pub mod activity;
pub mod archive;
pub mod board;
pub mod create;
pub mod forecast;
pub mod init;
pub mod move_cmd;
pub mod show;
pub mod stage;
pub mod timeline;
pub mod update;

use anyhow::Context;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use deals_core::{BusinessCalendar, DealsError, ErrorCode};

use crate::actor;
use crate::output::{CliError, OutputMode, render_error};

/// Render a domain error and hand back the matching `anyhow` error.
pub fn report(output: OutputMode, err: &DealsError) -> anyhow::Error {
    render_error(output, &CliError::from(err)).ok();
    anyhow::anyhow!("{err}")
}

fn invalid_field(message: &str) -> CliError {
    let code = ErrorCode::InvalidField;
    CliError::with_details(
        message,
        code.hint().unwrap_or("See `deals <command> --help`."),
        code.code(),
    )
}

/// Render a usage problem that has no domain error behind it.
pub fn report_invalid(output: OutputMode, message: impl Into<String>) -> anyhow::Error {
    let message = message.into();
    render_error(output, &invalid_field(&message)).ok();
    anyhow::anyhow!(message)
}

pub fn require_actor(flag: Option<&str>, output: OutputMode) -> anyhow::Result<String> {
    actor::require_actor(flag).map_err(|e| {
        render_error(
            output,
            &CliError::with_details(&e.message, "Pass --actor or set DEALS_ACTOR.", e.code),
        )
        .ok();
        anyhow::anyhow!(e.message)
    })
}

/// `none` (any case) means "clear this field".
pub fn clearable(value: Option<&str>) -> Option<Option<String>> {
    value.map(|v| {
        let v = v.trim();
        if v.is_empty() || v.eq_ignore_ascii_case("none") {
            None
        } else {
            Some(v.to_string())
        }
    })
}

/// Parse an instant given on the command line.
///
/// Accepts RFC 3339, or a civil `YYYY-MM-DD HH:MM` / `YYYY-MM-DDTHH:MM` read
/// in the business timezone. A bare date means noon of that day.
pub fn parse_when(value: &str, calendar: &BusinessCalendar) -> anyhow::Result<DateTime<Utc>> {
    let value = value.trim();
    if let Ok(instant) = DateTime::parse_from_rfc3339(value) {
        return Ok(instant.with_timezone(&Utc));
    }

    let civil = ["%Y-%m-%d %H:%M", "%Y-%m-%dT%H:%M"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(value, fmt).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(value, "%Y-%m-%d")
                .ok()
                .and_then(|date| date.and_hms_opt(12, 0, 0))
        })
        .with_context(|| format!("cannot read '{value}' as a date or time"))?;

    civil
        .and_local_timezone(calendar.timezone())
        .earliest()
        .map(|local| local.with_timezone(&Utc))
        .with_context(|| format!("'{value}' does not exist in {}", calendar.timezone()))
}

/// Like [`parse_when`], but `none` clears the field.
pub fn parse_clearable_when(
    value: Option<&str>,
    calendar: &BusinessCalendar,
) -> anyhow::Result<Option<Option<DateTime<Utc>>>> {
    match clearable(value) {
        None => Ok(None),
        Some(None) => Ok(Some(None)),
        Some(Some(v)) => parse_when(&v, calendar).map(|instant| Some(Some(instant))),
    }
}
