//! Locating a `.deals` project and building the per-invocation context.

use anyhow::Context;
use chrono::{DateTime, Utc};
use deals_core::config::{PROJECT_DIR, ProjectConfig, resolve_project_config};
use deals_core::db::{DB_FILE, Store, open_store};
use deals_core::model::reason::ReasonCatalog;
use deals_core::{Clock, ErrorCode, FixedClock, RequestContext, SystemClock};
use std::path::{Path, PathBuf};

use crate::output::{CliError, OutputMode, render_error};

/// Pins "now" for reproducible runs (RFC 3339).
pub const NOW_ENV: &str = "DEALS_NOW";

/// Pipeline used when `--pipeline` is not given.
pub const DEFAULT_PIPELINE: &str = "sales";

/// Everything one command invocation needs.
pub struct Project {
    pub config: ProjectConfig,
    pub store: Store,
    pub ctx: RequestContext,
}

impl Project {
    pub fn reasons(&self) -> ReasonCatalog {
        self.config.reason_catalog()
    }
}

/// Walk up from `start` to the nearest directory holding `.deals/`.
pub fn find_project_root(start: &Path) -> Option<PathBuf> {
    let mut current = start.to_path_buf();
    loop {
        if current.join(PROJECT_DIR).is_dir() {
            return Some(current);
        }
        if !current.pop() {
            return None;
        }
    }
}

#[must_use]
pub fn db_path(root: &Path) -> PathBuf {
    root.join(PROJECT_DIR).join(DB_FILE)
}

fn parse_now(value: Option<&str>) -> anyhow::Result<Option<DateTime<Utc>>> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(|v| {
            DateTime::parse_from_rfc3339(v)
                .map(|instant| instant.with_timezone(&Utc))
                .with_context(|| format!("{NOW_ENV} must be an RFC 3339 instant, got '{v}'"))
        })
        .transpose()
}

/// The clock for this invocation: pinned by `DEALS_NOW`, else the wall clock.
pub fn clock_from_env() -> anyhow::Result<Box<dyn Clock>> {
    let pinned = parse_now(std::env::var(NOW_ENV).ok().as_deref())?;
    Ok(match pinned {
        Some(instant) => Box::new(FixedClock(instant)),
        None => Box::new(SystemClock),
    })
}

fn fail(output: OutputMode, code: ErrorCode, message: String) -> anyhow::Error {
    let suggestion = code.hint().unwrap_or(code.message());
    render_error(output, &CliError::with_details(&message, suggestion, code.code())).ok();
    anyhow::anyhow!(message)
}

/// Open the project containing `start`, its store, config and request context.
///
/// Errors are rendered in `output` mode before being returned.
pub fn open_project(start: &Path, output: OutputMode) -> anyhow::Result<Project> {
    let root = find_project_root(start).ok_or_else(|| {
        fail(
            output,
            ErrorCode::NotInitialized,
            format!("Not a deals project: {PROJECT_DIR} directory not found"),
        )
    })?;

    let config = resolve_project_config(&root)
        .map_err(|e| fail(output, ErrorCode::ConfigParseError, format!("{e:#}")))?;
    let calendar = config
        .calendar()
        .map_err(|e| fail(output, ErrorCode::UnknownTimezone, e.to_string()))?;
    let clock = clock_from_env()
        .map_err(|e| fail(output, ErrorCode::InvalidField, format!("{e:#}")))?;
    let store = open_store(&db_path(&root))
        .map_err(|e| fail(output, ErrorCode::StorageFailure, format!("{e:#}")))?;

    let ctx = calendar.context(clock.as_ref());
    tracing::debug!(root = %root.display(), today = %ctx.today, "project opened");
    Ok(Project {
        config,
        store,
        ctx,
    })
}
