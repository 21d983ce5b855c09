//! Business calendar: "today" and day boundaries in one fixed civil timezone.
//!
//! Every branch of a deployment must agree on which calendar day it is, so
//! civil dates are always resolved in the configured zone and never in the
//! process-local one. A [`RequestContext`] captures `now` and `today` once per
//! logical request; every operation of that request reads them from the
//! context instead of asking the clock again.

use chrono::{DateTime, NaiveDate, Utc};
use chrono_tz::Tz;
use serde::Serialize;

/// Zone used when the project config does not name one.
pub const DEFAULT_TIMEZONE: &str = "America/Sao_Paulo";

/// Source of the current instant.
pub trait Clock {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Clock pinned to one instant (tests, `DEALS_NOW`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedClock(pub DateTime<Utc>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}

/// Error returned for an unknown IANA zone name.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown timezone '{name}'")]
pub struct CalendarError {
    pub name: String,
}

/// Resolves civil dates in a fixed timezone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BusinessCalendar {
    tz: Tz,
}

impl Default for BusinessCalendar {
    fn default() -> Self {
        Self {
            tz: chrono_tz::America::Sao_Paulo,
        }
    }
}

impl BusinessCalendar {
    #[must_use]
    pub const fn new(tz: Tz) -> Self {
        Self { tz }
    }

    /// Build a calendar from an IANA zone name such as `Europe/Lisbon`.
    ///
    /// # Errors
    ///
    /// Returns [`CalendarError`] if the name is not a known zone.
    pub fn parse(name: &str) -> Result<Self, CalendarError> {
        name.trim()
            .parse::<Tz>()
            .map(Self::new)
            .map_err(|_| CalendarError {
                name: name.to_string(),
            })
    }

    #[must_use]
    pub const fn timezone(&self) -> Tz {
        self.tz
    }

    /// Calendar date of `instant` in the fixed zone.
    #[must_use]
    pub fn civil_date(&self, instant: DateTime<Utc>) -> NaiveDate {
        instant.with_timezone(&self.tz).date_naive()
    }

    #[must_use]
    pub fn today(&self, clock: &dyn Clock) -> NaiveDate {
        self.civil_date(clock.now())
    }

    /// Read the clock once and freeze the result for a request.
    #[must_use]
    pub fn context(&self, clock: &dyn Clock) -> RequestContext {
        let now = clock.now();
        RequestContext {
            now,
            today: self.civil_date(now),
            calendar: *self,
        }
    }
}

/// The instant and civil date a single request operates under.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestContext {
    pub now: DateTime<Utc>,
    pub today: NaiveDate,
    pub calendar: BusinessCalendar,
}

impl RequestContext {
    /// Context for an explicit instant, mostly for tests.
    #[must_use]
    pub fn at(calendar: BusinessCalendar, now: DateTime<Utc>) -> Self {
        calendar.context(&FixedClock(now))
    }
}

/// Serializable view of a request's temporal frame.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReferenceFrame {
    pub timezone: String,
    pub today: NaiveDate,
}

impl From<&RequestContext> for ReferenceFrame {
    fn from(ctx: &RequestContext) -> Self {
        Self {
            timezone: ctx.calendar.timezone().name().to_string(),
            today: ctx.today,
        }
    }
}
