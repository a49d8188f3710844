//! Cron due-time computation for the collector runtime.

use std::str::FromStr;

use chrono::{DateTime, Duration, Utc};
use cron::Schedule;

use tl_domain::error::{Error, Result};

/// Parse a cron expression, surfacing a validation error on bad input.
///
/// # Errors
///
/// Returns `Validation` when the expression does not parse.
pub fn parse_schedule(expression: &str) -> Result<Schedule> {
    Schedule::from_str(expression)
        .map_err(|e| Error::validation(format!("invalid cron expression '{expression}': {e}")))
}

/// Whether a plugin is due at `now`, given its last run.
///
/// A plugin that never ran is due as soon as the schedule has fired at least
/// once in the preceding hour, so fresh deployments do not wait a full period.
#[must_use]
pub fn is_due(schedule: &Schedule, last_run: Option<DateTime<Utc>>, now: DateTime<Utc>) -> bool {
    let anchor = last_run.unwrap_or(now - Duration::hours(1));
    schedule.after(&anchor).next().is_some_and(|next| next <= now)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_quarter_hour_is_due_after_a_gap() {
        let schedule = parse_schedule("0 */15 * * * *").ok();
        let schedule = schedule.as_ref().map_or_else(|| panic!("parse"), |s| s);
        let now = Utc::now();
        assert!(is_due(schedule, Some(now - Duration::minutes(20)), now));
        assert!(!is_due(schedule, Some(now), now));
    }

    #[test]
    fn never_ran_plugins_are_due() {
        let schedule = parse_schedule("0 */5 * * * *").ok();
        let schedule = schedule.as_ref().map_or_else(|| panic!("parse"), |s| s);
        assert!(is_due(schedule, None, Utc::now()));
    }

    #[test]
    fn bad_expressions_are_validation_errors() {
        let err = parse_schedule("not a cron");
        assert!(matches!(err, Err(Error::Validation { .. })));
    }
}
