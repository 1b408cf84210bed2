//! Error policy, iteration plan and timing modifiers of an action.

use chrono::{NaiveTime, Timelike};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use crate::control::ActionDescriptor;
use crate::error::{CommandError, ErrorKind, UnknownErrorKind};
use crate::result::Disposition;

/// Error-kind identifier as written in `repeatUntilException` and
/// `ignoreException` modifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Matches every error (`Any`, `Error`, `Exception`).
    Any,
    /// Matches a single kind.
    Kind(ErrorKind),
}

impl ErrorClass {
    pub fn matches(&self, kind: ErrorKind) -> bool {
        match self {
            ErrorClass::Any => true,
            ErrorClass::Kind(k) => *k == kind,
        }
    }
}

impl FromStr for ErrorClass {
    type Err = UnknownErrorKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "any" | "error" | "exception" => Ok(ErrorClass::Any),
            _ => s.parse().map(ErrorClass::Kind),
        }
    }
}

impl fmt::Display for ErrorClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorClass::Any => f.write_str("Any"),
            ErrorClass::Kind(kind) => write!(f, "{}", kind),
        }
    }
}

/// Error handling configured on one action.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ErrorPolicy {
    pub repeat_until: Option<ErrorClass>,
    pub ignore: Option<ErrorClass>,
}

impl ErrorPolicy {
    /// Resolve the policy of a descriptor.
    ///
    /// Blank identifiers mean "none". An unknown identifier is a
    /// configuration error; the returned message names the modifier.
    pub fn resolve(descriptor: &ActionDescriptor) -> Result<Self, String> {
        let parse = |value: &Option<String>, what: &str| -> Result<Option<ErrorClass>, String> {
            match value.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
                None => Ok(None),
                Some(id) => id.parse::<ErrorClass>().map(Some).map_err(|_| {
                    format!(
                        "{} class not found in action '{}': {}",
                        what, descriptor.name, id
                    )
                }),
            }
        };

        Ok(Self {
            repeat_until: parse(&descriptor.repeat_until_exception, "Repeat-until exception")?,
            ignore: parse(&descriptor.ignore_exception, "Ignore exception")?,
        })
    }

    /// True when errors from nested actions must reach this action's loop.
    pub fn catches(&self) -> bool {
        self.repeat_until.is_some() || self.ignore.is_some()
    }

    /// Classify an error raised by one iteration.
    ///
    /// `repeatUntilException` is checked first, then `ignoreException`,
    /// then the caller's request for propagation.
    pub fn classify(&self, err: CommandError, throw: bool) -> Disposition {
        let kind = err.kind();
        if self.repeat_until.is_some_and(|c| c.matches(kind)) {
            Disposition::Terminate(kind)
        } else if self.ignore.is_some_and(|c| c.matches(kind)) {
            Disposition::Ignore(kind)
        } else if throw {
            Disposition::Propagate(err)
        } else {
            Disposition::Report(err)
        }
    }
}

/// How many times an action body runs and what the loop variable holds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IterationPlan {
    /// No loop modifier: one run, no loop variable.
    Once,
    /// `repeat`: the loop variable counts from 1.
    Repeat(usize),
    /// `foreach`: one run per value.
    Foreach(Vec<String>),
    /// `repeatUntilException` alone: run until the error fires.
    Unbounded,
}

/// A resolved plan plus a warning to surface, if any.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedPlan {
    pub plan: IterationPlan,
    pub warning: Option<String>,
}

impl IterationPlan {
    /// Resolve the iteration plan of a descriptor.
    ///
    /// `foreach` wins over `repeat` (with a warning). A `repeat` that is not
    /// a non-negative integer is a configuration error.
    pub fn resolve(descriptor: &ActionDescriptor, policy: &ErrorPolicy) -> Result<ResolvedPlan, String> {
        if let Some(foreach) = &descriptor.foreach {
            let values = foreach.split_whitespace().map(str::to_string).collect();
            let warning = descriptor.repeat.as_ref().map(|_| {
                format!(
                    "WARNING: repeat is ignored when foreach is specified in action '{}'",
                    descriptor.name
                )
            });
            return Ok(ResolvedPlan {
                plan: IterationPlan::Foreach(values),
                warning,
            });
        }

        if let Some(repeat) = &descriptor.repeat {
            let count = repeat.trim().parse::<usize>().map_err(|_| {
                format!(
                    "Number of repeats specified in action '{}' is not a number: {}",
                    descriptor.name, repeat
                )
            })?;
            return Ok(ResolvedPlan {
                plan: IterationPlan::Repeat(count),
                warning: None,
            });
        }

        let plan = if policy.repeat_until.is_some() {
            IterationPlan::Unbounded
        } else {
            IterationPlan::Once
        };
        Ok(ResolvedPlan { plan, warning: None })
    }

    /// Number of iterations, `None` for unbounded.
    pub fn count(&self) -> Option<usize> {
        match self {
            IterationPlan::Once => Some(1),
            IterationPlan::Repeat(n) => Some(*n),
            IterationPlan::Foreach(values) => Some(values.len()),
            IterationPlan::Unbounded => None,
        }
    }

    /// True when a loop variable is bound during iteration.
    pub fn binds_loop_variable(&self) -> bool {
        !matches!(self, IterationPlan::Once)
    }

    /// Loop variable value of the zero-based `iteration`.
    pub fn value(&self, iteration: usize) -> String {
        match self {
            IterationPlan::Foreach(values) => values[iteration].clone(),
            _ => (iteration + 1).to_string(),
        }
    }

    /// True when `iteration` (zero-based) is within the plan.
    pub fn has_iteration(&self, iteration: usize) -> bool {
        self.count().map_or(true, |n| iteration < n)
    }
}

/// Everything about an invocation that is resolved before its first
/// iteration. Resolution fails with a diagnostic on configuration errors.
#[derive(Debug, Clone, PartialEq)]
pub struct ActionPlan {
    pub policy: ErrorPolicy,
    pub iterations: IterationPlan,
    pub postpone_until: Option<NaiveTime>,
    pub repeat_every: Option<Duration>,
    pub warning: Option<String>,
}

impl ActionPlan {
    pub fn resolve(descriptor: &ActionDescriptor) -> Result<Self, String> {
        let policy = ErrorPolicy::resolve(descriptor)?;
        let ResolvedPlan { plan, warning } = IterationPlan::resolve(descriptor, &policy)?;

        let non_empty = |value: &Option<String>| {
            value
                .as_deref()
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
        };

        let postpone_until = match non_empty(&descriptor.postpone_until) {
            None => None,
            Some(text) => Some(parse_time_of_day(&text).ok_or_else(|| {
                format!(
                    "Cannot parse postponeUntil time '{}' in action '{}'",
                    text, descriptor.name
                )
            })?),
        };

        let repeat_every = match non_empty(&descriptor.repeat_every) {
            None => None,
            Some(text) => Some(parse_interval(&text).ok_or_else(|| {
                format!(
                    "Cannot parse repeatEvery interval '{}' in action '{}'",
                    text, descriptor.name
                )
            })?),
        };

        Ok(Self {
            policy,
            iterations: plan,
            postpone_until,
            repeat_every,
            warning,
        })
    }
}

/// Parse an `HH:MM[:SS]` time of day.
pub fn parse_time_of_day(text: &str) -> Option<NaiveTime> {
    let text = text.trim();
    NaiveTime::parse_from_str(text, "%H:%M:%S")
        .or_else(|_| NaiveTime::parse_from_str(text, "%H:%M"))
        .ok()
}

/// Delay from `now` until `target` on the same day.
///
/// A target that has already passed gives a zero delay; there is no
/// rollover to the next day.
pub fn delay_until(target: NaiveTime, now: NaiveTime) -> Duration {
    if target <= now {
        return Duration::ZERO;
    }
    let delta = target - now;
    delta.to_std().unwrap_or(Duration::ZERO)
}

/// Delay until `target` from the current local time.
pub fn delay_until_now(target: NaiveTime) -> Duration {
    let now = chrono::Local::now().time();
    // Drop sub-second noise so "now" and "already passed" compare sanely
    let now = now.with_nanosecond(0).unwrap_or(now);
    delay_until(target, now)
}

/// Parse a `repeatEvery` interval.
///
/// Accepts an integer with an optional unit: `ms`, `s`, `m`, `h`, `d`.
/// A bare number is milliseconds.
pub fn parse_interval(text: &str) -> Option<Duration> {
    let text = text.trim();
    let split = text
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(text.len());
    let (number, unit) = text.split_at(split);
    let value: u64 = number.parse().ok()?;

    let millis = match unit.trim() {
        "" | "ms" => value,
        "s" => value.checked_mul(1_000)?,
        "m" => value.checked_mul(60_000)?,
        "h" => value.checked_mul(3_600_000)?,
        "d" => value.checked_mul(86_400_000)?,
        _ => return None,
    };
    Some(Duration::from_millis(millis))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::Variables;
    use crate::control::ControlFile;

    fn descriptor(text: &str, action: &str) -> ActionDescriptor {
        ActionDescriptor::read(&ControlFile::parse(text), action, &Variables::new())
    }

    #[test]
    fn test_error_class_parse() {
        assert_eq!("Any".parse::<ErrorClass>(), Ok(ErrorClass::Any));
        assert_eq!("Exception".parse::<ErrorClass>(), Ok(ErrorClass::Any));
        assert_eq!(
            "NoSuchElementException".parse::<ErrorClass>(),
            Ok(ErrorClass::Kind(ErrorKind::NoSuchElement))
        );
        assert!("NoSuchThing".parse::<ErrorClass>().is_err());
    }

    #[test]
    fn test_policy_resolve_unknown_kind() {
        let d = descriptor("a = echo\na.ignoreException = Bogus\n", "a");
        let err = ErrorPolicy::resolve(&d).unwrap_err();
        assert_eq!(err, "Ignore exception class not found in action 'a': Bogus");
    }

    #[test]
    fn test_policy_classification_order() {
        let policy = ErrorPolicy {
            repeat_until: Some(ErrorClass::Kind(ErrorKind::NoSuchElement)),
            ignore: Some(ErrorClass::Any),
        };
        assert!(matches!(
            policy.classify(CommandError::NoSuchElement("end".into()), true),
            Disposition::Terminate(ErrorKind::NoSuchElement)
        ));
        assert!(matches!(
            policy.classify(CommandError::Io("disk".into()), true),
            Disposition::Ignore(ErrorKind::Io)
        ));

        let policy = ErrorPolicy::default();
        assert!(matches!(
            policy.classify(CommandError::Io("disk".into()), true),
            Disposition::Propagate(_)
        ));
        assert!(matches!(
            policy.classify(CommandError::Io("disk".into()), false),
            Disposition::Report(_)
        ));
    }

    #[test]
    fn test_plan_foreach_wins_over_repeat() {
        let d = descriptor("a = echo\na.repeat = 5\na.foreach = a b\n", "a");
        let resolved = IterationPlan::resolve(&d, &ErrorPolicy::default()).unwrap();
        assert_eq!(
            resolved.plan,
            IterationPlan::Foreach(vec!["a".to_string(), "b".to_string()])
        );
        assert_eq!(resolved.plan.count(), Some(2));
        assert!(resolved.warning.unwrap().starts_with("WARNING"));
    }

    #[test]
    fn test_plan_repeat() {
        let d = descriptor("a = echo\na.repeat = 3\n", "a");
        let resolved = IterationPlan::resolve(&d, &ErrorPolicy::default()).unwrap();
        assert_eq!(resolved.plan, IterationPlan::Repeat(3));
        assert_eq!(resolved.plan.value(0), "1");
        assert_eq!(resolved.plan.value(2), "3");
        assert!(resolved.warning.is_none());
    }

    #[test]
    fn test_plan_bad_repeat() {
        let d = descriptor("a = echo\na.repeat = many\n", "a");
        let err = IterationPlan::resolve(&d, &ErrorPolicy::default()).unwrap_err();
        assert!(err.contains("is not a number: many"));

        let d = descriptor("a = echo\na.repeat = -1\n", "a");
        assert!(IterationPlan::resolve(&d, &ErrorPolicy::default()).is_err());
    }

    #[test]
    fn test_plan_unbounded_with_repeat_until() {
        let d = descriptor("a = echo\na.repeatUntilException = NoSuchElement\n", "a");
        let policy = ErrorPolicy::resolve(&d).unwrap();
        let resolved = IterationPlan::resolve(&d, &policy).unwrap();
        assert_eq!(resolved.plan, IterationPlan::Unbounded);
        assert!(resolved.plan.has_iteration(usize::MAX - 1));

        let d = descriptor("a = echo\n", "a");
        let resolved = IterationPlan::resolve(&d, &ErrorPolicy::default()).unwrap();
        assert_eq!(resolved.plan, IterationPlan::Once);
        assert!(!resolved.plan.binds_loop_variable());
    }

    #[test]
    fn test_policy_catches() {
        assert!(!ErrorPolicy::default().catches());
        let ignore_only = ErrorPolicy {
            repeat_until: None,
            ignore: Some(ErrorClass::Any),
        };
        assert!(ignore_only.catches());
    }

    #[test]
    fn test_action_plan() {
        let d = descriptor(
            "a = echo\na.postponeUntil = 00:00\na.repeatEvery = 5s\na.repeat = 2\n",
            "a",
        );
        let plan = ActionPlan::resolve(&d).unwrap();
        assert_eq!(plan.iterations, IterationPlan::Repeat(2));
        assert_eq!(plan.postpone_until, NaiveTime::from_hms_opt(0, 0, 0));
        assert_eq!(plan.repeat_every, Some(Duration::from_secs(5)));

        let d = descriptor("a = echo\na.postponeUntil = later\n", "a");
        let err = ActionPlan::resolve(&d).unwrap_err();
        assert_eq!(err, "Cannot parse postponeUntil time 'later' in action 'a'");

        let d = descriptor("a = echo\na.repeatEvery = often\n", "a");
        assert!(ActionPlan::resolve(&d).unwrap_err().contains("repeatEvery"));
    }

    #[test]
    fn test_time_of_day() {
        assert_eq!(
            parse_time_of_day("13:45"),
            NaiveTime::from_hms_opt(13, 45, 0)
        );
        assert_eq!(
            parse_time_of_day(" 01:02:03 "),
            NaiveTime::from_hms_opt(1, 2, 3)
        );
        assert_eq!(parse_time_of_day("noon"), None);
    }

    #[test]
    fn test_delay_until_past_is_zero() {
        let now = NaiveTime::from_hms_opt(12, 0, 0).unwrap();
        let past = NaiveTime::from_hms_opt(11, 59, 0).unwrap();
        let future = NaiveTime::from_hms_opt(12, 0, 30).unwrap();
        assert_eq!(delay_until(past, now), Duration::ZERO);
        assert_eq!(delay_until(now, now), Duration::ZERO);
        assert_eq!(delay_until(future, now), Duration::from_secs(30));
    }

    #[test]
    fn test_parse_interval() {
        assert_eq!(parse_interval("250"), Some(Duration::from_millis(250)));
        assert_eq!(parse_interval("250ms"), Some(Duration::from_millis(250)));
        assert_eq!(parse_interval("10s"), Some(Duration::from_secs(10)));
        assert_eq!(parse_interval("2m"), Some(Duration::from_secs(120)));
        assert_eq!(parse_interval("1h"), Some(Duration::from_secs(3600)));
        assert_eq!(parse_interval("1 d"), Some(Duration::from_secs(86_400)));
        assert_eq!(parse_interval("soon"), None);
        assert_eq!(parse_interval("5y"), None);
    }
}
