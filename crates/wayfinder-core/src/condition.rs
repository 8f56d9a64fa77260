//! Condition evaluation.
//!
//! A condition list folds left: the first result seeds the accumulator and
//! every later condition combines through its own combinator. Each
//! condition is evaluated even when it can no longer change the result.

use chrono::{DateTime, Utc};
use tracing::{debug, warn};
use wayfinder_protocols::{Combinator, Condition, HostSurface};

use crate::url_pattern::UrlPattern;

/// Inputs the predicates read.
#[derive(Clone, Copy)]
pub struct ConditionEnv<'a> {
    pub url: &'a str,
    pub now: DateTime<Utc>,
    /// Needed by element conditions; without it they fail.
    pub surface: Option<&'a dyn HostSurface>,
}

impl<'a> ConditionEnv<'a> {
    pub fn new(url: &'a str, now: DateTime<Utc>) -> Self {
        Self {
            url,
            now,
            surface: None,
        }
    }

    /// Current URL and time of `surface`.
    pub fn live(surface: &'a dyn HostSurface, url: &'a str) -> Self {
        Self {
            url,
            now: Utc::now(),
            surface: Some(surface),
        }
    }

    pub fn with_surface(mut self, surface: &'a dyn HostSurface) -> Self {
        self.surface = Some(surface);
        self
    }
}

/// Evaluate a condition list. An empty list is `true`.
pub fn evaluate(conditions: &[Condition], env: &ConditionEnv<'_>) -> bool {
    let mut results = conditions.iter().map(|c| (c.combinator(), evaluate_one(c, env)));
    let Some((_, first)) = results.next() else {
        return true;
    };
    results.fold(first, |acc, (combinator, result)| match combinator {
        Combinator::If => acc && result,
        Combinator::Or => acc || result,
        Combinator::Unrecognized => {
            warn!("Unrecognized condition combinator, treating the list as not matching");
            false
        }
    })
}

/// Evaluate one condition, ignoring its combinator.
pub fn evaluate_one(condition: &Condition, env: &ConditionEnv<'_>) -> bool {
    match condition {
        Condition::Url {
            match_values,
            no_match_values,
            ..
        } => {
            let matched = match_values.is_empty() || match_values.iter().any(|v| url_matches(v, env.url));
            matched && !no_match_values.iter().any(|v| url_matches(v, env.url))
        }
        Condition::Time { start, end, .. } => {
            start.is_none_or(|start| env.now >= start) && end.is_none_or(|end| env.now <= end)
        }
        Condition::Element {
            match_values,
            no_match_values,
            ..
        } => {
            let Some(surface) = env.surface else {
                debug!("Element condition without a surface");
                return false;
            };
            let exists = |selector: &String| {
                surface
                    .query_selector_all(selector)
                    .map(|found| !found.is_empty())
                    .unwrap_or(false)
            };
            let matched = match_values.is_empty() || match_values.iter().any(exists);
            matched && !no_match_values.iter().any(exists)
        }
        Condition::Unrecognized => {
            debug!("Unrecognized condition evaluates to false");
            false
        }
    }
}

/// Equality or substring match; values containing `*` are URL patterns.
fn url_matches(value: &str, url: &str) -> bool {
    if value.contains('*') {
        return UrlPattern::parse(value).is_ok_and(|pattern| pattern.matches(url));
    }
    url == value || url.contains(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn at(hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, hour, 0, 0).unwrap()
    }

    fn env(url: &str) -> ConditionEnv<'_> {
        ConditionEnv::new(url, at(12))
    }

    #[test]
    fn test_empty_list_is_true() {
        assert!(evaluate(&[], &env("https://a.com/")));
    }

    #[test]
    fn test_url_or_time_left_fold() {
        let conditions: Vec<Condition> = serde_json::from_value(json!([
            { "type": "url", "matchValues": ["/pricing"], "combinator": "if" },
            { "type": "time", "start": "2026-03-01T10:00:00Z", "end": "2026-03-01T14:00:00Z", "combinator": "or" }
        ]))
        .unwrap();
        assert!(evaluate(&conditions, &env("https://a.com/docs")));
    }

    #[test]
    fn test_unknown_combinator_fails_the_list() {
        let conditions: Vec<Condition> = serde_json::from_value(json!([
            { "type": "url", "matchValues": ["/docs"] },
            { "type": "url", "matchValues": ["/docs"], "combinator": "AND" }
        ]))
        .unwrap();
        assert_eq!(conditions[1].combinator(), Combinator::Unrecognized);
        assert!(evaluate(&conditions[..1], &env("https://a.com/docs")));
        assert!(!evaluate(&conditions, &env("https://a.com/docs")));
    }

    #[test]
    fn test_if_after_failure_stays_false() {
        let conditions = vec![
            Condition::url(&["/pricing"]),
            Condition::time(None, None),
        ];
        assert!(!evaluate(&conditions, &env("https://a.com/docs")));
        // Or after a failing if recovers.
        let conditions = vec![
            Condition::url(&["/pricing"]),
            Condition::time(None, None).with_combinator(Combinator::Or),
        ];
        assert!(evaluate(&conditions, &env("https://a.com/docs")));
    }

    #[test]
    fn test_first_combinator_ignored() {
        let conditions = vec![Condition::url(&["/docs"]).with_combinator(Combinator::Or)];
        assert!(evaluate(&conditions, &env("https://a.com/docs")));
    }

    #[test]
    fn test_url_no_match_values() {
        let condition = Condition::Url {
            match_values: vec![],
            no_match_values: vec!["/admin".to_string()],
            combinator: Combinator::If,
        };
        assert!(evaluate_one(&condition, &env("https://a.com/docs")));
        assert!(!evaluate_one(&condition, &env("https://a.com/admin/users")));
    }

    #[test]
    fn test_url_wildcard_value() {
        let condition = Condition::url(&["https://*.a.com/app/*"]);
        assert!(evaluate_one(&condition, &env("https://eu.a.com/app/x")));
        assert!(!evaluate_one(&condition, &env("https://a.com/app/x")));
    }

    #[test]
    fn test_time_bounds_inclusive_and_open() {
        let e = env("https://a.com/");
        assert!(evaluate_one(&Condition::time(Some(at(12)), Some(at(12))), &e));
        assert!(evaluate_one(&Condition::time(Some(at(11)), None), &e));
        assert!(!evaluate_one(&Condition::time(Some(at(13)), None), &e));
        assert!(evaluate_one(&Condition::time(None, Some(at(12))), &e));
        assert!(!evaluate_one(&Condition::time(None, Some(at(11))), &e));
    }

    #[test]
    fn test_unrecognized_is_false() {
        assert!(!evaluate(&[Condition::Unrecognized], &env("https://a.com/")));
    }

    #[test]
    fn test_element_without_surface_is_false() {
        assert!(!evaluate_one(&Condition::element(&["#x"]), &env("https://a.com/")));
    }
}
