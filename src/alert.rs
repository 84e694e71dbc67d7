//! Mapping failed test cases to Alertmanager alerts.
//!
//! Every case that has a `<failure>` and is not skipped becomes one [`Alert`].
//! The `alertname` label is `{prefix}-{classname}` with spaces turned into
//! hyphens, suffixed with `-{index}` where `index` is the case's position in
//! the unfiltered report. That keeps names unique across cases of the same
//! class and points straight back at the source case.
//!
//! # Wire Format
//!
//! ```json
//! {
//!   "labels": {"alertname": "nightly-api-smoke-2"},
//!   "annotations": {"description": "expected 201, got 500", "summary": "creates user"},
//!   "startsAt": "2024-05-01T10:00:00.123456Z",
//!   "endsAt": "2024-05-01T10:03:00.123456Z",
//!   "generatorURL": "https://ci.example.com/job/42"
//! }
//! ```

use std::collections::BTreeMap;
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::report::{TestCase, TestSuite};

/// Label holding the alert name.
pub const ALERTNAME_LABEL: &str = "alertname";
/// Annotation holding the test case name.
pub const SUMMARY_ANNOTATION: &str = "summary";
/// Annotation holding the failure message.
pub const DESCRIPTION_ANNOTATION: &str = "description";
/// Description used when a mapped case carries no failure.
pub const NO_FAILURE_DESCRIPTION: &str = "no failure";

/// An alert in the shape accepted by Alertmanager's `/api/v1/alerts`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Alert {
    pub labels: BTreeMap<String, String>,
    pub annotations: BTreeMap<String, String>,
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
    #[serde(rename = "generatorURL")]
    pub generator_url: String,
}

impl Alert {
    /// The `alertname` label, if set.
    pub fn name(&self) -> Option<&str> {
        self.labels.get(ALERTNAME_LABEL).map(String::as_str)
    }
}

/// Turns a parsed [`TestSuite`] into alerts.
#[derive(Debug, Clone)]
pub struct AlertMapper {
    alert_name: String,
    generator_url: String,
    expire: Duration,
}

impl AlertMapper {
    /// Creates a mapper.
    ///
    /// # Arguments
    ///
    /// * `alert_name` - Prefix of the `alertname` label
    /// * `generator_url` - Value of every alert's `generatorURL`
    /// * `expire` - Alert lifetime; zero pins `endsAt` to the Unix epoch
    pub fn new(
        alert_name: impl Into<String>,
        generator_url: impl Into<String>,
        expire: Duration,
    ) -> Self {
        Self {
            alert_name: alert_name.into(),
            generator_url: generator_url.into(),
            expire,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            config.alert_name.clone(),
            config.generator_url.clone(),
            config.expire,
        )
    }

    /// Maps alertable cases to alerts, in document order.
    ///
    /// An empty result is valid and still gets delivered.
    pub fn map_alerts(&self, suite: &TestSuite) -> Vec<Alert> {
        let mut alerts = Vec::new();
        for (index, case) in suite.test_cases.iter().enumerate() {
            if case.skipped.is_some() {
                continue;
            }
            if case.failure.is_none() {
                continue;
            }
            alerts.push(self.map_case(case, index));
        }
        alerts
    }

    /// Builds the alert for one case at `index` in the unfiltered case list.
    pub fn map_case(&self, case: &TestCase, index: usize) -> Alert {
        let now = Utc::now();

        let description = match &case.failure {
            Some(failure) => failure.message.clone(),
            None => NO_FAILURE_DESCRIPTION.to_string(),
        };

        let labels = BTreeMap::from([(
            ALERTNAME_LABEL.to_string(),
            alert_name(&self.alert_name, &case.class_name, index),
        )]);
        let annotations = BTreeMap::from([
            (SUMMARY_ANNOTATION.to_string(), case.name.clone()),
            (DESCRIPTION_ANNOTATION.to_string(), description),
        ]);

        Alert {
            labels,
            annotations,
            starts_at: now,
            ends_at: self.ends_at(now),
            generator_url: self.generator_url.clone(),
        }
    }

    /// `now + expire`, or the Unix epoch when `expire` is exactly zero.
    fn ends_at(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        if self.expire.is_zero() {
            return DateTime::<Utc>::UNIX_EPOCH;
        }
        let lifetime = TimeDelta::from_std(self.expire).unwrap_or(TimeDelta::MAX);
        now.checked_add_signed(lifetime)
            .unwrap_or(DateTime::<Utc>::MAX_UTC)
    }
}

/// Builds the `alertname` label: `{prefix}-{class_name}-{index}`.
///
/// Spaces in the prefix and class name become hyphens.
///
/// # Example
///
/// ```
/// use junit2alertmanager::alert::alert_name;
///
/// assert_eq!(alert_name("nightly", "api smoke", 2), "nightly-api-smoke-2");
/// assert_eq!(alert_name("", "Suite", 0), "-Suite-0");
/// ```
pub fn alert_name(prefix: &str, class_name: &str, index: usize) -> String {
    let name = format!("{}-{}", prefix, class_name).replace(' ', "-");
    format!("{}-{}", name, index)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::{FailureMessage, Skipped, parse_junit_str};

    fn case(name: &str, failure: Option<&str>, skipped: bool) -> TestCase {
        TestCase {
            name: name.to_string(),
            class_name: "My Suite".to_string(),
            failure: failure.map(|message| FailureMessage {
                kind: None,
                message: message.to_string(),
            }),
            skipped: skipped.then(Skipped::default),
        }
    }

    fn suite(cases: Vec<TestCase>) -> TestSuite {
        TestSuite {
            name: "suite".to_string(),
            test_cases: cases,
        }
    }

    fn mapper(expire: Duration) -> AlertMapper {
        AlertMapper::new("ci run", "https://ci.example.com/job/7", expire)
    }

    #[test]
    fn test_alert_name_replaces_spaces() {
        assert_eq!(alert_name("ci run", "My Suite", 4), "ci-run-My-Suite-4");
        assert_eq!(alert_name("prefix", "a  b", 0), "prefix-a--b-0");
    }

    #[test]
    fn test_skipped_cases_never_alert() {
        let suite = suite(vec![
            case("skipped with failure", Some("boom"), true),
            case("skipped only", None, true),
        ]);
        assert!(mapper(Duration::from_secs(60)).map_alerts(&suite).is_empty());
    }

    #[test]
    fn test_passing_cases_never_alert() {
        let suite = suite(vec![case("passes", None, false)]);
        assert!(mapper(Duration::from_secs(60)).map_alerts(&suite).is_empty());
    }

    #[test]
    fn test_suffix_uses_unfiltered_index() {
        let suite = suite(vec![
            case("first", Some("one"), false),
            case("second", None, false),
            case("third", Some("three"), true),
            case("fourth", Some("four"), false),
        ]);
        let alerts = mapper(Duration::from_secs(60)).map_alerts(&suite);

        let names: Vec<_> = alerts.iter().filter_map(Alert::name).collect();
        assert_eq!(names, vec!["ci-run-My-Suite-0", "ci-run-My-Suite-3"]);
    }

    #[test]
    fn test_annotations_and_generator_url() {
        let suite = suite(vec![case("creates user", Some("expected 201"), false)]);
        let alerts = mapper(Duration::from_secs(60)).map_alerts(&suite);

        assert_eq!(alerts.len(), 1);
        let alert = &alerts[0];
        assert_eq!(alert.annotations[SUMMARY_ANNOTATION], "creates user");
        assert_eq!(alert.annotations[DESCRIPTION_ANNOTATION], "expected 201");
        assert_eq!(alert.generator_url, "https://ci.example.com/job/7");
    }

    #[test]
    fn test_map_case_without_failure_uses_default_description() {
        let alert = mapper(Duration::from_secs(60)).map_case(&case("passes", None, false), 5);
        assert_eq!(alert.annotations[DESCRIPTION_ANNOTATION], NO_FAILURE_DESCRIPTION);
        assert_eq!(alert.name(), Some("ci-run-My-Suite-5"));
    }

    #[test]
    fn test_zero_expire_ends_at_epoch() {
        let suite = suite(vec![
            case("a", Some("x"), false),
            case("b", Some("y"), false),
        ]);
        let alerts = mapper(Duration::ZERO).map_alerts(&suite);

        assert_eq!(alerts.len(), 2);
        for alert in &alerts {
            assert_eq!(alert.ends_at, DateTime::<Utc>::UNIX_EPOCH);
            assert_eq!(alert.ends_at.timestamp(), 0);
        }
    }

    #[test]
    fn test_nonzero_expire_ends_after_start() {
        let before = Utc::now();
        let suite = suite(vec![case("a", Some("x"), false)]);
        let alerts = mapper(Duration::from_secs(180)).map_alerts(&suite);
        let after = Utc::now();

        let alert = &alerts[0];
        assert!(alert.starts_at >= before && alert.starts_at <= after);
        assert!(alert.ends_at > alert.starts_at);
        assert_eq!(alert.ends_at - alert.starts_at, TimeDelta::seconds(180));
    }

    #[test]
    fn test_empty_suite_maps_to_no_alerts() {
        assert!(mapper(Duration::ZERO).map_alerts(&TestSuite::default()).is_empty());
    }

    #[test]
    fn test_end_to_end_from_report() {
        let report = parse_junit_str(
            r#"<testsuite name="e2e">
                 <testcase classname="api" name="passes"/>
                 <testcase classname="api" name="skipped"><failure>x</failure><skipped/></testcase>
                 <testcase classname="api" name="fails"><failure>boom</failure></testcase>
               </testsuite>"#,
        )
        .unwrap();
        let alerts = AlertMapper::new("nightly", "", Duration::from_secs(60)).map_alerts(&report);

        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].name(), Some("nightly-api-2"));
        assert_eq!(alerts[0].annotations[SUMMARY_ANNOTATION], "fails");
        assert_eq!(alerts[0].annotations[DESCRIPTION_ANNOTATION], "boom");
    }

    #[test]
    fn test_serialized_field_names() {
        let alert = mapper(Duration::ZERO).map_case(&case("a", Some("x"), false), 0);
        let json = serde_json::to_value(&alert).unwrap();

        assert_eq!(json["labels"]["alertname"], "ci-run-My-Suite-0");
        assert_eq!(json["annotations"]["summary"], "a");
        assert_eq!(json["annotations"]["description"], "x");
        assert_eq!(json["generatorURL"], "https://ci.example.com/job/7");
        assert_eq!(json["endsAt"], "1970-01-01T00:00:00Z");
        assert!(json["startsAt"].is_string());
    }
}
