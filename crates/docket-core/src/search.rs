//! Linear, deadline-bounded search over a collection's entries.
//!
//! Matching is diacritic- and case-insensitive. A scan checks the caller's
//! cancellation token and the wall-clock budget before every entry:
//! cancellation discards everything found so far, an exhausted budget keeps
//! the partial result.

use std::time::{Duration, Instant};

use serde_json::{Map, Value};
use tokio_util::sync::CancellationToken;
use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

use crate::error::{CoreError, CoreResult};

/// Strip diacritical marks and lowercase.
///
/// ```
/// assert_eq!(docket_core::search::normalize("José ÅNGSTRÖM"), "jose angstrom");
/// ```
pub fn normalize(text: &str) -> String {
    text.nfd()
        .filter(|c| !is_combining_mark(*c))
        .collect::<String>()
        .to_lowercase()
}

/// A validated, normalized search query.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Query {
    normalized: String,
}

impl Query {
    pub fn parse(raw: &str) -> CoreResult<Self> {
        if raw.trim().is_empty() {
            return Err(CoreError::InvalidQuery("query must not be empty".into()));
        }
        Ok(Self {
            normalized: normalize(raw),
        })
    }

    pub fn as_str(&self) -> &str {
        &self.normalized
    }

    /// Whether an entry value matches this query.
    ///
    /// Strings match on normalized substring containment. Objects and arrays
    /// match if any direct member equals the query, contains it once
    /// normalized, or contains it in its lowercased JSON rendering. Other
    /// top-level values never match.
    pub fn matches(&self, value: &Value) -> bool {
        match value {
            Value::String(s) => normalize(s).contains(self.as_str()),
            Value::Object(members) => members.values().any(|m| self.member_matches(m)),
            Value::Array(members) => members.iter().any(|m| self.member_matches(m)),
            _ => false,
        }
    }

    fn member_matches(&self, member: &Value) -> bool {
        let q = self.as_str();
        if let Value::String(s) = member {
            if s == q || normalize(s).contains(q) {
                return true;
            }
        }
        serde_json::to_string(member)
            .map(|rendered| rendered.to_lowercase().contains(q))
            .unwrap_or(false)
    }
}

/// Why a scan stopped.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ScanStatus {
    /// Every entry was examined.
    Complete,
    /// The time budget ran out; hits are partial.
    DeadlineExceeded,
    /// The requested number of hits was collected.
    LimitReached,
    /// The caller went away; hits are always empty.
    Cancelled,
}

/// Result of a scan.
#[derive(Clone, Debug)]
pub struct SearchOutcome {
    pub hits: Map<String, Value>,
    /// Entries examined by the match predicate.
    pub scanned: usize,
    pub elapsed: Duration,
    pub status: ScanStatus,
}

/// Bounds applied to a single scan.
#[derive(Clone, Copy, Debug)]
pub struct ScanLimits {
    pub timeout: Duration,
    pub max_hits: Option<usize>,
}

/// Scan `entries` in key order, collecting those that match `query`.
pub fn scan(
    entries: &Map<String, Value>,
    query: &Query,
    limits: ScanLimits,
    cancel: &CancellationToken,
) -> SearchOutcome {
    let started = Instant::now();
    scan_with_clock(entries, query, limits, cancel, || started.elapsed())
}

/// [`scan`] driven by `elapsed`, which reports the time spent so far.
fn scan_with_clock(
    entries: &Map<String, Value>,
    query: &Query,
    limits: ScanLimits,
    cancel: &CancellationToken,
    mut elapsed: impl FnMut() -> Duration,
) -> SearchOutcome {
    let mut hits = Map::new();
    let mut scanned = 0;
    let mut status = ScanStatus::Complete;

    for (key, value) in entries {
        if cancel.is_cancelled() {
            return SearchOutcome {
                hits: Map::new(),
                scanned,
                elapsed: elapsed(),
                status: ScanStatus::Cancelled,
            };
        }
        if elapsed() > limits.timeout {
            status = ScanStatus::DeadlineExceeded;
            break;
        }
        if limits.max_hits.is_some_and(|max| hits.len() >= max) {
            status = ScanStatus::LimitReached;
            break;
        }

        scanned += 1;
        if query.matches(value) {
            hits.insert(key.clone(), value.clone());
        }
    }

    SearchOutcome {
        hits,
        scanned,
        elapsed: elapsed(),
        status,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn entries(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => panic!("fixture must be an object"),
        }
    }

    fn unbounded() -> ScanLimits {
        ScanLimits { timeout: Duration::from_secs(60), max_hits: None }
    }

    fn q(raw: &str) -> Query {
        Query::parse(raw).unwrap()
    }

    #[test]
    fn normalize_strips_marks() {
        assert_eq!(normalize("José"), "jose");
        assert_eq!(normalize("Crème Brûlée"), "creme brulee");
        assert_eq!(normalize("plain"), "plain");
    }

    #[test]
    fn empty_query_rejected() {
        assert!(matches!(Query::parse(""), Err(CoreError::InvalidQuery(_))));
        assert!(matches!(Query::parse("  "), Err(CoreError::InvalidQuery(_))));
    }

    #[test]
    fn query_is_normalized() {
        assert_eq!(q("JOSÉ").as_str(), "jose");
    }

    #[test]
    fn string_values_match_by_substring() {
        assert!(q("pen").matches(&json!("Blue Pencil")));
        assert!(q("ecole").matches(&json!("École")));
        assert!(!q("pen").matches(&json!("marker")));
    }

    #[test]
    fn object_members_match() {
        let item = json!({"name": "José", "qty": 12});
        assert!(q("jose").matches(&item));
        assert!(q("12").matches(&item));
        assert!(!q("13").matches(&item));
    }

    #[test]
    fn nested_members_match_via_rendering() {
        let item = json!({"meta": {"tags": ["Urgent"]}});
        assert!(q("urgent").matches(&item));
        assert!(q("tags").matches(&item));
    }

    #[test]
    fn arrays_match_by_element() {
        assert!(q("b").matches(&json!(["a", "B"])));
    }

    #[test]
    fn scalars_never_match() {
        assert!(!q("1").matches(&json!(1)));
        assert!(!q("true").matches(&json!(true)));
        assert!(!q("null").matches(&json!(null)));
    }

    #[test]
    fn scan_collects_matches_by_key() {
        let data = entries(json!({
            "a": {"name": "José"},
            "b": {"name": "Maria"},
            "c": "jose's notes",
            "d": 42,
        }));
        let outcome = scan(&data, &q("jose"), unbounded(), &CancellationToken::new());
        assert_eq!(outcome.status, ScanStatus::Complete);
        assert_eq!(outcome.scanned, 4);
        let keys: Vec<&String> = outcome.hits.keys().collect();
        assert_eq!(keys, vec!["a", "c"]);
    }

    #[test]
    fn cancelled_scan_returns_nothing() {
        let data = entries(json!({"a": "x", "b": "x"}));
        let cancel = CancellationToken::new();
        cancel.cancel();
        let outcome = scan(&data, &q("x"), unbounded(), &cancel);
        assert_eq!(outcome.status, ScanStatus::Cancelled);
        assert_eq!(outcome.scanned, 0);
        assert!(outcome.hits.is_empty());
    }

    #[test]
    fn exhausted_deadline_returns_subset() {
        let mut data = Map::new();
        for i in 0..5_000 {
            data.insert(format!("k{i:05}"), json!({"v": "match me"}));
        }
        let full = scan(&data, &q("match"), unbounded(), &CancellationToken::new());
        std::thread::sleep(Duration::from_millis(1));
        let bounded = scan(
            &data,
            &q("match"),
            ScanLimits { timeout: Duration::ZERO, max_hits: None },
            &CancellationToken::new(),
        );
        assert!(bounded.hits.len() <= full.hits.len());
        assert!(bounded.hits.keys().all(|k| full.hits.contains_key(k)));
    }

    #[test]
    fn deadline_keeps_hits_found_before_it() {
        let mut data = Map::new();
        for i in 0..10 {
            let value = if i % 2 == 0 { json!("match me") } else { json!("other") };
            data.insert(format!("k{i}"), value);
        }

        // Every clock reading advances one millisecond; the budget allows
        // readings 0..=3, i.e. four entries.
        let mut now = Duration::ZERO;
        let tick = || {
            let t = now;
            now += Duration::from_millis(1);
            t
        };
        let outcome = scan_with_clock(
            &data,
            &q("match"),
            ScanLimits { timeout: Duration::from_millis(3), max_hits: None },
            &CancellationToken::new(),
            tick,
        );

        assert_eq!(outcome.status, ScanStatus::DeadlineExceeded);
        assert_eq!(outcome.scanned, 4);
        let keys: Vec<&String> = outcome.hits.keys().collect();
        assert_eq!(keys, vec!["k0", "k2"]);
    }

    #[test]
    fn limit_caps_hits() {
        let data = entries(json!({"a": "x", "b": "x", "c": "x"}));
        let outcome = scan(
            &data,
            &q("x"),
            ScanLimits { timeout: Duration::from_secs(60), max_hits: Some(2) },
            &CancellationToken::new(),
        );
        assert_eq!(outcome.status, ScanStatus::LimitReached);
        assert_eq!(outcome.hits.len(), 2);
        assert!(outcome.hits.contains_key("a"));
        assert!(outcome.hits.contains_key("b"));
    }

    #[test]
    fn empty_collection_completes() {
        let outcome = scan(&Map::new(), &q("x"), unbounded(), &CancellationToken::new());
        assert_eq!(outcome.status, ScanStatus::Complete);
        assert!(outcome.hits.is_empty());
    }
}
