// src/interception/scanner.rs
//! Depth-bounded, key-filtered deep scan
//!
//! Walks a decoded response and hands every identity record (an object with
//! string-valued id and display fields) to an [`IdentityVisitor`]. Arrays are
//! always descended; object fields only when their key is in the policy's
//! allow-list. Nodes past `max_depth` are skipped silently.

use crate::utils::config::InterceptionConfig;
use serde_json::Value;
use std::collections::HashSet;

/// Receives identity records found by the scan
pub trait IdentityVisitor {
    /// Inspect one record; return `true` if `display` was changed
    fn visit(&mut self, id: &str, display: &mut String) -> bool;
}

/// What to descend into and what counts as an identity record
#[derive(Debug, Clone)]
pub struct ScanPolicy {
    pub max_depth: usize,
    pub descend_keys: HashSet<String>,
    pub id_key: String,
    pub display_key: String,
}

impl From<&InterceptionConfig> for ScanPolicy {
    fn from(config: &InterceptionConfig) -> Self {
        Self {
            max_depth: config.max_depth,
            descend_keys: config.descend_keys.iter().cloned().collect(),
            id_key: config.id_key.clone(),
            display_key: config.display_key.clone(),
        }
    }
}

impl Default for ScanPolicy {
    fn default() -> Self {
        Self::from(&InterceptionConfig::default())
    }
}

/// Result of one scan pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScanOutcome {
    pub records: usize,
    pub modified: usize,
    /// Some branch hit the depth cap
    pub truncated: bool,
}

impl ScanOutcome {
    pub fn is_modified(&self) -> bool {
        self.modified > 0
    }
}

/// Deep-scan visitor driver
#[derive(Debug, Clone, Default)]
pub struct Scanner {
    policy: ScanPolicy,
}

impl Scanner {
    pub fn new(policy: ScanPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &ScanPolicy {
        &self.policy
    }

    pub fn scan<V: IdentityVisitor + ?Sized>(&self, root: &mut Value, visitor: &mut V) -> ScanOutcome {
        let mut outcome = ScanOutcome::default();
        self.walk(root, 0, visitor, &mut outcome);
        outcome
    }

    fn walk<V: IdentityVisitor + ?Sized>(
        &self,
        node: &mut Value,
        depth: usize,
        visitor: &mut V,
        outcome: &mut ScanOutcome,
    ) {
        if depth > self.policy.max_depth {
            outcome.truncated = true;
            return;
        }

        match node {
            Value::Array(items) => {
                for item in items.iter_mut().filter(|v| is_container(v)) {
                    self.walk(item, depth + 1, visitor, outcome);
                }
            }
            Value::Object(map) => {
                let id = match map.get(&self.policy.id_key) {
                    Some(Value::String(id)) => Some(id.clone()),
                    _ => None,
                };
                if let Some(id) = id {
                    if let Some(Value::String(display)) = map.get_mut(&self.policy.display_key) {
                        outcome.records += 1;
                        if visitor.visit(&id, display) {
                            outcome.modified += 1;
                        }
                    }
                }

                for (key, child) in map.iter_mut() {
                    let descend = child.is_array()
                        || (child.is_object() && self.policy.descend_keys.contains(key));
                    if descend {
                        self.walk(child, depth + 1, visitor, outcome);
                    }
                }
            }
            _ => {}
        }
    }
}

fn is_container(value: &Value) -> bool {
    value.is_array() || value.is_object()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[derive(Default)]
    struct Collect {
        seen: Vec<String>,
        suffix: Option<&'static str>,
    }

    impl IdentityVisitor for Collect {
        fn visit(&mut self, id: &str, display: &mut String) -> bool {
            self.seen.push(id.to_string());
            match self.suffix {
                Some(suffix) => {
                    display.push_str(suffix);
                    true
                }
                None => false,
            }
        }
    }

    #[test]
    fn test_finds_nested_records() {
        let mut body = json!({
            "data": { "user": { "result": { "legacy": { "screen_name": "Alice", "name": "Alice A" } } } }
        });
        let mut visitor = Collect::default();
        let outcome = Scanner::default().scan(&mut body, &mut visitor);
        assert_eq!(visitor.seen, vec!["Alice"]);
        assert_eq!(outcome.records, 1);
        assert!(!outcome.is_modified());
    }

    #[test]
    fn test_skips_keys_outside_allow_list() {
        let mut body = json!({
            "data": { "promoted": { "screen_name": "ad", "name": "Ad" } }
        });
        let mut visitor = Collect::default();
        Scanner::default().scan(&mut body, &mut visitor);
        assert!(visitor.seen.is_empty());
    }

    #[test]
    fn test_arrays_always_descended() {
        let mut body = json!({
            "anything": [ { "screen_name": "a", "name": "A" }, [ { "screen_name": "b", "name": "B" } ] ]
        });
        let mut visitor = Collect::default();
        Scanner::default().scan(&mut body, &mut visitor);
        assert_eq!(visitor.seen, vec!["a", "b"]);
    }

    #[test]
    fn test_requires_both_fields_as_strings() {
        let mut body = json!([
            { "screen_name": "a" },
            { "screen_name": 5, "name": "Five" },
            { "screen_name": "c", "name": null }
        ]);
        let mut visitor = Collect::default();
        let outcome = Scanner::default().scan(&mut body, &mut visitor);
        assert!(visitor.seen.is_empty());
        assert_eq!(outcome.records, 0);
    }

    #[test]
    fn test_mutates_in_place() {
        let mut body = json!({ "users": [ { "screen_name": "a", "name": "A" } ] });
        let mut visitor = Collect {
            suffix: Some(" 🇫🇷"),
            ..Default::default()
        };
        let outcome = Scanner::default().scan(&mut body, &mut visitor);
        assert_eq!(outcome.modified, 1);
        assert_eq!(body["users"][0]["name"], "A 🇫🇷");
    }

    #[test]
    fn test_depth_cap_stops_silently() {
        let policy = ScanPolicy {
            max_depth: 2,
            ..Default::default()
        };
        let mut body = json!([[[[{ "screen_name": "deep", "name": "Deep" }]]]]);
        let mut visitor = Collect::default();
        let outcome = Scanner::new(policy).scan(&mut body, &mut visitor);
        assert!(visitor.seen.is_empty());
        assert!(outcome.truncated);
    }
}
