// crates/nexus-router-adapters/src/redact.rs
// ============================================================================
// Module: Redaction
// Description: Scrubs secrets from data that enters the event stream.
// Purpose: Keep tokens/passwords/keys out of TOOL_CALL_* payloads and
//          subprocess adapter error details.
// Dependencies: regex, serde_json
// ============================================================================

//! ## Overview
//! Two independent scrubbers, both compiled once and reused: a recursive
//! key-pattern match over argument maps and lists (replaces the *value*
//! whenever the *key* looks secret-shaped), and a handful of free-text
//! patterns applied to stdout/stderr excerpts. Redaction only ever touches
//! data headed for events or error details; the payload sent to the child
//! process is never redacted.

use regex::Regex;
use serde_json::Value;

const REDACTED: &str = "***REDACTED***";

/// Compiled redaction patterns, built once per adapter instance.
pub struct Redactor {
    key_pattern: Regex,
    bearer_pattern: Regex,
    api_key_assignment_pattern: Regex,
    generic_secret_assignment_pattern: Regex,
    authorization_header_pattern: Regex,
}

impl Redactor {
    /// Compiles the default key- and text-pattern set.
    #[must_use]
    pub fn new() -> Self {
        Self {
            key_pattern: build_regex(
                r"(?i)token|secret|password|api[_-]?key|authorization|cookie|credential|private[_-]?key",
            ),
            bearer_pattern: build_regex(r"(?i)bearer\s+[A-Za-z0-9\-._~+/]+=*"),
            api_key_assignment_pattern: build_regex(r#"(?i)api[_-]?key\s*[=:]\s*["']?[^"'\s]+"#),
            generic_secret_assignment_pattern: build_regex(r#"(?i)[a-z_]*secret[a-z_]*key\s*[=:]\s*["']?[^"'\s]+"#),
            authorization_header_pattern: build_regex(r"(?i)authorization\s*:\s*\S+"),
        }
    }

    /// Recursively scrubs `value`: any object key matching the secret
    /// key-pattern has its value replaced, regardless of nesting depth.
    #[must_use]
    pub fn redact_args(&self, value: &Value) -> Value {
        match value {
            Value::Object(map) => Value::Object(
                map.iter()
                    .map(|(key, nested)| {
                        let rewritten = if self.key_pattern.is_match(key) {
                            Value::String(REDACTED.to_string())
                        } else {
                            self.redact_args(nested)
                        };
                        (key.clone(), rewritten)
                    })
                    .collect(),
            ),
            Value::Array(items) => Value::Array(items.iter().map(|item| self.redact_args(item)).collect()),
            scalar => scalar.clone(),
        }
    }

    /// Scrubs free text (stdout/stderr excerpts) in priority order: bearer
    /// tokens, `api_key=` assignments, generic `*secret*key=` assignments,
    /// then a direct `authorization:` header.
    #[must_use]
    pub fn redact_text(&self, text: &str) -> String {
        let step1 = self.bearer_pattern.replace_all(text, REDACTED);
        let step2 = self.api_key_assignment_pattern.replace_all(&step1, REDACTED);
        let step3 = self.generic_secret_assignment_pattern.replace_all(&step2, REDACTED);
        self.authorization_header_pattern.replace_all(&step3, REDACTED).into_owned()
    }
}

impl Default for Redactor {
    fn default() -> Self {
        Self::new()
    }
}

/// Compiles `pattern`, which is built from a fixed, crate-internal literal
/// and can never fail to compile; a panic here would be a defect in this
/// module, not reachable from untrusted input.
fn build_regex(pattern: &str) -> Regex {
    #[allow(clippy::expect_used)]
    Regex::new(pattern).expect("redaction pattern is a fixed, crate-internal literal")
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn redacts_secret_shaped_keys_recursively() {
        let redactor = Redactor::new();
        let input = json!({
            "token": "abc123",
            "nested": { "password": "hunter2", "fine": "ok" },
            "list": [{ "api_key": "xyz" }],
        });
        let out = redactor.redact_args(&input);
        assert_eq!(out["token"], REDACTED);
        assert_eq!(out["nested"]["password"], REDACTED);
        assert_eq!(out["nested"]["fine"], "ok");
        assert_eq!(out["list"][0]["api_key"], REDACTED);
    }

    #[test]
    fn redacts_bearer_token_in_text() {
        let redactor = Redactor::new();
        let out = redactor.redact_text("Authorization: Bearer abc.def-ghi_123");
        assert!(!out.contains("abc.def-ghi_123"));
    }

    #[test]
    fn redacts_api_key_assignment_in_text() {
        let redactor = Redactor::new();
        let out = redactor.redact_text("config: api_key=sk-12345 other=fine");
        assert!(!out.contains("sk-12345"));
        assert!(out.contains("other=fine"));
    }

    #[test]
    fn non_secret_text_passes_through() {
        let redactor = Redactor::new();
        let out = redactor.redact_text("plain log line with no secrets");
        assert_eq!(out, "plain log line with no secrets");
    }

    /// Builds an arbitrary, recursively-nested `serde_json::Value` strategy,
    /// biased toward secret-shaped keys so the idempotence property below
    /// actually exercises the redaction branch, not just passthrough.
    fn arb_args_value() -> impl proptest::strategy::Strategy<Value = Value> {
        use proptest::prelude::*;

        let key = prop_oneof![
            Just("token".to_string()),
            Just("api_key".to_string()),
            Just("plain".to_string()),
            "[a-z_]{1,10}".prop_map(|s| s),
        ];
        let leaf = prop_oneof![
            Just(Value::Null),
            any::<bool>().prop_map(Value::Bool),
            "[a-zA-Z0-9_ ]{0,16}".prop_map(Value::String),
        ];
        leaf.prop_recursive(3, 16, 6, move |inner| {
            prop_oneof![
                proptest::collection::vec(inner.clone(), 0..3).prop_map(Value::Array),
                proptest::collection::vec((key.clone(), inner), 0..3)
                    .prop_map(|pairs| Value::Object(pairs.into_iter().collect())),
            ]
        })
    }

    proptest::proptest! {
        /// Law: redacting an already-redacted value is a no-op. Secret-shaped
        /// keys are replaced with a fixed sentinel on the first pass, which
        /// does not itself look secret-shaped to any nested key, so a second
        /// pass leaves the result unchanged.
        #[test]
        fn redact_args_is_idempotent(value in arb_args_value()) {
            let redactor = Redactor::new();
            let once = redactor.redact_args(&value);
            let twice = redactor.redact_args(&once);
            proptest::prop_assert_eq!(once, twice);
        }

        /// Law: redacting free text twice is the same as redacting it once;
        /// the replacement sentinel never itself matches a secret pattern.
        #[test]
        fn redact_text_is_idempotent(text in "[a-zA-Z0-9 :=_.-]{0,64}") {
            let redactor = Redactor::new();
            let once = redactor.redact_text(&text);
            let twice = redactor.redact_text(&once);
            proptest::prop_assert_eq!(once, twice);
        }
    }
}
