//! Canonical phone extraction.
//!
//! Real credential blobs vary in shape across WhatsApp library versions
//! (flat v7, wrapped, LID-only, JID-only); the six strategies below are
//! applied in order and the first success wins. Implementations must run
//! every strategy, not just the common case — each is covered in
//! isolation by the property tests below.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

use super::CredentialError;

static PREFIXED_DIGITS: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(\d+)[@:]").unwrap());
static DIGIT_RUN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d+").unwrap());
static COLON_SUFFIXED_DIGITS: Lazy<Regex> = Lazy::new(|| Regex::new(r"(\d{10,15}):").unwrap());

const MIN_LEN: usize = 10;
const MAX_LEN: usize = 15;
const MAX_DESCENT_DEPTH: usize = 5;

fn is_valid_phone(s: &str) -> bool {
    if s.len() < MIN_LEN || s.len() > MAX_LEN {
        return false;
    }
    if s.starts_with('0') {
        return false;
    }
    match s.parse::<u64>() {
        Ok(n) => n > 1_000_000_000,
        Err(_) => false,
    }
}

fn prefixed_digits(value: &Value) -> Option<String> {
    let s = value.as_str()?;
    let captured = PREFIXED_DIGITS.captures(s)?.get(1)?.as_str().to_string();
    is_valid_phone(&captured).then_some(captured)
}

fn get_path<'a>(doc: &'a Value, path: &[&str]) -> Option<&'a Value> {
    let mut current = doc;
    for key in path {
        current = current.as_object()?.get(*key)?;
    }
    Some(current)
}

/// Strategy 5: within `creds` serialized to a string, the first maximal
/// digit run whose length falls in `[10, 15]` and passes the phone
/// constraints.
fn digit_run_in_creds(doc: &Value) -> Option<String> {
    let creds = get_path(doc, &["creds"])?;
    let serialized = serde_json::to_string(creds).ok()?;
    DIGIT_RUN
        .find_iter(&serialized)
        .map(|m| m.as_str().to_string())
        .find(|run| run.len() >= MIN_LEN && run.len() <= MAX_LEN && is_valid_phone(run))
}

/// Strategy 6: depth-bounded descent of the whole document.
fn depth_bounded_descent(doc: &Value) -> Option<String> {
    descend(doc, None, 0)
}

fn descend(value: &Value, key: Option<&str>, depth: usize) -> Option<String> {
    if depth > MAX_DESCENT_DEPTH {
        return None;
    }

    if let Some(key) = key {
        let lower = key.to_ascii_lowercase();
        if lower.contains("phone") || lower.contains("number") {
            if let Some(s) = value.as_str() {
                let digits: String = s.chars().filter(|c| c.is_ascii_digit()).collect();
                if is_valid_phone(&digits) {
                    return Some(digits);
                }
            }
        }
    }

    match value {
        Value::String(s) => COLON_SUFFIXED_DIGITS
            .captures(s)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str().to_string())
            .filter(|candidate| is_valid_phone(candidate)),
        Value::Object(map) => {
            for (k, v) in map {
                if let Some(found) = descend(v, Some(k), depth + 1) {
                    return Some(found);
                }
            }
            None
        }
        Value::Array(items) => {
            for item in items {
                if let Some(found) = descend(item, None, depth + 1) {
                    return Some(found);
                }
            }
            None
        }
        _ => None,
    }
}

/// Applies all six ordered strategies, returning the first success.
pub fn extract(doc: &Value) -> Result<String, CredentialError> {
    get_path(doc, &["creds", "me", "lid"])
        .and_then(prefixed_digits)
        .or_else(|| get_path(doc, &["creds", "me", "id"]).and_then(prefixed_digits))
        .or_else(|| get_path(doc, &["me", "id"]).and_then(prefixed_digits))
        .or_else(|| get_path(doc, &["me", "lid"]).and_then(prefixed_digits))
        .or_else(|| digit_run_in_creds(doc))
        .or_else(|| depth_bounded_descent(doc))
        .ok_or(CredentialError::NoPhone)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn strategy_1_creds_me_lid() {
        let doc = json!({"creds": {"me": {"lid": "254700000001@s.whatsapp.net"}}});
        assert_eq!(extract(&doc).unwrap(), "254700000001");
    }

    #[test]
    fn strategy_2_creds_me_id() {
        let doc = json!({"creds": {"me": {"id": "254700000002:1"}}});
        assert_eq!(extract(&doc).unwrap(), "254700000002");
    }

    #[test]
    fn strategy_3_root_me_id() {
        let doc = json!({"me": {"id": "254700000003:1"}, "creds": {}});
        assert_eq!(extract(&doc).unwrap(), "254700000003");
    }

    #[test]
    fn strategy_4_root_me_lid() {
        let doc = json!({"me": {"lid": "254700000004@s.whatsapp.net"}, "creds": {}});
        assert_eq!(extract(&doc).unwrap(), "254700000004");
    }

    #[test]
    fn strategy_5_digit_run_in_creds() {
        let doc = json!({"creds": {"noiseKey": "blob-254700000005-suffix"}});
        assert_eq!(extract(&doc).unwrap(), "254700000005");
    }

    #[test]
    fn strategy_6_depth_bounded_descent_colon_suffixed() {
        let doc = json!({"nested": {"deeper": {"raw": "254700000006:device"}}});
        assert_eq!(extract(&doc).unwrap(), "254700000006");
    }

    #[test]
    fn strategy_6_depth_bounded_descent_phone_key() {
        let doc = json!({"nested": {"phoneNumber": "+254 700 000 007"}});
        assert_eq!(extract(&doc).unwrap(), "254700000007");
    }

    #[test]
    fn no_phone_when_nothing_matches() {
        let doc = json!({"creds": {"noiseKey": "no digits here"}});
        assert!(matches!(extract(&doc).unwrap_err(), CredentialError::NoPhone));
    }

    #[test]
    fn rejects_leading_zero() {
        let doc = json!({"creds": {"me": {"id": "0700000001:1"}}});
        // Falls through to NoPhone since no other strategy matches either.
        assert!(matches!(extract(&doc).unwrap_err(), CredentialError::NoPhone));
    }

    #[test]
    fn extraction_is_idempotent_on_normalized_blob() {
        let doc = json!({"creds": {"me": {"id": "254700000008:1"}}});
        let phone = extract(&doc).unwrap();
        assert_eq!(extract(&doc).unwrap(), phone);
    }
}
