//! Structural validation.
//!
//! Two accepted shapes: *wrapped* (a `creds` object holding the session
//! keys) and *flat v7* (the session keys at the document root). Flat
//! documents without a `me` object are rewritten into the wrapped shape
//! with an empty key store so downstream phone extraction always sees a
//! `creds` object to look at first.

use serde_json::{Map, Value};

use super::CredentialError;

const REQUIRED_FIELDS: [&str; 4] = [
    "noiseKey",
    "signedIdentityKey",
    "signedPreKey",
    "registrationId",
];

pub fn validate_structure(doc: Value) -> Result<Value, CredentialError> {
    let obj = doc
        .as_object()
        .ok_or_else(|| CredentialError::MissingFields(REQUIRED_FIELDS.iter().map(|f| f.to_string()).collect()))?;

    if let Some(creds) = obj.get("creds").and_then(Value::as_object) {
        check_required_fields(creds)?;
        return Ok(doc);
    }

    // Flat v7: session keys live at the root.
    check_required_fields(obj)?;

    let has_me = obj
        .get("me")
        .and_then(Value::as_object)
        .map(|me| me.contains_key("id") || me.contains_key("lid"))
        .unwrap_or(false);

    if has_me {
        return Ok(doc);
    }

    let mut creds = Map::new();
    for field in REQUIRED_FIELDS {
        creds.insert(field.to_string(), obj[field].clone());
    }

    let mut wrapped = Map::new();
    wrapped.insert("creds".to_string(), Value::Object(creds));
    wrapped.insert("keys".to_string(), Value::Object(Map::new()));
    Ok(Value::Object(wrapped))
}

fn check_required_fields(obj: &Map<String, Value>) -> Result<(), CredentialError> {
    let missing: Vec<String> = REQUIRED_FIELDS
        .iter()
        .filter(|field| !obj.contains_key(**field))
        .map(|field| field.to_string())
        .collect();

    if missing.is_empty() {
        Ok(())
    } else {
        Err(CredentialError::MissingFields(missing))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn session_keys() -> Value {
        json!({
            "noiseKey": "n",
            "signedIdentityKey": "s",
            "signedPreKey": "p",
            "registrationId": 42
        })
    }

    #[test]
    fn wrapped_shape_with_all_fields_passes() {
        let doc = json!({"creds": session_keys()});
        assert_eq!(validate_structure(doc.clone()).unwrap(), doc);
    }

    #[test]
    fn wrapped_shape_missing_field_fails() {
        let mut keys = session_keys();
        keys.as_object_mut().unwrap().remove("noiseKey");
        let doc = json!({"creds": keys});
        let err = validate_structure(doc).unwrap_err();
        match err {
            CredentialError::MissingFields(missing) => {
                assert_eq!(missing, vec!["noiseKey".to_string()]);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn flat_with_me_is_accepted_as_is() {
        let mut doc = session_keys();
        doc.as_object_mut()
            .unwrap()
            .insert("me".to_string(), json!({"id": "254700000001:1"}));
        assert_eq!(validate_structure(doc.clone()).unwrap(), doc);
    }

    #[test]
    fn flat_without_me_is_rewrapped() {
        let doc = session_keys();
        let normalized = validate_structure(doc).unwrap();
        let obj = normalized.as_object().unwrap();
        assert!(obj.contains_key("creds"));
        assert!(obj.contains_key("keys"));
        assert_eq!(obj["creds"]["noiseKey"], "n");
    }

    #[test]
    fn flat_missing_field_fails() {
        let mut keys = session_keys();
        keys.as_object_mut().unwrap().remove("registrationId");
        let err = validate_structure(keys).unwrap_err();
        assert!(matches!(err, CredentialError::MissingFields(_)));
    }
}
