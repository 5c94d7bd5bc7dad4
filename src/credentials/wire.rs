//! Wire-format decoding.
//!
//! `TREKKER~<base64(json)>`, with the tag optional. The same
//! `base64` + `serde_json` decode idiom used elsewhere for inbound
//! payloads, applied here to a credential blob instead of a chat message.

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde_json::Value;

use super::CredentialError;

const WIRE_PREFIX: &str = "TREKKER~";

/// Decodes a wire-format session string into a parsed JSON document.
pub fn decode(input: &str) -> Result<Value, CredentialError> {
    let trimmed = input.trim();
    let stripped = trimmed.strip_prefix(WIRE_PREFIX).unwrap_or(trimmed);

    let bytes = BASE64
        .decode(stripped)
        .map_err(|_| CredentialError::BadEncoding)?;

    serde_json::from_slice(&bytes).map_err(|_| CredentialError::BadJson)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn encode(doc: &Value) -> String {
        format!("{WIRE_PREFIX}{}", BASE64.encode(serde_json::to_vec(doc).unwrap()))
    }

    #[test]
    fn decodes_tagged_wire_string() {
        let doc = json!({"creds": {"me": {"id": "254700000001:1"}}});
        let wire = encode(&doc);
        assert_eq!(decode(&wire).unwrap(), doc);
    }

    #[test]
    fn decodes_without_tag() {
        let doc = json!({"creds": {}});
        let wire = BASE64.encode(serde_json::to_vec(&doc).unwrap());
        assert_eq!(decode(&wire).unwrap(), doc);
    }

    #[test]
    fn trims_surrounding_whitespace() {
        let doc = json!({"creds": {}});
        let wire = format!("  {}  \n", encode(&doc));
        assert_eq!(decode(&wire).unwrap(), doc);
    }

    #[test]
    fn bad_base64_is_bad_encoding() {
        let err = decode("TREKKER~not-valid-base64!!!").unwrap_err();
        assert!(matches!(err, CredentialError::BadEncoding));
    }

    #[test]
    fn bad_json_is_bad_json() {
        let wire = format!("{WIRE_PREFIX}{}", BASE64.encode(b"not json"));
        let err = decode(&wire).unwrap_err();
        assert!(matches!(err, CredentialError::BadJson));
    }
}
