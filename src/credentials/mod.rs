//! Credential & Identity Validator.
//!
//! Pure functions: decode wire string → blob; extract phone; validate
//! structure; cross-check phone against the global registry and local
//! bot table. The cross-check needs the relational store, so it lives
//! here as an async function rather than a pure one, but performs no
//! mutation.

pub mod legacy;
pub mod phone;
pub mod validate;
pub mod wire;

use serde_json::Value;
use sqlx::PgPool;
use thiserror::Error;

use crate::db::repository::{bot, registry};
use crate::error::ErrorCode;

#[derive(Debug, Error)]
pub enum CredentialError {
    #[error("malformed base64 in wire-format credential")]
    BadEncoding,

    #[error("credential payload is not valid JSON")]
    BadJson,

    #[error("credential is missing required fields: {0:?}")]
    MissingFields(Vec<String>),

    #[error("could not extract a canonical phone from the credential")]
    NoPhone,

    #[error("supplied phone {got} does not match credential phone {expected}")]
    PhoneMismatch { expected: String, got: String },

    #[error("phone is already registered on this tenant")]
    DuplicateOnThisTenant,

    #[error("phone is already registered on tenant {0}")]
    DuplicateOnOtherTenant(String),

    #[error("a local bot row exists for this phone with no registry entry; requires operator")]
    InconsistentLocalBot,
}

impl CredentialError {
    pub fn code(&self) -> ErrorCode {
        match self {
            CredentialError::BadEncoding => ErrorCode::BadEncoding,
            CredentialError::BadJson => ErrorCode::BadJson,
            CredentialError::MissingFields(_) => ErrorCode::MissingFields,
            CredentialError::NoPhone => ErrorCode::NoPhone,
            CredentialError::PhoneMismatch { .. } => ErrorCode::PhoneMismatch,
            CredentialError::DuplicateOnThisTenant => ErrorCode::DuplicateOnThisTenant,
            CredentialError::DuplicateOnOtherTenant(_) => ErrorCode::DuplicateOnOtherTenant,
            CredentialError::InconsistentLocalBot => ErrorCode::InconsistentLocalBot,
        }
    }
}

/// Result of decoding + validating + extracting the phone from a
/// wire-format session string (or a pre-parsed blob).
pub struct NormalizedCredential {
    pub blob: Value,
    pub phone: String,
}

/// Runs the full pipeline: decode → structurally validate → extract
/// phone → (optional) compare against a caller-supplied phone.
pub fn validate_and_extract(
    wire_or_blob: &str,
    caller_phone: Option<&str>,
) -> Result<NormalizedCredential, CredentialError> {
    let doc = wire::decode(wire_or_blob)?;
    let normalized = validate::validate_structure(doc)?;
    let phone = phone::extract(&normalized)?;

    if let Some(caller_phone) = caller_phone {
        let caller_digits: String = caller_phone.chars().filter(|c| c.is_ascii_digit()).collect();
        if caller_digits != phone {
            return Err(CredentialError::PhoneMismatch {
                expected: phone,
                got: caller_digits,
            });
        }
    }

    Ok(NormalizedCredential {
        blob: normalized,
        phone,
    })
}

/// Same pipeline, but the input is already a parsed JSON blob rather than
/// a wire-format string (`validateCredentials({sessionString|blob})`).
pub fn validate_and_extract_blob(
    blob: Value,
    caller_phone: Option<&str>,
) -> Result<NormalizedCredential, CredentialError> {
    let normalized = validate::validate_structure(blob)?;
    let phone = phone::extract(&normalized)?;

    if let Some(caller_phone) = caller_phone {
        let caller_digits: String = caller_phone.chars().filter(|c| c.is_ascii_digit()).collect();
        if caller_digits != phone {
            return Err(CredentialError::PhoneMismatch {
                expected: phone,
                got: caller_digits,
            });
        }
    }

    Ok(NormalizedCredential {
        blob: normalized,
        phone,
    })
}

/// Outcome of the registry cross-check ("Registry cross-check").
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistryCheck {
    Available,
    DuplicateOnThisTenant,
    DuplicateOnOtherTenant(String),
    InconsistentLocalBot,
}

/// Cross-checks a phone against the global registry and, failing that,
/// the local bot table.
pub async fn cross_check_registry(
    pool: &PgPool,
    phone: &str,
    current_tenant: &str,
) -> Result<RegistryCheck, sqlx::Error> {
    if let Some(entry) = registry::lookup(pool, phone).await? {
        return Ok(if entry.tenant == current_tenant {
            RegistryCheck::DuplicateOnThisTenant
        } else {
            RegistryCheck::DuplicateOnOtherTenant(entry.tenant)
        });
    }

    if bot::get_by_phone(pool, phone).await?.is_some() {
        return Ok(RegistryCheck::InconsistentLocalBot);
    }

    Ok(RegistryCheck::Available)
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::Engine;
    use base64::engine::general_purpose::STANDARD as BASE64;
    use serde_json::json;

    fn valid_wire(phone_id: &str) -> String {
        let doc = json!({
            "creds": {
                "me": {"id": format!("{phone_id}:1")},
                "noiseKey": "n",
                "signedIdentityKey": "s",
                "signedPreKey": "p",
                "registrationId": 1
            }
        });
        format!("TREKKER~{}", BASE64.encode(serde_json::to_vec(&doc).unwrap()))
    }

    #[test]
    fn clean_path_extracts_phone() {
        let wire = valid_wire("254700000001");
        let result = validate_and_extract(&wire, None).unwrap();
        assert_eq!(result.phone, "254700000001");
    }

    #[test]
    fn phone_mismatch_is_reported() {
        let wire = valid_wire("254700000001");
        let err = validate_and_extract(&wire, Some("254700000002")).unwrap_err();
        assert!(matches!(err, CredentialError::PhoneMismatch { .. }));
    }

    #[test]
    fn decode_encode_roundtrip_is_idempotent() {
        let wire = valid_wire("254700000003");
        let first = validate_and_extract(&wire, None).unwrap();
        let second = validate_and_extract_blob(first.blob.clone(), None).unwrap();
        assert_eq!(first.phone, second.phone);
    }
}
