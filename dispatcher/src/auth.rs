//! Token authentication, admin override, and name→UUID canonicalization.

use uuid::Uuid;

use sector_mmo_common::errors::DispatchError;
use sector_mmo_common::ids::{legacy_name_to_id, CharacterId};

use crate::config::Config;

/// Constant-time byte comparison — never short-circuit on the first
/// mismatching byte, or timing leaks the token length/prefix.
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut diff = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        diff |= x ^ y;
    }
    diff == 0
}

/// Checks the `x-api-token` header against `config.api_token`. An unset
/// (empty) configured token is the local-dev bypass — no auth enforced.
pub fn check_api_token(config: &Config, header_value: Option<&str>) -> Result<(), DispatchError> {
    if config.api_token.is_empty() {
        return Ok(());
    }
    match header_value {
        Some(token) if constant_time_eq(token.as_bytes(), config.api_token.as_bytes()) => Ok(()),
        _ => Err(DispatchError::AuthMissing),
    }
}

/// Resolves a request's `character_id` field to a `CharacterId`: a literal
/// UUID is used as-is, otherwise (when legacy ids are enabled) the trimmed
/// name is hashed into a deterministic id under the configured namespace.
pub fn canonicalize_character_id(
    config: &Config,
    raw: &str,
) -> Result<CharacterId, DispatchError> {
    if let Ok(id) = Uuid::parse_str(raw) {
        return Ok(id);
    }
    if !config.allow_legacy_ids {
        return Err(DispatchError::Validation(format!(
            "'{raw}' is not a valid character id and legacy name lookup is disabled"
        )));
    }
    Ok(legacy_name_to_id(raw, config.legacy_id_namespace))
}

/// Authorizes `actor` to act as `character`: either they are the same id,
/// or `admin_override` is set and the configured admin password hash
/// matches `admin_password_hash`.
pub fn authorize_actor(
    config: &Config,
    actor: CharacterId,
    character: CharacterId,
    admin_override: bool,
    admin_password_hash: Option<&str>,
) -> Result<(), DispatchError> {
    if actor == character {
        return Ok(());
    }
    if admin_override {
        if let (Some(configured), Some(supplied)) =
            (&config.admin_password_hash, admin_password_hash)
        {
            if constant_time_eq(configured.as_bytes(), supplied.as_bytes()) {
                return Ok(());
            }
        }
    }
    Err(DispatchError::AuthForbidden)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config_with_token(token: &str) -> Config {
        Config {
            api_token: token.to_string(),
            ..Config::from_env()
        }
    }

    #[test]
    fn empty_configured_token_bypasses_auth() {
        let config = config_with_token("");
        assert!(check_api_token(&config, None).is_ok());
    }

    #[test]
    fn matching_token_succeeds() {
        let config = config_with_token("s3cret");
        assert!(check_api_token(&config, Some("s3cret")).is_ok());
    }

    #[test]
    fn mismatched_token_fails() {
        let config = config_with_token("s3cret");
        assert!(check_api_token(&config, Some("wrong")).is_err());
        assert!(check_api_token(&config, None).is_err());
    }

    #[test]
    fn legacy_name_canonicalizes_when_enabled() {
        let config = Config::from_env();
        let a = canonicalize_character_id(&config, "Captain Zor").unwrap();
        let b = canonicalize_character_id(&config, "captain zor").unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn literal_uuid_passes_through() {
        let config = Config::from_env();
        let id = Uuid::new_v4();
        let resolved = canonicalize_character_id(&config, &id.to_string()).unwrap();
        assert_eq!(resolved, id);
    }

    #[test]
    fn self_action_is_always_authorized() {
        let config = Config::from_env();
        let id = Uuid::new_v4();
        assert!(authorize_actor(&config, id, id, false, None).is_ok());
    }

    #[test]
    fn cross_actor_without_override_is_forbidden() {
        let config = Config::from_env();
        assert!(
            authorize_actor(&config, Uuid::new_v4(), Uuid::new_v4(), false, None).is_err()
        );
    }
}
