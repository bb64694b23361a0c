//! `Config`: all tunables read from the environment, with documented
//! defaults matching `common::constants`.

use sector_mmo_common::ids::DEFAULT_LEGACY_ID_NAMESPACE;
use uuid::Uuid;

fn env_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

#[derive(Debug, Clone)]
pub struct Config {
    /// Shared secret checked against the `x-api-token` header. Empty means
    /// local-dev bypass (no auth enforced).
    pub api_token: String,
    pub combat_round_timeout_secs: i64,
    pub combat_tick_batch_size: u32,
    pub move_delay_seconds_per_turn: u64,
    pub move_delay_scale: u64,
    pub observer_cache_ttl_ms: u64,
    pub broadcast_retries: u32,
    pub broadcast_retry_delay_ms: u64,
    pub allow_legacy_ids: bool,
    pub legacy_id_namespace: Uuid,
    pub admin_password_hash: Option<String>,
}

impl Config {
    /// Loads configuration from the environment, falling back to the
    /// documented defaults for anything unset.
    pub fn from_env() -> Self {
        let admin_password_hash = std::env::var("EDGE_ADMIN_PASSWORD_HASH")
            .ok()
            .or_else(|| {
                std::env::var("EDGE_ADMIN_PASSWORD")
                    .ok()
                    .map(|pw| hex::encode(sha256_bytes(pw.as_bytes())))
            });

        Self {
            api_token: std::env::var("EDGE_API_TOKEN").unwrap_or_default(),
            combat_round_timeout_secs: env_or("COMBAT_ROUND_TIMEOUT", 15),
            combat_tick_batch_size: env_or("COMBAT_TICK_BATCH_SIZE", 20),
            move_delay_seconds_per_turn: env_or("MOVE_DELAY_SECONDS_PER_TURN", 1),
            move_delay_scale: env_or("MOVE_DELAY_SCALE", 1),
            observer_cache_ttl_ms: env_or("SUPABASE_OBSERVER_CACHE_TTL_MS", 30_000),
            broadcast_retries: env_or("EDGE_BROADCAST_RETRIES", 3),
            broadcast_retry_delay_ms: env_or("EDGE_BROADCAST_RETRY_DELAY_MS", 40),
            allow_legacy_ids: env_or("SUPABASE_ALLOW_LEGACY_IDS", true),
            legacy_id_namespace: std::env::var("SUPABASE_LEGACY_ID_NAMESPACE")
                .ok()
                .and_then(|v| Uuid::parse_str(&v).ok())
                .unwrap_or(DEFAULT_LEGACY_ID_NAMESPACE),
            admin_password_hash,
        }
    }
}

fn sha256_bytes(input: &[u8]) -> [u8; 32] {
    use sha2::{Digest, Sha256};
    let mut hasher = Sha256::new();
    hasher.update(input);
    let result = hasher.finalize();
    let mut out = [0u8; 32];
    out.copy_from_slice(&result);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_apply_when_unset() {
        std::env::remove_var("COMBAT_ROUND_TIMEOUT");
        let cfg = Config::from_env();
        assert_eq!(cfg.combat_round_timeout_secs, 15);
        assert_eq!(cfg.combat_tick_batch_size, 20);
    }
}
