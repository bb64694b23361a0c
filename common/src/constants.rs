//! Tunable server parameters — central, documented defaults, overridable by
//! environment variables read in `dispatcher::config`.

// ========== Combat timing ==========

/// `COMBAT_ROUND_TIMEOUT` default, seconds.
pub const ROUND_TIMEOUT_SECS: i64 = 15;

/// `COMBAT_TICK_BATCH_SIZE` default.
pub const TICK_BATCH_SIZE: usize = 20;

/// Background tick loop interval, seconds.
pub const TICK_INTERVAL_SECS: u64 = 1;

// ========== Combat constants ==========

/// Bracing reduces incoming damage to the bracing participant by this
/// percentage, floor applied before fighter/shield split.
pub const BRACE_DAMAGE_REDUCTION_PCT: u32 = 45;

/// Base flee success chance, percent.
pub const FLEE_BASE_SUCCESS_PCT: u32 = 70;

/// Flee success chance lost per additional hostile with fighters > 0.
pub const FLEE_PENALTY_PER_HOSTILE_PCT: u32 = 5;

/// Floor for flee success chance, percent.
pub const FLEE_MIN_SUCCESS_PCT: u32 = 20;

/// Garrison AI `(mode_base, divisor)` for offensive mode.
pub const GARRISON_OFFENSIVE_MODE_BASE: u64 = 50;
pub const GARRISON_OFFENSIVE_DIVISOR: u64 = 2;

/// Garrison AI `(mode_base, divisor)` for defensive mode.
pub const GARRISON_DEFENSIVE_MODE_BASE: u64 = 25;
pub const GARRISON_DEFENSIVE_DIVISOR: u64 = 4;

/// Garrison AI `(mode_base, divisor)` for toll mode (non-demand rounds).
pub const GARRISON_TOLL_MODE_BASE: u64 = 50;
pub const GARRISON_TOLL_DIVISOR: u64 = 3;

/// Fraction of destroyed-ship credits converted to salvage, percent.
pub const SALVAGE_CREDITS_PCT: u64 = 25;

/// Default salvage expiry, seconds after creation.
pub const SALVAGE_EXPIRY_SECS: i64 = 3600;

// ========== Movement ==========

/// `MOVE_DELAY_SECONDS_PER_TURN` default.
pub const MOVE_DELAY_SECONDS_PER_TURN: u64 = 1;

/// `MOVE_DELAY_SCALE` default (multiplier applied to warp_cost * per-turn delay).
pub const MOVE_DELAY_SCALE: u64 = 1;

// ========== Events / broadcast ==========

/// `EDGE_BROADCAST_RETRIES` default.
pub const MAX_BROADCAST_ATTEMPTS: u32 = 3;

/// `EDGE_BROADCAST_RETRY_DELAY_MS` default.
pub const RETRY_DELAY_MS: u64 = 40;

/// `SUPABASE_OBSERVER_CACHE_TTL_MS` default.
pub const OBSERVER_CACHE_TTL_MS: u64 = 30_000;

// ========== Misc ==========

/// `send_message` content length cap.
pub const CHAT_MESSAGE_MAX_LEN: usize = 512;

/// Sector at which banking and fighter purchases are permitted.
pub const HOME_SECTOR: crate::ids::SectorId = 0;

/// Credits per fighter unit purchased via `purchase_fighters`, and the
/// refund rate applied to a ship's fighters when it's traded in during
/// `ship_purchase`.
pub const FIGHTER_UNIT_PRICE_CREDITS: u64 = 5;
pub const FIGHTER_TRADE_IN_REFUND_PCT: u64 = 50;

/// `list_known_ports` hop cap.
pub const MAX_KNOWN_PORTS_HOPS: u32 = 10;
