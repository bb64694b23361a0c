//! The combat engine: encounter initiation, action submission, the
//! deterministic round resolver, garrison AI, finalization, and the
//! background deadline tick.

pub mod action;
pub mod broadcast;
pub mod deploy;
pub mod finalize;
pub mod garrison;
pub mod initiate;
pub mod model;
pub mod resolve;
pub mod tick;

pub use action::{ready_to_resolve, submit_action};
pub use broadcast::broadcast_round;
pub use deploy::{leave_fighters, set_garrison_mode};
pub use finalize::finalize;
pub use initiate::{initiate, initiate_from_garrison};
pub use model::{ActionSubmission, CharacterCombatView, FinalizationOutcome, RoundOutcome};
pub use resolve::resolve_round;
pub use tick::{run_due_encounters, spawn_tick_loop};

/// How long an encounter's round stays open before the tick loop forces
/// resolution.
pub fn round_timeout() -> chrono::Duration {
    chrono::Duration::seconds(sector_mmo_common::constants::ROUND_TIMEOUT_SECS)
}
