//! # Sector MMO Common
//!
//! Shared types, constants, and utilities for the sector MMO server. This
//! crate defines the core data structures used across all server components:
//! - `world` (persistent character/ship/port/corporation state)
//! - `sector` (warp graph topology and visibility)
//! - `events` (at-least-once event fan-out)
//! - `combat` (deterministic combat resolution)
//! - `dispatcher` (request validation and HTTP surface)

pub mod commodity;
pub mod constants;
pub mod enums;
pub mod errors;
pub mod ids;
pub mod rng;

pub use commodity::*;
pub use constants::*;
pub use enums::*;
pub use errors::*;
pub use ids::*;
pub use rng::{base_seed_from_combat_id, RoundDraw};
