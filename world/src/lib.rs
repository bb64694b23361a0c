//! Durable world state: characters, ships, ports, corporations, garrisons,
//! salvage, sector contents, combat encounters, and the event log,
//! accessed through the `WorldStore` trait.

pub mod catalog;
pub mod memory;
pub mod model;
pub mod pg;
pub mod store;

pub use memory::MemoryWorldStore;
pub use pg::PgWorldStore;
pub use store::{
    quote_port_prices, MapKnowledgeSummary, PortView, PriceQuote, SectorOccupant, SectorSnapshot,
    StatusPayload, WorldResult, WorldStore,
};
