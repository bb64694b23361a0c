//! Event persistence and fan-out: recipient scoping, the broadcast
//! envelope, and the realtime transport seam.

pub mod broadcaster;
pub mod bus;
pub mod envelope;

pub use broadcaster::{Broadcaster, BroadcastError, HttpBroadcaster, InMemoryBroadcaster};
pub use bus::{EventBus, OutboundEvent};
pub use envelope::{character_topic, sector_topic, BroadcastEnvelope, EventSource, BROADCAST_TOPIC};
