//! Shared mutable state for the coordination core.

pub mod core;
pub mod pairs;
pub mod presence;
pub mod queues;

pub use self::core::{Core, EstablishOutcome, StatsSnapshot};
pub use pairs::{PairMember, PairRegistry, PairSnapshot, PairState};
pub use presence::{ConnId, Presence, PresenceError, Session, SessionState};
pub use queues::{EnqueueOutcome, MatchQueues, QueueEntry};
