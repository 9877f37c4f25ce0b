//! Integration test common infrastructure.
//!
//! Provides utilities for spawning driftd instances and driving them with
//! WebSocket test clients speaking the JSON event protocol.

pub mod client;
pub mod server;

#[allow(unused_imports)]
pub use client::TestClient;
#[allow(unused_imports)]
pub use server::{TestServer, TestTuning};
