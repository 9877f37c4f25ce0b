//! Relay paths: chat messages and WebRTC signaling between the two
//! members of a pair.

pub mod chat;
pub mod signaling;
