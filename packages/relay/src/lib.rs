//! Real-time collaboration relay for tutoring sessions.
//!
//! Four WebSocket namespaces (video signaling, whiteboard, code and chat) fan
//! events out to the members of a room, keep short-lived history in an
//! auxiliary store and replicate selected namespaces to other relay instances.

// layers
pub mod domain;
pub mod infrastructure;
pub mod ui;
pub mod usecase;

pub mod config;
pub mod error;
