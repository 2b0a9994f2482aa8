//! Aviator signal bot
//!
//! Issues a randomized multiplier on request, reveals WIN/CRASH 90 seconds
//! later and pushes a daily per-user win/loss summary.

pub mod config;
pub mod digest;
pub mod lifecycle;
pub mod outcome;
pub mod registry;
pub mod render;
pub mod router;
pub mod scheduler;
pub mod stats;
pub mod telegram;
pub mod transport;
