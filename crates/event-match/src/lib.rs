//! Quiz scoring, classification, and batch matchmaking for event attendees.

pub mod config;
pub mod error;
pub mod matchmaking;
pub mod telemetry;
