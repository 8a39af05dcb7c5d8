//! Steam library reconciliation - shared modules for the CLI.
//!
//! Joins a user's owned games with achievement rarity and completion data
//! from the Steam Web API and completionist times from HowLongToBeat, and
//! keeps the results in JSON stores under the data directory.

pub mod config;
pub mod error;
pub mod hltb;
pub mod identity;
pub mod length;
pub mod maintenance;
pub mod models;
pub mod normalize;
pub mod progress;
pub mod scoring;
pub mod sources;
pub mod steam;
pub mod store;
pub mod sync;

#[cfg(test)]
mod testing;
