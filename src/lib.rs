//! Local dual-store consistency engine for nutrition entries.
//!
//! Keeps a SQLite store of foods, dishes and meals and a flat mirror store
//! (recent list, tombstones, ownership flags, image backups) in agreement.

pub mod assets;
pub mod config;
pub mod db;
pub mod engine;
pub mod mirror;
pub mod ownership;

pub use config::Config;
pub use engine::{Engine, EngineError, ResyncReport};
