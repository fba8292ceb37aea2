//! # Jamroom Common Library
//!
//! Shared code for the jamroom bot crates including:
//! - Data model (guild/user/player ids, tracks, search options)
//! - Event types (engine events, outcome notifications, EventBus)
//! - Configuration loading
//! - Common error type

pub mod config;
pub mod error;
pub mod events;
pub mod model;

pub use error::{Error, Result};
pub use model::{GuildId, PlayerId, SearchOptions, Track, UserId};
