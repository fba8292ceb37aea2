//! # Jamroom Bot Library
//!
//! Per-guild playback session controller for a chat-platform music bot.
//!
//! **Purpose:** Own each guild's track queue and transport state, serialize
//! user actions (buttons, prefix commands) against it, drive queue
//! progression from audio engine events, and keep playback going with
//! autoplay when the queue runs dry.
//!
//! **Architecture:** the audio layer is an [`engine::AudioEngine`]
//! implementation; results leave as
//! [`OutcomeNotification`](jamroom_common::events::OutcomeNotification)s on
//! a broadcast channel.

pub mod bridge;
pub mod config;
pub mod dispatch;
pub mod engine;
pub mod error;
pub mod playback;
pub mod state;

pub use bridge::EngineEventBridge;
pub use dispatch::{Action, ActionDispatcher, ActionKind};
pub use error::{Error, Result};
pub use state::SharedState;
