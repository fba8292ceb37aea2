//! Test helper modules for jamroom-bot integration tests
//!
//! - TestBot: controller wired to a loopback engine with manual event delivery
//! - SlowEngine: loopback engine that sleeps before every call

#![allow(dead_code)]

pub mod slow_engine;
pub mod test_bot;

pub use slow_engine::Delays;
pub use test_bot::{track, TestBot, ALICE, BOB, GUILD};
