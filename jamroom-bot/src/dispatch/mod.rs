//! User action intake

pub mod action;
pub mod dispatcher;

pub use action::{Action, ActionKind, ActionOrigin};
pub use dispatcher::ActionDispatcher;
