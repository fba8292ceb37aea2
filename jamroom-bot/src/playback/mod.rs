//! Playback sessions, their queues and the session registry

pub mod autoplay;
pub mod queue;
pub mod registry;
pub mod session;
pub mod state;

pub use queue::TrackQueue;
pub use registry::{SessionHandle, SessionRegistry};
pub use session::{Advance, PlaybackSession, SessionConfig};
pub use state::{Autoplay, LoopMode, SessionPhase, SessionState};
