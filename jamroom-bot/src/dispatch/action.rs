//! User actions and their parsing from buttons and prefix messages

use crate::playback::state::LoopMode;
use chrono::{DateTime, Utc};
use jamroom_common::{GuildId, UserId};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Button ids that only navigate help pages and never reach a session
const NAVIGATION_BUTTONS: &[&str] = &["prefix-commands", "slash-commands", "home"];

/// What the user asked for
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "action")]
pub enum ActionKind {
    Skip,
    Shuffle,
    ToggleLoop,
    SetLoop { mode: LoopMode },
    ToggleAutoplay,
    Previous,
    Pause,
    Resume,
    ShowQueue,
    NowPlaying,
    Play { query: String },
    Stop,
    /// Button id nobody handles
    Unknown { id: String },
}

impl ActionKind {
    /// Parse a control button id
    ///
    /// Navigation buttons return `None`; unrecognized ids become
    /// [`ActionKind::Unknown`] so the user gets an answer.
    pub fn from_button(id: &str) -> Option<Self> {
        if NAVIGATION_BUTTONS.contains(&id) {
            return None;
        }
        let kind = match id {
            "skip" => ActionKind::Skip,
            "shuffle" => ActionKind::Shuffle,
            "loop" => ActionKind::ToggleLoop,
            "autoplay" => ActionKind::ToggleAutoplay,
            "previous" => ActionKind::Previous,
            "pause" => ActionKind::Pause,
            "resume" => ActionKind::Resume,
            "queue" => ActionKind::ShowQueue,
            other => ActionKind::Unknown { id: other.to_string() },
        };
        Some(kind)
    }

    /// Parse a prefix text command such as `!play never gonna give you up`
    ///
    /// Messages from bots, without the prefix, or naming an unknown command
    /// are ignored.
    pub fn from_message(content: &str, prefix: &str, author_is_bot: bool) -> Option<Self> {
        if author_is_bot {
            return None;
        }
        let body = content.trim_start().strip_prefix(prefix)?;
        let mut words = body.split_whitespace();
        let command = words.next()?.to_lowercase();
        let rest: Vec<&str> = words.collect();

        let kind = match command.as_str() {
            "play" | "p" => ActionKind::Play {
                query: rest.join(" "),
            },
            "skip" | "s" => ActionKind::Skip,
            "stop" => ActionKind::Stop,
            "pause" => ActionKind::Pause,
            "resume" => ActionKind::Resume,
            "queue" | "q" => ActionKind::ShowQueue,
            "shuffle" => ActionKind::Shuffle,
            "previous" | "back" => ActionKind::Previous,
            "autoplay" => ActionKind::ToggleAutoplay,
            "nowplaying" | "np" => ActionKind::NowPlaying,
            "loop" => match rest.first() {
                Some(mode) => ActionKind::SetLoop {
                    mode: mode.parse().ok()?,
                },
                None => ActionKind::ToggleLoop,
            },
            _ => return None,
        };
        Some(kind)
    }

    /// Only `play` may create a session
    pub fn requires_session(&self) -> bool {
        !matches!(self, ActionKind::Play { .. })
    }

    pub fn name(&self) -> &'static str {
        match self {
            ActionKind::Skip => "skip",
            ActionKind::Shuffle => "shuffle",
            ActionKind::ToggleLoop => "loop",
            ActionKind::SetLoop { .. } => "set_loop",
            ActionKind::ToggleAutoplay => "autoplay",
            ActionKind::Previous => "previous",
            ActionKind::Pause => "pause",
            ActionKind::Resume => "resume",
            ActionKind::ShowQueue => "queue",
            ActionKind::NowPlaying => "nowplaying",
            ActionKind::Play { .. } => "play",
            ActionKind::Stop => "stop",
            ActionKind::Unknown { .. } => "unknown",
        }
    }
}

/// Where an action came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionOrigin {
    Button,
    Command,
}

/// One user request addressed to a guild's session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Action {
    /// Correlates log lines for one request
    pub id: Uuid,
    pub guild_id: GuildId,
    pub user_id: UserId,
    pub kind: ActionKind,
    pub origin: ActionOrigin,
    pub received_at: DateTime<Utc>,
}

impl Action {
    pub fn new(guild_id: GuildId, user_id: UserId, kind: ActionKind, origin: ActionOrigin) -> Self {
        Self {
            id: Uuid::new_v4(),
            guild_id,
            user_id,
            kind,
            origin,
            received_at: Utc::now(),
        }
    }

    pub fn button(guild_id: GuildId, user_id: UserId, id: &str) -> Option<Self> {
        ActionKind::from_button(id).map(|kind| Self::new(guild_id, user_id, kind, ActionOrigin::Button))
    }

    pub fn command(
        guild_id: GuildId,
        user_id: UserId,
        content: &str,
        prefix: &str,
        author_is_bot: bool,
    ) -> Option<Self> {
        ActionKind::from_message(content, prefix, author_is_bot)
            .map(|kind| Self::new(guild_id, user_id, kind, ActionOrigin::Command))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_buttons() {
        assert_eq!(ActionKind::from_button("skip"), Some(ActionKind::Skip));
        assert_eq!(ActionKind::from_button("loop"), Some(ActionKind::ToggleLoop));
        assert_eq!(ActionKind::from_button("autoplay"), Some(ActionKind::ToggleAutoplay));
        assert_eq!(ActionKind::from_button("queue"), Some(ActionKind::ShowQueue));
    }

    #[test]
    fn test_navigation_buttons_are_ignored() {
        assert_eq!(ActionKind::from_button("home"), None);
        assert_eq!(ActionKind::from_button("prefix-commands"), None);
        assert_eq!(ActionKind::from_button("slash-commands"), None);
    }

    #[test]
    fn test_unknown_button() {
        assert_eq!(
            ActionKind::from_button("volume-up"),
            Some(ActionKind::Unknown {
                id: "volume-up".to_string()
            })
        );
    }

    #[test]
    fn test_play_command_keeps_query() {
        assert_eq!(
            ActionKind::from_message("!play  never gonna   give", "!", false),
            Some(ActionKind::Play {
                query: "never gonna give".to_string()
            })
        );
        assert_eq!(
            ActionKind::from_message("!P", "!", false),
            Some(ActionKind::Play {
                query: String::new()
            })
        );
    }

    #[test]
    fn test_ignored_messages() {
        assert_eq!(ActionKind::from_message("!skip", "!", true), None);
        assert_eq!(ActionKind::from_message("skip", "!", false), None);
        assert_eq!(ActionKind::from_message("!dance", "!", false), None);
        assert_eq!(ActionKind::from_message("!", "!", false), None);
        assert_eq!(ActionKind::from_message("!loop sideways", "!", false), None);
    }

    #[test]
    fn test_loop_command() {
        assert_eq!(ActionKind::from_message("!loop", "!", false), Some(ActionKind::ToggleLoop));
        assert_eq!(
            ActionKind::from_message("!loop queue", "!", false),
            Some(ActionKind::SetLoop {
                mode: LoopMode::Queue
            })
        );
    }

    #[test]
    fn test_custom_prefix() {
        assert_eq!(ActionKind::from_message("?np", "?", false), Some(ActionKind::NowPlaying));
        assert_eq!(ActionKind::from_message("!np", "?", false), None);
    }

    #[test]
    fn test_only_play_creates_sessions() {
        assert!(!ActionKind::Play {
            query: "x".to_string()
        }
        .requires_session());
        assert!(ActionKind::Skip.requires_session());
    }

    #[test]
    fn test_action_serializes_kind_tag() {
        let action = Action::button(GuildId(1), UserId(2), "pause").unwrap();
        let json = serde_json::to_value(&action).unwrap();
        assert_eq!(json["kind"]["action"], "pause");
        assert_eq!(json["origin"], "button");
    }
}
