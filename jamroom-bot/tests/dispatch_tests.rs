//! Dispatcher admission, failure policy and session lifecycle tests

mod helpers;

use helpers::{track, Delays, TestBot, ALICE, GUILD};
use jamroom_bot::dispatch::{Action, ActionKind, ActionOrigin};
use jamroom_bot::engine::EngineCall;
use jamroom_bot::playback::SessionPhase;
use jamroom_common::config::BotSettings;
use jamroom_common::events::{ErrorKind, OutcomeKind};
use jamroom_common::GuildId;
use std::time::Duration;

#[tokio::test]
async fn test_actions_without_session() {
    let mut bot = TestBot::new();

    for kind in [
        ActionKind::Skip,
        ActionKind::Pause,
        ActionKind::Previous,
        ActionKind::ToggleAutoplay,
        ActionKind::ShowQueue,
    ] {
        let outcome = bot.act(ALICE, kind).await;
        assert_eq!(outcome.error, Some(ErrorKind::NoActiveSession));
    }
    assert!(bot.state.registry.is_empty().await);
}

#[tokio::test]
async fn test_play_argument_errors() {
    let mut bot = TestBot::new();

    let missing = bot.play("   ").await;
    assert_eq!(missing.error, Some(ErrorKind::MissingArgument));

    let nothing = bot.play("does not exist").await;
    assert_eq!(nothing.error, Some(ErrorKind::NoResults));
    assert_eq!(nothing.message, "No results found for `does not exist`!");

    bot.with_session(|s| assert_eq!(s.phase(), SessionPhase::Idle)).await;
}

#[tokio::test]
async fn test_unknown_button() {
    let bot = TestBot::new();
    bot.catalogue("one", &track("t1"));
    bot.dispatcher
        .dispatch(Action::new(
            GUILD,
            ALICE,
            ActionKind::Play {
                query: "one".to_string(),
            },
            ActionOrigin::Command,
        ))
        .await;

    let action = Action::button(GUILD, ALICE, "volume-up").unwrap();
    let outcome = bot.dispatcher.dispatch(action).await;
    assert_eq!(outcome.kind, OutcomeKind::Error);
    assert_eq!(outcome.error, Some(ErrorKind::UnknownAction));
    assert_eq!(outcome.message, "Unknown action!");

    assert!(Action::button(GUILD, ALICE, "home").is_none());
}

#[tokio::test]
async fn test_stopping_session_rejects_actions() {
    let mut bot = TestBot::new();
    bot.catalogue("one", &track("t1"));
    bot.play("one").await;

    let handle = bot.handle().await.unwrap();
    handle.lock().await.mark_stopping();

    let outcome = bot.act(ALICE, ActionKind::Skip).await;
    assert_eq!(outcome.error, Some(ErrorKind::SessionEnding));
}

#[tokio::test]
async fn test_engine_failure_tears_session_down() {
    let mut bot = TestBot::new();
    bot.catalogue("one", &track("t1"));
    bot.play("one").await;

    bot.engine.set_failing(true);
    let outcome = bot.act(ALICE, ActionKind::Pause).await;

    assert_eq!(outcome.error, Some(ErrorKind::EngineUnavailable));
    assert!(bot.handle().await.is_none());
    assert_eq!(bot.state.engine_failures(), 1);

    // A fresh play starts over once the engine is back
    bot.engine.set_failing(false);
    let again = bot.play("one").await;
    assert_eq!(again.kind, OutcomeKind::Success);
    bot.with_session(|s| assert_eq!(s.phase(), SessionPhase::Playing)).await;
}

#[tokio::test]
async fn test_engine_timeout_tears_session_down() {
    let settings = BotSettings {
        idle_grace: Duration::from_secs(3600),
        engine_timeout: Duration::from_millis(50),
        ..BotSettings::default()
    };
    let delays = Delays {
        pause: Duration::from_millis(500),
        ..Delays::default()
    };
    let mut bot = TestBot::with_delays(settings, delays);
    bot.catalogue("one", &track("t1"));
    bot.play("one").await;

    let outcome = bot.act(ALICE, ActionKind::Pause).await;

    assert_eq!(outcome.error, Some(ErrorKind::EngineUnavailable));
    assert!(outcome.message.contains("pause timed out"), "{}", outcome.message);
    assert!(bot.handle().await.is_none());
    assert_eq!(bot.state.engine_failures(), 1);
    assert!(bot.engine.player_for(GUILD).is_none());
    assert!(!bot
        .engine
        .calls()
        .iter()
        .any(|c| matches!(c, EngineCall::SetPaused { .. })));
}

#[tokio::test]
async fn test_failed_play_leaves_queue_untouched() {
    let mut bot = TestBot::new();
    bot.catalogue("one", &track("t1"));
    bot.catalogue("two", &track("t2"));
    bot.play("one").await;
    bot.play("two").await;

    bot.engine.set_failing(true);
    let handle = bot.handle().await.unwrap();
    let result = handle.lock().await.skip(bot.engine.as_ref()).await;

    assert!(result.is_err());
    let session = handle.lock().await;
    assert_eq!(session.queue().current().map(|t| t.identifier.as_str()), Some("t1"));
    assert_eq!(session.queue().pending_count(), 1);
}

#[tokio::test]
async fn test_concurrent_plays_are_serialized() {
    let bot = TestBot::new();
    let ids: Vec<String> = (0..16).map(|n| format!("song{}", n)).collect();
    for id in &ids {
        bot.catalogue(id, &track(id));
    }

    let mut tasks = Vec::new();
    for id in ids.clone() {
        let dispatcher = bot.dispatcher.clone();
        tasks.push(tokio::spawn(async move {
            let action = Action::new(GUILD, ALICE, ActionKind::Play { query: id }, ActionOrigin::Command);
            dispatcher.dispatch(action).await
        }));
    }
    let mut now_playing = 0;
    for task in tasks {
        let outcome = task.await.unwrap();
        assert_eq!(outcome.kind, OutcomeKind::Success);
        if outcome.message.starts_with("Now playing") {
            now_playing += 1;
        }
    }

    // Exactly one play found the session idle
    assert_eq!(now_playing, 1);
    let handle = bot.handle().await.unwrap();
    let session = handle.lock().await;
    assert_eq!(session.queue().pending_count(), ids.len() - 1);
    let mut seen: Vec<String> = session
        .queue()
        .snapshot()
        .into_iter()
        .chain(session.queue().current().cloned())
        .map(|t| t.identifier)
        .collect();
    seen.sort();
    let mut expected = ids;
    expected.sort();
    assert_eq!(seen, expected);
}

#[tokio::test]
async fn test_guilds_are_independent() {
    let bot = TestBot::new();
    bot.catalogue("one", &track("t1"));

    for guild in [GuildId(1), GuildId(2)] {
        let action = Action::new(
            guild,
            ALICE,
            ActionKind::Play {
                query: "one".to_string(),
            },
            ActionOrigin::Command,
        );
        bot.dispatcher.dispatch(action).await;
    }
    let stop = Action::new(GuildId(1), ALICE, ActionKind::Stop, ActionOrigin::Command);
    bot.dispatcher.dispatch(stop).await;

    assert_eq!(bot.state.registry.guilds().await, vec![GuildId(2)]);
    assert!(bot.engine.player_for(GuildId(2)).is_some());
}

#[tokio::test]
async fn test_idle_session_is_evicted() {
    let mut bot = TestBot::with_settings(BotSettings {
        idle_grace: Duration::from_millis(50),
        ..BotSettings::default()
    });
    bot.catalogue("one", &track("t1"));
    bot.play("one").await;
    bot.finish().await;
    bot.with_session(|s| assert_eq!(s.phase(), SessionPhase::Idle)).await;

    tokio::time::sleep(Duration::from_millis(300)).await;

    assert!(bot.handle().await.is_none());
}

#[tokio::test]
async fn test_restarted_session_survives_eviction_check() {
    let mut bot = TestBot::with_settings(BotSettings {
        idle_grace: Duration::from_millis(50),
        ..BotSettings::default()
    });
    bot.catalogue("one", &track("t1"));
    bot.catalogue("two", &track("t2"));
    bot.play("one").await;
    bot.finish().await;
    bot.play("two").await;

    tokio::time::sleep(Duration::from_millis(300)).await;

    bot.with_session(|s| assert_eq!(s.phase(), SessionPhase::Playing)).await;
}

#[tokio::test]
async fn test_outcomes_are_broadcast() {
    let mut bot = TestBot::new();
    bot.catalogue("one", &track("t1"));
    bot.play("one").await;

    let outcomes = bot.drain_outcomes();
    // Dispatcher result plus the bridge's confirmation of the start
    assert_eq!(outcomes.len(), 2);
    assert!(outcomes.iter().all(|o| o.guild_id == GUILD));
    assert!(outcomes.iter().all(|o| o.track.as_ref().map(|t| t.identifier.as_str()) == Some("t1")));
}
