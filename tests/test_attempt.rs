mod common;

use std::time::Duration;

use common::{POLL, Rig};
use defuse::config::AttemptConfig;
use defuse::observability::EventEmitter;
use defuse::phase::{ButtonColor, DEFUSED_TEXT, Outcome, PhaseId};
use defuse::sensor::console::ConsoleCommand;
use defuse::verdict::{EndCause, Overall};
use tokio::time::{Instant, sleep};

// ============================================================================
// Full attempts
// ============================================================================

/// Solving every puzzle on the practice layout defuses the device.
#[tokio::test(start_paused = true)]
async fn solving_every_puzzle_defuses() {
    let rig = Rig::start(AttemptConfig::default());

    rig.send("key 1234").await;
    rig.send("unplug 1").await;
    rig.send("unplug 2").await;
    rig.send("toggle 1").await;
    rig.send("toggle 2").await;
    rig.send("press").await;
    rig.settle().await;
    rig.send("release").await;

    let verdict = tokio::time::timeout(Duration::from_secs(5), rig.attempt.wait())
        .await
        .expect("attempt should end");
    assert_eq!(verdict.overall, Overall::Defused);
    assert_eq!(verdict.cause, Some(EndCause::AllSolved));
    assert_eq!(verdict.strikes_remaining, 3);
    assert_eq!(verdict.solved.len(), 4);

    for id in PhaseId::PUZZLES {
        assert_eq!(rig.status(id).text, DEFUSED_TEXT, "{id} should show defused");
    }
    let snapshot = rig.attempt.shutdown().await.unwrap();
    assert_eq!(snapshot.overall, Overall::Defused);
}

/// Two failures with one strike explode the device.
#[tokio::test(start_paused = true)]
async fn exhausting_strikes_explodes() {
    let rig = Rig::start(AttemptConfig {
        strikes: 1,
        ..AttemptConfig::default()
    });

    rig.send("key 9").await;
    rig.settle().await;
    assert_eq!(rig.status(PhaseId::Combination).outcome, Outcome::Failed);
    assert_eq!(rig.attempt.strikes_remaining(), 0);
    assert_eq!(rig.attempt.overall(), Overall::Pending);

    rig.send("unplug 0").await;
    rig.settle().await;
    assert_eq!(rig.status(PhaseId::WirePair).outcome, Outcome::Failed);

    let snapshot = rig.attempt.shutdown().await.unwrap();
    assert_eq!(snapshot.overall, Overall::Exploded);
    assert_eq!(snapshot.cause, Some(EndCause::StrikesExhausted));
}

/// The countdown explodes the device regardless of strikes.
#[tokio::test(start_paused = true)]
async fn countdown_expiry_explodes() {
    let rig = Rig::start(AttemptConfig {
        countdown: Duration::from_secs(3),
        ..AttemptConfig::default()
    });
    let start = Instant::now();

    let verdict = rig.attempt.wait().await;
    assert_eq!(start.elapsed(), Duration::from_secs(3));
    assert_eq!(verdict.overall, Overall::Exploded);
    assert_eq!(verdict.cause, Some(EndCause::TimeExpired));
    assert_eq!(verdict.strikes_remaining, 3);

    let countdown = rig.status(PhaseId::Countdown);
    assert_eq!(countdown.text, "00:00");
    assert_eq!(countdown.outcome, Outcome::Failed);
}

/// Inputs after the verdict is decided change nothing.
#[tokio::test(start_paused = true)]
async fn inputs_after_end_are_ignored() {
    let rig = Rig::start(AttemptConfig {
        countdown: Duration::from_secs(1),
        ..AttemptConfig::default()
    });
    rig.attempt.wait().await;

    rig.send("unplug 0").await;
    rig.send("key 9").await;
    rig.settle().await;

    assert_eq!(rig.status(PhaseId::WirePair).outcome, Outcome::Running);
    assert_eq!(rig.status(PhaseId::Combination).text, "");
    let snapshot = rig.attempt.shutdown().await.unwrap();
    assert_eq!(snapshot.strikes_remaining, 3);
    assert_eq!(snapshot.cause, Some(EndCause::TimeExpired));
}

/// Shutting down a pending attempt leaves the verdict undecided.
#[tokio::test(start_paused = true)]
async fn shutdown_while_pending_interrupts() {
    let rig = Rig::start(AttemptConfig::default());
    sleep(Duration::from_millis(1500)).await;

    let snapshot = rig.attempt.shutdown().await.unwrap();
    assert_eq!(snapshot.overall, Overall::Pending);
    assert_eq!(snapshot.cause, None);
}

// ============================================================================
// Pause
// ============================================================================

/// Pausing freezes the countdown; resuming finishes the interrupted interval.
#[tokio::test(start_paused = true)]
async fn pause_freezes_countdown() {
    let rig = Rig::start(AttemptConfig {
        countdown: Duration::from_secs(10),
        ..AttemptConfig::default()
    });
    let clock = rig.attempt.clock();
    let start = Instant::now();

    sleep(Duration::from_millis(2500)).await;
    assert_eq!(clock.remaining(), Duration::from_secs(8));

    assert!(rig.attempt.pause().paused);
    sleep(Duration::from_secs(5)).await;
    assert_eq!(clock.remaining(), Duration::from_secs(8));
    assert_eq!(rig.status(PhaseId::Countdown).text, "00:08");

    assert!(!rig.attempt.resume().paused);
    let verdict = rig.attempt.wait().await;
    assert_eq!(verdict.cause, Some(EndCause::TimeExpired));
    assert_eq!(start.elapsed(), Duration::from_secs(15));
}

/// Short pauses just before each tick cannot keep the clock from running.
#[tokio::test(start_paused = true)]
async fn repeated_short_pauses_still_count_down() {
    let rig = Rig::start(AttemptConfig {
        countdown: Duration::from_secs(10),
        ..AttemptConfig::default()
    });
    let clock = rig.attempt.clock();

    // 8.5s of unpaused time in total
    for _ in 0..10 {
        sleep(Duration::from_millis(850)).await;
        assert!(rig.attempt.pause().paused);
        sleep(Duration::from_millis(10)).await;
        assert!(!rig.attempt.resume().paused);
    }
    assert_eq!(clock.remaining(), Duration::from_secs(2));

    let start = Instant::now();
    let verdict = rig.attempt.wait().await;
    assert_eq!(verdict.cause, Some(EndCause::TimeExpired));
    assert_eq!(start.elapsed(), Duration::from_millis(1500));
}

/// Puzzles keep working while the countdown is paused.
#[tokio::test(start_paused = true)]
async fn puzzles_run_while_paused() {
    let rig = Rig::start(AttemptConfig::default());
    rig.send("pause").await;

    rig.send("toggle 1").await;
    rig.send("toggle 2").await;
    rig.settle().await;

    assert_eq!(rig.status(PhaseId::ToggleBank).outcome, Outcome::Solved);
    assert!(rig.attempt.verdict().is_paused());
    rig.attempt.shutdown().await.unwrap();
}

/// Each debounced press of the pause key toggles pause.
#[tokio::test(start_paused = true)]
async fn pause_key_toggles_pause() {
    let rig = Rig::start(AttemptConfig {
        pause_key: true,
        ..AttemptConfig::default()
    });

    rig.panel.set_pause_key(true);
    rig.settle().await;
    assert!(rig.attempt.verdict().is_paused());

    // holding the key does not toggle again
    rig.settle().await;
    assert!(rig.attempt.verdict().is_paused());

    rig.panel.set_pause_key(false);
    rig.settle().await;
    rig.panel.set_pause_key(true);
    rig.settle().await;
    assert!(!rig.attempt.verdict().is_paused());
    rig.attempt.shutdown().await.unwrap();
}

/// A one-sample blip on the pause key is filtered out.
#[tokio::test(start_paused = true)]
async fn pause_key_blip_is_ignored() {
    let rig = Rig::start(AttemptConfig {
        pause_key: true,
        ..AttemptConfig::default()
    });
    sleep(POLL / 2).await;

    rig.panel.set_pause_key(true);
    sleep(POLL).await;
    rig.panel.set_pause_key(false);
    rig.settle().await;

    assert!(!rig.attempt.verdict().is_paused());
    rig.attempt.shutdown().await.unwrap();
}

// ============================================================================
// Block
// ============================================================================

/// Blocking the toggle bank solves it; other phases refuse the request.
#[tokio::test(start_paused = true)]
async fn block_forces_toggle_bank() {
    let rig = Rig::start(AttemptConfig::default());

    assert!(rig.attempt.block(PhaseId::ToggleBank));
    assert!(!rig.attempt.block(PhaseId::Combination));
    assert!(!rig.attempt.block(PhaseId::Countdown));
    let reply = rig
        .console
        .apply(&"block wire_pair".parse::<ConsoleCommand>().unwrap())
        .await;
    assert_eq!(reply.as_deref(), Some("wire_pair cannot be blocked"));
    rig.settle().await;

    let toggles = rig.status(PhaseId::ToggleBank);
    assert_eq!(toggles.outcome, Outcome::Solved);
    assert_eq!(toggles.text, DEFUSED_TEXT);
    assert_eq!(rig.status(PhaseId::Combination).outcome, Outcome::Running);
    assert!(rig.attempt.verdict().snapshot().solved.contains(&PhaseId::ToggleBank));
    rig.attempt.shutdown().await.unwrap();
}

// ============================================================================
// Sensor faults
// ============================================================================

/// Reads that fail are treated as "no change".
#[tokio::test(start_paused = true)]
async fn sensor_faults_change_nothing() {
    let rig = Rig::start(AttemptConfig::default());
    rig.settle().await;

    rig.panel.set_fault(true);
    rig.send("unplug 0").await;
    rig.send("toggle 1").await;
    rig.send("toggle 2").await;
    sleep(Duration::from_secs(1)).await;

    assert_eq!(rig.status(PhaseId::WirePair).outcome, Outcome::Running);
    assert_eq!(rig.status(PhaseId::ToggleBank).outcome, Outcome::Running);
    assert_eq!(rig.attempt.strikes_remaining(), 3);

    // the countdown does not read the sensor
    assert_eq!(rig.attempt.clock().remaining(), Duration::from_secs(299));

    rig.send("plug 0").await;
    rig.panel.set_fault(false);
    rig.settle().await;
    assert_eq!(rig.status(PhaseId::WirePair).outcome, Outcome::Running);
    assert_eq!(rig.status(PhaseId::ToggleBank).outcome, Outcome::Solved);
    assert_eq!(rig.attempt.strikes_remaining(), 3);
    rig.attempt.shutdown().await.unwrap();
}

// ============================================================================
// Hold button
// ============================================================================

fn green_five() -> AttemptConfig {
    AttemptConfig {
        button_color: ButtonColor::Green,
        button_digit: Some(5),
        countdown: Duration::from_secs(40),
        ..AttemptConfig::default()
    }
}

/// A green button solves when released with its digit on the seconds
/// (35 left).
#[tokio::test(start_paused = true)]
async fn button_release_on_digit_solves() {
    let rig = Rig::start(green_five());
    rig.send("press").await;
    sleep(Duration::from_millis(5300)).await;
    assert_eq!(rig.status(PhaseId::HoldButton).text, "Pressed");

    rig.send("release").await;
    rig.settle().await;
    assert_eq!(rig.status(PhaseId::HoldButton).outcome, Outcome::Solved);
    assert_eq!(rig.attempt.strikes_remaining(), 3);
    rig.attempt.shutdown().await.unwrap();
}

/// Releasing on the wrong seconds (38 left) costs a strike.
#[tokio::test(start_paused = true)]
async fn button_release_off_digit_fails() {
    let rig = Rig::start(green_five());
    rig.send("press").await;
    sleep(Duration::from_millis(2300)).await;

    rig.send("release").await;
    rig.settle().await;
    let button = rig.status(PhaseId::HoldButton);
    assert_eq!(button.outcome, Outcome::Failed);
    assert_eq!(button.text, "Released");
    assert_eq!(rig.attempt.strikes_remaining(), 2);
    rig.attempt.shutdown().await.unwrap();
}

// ============================================================================
// Events
// ============================================================================

/// The event log records the whole attempt in order.
#[tokio::test(start_paused = true)]
async fn events_record_attempt() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("events.jsonl");
    let rig = Rig::start_with_events(
        AttemptConfig {
            countdown: Duration::from_secs(2),
            ..AttemptConfig::default()
        },
        EventEmitter::from_file(&path).unwrap(),
    );

    rig.send("unplug 3").await;
    rig.settle().await;
    rig.send("pause").await;
    sleep(POLL).await;
    rig.send("pause").await;
    let snapshot = rig.attempt.run_to_end().await.unwrap();
    assert_eq!(snapshot.overall, Overall::Exploded);

    let content = std::fs::read_to_string(&path).unwrap();
    let events: Vec<serde_json::Value> = content
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect();
    let types: Vec<&str> = events
        .iter()
        .map(|e| e["type"].as_str().unwrap())
        .collect();
    assert_eq!(
        types,
        vec![
            "AttemptStarted",
            "PhaseFailed",
            "PauseChanged",
            "PauseChanged",
            "PhaseFailed",
            "AttemptFinished",
        ]
    );
    for (i, event) in events.iter().enumerate() {
        assert_eq!(event["sequence"], i as u64);
    }
    assert_eq!(events[1]["phase"], "wire_pair");
    assert_eq!(events[1]["strikes_remaining"], 2);
    assert_eq!(events[4]["phase"], "countdown");
    assert_eq!(events[5]["cause"], "time_expired");
}
