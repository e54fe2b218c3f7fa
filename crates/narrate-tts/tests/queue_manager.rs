//! Integration tests for the `AudioQueueManager`.
//!
//! The mock engine records every native call and can be scripted to fail, so
//! these tests pin down batching, refill retries, coalescing, voice fallback,
//! drift calibration, and queue-empty filtering without a real synthesizer.

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{EngineCall, MockEngine};
use narrate_core::{NoopEmitter, PlaybackState, Utterance, VoiceParams};
use narrate_tts::queue::{
    AudioQueueManager, DriftCheck, QueueConfig, QueueEmptyVerdict, RefillOutcome,
};
use tokio::time::Instant;

fn manager(engine: &Arc<MockEngine>) -> Arc<AudioQueueManager> {
    Arc::new(AudioQueueManager::new(
        engine.clone(),
        QueueConfig::default(),
        Arc::new(NoopEmitter::new()),
    ))
}

fn utterances(chapter_id: i64, count: usize) -> Vec<Utterance> {
    (0..count)
        .map(|i| Utterance::for_paragraph(chapter_id, i, format!("Paragraph {i}.")))
        .collect()
}

fn voice(name: &str) -> VoiceParams {
    VoiceParams::default().with_voice(Some(name.to_string()))
}

#[tokio::test(start_paused = true)]
async fn first_batch_is_bounded() {
    let engine = MockEngine::new();
    let manager = manager(&engine);

    let dispatched = manager
        .speak_batch(1, utterances(1, 40), VoiceParams::default(), 40)
        .await
        .unwrap();

    assert_eq!(dispatched, 15);
    assert_eq!(manager.state(), PlaybackState::Playing);
    let batches = engine.batches();
    assert_eq!(batches.len(), 1);
    assert_eq!(batches[0].0.len(), 15);
    assert_eq!(batches[0].0[0], "chapter_1_utterance_0");
    assert_eq!(manager.cached_depth().await, 15);
    assert!(manager.is_subscribed());
}

#[tokio::test(start_paused = true)]
async fn refill_waits_for_low_water_mark() {
    let engine = MockEngine::new();
    let manager = manager(&engine);
    manager
        .speak_batch(1, utterances(1, 40), VoiceParams::default(), 40)
        .await
        .unwrap();

    engine.set_queue_size(6);
    assert_eq!(
        manager.refill_queue().await,
        RefillOutcome::Sufficient { depth: 6 }
    );

    engine.set_queue_size(5);
    assert_eq!(manager.refill_queue().await, RefillOutcome::Appended(15));
    let appends = engine.appends();
    assert_eq!(appends.len(), 1);
    assert_eq!(appends[0][0], "chapter_1_utterance_15");
    assert_eq!(manager.session().await.unwrap().cursor_index, 30);
}

#[tokio::test(start_paused = true)]
async fn append_retries_back_off_linearly() {
    let engine = MockEngine::new();
    let manager = manager(&engine);
    manager
        .speak_batch(1, utterances(1, 40), VoiceParams::default(), 40)
        .await
        .unwrap();
    engine.fail_appends(2);

    let start = Instant::now();
    let outcome = manager.refill_queue().await;

    assert_eq!(outcome, RefillOutcome::Appended(15));
    // 150ms after the first failure, 300ms after the second.
    let elapsed = start.elapsed();
    assert!(elapsed >= Duration::from_millis(450), "elapsed {elapsed:?}");
    assert!(elapsed < Duration::from_millis(460), "elapsed {elapsed:?}");
    assert_eq!(engine.appends().len(), 3);
    assert_eq!(manager.diagnostics().append_failures, 2);
}

#[tokio::test(start_paused = true)]
async fn exhausted_appends_with_audio_left_degrade() {
    let engine = MockEngine::new();
    let notices = Arc::new(std::sync::Mutex::new(Vec::<String>::new()));
    let sink = Arc::clone(&notices);
    let manager = Arc::new(
        AudioQueueManager::new(engine.clone(), QueueConfig::default(), Arc::new(NoopEmitter::new()))
            .with_degraded_notice(move |message| sink.lock().unwrap().push(message.to_string())),
    );
    manager
        .speak_batch(1, utterances(1, 40), VoiceParams::default(), 40)
        .await
        .unwrap();
    engine.set_queue_size(3);
    engine.fail_appends(3);

    assert_eq!(manager.refill_queue().await, RefillOutcome::Degraded);
    assert_eq!(manager.state(), PlaybackState::Playing);
    assert_eq!(notices.lock().unwrap().len(), 1);
    // Cursor did not move, the next cycle retries the same items.
    assert_eq!(manager.session().await.unwrap().cursor_index, 15);
}

#[tokio::test(start_paused = true)]
async fn exhausted_appends_on_empty_engine_recover_with_fresh_batch() {
    let engine = MockEngine::new();
    let manager = manager(&engine);
    manager
        .speak_batch(1, utterances(1, 40), VoiceParams::default(), 40)
        .await
        .unwrap();
    engine.fail_appends(3);

    assert_eq!(manager.refill_queue().await, RefillOutcome::Recovered(15));
    let batches = engine.batches();
    assert_eq!(batches.len(), 2);
    assert_eq!(batches[1].0[0], "chapter_1_utterance_15");
    assert_eq!(manager.state(), PlaybackState::Playing);
}

#[tokio::test(start_paused = true)]
async fn concurrent_refills_are_coalesced() {
    let engine = MockEngine::new();
    let manager = manager(&engine);
    manager
        .speak_batch(1, utterances(1, 40), VoiceParams::default(), 40)
        .await
        .unwrap();
    engine.set_append_delay(Duration::from_millis(100));

    let in_flight = {
        let manager = Arc::clone(&manager);
        tokio::spawn(async move { manager.refill_queue().await })
    };
    for _ in 0..5 {
        tokio::task::yield_now().await;
    }

    assert_eq!(manager.refill_queue().await, RefillOutcome::Coalesced);
    assert_eq!(manager.refill_queue().await, RefillOutcome::Coalesced);

    let outcome = in_flight.await.unwrap();
    assert_eq!(outcome, RefillOutcome::Appended(10));
    // One follow-up pass for both coalesced triggers, never in parallel.
    let appends = engine.appends();
    assert_eq!(appends.len(), 2);
    assert_eq!(appends[0][0], "chapter_1_utterance_15");
    assert_eq!(appends[1][0], "chapter_1_utterance_30");
}

#[tokio::test(start_paused = true)]
async fn failing_voice_falls_back_to_system_default() {
    let engine = MockEngine::new();
    let manager = manager(&engine);
    engine.fail_batches(2);

    manager
        .speak_batch(1, utterances(1, 3), voice("alto"), 3)
        .await
        .unwrap();

    let voices: Vec<_> = engine.batches().into_iter().map(|(_, v)| v).collect();
    assert_eq!(
        voices,
        vec![Some("alto".to_string()), Some("alto".to_string()), None]
    );
    assert_eq!(manager.diagnostics().system_voice_fallbacks, 1);
}

#[tokio::test(start_paused = true)]
async fn locked_voice_is_tried_before_system_default() {
    let engine = MockEngine::new();
    let manager = manager(&engine);
    manager
        .speak_batch(1, utterances(1, 3), voice("alto"), 3)
        .await
        .unwrap();
    manager.stop().await;
    engine.clear_calls();
    engine.fail_batches(2);

    manager
        .speak_batch(1, utterances(1, 3), voice("tenor"), 3)
        .await
        .unwrap();

    let voices: Vec<_> = engine.batches().into_iter().map(|(_, v)| v).collect();
    assert_eq!(
        voices,
        vec![
            Some("tenor".to_string()),
            Some("tenor".to_string()),
            Some("alto".to_string()),
        ]
    );
    assert_eq!(manager.diagnostics().fallback_batches, 1);
}

#[tokio::test(start_paused = true)]
async fn batch_failure_leaves_manager_idle() {
    let engine = MockEngine::new();
    let manager = manager(&engine);
    engine.fail_batches(5);

    let result = manager
        .speak_batch(1, utterances(1, 3), VoiceParams::default(), 3)
        .await;

    assert!(result.is_err());
    assert_eq!(manager.state(), PlaybackState::Idle);
    assert!(manager.session().await.is_none());
}

#[tokio::test(start_paused = true)]
async fn drift_beyond_tolerance_resyncs_cache() {
    let engine = MockEngine::new();
    let manager = manager(&engine);
    manager
        .speak_batch(1, utterances(1, 40), VoiceParams::default(), 40)
        .await
        .unwrap();

    engine.set_queue_size(10);
    assert_eq!(
        manager.calibrate_queue_depth().await,
        DriftCheck::WithinTolerance {
            cached: 15,
            actual: 10
        }
    );
    assert_eq!(manager.cached_depth().await, 15);

    engine.set_queue_size(9);
    assert_eq!(
        manager.calibrate_queue_depth().await,
        DriftCheck::Corrected {
            cached: 15,
            actual: 9
        }
    );
    assert_eq!(manager.cached_depth().await, 9);
    assert_eq!(manager.diagnostics().drift_corrections, 1);
}

#[tokio::test(start_paused = true)]
async fn every_tenth_finished_item_calibrates_depth() {
    let engine = MockEngine::new();
    let manager = manager(&engine);
    manager
        .speak_batch(1, utterances(1, 40), VoiceParams::default(), 40)
        .await
        .unwrap();
    engine.set_queue_size(20);

    for _ in 0..9 {
        assert_eq!(
            manager.on_item_finished().await,
            RefillOutcome::Sufficient { depth: 20 }
        );
    }
    assert_eq!(manager.diagnostics().drift_corrections, 0);

    // Cached depth is 19 after the tenth signal; the engine now reports 30.
    engine.set_queue_size(30);
    assert_eq!(
        manager.on_item_finished().await,
        RefillOutcome::Sufficient { depth: 30 }
    );
    assert_eq!(manager.diagnostics().drift_corrections, 1);
    assert_eq!(manager.cached_depth().await, 30);
}

#[tokio::test(start_paused = true)]
async fn stop_keeps_restart_flag_and_full_stop_clears_it() {
    let engine = MockEngine::new();
    let manager = manager(&engine);
    manager
        .speak_batch(1, utterances(1, 3), VoiceParams::default(), 3)
        .await
        .unwrap();
    manager.mark_restart_in_progress();

    assert!(manager.stop().await);
    assert!(manager.is_restart_in_progress());
    assert_eq!(manager.state(), PlaybackState::Idle);
    assert_eq!(engine.calls().last(), Some(&EngineCall::Stop));

    assert!(manager.full_stop().await);
    assert!(!manager.is_restart_in_progress());
}

#[tokio::test(start_paused = true)]
async fn restarting_a_playing_queue_reuses_the_subscription() {
    let engine = MockEngine::new();
    let manager = manager(&engine);
    manager
        .speak_batch(1, utterances(1, 20), VoiceParams::default(), 20)
        .await
        .unwrap();

    manager
        .speak_batch(1, utterances(1, 20).split_off(6), VoiceParams::default(), 20)
        .await
        .unwrap();

    assert!(manager.is_subscribed());
    assert_eq!(manager.state(), PlaybackState::Playing);
    assert_eq!(engine.subscriptions(), 1);
    let batches = engine.batches();
    assert_eq!(batches.len(), 2);
    assert_eq!(batches[1].0[0], "chapter_1_utterance_6");
}

#[tokio::test(start_paused = true)]
async fn queue_empty_during_restart_is_ignored() {
    let engine = MockEngine::new();
    let manager = manager(&engine);
    manager
        .speak_batch(1, utterances(1, 3), VoiceParams::default(), 3)
        .await
        .unwrap();

    manager.mark_restart_in_progress();
    assert_eq!(manager.on_queue_empty().await, QueueEmptyVerdict::Ignored);
    assert_eq!(manager.state(), PlaybackState::Playing);
}

#[tokio::test(start_paused = true)]
async fn queue_empty_with_pending_items_refills() {
    let engine = MockEngine::new();
    let manager = manager(&engine);
    manager
        .speak_batch(1, utterances(1, 20), VoiceParams::default(), 20)
        .await
        .unwrap();

    assert_eq!(
        manager.on_queue_empty().await,
        QueueEmptyVerdict::Refilled(RefillOutcome::Appended(5))
    );
}

#[tokio::test(start_paused = true)]
async fn queue_empty_at_end_of_content_drains() {
    let engine = MockEngine::new();
    let manager = manager(&engine);
    manager
        .speak_batch(1, utterances(1, 3), VoiceParams::default(), 3)
        .await
        .unwrap();

    assert_eq!(manager.on_queue_empty().await, QueueEmptyVerdict::Drained);
    assert_eq!(manager.state(), PlaybackState::Idle);
    assert_eq!(manager.on_queue_empty().await, QueueEmptyVerdict::Ignored);
}

#[tokio::test(start_paused = true)]
async fn start_signals_only_move_forward() {
    let engine = MockEngine::new();
    let manager = manager(&engine);
    manager
        .speak_batch(1, utterances(1, 10), VoiceParams::default(), 10)
        .await
        .unwrap();

    assert_eq!(manager.on_item_started("chapter_1_utterance_4").await, Some(4));
    assert_eq!(manager.on_item_started("chapter_1_utterance_2").await, None);
    assert_eq!(manager.on_item_started("chapter_2_utterance_6").await, None);
    assert_eq!(manager.on_item_started("chapter_1_utterance_5").await, Some(5));

    let progress = manager.progress().await;
    assert_eq!(progress.current, 6);
    assert_eq!(progress.total, 10);
    assert_eq!(progress.percentage, 60);
}

#[tokio::test(start_paused = true)]
async fn pause_halts_engine_and_clears_session() {
    let engine = MockEngine::new();
    let manager = manager(&engine);
    manager
        .speak_batch(1, utterances(1, 3), VoiceParams::default(), 3)
        .await
        .unwrap();

    assert!(manager.pause().await);
    assert_eq!(engine.calls().last(), Some(&EngineCall::Pause));
    assert_eq!(manager.state(), PlaybackState::Idle);
    assert!(manager.session().await.is_none());
}
