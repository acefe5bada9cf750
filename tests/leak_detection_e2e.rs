#![allow(missing_docs)]
//! Leak detection end-to-end suite.
//!
//! Drives full detection passes against scripted hosts: channel fan-out,
//! mutex chains, timer-guarded waits, global-root conservatism, repeated
//! passes, skip paths, and the exported profile shape.
//!
//! Cross-references:
//!   Classifier unit tests: src/classify.rs
//!   Recorder unit tests:   src/recorder.rs
//!   Snapshot validation:   src/snapshot.rs

use taskleak::test_utils::init_test_logging;
use taskleak::{
    assert_with_log, test_complete, test_phase, CallStack, DetectorConfig, Frame, LeakDetector,
    ModelHost, ResourceKind, SkipReason, TaskId,
};

use std::time::Duration;

// ===========================================================================
// HELPERS
// ===========================================================================

fn detector() -> LeakDetector {
    LeakDetector::new(DetectorConfig::enabled())
}

fn send_stack(line: u32) -> CallStack {
    CallStack::new(vec![
        Frame::new("worker::produce", "src/worker.rs", line),
        Frame::new("main", "src/main.rs", 14),
    ])
}

fn send_site() -> Frame {
    Frame::new("channel.send", "src/sync/channel.rs", 211)
}

fn lock_site() -> Frame {
    Frame::new("mutex.lock", "src/sync/mutex.rs", 90)
}

/// Parent spawns `senders` workers that all send on one unbuffered channel,
/// receives once, then returns. Everyone still parked on the channel is
/// permanently stuck: the only receiver is gone.
fn fan_out_host(senders: u32, distinct_sites: bool) -> (ModelHost, Vec<TaskId>) {
    let mut host = ModelHost::new();
    let channel = host.new_resource(ResourceKind::Channel);

    let mut stuck = Vec::new();
    for i in 0..senders {
        let worker = host.spawn_runnable();
        host.hold(worker, host.resource_object(channel));
        let line = if distinct_sites { 30 + i } else { 30 };
        host.block(worker, &[channel], send_stack(line), send_site());
        stuck.push(worker);
    }

    // The parent received one value and returned; its task is gone and with
    // it the only live reference to the channel.
    let parent = host.spawn_running();
    host.complete(parent);

    (host, stuck)
}

// ===========================================================================
// CHANNEL FAN-OUT
// ===========================================================================

#[test]
fn fan_out_senders_leak_after_parent_returns() {
    init_test_logging();
    test_phase!("fan_out_senders_leak_after_parent_returns");

    let (mut host, stuck) = fan_out_host(3, false);
    let mut detector = detector();
    let result = detector.request_pass(&mut host);

    assert_with_log!(!result.skipped, "pass completed", false, result.skipped);
    assert_with_log!(result.leaked == stuck, "leaked ids", &stuck, &result.leaked);
    assert_with_log!(result.new_samples == 3, "new samples", 3, result.new_samples);

    // Identical blocking stacks aggregate into one sample of count 3.
    let profile = detector.profile().snapshot();
    let samples = profile.samples.len();
    assert_with_log!(samples == 1, "one signature", 1, samples);
    let count = profile.samples[0].count;
    assert_with_log!(count == 3, "aggregated count", 3, count);

    test_complete!("fan_out_senders_leak_after_parent_returns");
}

#[test]
fn fan_out_distinct_call_sites_split_samples() {
    init_test_logging();
    test_phase!("fan_out_distinct_call_sites_split_samples");

    let (mut host, stuck) = fan_out_host(3, true);
    let mut detector = detector();
    let result = detector.request_pass(&mut host);

    assert_with_log!(
        result.leaked.len() == stuck.len(),
        "all senders leaked",
        stuck.len(),
        result.leaked.len()
    );

    // Same primitive, different lines: three signatures of count 1.
    let profile = detector.profile().snapshot();
    let samples = profile.samples.len();
    assert_with_log!(samples == 3, "three signatures", 3, samples);
    let all_ones = profile.samples.iter().all(|sample| sample.count == 1);
    assert_with_log!(all_ones, "each count 1", true, all_ones);

    test_complete!("fan_out_distinct_call_sites_split_samples");
}

#[test]
fn live_receiver_keeps_senders_unreported() {
    init_test_logging();
    test_phase!("live_receiver_keeps_senders_unreported");

    let mut host = ModelHost::new();
    let channel = host.new_resource(ResourceKind::Channel);
    let sender = host.spawn_runnable();
    host.hold(sender, host.resource_object(channel));
    host.block(sender, &[channel], send_stack(30), send_site());

    // A running receiver still holds the channel: the send can complete.
    let receiver = host.spawn_running();
    host.hold(receiver, host.resource_object(channel));

    let mut detector = detector();
    let result = detector.request_pass(&mut host);
    assert_with_log!(result.leaked.is_empty(), "no leaks", 0, result.leaked.len());
    assert_with_log!(
        detector.profile().is_empty(),
        "profile untouched",
        true,
        detector.profile().is_empty()
    );

    test_complete!("live_receiver_keeps_senders_unreported");
}

// ===========================================================================
// MUTEX CHAIN
// ===========================================================================

#[test]
fn mutex_held_by_leaked_holder_leaks_both() {
    init_test_logging();
    test_phase!("mutex_held_by_leaked_holder_leaks_both");

    let mut host = ModelHost::new();
    let mutex = host.new_resource(ResourceKind::Mutex);
    let channel = host.new_resource(ResourceKind::Channel);

    // Holder owns the mutex and parks forever on a channel nobody holds.
    let holder = host.spawn_runnable();
    host.hold(holder, host.resource_object(mutex));
    host.hold(holder, host.resource_object(channel));
    host.block(
        holder,
        &[channel],
        CallStack::new(vec![Frame::new("holder::wait_reply", "src/holder.rs", 52)]),
        send_site(),
    );

    // Contender waits for a mutex that will never unlock.
    let contender = host.spawn_runnable();
    host.hold(contender, host.resource_object(mutex));
    host.block(
        contender,
        &[mutex],
        CallStack::new(vec![Frame::new("contender::enter", "src/contender.rs", 17)]),
        lock_site(),
    );

    let mut detector = detector();
    let result = detector.request_pass(&mut host);

    let mut expected = vec![holder, contender];
    expected.sort_unstable();
    assert_with_log!(result.leaked == expected, "both leaked", &expected, &result.leaked);
    assert_with_log!(result.rounds <= 2, "fixpoint within 2 rounds", 2, result.rounds);

    test_complete!("mutex_held_by_leaked_holder_leaks_both");
}

#[test]
fn wake_chain_fixpoint_stays_within_depth_bound() {
    init_test_logging();
    test_phase!("wake_chain_fixpoint_stays_within_depth_bound");

    // driver (running) holds chan[0]; task[i] waits on chan[i] and holds
    // chan[i+1]. Promotion must ripple down the whole chain, one round per
    // link, and nobody leaks.
    const DEPTH: usize = 4;
    let mut host = ModelHost::new();
    let chans: Vec<_> = (0..DEPTH)
        .map(|_| host.new_resource(ResourceKind::Channel))
        .collect();

    let driver = host.spawn_running();
    host.hold(driver, host.resource_object(chans[0]));

    for i in 0..DEPTH {
        let task = host.spawn_runnable();
        if i + 1 < DEPTH {
            host.hold(task, host.resource_object(chans[i + 1]));
        }
        host.block(task, &[chans[i]], send_stack(40), send_site());
    }

    let mut detector = detector();
    let result = detector.request_pass(&mut host);
    assert_with_log!(result.leaked.is_empty(), "no leaks", 0, result.leaked.len());
    let bound = u32::try_from(DEPTH).expect("small depth") + 1;
    assert_with_log!(result.rounds <= bound, "rounds within D+1", bound, result.rounds);

    test_complete!("wake_chain_fixpoint_stays_within_depth_bound");
}

// ===========================================================================
// TIMERS
// ===========================================================================

#[test]
fn timer_guarded_wait_is_never_reported() {
    init_test_logging();
    test_phase!("timer_guarded_wait_is_never_reported");

    let mut host = ModelHost::new();
    let dead_channel = host.new_resource(ResourceKind::Channel);
    let timer = host.new_resource(ResourceKind::Timer);
    host.set_timer_pending(timer, true);

    // Multiplexed wait: the channel side is hopeless, the timer fires
    // regardless of reachability.
    let task = host.spawn_runnable();
    host.block(
        task,
        &[dead_channel, timer],
        send_stack(61),
        Frame::new("select.wait", "src/sync/select.rs", 33),
    );

    let mut detector = detector();
    let result = detector.request_pass(&mut host);
    assert_with_log!(result.leaked.is_empty(), "timer exempts", 0, result.leaked.len());

    test_complete!("timer_guarded_wait_is_never_reported");
}

#[test]
fn expired_timer_no_longer_exempts() {
    init_test_logging();
    test_phase!("expired_timer_no_longer_exempts");

    let mut host = ModelHost::new();
    let timer = host.new_resource(ResourceKind::Timer);
    // The timer already fired and was not re-armed; nothing else can wake
    // the waiter.
    let task = host.spawn_runnable();
    host.block(
        task,
        &[timer],
        send_stack(70),
        Frame::new("timer.wait", "src/sync/timer.rs", 12),
    );

    let mut detector = detector();
    let result = detector.request_pass(&mut host);
    assert_with_log!(result.leaked == vec![task], "stale timer leaks", task, result.leaked[0]);

    test_complete!("expired_timer_no_longer_exempts");
}

// ===========================================================================
// GLOBAL-ROOT CONSERVATISM
// ===========================================================================

#[test]
fn globally_rooted_resource_suppresses_report() {
    init_test_logging();
    test_phase!("globally_rooted_resource_suppresses_report");

    let mut host = ModelHost::new();
    let channel = host.new_resource(ResourceKind::Channel);
    // A static registry keeps the channel alive even though no code path
    // will ever touch it again. Conservatism wins: documented miss.
    let registry = host.alloc_object();
    host.link(registry, host.resource_object(channel));
    host.add_global(registry);

    let task = host.spawn_runnable();
    host.block(task, &[channel], send_stack(80), send_site());

    let mut detector = detector();
    let result = detector.request_pass(&mut host);
    assert_with_log!(result.leaked.is_empty(), "global exempts", 0, result.leaked.len());
    assert_with_log!(
        detector.profile().is_empty(),
        "nothing recorded",
        true,
        detector.profile().is_empty()
    );

    test_complete!("globally_rooted_resource_suppresses_report");
}

// ===========================================================================
// REPEATED PASSES AND PROFILE LIFECYCLE
// ===========================================================================

#[test]
fn second_identical_pass_records_nothing_new() {
    init_test_logging();
    test_phase!("second_identical_pass_records_nothing_new");

    let (mut host, stuck) = fan_out_host(3, false);
    let mut detector = detector();

    let first = detector.request_pass(&mut host);
    assert_with_log!(first.new_samples == 3, "first pass records", 3, first.new_samples);

    let second = detector.request_pass(&mut host);
    assert_with_log!(second.leaked == stuck, "still leaked", &stuck, &second.leaked);
    assert_with_log!(second.new_samples == 0, "no re-recording", 0, second.new_samples);

    let total = detector.profile().total_count();
    assert_with_log!(total == 3, "profile count stable", 3, total);

    test_complete!("second_identical_pass_records_nothing_new");
}

#[test]
fn profile_reset_does_not_resurrect_reported_tasks() {
    init_test_logging();
    test_phase!("profile_reset_does_not_resurrect_reported_tasks");

    let (mut host, _stuck) = fan_out_host(2, false);
    let mut detector = detector();
    detector.request_pass(&mut host);
    assert_with_log!(
        detector.profile().total_count() == 2,
        "recorded",
        2,
        detector.profile().total_count()
    );

    detector.profile().reset();
    assert_with_log!(
        detector.profile().is_empty(),
        "reset empties",
        true,
        detector.profile().is_empty()
    );

    // Reported-task dedup survives a profile reset.
    let result = detector.request_pass(&mut host);
    assert_with_log!(result.new_samples == 0, "dedup survives reset", 0, result.new_samples);

    test_complete!("profile_reset_does_not_resurrect_reported_tasks");
}

#[test]
fn new_leak_after_earlier_pass_is_recorded_incrementally() {
    init_test_logging();
    test_phase!("new_leak_after_earlier_pass_is_recorded_incrementally");

    let (mut host, _stuck) = fan_out_host(2, false);
    let mut detector = detector();
    detector.request_pass(&mut host);

    // A fresh leak appears between passes.
    let late_channel = host.new_resource(ResourceKind::Channel);
    let late = host.spawn_runnable();
    host.block(late, &[late_channel], send_stack(99), send_site());

    let result = detector.request_pass(&mut host);
    assert_with_log!(result.leaked.len() == 3, "three leaked now", 3, result.leaked.len());
    assert_with_log!(result.new_samples == 1, "only the new one recorded", 1, result.new_samples);

    test_complete!("new_leak_after_earlier_pass_is_recorded_incrementally");
}

#[test]
fn woken_task_is_never_reported() {
    init_test_logging();
    test_phase!("woken_task_is_never_reported");

    let mut host = ModelHost::new();
    let channel = host.new_resource(ResourceKind::Channel);
    let task = host.spawn_runnable();
    host.block(task, &[channel], send_stack(25), send_site());
    // The peer delivered before any pass ran.
    host.wake(task);

    let mut detector = detector();
    let result = detector.request_pass(&mut host);
    assert_with_log!(result.leaked.is_empty(), "woken is live", 0, result.leaked.len());

    test_complete!("woken_task_is_never_reported");
}

// ===========================================================================
// SKIP PATHS
// ===========================================================================

#[test]
fn quiesce_failure_skips_without_publishing() {
    init_test_logging();
    test_phase!("quiesce_failure_skips_without_publishing");

    let (mut host, _stuck) = fan_out_host(2, false);
    host.set_quiesce_result(false);

    let mut detector = detector();
    let result = detector.request_pass(&mut host);
    assert_with_log!(result.skipped, "skipped", true, result.skipped);
    assert_with_log!(
        result.skip_reason == Some(SkipReason::QuiesceTimeout),
        "reason",
        SkipReason::QuiesceTimeout,
        result.skip_reason.expect("skip reason set")
    );
    assert_with_log!(
        detector.profile().is_empty(),
        "nothing published",
        true,
        detector.profile().is_empty()
    );

    // Once the host quiesces again, the same leaks are found.
    host.set_quiesce_result(true);
    let retry = detector.request_pass(&mut host);
    assert_with_log!(retry.leaked.len() == 2, "found on retry", 2, retry.leaked.len());

    test_complete!("quiesce_failure_skips_without_publishing");
}

#[test]
fn inconsistent_waiter_sets_skip_the_pass() {
    init_test_logging();
    test_phase!("inconsistent_waiter_sets_skip_the_pass");

    let (mut host, _stuck) = fan_out_host(2, false);
    // Corrupt one direction of the waiter bookkeeping.
    let channel = host.new_resource(ResourceKind::Channel);
    let bystander = host.spawn_running();
    host.force_waiter(channel, bystander);

    let mut detector = detector();
    let result = detector.request_pass(&mut host);
    assert_with_log!(result.skipped, "skipped", true, result.skipped);
    assert_with_log!(
        result.skip_reason == Some(SkipReason::SnapshotInconsistent),
        "reason",
        SkipReason::SnapshotInconsistent,
        result.skip_reason.expect("skip reason set")
    );
    assert_with_log!(!host.is_paused(), "host resumed", false, host.is_paused());

    test_complete!("inconsistent_waiter_sets_skip_the_pass");
}

#[test]
fn missing_waiter_entries_skip_the_pass() {
    init_test_logging();
    test_phase!("missing_waiter_entries_skip_the_pass");

    let mut host = ModelHost::new();
    let channel = host.new_resource(ResourceKind::Channel);
    let task = host.spawn_runnable();
    host.block(task, &[channel], send_stack(44), send_site());
    // Corrupt the other direction: the task still claims to wait, the
    // resource forgot it.
    host.clear_waiters(channel);

    let mut detector = detector();
    let result = detector.request_pass(&mut host);
    assert_with_log!(result.skipped, "skipped", true, result.skipped);
    assert_with_log!(
        result.skip_reason == Some(SkipReason::SnapshotInconsistent),
        "reason",
        SkipReason::SnapshotInconsistent,
        result.skip_reason.expect("skip reason set")
    );

    test_complete!("missing_waiter_entries_skip_the_pass");
}

#[test]
fn exhausted_budget_discards_partial_results() {
    init_test_logging();
    test_phase!("exhausted_budget_discards_partial_results");

    let (mut host, _stuck) = fan_out_host(3, false);
    let mut detector =
        LeakDetector::new(DetectorConfig::enabled().with_pass_budget(Duration::ZERO));

    let result = detector.request_pass(&mut host);
    assert_with_log!(result.skipped, "skipped", true, result.skipped);
    assert_with_log!(
        result.skip_reason == Some(SkipReason::BudgetExceeded),
        "reason",
        SkipReason::BudgetExceeded,
        result.skip_reason.expect("skip reason set")
    );
    assert_with_log!(result.leaked.is_empty(), "no partial leaks", 0, result.leaked.len());
    assert_with_log!(
        detector.profile().is_empty(),
        "no partial samples",
        true,
        detector.profile().is_empty()
    );
    assert_with_log!(!host.is_paused(), "host resumed", false, host.is_paused());

    test_complete!("exhausted_budget_discards_partial_results");
}

#[test]
fn metrics_track_mixed_outcomes() {
    init_test_logging();
    test_phase!("metrics_track_mixed_outcomes");

    let (mut host, _stuck) = fan_out_host(2, false);
    let mut detector = detector();

    host.set_quiesce_result(false);
    detector.request_pass(&mut host);
    host.set_quiesce_result(true);
    detector.request_pass(&mut host);
    detector.request_pass(&mut host);

    let metrics = detector.metrics();
    assert_with_log!(metrics.passes_skipped.get() == 1, "skips", 1, metrics.passes_skipped.get());
    assert_with_log!(
        metrics.passes_completed.get() == 2,
        "completions",
        2,
        metrics.passes_completed.get()
    );
    assert_with_log!(
        metrics.tasks_reported.get() == 2,
        "reported once each",
        2,
        metrics.tasks_reported.get()
    );
    assert_with_log!(metrics.samples_lost.get() == 0, "no losses", 0, metrics.samples_lost.get());

    test_complete!("metrics_track_mixed_outcomes");
}

// ===========================================================================
// PROFILE EXPORT SHAPE
// ===========================================================================

#[test]
fn exported_profile_matches_sampling_table_shape() {
    init_test_logging();
    test_phase!("exported_profile_matches_sampling_table_shape");

    let (mut host, _stuck) = fan_out_host(2, false);
    let mut detector = detector();
    detector.request_pass(&mut host);

    let snapshot = detector.profile().snapshot();
    let json = serde_json::to_value(&snapshot).expect("profile serializes");

    let samples = json
        .get("samples")
        .and_then(|value| value.as_array())
        .expect("samples table");
    assert_with_log!(samples.len() == 1, "one sample", 1, samples.len());
    assert!(samples[0].get("count").is_some());
    assert!(samples[0].get("location_ids").is_some());

    let locations = json
        .get("locations")
        .and_then(|value| value.as_array())
        .expect("locations table");
    for location in locations {
        for field in ["id", "symbol", "file", "line", "offset"] {
            assert!(location.get(field).is_some(), "location field {field}");
        }
    }

    // The leaf location identifies the blocking primitive.
    let leaf_id = snapshot.samples[0].location_ids[0];
    let leaf = snapshot
        .locations
        .iter()
        .find(|location| location.id == leaf_id)
        .expect("leaf location present");
    assert_with_log!(
        leaf.symbol == "channel.send",
        "leaf is the primitive",
        "channel.send",
        &leaf.symbol
    );

    test_complete!("exported_profile_matches_sampling_table_shape");
}
