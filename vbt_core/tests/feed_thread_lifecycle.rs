//! Frame feed thread lifecycle: no leaked threads, prompt shutdown.

use std::time::{Duration, Instant};
use vbt_core::feed::FrameFeed;
use vbt_core::mocks::{FailingSource, SyntheticLift};
use vbt_core::source::ReplaySource;
use vbt_traits::clock::MonotonicClock;

#[test]
fn feed_thread_exits_on_drop() {
    let feed = FrameFeed::spawn(
        FailingSource::default(),
        30,
        Duration::from_millis(100),
        MonotonicClock::new(),
    );
    std::thread::sleep(Duration::from_millis(50));
    let started = Instant::now();
    drop(feed);
    // At most one pacing sleep (33 ms) between shutdown checks.
    assert!(started.elapsed() < Duration::from_secs(1));
}

#[test]
fn multiple_feeds_dont_leak_threads() {
    for _ in 0..10 {
        let feed = FrameFeed::spawn(
            ReplaySource::looping(SyntheticLift::new(1).detections()),
            200,
            Duration::from_millis(10),
            MonotonicClock::new(),
        );
        assert!(feed.next(Duration::from_secs(1)).is_some());
        drop(feed);
    }
}

#[test]
fn finished_after_end_marker_consumed() {
    let feed = FrameFeed::spawn(
        ReplaySource::new(Vec::new()),
        100,
        Duration::from_millis(10),
        MonotonicClock::new(),
    );
    let item = feed.next(Duration::from_secs(1));
    assert_eq!(item, Some(vbt_core::Detection::EndOfStream));
    let deadline = Instant::now() + Duration::from_secs(1);
    while !feed.is_finished() && Instant::now() < deadline {
        std::thread::sleep(Duration::from_millis(1));
    }
    assert!(feed.is_finished());
    assert_eq!(feed.dropped(), 0);
}

#[test]
fn stall_grows_while_source_fails() {
    let feed = FrameFeed::spawn(
        FailingSource::default(),
        100,
        Duration::from_millis(10),
        MonotonicClock::new(),
    );
    std::thread::sleep(Duration::from_millis(60));
    assert!(feed.stalled_for_now() >= 50);
    assert!(feed.try_next().is_none());
}
