//! Streaming controller: reconnect cadence, attempt ceiling and refresh out of
//! `Error`, driven by a scripted connector on a paused clock.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures_util::stream::{self, BoxStream, StreamExt};
use relayfeed::transport::stream::StreamConnector;
use relayfeed::{ConnectionState, FailureReason, Feed, MetricsSnapshot, Normalizer, StreamPolicy};
use serde_json::{json, Value};
use tokio::time::sleep;

type Frames = BoxStream<'static, Result<Value, FailureReason>>;
type Log = Arc<Mutex<Vec<(ConnectionState, Option<MetricsSnapshot>)>>>;

/// Connection `n` (1-based) is whatever the script returns for it.
struct Scripted<F> {
    script: F,
    connects: Arc<AtomicUsize>,
}

impl<F> Scripted<F>
where
    F: Fn(usize) -> Result<Frames, FailureReason> + Send + Sync + 'static,
{
    fn new(script: F) -> (Self, Arc<AtomicUsize>) {
        let connects = Arc::new(AtomicUsize::new(0));
        (
            Self {
                script,
                connects: connects.clone(),
            },
            connects,
        )
    }
}

impl<F> StreamConnector for Scripted<F>
where
    F: Fn(usize) -> Result<Frames, FailureReason> + Send + Sync + 'static,
{
    type Conn = Frames;

    async fn connect(&self) -> Result<Frames, FailureReason> {
        let n = self.connects.fetch_add(1, Ordering::SeqCst) + 1;
        (self.script)(n)
    }
}

fn closes_after(frames: Vec<Result<Value, FailureReason>>) -> Frames {
    stream::iter(frames).boxed()
}

fn stays_open(frames: Vec<Result<Value, FailureReason>>) -> Frames {
    stream::iter(frames).chain(stream::pending()).boxed()
}

fn stats(players: u64) -> Result<Value, FailureReason> {
    Ok(json!({ "players": players, "cpu": { "systemLoad": 0.25 } }))
}

fn policy(delay_ms: u64, max: u32) -> StreamPolicy {
    StreamPolicy {
        reconnect_delay: Duration::from_millis(delay_ms),
        max_reconnect_attempts: max,
        failure_threshold: 5,
    }
}

fn record(feed: &Feed) -> Log {
    let log: Log = Arc::new(Mutex::new(Vec::new()));
    let sink = log.clone();
    feed.subscribe(move |state, snap| sink.lock().unwrap().push((state, snap.cloned())));
    log
}

fn states(log: &Log) -> Vec<ConnectionState> {
    log.lock().unwrap().iter().map(|(s, _)| *s).collect()
}

#[tokio::test(start_paused = true)]
async fn reconnects_through_closes_then_goes_online() {
    let (connector, connects) = Scripted::new(|n| {
        if n <= 3 {
            Ok(closes_after(vec![]))
        } else {
            Ok(stays_open(vec![stats(7)]))
        }
    });
    let mut feed = Feed::new();
    let log = record(&feed);
    feed.start_streaming(connector, policy(0, 10), Normalizer::default())
        .unwrap();
    sleep(Duration::from_millis(100)).await;

    assert_eq!(connects.load(Ordering::SeqCst), 4);
    assert_eq!(feed.state(), ConnectionState::Online);
    use ConnectionState::*;
    assert_eq!(
        states(&log),
        vec![Connecting, Offline, Connecting, Offline, Connecting, Offline, Connecting, Online]
    );
    let (_, snap) = log.lock().unwrap().last().cloned().unwrap();
    let snap = snap.unwrap();
    assert_eq!(snap.players.total, 7);
    assert_eq!(snap.cpu.system_load_pct, 25.0);
    // streamed payloads carry no measured round trip
    assert_eq!(snap.ping_ms, None);
    feed.stop();
}

#[tokio::test(start_paused = true)]
async fn exhausted_reconnects_end_in_error_until_refresh() {
    let (connector, connects) =
        Scripted::new(|_| Err(FailureReason::Transport("connection refused".into())));
    let mut feed = Feed::new();
    let log = record(&feed);
    feed.start_streaming(connector, policy(1000, 2), Normalizer::default())
        .unwrap();
    sleep(Duration::from_secs(10)).await;

    assert_eq!(connects.load(Ordering::SeqCst), 3);
    assert_eq!(feed.state(), ConnectionState::Error);
    // no further attempts while in Error
    sleep(Duration::from_secs(60)).await;
    assert_eq!(connects.load(Ordering::SeqCst), 3);

    feed.refresh_now();
    sleep(Duration::from_millis(10)).await;
    assert_eq!(connects.load(Ordering::SeqCst), 4);
    assert_eq!(feed.state(), ConnectionState::Offline);
    let seen = states(&log);
    let error_at = seen.iter().position(|s| *s == ConnectionState::Error).unwrap();
    assert_eq!(
        &seen[error_at..],
        &[ConnectionState::Error, ConnectionState::Connecting, ConnectionState::Offline]
    );
    feed.stop();
}

#[tokio::test(start_paused = true)]
async fn waits_reconnect_delay_between_attempts() {
    let (connector, connects) = Scripted::new(|n| {
        if n == 1 {
            Ok(closes_after(vec![stats(1)]))
        } else {
            Ok(stays_open(vec![stats(2)]))
        }
    });
    let mut feed = Feed::new();
    let log = record(&feed);
    feed.start_streaming(connector, policy(5000, 10), Normalizer::default())
        .unwrap();
    sleep(Duration::from_millis(4_900)).await;
    assert_eq!(connects.load(Ordering::SeqCst), 1);
    assert_eq!(feed.state(), ConnectionState::Offline);
    // the drop still reports the last snapshot
    let (_, snap) = log.lock().unwrap().last().cloned().unwrap();
    assert_eq!(snap.map(|s| s.players.total), Some(1));

    sleep(Duration::from_millis(200)).await;
    assert_eq!(connects.load(Ordering::SeqCst), 2);
    assert_eq!(feed.state(), ConnectionState::Online);
    feed.stop();
}

#[tokio::test(start_paused = true)]
async fn bad_frames_count_as_failures_on_a_live_connection() {
    let (connector, _) = Scripted::new(|_| {
        Ok(stays_open(vec![
            stats(1),
            Err(FailureReason::Parse("expected value".into())),
            stats(2),
        ]))
    });
    let mut feed = Feed::new();
    let log = record(&feed);
    feed.start_streaming(connector, policy(0, 10), Normalizer::default())
        .unwrap();
    sleep(Duration::from_millis(100)).await;

    assert_eq!(feed.state(), ConnectionState::Online);
    assert!(!states(&log).contains(&ConnectionState::Offline));
    feed.stop();
}

#[tokio::test(start_paused = true)]
async fn stop_halts_reconnects() {
    let (connector, connects) = Scripted::new(|_| Ok(closes_after(vec![])));
    let mut feed = Feed::new();
    let log = record(&feed);
    feed.start_streaming(connector, policy(1000, 100), Normalizer::default())
        .unwrap();
    sleep(Duration::from_millis(1500)).await;
    assert_eq!(connects.load(Ordering::SeqCst), 2);

    feed.stop();
    let events = log.lock().unwrap().len();
    sleep(Duration::from_secs(30)).await;
    assert_eq!(connects.load(Ordering::SeqCst), 2);
    assert_eq!(log.lock().unwrap().len(), events);
}
