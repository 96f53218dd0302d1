//! Feed controller: runs one transport inside a single task, turns its events
//! into snapshots and connection-state transitions, and notifies listeners.
//!
//! All session state lives in that task. The `Feed` handle only sends
//! commands (`Refresh`, `Stop`) and owns the listener hub, so there is exactly
//! one place that mutates counters, baselines and state.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use futures_util::StreamExt;
use tokio::sync::{
    mpsc::{self, UnboundedReceiver, UnboundedSender},
    watch,
};
use tokio::task::JoinHandle;
use tokio::time::{sleep_until, Instant};
use tracing::{debug, error, info, warn};

use crate::config::{FeedConfig, FeedMode};
use crate::error::{FailureReason, FeedError, ReconnectExhausted};
use crate::hub::{Hub, Publisher, SubscriptionId};
use crate::normalize::{CounterBaseline, Normalizer, Sample};
use crate::transport::{
    poll::{HttpSource, PollTransport, StatusSource},
    stream::{Reconnect, StreamConnector, WsConnector},
    TransportEvent,
};
use crate::types::{ConnectionState, MetricsSnapshot};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    pub interval: Duration,
    pub request_timeout: Duration,
    /// Consecutive failures before `Offline`.
    pub failure_threshold: u32,
    /// Liveness re-check cadence while `Offline`.
    pub probe_interval: Duration,
}

impl Default for PollPolicy {
    fn default() -> Self {
        PollPolicy::from(&FeedConfig::default())
    }
}

impl From<&FeedConfig> for PollPolicy {
    fn from(cfg: &FeedConfig) -> Self {
        Self {
            interval: cfg.poll_interval(),
            request_timeout: cfg.request_timeout(),
            failure_threshold: cfg.failure_threshold.max(1),
            probe_interval: cfg.probe_interval(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamPolicy {
    pub reconnect_delay: Duration,
    pub max_reconnect_attempts: u32,
    /// Consecutive bad frames before `Offline` on a connection that stays up.
    pub failure_threshold: u32,
}

impl Default for StreamPolicy {
    fn default() -> Self {
        StreamPolicy::from(&FeedConfig::default())
    }
}

impl From<&FeedConfig> for StreamPolicy {
    fn from(cfg: &FeedConfig) -> Self {
        Self {
            reconnect_delay: cfg.reconnect_delay(),
            max_reconnect_attempts: cfg.max_reconnect_attempts,
            failure_threshold: cfg.failure_threshold.max(1),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    Refresh,
    Stop,
}

struct Running {
    commands: UnboundedSender<Command>,
    task: JoinHandle<()>,
}

/// Handle to a live status feed.
///
/// Subscribe first, then `start`. Dropping the handle stops the feed.
pub struct Feed {
    hub: Hub,
    running: Option<Running>,
}

impl Default for Feed {
    fn default() -> Self {
        Self::new()
    }
}

impl Feed {
    pub fn new() -> Self {
        Self {
            hub: Hub::new(ConnectionState::Offline),
            running: None,
        }
    }

    /// Register a listener for `(state, last snapshot)` on every change.
    ///
    /// Listeners run on the feed task while the hub is locked: keep them short
    /// and do not call `subscribe`/`unsubscribe`/`stop` from inside one.
    pub fn subscribe<F>(&self, listener: F) -> SubscriptionId
    where
        F: Fn(ConnectionState, Option<&MetricsSnapshot>) + Send + Sync + 'static,
    {
        self.hub.subscribe(Arc::new(listener))
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.hub.unsubscribe(id)
    }

    /// Validate `config`, build the matching transport and start feeding.
    pub fn start(&mut self, config: FeedConfig) -> Result<(), FeedError> {
        config.validate()?;
        let normalizer = Normalizer::new(config.aliases.clone(), config.nominal);
        info!(endpoint = %config.endpoint, mode = ?config.mode, "starting feed");
        match config.mode {
            FeedMode::Poll => {
                let source = HttpSource::new(&config)?;
                self.start_polling(source, PollPolicy::from(&config), normalizer)
            }
            FeedMode::Stream => {
                let connector = WsConnector::new(&config)?;
                self.start_streaming(connector, StreamPolicy::from(&config), normalizer)
            }
        }
    }

    pub fn start_polling<S: StatusSource>(
        &mut self,
        source: S,
        policy: PollPolicy,
        normalizer: Normalizer,
    ) -> Result<(), FeedError> {
        let transport = PollTransport::new(source, policy.request_timeout);
        self.spawn(policy.failure_threshold, normalizer, move |session, commands| {
            run_polling(transport, policy, session, commands)
        })
    }

    pub fn start_streaming<C: StreamConnector>(
        &mut self,
        connector: C,
        policy: StreamPolicy,
        normalizer: Normalizer,
    ) -> Result<(), FeedError> {
        self.spawn(policy.failure_threshold, normalizer, move |session, commands| {
            run_streaming(connector, policy, session, commands)
        })
    }

    fn spawn<F, Fut>(
        &mut self,
        threshold: u32,
        normalizer: Normalizer,
        run: F,
    ) -> Result<(), FeedError>
    where
        F: FnOnce(Session, UnboundedReceiver<Command>) -> Fut,
        Fut: Future<Output = ()> + Send + 'static,
    {
        if self.is_running() {
            return Err(FeedError::AlreadyRunning);
        }
        let handle = tokio::runtime::Handle::try_current().map_err(|_| FeedError::NoRuntime)?;
        let (tx, rx) = mpsc::unbounded_channel();
        let session = Session::new(threshold, normalizer, self.hub.activate());
        let task = handle.spawn(run(session, rx));
        self.running = Some(Running { commands: tx, task });
        Ok(())
    }

    /// Halt the feed. Idempotent; once this returns no listener is called again.
    pub fn stop(&mut self) {
        self.hub.deactivate(ConnectionState::Offline);
        if let Some(running) = self.running.take() {
            let _ = running.commands.send(Command::Stop);
            running.task.abort();
            debug!("feed stopped");
        }
    }

    /// Skip any pending wait and attempt one exchange now, resetting the
    /// failure counter. An exchange already in flight is reused, not doubled.
    pub fn refresh_now(&self) {
        match self.running.as_ref() {
            Some(r) => {
                let _ = r.commands.send(Command::Refresh);
            }
            None => debug!("refresh requested while feed is stopped"),
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.as_ref().is_some_and(|r| !r.task.is_finished())
    }

    pub fn state(&self) -> ConnectionState {
        self.hub.state()
    }

    pub fn watch_state(&self) -> watch::Receiver<ConnectionState> {
        self.hub.watch()
    }
}

impl Drop for Feed {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Task-private session state.
struct Session {
    state: ConnectionState,
    failures: u32,
    threshold: u32,
    last: Option<MetricsSnapshot>,
    baseline: CounterBaseline,
    normalizer: Normalizer,
    out: Publisher,
}

impl Session {
    fn new(threshold: u32, normalizer: Normalizer, out: Publisher) -> Self {
        Self {
            state: ConnectionState::Connecting,
            failures: 0,
            threshold,
            last: None,
            baseline: CounterBaseline::default(),
            normalizer,
            out,
        }
    }

    fn publish(&self) {
        self.out.publish(self.state, self.last.as_ref());
    }

    fn set_state(&mut self, next: ConnectionState) {
        if self.state == next {
            return;
        }
        info!(from = %self.state, to = %next, failures = self.failures, "feed state");
        self.state = next;
        self.publish();
    }

    /// Entering a new connection: rates start from a fresh baseline.
    fn begin_connecting(&mut self) {
        self.baseline.reset();
        self.set_state(ConnectionState::Connecting);
    }

    /// Manual refresh: counters and snapshot cleared, always announced.
    fn refresh(&mut self) {
        info!(from = %self.state, "manual refresh");
        self.failures = 0;
        self.last = None;
        self.baseline.reset();
        self.state = ConnectionState::Connecting;
        self.publish();
    }

    fn apply(&mut self, event: TransportEvent) {
        match event {
            TransportEvent::Payload { payload, rtt } => {
                let sample = Sample::now(rtt);
                let snap = self
                    .normalizer
                    .normalize_sample(&payload, &sample, &mut self.baseline);
                debug!(ping_ms = ?snap.ping_ms, players = snap.players.total, "snapshot");
                self.failures = 0;
                self.last = Some(snap);
                if self.state != ConnectionState::Online {
                    info!(from = %self.state, to = %ConnectionState::Online, "feed state");
                }
                self.state = ConnectionState::Online;
                self.publish();
            }
            TransportEvent::Failure(reason) => self.fail(reason),
        }
    }

    fn fail(&mut self, reason: FailureReason) {
        self.failures = self.failures.saturating_add(1);
        warn!(
            reason = %reason.tag(),
            detail = reason.detail().unwrap_or(""),
            failures = self.failures,
            threshold = self.threshold,
            "exchange failed"
        );
        if self.failures >= self.threshold
            && matches!(self.state, ConnectionState::Online | ConnectionState::Connecting)
        {
            self.set_state(ConnectionState::Offline);
        }
    }

    /// Streaming connection gone (or never opened): offline right away.
    fn lost(&mut self, reason: FailureReason) {
        self.failures = self.failures.saturating_add(1);
        warn!(reason = %reason.tag(), detail = reason.detail().unwrap_or(""), "stream lost");
        self.set_state(ConnectionState::Offline);
    }

    fn give_up(&mut self, exhausted: ReconnectExhausted) {
        error!(attempts = exhausted.attempts, "{exhausted}");
        self.set_state(ConnectionState::Error);
    }
}

enum Wake {
    Timer,
    Refresh,
    Stop,
}

/// Sleep until `deadline` (forever when `None`) unless a command arrives first.
async fn wait(deadline: Option<Instant>, commands: &mut UnboundedReceiver<Command>) -> Wake {
    let timer = async {
        match deadline {
            Some(at) => sleep_until(at).await,
            None => std::future::pending::<()>().await,
        }
    };
    tokio::select! {
        _ = timer => Wake::Timer,
        cmd = commands.recv() => match cmd {
            Some(Command::Refresh) => Wake::Refresh,
            Some(Command::Stop) | None => Wake::Stop,
        },
    }
}

/// Drive `fut` to completion while still servicing commands. A refresh that
/// lands mid-exchange resets the session and lets this exchange answer it;
/// the flag reports whether one landed. `None` means stop.
async fn guarded<F: Future>(
    fut: F,
    commands: &mut UnboundedReceiver<Command>,
    session: &mut Session,
) -> Option<(F::Output, bool)> {
    tokio::pin!(fut);
    let mut refreshed = false;
    loop {
        tokio::select! {
            biased;
            out = &mut fut => return Some((out, refreshed)),
            cmd = commands.recv() => match cmd {
                Some(Command::Refresh) => {
                    session.refresh();
                    refreshed = true;
                }
                Some(Command::Stop) | None => return None,
            },
        }
    }
}

/// First tick strictly after `now`, keeping the `anchor` cadence; ticks
/// missed during a slow exchange are skipped rather than queued.
fn next_tick(anchor: Instant, interval: Duration, now: Instant) -> Instant {
    let mut next = anchor + interval;
    while next <= now {
        next += interval;
    }
    next
}

async fn run_polling<S: StatusSource>(
    transport: PollTransport<S>,
    policy: PollPolicy,
    mut session: Session,
    mut commands: UnboundedReceiver<Command>,
) {
    session.publish();

    if transport.has_probe() {
        match guarded(transport.probe(), &mut commands, &mut session).await {
            None => return,
            // a refresh owes an exchange whatever the probe said
            Some((_, true)) => debug!("refresh during startup probe"),
            Some((Ok(()), false)) => info!("relay reachable, polling"),
            Some((Err(reason), false)) => {
                warn!(reason = %reason.tag(), detail = reason.detail().unwrap_or(""), "relay probe failed");
                session.set_state(ConnectionState::Offline);
            }
        }
    }

    let mut deadline = if session.state == ConnectionState::Offline {
        Instant::now() + policy.probe_interval
    } else {
        Instant::now()
    };

    loop {
        let forced = match wait(Some(deadline), &mut commands).await {
            Wake::Stop => return,
            Wake::Refresh => {
                session.refresh();
                true
            }
            Wake::Timer => false,
        };

        if session.state == ConnectionState::Offline && !forced {
            match guarded(transport.probe(), &mut commands, &mut session).await {
                None => return,
                Some((_, true)) => debug!("refresh during retry probe"),
                Some((Ok(()), false)) => {
                    info!("relay reachable again");
                    session.begin_connecting();
                }
                Some((Err(reason), false)) => {
                    debug!(reason = %reason.tag(), "retry probe failed");
                    deadline = Instant::now() + policy.probe_interval;
                    continue;
                }
            }
        }

        let tick = Instant::now();
        let Some((event, _)) = guarded(transport.exchange(), &mut commands, &mut session).await
        else {
            return;
        };
        session.apply(event);

        let now = Instant::now();
        deadline = if session.state == ConnectionState::Offline {
            now + policy.probe_interval
        } else {
            next_tick(tick, policy.interval, now)
        };
    }
}

async fn run_streaming<C: StreamConnector>(
    connector: C,
    policy: StreamPolicy,
    mut session: Session,
    mut commands: UnboundedReceiver<Command>,
) {
    let mut reconnect = Reconnect::new(policy.reconnect_delay, policy.max_reconnect_attempts);
    session.publish();

    loop {
        session.begin_connecting();
        let Some((opened, _)) = guarded(connector.connect(), &mut commands, &mut session).await
        else {
            return;
        };
        match opened {
            Ok(mut conn) => {
                reconnect.on_open();
                debug!("stream open");
                loop {
                    let Some((item, _)) = guarded(conn.next(), &mut commands, &mut session).await
                    else {
                        return;
                    };
                    match item {
                        Some(frame) => session.apply(TransportEvent::from(frame)),
                        None => break,
                    }
                }
                session.lost(FailureReason::Transport("connection closed".into()));
            }
            Err(reason) => session.lost(reason),
        }

        let delay = match reconnect.on_loss() {
            Ok(delay) => delay,
            Err(exhausted) => {
                session.give_up(exhausted);
                match wait(None, &mut commands).await {
                    Wake::Refresh => {
                        session.refresh();
                        reconnect.reset();
                        continue;
                    }
                    Wake::Timer | Wake::Stop => return,
                }
            }
        };

        info!(
            attempt = reconnect.attempts(),
            delay_ms = delay.as_millis() as u64,
            "reconnecting"
        );
        match wait(Some(Instant::now() + delay), &mut commands).await {
            Wake::Stop => return,
            Wake::Refresh => session.refresh(),
            Wake::Timer => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn next_tick_skips_missed_ticks() {
        let t0 = Instant::now();
        let iv = Duration::from_secs(3);
        assert_eq!(next_tick(t0, iv, t0 + Duration::from_secs(1)), t0 + iv);
        // exchange overran two intervals: land on the next boundary, no catch-up burst
        assert_eq!(
            next_tick(t0, iv, t0 + Duration::from_secs(7)),
            t0 + Duration::from_secs(9)
        );
        assert_eq!(next_tick(t0, iv, t0 + iv), t0 + Duration::from_secs(6));
    }
}
