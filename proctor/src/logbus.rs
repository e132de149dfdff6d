use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use parking_lot::Mutex;
use tokio::sync::broadcast;

use crate::config::LogStreamConfig;
use crate::execution::ExecutionId;
use crate::telemetry;

/// Event delivered to log subscribers.
#[derive(Clone, Debug)]
pub enum LogEvent {
    /// A chunk of streamed console output.
    Chunk(String),
    /// End-of-stream marker: the execution reached a terminal state.
    Completed,
}

#[derive(Debug)]
struct LogChannel {
    sender: broadcast::Sender<LogEvent>,
    history: Mutex<String>,
    completed: AtomicBool,
}

impl LogChannel {
    fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self {
            sender,
            history: Mutex::new(String::new()),
            completed: AtomicBool::new(false),
        }
    }
}

/// Per-execution publish/subscribe bus for streamed log output.
///
/// Fan-out uses one tokio broadcast channel per execution id: publish
/// never waits for subscribers, a subscriber that falls behind observes
/// a gap (`Lagged`) instead of stalling the publisher, and dropped
/// receivers detach themselves. The full chunk sequence is additionally
/// retained per id so that late subscribers can replay what was already
/// emitted; history stays readable after [`complete`](Self::complete).
///
/// Channels are created on first publish or first subscribe and are
/// never evicted — retention ends at process restart.
pub struct LogBus {
    channels: DashMap<ExecutionId, Arc<LogChannel>>,
    config: LogStreamConfig,
}

impl fmt::Debug for LogBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LogBus")
            .field("channels", &self.channels.len())
            .field("channel_capacity", &self.config.channel_capacity)
            .field("idle_timeout_secs", &self.config.idle_timeout_secs)
            .finish()
    }
}

impl Default for LogBus {
    fn default() -> Self {
        Self::new(LogStreamConfig::default())
    }
}

impl LogBus {
    pub fn new(config: LogStreamConfig) -> Self {
        Self {
            channels: DashMap::new(),
            config,
        }
    }

    fn channel(&self, id: ExecutionId) -> Arc<LogChannel> {
        self.channels
            .entry(id)
            .or_insert_with(|| Arc::new(LogChannel::new(self.config.channel_capacity)))
            .clone()
    }

    /// Append `chunk` to the retained history for `id` and forward it to
    /// every attached subscription.
    ///
    /// Never fails and never blocks on subscribers: with no receivers
    /// the chunk is only captured, and lagging receivers are left to
    /// observe a gap on their side.
    pub fn publish(&self, id: ExecutionId, chunk: impl Into<String>) {
        let chunk = chunk.into();
        let channel = self.channel(id);
        // The history lock spans append and send so a concurrent
        // subscriber snapshots either before both or after both — a
        // chunk is never lost or duplicated relative to its replay.
        let mut history = channel.history.lock();
        history.push_str(&chunk);
        let _ = channel.sender.send(LogEvent::Chunk(chunk));
        drop(history);
        telemetry::record_chunk_published(id.to_string());
    }

    /// Attach a new subscription for `id`.
    ///
    /// The subscription first replays everything published so far as a
    /// single backlog chunk, then yields live chunks in publish order.
    /// Never fails; subscribing to an id that never published simply
    /// starts with an empty backlog.
    pub fn subscribe(&self, id: ExecutionId) -> LogSubscription {
        let channel = self.channel(id);
        let (replay, receiver, completed) = {
            let history = channel.history.lock();
            (
                history.clone(),
                channel.sender.subscribe(),
                channel.completed.load(Ordering::SeqCst),
            )
        };
        telemetry::record_subscriber_attached(id.to_string());
        LogSubscription {
            execution_id: id,
            replay: (!replay.is_empty()).then_some(replay),
            receiver,
            completed,
            idle_timeout: self.config.idle_timeout(),
        }
    }

    /// Signal end-of-stream to every attached subscription for `id`.
    ///
    /// Subscribers drain and terminate; the captured history remains
    /// readable. Idempotent; completing an id without a channel is a
    /// no-op.
    pub fn complete(&self, id: ExecutionId) {
        let Some(channel) = self.channels.get(&id).map(|entry| Arc::clone(entry.value())) else {
            tracing::debug!(execution = %id, "completing stream without a channel");
            return;
        };
        let history = channel.history.lock();
        channel.completed.store(true, Ordering::SeqCst);
        let _ = channel.sender.send(LogEvent::Completed);
        drop(history);
        tracing::debug!(execution = %id, "log streaming completed");
    }

    /// Everything published for `id` so far, concatenated.
    ///
    /// Returns an empty string for unknown ids; never fails.
    pub fn captured(&self, id: ExecutionId) -> String {
        self.channels
            .get(&id)
            .map(|channel| channel.history.lock().clone())
            .unwrap_or_default()
    }

    /// Number of live subscriptions for `id`.
    pub fn subscriber_count(&self, id: ExecutionId) -> usize {
        self.channels
            .get(&id)
            .map(|channel| channel.sender.receiver_count())
            .unwrap_or(0)
    }

    /// Whether streaming for `id` has been completed.
    pub fn is_completed(&self, id: ExecutionId) -> bool {
        self.channels
            .get(&id)
            .map(|channel| channel.completed.load(Ordering::SeqCst))
            .unwrap_or(false)
    }
}

/// Live handle onto one execution's log stream.
///
/// Yields the replayed backlog first, then live chunks in publish
/// order. The stream ends — [`next`](Self::next) returns `None` — on
/// the completion signal, on channel close, or after the configured
/// idle timeout with no traffic.
pub struct LogSubscription {
    execution_id: ExecutionId,
    replay: Option<String>,
    receiver: broadcast::Receiver<LogEvent>,
    completed: bool,
    idle_timeout: Duration,
}

impl fmt::Debug for LogSubscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LogSubscription")
            .field("execution_id", &self.execution_id)
            .field("backlog", &self.replay.as_ref().map(String::len))
            .field("completed", &self.completed)
            .finish()
    }
}

impl LogSubscription {
    pub fn execution_id(&self) -> ExecutionId {
        self.execution_id
    }

    /// Receive the next chunk, or `None` once the stream has ended.
    pub async fn next(&mut self) -> Option<String> {
        if let Some(backlog) = self.replay.take() {
            return Some(backlog);
        }
        if self.completed {
            return None;
        }
        loop {
            match tokio::time::timeout(self.idle_timeout, self.receiver.recv()).await {
                Ok(Ok(LogEvent::Chunk(chunk))) => return Some(chunk),
                Ok(Ok(LogEvent::Completed)) => {
                    self.completed = true;
                    return None;
                }
                Ok(Err(broadcast::error::RecvError::Closed)) => {
                    self.completed = true;
                    return None;
                }
                Ok(Err(broadcast::error::RecvError::Lagged(skipped))) => {
                    tracing::warn!(
                        execution = %self.execution_id,
                        skipped,
                        "log subscription lagged behind publisher"
                    );
                    continue;
                }
                Err(_) => {
                    tracing::warn!(
                        execution = %self.execution_id,
                        idle_secs = self.idle_timeout.as_secs(),
                        "detaching idle log subscription"
                    );
                    self.completed = true;
                    return None;
                }
            }
        }
    }
}

impl Drop for LogSubscription {
    fn drop(&mut self) {
        telemetry::record_subscriber_detached(self.execution_id.to_string());
    }
}
