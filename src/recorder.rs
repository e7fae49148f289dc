// src/recorder.rs
//! Async driver for a single exercise session
//!
//! One task owns the [`Session`], the location subscription and the store.
//! Location updates, the one-second duration tick and user commands are all
//! handled inside that task's `select!` loop, so the track has exactly one
//! writer and needs no lock. Callers talk to it through a [`RecorderHandle`].

use crate::{
    error::{Result, TrackerError},
    location::{LocationSource, LocationSubscription, PositionSample},
    session::{Session, SessionRecord, SessionState},
    store::SessionStore,
    track::{Thresholds, TrackSnapshot, Verdict},
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::time::Duration;
use tokio::{
    sync::{mpsc, oneshot, watch},
    task::JoinHandle,
    time::{self, Instant, MissedTickBehavior},
};
use tracing::{error, info, warn};

/// Duration timer period
pub const TICK_PERIOD: Duration = Duration::from_secs(1);

const COMMAND_CAPACITY: usize = 16;

/// Live view published after every processed event
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecorderStatus {
    pub state: SessionState,
    pub started_at: Option<DateTime<Utc>>,
    pub snapshot: TrackSnapshot,
    pub rejected_samples: u64,
    /// The location source has stopped delivering samples
    pub source_finished: bool,
}

impl Default for RecorderStatus {
    fn default() -> Self {
        Self {
            state: SessionState::Idle,
            started_at: None,
            snapshot: TrackSnapshot::default(),
            rejected_samples: 0,
            source_finished: false,
        }
    }
}

enum Command {
    Start {
        subscription: LocationSubscription,
        reply: oneshot::Sender<Result<()>>,
    },
    Pause {
        reply: oneshot::Sender<Result<()>>,
    },
    Resume {
        reply: oneshot::Sender<Result<()>>,
    },
    End {
        reply: oneshot::Sender<Result<SessionRecord>>,
    },
    Abandon {
        reply: oneshot::Sender<bool>,
    },
}

pub struct TrackRecorder<S: SessionStore> {
    session: Session,
    store: S,
    subscription: Option<LocationSubscription>,
    rejected_samples: u64,
    source_finished: bool,
    /// Millisecond stamp behind the last record id handed out
    last_id_ms: i64,
    status_tx: watch::Sender<RecorderStatus>,
}

impl<S: SessionStore> TrackRecorder<S> {
    /// Spawn the recorder task and return a handle to it
    pub fn spawn(thresholds: Thresholds, store: S) -> RecorderHandle {
        let (cmd_tx, cmd_rx) = mpsc::channel(COMMAND_CAPACITY);
        let (status_tx, status_rx) = watch::channel(RecorderStatus::default());

        let recorder = Self {
            session: Session::new(thresholds),
            store,
            subscription: None,
            rejected_samples: 0,
            source_finished: false,
            last_id_ms: i64::MIN,
            status_tx,
        };
        let task = tokio::spawn(recorder.run(cmd_rx));

        RecorderHandle {
            commands: cmd_tx,
            status: status_rx,
            task,
        }
    }

    async fn run(mut self, mut commands: mpsc::Receiver<Command>) {
        let mut ticker = time::interval_at(Instant::now() + TICK_PERIOD, TICK_PERIOD);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            let running = self.session.state() == SessionState::Running;

            tokio::select! {
                biased;

                sample = next_sample(&mut self.subscription) => {
                    match sample {
                        Some(sample) => self.handle_sample(sample),
                        None => {
                            warn!("location source finished");
                            self.subscription = None;
                            self.source_finished = true;
                        }
                    }
                    self.publish();
                }
                _ = ticker.tick(), if running => {
                    self.session.on_tick();
                    self.publish();
                }
                command = commands.recv() => match command {
                    Some(command) => self.handle_command(command, &mut ticker),
                    None => break,
                },
            }
        }

        // Handle dropped: nothing can end the session any more
        if self.session.abandon() {
            warn!("recorder shut down with an unfinished session");
        }
        self.subscription = None;
    }

    fn handle_sample(&mut self, sample: PositionSample) {
        if let Some(Verdict::Rejected(_)) = self.session.on_sample(sample) {
            self.rejected_samples += 1;
        }
    }

    /// Apply a command. The new status is published before the reply is
    /// sent, so a caller sees it as soon as its request returns.
    fn handle_command(&mut self, command: Command, ticker: &mut time::Interval) {
        match command {
            Command::Start { subscription, reply } => {
                let result = self.session.start(Utc::now());
                if result.is_ok() {
                    self.subscription = Some(subscription);
                    self.rejected_samples = 0;
                    self.source_finished = false;
                    ticker.reset();
                }
                self.publish();
                let _ = reply.send(result);
            }
            Command::Pause { reply } => {
                let result = self.session.pause();
                self.publish();
                let _ = reply.send(result);
            }
            Command::Resume { reply } => {
                let result = self.session.resume();
                if result.is_ok() {
                    ticker.reset();
                }
                self.publish();
                let _ = reply.send(result);
            }
            Command::End { reply } => {
                let result = self.end();
                self.publish();
                let _ = reply.send(result);
            }
            Command::Abandon { reply } => {
                self.subscription = None;
                let dropped = self.session.abandon();
                self.publish();
                let _ = reply.send(dropped);
            }
        }
    }

    /// Creation time for the next record, at least one millisecond after the
    /// previous one so that record ids never repeat.
    fn next_created_at(&mut self) -> DateTime<Utc> {
        let now = Utc::now();
        let now_ms = now.timestamp_millis();
        let ms = now_ms.max(self.last_id_ms.saturating_add(1));
        self.last_id_ms = ms;
        now + chrono::Duration::milliseconds(ms - now_ms)
    }

    fn end(&mut self) -> Result<SessionRecord> {
        let created_at = self.next_created_at();
        let record = self.session.end(created_at)?;
        self.subscription = None;

        match self.store.append(&record) {
            Ok(()) => Ok(record),
            Err(e) => {
                error!(id = %record.id, "failed to save session: {}", e);
                Err(TrackerError::Persistence {
                    record: Box::new(record),
                    source: Box::new(e),
                })
            }
        }
    }

    fn status(&self) -> RecorderStatus {
        RecorderStatus {
            state: self.session.state(),
            started_at: self.session.started_at(),
            snapshot: self.session.snapshot(),
            rejected_samples: self.rejected_samples,
            source_finished: self.source_finished,
        }
    }

    fn publish(&self) {
        self.status_tx.send_replace(self.status());
    }
}

/// Next sample from the active subscription; pending forever without one
async fn next_sample(subscription: &mut Option<LocationSubscription>) -> Option<PositionSample> {
    match subscription {
        Some(sub) => sub.next().await,
        None => std::future::pending().await,
    }
}

/// Cheap handle for controlling a running recorder
pub struct RecorderHandle {
    commands: mpsc::Sender<Command>,
    status: watch::Receiver<RecorderStatus>,
    task: JoinHandle<()>,
}

impl RecorderHandle {
    async fn request<T>(&self, make: impl FnOnce(oneshot::Sender<T>) -> Command) -> Result<T> {
        let (tx, rx) = oneshot::channel();
        self.commands
            .send(make(tx))
            .await
            .map_err(|_| TrackerError::RecorderClosed)?;
        rx.await.map_err(|_| TrackerError::RecorderClosed)
    }

    /// Open `source` and start a session on it.
    ///
    /// A refused location permission is returned as `PermissionDenied` and
    /// the recorder stays idle.
    pub async fn start(&self, source: &LocationSource) -> Result<()> {
        let state = self.status().state;
        if state != SessionState::Idle {
            return Err(TrackerError::InvalidTransition {
                state: state.as_str(),
                command: "start",
            });
        }

        let subscription = source.subscribe().await.map_err(|e| {
            if e.is_permission_denied() {
                warn!("cannot start session: {}", e);
            }
            e
        })?;
        info!("recording from {}", source.describe());
        self.start_with(subscription).await
    }

    /// Start a session fed by an already open subscription
    pub async fn start_with(&self, subscription: LocationSubscription) -> Result<()> {
        self.request(|reply| Command::Start { subscription, reply }).await?
    }

    pub async fn pause(&self) -> Result<()> {
        self.request(|reply| Command::Pause { reply }).await?
    }

    pub async fn resume(&self) -> Result<()> {
        self.request(|reply| Command::Resume { reply }).await?
    }

    /// Toggle between running and paused
    pub async fn toggle_pause(&self) -> Result<()> {
        match self.status().state {
            SessionState::Paused => self.resume().await,
            _ => self.pause().await,
        }
    }

    /// Finish the session and save its record.
    ///
    /// If saving fails the error is `Persistence`, carrying the record.
    pub async fn end(&self) -> Result<SessionRecord> {
        self.request(|reply| Command::End { reply }).await?
    }

    /// Discard the current session without saving anything. Returns whether
    /// an unfinished track was dropped.
    pub async fn abandon(&self) -> Result<bool> {
        self.request(|reply| Command::Abandon { reply }).await
    }

    /// Latest published status
    pub fn status(&self) -> RecorderStatus {
        self.status.borrow().clone()
    }

    /// Receiver that is notified on every status change
    pub fn subscribe_status(&self) -> watch::Receiver<RecorderStatus> {
        self.status.clone()
    }

    /// Stop the recorder task. An unfinished session is discarded.
    pub async fn shutdown(self) {
        let RecorderHandle { commands, task, .. } = self;
        drop(commands);
        if let Err(e) = task.await {
            error!("recorder task failed: {}", e);
        }
    }
}
