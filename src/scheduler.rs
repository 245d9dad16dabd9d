//! Daily scheduler.
//!
//! A single actor task owns the schedule. It sleeps until the next occurrence of
//! the configured time of day, runs the job in its own task, and answers
//! queries and reschedule requests from [`SchedulerHandle`]s while it waits.

use async_trait::async_trait;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use thiserror::Error;
use time::{Duration, OffsetDateTime, Time, UtcOffset};
use tokio::sync::{mpsc, oneshot};

/// Result type for scheduled job execution; `Ok` carries a one-line report.
pub type JobResult = Result<String, Box<dyn std::error::Error + Send + Sync>>;

#[async_trait]
pub trait ScheduledJob: Send + Sync {
    fn name(&self) -> &'static str;

    /// Errors are logged; the next daily run still happens.
    async fn execute(&self) -> JobResult;
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ScheduleError {
    #[error("invalid time of day: {0}")]
    InvalidTime(String),
    #[error("job '{0}' is already running")]
    AlreadyRunning(&'static str),
    #[error("job failed: {0}")]
    JobFailed(String),
    #[error("scheduler is not running")]
    Stopped,
}

/// Wall-clock time of day, minute precision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DailyTime(Time);

impl DailyTime {
    pub fn new(hour: u8, minute: u8) -> Result<Self, ScheduleError> {
        Time::from_hms(hour, minute, 0)
            .map(Self)
            .map_err(|_| ScheduleError::InvalidTime(format!("{hour}:{minute}")))
    }

    pub fn hour(&self) -> u8 {
        self.0.hour()
    }

    pub fn minute(&self) -> u8 {
        self.0.minute()
    }
}

impl FromStr for DailyTime {
    type Err = ScheduleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ScheduleError::InvalidTime(s.to_string());
        let (h, m) = s.trim().split_once(':').ok_or_else(invalid)?;
        let hour = h.trim().parse::<u8>().map_err(|_| invalid())?;
        let minute = m.trim().parse::<u8>().map_err(|_| invalid())?;
        Self::new(hour, minute).map_err(|_| invalid())
    }
}

impl fmt::Display for DailyTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.hour(), self.minute())
    }
}

/// First instant strictly after `now` whose wall-clock time in `offset` is `at`.
pub fn next_occurrence(now: OffsetDateTime, at: DailyTime, offset: UtcOffset) -> OffsetDateTime {
    let local = now.to_offset(offset);
    let today = local.replace_time(at.0);
    if today > local {
        today
    } else {
        today + Duration::days(1)
    }
}

enum SchedulerMessage {
    NextRun {
        reply: oneshot::Sender<OffsetDateTime>,
    },
    Reschedule {
        at: DailyTime,
        reply: oneshot::Sender<OffsetDateTime>,
    },
    Trigger {
        reply: oneshot::Sender<Result<String, ScheduleError>>,
    },
}

type TriggerReply = oneshot::Sender<Result<String, ScheduleError>>;

#[derive(Clone)]
pub struct SchedulerHandle {
    sender: mpsc::Sender<SchedulerMessage>,
}

impl SchedulerHandle {
    pub fn is_running(&self) -> bool {
        !self.sender.is_closed()
    }

    pub async fn next_run_time(&self) -> Option<OffsetDateTime> {
        let (reply, rx) = oneshot::channel();
        self.sender
            .send(SchedulerMessage::NextRun { reply })
            .await
            .ok()?;
        rx.await.ok()
    }

    /// Move the daily run to `at`; returns the new next run.
    pub async fn reschedule(&self, at: DailyTime) -> Result<OffsetDateTime, ScheduleError> {
        let (reply, rx) = oneshot::channel();
        self.sender
            .send(SchedulerMessage::Reschedule { at, reply })
            .await
            .map_err(|_| ScheduleError::Stopped)?;
        rx.await.map_err(|_| ScheduleError::Stopped)
    }

    /// Run the job now without touching the daily schedule and wait for its report.
    pub async fn trigger(&self) -> Result<String, ScheduleError> {
        let (reply, rx) = oneshot::channel();
        self.sender
            .send(SchedulerMessage::Trigger { reply })
            .await
            .map_err(|_| ScheduleError::Stopped)?;
        rx.await.map_err(|_| ScheduleError::Stopped)?
    }
}

struct SchedulerActor {
    job: Arc<dyn ScheduledJob>,
    at: DailyTime,
    offset: UtcOffset,
    next_run: OffsetDateTime,
    job_running: bool,
    receiver: mpsc::Receiver<SchedulerMessage>,
    /// Job tasks report here; kept apart so the command channel closes with the last handle.
    completed_tx: mpsc::Sender<bool>,
    completed_rx: mpsc::Receiver<bool>,
}

/// Start the scheduler actor on the current runtime.
pub fn spawn(job: Arc<dyn ScheduledJob>, at: DailyTime, offset: UtcOffset) -> SchedulerHandle {
    let (sender, receiver) = mpsc::channel(32);
    let (completed_tx, completed_rx) = mpsc::channel(4);
    let actor = SchedulerActor {
        job,
        at,
        offset,
        next_run: next_occurrence(OffsetDateTime::now_utc(), at, offset),
        job_running: false,
        receiver,
        completed_tx,
        completed_rx,
    };
    tokio::spawn(actor.run());
    SchedulerHandle { sender }
}

impl SchedulerActor {
    async fn run(mut self) {
        tracing::info!(
            "Scheduler started: '{}' daily at {} (next run {})",
            self.job.name(),
            self.at,
            self.next_run
        );

        loop {
            let wait: std::time::Duration = (self.next_run - OffsetDateTime::now_utc())
                .try_into()
                .unwrap_or_default();

            tokio::select! {
                // Completions first, so a trigger sent after a finished run sees it finished.
                biased;
                Some(success) = self.completed_rx.recv() => {
                    self.job_running = false;
                    if success {
                        tracing::debug!("Job '{}' completed", self.job.name());
                    } else {
                        tracing::error!("Job '{}' failed", self.job.name());
                    }
                }
                msg = self.receiver.recv() => match msg {
                    Some(msg) => self.handle_message(msg),
                    None => break,
                },
                _ = tokio::time::sleep(wait) => {
                    if self.job_running {
                        tracing::info!("Skipping scheduled '{}' run: previous run still active", self.job.name());
                    } else {
                        self.spawn_job(None);
                    }
                    self.next_run = next_occurrence(OffsetDateTime::now_utc(), self.at, self.offset);
                    tracing::info!("Next '{}' run at {}", self.job.name(), self.next_run);
                }
            }
        }

        tracing::info!("Scheduler stopped");
    }

    fn handle_message(&mut self, msg: SchedulerMessage) {
        match msg {
            SchedulerMessage::NextRun { reply } => {
                let _ = reply.send(self.next_run);
            }
            SchedulerMessage::Reschedule { at, reply } => {
                self.at = at;
                self.next_run = next_occurrence(OffsetDateTime::now_utc(), at, self.offset);
                tracing::info!("Schedule updated to {} daily, next run {}", at, self.next_run);
                let _ = reply.send(self.next_run);
            }
            SchedulerMessage::Trigger { reply } => {
                if self.job_running {
                    let _ = reply.send(Err(ScheduleError::AlreadyRunning(self.job.name())));
                } else {
                    self.spawn_job(Some(reply));
                }
            }
        }
    }

    fn spawn_job(&mut self, reply: Option<TriggerReply>) {
        self.job_running = true;
        let job = Arc::clone(&self.job);
        let completed = self.completed_tx.clone();

        tokio::spawn(async move {
            let result = job.execute().await;
            let report = match result {
                Ok(report) => {
                    tracing::info!("Job '{}': {}", job.name(), report);
                    Ok(report)
                }
                Err(e) => {
                    tracing::error!("Job '{}' execution error: {}", job.name(), e);
                    Err(ScheduleError::JobFailed(e.to_string()))
                }
            };
            let _ = completed.send(report.is_ok()).await;
            if let Some(reply) = reply {
                let _ = reply.send(report);
            }
        });
    }
}
