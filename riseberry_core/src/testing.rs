//! Test doubles shared by the unit tests.

use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use error_stack::Report;
use tokio::sync::{oneshot, Notify};

use crate::{
    actor::Player,
    alarm::Clock,
    error::{Result, RiseberryError},
    process::PlaybackOutcome,
};

pub(crate) struct FixedClock(pub DateTime<Utc>);

impl FixedClock {
    pub fn at(rfc3339: &str) -> Self {
        Self(
            DateTime::parse_from_rfc3339(rfc3339)
                .unwrap()
                .with_timezone(&Utc),
        )
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}

#[derive(Default)]
pub(crate) struct RecordingPlayer {
    plays: AtomicUsize,
    stops: AtomicUsize,
    closes: AtomicUsize,
    fail: bool,
    hold: bool,
    release: Arc<Notify>,
}

impl RecordingPlayer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every play fails as if the sound card were missing.
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    /// Every play lasts until the next stop.
    pub fn holding() -> Self {
        Self {
            hold: true,
            ..Self::default()
        }
    }

    pub fn plays(&self) -> usize {
        self.plays.load(Ordering::SeqCst)
    }

    pub fn stops(&self) -> usize {
        self.stops.load(Ordering::SeqCst)
    }

    pub fn closes(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Player for RecordingPlayer {
    async fn queue_play(&self) -> Result<oneshot::Receiver<Result<PlaybackOutcome>>> {
        self.plays.fetch_add(1, Ordering::SeqCst);
        let (reply, pending) = oneshot::channel();
        if self.fail {
            let _ = reply.send(Err(Report::new(RiseberryError::PlaybackFailed {
                status: "exit status: 1".to_string(),
                output: "no sound card".to_string(),
            })));
        } else if self.hold {
            let release = self.release.clone();
            tokio::spawn(async move {
                release.notified().await;
                let _ = reply.send(Ok(PlaybackOutcome::Interrupted));
            });
        } else {
            let _ = reply.send(Ok(PlaybackOutcome::Completed));
        }
        Ok(pending)
    }

    async fn queue_stop(&self) -> Result<oneshot::Receiver<()>> {
        self.stops.fetch_add(1, Ordering::SeqCst);
        if self.hold {
            self.release.notify_one();
        }
        let (reply, pending) = oneshot::channel();
        let _ = reply.send(());
        Ok(pending)
    }

    async fn close(&self) -> Result<()> {
        self.closes.fetch_add(1, Ordering::SeqCst);
        self.stop().await
    }
}
