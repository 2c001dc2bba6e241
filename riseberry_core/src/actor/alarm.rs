use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, Utc};
use serde::Serialize;
use tokio::{
    sync::{mpsc::WeakSender, oneshot},
    task::JoinHandle,
};
use tracing::{debug, error, info, warn};

use super::actor_trait::{Actor, ActorInfo, Flow, HealthStatus};
use super::playback::{await_reply, Player};
use super::runner::{mailbox, ActorHandle, ActorRunner};
use crate::{
    alarm::{Alarm, Clock, SystemClock},
    error::{Result, RiseberryError},
    process::PlaybackOutcome,
};

/// A snapshot of the clock's state.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AlarmStatus {
    pub alarm: Alarm,
    pub next_fire: Option<DateTime<FixedOffset>>,
    pub playing: bool,
    pub last_playback_error: Option<String>,
}

#[derive(Debug)]
pub enum AlarmMessage {
    Get {
        reply: oneshot::Sender<Alarm>,
    },
    Set {
        alarm: Alarm,
        reply: oneshot::Sender<()>,
    },
    Stop {
        reply: oneshot::Sender<Result<()>>,
    },
    Status {
        reply: oneshot::Sender<AlarmStatus>,
    },
    Close {
        reply: oneshot::Sender<()>,
    },
    /// Posted by the timer armed for `generation`.
    Fire { generation: u64 },
    /// Posted by the playback task started by the fire of `generation`.
    PlaybackEnded {
        generation: u64,
        result: Result<PlaybackOutcome>,
    },
}

struct ArmedTimer {
    generation: u64,
    fire_at: DateTime<FixedOffset>,
    task: JoinHandle<()>,
}

pub struct AlarmActor {
    alarm: Alarm,
    timer: Option<ArmedTimer>,
    generation: u64,
    /// Generation of the fire whose playback is still running.
    playing: Option<u64>,
    last_playback_error: Option<String>,
    player: Arc<dyn Player>,
    clock: Arc<dyn Clock>,
    mailbox: WeakSender<AlarmMessage>,
    closed: bool,
}

impl AlarmActor {
    pub fn new(
        player: Arc<dyn Player>,
        clock: Arc<dyn Clock>,
        mailbox: WeakSender<AlarmMessage>,
    ) -> Self {
        Self {
            alarm: Alarm::default(),
            timer: None,
            generation: 0,
            playing: None,
            last_playback_error: None,
            player,
            clock,
            mailbox,
            closed: false,
        }
    }

    fn status(&self) -> AlarmStatus {
        AlarmStatus {
            alarm: self.alarm,
            next_fire: self.timer.as_ref().map(|timer| timer.fire_at),
            playing: self.playing.is_some(),
            last_playback_error: self.last_playback_error.clone(),
        }
    }

    fn set(&mut self, alarm: Alarm) {
        self.disarm();
        self.alarm = alarm;
        if alarm.enabled {
            self.arm();
        }
        info!(
            hour = alarm.hour,
            minute = alarm.minute,
            zone = alarm.zone,
            enabled = alarm.enabled,
            "Alarm set"
        );
    }

    fn disarm(&mut self) {
        if let Some(timer) = self.timer.take() {
            timer.task.abort();
            debug!(generation = timer.generation, "Alarm timer cancelled");
        }
    }

    fn arm(&mut self) {
        let now = self.clock.now();
        let fire_at = match self.alarm.next_fire(now) {
            Ok(fire_at) => fire_at,
            Err(e) => {
                error!("Could not schedule alarm {:?}: {:?}", self.alarm, e);
                return;
            }
        };
        let delay = (fire_at.with_timezone(&Utc) - now)
            .to_std()
            .unwrap_or_default();

        self.generation += 1;
        let generation = self.generation;
        let mailbox = self.mailbox.clone();
        let task = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if let Some(mailbox) = mailbox.upgrade() {
                let _ = mailbox.send(AlarmMessage::Fire { generation }).await;
            }
        });

        info!(%fire_at, delay_secs = delay.as_secs(), "Alarm armed");
        self.timer = Some(ArmedTimer {
            generation,
            fire_at,
            task,
        });
    }

    async fn fire(&mut self, generation: u64) {
        match &self.timer {
            Some(timer) if timer.generation == generation => {}
            _ => {
                debug!(generation, "Ignoring fire of a replaced alarm");
                return;
            }
        }

        self.timer = None;
        self.alarm.enabled = false;
        self.playing = Some(generation);
        info!(generation, "Alarm fired");

        // The play is queued in loop order; only the wait for it ends off-loop.
        let pending = match self.player.queue_play().await {
            Ok(pending) => pending,
            Err(e) => return self.playback_ended(generation, Err(e)),
        };
        let mailbox = self.mailbox.clone();
        tokio::spawn(async move {
            let result = await_reply(pending).await.and_then(|outcome| outcome);
            if let Some(mailbox) = mailbox.upgrade() {
                let _ = mailbox
                    .send(AlarmMessage::PlaybackEnded { generation, result })
                    .await;
            }
        });
    }

    fn playback_ended(&mut self, generation: u64, result: Result<PlaybackOutcome>) {
        if self.playing == Some(generation) {
            self.playing = None;
        }
        match result {
            Ok(outcome) => {
                info!(generation, ?outcome, "Alarm playback ended");
                self.last_playback_error = None;
            }
            Err(e) => {
                error!(generation, "Alarm playback failed: {:?}", e);
                self.last_playback_error = Some(e.current_context().to_string());
            }
        }
    }
}

#[async_trait]
impl Actor<AlarmMessage> for AlarmActor {
    async fn handle(&mut self, msg: AlarmMessage) -> Result<Flow> {
        match msg {
            AlarmMessage::Get { reply } => {
                debug!(alarm = ?self.alarm, "Alarm read");
                let _ = reply.send(self.alarm);
            }
            AlarmMessage::Set { alarm, reply } => {
                self.set(alarm);
                let _ = reply.send(());
            }
            AlarmMessage::Stop { reply } => {
                info!("Stop requested");
                // The caller waits for the player; the loop does not.
                match self.player.queue_stop().await {
                    Ok(pending) => {
                        tokio::spawn(async move {
                            let _ = reply.send(await_reply(pending).await);
                        });
                    }
                    Err(e) => {
                        let _ = reply.send(Err(e));
                    }
                }
            }
            AlarmMessage::Status { reply } => {
                let _ = reply.send(self.status());
            }
            AlarmMessage::Close { reply } => {
                self.shutdown().await?;
                let _ = reply.send(());
                return Ok(Flow::Shutdown);
            }
            AlarmMessage::Fire { generation } => self.fire(generation).await,
            AlarmMessage::PlaybackEnded { generation, result } => {
                self.playback_ended(generation, result)
            }
        }
        Ok(Flow::Continue)
    }

    async fn shutdown(&mut self) -> Result<()> {
        self.disarm();
        if !self.closed {
            self.closed = true;
            if let Err(e) = self.player.close().await {
                warn!("Failed to close player: {:?}", e);
            }
        }
        Ok(())
    }

    async fn health_check(&self) -> HealthStatus {
        let status = match &self.last_playback_error {
            Some(e) => HealthStatus::unhealthy("Last alarm playback failed").with_detail("error", e),
            None => HealthStatus::healthy("Alarm actor is running"),
        };
        status
            .with_detail("enabled", self.alarm.enabled.to_string())
            .with_detail("armed", self.timer.is_some().to_string())
    }

    async fn get_info(&self) -> ActorInfo {
        ActorInfo::new("AlarmActor").with_metadata("generation", self.generation.to_string())
    }
}

/// Handle to the alarm clock actor; cheap to clone.
///
/// Every call waits for the actor to process it. Once [`AlarmClock::close`]
/// has run, all other calls fail with [`RiseberryError::Closed`].
#[derive(Debug, Clone)]
pub struct AlarmClock {
    handle: ActorHandle<AlarmMessage>,
}

impl AlarmClock {
    pub fn spawn(player: Arc<dyn Player>) -> Self {
        Self::spawn_with_clock(player, Arc::new(SystemClock))
    }

    pub fn spawn_with_clock(player: Arc<dyn Player>, clock: Arc<dyn Clock>) -> Self {
        let (handle, rx) = mailbox("alarm clock", 32);
        let actor = AlarmActor::new(player, clock, handle.downgrade());
        tokio::spawn(ActorRunner::new(actor, rx).run());
        Self { handle }
    }

    pub async fn get(&self) -> Result<Alarm> {
        self.handle.ask(|reply| AlarmMessage::Get { reply }).await
    }

    /// Replaces the alarm and re-arms the timer. Out-of-range alarms are
    /// rejected before they reach the actor.
    pub async fn set(&self, alarm: Alarm) -> Result<()> {
        alarm.validate()?;
        self.handle
            .ask(|reply| AlarmMessage::Set { alarm, reply })
            .await
    }

    /// Stops a sounding alarm and waits until the player is silent. Does not
    /// disable the alarm.
    pub async fn stop(&self) -> Result<()> {
        self.handle
            .ask(|reply| AlarmMessage::Stop { reply })
            .await?
    }

    pub async fn status(&self) -> Result<AlarmStatus> {
        self.handle.ask(|reply| AlarmMessage::Status { reply }).await
    }

    /// Cancels the timer, closes the player and ends the actor. Calling it
    /// again is a no-op.
    pub async fn close(&self) -> Result<()> {
        match self.handle.ask(|reply| AlarmMessage::Close { reply }).await {
            Err(e) if matches!(e.current_context(), RiseberryError::Closed(_)) => Ok(()),
            other => other,
        }
    }

    pub fn is_closed(&self) -> bool {
        self.handle.is_closed()
    }
}
