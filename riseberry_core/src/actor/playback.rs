use std::{path::PathBuf, time::Duration};

use async_trait::async_trait;
use error_stack::Report;
use tokio::{sync::oneshot, task::JoinHandle};
use tracing::{debug, error, info};

use super::actor_trait::{Actor, ActorInfo, Flow, HealthStatus};
use super::runner::{spawn_actor, ActorHandle};
use crate::{
    config::PlayerConfig,
    error::{Result, RiseberryError},
    process::{PlaybackOutcome, PlayerCommand, PlayerProcess},
};

/// Something that can sound the alarm.
///
/// Requests are queued in call order: a stop queued after a play always
/// applies to that play.
#[async_trait]
pub trait Player: Send + Sync + 'static {
    /// Queues playback of the alarm sound. The receiver resolves once
    /// playback has ended.
    async fn queue_play(&self) -> Result<oneshot::Receiver<Result<PlaybackOutcome>>>;
    /// Queues a stop. The receiver resolves once the player is silent.
    async fn queue_stop(&self) -> Result<oneshot::Receiver<()>>;
    /// Stops playback and releases the player for good.
    async fn close(&self) -> Result<()>;

    /// Plays the alarm sound and returns once playback has ended.
    async fn play(&self) -> Result<PlaybackOutcome> {
        await_reply(self.queue_play().await?).await?
    }

    /// Stops the current playback, if any, and returns once it is dead.
    async fn stop(&self) -> Result<()> {
        await_reply(self.queue_stop().await?).await
    }
}

/// Waits for a reply queued through [`Player`].
pub async fn await_reply<R>(pending: oneshot::Receiver<R>) -> Result<R> {
    pending
        .await
        .map_err(|_| Report::new(RiseberryError::Closed("playback")))
}

#[derive(Debug)]
pub enum PlaybackMessage {
    Play {
        file: PathBuf,
        reply: oneshot::Sender<Result<PlaybackOutcome>>,
    },
    Stop {
        reply: oneshot::Sender<()>,
    },
    Close {
        reply: oneshot::Sender<()>,
    },
}

/// The one player process that may be running, and the task that owns it.
struct Running {
    pid: u32,
    cancel: oneshot::Sender<()>,
    task: JoinHandle<()>,
}

pub struct PlaybackActor {
    command: PlayerCommand,
    grace: Duration,
    current: Option<Running>,
    started: u64,
}

impl PlaybackActor {
    pub fn new(command: PlayerCommand, grace: Duration) -> Self {
        Self {
            command,
            grace,
            current: None,
            started: 0,
        }
    }

    fn is_playing(&self) -> bool {
        self.current
            .as_ref()
            .is_some_and(|running| !running.task.is_finished())
    }

    /// Terminates and reaps the running player. Returns once the slot is empty.
    async fn stop_current(&mut self) {
        let Some(running) = self.current.take() else {
            return;
        };
        debug!(pid = running.pid, "Stopping player");
        // The task may already have finished on its own.
        let _ = running.cancel.send(());
        if let Err(e) = running.task.await {
            error!(pid = running.pid, "Player task failed: {}", e);
        }
    }

    async fn start(&mut self, file: PathBuf, reply: oneshot::Sender<Result<PlaybackOutcome>>) {
        self.stop_current().await;

        let process = match PlayerProcess::spawn(&self.command, &file, self.grace) {
            Ok(process) => process,
            Err(e) => {
                error!(file = %file.display(), "Could not start player: {:?}", e);
                let _ = reply.send(Err(e));
                return;
            }
        };

        self.started += 1;
        let pid = process.pid();
        let (cancel, cancelled) = oneshot::channel::<()>();
        let task = tokio::spawn(async move {
            let outcome = process
                .run_until(async {
                    let _ = cancelled.await;
                })
                .await;
            let _ = reply.send(outcome);
        });
        self.current = Some(Running { pid, cancel, task });
    }
}

#[async_trait]
impl Actor<PlaybackMessage> for PlaybackActor {
    async fn handle(&mut self, msg: PlaybackMessage) -> Result<Flow> {
        match msg {
            PlaybackMessage::Play { file, reply } => {
                info!(file = %file.display(), "Play requested");
                self.start(file, reply).await;
                Ok(Flow::Continue)
            }
            PlaybackMessage::Stop { reply } => {
                self.stop_current().await;
                let _ = reply.send(());
                Ok(Flow::Continue)
            }
            PlaybackMessage::Close { reply } => {
                self.shutdown().await?;
                let _ = reply.send(());
                Ok(Flow::Shutdown)
            }
        }
    }

    async fn shutdown(&mut self) -> Result<()> {
        self.stop_current().await;
        Ok(())
    }

    async fn health_check(&self) -> HealthStatus {
        HealthStatus::healthy("Playback actor is running")
            .with_detail("playing", self.is_playing().to_string())
            .with_detail("started", self.started.to_string())
    }

    async fn get_info(&self) -> ActorInfo {
        ActorInfo::new("PlaybackActor")
            .with_metadata("command", self.command.template())
            .with_metadata("term_grace_ms", self.grace.as_millis().to_string())
    }
}

/// Handle to a running [`PlaybackActor`]; cheap to clone.
#[derive(Debug, Clone)]
pub struct PlaybackHandle {
    handle: ActorHandle<PlaybackMessage>,
    sound: PathBuf,
}

impl PlaybackHandle {
    pub fn spawn(config: &PlayerConfig) -> Result<Self> {
        let command = PlayerCommand::parse(config.command.as_str())?;
        let actor = PlaybackActor::new(command, config.term_grace);
        let (handle, _task) = spawn_actor("playback", actor, 16);
        Ok(Self {
            handle,
            sound: config.sound.clone(),
        })
    }

    /// Plays `file`, replacing whatever is playing now. Returns when the
    /// player exits or is stopped.
    pub async fn play_file(&self, file: impl Into<PathBuf>) -> Result<PlaybackOutcome> {
        let file = file.into();
        self.handle
            .ask(|reply| PlaybackMessage::Play { file, reply })
            .await?
    }

    pub fn is_closed(&self) -> bool {
        self.handle.is_closed()
    }
}

#[async_trait]
impl Player for PlaybackHandle {
    async fn queue_play(&self) -> Result<oneshot::Receiver<Result<PlaybackOutcome>>> {
        let file = self.sound.clone();
        self.handle
            .request(|reply| PlaybackMessage::Play { file, reply })
            .await
    }

    async fn queue_stop(&self) -> Result<oneshot::Receiver<()>> {
        self.handle
            .request(|reply| PlaybackMessage::Stop { reply })
            .await
    }

    async fn close(&self) -> Result<()> {
        match self
            .handle
            .ask(|reply| PlaybackMessage::Close { reply })
            .await
        {
            Err(e) if matches!(e.current_context(), RiseberryError::Closed(_)) => Ok(()),
            other => other,
        }
    }
}
