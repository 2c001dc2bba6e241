use crate::error::{Result, RiseberryError};
use error_stack::Report;
use tokio::sync::mpsc::{self, Receiver, Sender, WeakSender};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use super::actor_trait::{Actor, Flow, Message};

/// Creates a bounded mailbox and the handle that feeds it.
pub fn mailbox<M: Message>(name: &'static str, capacity: usize) -> (ActorHandle<M>, Receiver<M>) {
    let (tx, rx) = mpsc::channel(capacity);
    (ActorHandle { name, tx }, rx)
}

/// Spawns `actor` on its own task and returns a handle to its mailbox.
pub fn spawn_actor<A, M>(
    name: &'static str,
    actor: A,
    capacity: usize,
) -> (ActorHandle<M>, JoinHandle<Result<()>>)
where
    A: Actor<M> + 'static,
    M: Message,
{
    let (handle, rx) = mailbox(name, capacity);
    let task = tokio::spawn(ActorRunner::new(actor, rx).run());
    (handle, task)
}

/// Sending side of an actor's mailbox.
///
/// Every call fails with [`RiseberryError::Closed`] once the actor has stopped,
/// including calls whose message was queued but never handled.
pub struct ActorHandle<M> {
    name: &'static str,
    tx: Sender<M>,
}

impl<M> Clone for ActorHandle<M> {
    fn clone(&self) -> Self {
        Self {
            name: self.name,
            tx: self.tx.clone(),
        }
    }
}

impl<M> std::fmt::Debug for ActorHandle<M> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActorHandle")
            .field("name", &self.name)
            .field("closed", &self.tx.is_closed())
            .finish()
    }
}

impl<M: Message> ActorHandle<M> {
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    /// A sender that does not keep the actor alive.
    pub fn downgrade(&self) -> WeakSender<M> {
        self.tx.downgrade()
    }

    /// Delivers a message without waiting for it to be handled.
    pub async fn tell(&self, msg: M) -> Result<()> {
        self.tx
            .send(msg)
            .await
            .map_err(|_| Report::new(RiseberryError::Closed(self.name)))
    }

    /// Delivers the message built by `make` and returns its pending reply.
    pub async fn request<R>(
        &self,
        make: impl FnOnce(oneshot::Sender<R>) -> M,
    ) -> Result<oneshot::Receiver<R>> {
        let (reply, response) = oneshot::channel();
        self.tell(make(reply)).await?;
        Ok(response)
    }

    /// Delivers the message built by `make` and waits for its reply.
    pub async fn ask<R>(&self, make: impl FnOnce(oneshot::Sender<R>) -> M) -> Result<R> {
        self.request(make)
            .await?
            .await
            .map_err(|_| Report::new(RiseberryError::Closed(self.name)))
    }
}

/// Drives an actor: one message at a time until the mailbox closes or the
/// actor asks to shut down.
pub struct ActorRunner<A, M>
where
    A: Actor<M> + 'static,
    M: Message,
{
    actor: A,
    rx: Receiver<M>,
}

impl<A, M> ActorRunner<A, M>
where
    A: Actor<M> + 'static,
    M: Message,
{
    pub fn new(actor: A, rx: Receiver<M>) -> Self {
        Self { actor, rx }
    }

    pub async fn run(mut self) -> Result<()> {
        let info = self.actor.get_info().await;
        info!(actor = %info.name, metadata = ?info.metadata, "Starting actor");

        let mut message_count = 0u64;
        let result = loop {
            let Some(msg) = self.rx.recv().await else {
                info!(actor = %info.name, "All handles dropped");
                break Ok(());
            };
            message_count += 1;

            match self.actor.handle(msg).await {
                Ok(Flow::Continue) => {}
                Ok(Flow::Shutdown) => {
                    info!(actor = %info.name, "Shutdown requested");
                    break Ok(());
                }
                Err(e) => {
                    error!(
                        actor = %info.name,
                        "Actor message handling failed (message #{}): {:?}",
                        message_count,
                        e
                    );
                    break Err(e);
                }
            }

            if message_count % 100 == 0 {
                let health = self.actor.health_check().await;
                if !health.healthy {
                    warn!(
                        actor = %info.name,
                        "Actor health degraded after {} messages: {}",
                        message_count,
                        health.message
                    );
                }
            }
        };

        // Late senders see a closed channel; queued requests are dropped along
        // with their reply channels.
        self.rx.close();
        while let Ok(msg) = self.rx.try_recv() {
            debug!(actor = %info.name, ?msg, "Dropping message after shutdown");
        }

        let shutdown = self.actor.shutdown().await;
        info!(actor = %info.name, messages = message_count, "Actor stopped");
        result?;
        shutdown
    }
}
