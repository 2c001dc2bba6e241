use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::{collections::HashMap, fmt::Debug};

/// What the runner should do after a message has been handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Shutdown,
}

/// Actor health check result
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthStatus {
    pub healthy: bool,
    pub message: String,
    pub details: HashMap<String, String>,
}

impl HealthStatus {
    pub fn healthy(message: impl Into<String>) -> Self {
        Self {
            healthy: true,
            message: message.into(),
            details: HashMap::new(),
        }
    }

    pub fn unhealthy(message: impl Into<String>) -> Self {
        Self {
            healthy: false,
            message: message.into(),
            details: HashMap::new(),
        }
    }

    pub fn with_detail(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.details.insert(key.into(), value.into());
        self
    }
}

/// Name and metadata an actor reports about itself for logging.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActorInfo {
    pub name: String,
    pub metadata: HashMap<String, String>,
}

impl ActorInfo {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            metadata: HashMap::new(),
        }
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

/// A generic actor message trait (for ergonomics/debugging)
pub trait Message: Send + Debug + 'static {}

impl<T: Send + Debug + 'static> Message for T {}

/// An actor owning its state exclusively. Accepts messages of type M, one at
/// a time, from a single runner task.
#[async_trait]
pub trait Actor<M>: Send + Sync
where
    M: Message,
{
    /// Handles one message. Errors here are fatal to the runner; failures a
    /// caller should see travel back through the message's reply channel.
    async fn handle(&mut self, msg: M) -> Result<Flow>;

    /// Releases everything the actor owns. Must be safe to call twice.
    async fn shutdown(&mut self) -> Result<()>;

    async fn health_check(&self) -> HealthStatus;
    async fn get_info(&self) -> ActorInfo;
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Counter {
        count: u64,
        limit: u64,
        closed: bool,
    }

    #[derive(Debug)]
    enum CounterMessage {
        Increment,
        Close,
    }

    #[async_trait]
    impl Actor<CounterMessage> for Counter {
        async fn handle(&mut self, msg: CounterMessage) -> Result<Flow> {
            match msg {
                CounterMessage::Increment => {
                    self.count += 1;
                    Ok(Flow::Continue)
                }
                CounterMessage::Close => {
                    self.shutdown().await?;
                    Ok(Flow::Shutdown)
                }
            }
        }

        async fn shutdown(&mut self) -> Result<()> {
            self.closed = true;
            Ok(())
        }

        async fn health_check(&self) -> HealthStatus {
            if self.count > self.limit {
                HealthStatus::unhealthy("Counter over limit")
                    .with_detail("count", self.count.to_string())
            } else {
                HealthStatus::healthy("Counter is fine")
            }
        }

        async fn get_info(&self) -> ActorInfo {
            ActorInfo::new("Counter").with_metadata("limit", self.limit.to_string())
        }
    }

    #[tokio::test]
    async fn test_actor_trait_flow() {
        let mut actor = Counter {
            count: 0,
            limit: 1,
            closed: false,
        };

        assert_eq!(actor.get_info().await.name, "Counter");
        assert!(actor.health_check().await.healthy);

        assert_eq!(
            actor.handle(CounterMessage::Increment).await.unwrap(),
            Flow::Continue
        );
        actor.handle(CounterMessage::Increment).await.unwrap();

        let health = actor.health_check().await;
        assert!(!health.healthy);
        assert_eq!(health.details.get("count"), Some(&"2".to_string()));

        assert_eq!(
            actor.handle(CounterMessage::Close).await.unwrap(),
            Flow::Shutdown
        );
        assert!(actor.closed);
    }

    #[test]
    fn test_health_status_builders() {
        let healthy = HealthStatus::healthy("All good");
        assert!(healthy.healthy);
        assert_eq!(healthy.message, "All good");
        assert!(healthy.details.is_empty());

        let with_details = HealthStatus::unhealthy("Bad").with_detail("key1", "value1");
        assert!(!with_details.healthy);
        assert_eq!(
            with_details.details.get("key1"),
            Some(&"value1".to_string())
        );
    }

    #[test]
    fn test_actor_info_builder() {
        let info = ActorInfo::new("Test").with_metadata("type", "test");
        assert_eq!(info.name, "Test");
        assert_eq!(info.metadata.get("type"), Some(&"test".to_string()));
    }
}
