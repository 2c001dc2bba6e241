/*!
# Actor System

Each piece of mutable state in riseberry is owned by exactly one actor task and
reached only through messages.

## Core Components

### [`actor_trait`] - Core Actor Trait and Types
- `Actor<M>` - message handling plus shutdown and introspection
- `Flow` - whether the runner keeps going after a message
- `HealthStatus` / `ActorInfo` - what the runner logs about an actor

### [`runner`] - Actor Execution
- `ActorRunner` - drives one actor until its mailbox closes or it shuts down
- `ActorHandle` - `tell`/`ask` with fail-fast `Closed` errors
- `mailbox()` / `spawn_actor()` - wiring helpers

## Actor Implementations

- [`alarm`] - the alarm clock: current alarm, one-shot timer, fire handling
- [`playback`] - the external player process, at most one at a time

## Usage Example

```rust,no_run
use std::sync::Arc;
use riseberry_core::actor::{AlarmClock, PlaybackHandle};
use riseberry_core::alarm::Alarm;
use riseberry_core::config::PlayerConfig;

# #[tokio::main]
# async fn main() -> riseberry_core::error::Result<()> {
let player = PlaybackHandle::spawn(&PlayerConfig::default())?;
let clock = AlarmClock::spawn(Arc::new(player));

clock.set(Alarm::new(6, 30, 3600, true)).await?;
let alarm = clock.get().await?;
assert!(alarm.enabled);

clock.stop().await?;
clock.close().await?;
# Ok(())
# }
```
*/

// Actor trait and related types
pub mod actor_trait;
pub mod runner;

// Actor implementations
pub mod alarm;
pub mod playback;

// Re-export commonly used types for convenience
pub use actor_trait::{Actor, ActorInfo, Flow, HealthStatus, Message};
pub use alarm::{AlarmActor, AlarmClock, AlarmMessage, AlarmStatus};
pub use playback::{PlaybackActor, PlaybackHandle, PlaybackMessage, Player};
pub use runner::{mailbox, spawn_actor, ActorHandle, ActorRunner};
