//! The physical stop button.
//!
//! A mechanical button bounces, so a press is only counted once two level
//! transitions (down and up) have been observed between samples.

use std::{future::Future, path::PathBuf, time::Duration};

use async_trait::async_trait;
use error_stack::{Report, ResultExt};
use tokio::{
    fs,
    sync::oneshot,
    task::JoinHandle,
    time::{interval, MissedTickBehavior},
};
use tracing::{debug, error, info, warn};

use crate::error::{Result, RiseberryError};

/// A digital input that can be sampled.
#[async_trait]
pub trait InputPin: Send + 'static {
    /// Returns `true` when the input is high.
    async fn read(&mut self) -> Result<bool>;
}

/// A GPIO input exposed through the sysfs interface.
#[derive(Debug, Clone)]
pub struct SysfsPin {
    value: PathBuf,
}

impl SysfsPin {
    /// Exports `pin` if needed and configures it as an input.
    pub async fn open(pin: u32) -> Result<Self> {
        let dir = PathBuf::from(format!("/sys/class/gpio/gpio{pin}"));
        if fs::metadata(&dir).await.is_err() {
            fs::write("/sys/class/gpio/export", pin.to_string())
                .await
                .map_err(|e| RiseberryError::Gpio(format!("export of pin {pin} failed: {e}")))?;
        }
        fs::write(dir.join("direction"), "in")
            .await
            .map_err(|e| RiseberryError::Gpio(format!("pin {pin} direction: {e}")))?;
        Ok(Self::from_value_file(dir.join("value")))
    }

    pub fn from_value_file(value: impl Into<PathBuf>) -> Self {
        Self {
            value: value.into(),
        }
    }
}

#[async_trait]
impl InputPin for SysfsPin {
    async fn read(&mut self) -> Result<bool> {
        let raw = fs::read_to_string(&self.value)
            .await
            .map_err(|e| RiseberryError::Gpio(e.to_string()))
            .attach_printable_lazy(|| format!("reading {}", self.value.display()))?;
        match raw.trim() {
            "0" => Ok(false),
            "1" => Ok(true),
            other => Err(Report::new(RiseberryError::Gpio(format!(
                "unexpected value {other:?} in {}",
                self.value.display()
            )))),
        }
    }
}

/// Counts level transitions; every second one completes a press.
#[derive(Debug, Clone)]
pub struct Debouncer {
    previous: bool,
    transitions: u8,
}

impl Debouncer {
    pub fn new(initial: bool) -> Self {
        Self {
            previous: initial,
            transitions: 0,
        }
    }

    /// Feeds one sample; returns `true` when it completes a press.
    pub fn sample(&mut self, level: bool) -> bool {
        if level != self.previous {
            self.transitions += 1;
            self.previous = level;
        }
        if self.transitions >= 2 {
            self.transitions = 0;
            return true;
        }
        false
    }
}

/// Samples a pin on its own task and runs a handler once per press.
pub struct Button {
    stop: Option<oneshot::Sender<()>>,
    task: JoinHandle<()>,
}

impl Button {
    /// Starts sampling `pin` every `rate`. A zero rate is rejected.
    pub fn spawn<P, F, Fut>(mut pin: P, rate: Duration, mut on_press: F) -> Result<Self>
    where
        P: InputPin,
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send,
    {
        if rate.is_zero() {
            return Err(Report::new(RiseberryError::InvalidConfig(
                "button sampling interval must be greater than 0".to_string(),
            )));
        }
        let (stop, mut stopped) = oneshot::channel::<()>();
        let task = tokio::spawn(async move {
            let mut ticker = interval(rate);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            let mut debouncer: Option<Debouncer> = None;

            loop {
                tokio::select! {
                    _ = &mut stopped => break,
                    _ = ticker.tick() => {}
                }
                let level = match pin.read().await {
                    Ok(level) => level,
                    Err(e) => {
                        warn!("Failed to read button: {:?}", e);
                        continue;
                    }
                };
                let debouncer = debouncer.get_or_insert_with(|| Debouncer::new(level));
                if debouncer.sample(level) {
                    info!("Button pressed");
                    on_press().await;
                }
            }
            debug!("Button sampling stopped");
        });

        info!(rate_ms = rate.as_millis() as u64, "Button sampling started");
        Ok(Self {
            stop: Some(stop),
            task,
        })
    }

    /// Stops sampling and waits for the sampling task to end.
    pub async fn stop(mut self) {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
        if let Err(e) = self.task.await {
            error!("Button sampling task failed: {}", e);
        }
    }
}
