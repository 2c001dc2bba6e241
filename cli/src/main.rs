//! Main entry point for the riseberry alarm clock daemon.
//!
//! Wires the playback actor, the alarm clock actor, the optional GPIO stop
//! button and the HTTP server together, then runs until SIGINT or SIGTERM.
//!
//! # Usage
//!
//! ```sh
//! riseberryd --config /etc/riseberry.toml -v
//! riseberryd --addr 127.0.0.1:8080 --sound ./alarm.wav --button-pin 17
//! ```

use std::{path::PathBuf, sync::Arc, time::Duration};

use clap::Parser;
use error_stack::ResultExt;
use riseberry_core::{
    actor::{AlarmClock, PlaybackHandle},
    button::{Button, SysfsPin},
    config::{ButtonConfig, Config},
    config_loader::load_config_from_toml_file,
    http,
};
use tracing::{info, warn};

use crate::errors::{CLIError, CLIResult};
use crate::logging::setup_logging;

mod errors;
mod logging;

const VERSION: &str = env!("CARGO_PKG_VERSION");

/// riseberryd - a single-alarm clock that plays a sound until stopped
#[derive(Parser, Debug)]
#[command(version = VERSION, about, long_about = None)]
pub struct Cli {
    /// Enable verbose logging (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// TOML config file; flags below override its values
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Address the HTTP server listens on
    #[arg(long, value_name = "HOST:PORT")]
    pub addr: Option<String>,

    /// Directory served for every path other than /alarm
    #[arg(long, value_name = "DIR")]
    pub assets: Option<PathBuf>,

    /// Sound file handed to the player
    #[arg(long, value_name = "FILE")]
    pub sound: Option<PathBuf>,

    /// Player command; `{file}` is replaced with the sound path
    #[arg(long, value_name = "TEMPLATE")]
    pub command: Option<String>,

    /// GPIO pin of the stop button
    #[arg(long, value_name = "PIN")]
    pub button_pin: Option<u32>,

    /// Button sampling interval in milliseconds
    #[arg(long, value_name = "MS", value_parser = clap::value_parser!(u64).range(1..))]
    pub button_rate_ms: Option<u64>,
}

impl Cli {
    /// Reads the config file, if any, and applies the flags on top of it.
    pub async fn load_config(&self) -> CLIResult<Config> {
        let mut config = match &self.config {
            Some(path) => load_config_from_toml_file(path)
                .await
                .change_context_lazy(|| CLIError::Config(path.display().to_string()))?,
            None => Config::default(),
        };
        self.apply_overrides(&mut config);
        Ok(config)
    }

    pub fn apply_overrides(&self, config: &mut Config) {
        if let Some(addr) = &self.addr {
            config.server.addr = addr.clone();
        }
        if let Some(assets) = &self.assets {
            config.server.assets = assets.clone();
        }
        if let Some(sound) = &self.sound {
            config.player.sound = sound.clone();
        }
        if let Some(command) = &self.command {
            config.player.command = command.clone();
        }
        if let Some(pin) = self.button_pin {
            let button = config.button.get_or_insert_with(|| ButtonConfig::new(pin));
            button.pin = pin;
        }
        if let (Some(ms), Some(button)) = (self.button_rate_ms, config.button.as_mut()) {
            button.sample_interval = Duration::from_millis(ms);
        }
    }
}

#[tokio::main]
async fn main() -> CLIResult<()> {
    let cli = Cli::parse();
    setup_logging(cli.verbose)?;

    let config = cli.load_config().await?;
    info!("Starting riseberry {VERSION}");

    let player = PlaybackHandle::spawn(&config.player).change_context(CLIError::Startup("player"))?;
    let clock = AlarmClock::spawn(Arc::new(player));

    let button = match &config.button {
        Some(button) => Some(start_button(button, clock.clone()).await?),
        None => None,
    };

    let app = http::router(clock.clone(), &config.server.assets);
    let listener = tokio::net::TcpListener::bind(&config.server.addr)
        .await
        .map_err(|source| CLIError::Bind {
            addr: config.server.addr.clone(),
            source,
        })?;
    info!("Listening on http://{}", config.server.addr);

    let served = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(CLIError::Server);

    if let Some(button) = button {
        button.stop().await;
    }
    if let Err(e) = clock.close().await {
        warn!("Failed to close alarm clock: {:?}", e);
    }
    info!("Shut down");

    served?;
    Ok(())
}

async fn start_button(config: &ButtonConfig, clock: AlarmClock) -> CLIResult<Button> {
    let pin = SysfsPin::open(config.pin)
        .await
        .change_context(CLIError::Startup("button"))?;
    info!(pin = config.pin, "Stop button attached");

    Button::spawn(pin, config.sample_interval, move || {
        let clock = clock.clone();
        async move {
            if let Err(e) = clock.stop().await {
                warn!("Button could not stop the alarm: {:?}", e);
            }
        }
    })
    .change_context(CLIError::Startup("button"))
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to listen for ctrl-c: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("Shutdown signal received");
}
