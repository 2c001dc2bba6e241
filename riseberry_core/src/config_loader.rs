use std::path::Path;

use crate::config::Config;
use crate::error::{Result, RiseberryError};
use error_stack::ResultExt;
use tokio::fs;

pub fn load_config_from_toml(toml: &str) -> Result<Config> {
    let config: Config = toml::de::from_str(toml).map_err(RiseberryError::ConfigParse)?;
    if let Some(button) = &config.button {
        button.validate()?;
    }
    Ok(config)
}

pub async fn load_config_from_toml_file(file_path: impl AsRef<Path>) -> Result<Config> {
    let file_path = file_path.as_ref();
    let toml_content = fs::read_to_string(file_path).await.map_err(|e| {
        RiseberryError::ConfigRead(format!("{}: {}", file_path.display(), e))
    })?;
    load_config_from_toml(&toml_content)
        .attach_printable_lazy(|| format!("in config file {}", file_path.display()))
}

#[cfg(test)]
mod test {
    use std::time::Duration;

    use crate::config::{ButtonConfig, PlayerConfig, ServerConfig};

    #[test]
    fn test_load_toml() {
        let toml = r#"
            [server]
            addr = "127.0.0.1:8080"
            assets = "/srv/riseberry/public"

            [player]
            command = "mpg123 -q {file}"
            sound = "/srv/riseberry/rooster.mp3"
            term_grace_ms = 500

            [button]
            pin = 17
        "#;

        let config = super::load_config_from_toml(toml).unwrap();
        assert_eq!(config.server.addr, "127.0.0.1:8080");
        assert_eq!(config.player.command, "mpg123 -q {file}");
        assert_eq!(config.player.term_grace, Duration::from_millis(500));
        assert_eq!(config.button, Some(ButtonConfig::new(17)));
        assert_eq!(
            config.button.unwrap().sample_interval,
            Duration::from_millis(50)
        );
    }

    #[test]
    fn test_load_empty_toml_uses_defaults() {
        let config = super::load_config_from_toml("").unwrap();
        assert_eq!(config.server, ServerConfig::default());
        assert_eq!(config.player, PlayerConfig::default());
        assert!(config.button.is_none());
    }

    #[test]
    fn test_load_invalid_toml() {
        let result = super::load_config_from_toml("[player]\nterm_grace_ms = \"soon\"");
        assert!(matches!(
            result.unwrap_err().current_context(),
            crate::error::RiseberryError::ConfigParse(_)
        ));
    }

    #[test]
    fn test_load_zero_sample_interval() {
        let result = super::load_config_from_toml("[button]\npin = 4\nsample_interval_ms = 0\n");
        assert!(matches!(
            result.unwrap_err().current_context(),
            crate::error::RiseberryError::InvalidConfig(_)
        ));
    }

    #[tokio::test]
    async fn test_load_toml_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("riseberry.toml");
        std::fs::write(&path, "[button]\npin = 4\nsample_interval_ms = 20\n")
            .expect("Failed to write test file");

        let config = super::load_config_from_toml_file(&path).await.unwrap();
        let button = config.button.unwrap();
        assert_eq!(button.pin, 4);
        assert_eq!(button.sample_interval, Duration::from_millis(20));
    }

    #[tokio::test]
    async fn test_load_missing_toml_file() {
        let result = super::load_config_from_toml_file("/nonexistent/riseberry.toml").await;
        assert!(matches!(
            result.unwrap_err().current_context(),
            crate::error::RiseberryError::ConfigRead(_)
        ));
    }
}
