use anyhow::{Context, Result};
use chrono::{DateTime, NaiveTime, Utc};
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::appointments::BookingWindow;
use crate::session::SessionContext;

/// Main configuration structure for Office Hours
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct OfficeHoursConfig {
    /// Outbound email delivery
    pub notifications: NotificationConfig,
    /// Student booking rules
    pub booking: BookingConfig,
    /// Live sync settings
    pub sync: SyncConfig,
    /// Observability settings
    pub observability: ObservabilityConfig,
    /// Session used by the CLI (usually supplied through the environment)
    #[serde(default)]
    pub session: SessionConfig,
    /// Database settings (optional)
    pub database: Option<DatabaseConfig>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct NotificationConfig {
    /// Delivery endpoint accepting `{to, subject, message}`
    pub endpoint: String,
    /// Request timeout; unset keeps the transport default
    pub timeout_seconds: Option<u64>,
}

impl NotificationConfig {
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_seconds.map(Duration::from_secs)
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct BookingConfig {
    /// Earliest bookable time, `HH:MM`
    pub earliest: String,
    /// Latest bookable time, `HH:MM` (inclusive)
    pub latest: String,
}

impl BookingConfig {
    pub fn window(&self) -> Result<BookingWindow> {
        let earliest = NaiveTime::parse_from_str(&self.earliest, "%H:%M")
            .with_context(|| format!("Invalid booking.earliest: {}", self.earliest))?;
        let latest = NaiveTime::parse_from_str(&self.latest, "%H:%M")
            .with_context(|| format!("Invalid booking.latest: {}", self.latest))?;
        anyhow::ensure!(earliest <= latest, "booking.earliest must not be after booking.latest");
        Ok(BookingWindow { earliest, latest })
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct SyncConfig {
    /// Change events buffered per subscriber before it is told to resync
    pub channel_capacity: usize,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ObservabilityConfig {
    /// Log level
    pub log_level: String,
    /// Emit JSON lines instead of human-readable output
    pub json: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct SessionConfig {
    pub user_id: Option<String>,
    pub email: Option<String>,
    pub access_token: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
}

impl SessionConfig {
    /// `None` unless both a user id and an access token are configured.
    pub fn to_session(&self) -> Option<SessionContext> {
        let user_id = self.user_id.as_deref()?;
        let token = self.access_token.as_deref()?;
        let mut session = SessionContext::new(user_id, token);
        session.email = self.email.clone();
        session.expires_at = self.expires_at;
        Some(session)
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct DatabaseConfig {
    /// Database URL (SQLite file path or connection string)
    pub url: String,
    /// Maximum connections in pool
    pub max_connections: u32,
    /// Enable automatic migrations
    pub auto_migrate: bool,
}

impl Default for OfficeHoursConfig {
    fn default() -> Self {
        Self {
            notifications: NotificationConfig {
                endpoint: "http://localhost:3000/api/send-email".to_string(),
                timeout_seconds: None,
            },
            booking: BookingConfig {
                earliest: "07:00".to_string(),
                latest: "18:00".to_string(),
            },
            sync: SyncConfig { channel_capacity: 64 },
            observability: ObservabilityConfig {
                log_level: "info".to_string(),
                json: false,
            },
            session: SessionConfig::default(),
            database: Some(DatabaseConfig {
                url: ".office-hours/office-hours.db".to_string(),
                max_connections: 5,
                auto_migrate: true,
            }),
        }
    }
}

impl OfficeHoursConfig {
    /// Load configuration from multiple sources with precedence:
    /// 1. Default values
    /// 2. Configuration files (office-hours.toml, .office-hours-rc)
    /// 3. Environment variables (OFFICE_HOURS__SECTION__KEY)
    pub fn load() -> Result<Self> {
        Self::load_from(Path::new("."))
    }

    /// Same as [`load`](Self::load) with the configuration files looked up in `dir`.
    pub fn load_from(dir: &Path) -> Result<Self> {
        let mut builder = Config::builder().add_source(Config::try_from(&Self::default())?);

        let toml_path = dir.join("office-hours.toml");
        if toml_path.exists() {
            builder = builder.add_source(File::from(toml_path));
        }

        let rc_path = dir.join(".office-hours-rc");
        if rc_path.exists() {
            builder = builder.add_source(File::from(rc_path).format(config::FileFormat::Toml));
        }

        builder = builder.add_source(
            Environment::with_prefix("OFFICE_HOURS")
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder.build().context("Failed to assemble configuration")?;
        let office_hours_config: OfficeHoursConfig = config
            .try_deserialize()
            .context("Failed to parse configuration")?;
        Ok(office_hours_config)
    }

    /// Save configuration to file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let toml_content = toml::to_string_pretty(self)?;
        std::fs::write(path, toml_content)?;
        Ok(())
    }

    /// Load .env file if it exists
    pub fn load_env_file() -> Result<()> {
        if Path::new(".env").exists() {
            dotenvy::dotenv()?;
            tracing::info!("Loaded environment variables from .env file");
        }
        Ok(())
    }
}

/// Global configuration instance
static CONFIG: std::sync::LazyLock<Result<OfficeHoursConfig, anyhow::Error>> =
    std::sync::LazyLock::new(|| {
        // Load .env file first
        let _ = OfficeHoursConfig::load_env_file();
        OfficeHoursConfig::load()
    });

/// Get the global configuration
pub fn config() -> Result<&'static OfficeHoursConfig> {
    CONFIG
        .as_ref()
        .map_err(|e| anyhow::anyhow!("Failed to load configuration: {:#}", e))
}

/// Initialize configuration (called at startup)
pub fn init_config() -> Result<()> {
    let _config = config()?;
    tracing::info!("Configuration loaded successfully");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = OfficeHoursConfig::default();
        let window = config.booking.window().unwrap();
        assert_eq!(window, BookingWindow::default());
        assert_eq!(config.sync.channel_capacity, 64);
        assert!(config.notifications.timeout().is_none());
        assert!(config.session.to_session().is_none());
    }

    #[test]
    fn test_file_overrides_defaults() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("office-hours.toml"),
            "[booking]\nearliest = \"08:30\"\nlatest = \"17:00\"\n\n[notifications]\nendpoint = \"https://mail.example.edu/send\"\ntimeout_seconds = 5\n",
        )
        .unwrap();

        let config = OfficeHoursConfig::load_from(dir.path()).unwrap();
        assert_eq!(config.booking.earliest, "08:30");
        assert_eq!(config.notifications.endpoint, "https://mail.example.edu/send");
        assert_eq!(config.notifications.timeout(), Some(Duration::from_secs(5)));
        assert_eq!(config.observability.log_level, "info");
    }

    #[test]
    fn test_save_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = OfficeHoursConfig::default();
        config.sync.channel_capacity = 8;
        config.save_to_file(dir.path().join("office-hours.toml")).unwrap();

        let reloaded = OfficeHoursConfig::load_from(dir.path()).unwrap();
        assert_eq!(reloaded.sync.channel_capacity, 8);
    }

    #[test]
    fn test_inverted_booking_window_rejected() {
        let booking = BookingConfig {
            earliest: "18:00".to_string(),
            latest: "07:00".to_string(),
        };
        assert!(booking.window().is_err());
    }
}
