// common/src/config.rs
use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;
use std::time::Duration;
use config::{Config as ConfigFile, File, Environment};

/// Central configuration for the rewards host and its core services
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub web_server_addr: String,
    /// Origin the dashboard is served from; cross-context messages must carry it
    pub public_origin: String,

    pub identity: IdentityConfig,
    pub remote: RemoteConfig,
    pub sms: SmsConfig,
    pub otp: OtpConfig,
    pub storage: StorageConfig,
    pub browser: BrowserConfig,
    pub rate_limit: RateLimitConfig,
}

/// External identity provider endpoints and handshake timing
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct IdentityConfig {
    pub login_url: String,
    /// Landing page of the provider for a session that is no longer valid
    pub logged_out_url: String,
    pub staleness_secs: u64,
    pub login_timeout_secs: u64,
    pub revalidate_timeout_secs: u64,
    pub poll_interval_ms: u64,
    pub revalidate_every_secs: u64,
}

/// Remote verification / status webhooks
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct RemoteConfig {
    pub base_url: String,
    pub status_path: String,
    pub phone_lookup_path: String,
    pub phone_insert_path: String,
    /// Value sent in the `Auth` header, if the webhooks require one
    pub auth_header: Option<String>,
    pub request_timeout_secs: u64,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct SmsConfig {
    pub api_url: String,
    pub api_token: String,
    pub sender_id: String,
    /// `{code}` is replaced with the generated passcode
    pub message_template: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct OtpConfig {
    /// Challenge lifetime in seconds; 0 keeps a challenge valid for the whole session
    pub ttl_secs: u64,
    pub min_phone_len: usize,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub path: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct BrowserConfig {
    /// Command used to open the identity provider in the user's browser
    pub opener: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimitConfig {
    pub max_requests_per_minute: usize,
    pub paths: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            web_server_addr: "127.0.0.1:8081".to_string(),
            public_origin: "http://127.0.0.1:8081".to_string(),
            identity: IdentityConfig::default(),
            remote: RemoteConfig::default(),
            sms: SmsConfig::default(),
            otp: OtpConfig::default(),
            storage: StorageConfig::default(),
            browser: BrowserConfig::default(),
            rate_limit: RateLimitConfig::default(),
        }
    }
}

impl Default for IdentityConfig {
    fn default() -> Self {
        Self {
            login_url: "https://accounts.example.com/auth-login".to_string(),
            logged_out_url: "https://accounts.example.com/login".to_string(),
            staleness_secs: 24 * 60 * 60,
            login_timeout_secs: 120,
            revalidate_timeout_secs: 5,
            poll_interval_ms: 500,
            revalidate_every_secs: 60 * 60,
        }
    }
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            base_url: "https://rewards.example.com/webhook".to_string(),
            status_path: "check-status".to_string(),
            phone_lookup_path: "check-phone".to_string(),
            phone_insert_path: "insert-phone".to_string(),
            auth_header: None,
            request_timeout_secs: 15,
        }
    }
}

impl Default for SmsConfig {
    fn default() -> Self {
        Self {
            api_url: "https://sms.example.com/api/http/sms/send".to_string(),
            api_token: String::new(),
            sender_id: "Rewards".to_string(),
            message_template: "Your verification code is: {code}. Do not share this code with anyone."
                .to_string(),
        }
    }
}

impl Default for OtpConfig {
    fn default() -> Self {
        Self {
            ttl_secs: 10 * 60,
            min_phone_len: 12,
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            path: "./data/rewards.json".to_string(),
        }
    }
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            opener: "xdg-open".to_string(),
        }
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_requests_per_minute: 3,
            paths: vec!["/api/phone/otp".to_string()],
        }
    }
}

impl IdentityConfig {
    pub fn staleness_window(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.staleness_secs as i64)
    }

    pub fn login_timeout(&self) -> Duration {
        Duration::from_secs(self.login_timeout_secs)
    }

    pub fn revalidate_timeout(&self) -> Duration {
        Duration::from_secs(self.revalidate_timeout_secs)
    }

    /// Never zero; tokio intervals reject a zero period
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }

    pub fn revalidate_every(&self) -> Duration {
        Duration::from_secs(self.revalidate_every_secs.max(1))
    }
}

impl OtpConfig {
    /// `None` when challenges never expire on their own
    pub fn ttl(&self) -> Option<chrono::Duration> {
        if self.ttl_secs == 0 {
            None
        } else {
            Some(chrono::Duration::seconds(self.ttl_secs as i64))
        }
    }
}

impl Config {
    /// Load configuration from file and environment
    pub fn load() -> Result<Self, config::ConfigError> {
        // Get the run mode, defaulting to "development"
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        // Locate the config directory
        let config_dir = env::var("CONFIG_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| {
                // Check if we're in the project root or a subcrate
                let mut path = PathBuf::from("./config");
                if !path.exists() {
                    path = PathBuf::from("../config");
                }
                path
            });

        tracing::info!("Loading configuration from {}", config_dir.display());
        tracing::info!("Using run mode: {}", run_mode);

        let config = ConfigFile::builder()
            .add_source(File::from(config_dir.join("default.toml")).required(false))
            .add_source(File::from(config_dir.join(format!("{}.toml", run_mode))).required(false))
            .add_source(File::from(config_dir.join("local.toml")).required(false))
            // e.g. APP__SMS__API_TOKEN
            .add_source(Environment::with_prefix("APP").separator("__"))
            .build()?
            .try_deserialize()?;

        Ok(config)
    }

    /// Load from files and environment, falling back to defaults
    pub fn from_env() -> Self {
        match Self::load() {
            Ok(config) => {
                tracing::info!("Configuration loaded from files and environment");
                config
            },
            Err(e) => {
                tracing::warn!("Failed to load configuration: {}", e);
                tracing::info!("Falling back to built-in defaults");
                Self::default()
            }
        }
    }
}
