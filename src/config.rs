use std::{env, fs, net::SocketAddr, path::PathBuf, time::Duration};

use anyhow::{bail, Result};
use tracing::warn;
use uuid::Uuid;

use crate::{auth::AdminIdentity, store::DEFAULT_PAGE_SIZE};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    Sqlite,
    Memory,
}

#[derive(Debug, Clone)]
pub struct TelegramConfig {
    pub bot_token: String,
    pub api_base: String,
    pub webhook_path: String,
    pub webhook_secret: Option<String>,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub bind_addr: SocketAddr,
    pub store_backend: StoreBackend,
    pub db_path: PathBuf,
    pub admin: AdminIdentity,
    pub admin_password_is_fallback: bool,
    pub rate_limit_window: Duration,
    pub rate_limit_max: u32,
    pub listing_page_size: i64,
    pub csv_page_size: i64,
    pub update_queue_capacity: usize,
    pub telegram: Option<TelegramConfig>,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let bind_raw =
            env::var("NOVADESK_BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".to_string());
        let bind_normalized = bind_raw
            .trim()
            .trim_matches('"')
            .trim_matches('\'')
            .to_string();
        let mut bind_addr = bind_normalized
            .parse::<SocketAddr>()
            .unwrap_or_else(|_| SocketAddr::from(([0, 0, 0, 0], 3000)));
        if let Some(port) = parse_var::<u16>("PORT") {
            bind_addr.set_port(port);
        }

        let store_backend = match env::var("NOVADESK_STORE")
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase()
            .as_str()
        {
            "" | "sqlite" => StoreBackend::Sqlite,
            "memory" => StoreBackend::Memory,
            other => bail!("NOVADESK_STORE must be `sqlite` or `memory`, got `{other}`"),
        };

        let db_path = PathBuf::from(
            env::var("NOVADESK_DB_PATH").unwrap_or_else(|_| "data/novadesk.sqlite".to_string()),
        );

        let admin_user = env::var("ADMIN_USER")
            .ok()
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| "admin".to_string());
        let (admin_password, admin_password_is_fallback) = resolve_admin_password();

        let rate_limit_window =
            Duration::from_secs(parse_var::<u64>("ADMIN_RATE_WINDOW_SECONDS").unwrap_or(15 * 60));
        let rate_limit_max = parse_var::<u32>("ADMIN_RATE_MAX").unwrap_or(100);

        let listing_page_size = parse_var::<i64>("ADMIN_PAGE_SIZE").unwrap_or(DEFAULT_PAGE_SIZE);
        let csv_page_size = parse_var::<i64>("ADMIN_CSV_PAGE_SIZE").unwrap_or(100);

        let update_queue_capacity = parse_var::<usize>("UPDATE_QUEUE_CAPACITY")
            .unwrap_or(128)
            .max(1);

        Ok(Self {
            bind_addr,
            store_backend,
            db_path,
            admin: AdminIdentity::new(admin_user, admin_password),
            admin_password_is_fallback,
            rate_limit_window,
            rate_limit_max,
            listing_page_size,
            csv_page_size,
            update_queue_capacity,
            telegram: telegram_from_env(),
        })
    }
}

fn parse_var<T: std::str::FromStr>(key: &str) -> Option<T> {
    let raw = env::var(key).ok()?;
    match raw.trim().parse::<T>() {
        Ok(value) => Some(value),
        Err(_) => {
            warn!("Ignoring unparsable {key}={raw:?}, using default");
            None
        }
    }
}

fn non_empty_var(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn telegram_from_env() -> Option<TelegramConfig> {
    let Some(bot_token) = non_empty_var("TELEGRAM_BOT_TOKEN") else {
        warn!("TELEGRAM_BOT_TOKEN not set; chat webhook disabled");
        return None;
    };

    let mut webhook_path =
        non_empty_var("TELEGRAM_WEBHOOK_PATH").unwrap_or_else(|| "/telegram/webhook".to_string());
    if !webhook_path.starts_with('/') {
        webhook_path.insert(0, '/');
    }

    Some(TelegramConfig {
        bot_token,
        api_base: non_empty_var("TELEGRAM_API_BASE")
            .unwrap_or_else(|| "https://api.telegram.org".to_string()),
        webhook_path,
        webhook_secret: non_empty_var("TELEGRAM_WEBHOOK_SECRET"),
    })
}

fn resolve_admin_password() -> (String, bool) {
    if let Some(value) = non_empty_var("ADMIN_PASS") {
        return (value, false);
    }

    if let Ok(pass_file) = env::var("ADMIN_PASS_FILE") {
        match fs::read_to_string(&pass_file) {
            Ok(raw) => {
                let trimmed = raw.trim();
                if !trimmed.is_empty() {
                    return (trimmed.to_string(), false);
                }
                warn!("ADMIN_PASS_FILE is empty: {pass_file}. Admin panel locked with a generated password.");
            }
            Err(err) => {
                warn!("Failed reading ADMIN_PASS_FILE at {pass_file}: {err}. Admin panel locked with a generated password.");
            }
        }
    } else {
        warn!("ADMIN_PASS not set. Admin panel locked with a generated password.");
    }

    (format!("fallback-{}", Uuid::new_v4()), true)
}
