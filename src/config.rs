use serde::Deserialize;

/// Development-only default; `load` warns (or refuses, in production)
/// when the real key is missing.
pub const ADMIN_KEY_PLACEHOLDER: &str = "CHANGE_ME_ADMIN_KEY";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    Memory,
    Redis,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub port: u16,
    pub store: StoreBackend,
    pub redis_url: String,
    /// External command invoked as `<ring_command> <duration_ms>`.
    /// Set via BELLGATE_RING_COMMAND. Default: `echo` (a silent bell for
    /// development).
    pub ring_command: String,
    /// Extra time the ring command gets past the requested duration
    /// before it is considered hung. BELLGATE_RING_GRACE_MS, default 5000.
    pub ring_grace_ms: u64,
    pub admin_key: String,
    /// Seed the built-in sample tokens at startup.
    pub sample_tokens: bool,
}

pub fn load() -> anyhow::Result<Config> {
    dotenvy::dotenv().ok();

    let admin_key =
        std::env::var("BELLGATE_ADMIN_KEY").unwrap_or_else(|_| ADMIN_KEY_PLACEHOLDER.into());

    if admin_key == ADMIN_KEY_PLACEHOLDER {
        let env_mode = std::env::var("BELLGATE_ENV")
            .or_else(|_| std::env::var("RUST_ENV"))
            .unwrap_or_default();
        if env_mode == "production" {
            anyhow::bail!(
                "BELLGATE_ADMIN_KEY is still the insecure placeholder. \
                 Set a proper key before running in production."
            );
        }
        eprintln!("⚠️  BELLGATE_ADMIN_KEY is not set — using insecure placeholder. Set a real key for production.");
    }

    let store = match std::env::var("BELLGATE_STORE").as_deref() {
        Ok("redis") => StoreBackend::Redis,
        Ok("memory") | Err(_) => StoreBackend::Memory,
        Ok(other) => {
            tracing::warn!("store backend '{}' is not known (memory will be used)", other);
            StoreBackend::Memory
        }
    };

    Ok(Config {
        port: std::env::var("BELLGATE_PORT")
            .unwrap_or_else(|_| "8000".into())
            .parse()
            .unwrap_or(8000),
        store,
        redis_url: std::env::var("REDIS_URL").unwrap_or_else(|_| "redis://127.0.0.1:6379".into()),
        ring_command: std::env::var("BELLGATE_RING_COMMAND").unwrap_or_else(|_| "echo".into()),
        ring_grace_ms: std::env::var("BELLGATE_RING_GRACE_MS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(5000),
        admin_key,
        sample_tokens: std::env::var("BELLGATE_SAMPLE_TOKENS")
            .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
            .unwrap_or(false),
    })
}
