//! Redis counter store using two fixed windows per key.
//!
//! Each logical key maps to one Redis counter per window index. A Lua script
//! increments the current window (setting its TTL on creation) and reads the
//! previous window in a single atomic round trip.

use std::time::Duration;

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::{Client, IntoConnectionInfo, Script};
use tokio::sync::OnceCell;

use herbarium_core::RateLimitError;
use herbarium_core::domain::window::window_index;
use herbarium_core::domain::{PolicyConfig, RateLimitKey, WindowState};
use herbarium_core::ports::CounterStore;

/// Redis connection configuration for the shared counter store.
#[derive(Debug, Clone)]
pub struct RedisConfig {
    /// Redis URL (e.g., rediss://shared-counters.internal:6379)
    pub url: String,
    /// Access token, sent as the connection password
    pub token: Option<String>,
    /// Connection timeout
    pub connect_timeout: Duration,
    /// Key prefix for counter keys
    pub key_prefix: String,
}

impl RedisConfig {
    /// Load configuration from environment variables.
    ///
    /// Returns `None` unless both the URL and the token are set; the caller then
    /// runs on in-process counters.
    pub fn from_env() -> Option<Self> {
        let url = std::env::var("RATE_LIMIT_REDIS_URL")
            .ok()
            .filter(|v| !v.trim().is_empty())?;
        let token = std::env::var("RATE_LIMIT_REDIS_TOKEN")
            .ok()
            .filter(|v| !v.trim().is_empty())?;

        Some(Self {
            url,
            token: Some(token),
            connect_timeout: Duration::from_millis(
                std::env::var("REDIS_CONNECT_TIMEOUT_MS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(1000),
            ),
            key_prefix: std::env::var("RATE_LIMIT_KEY_PREFIX")
                .unwrap_or_else(|_| "ratelimit".to_string()),
        })
    }
}

/// Redis-backed sliding-window counter store.
///
/// The connection is established lazily and retried on each call until it
/// succeeds; after that the connection manager reconnects on its own.
pub struct RedisCounterStore {
    client: Client,
    conn: OnceCell<ConnectionManager>,
    config: RedisConfig,
    /// Lua script for atomic increment with expiry plus previous-window read
    script: Script,
}

impl RedisCounterStore {
    pub fn new(config: RedisConfig) -> Result<Self, RateLimitError> {
        let mut info = config
            .url
            .as_str()
            .into_connection_info()
            .map_err(|e| RateLimitError::Backend(e.to_string()))?;
        if let Some(token) = &config.token {
            info.redis.password = Some(token.clone());
        }

        let client = Client::open(info).map_err(|e| RateLimitError::Backend(e.to_string()))?;

        // KEYS[1] = current window, KEYS[2] = previous window, ARGV[1] = TTL in ms
        // Returns: [current_count, previous_count]
        let script = Script::new(
            r#"
            local current = redis.call('INCR', KEYS[1])
            if current == 1 then
                redis.call('PEXPIRE', KEYS[1], ARGV[1])
            end

            local previous = tonumber(redis.call('GET', KEYS[2]) or '0')
            return {current, previous}
            "#,
        );

        Ok(Self {
            client,
            conn: OnceCell::new(),
            config,
            script,
        })
    }

    /// Create the store and establish the connection up front.
    pub async fn connect(config: RedisConfig) -> Result<Self, RateLimitError> {
        let store = Self::new(config)?;
        store.connection().await?;
        Ok(store)
    }

    async fn connection(&self) -> Result<ConnectionManager, RateLimitError> {
        let conn = self
            .conn
            .get_or_try_init(|| async {
                // Use timeout to prevent hanging if Redis is unreachable
                let conn_manager_fut = ConnectionManager::new(self.client.clone());
                let conn = tokio::time::timeout(self.config.connect_timeout, conn_manager_fut)
                    .await
                    .map_err(|_| RateLimitError::Timeout(self.config.connect_timeout))?
                    .map_err(|e| RateLimitError::Backend(e.to_string()))?;

                tracing::info!(url = %redact(&self.config.url), "Connected to Redis counter store");
                Ok::<_, RateLimitError>(conn)
            })
            .await?;

        Ok(conn.clone())
    }

    fn window_key(&self, key: &RateLimitKey, index: u64) -> String {
        // Hash tag keeps both windows of a key on the same cluster slot.
        format!("{}:{{{}}}:{}", self.config.key_prefix, key, index)
    }
}

#[async_trait]
impl CounterStore for RedisCounterStore {
    async fn record_hit(
        &self,
        key: &RateLimitKey,
        policy: &PolicyConfig,
        now_ms: u64,
    ) -> Result<WindowState, RateLimitError> {
        let mut conn = self.connection().await?;

        let index = window_index(now_ms, policy.window_ms);
        let current_key = self.window_key(key, index);
        let previous_key = self.window_key(key, index.saturating_sub(1));
        let ttl_ms = policy.window_ms.saturating_mul(2);

        let result: Vec<u64> = self
            .script
            .key(&current_key)
            .key(&previous_key)
            .arg(ttl_ms)
            .invoke_async(&mut conn)
            .await
            .map_err(|e| RateLimitError::Backend(e.to_string()))?;

        let current = result.first().copied().unwrap_or(1);
        // Window 0 has no predecessor; its "previous" key is itself.
        let previous = if index == 0 {
            0
        } else {
            result.get(1).copied().unwrap_or(0)
        };

        Ok(WindowState::new(previous, current, index * policy.window_ms))
    }

    fn backend(&self) -> &'static str {
        "redis"
    }
}

/// Strip credentials from a connection URL before logging it.
fn redact(url: &str) -> String {
    match (url.find("://"), url.rfind('@')) {
        (Some(scheme_end), Some(at)) if at > scheme_end => {
            format!("{}://***{}", &url[..scheme_end], &url[at..])
        }
        _ => url.to_string(),
    }
}
