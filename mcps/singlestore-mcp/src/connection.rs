//! Connection manager
//!
//! Owns the one database session of the process. The session is created
//! lazily, checked before each use and replaced at most once per
//! acquisition when it has gone away. [`ConnectionManager::acquire`] hands out
//! a [`ConnectionGuard`] that holds the mutex for as long as it lives, so
//! statements from concurrent requests never interleave on the session.

use crate::config::SingleStoreConfig;
use crate::error::{SingleStoreError, SingleStoreResult};
use sqlx::mysql::{MySqlConnectOptions, MySqlConnection};
use sqlx::Connection;
use std::time::Duration;
use tokio::sync::{Mutex, MutexGuard};
use tracing::{debug, info, warn};

/// Upper bound on one connection attempt, handshake included
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Single shared SingleStore session
pub struct ConnectionManager {
    options: MySqlConnectOptions,
    target: String,
    connect_timeout: Duration,
    slot: Mutex<Option<MySqlConnection>>,
}

impl ConnectionManager {
    /// Create a manager; no connection is opened until first use
    pub fn new(config: &SingleStoreConfig) -> Self {
        Self {
            options: config.connect_options(),
            target: format!("{}:{}/{}", config.host, config.port, config.database),
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            slot: Mutex::new(None),
        }
    }

    /// Override the per-attempt connect timeout
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Wait for exclusive access to the session
    pub async fn acquire(&self) -> ConnectionGuard<'_> {
        ConnectionGuard {
            slot: self.slot.lock().await,
            options: &self.options,
            target: &self.target,
            connect_timeout: self.connect_timeout,
        }
    }

    /// Whether a session is currently open
    pub async fn is_connected(&self) -> bool {
        self.slot.lock().await.is_some()
    }
}

/// Exclusive access to the shared session, released on drop
pub struct ConnectionGuard<'a> {
    slot: MutexGuard<'a, Option<MySqlConnection>>,
    options: &'a MySqlConnectOptions,
    target: &'a str,
    connect_timeout: Duration,
}

impl ConnectionGuard<'_> {
    /// Live session, connecting or reconnecting once if needed
    pub async fn connection(&mut self) -> SingleStoreResult<&mut MySqlConnection> {
        let healthy = match self.slot.as_mut() {
            Some(conn) => match conn.ping().await {
                Ok(()) => true,
                Err(e) => {
                    warn!(db = %self.target, error = %e, "SingleStore session lost");
                    false
                }
            },
            None => false,
        };

        if !healthy {
            if self.slot.is_some() {
                self.reconnect().await?;
            } else if let Err(e) = self.connect().await {
                warn!(db = %self.target, error = %e, "Initial connection failed, retrying once");
                self.reconnect().await?;
            }
        }

        self.slot
            .as_mut()
            .ok_or_else(|| SingleStoreError::Connection(format!("no session to {}", self.target)))
    }

    /// Close the current session, ignoring close errors, and open a new one
    pub async fn reconnect(&mut self) -> SingleStoreResult<()> {
        if let Some(stale) = self.slot.take() {
            if let Err(e) = stale.close().await {
                debug!(error = %e, "Ignoring error while closing stale session");
            }
        }
        self.connect().await
    }

    /// Drop the session so the next acquisition reconnects
    pub fn invalidate(&mut self) {
        if self.slot.take().is_some() {
            debug!(db = %self.target, "Session invalidated");
        }
    }

    /// Invalidate the session if `err` means it can no longer be trusted
    pub fn invalidate_on(&mut self, err: &SingleStoreError) {
        if err.is_connection() {
            self.invalidate();
        }
    }

    async fn connect(&mut self) -> SingleStoreResult<()> {
        let conn = tokio::time::timeout(self.connect_timeout, MySqlConnection::connect_with(self.options))
            .await
            .map_err(|_| {
                SingleStoreError::Connection(format!(
                    "{}: connection attempt timed out after {:?}",
                    self.target, self.connect_timeout
                ))
            })?
            .map_err(|e| SingleStoreError::Connection(format!("{}: {}", self.target, e)))?;
        info!(db = %self.target, "Connected to SingleStore");
        *self.slot = Some(conn);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use tokio::net::TcpListener;

    fn config_for_port(port: u16) -> SingleStoreConfig {
        SingleStoreConfig::from_lookup(|name| match name {
            "SINGLESTORE_HOST" => Some("127.0.0.1".to_string()),
            "SINGLESTORE_PORT" => Some(port.to_string()),
            "SINGLESTORE_USER" => Some("nobody".to_string()),
            "SINGLESTORE_PASSWORD" => Some(String::new()),
            "SINGLESTORE_DATABASE" => Some("nothing".to_string()),
            _ => None,
        })
        .unwrap()
    }

    fn unreachable_config() -> SingleStoreConfig {
        // Nothing listens on the tcpmux port in a test environment
        config_for_port(1)
    }

    /// Local listener that counts accepted sockets; `hold` keeps them open without a handshake
    async fn counting_listener(hold: bool) -> (u16, Arc<AtomicUsize>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let accepted = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&accepted);
        tokio::spawn(async move {
            let mut held = Vec::new();
            while let Ok((socket, _)) = listener.accept().await {
                counter.fetch_add(1, Ordering::SeqCst);
                if hold {
                    held.push(socket);
                } else {
                    drop(socket);
                }
            }
        });
        (port, accepted)
    }

    #[tokio::test]
    async fn test_failed_connect_is_retried_exactly_once() {
        let (port, accepted) = counting_listener(false).await;
        let manager = ConnectionManager::new(&config_for_port(port));

        let mut guard = manager.acquire().await;
        let err = guard.connection().await.unwrap_err();
        assert!(err.is_connection(), "unexpected error: {}", err);
        drop(guard);

        assert_eq!(accepted.load(Ordering::SeqCst), 2);
        assert!(!manager.is_connected().await);
    }

    #[tokio::test]
    async fn test_silent_server_times_out() {
        let (port, accepted) = counting_listener(true).await;
        let manager =
            ConnectionManager::new(&config_for_port(port)).with_connect_timeout(Duration::from_millis(100));

        let mut guard = manager.acquire().await;
        let err = tokio::time::timeout(Duration::from_secs(5), guard.connection())
            .await
            .expect("connect timeout must bound the attempt")
            .unwrap_err();
        assert!(err.is_connection(), "unexpected error: {}", err);
        assert!(err.to_string().contains("timed out"), "{}", err);
        drop(guard);

        assert_eq!(accepted.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_default_connect_timeout() {
        let manager = ConnectionManager::new(&unreachable_config());
        assert_eq!(manager.connect_timeout, DEFAULT_CONNECT_TIMEOUT);
    }

    #[tokio::test]
    async fn test_lazy_connection() {
        let manager = ConnectionManager::new(&unreachable_config());
        assert!(!manager.is_connected().await);
    }

    #[tokio::test]
    async fn test_unreachable_is_connection_error() {
        let manager = ConnectionManager::new(&unreachable_config());
        let mut guard = manager.acquire().await;
        let err = guard.connection().await.unwrap_err();
        assert!(err.is_connection(), "unexpected error: {}", err);
        drop(guard);
        assert!(!manager.is_connected().await);
    }

    #[tokio::test]
    async fn test_guard_is_exclusive() {
        let manager = ConnectionManager::new(&unreachable_config());
        let guard = manager.acquire().await;

        let second = tokio::time::timeout(Duration::from_millis(50), manager.acquire()).await;
        assert!(second.is_err(), "second acquire must wait for the first guard");

        drop(guard);
        let third = tokio::time::timeout(Duration::from_millis(50), manager.acquire()).await;
        assert!(third.is_ok());
    }

    #[tokio::test]
    async fn test_guard_released_on_error_path() {
        let manager = ConnectionManager::new(&unreachable_config());
        {
            let mut guard = manager.acquire().await;
            let _ = guard.connection().await;
        }
        let again = tokio::time::timeout(Duration::from_millis(50), manager.acquire()).await;
        assert!(again.is_ok());
    }
}
