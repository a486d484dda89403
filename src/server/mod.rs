//! Server module
//!
//! `Server` is one emulated instance: every database, the pub/sub tables and
//! the command registry behind a single server-wide lock, plus one condition
//! variable per database for blocking commands. Sessions attach to it through
//! the in-process `FakeLink` or the optional TCP listener.

mod connection;
mod link;
mod pubsub;

use crate::clock::{Clock, SystemClock};
use crate::commands::CommandRegistry;
use crate::config::ServerConfig;
use crate::dispatch::Session;
use crate::store::{Database, SessionId};
use parking_lot::{Condvar, Mutex, MutexGuard};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{debug, error, info};

pub use connection::Connection;
pub use link::FakeLink;
pub use pubsub::{Outbox, PubSub};

/// Everything guarded by the server-wide lock
#[derive(Debug)]
pub struct ServerState {
    pub dbs: Vec<Database>,
    pub pubsub: PubSub,
}

impl ServerState {
    /// Remove a session from every watcher and subscriber table
    pub fn forget_session(&mut self, session: SessionId) {
        for db in &mut self.dbs {
            db.forget_session(session);
        }
        self.pubsub.remove_session(session);
    }
}

/// One emulated server instance
pub struct Server {
    state: Mutex<ServerState>,
    clock: Arc<dyn Clock>,
    config: ServerConfig,
    commands: CommandRegistry,
    connected: AtomicBool,
    pending_cleanup: Mutex<Vec<SessionId>>,
    next_session: AtomicU64,
}

impl Server {
    /// Create a server running on wall-clock time
    pub fn new(config: ServerConfig) -> Arc<Self> {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    /// Create a server driven by the given clock
    pub fn with_clock(config: ServerConfig, clock: Arc<dyn Clock>) -> Arc<Self> {
        let dbs = (0..config.databases)
            .map(|index| Database::new(index, Arc::new(Condvar::new())))
            .collect();

        Arc::new(Server {
            state: Mutex::new(ServerState {
                dbs,
                pubsub: PubSub::default(),
            }),
            clock,
            commands: CommandRegistry::new(config.server_type),
            config,
            connected: AtomicBool::new(true),
            pending_cleanup: Mutex::new(Vec::new()),
            next_session: AtomicU64::new(1),
        })
    }

    /// Open a new client session
    pub fn session(self: &Arc<Self>) -> Session {
        Session::new(Arc::clone(self))
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    pub fn clock(&self) -> &dyn Clock {
        self.clock.as_ref()
    }

    pub fn commands(&self) -> &CommandRegistry {
        &self.commands
    }

    /// Whether the emulated server is reachable
    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    /// Switch the emulated server on or off
    pub fn set_connected(&self, connected: bool) {
        info!("Server {}", if connected { "up" } else { "down" });
        self.connected.store(connected, Ordering::SeqCst);
    }

    /// Run `f` against one database under the server lock
    pub fn with_database<R>(&self, index: usize, f: impl FnOnce(&mut Database) -> R) -> Option<R> {
        let mut state = self.state.lock();
        let now = self.clock.now_ms();
        let db = state.dbs.get_mut(index)?;
        db.set_time(now);
        Some(f(db))
    }

    pub(crate) fn lock(&self) -> MutexGuard<'_, ServerState> {
        self.state.lock()
    }

    pub(crate) fn next_session_id(&self) -> SessionId {
        self.next_session.fetch_add(1, Ordering::SeqCst)
    }

    /// Copy the clock into every database
    pub(crate) fn refresh_time(&self, state: &mut ServerState) {
        let now = self.clock.now_ms();
        for db in &mut state.dbs {
            db.set_time(now);
        }
    }

    /// Queue a dropped session for unregistration
    pub(crate) fn schedule_cleanup(&self, session: SessionId) {
        self.pending_cleanup.lock().push(session);
    }

    /// Unregister every session queued by `schedule_cleanup`
    pub(crate) fn drain_cleanup(&self, state: &mut ServerState) {
        let pending = std::mem::take(&mut *self.pending_cleanup.lock());
        for session in pending {
            debug!("Cleaning up dropped session {}", session);
            state.forget_session(session);
        }
    }
}

impl std::fmt::Debug for Server {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Server")
            .field("config", &self.config)
            .field("connected", &self.is_connected())
            .finish()
    }
}

/// Named servers, so several client handles can share one instance
#[derive(Default)]
pub struct ServerRegistry {
    servers: Mutex<HashMap<String, Arc<Server>>>,
}

impl ServerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The server registered under `name`, created with `config` on first use
    pub fn get_or_create(&self, name: &str, config: &ServerConfig) -> Arc<Server> {
        let mut servers = self.servers.lock();
        let server = servers.entry(name.to_string()).or_insert_with(|| {
            debug!("Creating emulated server '{}'", name);
            Server::new(config.clone())
        });
        Arc::clone(server)
    }

    /// Register an existing server under `name`, replacing any previous one
    pub fn insert(&self, name: &str, server: Arc<Server>) {
        self.servers.lock().insert(name.to_string(), server);
    }

    pub fn get(&self, name: &str) -> Option<Arc<Server>> {
        self.servers.lock().get(name).cloned()
    }

    pub fn remove(&self, name: &str) -> Option<Arc<Server>> {
        self.servers.lock().remove(name)
    }

    pub fn clear(&self) {
        self.servers.lock().clear();
    }

    pub fn len(&self) -> usize {
        self.servers.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Run the server
///
/// Starts the TCP listener on `config.listen_addr` and serves every
/// connection against one shared instance.
pub async fn run(config: ServerConfig) -> anyhow::Result<()> {
    let listener = TcpListener::bind(&config.listen_addr).await?;
    info!("redemu listening on {}", config.listen_addr);

    let server = Server::new(config);

    loop {
        // Accept incoming connections
        let (socket, addr) = listener.accept().await?;
        info!("New connection from {}", addr);

        let server = Arc::clone(&server);

        // Spawn a new task to handle this connection
        tokio::spawn(async move {
            let mut connection = Connection::new(socket);

            if let Err(e) = connection.handle(server).await {
                error!("Connection error from {}: {}", addr, e);
            }

            info!("Connection closed: {}", addr);
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::store::{Item, Value};
    use bytes::Bytes;

    #[test]
    fn test_databases_follow_config() {
        let config = ServerConfig {
            databases: 4,
            ..ServerConfig::default()
        };
        let server = Server::new(config);
        assert!(server.with_database(3, |db| db.index()).is_some());
        assert!(server.with_database(4, |db| db.index()).is_none());
    }

    #[test]
    fn test_registry_shares_instances() {
        let registry = ServerRegistry::new();
        let config = ServerConfig::default();
        let a = registry.get_or_create("redis://localhost:6379/0", &config);
        let b = registry.get_or_create("redis://localhost:6379/0", &config);
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(registry.len(), 1);

        assert!(registry.remove("redis://localhost:6379/0").is_some());
        assert!(registry.get("redis://localhost:6379/0").is_none());

        registry.get_or_create("other", &config);
        registry.clear();
        assert!(registry.is_empty());
    }

    #[test]
    fn test_with_database_uses_clock_time() {
        let clock = ManualClock::new(1_000);
        let server = Server::with_clock(ServerConfig::default(), Arc::new(clock.clone()));
        server.with_database(0, |db| {
            db.insert(Bytes::from("k"), Item::with_expiration(Value::string("v"), 1_500));
        });
        clock.advance_ms(1_000);
        assert_eq!(server.with_database(0, |db| db.contains(b"k")), Some(false));
    }

    #[test]
    fn test_connected_switch() {
        let server = Server::new(ServerConfig::default());
        assert!(server.is_connected());
        server.set_connected(false);
        assert!(!server.is_connected());
    }
}
