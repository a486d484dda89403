//! Command dispatcher
//!
//! Routes framed commands to their handlers on behalf of one client session.
//! This module owns the per-connection state machine: subscribe-mode
//! restrictions, transaction queuing, argument validation and write-back.

mod blocking;
mod transaction;

pub use transaction::Transaction;

use crate::commands::{quote_args, CommandContext, CommandSpec, Flags, Validated};
use crate::error::CommandError;
use crate::protocol::RespValue;
use crate::server::{Outbox, Server};
use crate::store::SessionId;
use bytes::Bytes;
use std::collections::{BTreeSet, HashSet};
use std::sync::Arc;
use tracing::{debug, warn};

/// Commands accepted while the session has active subscriptions
const SUBSCRIBED_ALLOWED: &[&str] = &[
    "ping",
    "subscribe",
    "unsubscribe",
    "psubscribe",
    "punsubscribe",
    "quit",
];

/// Per-connection state visible to handlers
#[derive(Debug)]
pub struct SessionState {
    pub id: SessionId,

    /// Selected database index
    pub db: usize,

    /// Open MULTI block
    pub transaction: Option<Transaction>,

    /// Watched (database, key) pairs
    pub watched: HashSet<(usize, Bytes)>,

    pub channels: BTreeSet<Bytes>,
    pub patterns: BTreeSet<Bytes>,

    /// Replies and pub/sub pushes waiting for the transport
    pub outbox: Arc<Outbox>,

    /// QUIT was received
    pub quit: bool,
}

impl SessionState {
    /// Channel plus pattern subscriptions
    pub fn subscriptions(&self) -> usize {
        self.channels.len() + self.patterns.len()
    }

    pub fn is_subscribed(&self) -> bool {
        self.subscriptions() > 0
    }

    /// Poison an open transaction after a queuing failure
    pub fn fail_transaction(&mut self) {
        if let Some(transaction) = self.transaction.as_mut() {
            warn!("Session {}: transaction poisoned", self.id);
            transaction.poison();
        }
    }
}

/// One client session attached to a server
///
/// Dropping a session without `close` queues it for cleanup before the
/// next command any session runs.
pub struct Session {
    server: Arc<Server>,
    state: SessionState,
    closed: bool,
}

impl Session {
    pub(crate) fn new(server: Arc<Server>) -> Self {
        let id = server.next_session_id();
        let outbox = Arc::new(Outbox::new());
        server.lock().pubsub.register(id, Arc::clone(&outbox));
        debug!("Session {} opened", id);

        Session {
            server,
            state: SessionState {
                id,
                db: 0,
                transaction: None,
                watched: HashSet::new(),
                channels: BTreeSet::new(),
                patterns: BTreeSet::new(),
                outbox,
                quit: false,
            },
            closed: false,
        }
    }

    pub fn id(&self) -> SessionId {
        self.state.id
    }

    pub fn server(&self) -> &Arc<Server> {
        &self.server
    }

    pub fn selected_db(&self) -> usize {
        self.state.db
    }

    pub fn outbox(&self) -> Arc<Outbox> {
        Arc::clone(&self.state.outbox)
    }

    pub fn in_transaction(&self) -> bool {
        self.state.transaction.is_some()
    }

    pub fn subscriptions(&self) -> usize {
        self.state.subscriptions()
    }

    /// QUIT was received; the transport closes after the reply
    pub fn is_quitting(&self) -> bool {
        self.state.quit
    }

    /// Execute one framed command (`args[0]` is the command name)
    pub fn execute(&mut self, args: Vec<Bytes>) -> RespValue {
        if args.is_empty() {
            return RespValue::NoReply;
        }

        let server = Arc::clone(&self.server);
        let mut guard = server.lock();
        self.prepare(&server, &mut guard);

        let mut ctx = CommandContext::new(&server, &mut guard, &mut self.state);
        route(&mut ctx, args)
    }

    /// Run one command through validation and its handler, bypassing
    /// transaction queuing (scripting and ACL re-entry)
    pub fn dispatch_one(&mut self, spec: &CommandSpec, args: Vec<Bytes>, from_script: bool) -> RespValue {
        let server = Arc::clone(&self.server);
        let mut guard = server.lock();
        self.prepare(&server, &mut guard);

        let mut ctx = CommandContext::new(&server, &mut guard, &mut self.state);
        ctx.from_script = from_script;
        if let Err(e) = spec.signature.check_arity(args.len(), ctx.config().version) {
            return e.into();
        }
        run(&mut ctx, spec, args)
    }

    /// Unregister the session from every shared table
    pub fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        self.server.lock().forget_session(self.state.id);
        self.state.transaction = None;
        self.state.watched.clear();
        self.state.channels.clear();
        self.state.patterns.clear();
        debug!("Session {} closed", self.state.id);
    }

    /// Per-command housekeeping under the server lock
    fn prepare(&self, server: &Server, state: &mut crate::server::ServerState) {
        server.drain_cleanup(state);
        server.refresh_time(state);
        state.dbs[self.state.db].sweep_expired();
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        if !self.closed {
            self.server.schedule_cleanup(self.state.id);
        }
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session").field("state", &self.state).finish()
    }
}

/// Look up a command and run or queue it
pub(crate) fn route(ctx: &mut CommandContext, mut args: Vec<Bytes>) -> RespValue {
    let name = String::from_utf8_lossy(&args[0]).to_lowercase();

    let Some(spec) = ctx.server.commands().get(&name) else {
        warn!("Unknown command: {}", name);
        ctx.session.fail_transaction();
        return CommandError::UnknownCommand {
            name: String::from_utf8_lossy(&args[0]).into_owned(),
            args: quote_args(&args[1..]),
        }
        .into();
    };

    if ctx.session.is_subscribed() && !SUBSCRIBED_ALLOWED.contains(&name.as_str()) {
        ctx.session.fail_transaction();
        return CommandError::SubscribeContext(name, ctx.config().version).into();
    }

    let params = args.split_off(1);
    if let Err(e) = spec.signature.check_arity(params.len(), ctx.config().version) {
        ctx.session.fail_transaction();
        return e.into();
    }

    if let Some(transaction) = ctx.session.transaction.as_mut() {
        if !spec.signature.has(Flags::TX_EXEMPT) {
            transaction.queue(Arc::clone(&spec), params);
            return RespValue::simple_string("QUEUED");
        }
    }

    debug!("Dispatching command: {}", name);
    let reply = run(ctx, &spec, params);
    // a failed MULTI, WATCH or similar still dooms an open transaction
    if reply.is_error() && ctx.session.transaction.is_some() {
        ctx.session.fail_transaction();
    }
    reply
}

/// Re-enter the engine from inside a command
pub(crate) fn call(ctx: &mut CommandContext, mut args: Vec<Bytes>, from_script: bool) -> RespValue {
    if args.is_empty() {
        return CommandError::custom("ERR", "Please specify at least one argument for this call").into();
    }
    let name = String::from_utf8_lossy(&args[0]).to_lowercase();
    let Some(spec) = ctx.server.commands().get(&name) else {
        return CommandError::UnknownCommand {
            name: String::from_utf8_lossy(&args[0]).into_owned(),
            args: quote_args(&args[1..]),
        }
        .into();
    };

    let params = args.split_off(1);
    if let Err(e) = spec.signature.check_arity(params.len(), ctx.config().version) {
        return e.into();
    }

    let outer = ctx.from_script;
    ctx.from_script = from_script;
    let reply = run(ctx, &spec, params);
    ctx.from_script = outer;
    reply
}

/// Validate, execute and write back one command
pub(crate) fn run(ctx: &mut CommandContext, spec: &CommandSpec, args: Vec<Bytes>) -> RespValue {
    let signature = &spec.signature;
    if ctx.from_script && signature.has(Flags::NO_SCRIPT) {
        return CommandError::NotAllowedFromScript.into();
    }

    let databases = ctx.config().databases;
    let mut args = match signature.validate(args, ctx.db(), databases) {
        Ok(Validated::Run(args)) => args,
        Ok(Validated::Shortcut(reply)) => return reply,
        Err(e) => return e.into(),
    };

    match spec.handler.execute(ctx, &mut args) {
        Ok(reply) => {
            let remove_empty = !signature.has(Flags::LEAVE_EMPTY_VAL);
            let do_not_create = signature.has(Flags::DO_NOT_CREATE);
            for item in args.take_items() {
                let index = item.db_index();
                item.writeback(&mut ctx.state.dbs[index], remove_empty, do_not_create);
            }
            reply
        }
        Err(e) => {
            debug!("{} failed: {}", signature.name, e);
            e.into()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::config::ServerConfig;

    fn cmd(args: &[&str]) -> Vec<Bytes> {
        args.iter().map(|a| Bytes::copy_from_slice(a.as_bytes())).collect()
    }

    fn session() -> Session {
        Server::new(ServerConfig::default()).session()
    }

    #[test]
    fn test_dispatch_set_get() {
        let mut session = session();
        assert_eq!(session.execute(cmd(&["SET", "mykey", "myvalue"])), RespValue::ok());
        assert_eq!(session.execute(cmd(&["get", "mykey"])), RespValue::bulk_string("myvalue"));
    }

    #[test]
    fn test_dispatch_unknown_command() {
        let mut session = session();
        let reply = session.execute(cmd(&["FOO", "a"]));
        assert_eq!(
            reply,
            RespValue::error("ERR unknown command 'FOO', with args beginning with: 'a' ")
        );
    }

    #[test]
    fn test_dispatch_invalid_args() {
        let mut session = session();
        let reply = session.execute(cmd(&["GET"]));
        assert_eq!(reply, RespValue::error("ERR Wrong number of arguments for 'get' command"));
    }

    #[test]
    fn test_queue_and_exec() {
        let mut session = session();
        assert_eq!(session.execute(cmd(&["MULTI"])), RespValue::ok());
        assert_eq!(session.execute(cmd(&["SET", "a", "1"])), RespValue::simple_string("QUEUED"));
        assert_eq!(session.execute(cmd(&["INCR", "missing_counter"])), RespValue::simple_string("QUEUED"));
        assert_eq!(
            session.execute(cmd(&["EXEC"])),
            RespValue::array(vec![RespValue::ok(), RespValue::integer(1)])
        );
        assert!(!session.in_transaction());
    }

    #[test]
    fn test_queue_error_poisons_exec() {
        let mut session = session();
        session.execute(cmd(&["MULTI"]));
        assert!(session.execute(cmd(&["GET"])).is_error());
        session.execute(cmd(&["SET", "a", "1"]));
        let reply = session.execute(cmd(&["EXEC"]));
        assert_eq!(
            reply,
            RespValue::error("EXECABORT Transaction discarded because of previous errors.")
        );
        assert_eq!(session.execute(cmd(&["GET", "a"])), RespValue::Null);
    }

    #[test]
    fn test_runtime_error_inside_exec_is_an_entry() {
        let mut session = session();
        session.execute(cmd(&["SET", "s", "text"]));
        session.execute(cmd(&["MULTI"]));
        session.execute(cmd(&["INCR", "s"]));
        session.execute(cmd(&["SET", "b", "2"]));
        let reply = session.execute(cmd(&["EXEC"]));
        let items = reply.as_array().unwrap();
        assert!(items[0].is_error());
        assert_eq!(items[1], RespValue::ok());
    }

    #[test]
    fn test_watch_conflict_from_other_session() {
        let server = Server::new(ServerConfig::default());
        let mut a = server.session();
        let mut b = server.session();

        a.execute(cmd(&["WATCH", "k"]));
        a.execute(cmd(&["MULTI"]));
        a.execute(cmd(&["SET", "k", "mine"]));
        b.execute(cmd(&["SET", "k", "theirs"]));
        assert_eq!(a.execute(cmd(&["EXEC"])), RespValue::NullArray);
        assert_eq!(a.execute(cmd(&["GET", "k"])), RespValue::bulk_string("theirs"));

        // the watch is gone after EXEC
        a.execute(cmd(&["MULTI"]));
        a.execute(cmd(&["SET", "k", "mine"]));
        assert_eq!(a.execute(cmd(&["EXEC"])), RespValue::array(vec![RespValue::ok()]));
    }

    #[test]
    fn test_transaction_state_errors() {
        let mut session = session();
        assert!(session.execute(cmd(&["EXEC"])).is_error());
        assert!(session.execute(cmd(&["DISCARD"])).is_error());
        session.execute(cmd(&["MULTI"]));
        assert_eq!(
            session.execute(cmd(&["MULTI"])),
            RespValue::error("ERR MULTI calls can not be nested")
        );
        assert_eq!(
            session.execute(cmd(&["WATCH", "x"])),
            RespValue::error("ERR WATCH inside MULTI is not allowed")
        );
        assert_eq!(session.execute(cmd(&["DISCARD"])), RespValue::ok());
    }

    #[test]
    fn test_subscribe_mode_whitelist() {
        let mut session = session();
        session.execute(cmd(&["SUBSCRIBE", "ch"]));
        let reply = session.execute(cmd(&["GET", "k"]));
        assert!(matches!(reply, RespValue::Error(ref m) if m.starts_with("ERR Can't execute 'get'")));
        assert_eq!(session.execute(cmd(&["PING"])), RespValue::bulk_array(["pong", ""].map(Bytes::from)));
        // RESET is not part of the catalogue
        let reply = session.execute(cmd(&["RESET"]));
        assert!(matches!(reply, RespValue::Error(ref m) if m.starts_with("ERR unknown command")));
    }

    #[test]
    fn test_dropped_session_is_cleaned_up() {
        let server = Server::new(ServerConfig::default());
        let mut publisher = server.session();
        {
            let mut subscriber = server.session();
            subscriber.execute(cmd(&["SUBSCRIBE", "ch"]));
        }
        // the cleanup runs before this command
        assert_eq!(publisher.execute(cmd(&["PUBLISH", "ch", "hi"])), RespValue::integer(0));
    }

    #[test]
    fn test_expired_keys_swept_per_command() {
        let clock = ManualClock::new(10_000);
        let server = Server::with_clock(ServerConfig::default(), Arc::new(clock.clone()));
        let mut session = server.session();
        session.execute(cmd(&["SET", "k", "v", "PX", "100"]));
        clock.advance_ms(101);
        assert_eq!(session.execute(cmd(&["DBSIZE"])), RespValue::integer(0));
    }

    #[test]
    fn test_no_script_commands() {
        let server = Server::new(ServerConfig::default());
        let mut session = server.session();
        let spec = server.commands().get("multi").unwrap();
        assert_eq!(
            session.dispatch_one(&spec, Vec::new(), true),
            RespValue::error("ERR This Redis command is not allowed from script")
        );
        let spec = server.commands().get("set").unwrap();
        assert_eq!(session.dispatch_one(&spec, cmd(&["k", "v"]), true), RespValue::ok());
    }
}
