//! Command execution context
//!
//! Gives handlers the server state (under the server-wide lock), the calling
//! session and the helpers they share: key resolution, write-back and
//! re-entry. The blocking retry loop lives in `dispatch::blocking`.

use super::item::CommandItem;
use crate::config::ServerConfig;
use crate::dispatch::SessionState;
use crate::error::CommandError;
use crate::protocol::RespValue;
use crate::server::{Server, ServerState};
use crate::store::{Database, ValueKind};
use bytes::Bytes;
use parking_lot::MutexGuard;

/// Context provided to commands during execution
pub struct CommandContext<'a, 'g> {
    pub server: &'a Server,

    /// Server state; the lock is held for the whole command
    pub state: &'a mut MutexGuard<'g, ServerState>,

    pub session: &'a mut SessionState,

    /// Running inside EXEC (blocking commands must not wait)
    pub in_exec: bool,

    /// Called from a script
    pub from_script: bool,
}

impl<'a, 'g> CommandContext<'a, 'g> {
    pub fn new(server: &'a Server, state: &'a mut MutexGuard<'g, ServerState>, session: &'a mut SessionState) -> Self {
        CommandContext {
            server,
            state,
            session,
            in_exec: false,
            from_script: false,
        }
    }

    pub fn config(&self) -> &ServerConfig {
        self.server.config()
    }

    /// The session's selected database
    pub fn db(&mut self) -> &mut Database {
        let index = self.session.db;
        &mut self.state.dbs[index]
    }

    /// Logical time of the selected database
    pub fn now_ms(&self) -> u64 {
        self.state.dbs[self.session.db].time_ms()
    }

    pub fn arity_error(&self, command: &str) -> CommandError {
        CommandError::WrongArity {
            command: command.to_string(),
            version: self.config().version,
        }
    }

    /// Resolve a key of the selected database outside the signature
    ///
    /// Fails with WRONGTYPE when the key holds another kind than `kind`.
    pub fn resolve(&mut self, key: &Bytes, kind: Option<ValueKind>) -> Result<CommandItem, CommandError> {
        let item = CommandItem::resolve(self.db(), key.clone(), None);
        match (kind, item.kind()) {
            (Some(expected), Some(actual)) if expected != actual => Err(CommandError::WrongType),
            _ => Ok(item),
        }
    }

    /// Commit an item resolved with `resolve`
    pub fn write_back(&mut self, item: CommandItem, remove_empty: bool) {
        let index = item.db_index();
        item.writeback(&mut self.state.dbs[index], remove_empty, false);
    }

    /// Run a command from inside another one (scripts)
    pub fn call(&mut self, args: Vec<Bytes>, from_script: bool) -> RespValue {
        crate::dispatch::call(self, args, from_script)
    }
}
