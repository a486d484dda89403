//! MULTI / EXEC / WATCH
//!
//! Commands issued after MULTI are queued verbatim. A queuing failure
//! poisons the transaction and EXEC aborts. WATCH registers the session on
//! keys; any committed write to one of them marks the session dirty and
//! EXEC then replies nil without running anything.

use super::run;
use crate::commands::{CommandContext, CommandSpec};
use crate::error::CommandError;
use crate::protocol::RespValue;
use bytes::Bytes;
use std::sync::Arc;
use tracing::{debug, warn};

/// An open MULTI block
#[derive(Default)]
pub struct Transaction {
    queued: Vec<(Arc<CommandSpec>, Vec<Bytes>)>,
    failed: bool,
}

impl Transaction {
    pub fn queue(&mut self, spec: Arc<CommandSpec>, args: Vec<Bytes>) {
        self.queued.push((spec, args));
    }

    /// Mark the transaction as discarded on EXEC
    pub fn poison(&mut self) {
        self.failed = true;
    }

    pub fn is_poisoned(&self) -> bool {
        self.failed
    }

    pub fn len(&self) -> usize {
        self.queued.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queued.is_empty()
    }
}

impl std::fmt::Debug for Transaction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Transaction")
            .field("queued", &self.queued.len())
            .field("failed", &self.failed)
            .finish()
    }
}

impl CommandContext<'_, '_> {
    pub fn multi(&mut self) -> Result<(), CommandError> {
        if self.session.transaction.is_some() {
            return Err(CommandError::NestedMulti);
        }
        self.session.transaction = Some(Transaction::default());
        Ok(())
    }

    pub fn discard(&mut self) -> Result<(), CommandError> {
        if self.session.transaction.take().is_none() {
            return Err(CommandError::DiscardWithoutMulti);
        }
        self.unwatch();
        Ok(())
    }

    /// Run the queued commands, one reply per command
    pub fn exec(&mut self) -> Result<RespValue, CommandError> {
        let transaction = self.session.transaction.take().ok_or(CommandError::ExecWithoutMulti)?;

        if transaction.failed {
            warn!("Session {}: EXEC on a poisoned transaction", self.session.id);
            self.unwatch();
            return Err(CommandError::ExecAbort);
        }

        if self.is_dirty() {
            debug!("Session {}: watched key changed, EXEC aborted", self.session.id);
            self.unwatch();
            return Ok(RespValue::NullArray);
        }
        self.unwatch();

        self.in_exec = true;
        let replies = transaction
            .queued
            .into_iter()
            .map(|(spec, args)| run(self, &spec, args))
            .collect();
        self.in_exec = false;

        Ok(RespValue::Array(replies))
    }

    pub fn watch(&mut self, keys: &[Bytes]) -> Result<(), CommandError> {
        if self.session.transaction.is_some() {
            return Err(CommandError::WatchInsideMulti);
        }
        let (id, db) = (self.session.id, self.session.db);
        for key in keys {
            self.state.dbs[db].watch(key.clone(), id);
            self.session.watched.insert((db, key.clone()));
        }
        Ok(())
    }

    /// Drop every WATCH of the session
    pub fn unwatch(&mut self) {
        let id = self.session.id;
        let dbs: std::collections::BTreeSet<usize> = self.session.watched.drain().map(|(db, _)| db).collect();
        for db in dbs {
            self.state.dbs[db].forget_session(id);
        }
    }

    /// Whether a watched key changed since WATCH
    pub fn is_dirty(&self) -> bool {
        let id = self.session.id;
        self.session
            .watched
            .iter()
            .any(|(db, _)| self.state.dbs[*db].is_touched(id))
    }
}
