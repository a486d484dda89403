//! Blocking coordinator
//!
//! Blocking commands hand in an attempt function. The first attempt runs
//! immediately; after that the session sleeps on the selected database's
//! condition variable (releasing the server lock) and retries after every
//! committed write to that database. Waiters are not queued: whichever woken
//! session first finds data takes it.

use crate::commands::CommandContext;
use crate::error::CommandError;
use crate::protocol::RespValue;
use std::time::{Duration, Instant};
use tracing::debug;

impl CommandContext<'_, '_> {
    /// Retry `attempt` until it produces a reply or the timeout passes
    ///
    /// `attempt` gets `true` on the first call only. Inside EXEC the first
    /// result is final. A `None` timeout waits forever; `Ok(None)` means the
    /// deadline passed.
    pub fn block<F>(&mut self, timeout: Option<Duration>, mut attempt: F) -> Result<Option<RespValue>, CommandError>
    where
        F: FnMut(&mut Self, bool) -> Result<Option<RespValue>, CommandError>,
    {
        let first = attempt(self, true)?;
        if first.is_some() || self.in_exec {
            return Ok(first);
        }

        // a deadline past what `Instant` can hold is the same as none
        let deadline = timeout.and_then(|t| Instant::now().checked_add(t));
        let condvar = self.db().condvar();
        debug!("Session {} blocking on db{}", self.session.id, self.session.db);

        loop {
            match deadline {
                Some(deadline) => {
                    if condvar.wait_until(&mut *self.state, deadline).timed_out() {
                        debug!("Session {} timed out", self.session.id);
                        return Ok(None);
                    }
                }
                None => condvar.wait(&mut *self.state),
            }

            // fresh logical time for every retry
            self.server.refresh_time(&mut *self.state);
            if let Some(reply) = attempt(self, false)? {
                return Ok(Some(reply));
            }
        }
    }
}
