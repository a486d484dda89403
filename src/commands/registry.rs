//! Command registry
//!
//! Table from command name to handler plus signature, built once when the
//! server is created. Commands not offered by the configured server flavour
//! are left out, so they report as unknown.

use super::signature::Signature;
use super::{
    admin, connection, counter, hash, key, list, pubsub, search, set, sorted_set, stream, stream_group, string,
    transaction, ttl, Command,
};
use crate::config::ServerType;
use std::collections::HashMap;
use std::sync::Arc;

/// A registered command
pub struct CommandSpec {
    pub signature: Signature,
    pub handler: Arc<dyn Command>,
}

impl std::fmt::Debug for CommandSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandSpec").field("signature", &self.signature).finish()
    }
}

/// Registry of all available commands
pub struct CommandRegistry {
    commands: HashMap<String, Arc<CommandSpec>>,
    server_type: ServerType,
}

impl CommandRegistry {
    /// Create a new command registry and register all commands
    pub fn new(server_type: ServerType) -> Self {
        let mut registry = CommandRegistry {
            commands: HashMap::new(),
            server_type,
        };

        // Register connection and server commands
        registry.register(Arc::new(connection::PingCommand));
        registry.register(Arc::new(connection::EchoCommand));
        registry.register(Arc::new(connection::SelectCommand));
        registry.register(Arc::new(connection::SwapDbCommand));
        registry.register(Arc::new(connection::QuitCommand));
        registry.register(Arc::new(admin::DbSizeCommand));
        registry.register(Arc::new(admin::FlushDbCommand));
        registry.register(Arc::new(admin::FlushAllCommand));
        registry.register(Arc::new(admin::TimeCommand));

        // Register key commands
        registry.register(Arc::new(key::DelCommand));
        registry.register(Arc::new(key::UnlinkCommand));
        registry.register(Arc::new(key::ExistsCommand));
        registry.register(Arc::new(key::TypeCommand));
        registry.register(Arc::new(key::RenameCommand));
        registry.register(Arc::new(search::KeysCommand));
        registry.register(Arc::new(search::ScanCommand));

        // Register TTL commands
        registry.register(Arc::new(ttl::ExpireCommand));
        registry.register(Arc::new(ttl::PExpireCommand));
        registry.register(Arc::new(ttl::ExpireAtCommand));
        registry.register(Arc::new(ttl::PExpireAtCommand));
        registry.register(Arc::new(ttl::TtlCommand));
        registry.register(Arc::new(ttl::PTtlCommand));
        registry.register(Arc::new(ttl::PersistCommand));

        // Register string commands
        registry.register(Arc::new(string::GetCommand));
        registry.register(Arc::new(string::SetCommand));
        registry.register(Arc::new(string::MGetCommand));
        registry.register(Arc::new(string::AppendCommand));
        registry.register(Arc::new(string::StrLenCommand));

        // Register counter commands
        registry.register(Arc::new(counter::IncrCommand));
        registry.register(Arc::new(counter::IncrByCommand));
        registry.register(Arc::new(counter::DecrCommand));
        registry.register(Arc::new(counter::DecrByCommand));

        // Register list commands
        registry.register(Arc::new(list::LPushCommand));
        registry.register(Arc::new(list::RPushCommand));
        registry.register(Arc::new(list::LPopCommand));
        registry.register(Arc::new(list::RPopCommand));
        registry.register(Arc::new(list::LLenCommand));
        registry.register(Arc::new(list::LRangeCommand));
        registry.register(Arc::new(list::BLPopCommand));
        registry.register(Arc::new(list::BRPopCommand));

        // Register hash commands
        registry.register(Arc::new(hash::HSetCommand));
        registry.register(Arc::new(hash::HGetCommand));
        registry.register(Arc::new(hash::HDelCommand));
        registry.register(Arc::new(hash::HLenCommand));
        registry.register(Arc::new(hash::HGetAllCommand));
        registry.register(Arc::new(hash::HScanCommand));

        // Register set commands
        registry.register(Arc::new(set::SAddCommand));
        registry.register(Arc::new(set::SRemCommand));
        registry.register(Arc::new(set::SMembersCommand));
        registry.register(Arc::new(set::SIsMemberCommand));
        registry.register(Arc::new(set::SCardCommand));
        registry.register(Arc::new(set::SScanCommand));

        // Register sorted set commands
        registry.register(Arc::new(sorted_set::ZAddCommand));
        registry.register(Arc::new(sorted_set::ZRemCommand));
        registry.register(Arc::new(sorted_set::ZScoreCommand));
        registry.register(Arc::new(sorted_set::ZCardCommand));
        registry.register(Arc::new(sorted_set::ZIncrByCommand));
        registry.register(Arc::new(sorted_set::ZRankCommand));
        registry.register(Arc::new(sorted_set::ZRevRankCommand));
        registry.register(Arc::new(sorted_set::ZCountCommand));
        registry.register(Arc::new(sorted_set::ZLexCountCommand));
        registry.register(Arc::new(sorted_set::ZRangeCommand));
        registry.register(Arc::new(sorted_set::ZRangeByScoreCommand));
        registry.register(Arc::new(sorted_set::ZRevRangeByScoreCommand));
        registry.register(Arc::new(sorted_set::ZRangeByLexCommand));
        registry.register(Arc::new(sorted_set::ZPopMinCommand));
        registry.register(Arc::new(sorted_set::ZPopMaxCommand));
        registry.register(Arc::new(sorted_set::BZPopMinCommand));
        registry.register(Arc::new(sorted_set::BZPopMaxCommand));
        registry.register(Arc::new(sorted_set::ZScanCommand));

        // Register stream commands
        registry.register(Arc::new(stream::XAddCommand));
        registry.register(Arc::new(stream::XLenCommand));
        registry.register(Arc::new(stream::XRangeCommand));
        registry.register(Arc::new(stream::XRevRangeCommand));
        registry.register(Arc::new(stream::XDelCommand));
        registry.register(Arc::new(stream::XTrimCommand));
        registry.register(Arc::new(stream::XReadCommand));
        registry.register(Arc::new(stream_group::XGroupCommand));
        registry.register(Arc::new(stream_group::XReadGroupCommand));
        registry.register(Arc::new(stream_group::XAckCommand));
        registry.register(Arc::new(stream_group::XPendingCommand));
        registry.register(Arc::new(stream_group::XClaimCommand));
        registry.register(Arc::new(stream_group::XAutoClaimCommand));
        registry.register(Arc::new(stream_group::XInfoCommand));

        // Register transaction commands
        registry.register(Arc::new(transaction::MultiCommand));
        registry.register(Arc::new(transaction::ExecCommand));
        registry.register(Arc::new(transaction::DiscardCommand));
        registry.register(Arc::new(transaction::WatchCommand));
        registry.register(Arc::new(transaction::UnwatchCommand));

        // Register pub/sub commands
        registry.register(Arc::new(pubsub::SubscribeCommand));
        registry.register(Arc::new(pubsub::UnsubscribeCommand));
        registry.register(Arc::new(pubsub::PSubscribeCommand));
        registry.register(Arc::new(pubsub::PUnsubscribeCommand));
        registry.register(Arc::new(pubsub::PublishCommand));
        registry.register(Arc::new(pubsub::PubSubCommand));

        registry
    }

    /// Register a command
    fn register(&mut self, command: Arc<dyn Command>) {
        let signature = command.signature();
        if !signature.available_on(self.server_type) {
            return;
        }
        let name = signature.name.to_uppercase();
        self.commands.insert(
            name,
            Arc::new(CommandSpec {
                signature,
                handler: command,
            }),
        );
    }

    /// Get a command by name (case-insensitive)
    pub fn get(&self, name: &str) -> Option<Arc<CommandSpec>> {
        self.commands.get(&name.to_uppercase()).cloned()
    }

    /// Check if a command exists
    pub fn has_command(&self, name: &str) -> bool {
        self.commands.contains_key(&name.to_uppercase())
    }

    /// Get all command names
    pub fn command_names(&self) -> Vec<String> {
        self.commands.keys().cloned().collect()
    }
}

impl Default for CommandRegistry {
    fn default() -> Self {
        Self::new(ServerType::default())
    }
}
