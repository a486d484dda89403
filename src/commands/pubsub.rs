//! Pub/sub commands
//!
//! Subscription changes are confirmed through the session outbox, one push
//! per channel, so the commands themselves produce no direct reply.

use super::{Args, Command, CommandContext, Flags, Param, Signature};
use crate::error::{CommandError, CommandResult};
use crate::protocol::RespValue;
use crate::store::Pattern;
use bytes::Bytes;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq)]
enum Target {
    Channel,
    Pattern,
}

impl Target {
    fn subscribe_kind(self) -> &'static str {
        match self {
            Target::Channel => "subscribe",
            Target::Pattern => "psubscribe",
        }
    }

    fn unsubscribe_kind(self) -> &'static str {
        match self {
            Target::Channel => "unsubscribe",
            Target::Pattern => "punsubscribe",
        }
    }
}

/// `[kind, channel, subscription count]`
fn confirmation(kind: &str, channel: Option<Bytes>, count: usize) -> RespValue {
    RespValue::array(vec![
        RespValue::bulk_string(kind.to_string()),
        channel.map_or(RespValue::Null, RespValue::BulkString),
        RespValue::integer(count as i64),
    ])
}

fn subscribe(ctx: &mut CommandContext, args: &Args, target: Target) -> CommandResult {
    let id = ctx.session.id;
    for name in args.raw_all() {
        let added = match target {
            Target::Channel => ctx.session.channels.insert(name.clone()),
            Target::Pattern => ctx.session.patterns.insert(name.clone()),
        };
        if added {
            match target {
                Target::Channel => ctx.state.pubsub.subscribe(id, name.clone()),
                Target::Pattern => ctx.state.pubsub.psubscribe(id, name.clone()),
            }
            debug!("Session {} {} {}", id, target.subscribe_kind(), String::from_utf8_lossy(name));
        }
        let count = ctx.session.subscriptions();
        ctx.session
            .outbox
            .push(confirmation(target.subscribe_kind(), Some(name.clone()), count));
    }
    Ok(RespValue::NoReply)
}

fn unsubscribe(ctx: &mut CommandContext, args: &Args, target: Target) -> CommandResult {
    let id = ctx.session.id;
    let names: Vec<Bytes> = if args.is_empty() {
        match target {
            Target::Channel => ctx.session.channels.iter().cloned().collect(),
            Target::Pattern => ctx.session.patterns.iter().cloned().collect(),
        }
    } else {
        args.raw_all().to_vec()
    };

    if names.is_empty() {
        let count = ctx.session.subscriptions();
        ctx.session.outbox.push(confirmation(target.unsubscribe_kind(), None, count));
        return Ok(RespValue::NoReply);
    }

    for name in names {
        match target {
            Target::Channel => {
                ctx.session.channels.remove(&name);
                ctx.state.pubsub.unsubscribe(id, &name);
            }
            Target::Pattern => {
                ctx.session.patterns.remove(&name);
                ctx.state.pubsub.punsubscribe(id, &name);
            }
        }
        let count = ctx.session.subscriptions();
        ctx.session
            .outbox
            .push(confirmation(target.unsubscribe_kind(), Some(name), count));
    }
    Ok(RespValue::NoReply)
}

/// SUBSCRIBE command - Listen for messages published to channels
///
/// Syntax: SUBSCRIBE channel [channel ...]
pub struct SubscribeCommand;

impl Command for SubscribeCommand {
    fn execute(&self, ctx: &mut CommandContext, args: &mut Args) -> CommandResult {
        subscribe(ctx, args, Target::Channel)
    }

    fn signature(&self) -> Signature {
        Signature::new("subscribe", vec![Param::Bytes])
            .repeat(vec![Param::Bytes])
            .flags(Flags::NO_SCRIPT)
    }
}

/// UNSUBSCRIBE command - Stop listening on channels (all of them without arguments)
///
/// Syntax: UNSUBSCRIBE [channel ...]
pub struct UnsubscribeCommand;

impl Command for UnsubscribeCommand {
    fn execute(&self, ctx: &mut CommandContext, args: &mut Args) -> CommandResult {
        unsubscribe(ctx, args, Target::Channel)
    }

    fn signature(&self) -> Signature {
        Signature::new("unsubscribe", vec![])
            .repeat(vec![Param::Bytes])
            .flags(Flags::NO_SCRIPT)
    }
}

/// PSUBSCRIBE command - Listen on every channel matching glob patterns
///
/// Syntax: PSUBSCRIBE pattern [pattern ...]
pub struct PSubscribeCommand;

impl Command for PSubscribeCommand {
    fn execute(&self, ctx: &mut CommandContext, args: &mut Args) -> CommandResult {
        subscribe(ctx, args, Target::Pattern)
    }

    fn signature(&self) -> Signature {
        Signature::new("psubscribe", vec![Param::Bytes])
            .repeat(vec![Param::Bytes])
            .flags(Flags::NO_SCRIPT)
    }
}

/// PUNSUBSCRIBE command - Drop pattern subscriptions
///
/// Syntax: PUNSUBSCRIBE [pattern ...]
pub struct PUnsubscribeCommand;

impl Command for PUnsubscribeCommand {
    fn execute(&self, ctx: &mut CommandContext, args: &mut Args) -> CommandResult {
        unsubscribe(ctx, args, Target::Pattern)
    }

    fn signature(&self) -> Signature {
        Signature::new("punsubscribe", vec![])
            .repeat(vec![Param::Bytes])
            .flags(Flags::NO_SCRIPT)
    }
}

/// PUBLISH command - Post a message to a channel
///
/// Syntax: PUBLISH channel message
pub struct PublishCommand;

impl Command for PublishCommand {
    fn execute(&self, ctx: &mut CommandContext, args: &mut Args) -> CommandResult {
        let receivers = ctx.state.pubsub.publish(args.raw(0), args.raw(1));
        Ok(RespValue::integer(receivers as i64))
    }

    fn signature(&self) -> Signature {
        Signature::new("publish", vec![Param::Bytes, Param::Bytes])
    }
}

/// PUBSUB command - Introspect the subscriber tables
///
/// Syntax: PUBSUB CHANNELS [pattern] | PUBSUB NUMSUB [channel ...] | PUBSUB NUMPAT
pub struct PubSubCommand;

impl Command for PubSubCommand {
    fn execute(&self, ctx: &mut CommandContext, args: &mut Args) -> CommandResult {
        let raw = args.raw_all();
        let sub = String::from_utf8_lossy(&raw[0]).to_lowercase();
        let pubsub = &ctx.state.pubsub;
        match (sub.as_str(), &raw[1..]) {
            ("channels", []) => Ok(RespValue::bulk_array(pubsub.channels(None))),
            ("channels", [pattern]) => {
                let pattern = Pattern::compile(pattern);
                Ok(RespValue::bulk_array(pubsub.channels(Some(&pattern))))
            }
            ("numsub", channels) => {
                let mut out = Vec::with_capacity(channels.len() * 2);
                for channel in channels {
                    out.push(RespValue::bulk_string(channel.clone()));
                    out.push(RespValue::integer(pubsub.numsub(channel) as i64));
                }
                Ok(RespValue::array(out))
            }
            ("numpat", []) => Ok(RespValue::integer(pubsub.numpat() as i64)),
            ("channels" | "numpat", _) => Err(ctx.arity_error(&format!("pubsub|{}", sub))),
            _ => Err(CommandError::UnknownSubcommand {
                command: "PUBSUB".to_string(),
                subcommand: String::from_utf8_lossy(&raw[0]).into_owned(),
            }),
        }
    }

    fn signature(&self) -> Signature {
        Signature::new("pubsub", vec![Param::Bytes]).repeat(vec![Param::Bytes])
    }
}

#[cfg(test)]
mod tests {
    use super::super::testing::{bulk, run, session};
    use super::*;
    use crate::config::ServerConfig;
    use crate::server::Server;

    fn confirm(kind: &str, channel: &str, count: i64) -> RespValue {
        RespValue::array(vec![
            RespValue::bulk_string(kind.to_string()),
            RespValue::bulk_string(channel.to_string()),
            RespValue::integer(count),
        ])
    }

    #[test]
    fn test_subscribe_confirmations() {
        let mut s = session();
        assert_eq!(run(&mut s, &["SUBSCRIBE", "a", "b", "a"]), RespValue::NoReply);
        assert_eq!(
            s.outbox().drain(),
            vec![confirm("subscribe", "a", 1), confirm("subscribe", "b", 2), confirm("subscribe", "a", 2)]
        );

        run(&mut s, &["PSUBSCRIBE", "n*"]);
        assert_eq!(s.outbox().drain(), vec![confirm("psubscribe", "n*", 3)]);

        run(&mut s, &["UNSUBSCRIBE"]);
        assert_eq!(
            s.outbox().drain(),
            vec![confirm("unsubscribe", "a", 2), confirm("unsubscribe", "b", 1)]
        );
        run(&mut s, &["PUNSUBSCRIBE"]);
        assert_eq!(s.outbox().drain(), vec![confirm("punsubscribe", "n*", 0)]);
        assert_eq!(s.subscriptions(), 0);
    }

    #[test]
    fn test_unsubscribe_without_subscriptions() {
        let mut s = session();
        run(&mut s, &["UNSUBSCRIBE"]);
        assert_eq!(
            s.outbox().drain(),
            vec![RespValue::array(vec![
                RespValue::bulk_string("unsubscribe"),
                RespValue::Null,
                RespValue::integer(0),
            ])]
        );
    }

    #[test]
    fn test_subscribed_session_is_restricted() {
        let mut s = session();
        run(&mut s, &["SUBSCRIBE", "a"]);
        let reply = run(&mut s, &["GET", "k"]);
        assert!(reply.is_error());
        assert_eq!(run(&mut s, &["PING"]), bulk(&["pong", ""]));
    }

    #[test]
    fn test_publish_reaches_subscribers() {
        let server = Server::new(ServerConfig::default());
        let mut listener = server.session();
        let mut other = server.session();
        let mut publisher = server.session();

        run(&mut listener, &["SUBSCRIBE", "news"]);
        run(&mut other, &["PSUBSCRIBE", "n*"]);
        listener.outbox().drain();
        other.outbox().drain();

        assert_eq!(run(&mut publisher, &["PUBLISH", "news", "hello"]), RespValue::integer(2));
        assert_eq!(run(&mut publisher, &["PUBLISH", "sports", "goal"]), RespValue::integer(0));
        assert_eq!(listener.outbox().drain(), vec![bulk(&["message", "news", "hello"])]);
        assert_eq!(other.outbox().drain(), vec![bulk(&["pmessage", "n*", "news", "hello"])]);
    }

    #[test]
    fn test_pubsub_introspection() {
        let server = Server::new(ServerConfig::default());
        let mut a = server.session();
        let mut b = server.session();
        let mut admin = server.session();
        run(&mut a, &["SUBSCRIBE", "alpha", "beta"]);
        run(&mut b, &["SUBSCRIBE", "alpha"]);
        run(&mut b, &["PSUBSCRIBE", "*"]);

        assert_eq!(run(&mut admin, &["PUBSUB", "CHANNELS"]), bulk(&["alpha", "beta"]));
        assert_eq!(run(&mut admin, &["PUBSUB", "CHANNELS", "b*"]), bulk(&["beta"]));
        assert_eq!(
            run(&mut admin, &["PUBSUB", "NUMSUB", "alpha", "gamma"]),
            RespValue::array(vec![
                RespValue::bulk_string("alpha"),
                RespValue::integer(2),
                RespValue::bulk_string("gamma"),
                RespValue::integer(0),
            ])
        );
        assert_eq!(run(&mut admin, &["PUBSUB", "NUMPAT"]), RespValue::integer(1));
        assert!(run(&mut admin, &["PUBSUB", "NOPE"]).is_error());
    }

    #[test]
    fn test_closed_session_stops_receiving() {
        let server = Server::new(ServerConfig::default());
        let mut listener = server.session();
        let mut publisher = server.session();
        run(&mut listener, &["SUBSCRIBE", "news"]);
        listener.close();
        assert_eq!(run(&mut publisher, &["PUBLISH", "news", "x"]), RespValue::integer(0));
    }
}
