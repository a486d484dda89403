//! Error types
//!
//! Command errors are values: the dispatcher turns them into `-PREFIX message`
//! replies. Protocol and link errors are fatal for the connection that sees them.

use thiserror::Error;

/// A recoverable, per-invocation command failure
///
/// The rendered message always starts with the category prefix (`ERR`,
/// `WRONGTYPE`, `EXECABORT`, `NOGROUP`, ...) followed by a space.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CommandError {
    #[error("ERR unknown command '{name}', with args beginning with: {args}")]
    UnknownCommand { name: String, args: String },

    #[error("{}", arity_message(.command, *.version))]
    WrongArity { command: String, version: u8 },

    #[error("ERR unknown subcommand '{subcommand}'. Try {command} HELP.")]
    UnknownSubcommand { command: String, subcommand: String },

    #[error("WRONGTYPE Operation against a key holding the wrong kind of value")]
    WrongType,

    #[error("ERR syntax error")]
    Syntax,

    #[error("ERR value is not an integer or out of range")]
    NotInteger,

    #[error("ERR value is not a valid float")]
    NotFloat,

    #[error("ERR increment or decrement would overflow")]
    Overflow,

    #[error("ERR increment would produce NaN or Infinity")]
    NanOrInfinity,

    #[error("ERR invalid expire time in '{0}' command")]
    InvalidExpireTime(String),

    #[error("ERR timeout is not a float or out of range")]
    TimeoutNotFloat,

    #[error("ERR timeout is negative")]
    TimeoutNegative,

    #[error("ERR timeout is out of range")]
    TimeoutOutOfRange,

    #[error("ERR min or max is not a float")]
    InvalidScoreRange,

    #[error("ERR min or max not valid string range item")]
    InvalidLexRange,

    #[error("ERR DB index is out of range")]
    InvalidDbIndex,

    #[error("ERR no such key")]
    NoSuchKey,

    #[error("ERR MULTI calls can not be nested")]
    NestedMulti,

    #[error("ERR EXEC without MULTI")]
    ExecWithoutMulti,

    #[error("ERR DISCARD without MULTI")]
    DiscardWithoutMulti,

    #[error("ERR WATCH inside MULTI is not allowed")]
    WatchInsideMulti,

    #[error("EXECABORT Transaction discarded because of previous errors.")]
    ExecAbort,

    #[error("{}", subscribe_context_message(.0, *.1))]
    SubscribeContext(String, u8),

    #[error("ERR This Redis command is not allowed from script")]
    NotAllowedFromScript,

    #[error("ERR The ID specified in XADD is equal or smaller than the target stream top item")]
    StreamIdTooSmall,

    #[error("ERR The ID specified in XADD must be greater than 0-0")]
    StreamIdZero,

    #[error("ERR Invalid stream ID specified as stream command argument")]
    InvalidStreamId,

    #[error("ERR Unbalanced '{0}' list of streams: for each stream key an ID or '$' must be specified.")]
    UnbalancedStreams(String),

    #[error("NOGROUP No such key '{key}' or consumer group '{group}'{context}")]
    NoGroup {
        key: String,
        group: String,
        context: String,
    },

    #[error("BUSYGROUP Consumer Group name already exists")]
    BusyGroup,

    #[error("ERR The XGROUP subcommand requires the key to exist. Note that for CREATE you may want to use the MKSTREAM option to create an empty stream automatically.")]
    XGroupKeyMissing,

    #[error("{prefix} {message}")]
    Custom { prefix: String, message: String },
}

impl CommandError {
    /// Build an error with an arbitrary prefix
    pub fn custom(prefix: impl Into<String>, message: impl Into<String>) -> Self {
        CommandError::Custom {
            prefix: prefix.into(),
            message: message.into(),
        }
    }

    /// The machine-readable category of the error
    pub fn prefix(&self) -> String {
        let rendered = self.to_string();
        rendered
            .split(' ')
            .next()
            .unwrap_or("ERR")
            .to_string()
    }
}

fn arity_message(command: &str, version: u8) -> String {
    if version >= 7 {
        format!("ERR Wrong number of arguments for '{}' command", command)
    } else {
        format!("ERR wrong number of arguments for '{}' command", command)
    }
}

fn subscribe_context_message(command: &str, version: u8) -> String {
    if version >= 7 {
        format!(
            "ERR Can't execute '{}': only (P|S)SUBSCRIBE / (P|S)UNSUBSCRIBE / PING / QUIT / RESET are allowed in this context",
            command
        )
    } else {
        format!(
            "ERR Can't execute '{}': only (P)SUBSCRIBE / (P)UNSUBSCRIBE / PING / QUIT are allowed in this context",
            command
        )
    }
}

/// Result of running one command handler
pub type CommandResult = Result<crate::protocol::RespValue, CommandError>;

/// Fatal wire-framing violation
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ProtocolError {
    #[error("Protocol error: expected '{expected}', got '{got}'")]
    UnexpectedByte { expected: char, got: char },

    #[error("Protocol error: invalid {what} length '{text}'")]
    InvalidLength { what: &'static str, text: String },

    #[error("Protocol error: expected CRLF after bulk payload")]
    MissingCrlf,

    #[error("Protocol error: too big {0} header")]
    HeaderTooLong(&'static str),
}

/// Failure of the emulated connection itself
#[derive(Error, Debug, Clone, PartialEq)]
pub enum LinkError {
    #[error("Error connecting to the emulated server: connection is down")]
    ConnectionDown,

    #[error("Connection closed by server")]
    Closed,

    #[error(transparent)]
    Protocol(#[from] ProtocolError),
}
