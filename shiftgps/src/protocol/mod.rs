//! Control channel protocol.
//!
//! The engine and its host exchange JSON messages only:
//!
//! - [`StartupContext`] - handed over once, when the worker starts
//! - [`EngineCommand`] - host to engine, tagged by `command`
//! - [`EngineEvent`] - engine to host, tagged by `type`
//!
//! [`control_channel`] builds an in-process pair of endpoints; the CLI
//! bridges them to JSON lines on stdin/stdout.

mod channel;
mod command;
mod context;
mod error;
mod event;

pub use channel::{
    control_channel, decode_command, encode_event, CommandSender, EventSink, EventStream,
    HostEndpoint, Inbound, WorkerEndpoint, DEFAULT_COMMAND_BUFFER,
};
pub use command::EngineCommand;
pub use context::StartupContext;
pub use error::ProtocolError;
pub use event::{DiagnosticCategory, EngineEvent, Severity};
