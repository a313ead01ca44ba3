//! The bidirectional channel between host and engine.
//!
//! The engine is a separate worker: it shares no memory with the host and
//! talks only through this channel.
//!
//! ```text
//!   Host                                   Engine task
//!   ────                                   ───────────
//!   CommandSender ── Inbound (bounded) ──► WorkerEndpoint::inbound
//!   EventStream   ◄── EngineEvent ──────── EventSink
//! ```
//!
//! Events go over an unbounded channel so emitting never blocks the engine
//! loop. Commands may arrive already decoded or as raw JSON text; the engine
//! decodes raw text itself so a malformed message becomes a diagnostic
//! instead of a host-side failure.

use tokio::sync::mpsc;

use super::command::EngineCommand;
use super::error::ProtocolError;
use super::event::EngineEvent;

/// Default inbound buffer size.
pub const DEFAULT_COMMAND_BUFFER: usize = 32;

/// A message from host to engine.
#[derive(Debug, Clone, PartialEq)]
pub enum Inbound {
    Command(EngineCommand),
    /// Undecoded JSON text.
    Raw(String),
}

/// Host handle for sending commands.
#[derive(Debug, Clone)]
pub struct CommandSender {
    tx: mpsc::Sender<Inbound>,
}

impl CommandSender {
    pub async fn send(&self, command: EngineCommand) -> Result<(), ProtocolError> {
        self.tx
            .send(Inbound::Command(command))
            .await
            .map_err(|_| ProtocolError::ChannelClosed)
    }

    /// Forward raw JSON text for the engine to decode.
    pub async fn send_raw(&self, text: impl Into<String>) -> Result<(), ProtocolError> {
        self.tx
            .send(Inbound::Raw(text.into()))
            .await
            .map_err(|_| ProtocolError::ChannelClosed)
    }
}

/// Host handle for receiving events.
#[derive(Debug)]
pub struct EventStream {
    rx: mpsc::UnboundedReceiver<EngineEvent>,
}

impl EventStream {
    /// Next event, or `None` once the engine is gone.
    pub async fn next(&mut self) -> Option<EngineEvent> {
        self.rx.recv().await
    }

    /// Next event if one is already queued.
    pub fn try_next(&mut self) -> Option<EngineEvent> {
        self.rx.try_recv().ok()
    }

    /// Drain everything currently queued.
    pub fn drain(&mut self) -> Vec<EngineEvent> {
        let mut events = Vec::new();
        while let Some(event) = self.try_next() {
            events.push(event);
        }
        events
    }
}

/// Engine handle for emitting events.
#[derive(Debug, Clone)]
pub struct EventSink {
    tx: mpsc::UnboundedSender<EngineEvent>,
}

impl EventSink {
    /// Emit an event in order. Returns false once the host has gone away.
    pub fn emit(&self, event: EngineEvent) -> bool {
        let kind = event.kind();
        match self.tx.send(event) {
            Ok(()) => {
                tracing::trace!(event = kind, "Event emitted");
                true
            }
            Err(_) => {
                tracing::trace!(event = kind, "Event dropped, host gone");
                false
            }
        }
    }

    /// A sink with its own receiving stream. Handy when the host side is
    /// not built through [`control_channel`].
    pub fn detached() -> (Self, EventStream) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, EventStream { rx })
    }
}

/// Host side of the channel.
#[derive(Debug)]
pub struct HostEndpoint {
    pub commands: CommandSender,
    pub events: EventStream,
}

/// Engine side of the channel.
#[derive(Debug)]
pub struct WorkerEndpoint {
    pub inbound: mpsc::Receiver<Inbound>,
    pub events: EventSink,
}

/// Create a connected host/engine channel pair.
pub fn control_channel(capacity: usize) -> (HostEndpoint, WorkerEndpoint) {
    let (command_tx, command_rx) = mpsc::channel(capacity.max(1));
    let (events, event_stream) = EventSink::detached();

    (
        HostEndpoint {
            commands: CommandSender { tx: command_tx },
            events: event_stream,
        },
        WorkerEndpoint {
            inbound: command_rx,
            events,
        },
    )
}

/// Decode a JSON command.
pub fn decode_command(text: &str) -> Result<EngineCommand, ProtocolError> {
    serde_json::from_str(text.trim()).map_err(ProtocolError::Decode)
}

/// Encode an event as a single JSON line (no trailing newline).
pub fn encode_event(event: &EngineEvent) -> Result<String, ProtocolError> {
    serde_json::to_string(event).map_err(ProtocolError::Encode)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_channel_round_trip() {
        let (mut host, mut worker) = control_channel(4);

        host.commands.send(EngineCommand::GetStatus).await.unwrap();
        host.commands
            .send_raw(r#"{"command":"recoverStream"}"#)
            .await
            .unwrap();

        assert_eq!(
            worker.inbound.recv().await,
            Some(Inbound::Command(EngineCommand::GetStatus))
        );
        assert!(matches!(worker.inbound.recv().await, Some(Inbound::Raw(_))));

        assert!(worker.events.emit(EngineEvent::StreamRecovered { attempt: 1 }));
        assert_eq!(
            host.events.next().await,
            Some(EngineEvent::StreamRecovered { attempt: 1 })
        );
    }

    #[tokio::test]
    async fn test_emit_after_host_dropped() {
        let (host, worker) = control_channel(1);
        drop(host);

        assert!(!worker.events.emit(EngineEvent::Error {
            message: "x".to_string()
        }));
    }

    #[tokio::test]
    async fn test_send_after_worker_dropped() {
        let (host, worker) = control_channel(1);
        drop(worker);

        assert!(matches!(
            host.commands.send(EngineCommand::GetStatus).await,
            Err(ProtocolError::ChannelClosed)
        ));
    }

    #[test]
    fn test_decode_command_trims_whitespace() {
        let cmd = decode_command("  {\"command\":\"getStatus\"}\n").unwrap();
        assert_eq!(cmd, EngineCommand::GetStatus);
        assert!(matches!(decode_command("{}"), Err(ProtocolError::Decode(_))));
    }

    #[test]
    fn test_encode_event_single_line() {
        let line = encode_event(&EngineEvent::Stopped {
            point_count: 3,
            is_timeout: false,
        })
        .unwrap();
        assert_eq!(line, r#"{"type":"stopped","point_count":3,"is_timeout":false}"#);
    }

    #[test]
    fn test_drain_collects_queued_events() {
        let (sink, mut stream) = EventSink::detached();
        sink.emit(EngineEvent::StreamRecovered { attempt: 1 });
        sink.emit(EngineEvent::StreamRecovered { attempt: 2 });

        assert_eq!(stream.drain().len(), 2);
        assert!(stream.try_next().is_none());
    }
}
