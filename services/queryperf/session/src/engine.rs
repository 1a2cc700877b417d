//! I/O and timer engine contract.
//!
//! The dispatcher never touches sockets or clocks directly. Everything it
//! needs arrives as an [`EngineEvent`] from a [`MessageManager`], one at a
//! time, so the dispatcher state is only ever mutated by a single handler.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use qperf_wire::Qid;
use thiserror::Error;

/// Transport protocol of a message socket
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Protocol {
    /// Datagram transport
    Udp,
    /// Stream transport
    Tcp,
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Protocol::Udp => f.write_str("udp"),
            Protocol::Tcp => f.write_str("tcp"),
        }
    }
}

/// Engine-level errors
#[derive(Error, Debug)]
pub enum EngineError {
    /// Socket I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// Protocol not implemented by this engine
    #[error("unsupported protocol: {0}")]
    Unsupported(Protocol),
    /// Server address could not be resolved
    #[error("cannot resolve {address}: {reason}")]
    Resolve {
        /// Address as configured
        address: String,
        /// Why resolution failed
        reason: String,
    },
}

/// What a timer reports when it expires
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerTag {
    /// The whole-session timer
    Session,
    /// A per-query timeout armed for this message id
    Query(Qid),
}

/// Events delivered to the dispatcher
#[derive(Debug)]
pub enum EngineEvent {
    /// A datagram arrived on the message socket
    ResponseArrived {
        /// Raw payload
        data: Bytes,
    },
    /// A per-query timer expired
    TimerExpired {
        /// Message id the timer was armed for
        qid: Qid,
    },
    /// The session timer expired
    SessionTimerExpired,
    /// The engine failed and cannot continue
    Fault {
        /// Cause
        error: EngineError,
    },
}

impl From<TimerTag> for EngineEvent {
    fn from(tag: TimerTag) -> Self {
        match tag {
            TimerTag::Session => EngineEvent::SessionTimerExpired,
            TimerTag::Query(qid) => EngineEvent::TimerExpired { qid },
        }
    }
}

/// Source of sockets, timers and events
#[async_trait]
pub trait MessageManager: Send {
    /// Create a socket talking to `address:port`; its datagrams arrive as events
    async fn create_socket(
        &mut self,
        protocol: Protocol,
        address: &str,
        port: u16,
    ) -> Result<Box<dyn MessageSocket>, EngineError>;

    /// Create a disarmed one-shot timer
    fn create_timer(&mut self) -> Box<dyn MessageTimer>;

    /// Wait for the next event; `None` once the engine has stopped
    async fn next_event(&mut self) -> Option<EngineEvent>;

    /// Stop delivering events
    fn stop(&mut self);
}

/// Send side of a message socket
#[async_trait]
pub trait MessageSocket: Send + Sync {
    /// Transmit one message
    async fn send(&self, data: &[u8]) -> Result<(), EngineError>;
}

/// One-shot cancelable timer
///
/// Implementations must cancel on drop.
pub trait MessageTimer: Send {
    /// Arm the timer, replacing any pending expiry
    fn start(&mut self, duration: Duration, tag: TimerTag);

    /// Disarm the timer; a no-op if it is not armed
    fn cancel(&mut self);
}
