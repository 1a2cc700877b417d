//! Scripted engine and contexts for unit tests.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use qperf_corpus::{CorpusError, QueryContext, QueryContextCreator};
use qperf_wire::{HeaderFlags, MessageHeader, Qid};

use crate::engine::{
    EngineError, EngineEvent, MessageManager, MessageSocket, MessageTimer, Protocol, TimerTag,
};

pub type Shared = Arc<Mutex<MockState>>;

/// Everything the mock engine saw, plus the events it will hand out
#[derive(Default)]
pub struct MockState {
    pub sent: Vec<Bytes>,
    pub armed: Vec<(usize, Duration, TimerTag)>,
    pub cancelled: Vec<usize>,
    pub events: VecDeque<EngineEvent>,
    pub stops: usize,
    pub sockets: Vec<(Protocol, String, u16)>,
    pub fail_send: bool,
    pub timers_created: usize,
}

impl MockState {
    pub fn sent_ids(&self) -> Vec<Qid> {
        self.sent
            .iter()
            .map(|data| MessageHeader::decode(data).unwrap().id)
            .collect()
    }
}

/// Encoded response header for `qid`
pub fn response(qid: Qid) -> Bytes {
    let mut header = MessageHeader::query(qid);
    header.flags = HeaderFlags::QR | HeaderFlags::RD | HeaderFlags::RA;
    let mut buf = BytesMut::new();
    header.encode(&mut buf);
    buf.freeze()
}

pub struct MockManager {
    state: Shared,
}

impl MockManager {
    pub fn new() -> (Self, Shared) {
        let state = Shared::default();
        (
            Self {
                state: state.clone(),
            },
            state,
        )
    }
}

#[async_trait]
impl MessageManager for MockManager {
    async fn create_socket(
        &mut self,
        protocol: Protocol,
        address: &str,
        port: u16,
    ) -> Result<Box<dyn MessageSocket>, EngineError> {
        self.state
            .lock()
            .unwrap()
            .sockets
            .push((protocol, address.to_string(), port));
        Ok(Box::new(MockSocket {
            state: self.state.clone(),
        }))
    }

    fn create_timer(&mut self) -> Box<dyn MessageTimer> {
        let mut state = self.state.lock().unwrap();
        let id = state.timers_created;
        state.timers_created += 1;
        Box::new(MockTimer {
            id,
            state: self.state.clone(),
        })
    }

    async fn next_event(&mut self) -> Option<EngineEvent> {
        self.state.lock().unwrap().events.pop_front()
    }

    fn stop(&mut self) {
        self.state.lock().unwrap().stops += 1;
    }
}

pub struct MockSocket {
    state: Shared,
}

#[async_trait]
impl MessageSocket for MockSocket {
    async fn send(&self, data: &[u8]) -> Result<(), EngineError> {
        let mut state = self.state.lock().unwrap();
        if state.fail_send {
            return Err(EngineError::Io(std::io::Error::new(
                std::io::ErrorKind::Other,
                "send failed",
            )));
        }
        state.sent.push(Bytes::copy_from_slice(data));
        Ok(())
    }
}

pub struct MockTimer {
    id: usize,
    state: Shared,
}

impl MockTimer {
    /// A timer with its own private log
    pub fn detached(id: usize) -> (Self, Shared) {
        let state = Shared::default();
        (
            Self {
                id,
                state: state.clone(),
            },
            state,
        )
    }
}

impl MessageTimer for MockTimer {
    fn start(&mut self, duration: Duration, tag: TimerTag) {
        self.state.lock().unwrap().armed.push((self.id, duration, tag));
    }

    fn cancel(&mut self) {
        self.state.lock().unwrap().cancelled.push(self.id);
    }
}

/// Context rendering a bare header carrying the id
#[derive(Default)]
pub struct MockContext {
    pub reject: bool,
}

impl QueryContext for MockContext {
    fn start(&mut self, qid: Qid) -> Bytes {
        let mut buf = BytesMut::new();
        MessageHeader::query(qid).encode(&mut buf);
        buf.freeze()
    }

    fn check_response(&self, _header: &MessageHeader) -> bool {
        !self.reject
    }
}

#[derive(Default)]
pub struct MockCreator {
    pub reject: bool,
    pub fail: bool,
}

impl QueryContextCreator for MockCreator {
    fn create(&mut self) -> Result<Box<dyn QueryContext>, CorpusError> {
        if self.fail {
            return Err(CorpusError::Empty);
        }
        Ok(Box::new(MockContext {
            reject: self.reject,
        }))
    }
}
