//! Tokio implementation of the message engine.
//!
//! Received datagrams and timer expiries are pushed into one unbounded
//! channel; [`UdpMessageManager::next_event`] drains it.

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use tokio::net::UdpSocket;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error};

use crate::engine::{
    EngineError, EngineEvent, MessageManager, MessageSocket, MessageTimer, Protocol, TimerTag,
};

/// Largest datagram accepted from the server
pub const MAX_DATAGRAM_SIZE: usize = 65535;

/// UDP sockets and tokio timers feeding a single event channel
pub struct UdpMessageManager {
    event_tx: mpsc::UnboundedSender<EngineEvent>,
    event_rx: mpsc::UnboundedReceiver<EngineEvent>,
}

impl UdpMessageManager {
    /// Create a new engine
    pub fn new() -> Self {
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        Self { event_tx, event_rx }
    }
}

impl Default for UdpMessageManager {
    fn default() -> Self {
        Self::new()
    }
}

/// Resolve a literal address or host name
pub async fn resolve(address: &str, port: u16) -> Result<SocketAddr, EngineError> {
    if let Ok(ip) = address.parse::<IpAddr>() {
        return Ok(SocketAddr::new(ip, port));
    }

    let resolve_err = |reason: String| EngineError::Resolve {
        address: address.to_string(),
        reason,
    };
    tokio::net::lookup_host((address, port))
        .await
        .map_err(|e| resolve_err(e.to_string()))?
        .next()
        .ok_or_else(|| resolve_err("no addresses found".to_string()))
}

#[async_trait]
impl MessageManager for UdpMessageManager {
    async fn create_socket(
        &mut self,
        protocol: Protocol,
        address: &str,
        port: u16,
    ) -> Result<Box<dyn MessageSocket>, EngineError> {
        if protocol != Protocol::Udp {
            return Err(EngineError::Unsupported(protocol));
        }

        let remote = resolve(address, port).await?;
        let local: SocketAddr = match remote {
            SocketAddr::V4(_) => (Ipv4Addr::UNSPECIFIED, 0).into(),
            SocketAddr::V6(_) => (Ipv6Addr::UNSPECIFIED, 0).into(),
        };

        // Left unconnected: ICMP errors from a dead server must not surface
        // as send/recv failures, the queries simply time out.
        let socket = Arc::new(UdpSocket::bind(local).await?);
        debug!("Bound {} socket {} for server {}", protocol, socket.local_addr()?, remote);

        let recv_socket = socket.clone();
        let event_tx = self.event_tx.clone();
        let recv_task = tokio::spawn(async move {
            let mut buf = vec![0u8; MAX_DATAGRAM_SIZE];
            loop {
                match recv_socket.recv_from(&mut buf).await {
                    Ok((len, _from)) => {
                        let data = Bytes::copy_from_slice(&buf[..len]);
                        if event_tx.send(EngineEvent::ResponseArrived { data }).is_err() {
                            break;
                        }
                    }
                    Err(e) => {
                        error!("Receive failed: {}", e);
                        let _ = event_tx.send(EngineEvent::Fault { error: e.into() });
                        break;
                    }
                }
            }
        });

        Ok(Box::new(UdpMessageSocket {
            socket,
            remote,
            recv_task,
        }))
    }

    fn create_timer(&mut self) -> Box<dyn MessageTimer> {
        Box::new(TokioTimer::new(self.event_tx.clone()))
    }

    async fn next_event(&mut self) -> Option<EngineEvent> {
        self.event_rx.recv().await
    }

    fn stop(&mut self) {
        self.event_rx.close();
    }
}

/// UDP socket sending to a fixed server
pub struct UdpMessageSocket {
    socket: Arc<UdpSocket>,
    remote: SocketAddr,
    recv_task: JoinHandle<()>,
}

impl UdpMessageSocket {
    /// Server address datagrams are sent to
    pub fn remote_addr(&self) -> SocketAddr {
        self.remote
    }
}

#[async_trait]
impl MessageSocket for UdpMessageSocket {
    async fn send(&self, data: &[u8]) -> Result<(), EngineError> {
        self.socket.send_to(data, self.remote).await?;
        Ok(())
    }
}

impl Drop for UdpMessageSocket {
    fn drop(&mut self) {
        self.recv_task.abort();
    }
}

/// One-shot timer backed by a sleeping task
pub struct TokioTimer {
    event_tx: mpsc::UnboundedSender<EngineEvent>,
    task: Option<JoinHandle<()>>,
}

impl TokioTimer {
    fn new(event_tx: mpsc::UnboundedSender<EngineEvent>) -> Self {
        Self {
            event_tx,
            task: None,
        }
    }
}

impl MessageTimer for TokioTimer {
    fn start(&mut self, duration: Duration, tag: TimerTag) {
        self.cancel();
        let event_tx = self.event_tx.clone();
        self.task = Some(tokio::spawn(async move {
            tokio::time::sleep(duration).await;
            let _ = event_tx.send(EngineEvent::from(tag));
        }));
    }

    fn cancel(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

impl Drop for TokioTimer {
    fn drop(&mut self) {
        self.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::timeout;

    #[tokio::test(start_paused = true)]
    async fn test_timer_emits_tagged_event() {
        let mut mgr = UdpMessageManager::new();
        let mut timer = mgr.create_timer();
        timer.start(Duration::from_millis(10), TimerTag::Query(42));

        match mgr.next_event().await {
            Some(EngineEvent::TimerExpired { qid }) => assert_eq!(qid, 42),
            other => panic!("unexpected event {:?}", other),
        }

        let mut session = mgr.create_timer();
        session.start(Duration::from_secs(10), TimerTag::Session);
        assert!(matches!(mgr.next_event().await, Some(EngineEvent::SessionTimerExpired)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_timer_restart_replaces_pending_expiry() {
        let mut mgr = UdpMessageManager::new();
        let mut timer = mgr.create_timer();
        timer.start(Duration::from_millis(10), TimerTag::Query(1));
        timer.start(Duration::from_millis(20), TimerTag::Query(2));

        match mgr.next_event().await {
            Some(EngineEvent::TimerExpired { qid }) => assert_eq!(qid, 2),
            other => panic!("unexpected event {:?}", other),
        }
        assert!(timeout(Duration::from_secs(1), mgr.next_event()).await.is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_timer_drop_cancels() {
        let mut mgr = UdpMessageManager::new();
        let mut timer = mgr.create_timer();
        timer.start(Duration::from_millis(10), TimerTag::Query(1));
        drop(timer);

        let mut cancelled = mgr.create_timer();
        cancelled.start(Duration::from_millis(10), TimerTag::Query(2));
        cancelled.cancel();

        assert!(timeout(Duration::from_secs(1), mgr.next_event()).await.is_err());
    }

    #[tokio::test]
    async fn test_udp_roundtrip() {
        let server = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let port = server.local_addr().unwrap().port();

        let mut mgr = UdpMessageManager::new();
        let socket = mgr.create_socket(Protocol::Udp, "127.0.0.1", port).await.unwrap();
        socket.send(b"hello").await.unwrap();

        let mut buf = [0u8; 64];
        let (len, peer) = timeout(Duration::from_secs(2), server.recv_from(&mut buf))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(&buf[..len], b"hello");
        server.send_to(b"world", peer).await.unwrap();

        match timeout(Duration::from_secs(2), mgr.next_event()).await.unwrap() {
            Some(EngineEvent::ResponseArrived { data }) => assert_eq!(&data[..], b"world"),
            other => panic!("unexpected event {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_tcp_unsupported() {
        let mut mgr = UdpMessageManager::new();
        let result = mgr.create_socket(Protocol::Tcp, "127.0.0.1", 53).await;
        assert!(matches!(result, Err(EngineError::Unsupported(Protocol::Tcp))));
    }

    #[tokio::test]
    async fn test_stop_ends_event_stream() {
        let mut mgr = UdpMessageManager::new();
        mgr.stop();
        assert!(mgr.next_event().await.is_none());
    }

    #[tokio::test]
    async fn test_resolve_literal() {
        let addr = resolve("::1", 5300).await.unwrap();
        assert_eq!(addr, "[::1]:5300".parse::<SocketAddr>().unwrap());
    }
}
