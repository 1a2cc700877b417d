//! Windowed query dispatcher.
//!
//! The dispatcher keeps exactly `window` queries in flight for the length of
//! the session. Each answered or timed-out query is immediately replaced by
//! a new one from the same slot; once the session timer fires, answered or
//! timed-out slots are retired instead, and the run ends when the last one
//! is gone.

use std::path::PathBuf;
use std::time::Duration;

use chrono::{DateTime, Local};
use qperf_corpus::{QueryContextCreator, RepositoryContextCreator};
use qperf_wire::{MessageHeader, QueryOptions, Qid};
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::engine::{EngineError, EngineEvent, MessageManager, MessageSocket, MessageTimer, Protocol, TimerTag};
use crate::outstanding::Outstanding;
use crate::slot::ExchangeSlot;
use crate::transport::UdpMessageManager;

/// Default server address
pub const DEFAULT_SERVER: &str = "::1";
/// Default server port
pub const DEFAULT_PORT: u16 = 53;
/// Default number of queries in flight
pub const DEFAULT_WINDOW: usize = 20;
/// Default session length in seconds
pub const DEFAULT_DURATION: u64 = 10;
/// Default per-query timeout
pub const DEFAULT_QUERY_TIMEOUT: Duration = Duration::from_secs(5);
/// Largest window: every in-flight query needs a distinct 16-bit id
pub const MAX_WINDOW: usize = u16::MAX as usize;

/// Dispatcher errors
#[derive(Error, Debug)]
pub enum DispatchError {
    /// Invalid value, or configuration changed after the run started
    #[error("configuration error: {0}")]
    Config(String),
    /// `run()` called more than once
    #[error("dispatcher has already been run")]
    AlreadyRun,
    /// A query was issued before the socket existed
    #[error("session has not been started")]
    NotStarted,
    /// Engine failure
    #[error("engine error: {0}")]
    Engine(#[from] EngineError),
    /// Query context could not be created
    #[error("query context error: {0}")]
    Context(#[from] qperf_corpus::CorpusError),
    /// The engine stopped delivering events before the session drained
    #[error("event loop closed with {0} queries outstanding")]
    LoopClosed(usize),
}

/// Session parameters
#[derive(Clone, Debug)]
pub struct DispatcherConfig {
    /// Server address (literal or host name)
    pub server_address: String,
    /// Server port
    pub server_port: u16,
    /// Queries kept in flight
    pub window: usize,
    /// Session length in seconds
    pub test_duration: u64,
    /// Per-query timeout
    pub query_timeout: Duration,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            server_address: DEFAULT_SERVER.to_string(),
            server_port: DEFAULT_PORT,
            window: DEFAULT_WINDOW,
            test_duration: DEFAULT_DURATION,
            query_timeout: DEFAULT_QUERY_TIMEOUT,
        }
    }
}

/// Session phase
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Not yet run; configuration may change
    Idle,
    /// Every completion issues a new query
    Active,
    /// Session timer fired; completions retire their slot
    Draining,
    /// Run finished
    Stopped,
}

/// Statistics for a run
#[derive(Clone, Debug, Default)]
pub struct DispatchStats {
    /// Queries sent
    pub queries_sent: u64,
    /// Queries answered by an id-matched, accepted response
    pub queries_completed: u64,
    /// Queries that timed out
    pub timeouts: u64,
    /// Responses or timeouts for ids not in flight
    pub unmatched: u64,
    /// Responses too short to carry a header
    pub malformed: u64,
    /// Id-matched responses refused by the query context
    pub rejected: u64,
    /// When the initial queries went out
    pub start_time: Option<DateTime<Local>>,
    /// When the run ended
    pub end_time: Option<DateTime<Local>>,
}

impl DispatchStats {
    /// Time between start and end, if both are known
    pub fn run_time(&self) -> Option<Duration> {
        let (start, end) = (self.start_time?, self.end_time?);
        (end - start).to_std().ok()
    }
}

/// Closed-loop query dispatcher
pub struct Dispatcher {
    manager: Box<dyn MessageManager>,
    creator: Box<dyn QueryContextCreator>,
    config: DispatcherConfig,
    phase: Phase,
    socket: Option<Box<dyn MessageSocket>>,
    session_timer: Option<Box<dyn MessageTimer>>,
    outstanding: Outstanding,
    next_qid: Qid,
    stop_requested: bool,
    stats: DispatchStats,
}

impl Dispatcher {
    /// Create a dispatcher over an engine and a context creator
    pub fn new<M, C>(manager: M, creator: C) -> Self
    where
        M: MessageManager + 'static,
        C: QueryContextCreator + 'static,
    {
        Self {
            manager: Box::new(manager),
            creator: Box::new(creator),
            config: DispatcherConfig::default(),
            phase: Phase::Idle,
            socket: None,
            session_timer: None,
            outstanding: Outstanding::default(),
            next_qid: 0,
            stop_requested: false,
            stats: DispatchStats::default(),
        }
    }

    /// Create a self-contained dispatcher replaying `data_file` over UDP
    pub fn from_data_file(
        data_file: impl Into<PathBuf>,
        preload: bool,
        options: QueryOptions,
    ) -> Result<Self, DispatchError> {
        let creator = RepositoryContextCreator::from_file(data_file, options, preload)?;
        Ok(Self::new(UdpMessageManager::new(), creator))
    }

    fn ensure_idle(&self, what: &str) -> Result<(), DispatchError> {
        if self.phase != Phase::Idle {
            return Err(DispatchError::Config(format!("{} cannot be reset after run()", what)));
        }
        Ok(())
    }

    /// Current configuration
    pub fn config(&self) -> &DispatcherConfig {
        &self.config
    }

    /// Server address
    pub fn server_address(&self) -> &str {
        &self.config.server_address
    }

    /// Set the server address
    pub fn set_server_address(&mut self, address: impl Into<String>) -> Result<(), DispatchError> {
        self.ensure_idle("server address")?;
        self.config.server_address = address.into();
        Ok(())
    }

    /// Server port
    pub fn server_port(&self) -> u16 {
        self.config.server_port
    }

    /// Set the server port
    pub fn set_server_port(&mut self, port: u16) -> Result<(), DispatchError> {
        self.ensure_idle("server port")?;
        self.config.server_port = port;
        Ok(())
    }

    /// Queries kept in flight
    pub fn window(&self) -> usize {
        self.config.window
    }

    /// Set the number of queries kept in flight
    pub fn set_window(&mut self, window: usize) -> Result<(), DispatchError> {
        self.ensure_idle("window")?;
        if window == 0 || window > MAX_WINDOW {
            return Err(DispatchError::Config(format!(
                "window must be between 1 and {}, got {}",
                MAX_WINDOW, window
            )));
        }
        self.config.window = window;
        Ok(())
    }

    /// Session length in seconds
    pub fn test_duration(&self) -> u64 {
        self.config.test_duration
    }

    /// Set the session length in seconds
    pub fn set_test_duration(&mut self, seconds: u64) -> Result<(), DispatchError> {
        self.ensure_idle("test duration")?;
        if seconds == 0 {
            return Err(DispatchError::Config("test duration must be positive".to_string()));
        }
        self.config.test_duration = seconds;
        Ok(())
    }

    /// Per-query timeout
    pub fn query_timeout(&self) -> Duration {
        self.config.query_timeout
    }

    /// Set the per-query timeout
    pub fn set_query_timeout(&mut self, timeout: Duration) -> Result<(), DispatchError> {
        self.ensure_idle("query timeout")?;
        if timeout.is_zero() {
            return Err(DispatchError::Config("query timeout must be positive".to_string()));
        }
        self.config.query_timeout = timeout;
        Ok(())
    }

    /// Current phase
    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Whether completions still issue new queries
    pub fn keep_sending(&self) -> bool {
        self.phase == Phase::Active
    }

    /// Run statistics
    pub fn stats(&self) -> &DispatchStats {
        &self.stats
    }

    /// Queries sent
    pub fn queries_sent(&self) -> u64 {
        self.stats.queries_sent
    }

    /// Queries completed
    pub fn queries_completed(&self) -> u64 {
        self.stats.queries_completed
    }

    /// Start of the run
    pub fn start_time(&self) -> Option<DateTime<Local>> {
        self.stats.start_time
    }

    /// End of the run
    pub fn end_time(&self) -> Option<DateTime<Local>> {
        self.stats.end_time
    }

    /// Queries currently in flight
    pub fn outstanding(&self) -> usize {
        self.outstanding.len()
    }

    /// Run the session to completion
    ///
    /// Returns once every query issued before the session timer fired has
    /// been answered or has timed out, or with the first engine error. The
    /// end time is recorded either way.
    pub async fn run(&mut self) -> Result<(), DispatchError> {
        if self.phase != Phase::Idle {
            return Err(DispatchError::AlreadyRun);
        }

        let result = match self.start_session().await {
            Ok(()) => self.event_loop().await,
            Err(e) => Err(e),
        };

        self.stats.end_time = Some(Local::now());
        self.phase = Phase::Stopped;
        self.outstanding.clear();
        self.session_timer = None;
        self.socket = None;

        match &result {
            Ok(()) => info!(
                "Session finished: sent={}, completed={}, timeouts={}, unmatched={}, malformed={}",
                self.stats.queries_sent,
                self.stats.queries_completed,
                self.stats.timeouts,
                self.stats.unmatched,
                self.stats.malformed
            ),
            Err(e) => error!("Session aborted: {}", e),
        }
        result
    }

    async fn start_session(&mut self) -> Result<(), DispatchError> {
        self.phase = Phase::Active;

        let socket = self
            .manager
            .create_socket(Protocol::Udp, &self.config.server_address, self.config.server_port)
            .await?;
        self.socket = Some(socket);

        let mut session_timer = self.manager.create_timer();
        session_timer.start(Duration::from_secs(self.config.test_duration), TimerTag::Session);
        self.session_timer = Some(session_timer);

        self.outstanding = Outstanding::with_capacity(self.config.window);
        for _ in 0..self.config.window {
            let context = self.creator.create()?;
            let timer = self.manager.create_timer();
            self.outstanding.push(ExchangeSlot::new(context, timer));
        }

        self.stats.start_time = Some(Local::now());
        for idx in 0..self.outstanding.len() {
            self.dispatch(idx).await?;
        }

        info!(
            "Started session against {}:{} with {} queries in flight for {}s",
            self.config.server_address,
            self.config.server_port,
            self.config.window,
            self.config.test_duration
        );
        Ok(())
    }

    async fn event_loop(&mut self) -> Result<(), DispatchError> {
        while !self.stop_requested {
            let event = match self.manager.next_event().await {
                Some(event) => event,
                None => return Err(DispatchError::LoopClosed(self.outstanding.len())),
            };
            self.handle_event(event).await?;
        }
        Ok(())
    }

    async fn handle_event(&mut self, event: EngineEvent) -> Result<(), DispatchError> {
        match event {
            EngineEvent::ResponseArrived { data } => match MessageHeader::decode(&data) {
                Ok(header) => self.restart_query(header.id, Some(&header)).await,
                Err(e) => {
                    self.stats.malformed += 1;
                    warn!("Discarding malformed response: {}", e);
                    Ok(())
                }
            },
            EngineEvent::TimerExpired { qid } => self.restart_query(qid, None).await,
            EngineEvent::SessionTimerExpired => {
                self.on_session_timer();
                Ok(())
            }
            EngineEvent::Fault { error } => Err(error.into()),
        }
    }

    fn on_session_timer(&mut self) {
        if self.phase != Phase::Active {
            return;
        }
        self.phase = Phase::Draining;
        info!(
            "Session timer expired; draining {} outstanding queries",
            self.outstanding.len()
        );
        if self.outstanding.is_empty() {
            self.request_stop();
        }
    }

    /// Send a fresh query from the slot at `idx`
    async fn dispatch(&mut self, idx: usize) -> Result<(), DispatchError> {
        let qid = self.next_qid;
        let timeout = self.config.query_timeout;
        let data = match self.outstanding.get_mut(idx) {
            Some(slot) => slot.start(qid, timeout),
            None => return Ok(()),
        };

        let socket = self.socket.as_deref().ok_or(DispatchError::NotStarted)?;
        socket.send(&data).await?;
        self.stats.queries_sent += 1;
        self.next_qid = qid.wrapping_add(1);
        Ok(())
    }

    /// Handle the end of the exchange for `qid`; `None` means it timed out
    async fn restart_query(&mut self, qid: Qid, response: Option<&MessageHeader>) -> Result<(), DispatchError> {
        let Some(idx) = self.outstanding.find_by_id(qid) else {
            self.stats.unmatched += 1;
            debug!(
                "Discarding {} for msg id {} not in flight",
                if response.is_some() { "response" } else { "timeout" },
                qid
            );
            return Ok(());
        };

        match response {
            Some(header) => {
                let accepted = self
                    .outstanding
                    .get(idx)
                    .is_some_and(|slot| slot.check_response(header));
                if accepted {
                    self.stats.queries_completed += 1;
                } else {
                    self.stats.rejected += 1;
                    debug!("Query context rejected response for msg id {}", qid);
                }
            }
            None => {
                self.stats.timeouts += 1;
                debug!("Query timed out: msg id {}", qid);
            }
        }

        if self.keep_sending() {
            self.dispatch(idx).await?;
            self.outstanding.move_to_tail(idx);
        } else {
            self.outstanding.remove(idx);
            if self.outstanding.is_empty() {
                self.request_stop();
            }
        }
        Ok(())
    }

    fn request_stop(&mut self) {
        if self.stop_requested {
            return;
        }
        self.stop_requested = true;
        self.manager.stop();
        debug!("All outstanding queries retired; stopping event loop");
    }
}
