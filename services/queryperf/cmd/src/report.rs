//! End-of-run statistics report.

use chrono::{DateTime, Local};
use qperf_session::DispatchStats;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

/// Summary of a finished run
#[derive(Debug, Clone)]
pub struct Report {
    pub server: String,
    pub port: u16,
    pub data_file: PathBuf,
    pub window: usize,
    pub started: Option<DateTime<Local>>,
    pub finished: Option<DateTime<Local>>,
    pub run_time: Duration,
    pub sent: u64,
    pub completed: u64,
    pub timeouts: u64,
    pub unmatched: u64,
    pub malformed: u64,
    pub rejected: u64,
}

impl Report {
    pub fn new(server: String, port: u16, data_file: PathBuf, window: usize, stats: &DispatchStats) -> Self {
        Self {
            server,
            port,
            data_file,
            window,
            started: stats.start_time,
            finished: stats.end_time,
            run_time: stats.run_time().unwrap_or_default(),
            sent: stats.queries_sent,
            completed: stats.queries_completed,
            timeouts: stats.timeouts,
            unmatched: stats.unmatched,
            malformed: stats.malformed,
            rejected: stats.rejected,
        }
    }

    /// Queries sent but never completed
    pub fn lost(&self) -> u64 {
        self.sent.saturating_sub(self.completed)
    }

    /// Completed share of sent queries, in percent
    pub fn completion_percent(&self) -> f64 {
        if self.sent == 0 {
            return 0.0;
        }
        self.completed as f64 * 100.0 / self.sent as f64
    }

    /// Completed queries per second of run time
    pub fn queries_per_second(&self) -> f64 {
        let secs = self.run_time.as_secs_f64();
        if secs <= 0.0 {
            return 0.0;
        }
        self.completed as f64 / secs
    }
}

fn format_time(time: Option<DateTime<Local>>) -> String {
    time.map(|t| t.format("%a %b %e %H:%M:%S %Y").to_string())
        .unwrap_or_else(|| "-".to_string())
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Statistics:")?;
        writeln!(f)?;
        writeln!(f, "  Server:               {} port {}", self.server, self.port)?;
        writeln!(f, "  Data file:            {}", self.data_file.display())?;
        writeln!(f, "  Queries in flight:    {}", self.window)?;
        writeln!(f)?;
        writeln!(f, "  Queries sent:         {}", self.sent)?;
        writeln!(f, "  Queries completed:    {}", self.completed)?;
        writeln!(f, "  Queries lost:         {}", self.lost())?;
        writeln!(f, "  Queries timed out:    {}", self.timeouts)?;
        if self.rejected > 0 {
            writeln!(f, "  Responses rejected:   {}", self.rejected)?;
        }
        if self.unmatched > 0 || self.malformed > 0 {
            writeln!(f, "  Unexpected responses: {} unmatched, {} malformed", self.unmatched, self.malformed)?;
        }
        writeln!(f)?;
        writeln!(f, "  Percentage completed: {:6.2}%", self.completion_percent())?;
        writeln!(f, "  Started at:           {}", format_time(self.started))?;
        writeln!(f, "  Finished at:          {}", format_time(self.finished))?;
        writeln!(f, "  Ran for:              {:.6} seconds", self.run_time.as_secs_f64())?;
        writeln!(f)?;
        writeln!(f, "  Queries per second:   {:.6} qps", self.queries_per_second())
    }
}
