//! Exchange slots: one unit of pipelined concurrency.

use std::time::Duration;

use bytes::Bytes;
use qperf_corpus::QueryContext;
use qperf_wire::{MessageHeader, Qid};

use crate::engine::{MessageTimer, TimerTag};

/// A query context paired with its timeout timer
///
/// The slot has no message id until it is first started, so a fresh slot
/// never matches anything.
pub struct ExchangeSlot {
    context: Box<dyn QueryContext>,
    timer: Box<dyn MessageTimer>,
    qid: Option<Qid>,
}

impl ExchangeSlot {
    /// Create an idle slot
    pub fn new(context: Box<dyn QueryContext>, timer: Box<dyn MessageTimer>) -> Self {
        Self {
            context,
            timer,
            qid: None,
        }
    }

    /// Take `qid`, re-arm the timeout and render the query to send
    pub fn start(&mut self, qid: Qid, timeout: Duration) -> Bytes {
        self.qid = Some(qid);
        self.timer.start(timeout, TimerTag::Query(qid));
        self.context.start(qid)
    }

    /// Whether `qid` is the id this slot is currently waiting on
    pub fn matches(&self, qid: Qid) -> bool {
        self.qid == Some(qid)
    }

    /// Current message id, if started
    pub fn qid(&self) -> Option<Qid> {
        self.qid
    }

    /// Let the context vet an id-matched response
    pub fn check_response(&self, header: &MessageHeader) -> bool {
        self.context.check_response(header)
    }
}

impl Drop for ExchangeSlot {
    fn drop(&mut self) {
        self.timer.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{MockContext, MockTimer};

    #[test]
    fn test_start_rearms_and_renders() {
        let (timer, log) = MockTimer::detached(0);
        let mut slot = ExchangeSlot::new(Box::new(MockContext::default()), Box::new(timer));
        assert!(!slot.matches(0));
        assert_eq!(slot.qid(), None);

        let data = slot.start(5, Duration::from_secs(2));
        assert_eq!(MessageHeader::decode(&data).unwrap().id, 5);
        assert!(slot.matches(5));

        slot.start(6, Duration::from_secs(2));
        assert!(!slot.matches(5));
        assert!(slot.matches(6));

        let state = log.lock().unwrap();
        let tags: Vec<TimerTag> = state.armed.iter().map(|(_, _, tag)| *tag).collect();
        assert_eq!(tags, vec![TimerTag::Query(5), TimerTag::Query(6)]);
    }

    #[test]
    fn test_drop_cancels_timer() {
        let (timer, log) = MockTimer::detached(3);
        let mut slot = ExchangeSlot::new(Box::new(MockContext::default()), Box::new(timer));
        slot.start(1, Duration::from_secs(1));
        drop(slot);

        assert_eq!(log.lock().unwrap().cancelled, vec![3]);
    }
}
