// Copyright 2025 the Snapbooth Authors
// SPDX-License-Identifier: Apache-2.0

//! Debounce and single-flight gating for composite requests.
//!
//! The scheduler is pure bookkeeping: callers pass the current time in, so
//! it can be driven by a frame loop or a test clock alike.
//!
//! - Every edit pushes the deadline out to `now + debounce`.
//! - When the deadline passes, a request with a fresh sequence number is
//!   issued, unless one is already in flight. In that case the request is
//!   deferred and issued as soon as the in-flight one completes.
//! - Completions older than the newest applied result are rejected.

use std::time::{Duration, Instant};

#[derive(Debug, Clone)]
pub struct CompositeScheduler {
    debounce: Duration,
    deadline: Option<Instant>,
    in_flight: Option<u64>,
    deferred: bool,
    next_seq: u64,
    latest_applied: Option<u64>,
}

impl CompositeScheduler {
    pub fn new(debounce: Duration) -> Self {
        Self {
            debounce,
            deadline: None,
            in_flight: None,
            deferred: false,
            next_seq: 1,
            latest_applied: None,
        }
    }

    /// An edit happened. Cancels any pending schedule and starts a new
    /// quiet window.
    pub fn mark_dirty(&mut self, now: Instant) {
        self.deadline = Some(now + self.debounce);
    }

    /// Issue a request if the quiet window has elapsed. Returns its
    /// sequence number.
    pub fn poll(&mut self, now: Instant) -> Option<u64> {
        let deadline = self.deadline?;
        if now < deadline {
            return None;
        }
        self.deadline = None;
        if let Some(seq) = self.in_flight {
            tracing::debug!("[CompositeScheduler] #{} still in flight, deferring", seq);
            self.deferred = true;
            return None;
        }
        let seq = self.next_seq;
        self.next_seq += 1;
        self.in_flight = Some(seq);
        tracing::debug!("[CompositeScheduler] issuing #{}", seq);
        Some(seq)
    }

    /// A response for `seq` arrived. Returns whether it should be applied.
    pub fn complete(&mut self, seq: u64, now: Instant) -> bool {
        if self.in_flight == Some(seq) {
            self.in_flight = None;
            if self.deferred {
                self.deferred = false;
                self.deadline = Some(now);
            }
        }
        let fresh = self.latest_applied.is_none_or(|latest| seq > latest);
        if fresh {
            self.latest_applied = Some(seq);
        } else {
            tracing::debug!(
                "[CompositeScheduler] discarding stale #{} (applied #{:?})",
                seq,
                self.latest_applied
            );
        }
        fresh
    }

    /// The in-flight request will never complete (its worker died).
    /// Schedules an immediate retry.
    pub fn abandon(&mut self, now: Instant) {
        if self.in_flight.take().is_some() {
            self.deferred = false;
            self.deadline = Some(now);
        }
    }

    pub fn is_in_flight(&self) -> bool {
        self.in_flight.is_some()
    }

    pub fn is_pending(&self) -> bool {
        self.deadline.is_some() || self.deferred
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn latest_applied(&self) -> Option<u64> {
        self.latest_applied
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const WINDOW: Duration = Duration::from_millis(150);

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    #[test]
    fn burst_of_edits_yields_one_request() {
        let t0 = Instant::now();
        let mut scheduler = CompositeScheduler::new(WINDOW);
        let mut issued = Vec::new();
        for i in 0..10 {
            scheduler.mark_dirty(t0 + ms(i * 10));
            issued.extend(scheduler.poll(t0 + ms(i * 10 + 5)));
        }
        // Last edit at 90ms, so nothing before 240ms
        issued.extend(scheduler.poll(t0 + ms(200)));
        issued.extend(scheduler.poll(t0 + ms(240)));
        issued.extend(scheduler.poll(t0 + ms(500)));
        assert_eq!(issued, vec![1]);
    }

    #[test]
    fn edit_during_flight_is_deferred_not_lost() {
        let t0 = Instant::now();
        let mut scheduler = CompositeScheduler::new(WINDOW);
        scheduler.mark_dirty(t0);
        assert_eq!(scheduler.poll(t0 + ms(150)), Some(1));

        scheduler.mark_dirty(t0 + ms(160));
        assert_eq!(scheduler.poll(t0 + ms(310)), None);
        assert!(scheduler.is_in_flight());
        assert!(scheduler.is_pending());

        assert!(scheduler.complete(1, t0 + ms(400)));
        assert_eq!(scheduler.poll(t0 + ms(400)), Some(2));
    }

    #[test]
    fn stale_responses_are_rejected() {
        let t0 = Instant::now();
        let mut scheduler = CompositeScheduler::new(WINDOW);
        assert!(scheduler.complete(5, t0));
        assert!(!scheduler.complete(4, t0));
        assert!(!scheduler.complete(5, t0));
        assert!(scheduler.complete(6, t0));
        assert_eq!(scheduler.latest_applied(), Some(6));
    }

    #[test]
    fn abandoned_flight_retries_immediately() {
        let t0 = Instant::now();
        let mut scheduler = CompositeScheduler::new(WINDOW);
        scheduler.mark_dirty(t0);
        assert_eq!(scheduler.poll(t0 + WINDOW), Some(1));
        scheduler.abandon(t0 + ms(200));
        assert_eq!(scheduler.poll(t0 + ms(200)), Some(2));
    }

    #[test]
    fn nothing_issued_without_edits() {
        let mut scheduler = CompositeScheduler::new(WINDOW);
        assert_eq!(scheduler.poll(Instant::now() + ms(1000)), None);
    }
}
