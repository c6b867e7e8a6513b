// Copyright 2025 the Snapbooth Authors
// SPDX-License-Identifier: Apache-2.0

//! A named two-lane bus between operator and guest.
//!
//! Messages cross the bus as JSON text, never as shared values. The bus has
//! one lane per direction:
//!
//! ```text
//!  operator ──── states (broadcast, newest wins) ────► guest(s)
//!  operator ◄─── intents (queue, nothing dropped) ──── guest(s)
//! ```
//!
//! A guest that falls more than the bus capacity behind loses the oldest
//! states; that is tolerable because a `SET_STATE` always carries the full
//! state. Guest intents are never dropped. They wait in the bus until an
//! operator endpoint takes them, so a restarted operator picks up whatever
//! was sent while it was gone.

use super::message::InterWindowMessage;
use crate::settings::Config;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use thiserror::Error;
use tokio::sync::broadcast::{self, error::RecvError, error::TryRecvError};
use tokio::sync::mpsc;

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("failed to serialize {kind}: {source}")]
    Serialize {
        kind: &'static str,
        #[source]
        source: serde_json::Error,
    },
    #[error("bus {0} is closed")]
    Closed(String),
    #[error("bus {0} already has an operator")]
    OperatorAttached(String),
}

type IntentQueue = Arc<Mutex<Option<mpsc::UnboundedReceiver<Arc<str>>>>>;

#[derive(Debug, Clone)]
pub struct SyncBus {
    name: Arc<str>,
    states: broadcast::Sender<Arc<str>>,
    intents_tx: mpsc::UnboundedSender<Arc<str>>,
    /// Parked receiver of the intent lane while no operator holds it
    intents_rx: IntentQueue,
    next_endpoint: Arc<AtomicU64>,
}

impl SyncBus {
    /// `capacity` bounds how many states a guest may fall behind.
    pub fn new(name: &str, capacity: usize) -> Self {
        let (states, _) = broadcast::channel(capacity.max(1));
        let (intents_tx, intents_rx) = mpsc::unbounded_channel();
        Self {
            name: name.into(),
            states,
            intents_tx,
            intents_rx: Arc::new(Mutex::new(Some(intents_rx))),
            next_endpoint: Arc::new(AtomicU64::new(1)),
        }
    }

    pub fn from_config(name: &str, config: &Config) -> Self {
        Self::new(name, config.sync_bus_capacity)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Join as the operator. Only one operator endpoint exists at a time;
    /// dropping it hands the queued intents back to the bus.
    pub fn operator(&self) -> Result<SyncEndpoint, SyncError> {
        let intents = self
            .intents_rx
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
            .ok_or_else(|| SyncError::OperatorAttached(self.name.to_string()))?;
        Ok(SyncEndpoint {
            id: self.next_id(),
            bus: Arc::clone(&self.name),
            lane: Lane::Operator {
                states: self.states.clone(),
                intents: Some(intents),
                parking: Arc::clone(&self.intents_rx),
            },
        })
    }

    /// Join as a guest. The endpoint only sees states posted after this
    /// call.
    pub fn guest(&self) -> SyncEndpoint {
        SyncEndpoint {
            id: self.next_id(),
            bus: Arc::clone(&self.name),
            lane: Lane::Guest {
                intents: self.intents_tx.clone(),
                states: self.states.subscribe(),
            },
        }
    }

    fn next_id(&self) -> u64 {
        self.next_endpoint.fetch_add(1, Ordering::Relaxed)
    }
}

#[derive(Debug)]
enum Lane {
    Operator {
        states: broadcast::Sender<Arc<str>>,
        intents: Option<mpsc::UnboundedReceiver<Arc<str>>>,
        parking: IntentQueue,
    },
    Guest {
        intents: mpsc::UnboundedSender<Arc<str>>,
        states: broadcast::Receiver<Arc<str>>,
    },
}

#[derive(Debug)]
pub struct SyncEndpoint {
    id: u64,
    bus: Arc<str>,
    lane: Lane,
}

impl SyncEndpoint {
    pub fn is_operator(&self) -> bool {
        matches!(self.lane, Lane::Operator { .. })
    }

    /// Serialize and post a message to the other side.
    pub fn post(&self, message: &InterWindowMessage) -> Result<(), SyncError> {
        let text = message.to_json().map_err(|source| SyncError::Serialize {
            kind: message.kind(),
            source,
        })?;
        tracing::debug!("[{}#{}] post {}", self.bus, self.id, message.kind());
        self.post_text(text)
    }

    /// Post raw text. Receivers validate whatever arrives.
    ///
    /// A state posted while no guest is listening is dropped; a guest asks
    /// for the current state when it joins.
    pub fn post_text(&self, text: impl Into<Arc<str>>) -> Result<(), SyncError> {
        match &self.lane {
            Lane::Operator { states, .. } => {
                if states.send(text.into()).is_err() {
                    tracing::debug!("[{}#{}] no guest listening", self.bus, self.id);
                }
                Ok(())
            }
            Lane::Guest { intents, .. } => intents
                .send(text.into())
                .map_err(|_| SyncError::Closed(self.bus.to_string())),
        }
    }

    /// Next raw message from the other side, waiting if none is queued.
    /// `None` once the bus is gone.
    pub async fn recv_text(&mut self) -> Option<Arc<str>> {
        match &mut self.lane {
            Lane::Operator { intents, .. } => intents.as_mut()?.recv().await,
            Lane::Guest { states, .. } => loop {
                match states.recv().await {
                    Ok(text) => return Some(text),
                    Err(RecvError::Lagged(missed)) => {
                        tracing::warn!("[{}#{}] lagged, {} states skipped", self.bus, self.id, missed);
                    }
                    Err(RecvError::Closed) => return None,
                }
            },
        }
    }

    /// Next raw message from the other side if one is queued.
    pub fn try_recv_text(&mut self) -> Option<Arc<str>> {
        match &mut self.lane {
            Lane::Operator { intents, .. } => intents.as_mut()?.try_recv().ok(),
            Lane::Guest { states, .. } => loop {
                match states.try_recv() {
                    Ok(text) => return Some(text),
                    Err(TryRecvError::Lagged(missed)) => {
                        tracing::warn!("[{}#{}] lagged, {} states skipped", self.bus, self.id, missed);
                    }
                    Err(TryRecvError::Empty | TryRecvError::Closed) => return None,
                }
            },
        }
    }

    /// Next valid message if one is queued. Invalid messages are logged and
    /// dropped.
    pub fn try_recv(&mut self) -> Option<InterWindowMessage> {
        while let Some(text) = self.try_recv_text() {
            if let Some(message) = self.decode(&text) {
                return Some(message);
            }
        }
        None
    }

    /// Next valid message, waiting if none is queued.
    pub async fn recv(&mut self) -> Option<InterWindowMessage> {
        while let Some(text) = self.recv_text().await {
            if let Some(message) = self.decode(&text) {
                return Some(message);
            }
        }
        None
    }

    fn decode(&self, text: &str) -> Option<InterWindowMessage> {
        match InterWindowMessage::parse(text) {
            Ok(message) => Some(message),
            Err(e) => {
                tracing::warn!("[{}#{}] dropping message: {}", self.bus, self.id, e);
                None
            }
        }
    }
}

impl Drop for SyncEndpoint {
    fn drop(&mut self) {
        if let Lane::Operator {
            intents, parking, ..
        } = &mut self.lane
            && let Some(intents) = intents.take()
        {
            *parking.lock().unwrap_or_else(PoisonError::into_inner) = Some(intents);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sync::message::GuestAction;

    fn filter(name: &str) -> InterWindowMessage {
        InterWindowMessage::GuestAction(GuestAction::SetFilter {
            filter: name.to_string(),
        })
    }

    #[test]
    fn each_side_hears_only_the_other() {
        let bus = SyncBus::new("booth", 8);
        let mut operator = bus.operator().unwrap();
        let mut guest = bus.guest();

        guest.post(&InterWindowMessage::GetState).unwrap();
        assert_eq!(guest.try_recv(), None);
        assert_eq!(operator.try_recv(), Some(InterWindowMessage::GetState));
        assert_eq!(operator.try_recv(), None);
    }

    #[test]
    fn invalid_messages_are_dropped() {
        let bus = SyncBus::new("booth", 8);
        let mut operator = bus.operator().unwrap();
        let guest = bus.guest();

        guest
            .post_text("{\"type\":\"GUEST_ACTION\",\"payload\":{\"type\":\"select-layout\",\"layout\":7}}")
            .unwrap();
        guest.post_text("garbage").unwrap();
        guest.post(&InterWindowMessage::GetState).unwrap();
        assert_eq!(operator.try_recv(), Some(InterWindowMessage::GetState));
        assert_eq!(operator.try_recv(), None);
    }

    #[test]
    fn lagging_guest_keeps_newest_state() {
        let bus = SyncBus::new("booth", 2);
        let operator = bus.operator().unwrap();
        let mut guest = bus.guest();
        for _ in 0..5 {
            operator.post_text("garbage").unwrap();
        }
        operator.post(&InterWindowMessage::GetState).unwrap();
        assert_eq!(guest.try_recv(), Some(InterWindowMessage::GetState));
    }

    #[test]
    fn guest_intents_outlast_a_small_capacity() {
        let bus = SyncBus::new("booth", 2);
        let mut operator = bus.operator().unwrap();
        let guest = bus.guest();
        for i in 0..50 {
            guest.post(&filter(&format!("blur({i}px)"))).unwrap();
        }
        let received: Vec<_> = std::iter::from_fn(|| operator.try_recv()).collect();
        assert_eq!(received.len(), 50);
        assert_eq!(received[0], filter("blur(0px)"));
        assert_eq!(received[49], filter("blur(49px)"));
    }

    #[test]
    fn one_operator_at_a_time_and_queue_survives_restart() {
        let bus = SyncBus::new("booth", 8);
        let first = bus.operator().unwrap();
        assert!(matches!(bus.operator(), Err(SyncError::OperatorAttached(_))));

        let guest = bus.guest();
        drop(first);
        guest.post(&InterWindowMessage::GetState).unwrap();

        let mut second = bus.operator().unwrap();
        assert_eq!(second.try_recv(), Some(InterWindowMessage::GetState));
    }

    #[test]
    fn guest_post_fails_once_bus_is_gone() {
        let bus = SyncBus::new("booth", 8);
        let guest = bus.guest();
        drop(bus);
        assert!(matches!(
            guest.post(&InterWindowMessage::GetState),
            Err(SyncError::Closed(_))
        ));
    }

    #[test]
    fn state_without_guests_is_not_an_error() {
        let bus = SyncBus::new("booth", 8);
        let operator = bus.operator().unwrap();
        assert!(operator.post_text("{}").is_ok());
    }

    #[test]
    fn capacity_comes_from_config() {
        let config = Config {
            sync_bus_capacity: 1,
            ..Config::default()
        };
        let bus = SyncBus::from_config("booth", &config);
        let operator = bus.operator().unwrap();
        let mut guest = bus.guest();
        operator.post(&InterWindowMessage::GetState).unwrap();
        operator.post_text("garbage").unwrap();
        // The first state was pushed out by the second
        assert_eq!(guest.try_recv(), None);
    }

    #[tokio::test]
    async fn recv_waits_for_a_message() {
        let bus = SyncBus::new("booth", 8);
        let operator = bus.operator().unwrap();
        let mut guest = bus.guest();
        let waiter = tokio::spawn(async move { guest.recv().await });
        tokio::task::yield_now().await;
        operator.post(&InterWindowMessage::GetState).unwrap();
        assert_eq!(waiter.await.unwrap(), Some(InterWindowMessage::GetState));
    }

    #[tokio::test]
    async fn operator_recv_waits_for_an_intent() {
        let bus = SyncBus::new("booth", 8);
        let mut operator = bus.operator().unwrap();
        let guest = bus.guest();
        let waiter = tokio::spawn(async move { operator.recv().await });
        guest.post(&InterWindowMessage::GetState).unwrap();
        assert_eq!(waiter.await.unwrap(), Some(InterWindowMessage::GetState));
    }
}
