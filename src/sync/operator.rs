// Copyright 2025 the Snapbooth Authors
// SPDX-License-Identifier: Apache-2.0

//! The operator side of the sync bus.
//!
//! The operator is the only writer of canonical state. Guest actions arrive
//! already shape-checked; the hub checks them against current state (known
//! layout, paid before print), applies them, and answers every applied
//! action and every `GET_STATE` with a full `SET_STATE`.

use super::channel::{SyncBus, SyncEndpoint, SyncError};
use super::message::{DisplayState, GuestAction, InterWindowMessage, KioskMode};
use crate::model::{Session, Transform};
use crate::settings::Config;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Low bits of an epoch that count hubs started within one millisecond
const EPOCH_COUNTER_BITS: u32 = 12;

/// A value no earlier hub in this process or a previous run has used,
/// given a clock that does not run backwards.
fn next_epoch() -> u64 {
    static STARTED: AtomicU64 = AtomicU64::new(0);
    let millis = u64::try_from(chrono::Utc::now().timestamp_millis()).unwrap_or_default();
    let count = STARTED.fetch_add(1, Ordering::Relaxed) & ((1 << EPOCH_COUNTER_BITS) - 1);
    (millis << EPOCH_COUNTER_BITS) | count
}

/// Guest-facing state that is not part of the layer session.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct KioskState {
    pub mode: KioskMode,
    pub layout: Option<String>,
    pub frame_src: Option<String>,
    pub email: Option<String>,
    /// Copies requested by the last accepted print action
    pub print_copies: u32,
}

/// Leading and trailing edge throttle.
#[derive(Debug, Clone)]
pub struct Throttle {
    interval: Duration,
    last_fire: Option<Instant>,
    pending: bool,
}

impl Throttle {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last_fire: None,
            pending: false,
        }
    }

    /// Returns true when the caller should act now; otherwise the hit is
    /// remembered for [`flush`](Self::flush).
    pub fn hit(&mut self, now: Instant) -> bool {
        if self.ready(now) {
            self.last_fire = Some(now);
            self.pending = false;
            true
        } else {
            self.pending = true;
            false
        }
    }

    /// Fire a remembered hit once the interval has passed.
    pub fn flush(&mut self, now: Instant) -> bool {
        if self.pending && self.ready(now) {
            self.last_fire = Some(now);
            self.pending = false;
            true
        } else {
            false
        }
    }

    pub fn is_pending(&self) -> bool {
        self.pending
    }

    fn ready(&self, now: Instant) -> bool {
        self.last_fire
            .is_none_or(|last| now.saturating_duration_since(last) >= self.interval)
    }
}

#[derive(Debug)]
pub struct OperatorHub {
    endpoint: SyncEndpoint,
    config: Config,
    kiosk: KioskState,
    epoch: u64,
    revision: u64,
    throttle: Throttle,
}

impl OperatorHub {
    /// Attach to `bus` as its operator.
    pub fn new(bus: &SyncBus, config: Config) -> Result<Self, SyncError> {
        let endpoint = bus.operator()?;
        let kiosk = KioskState {
            frame_src: config.frame_src.clone(),
            ..KioskState::default()
        };
        let throttle = Throttle::new(config.rebroadcast_throttle());
        let epoch = next_epoch();
        tracing::info!("Operator attached to {} (epoch {})", bus.name(), epoch);
        Ok(Self {
            endpoint,
            config,
            kiosk,
            epoch,
            revision: 0,
            throttle,
        })
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn kiosk(&self) -> &KioskState {
        &self.kiosk
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Operator-initiated mode change; broadcasts if the mode changed.
    pub fn set_mode(&mut self, mode: KioskMode, session: &Session) -> Result<bool, SyncError> {
        self.update_kiosk(session, |kiosk| kiosk.mode = mode)
    }

    /// Frame overlay chosen on the operator side.
    pub fn set_frame(&mut self, frame_src: Option<String>, session: &Session) -> Result<bool, SyncError> {
        self.update_kiosk(session, |kiosk| kiosk.frame_src = frame_src)
    }

    /// Change kiosk state from the operator side. Broadcasts only when
    /// something actually changed.
    pub fn update_kiosk(
        &mut self,
        session: &Session,
        edit: impl FnOnce(&mut KioskState),
    ) -> Result<bool, SyncError> {
        let before = self.kiosk.clone();
        edit(&mut self.kiosk);
        if self.kiosk == before {
            return Ok(false);
        }
        self.broadcast(session)?;
        Ok(true)
    }

    pub fn display_state(&self, session: &Session) -> DisplayState {
        let placeholders: Vec<Transform> = self
            .kiosk
            .layout
            .as_deref()
            .and_then(|id| self.config.layout(id))
            .map(|layout| layout.slots.iter().skip(session.photos.len()).copied().collect())
            .unwrap_or_default();
        DisplayState {
            epoch: self.epoch,
            revision: self.revision,
            mode: self.kiosk.mode,
            session: session.clone(),
            layout: self.kiosk.layout.clone(),
            frame_src: self.kiosk.frame_src.clone(),
            frame_opacity: self.config.frame_opacity,
            global_photo_scale: self.config.global_photo_scale,
            aspect: self.config.aspect,
            placeholders,
            filters: self.config.filter_presets.clone(),
            email: self.kiosk.email.clone(),
            print_copies: self.kiosk.print_copies,
        }
    }

    /// Send the full state to the guest.
    pub fn broadcast(&mut self, session: &Session) -> Result<(), SyncError> {
        self.revision += 1;
        let state = self.display_state(session);
        self.endpoint
            .post(&InterWindowMessage::SetState(Box::new(state)))
    }

    /// The operator changed layers. While the guest is showing the layout,
    /// rebroadcast at most once per throttle interval.
    pub fn session_edited(&mut self, session: &Session, now: Instant) -> Result<bool, SyncError> {
        if !matches!(self.kiosk.mode, KioskMode::Layout | KioskMode::Editing) {
            return Ok(false);
        }
        if self.throttle.hit(now) {
            self.broadcast(session)?;
            return Ok(true);
        }
        Ok(false)
    }

    /// Send the trailing rebroadcast of a throttled burst, if due.
    pub fn flush(&mut self, session: &Session, now: Instant) -> Result<bool, SyncError> {
        if self.throttle.flush(now) {
            self.broadcast(session)?;
            return Ok(true);
        }
        Ok(false)
    }

    /// Handle everything queued on the bus. Returns the actions applied.
    pub fn poll(&mut self, session: &mut Session, now: Instant) -> Vec<GuestAction> {
        let mut applied = Vec::new();
        while let Some(message) = self.endpoint.try_recv() {
            match message {
                InterWindowMessage::GetState => {
                    if let Err(e) = self.broadcast(session) {
                        tracing::error!("Cannot answer GET_STATE: {}", e);
                    }
                }
                InterWindowMessage::GuestAction(action) => {
                    if self.apply(&action, session) {
                        if let Err(e) = self.broadcast(session) {
                            tracing::error!("Cannot broadcast after {}: {}", action.name(), e);
                        }
                        applied.push(action);
                    }
                }
                InterWindowMessage::SetState(_) => {
                    tracing::warn!("Operator ignoring SET_STATE from another endpoint");
                }
            }
        }
        if let Err(e) = self.flush(session, now) {
            tracing::error!("Cannot flush rebroadcast: {}", e);
        }
        applied
    }

    /// Apply a validated guest action. Returns false when current state
    /// does not allow it; nothing is changed in that case.
    pub fn apply(&mut self, action: &GuestAction, session: &mut Session) -> bool {
        match action {
            GuestAction::Start => {
                self.kiosk = KioskState {
                    mode: KioskMode::Layout,
                    frame_src: self.kiosk.frame_src.take(),
                    ..KioskState::default()
                };
                session.is_paid = false;
            }
            GuestAction::SelectLayout { layout } => {
                let Some(found) = self.config.layout(layout) else {
                    tracing::warn!("Dropping select-layout: unknown layout {:?}", layout);
                    return false;
                };
                session.apply_layout(&found.slots);
                self.kiosk.layout = Some(layout.clone());
                self.kiosk.mode = KioskMode::Editing;
            }
            GuestAction::SelectFrame { frame } => {
                self.kiosk.frame_src = frame.clone();
            }
            GuestAction::SubmitEmail { email } => {
                self.kiosk.email = Some(email.trim().to_string());
                self.kiosk.mode = if session.is_paid {
                    KioskMode::Printing
                } else {
                    KioskMode::Payment
                };
            }
            GuestAction::RequestPrint { copies } => {
                if !session.is_paid {
                    tracing::warn!("Dropping request-print: session not paid");
                    return false;
                }
                self.kiosk.print_copies = *copies;
                self.kiosk.mode = KioskMode::Printing;
            }
            GuestAction::AddDrawing { stroke } => {
                session.drawings.push(stroke.clone().into_drawing());
            }
            GuestAction::SetFilter { filter } => {
                session.filter = filter.clone();
            }
            GuestAction::PaymentComplete => {
                session.is_paid = true;
                if self.kiosk.mode == KioskMode::Payment {
                    self.kiosk.mode = KioskMode::Printing;
                }
            }
        }
        tracing::info!("Applied guest action {}", action.name());
        true
    }
}
