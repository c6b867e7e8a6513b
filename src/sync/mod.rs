// Copyright 2025 the Snapbooth Authors
// SPDX-License-Identifier: Apache-2.0

//! Operator/guest synchronization.
//!
//! The operator owns the canonical session and broadcasts full
//! `SET_STATE` snapshots; the guest mirrors them and sends intents back as
//! `GUEST_ACTION`s. Nothing is shared but JSON text on a [`SyncBus`].

pub mod channel;
pub mod guest;
pub mod message;
pub mod operator;

pub use channel::{SyncBus, SyncEndpoint, SyncError};
pub use guest::GuestMirror;
pub use message::{DisplayState, GuestAction, GuestStroke, InterWindowMessage, KioskMode, MessageError};
pub use operator::{KioskState, OperatorHub, Throttle};
