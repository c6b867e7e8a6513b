// Copyright 2025 the Snapbooth Authors
// SPDX-License-Identifier: Apache-2.0

//! Operator/guest message types.
//!
//! Messages are closed enums. Parsing a raw message is a total function:
//! either it yields a fully-shaped [`InterWindowMessage`] whose guest
//! action has passed its field checks, or it yields a [`MessageError`] and
//! the message is dropped by the receiver.

use crate::model::layer::NormalizedPoint;
use crate::model::{DrawingLayer, Session, Transform};
use crate::settings;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Longest filter string a guest may set
const MAX_FILTER_LEN: usize = 256;

/// Most points a single guest stroke may carry
const MAX_STROKE_POINTS: usize = 10_000;

#[derive(Debug, Error)]
pub enum MessageError {
    #[error("malformed message: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid {action}: {reason}")]
    Invalid {
        action: &'static str,
        reason: &'static str,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload")]
pub enum InterWindowMessage {
    /// Operator to guest: the complete display state
    #[serde(rename = "SET_STATE")]
    SetState(Box<DisplayState>),
    /// Guest to operator: ask for a `SET_STATE`
    #[serde(rename = "GET_STATE")]
    GetState,
    /// Guest to operator: an intent for the operator to apply
    #[serde(rename = "GUEST_ACTION")]
    GuestAction(GuestAction),
}

impl InterWindowMessage {
    /// Parse and validate a message received off the bus.
    pub fn parse(text: &str) -> Result<Self, MessageError> {
        let message: InterWindowMessage = serde_json::from_str(text)?;
        if let InterWindowMessage::GuestAction(action) = &message {
            action.validate()?;
        }
        Ok(message)
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn kind(&self) -> &'static str {
        match self {
            InterWindowMessage::SetState(_) => "SET_STATE",
            InterWindowMessage::GetState => "GET_STATE",
            InterWindowMessage::GuestAction(_) => "GUEST_ACTION",
        }
    }
}

/// A freehand stroke drawn on the guest screen.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GuestStroke {
    pub points: Vec<NormalizedPoint>,
    pub color: String,
    pub stroke_width: f64,
}

impl GuestStroke {
    /// A committed drawing with an operator-assigned id.
    pub fn into_drawing(self) -> DrawingLayer {
        DrawingLayer::new(self.points, self.color, self.stroke_width)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case", rename_all_fields = "camelCase")]
pub enum GuestAction {
    Start,
    SelectLayout {
        layout: String,
    },
    SelectFrame {
        /// `None` removes the frame
        frame: Option<String>,
    },
    SubmitEmail {
        email: String,
    },
    RequestPrint {
        #[serde(default = "one")]
        copies: u32,
    },
    AddDrawing {
        stroke: GuestStroke,
    },
    SetFilter {
        filter: String,
    },
    PaymentComplete,
}

fn one() -> u32 {
    1
}

impl GuestAction {
    pub fn name(&self) -> &'static str {
        match self {
            GuestAction::Start => "start",
            GuestAction::SelectLayout { .. } => "select-layout",
            GuestAction::SelectFrame { .. } => "select-frame",
            GuestAction::SubmitEmail { .. } => "submit-email",
            GuestAction::RequestPrint { .. } => "request-print",
            GuestAction::AddDrawing { .. } => "add-drawing",
            GuestAction::SetFilter { .. } => "set-filter",
            GuestAction::PaymentComplete => "payment-complete",
        }
    }

    /// Field checks beyond what the types already enforce.
    pub fn validate(&self) -> Result<(), MessageError> {
        let fail = |reason| {
            Err(MessageError::Invalid {
                action: self.name(),
                reason,
            })
        };
        match self {
            GuestAction::Start | GuestAction::PaymentComplete => Ok(()),
            GuestAction::SelectLayout { layout } if layout.trim().is_empty() => {
                fail("empty layout id")
            }
            GuestAction::SelectLayout { .. } => Ok(()),
            GuestAction::SelectFrame { frame: Some(frame) } if frame.trim().is_empty() => {
                fail("empty frame source")
            }
            GuestAction::SelectFrame { .. } => Ok(()),
            GuestAction::SubmitEmail { email } => {
                let email = email.trim();
                match email.split_once('@') {
                    Some((user, domain))
                        if !user.is_empty()
                            && domain.contains('.')
                            && !domain.starts_with('.')
                            && !domain.ends_with('.')
                            && !email.contains(char::is_whitespace) =>
                    {
                        Ok(())
                    }
                    _ => fail("not an email address"),
                }
            }
            GuestAction::RequestPrint { copies }
                if *copies == 0 || *copies > settings::sync::MAX_PRINT_COPIES =>
            {
                fail("copies out of range")
            }
            GuestAction::RequestPrint { .. } => Ok(()),
            GuestAction::AddDrawing { stroke } => {
                if stroke.points.is_empty() || stroke.points.len() > MAX_STROKE_POINTS {
                    fail("bad point count")
                } else if !stroke.points.iter().all(|p| p.is_finite()) {
                    fail("non-finite point")
                } else if !(stroke.stroke_width.is_finite() && stroke.stroke_width > 0.0) {
                    fail("bad stroke width")
                } else {
                    Ok(())
                }
            }
            GuestAction::SetFilter { filter } if filter.len() > MAX_FILTER_LEN => {
                fail("filter too long")
            }
            GuestAction::SetFilter { .. } => Ok(()),
        }
    }

    /// Whether applying this action changes layers or the filter.
    pub fn touches_session(&self) -> bool {
        matches!(
            self,
            GuestAction::SelectLayout { .. }
                | GuestAction::AddDrawing { .. }
                | GuestAction::SetFilter { .. }
                | GuestAction::PaymentComplete
        )
    }
}

/// Which screen the guest display shows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KioskMode {
    #[default]
    Welcome,
    Layout,
    Editing,
    Email,
    Payment,
    Printing,
}

/// Everything the guest renders. Each `SET_STATE` carries all of it, so a
/// late or reordered message can be applied without history.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DisplayState {
    /// Identifies the operator run that sent this state
    pub epoch: u64,
    /// Increases with every broadcast within an epoch; older states are
    /// ignored
    pub revision: u64,
    pub mode: KioskMode,
    pub session: Session,
    pub layout: Option<String>,
    pub frame_src: Option<String>,
    pub frame_opacity: f64,
    pub global_photo_scale: f64,
    pub aspect: settings::AspectRatio,
    /// Slots of the active layout that have no photo yet
    pub placeholders: Vec<Transform>,
    pub filters: Vec<String>,
    pub email: Option<String>,
    pub print_copies: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_action(json: &str) -> Result<GuestAction, MessageError> {
        let text = format!(r#"{{"type":"GUEST_ACTION","payload":{json}}}"#);
        match InterWindowMessage::parse(&text)? {
            InterWindowMessage::GuestAction(action) => Ok(action),
            other => panic!("unexpected {}", other.kind()),
        }
    }

    #[test]
    fn every_action_type_parses() {
        let cases = [
            r#"{"type":"start"}"#,
            r#"{"type":"select-layout","layout":"grid"}"#,
            r#"{"type":"select-frame","frame":null}"#,
            r#"{"type":"submit-email","email":"guest@example.com"}"#,
            r#"{"type":"request-print","copies":2}"#,
            r#"{"type":"add-drawing","stroke":{"points":[{"x":0.1,"y":0.2}],"color":"red","strokeWidth":0.01}}"#,
            r#"{"type":"set-filter","filter":"sepia(1)"}"#,
            r#"{"type":"payment-complete"}"#,
        ];
        for case in cases {
            assert!(parse_action(case).is_ok(), "{case}");
        }
    }

    #[test]
    fn select_layout_with_non_string_layout_is_rejected() {
        assert!(matches!(
            parse_action(r#"{"type":"select-layout","layout":3}"#),
            Err(MessageError::Json(_))
        ));
        assert!(parse_action(r#"{"type":"select-layout"}"#).is_err());
    }

    #[test]
    fn unknown_action_type_is_rejected() {
        assert!(parse_action(r#"{"type":"format-disk"}"#).is_err());
        assert!(InterWindowMessage::parse(r#"{"type":"GUEST_ACTION"}"#).is_err());
        assert!(InterWindowMessage::parse("not json").is_err());
    }

    #[test]
    fn field_checks() {
        assert!(matches!(
            parse_action(r#"{"type":"submit-email","email":"nope"}"#),
            Err(MessageError::Invalid { .. })
        ));
        assert!(parse_action(r#"{"type":"request-print","copies":0}"#).is_err());
        assert!(parse_action(r#"{"type":"request-print","copies":99}"#).is_err());
        assert!(parse_action(r#"{"type":"select-layout","layout":"  "}"#).is_err());
        assert!(
            parse_action(
                r#"{"type":"add-drawing","stroke":{"points":[],"color":"red","strokeWidth":0.01}}"#
            )
            .is_err()
        );
        // Default copies
        assert_eq!(
            parse_action(r#"{"type":"request-print"}"#).unwrap(),
            GuestAction::RequestPrint { copies: 1 }
        );
    }

    #[test]
    fn get_state_has_no_payload() {
        let json = InterWindowMessage::GetState.to_json().unwrap();
        assert_eq!(json, r#"{"type":"GET_STATE"}"#);
        assert_eq!(InterWindowMessage::parse(&json).unwrap(), InterWindowMessage::GetState);
    }

    #[test]
    fn set_state_survives_the_wire() {
        let state = DisplayState {
            revision: 4,
            mode: KioskMode::Editing,
            layout: Some("strip".to_string()),
            ..DisplayState::default()
        };
        let json = InterWindowMessage::SetState(Box::new(state.clone())).to_json().unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["type"], "SET_STATE");
        assert_eq!(value["payload"]["mode"], "editing");
        assert_eq!(
            InterWindowMessage::parse(&json).unwrap(),
            InterWindowMessage::SetState(Box::new(state))
        );
    }
}
