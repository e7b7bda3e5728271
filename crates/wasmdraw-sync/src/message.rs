//! Wire messages exchanged through the relay.
//!
//! Every client in a room speaks the same JSON shape:
//! ```json
//! { "type": "draw", "payload": [ { "startX": 0, "startY": 0, "endX": 10, "endY": 10, "type": 0 } ] }
//! { "type": "clear-canvas" }
//! ```

use serde::{Deserialize, Serialize};

use crate::command::DrawCommand;
use crate::error::{SyncError, SyncResult};

/// Messages sent to and received from peers in the same room.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum Message {
    /// A batch of draw commands, in append order.
    Draw { payload: Vec<DrawCommand> },
    /// Clear the surface.
    ClearCanvas,
}

/// Just the discriminator, used to tell an unknown tag from a broken shape.
#[derive(Deserialize)]
struct Envelope {
    #[serde(rename = "type")]
    kind: String,
}

impl Message {
    pub const DRAW_TAG: &'static str = "draw";
    pub const CLEAR_CANVAS_TAG: &'static str = "clear-canvas";

    /// Wire tag of this message.
    pub fn tag(&self) -> &'static str {
        match self {
            Message::Draw { .. } => Self::DRAW_TAG,
            Message::ClearCanvas => Self::CLEAR_CANVAS_TAG,
        }
    }

    /// Serialize to JSON text.
    ///
    /// Batches with non-finite coordinates are refused: JSON would carry
    /// them as `null` and every receiver would reject the whole batch.
    pub fn encode(&self) -> SyncResult<String> {
        if let Message::Draw { payload } = self {
            if let Some(index) = payload.iter().position(|cmd| !cmd.is_finite()) {
                return Err(SyncError::Serialization(format!(
                    "non-finite coordinate in command {}",
                    index
                )));
            }
        }
        serde_json::to_string(self).map_err(|e| SyncError::Serialization(e.to_string()))
    }

    /// Parse JSON text, failing closed on anything but the exact tagged shape.
    pub fn decode(text: &str) -> SyncResult<Message> {
        match serde_json::from_str::<Message>(text) {
            Ok(message) => Ok(message),
            Err(err) => match serde_json::from_str::<Envelope>(text) {
                Ok(envelope)
                    if envelope.kind != Self::DRAW_TAG
                        && envelope.kind != Self::CLEAR_CANVAS_TAG =>
                {
                    Err(SyncError::UnknownMessageType(envelope.kind))
                }
                _ => Err(SyncError::MalformedMessage(err.to_string())),
            },
        }
    }
}
