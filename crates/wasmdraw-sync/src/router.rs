//! Inbound message dispatch.

use crate::command::ShapeKind;
use crate::error::SyncError;
use crate::message::Message;
use crate::surface::Surface;

/// What the router did with one inbound message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Dispatch {
    /// A draw batch was replayed. `skipped` counts entries whose shape
    /// kind this client cannot render.
    Drew { rendered: usize, skipped: usize },
    Cleared,
    /// The message was dropped; the surface was not touched.
    Ignored(SyncError),
}

/// Routes peer messages to the local surface.
///
/// Never fails: anything that is not a well-formed `draw` or
/// `clear-canvas` message is logged and ignored.
#[derive(Debug, Clone, Default)]
pub struct MessageRouter {
    /// Shape kinds the surface knows how to draw.
    renderable: Vec<ShapeKind>,
}

impl MessageRouter {
    /// Router that renders every enumerated shape kind.
    pub fn new() -> Self {
        Self::with_renderable(&[ShapeKind::Line, ShapeKind::Circle, ShapeKind::Square])
    }

    /// Router limited to the given kinds. Other kinds are skipped per entry.
    pub fn with_renderable(kinds: &[ShapeKind]) -> Self {
        Self {
            renderable: kinds.to_vec(),
        }
    }

    /// Check if a command of this kind would reach the surface.
    pub fn renders(&self, kind: ShapeKind) -> bool {
        kind.is_known() && self.renderable.contains(&kind)
    }

    /// Parse and dispatch one inbound text frame.
    pub fn route(&self, text: &str, surface: &mut dyn Surface) -> Dispatch {
        match Message::decode(text) {
            Ok(message) => self.dispatch(&message, surface),
            Err(err) => {
                log::warn!(
                    "Ignoring inbound message ({}): {}",
                    err,
                    &text[..floor_char_boundary(text, 100)]
                );
                Dispatch::Ignored(err)
            }
        }
    }

    /// Dispatch an already parsed message.
    pub fn dispatch(&self, message: &Message, surface: &mut dyn Surface) -> Dispatch {
        match message {
            Message::Draw { payload } => {
                let mut rendered = 0;
                let mut skipped = 0;
                for command in payload {
                    if self.renders(command.kind) {
                        surface.render(command);
                        rendered += 1;
                    } else {
                        log::debug!("Skipping command with unsupported type {:?}", command.kind);
                        skipped += 1;
                    }
                }
                Dispatch::Drew { rendered, skipped }
            }
            Message::ClearCanvas => {
                surface.clear();
                Dispatch::Cleared
            }
        }
    }
}

/// Largest byte index `<= max` that falls on a char boundary of `text`.
pub(crate) fn floor_char_boundary(text: &str, max: usize) -> usize {
    if max >= text.len() {
        return text.len();
    }
    let mut index = max;
    while !text.is_char_boundary(index) {
        index -= 1;
    }
    index
}
