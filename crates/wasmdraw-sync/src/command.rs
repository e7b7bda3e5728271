//! Draw commands and the local command history.

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Shape kind carried in the `type` field of a draw command.
///
/// On the wire this is a plain integer. Values this client cannot render
/// still decode, as [`ShapeKind::Unknown`] or [`ShapeKind::Invalid`], so
/// one odd entry never costs the rest of a peer's batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShapeKind {
    Line,
    Circle,
    Square,
    /// An integer code this client has no shape for.
    Unknown(i64),
    /// Not an integer at all (fraction, string, null, out of range).
    Invalid,
}

impl ShapeKind {
    /// Wire code for this kind. `None` for [`ShapeKind::Invalid`].
    pub fn code(self) -> Option<i64> {
        match self {
            ShapeKind::Line => Some(0),
            ShapeKind::Circle => Some(1),
            ShapeKind::Square => Some(2),
            ShapeKind::Unknown(code) => Some(code),
            ShapeKind::Invalid => None,
        }
    }

    /// Check if this is one of the enumerated kinds.
    pub fn is_known(self) -> bool {
        !matches!(self, ShapeKind::Unknown(_) | ShapeKind::Invalid)
    }

    fn from_json(value: &serde_json::Value) -> Self {
        if let Some(code) = value.as_i64() {
            return ShapeKind::from(code);
        }
        // Integral floats such as `1.0` compare equal to their integer in JS.
        match value.as_f64() {
            Some(f) if f.fract() == 0.0 && f >= i64::MIN as f64 && f < i64::MAX as f64 => {
                ShapeKind::from(f as i64)
            }
            _ => ShapeKind::Invalid,
        }
    }
}

impl From<i64> for ShapeKind {
    fn from(code: i64) -> Self {
        match code {
            0 => ShapeKind::Line,
            1 => ShapeKind::Circle,
            2 => ShapeKind::Square,
            other => ShapeKind::Unknown(other),
        }
    }
}

impl Serialize for ShapeKind {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self.code() {
            Some(code) => serializer.serialize_i64(code),
            None => serializer.serialize_none(),
        }
    }
}

impl<'de> Deserialize<'de> for ShapeKind {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = serde_json::Value::deserialize(deserializer)?;
        Ok(ShapeKind::from_json(&value))
    }
}

/// One atomic drawing operation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DrawCommand {
    pub start_x: f64,
    pub start_y: f64,
    pub end_x: f64,
    pub end_y: f64,
    #[serde(rename = "type")]
    pub kind: ShapeKind,
}

impl DrawCommand {
    /// Create a new draw command.
    pub fn new(start_x: f64, start_y: f64, end_x: f64, end_y: f64, kind: ShapeKind) -> Self {
        Self {
            start_x,
            start_y,
            end_x,
            end_y,
            kind,
        }
    }

    /// Shorthand for a line segment.
    pub fn line(start_x: f64, start_y: f64, end_x: f64, end_y: f64) -> Self {
        Self::new(start_x, start_y, end_x, end_y, ShapeKind::Line)
    }

    /// Check that every coordinate is finite (JSON has no NaN or infinity).
    pub fn is_finite(&self) -> bool {
        self.start_x.is_finite()
            && self.start_y.is_finite()
            && self.end_x.is_finite()
            && self.end_y.is_finite()
    }
}

/// Source of locally produced commands that have not been transmitted yet.
///
/// The rendering engine owns the authoritative history; the batcher only
/// ever pulls from it through this trait.
pub trait CommandSource {
    /// Number of commands added since the last pull.
    fn pending_count(&self) -> usize;

    /// Take every command added since the last pull, in append order.
    ///
    /// Advances the cursor: a command returned here is never returned again.
    fn drain_pending(&mut self) -> Vec<DrawCommand>;

    /// Drop the whole history, pending commands included. Called when a
    /// peer clears the canvas, so strokes drawn before the clear are never
    /// sent after it.
    fn clear_history(&mut self);
}

/// Ordered local history with a transmission cursor.
///
/// Everything before `sent` has already been handed to the batcher; the
/// cursor only moves forward until the history itself is cleared.
#[derive(Debug, Clone, Default)]
pub struct DrawStack {
    commands: Vec<DrawCommand>,
    sent: usize,
}

impl DrawStack {
    /// Create an empty stack.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a command to the history.
    pub fn push(&mut self, command: DrawCommand) {
        self.commands.push(command);
    }

    /// Total number of commands in the history.
    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    /// Iterate the full history, sent and pending.
    pub fn iter(&self) -> impl Iterator<Item = &DrawCommand> {
        self.commands.iter()
    }

    /// Position of the transmission cursor.
    pub fn cursor(&self) -> usize {
        self.sent
    }

    /// Drop the whole history.
    ///
    /// Pending commands are discarded along with the sent ones, so nothing
    /// from before the clear can be transmitted afterwards.
    pub fn clear(&mut self) {
        self.commands.clear();
        self.sent = 0;
    }
}

impl CommandSource for DrawStack {
    fn pending_count(&self) -> usize {
        self.commands.len() - self.sent
    }

    fn drain_pending(&mut self) -> Vec<DrawCommand> {
        let pending = self.commands[self.sent..].to_vec();
        self.sent = self.commands.len();
        pending
    }

    fn clear_history(&mut self) {
        self.clear();
    }
}
