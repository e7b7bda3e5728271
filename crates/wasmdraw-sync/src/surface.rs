//! Rendering surface capability.

use crate::command::DrawCommand;

/// The local rendering engine as seen by the sync layer.
///
/// Implementations must not append rendered commands to the local
/// [`DrawStack`](crate::DrawStack): remote replays would be transmitted
/// again and bounce around the room forever.
pub trait Surface {
    /// Draw one command received from a peer.
    fn render(&mut self, command: &DrawCommand);

    /// Wipe the surface. The session drops the local history itself, through
    /// [`CommandSource::clear_history`](crate::CommandSource::clear_history).
    fn clear(&mut self);
}

/// Surface that only records what it was asked to draw.
///
/// Useful for headless clients and tests.
#[derive(Debug, Clone, Default)]
pub struct MemorySurface {
    rendered: Vec<DrawCommand>,
    clears: usize,
}

impl MemorySurface {
    /// Create an empty surface.
    pub fn new() -> Self {
        Self::default()
    }

    /// Commands drawn since the last clear.
    pub fn rendered(&self) -> &[DrawCommand] {
        &self.rendered
    }

    /// Number of times the surface was cleared.
    pub fn clear_count(&self) -> usize {
        self.clears
    }
}

impl Surface for MemorySurface {
    fn render(&mut self, command: &DrawCommand) {
        self.rendered.push(*command);
    }

    fn clear(&mut self) {
        self.rendered.clear();
        self.clears += 1;
    }
}
