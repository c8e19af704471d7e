//! Input dispatch module.
//! Uses `rdev` to move the OS pointer and send a single left click.
//! Challenge: macOS needs Accessibility permission for the terminal, otherwise events are dropped silently.

use anyhow::{anyhow, Result};
use rdev::{simulate, Button, EventType};
use std::thread;
use std::time::Duration;

/// Something that can click at absolute screen coordinates.
pub trait Pointer {
    fn click(&mut self, x: f64, y: f64) -> Result<()>;
}

/// Real pointer driven through `rdev::simulate`.
pub struct SystemPointer {
    /// Pause between events; some platforms drop events sent back to back.
    event_gap: Duration,
}

impl Default for SystemPointer {
    fn default() -> Self {
        SystemPointer {
            event_gap: Duration::from_millis(20),
        }
    }
}

impl SystemPointer {
    fn send(&self, event: EventType) -> Result<()> {
        simulate(&event).map_err(|_| anyhow!("Failed to send input event {:?}", event))?;
        thread::sleep(self.event_gap);
        Ok(())
    }
}

impl Pointer for SystemPointer {
    fn click(&mut self, x: f64, y: f64) -> Result<()> {
        self.send(EventType::MouseMove { x, y })?;
        self.send(EventType::ButtonPress(Button::Left))?;
        self.send(EventType::ButtonRelease(Button::Left))?;
        log::debug!("Clicked at ({:.0}, {:.0})", x, y);
        Ok(())
    }
}
