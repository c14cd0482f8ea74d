//! Single-slot transient notifications ("toasts").
//!
//! Showing a toast cancels whatever is on screen. A toast is visible for
//! its duration, then fades for [`FADE_OUT`], then disappears.

use std::sync::Arc;
#[cfg(test)]
use std::sync::Mutex;
use std::time::Duration;

use tokio::time::Instant;

/// Length of the fade-out phase after a toast's visible period.
pub const FADE_OUT: Duration = Duration::from_millis(250);

/// Source of the current time.
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
}

/// Tokio's clock, which tests can pause and advance.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioClock;

impl Clock for TokioClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// A clock moved by hand.
#[cfg(test)]
#[derive(Debug, Clone)]
pub struct ManualClock {
    now: Arc<Mutex<Instant>>,
}

#[cfg(test)]
impl ManualClock {
    pub fn new() -> Self {
        Self {
            now: Arc::new(Mutex::new(Instant::now())),
        }
    }

    pub fn advance(&self, by: Duration) {
        if let Ok(mut now) = self.now.lock() {
            *now += by;
        }
    }
}

#[cfg(test)]
impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.now.lock().map(|now| *now).unwrap_or_else(|e| *e.into_inner())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Variant {
    Info,
    Success,
    Warn,
    Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Visible,
    Fading,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Toast {
    pub message: String,
    pub variant: Variant,
    shown_at: Instant,
    duration: Duration,
}

/// The notification slot.
pub struct Notifier {
    clock: Arc<dyn Clock>,
    default_duration: Duration,
    current: Option<Toast>,
}

impl Notifier {
    pub fn new(clock: Arc<dyn Clock>, default_duration: Duration) -> Self {
        Self {
            clock,
            default_duration,
            current: None,
        }
    }

    /// Show `message` for the default duration, replacing any current toast.
    pub fn show(&mut self, message: impl Into<String>, variant: Variant) {
        self.show_for(message, variant, self.default_duration);
    }

    pub fn show_for(&mut self, message: impl Into<String>, variant: Variant, duration: Duration) {
        let message = message.into();
        match variant {
            Variant::Error => tracing::error!(toast = %message),
            Variant::Warn => tracing::warn!(toast = %message),
            Variant::Info | Variant::Success => tracing::info!(toast = %message),
        }
        self.current = Some(Toast {
            message,
            variant,
            shown_at: self.clock.now(),
            duration,
        });
    }

    pub fn info(&mut self, message: impl Into<String>) {
        self.show(message, Variant::Info);
    }

    pub fn success(&mut self, message: impl Into<String>) {
        self.show(message, Variant::Success);
    }

    pub fn warn(&mut self, message: impl Into<String>) {
        self.show(message, Variant::Warn);
    }

    pub fn error(&mut self, message: impl Into<String>) {
        self.show(message, Variant::Error);
    }

    /// The toast on screen, if any, with its phase.
    pub fn current(&self) -> Option<(&Toast, Phase)> {
        let toast = self.current.as_ref()?;
        let elapsed = self.clock.now().saturating_duration_since(toast.shown_at);
        if elapsed < toast.duration {
            Some((toast, Phase::Visible))
        } else if elapsed < toast.duration + FADE_OUT {
            Some((toast, Phase::Fading))
        } else {
            None
        }
    }

    pub fn dismiss(&mut self) {
        self.current = None;
    }
}
