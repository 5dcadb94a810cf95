//! Fire-and-forget user notifications.

use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationLevel {
    Success,
    Error,
    Info,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub level: NotificationLevel,
    pub message: String,
    /// Extended display time; `None` means the channel's default.
    pub duration: Option<Duration>,
}

impl Notification {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            level: NotificationLevel::Success,
            message: message.into(),
            duration: None,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            level: NotificationLevel::Error,
            message: message.into(),
            duration: None,
        }
    }

    pub fn info(message: impl Into<String>) -> Self {
        Self {
            level: NotificationLevel::Info,
            message: message.into(),
            duration: None,
        }
    }

    pub fn lasting(mut self, duration: Duration) -> Self {
        self.duration = Some(duration);
        self
    }
}

/// A notification sink. Implementations must not block.
pub trait Notifier: Send + Sync {
    fn notify(&self, notification: Notification);
}

/// Routes notifications into the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn notify(&self, n: Notification) {
        match n.level {
            NotificationLevel::Success | NotificationLevel::Info => {
                tracing::info!(kind = ?n.level, duration = ?n.duration, "{}", n.message)
            }
            NotificationLevel::Error => tracing::warn!(duration = ?n.duration, "{}", n.message),
        }
    }
}

/// Prints notifications to stderr as styled one-liners.
#[derive(Debug, Default, Clone, Copy)]
pub struct ConsoleNotifier;

impl Notifier for ConsoleNotifier {
    fn notify(&self, n: Notification) {
        let marker = match n.level {
            NotificationLevel::Success => console::style("✔").green().bold(),
            NotificationLevel::Error => console::style("✖").red().bold(),
            NotificationLevel::Info => console::style("ℹ").cyan().bold(),
        };
        let message = if n.duration.is_some() {
            console::style(n.message).bold()
        } else {
            console::style(n.message)
        };
        eprintln!("{marker} {message}");
    }
}
