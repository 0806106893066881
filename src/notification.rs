//! Notification System
//!
//! Collects user-facing notifications (mutation results and reported query
//! failures) with toast messages and a bounded history.

use crate::api::NormalizedError;
use crate::config::NotificationConfig;
use crate::query::{ErrorMeta, ErrorReporter};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};
use uuid::Uuid;

/// Level of detail for notifications
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DetailLevel {
    /// Minimal: status icon + title
    Minimal,
    /// Detailed: title + message
    #[default]
    Detailed,
    /// Verbose: all info including error details and hints
    Verbose,
}

impl DetailLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Minimal => "minimal",
            Self::Detailed => "detailed",
            Self::Verbose => "verbose",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationLevel {
    Success,
    Error,
}

impl NotificationLevel {
    pub fn icon(&self) -> &'static str {
        match self {
            Self::Success => "✓",
            Self::Error => "✗",
        }
    }
}

/// A single notification
#[derive(Debug, Clone)]
pub struct Notification {
    pub id: Uuid,
    pub level: NotificationLevel,
    pub title: String,
    pub message: String,
    pub details: Option<String>,
    pub hint: Option<&'static str>,
    pub created_at: Instant,
}

impl Notification {
    pub fn new(level: NotificationLevel, title: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            level,
            title: title.into(),
            message: message.into(),
            details: None,
            hint: None,
            created_at: Instant::now(),
        }
    }

    /// Build an error notification from a reported failure
    pub fn from_error(meta: &ErrorMeta, error: &NormalizedError) -> Self {
        let mut notification = Self::new(NotificationLevel::Error, meta.title.clone(), meta.message.clone());
        notification.details = Some(match error.details() {
            Some(details) if details != error.message() => format!("{}: {}", error.message(), details),
            _ => error.message().to_string(),
        });
        notification.hint = error.hint();
        notification
    }

    /// Format notification for toast display (short form)
    pub fn toast_message(&self, detail_level: DetailLevel) -> String {
        let icon = self.level.icon();

        match detail_level {
            DetailLevel::Minimal => format!("{} {}", icon, self.title),
            DetailLevel::Detailed => format!("{} {}: {}", icon, self.title, self.message),
            DetailLevel::Verbose => {
                let mut text = format!("{} {}: {}", icon, self.title, self.message);
                if let Some(details) = &self.details {
                    text.push_str(" - ");
                    text.push_str(details);
                }
                if let Some(hint) = self.hint {
                    text.push_str(&format!(" ({})", hint));
                }
                text
            },
        }
    }
}

#[derive(Debug, Default)]
struct History {
    /// All notifications (recent first)
    notifications: VecDeque<Notification>,
    last_toast_time: Option<Instant>,
}

/// Notification manager
///
/// Shared between the query client (as its [`ErrorReporter`]) and the
/// consumer displaying toasts, hence the interior mutability.
#[derive(Debug)]
pub struct NotificationManager {
    history: Mutex<History>,
    /// Maximum notifications to keep in history
    pub max_history: usize,
    /// Toast display duration
    pub toast_duration: Duration,
    /// Detail level for display
    pub detail_level: DetailLevel,
}

impl Default for NotificationManager {
    fn default() -> Self {
        Self::new()
    }
}

impl NotificationManager {
    pub fn new() -> Self {
        Self::from_config(&NotificationConfig::default())
    }

    pub fn from_config(config: &NotificationConfig) -> Self {
        Self {
            history: Mutex::new(History::default()),
            max_history: config.max_history,
            toast_duration: Duration::from_secs(config.toast_duration_secs),
            detail_level: config.detail_level,
        }
    }

    fn history(&self) -> MutexGuard<'_, History> {
        self.history.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Record a notification and show it as the current toast
    pub fn push(&self, notification: Notification) -> Uuid {
        let id = notification.id;
        let mut history = self.history();
        history.notifications.push_front(notification);
        history.last_toast_time = Some(Instant::now());
        history.notifications.truncate(self.max_history);
        id
    }

    pub fn success(&self, title: impl Into<String>, message: impl Into<String>) -> Uuid {
        self.push(Notification::new(NotificationLevel::Success, title, message))
    }

    /// Get notification by ID
    pub fn get(&self, id: Uuid) -> Option<Notification> {
        self.history().notifications.iter().find(|n| n.id == id).cloned()
    }

    /// Notifications, most recent first
    pub fn recent(&self) -> Vec<Notification> {
        self.history().notifications.iter().cloned().collect()
    }

    /// Get the most recent notification while its toast is visible
    pub fn current_toast(&self) -> Option<Notification> {
        let history = self.history();
        let last_time = history.last_toast_time?;
        if last_time.elapsed() > self.toast_duration {
            return None;
        }
        history.notifications.front().cloned()
    }

    /// Toast text of the current notification at the configured detail level
    pub fn current_toast_message(&self) -> Option<String> {
        self.current_toast()
            .map(|notification| notification.toast_message(self.detail_level))
    }

    pub fn error_count(&self) -> usize {
        self.history()
            .notifications
            .iter()
            .filter(|n| n.level == NotificationLevel::Error)
            .count()
    }

    /// Check if there are any notifications to show
    pub fn has_notifications(&self) -> bool {
        !self.history().notifications.is_empty()
    }

    /// Clear all notifications
    pub fn clear(&self) {
        let mut history = self.history();
        history.notifications.clear();
        history.last_toast_time = None;
    }
}

impl ErrorReporter for NotificationManager {
    fn report(&self, meta: &ErrorMeta, error: &NormalizedError) {
        tracing::error!(title = %meta.title, "{}: {}", meta.message, error);
        self.push(Notification::from_error(meta, error));
    }
}
