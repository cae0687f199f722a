//! Raw lifecycle events as delivered by the OS.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The kind of lifecycle transition a raw event reports.
///
/// Unknown kinds are kept verbatim in [`LifecycleKind::Other`] so they can be
/// logged when the classifier ignores them.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum LifecycleKind {
    /// An application moved to the foreground.
    AppForegroundEntered,
    /// An application moved to the background.
    AppForegroundExited,
    /// The lock screen was dismissed.
    ScreenUnlocked,
    /// Any other transition reported by the OS.
    Other(String),
}

impl LifecycleKind {
    /// Canonical string form used in storage and JSONL imports.
    pub fn as_str(&self) -> &str {
        match self {
            Self::AppForegroundEntered => "app_foreground_entered",
            Self::AppForegroundExited => "app_foreground_exited",
            Self::ScreenUnlocked => "screen_unlocked",
            Self::Other(raw) => raw,
        }
    }
}

impl fmt::Display for LifecycleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl From<&str> for LifecycleKind {
    fn from(s: &str) -> Self {
        match s {
            "app_foreground_entered" | "activity_resumed" => Self::AppForegroundEntered,
            "app_foreground_exited" | "activity_paused" => Self::AppForegroundExited,
            "screen_unlocked" | "keyguard_hidden" => Self::ScreenUnlocked,
            other => Self::Other(other.to_string()),
        }
    }
}

impl Serialize for LifecycleKind {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for LifecycleKind {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Ok(Self::from(s.as_str()))
    }
}

/// A single OS lifecycle event.
///
/// Events are immutable and ordered by delivery, which is not guaranteed to be
/// causal order across subjects.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawLifecycleEvent {
    /// The transition that occurred.
    #[serde(rename = "type")]
    pub kind: LifecycleKind,
    /// Package or application identifier the event refers to.
    #[serde(default)]
    pub subject: String,
    /// Active window/class identifier, when the OS reports one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub class_name: Option<String>,
    /// Human-readable application name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    /// Wall-clock time of the transition.
    pub timestamp: DateTime<Utc>,
}

impl RawLifecycleEvent {
    pub fn new(kind: LifecycleKind, subject: impl Into<String>, timestamp: DateTime<Utc>) -> Self {
        Self {
            kind,
            subject: subject.into(),
            class_name: None,
            label: None,
            timestamp,
        }
    }

    #[must_use]
    pub fn with_class_name(mut self, class_name: impl Into<String>) -> Self {
        self.class_name = Some(class_name.into());
        self
    }

    #[must_use]
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }
}
