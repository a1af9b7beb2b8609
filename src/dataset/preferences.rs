//! Per-session form preferences.
//!
//! The store never holds these; callers keep them (cookie, client state,
//! desktop window state) and pass them through create and update calls.

use serde::{Deserialize, Serialize};

/// Default system message shown in the form and whether it was user-pinned.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct SessionPreferences {
    /// System message to pre-fill.
    pub system_message: String,
    /// Whether `system_message` is a remembered custom default.
    pub persist: bool,
}

impl SessionPreferences {
    /// Preferences of a fresh session.
    #[must_use]
    pub fn defaults(default_system_message: &str) -> Self {
        Self {
            system_message: default_system_message.to_string(),
            persist: false,
        }
    }

    /// Preferences after a successful create or update.
    ///
    /// With `persist` set, the submitted system message becomes the session
    /// default; otherwise the session falls back to the configured default.
    #[must_use]
    pub fn after_submission(system_message: &str, persist: bool, default_system_message: &str) -> Self {
        if persist {
            Self {
                system_message: system_message.to_string(),
                persist: true,
            }
        } else {
            Self::defaults(default_system_message)
        }
    }

    /// Preferences when opening a stored conversation for editing: a system
    /// message that differs from the default counts as pinned.
    #[must_use]
    pub fn for_edit(system_message: &str, default_system_message: &str) -> Self {
        Self::after_submission(
            system_message,
            system_message != default_system_message,
            default_system_message,
        )
    }
}
