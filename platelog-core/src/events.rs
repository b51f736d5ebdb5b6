//! Notifications emitted to the presentation layer.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Fired after the engine finishes a whole operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ChangeEvent {
    /// Something in the recent list may have changed; re-read it.
    EntriesChanged,
    /// A dish was deleted; views showing it should close.
    DishDeleted { id: Uuid },
}

/// Process lifecycle checkpoints that trigger a resynchronization.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleEvent {
    EnteringBackground,
    Terminating,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_change_event_json() {
        let id = Uuid::nil();
        let json = serde_json::to_string(&ChangeEvent::DishDeleted { id }).unwrap();
        assert_eq!(
            json,
            r#"{"event":"dish_deleted","id":"00000000-0000-0000-0000-000000000000"}"#
        );
        let json = serde_json::to_string(&ChangeEvent::EntriesChanged).unwrap();
        assert_eq!(json, r#"{"event":"entries_changed"}"#);
    }
}
