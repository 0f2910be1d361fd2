//! Outbound interface to the renderer and UI layers.
//!
//! The engine only ever pushes these values outward. It holds no reference
//! to whoever consumes them.

use serde::{Deserialize, Serialize};

use crate::tag::{RemovalReason, Tag, TagId, TagSource};
use crate::vector::Vec3;

/// Discrete lifecycle transitions, in the order they happened.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "lowercase")]
pub enum LifecycleEvent {
    Entered {
        id: TagId,
        name: String,
        position: Vec3,
        size: f64,
        source: TagSource,
    },
    Resized {
        id: TagId,
        from: f64,
        to: f64,
    },
    Exiting {
        id: TagId,
        reason: RemovalReason,
    },
    Removed {
        id: TagId,
    },
}

impl LifecycleEvent {
    pub fn id(&self) -> TagId {
        match self {
            Self::Entered { id, .. }
            | Self::Resized { id, .. }
            | Self::Exiting { id, .. }
            | Self::Removed { id } => *id,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Entered { .. } => "entered",
            Self::Resized { .. } => "resized",
            Self::Exiting { .. } => "exiting",
            Self::Removed { .. } => "removed",
        }
    }
}

/// Read-only per-frame view of one tag.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TagSnapshot {
    pub id: TagId,
    pub name: String,
    pub position: Vec3,
    pub size: f64,
    pub source: TagSource,
    pub exiting: bool,
}

impl From<&Tag> for TagSnapshot {
    fn from(tag: &Tag) -> Self {
        Self {
            id: tag.id,
            name: tag.display_name.clone(),
            position: tag.position,
            size: tag.current_size,
            source: tag.source,
            exiting: tag.pending_removal,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn test_event_json_is_tagged() {
        let ev = LifecycleEvent::Exiting {
            id: Uuid::nil(),
            reason: RemovalReason::Evicted,
        };
        let json = serde_json::to_string(&ev).unwrap();
        assert!(json.contains(r#""event":"exiting""#), "{json}");
        assert!(json.contains(r#""reason":"evicted""#), "{json}");
    }

    #[test]
    fn test_kind_and_id() {
        let id = Uuid::from_u128(9);
        let ev = LifecycleEvent::Resized {
            id,
            from: 1.0,
            to: 2.0,
        };
        assert_eq!(ev.kind(), "resized");
        assert_eq!(ev.id(), id);
    }

    #[test]
    fn test_snapshot_from_tag() {
        let mut tag = Tag::new(
            Uuid::from_u128(1),
            "eth",
            "ETH",
            1.5,
            Vec3::new(1.0, 2.0, 3.0),
            TagSource::Provider,
        );
        tag.pending_removal = true;
        let snap = TagSnapshot::from(&tag);
        assert_eq!(snap.name, "ETH");
        assert_eq!(snap.size, 1.5);
        assert!(snap.exiting);
    }
}
