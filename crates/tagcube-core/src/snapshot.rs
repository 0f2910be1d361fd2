//! JSON frame export for renderers and offline inspection.
//!
//! The wire format uses camelCase field names and stores vectors as
//! `[x, y, z]` arrays.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::constants::FRAME_FORMAT_VERSION;
use crate::engine::TagCluster;
use crate::events::TagSnapshot;
use crate::tag::TagSource;
use crate::vector::Vec3;

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct WireFrame {
    pub version: String,
    pub frame: u64,
    pub clock: f64,
    pub center: [f64; 3],
    pub extent: f64,
    pub tags: Vec<WireTag>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct WireTag {
    pub id: String,
    #[serde(rename = "displayName")]
    pub display_name: String,
    pub position: [f64; 3],
    pub size: f64,
    #[serde(rename = "sourceTag", default)]
    pub source: TagSource,
    #[serde(default)]
    pub exiting: bool,
}

impl From<&TagSnapshot> for WireTag {
    fn from(s: &TagSnapshot) -> Self {
        Self {
            id: s.id.to_string(),
            display_name: s.name.clone(),
            position: s.position.to_array(),
            size: s.size,
            source: s.source,
            exiting: s.exiting,
        }
    }
}

impl WireTag {
    /// Back to a snapshot. Malformed ids map to nil.
    pub fn to_snapshot(&self) -> TagSnapshot {
        TagSnapshot {
            id: Uuid::parse_str(&self.id).unwrap_or(Uuid::nil()),
            name: self.display_name.clone(),
            position: Vec3::from_array(self.position),
            size: self.size,
            source: self.source,
            exiting: self.exiting,
        }
    }
}

impl WireFrame {
    pub fn from_cluster(engine: &TagCluster) -> Self {
        let cluster = engine.cluster();
        Self {
            version: FRAME_FORMAT_VERSION.to_string(),
            frame: engine.frame(),
            clock: engine.clock(),
            center: cluster.center().to_array(),
            extent: cluster.extent(),
            tags: engine.snapshot().iter().map(WireTag::from).collect(),
        }
    }
}

/// Serialize the current frame to pretty JSON.
pub fn export_frame_json(engine: &TagCluster) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(&WireFrame::from_cluster(engine))
}

pub fn import_frame_json(json: &str) -> Result<WireFrame, serde_json::Error> {
    serde_json::from_str(json)
}
