//! Tag-cluster physics engine.
//!
//! Keeps a bounded set of token labels packed into a compact 3D cluster:
//! mass-weighted pairwise repulsion, cohesion toward a damped cluster
//! shell, eased resizing under a volumetric mass law, and diff-based
//! reconciliation against provider batches with capacity eviction.
//!
//! Zero I/O. Everything is driven by [`TagCluster::step`]; rendering and
//! transport live outside this crate.

pub mod cluster;
pub mod config;
pub mod constants;
pub mod engine;
pub mod events;
pub mod eviction;
pub mod forces;
pub mod record;
pub mod registry;
pub mod resize;
pub mod snapshot;
pub mod tag;
pub mod vector;

pub use cluster::ClusterStructure;
pub use config::{
    ClusterConfig, ClusterParams, ConfigError, LifecycleParams, PhysicsParams, ResizeParams,
    SizingParams,
};
pub use constants::{DENSITY, FRAME_FORMAT_VERSION, MIN_SEPARATION, MIN_TAG_SIZE};
pub use engine::{ClusterStats, FrameReport, Mutation, TagCluster};
pub use events::{LifecycleEvent, TagSnapshot};
pub use eviction::EvictionPolicy;
pub use forces::{ForceSolver, StepReport, kinetic_energy};
pub use record::TokenRecord;
pub use registry::{ReconcileReport, TagRegistry};
pub use resize::{Easing, ResizeAnimator, ResizeState};
pub use snapshot::{WireFrame, WireTag, export_frame_json, import_frame_json};
pub use tag::{RemovalReason, Tag, TagId, TagSource, mass_for_size, normalize_key};
pub use vector::Vec3;
