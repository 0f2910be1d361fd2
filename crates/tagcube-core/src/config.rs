//! Engine tunables.
//!
//! Every section deserializes with defaults, so a partial TOML file only
//! needs to name the values it overrides. Call [`ClusterConfig::validate`]
//! before handing a config to the engine.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::resize::Easing;
use crate::tag::TagSource;

#[derive(Debug, PartialEq)]
pub enum ConfigError {
    /// A value that must be finite and > 0 was not.
    NotPositive(&'static str),
    /// A factor that must lie in a half-open or closed unit interval did not.
    OutOfRange { field: &'static str, value: f64 },
    /// min/max pair in the wrong order.
    Inverted(&'static str),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::NotPositive(field) => write!(f, "{field} must be finite and > 0"),
            ConfigError::OutOfRange { field, value } => {
                write!(f, "{field} out of range: {value}")
            }
            ConfigError::Inverted(field) => write!(f, "{field}: min exceeds max"),
        }
    }
}

impl std::error::Error for ConfigError {}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PhysicsParams {
    /// Gap kept between neighbouring tags on top of their sizes.
    pub padding: f64,
    pub stiffness: f64,
    /// Cap on a single pair's repulsion force.
    pub max_repulsion: f64,
    /// Inward acceleration per unit of distance beyond the extent shell.
    pub cohesion_strength: f64,
    pub max_cohesion_accel: f64,
    /// Weak inward pull inside the shell; lets the cube compact over time.
    pub core_pull: f64,
    /// Per-step velocity multiplier, strictly below 1.
    pub friction: f64,
    pub max_speed: f64,
}

impl Default for PhysicsParams {
    fn default() -> Self {
        Self {
            padding: 0.15,
            stiffness: 40.0,
            max_repulsion: 400.0,
            cohesion_strength: 12.0,
            max_cohesion_accel: 30.0,
            core_pull: 0.05,
            friction: 0.9,
            max_speed: 25.0,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ClusterParams {
    /// Fraction of the gap to the observed centroid closed per frame.
    pub center_smoothing: f64,
    /// Fraction of the gap closed per frame while the extent grows.
    pub growth_rate: f64,
    /// Fraction of the gap closed per frame while the extent shrinks.
    pub shrink_rate: f64,
    pub min_extent: f64,
    /// Hard bound on how far the extent may move in one frame.
    pub max_extent_step: f64,
    pub mass_weighted_center: bool,
}

impl Default for ClusterParams {
    fn default() -> Self {
        Self {
            center_smoothing: 0.1,
            growth_rate: 0.35,
            shrink_rate: 0.02,
            min_extent: 1.0,
            max_extent_step: 2.0,
            mass_weighted_center: false,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ResizeParams {
    /// Seconds for a full size transition.
    pub duration: f64,
    pub easing: Easing,
}

impl Default for ResizeParams {
    fn default() -> Self {
        Self {
            duration: 0.8,
            easing: Easing::default(),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LifecycleParams {
    /// Seconds an exiting tag stays in the registry before destruction.
    pub exit_duration: f64,
    /// Outward acceleration applied to exiting tags.
    pub exit_acceleration: f64,
    /// New tags enter at this multiple of the current extent.
    pub entry_distance_factor: f64,
    pub min_entry_distance: f64,
}

impl Default for LifecycleParams {
    fn default() -> Self {
        Self {
            exit_duration: 1.2,
            exit_acceleration: 12.0,
            entry_distance_factor: 2.5,
            min_entry_distance: 4.0,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SizingParams {
    /// Size for a size hint of 0.
    pub min_size: f64,
    /// Size for a size hint of 1.
    pub max_size: f64,
}

impl Default for SizingParams {
    fn default() -> Self {
        Self {
            min_size: 0.6,
            max_size: 2.4,
        }
    }
}

impl SizingParams {
    /// Map a normalized hint onto [min_size, max_size].
    /// Non-finite hints land on the midpoint.
    pub fn size_for_hint(&self, hint: f64) -> f64 {
        let t = if hint.is_finite() {
            hint.clamp(0.0, 1.0)
        } else {
            0.5
        };
        self.min_size * (1.0 - t) + self.max_size * t
    }

    pub fn clamp(&self, size: f64) -> f64 {
        size.clamp(self.min_size, self.max_size)
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ClusterConfig {
    /// Live tags allowed before the eviction policy kicks in.
    pub max_capacity: usize,
    /// Larger frame deltas are clamped to this, in seconds.
    pub max_dt: f64,
    /// RNG seed for ids and entry directions. `None` seeds from the OS.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
    /// Sources evicted only after every unprotected tag is gone.
    pub protected_sources: Vec<TagSource>,
    pub physics: PhysicsParams,
    pub cluster: ClusterParams,
    pub resize: ResizeParams,
    pub lifecycle: LifecycleParams,
    pub sizing: SizingParams,
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            max_capacity: 64,
            max_dt: 0.1,
            seed: None,
            protected_sources: vec![TagSource::User],
            physics: PhysicsParams::default(),
            cluster: ClusterParams::default(),
            resize: ResizeParams::default(),
            lifecycle: LifecycleParams::default(),
            sizing: SizingParams::default(),
        }
    }
}

impl ClusterConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_capacity == 0 {
            return Err(ConfigError::NotPositive("max_capacity"));
        }
        positive("max_dt", self.max_dt)?;

        let p = &self.physics;
        non_negative("physics.padding", p.padding)?;
        positive("physics.stiffness", p.stiffness)?;
        positive("physics.max_repulsion", p.max_repulsion)?;
        positive("physics.cohesion_strength", p.cohesion_strength)?;
        positive("physics.max_cohesion_accel", p.max_cohesion_accel)?;
        non_negative("physics.core_pull", p.core_pull)?;
        positive("physics.max_speed", p.max_speed)?;
        if !(p.friction > 0.0 && p.friction < 1.0) {
            return Err(ConfigError::OutOfRange {
                field: "physics.friction",
                value: p.friction,
            });
        }

        let c = &self.cluster;
        unit_interval("cluster.center_smoothing", c.center_smoothing)?;
        unit_interval("cluster.growth_rate", c.growth_rate)?;
        unit_interval("cluster.shrink_rate", c.shrink_rate)?;
        positive("cluster.min_extent", c.min_extent)?;
        positive("cluster.max_extent_step", c.max_extent_step)?;
        if c.shrink_rate > c.growth_rate {
            return Err(ConfigError::OutOfRange {
                field: "cluster.shrink_rate",
                value: c.shrink_rate,
            });
        }

        positive("resize.duration", self.resize.duration)?;

        let l = &self.lifecycle;
        non_negative("lifecycle.exit_duration", l.exit_duration)?;
        non_negative("lifecycle.exit_acceleration", l.exit_acceleration)?;
        positive("lifecycle.entry_distance_factor", l.entry_distance_factor)?;
        positive("lifecycle.min_entry_distance", l.min_entry_distance)?;

        positive("sizing.min_size", self.sizing.min_size)?;
        positive("sizing.max_size", self.sizing.max_size)?;
        if self.sizing.min_size > self.sizing.max_size {
            return Err(ConfigError::Inverted("sizing"));
        }
        Ok(())
    }
}

fn positive(field: &'static str, v: f64) -> Result<(), ConfigError> {
    if v.is_finite() && v > 0.0 {
        Ok(())
    } else {
        Err(ConfigError::NotPositive(field))
    }
}

fn non_negative(field: &'static str, v: f64) -> Result<(), ConfigError> {
    if v.is_finite() && v >= 0.0 {
        Ok(())
    } else {
        Err(ConfigError::OutOfRange { field, value: v })
    }
}

/// (0, 1]
fn unit_interval(field: &'static str, v: f64) -> Result<(), ConfigError> {
    if v > 0.0 && v <= 1.0 {
        Ok(())
    } else {
        Err(ConfigError::OutOfRange { field, value: v })
    }
}
