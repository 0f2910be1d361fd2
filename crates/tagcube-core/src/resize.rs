use serde::{Deserialize, Serialize};

use crate::config::{ResizeParams, SizingParams};
use crate::constants::{EPSILON, MIN_TAG_SIZE, PROGRESS_EPSILON};
use crate::events::LifecycleEvent;
use crate::registry::TagRegistry;
use crate::tag::{Tag, TagId};

/// Easing curve applied to resize progress.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Easing {
    Linear,
    EaseOutCubic,
    #[default]
    EaseInOutCubic,
}

impl Easing {
    /// Maps [0, 1] onto [0, 1], monotonically, with fixed endpoints.
    pub fn apply(self, t: f64) -> f64 {
        let t = t.clamp(0.0, 1.0);
        match self {
            Self::Linear => t,
            Self::EaseOutCubic => 1.0 - (1.0 - t).powi(3),
            Self::EaseInOutCubic => {
                if t < 0.5 {
                    4.0 * t * t * t
                } else {
                    1.0 - (-2.0 * t + 2.0).powi(3) / 2.0
                }
            }
        }
    }
}

/// Where a tag's resize animation stands after an `advance`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ResizeState {
    Idle,
    Active,
    /// Reached the target on this step.
    Completed,
}

/// Drives smooth size transitions. Mass is never stored: every step sets
/// `current_size`, and `Tag::mass` follows from it, so the force pass sees
/// the growing or shrinking mass continuously.
#[derive(Clone, Debug)]
pub struct ResizeAnimator {
    params: ResizeParams,
    sizing: SizingParams,
}

impl ResizeAnimator {
    pub fn new(params: ResizeParams, sizing: SizingParams) -> Self {
        Self { params, sizing }
    }

    /// Start animating `id` toward `target_size` from its current size.
    ///
    /// Returns false, changing nothing, for unknown or exiting tags and for
    /// non-finite or non-positive targets. Targets are clamped to the
    /// configured size range. Asking for the size the tag already has stops
    /// any running animation there and emits nothing.
    pub fn request_resize(&self, registry: &mut TagRegistry, id: TagId, target_size: f64) -> bool {
        if !target_size.is_finite() || target_size <= 0.0 {
            return false;
        }
        let target = self.sizing.clamp(target_size).max(MIN_TAG_SIZE);
        let Some(tag) = registry.get_mut(id) else {
            return false;
        };
        if tag.pending_removal {
            return false;
        }

        let from = tag.current_size;
        if (target - from).abs() < EPSILON {
            tag.abort_resize();
            return true;
        }
        Self::begin(tag, target);
        registry.emit(LifecycleEvent::Resized {
            id,
            from,
            to: target,
        });
        true
    }

    fn begin(tag: &mut Tag, target: f64) {
        tag.resize_start_size = tag.current_size;
        tag.target_size = target;
        tag.transition_progress = 0.0;
        tag.resize_active = true;
    }

    /// Advance one tag's animation by `dt` seconds.
    pub fn advance(&self, tag: &mut Tag, dt: f64) -> ResizeState {
        if !tag.resize_active {
            return ResizeState::Idle;
        }
        if tag.pending_removal {
            tag.abort_resize();
            return ResizeState::Idle;
        }
        if !dt.is_finite() || dt <= 0.0 {
            return ResizeState::Active;
        }

        let progress = (tag.transition_progress + dt / self.params.duration).clamp(0.0, 1.0);
        tag.transition_progress = progress.max(tag.transition_progress);

        if tag.transition_progress >= 1.0 - PROGRESS_EPSILON {
            tag.current_size = tag.target_size;
            tag.resize_start_size = tag.target_size;
            tag.transition_progress = 1.0;
            tag.resize_active = false;
            return ResizeState::Completed;
        }

        let eased = self.params.easing.apply(tag.transition_progress);
        let size = tag.resize_start_size + (tag.target_size - tag.resize_start_size) * eased;
        tag.current_size = size.max(MIN_TAG_SIZE);
        ResizeState::Active
    }

    /// Advance every live tag. Returns the ids that finished this step.
    pub fn advance_all(&self, tags: &mut [Tag], dt: f64) -> Vec<TagId> {
        tags.iter_mut()
            .filter_map(|t| match self.advance(t, dt) {
                ResizeState::Completed => Some(t.id),
                _ => None,
            })
            .collect()
    }
}
