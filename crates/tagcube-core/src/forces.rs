//! Per-frame force pass: pairwise repulsion, cohesion toward the cluster
//! center, then semi-implicit integration with friction.
//!
//! Every pass works on the slice it is given and considers only the tags
//! that were live when the pass started. Accelerations are computed from a
//! snapshot of positions and applied afterwards, so the result does not
//! depend on iteration order.

use crate::cluster::ClusterStructure;
use crate::config::PhysicsParams;
use crate::constants::{MIN_SEPARATION, REFERENCE_DT};
use crate::tag::{Aabb, Tag};
use crate::vector::Vec3;

/// Summary of one `step`.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct StepReport {
    pub overlapping_pairs: usize,
    /// Live tags that sat outside the extent shell this frame.
    pub outliers: usize,
    /// Tags whose integration produced non-finite state and were reset.
    pub recovered: usize,
    pub kinetic_energy: f64,
}

#[derive(Clone, Debug)]
pub struct ForceSolver {
    params: PhysicsParams,
    exit_acceleration: f64,
}

struct Body {
    idx: usize,
    bounds: Aabb,
    mass: f64,
}

impl ForceSolver {
    pub fn new(params: PhysicsParams, exit_acceleration: f64) -> Self {
        Self {
            params,
            exit_acceleration,
        }
    }

    pub fn params(&self) -> &PhysicsParams {
        &self.params
    }

    /// Push overlapping live pairs apart. Returns the number of overlapping pairs.
    ///
    /// Force grows with overlap depth and with the inverse of the center
    /// distance, capped at `max_repulsion`; each side accelerates by
    /// force / mass, so heavier tags move less.
    pub fn apply_repulsion_forces(&self, tags: &mut [Tag], dt: f64) -> usize {
        if !valid_dt(dt) {
            return 0;
        }

        let bodies: Vec<Body> = tags
            .iter()
            .enumerate()
            .filter(|(_, t)| t.is_live())
            .map(|(idx, t)| Body {
                idx,
                bounds: t.bounds(self.params.padding),
                mass: t.mass(),
            })
            .collect();

        let n = bodies.len();
        let mut accel = vec![Vec3::ZERO; n];
        let mut pairs = 0usize;

        for a in 0..n {
            for b in (a + 1)..n {
                let (ba, bb) = (&bodies[a], &bodies[b]);
                if !ba.bounds.overlaps(&bb.bounds) {
                    continue;
                }

                let reach = ba.bounds.half_extent + bb.bounds.half_extent;
                let delta = bb.bounds.center - ba.bounds.center;
                let dist = delta.length();
                if dist >= reach {
                    continue;
                }
                pairs += 1;

                let normal = if dist > MIN_SEPARATION {
                    delta * (1.0 / dist)
                } else {
                    fallback_normal(ba.idx, bb.idx)
                };
                let overlap = reach - dist;
                let falloff = reach / dist.max(MIN_SEPARATION);
                let force = (self.params.stiffness * overlap * falloff).min(self.params.max_repulsion);

                accel[a] -= normal * (force / ba.mass);
                accel[b] += normal * (force / bb.mass);
            }
        }

        for (body, acc) in bodies.iter().zip(accel) {
            let dv = acc * dt;
            if dv.is_finite() {
                tags[body.idx].velocity += dv;
            }
        }
        pairs
    }

    /// Pull live tags toward the cluster center. Returns how many sat
    /// outside the extent shell.
    ///
    /// Outside the shell the pull is proportional to the excess distance,
    /// capped at `max_cohesion_accel`. Inside it only the weak `core_pull`
    /// applies. A tag is marked settled the first time it is inside.
    pub fn apply_cohesion_forces(&self, tags: &mut [Tag], cluster: &ClusterStructure, dt: f64) -> usize {
        if !valid_dt(dt) {
            return 0;
        }
        let center = cluster.center();
        let extent = cluster.extent();
        let mut outliers = 0usize;

        for tag in tags.iter_mut().filter(|t| t.is_live()) {
            let to_center = center - tag.position;
            let dist = to_center.length();
            if dist < MIN_SEPARATION {
                tag.settled = true;
                continue;
            }
            let dir = to_center * (1.0 / dist);

            let excess = dist - extent;
            let accel = if excess > 0.0 {
                outliers += 1;
                (self.params.cohesion_strength * excess).min(self.params.max_cohesion_accel)
            } else {
                tag.settled = true;
                self.params.core_pull * dist
            };

            let dv = dir * (accel * dt);
            if dv.is_finite() {
                tag.velocity += dv;
            }
        }
        outliers
    }

    /// Move live tags by their velocity, then apply friction.
    /// Returns how many tags had to be reset to recover from non-finite state.
    pub fn integrate(&self, tags: &mut [Tag], dt: f64) -> usize {
        if !valid_dt(dt) {
            return 0;
        }
        let damping = self.params.friction.powf(dt / REFERENCE_DT);
        let mut recovered = 0usize;

        for tag in tags.iter_mut().filter(|t| t.is_live()) {
            let velocity = tag.velocity.clamp_length(self.params.max_speed);
            let position = tag.position + velocity * dt;
            let velocity = velocity * damping;

            if position.is_finite() && velocity.is_finite() {
                tag.position = position;
                tag.velocity = velocity;
            } else {
                tracing::warn!(
                    "non-finite state on tag {} ({}); resetting velocity",
                    tag.id,
                    tag.display_name
                );
                tag.velocity = Vec3::ZERO;
                if !tag.position.is_finite() {
                    tag.position = Vec3::ZERO;
                }
                recovered += 1;
            }
            tag.is_new = false;
        }
        recovered
    }

    /// Fly exiting tags outward from the center. They never interact with
    /// live tags.
    pub fn advance_exiting(&self, tags: &mut [Tag], cluster: &ClusterStructure, dt: f64) {
        if !valid_dt(dt) {
            return;
        }
        let center = cluster.center();
        for tag in tags.iter_mut().filter(|t| !t.is_live()) {
            let outward = (tag.position - center)
                .try_normalize()
                .unwrap_or_else(|| Vec3::spiral_direction(tag.insertion_seq));
            let velocity = tag.velocity + outward * (self.exit_acceleration * dt);
            let position = tag.position + velocity * dt;
            if position.is_finite() && velocity.is_finite() {
                tag.velocity = velocity;
                tag.position = position;
            } else {
                tag.velocity = Vec3::ZERO;
            }
        }
    }

    /// Repulsion → cohesion → integration over one fixed slice.
    pub fn step(&self, tags: &mut [Tag], cluster: &ClusterStructure, dt: f64) -> StepReport {
        let overlapping_pairs = self.apply_repulsion_forces(tags, dt);
        let outliers = self.apply_cohesion_forces(tags, cluster, dt);
        let recovered = self.integrate(tags, dt);
        StepReport {
            overlapping_pairs,
            outliers,
            recovered,
            kinetic_energy: kinetic_energy(tags),
        }
    }
}

/// Σ ½ m v² over live tags.
pub fn kinetic_energy(tags: &[Tag]) -> f64 {
    tags.iter()
        .filter(|t| t.is_live())
        .map(|t| 0.5 * t.mass() * t.velocity.length_squared())
        .sum()
}

/// Separation direction for coincident tags, deterministic per pair.
fn fallback_normal(a: usize, b: usize) -> Vec3 {
    Vec3::spiral_direction((a as u64).wrapping_mul(31).wrapping_add(b as u64))
}

fn valid_dt(dt: f64) -> bool {
    dt.is_finite() && dt > 0.0
}
