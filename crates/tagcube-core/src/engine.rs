//! Frame-driven engine tying the registry, cluster structure, solver and
//! animator together.
//!
//! All mutations go through [`TagCluster::enqueue`] and are applied at the
//! start of the next [`TagCluster::step`], so a provider callback that fires
//! mid-frame can never change the tag set underneath a force pass.

use std::collections::VecDeque;

use rand::SeedableRng;
use rand::rngs::SmallRng;
use serde::Serialize;

use crate::cluster::ClusterStructure;
use crate::config::{ClusterConfig, ConfigError};
use crate::events::{LifecycleEvent, TagSnapshot};
use crate::forces::{ForceSolver, StepReport};
use crate::record::TokenRecord;
use crate::registry::{ReconcileReport, TagRegistry};
use crate::resize::ResizeAnimator;
use crate::tag::{Tag, TagId, TagSource, normalize_key};

/// A change to the tag set, deferred to the next frame boundary.
#[derive(Clone, Debug, PartialEq)]
pub enum Mutation {
    /// Diff a full provider batch against the live set.
    Reconcile(Vec<TokenRecord>),
    /// Add a user-submitted tag. `size_hint` follows the provider convention.
    AddUser { name: String, size_hint: f64 },
    /// Flag for exit; destroyed after the exit window.
    Remove(TagId),
    RemoveByName(String),
    /// Drop immediately, no exit window.
    Destroy(TagId),
    /// Animate toward an absolute size.
    Resize { id: TagId, target_size: f64 },
}

/// Everything that happened during one `step`.
#[derive(Clone, Debug, Default)]
pub struct FrameReport {
    pub frame: u64,
    /// Engine clock after the step, seconds.
    pub clock: f64,
    pub applied: usize,
    /// Mutations that referenced state that no longer exists.
    pub rejected: usize,
    pub reconciled: Vec<ReconcileReport>,
    pub physics: StepReport,
    pub events: Vec<LifecycleEvent>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct ClusterStats {
    pub frame: u64,
    pub clock: f64,
    pub live: usize,
    pub exiting: usize,
    pub resizing: usize,
    pub extent: f64,
    pub center: [f64; 3],
    pub kinetic_energy: f64,
}

pub struct TagCluster {
    config: ClusterConfig,
    registry: TagRegistry,
    cluster: ClusterStructure,
    solver: ForceSolver,
    animator: ResizeAnimator,
    queue: VecDeque<Mutation>,
    rng: SmallRng,
    frame: u64,
    last_physics: StepReport,
}

impl TagCluster {
    pub fn new(config: ClusterConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let rng = match config.seed {
            Some(seed) => SmallRng::seed_from_u64(seed),
            None => SmallRng::from_os_rng(),
        };
        Ok(Self {
            registry: TagRegistry::from_config(&config),
            cluster: ClusterStructure::new(config.cluster.clone()),
            solver: ForceSolver::new(config.physics.clone(), config.lifecycle.exit_acceleration),
            animator: ResizeAnimator::new(config.resize.clone(), config.sizing.clone()),
            queue: VecDeque::new(),
            rng,
            frame: 0,
            last_physics: StepReport::default(),
            config,
        })
    }

    pub fn config(&self) -> &ClusterConfig {
        &self.config
    }

    pub fn registry(&self) -> &TagRegistry {
        &self.registry
    }

    pub fn cluster(&self) -> &ClusterStructure {
        &self.cluster
    }

    pub fn frame(&self) -> u64 {
        self.frame
    }

    pub fn clock(&self) -> f64 {
        self.registry.clock()
    }

    /// Queue a mutation for the next frame boundary.
    pub fn enqueue(&mut self, mutation: Mutation) {
        self.queue.push_back(mutation);
    }

    pub fn pending_mutations(&self) -> usize {
        self.queue.len()
    }

    /// Advance the simulation by one frame.
    ///
    /// Non-finite or non-positive `dt` skips the frame entirely, queue
    /// included. Larger deltas are clamped to `max_dt`.
    pub fn step(&mut self, dt: f64) -> FrameReport {
        if !dt.is_finite() || dt <= 0.0 {
            tracing::warn!("skipping frame with invalid dt {dt}");
            return FrameReport {
                frame: self.frame,
                clock: self.clock(),
                ..Default::default()
            };
        }
        let dt = dt.min(self.config.max_dt);

        self.frame += 1;
        self.registry.advance_clock(dt);

        let mut report = FrameReport {
            frame: self.frame,
            ..Default::default()
        };
        self.apply_queued(&mut report);

        self.registry.expire_exited(self.config.lifecycle.exit_duration);

        self.cluster.update(self.registry.tags_mut());
        report.physics = self
            .solver
            .step(self.registry.tags_mut(), &self.cluster, dt);
        self.solver
            .advance_exiting(self.registry.tags_mut(), &self.cluster, dt);
        self.animator.advance_all(self.registry.tags_mut(), dt);
        self.cluster.end_frame();

        self.last_physics = report.physics;
        report.clock = self.clock();
        report.events = self.registry.drain_events();
        report
    }

    fn apply_queued(&mut self, report: &mut FrameReport) {
        while let Some(mutation) = self.queue.pop_front() {
            let ok = match mutation {
                Mutation::Reconcile(records) => {
                    let r = self.registry.reconcile(
                        &records,
                        &self.cluster,
                        &self.config,
                        &mut self.rng,
                    );
                    report.reconciled.push(r);
                    true
                }
                Mutation::AddUser { name, size_hint } => self.add_user(&name, size_hint).is_some(),
                Mutation::Remove(id) => self.registry.remove(id),
                Mutation::RemoveByName(name) => match self.registry.get_by_name(&name) {
                    Some(tag) => {
                        let id = tag.id;
                        self.registry.remove(id)
                    }
                    None => false,
                },
                Mutation::Destroy(id) => self.registry.destroy(id),
                Mutation::Resize { id, target_size } => {
                    self.animator
                        .request_resize(&mut self.registry, id, target_size)
                }
            };
            if ok {
                report.applied += 1;
            } else {
                report.rejected += 1;
            }
        }
    }

    fn add_user(&mut self, name: &str, size_hint: f64) -> Option<TagId> {
        let name = name.trim();
        if name.is_empty() {
            return None;
        }
        let size = self.config.sizing.size_for_hint(size_hint);
        let position = self.registry.entry_position(
            &self.cluster,
            &self.config.lifecycle,
            size,
            &mut self.rng,
        );
        let tag = self.registry.create_tag(
            &normalize_key(name),
            name,
            size,
            position,
            TagSource::User,
            &mut self.rng,
        );
        self.registry.add(tag)
    }

    pub fn snapshot(&self) -> Vec<TagSnapshot> {
        self.registry.snapshot()
    }

    pub fn find_by_name(&self, name: &str) -> Option<&Tag> {
        self.registry.get_by_name(name)
    }

    pub fn stats(&self) -> ClusterStats {
        let center = self.cluster.center();
        ClusterStats {
            frame: self.frame,
            clock: self.clock(),
            live: self.registry.live_count(),
            exiting: self.registry.len() - self.registry.live_count(),
            resizing: self.registry.iter().filter(|t| t.resize_active).count(),
            extent: self.cluster.extent(),
            center: center.to_array(),
            kinetic_energy: self.last_physics.kinetic_energy,
        }
    }
}
