use std::collections::{HashMap, HashSet};

use rand::Rng;

use crate::cluster::ClusterStructure;
use crate::config::{ClusterConfig, LifecycleParams};
use crate::constants::ENTRY_PLACEMENT_ATTEMPTS;
use crate::events::{LifecycleEvent, TagSnapshot};
use crate::eviction::EvictionPolicy;
use crate::record::TokenRecord;
use crate::tag::{RemovalReason, Tag, TagId, TagSource};
use crate::vector::Vec3;

/// Outcome of diffing one provider batch against the registry.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct ReconcileReport {
    pub added: Vec<TagId>,
    pub removed: Vec<TagId>,
    pub unchanged: usize,
    /// Keys displaced by capacity that stay out while the registry is full.
    pub held_back: usize,
}

/// Owns every tag, live or exiting, in insertion order.
///
/// Exiting (pending) tags stay here until `expire_exited` or `destroy` drops
/// them, but they are skipped by capacity counting, name lookup and the
/// force pass. Lifecycle transitions are queued in an outbox that the owner
/// drains once per frame.
#[derive(Debug)]
pub struct TagRegistry {
    tags: Vec<Tag>,
    index: HashMap<TagId, usize>,
    max_capacity: usize,
    policy: EvictionPolicy,
    clock: f64,
    next_seq: u64,
    events: Vec<LifecycleEvent>,
    /// Keys of tags evicted for capacity. Reconcile keeps them out until
    /// room frees up or the provider stops sending them.
    evicted_keys: HashSet<String>,
}

impl TagRegistry {
    pub fn new(max_capacity: usize, policy: EvictionPolicy) -> Self {
        Self {
            tags: Vec::new(),
            index: HashMap::new(),
            max_capacity,
            policy,
            clock: 0.0,
            next_seq: 0,
            events: Vec::new(),
            evicted_keys: HashSet::new(),
        }
    }

    pub fn from_config(config: &ClusterConfig) -> Self {
        Self::new(
            config.max_capacity,
            EvictionPolicy::new(config.protected_sources.clone()),
        )
    }

    /// Engine clock in seconds. Stamped onto new tags and removal requests.
    pub fn clock(&self) -> f64 {
        self.clock
    }

    pub fn advance_clock(&mut self, dt: f64) {
        if dt.is_finite() && dt > 0.0 {
            self.clock += dt;
        }
    }

    pub fn max_capacity(&self) -> usize {
        self.max_capacity
    }

    pub fn policy(&self) -> &EvictionPolicy {
        &self.policy
    }

    /// Build a tag stamped with the current clock. Does not insert it.
    pub fn create_tag(
        &self,
        key: &str,
        display_name: &str,
        size: f64,
        position: Vec3,
        source: TagSource,
        rng: &mut impl Rng,
    ) -> Tag {
        let mut tag = Tag::new(
            Tag::generate_id(rng),
            key,
            display_name,
            size,
            position,
            source,
        );
        tag.created_at = self.clock;
        tag
    }

    /// Insert a tag, then evict down to capacity.
    ///
    /// Returns `None` without side effects if the id is already present or a
    /// live tag already holds the same key. The tag's `created_at` is kept as
    /// given; its insertion sequence is assigned here.
    pub fn add(&mut self, mut tag: Tag) -> Option<TagId> {
        if self.index.contains_key(&tag.id) || self.live_key_exists(&tag.key) {
            return None;
        }

        tag.insertion_seq = self.next_seq;
        self.next_seq += 1;

        let id = tag.id;
        self.events.push(LifecycleEvent::Entered {
            id,
            name: tag.display_name.clone(),
            position: tag.position,
            size: tag.current_size,
            source: tag.source,
        });
        self.index.insert(id, self.tags.len());
        self.tags.push(tag);

        self.enforce_capacity();
        Some(id)
    }

    /// Flag a tag for exit. It leaves the force pass immediately and is
    /// destroyed once its exit window elapses.
    ///
    /// Returns false for unknown ids and for tags that are already exiting.
    pub fn remove(&mut self, id: TagId) -> bool {
        self.remove_with_reason(id, RemovalReason::Requested)
    }

    pub(crate) fn remove_with_reason(&mut self, id: TagId, reason: RemovalReason) -> bool {
        let now = self.clock;
        let Some(tag) = self.get_mut(id) else {
            return false;
        };
        if tag.pending_removal {
            return false;
        }
        tag.mark_pending(now, reason);
        self.events.push(LifecycleEvent::Exiting { id, reason });
        true
    }

    /// Drop a tag from the registry right away, skipping the exit window.
    pub fn destroy(&mut self, id: TagId) -> bool {
        let Some(idx) = self.index.get(&id).copied() else {
            return false;
        };
        let tag = self.tags.remove(idx);
        if !tag.pending_removal {
            self.events.push(LifecycleEvent::Exiting {
                id,
                reason: RemovalReason::Requested,
            });
        }
        self.events.push(LifecycleEvent::Removed { id });
        self.reindex();
        true
    }

    /// Destroy every exiting tag whose exit window has elapsed.
    pub fn expire_exited(&mut self, exit_duration: f64) -> Vec<TagId> {
        let now = self.clock;
        let expired: Vec<TagId> = self
            .tags
            .iter()
            .filter(|t| t.exit_elapsed(now).is_some_and(|e| e >= exit_duration))
            .map(|t| t.id)
            .collect();
        if expired.is_empty() {
            return expired;
        }

        let gone: HashSet<TagId> = expired.iter().copied().collect();
        self.tags.retain(|t| !gone.contains(&t.id));
        for id in &expired {
            self.events.push(LifecycleEvent::Removed { id: *id });
        }
        self.reindex();
        tracing::debug!("expired {} exited tags", expired.len());
        expired
    }

    /// Evict until the live count is back within capacity.
    pub fn enforce_capacity(&mut self) -> Vec<TagId> {
        let mut evicted = Vec::new();
        while let Some(victim) = self.policy.select_for_eviction(self, self.max_capacity) {
            if !self.remove_with_reason(victim, RemovalReason::Evicted) {
                break;
            }
            if let Some(tag) = self.get(victim) {
                let key = tag.key.clone();
                self.evicted_keys.insert(key);
            }
            tracing::debug!("evicted tag {victim} (capacity {})", self.max_capacity);
            evicted.push(victim);
        }
        evicted
    }

    /// Diff a provider batch against the live set.
    ///
    /// Non-user tags whose key is missing from the batch are removed as stale;
    /// unseen keys become new tags at an off-cluster entry position; keys
    /// already live are left alone. Within one batch the first record for a
    /// key wins.
    ///
    /// Keys evicted for capacity are held back while the registry is full, so
    /// re-delivering an over-capacity batch does not churn the cluster.
    pub fn reconcile(
        &mut self,
        records: &[TokenRecord],
        cluster: &ClusterStructure,
        config: &ClusterConfig,
        rng: &mut impl Rng,
    ) -> ReconcileReport {
        let mut report = ReconcileReport::default();
        let batch_keys: HashSet<&str> = records.iter().map(|r| r.identity.as_str()).collect();

        let stale: Vec<TagId> = self
            .live()
            .filter(|t| t.source != TagSource::User && !batch_keys.contains(t.key.as_str()))
            .map(|t| t.id)
            .collect();
        for id in stale {
            if self.remove_with_reason(id, RemovalReason::Stale) {
                report.removed.push(id);
            }
        }

        self.evicted_keys
            .retain(|k| batch_keys.contains(k.as_str()));

        let mut seen: HashSet<&str> = HashSet::new();
        for record in records {
            if !seen.insert(record.identity.as_str()) {
                continue;
            }
            if self.live_key_exists(&record.identity) {
                report.unchanged += 1;
                continue;
            }
            if self.evicted_keys.contains(&record.identity)
                && self.live_count() >= self.max_capacity
            {
                report.held_back += 1;
                continue;
            }
            let size = config.sizing.size_for_hint(record.size_hint);
            let position = self.entry_position(cluster, &config.lifecycle, size, rng);
            let tag = self.create_tag(
                &record.identity,
                &record.display_symbol,
                size,
                position,
                record.source,
                rng,
            );
            if let Some(id) = self.add(tag) {
                if self.get(id).is_some_and(Tag::is_live) {
                    self.evicted_keys.remove(&record.identity);
                }
                report.added.push(id);
            }
        }

        tracing::debug!(
            "reconciled batch of {}: +{} -{} ={} held={}",
            records.len(),
            report.added.len(),
            report.removed.len(),
            report.unchanged,
            report.held_back
        );
        report
    }

    /// Pick a spawn point outside the cluster so a new tag visibly flies in.
    ///
    /// Distance from center is at least `min_entry_distance`. Directions that
    /// would land on an existing tag are redrawn; if every draw collides the
    /// distance is pushed outward and the search repeats.
    pub fn entry_position(
        &self,
        cluster: &ClusterStructure,
        lifecycle: &LifecycleParams,
        size: f64,
        rng: &mut impl Rng,
    ) -> Vec3 {
        let center = cluster.center();
        let mut distance = (cluster.extent() * lifecycle.entry_distance_factor)
            .max(lifecycle.min_entry_distance);

        let mut candidate = center + Vec3::random_unit(rng) * distance;
        for _ in 0..8 {
            for _ in 0..ENTRY_PLACEMENT_ATTEMPTS {
                if self.is_clear(candidate, size) {
                    return candidate;
                }
                candidate = center + Vec3::random_unit(rng) * distance;
            }
            distance *= 1.5;
            candidate = center + Vec3::random_unit(rng) * distance;
        }
        candidate
    }

    fn is_clear(&self, point: Vec3, size: f64) -> bool {
        self.tags
            .iter()
            .all(|t| t.position.distance(point) >= 0.5 * (size + t.current_size))
    }

    pub fn get(&self, id: TagId) -> Option<&Tag> {
        self.index.get(&id).map(|&i| &self.tags[i])
    }

    pub fn get_mut(&mut self, id: TagId) -> Option<&mut Tag> {
        match self.index.get(&id) {
            Some(&i) => Some(&mut self.tags[i]),
            None => None,
        }
    }

    pub fn contains(&self, id: TagId) -> bool {
        self.index.contains_key(&id)
    }

    /// Case-insensitive lookup among live tags.
    pub fn get_by_name(&self, name: &str) -> Option<&Tag> {
        let needle = name.trim().to_lowercase();
        self.live()
            .find(|t| t.display_name.to_lowercase() == needle)
    }

    /// Total tags held, including exiting ones.
    pub fn len(&self) -> usize {
        self.tags.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tags.is_empty()
    }

    pub fn live_count(&self) -> usize {
        self.tags.iter().filter(|t| t.is_live()).count()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Tag> {
        self.tags.iter()
    }

    pub fn live(&self) -> impl Iterator<Item = &Tag> {
        self.tags.iter().filter(|t| t.is_live())
    }

    /// All tags as one slice, for the force solver and animator.
    pub fn tags_mut(&mut self) -> &mut [Tag] {
        &mut self.tags
    }

    pub fn snapshot(&self) -> Vec<TagSnapshot> {
        self.tags.iter().map(TagSnapshot::from).collect()
    }

    pub fn drain_events(&mut self) -> Vec<LifecycleEvent> {
        std::mem::take(&mut self.events)
    }

    pub(crate) fn emit(&mut self, event: LifecycleEvent) {
        self.events.push(event);
    }

    fn live_key_exists(&self, key: &str) -> bool {
        self.live().any(|t| t.key == key)
    }

    fn reindex(&mut self) {
        self.index.clear();
        for (i, tag) in self.tags.iter().enumerate() {
            self.index.insert(tag.id, i);
        }
    }
}
