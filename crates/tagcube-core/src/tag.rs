use rand::Rng;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::constants::{DENSITY, MIN_TAG_SIZE};
use crate::vector::Vec3;

/// Opaque tag identity, assigned at creation.
pub type TagId = Uuid;

/// Where a tag came from. Drives reconciliation ownership and eviction order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum TagSource {
    /// Pushed by the data provider through reconciliation.
    #[default]
    Provider,
    /// Explicitly submitted by a user.
    User,
    /// Seeded demo content.
    Demo,
}

impl TagSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Provider => "provider",
            Self::User => "user",
            Self::Demo => "demo",
        }
    }

    pub fn from_str_lossy(s: &str) -> Self {
        match s {
            "user" => Self::User,
            "demo" => Self::Demo,
            _ => Self::Provider,
        }
    }
}

/// Why a tag left the live set.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RemovalReason {
    /// A caller asked for it.
    Requested,
    /// Its provider record disappeared from the latest batch.
    Stale,
    /// Capacity was exceeded and the eviction policy picked it.
    Evicted,
}

/// Mass under the volumetric law: density × size³.
pub fn mass_for_size(size: f64) -> f64 {
    let s = size.max(MIN_TAG_SIZE);
    DENSITY * s * s * s
}

/// Axis-aligned box around a tag, half-extent per axis.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Aabb {
    pub center: Vec3,
    pub half_extent: f64,
}

impl Aabb {
    pub fn overlaps(&self, other: &Aabb) -> bool {
        let reach = self.half_extent + other.half_extent;
        (self.center.x - other.center.x).abs() < reach
            && (self.center.y - other.center.y).abs() < reach
            && (self.center.z - other.center.z).abs() < reach
    }
}

/// A simulated token label in the cluster.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Tag {
    pub id: TagId,
    /// Provider identity used by reconciliation. User tags use their lowercased name.
    pub key: String,
    pub display_name: String,
    pub source: TagSource,

    pub current_size: f64,
    pub target_size: f64,
    /// Size at the moment the active resize began.
    pub resize_start_size: f64,
    /// 0..=1 while animating, exactly 1 when idle.
    pub transition_progress: f64,
    pub resize_active: bool,

    pub position: Vec3,
    pub velocity: Vec3,

    /// Engine clock at creation, seconds.
    pub created_at: f64,
    /// Registry insertion order; breaks creation-time ties.
    pub insertion_seq: u64,

    pub is_new: bool,
    /// Set once the tag first reaches the cluster shell after entering.
    pub settled: bool,
    pub pending_removal: bool,
    pub removal_requested_at: Option<f64>,
    pub removal_reason: Option<RemovalReason>,
}

impl Tag {
    pub fn new(
        id: TagId,
        key: &str,
        display_name: &str,
        size: f64,
        position: Vec3,
        source: TagSource,
    ) -> Self {
        let size = sanitize_size(size);
        Self {
            id,
            key: key.to_string(),
            display_name: display_name.to_string(),
            source,
            current_size: size,
            target_size: size,
            resize_start_size: size,
            transition_progress: 1.0,
            resize_active: false,
            position: if position.is_finite() { position } else { Vec3::ZERO },
            velocity: Vec3::ZERO,
            created_at: 0.0,
            insertion_seq: 0,
            is_new: true,
            settled: false,
            pending_removal: false,
            removal_requested_at: None,
            removal_reason: None,
        }
    }

    /// Random v4 id drawn from the caller's RNG, so seeded runs reproduce ids.
    pub fn generate_id(rng: &mut impl Rng) -> TagId {
        uuid::Builder::from_random_bytes(rng.random()).into_uuid()
    }

    /// Derived from the current (possibly mid-animation) size.
    pub fn mass(&self) -> f64 {
        mass_for_size(self.current_size)
    }

    /// Radius used by the pairwise overlap test, including half the padding.
    pub fn effective_radius(&self, padding: f64) -> f64 {
        0.5 * self.current_size + 0.5 * padding
    }

    pub fn bounds(&self, padding: f64) -> Aabb {
        Aabb {
            center: self.position,
            half_extent: self.effective_radius(padding),
        }
    }

    /// Live tags take part in force computation.
    pub fn is_live(&self) -> bool {
        !self.pending_removal
    }

    /// Flag for exit. Freezes any in-flight resize at its current size.
    pub(crate) fn mark_pending(&mut self, now: f64, reason: RemovalReason) {
        self.pending_removal = true;
        self.removal_requested_at = Some(now);
        self.removal_reason = Some(reason);
        self.abort_resize();
    }

    pub(crate) fn abort_resize(&mut self) {
        if self.resize_active {
            self.target_size = self.current_size;
            self.resize_start_size = self.current_size;
            self.transition_progress = 1.0;
            self.resize_active = false;
        }
    }

    /// Seconds since removal was requested, if pending.
    pub fn exit_elapsed(&self, now: f64) -> Option<f64> {
        self.removal_requested_at.map(|t| (now - t).max(0.0))
    }
}

/// Normalize a display name into a reconciliation key.
pub fn normalize_key(name: &str) -> String {
    name.trim().to_lowercase()
}

fn sanitize_size(size: f64) -> f64 {
    if size.is_finite() {
        size.max(MIN_TAG_SIZE)
    } else {
        1.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rand::SeedableRng;
    use rand::rngs::SmallRng;

    fn make_tag(size: f64) -> Tag {
        Tag::new(Uuid::nil(), "btc", "BTC", size, Vec3::ZERO, TagSource::Provider)
    }

    #[test]
    fn test_mass_doubling_is_eightfold() {
        for size in [0.25, 1.0, 1.7, 3.0] {
            let ratio = mass_for_size(2.0 * size) / mass_for_size(size);
            assert_relative_eq!(ratio, 8.0, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_mass_strictly_increasing() {
        let sizes = [0.01, 0.1, 0.5, 1.0, 1.01, 2.0, 10.0];
        for w in sizes.windows(2) {
            assert!(mass_for_size(w[1]) > mass_for_size(w[0]));
        }
    }

    #[test]
    fn test_mass_follows_current_size() {
        let mut tag = make_tag(1.0);
        assert_relative_eq!(tag.mass(), DENSITY);
        tag.current_size = 2.0;
        assert_relative_eq!(tag.mass(), 8.0 * DENSITY);
    }

    #[test]
    fn test_new_tag_is_idle_and_new() {
        let tag = make_tag(1.2);
        assert!(tag.is_new);
        assert!(!tag.resize_active);
        assert_eq!(tag.transition_progress, 1.0);
        assert!(tag.is_live());
    }

    #[test]
    fn test_invalid_size_sanitized() {
        assert_eq!(make_tag(f64::NAN).current_size, 1.0);
        assert_eq!(make_tag(-3.0).current_size, MIN_TAG_SIZE);
        assert!(make_tag(0.0).mass() > 0.0);
    }

    #[test]
    fn test_non_finite_position_rejected() {
        let tag = Tag::new(
            Uuid::nil(),
            "x",
            "X",
            1.0,
            Vec3::new(f64::NAN, 0.0, 0.0),
            TagSource::Demo,
        );
        assert_eq!(tag.position, Vec3::ZERO);
    }

    #[test]
    fn test_mark_pending_aborts_resize() {
        let mut tag = make_tag(1.0);
        tag.target_size = 2.0;
        tag.transition_progress = 0.3;
        tag.resize_active = true;
        tag.current_size = 1.2;

        tag.mark_pending(5.0, RemovalReason::Requested);
        assert!(!tag.is_live());
        assert!(!tag.resize_active);
        assert_eq!(tag.transition_progress, 1.0);
        assert_eq!(tag.target_size, 1.2);
        assert_eq!(tag.exit_elapsed(5.5), Some(0.5));
    }

    #[test]
    fn test_aabb_overlap() {
        let a = make_tag(1.0);
        let mut b = make_tag(1.0);
        b.position = Vec3::new(0.9, 0.0, 0.0);
        assert!(a.bounds(0.0).overlaps(&b.bounds(0.0)));
        b.position = Vec3::new(1.1, 0.0, 0.0);
        assert!(!a.bounds(0.0).overlaps(&b.bounds(0.0)));
        assert!(a.bounds(0.4).overlaps(&b.bounds(0.4)));
    }

    #[test]
    fn test_generate_id_deterministic() {
        let a = Tag::generate_id(&mut SmallRng::seed_from_u64(7));
        let b = Tag::generate_id(&mut SmallRng::seed_from_u64(7));
        assert_eq!(a, b);
        assert_eq!(a.get_version_num(), 4);
    }

    #[test]
    fn test_source_roundtrip_lossy() {
        for s in [TagSource::Provider, TagSource::User, TagSource::Demo] {
            assert_eq!(TagSource::from_str_lossy(s.as_str()), s);
        }
        assert_eq!(TagSource::from_str_lossy("???"), TagSource::Provider);
    }

    #[test]
    fn test_normalize_key() {
        assert_eq!(normalize_key("  Doge "), "doge");
    }
}
