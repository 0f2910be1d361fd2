//! Capacity eviction.
//!
//! Preference order, most evictable first:
//!
//! 1. Sources outside the protected set before sources inside it. The
//!    default protects `user` tags; `provider` and `demo` tags form a single
//!    unprotected class.
//! 2. Within a class, the oldest `created_at`.
//! 3. Ties broken by insertion order: the first-inserted tag goes first.
//!
//! Protected tags are still evictable once no unprotected tag is left, so the
//! capacity bound always holds.

use std::cmp::Ordering;

use crate::registry::TagRegistry;
use crate::tag::{Tag, TagId, TagSource};

#[derive(Clone, Debug, PartialEq)]
pub struct EvictionPolicy {
    protected: Vec<TagSource>,
}

impl Default for EvictionPolicy {
    fn default() -> Self {
        Self::new(vec![TagSource::User])
    }
}

impl EvictionPolicy {
    pub fn new(protected: Vec<TagSource>) -> Self {
        Self { protected }
    }

    pub fn is_protected(&self, source: TagSource) -> bool {
        self.protected.contains(&source)
    }

    /// Pick the next tag to evict, or `None` while the live count is within
    /// `max_capacity`. Pending tags are never candidates.
    pub fn select_for_eviction(&self, registry: &TagRegistry, max_capacity: usize) -> Option<TagId> {
        if registry.live_count() <= max_capacity {
            return None;
        }
        registry
            .live()
            .min_by(|a, b| self.compare(a, b))
            .map(|t| t.id)
    }

    /// Less means evicted sooner.
    fn compare(&self, a: &Tag, b: &Tag) -> Ordering {
        self.is_protected(a.source)
            .cmp(&self.is_protected(b.source))
            .then_with(|| a.created_at.total_cmp(&b.created_at))
            .then_with(|| a.insertion_seq.cmp(&b.insertion_seq))
    }
}
