//! Aggregate shape of the cluster: a smoothed center and a damped extent.
//!
//! `update` derives the published values from the state committed at the
//! previous frame boundary, so calling it repeatedly within one frame on an
//! unchanged tag set is idempotent. `end_frame` commits.
//!
//! Extent is measured over *settled* tags only: a tag that is still flying
//! in from its entry point does not inflate the shell it is being pulled
//! into. Likewise the center holds still until the first tag settles, then
//! snaps to the settled centroid and follows all live tags smoothly. Growth toward the measured radius is fast, shrinkage slow, and both
//! are bounded per frame by `max_extent_step`.

use crate::config::ClusterParams;
use crate::tag::Tag;
use crate::vector::Vec3;

#[derive(Clone, Debug)]
pub struct ClusterStructure {
    params: ClusterParams,
    center: Vec3,
    extent: f64,
    base_center: Vec3,
    base_extent: f64,
    observed_radius: f64,
    live_count: usize,
    settled_count: usize,
    initialized: bool,
}

impl ClusterStructure {
    pub fn new(params: ClusterParams) -> Self {
        let extent = params.min_extent;
        Self {
            params,
            center: Vec3::ZERO,
            extent,
            base_center: Vec3::ZERO,
            base_extent: extent,
            observed_radius: 0.0,
            live_count: 0,
            settled_count: 0,
            initialized: false,
        }
    }

    /// A structure already settled at `center` / `extent`.
    pub fn from_parts(center: Vec3, extent: f64, params: ClusterParams) -> Self {
        let extent = extent.max(params.min_extent);
        Self {
            params,
            center,
            extent,
            base_center: center,
            base_extent: extent,
            observed_radius: extent,
            live_count: 0,
            settled_count: 0,
            initialized: true,
        }
    }

    pub fn center(&self) -> Vec3 {
        self.center
    }

    pub fn extent(&self) -> f64 {
        self.extent
    }

    /// Undamped radius measured by the last `update`.
    pub fn observed_radius(&self) -> f64 {
        self.observed_radius
    }

    pub fn live_count(&self) -> usize {
        self.live_count
    }

    pub fn params(&self) -> &ClusterParams {
        &self.params
    }

    /// Recompute center and extent from the live tags.
    pub fn update(&mut self, tags: &[Tag]) {
        let live: Vec<&Tag> = tags.iter().filter(|t| t.is_live()).collect();
        self.live_count = live.len();
        self.settled_count = live.iter().filter(|t| t.settled).count();

        if live.is_empty() {
            self.center = self.base_center;
            self.observed_radius = 0.0;
            self.extent = self.damp(self.base_extent, self.params.min_extent);
            return;
        }

        self.center = if self.initialized {
            self.base_center
                .lerp(self.centroid(&live), self.params.center_smoothing)
        } else if self.settled_count > 0 {
            let settled: Vec<&Tag> = live.iter().copied().filter(|t| t.settled).collect();
            self.centroid(&settled)
        } else {
            self.base_center
        };

        let center = self.center;
        self.observed_radius = live
            .iter()
            .filter(|t| t.settled)
            .map(|t| t.position.distance(center) + 0.5 * t.current_size)
            .fold(0.0, f64::max);

        let target = self.observed_radius.max(self.params.min_extent);
        self.extent = self.damp(self.base_extent, target);
    }

    /// Commit this frame's values as the base for the next.
    pub fn end_frame(&mut self) {
        self.base_center = self.center;
        self.base_extent = self.extent;
        if self.settled_count > 0 {
            self.initialized = true;
        }
    }

    fn centroid(&self, live: &[&Tag]) -> Vec3 {
        let mut sum = Vec3::ZERO;
        let mut total = 0.0;
        for t in live {
            let w = if self.params.mass_weighted_center {
                t.mass()
            } else {
                1.0
            };
            sum += t.position * w;
            total += w;
        }
        if total > 0.0 {
            sum * (1.0 / total)
        } else {
            self.base_center
        }
    }

    fn damp(&self, from: f64, to: f64) -> f64 {
        let rate = if to > from {
            self.params.growth_rate
        } else {
            self.params.shrink_rate
        };
        let step = ((to - from) * rate).clamp(-self.params.max_extent_step, self.params.max_extent_step);
        (from + step).max(self.params.min_extent)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tag::TagSource;
    use approx::assert_relative_eq;
    use uuid::Uuid;

    fn settled_tag(n: u128, pos: Vec3) -> Tag {
        let mut t = Tag::new(Uuid::from_u128(n), "k", "K", 1.0, pos, TagSource::Provider);
        t.settled = true;
        t
    }

    fn params() -> ClusterParams {
        ClusterParams::default()
    }

    #[test]
    fn test_update_idempotent() {
        let tags = vec![
            settled_tag(1, Vec3::new(1.0, 0.0, 0.0)),
            settled_tag(2, Vec3::new(-3.0, 2.0, 0.5)),
            settled_tag(3, Vec3::new(0.0, 4.0, -1.0)),
        ];
        let mut c = ClusterStructure::new(params());
        c.update(&tags);
        c.end_frame();
        c.update(&tags);
        let (center, extent) = (c.center(), c.extent());
        c.update(&tags);
        assert!(c.center().distance(center) < 1e-12);
        assert_relative_eq!(c.extent(), extent, epsilon = 1e-12);
    }

    #[test]
    fn test_first_update_snaps_to_centroid() {
        let tags = vec![
            settled_tag(1, Vec3::new(2.0, 0.0, 0.0)),
            settled_tag(2, Vec3::new(4.0, 0.0, 0.0)),
        ];
        let mut c = ClusterStructure::new(params());
        c.update(&tags);
        assert_eq!(c.center(), Vec3::new(3.0, 0.0, 0.0));
    }

    #[test]
    fn test_center_holds_until_first_tag_settles() {
        let mut incoming = settled_tag(1, Vec3::new(0.0, 0.0, -4.0));
        incoming.settled = false;
        let mut c = ClusterStructure::new(params());
        for _ in 0..3 {
            c.update(std::slice::from_ref(&incoming));
            assert_eq!(c.center(), Vec3::ZERO);
            c.end_frame();
        }

        let mut arriving = settled_tag(2, Vec3::new(0.0, 0.0, 0.5));
        arriving.settled = true;
        c.update(&[incoming, arriving]);
        assert_eq!(c.center(), Vec3::new(0.0, 0.0, 0.5));
    }

    #[test]
    fn test_center_smoothed_after_init() {
        let mut tags = vec![settled_tag(1, Vec3::ZERO)];
        let mut c = ClusterStructure::new(params());
        c.update(&tags);
        c.end_frame();

        tags[0].position = Vec3::new(10.0, 0.0, 0.0);
        c.update(&tags);
        assert_relative_eq!(c.center().x, 10.0 * params().center_smoothing, epsilon = 1e-12);
    }

    #[test]
    fn test_pending_tags_ignored() {
        let mut far = settled_tag(2, Vec3::new(100.0, 0.0, 0.0));
        far.pending_removal = true;
        let tags = vec![settled_tag(1, Vec3::ZERO), far];
        let mut c = ClusterStructure::new(params());
        c.update(&tags);
        assert_eq!(c.center(), Vec3::ZERO);
        assert_eq!(c.live_count(), 1);
        assert_relative_eq!(c.observed_radius(), 0.5, epsilon = 1e-12);
    }

    #[test]
    fn test_unsettled_tags_do_not_inflate_extent() {
        let mut incoming = settled_tag(2, Vec3::new(50.0, 0.0, 0.0));
        incoming.settled = false;
        let tags = vec![settled_tag(1, Vec3::ZERO), incoming];
        let mut c = ClusterStructure::from_parts(Vec3::ZERO, 1.0, params());
        c.update(&tags);
        assert!(c.observed_radius() < 30.0);
    }

    #[test]
    fn test_growth_fast_shrink_slow() {
        let p = params();
        let mut c = ClusterStructure::from_parts(Vec3::ZERO, 5.0, p.clone());

        // grow toward 10.5 (tag at 10 plus half its size)
        let far = vec![settled_tag(1, Vec3::ZERO), settled_tag(2, Vec3::new(10.0, 0.0, 0.0))];
        c.update(&far);
        let grown = c.extent() - 5.0;

        let mut c2 = ClusterStructure::from_parts(Vec3::ZERO, 15.5, p.clone());
        c2.update(&far);
        let shrunk = 15.5 - c2.extent();

        assert!(grown > 0.0 && shrunk > 0.0);
        assert!(grown > 5.0 * shrunk, "grew {grown}, shrank {shrunk}");
    }

    #[test]
    fn test_extent_step_bounded() {
        let mut p = params();
        p.growth_rate = 1.0;
        p.max_extent_step = 0.5;
        let mut c = ClusterStructure::from_parts(Vec3::ZERO, 1.0, p);
        let far = vec![settled_tag(1, Vec3::new(100.0, 0.0, 0.0))];
        c.update(&far);
        assert_relative_eq!(c.extent(), 1.5, epsilon = 1e-12);
    }

    #[test]
    fn test_empty_relaxes_toward_min_extent() {
        let p = params();
        let mut c = ClusterStructure::from_parts(Vec3::new(1.0, 1.0, 1.0), 8.0, p.clone());
        c.update(&[]);
        assert!(c.extent() < 8.0);
        assert!(c.extent() >= p.min_extent);
        assert_eq!(c.center(), Vec3::new(1.0, 1.0, 1.0));
    }

    #[test]
    fn test_mass_weighted_center() {
        let mut p = params();
        p.mass_weighted_center = true;
        let mut heavy = settled_tag(2, Vec3::new(3.0, 0.0, 0.0));
        heavy.current_size = 2.0; // mass 8
        let tags = vec![settled_tag(1, Vec3::ZERO), heavy];
        let mut c = ClusterStructure::new(p);
        c.update(&tags);
        assert_relative_eq!(c.center().x, 3.0 * 8.0 / 9.0, epsilon = 1e-12);
    }

    #[test]
    fn test_extent_never_below_min() {
        let p = params();
        let mut c = ClusterStructure::new(p.clone());
        let tags = vec![settled_tag(1, Vec3::ZERO)];
        for _ in 0..500 {
            c.update(&tags);
            c.end_frame();
        }
        assert!(c.extent() >= p.min_extent);
    }
}
