/// Golden angle in radians: 2π / φ²
pub const GOLDEN_ANGLE: f64 = 2.399_963_229_728_653_3;

/// Volumetric density used by the mass law: mass = DENSITY * size³
pub const DENSITY: f64 = 1.0;

/// Numerical epsilon for near-zero comparisons
pub const EPSILON: f64 = 1e-10;

/// Separation floor applied before any division by a pair distance.
/// Pairs closer than this use a deterministic fallback direction.
pub const MIN_SEPARATION: f64 = 1e-4;

/// Smallest size a tag can ever take. Keeps mass strictly positive.
pub const MIN_TAG_SIZE: f64 = 1e-3;

/// Attempts at drawing an entry direction that does not land on an existing tag.
pub const ENTRY_PLACEMENT_ATTEMPTS: usize = 16;

/// Tolerance for the progress == 1.0 completion check on resize animations.
pub const PROGRESS_EPSILON: f64 = 1e-9;

/// Wire format version for exported frames.
pub const FRAME_FORMAT_VERSION: &str = "1.0";

/// Frame length the friction factor is calibrated against (60 Hz).
pub const REFERENCE_DT: f64 = 1.0 / 60.0;
