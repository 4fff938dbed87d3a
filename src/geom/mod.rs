mod core;
mod diagnostics;
mod mesh;
mod metrics;
mod smoothing;
mod spatial_sort;

pub use self::core::{BBox, Point3, Tolerance, Transform, Vec3};
pub use diagnostics::SmoothingDiagnostics;
pub use mesh::{SmoothingFace, SmoothingMesh};
pub use metrics::{SmoothingMetrics, SmoothingTimingReport, TimingBucket};
pub use smoothing::{
    SmoothingError, SmoothingOptions, compute_face_normals, compute_smoothing_normals,
    compute_smoothing_normals_batch, compute_smoothing_normals_with_options,
    compute_smoothing_normals_with_rule, smoothing_epsilon,
};
pub use spatial_sort::{SgSpatialIndex, SgSpatialSort, SmoothingGroupRule, SmoothingRule};

#[cfg(test)]
mod tests;
