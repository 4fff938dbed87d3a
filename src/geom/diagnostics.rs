//! Diagnostics reported by normal synthesis.
//!
//! Synthesis never fails on numeric edge cases: degenerate faces and normal
//! sums that cancel out simply produce zero vectors. This struct is where those
//! cases become visible to the caller.
//!
//! ```ignore
//! use sg_engine::geom::compute_smoothing_normals;
//!
//! let diag = compute_smoothing_normals(&mut mesh)?;
//! log::debug!("{}", diag.summary());
//! if !diag.is_clean() {
//!     for warning in &diag.warnings {
//!         eprintln!("warning: {warning}");
//!     }
//! }
//! ```

use std::fmt;

use serde::Serialize;

use super::metrics::SmoothingTimingReport;

/// Counts and warnings collected during one synthesis call.
#[derive(Debug, Default, Clone, PartialEq, Serialize)]
pub struct SmoothingDiagnostics {
    /// Number of positions (and therefore normals) in the mesh.
    pub vertex_count: usize,

    /// Number of triangles processed.
    pub face_count: usize,

    /// Number of corner entries registered in the spatial index (3 per face).
    pub corner_entry_count: usize,

    /// Distance tolerance used for every query of the call.
    pub epsilon: f64,

    /// Faces whose flat normal is exactly zero (collinear or coincident corners).
    pub degenerate_face_count: usize,

    /// Referenced positions that ended up with a zero normal.
    ///
    /// Happens when every matched flat normal is degenerate or the matched
    /// normals cancel out.
    pub zero_normal_count: usize,

    /// Positions no face refers to. They always receive a zero normal.
    pub unreferenced_vertex_count: usize,

    /// Largest number of index matches returned for a single corner.
    ///
    /// Includes repeated matches of the same position through different faces.
    pub max_matches_per_corner: usize,

    /// Phase timings, only with the `smoothing_metrics` feature on native targets.
    pub timing: Option<SmoothingTimingReport>,

    /// Human-readable notes about the input.
    pub warnings: Vec<String>,
}

impl SmoothingDiagnostics {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` if every referenced position received a non-zero normal
    /// and nothing was worth a warning.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.degenerate_face_count == 0 && self.zero_normal_count == 0 && self.warnings.is_empty()
    }

    #[must_use]
    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }

    pub fn add_warning(&mut self, warning: impl Into<String>) {
        self.warnings.push(warning.into());
    }

    /// Fold the diagnostics of another mesh into this one.
    ///
    /// Counts are summed, maxima kept, warnings appended. `epsilon` keeps the
    /// larger value; `timing` is dropped since it only describes a single call.
    pub fn merge(&mut self, other: &SmoothingDiagnostics) {
        self.vertex_count += other.vertex_count;
        self.face_count += other.face_count;
        self.corner_entry_count += other.corner_entry_count;
        self.epsilon = self.epsilon.max(other.epsilon);
        self.degenerate_face_count += other.degenerate_face_count;
        self.zero_normal_count += other.zero_normal_count;
        self.unreferenced_vertex_count += other.unreferenced_vertex_count;
        self.max_matches_per_corner = self.max_matches_per_corner.max(other.max_matches_per_corner);
        self.warnings.extend(other.warnings.iter().cloned());
        self.timing = None;
    }

    /// Short single-line form for logs: `"V:{vertices} F:{faces} eps:{eps} [issues...]"`.
    #[must_use]
    pub fn summary(&self) -> String {
        let mut parts = vec![format!(
            "V:{} F:{} eps:{:.3e}",
            self.vertex_count, self.face_count, self.epsilon
        )];

        if self.degenerate_face_count > 0 {
            parts.push(format!("degenerate:{}", self.degenerate_face_count));
        }
        if self.zero_normal_count > 0 {
            parts.push(format!("zero-normals:{}", self.zero_normal_count));
        }
        if self.unreferenced_vertex_count > 0 {
            parts.push(format!("unreferenced:{}", self.unreferenced_vertex_count));
        }
        if !self.warnings.is_empty() {
            parts.push(format!("warnings:{}", self.warnings.len()));
        }

        parts.join(" ")
    }
}

impl fmt::Display for SmoothingDiagnostics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Smoothing Diagnostics:")?;
        writeln!(f, "  Vertices: {}", self.vertex_count)?;
        writeln!(f, "  Faces: {}", self.face_count)?;
        writeln!(f, "  Corner entries: {}", self.corner_entry_count)?;
        writeln!(f, "  Epsilon: {:e}", self.epsilon)?;
        writeln!(f, "  Max matches per corner: {}", self.max_matches_per_corner)?;

        if self.degenerate_face_count > 0
            || self.zero_normal_count > 0
            || self.unreferenced_vertex_count > 0
        {
            writeln!(f, "  Issues:")?;
            if self.degenerate_face_count > 0 {
                writeln!(f, "    - Degenerate faces: {}", self.degenerate_face_count)?;
            }
            if self.zero_normal_count > 0 {
                writeln!(f, "    - Zero normals: {}", self.zero_normal_count)?;
            }
            if self.unreferenced_vertex_count > 0 {
                writeln!(f, "    - Unreferenced vertices: {}", self.unreferenced_vertex_count)?;
            }
        }

        if !self.warnings.is_empty() {
            writeln!(f, "  Warnings:")?;
            for warning in &self.warnings {
                writeln!(f, "    - {warning}")?;
            }
        }

        if let Some(ref timing) = self.timing {
            writeln!(f, "  Timing: {} ms total", timing.total_ms())?;
        }

        let status = if self.is_clean() { "CLEAN" } else { "ISSUES DETECTED" };
        writeln!(f, "  Status: {status}")?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_clean() {
        let diag = SmoothingDiagnostics::default();
        assert!(diag.is_clean());
        assert!(!diag.has_warnings());
    }

    #[test]
    fn test_degenerate_faces_not_clean() {
        let diag = SmoothingDiagnostics {
            degenerate_face_count: 1,
            ..Default::default()
        };
        assert!(!diag.is_clean());
    }

    #[test]
    fn test_unreferenced_vertices_still_clean() {
        let diag = SmoothingDiagnostics {
            unreferenced_vertex_count: 4,
            ..Default::default()
        };
        assert!(diag.is_clean());
    }

    #[test]
    fn test_merge() {
        let mut a = SmoothingDiagnostics {
            vertex_count: 10,
            face_count: 4,
            corner_entry_count: 12,
            epsilon: 1e-5,
            max_matches_per_corner: 3,
            warnings: vec!["first".to_string()],
            ..Default::default()
        };
        let b = SmoothingDiagnostics {
            vertex_count: 6,
            face_count: 2,
            corner_entry_count: 6,
            epsilon: 2e-5,
            degenerate_face_count: 1,
            max_matches_per_corner: 2,
            warnings: vec!["second".to_string()],
            ..Default::default()
        };

        a.merge(&b);

        assert_eq!(a.vertex_count, 16);
        assert_eq!(a.face_count, 6);
        assert_eq!(a.corner_entry_count, 18);
        assert_eq!(a.epsilon, 2e-5);
        assert_eq!(a.degenerate_face_count, 1);
        assert_eq!(a.max_matches_per_corner, 3);
        assert_eq!(a.warnings, vec!["first".to_string(), "second".to_string()]);
    }

    #[test]
    fn test_summary() {
        let diag = SmoothingDiagnostics {
            vertex_count: 8,
            face_count: 12,
            degenerate_face_count: 2,
            unreferenced_vertex_count: 1,
            ..Default::default()
        };

        let summary = diag.summary();
        assert!(summary.starts_with("V:8 F:12"));
        assert!(summary.contains("degenerate:2"));
        assert!(summary.contains("unreferenced:1"));
        assert!(!summary.contains("zero-normals"));
    }

    #[test]
    fn test_display() {
        let mut diag = SmoothingDiagnostics {
            vertex_count: 3,
            face_count: 1,
            zero_normal_count: 3,
            ..Default::default()
        };
        diag.add_warning("collinear input");

        let output = format!("{diag}");
        assert!(output.contains("Vertices: 3"));
        assert!(output.contains("Zero normals: 3"));
        assert!(output.contains("collinear input"));
        assert!(output.contains("ISSUES DETECTED"));
    }
}
