//! Approximate-position lookup over triangle corners, filtered by smoothing group.
//!
//! Every corner is projected onto a fixed direction that is not aligned with
//! any coordinate axis, and the corners are sorted by that projection. Because
//! `|dot(a - b, n)| <= |a - b|` for a unit `n`, every corner within `eps` of a
//! query point has a projection within `eps` of the query's projection, so a
//! query only has to look at that window of the sorted array.
//!
//! Building and querying are two different types: [`SgSpatialSort`] collects
//! entries and [`SgSpatialSort::prepare`] turns it into an immutable
//! [`SgSpatialIndex`].

use serde::{Deserialize, Serialize};

use super::{Point3, Vec3};

/// Unnormalized projection direction, off-axis so that grid-like
/// geometry does not collapse onto a handful of keys.
const PLANE_NORMAL: [f64; 3] = [0.8523, 0.34321, 0.5736];

fn plane_normal() -> Vec3 {
    Vec3::from_array(PLANE_NORMAL).normalized_or_zero()
}

// ─────────────────────────────────────────────────────────────────────────────
// Smoothing-group compatibility
// ─────────────────────────────────────────────────────────────────────────────

/// Decides whether a stored corner may be averaged into a query corner.
///
/// `query` is the mask of the face being shaded, `entry` the mask of the face
/// that owns the stored corner.
pub trait SmoothingGroupRule {
    fn compatible(&self, query: u32, entry: u32) -> bool;
}

impl<F> SmoothingGroupRule for F
where
    F: Fn(u32, u32) -> bool,
{
    fn compatible(&self, query: u32, entry: u32) -> bool {
        self(query, entry)
    }
}

/// Built-in compatibility rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SmoothingRule {
    /// Masks must share at least one bit. Mask `0` only matches mask `0`.
    #[default]
    SharedBit,
    /// A query with mask `0` matches every entry; other queries behave like
    /// [`SmoothingRule::SharedBit`].
    UngroupedMatchesAll,
}

impl SmoothingRule {
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            SmoothingRule::SharedBit => "shared-bit",
            SmoothingRule::UngroupedMatchesAll => "ungrouped-all",
        }
    }

    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "shared-bit" => Some(SmoothingRule::SharedBit),
            "ungrouped-all" => Some(SmoothingRule::UngroupedMatchesAll),
            _ => None,
        }
    }
}

impl SmoothingGroupRule for SmoothingRule {
    fn compatible(&self, query: u32, entry: u32) -> bool {
        match self {
            SmoothingRule::SharedBit => shared_bit(query, entry),
            SmoothingRule::UngroupedMatchesAll => query == 0 || shared_bit(query, entry),
        }
    }
}

fn shared_bit(a: u32, b: u32) -> bool {
    if a == 0 || b == 0 {
        a == b
    } else {
        a & b != 0
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Index
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy)]
struct SpatialEntry {
    position: Point3,
    index: u32,
    smoothing_group: u32,
    key: f64,
}

/// Collects face corners before the index is sorted.
#[derive(Debug, Clone)]
pub struct SgSpatialSort {
    plane_normal: Vec3,
    entries: Vec<SpatialEntry>,
}

impl SgSpatialSort {
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(0)
    }

    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            plane_normal: plane_normal(),
            entries: Vec::with_capacity(capacity),
        }
    }

    /// Register one face corner. The position is copied.
    pub fn add(&mut self, position: Point3, index: u32, smoothing_group: u32) {
        let key = self.plane_normal.dot(position.to_vec3());
        // Non-finite corners go to the far end so they never sit inside a
        // finite query window.
        let key = if key.is_finite() { key } else { f64::INFINITY };
        self.entries.push(SpatialEntry {
            position,
            index,
            smoothing_group,
            key,
        });
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Sort the collected corners and freeze them into a queryable index.
    ///
    /// The sort is stable, so corners with equal keys keep insertion order and
    /// query results are reproducible.
    #[must_use]
    pub fn prepare(self) -> SgSpatialIndex {
        let Self {
            plane_normal,
            mut entries,
        } = self;
        entries.sort_by(|a, b| a.key.total_cmp(&b.key));
        SgSpatialIndex {
            plane_normal,
            entries,
        }
    }
}

impl Default for SgSpatialSort {
    fn default() -> Self {
        Self::new()
    }
}

/// Sorted, immutable corner index produced by [`SgSpatialSort::prepare`].
#[derive(Debug, Clone)]
pub struct SgSpatialIndex {
    plane_normal: Vec3,
    entries: Vec<SpatialEntry>,
}

impl SgSpatialIndex {
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Collect the position indices of all corners within `eps` of `position`
    /// whose smoothing group is compatible with `smoothing_group` under `rule`.
    ///
    /// `results` is cleared first. Indices appear in key order and are not
    /// deduplicated: a position shared by several compatible faces is reported
    /// once per face corner.
    pub fn find_positions<R>(
        &self,
        position: Point3,
        smoothing_group: u32,
        eps: f64,
        rule: &R,
        results: &mut Vec<u32>,
    ) where
        R: SmoothingGroupRule + ?Sized,
    {
        results.clear();

        let key = self.plane_normal.dot(position.to_vec3());
        if !key.is_finite() || eps.is_nan() || eps < 0.0 {
            return;
        }

        let min_key = key - eps;
        let max_key = key + eps;
        let eps_squared = eps * eps;

        let start = self.entries.partition_point(|e| e.key < min_key);
        for entry in &self.entries[start..] {
            if entry.key > max_key {
                break;
            }
            if entry.position.distance_squared_to(position) <= eps_squared
                && rule.compatible(smoothing_group, entry.smoothing_group)
            {
                results.push(entry.index);
            }
        }
    }

    /// Number of stored corners whose key falls inside the query window.
    ///
    /// Used to check that the window stays small compared to the whole index.
    #[must_use]
    pub fn window_len(&self, position: Point3, eps: f64) -> usize {
        let key = self.plane_normal.dot(position.to_vec3());
        if !key.is_finite() || eps.is_nan() || eps < 0.0 {
            return 0;
        }
        let start = self.entries.partition_point(|e| e.key < key - eps);
        let end = self.entries.partition_point(|e| e.key <= key + eps);
        end.saturating_sub(start)
    }
}
