use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::geom::{Point3, SgSpatialSort, SmoothingGroupRule, SmoothingRule};

struct Corner {
    position: Point3,
    index: u32,
    group: u32,
}

/// Corners snapped to an integer grid plus a small jitter, so every pair is
/// either well inside or well outside `eps = 0.5`.
fn jittered_grid_corners(rng: &mut StdRng, count: usize) -> Vec<Corner> {
    (0..count)
        .map(|i| {
            let cell = |rng: &mut StdRng| f64::from(rng.random_range(0..4_i32));
            let jitter = |rng: &mut StdRng| rng.random_range(-0.1..0.1_f64);
            let position = Point3::new(
                cell(rng) + jitter(rng),
                cell(rng) + jitter(rng),
                cell(rng) + jitter(rng),
            );
            Corner {
                position,
                index: i as u32,
                group: rng.random_range(0..8_u32),
            }
        })
        .collect()
}

fn brute_force(
    corners: &[Corner],
    query: Point3,
    group: u32,
    eps: f64,
    rule: &impl SmoothingGroupRule,
) -> Vec<u32> {
    let mut hits: Vec<u32> = corners
        .iter()
        .filter(|c| c.position.distance_squared_to(query) <= eps * eps)
        .filter(|c| rule.compatible(group, c.group))
        .map(|c| c.index)
        .collect();
    hits.sort_unstable();
    hits
}

#[test]
fn sorted_index_agrees_with_brute_force() {
    let mut rng = StdRng::seed_from_u64(0x5eed_0001);
    let corners = jittered_grid_corners(&mut rng, 400);

    let mut sort = SgSpatialSort::with_capacity(corners.len());
    for c in &corners {
        sort.add(c.position, c.index, c.group);
    }
    let index = sort.prepare();
    assert_eq!(index.len(), corners.len());

    let eps = 0.5;
    let mut found = Vec::new();
    for rule in [SmoothingRule::SharedBit, SmoothingRule::UngroupedMatchesAll] {
        for c in &corners {
            index.find_positions(c.position, c.group, eps, &rule, &mut found);
            found.sort_unstable();
            assert_eq!(found, brute_force(&corners, c.position, c.group, eps, &rule));
        }
    }
}

#[test]
fn query_window_is_a_small_part_of_the_index() {
    let mut rng = StdRng::seed_from_u64(0x5eed_0002);
    let mut sort = SgSpatialSort::new();
    for i in 0..1000_u32 {
        let p = Point3::new(
            rng.random_range(0.0..100.0),
            rng.random_range(0.0..100.0),
            rng.random_range(0.0..100.0),
        );
        sort.add(p, i, 1);
    }
    let index = sort.prepare();

    let window = index.window_len(Point3::new(50.0, 50.0, 50.0), 0.01);
    assert!(window < 50, "window of {window} corners for a tiny tolerance");
}

#[test]
fn results_buffer_is_reused() {
    let mut sort = SgSpatialSort::new();
    sort.add(Point3::ORIGIN, 0, 1);
    sort.add(Point3::new(5.0, 0.0, 0.0), 1, 1);
    let index = sort.prepare();

    let mut found = vec![42, 43, 44];
    index.find_positions(Point3::ORIGIN, 1, 0.0, &SmoothingRule::SharedBit, &mut found);
    assert_eq!(found, vec![0]);

    index.find_positions(Point3::new(9.0, 9.0, 9.0), 1, 0.1, &SmoothingRule::SharedBit, &mut found);
    assert!(found.is_empty());
}

#[test]
fn negative_or_nan_epsilon_matches_nothing() {
    let mut sort = SgSpatialSort::new();
    sort.add(Point3::ORIGIN, 0, 1);
    let index = sort.prepare();

    let mut found = Vec::new();
    index.find_positions(Point3::ORIGIN, 1, -1.0, &SmoothingRule::SharedBit, &mut found);
    assert!(found.is_empty());
    index.find_positions(Point3::ORIGIN, 1, f64::NAN, &SmoothingRule::SharedBit, &mut found);
    assert!(found.is_empty());
}
