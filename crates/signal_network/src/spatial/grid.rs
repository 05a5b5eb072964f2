//! Region grid arithmetic for the coarse phase of range queries.

use crate::types::{NodePosition, RegionId, REGION_SIZE};

/// Cells a range query must look at on each side of the centre cell.
///
/// Returns `None` for negative or non-finite distances, and for distances so
/// large that the cell square would not fit in `i32` arithmetic.
pub fn cell_radius(max_distance: f64) -> Option<i32> {
    if !max_distance.is_finite() || max_distance < 0.0 {
        return None;
    }
    let radius = (max_distance / f64::from(REGION_SIZE)).ceil() + 1.0;
    if radius > f64::from(i32::MAX / 4) {
        return None;
    }
    Some(radius as i32)
}

/// Number of cells in the square scanned for `radius`.
pub fn cell_span(radius: i32) -> u64 {
    let side = 2 * u64::from(radius.unsigned_abs()) + 1;
    side * side
}

/// Horizontal distance from `center` to the nearest block of `cell`.
///
/// The vertical axis is not part of the grid, so this is a lower bound on
/// the distance from `center` to any position inside the cell.
pub fn min_distance_to_cell(center: &NodePosition, cell: &RegionId) -> f64 {
    let axis = |value: i32, cell_coord: i32| -> f64 {
        let lo = i64::from(cell_coord) * i64::from(REGION_SIZE);
        let hi = lo + i64::from(REGION_SIZE) - 1;
        let value = i64::from(value);
        if value < lo {
            (lo - value) as f64
        } else if value > hi {
            (value - hi) as f64
        } else {
            0.0
        }
    };
    let dx = axis(center.x, cell.x);
    let dz = axis(center.z, cell.z);
    (dx * dx + dz * dz).sqrt()
}

/// Whether any position inside `cell` could lie within `max_distance` of `center`.
pub fn cell_may_contain(center: &NodePosition, cell: &RegionId, max_distance: f64) -> bool {
    cell.world == center.world && min_distance_to_cell(center, cell) <= max_distance
}

/// The minimal set of cells that can hold a position within `max_distance`
/// of `center`: the square of [`cell_radius`] around the centre cell with
/// the corners that are provably out of range pruned away.
pub fn cells_in_range(center: &NodePosition, max_distance: f64) -> Vec<RegionId> {
    let Some(radius) = cell_radius(max_distance) else {
        return Vec::new();
    };
    let origin = center.region();
    let mut cells = Vec::new();
    for dx in -radius..=radius {
        for dz in -radius..=radius {
            let cell = origin.offset(dx, dz);
            if cell_may_contain(center, &cell, max_distance) {
                cells.push(cell);
            }
        }
    }
    cells
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cell_radius() {
        assert_eq!(cell_radius(0.0), Some(1));
        assert_eq!(cell_radius(16.0), Some(2));
        assert_eq!(cell_radius(16.5), Some(3));
        assert_eq!(cell_radius(-1.0), None);
        assert_eq!(cell_radius(f64::INFINITY), None);
        assert_eq!(cell_radius(f64::MAX), None);
    }

    #[test]
    fn test_min_distance_inside_cell_is_zero() {
        let center = NodePosition::new("w", 5, 70, 9);
        assert_eq!(min_distance_to_cell(&center, &center.region()), 0.0);
    }

    #[test]
    fn test_min_distance_to_neighbor_cell() {
        let center = NodePosition::new("w", 15, 0, 0);
        // Cell x=1 starts at block 16
        assert_eq!(min_distance_to_cell(&center, &RegionId::new("w", 1, 0)), 1.0);
        // Cell x=-1 ends at block -1
        assert_eq!(min_distance_to_cell(&center, &RegionId::new("w", -1, 0)), 16.0);
    }

    #[test]
    fn test_cells_in_range_prunes_corners() {
        let center = NodePosition::new("w", 8, 0, 8);
        let cells = cells_in_range(&center, 16.0);

        // Full square would be 5x5, the far corners are more than 16 away
        assert!(cells.len() < 25);
        assert!(cells.contains(&RegionId::new("w", 0, 0)));
        assert!(cells.contains(&RegionId::new("w", 1, 0)));
        assert!(!cells.contains(&RegionId::new("w", 2, 2)));
        assert!(cells.iter().all(|cell| cell.world == "w"));
    }

    #[test]
    fn test_cells_in_range_negative_distance() {
        let center = NodePosition::new("w", 0, 0, 0);
        assert!(cells_in_range(&center, -5.0).is_empty());
    }
}
