use crate::grid::Grid;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Scatter random rectangular keep-outs across the grid. Deterministic for
/// a given seed so tests and benchmarks can reproduce a board.
pub fn scatter_obstacles(grid: &mut Grid, seed: u64, count: usize, max_extent: i32) {
    let max_extent = max_extent.max(1);
    let mut rng = StdRng::seed_from_u64(seed);
    for _ in 0..count {
        let layer = rng.gen_range(0..grid.layers());
        let w = rng.gen_range(1..=max_extent).min(grid.cols());
        let h = rng.gen_range(1..=max_extent).min(grid.rows());
        let x = rng.gen_range(0..(grid.cols() - w + 1));
        let y = rng.gen_range(0..(grid.rows() - h + 1));
        grid.mark_rect_blocked(x, y, x + w - 1, y + h - 1, layer, 0, true);
    }
    log::debug!(
        "scattered {} keep-outs, {} of {} cells blocked",
        count,
        grid.count_blocked(),
        grid.total_cells()
    );
}

/// Sample an unblocked cell on the given layer, or None when the board is
/// too saturated to find one.
pub fn pick_free_cell(grid: &Grid, seed: u64, layer: i32) -> Option<(i32, i32)> {
    let mut rng = StdRng::seed_from_u64(seed);
    for _ in 0..10_000 {
        let x = rng.gen_range(0..grid.cols());
        let y = rng.gen_range(0..grid.rows());
        if !grid.at(x, y, layer).blocked {
            return Some((x, y));
        }
    }
    None
}
