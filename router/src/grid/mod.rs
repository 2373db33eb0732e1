use pcb_common::geom::rect::Rect;

/// Per-cell occupancy record.
///
/// `net` is the owning net id (0 = unowned). `pad_blocked` cells belong to a
/// component pad and must survive route rip-up: unmarking restores
/// `original_net` instead of clearing. `usage_count` and `history_cost` are
/// the negotiated-congestion bookkeeping fields.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct GridCell {
    pub blocked: bool,
    pub is_obstacle: bool,
    pub pad_blocked: bool,
    pub is_zone: bool,
    pub net: i32,
    pub original_net: i32,
    pub usage_count: u16,
    pub history_cost: f32,
}

#[derive(Clone, Copy, Debug, Default)]
pub struct CongestionStats {
    pub max_congestion: f64,
    pub avg_congestion: f64,
    pub congested_blocks: usize,
}

/// Side length, in cells, of one coarse congestion block.
const CONGESTION_BLOCK: i32 = 8;

/// Dense 3-D routing grid.
///
/// Cells live in a single contiguous buffer indexed layer-major
/// (`layer * rows * cols + y * cols + x`). World coordinates map to cells
/// through the origin and a uniform resolution in millimetres per cell.
/// Mutations with invalid coordinates are silently ignored.
pub struct Grid {
    cols: i32,
    rows: i32,
    layers: i32,
    resolution: f64,
    origin_x: f64,
    origin_y: f64,
    cells: Vec<GridCell>,
    congestion: Vec<u32>,
    congestion_cols: i32,
    congestion_rows: i32,
}

impl Grid {
    pub fn new(
        cols: i32,
        rows: i32,
        layers: i32,
        resolution: f64,
        origin_x: f64,
        origin_y: f64,
    ) -> Self {
        assert!(cols > 0 && rows > 0 && layers > 0, "grid dimensions must be positive");
        assert!(resolution > 0.0, "grid resolution must be positive");

        let congestion_cols = (cols / CONGESTION_BLOCK).max(1);
        let congestion_rows = (rows / CONGESTION_BLOCK).max(1);
        let grid = Self {
            cols,
            rows,
            layers,
            resolution,
            origin_x,
            origin_y,
            cells: vec![GridCell::default(); (cols * rows * layers) as usize],
            congestion: vec![0; (congestion_cols * congestion_rows * layers) as usize],
            congestion_cols,
            congestion_rows,
        };
        log::debug!(
            "routing grid {}x{}x{} @ {:.3} mm/cell ({:.1} MB)",
            cols,
            rows,
            layers,
            resolution,
            grid.memory_mb()
        );
        grid
    }

    #[inline(always)]
    fn index(&self, x: i32, y: i32, layer: i32) -> usize {
        ((layer * self.rows + y) * self.cols + x) as usize
    }

    pub fn cols(&self) -> i32 {
        self.cols
    }
    pub fn rows(&self) -> i32 {
        self.rows
    }
    pub fn layers(&self) -> i32 {
        self.layers
    }
    pub fn resolution(&self) -> f64 {
        self.resolution
    }
    pub fn origin(&self) -> (f64, f64) {
        (self.origin_x, self.origin_y)
    }

    pub fn total_cells(&self) -> usize {
        self.cells.len()
    }

    pub fn count_blocked(&self) -> usize {
        self.cells.iter().filter(|c| c.blocked).count()
    }

    pub fn memory_mb(&self) -> f64 {
        let bytes = self.cells.len() * std::mem::size_of::<GridCell>()
            + self.congestion.len() * std::mem::size_of::<u32>();
        bytes as f64 / (1024.0 * 1024.0)
    }

    #[inline(always)]
    pub fn is_valid(&self, x: i32, y: i32, layer: i32) -> bool {
        x >= 0 && x < self.cols && y >= 0 && y < self.rows && layer >= 0 && layer < self.layers
    }

    /// Valid and enterable by `net`: unblocked, or blocked by the same net
    /// without being a static obstacle.
    pub fn is_valid_and_free(&self, x: i32, y: i32, layer: i32, net: i32) -> bool {
        if !self.is_valid(x, y, layer) {
            return false;
        }
        let cell = self.at(x, y, layer);
        !cell.blocked || (cell.net == net && !cell.is_obstacle)
    }

    /// Cell accessor. Callers check `is_valid` first.
    #[inline(always)]
    pub fn at(&self, x: i32, y: i32, layer: i32) -> &GridCell {
        debug_assert!(self.is_valid(x, y, layer));
        &self.cells[self.index(x, y, layer)]
    }

    #[inline(always)]
    fn at_mut(&mut self, x: i32, y: i32, layer: i32) -> &mut GridCell {
        debug_assert!(self.is_valid(x, y, layer));
        let idx = self.index(x, y, layer);
        &mut self.cells[idx]
    }

    pub fn world_to_grid(&self, x: f64, y: f64) -> (i32, i32) {
        // round(), not truncation: (112.6 - 75.0) / 0.1 lands a hair under
        // 376.0 and must still map to cell 376.
        let gx = ((x - self.origin_x) / self.resolution).round() as i32;
        let gy = ((y - self.origin_y) / self.resolution).round() as i32;
        (gx.clamp(0, self.cols - 1), gy.clamp(0, self.rows - 1))
    }

    pub fn grid_to_world(&self, gx: i32, gy: i32) -> (f64, f64) {
        (
            self.origin_x + gx as f64 * self.resolution,
            self.origin_y + gy as f64 * self.resolution,
        )
    }

    // ------------------------------------------------------------------
    // Obstacle and copper marking
    // ------------------------------------------------------------------

    pub fn mark_blocked(&mut self, x: i32, y: i32, layer: i32, net: i32, is_obstacle: bool) {
        if !self.is_valid(x, y, layer) {
            return;
        }
        let cell = self.at_mut(x, y, layer);
        cell.blocked = true;
        cell.net = net;
        cell.is_obstacle = is_obstacle;
    }

    pub fn mark_rect_blocked(
        &mut self,
        x1: i32,
        y1: i32,
        x2: i32,
        y2: i32,
        layer: i32,
        net: i32,
        is_obstacle: bool,
    ) {
        if layer < 0 || layer >= self.layers {
            return;
        }
        let gx1 = x1.min(x2).clamp(0, self.cols - 1);
        let gx2 = x1.max(x2).clamp(0, self.cols - 1);
        let gy1 = y1.min(y2).clamp(0, self.rows - 1);
        let gy2 = y1.max(y2).clamp(0, self.rows - 1);
        for gy in gy1..=gy2 {
            for gx in gx1..=gx2 {
                self.mark_blocked(gx, gy, layer, net, is_obstacle);
            }
        }
    }

    /// World-space keep-out: block the clearance-inflated rectangle as a
    /// static obstacle.
    pub fn mark_obstacle(&mut self, rect: Rect, layer: i32, clearance: f64) {
        let inflated = rect.inflate(clearance);
        let (gx1, gy1) = self.world_to_grid(inflated.min.x, inflated.min.y);
        let (gx2, gy2) = self.world_to_grid(inflated.max.x, inflated.max.y);
        self.mark_rect_blocked(gx1, gy1, gx2, gy2, layer, 0, true);
    }

    /// Mark a trace segment between two world points, inflating every line
    /// cell into a `(2k+1)^2` square so the blocked region carries the
    /// trace's clearance band.
    pub fn mark_segment(
        &mut self,
        x1: f64,
        y1: f64,
        x2: f64,
        y2: f64,
        layer: i32,
        net: i32,
        clearance_cells: i32,
    ) {
        if layer < 0 || layer >= self.layers {
            return;
        }
        let (gx1, gy1) = self.world_to_grid(x1, y1);
        let (gx2, gy2) = self.world_to_grid(x2, y2);
        for (gx, gy) in line_cells(gx1, gy1, gx2, gy2) {
            self.stamp_square(gx, gy, layer, net, clearance_cells);
        }
    }

    /// Mark a through-hole via: the same square footprint on every layer.
    pub fn mark_via(&mut self, x: f64, y: f64, net: i32, radius_cells: i32) {
        let (gx, gy) = self.world_to_grid(x, y);
        for layer in 0..self.layers {
            self.stamp_square(gx, gy, layer, net, radius_cells);
        }
    }

    /// Rip-up of `mark_segment`. Pad cells stay blocked and recover their
    /// pad's net, zone copper stays, cells of other nets are untouched.
    /// Congestion counters are deliberately left as-is.
    pub fn unmark_segment(
        &mut self,
        x1: f64,
        y1: f64,
        x2: f64,
        y2: f64,
        layer: i32,
        net: i32,
        clearance_cells: i32,
    ) {
        if layer < 0 || layer >= self.layers {
            return;
        }
        let (gx1, gy1) = self.world_to_grid(x1, y1);
        let (gx2, gy2) = self.world_to_grid(x2, y2);
        for (gx, gy) in line_cells(gx1, gy1, gx2, gy2) {
            self.unstamp_square(gx, gy, layer, net, clearance_cells);
        }
    }

    /// Rip-up of `mark_via` across every layer.
    pub fn unmark_via(&mut self, x: f64, y: f64, net: i32, radius_cells: i32) {
        let (gx, gy) = self.world_to_grid(x, y);
        for layer in 0..self.layers {
            self.unstamp_square(gx, gy, layer, net, radius_cells);
        }
    }

    fn stamp_square(&mut self, gx: i32, gy: i32, layer: i32, net: i32, radius: i32) {
        for dy in -radius..=radius {
            for dx in -radius..=radius {
                let (nx, ny) = (gx + dx, gy + dy);
                if !self.is_valid(nx, ny, layer) {
                    continue;
                }
                let idx = self.index(nx, ny, layer);
                if !self.cells[idx].blocked {
                    // First claim on this cell: record the net and count it
                    // toward regional congestion exactly once.
                    self.cells[idx].net = net;
                    self.bump_congestion(nx, ny, layer, 1);
                }
                self.cells[idx].blocked = true;
            }
        }
    }

    fn unstamp_square(&mut self, gx: i32, gy: i32, layer: i32, net: i32, radius: i32) {
        for dy in -radius..=radius {
            for dx in -radius..=radius {
                let (nx, ny) = (gx + dx, gy + dy);
                if !self.is_valid(nx, ny, layer) {
                    continue;
                }
                let idx = self.index(nx, ny, layer);
                let cell = &mut self.cells[idx];
                if cell.pad_blocked {
                    cell.net = cell.original_net;
                } else if cell.is_zone {
                    // Zone copper outlives any route crossing it.
                } else if cell.net == net {
                    cell.blocked = false;
                    cell.net = 0;
                }
            }
        }
    }

    /// Rasterise a component pad. The clearance-inflated footprint is
    /// blocked and tagged `pad_blocked` so rip-up cannot reclaim it; metal
    /// cells take the pad's net, and cells already owned by a different net
    /// become hard obstacles. Through-hole pads block every layer.
    pub fn mark_pad(
        &mut self,
        metal: Rect,
        net: i32,
        layer: i32,
        through_hole: bool,
        clearance: f64,
    ) {
        if !through_hole && (layer < 0 || layer >= self.layers) {
            return;
        }
        let inflated = metal.inflate(clearance);
        let (gx1, gy1) = self.world_to_grid(inflated.min.x, inflated.min.y);
        let (gx2, gy2) = self.world_to_grid(inflated.max.x, inflated.max.y);
        let (mgx1, mgy1) = self.world_to_grid(metal.min.x, metal.min.y);
        let (mgx2, mgy2) = self.world_to_grid(metal.max.x, metal.max.y);
        let center = metal.center();
        let (cgx, cgy) = self.world_to_grid(center.x, center.y);

        let layer_range = if through_hole {
            0..self.layers
        } else {
            layer..layer + 1
        };

        for li in layer_range {
            for gy in gy1..=gy2 {
                for gx in gx1..=gx2 {
                    let cell = self.at_mut(gx, gy, li);
                    cell.blocked = true;
                    cell.pad_blocked = true;
                    cell.original_net = net;

                    let in_metal = gx >= mgx1 && gx <= mgx2 && gy >= mgy1 && gy <= mgy2;
                    if in_metal {
                        if cell.net == 0 {
                            cell.net = net;
                        } else if cell.net != net && net != 0 {
                            cell.is_obstacle = true;
                        }
                    } else if net == 0 {
                        if cell.net != 0 {
                            cell.is_obstacle = true;
                        }
                    } else if cell.net == 0 {
                        cell.net = net;
                    } else if cell.net != net {
                        cell.is_obstacle = true;
                    }
                }
            }
            // The centre cell always answers for the pad's net so the
            // pathfinder's endpoint exception can enter it.
            let cell = self.at_mut(cgx, cgy, li);
            cell.net = net;
            cell.original_net = net;
        }
    }

    /// Copper-fill cells. Blocked and owned by the fill's net; same-net
    /// traces may enter.
    pub fn mark_zone_cells(&mut self, cells: &[(i32, i32)], layer: i32, net: i32) {
        if layer < 0 || layer >= self.layers {
            return;
        }
        for &(gx, gy) in cells {
            if !self.is_valid(gx, gy, layer) {
                continue;
            }
            let cell = self.at_mut(gx, gy, layer);
            cell.blocked = true;
            cell.is_zone = true;
            cell.net = net;
        }
    }

    /// Block every cell within `clearance` of the given board-edge segments
    /// on all layers. Returns the number of newly blocked cells.
    pub fn mark_edge_keepout(
        &mut self,
        edge_segments: &[((f64, f64), (f64, f64))],
        clearance: f64,
    ) -> usize {
        if clearance <= 0.0 || edge_segments.is_empty() {
            return 0;
        }
        let radius = (clearance / self.resolution) as i32 + 1;
        let mut blocked = 0;
        for &((x1, y1), (x2, y2)) in edge_segments {
            let (gx1, gy1) = self.world_to_grid(x1, y1);
            let (gx2, gy2) = self.world_to_grid(x2, y2);
            for (gx, gy) in line_cells(gx1, gy1, gx2, gy2) {
                for dy in -radius..=radius {
                    for dx in -radius..=radius {
                        if dx * dx + dy * dy > radius * radius {
                            continue;
                        }
                        let (nx, ny) = (gx + dx, gy + dy);
                        for layer in 0..self.layers {
                            if !self.is_valid(nx, ny, layer) {
                                continue;
                            }
                            let cell = self.at_mut(nx, ny, layer);
                            if !cell.blocked {
                                cell.blocked = true;
                                cell.is_obstacle = true;
                                blocked += 1;
                            }
                        }
                    }
                }
            }
        }
        blocked
    }

    // ------------------------------------------------------------------
    // Coarse congestion
    // ------------------------------------------------------------------

    #[inline(always)]
    fn congestion_index(&self, x: i32, y: i32, layer: i32) -> usize {
        let cx = (x / CONGESTION_BLOCK).min(self.congestion_cols - 1);
        let cy = (y / CONGESTION_BLOCK).min(self.congestion_rows - 1);
        ((layer * self.congestion_rows + cy) * self.congestion_cols + cx) as usize
    }

    fn bump_congestion(&mut self, x: i32, y: i32, layer: i32, delta: i32) {
        let idx = self.congestion_index(x, y, layer);
        let value = self.congestion[idx] as i64 + delta as i64;
        self.congestion[idx] = value.max(0) as u32;
    }

    /// Occupancy fraction [0, 1] of the coarse block containing the cell.
    pub fn get_congestion(&self, x: i32, y: i32, layer: i32) -> f64 {
        if !self.is_valid(x, y, layer) {
            return 0.0;
        }
        let count = self.congestion[self.congestion_index(x, y, layer)];
        let max_cells = (CONGESTION_BLOCK * CONGESTION_BLOCK) as f64;
        (count as f64 / max_cells).min(1.0)
    }

    pub fn update_congestion(&mut self, x: i32, y: i32, layer: i32, delta: i32) {
        if !self.is_valid(x, y, layer) {
            return;
        }
        self.bump_congestion(x, y, layer, delta);
    }

    pub fn congestion_stats(&self, threshold: f64) -> CongestionStats {
        let max_cells = (CONGESTION_BLOCK * CONGESTION_BLOCK) as f64;
        let mut stats = CongestionStats::default();
        let mut total = 0.0;
        for &count in &self.congestion {
            let density = (count as f64 / max_cells).min(1.0);
            total += density;
            if density > stats.max_congestion {
                stats.max_congestion = density;
            }
            if density > threshold {
                stats.congested_blocks += 1;
            }
        }
        stats.avg_congestion = total / self.congestion.len() as f64;
        stats
    }

    // ------------------------------------------------------------------
    // Negotiated congestion accounting
    // ------------------------------------------------------------------

    /// Clear every usage count (start of a fresh negotiation iteration).
    pub fn reset_usage(&mut self) {
        for cell in &mut self.cells {
            cell.usage_count = 0;
        }
    }

    pub fn increment_usage(&mut self, x: i32, y: i32, layer: i32) {
        if !self.is_valid(x, y, layer) {
            return;
        }
        let cell = self.at_mut(x, y, layer);
        cell.usage_count = cell.usage_count.saturating_add(1);
    }

    /// Present sharing penalty plus accumulated history. Infinite for cells
    /// that can never be shared.
    pub fn get_negotiated_cost(&self, x: i32, y: i32, layer: i32, present_factor: f64) -> f64 {
        if !self.is_valid(x, y, layer) {
            return f64::INFINITY;
        }
        let cell = self.at(x, y, layer);
        if cell.is_obstacle {
            return f64::INFINITY;
        }
        present_factor * cell.usage_count as f64 + cell.history_cost as f64
    }

    /// PathFinder-style escalation: every overused cell gains
    /// `increment * (usage - 1)` of permanent history cost.
    pub fn update_history_costs(&mut self, increment: f64) {
        for cell in &mut self.cells {
            if cell.usage_count > 1 {
                cell.history_cost += (increment * (cell.usage_count - 1) as f64) as f32;
            }
        }
    }

    /// Total sharing overflow; zero means the negotiation has converged.
    pub fn get_total_overflow(&self) -> u64 {
        self.cells
            .iter()
            .map(|c| c.usage_count.max(1) as u64 - 1)
            .sum()
    }

    /// Cells claimed by more than one net, for external rip-up scheduling.
    pub fn overused_cells(&self) -> Vec<(i32, i32, i32, u16)> {
        let mut overused = Vec::new();
        for layer in 0..self.layers {
            for y in 0..self.rows {
                for x in 0..self.cols {
                    let usage = self.cells[self.index(x, y, layer)].usage_count;
                    if usage > 1 {
                        overused.push((x, y, layer, usage));
                    }
                }
            }
        }
        overused
    }
}

/// Inclusive Bresenham walk between two grid points.
fn line_cells(gx1: i32, gy1: i32, gx2: i32, gy2: i32) -> Vec<(i32, i32)> {
    let mut cells = Vec::new();
    let dx = (gx2 - gx1).abs();
    let dy = (gy2 - gy1).abs();
    let sx = if gx1 < gx2 { 1 } else { -1 };
    let sy = if gy1 < gy2 { 1 } else { -1 };
    let mut err = dx - dy;
    let (mut gx, mut gy) = (gx1, gy1);
    loop {
        cells.push((gx, gy));
        if gx == gx2 && gy == gy2 {
            break;
        }
        let e2 = 2 * err;
        if e2 > -dy {
            err -= dy;
            gx += sx;
        }
        if e2 < dx {
            err += dx;
            gy += sy;
        }
    }
    cells
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(grid: &Grid) -> Vec<GridCell> {
        let mut cells = Vec::with_capacity(grid.total_cells());
        for layer in 0..grid.layers() {
            for y in 0..grid.rows() {
                for x in 0..grid.cols() {
                    cells.push(*grid.at(x, y, layer));
                }
            }
        }
        cells
    }

    #[test]
    fn world_grid_conversion_rounds_and_clamps() {
        let grid = Grid::new(20, 20, 1, 0.1, 0.0, 0.0);
        assert_eq!(grid.world_to_grid(0.1, 1.0), (1, 10));
        assert_eq!(grid.world_to_grid(-5.0, 99.0), (0, 19));
        let (wx, wy) = grid.grid_to_world(5, 7);
        assert!((wx - 0.5).abs() < 1e-12);
        assert!((wy - 0.7).abs() < 1e-12);
    }

    #[test]
    fn conversion_respects_origin() {
        let grid = Grid::new(10, 10, 1, 0.5, 75.0, 40.0);
        assert_eq!(grid.world_to_grid(76.0, 41.0), (2, 2));
        let (wx, wy) = grid.grid_to_world(2, 2);
        assert!((wx - 76.0).abs() < 1e-12);
        assert!((wy - 41.0).abs() < 1e-12);
    }

    #[test]
    fn layers_are_independent() {
        let mut grid = Grid::new(4, 4, 2, 0.1, 0.0, 0.0);
        grid.mark_blocked(1, 1, 0, 5, false);
        assert!(grid.at(1, 1, 0).blocked);
        assert_eq!(grid.at(1, 1, 0).net, 5);
        assert!(!grid.at(1, 1, 1).blocked);
    }

    #[test]
    fn valid_and_free_semantics() {
        let mut grid = Grid::new(8, 8, 1, 0.1, 0.0, 0.0);
        grid.mark_blocked(2, 2, 0, 5, false);
        grid.mark_blocked(3, 3, 0, 5, true);
        assert!(grid.is_valid_and_free(1, 1, 0, 5));
        assert!(grid.is_valid_and_free(2, 2, 0, 5));
        assert!(!grid.is_valid_and_free(2, 2, 0, 6));
        assert!(!grid.is_valid_and_free(3, 3, 0, 5));
        assert!(!grid.is_valid_and_free(-1, 0, 0, 5));
        assert!(!grid.is_valid_and_free(0, 0, 1, 5));
    }

    #[test]
    fn rect_marking_is_idempotent() {
        let mut once = Grid::new(20, 20, 1, 0.1, 0.0, 0.0);
        once.mark_rect_blocked(3, 4, 6, 8, 0, 0, true);
        let mut twice = Grid::new(20, 20, 1, 0.1, 0.0, 0.0);
        twice.mark_rect_blocked(3, 4, 6, 8, 0, 0, true);
        twice.mark_rect_blocked(3, 4, 6, 8, 0, 0, true);
        assert_eq!(snapshot(&once), snapshot(&twice));
    }

    #[test]
    fn rect_marking_clamps_out_of_range() {
        let mut grid = Grid::new(20, 20, 1, 0.1, 0.0, 0.0);
        grid.mark_rect_blocked(-5, -5, 100, 2, 0, 0, true);
        assert_eq!(grid.count_blocked(), 20 * 3);
        grid.mark_rect_blocked(0, 0, 5, 5, 3, 0, true);
        assert_eq!(grid.count_blocked(), 20 * 3);
    }

    #[test]
    fn segment_marking_inflates_clearance() {
        let mut grid = Grid::new(20, 20, 1, 0.1, 0.0, 0.0);
        grid.mark_segment(0.5, 1.0, 1.5, 1.0, 0, 7, 2);

        assert!(grid.at(5, 10, 0).blocked);
        assert_eq!(grid.at(5, 10, 0).net, 7);
        assert!(grid.at(5, 8, 0).blocked);
        assert!(grid.at(3, 10, 0).blocked);
        assert!(!grid.at(5, 7, 0).blocked);
        assert!(!grid.at(2, 10, 0).blocked);
    }

    #[test]
    fn congestion_counts_each_cell_once() {
        let mut grid = Grid::new(20, 20, 1, 0.1, 0.0, 0.0);
        grid.mark_segment(0.5, 1.0, 1.5, 1.0, 0, 7, 2);
        let first = grid.get_congestion(5, 10, 0);
        // Cells x 3..=7, y 8..=12 fall in block (0, 1): 25 of 64 cells.
        assert!((first - 25.0 / 64.0).abs() < 1e-9);

        grid.mark_segment(0.5, 1.0, 1.5, 1.0, 0, 7, 2);
        assert_eq!(grid.get_congestion(5, 10, 0), first);
    }

    #[test]
    fn congestion_is_capped_at_one() {
        let mut grid = Grid::new(20, 20, 1, 0.1, 0.0, 0.0);
        grid.update_congestion(0, 0, 0, 1000);
        assert_eq!(grid.get_congestion(0, 0, 0), 1.0);
        assert_eq!(grid.get_congestion(5, 15, 0), 0.0);
    }

    #[test]
    fn unmark_frees_own_cells_and_keeps_foreign() {
        let mut grid = Grid::new(20, 20, 1, 0.1, 0.0, 0.0);
        grid.mark_segment(1.0, 0.5, 1.0, 1.5, 0, 2, 2);
        grid.mark_segment(0.5, 1.0, 1.5, 1.0, 0, 7, 2);

        // Overlap cells were claimed by net 2 first and must stay that way.
        assert_eq!(grid.at(10, 10, 0).net, 2);
        assert_eq!(grid.at(4, 10, 0).net, 7);

        grid.unmark_segment(0.5, 1.0, 1.5, 1.0, 0, 7, 2);
        assert!(!grid.at(4, 10, 0).blocked);
        assert_eq!(grid.at(4, 10, 0).net, 0);
        assert!(grid.at(10, 10, 0).blocked);
        assert_eq!(grid.at(10, 10, 0).net, 2);
    }

    #[test]
    fn world_keepout_is_inflated_by_clearance() {
        let mut grid = Grid::new(20, 20, 1, 0.1, 0.0, 0.0);
        grid.mark_obstacle(Rect::from_center(1.0, 1.0, 0.2, 0.2), 0, 0.2);
        // Metal cells 9..=11 grow by two cells of clearance on each side.
        assert!(grid.at(10, 10, 0).is_obstacle);
        assert!(grid.at(7, 7, 0).is_obstacle);
        assert!(!grid.at(6, 10, 0).blocked);
    }

    #[test]
    fn pad_cells_survive_rip_up() {
        let mut grid = Grid::new(20, 20, 1, 0.1, 0.0, 0.0);
        grid.mark_pad(Rect::from_center(1.0, 1.0, 0.2, 0.2), 3, 0, false, 0.2);
        assert!(grid.at(10, 10, 0).blocked);
        assert!(grid.at(10, 10, 0).pad_blocked);
        assert_eq!(grid.at(10, 10, 0).net, 3);
        assert!(grid.at(7, 7, 0).pad_blocked);

        // Rip-up through the pad footprint, with the pad's own net and with
        // a foreign one: blocked state and pad net must survive both.
        grid.unmark_segment(0.5, 1.0, 1.5, 1.0, 0, 3, 2);
        assert!(grid.at(10, 10, 0).blocked);
        assert_eq!(grid.at(10, 10, 0).net, 3);
        grid.unmark_segment(0.5, 1.0, 1.5, 1.0, 0, 9, 2);
        assert!(grid.at(10, 10, 0).blocked);
        assert_eq!(grid.at(10, 10, 0).net, 3);
    }

    #[test]
    fn conflicting_pads_become_obstacles() {
        let mut grid = Grid::new(20, 20, 1, 0.1, 0.0, 0.0);
        grid.mark_pad(Rect::from_center(1.0, 1.0, 0.4, 0.4), 3, 0, false, 0.1);
        grid.mark_pad(Rect::from_center(1.2, 1.0, 0.4, 0.4), 4, 0, false, 0.1);
        // Cells where the two pads' footprints collide are unroutable.
        assert!(grid.at(11, 10, 0).is_obstacle);
    }

    #[test]
    fn via_marking_covers_all_layers() {
        let mut grid = Grid::new(8, 8, 2, 0.1, 0.0, 0.0);
        grid.mark_via(0.4, 0.4, 5, 1);
        for layer in 0..2 {
            assert!(grid.at(4, 4, layer).blocked);
            assert!(grid.at(3, 3, layer).blocked);
            assert_eq!(grid.at(4, 4, layer).net, 5);
            assert!(!grid.at(6, 6, layer).blocked);
        }

        grid.unmark_via(0.4, 0.4, 5, 1);
        for layer in 0..2 {
            assert!(!grid.at(4, 4, layer).blocked);
            assert_eq!(grid.at(4, 4, layer).net, 0);
        }
    }

    #[test]
    fn through_hole_pad_blocks_every_layer() {
        let mut grid = Grid::new(20, 20, 4, 0.1, 0.0, 0.0);
        grid.mark_pad(Rect::from_center(1.0, 1.0, 0.3, 0.3), 6, 0, true, 0.1);
        for layer in 0..4 {
            assert!(grid.at(10, 10, layer).blocked);
            assert_eq!(grid.at(10, 10, layer).net, 6);
        }
    }

    #[test]
    fn zone_copper_is_enterable_by_its_net_and_survives_rip_up() {
        let mut grid = Grid::new(10, 10, 1, 0.1, 0.0, 0.0);
        grid.mark_zone_cells(&[(2, 2), (2, 3), (3, 2)], 0, 4);
        assert!(grid.at(2, 2, 0).is_zone);
        assert!(grid.is_valid_and_free(2, 2, 0, 4));
        assert!(!grid.is_valid_and_free(2, 2, 0, 5));

        grid.unmark_segment(0.0, 0.2, 0.9, 0.2, 0, 4, 1);
        assert!(grid.at(2, 2, 0).blocked);
        assert_eq!(grid.at(2, 2, 0).net, 4);
    }

    #[test]
    fn edge_keepout_blocks_a_band_on_all_layers() {
        let mut grid = Grid::new(20, 20, 2, 0.1, 0.0, 0.0);
        let blocked = grid.mark_edge_keepout(&[((0.0, 0.0), (1.9, 0.0))], 0.2);
        assert!(blocked > 0);
        for layer in 0..2 {
            assert!(grid.at(5, 0, layer).is_obstacle);
            assert!(grid.at(5, 3, layer).blocked);
            assert!(!grid.at(5, 4, layer).blocked);
        }
    }

    #[test]
    fn negotiated_bookkeeping() {
        let mut grid = Grid::new(10, 10, 1, 0.1, 0.0, 0.0);
        grid.increment_usage(2, 2, 0);
        grid.increment_usage(2, 2, 0);
        grid.increment_usage(5, 5, 0);
        grid.increment_usage(5, 5, 0);
        grid.increment_usage(5, 5, 0);
        assert_eq!(grid.get_total_overflow(), 3);

        let before = grid.get_total_overflow();
        grid.update_history_costs(1.5);
        assert_eq!(grid.get_total_overflow(), before);
        assert!((grid.at(2, 2, 0).history_cost - 1.5).abs() < 1e-6);
        assert!((grid.at(5, 5, 0).history_cost - 3.0).abs() < 1e-6);

        let cost = grid.get_negotiated_cost(2, 2, 0, 2.0);
        assert!((cost - 5.5).abs() < 1e-6);

        let overused = grid.overused_cells();
        assert_eq!(overused.len(), 2);
        assert!(overused.contains(&(5, 5, 0, 3)));

        grid.reset_usage();
        assert_eq!(grid.get_total_overflow(), 0);
        let cost = grid.get_negotiated_cost(2, 2, 0, 2.0);
        assert!((cost - 1.5).abs() < 1e-6);
    }

    #[test]
    fn overflow_is_monotonic_under_usage() {
        let mut grid = Grid::new(10, 10, 1, 0.1, 0.0, 0.0);
        let mut last = grid.get_total_overflow();
        for i in 0..5 {
            grid.increment_usage(i, i, 0);
            grid.increment_usage(i, i, 0);
            let now = grid.get_total_overflow();
            assert!(now >= last);
            last = now;
        }
    }

    #[test]
    fn negotiated_cost_is_infinite_off_grid_and_on_obstacles() {
        let mut grid = Grid::new(10, 10, 1, 0.1, 0.0, 0.0);
        grid.mark_blocked(3, 3, 0, 0, true);
        assert!(grid.get_negotiated_cost(-1, 0, 0, 1.0).is_infinite());
        assert!(grid.get_negotiated_cost(3, 3, 0, 1.0).is_infinite());
        assert_eq!(grid.get_negotiated_cost(4, 4, 0, 1.0), 0.0);
    }

    #[test]
    fn size_queries() {
        let grid = Grid::new(100, 50, 2, 0.1, 0.0, 0.0);
        assert_eq!(grid.total_cells(), 100 * 50 * 2);
        assert_eq!(grid.count_blocked(), 0);
        assert!(grid.memory_mb() > 0.0);
    }

    #[test]
    fn congestion_stats_reflect_marks() {
        let mut grid = Grid::new(16, 16, 1, 0.1, 0.0, 0.0);
        let stats = grid.congestion_stats(0.5);
        assert_eq!(stats.congested_blocks, 0);

        // Fill one whole 8x8 block with copper.
        grid.mark_rect_blocked(0, 0, 7, 7, 0, 0, true);
        for y in 0..8 {
            for x in 0..8 {
                grid.update_congestion(x, y, 0, 1);
            }
        }
        let stats = grid.congestion_stats(0.5);
        assert_eq!(stats.max_congestion, 1.0);
        assert_eq!(stats.congested_blocks, 1);
        assert!(stats.avg_congestion > 0.0);
    }
}
