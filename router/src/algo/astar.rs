use crate::grid::{Grid, GridCell};
use crate::types::{AStarNode, RouteRequest, RouteResult, Segment, Via};
use pcb_common::geom::coord::GridCoord;
use pcb_common::util::config::{DesignRules, SearchConfig};
use rustc_hash::{FxHashMap, FxHashSet};
use std::collections::BinaryHeap;

/// Cost multiplier for a 45-degree step (~sqrt(2)).
const DIAG_COST: f64 = 1.414;

/// World-space tolerance below which two path points count as coincident.
const COINCIDENT_EPS: f64 = 0.01;

/// Weighted A* search over a [`Grid`].
///
/// The pathfinder is a pure reader of the grid: it borrows it for the
/// duration of each `route` call and leaves all marking to the caller. The
/// only state kept between calls is the precomputed neighbour set, the
/// clearance radii and the routable-layer list.
pub struct Pathfinder {
    rules: DesignRules,
    diagonal_routing: bool,
    neighbors_2d: Vec<(i32, i32, f64)>,
    trace_clear_cells: i32,
    via_clear_cells: i32,
    routable_layers: Vec<i32>,
    iterations: usize,
    nodes_explored: usize,
}

impl Pathfinder {
    pub fn new(grid: &Grid, rules: &DesignRules, diagonal_routing: bool) -> Self {
        let mut neighbors_2d: Vec<(i32, i32, f64)> =
            vec![(1, 0, 1.0), (-1, 0, 1.0), (0, 1, 1.0), (0, -1, 1.0)];
        if diagonal_routing {
            neighbors_2d.push((1, 1, DIAG_COST));
            neighbors_2d.push((-1, 1, DIAG_COST));
            neighbors_2d.push((1, -1, DIAG_COST));
            neighbors_2d.push((-1, -1, DIAG_COST));
        }

        // The blocking radius is half-width PLUS clearance: stepping onto a
        // cell claims everything the finished trace must keep clear, so
        // clearance is a hard constraint during the search, not an
        // afterthought.
        let trace_clear_cells = (((rules.trace_width / 2.0 + rules.trace_clearance)
            / grid.resolution())
        .ceil() as i32)
            .max(1);
        let via_clear_cells = (((rules.via_diameter / 2.0 + rules.via_clearance)
            / grid.resolution())
        .ceil() as i32)
            .max(1);

        Self {
            rules: rules.clone(),
            diagonal_routing,
            neighbors_2d,
            trace_clear_cells,
            via_clear_cells,
            routable_layers: (0..grid.layers()).collect(),
            iterations: 0,
            nodes_explored: 0,
        }
    }

    /// Build a pathfinder with the search knobs taken from configuration.
    pub fn from_config(grid: &Grid, rules: &DesignRules, search: &SearchConfig) -> Self {
        Self::new(grid, rules, search.diagonal_routing)
    }

    /// Restrict layer changes to the given layers (skip plane layers).
    pub fn set_routable_layers(&mut self, layers: Vec<i32>) {
        self.routable_layers = layers;
    }

    /// Heap pops performed by the last `route` call.
    pub fn iterations(&self) -> usize {
        self.iterations
    }

    /// Closed-set size of the last `route` call.
    pub fn nodes_explored(&self) -> usize {
        self.nodes_explored
    }

    /// Trace footprint radius in cells; callers mark accepted routes with
    /// this inflation so the grid matches what the search assumed.
    pub fn trace_clearance_cells(&self) -> i32 {
        self.trace_clear_cells
    }

    /// Via footprint radius in cells.
    pub fn via_clearance_cells(&self) -> i32 {
        self.via_clear_cells
    }

    fn is_trace_blocked(
        &self,
        grid: &Grid,
        x: i32,
        y: i32,
        layer: i32,
        net: i32,
        allow_sharing: bool,
    ) -> bool {
        for dy in -self.trace_clear_cells..=self.trace_clear_cells {
            for dx in -self.trace_clear_cells..=self.trace_clear_cells {
                let (cx, cy) = (x + dx, y + dy);
                if !grid.is_valid(cx, cy, layer) {
                    return true;
                }
                if cell_blocks(grid.at(cx, cy, layer), net, allow_sharing) {
                    return true;
                }
            }
        }
        false
    }

    /// Corner-cutting guard: a 45-degree step is rejected when either of the
    /// two orthogonal cells it slides past is blocked.
    fn is_diagonal_blocked(
        &self,
        grid: &Grid,
        x: i32,
        y: i32,
        dx: i32,
        dy: i32,
        layer: i32,
        net: i32,
        allow_sharing: bool,
    ) -> bool {
        if dx == 0 || dy == 0 {
            return false;
        }
        for (cx, cy) in [(x, y + dy), (x + dx, y)] {
            if !grid.is_valid(cx, cy, layer) {
                return true;
            }
            if cell_blocks(grid.at(cx, cy, layer), net, allow_sharing) {
                return true;
            }
        }
        false
    }

    /// Through-hole vias occupy every layer, so the footprint is checked on
    /// every layer of the stack, not just the routable ones.
    fn is_via_blocked(&self, grid: &Grid, x: i32, y: i32, net: i32, allow_sharing: bool) -> bool {
        for layer in 0..grid.layers() {
            for dy in -self.via_clear_cells..=self.via_clear_cells {
                for dx in -self.via_clear_cells..=self.via_clear_cells {
                    let (cx, cy) = (x + dx, y + dy);
                    if !grid.is_valid(cx, cy, layer) {
                        return true;
                    }
                    if cell_blocks(grid.at(cx, cy, layer), net, allow_sharing) {
                        return true;
                    }
                }
            }
        }
        false
    }

    fn heuristic(
        &self,
        x: i32,
        y: i32,
        layer: i32,
        goal_x: i32,
        goal_y: i32,
        goal_layer: i32,
    ) -> f64 {
        let dx = (x - goal_x).abs() as f64;
        let dy = (y - goal_y).abs() as f64;
        let mut h = if self.diagonal_routing {
            // Octile distance.
            dx.max(dy) + (DIAG_COST - 1.0) * dx.min(dy)
        } else {
            dx + dy
        };
        if layer != goal_layer {
            h += self.rules.cost_via;
        }
        h * self.rules.cost_straight
    }

    fn congestion_cost(&self, grid: &Grid, x: i32, y: i32, layer: i32) -> f64 {
        let congestion = grid.get_congestion(x, y, layer);
        if congestion > self.rules.congestion_threshold {
            let excess = congestion - self.rules.congestion_threshold;
            self.rules.cost_congestion * (1.0 + excess * 2.0)
        } else {
            0.0
        }
    }

    /// Route one connection. Returns `success = false` with empty geometry
    /// when the open set drains or the iteration cap is hit; the grid is
    /// never mutated.
    pub fn route(&mut self, grid: &Grid, req: &RouteRequest) -> RouteResult {
        let (start_gx, start_gy) = grid.world_to_grid(req.start.0, req.start.1);
        let (end_gx, end_gy) = grid.world_to_grid(req.end.0, req.end.1);

        let start_layers: Vec<i32> = if req.start_layers.is_empty() {
            vec![req.start_layer]
        } else {
            req.start_layers.clone()
        };
        let end_layers: Vec<i32> = if req.end_layers.is_empty() {
            vec![req.end_layer]
        } else {
            req.end_layers.clone()
        };
        // The heuristic aims at the first listed end layer; the goal test
        // accepts any of them.
        let goal_layer = end_layers[0];

        let mut open_set: BinaryHeap<AStarNode> = BinaryHeap::new();
        let mut closed_set: FxHashSet<GridCoord> = FxHashSet::default();
        let mut g_scores: FxHashMap<GridCoord, f64> = FxHashMap::default();
        let mut closed_list: Vec<AStarNode> = Vec::new();

        for &sl in &start_layers {
            let h = self.heuristic(start_gx, start_gy, sl, end_gx, end_gy, goal_layer);
            open_set.push(AStarNode {
                f_score: h,
                g_score: 0.0,
                x: start_gx,
                y: start_gy,
                layer: sl,
                parent: -1,
                via_from_parent: false,
                dx: 0,
                dy: 0,
            });
            g_scores.insert(GridCoord::new(start_gx, start_gy, sl), 0.0);
        }

        let max_iterations = grid.cols() as usize * grid.rows() as usize * 4;
        self.iterations = 0;
        self.nodes_explored = 0;

        while self.iterations < max_iterations {
            let Some(current) = open_set.pop() else {
                break;
            };
            self.iterations += 1;

            if !closed_set.insert(GridCoord::new(current.x, current.y, current.layer)) {
                continue;
            }
            let current_idx = closed_list.len() as i32;
            closed_list.push(current);
            self.nodes_explored += 1;

            if current.x == end_gx && current.y == end_gy && end_layers.contains(&current.layer) {
                return self.reconstruct(grid, &closed_list, current_idx, req);
            }

            for &(dx, dy, cost_mult) in &self.neighbors_2d {
                let nx = current.x + dx;
                let ny = current.y + dy;
                let nlayer = current.layer;
                if !grid.is_valid(nx, ny, nlayer) {
                    continue;
                }

                if dx != 0
                    && dy != 0
                    && self.is_diagonal_blocked(
                        grid,
                        current.x,
                        current.y,
                        dx,
                        dy,
                        nlayer,
                        req.net,
                        req.negotiated_mode,
                    )
                {
                    continue;
                }

                let cell = grid.at(nx, ny, nlayer);
                if cell.blocked {
                    // A blocked cell is still enterable when it is the pad
                    // centre of this connection's own endpoints.
                    let is_start =
                        nx == start_gx && ny == start_gy && start_layers.contains(&nlayer);
                    let is_end = nx == end_gx && ny == end_gy && end_layers.contains(&nlayer);
                    if is_start || is_end {
                        if cell.net != req.net {
                            continue;
                        }
                    } else if self.is_trace_blocked(
                        grid,
                        nx,
                        ny,
                        nlayer,
                        req.net,
                        req.negotiated_mode,
                    ) {
                        continue;
                    }
                }

                let neighbor_key = GridCoord::new(nx, ny, nlayer);
                if closed_set.contains(&neighbor_key) {
                    continue;
                }

                let turn_cost = if (current.dx != 0 || current.dy != 0)
                    && (current.dx != dx || current.dy != dy)
                {
                    self.rules.cost_turn
                } else {
                    0.0
                };
                let congestion_cost = self.congestion_cost(grid, nx, ny, nlayer);
                let negotiated_cost = if req.negotiated_mode {
                    grid.get_negotiated_cost(nx, ny, nlayer, req.present_cost_factor)
                } else {
                    0.0
                };

                let new_g = current.g_score
                    + cost_mult * self.rules.cost_straight
                    + turn_cost
                    + congestion_cost
                    + negotiated_cost;

                if g_scores.get(&neighbor_key).map_or(true, |&g| new_g < g) {
                    g_scores.insert(neighbor_key, new_g);
                    let h = self.heuristic(nx, ny, nlayer, end_gx, end_gy, goal_layer);
                    open_set.push(AStarNode {
                        f_score: new_g + req.weight * h,
                        g_score: new_g,
                        x: nx,
                        y: ny,
                        layer: nlayer,
                        parent: current_idx,
                        via_from_parent: false,
                        dx,
                        dy,
                    });
                }
            }

            // Layer changes.
            if self.routable_layers.iter().any(|&l| l != current.layer)
                && !self.is_via_blocked(grid, current.x, current.y, req.net, req.negotiated_mode)
            {
                for &new_layer in &self.routable_layers {
                    if new_layer == current.layer {
                        continue;
                    }
                    let neighbor_key = GridCoord::new(current.x, current.y, new_layer);
                    if closed_set.contains(&neighbor_key) {
                        continue;
                    }

                    let congestion_cost =
                        self.congestion_cost(grid, current.x, current.y, new_layer);
                    let negotiated_cost = if req.negotiated_mode {
                        grid.get_negotiated_cost(
                            current.x,
                            current.y,
                            new_layer,
                            req.present_cost_factor,
                        )
                    } else {
                        0.0
                    };
                    let new_g =
                        current.g_score + self.rules.cost_via + congestion_cost + negotiated_cost;

                    if g_scores.get(&neighbor_key).map_or(true, |&g| new_g < g) {
                        g_scores.insert(neighbor_key, new_g);
                        let h = self.heuristic(
                            current.x,
                            current.y,
                            new_layer,
                            end_gx,
                            end_gy,
                            goal_layer,
                        );
                        open_set.push(AStarNode {
                            f_score: new_g + req.weight * h,
                            g_score: new_g,
                            x: current.x,
                            y: current.y,
                            layer: new_layer,
                            parent: current_idx,
                            via_from_parent: true,
                            dx: current.dx,
                            dy: current.dy,
                        });
                    }
                }
            }
        }

        RouteResult::failed(req.net)
    }

    /// Walk parent indices back to a root, then emit segments and vias.
    /// Consecutive collinear steps on one layer merge into a single segment;
    /// vias flush the current run so they always sit on segment endpoints.
    fn reconstruct(
        &self,
        grid: &Grid,
        closed_list: &[AStarNode],
        end_idx: i32,
        req: &RouteRequest,
    ) -> RouteResult {
        let mut path: Vec<(f64, f64, i32, bool)> = Vec::new();
        let mut idx = end_idx;
        while idx >= 0 && (idx as usize) < closed_list.len() {
            let node = &closed_list[idx as usize];
            let (wx, wy) = grid.grid_to_world(node.x, node.y);
            path.push((wx, wy, node.layer, node.via_from_parent));
            idx = node.parent;
        }
        path.reverse();

        let mut result = RouteResult {
            segments: Vec::new(),
            vias: Vec::new(),
            net: req.net,
            success: true,
        };
        if path.len() < 2 {
            return result;
        }

        let (mut cx, mut cy) = req.start;
        let mut current_layer = path[0].2;
        // Anchor of the collinear run currently being accumulated.
        let (mut run_x, mut run_y) = (cx, cy);
        let mut run_dir: Option<(f64, f64)> = None;

        for &(wx, wy, layer, via) in &path {
            if via {
                if moved(run_x, run_y, cx, cy) {
                    result.segments.push(self.segment(run_x, run_y, cx, cy, current_layer, req.net));
                }
                run_x = cx;
                run_y = cy;
                run_dir = None;
                result.vias.push(Via {
                    x: cx,
                    y: cy,
                    drill: self.rules.via_drill,
                    diameter: self.rules.via_diameter,
                    layer_from: current_layer,
                    layer_to: layer,
                    net: req.net,
                });
                current_layer = layer;
            } else if (wx - cx).abs() > COINCIDENT_EPS || (wy - cy).abs() > COINCIDENT_EPS {
                let step = (wx - cx, wy - cy);
                let collinear = run_dir.map_or(false, |dir| {
                    (dir.0 * step.1 - dir.1 * step.0).abs() < 1e-6
                        && dir.0 * step.0 + dir.1 * step.1 > 0.0
                });
                if !collinear {
                    if moved(run_x, run_y, cx, cy) {
                        result
                            .segments
                            .push(self.segment(run_x, run_y, cx, cy, current_layer, req.net));
                    }
                    run_x = cx;
                    run_y = cy;
                    run_dir = Some(step);
                }
                cx = wx;
                cy = wy;
                current_layer = layer;
            }
        }
        if moved(run_x, run_y, cx, cy) {
            result
                .segments
                .push(self.segment(run_x, run_y, cx, cy, current_layer, req.net));
        }

        // Close the gap between the last grid point and the exact end pad.
        let (ex, ey) = req.end;
        if (ex - cx).abs() > COINCIDENT_EPS || (ey - cy).abs() > COINCIDENT_EPS {
            result
                .segments
                .push(self.segment(cx, cy, ex, ey, current_layer, req.net));
        }

        result
    }

    fn segment(&self, x1: f64, y1: f64, x2: f64, y2: f64, layer: i32, net: i32) -> Segment {
        Segment {
            x1,
            y1,
            x2,
            y2,
            width: self.rules.trace_width,
            layer,
            net,
        }
    }
}

#[inline]
fn moved(x1: f64, y1: f64, x2: f64, y2: f64) -> bool {
    (x2 - x1).abs() > 1e-9 || (y2 - y1).abs() > 1e-9
}

/// Shared blocking policy. In standard mode a blocked cell passes only for
/// its own non-obstacle net. In negotiated mode obstacles still block, and
/// so do cells that no live route claims (`usage_count == 0`) unless they
/// already belong to this net; everything else may be shared at a cost.
#[inline]
fn cell_blocks(cell: &GridCell, net: i32, allow_sharing: bool) -> bool {
    if !cell.blocked {
        return false;
    }
    if allow_sharing && !cell.is_obstacle {
        (cell.net == 0 || cell.net != net) && cell.usage_count == 0
    } else {
        cell.is_obstacle || cell.net != net
    }
}
