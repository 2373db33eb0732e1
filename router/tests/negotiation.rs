use pcb_common::util::config::{DesignRules, RouterConfig};
use pcb_router::{Grid, Pathfinder, RouteRequest, RouteResult};

fn fine_rules() -> DesignRules {
    DesignRules {
        trace_width: 0.1,
        trace_clearance: 0.1,
        via_diameter: 0.3,
        via_clearance: 0.1,
        grid_resolution: 0.1,
        cost_turn: 0.0,
        ..Default::default()
    }
}

fn centerline_cells(grid: &Grid, result: &RouteResult) -> Vec<(i32, i32, i32)> {
    let mut cells = Vec::new();
    for seg in &result.segments {
        let steps = ((seg.length() / (grid.resolution() / 2.0)).ceil() as usize).max(1);
        for i in 0..=steps {
            let t = i as f64 / steps as f64;
            let x = seg.x1 + (seg.x2 - seg.x1) * t;
            let y = seg.y1 + (seg.y2 - seg.y1) * t;
            let (gx, gy) = grid.world_to_grid(x, y);
            if !cells.contains(&(gx, gy, seg.layer)) {
                cells.push((gx, gy, seg.layer));
            }
        }
    }
    cells
}

fn shared_cells(grid: &Grid, result: &RouteResult) -> usize {
    centerline_cells(grid, result)
        .iter()
        .filter(|&&(x, y, layer)| grid.at(x, y, layer).usage_count > 0)
        .count()
}

#[test]
fn crossing_a_routed_net_needs_negotiated_mode() {
    let mut grid = Grid::new(20, 20, 1, 0.1, 0.0, 0.0);
    let rules = fine_rules();
    let mut pathfinder = Pathfinder::new(&grid, &rules, false);

    // Net 1 is committed as a full-height vertical wall of copper.
    grid.mark_segment(1.0, 0.0, 1.0, 1.9, 0, 1, pathfinder.trace_clearance_cells());

    let mut req = RouteRequest::new((0.1, 1.0), 0, (1.9, 1.0), 0, 2);
    let standard = pathfinder.route(&grid, &req);
    assert!(!standard.success);

    // Negotiated mode alone does not help: nothing claims those cells, so
    // they read as static copper.
    req.negotiated_mode = true;
    req.present_cost_factor = 1.0;
    let unclaimed = pathfinder.route(&grid, &req);
    assert!(!unclaimed.success);

    // Once net 1's footprint is registered as live usage, net 2 may rent it.
    for y in 0..20 {
        for x in 8..=12 {
            grid.increment_usage(x, y, 0);
        }
    }
    let negotiated = pathfinder.route(&grid, &req);
    assert!(negotiated.success);
    let crossing = centerline_cells(&grid, &negotiated)
        .iter()
        .filter(|&&(x, _, _)| (8..=12).contains(&x))
        .count();
    assert!(crossing > 0);
}

#[test]
fn negotiated_routes_prefer_unclaimed_cells() {
    let mut grid = Grid::new(20, 20, 1, 0.1, 0.0, 0.0);
    let rules = fine_rules();
    let mut pathfinder = Pathfinder::new(&grid, &rules, false);

    // Net 1's centreline occupies row 10 without blocking it.
    for x in 1..=18 {
        grid.increment_usage(x, 10, 0);
    }

    let mut req = RouteRequest::new((0.1, 1.0), 0, (1.9, 1.0), 0, 2);
    req.negotiated_mode = true;
    req.present_cost_factor = 5.0;
    let first = pathfinder.route(&grid, &req);
    assert!(first.success);

    // Renting seventeen cells costs far more than a two-cell detour, so the
    // route ducks out of the occupied row immediately.
    let first_shared = shared_cells(&grid, &first);
    assert!(first_shared <= 2, "route shares {} occupied cells", first_shared);

    // History escalation never makes the sharing worse.
    grid.update_history_costs(1.0);
    let second = pathfinder.route(&grid, &req);
    assert!(second.success);
    assert!(shared_cells(&grid, &second) <= first_shared);
}

#[test]
fn forced_sharing_shows_up_as_overflow_and_history() {
    let config = RouterConfig::default();
    let mut grid = Grid::new(20, 20, 1, 0.1, 0.0, 0.0);
    let rules = fine_rules();
    let mut pathfinder = Pathfinder::new(&grid, &rules, false);

    // A wall with a single gap at (10, 10): every horizontal net must use it.
    grid.mark_rect_blocked(10, 0, 10, 9, 0, 0, true);
    grid.mark_rect_blocked(10, 11, 10, 19, 0, 0, true);

    let mut req_a = RouteRequest::from_config(&config.search, (0.1, 1.0), 0, (1.9, 1.0), 0, 1);
    req_a.negotiated_mode = true;
    let route_a = pathfinder.route(&grid, &req_a);
    assert!(route_a.success);
    for (x, y, layer) in centerline_cells(&grid, &route_a) {
        grid.increment_usage(x, y, layer);
    }
    assert_eq!(grid.get_total_overflow(), 0);

    let mut req_b = RouteRequest::from_config(&config.search, (0.1, 0.8), 0, (1.9, 0.8), 0, 2);
    req_b.negotiated_mode = true;
    let route_b = pathfinder.route(&grid, &req_b);
    assert!(route_b.success);
    for (x, y, layer) in centerline_cells(&grid, &route_b) {
        grid.increment_usage(x, y, layer);
    }

    // Both nets rent the gap cell; the scheduler can see the conflict.
    assert!(grid.get_total_overflow() >= 1);
    let overused = grid.overused_cells();
    assert!(overused.iter().any(|&(x, y, _, _)| x == 10 && y == 10));

    let increment = config.search.history_increment;
    grid.update_history_costs(increment);
    assert!(grid.at(10, 10, 0).history_cost >= increment as f32);
    // Overflow is a pure function of usage; history changes leave it alone.
    assert!(grid.get_total_overflow() >= 1);

    // A third net still converges through the (now expensive) gap.
    let mut req_c = RouteRequest::from_config(&config.search, (0.1, 1.2), 0, (1.9, 1.2), 0, 3);
    req_c.negotiated_mode = true;
    let route_c = pathfinder.route(&grid, &req_c);
    assert!(route_c.success);

    // A fresh negotiation iteration starts from zero usage but keeps the
    // history pressure on the gap.
    grid.reset_usage();
    assert_eq!(grid.get_total_overflow(), 0);
    assert!(grid.at(10, 10, 0).history_cost >= increment as f32);
}
