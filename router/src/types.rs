use pcb_common::util::config::SearchConfig;
use std::cmp::Ordering;

/// One straight run of copper on a single layer.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Segment {
    pub x1: f64,
    pub y1: f64,
    pub x2: f64,
    pub y2: f64,
    pub width: f64,
    pub layer: i32,
    pub net: i32,
}

impl Segment {
    pub fn length(&self) -> f64 {
        ((self.x2 - self.x1).powi(2) + (self.y2 - self.y1).powi(2)).sqrt()
    }
}

/// A plated hole joining two copper layers.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Via {
    pub x: f64,
    pub y: f64,
    pub drill: f64,
    pub diameter: f64,
    pub layer_from: i32,
    pub layer_to: i32,
    pub net: i32,
}

/// The outcome of one routing episode. A failed search carries no geometry.
#[derive(Clone, Debug, Default)]
pub struct RouteResult {
    pub segments: Vec<Segment>,
    pub vias: Vec<Via>,
    pub net: i32,
    pub success: bool,
}

impl RouteResult {
    pub fn failed(net: i32) -> Self {
        Self {
            segments: Vec::new(),
            vias: Vec::new(),
            net,
            success: false,
        }
    }

    /// Total routed copper length in millimetres.
    pub fn length(&self) -> f64 {
        self.segments.iter().map(|s| s.length()).sum()
    }
}

/// Inputs for one `route` call.
///
/// `start_layers` / `end_layers` model multi-layer (plated-through-hole)
/// pads: when non-empty they replace the single `start_layer` / `end_layer`.
#[derive(Clone, Debug)]
pub struct RouteRequest {
    pub start: (f64, f64),
    pub end: (f64, f64),
    pub start_layer: i32,
    pub end_layer: i32,
    pub start_layers: Vec<i32>,
    pub end_layers: Vec<i32>,
    pub net: i32,
    pub negotiated_mode: bool,
    pub present_cost_factor: f64,
    pub weight: f64,
}

impl RouteRequest {
    pub fn new(start: (f64, f64), start_layer: i32, end: (f64, f64), end_layer: i32, net: i32) -> Self {
        Self {
            start,
            end,
            start_layer,
            end_layer,
            start_layers: Vec::new(),
            end_layers: Vec::new(),
            net,
            negotiated_mode: false,
            present_cost_factor: 0.0,
            weight: 1.0,
        }
    }

    /// Like `new`, but with the A* weight and the negotiation pricing taken
    /// from configuration. Negotiated mode still starts disabled; a caller
    /// that turns it on inherits the configured present-cost factor.
    pub fn from_config(
        search: &SearchConfig,
        start: (f64, f64),
        start_layer: i32,
        end: (f64, f64),
        end_layer: i32,
        net: i32,
    ) -> Self {
        let mut request = Self::new(start, start_layer, end, end_layer, net);
        request.weight = search.heuristic_weight;
        request.present_cost_factor = search.present_cost_factor;
        request
    }
}

/// Search-state record. Nodes are value types; parents are indices into the
/// pop-ordered closed list (-1 marks a root), never pointers into the heap.
#[derive(Clone, Copy, Debug)]
pub struct AStarNode {
    pub f_score: f64,
    pub g_score: f64,
    pub x: i32,
    pub y: i32,
    pub layer: i32,
    pub parent: i32,
    pub via_from_parent: bool,
    pub dx: i32,
    pub dy: i32,
}

impl PartialEq for AStarNode {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for AStarNode {}

impl Ord for AStarNode {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reversed so BinaryHeap pops the lowest f-score; prefer the lower
        // g-score on ties.
        other
            .f_score
            .total_cmp(&self.f_score)
            .then_with(|| other.g_score.total_cmp(&self.g_score))
    }
}

impl PartialOrd for AStarNode {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
