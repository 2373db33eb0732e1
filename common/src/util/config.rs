use anyhow::Context;
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Deserialize)]
pub struct RouterConfig {
    #[serde(default)]
    pub rules: DesignRules,
    #[serde(default)]
    pub search: SearchConfig,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            rules: DesignRules::default(),
            search: SearchConfig::default(),
        }
    }
}

impl RouterConfig {
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {:?}", path))?;
        toml::from_str(&text).with_context(|| format!("Invalid config TOML in {:?}", path))
    }
}

/// Per-net geometry and cost parameters. Distances are in millimetres;
/// costs are in grid-step units consumed by the pathfinder.
#[derive(Debug, Deserialize, Clone)]
pub struct DesignRules {
    #[serde(default = "default_trace_width")]
    pub trace_width: f64,
    #[serde(default = "default_trace_clearance")]
    pub trace_clearance: f64,
    #[serde(default = "default_via_drill")]
    pub via_drill: f64,
    #[serde(default = "default_via_diameter")]
    pub via_diameter: f64,
    #[serde(default = "default_via_clearance")]
    pub via_clearance: f64,
    #[serde(default = "default_grid_resolution")]
    pub grid_resolution: f64,
    #[serde(default = "default_cost_straight")]
    pub cost_straight: f64,
    #[serde(default = "default_cost_turn")]
    pub cost_turn: f64,
    #[serde(default = "default_cost_via")]
    pub cost_via: f64,
    #[serde(default = "default_cost_congestion")]
    pub cost_congestion: f64,
    #[serde(default = "default_congestion_threshold")]
    pub congestion_threshold: f64,
}

impl Default for DesignRules {
    fn default() -> Self {
        Self {
            trace_width: default_trace_width(),
            trace_clearance: default_trace_clearance(),
            via_drill: default_via_drill(),
            via_diameter: default_via_diameter(),
            via_clearance: default_via_clearance(),
            grid_resolution: default_grid_resolution(),
            cost_straight: default_cost_straight(),
            cost_turn: default_cost_turn(),
            cost_via: default_cost_via(),
            cost_congestion: default_cost_congestion(),
            congestion_threshold: default_congestion_threshold(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct SearchConfig {
    #[serde(default = "default_diagonal_routing")]
    pub diagonal_routing: bool,
    #[serde(default = "default_heuristic_weight")]
    pub heuristic_weight: f64,
    #[serde(default = "default_present_cost_factor")]
    pub present_cost_factor: f64,
    #[serde(default = "default_history_increment")]
    pub history_increment: f64,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            diagonal_routing: default_diagonal_routing(),
            heuristic_weight: default_heuristic_weight(),
            present_cost_factor: default_present_cost_factor(),
            history_increment: default_history_increment(),
        }
    }
}

fn default_trace_width() -> f64 {
    0.2
}

fn default_trace_clearance() -> f64 {
    0.15
}

fn default_via_drill() -> f64 {
    0.3
}

fn default_via_diameter() -> f64 {
    0.6
}

fn default_via_clearance() -> f64 {
    0.15
}

fn default_grid_resolution() -> f64 {
    0.1
}

fn default_cost_straight() -> f64 {
    1.0
}

fn default_cost_turn() -> f64 {
    5.0
}

fn default_cost_via() -> f64 {
    25.0
}

fn default_cost_congestion() -> f64 {
    10.0
}

fn default_congestion_threshold() -> f64 {
    0.5
}

fn default_diagonal_routing() -> bool {
    true
}

fn default_heuristic_weight() -> f64 {
    1.5
}

fn default_present_cost_factor() -> f64 {
    1.0
}

fn default_history_increment() -> f64 {
    1.0
}
