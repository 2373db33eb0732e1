pub mod algo;
pub mod grid;
pub mod types;
pub mod utils;

pub use algo::astar::Pathfinder;
pub use grid::{Grid, GridCell};
pub use types::{RouteRequest, RouteResult, Segment, Via};
