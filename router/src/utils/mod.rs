pub mod generator;
pub mod visualization;
