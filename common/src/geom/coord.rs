/// A cell position in a 3-D routing grid: column, row, copper layer.
///
/// Coordinates are signed so footprint scans may step outside the grid and
/// be rejected by a bounds check rather than wrapping.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct GridCoord {
    pub x: i32,
    pub y: i32,
    pub layer: i32,
}

impl GridCoord {
    #[inline(always)]
    pub fn new(x: i32, y: i32, layer: i32) -> Self {
        Self { x, y, layer }
    }
}
