use super::point::Point;

/// Axis-aligned rectangle in world coordinates (millimetres). Pad metal and
/// keep-out shapes are described this way before being rasterised into a
/// routing grid.
#[derive(Clone, Copy, Debug)]
pub struct Rect {
    pub min: Point<f64>,
    pub max: Point<f64>,
}

impl Rect {
    /// Rectangle of `width` x `height` centred on (cx, cy).
    pub fn from_center(cx: f64, cy: f64, width: f64, height: f64) -> Self {
        Self {
            min: Point::new(cx - width / 2.0, cy - height / 2.0),
            max: Point::new(cx + width / 2.0, cy + height / 2.0),
        }
    }

    pub fn center(&self) -> Point<f64> {
        Point::new(
            (self.min.x + self.max.x) / 2.0,
            (self.min.y + self.max.y) / 2.0,
        )
    }

    /// Grow the rectangle by `margin` on every side. Used to add clearance
    /// bands around copper shapes before rasterising them into the grid.
    pub fn inflate(&self, margin: f64) -> Rect {
        Rect {
            min: Point::new(self.min.x - margin, self.min.y - margin),
            max: Point::new(self.max.x + margin, self.max.y + margin),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_center_and_inflate() {
        let r = Rect::from_center(5.0, 5.0, 2.0, 1.0);
        assert_eq!(r.min.x, 4.0);
        assert_eq!(r.max.x, 6.0);
        assert_eq!(r.min.y, 4.5);
        assert_eq!(r.max.y, 5.5);

        let grown = r.inflate(0.5);
        assert_eq!(grown.min.x, 3.5);
        assert_eq!(grown.max.y, 6.0);
        assert_eq!(grown.center().x, r.center().x);
        assert_eq!(grown.center().y, r.center().y);
    }
}
