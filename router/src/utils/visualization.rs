use crate::grid::Grid;
use crate::types::RouteResult;
use image::{Rgba, RgbaImage};
use imageproc::drawing::{draw_filled_circle_mut, draw_filled_rect_mut, draw_line_segment_mut};
use imageproc::rect::Rect as ImageRect;
use std::path::Path;

const LAYER_COLORS: [Rgba<u8>; 6] = [
    Rgba([220, 60, 60, 255]),
    Rgba([60, 120, 255, 255]),
    Rgba([60, 220, 120, 255]),
    Rgba([255, 215, 0, 255]),
    Rgba([180, 50, 255, 255]),
    Rgba([0, 240, 255, 255]),
];

fn layer_color(layer: i32) -> Rgba<u8> {
    LAYER_COLORS[(layer.max(0) as usize) % LAYER_COLORS.len()]
}

fn dim(color: Rgba<u8>) -> Rgba<u8> {
    Rgba([color[0] / 4, color[1] / 4, color[2] / 4, 255])
}

/// Render the grid occupancy and routed copper to a PNG for debugging.
/// Obstacles are grey, net copper is drawn dimmed in its layer colour and
/// routed segments/vias in full layer colour. Y is flipped so the image
/// matches board orientation.
pub fn draw_board(grid: &Grid, routes: &[RouteResult], filename: &str, cell_px: u32) {
    let cell_px = cell_px.max(1);
    let width = grid.cols() as u32 * cell_px;
    let height = grid.rows() as u32 * cell_px;
    let mut img = RgbaImage::from_pixel(width, height, Rgba([20, 20, 20, 255]));

    let obstacle_color = Rgba([90, 90, 95, 255]);
    for layer in 0..grid.layers() {
        for gy in 0..grid.rows() {
            for gx in 0..grid.cols() {
                let cell = grid.at(gx, gy, layer);
                if !cell.blocked {
                    continue;
                }
                let color = if cell.is_obstacle {
                    obstacle_color
                } else {
                    dim(layer_color(layer))
                };
                let px = gx as u32 * cell_px;
                let py = (grid.rows() - 1 - gy) as u32 * cell_px;
                let rect = ImageRect::at(px as i32, py as i32).of_size(cell_px, cell_px);
                draw_filled_rect_mut(&mut img, rect, color);
            }
        }
    }

    let (origin_x, origin_y) = grid.origin();
    let scale = cell_px as f64 / grid.resolution();
    let map = |wx: f64, wy: f64| {
        (
            ((wx - origin_x) * scale + cell_px as f64 / 2.0) as f32,
            (height as f64 - (wy - origin_y) * scale - cell_px as f64 / 2.0) as f32,
        )
    };

    for route in routes {
        for seg in &route.segments {
            let p1 = map(seg.x1, seg.y1);
            let p2 = map(seg.x2, seg.y2);
            draw_line_segment_mut(&mut img, p1, p2, layer_color(seg.layer));
        }
        for via in &route.vias {
            let (px, py) = map(via.x, via.y);
            draw_filled_circle_mut(
                &mut img,
                (px as i32, py as i32),
                cell_px as i32,
                Rgba([230, 230, 230, 255]),
            );
        }
    }

    let _ = img.save(Path::new(filename));
}
