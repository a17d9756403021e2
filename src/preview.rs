// src/preview.rs
//! Диагностический рендер мира в PNG
//!
//! Каждая ячейка заливается цветом выбранного слоя, поверх рисуются реки.
//! Картинка предназначена для отладки генератора, а не для игрока.

use std::path::Path;

use clap::ValueEnum;

use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_line_segment_mut, draw_polygon_mut};
use imageproc::point::Point;

use crate::error::Result;
use crate::world::World;

/// Слой, которым раскрашиваются ячейки.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum Layer {
    #[default]
    Height,
    Temperature,
    Precipitation,
}

const RIVER: Rgb<u8> = Rgb([40, 90, 200]);

fn lerp(a: [u8; 3], b: [u8; 3], t: f32) -> Rgb<u8> {
    let t = t.clamp(0.0, 1.0);
    let mix = |i: usize| (f32::from(a[i]) + (f32::from(b[i]) - f32::from(a[i])) * t).round() as u8;
    Rgb([mix(0), mix(1), mix(2)])
}

fn height_color(world: &World, cell: usize) -> Rgb<u8> {
    let grid = &world.heights;
    let h = grid.heights[cell];
    if grid.is_land(cell) {
        let t = (h - grid.sea_level) / (grid.max_height - grid.sea_level);
        if t < 0.5 {
            lerp([80, 150, 70], [170, 150, 90], t * 2.0)
        } else {
            lerp([170, 150, 90], [245, 245, 245], (t - 0.5) * 2.0)
        }
    } else {
        let t = (h - grid.min_height) / (grid.sea_level - grid.min_height);
        lerp([10, 30, 90], [70, 130, 200], t)
    }
}

fn temperature_color(world: &World, cell: usize) -> Rgb<u8> {
    // -30 °C синий, +30 °C красный.
    let t = (world.climate.temperature[cell] + 30.0) / 60.0;
    if t < 0.5 {
        lerp([40, 60, 220], [240, 240, 240], t * 2.0)
    } else {
        lerp([240, 240, 240], [220, 50, 30], (t - 0.5) * 2.0)
    }
}

fn precipitation_color(world: &World, cell: usize, max: f32) -> Rgb<u8> {
    if world.heights.is_water(cell) {
        return Rgb([30, 40, 70]);
    }
    let t = world.climate.precipitation[cell] / max.max(f32::EPSILON);
    if t < 0.5 {
        lerp([220, 200, 120], [90, 170, 80], t * 2.0)
    } else {
        lerp([90, 170, 80], [30, 90, 160], (t - 0.5) * 2.0)
    }
}

/// Многоугольник ячейки в пикселях без повторяющихся соседних точек.
fn cell_polygon(world: &World, cell: usize, scale: f64) -> Vec<Point<i32>> {
    let mut polygon: Vec<Point<i32>> = Vec::with_capacity(8);
    for &v in &world.mesh.cell_vertices[cell] {
        let (x, y) = world.mesh.vertex_positions[v];
        let point = Point::new((x * scale).round() as i32, (y * scale).round() as i32);
        if polygon.last() != Some(&point) {
            polygon.push(point);
        }
    }
    while polygon.len() > 1 && polygon.first() == polygon.last() {
        polygon.pop();
    }
    polygon
}

/// Рисует слой `layer`; `scale` — пикселей на единицу длины карты.
#[must_use]
pub fn render(world: &World, layer: Layer, scale: u32) -> RgbImage {
    let scale_f = f64::from(scale.max(1));
    let width = (world.mesh.width * scale_f).ceil().max(1.0) as u32;
    let height = (world.mesh.height * scale_f).ceil().max(1.0) as u32;
    let mut image = RgbImage::from_pixel(width, height, Rgb([0, 0, 0]));

    let (_, max_rain) = world.climate.precipitation_range();
    for cell in 0..world.mesh.cell_count() {
        let color = match layer {
            Layer::Height => height_color(world, cell),
            Layer::Temperature => temperature_color(world, cell),
            Layer::Precipitation => precipitation_color(world, cell, max_rain),
        };
        let polygon = cell_polygon(world, cell, scale_f);
        if polygon.len() >= 3 {
            draw_polygon_mut(&mut image, &polygon, color);
        }
    }

    for river in &world.rivers.rivers {
        for pair in river.vertices.windows(2) {
            let (ax, ay) = world.mesh.vertex_positions[pair[0]];
            let (bx, by) = world.mesh.vertex_positions[pair[1]];
            draw_line_segment_mut(
                &mut image,
                ((ax * scale_f) as f32, (ay * scale_f) as f32),
                ((bx * scale_f) as f32, (by * scale_f) as f32),
                RIVER,
            );
        }
    }
    image
}

/// Рисует слой и сохраняет PNG.
pub fn save_png(world: &World, layer: Layer, scale: u32, path: impl AsRef<Path>) -> Result<()> {
    render(world, layer, scale).save(path)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layer_names_round_trip() {
        assert_eq!(Layer::value_variants().len(), 3);
        for &layer in Layer::value_variants() {
            let value = layer.to_possible_value().unwrap();
            assert_eq!(Layer::from_str(value.get_name(), false), Ok(layer));
        }
        assert_eq!(Layer::from_str("precipitation", false), Ok(Layer::Precipitation));
        assert_eq!(Layer::from_str("Height", true), Ok(Layer::Height));
        assert!(Layer::from_str("biome", false).is_err());
    }

    #[test]
    fn lerp_hits_both_ends() {
        assert_eq!(lerp([0, 0, 0], [200, 100, 50], 0.0), Rgb([0, 0, 0]));
        assert_eq!(lerp([0, 0, 0], [200, 100, 50], 1.0), Rgb([200, 100, 50]));
        assert_eq!(lerp([0, 0, 0], [200, 100, 50], 7.0), Rgb([200, 100, 50]));
    }
}
