//! Операции рисования рельефа
//!
//! Каждая операция шаблона получает свой генератор (см. [`crate::seed`]);
//! операции с количеством повторений берут отдельный генератор на каждое повторение.

use std::collections::VecDeque;

use rand::Rng;
use rand_chacha::ChaCha8Rng;

use super::template::{HeightFilter, InvertAxes, Operation, Span, StraitDirection};
use crate::config::WorldScale;
use crate::mesh::CellMesh;
use crate::seed::op_rng;

/// Сколько раз пытаться найти подходящую стартовую точку.
const MAX_ATTEMPTS: usize = 50;

/// Семя одной операции шаблона.
#[derive(Debug, Clone, Copy)]
pub(super) struct OpSeed {
    pub run_seed: u32,
    pub operation: u64,
}

impl OpSeed {
    fn rng(self, sub_index: u64) -> ChaCha8Rng {
        op_rng(self.run_seed, self.operation, sub_index)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Ridge {
    Range,
    Trough,
}

/// Холст: высоты ячеек и всё, что нужно операциям.
pub(super) struct Painter<'a> {
    pub mesh: &'a CellMesh,
    pub scale: &'a WorldScale,
    pub heights: Vec<f32>,
    pub blob_power: f32,
    pub line_power: f32,
}

impl Painter<'_> {
    /// Применяет одну операцию и обрезает результат до допустимых высот.
    pub fn apply(&mut self, operation: &Operation, seed: OpSeed) {
        match *operation {
            Operation::Hill {
                count,
                height,
                x,
                y,
            } => self.repeat(count, seed, |p, rng| p.hill(rng, height, x, y)),
            Operation::Pit {
                count,
                height,
                x,
                y,
            } => self.repeat(count, seed, |p, rng| p.pit(rng, height, x, y)),
            Operation::Range {
                count,
                height,
                x,
                y,
            } => self.repeat(count, seed, |p, rng| {
                p.ridge(rng, height, x, y, Ridge::Range);
            }),
            Operation::Trough {
                count,
                height,
                x,
                y,
            } => self.repeat(count, seed, |p, rng| {
                p.ridge(rng, height, x, y, Ridge::Trough);
            }),
            Operation::Strait { width, direction } => {
                self.strait(&mut seed.rng(0), width, direction);
            }
            Operation::Mask { power } => self.mask(power),
            Operation::Smooth { factor } => self.smooth(factor),
            Operation::Add { value, filter } => self.modify(filter, value, 1.0),
            Operation::Multiply { factor, filter } => self.modify(filter, 0.0, factor),
            Operation::Invert { probability, axes } => {
                self.invert(&mut seed.rng(0), probability, axes);
            }
        }

        let scale = self.scale;
        for h in &mut self.heights {
            *h = scale.clamp(*h);
        }
    }

    fn repeat(&mut self, count: Span, seed: OpSeed, mut paint: impl FnMut(&mut Self, &mut ChaCha8Rng)) {
        let repetitions = count.sample_count(&mut seed.rng(0));
        for k in 0..repetitions {
            paint(self, &mut seed.rng(u64::from(k) + 1));
        }
    }

    /// Случайная точка в процентных диапазонах `x`, `y`.
    fn random_point<R: Rng>(&self, rng: &mut R, x: Span, y: Span) -> (f64, f64) {
        let px = f64::from(x.sample(rng)) / 100.0 * self.mesh.width;
        let py = f64::from(y.sample(rng)) / 100.0 * self.mesh.height;
        (px.clamp(0.0, self.mesh.width), py.clamp(0.0, self.mesh.height))
    }

    fn hill<R: Rng>(&mut self, rng: &mut R, height: Span, x: Span, y: Span) {
        let mesh = self.mesh;
        let h = self.scale.clamp(height.sample(rng)).max(0.0);
        let ceiling = 0.9 * self.scale.max_height;

        let mut start = 0;
        for _ in 0..MAX_ATTEMPTS {
            let (px, py) = self.random_point(rng, x, y);
            start = mesh.find_cell(px, py);
            if self.heights[start] + h <= ceiling {
                break;
            }
        }

        let mut change = vec![0.0_f32; self.heights.len()];
        change[start] = h;
        let mut queue = VecDeque::from([start]);
        while let Some(current) = queue.pop_front() {
            for &next in &mesh.cell_neighbors[current] {
                if change[next] > 0.0 {
                    continue;
                }
                change[next] = change[current].powf(self.blob_power) * rng.gen_range(0.9..1.1);
                if change[next] > 1.0 {
                    queue.push_back(next);
                }
            }
        }

        for (h, delta) in self.heights.iter_mut().zip(&change) {
            *h = self.scale.clamp(*h + delta);
        }
    }

    fn pit<R: Rng>(&mut self, rng: &mut R, height: Span, x: Span, y: Span) {
        let mesh = self.mesh;
        let mut h = self.scale.clamp(height.sample(rng)).max(0.0);

        let mut start = 0;
        for _ in 0..MAX_ATTEMPTS {
            let (px, py) = self.random_point(rng, x, y);
            start = mesh.find_cell(px, py);
            if self.heights[start] >= self.scale.sea_level {
                break;
            }
        }

        let mut used = vec![false; self.heights.len()];
        used[start] = true;
        let mut queue = VecDeque::from([start]);
        while let Some(current) = queue.pop_front() {
            h = h.powf(self.blob_power) * rng.gen_range(0.9..1.1);
            if h < 1.0 {
                break;
            }
            for &next in &mesh.cell_neighbors[current] {
                if used[next] {
                    continue;
                }
                used[next] = true;
                let lowered = self.heights[next] - h * rng.gen_range(0.9..1.1);
                self.heights[next] = self.scale.clamp(lowered);
                queue.push_back(next);
            }
        }
    }

    fn ridge<R: Rng>(&mut self, rng: &mut R, height: Span, x: Span, y: Span, kind: Ridge) {
        let mesh = self.mesh;
        let (width, map_height) = (mesh.width, mesh.height);
        let sign = match kind {
            Ridge::Range => 1.0,
            Ridge::Trough => -1.0,
        };
        let mut h = self.scale.clamp(height.sample(rng)).max(0.0);

        // Желоб начинается на суше, хребет где угодно.
        let mut from = self.random_point(rng, x, y);
        if kind == Ridge::Trough {
            for _ in 1..MAX_ATTEMPTS {
                if self.heights[mesh.find_cell(from.0, from.1)] >= self.scale.sea_level {
                    break;
                }
                from = self.random_point(rng, x, y);
            }
        }
        let start = mesh.find_cell(from.0, from.1);

        let max_distance = match kind {
            Ridge::Range => width / 3.0,
            Ridge::Trough => width / 2.0,
        };
        let mut to = from;
        for _ in 0..MAX_ATTEMPTS {
            to = (
                rng.gen_range(0.1..0.9) * width,
                rng.gen_range(0.15..0.85) * map_height,
            );
            let distance = (to.0 - from.0).abs() + (to.1 - from.1).abs();
            if distance >= width / 8.0 && distance <= max_distance {
                break;
            }
        }
        let end = mesh.find_cell_from(start, to.0, to.1);

        let mut used = vec![false; self.heights.len()];
        let path = walk_path(mesh, start, end, 0.15, &mut used, rng);

        // Слои от оси наружу, высота затухает от слоя к слою.
        let mut frontier = path.clone();
        let mut layers = 0;
        loop {
            layers += 1;
            for &c in &frontier {
                let raised = self.heights[c] + sign * h * rng.gen_range(0.85..1.15);
                self.heights[c] = self.scale.clamp(raised);
            }
            h = h.powf(self.line_power) - 1.0;
            if h < 2.0 {
                break;
            }
            let mut next = Vec::new();
            for &f in &frontier {
                for &c in &mesh.cell_neighbors[f] {
                    if !used[c] {
                        used[c] = true;
                        next.push(c);
                    }
                }
            }
            if next.is_empty() {
                break;
            }
            frontier = next;
        }

        // Отроги: от каждой шестой ячейки оси вниз по склону.
        for &first in path.iter().step_by(6) {
            let mut current = first;
            for _ in 0..layers {
                let Some(&lowest) = mesh.cell_neighbors[current]
                    .iter()
                    .min_by(|&&a, &&b| self.heights[a].total_cmp(&self.heights[b]))
                else {
                    break;
                };
                self.heights[lowest] = (self.heights[current] * 2.0 + self.heights[lowest]) / 3.0;
                current = lowest;
            }
        }
    }

    fn strait<R: Rng>(&mut self, rng: &mut R, width: Span, direction: StraitDirection) {
        let mesh = self.mesh;
        let (map_width, map_height) = (mesh.width, mesh.height);
        let spacing = (map_width * map_height / mesh.cell_count() as f64).sqrt();
        let vertical = direction == StraitDirection::Vertical;
        let across = if vertical { map_width } else { map_height } / spacing;

        let mut width = f64::from(width.sample(rng)).min(across / 3.0);
        if width < 1.0 && !rng.gen_bool(width.clamp(0.0, 1.0)) {
            return;
        }

        let margin = 0.5 * spacing;
        let (from, to) = if vertical {
            let sx = rng.gen_range(0.3..0.7) * map_width;
            let ex = (map_width - sx - 0.1 * map_width + rng.gen_range(0.0..0.2) * map_width)
                .clamp(0.0, map_width);
            ((sx, margin), (ex, map_height - margin))
        } else {
            let sy = rng.gen_range(0.3..0.7) * map_height;
            let ey = (map_height - sy - 0.1 * map_height + rng.gen_range(0.0..0.2) * map_height)
                .clamp(0.0, map_height);
            ((margin, sy), (map_width - margin, ey))
        };
        let start = mesh.find_cell(from.0, from.1);
        let end = mesh.find_cell_from(start, to.0, to.1);

        let mut used = vec![false; self.heights.len()];
        let path = walk_path(mesh, start, end, 0.2, &mut used, rng);

        let mut lowered = vec![false; self.heights.len()];
        for &c in &path {
            lowered[c] = true;
        }
        let mut frontier = path;
        let step = 0.1 / width;
        while width > 0.0 {
            let exponent = (0.9 - step * width) as f32;
            let mut next = Vec::new();
            for &c in &frontier {
                if self.heights[c] > 0.0 {
                    self.heights[c] = self.scale.clamp(self.heights[c].powf(exponent));
                }
                for &n in &mesh.cell_neighbors[c] {
                    if !lowered[n] {
                        lowered[n] = true;
                        next.push(n);
                    }
                }
            }
            frontier = next;
            width -= 1.0;
        }
    }

    fn mask(&mut self, power: f32) {
        if power.abs() < f32::EPSILON {
            return;
        }
        let mesh = self.mesh;
        let exponent = 1.0 / f64::from(power.abs());
        for (c, h) in self.heights.iter_mut().enumerate() {
            let (x, y) = mesh.cell_centers[c];
            let nx = 2.0 * x / mesh.width - 1.0;
            let ny = 2.0 * y / mesh.height - 1.0;
            let r = nx.hypot(ny).min(1.0);
            let mut falloff = 1.0 - r * r;
            if power < 0.0 {
                falloff = 1.0 - falloff;
            }
            *h = self.scale.clamp(*h * falloff.powf(exponent) as f32);
        }
    }

    fn smooth(&mut self, factor: f32) {
        let mesh = self.mesh;
        let previous = self.heights.clone();
        for (c, h) in self.heights.iter_mut().enumerate() {
            let neighbors = &mesh.cell_neighbors[c];
            let sum = previous[c] + neighbors.iter().map(|&n| previous[n]).sum::<f32>();
            let mean = sum / (neighbors.len() + 1) as f32;
            let smoothed = if factor <= 1.0 {
                mean
            } else {
                (previous[c] * (factor - 1.0) + mean) / factor
            };
            *h = self.scale.clamp(smoothed);
        }
    }

    /// `Add` и `Multiply`: высоты вне фильтра не меняются.
    ///
    /// Фильтр суши (и полоса, начинающаяся ровно на уровне моря) считает относительно
    /// уровня моря, и суша не уходит под воду.
    fn modify(&mut self, filter: HeightFilter, add: f32, multiply: f32) {
        let sea = self.scale.sea_level;
        let (low, high, land_relative) = match filter {
            HeightFilter::All => (self.scale.min_height, self.scale.max_height, false),
            HeightFilter::Land => (sea, self.scale.max_height, true),
            HeightFilter::Band(span) => (
                span.low(),
                span.high(),
                (span.low() - sea).abs() < f32::EPSILON,
            ),
        };

        for h in &mut self.heights {
            if *h < low || *h > high {
                continue;
            }
            let mut value = *h;
            if land_relative {
                value = (value + add).max(sea);
                value = (value - sea) * multiply + sea;
            } else {
                value = (value + add) * multiply;
            }
            *h = self.scale.clamp(value);
        }
    }

    fn invert<R: Rng>(&mut self, rng: &mut R, probability: f32, axes: InvertAxes) {
        if !rng.gen_bool(f64::from(probability).clamp(0.0, 1.0)) {
            return;
        }
        let (flip_x, flip_y) = match axes {
            InvertAxes::X => (true, false),
            InvertAxes::Y => (false, true),
            InvertAxes::Both => (true, true),
        };

        let mesh = self.mesh;
        let previous = self.heights.clone();
        let mut source = 0;
        for (c, h) in self.heights.iter_mut().enumerate() {
            let (x, y) = mesh.cell_centers[c];
            let mx = if flip_x { mesh.width - x } else { x };
            let my = if flip_y { mesh.height - y } else { y };
            source = mesh.find_cell_from(source, mx, my);
            *h = previous[source];
        }
    }
}

/// Путь по соседним ячейкам от `start` к `end` без повторов.
///
/// На каждом шаге выбирается сосед, ближайший к цели; с вероятностью `shortcut`
/// расстояние соседа уменьшается вдвое, и путь петляет. Пройденные ячейки
/// отмечаются в `used`. Если идти некуда, путь обрывается.
fn walk_path<R: Rng>(
    mesh: &CellMesh,
    start: usize,
    end: usize,
    shortcut: f64,
    used: &mut [bool],
    rng: &mut R,
) -> Vec<usize> {
    let target = mesh.cell_centers[end];
    let mut path = vec![start];
    used[start] = true;
    let mut current = start;

    while current != end {
        let mut best = f64::INFINITY;
        let mut next = None;
        for &candidate in &mesh.cell_neighbors[current] {
            if used[candidate] {
                continue;
            }
            let (cx, cy) = mesh.cell_centers[candidate];
            let mut diff = (target.0 - cx).powi(2) + (target.1 - cy).powi(2);
            if rng.gen_bool(shortcut) {
                diff /= 2.0;
            }
            if diff < best {
                best = diff;
                next = Some(candidate);
            }
        }
        let Some(next) = next else {
            break;
        };
        used[next] = true;
        path.push(next);
        current = next;
    }
    path
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh::build_mesh;
    use crate::points::jittered_grid;
    use crate::seed::op_rng;

    fn sample_mesh() -> CellMesh {
        let points = jittered_grid(30.0, 20.0, 600, 11);
        build_mesh(&points, 30.0, 20.0).unwrap()
    }

    fn painter<'a>(mesh: &'a CellMesh, scale: &'a WorldScale, fill: f32) -> Painter<'a> {
        Painter {
            mesh,
            scale,
            heights: vec![fill; mesh.cell_count()],
            blob_power: 0.93,
            line_power: 0.75,
        }
    }

    #[test]
    fn hill_peaks_at_its_origin_and_only_raises() {
        let mesh = sample_mesh();
        let scale = WorldScale::default();
        let mut p = painter(&mesh, &scale, 10.0);
        let mut rng = op_rng(1, 0, 1);
        p.hill(&mut rng, Span(40.0, 40.0), Span(50.0, 50.0), Span(50.0, 50.0));

        let center = mesh.find_cell(15.0, 10.0);
        assert!((p.heights[center] - 50.0).abs() < 1e-4);
        assert!(p.heights.iter().all(|&h| h >= 10.0));
        assert!(p.heights.iter().all(|&h| h <= p.heights[center] + 1e-4));
        assert!(p.heights.iter().filter(|&&h| h > 11.0).count() > 10);
        let corner = mesh.find_cell(0.5, 0.5);
        assert!(p.heights[corner] < 30.0);
    }

    #[test]
    fn pit_only_lowers_and_keeps_its_origin() {
        let mesh = sample_mesh();
        let scale = WorldScale::default();
        let mut p = painter(&mesh, &scale, 60.0);
        let mut rng = op_rng(2, 0, 1);
        p.pit(&mut rng, Span(30.0, 30.0), Span(50.0, 50.0), Span(50.0, 50.0));

        let center = mesh.find_cell(15.0, 10.0);
        assert_eq!(p.heights[center], 60.0);
        assert!(p.heights.iter().all(|&h| h <= 60.0));
        assert!(p.heights.iter().any(|&h| h < 45.0));
    }

    #[test]
    fn negative_heights_below_sea_level_paint_nothing() {
        let mesh = sample_mesh();
        let scale = WorldScale {
            min_height: -50.0,
            sea_level: 0.0,
            max_height: 100.0,
            ..WorldScale::default()
        };
        let mut p = painter(&mesh, &scale, 30.0);
        let below = Span(-30.0, -20.0);
        let anywhere = Span(10.0, 90.0);

        p.pit(&mut op_rng(5, 0, 1), below, anywhere, anywhere);
        p.hill(&mut op_rng(5, 0, 2), below, anywhere, anywhere);
        assert!(p.heights.iter().all(|&h| h == 30.0));

        p.ridge(&mut op_rng(5, 0, 3), below, anywhere, anywhere, Ridge::Range);
        p.ridge(&mut op_rng(5, 0, 4), below, anywhere, anywhere, Ridge::Trough);
        assert!(
            p.heights
                .iter()
                .all(|&h| h.is_finite() && (scale.min_height..=scale.max_height).contains(&h))
        );
    }

    #[test]
    fn range_raises_and_trough_lowers() {
        let mesh = sample_mesh();
        let scale = WorldScale::default();

        let mut up = painter(&mesh, &scale, 30.0);
        up.ridge(
            &mut op_rng(3, 0, 1),
            Span(40.0, 40.0),
            Span(30.0, 40.0),
            Span(40.0, 60.0),
            Ridge::Range,
        );
        assert!(up.heights.iter().all(|&h| h >= 30.0));
        assert!(up.heights.iter().filter(|&&h| h > 50.0).count() > 3);

        let mut down = painter(&mesh, &scale, 60.0);
        down.ridge(
            &mut op_rng(4, 0, 1),
            Span(30.0, 30.0),
            Span(30.0, 40.0),
            Span(40.0, 60.0),
            Ridge::Trough,
        );
        assert!(down.heights.iter().all(|&h| h <= 60.0));
        assert!(down.heights.iter().filter(|&&h| h < 45.0).count() > 3);
    }

    #[test]
    fn walk_path_is_connected_and_reaches_target() {
        let mesh = sample_mesh();
        let start = mesh.find_cell(2.0, 2.0);
        let end = mesh.find_cell(27.0, 17.0);
        // Без срезов каждый шаг строго приближает к цели.
        let mut used = vec![false; mesh.cell_count()];
        let direct = walk_path(&mesh, start, end, 0.0, &mut used, &mut op_rng(5, 0, 0));
        assert_eq!(direct.first(), Some(&start));
        assert_eq!(direct.last(), Some(&end));

        let mut used = vec![false; mesh.cell_count()];
        let winding = walk_path(&mesh, start, end, 0.15, &mut used, &mut op_rng(5, 0, 0));
        for path in [&direct, &winding] {
            for pair in path.windows(2) {
                assert!(mesh.cell_neighbors[pair[0]].contains(&pair[1]));
            }
            let unique: std::collections::HashSet<_> = path.iter().collect();
            assert_eq!(unique.len(), path.len());
        }
        assert!(winding.iter().all(|&c| used[c]));
    }

    #[test]
    fn strait_cuts_across_the_map() {
        let mesh = sample_mesh();
        let scale = WorldScale::default();
        let mut p = painter(&mesh, &scale, 60.0);
        p.strait(&mut op_rng(6, 0, 0), Span(2.0, 2.0), StraitDirection::Vertical);

        let lowered: Vec<usize> = (0..mesh.cell_count()).filter(|&c| p.heights[c] < 60.0).collect();
        assert!(!lowered.is_empty());
        let top = lowered.iter().any(|&c| mesh.cell_centers[c].1 < 2.0);
        let bottom = lowered.iter().any(|&c| mesh.cell_centers[c].1 > 18.0);
        assert!(top && bottom);
    }

    #[test]
    fn smooth_keeps_a_flat_field_flat() {
        let mesh = sample_mesh();
        let scale = WorldScale::default();
        let mut p = painter(&mesh, &scale, 42.0);
        p.smooth(2.0);
        assert!(p.heights.iter().all(|&h| (h - 42.0).abs() < 1e-4));

        p.heights[0] = 100.0;
        p.smooth(1.0);
        assert!(p.heights[0] < 100.0);
        for &n in &mesh.cell_neighbors[0] {
            assert!(p.heights[n] > 42.0);
        }
    }

    #[test]
    fn land_filter_leaves_water_untouched() {
        let mesh = sample_mesh();
        let scale = WorldScale::default();
        let mut p = painter(&mesh, &scale, 0.0);
        for (c, h) in p.heights.iter_mut().enumerate() {
            *h = if c % 2 == 0 { 10.0 } else { 60.0 };
        }

        p.modify(HeightFilter::Land, 0.0, 0.5);
        for (c, &h) in p.heights.iter().enumerate() {
            let expected = if c % 2 == 0 { 10.0 } else { 40.0 };
            assert!((h - expected).abs() < 1e-4);
        }

        p.modify(HeightFilter::Land, -50.0, 1.0);
        for (c, &h) in p.heights.iter().enumerate() {
            let expected = if c % 2 == 0 { 10.0 } else { 20.0 };
            assert!((h - expected).abs() < 1e-4);
        }

        p.modify(HeightFilter::Band(Span(5.0, 15.0)), 3.0, 1.0);
        for (c, &h) in p.heights.iter().enumerate() {
            let expected = if c % 2 == 0 { 13.0 } else { 20.0 };
            assert!((h - expected).abs() < 1e-4);
        }
    }

    #[test]
    fn invert_respects_probability() {
        let mesh = sample_mesh();
        let scale = WorldScale::default();
        let mut p = painter(&mesh, &scale, 0.0);
        for (c, h) in p.heights.iter_mut().enumerate() {
            *h = mesh.cell_centers[c].0 as f32;
        }
        let original = p.heights.clone();

        p.invert(&mut op_rng(7, 0, 0), 0.0, InvertAxes::Both);
        assert_eq!(p.heights, original);

        p.invert(&mut op_rng(7, 0, 0), 1.0, InvertAxes::X);
        let left = mesh.find_cell(1.0, 10.0);
        assert!(p.heights[left] > 27.0);
    }

    #[test]
    fn apply_clamps_to_height_limits() {
        let mesh = sample_mesh();
        let scale = WorldScale::default();
        let mut p = painter(&mesh, &scale, 90.0);
        let seed = OpSeed {
            run_seed: 1,
            operation: 0,
        };
        p.apply(
            &Operation::Add {
                value: 50.0,
                filter: HeightFilter::All,
            },
            seed,
        );
        assert!(p.heights.iter().all(|&h| h == 100.0));
        p.apply(
            &Operation::Multiply {
                factor: -1.0,
                filter: HeightFilter::All,
            },
            seed,
        );
        assert!(p.heights.iter().all(|&h| h == 0.0));
    }
}
