//! Осадки: перенос влаги ветром по каждому ветровому поясу
//!
//! Ячейки пояса обходятся по проекции центра на направление ветра. Каждая ячейка
//! собирает влагу у уже пройденных наветренных соседей; вода добавляет влагу,
//! суша теряет её долю в виде осадков. Горы на пути ветра забирают больше,
//! за ними остаётся дождевая тень.

#[cfg(feature = "parallel")]
use rayon::prelude::*;

use crate::config::{ClimateSettings, WindBand, WorldScale};
use crate::heightmap::HeightGrid;
use crate::mesh::CellMesh;

/// Минимальное выравнивание соседа с ветром, чтобы считаться наветренным.
const ALIGN_EPSILON: f64 = 1e-6;

pub(super) struct Sweep<'a> {
    pub mesh: &'a CellMesh,
    pub grid: &'a HeightGrid,
    pub temperature: &'a [f32],
    pub scale: &'a WorldScale,
    pub settings: &'a ClimateSettings,
    /// Диапазон широт каждой ячейки по её вершинам.
    pub extents: Vec<(f32, f32)>,
}

impl<'a> Sweep<'a> {
    pub fn new(
        mesh: &'a CellMesh,
        grid: &'a HeightGrid,
        temperature: &'a [f32],
        scale: &'a WorldScale,
        settings: &'a ClimateSettings,
    ) -> Self {
        let extents = (0..mesh.cell_count())
            .map(|cell| latitude_extent(mesh, scale, cell))
            .collect();
        Self {
            mesh,
            grid,
            temperature,
            scale,
            settings,
            extents,
        }
    }

    /// Доля ячейки внутри пояса по широте.
    fn band_weight(&self, band: &WindBand, cell: usize) -> f32 {
        let (low, high) = self.extents[cell];
        if high - low > f32::EPSILON {
            band.overlap(low, high) / (high - low)
        } else if low >= band.south && (low < band.north || band.north >= 90.0) {
            1.0
        } else {
            0.0
        }
    }

    /// Влагоёмкость воздуха при температуре `t`.
    fn capacity(&self, t: f32) -> f32 {
        let s = self.settings;
        (s.base_capacity * 2.0_f32.powf(t / 10.0)).clamp(s.min_capacity, s.max_capacity)
    }

    /// Доля влаги, выпадающая над сушей.
    fn rain_fraction(&self, cell: usize, upwind: &[usize]) -> f32 {
        let s = self.settings;
        let mesh = self.mesh;
        let heights = &self.grid.heights;

        let coastal = mesh.cell_neighbors[cell]
            .iter()
            .any(|&n| self.grid.is_water(n));

        let slope = upwind
            .iter()
            .map(|&n| {
                let rise = f64::from(heights[cell] - heights[n]).max(0.0);
                (rise / mesh.cell_distance(cell, n)) as f32
            })
            .fold(0.0_f32, f32::max);

        let altitude = self.scale.altitude_m(heights[cell]) / self.scale.max_elevation_m;

        let mut fraction = s.base_loss;
        if coastal {
            fraction += s.coastal_bonus;
        }
        fraction += s.slope_rate * (slope / s.slope_reference).min(1.0);
        fraction += s.altitude_rate * altitude.min(1.0);
        fraction.min(1.0)
    }

    /// Осадки одного пояса, уже умноженные на долю ячейки в поясе.
    pub fn run(&self, band: &WindBand) -> Vec<f32> {
        let mesh = self.mesh;
        let n = mesh.cell_count();
        let (dx, dy) = band.unit_direction();

        let weights: Vec<f32> = (0..n).map(|c| self.band_weight(band, c)).collect();
        let projection = |c: usize| {
            let (x, y) = mesh.cell_centers[c];
            x * dx + y * dy
        };
        let mut order: Vec<usize> = (0..n).filter(|&c| weights[c] > 0.0).collect();
        order.sort_by(|&a, &b| projection(a).total_cmp(&projection(b)).then(a.cmp(&b)));

        let mut visited = vec![false; n];
        let mut humidity = vec![0.0_f32; n];
        let mut precipitation = vec![0.0_f32; n];
        let mut upwind = Vec::with_capacity(8);

        for &cell in &order {
            let (cx, cy) = mesh.cell_centers[cell];

            upwind.clear();
            let (mut gathered, mut total_weight) = (0.0_f64, 0.0_f64);
            for &neighbor in &mesh.cell_neighbors[cell] {
                if !visited[neighbor] {
                    continue;
                }
                let (nx, ny) = mesh.cell_centers[neighbor];
                let length = (cx - nx).hypot(cy - ny);
                let align = ((cx - nx) * dx + (cy - ny) * dy) / length;
                if align > ALIGN_EPSILON {
                    let weight = align * align;
                    gathered += weight * f64::from(humidity[neighbor]);
                    total_weight += weight;
                    upwind.push(neighbor);
                }
            }
            let incoming = if total_weight > 0.0 {
                (gathered / total_weight) as f32
            } else {
                self.settings.ocean_humidity
            };

            humidity[cell] = if self.grid.is_water(cell) {
                (incoming + self.settings.pickup_rate).min(self.capacity(self.temperature[cell]))
            } else {
                let deposit = incoming * self.rain_fraction(cell, &upwind);
                precipitation[cell] = deposit * weights[cell];
                let mut carried = incoming - deposit;
                if self.temperature[cell] < self.settings.permafrost_temperature {
                    carried *= self.settings.permafrost_damping;
                }
                carried
            };
            visited[cell] = true;
        }
        precipitation
    }
}

/// Широты самой северной и самой южной вершины ячейки.
fn latitude_extent(mesh: &CellMesh, scale: &WorldScale, cell: usize) -> (f32, f32) {
    let (mut low, mut high) = (f32::INFINITY, f32::NEG_INFINITY);
    for &v in &mesh.cell_vertices[cell] {
        let latitude = scale.latitude_at(mesh.vertex_positions[v].1, mesh.height);
        low = low.min(latitude);
        high = high.max(latitude);
    }
    if low > high {
        let latitude = scale.latitude_at(mesh.cell_centers[cell].1, mesh.height);
        return (latitude, latitude);
    }
    (low, high)
}

/// Сумма осадков всех поясов, сжатая степенью `precipitation_exponent`.
pub(super) fn precipitation(sweep: &Sweep<'_>) -> Vec<f32> {
    let bands = &sweep.settings.wind_bands;

    #[cfg(feature = "parallel")]
    let per_band: Vec<Vec<f32>> = bands.par_iter().map(|band| sweep.run(band)).collect();
    #[cfg(not(feature = "parallel"))]
    let per_band: Vec<Vec<f32>> = bands.iter().map(|band| sweep.run(band)).collect();

    let mut total = vec![0.0_f32; sweep.mesh.cell_count()];
    for band in &per_band {
        for (sum, value) in total.iter_mut().zip(band) {
            *sum += value;
        }
    }
    let exponent = sweep.settings.precipitation_exponent;
    for value in &mut total {
        *value = value.max(0.0).powf(exponent);
    }
    total
}
