//! Генератор рельефа
//!
//! Высоты рисуются на сетке ячеек последовательностью операций шаблона
//! (холмы, впадины, хребты, желоба, проливы, маска, сглаживание, арифметика).
//! Все операции работают в шкале [`WorldScale`]; после каждой операции
//! высоты обрезаются до `[min_height, max_height]`.

mod ops;
pub mod template;

use serde::{Deserialize, Serialize};

use crate::config::{HeightmapSettings, WorldScale};
use crate::error::{MapgenError, Result};
use crate::mesh::CellMesh;
use crate::seed::stream;
use crate::timing::StageTimer;
use ops::{OpSeed, Painter};
pub use template::{HeightFilter, InvertAxes, Operation, Span, StraitDirection, Template};

/// Высоты ячеек вместе со шкалой, в которой они нарисованы.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeightGrid {
    pub heights: Vec<f32>,
    pub sea_level: f32,
    pub min_height: f32,
    pub max_height: f32,
    /// Имя шаблона, по которому построен рельеф.
    pub template: String,
}

/// Сводка по рельефу.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HeightStats {
    /// Доля ячеек суши, от 0 до 1.
    pub land_ratio: f32,
    pub land_cells: usize,
    pub min: f32,
    pub max: f32,
    pub mean: f32,
}

impl HeightGrid {
    /// Ячейка — суша, если её высота строго выше уровня моря.
    #[must_use]
    pub fn is_land(&self, cell: usize) -> bool {
        self.heights[cell] > self.sea_level
    }

    #[must_use]
    pub fn is_water(&self, cell: usize) -> bool {
        !self.is_land(cell)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.heights.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.heights.is_empty()
    }

    #[must_use]
    pub fn stats(&self) -> HeightStats {
        let land_cells = (0..self.len()).filter(|&c| self.is_land(c)).count();
        let (mut min, mut max, mut sum) = (f32::INFINITY, f32::NEG_INFINITY, 0.0_f64);
        for &h in &self.heights {
            min = min.min(h);
            max = max.max(h);
            sum += f64::from(h);
        }
        let count = self.len().max(1);
        HeightStats {
            land_ratio: land_cells as f32 / count as f32,
            land_cells,
            min,
            max,
            mean: (sum / count as f64) as f32,
        }
    }

    /// Высоты конечны и лежат в допустимом диапазоне.
    fn check(&self) -> Result<()> {
        for (cell, &h) in self.heights.iter().enumerate() {
            if !h.is_finite() || h < self.min_height || h > self.max_height {
                return Err(MapgenError::invariant(
                    "heightmap",
                    format!(
                        "cell {cell} has height {h} outside [{}, {}]",
                        self.min_height, self.max_height
                    ),
                ));
            }
        }
        Ok(())
    }
}

/// Рисует рельеф по шаблону.
///
/// Стартовое поле заполнено `min_height`; операция `i` получает генератор,
/// засеянный `(seed, i, повторение)`. Одинаковые входы дают одинаковые высоты.
pub fn generate_heightmap(
    mesh: &CellMesh,
    template: &Template,
    seed: u32,
    scale: &WorldScale,
    settings: &HeightmapSettings,
) -> Result<HeightGrid> {
    let _timer = StageTimer::start("heightmap");
    let (blob_power, line_power) = settings.resolve(mesh.cell_count());
    log::debug!(
        "heightmap: template `{}`, blob power {blob_power}, line power {line_power}",
        template.name
    );

    let mut painter = Painter {
        mesh,
        scale,
        heights: vec![scale.min_height; mesh.cell_count()],
        blob_power,
        line_power,
    };

    for (index, operation) in template.operations.iter().enumerate() {
        let seed = OpSeed {
            run_seed: seed,
            operation: stream::HEIGHTMAP_BASE + index as u64,
        };
        painter.apply(operation, seed);
        log::trace!("heightmap: applied #{index} {}", operation.name());
    }

    let grid = HeightGrid {
        heights: painter.heights,
        sea_level: scale.sea_level,
        min_height: scale.min_height,
        max_height: scale.max_height,
        template: template.name.clone(),
    };
    grid.check()?;

    let stats = grid.stats();
    log::debug!(
        "heightmap: land {:.1}%, heights {:.1}..{:.1}, mean {:.1}",
        stats.land_ratio * 100.0,
        stats.min,
        stats.max,
        stats.mean
    );
    if stats.land_cells == 0 {
        log::warn!("heightmap: template `{}` produced no land", template.name);
    } else if stats.land_cells == grid.len() {
        log::warn!("heightmap: template `{}` produced no water", template.name);
    }
    Ok(grid)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh::build_mesh;
    use crate::points::jittered_grid;

    fn sample_mesh() -> CellMesh {
        let points = jittered_grid(40.0, 25.0, 1_000, 5);
        build_mesh(&points, 40.0, 25.0).unwrap()
    }

    #[test]
    fn same_seed_same_heights() {
        let mesh = sample_mesh();
        let template = template::builtin("continents").unwrap();
        let scale = WorldScale::default();
        let settings = HeightmapSettings::default();
        let a = generate_heightmap(&mesh, &template, 17, &scale, &settings).unwrap();
        let b = generate_heightmap(&mesh, &template, 17, &scale, &settings).unwrap();
        let c = generate_heightmap(&mesh, &template, 18, &scale, &settings).unwrap();
        assert_eq!(a, b);
        assert_ne!(a.heights, c.heights);
    }

    #[test]
    fn every_builtin_stays_in_range() {
        let mesh = sample_mesh();
        let scale = WorldScale::default();
        let settings = HeightmapSettings::default();
        for &(name, _) in &template::BUILTIN_TEMPLATES {
            let template = template::builtin(name).unwrap();
            let grid = generate_heightmap(&mesh, &template, 3, &scale, &settings).unwrap();
            assert_eq!(grid.len(), mesh.cell_count());
            assert_eq!(grid.template, name);
            let stats = grid.stats();
            assert!(stats.min >= scale.min_height && stats.max <= scale.max_height);
        }
    }

    #[test]
    fn all_water_is_a_valid_result() {
        let mesh = sample_mesh();
        let template = Template {
            name: "flat".into(),
            operations: vec![Operation::Add {
                value: 5.0,
                filter: HeightFilter::All,
            }],
        };
        let grid = generate_heightmap(
            &mesh,
            &template,
            1,
            &WorldScale::default(),
            &HeightmapSettings::default(),
        )
        .unwrap();
        let stats = grid.stats();
        assert_eq!(stats.land_cells, 0);
        assert_eq!(stats.land_ratio, 0.0);
        assert!((stats.mean - 5.0).abs() < 1e-5);
    }

    #[test]
    fn land_is_strictly_above_sea_level() {
        let grid = HeightGrid {
            heights: vec![19.0, 20.0, 20.5],
            sea_level: 20.0,
            min_height: 0.0,
            max_height: 100.0,
            template: "manual".into(),
        };
        assert!(!grid.is_land(0));
        assert!(!grid.is_land(1));
        assert!(grid.is_land(2));
        assert_eq!(grid.stats().land_cells, 1);
    }
}
