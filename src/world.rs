// src/world.rs
//! Полный конвейер генерации основы мира
//!
//! Порядок этапов строгий:
//! 1. Проверка параметров и выбор шаблона
//! 2. Выборка точек и построение сетки ячеек
//! 3. Рельеф по шаблону
//! 4. Температура и осадки
//! 5. Речная сеть и озёра
//!
//! Результат — неизменяемый [`World`]; его можно сохранить в JSON и загрузить
//! обратно без потерь.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::climate::{ClimateData, generate_climate};
use crate::config::WorldGenerationParams;
use crate::error::Result;
use crate::heightmap::{HeightGrid, generate_heightmap};
use crate::mesh::{CellMesh, build_mesh};
use crate::points::{domain_size, jittered_grid};
use crate::rivers::{RiverData, generate_rivers};
use crate::timing::StageTimer;

/// Сгенерированная основа мира.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct World {
    pub seed: u32,
    pub mesh: CellMesh,
    pub heights: HeightGrid,
    pub climate: ClimateData,
    pub rivers: RiverData,
}

/// Краткая сводка для логов и CLI.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorldSummary {
    pub seed: u32,
    pub template: String,
    pub cells: usize,
    pub vertices: usize,
    pub land_ratio: f32,
    pub rivers: usize,
    pub lakes: usize,
    /// Длина самой длинной реки в единицах карты.
    pub longest_river: f64,
    pub precipitation: (f32, f32),
    pub temperature: (f32, f32),
}

impl World {
    #[must_use]
    pub fn summary(&self) -> WorldSummary {
        let temperature = self
            .climate
            .temperature
            .iter()
            .fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), &t| {
                (lo.min(t), hi.max(t))
            });
        let longest_river = self
            .rivers
            .rivers
            .iter()
            .map(|river| river.length(&self.mesh))
            .fold(0.0, f64::max);

        WorldSummary {
            seed: self.seed,
            template: self.heights.template.clone(),
            cells: self.mesh.cell_count(),
            vertices: self.mesh.vertex_count(),
            land_ratio: self.heights.stats().land_ratio,
            rivers: self.rivers.rivers.len(),
            lakes: self.rivers.lakes.len(),
            longest_river,
            precipitation: self.climate.precipitation_range(),
            temperature,
        }
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    /// Сохраняет мир в JSON-файл.
    pub fn save_json(&self, path: impl AsRef<Path>) -> Result<()> {
        fs::write(path, self.to_json()?)?;
        Ok(())
    }

    pub fn load_json(path: impl AsRef<Path>) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        Self::from_json(&text)
    }
}

/// Генерирует мир по параметрам.
///
/// Одинаковые параметры дают побитово одинаковый результат.
pub fn generate_world(params: &WorldGenerationParams) -> Result<World> {
    let _timer = StageTimer::start("world");
    params.validate()?;
    let template = params.resolve_template()?;

    let (width, height) = domain_size(params.cells, params.aspect_ratio);
    log::info!(
        "world: seed {}, {} cells on {width:.1}x{height:.1}, template `{}`",
        params.seed,
        params.cells,
        template.name
    );

    let points = jittered_grid(width, height, params.cells, params.seed);
    let mesh = build_mesh(&points, width, height)?;
    let heights = generate_heightmap(
        &mesh,
        &template,
        params.seed,
        &params.world,
        &params.heightmap,
    )?;
    let climate = generate_climate(&mesh, &heights, &params.world, &params.climate)?;
    let rivers = generate_rivers(&mesh, &heights, &climate, &params.rivers)?;

    Ok(World {
        seed: params.seed,
        mesh,
        heights,
        climate,
        rivers,
    })
}
