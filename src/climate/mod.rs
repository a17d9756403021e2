//! Климат: температура и осадки для каждой ячейки
//!
//! Чистая функция сетки, рельефа и настроек; случайности нет.

mod precipitation;
pub mod temperature;

use serde::{Deserialize, Serialize};

use crate::config::{ClimateSettings, WorldScale};
use crate::error::{MapgenError, Result};
use crate::heightmap::HeightGrid;
use crate::mesh::CellMesh;
use crate::timing::StageTimer;
use precipitation::Sweep;
pub use temperature::{sea_level_temperature, temperature_at};

/// Температура (°C) и осадки каждой ячейки.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClimateData {
    pub temperature: Vec<f32>,
    pub precipitation: Vec<f32>,
}

impl ClimateData {
    /// Наименьшие и наибольшие осадки.
    #[must_use]
    pub fn precipitation_range(&self) -> (f32, f32) {
        self.precipitation
            .iter()
            .fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), &p| {
                (lo.min(p), hi.max(p))
            })
    }

    fn check(&self) -> Result<()> {
        if let Some(cell) = self.temperature.iter().position(|t| !t.is_finite()) {
            return Err(MapgenError::invariant(
                "climate",
                format!("cell {cell} has non-finite temperature"),
            ));
        }
        if let Some(cell) = self
            .precipitation
            .iter()
            .position(|&p| !p.is_finite() || p < 0.0)
        {
            return Err(MapgenError::invariant(
                "climate",
                format!(
                    "cell {cell} has invalid precipitation {}",
                    self.precipitation[cell]
                ),
            ));
        }
        Ok(())
    }
}

/// Считает климат мира.
pub fn generate_climate(
    mesh: &CellMesh,
    grid: &HeightGrid,
    scale: &WorldScale,
    settings: &ClimateSettings,
) -> Result<ClimateData> {
    let _timer = StageTimer::start("climate");

    let temperature = temperature::temperatures(mesh, grid, scale, settings);
    let sweep = Sweep::new(mesh, grid, &temperature, scale, settings);
    let precipitation = precipitation::precipitation(&sweep);

    let climate = ClimateData {
        temperature,
        precipitation,
    };
    climate.check()?;

    let (low, high) = climate.precipitation_range();
    log::debug!(
        "climate: {} wind bands, precipitation {low:.2}..{high:.2}",
        settings.wind_bands.len()
    );
    Ok(climate)
}
