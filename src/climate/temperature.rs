//! Температура: широтная кривая на уровне моря минус высотный градиент

#[cfg(feature = "parallel")]
use rayon::prelude::*;

use crate::config::{ClimateSettings, WorldScale};
use crate::heightmap::HeightGrid;
use crate::mesh::CellMesh;

/// Температура на уровне моря для широты, °C.
///
/// Внутри тропиков температура падает медленно (`tropical_gradient` на градус),
/// дальше линейно до `pole_temperature` на полюсе.
#[must_use]
pub fn sea_level_temperature(latitude: f32, settings: &ClimateSettings) -> f32 {
    let latitude = latitude.abs().min(90.0);
    let tropical = settings.tropical_latitude.clamp(0.0, 90.0);
    let edge = settings.equator_temperature - settings.tropical_gradient * tropical;

    if latitude <= tropical {
        settings.equator_temperature - settings.tropical_gradient * latitude
    } else {
        let t = (latitude - tropical) / (90.0 - tropical).max(f32::EPSILON);
        edge + (settings.pole_temperature - edge) * t
    }
}

/// Температура ячейки с высотой `height`, °C.
#[must_use]
pub fn temperature_at(latitude: f32, height: f32, scale: &WorldScale, settings: &ClimateSettings) -> f32 {
    let altitude_km = scale.altitude_m(height) / 1000.0;
    sea_level_temperature(latitude, settings) - settings.lapse_rate * altitude_km
}

pub(super) fn temperatures(
    mesh: &CellMesh,
    grid: &HeightGrid,
    scale: &WorldScale,
    settings: &ClimateSettings,
) -> Vec<f32> {
    let cell_temperature = |cell: usize| {
        let latitude = scale.latitude_at(mesh.cell_centers[cell].1, mesh.height);
        temperature_at(latitude, grid.heights[cell], scale, settings)
    };

    #[cfg(feature = "parallel")]
    let temperature = (0..mesh.cell_count())
        .into_par_iter()
        .map(cell_temperature)
        .collect();
    #[cfg(not(feature = "parallel"))]
    let temperature = (0..mesh.cell_count()).map(cell_temperature).collect();

    temperature
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn curve_is_flat_in_tropics_and_reaches_pole() {
        let settings = ClimateSettings::default();
        let equator = sea_level_temperature(0.0, &settings);
        let tropic = sea_level_temperature(settings.tropical_latitude, &settings);
        assert!((equator - settings.equator_temperature).abs() < 1e-5);
        assert!(equator - tropic < 3.0);
        assert!((sea_level_temperature(90.0, &settings) - settings.pole_temperature).abs() < 1e-4);
        assert!((sea_level_temperature(-90.0, &settings) - settings.pole_temperature).abs() < 1e-4);
    }

    #[test]
    fn curve_is_symmetric_and_monotone() {
        let settings = ClimateSettings::default();
        let mut previous = f32::INFINITY;
        for step in 0..=90 {
            let lat = step as f32;
            let north = sea_level_temperature(lat, &settings);
            assert_eq!(north, sea_level_temperature(-lat, &settings));
            assert!(north <= previous);
            previous = north;
        }
    }

    #[test]
    fn altitude_cools_land_only() {
        let settings = ClimateSettings::default();
        let scale = WorldScale::default();
        let sea = temperature_at(10.0, 5.0, &scale, &settings);
        let coast = temperature_at(10.0, scale.sea_level, &scale, &settings);
        let peak = temperature_at(10.0, scale.max_height, &scale, &settings);
        assert_eq!(sea, coast);
        let expected = settings.lapse_rate * scale.max_elevation_m / 1000.0;
        assert!((coast - peak - expected).abs() < 1e-3);
    }
}
