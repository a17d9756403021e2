// src/config.rs
//! Конфигурация генерации мира
//!
//! Этот модуль определяет все параметры, управляющие генерацией основы мира:
//! - Размер сетки (число ячеек и соотношение сторон)
//! - Шаблон рельефа и масштаб высот
//! - Климатические константы и таблицу ветровых поясов
//! - Пороги речной сети
//!
//! Все структуры поддерживают сериализацию в TOML/JSON для удобной настройки через конфигурационные файлы.
//! Параметры проверяются методом [`WorldGenerationParams::validate`] до начала любой работы.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::error::{ConfigError, Result};
use crate::heightmap::template::{self, RANDOM_TEMPLATE, Template};
use crate::seed::{op_rng, stream};

/// Масштаб мира: шкала высот и широтный охват карты.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorldScale {
    /// Минимальная высота (дно океана)
    #[serde(default = "default_min_height")]
    pub min_height: f32,

    /// Уровень моря: ячейка — суша, если её высота строго выше
    #[serde(default = "default_sea_level")]
    pub sea_level: f32,

    /// Максимальная высота
    #[serde(default = "default_max_height")]
    pub max_height: f32,

    /// Широта нижнего края карты (градусы)
    #[serde(default = "default_latitude_south")]
    pub latitude_south: f32,

    /// Широта верхнего края карты (градусы)
    #[serde(default = "default_latitude_north")]
    pub latitude_north: f32,

    /// Высота в метрах, соответствующая `max_height`
    #[serde(default = "default_max_elevation_m")]
    pub max_elevation_m: f32,

    /// Нелинейность перевода высоты в метры:
    /// `((h - sea) / (max - sea))^height_exponent * max_elevation_m`
    #[serde(default = "default_height_exponent")]
    pub height_exponent: f32,
}

fn default_min_height() -> f32 {
    0.0
}
fn default_sea_level() -> f32 {
    20.0
}
fn default_max_height() -> f32 {
    100.0
}
fn default_latitude_south() -> f32 {
    -60.0
}
fn default_latitude_north() -> f32 {
    60.0
}
fn default_max_elevation_m() -> f32 {
    6000.0
}
fn default_height_exponent() -> f32 {
    2.0
}

impl Default for WorldScale {
    fn default() -> Self {
        Self {
            min_height: 0.0,
            sea_level: 20.0,
            max_height: 100.0,
            latitude_south: -60.0,
            latitude_north: 60.0,
            max_elevation_m: 6000.0,
            height_exponent: 2.0,
        }
    }
}

impl WorldScale {
    /// Ограничение высоты допустимым диапазоном.
    #[must_use]
    pub fn clamp(&self, h: f32) -> f32 {
        h.clamp(self.min_height, self.max_height)
    }

    /// Широта для вертикальной координаты `y` в области высотой `height`.
    #[must_use]
    pub fn latitude_at(&self, y: f64, height: f64) -> f32 {
        let t = (y / height).clamp(0.0, 1.0) as f32;
        self.latitude_north + (self.latitude_south - self.latitude_north) * t
    }

    /// Высота над уровнем моря в метрах (0 для воды).
    #[must_use]
    pub fn altitude_m(&self, h: f32) -> f32 {
        if h <= self.sea_level {
            return 0.0;
        }
        let relative = ((h - self.sea_level) / (self.max_height - self.sea_level)).clamp(0.0, 1.0);
        relative.powf(self.height_exponent) * self.max_elevation_m
    }
}

/// Параметры затухания операций рельефа.
///
/// Если значение не задано, оно берётся из таблицы по числу ячеек: чем мельче сетка,
/// тем медленнее затухание, и холмы сохраняют размер в единицах карты.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HeightmapSettings {
    /// Показатель затухания холмов и впадин за один шаг обхода
    pub blob_power: Option<f32>,
    /// Показатель затухания хребтов и желобов за один слой
    pub line_power: Option<f32>,
}

/// Табличные показатели затухания: (число ячеек, blob, line).
const DECAY_TABLE: [(usize, f32, f32); 13] = [
    (1_000, 0.93, 0.75),
    (2_000, 0.95, 0.77),
    (5_000, 0.97, 0.79),
    (10_000, 0.98, 0.81),
    (20_000, 0.99, 0.82),
    (30_000, 0.991, 0.83),
    (40_000, 0.993, 0.84),
    (50_000, 0.994, 0.86),
    (60_000, 0.995, 0.87),
    (70_000, 0.9955, 0.88),
    (80_000, 0.996, 0.91),
    (90_000, 0.9964, 0.92),
    (100_000, 0.9973, 0.93),
];

impl HeightmapSettings {
    /// Итоговые `(blob_power, line_power)` для сетки из `cells` ячеек.
    #[must_use]
    pub fn resolve(&self, cells: usize) -> (f32, f32) {
        let row = DECAY_TABLE
            .iter()
            .find(|&&(limit, ..)| cells <= limit)
            .unwrap_or(&DECAY_TABLE[DECAY_TABLE.len() - 1]);
        (
            self.blob_power.unwrap_or(row.1),
            self.line_power.unwrap_or(row.2),
        )
    }
}

/// Ветровой пояс: диапазон широт и направление переноса влаги.
///
/// Направление задаётся в координатах карты: `x` — на восток, `y` — на юг.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WindBand {
    pub south: f32,
    pub north: f32,
    pub direction: [f32; 2],
}

impl WindBand {
    #[must_use]
    pub fn new(south: f32, north: f32, direction: [f32; 2]) -> Self {
        Self {
            south,
            north,
            direction,
        }
    }

    /// Единичный вектор направления.
    #[must_use]
    pub fn unit_direction(&self) -> (f64, f64) {
        let (x, y) = (f64::from(self.direction[0]), f64::from(self.direction[1]));
        let len = x.hypot(y);
        (x / len, y / len)
    }

    /// Длина пересечения пояса с диапазоном широт `[low, high]`.
    #[must_use]
    pub fn overlap(&self, low: f32, high: f32) -> f32 {
        (self.north.min(high) - self.south.max(low)).max(0.0)
    }
}

/// Земная циркуляция: пассаты, западные ветры и полярные восточные в обоих полушариях.
#[must_use]
pub fn default_wind_bands() -> Vec<WindBand> {
    vec![
        WindBand::new(-90.0, -60.0, [-1.0, -0.3]),
        WindBand::new(-60.0, -30.0, [1.0, 0.4]),
        WindBand::new(-30.0, 0.0, [-1.0, -0.4]),
        WindBand::new(0.0, 30.0, [-1.0, 0.4]),
        WindBand::new(30.0, 60.0, [1.0, -0.4]),
        WindBand::new(60.0, 90.0, [-1.0, 0.3]),
    ]
}

/// Климатические константы.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClimateSettings {
    /// Температура на экваторе на уровне моря, °C
    pub equator_temperature: f32,
    /// Температура на полюсе на уровне моря, °C
    pub pole_temperature: f32,
    /// Граница тропического пояса, градусы широты
    pub tropical_latitude: f32,
    /// Падение температуры внутри тропиков, °C на градус широты
    pub tropical_gradient: f32,
    /// Высотный градиент, °C на километр
    pub lapse_rate: f32,

    /// Влажность воздуха на наветренной границе
    pub ocean_humidity: f32,
    /// Влага, набираемая над водной ячейкой
    pub pickup_rate: f32,
    /// Влагоёмкость при 0 °C; удваивается каждые 10 °C
    pub base_capacity: f32,
    pub min_capacity: f32,
    pub max_capacity: f32,
    /// Доля влаги, выпадающая над любой сушей
    pub base_loss: f32,
    /// Добавка для суши, граничащей с водой
    pub coastal_bonus: f32,
    /// Добавка за крутизну подъёма (при уклоне `slope_reference` и выше)
    pub slope_rate: f32,
    /// Уклон (единиц высоты на единицу длины), дающий полную добавку
    pub slope_reference: f32,
    /// Добавка за высоту (на максимальной высоте)
    pub altitude_rate: f32,
    /// Ниже этой температуры перенос влаги ослабевает
    pub permafrost_temperature: f32,
    /// Множитель переносимой влаги в зоне вечной мерзлоты
    pub permafrost_damping: f32,
    /// Степень сжатия итоговых осадков (0 < p <= 1)
    pub precipitation_exponent: f32,

    /// Ветровые пояса
    pub wind_bands: Vec<WindBand>,
}

impl Default for ClimateSettings {
    fn default() -> Self {
        Self {
            equator_temperature: 27.0,
            pole_temperature: -30.0,
            tropical_latitude: 16.0,
            tropical_gradient: 0.15,
            lapse_rate: 6.5,
            ocean_humidity: 100.0,
            pickup_rate: 20.0,
            base_capacity: 40.0,
            min_capacity: 10.0,
            max_capacity: 250.0,
            base_loss: 0.05,
            coastal_bonus: 0.1,
            slope_rate: 0.4,
            slope_reference: 10.0,
            altitude_rate: 0.15,
            permafrost_temperature: -5.0,
            permafrost_damping: 0.5,
            precipitation_exponent: 0.7,
            wind_bands: default_wind_bands(),
        }
    }
}

/// Пороги речной сети.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RiverSettings {
    /// Минимальный поток, при котором вершина считается речной.
    /// Если не задан, берётся `threshold_factor` средних осадков вершины суши.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub flux_threshold: Option<f32>,
    /// Сколько средних вершин суши должно стекать в вершину, чтобы она стала речной
    pub threshold_factor: f32,
    /// Реки с меньшим числом собственных вершин отбрасываются
    pub min_river_vertices: usize,
}

impl Default for RiverSettings {
    fn default() -> Self {
        Self {
            flux_threshold: None,
            threshold_factor: 10.0,
            min_river_vertices: 3,
        }
    }
}

impl RiverSettings {
    /// Порог потока при средних осадках вершины суши `mean_precipitation`.
    ///
    /// Поток вершины есть сумма осадков её водосбора, поэтому порог в средних
    /// осадках не зависит ни от числа ячеек, ни от климатических констант.
    #[must_use]
    pub fn resolve_threshold(&self, mean_precipitation: f32) -> f32 {
        self.flux_threshold
            .unwrap_or(self.threshold_factor * mean_precipitation.max(0.0))
    }
}

/// Основные параметры генерации мира
///
/// Полная конфигурация для генерации одного мира. Поддерживает загрузку из TOML-файлов.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorldGenerationParams {
    /// Сид генератора случайных чисел (детерминированная генерация)
    pub seed: u32,

    /// Число ячеек сетки (по умолчанию 10 000)
    #[serde(default = "default_cells")]
    pub cells: usize,

    /// Соотношение сторон карты, ширина / высота (по умолчанию 1.6)
    #[serde(default = "default_aspect_ratio")]
    pub aspect_ratio: f64,

    /// Имя шаблона рельефа или `random` (по умолчанию `continents`)
    #[serde(default = "default_template")]
    pub template: String,

    /// Масштаб высот и широт
    #[serde(default)]
    pub world: WorldScale,

    /// Параметры затухания операций рельефа
    #[serde(default)]
    pub heightmap: HeightmapSettings,

    /// Климатические константы и ветровые пояса
    #[serde(default)]
    pub climate: ClimateSettings,

    /// Пороги речной сети
    #[serde(default)]
    pub rivers: RiverSettings,

    /// Пользовательские шаблоны; перекрывают встроенные с тем же именем
    #[serde(default)]
    pub templates: Vec<Template>,
}

fn default_cells() -> usize {
    10_000
}
fn default_aspect_ratio() -> f64 {
    1.6
}
fn default_template() -> String {
    "continents".to_string()
}

impl Default for WorldGenerationParams {
    fn default() -> Self {
        Self {
            seed: 0,
            cells: 10_000,
            aspect_ratio: 1.6,
            template: default_template(),
            world: WorldScale::default(),
            heightmap: HeightmapSettings::default(),
            climate: ClimateSettings::default(),
            rivers: RiverSettings::default(),
            templates: Vec::new(),
        }
    }
}

impl WorldGenerationParams {
    /// Загружает параметры из TOML-файла
    ///
    /// # Пример
    /// ```toml
    /// # world.toml
    /// seed = 42
    /// cells = 20000
    /// aspect_ratio = 2.0
    /// template = "archipelago"
    /// ```
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        Self::from_toml_str(&contents)
    }

    /// Разбирает параметры из строки TOML.
    pub fn from_toml_str(contents: &str) -> Result<Self> {
        Ok(toml::from_str(contents)?)
    }

    /// Проверяет параметры; генерация не начинается, если здесь есть ошибка.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.cells < 3 {
            return Err(ConfigError::TooFewCells(self.cells));
        }
        if !(self.aspect_ratio.is_finite() && self.aspect_ratio > 0.0) {
            return Err(ConfigError::InvalidAspectRatio(self.aspect_ratio));
        }

        let world = &self.world;
        if !(world.min_height < world.sea_level && world.sea_level < world.max_height) {
            return Err(ConfigError::InvalidHeightLimits {
                min: world.min_height,
                sea_level: world.sea_level,
                max: world.max_height,
            });
        }
        for latitude in [world.latitude_south, world.latitude_north] {
            if !(-90.0..=90.0).contains(&latitude) {
                return Err(ConfigError::LatitudeOutOfRange(latitude));
            }
        }
        if world.latitude_south >= world.latitude_north {
            return Err(ConfigError::NonIncreasingLatitude {
                south: world.latitude_south,
                north: world.latitude_north,
            });
        }
        check_positive("world.max_elevation_m", world.max_elevation_m)?;
        check_positive("world.height_exponent", world.height_exponent)?;

        for (name, value) in [
            ("heightmap.blob_power", self.heightmap.blob_power),
            ("heightmap.line_power", self.heightmap.line_power),
        ] {
            if let Some(value) = value {
                if !(value > 0.0 && value < 1.0) {
                    return Err(ConfigError::OutOfRange {
                        name,
                        value: f64::from(value),
                    });
                }
            }
        }

        self.validate_climate()?;

        let rivers = &self.rivers;
        let thresholds = [
            ("rivers.flux_threshold", rivers.flux_threshold),
            ("rivers.threshold_factor", Some(rivers.threshold_factor)),
        ];
        for (name, value) in thresholds {
            if let Some(value) = value.filter(|v| !(v.is_finite() && *v >= 0.0)) {
                return Err(ConfigError::OutOfRange {
                    name,
                    value: f64::from(value),
                });
            }
        }

        self.resolve_template().map(|_| ())
    }

    fn validate_climate(&self) -> Result<(), ConfigError> {
        let climate = &self.climate;
        check_positive("climate.base_capacity", climate.base_capacity)?;
        check_positive("climate.max_capacity", climate.max_capacity)?;
        if climate.min_capacity < 0.0 || climate.min_capacity > climate.max_capacity {
            return Err(ConfigError::OutOfRange {
                name: "climate.min_capacity",
                value: f64::from(climate.min_capacity),
            });
        }
        for (name, value) in [
            ("climate.ocean_humidity", climate.ocean_humidity),
            ("climate.pickup_rate", climate.pickup_rate),
            ("climate.base_loss", climate.base_loss),
            ("climate.coastal_bonus", climate.coastal_bonus),
            ("climate.slope_rate", climate.slope_rate),
            ("climate.altitude_rate", climate.altitude_rate),
            ("climate.permafrost_damping", climate.permafrost_damping),
        ] {
            if !(value.is_finite() && value >= 0.0) {
                return Err(ConfigError::OutOfRange {
                    name,
                    value: f64::from(value),
                });
            }
        }
        check_positive("climate.slope_reference", climate.slope_reference)?;
        if !(climate.precipitation_exponent > 0.0 && climate.precipitation_exponent <= 1.0) {
            return Err(ConfigError::OutOfRange {
                name: "climate.precipitation_exponent",
                value: f64::from(climate.precipitation_exponent),
            });
        }

        check_wind_coverage(
            &climate.wind_bands,
            self.world.latitude_south,
            self.world.latitude_north,
        )
    }

    /// Шаблон рельефа для этого запуска; `random` выбирается по сиду.
    pub fn resolve_template(&self) -> Result<Template, ConfigError> {
        let name = if self.template == RANDOM_TEMPLATE {
            let mut rng = op_rng(self.seed, stream::TEMPLATE_PICK, 0);
            template::pick_weighted(&mut rng).to_string()
        } else {
            self.template.clone()
        };

        let resolved = self
            .templates
            .iter()
            .find(|t| t.name == name)
            .cloned()
            .or_else(|| template::builtin(&name))
            .ok_or_else(|| ConfigError::UnknownTemplate(name.clone()))?;

        if resolved.operations.is_empty() {
            return Err(ConfigError::EmptyTemplate(name));
        }
        Ok(resolved)
    }
}

fn check_positive(name: &'static str, value: f32) -> Result<(), ConfigError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(ConfigError::OutOfRange {
            name,
            value: f64::from(value),
        })
    }
}

/// Пояса должны покрывать весь диапазон широт карты без разрывов.
fn check_wind_coverage(bands: &[WindBand], south: f32, north: f32) -> Result<(), ConfigError> {
    if bands.is_empty() {
        return Err(ConfigError::NoWindBands);
    }
    for (index, band) in bands.iter().enumerate() {
        let [x, y] = band.direction;
        if !(x.is_finite() && y.is_finite()) || x.hypot(y) <= f32::EPSILON {
            return Err(ConfigError::ZeroWindDirection { index });
        }
        if band.south >= band.north {
            return Err(ConfigError::EmptyWindBand { index });
        }
    }

    let mut sorted: Vec<&WindBand> = bands.iter().collect();
    sorted.sort_by(|a, b| a.south.total_cmp(&b.south));

    let mut covered = south;
    for band in sorted {
        if covered >= north {
            break;
        }
        if band.south > covered {
            return Err(ConfigError::UncoveredLatitudes {
                from: covered,
                to: band.south.min(north),
            });
        }
        covered = covered.max(band.north);
    }
    if covered < north {
        return Err(ConfigError::UncoveredLatitudes {
            from: covered,
            to: north,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        WorldGenerationParams::default().validate().unwrap();
    }

    #[test]
    fn minimal_toml_fills_defaults() {
        let params = WorldGenerationParams::from_toml_str("seed = 7\ncells = 500").unwrap();
        assert_eq!(params.seed, 7);
        assert_eq!(params.cells, 500);
        assert_eq!(params.template, "continents");
        assert_eq!(params.world, WorldScale::default());
        assert_eq!(params.climate.wind_bands.len(), 6);
    }

    #[test]
    fn invalid_inputs_are_rejected() {
        let base = WorldGenerationParams::default();

        let mut params = base.clone();
        params.cells = 2;
        assert_eq!(params.validate(), Err(ConfigError::TooFewCells(2)));

        let mut params = base.clone();
        params.template = "atlantis".into();
        assert_eq!(
            params.validate(),
            Err(ConfigError::UnknownTemplate("atlantis".into()))
        );

        let mut params = base.clone();
        params.templates.push(Template {
            name: "blank".into(),
            operations: Vec::new(),
        });
        params.template = "blank".into();
        assert_eq!(params.validate(), Err(ConfigError::EmptyTemplate("blank".into())));

        let mut params = base.clone();
        params.rivers.flux_threshold = Some(-1.0);
        assert!(matches!(
            params.validate(),
            Err(ConfigError::OutOfRange { name: "rivers.flux_threshold", .. })
        ));

        let mut params = base.clone();
        params.rivers.threshold_factor = f32::NAN;
        assert!(matches!(
            params.validate(),
            Err(ConfigError::OutOfRange { name: "rivers.threshold_factor", .. })
        ));

        let mut params = base.clone();
        params.world.latitude_south = 40.0;
        params.world.latitude_north = 40.0;
        assert!(matches!(
            params.validate(),
            Err(ConfigError::NonIncreasingLatitude { .. })
        ));
    }

    #[test]
    fn river_threshold_follows_mean_precipitation() {
        let settings = RiverSettings::default();
        assert_eq!(settings.resolve_threshold(2.0), 20.0);
        assert_eq!(settings.resolve_threshold(4.0), 40.0);
        assert_eq!(settings.resolve_threshold(-1.0), 0.0);

        let fixed = RiverSettings {
            flux_threshold: Some(150.0),
            ..RiverSettings::default()
        };
        assert_eq!(fixed.resolve_threshold(2.0), 150.0);

        let parsed: RiverSettings = toml::from_str("flux_threshold = 40.0").unwrap();
        assert_eq!(parsed.flux_threshold, Some(40.0));
        assert_eq!(parsed.threshold_factor, 10.0);
    }

    #[test]
    fn wind_bands_must_cover_latitudes() {
        let mut params = WorldGenerationParams::default();
        params.climate.wind_bands = vec![
            WindBand::new(-90.0, -10.0, [1.0, 0.0]),
            WindBand::new(0.0, 90.0, [1.0, 0.0]),
        ];
        assert_eq!(
            params.validate(),
            Err(ConfigError::UncoveredLatitudes {
                from: -10.0,
                to: 0.0
            })
        );

        params.world.latitude_south = 5.0;
        params.world.latitude_north = 50.0;
        params.validate().unwrap();

        params.climate.wind_bands = vec![WindBand::new(0.0, 90.0, [0.0, 0.0])];
        assert_eq!(
            params.validate(),
            Err(ConfigError::ZeroWindDirection { index: 0 })
        );
    }

    #[test]
    fn random_template_depends_on_seed_only() {
        let mut params = WorldGenerationParams {
            template: RANDOM_TEMPLATE.into(),
            ..WorldGenerationParams::default()
        };
        let first = params.resolve_template().unwrap();
        assert_eq!(first, params.resolve_template().unwrap());

        let names: std::collections::HashSet<String> = (0..64)
            .map(|seed| {
                params.seed = seed;
                params.resolve_template().unwrap().name
            })
            .collect();
        assert!(names.len() > 3);
    }

    #[test]
    fn custom_template_shadows_builtin() {
        let text = r#"
            seed = 1
            template = "volcano"

            [[templates]]
            name = "volcano"
            operations = [{ op = "add", value = 30, filter = "all" }]
        "#;
        let params = WorldGenerationParams::from_toml_str(text).unwrap();
        let template = params.resolve_template().unwrap();
        assert_eq!(template.operations.len(), 1);
    }

    #[test]
    fn decay_table_tracks_cell_count() {
        let settings = HeightmapSettings::default();
        assert_eq!(settings.resolve(800), (0.93, 0.75));
        assert_eq!(settings.resolve(10_000), (0.98, 0.81));
        assert_eq!(settings.resolve(1_000_000), (0.9973, 0.93));
        let tuned = HeightmapSettings {
            blob_power: Some(0.9),
            line_power: None,
        };
        assert_eq!(tuned.resolve(10_000), (0.9, 0.81));
    }

    #[test]
    fn latitude_and_altitude_helpers() {
        let world = WorldScale::default();
        assert!((world.latitude_at(0.0, 100.0) - 60.0).abs() < 1e-6);
        assert!((world.latitude_at(50.0, 100.0)).abs() < 1e-6);
        assert!((world.latitude_at(100.0, 100.0) + 60.0).abs() < 1e-6);
        assert_eq!(world.altitude_m(10.0), 0.0);
        assert!((world.altitude_m(100.0) - 6000.0).abs() < 1e-3);
    }
}
