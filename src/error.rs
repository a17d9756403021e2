//! Ошибки генерации
//!
//! Три класса ошибок:
//! - [`ConfigError`] — неверные входные параметры, генерация не начинается;
//! - [`GeometryError`] — вырожденный набор точек, сетку построить нельзя;
//! - [`MapgenError::Invariant`] — нарушение пост-условия этапа.

use thiserror::Error;

/// Ошибка конфигурации, обнаруженная до начала генерации.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("cell count must be at least 3, got {0}")]
    TooFewCells(usize),

    #[error("aspect ratio must be finite and positive, got {0}")]
    InvalidAspectRatio(f64),

    #[error("unknown heightmap template `{0}`")]
    UnknownTemplate(String),

    #[error("heightmap template `{0}` has no operations")]
    EmptyTemplate(String),

    #[error("latitude span must be increasing: south {south} >= north {north}")]
    NonIncreasingLatitude { south: f32, north: f32 },

    #[error("latitude must lie within [-90, 90], got {0}")]
    LatitudeOutOfRange(f32),

    #[error("height limits must satisfy min < sea level < max, got {min} / {sea_level} / {max}")]
    InvalidHeightLimits { min: f32, sea_level: f32, max: f32 },

    #[error("no wind bands configured")]
    NoWindBands,

    #[error("wind band {index} has zero direction vector")]
    ZeroWindDirection { index: usize },

    #[error("wind band {index} has an empty latitude range")]
    EmptyWindBand { index: usize },

    #[error("wind bands leave latitudes {from}..{to} uncovered")]
    UncoveredLatitudes { from: f32, to: f32 },

    #[error("parameter `{name}` is out of range: {value}")]
    OutOfRange { name: &'static str, value: f64 },
}

/// Ошибка вырожденной геометрии: набор точек нельзя триангулировать.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum GeometryError {
    #[error("at least 3 points are required, got {0}")]
    TooFewPoints(usize),

    #[error("all points are collinear")]
    Collinear,

    #[error("points {first} and {second} coincide")]
    DuplicatePoint { first: usize, second: usize },

    #[error("point {index} ({x}, {y}) lies outside the {width}x{height} domain")]
    OutOfBounds {
        index: usize,
        x: f64,
        y: f64,
        width: f64,
        height: f64,
    },

    #[error("point {0} has non-finite coordinates")]
    NonFinite(usize),

    #[error("domain size must be positive, got {width}x{height}")]
    EmptyDomain { width: f64, height: f64 },

    #[error("triangulation failed: {0}")]
    Triangulation(String),
}

/// Общая ошибка библиотеки.
#[derive(Debug, Error)]
pub enum MapgenError {
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("degenerate geometry: {0}")]
    Geometry(#[from] GeometryError),

    #[error("invariant violated in {stage}: {message}")]
    Invariant { stage: &'static str, message: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Toml(#[from] toml::de::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Image(#[from] image::ImageError),
}

impl MapgenError {
    pub(crate) fn invariant(stage: &'static str, message: impl Into<String>) -> Self {
        Self::Invariant {
            stage,
            message: message.into(),
        }
    }
}

pub type Result<T, E = MapgenError> = std::result::Result<T, E>;
