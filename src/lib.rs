pub mod climate;
pub mod config;
pub mod error;
pub mod heightmap;
pub mod mesh;
pub mod points;
pub mod preview;
pub mod rivers;
pub mod seed;
mod timing;
pub mod world;

pub use climate::{ClimateData, generate_climate};
pub use config::{
    ClimateSettings, HeightmapSettings, RiverSettings, WindBand, WorldGenerationParams, WorldScale,
};
pub use error::{ConfigError, GeometryError, MapgenError, Result};
pub use heightmap::{HeightGrid, HeightStats, Operation, Template, generate_heightmap};
pub use mesh::{CellMesh, build_mesh};
pub use rivers::{Lake, River, RiverData, generate_rivers};
pub use world::{World, WorldSummary, generate_world};
