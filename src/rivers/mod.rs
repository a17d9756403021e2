//! Речная сеть
//!
//! Этапы:
//! 1. Высоты и осадки переносятся с ячеек на вершины (среднее по смежным ячейкам)
//! 2. Впадины заполняются priority flood, озёра получают уровень воды
//! 3. Поток накапливается от высоких вершин к низким
//! 4. Из поля потока выделяются реки и притоки
//!
//! После заполнения цепочка стока каждой вершины суши доходит до океана.

mod extract;
mod fill;
mod flow;
mod lakes;

use petgraph::algo::toposort;
use petgraph::graph::DiGraph;
use serde::{Deserialize, Serialize};

use crate::climate::ClimateData;
use crate::config::RiverSettings;
use crate::error::{MapgenError, Result};
use crate::heightmap::HeightGrid;
use crate::mesh::CellMesh;
use crate::timing::StageTimer;
use extract::Drainage;

/// Река: вершины от принимающей (океан или место слияния) к истоку.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct River {
    pub id: usize,
    pub vertices: Vec<usize>,
    /// Поток в устье.
    pub discharge: f32,
    /// Река, в которую впадает этот приток.
    pub parent: Option<usize>,
}

impl River {
    fn new(id: usize, receiver: usize, path: Vec<usize>, discharge: f32, parent: Option<usize>) -> Self {
        let mut vertices = Vec::with_capacity(path.len() + 1);
        vertices.push(receiver);
        vertices.extend(path);
        Self {
            id,
            vertices,
            discharge,
            parent,
        }
    }

    /// Устье реки (первая собственная вершина).
    #[must_use]
    pub fn mouth(&self) -> usize {
        self.vertices[1]
    }

    /// Исток реки.
    #[must_use]
    pub fn source(&self) -> usize {
        self.vertices[self.vertices.len() - 1]
    }

    /// Вершины без принимающей.
    #[must_use]
    pub fn own_vertices(&self) -> &[usize] {
        &self.vertices[1..]
    }

    /// Длина ломаной в единицах карты.
    #[must_use]
    pub fn length(&self, mesh: &CellMesh) -> f64 {
        self.vertices
            .windows(2)
            .map(|pair| mesh.vertex_distance(pair[0], pair[1]))
            .sum()
    }
}

/// Озеро: связные вершины под одним уровнем воды.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Lake {
    pub id: usize,
    pub vertices: Vec<usize>,
    pub water_level: f32,
    /// Первая вершина вне озера на пути стока.
    pub outlet: usize,
}

/// Гидрология мира: поля по вершинам, поток по рёбрам, реки и озёра.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiverData {
    pub height: Vec<f32>,
    pub precipitation: Vec<f32>,
    /// Не ниже высоты; у озёр строго выше.
    pub water_level: Vec<f32>,
    pub flux: Vec<f32>,
    /// Сток вершины; `None` только у океана.
    pub flow_target: Vec<Option<usize>>,
    pub is_ocean: Vec<bool>,
    pub edge_flux: Vec<f32>,
    /// Порог потока, по которому выделены реки.
    pub flux_threshold: f32,
    pub rivers: Vec<River>,
    pub lakes: Vec<Lake>,
}

impl RiverData {
    /// Притоки реки `id`.
    pub fn tributaries(&self, id: usize) -> impl Iterator<Item = &River> + '_ {
        self.rivers.iter().filter(move |r| r.parent == Some(id))
    }

    /// Вершина под озером.
    #[must_use]
    pub fn is_lake(&self, vertex: usize) -> bool {
        self.water_level[vertex] > self.height[vertex]
    }

    /// Цепочка стока от вершины до океана включительно.
    #[must_use]
    pub fn drainage_path(&self, vertex: usize) -> Vec<usize> {
        let mut path = vec![vertex];
        let mut current = vertex;
        while let Some(next) = self.flow_target[current] {
            if path.len() > self.flow_target.len() {
                break;
            }
            path.push(next);
            current = next;
        }
        path
    }

    fn check(&self, mesh: &CellMesh) -> Result<()> {
        let fail = |message: String| Err(MapgenError::invariant("rivers", message));
        let n = mesh.vertex_count();

        let mut graph = DiGraph::<usize, ()>::with_capacity(n, n);
        let nodes: Vec<_> = (0..n).map(|v| graph.add_node(v)).collect();

        for v in 0..n {
            if self.is_ocean[v] != self.flow_target[v].is_none() {
                return fail(format!("vertex {v}: ocean flag and flow target disagree"));
            }
            if let Some(target) = self.flow_target[v] {
                graph.add_edge(nodes[v], nodes[target], ());
            }
            if !self.flux[v].is_finite() || self.flux[v] < 0.0 {
                return fail(format!("vertex {v} has invalid flux {}", self.flux[v]));
            }
            if !self.precipitation[v].is_finite() || self.precipitation[v] < 0.0 {
                return fail(format!(
                    "vertex {v} has invalid precipitation {}",
                    self.precipitation[v]
                ));
            }
            if !self.height[v].is_finite() || self.water_level[v] < self.height[v] {
                return fail(format!("vertex {v} has water level below ground"));
            }
        }
        if let Some(edge) = self.edge_flux.iter().position(|f| !f.is_finite() || *f < 0.0) {
            return fail(format!("edge {edge} has invalid flux"));
        }

        // Без циклов каждая цепочка стока обрывается на вершине без стока, то есть в океане.
        if let Err(cycle) = toposort(&graph, None) {
            return fail(format!(
                "flow cycle through vertex {}",
                graph[cycle.node_id()]
            ));
        }
        Ok(())
    }
}

/// Строит речную сеть по рельефу и климату.
pub fn generate_rivers(
    mesh: &CellMesh,
    grid: &HeightGrid,
    climate: &ClimateData,
    settings: &RiverSettings,
) -> Result<RiverData> {
    let _timer = StageTimer::start("rivers");

    let fields = fill::interpolate(mesh, grid, climate);
    let flood = fill::priority_flood(mesh, &fields);
    let flow = flow::accumulate(mesh, &fields, &flood)?;

    let threshold = settings.resolve_threshold(mean_land_precipitation(&fields));
    let rivers = extract::extract_rivers(&Drainage {
        flux: &flow.flux,
        flow_target: &flow.flow_target,
        is_ocean: &fields.is_ocean,
        threshold,
        min_vertices: settings.min_river_vertices,
    });
    let lakes = lakes::find_lakes(mesh, &fields.height, &flood.water_level, &flow.flow_target);

    let data = RiverData {
        height: fields.height,
        precipitation: fields.precipitation,
        water_level: flood.water_level,
        flux: flow.flux,
        flow_target: flow.flow_target,
        is_ocean: fields.is_ocean,
        edge_flux: flow.edge_flux,
        flux_threshold: threshold,
        rivers,
        lakes,
    };
    data.check(mesh)?;

    let land = data.is_ocean.iter().filter(|&&ocean| !ocean).count();
    log::debug!(
        "rivers: {land} land vertices, threshold {threshold:.2}, {} rivers, {} lakes",
        data.rivers.len(),
        data.lakes.len()
    );
    if land > 0 && data.rivers.is_empty() {
        log::warn!("rivers: no vertex reached flux threshold {threshold}");
    }
    Ok(data)
}

/// Средние осадки вершины суши; 0 без суши.
fn mean_land_precipitation(fields: &fill::VertexFields) -> f32 {
    let (sum, count) = fields
        .precipitation
        .iter()
        .zip(&fields.is_ocean)
        .filter(|(_, ocean)| !**ocean)
        .fold((0.0_f64, 0_usize), |(sum, count), (&p, _)| {
            (sum + f64::from(p), count + 1)
        });
    if count == 0 {
        0.0
    } else {
        (sum / count as f64) as f32
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh::build_mesh;
    use crate::points::jittered_grid;

    fn sample_mesh() -> CellMesh {
        let points = jittered_grid(30.0, 20.0, 600, 8);
        build_mesh(&points, 30.0, 20.0).unwrap()
    }

    fn uniform_climate(mesh: &CellMesh, rain: f32) -> ClimateData {
        ClimateData {
            temperature: vec![15.0; mesh.cell_count()],
            precipitation: vec![rain; mesh.cell_count()],
        }
    }

    fn grid(heights: Vec<f32>) -> HeightGrid {
        HeightGrid {
            heights,
            sea_level: 20.0,
            min_height: 0.0,
            max_height: 100.0,
            template: "test".into(),
        }
    }

    /// Остров-чаша: берег выше центра, внутри получается озеро.
    fn crater_island(mesh: &CellMesh) -> HeightGrid {
        grid(
            mesh.cell_centers
                .iter()
                .map(|&(x, y)| {
                    let r = ((x - 15.0).powi(2) + (y - 10.0).powi(2)).sqrt();
                    if r > 8.0 {
                        5.0
                    } else if r > 3.0 {
                        60.0 - 4.0 * r as f32
                    } else {
                        30.0
                    }
                })
                .collect(),
        )
    }

    #[test]
    fn crater_fills_into_a_lake_that_drains_out() {
        let mesh = sample_mesh();
        let heights = crater_island(&mesh);
        let data = generate_rivers(
            &mesh,
            &heights,
            &uniform_climate(&mesh, 1.0),
            &RiverSettings::default(),
        )
        .unwrap();

        assert!(!data.lakes.is_empty());
        let center = mesh.cell_vertices[mesh.find_cell(15.0, 10.0)][0];
        assert!(data.is_lake(center));
        let lake = data
            .lakes
            .iter()
            .find(|lake| lake.vertices.contains(&center))
            .unwrap();
        assert!(!lake.vertices.contains(&lake.outlet));
        assert!(lake.water_level > data.height[center]);

        for v in 0..mesh.vertex_count() {
            assert_eq!(data.flow_target[v].is_none(), data.is_ocean[v]);
            let path = data.drainage_path(v);
            let last = *path.last().unwrap();
            assert!(data.is_ocean[last]);
        }
    }

    #[test]
    fn all_land_drains_off_the_border() {
        let mesh = sample_mesh();
        let heights = grid(vec![50.0; mesh.cell_count()]);
        let data = generate_rivers(
            &mesh,
            &heights,
            &uniform_climate(&mesh, 1.0),
            &RiverSettings::default(),
        )
        .unwrap();
        for v in 0..mesh.vertex_count() {
            assert_eq!(data.is_ocean[v], mesh.is_border_vertex(v));
        }
        // Порог по умолчанию: десять средних вершин суши.
        assert!((data.flux_threshold - 10.0).abs() < 1e-4);
        let land: f32 = (0..mesh.vertex_count())
            .filter(|&v| !data.is_ocean[v])
            .map(|v| data.precipitation[v])
            .sum();
        let outflow: f32 = (0..mesh.vertex_count())
            .filter(|&v| data.is_ocean[v])
            .map(|v| data.flux[v])
            .sum();
        assert!((land - outflow).abs() < 1e-2 * land.max(1.0));
    }

    #[test]
    fn all_water_has_no_rivers() {
        let mesh = sample_mesh();
        let heights = grid(vec![5.0; mesh.cell_count()]);
        let data = generate_rivers(
            &mesh,
            &heights,
            &uniform_climate(&mesh, 3.0),
            &RiverSettings::default(),
        )
        .unwrap();
        assert!(data.rivers.is_empty());
        assert!(data.lakes.is_empty());
        assert!(data.flux.iter().all(|&f| f == 0.0));
    }

    #[test]
    fn rivers_follow_flow_targets() {
        let mesh = sample_mesh();
        // Наклонная равнина: суша поднимается к востоку, океан на западе.
        let heights = grid(
            mesh.cell_centers
                .iter()
                .map(|&(x, y)| if x < 4.0 { 5.0 } else { 22.0 + 2.0 * x as f32 + (y as f32 * 0.7).sin() })
                .collect(),
        );
        let settings = RiverSettings {
            flux_threshold: Some(20.0),
            ..RiverSettings::default()
        };
        let data = generate_rivers(&mesh, &heights, &uniform_climate(&mesh, 2.0), &settings).unwrap();
        assert!(!data.rivers.is_empty());

        for river in &data.rivers {
            assert!(river.own_vertices().len() >= 3);
            assert!(river.length(&mesh) > 0.0);
            for pair in river.vertices.windows(2) {
                assert_eq!(data.flow_target[pair[1]], Some(pair[0]));
                assert!(data.flux[pair[1]] <= data.flux[pair[0]] || data.is_ocean[pair[0]]);
            }
            match river.parent {
                None => assert!(data.is_ocean[river.vertices[0]]),
                Some(parent) => {
                    assert!(data.rivers[parent].vertices.contains(&river.vertices[0]));
                    assert!(data.tributaries(parent).any(|r| r.id == river.id));
                }
            }
        }
    }
}
