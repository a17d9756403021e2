//! Перенос полей на вершины и заполнение впадин (priority flood)

use std::cmp::Ordering;
use std::collections::BinaryHeap;

#[cfg(feature = "parallel")]
use rayon::prelude::*;

use crate::climate::ClimateData;
use crate::heightmap::HeightGrid;
use crate::mesh::CellMesh;

/// Высота, осадки и признак океана в вершинах.
pub(super) struct VertexFields {
    pub height: Vec<f32>,
    pub precipitation: Vec<f32>,
    pub is_ocean: Vec<bool>,
}

/// Среднее по ячейкам, сходящимся в вершине.
pub(super) fn interpolate(mesh: &CellMesh, grid: &HeightGrid, climate: &ClimateData) -> VertexFields {
    let mean_at = |v: usize| {
        let cells = &mesh.vertex_cells[v];
        let count = cells.len().max(1) as f32;
        let height = cells.iter().map(|&c| grid.heights[c]).sum::<f32>() / count;
        let rain = cells.iter().map(|&c| climate.precipitation[c]).sum::<f32>() / count;
        (height, rain)
    };

    #[cfg(feature = "parallel")]
    let means: Vec<(f32, f32)> = (0..mesh.vertex_count()).into_par_iter().map(mean_at).collect();
    #[cfg(not(feature = "parallel"))]
    let means: Vec<(f32, f32)> = (0..mesh.vertex_count()).map(mean_at).collect();

    let (height, precipitation): (Vec<f32>, Vec<f32>) = means.into_iter().unzip();
    let mut is_ocean: Vec<bool> = height.iter().map(|&h| h <= grid.sea_level).collect();

    // Карта без океана: вода уходит за край через граничные вершины.
    if !is_ocean.iter().any(|&ocean| ocean) {
        log::warn!("rivers: no ocean vertices, using map border as outlets");
        for (v, ocean) in is_ocean.iter_mut().enumerate() {
            *ocean = mesh.is_border_vertex(v);
        }
    }

    VertexFields {
        height,
        precipitation,
        is_ocean,
    }
}

#[derive(Clone, Copy, Debug)]
struct HeapItem {
    level: f32,
    vertex: usize,
}

impl PartialEq for HeapItem {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for HeapItem {}

// Min-heap по уровню воды, при равенстве по номеру вершины.
impl PartialOrd for HeapItem {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for HeapItem {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .level
            .total_cmp(&self.level)
            .then_with(|| other.vertex.cmp(&self.vertex))
    }
}

/// Результат заполнения впадин.
pub(super) struct Flood {
    /// Уровень воды: высота вершины или уровень озера над ней.
    pub water_level: Vec<f32>,
    /// Сток затопленных вершин; у остальных пока `None`.
    pub flow_target: Vec<Option<usize>>,
    /// Порядок извлечения из кучи; `usize::MAX` у океана.
    pub rank: Vec<usize>,
}

/// Заполняет впадины от побережья вглубь суши.
///
/// Суша, смежная с океаном, попадает в кучу первой. Извлекается вершина с
/// наименьшим уровнем; соседи не ниже неё стекают свободно, соседи ниже
/// затапливаются до её уровня и получают её как сток.
pub(super) fn priority_flood(mesh: &CellMesh, fields: &VertexFields) -> Flood {
    let n = mesh.vertex_count();
    let mut water_level = fields.height.clone();
    let mut flow_target = vec![None; n];
    let mut rank = vec![usize::MAX; n];
    let mut visited = fields.is_ocean.clone();
    let mut heap = BinaryHeap::new();

    for v in 0..n {
        if fields.is_ocean[v] {
            continue;
        }
        if mesh.vertex_neighbors[v].iter().any(|&u| fields.is_ocean[u]) {
            visited[v] = true;
            heap.push(HeapItem {
                level: water_level[v],
                vertex: v,
            });
        }
    }

    let mut popped = 0;
    while let Some(HeapItem { level, vertex }) = heap.pop() {
        rank[vertex] = popped;
        popped += 1;

        for &next in &mesh.vertex_neighbors[vertex] {
            if visited[next] {
                continue;
            }
            visited[next] = true;
            if fields.height[next] < level {
                water_level[next] = level;
                flow_target[next] = Some(vertex);
            }
            heap.push(HeapItem {
                level: water_level[next],
                vertex: next,
            });
        }
    }

    Flood {
        water_level,
        flow_target,
        rank,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn heap_pops_lowest_level_then_lowest_id() {
        let mut heap = BinaryHeap::new();
        for (level, vertex) in [(3.0, 0), (1.0, 5), (1.0, 2), (2.0, 1)] {
            heap.push(HeapItem { level, vertex });
        }
        let order: Vec<usize> = std::iter::from_fn(|| heap.pop().map(|item| item.vertex)).collect();
        assert_eq!(order, vec![2, 5, 1, 0]);
    }
}
