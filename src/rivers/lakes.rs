//! Озёра: связные группы затопленных вершин с общим уровнем воды

use std::collections::VecDeque;

use super::Lake;
use crate::mesh::CellMesh;

pub(super) fn find_lakes(
    mesh: &CellMesh,
    height: &[f32],
    water_level: &[f32],
    flow_target: &[Option<usize>],
) -> Vec<Lake> {
    let n = mesh.vertex_count();
    let flooded = |v: usize| water_level[v] > height[v];
    let mut lake_of = vec![usize::MAX; n];
    let mut lakes = Vec::new();

    for seed in 0..n {
        if !flooded(seed) || lake_of[seed] != usize::MAX {
            continue;
        }
        let id = lakes.len();
        let level = water_level[seed];
        let mut vertices = vec![seed];
        lake_of[seed] = id;

        let mut queue = VecDeque::from([seed]);
        while let Some(v) = queue.pop_front() {
            for &u in &mesh.vertex_neighbors[v] {
                let same_level = water_level[u].to_bits() == level.to_bits();
                if lake_of[u] == usize::MAX && flooded(u) && same_level {
                    lake_of[u] = id;
                    vertices.push(u);
                    queue.push_back(u);
                }
            }
        }
        vertices.sort_unstable();

        // Сток озера: первая вершина вне озера по цепочке стока.
        let mut outlet = seed;
        while lake_of[outlet] == id {
            match flow_target[outlet] {
                Some(next) => outlet = next,
                None => break,
            }
        }

        lakes.push(Lake {
            id,
            vertices,
            water_level: level,
            outlet,
        });
    }
    lakes
}
