//! Накопление стока по вершинам и рёбрам

use std::cmp::Ordering;

use super::fill::{Flood, VertexFields};
use crate::error::{MapgenError, Result};
use crate::mesh::CellMesh;

/// Ключ порядка стока: океан ниже всего, дальше уровень воды, затем ранг затопления.
fn drain_key(fields: &VertexFields, flood: &Flood, v: usize) -> (bool, f32, usize) {
    (!fields.is_ocean[v], flood.water_level[v], flood.rank[v])
}

fn compare_keys(a: (bool, f32, usize), b: (bool, f32, usize)) -> Ordering {
    a.0.cmp(&b.0)
        .then_with(|| a.1.total_cmp(&b.1))
        .then_with(|| a.2.cmp(&b.2))
}

pub(super) struct Flow {
    pub flux: Vec<f32>,
    pub flow_target: Vec<Option<usize>>,
    pub edge_flux: Vec<f32>,
}

/// Проходит сушу от высокого уровня воды к низкому и передаёт поток в сток.
///
/// При равном уровне первыми идут вершины, затопленные позже: внутренность
/// озера раньше его берега. У свободно стекающей вершины сток — сосед с
/// наименьшим ключом [`drain_key`]; он всегда идёт в обходе позже.
pub(super) fn accumulate(mesh: &CellMesh, fields: &VertexFields, flood: &Flood) -> Result<Flow> {
    let n = mesh.vertex_count();
    let mut flux = vec![0.0_f32; n];
    let mut flow_target = flood.flow_target.clone();

    let mut order: Vec<usize> = (0..n).filter(|&v| !fields.is_ocean[v]).collect();
    order.sort_by(|&a, &b| {
        flood.water_level[b]
            .total_cmp(&flood.water_level[a])
            .then_with(|| flood.rank[b].cmp(&flood.rank[a]))
    });

    for &v in &order {
        flux[v] += fields.precipitation[v];

        let target = match flow_target[v] {
            Some(target) => target,
            None => {
                let lowest = mesh.vertex_neighbors[v].iter().copied().min_by(|&a, &b| {
                    compare_keys(drain_key(fields, flood, a), drain_key(fields, flood, b))
                        .then(a.cmp(&b))
                });
                let Some(lowest) = lowest else {
                    return Err(MapgenError::invariant(
                        "rivers",
                        format!("land vertex {v} has no neighbors"),
                    ));
                };
                if compare_keys(drain_key(fields, flood, lowest), drain_key(fields, flood, v))
                    != Ordering::Less
                {
                    return Err(MapgenError::invariant(
                        "rivers",
                        format!("land vertex {v} has no lower neighbor"),
                    ));
                }
                flow_target[v] = Some(lowest);
                lowest
            }
        };
        flux[target] += flux[v];
    }

    let mut edge_flux = vec![0.0_f32; mesh.edge_count()];
    for &v in &order {
        let Some(target) = flow_target[v] else {
            continue;
        };
        let edge = mesh.edge_between(v, target).ok_or_else(|| {
            MapgenError::invariant(
                "rivers",
                format!("flow target {target} of vertex {v} is not adjacent"),
            )
        })?;
        edge_flux[edge] = flux[v];
    }

    Ok(Flow {
        flux,
        flow_target,
        edge_flux,
    })
}
