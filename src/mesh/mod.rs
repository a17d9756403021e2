//! Сетка ячеек: диаграмма Вороного, двойственная триангуляции Делоне
//!
//! - **Ячейка** — многоугольник вокруг исходной точки;
//! - **Вершина** — центр описанной окружности треугольника Делоне, узел гидрологии;
//! - **Ребро** — отрезок между двумя соседними вершинами.
//!
//! Вокруг прямоугольника добавляется кольцо вспомогательных точек: у каждой
//! настоящей ячейки замкнутый многоугольник, а каждое ребро Делоне между двумя
//! настоящими точками граничит ровно с двумя треугольниками. Ячейки, касающиеся
//! кольца, помечаются как граничные.

pub(crate) mod delaunay;

use std::collections::HashSet;

use petgraph::graph::UnGraph;
use serde::{Deserialize, Serialize};

use crate::error::{GeometryError, MapgenError, Result};
use crate::timing::StageTimer;
use delaunay::{NONE, circumcenter, orient, triangulate};

/// Неизменяемая планарная сетка ячеек.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CellMesh {
    /// Ширина области.
    pub width: f64,
    /// Высота области.
    pub height: f64,
    /// Центры ячеек (исходные точки).
    pub cell_centers: Vec<(f64, f64)>,
    /// Вершины границы каждой ячейки против часовой стрелки.
    pub cell_vertices: Vec<Vec<usize>>,
    /// Соседние ячейки в том же угловом порядке.
    pub cell_neighbors: Vec<Vec<usize>>,
    /// Ячейка касается края карты.
    pub cell_border: Vec<bool>,
    /// Положения вершин.
    pub vertex_positions: Vec<(f64, f64)>,
    /// Ячейки, сходящиеся в вершине (обычно три, у края меньше).
    pub vertex_cells: Vec<Vec<usize>>,
    /// Смежные вершины.
    pub vertex_neighbors: Vec<Vec<usize>>,
    /// Номер ребра для каждой записи `vertex_neighbors`.
    pub vertex_edges: Vec<Vec<usize>>,
    /// Концы рёбер, `[меньший, больший]`.
    pub edges: Vec<[usize; 2]>,
}

impl CellMesh {
    #[must_use]
    pub fn cell_count(&self) -> usize {
        self.cell_centers.len()
    }

    #[must_use]
    pub fn vertex_count(&self) -> usize {
        self.vertex_positions.len()
    }

    #[must_use]
    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    /// Вершина на краю карты: у неё меньше трёх ячеек или соседей.
    #[must_use]
    pub fn is_border_vertex(&self, vertex: usize) -> bool {
        self.vertex_cells[vertex].len() < 3 || self.vertex_neighbors[vertex].len() < 3
    }

    /// Номер ребра между смежными вершинами `a` и `b` за O(1): степень вершины не больше трёх.
    #[must_use]
    pub fn edge_between(&self, a: usize, b: usize) -> Option<usize> {
        self.vertex_neighbors[a]
            .iter()
            .position(|&n| n == b)
            .map(|slot| self.vertex_edges[a][slot])
    }

    /// Расстояние между центрами двух ячеек.
    #[must_use]
    pub fn cell_distance(&self, a: usize, b: usize) -> f64 {
        distance(self.cell_centers[a], self.cell_centers[b])
    }

    /// Расстояние между двумя вершинами.
    #[must_use]
    pub fn vertex_distance(&self, a: usize, b: usize) -> f64 {
        distance(self.vertex_positions[a], self.vertex_positions[b])
    }

    /// Ближайшая к точке ячейка.
    #[must_use]
    pub fn find_cell(&self, x: f64, y: f64) -> usize {
        self.find_cell_from(0, x, y)
    }

    /// Ближайшая ячейка, поиск начинается с `hint`.
    ///
    /// Жадный спуск по соседям Делоне всегда приходит к ближайшему центру.
    #[must_use]
    pub fn find_cell_from(&self, hint: usize, x: f64, y: f64) -> usize {
        let target = (x, y);
        let mut current = hint.min(self.cell_count().saturating_sub(1));
        let mut best = distance(self.cell_centers[current], target);
        loop {
            let mut improved = false;
            for &n in &self.cell_neighbors[current] {
                let d = distance(self.cell_centers[n], target);
                if d < best {
                    best = d;
                    current = n;
                    improved = true;
                }
            }
            if !improved {
                return current;
            }
        }
    }

    /// Граф смежности ячеек для внешних слоёв (политические границы, пути).
    #[must_use]
    pub fn to_graph(&self) -> UnGraph<u32, ()> {
        let mut graph = UnGraph::with_capacity(self.cell_count(), self.cell_count() * 3);
        let nodes: Vec<_> = (0..self.cell_count())
            .map(|c| graph.add_node(c as u32))
            .collect();
        for (c, neighbors) in self.cell_neighbors.iter().enumerate() {
            for &n in neighbors {
                if c < n {
                    graph.add_edge(nodes[c], nodes[n], ());
                }
            }
        }
        graph
    }

    /// Проверка инвариантов сетки.
    pub fn validate(&self) -> Result<()> {
        let fail = |message: String| Err(MapgenError::invariant("mesh", message));

        for (c, neighbors) in self.cell_neighbors.iter().enumerate() {
            if !self.cell_border[c] && neighbors.len() < 3 {
                return fail(format!("interior cell {c} has {} neighbors", neighbors.len()));
            }
            if self.cell_vertices[c].len() < 3 {
                return fail(format!("cell {c} has fewer than 3 vertices"));
            }
            for &n in neighbors {
                if !self.cell_neighbors[n].contains(&c) {
                    return fail(format!("adjacency {c} -> {n} is not symmetric"));
                }
                let shared = self.cell_vertices[c]
                    .iter()
                    .filter(|v| self.cell_vertices[n].contains(v))
                    .count();
                if shared != 2 {
                    return fail(format!("neighbors {c} and {n} share {shared} vertices"));
                }
            }
        }

        for (v, cells) in self.vertex_cells.iter().enumerate() {
            for &c in cells {
                if !self.cell_vertices[c].contains(&v) {
                    return fail(format!("vertex {v} lists cell {c} that does not own it"));
                }
            }
            for (slot, &n) in self.vertex_neighbors[v].iter().enumerate() {
                let edge = self.vertex_edges[v][slot];
                if self.edge_between(n, v) != Some(edge) {
                    return fail(format!("vertex adjacency {v} -> {n} is not symmetric"));
                }
            }
        }
        for (c, vertices) in self.cell_vertices.iter().enumerate() {
            for &v in vertices {
                if !self.vertex_cells[v].contains(&c) {
                    return fail(format!("cell {c} owns vertex {v} that does not list it"));
                }
            }
        }
        Ok(())
    }
}

fn distance(a: (f64, f64), b: (f64, f64)) -> f64 {
    (a.0 - b.0).hypot(a.1 - b.1)
}

/// Проверка входных точек до триангуляции.
fn check_points(points: &[(f64, f64)], width: f64, height: f64) -> Result<(), GeometryError> {
    if !(width.is_finite() && height.is_finite() && width > 0.0 && height > 0.0) {
        return Err(GeometryError::EmptyDomain { width, height });
    }
    if points.len() < 3 {
        return Err(GeometryError::TooFewPoints(points.len()));
    }
    for (index, &(x, y)) in points.iter().enumerate() {
        if !(x.is_finite() && y.is_finite()) {
            return Err(GeometryError::NonFinite(index));
        }
        if x < 0.0 || y < 0.0 || x > width || y > height {
            return Err(GeometryError::OutOfBounds {
                index,
                x,
                y,
                width,
                height,
            });
        }
    }

    let mut order: Vec<usize> = (0..points.len()).collect();
    order.sort_by(|&a, &b| {
        points[a]
            .0
            .total_cmp(&points[b].0)
            .then(points[a].1.total_cmp(&points[b].1))
    });
    for pair in order.windows(2) {
        if points[pair[0]] == points[pair[1]] {
            let (first, second) = (pair[0].min(pair[1]), pair[0].max(pair[1]));
            return Err(GeometryError::DuplicatePoint { first, second });
        }
    }

    // Коллинеарность: площадь относительно масштаба области.
    let a = points[order[0]];
    let b = points[order[order.len() - 1]];
    let tolerance = 1e-12 * width.max(height).powi(2);
    if points.iter().all(|&c| orient(a, b, c).abs() <= tolerance) {
        return Err(GeometryError::Collinear);
    }
    Ok(())
}

/// Кольцо вспомогательных точек чуть снаружи прямоугольника.
///
/// Стороны слегка выгнуты наружу: точки кольца в строго выпуклом положении,
/// никакие три не лежат на одной прямой.
fn frame_points(width: f64, height: f64, spacing: f64) -> Vec<(f64, f64)> {
    let (x0, y0) = (-spacing, -spacing);
    let (x1, y1) = (width + spacing, height + spacing);
    let bulge = 0.5 * spacing;
    let across = ((x1 - x0) / spacing).ceil().max(2.0) as usize;
    let down = ((y1 - y0) / spacing).ceil().max(2.0) as usize;
    let bow = |t: f64| bulge * 4.0 * t * (1.0 - t);

    let mut frame = Vec::with_capacity(2 * (across + down));
    for i in 0..across {
        let t = i as f64 / across as f64;
        frame.push((x0 + t * (x1 - x0), y0 - bow(t)));
    }
    for i in 0..down {
        let t = i as f64 / down as f64;
        frame.push((x1 + bow(t), y0 + t * (y1 - y0)));
    }
    for i in 0..across {
        let t = i as f64 / across as f64;
        frame.push((x1 - t * (x1 - x0), y1 + bow(t)));
    }
    for i in 0..down {
        let t = i as f64 / down as f64;
        frame.push((x0 - bow(t), y1 - t * (y1 - y0)));
    }
    frame
}

/// Строит сетку ячеек по набору точек в прямоугольнике `width × height`.
///
/// Чистая функция порядка и положения точек; внутренней случайности нет.
pub fn build_mesh(points: &[(f64, f64)], width: f64, height: f64) -> Result<CellMesh> {
    let _timer = StageTimer::start("mesh");
    check_points(points, width, height)?;

    let real = points.len();
    let spacing = (width * height / real as f64).sqrt();
    let mut all = points.to_vec();
    all.extend(frame_points(width, height, spacing));

    let triangulation = triangulate(&all)?;

    // Вершины сетки: треугольники, касающиеся хотя бы одной настоящей точки.
    let mut vertex_of_triangle = vec![NONE; triangulation.triangles.len()];
    let mut vertex_positions = Vec::new();
    let mut vertex_cells = Vec::new();
    for (t, vertices) in triangulation.triangles.iter().enumerate() {
        if vertices.iter().any(|&p| p < real) {
            vertex_of_triangle[t] = vertex_positions.len();
            let [a, b, c] = *vertices;
            vertex_positions.push(circumcenter(all[a], all[b], all[c]));
            vertex_cells.push(vertices.iter().copied().filter(|&p| p < real).collect());
        }
    }

    let vertex_count = vertex_positions.len();
    let mut vertex_neighbors: Vec<Vec<usize>> = vec![Vec::with_capacity(3); vertex_count];
    let mut vertex_edges: Vec<Vec<usize>> = vec![Vec::with_capacity(3); vertex_count];
    let mut edges = Vec::with_capacity(vertex_count * 3 / 2);
    for (t, links) in triangulation.neighbors.iter().enumerate() {
        let v = vertex_of_triangle[t];
        if v == NONE {
            continue;
        }
        for &n in links {
            if n == NONE || vertex_of_triangle[n] == NONE {
                continue;
            }
            let u = vertex_of_triangle[n];
            if v < u {
                let edge = edges.len();
                edges.push([v, u]);
                vertex_neighbors[v].push(u);
                vertex_edges[v].push(edge);
                vertex_neighbors[u].push(v);
                vertex_edges[u].push(edge);
            }
        }
    }

    // Веер треугольников вокруг каждой настоящей точки.
    let mut fans: Vec<Vec<usize>> = vec![Vec::with_capacity(6); real];
    for (t, vertices) in triangulation.triangles.iter().enumerate() {
        for &p in vertices {
            if p < real {
                fans[p].push(t);
            }
        }
    }

    let mut cell_vertices = Vec::with_capacity(real);
    let mut cell_neighbors = Vec::with_capacity(real);
    let mut cell_border = Vec::with_capacity(real);
    for (p, fan) in fans.iter_mut().enumerate() {
        if fan.len() < 3 {
            return Err(GeometryError::Triangulation(format!(
                "cell {p} has an open triangle fan"
            ))
            .into());
        }
        let center = all[p];
        let angle = |q: (f64, f64)| (q.1 - center.1).atan2(q.0 - center.0);

        // Центроиды треугольников веера упорядочены так же, как многоугольник ячейки.
        fan.sort_by(|&a, &b| {
            let centroid = |t: usize| {
                let [i, j, k] = triangulation.triangles[t];
                (
                    (all[i].0 + all[j].0 + all[k].0) / 3.0,
                    (all[i].1 + all[j].1 + all[k].1) / 3.0,
                )
            };
            angle(centroid(a)).total_cmp(&angle(centroid(b)))
        });
        cell_vertices.push(fan.iter().map(|&t| vertex_of_triangle[t]).collect::<Vec<_>>());

        let mut seen = HashSet::new();
        let mut neighbors: Vec<usize> = fan
            .iter()
            .flat_map(|&t| triangulation.triangles[t])
            .filter(|&q| q != p && q < real && seen.insert(q))
            .collect();
        neighbors.sort_by(|&a, &b| angle(all[a]).total_cmp(&angle(all[b])));
        cell_neighbors.push(neighbors);

        cell_border.push(
            fan.iter()
                .any(|&t| triangulation.triangles[t].iter().any(|&q| q >= real)),
        );
    }

    let mesh = CellMesh {
        width,
        height,
        cell_centers: points.to_vec(),
        cell_vertices,
        cell_neighbors,
        cell_border,
        vertex_positions,
        vertex_cells,
        vertex_neighbors,
        vertex_edges,
        edges,
    };
    mesh.validate()?;

    log::debug!(
        "mesh: {} cells, {} vertices, {} edges",
        mesh.cell_count(),
        mesh.vertex_count(),
        mesh.edge_count()
    );
    Ok(mesh)
}
