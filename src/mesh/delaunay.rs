//! Инкрементальная триангуляция Делоне (Bowyer–Watson)
//!
//! Треугольники хранятся в арене с ссылками на соседей; точка локализуется
//! «прогулкой» от последнего созданного треугольника, полость плохих
//! треугольников собирается обходом по соседям без рекурсии.

use crate::error::GeometryError;

pub(crate) const NONE: usize = usize::MAX;

/// Результат триангуляции: только треугольники без вершин супер-треугольника.
///
/// Вершины каждого треугольника упорядочены так, что `orient > 0`;
/// `neighbors[t][k]` — треугольник за ребром напротив вершины `k`.
#[derive(Debug, Clone)]
pub(crate) struct Triangulation {
    pub triangles: Vec<[usize; 3]>,
    pub neighbors: Vec<[usize; 3]>,
}

type Point = (f64, f64);

/// Удвоенная ориентированная площадь треугольника `abc`.
#[inline]
pub(crate) fn orient(a: Point, b: Point, c: Point) -> f64 {
    (b.0 - a.0) * (c.1 - a.1) - (b.1 - a.1) * (c.0 - a.0)
}

/// Положительно, если `d` лежит строго внутри описанной окружности `abc` (`abc` с `orient > 0`).
#[inline]
fn in_circle(a: Point, b: Point, c: Point, d: Point) -> f64 {
    let (adx, ady) = (a.0 - d.0, a.1 - d.1);
    let (bdx, bdy) = (b.0 - d.0, b.1 - d.1);
    let (cdx, cdy) = (c.0 - d.0, c.1 - d.1);
    let ad = adx * adx + ady * ady;
    let bd = bdx * bdx + bdy * bdy;
    let cd = cdx * cdx + cdy * cdy;
    ad * (bdx * cdy - cdx * bdy) + bd * (cdx * ady - adx * cdy) + cd * (adx * bdy - bdx * ady)
}

/// Центр описанной окружности.
pub(crate) fn circumcenter(a: Point, b: Point, c: Point) -> Point {
    let d = 2.0 * orient(a, b, c);
    let (bx, by) = (b.0 - a.0, b.1 - a.1);
    let (cx, cy) = (c.0 - a.0, c.1 - a.1);
    let b2 = bx * bx + by * by;
    let c2 = cx * cx + cy * cy;
    (
        a.0 + (cy * b2 - by * c2) / d,
        a.1 + (bx * c2 - cx * b2) / d,
    )
}

struct Builder<'a> {
    points: &'a [Point],
    triangles: Vec<[usize; 3]>,
    neighbors: Vec<[usize; 3]>,
    alive: Vec<bool>,
    stamp: Vec<u32>,
    current_stamp: u32,
    last: usize,
}

impl Builder<'_> {
    fn point(&self, index: usize) -> Point {
        self.points[index]
    }

    fn push_triangle(&mut self, vertices: [usize; 3], neighbors: [usize; 3]) -> usize {
        self.triangles.push(vertices);
        self.neighbors.push(neighbors);
        self.alive.push(true);
        self.stamp.push(0);
        self.triangles.len() - 1
    }

    fn contains(&self, t: usize, p: Point) -> bool {
        let [a, b, c] = self.triangles[t];
        orient(self.point(a), self.point(b), p) >= 0.0
            && orient(self.point(b), self.point(c), p) >= 0.0
            && orient(self.point(c), self.point(a), p) >= 0.0
    }

    /// Поиск треугольника, содержащего `p`, прогулкой по соседям.
    fn locate(&self, p: Point) -> Result<usize, GeometryError> {
        let mut t = self.last;
        let max_steps = self.triangles.len() + 16;

        'walk: for step in 0..max_steps {
            let vertices = self.triangles[t];
            for i in 0..3 {
                // Сдвиг стартового ребра исключает зацикливание прогулки.
                let k = (i + step) % 3;
                let a = self.point(vertices[(k + 1) % 3]);
                let b = self.point(vertices[(k + 2) % 3]);
                if orient(a, b, p) < 0.0 {
                    let next = self.neighbors[t][k];
                    if next == NONE {
                        return Err(GeometryError::Triangulation(
                            "point escaped the super triangle".into(),
                        ));
                    }
                    t = next;
                    continue 'walk;
                }
            }
            return Ok(t);
        }

        (0..self.triangles.len())
            .find(|&t| self.alive[t] && self.contains(t, p))
            .ok_or_else(|| GeometryError::Triangulation("point location failed".into()))
    }

    fn insert(&mut self, index: usize) -> Result<(), GeometryError> {
        let p = self.point(index);
        let start = self.locate(p)?;

        self.current_stamp += 1;
        let stamp = self.current_stamp;

        // 1. Полость: связное множество треугольников, чья окружность содержит p.
        let mut cavity = vec![start];
        self.stamp[start] = stamp;
        let mut cursor = 0;
        while cursor < cavity.len() {
            let t = cavity[cursor];
            cursor += 1;
            for k in 0..3 {
                let n = self.neighbors[t][k];
                if n == NONE || self.stamp[n] == stamp {
                    continue;
                }
                let [a, b, c] = self.triangles[n];
                if in_circle(self.point(a), self.point(b), self.point(c), p) > 0.0 {
                    self.stamp[n] = stamp;
                    cavity.push(n);
                }
            }
        }

        // 2. Граница полости: (a, b, внешний сосед, удалённый треугольник).
        let mut boundary = Vec::with_capacity(cavity.len() + 2);
        for &t in &cavity {
            for k in 0..3 {
                let n = self.neighbors[t][k];
                if n != NONE && self.stamp[n] == stamp {
                    continue;
                }
                let vertices = self.triangles[t];
                let a = vertices[(k + 1) % 3];
                let b = vertices[(k + 2) % 3];
                if orient(self.point(a), self.point(b), p) <= 0.0 {
                    return Err(GeometryError::Triangulation(format!(
                        "cavity of point {index} is not star-shaped"
                    )));
                }
                boundary.push((a, b, n, t));
            }
        }

        for &t in &cavity {
            self.alive[t] = false;
        }

        // 3. Веер новых треугольников (a, b, p).
        let first_new = self.triangles.len();
        for &(a, b, outer, old) in &boundary {
            let t = self.push_triangle([a, b, index], [NONE, NONE, outer]);
            if outer != NONE {
                for slot in &mut self.neighbors[outer] {
                    if *slot == old {
                        *slot = t;
                    }
                }
            }
        }

        // 4. Связи внутри веера: ребро (b, p) общее с треугольником, начинающимся в b.
        for (i, &(a, b, _, _)) in boundary.iter().enumerate() {
            let t = first_new + i;
            let after = boundary.iter().position(|&(start, ..)| start == b);
            let before = boundary.iter().position(|&(_, end, ..)| end == a);
            match (after, before) {
                (Some(after), Some(before)) => {
                    self.neighbors[t][0] = first_new + after;
                    self.neighbors[t][1] = first_new + before;
                }
                _ => {
                    return Err(GeometryError::Triangulation(format!(
                        "cavity boundary of point {index} is not a closed loop"
                    )));
                }
            }
        }

        self.last = first_new;
        Ok(())
    }
}

/// Строит триангуляцию Делоне точек `points`.
///
/// Точки должны быть попарно различны и не все коллинеарны: проверки выполняет вызывающий код.
pub(crate) fn triangulate(points: &[Point]) -> Result<Triangulation, GeometryError> {
    let n = points.len();
    if n < 3 {
        return Err(GeometryError::TooFewPoints(n));
    }

    let (mut min_x, mut min_y) = (f64::INFINITY, f64::INFINITY);
    let (mut max_x, mut max_y) = (f64::NEG_INFINITY, f64::NEG_INFINITY);
    for &(x, y) in points {
        min_x = min_x.min(x);
        min_y = min_y.min(y);
        max_x = max_x.max(x);
        max_y = max_y.max(y);
    }
    let span = (max_x - min_x).max(max_y - min_y).max(1e-9);
    let (cx, cy) = ((min_x + max_x) * 0.5, (min_y + max_y) * 0.5);

    // Супер-треугольник с orient > 0.
    let mut all = points.to_vec();
    all.push((cx - 40.0 * span, cy - 20.0 * span));
    all.push((cx + 40.0 * span, cy - 20.0 * span));
    all.push((cx, cy + 40.0 * span));

    let mut builder = Builder {
        points: &all,
        triangles: Vec::with_capacity(n * 4),
        neighbors: Vec::with_capacity(n * 4),
        alive: Vec::with_capacity(n * 4),
        stamp: Vec::with_capacity(n * 4),
        current_stamp: 0,
        last: 0,
    };
    builder.push_triangle([n, n + 1, n + 2], [NONE, NONE, NONE]);

    for index in 0..n {
        builder.insert(index)?;
    }

    // Компактификация: выбрасываем мёртвые треугольники и касающиеся супер-вершин.
    let Builder {
        triangles,
        neighbors,
        alive,
        ..
    } = builder;
    let mut remap = vec![NONE; triangles.len()];
    let mut kept = Vec::new();
    for (t, vertices) in triangles.iter().enumerate() {
        if alive[t] && vertices.iter().all(|&v| v < n) {
            remap[t] = kept.len();
            kept.push(t);
        }
    }

    let result_triangles = kept.iter().map(|&t| triangles[t]).collect();
    let result_neighbors = kept
        .iter()
        .map(|&t| neighbors[t].map(|nb| if nb == NONE { NONE } else { remap[nb] }))
        .collect();

    Ok(Triangulation {
        triangles: result_triangles,
        neighbors: result_neighbors,
    })
}
