//! Выделение рек из поля стока

use super::River;

/// Входные данные для выделения рек.
pub(super) struct Drainage<'a> {
    pub flux: &'a [f32],
    pub flow_target: &'a [Option<usize>],
    pub is_ocean: &'a [bool],
    pub threshold: f32,
    pub min_vertices: usize,
}

impl Drainage<'_> {
    fn qualifies(&self, v: usize) -> bool {
        !self.is_ocean[v] && self.flux[v] >= self.threshold
    }

    /// Сначала больший поток, затем меньший номер.
    fn by_flux_desc(&self, a: usize, b: usize) -> std::cmp::Ordering {
        self.flux[b].total_cmp(&self.flux[a]).then(a.cmp(&b))
    }
}

/// Поиск путей вверх по течению по ещё не занятым вершинам.
struct Tracer<'a> {
    drainage: &'a Drainage<'a>,
    /// Входы каждой вершины, от большего потока к меньшему.
    inflows: Vec<Vec<usize>>,
    /// Вершины уже выпущенных рек.
    claimed: Vec<bool>,
    /// Истоки коротких путей; их ветви больше не рассматриваются.
    dropped: Vec<bool>,
}

impl<'a> Tracer<'a> {
    fn new(drainage: &'a Drainage<'a>) -> Self {
        let n = drainage.flux.len();
        let mut inflows: Vec<Vec<usize>> = vec![Vec::new(); n];
        for (v, target) in drainage.flow_target.iter().enumerate() {
            if let Some(t) = *target {
                inflows[t].push(v);
            }
        }
        for sources in &mut inflows {
            sources.sort_by(|&a, &b| drainage.by_flux_desc(a, b));
        }
        Self {
            drainage,
            inflows,
            claimed: vec![false; n],
            dropped: vec![false; n],
        }
    }

    fn available(&self, v: usize) -> bool {
        !self.claimed[v] && !self.dropped[v] && self.drainage.qualifies(v)
    }

    /// Жадный путь от `start`: на каждом шаге первый свободный вход.
    fn walk(&self, start: usize) -> Vec<usize> {
        let mut path = vec![start];
        let mut current = start;
        while let Some(&next) = self.inflows[current].iter().find(|&&u| self.available(u)) {
            path.push(next);
            current = next;
        }
        path
    }

    /// Путь не короче `min_vertices` или `None`.
    ///
    /// Если жадный путь короткий, его исток отбрасывается и путь строится
    /// заново, так что соседний более длинный вход получает свою очередь.
    /// Вершины занимаются только после того, как путь принят.
    fn trace(&mut self, start: usize) -> Option<Vec<usize>> {
        loop {
            let path = self.walk(start);
            if path.len() >= self.drainage.min_vertices {
                for &v in &path {
                    self.claimed[v] = true;
                }
                return Some(path);
            }
            match path.as_slice() {
                [_, .., source] => self.dropped[*source] = true,
                _ => return None,
            }
        }
    }
}

/// Собирает реки: главные от устьев, притоки обходом в ширину.
///
/// Каждая река начинается с принимающей вершины (океан или место слияния),
/// затем идёт собственный путь вверх по течению.
pub(super) fn extract_rivers(drainage: &Drainage<'_>) -> Vec<River> {
    let n = drainage.flux.len();
    let mut tracer = Tracer::new(drainage);

    let mut mouths: Vec<usize> = (0..n)
        .filter(|&v| {
            drainage.qualifies(v)
                && drainage.flow_target[v].is_some_and(|t| drainage.is_ocean[t])
        })
        .collect();
    mouths.sort_by(|&a, &b| drainage.by_flux_desc(a, b));

    let mut rivers: Vec<River> = Vec::new();
    for mouth in mouths {
        if !tracer.available(mouth) {
            continue;
        }
        let Some(receiver) = drainage.flow_target[mouth] else {
            continue;
        };
        let Some(path) = tracer.trace(mouth) else {
            continue;
        };
        let id = rivers.len();
        rivers.push(River::new(id, receiver, path, drainage.flux[mouth], None));
    }

    // Притоки: очередь рек, каждая просматривает свои вершины от устья к истоку.
    let mut cursor = 0;
    while cursor < rivers.len() {
        let parent = rivers[cursor].id;
        let own: Vec<usize> = rivers[cursor].vertices[1..].to_vec();
        cursor += 1;

        for confluence in own {
            let sources = tracer.inflows[confluence].clone();
            for source in sources {
                if !tracer.available(source) {
                    continue;
                }
                let Some(path) = tracer.trace(source) else {
                    continue;
                };
                let id = rivers.len();
                rivers.push(River::new(
                    id,
                    confluence,
                    path,
                    drainage.flux[source],
                    Some(parent),
                ));
            }
        }
    }
    rivers
}
