use mapgen_terrain::heightmap::HeightFilter;
use mapgen_terrain::points::jittered_grid;
use mapgen_terrain::{
    CellMesh, ClimateData, ClimateSettings, HeightGrid, HeightmapSettings, Operation,
    RiverSettings, Template, WindBand, WorldScale, build_mesh, generate_climate,
    generate_heightmap, generate_rivers,
};

fn grid_from(heights: Vec<f32>) -> HeightGrid {
    HeightGrid {
        heights,
        sea_level: 20.0,
        min_height: 0.0,
        max_height: 100.0,
        template: "manual".into(),
    }
}

/// Сетка 3×3: нижний ряд под водой, выше суша; осадки везде 10.
#[test]
fn three_by_three_grid_drains_every_basin() {
    let points = jittered_grid(3.0, 3.0, 9, 4);
    assert_eq!(points.len(), 9);
    let mesh = build_mesh(&points, 3.0, 3.0).unwrap();

    let heights = grid_from(
        mesh.cell_centers
            .iter()
            .map(|&(_, y)| match y {
                y if y >= 2.0 => 5.0,
                y if y >= 1.0 => 40.0,
                _ => 70.0,
            })
            .collect(),
    );
    let climate = ClimateData {
        temperature: vec![15.0; 9],
        precipitation: vec![10.0; 9],
    };
    let settings = RiverSettings {
        flux_threshold: Some(0.0),
        min_river_vertices: 1,
        ..RiverSettings::default()
    };
    let data = generate_rivers(&mesh, &heights, &climate, &settings).unwrap();

    let n = mesh.vertex_count();
    assert!(data.is_ocean.iter().any(|&o| o));
    assert!(data.is_ocean.iter().any(|&o| !o));

    // Поток вершины равен 10 на каждую вершину суши, чья цепочка через неё проходит.
    let mut expected = vec![0.0_f32; n];
    for v in (0..n).filter(|&v| !data.is_ocean[v]) {
        assert!((data.precipitation[v] - 10.0).abs() < 1e-5);
        let path = data.drainage_path(v);
        assert!(data.is_ocean[*path.last().unwrap()]);
        for &w in &path {
            expected[w] += 10.0;
        }
    }
    for v in 0..n {
        assert!(
            (data.flux[v] - expected[v]).abs() < 1e-3,
            "vertex {v}: flux {} vs basin {}",
            data.flux[v],
            expected[v]
        );
    }
}

/// Точки с центром ровно посередине квадратной карты.
fn centered_mesh() -> CellMesh {
    let mut points = jittered_grid(15.0, 15.0, 225, 6);
    let center = (7.5, 7.5);
    let nearest = (0..points.len())
        .min_by(|&a, &b| {
            let da = (points[a].0 - center.0).hypot(points[a].1 - center.1);
            let db = (points[b].0 - center.0).hypot(points[b].1 - center.1);
            da.total_cmp(&db)
        })
        .unwrap();
    points[nearest] = center;
    build_mesh(&points, 15.0, 15.0).unwrap()
}

#[test]
fn mask_falls_off_from_the_center() {
    let mesh = centered_mesh();
    let template = Template {
        name: "masked".into(),
        operations: vec![
            Operation::Add {
                value: 50.0,
                filter: HeightFilter::All,
            },
            Operation::Mask { power: 4.0 },
        ],
    };
    let grid = generate_heightmap(
        &mesh,
        &template,
        1,
        &WorldScale::default(),
        &HeightmapSettings::default(),
    )
    .unwrap();

    let center = mesh.find_cell(7.5, 7.5);
    assert_eq!(grid.heights[center], 50.0);

    let radius = |c: usize| {
        let (x, y) = mesh.cell_centers[c];
        (2.0 * x / 15.0 - 1.0).hypot(2.0 * y / 15.0 - 1.0)
    };
    let mut order: Vec<usize> = (0..mesh.cell_count()).collect();
    order.sort_by(|&a, &b| radius(a).total_cmp(&radius(b)));
    for pair in order.windows(2) {
        assert!(
            grid.heights[pair[1]] <= grid.heights[pair[0]],
            "cell {} further out is higher than cell {}",
            pair[1],
            pair[0]
        );
    }
    assert!(grid.heights.iter().all(|&h| h <= 50.0));
}

/// Правильная треугольная решётка, симметричная относительно `x = width / 2`.
fn lattice(columns: usize, rows: usize) -> (Vec<(f64, f64)>, f64, f64) {
    let step_y = 3.0_f64.sqrt() / 2.0;
    let mut points = Vec::new();
    for row in 0..rows {
        let y = (row as f64 + 0.5) * step_y;
        if row % 2 == 0 {
            points.extend((0..columns).map(|i| (0.5 + i as f64, y)));
        } else {
            points.extend((0..columns - 1).map(|i| (1.0 + i as f64, y)));
        }
    }
    (points, columns as f64, rows as f64 * step_y)
}

#[test]
fn opposite_winds_give_mirrored_precipitation() {
    let (points, width, height) = lattice(24, 20);
    let mesh = build_mesh(&points, width, height).unwrap();

    // Остров, симметричный по x.
    let heights = grid_from(
        mesh.cell_centers
            .iter()
            .map(|&(x, y)| {
                let dx = (x - width / 2.0).abs() / (width / 2.0);
                let dy = (y - height / 2.0).abs() / (height / 2.0);
                let r = dx.hypot(dy) as f32;
                (80.0 - 90.0 * r).max(5.0)
            })
            .collect(),
    );
    let scale = WorldScale::default();
    let band = |direction: [f32; 2]| ClimateSettings {
        wind_bands: vec![WindBand::new(-90.0, 90.0, direction)],
        ..ClimateSettings::default()
    };

    let east = generate_climate(&mesh, &heights, &scale, &band([1.0, 0.0])).unwrap();
    let west = generate_climate(&mesh, &heights, &scale, &band([-1.0, 0.0])).unwrap();

    let mut checked = 0;
    for c in 0..mesh.cell_count() {
        let (x, y) = mesh.cell_centers[c];
        let mirror = mesh.find_cell(width - x, y);
        assert_eq!(mesh.cell_centers[mirror], (width - x, y));

        let a = east.precipitation[c];
        let b = west.precipitation[mirror];
        assert!(
            (a - b).abs() <= 1e-4 * a.abs().max(1.0),
            "cell {c}: {a} vs mirrored {b}"
        );
        assert!((east.temperature[c] - west.temperature[mirror]).abs() < 1e-4);
        if a > 0.0 {
            checked += 1;
        }
    }
    assert!(checked > 10);

    // Наветренная (западная) сторона острова влажнее подветренной.
    let half = |left: bool| -> f32 {
        (0..mesh.cell_count())
            .filter(|&c| (mesh.cell_centers[c].0 < width / 2.0) == left)
            .map(|c| east.precipitation[c])
            .sum()
    };
    assert!(half(true) > half(false));
}
