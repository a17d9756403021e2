use clap::Parser;
use mapgen_terrain::preview::{Layer, save_png};
use mapgen_terrain::{World, WorldGenerationParams, generate_world};
use std::path::PathBuf;

/// Генератор основы мира для Chronicles of Realms
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Путь к конфигурационному файлу в формате TOML
    #[arg(short, long)]
    config: PathBuf,

    /// Путь для сохранения превью (по умолчанию: ./terrain.png)
    #[arg(short, long, default_value = "terrain.png")]
    output: PathBuf,

    /// Слой превью: height, temperature или precipitation
    #[arg(short, long, value_enum, default_value_t = Layer::Height)]
    layer: Layer,

    /// Сохранить мир целиком в JSON
    #[arg(short, long)]
    snapshot: Option<PathBuf>,

    /// Пикселей на одну ячейку
    #[arg(long, default_value_t = 8)]
    scale: u32,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    let cli = Cli::parse();

    println!("🔍 Загрузка конфигурации...");
    let params = WorldGenerationParams::from_toml_file(&cli.config)?;

    println!(
        "🌍 Генерация мира (сид: {}, ячеек: {}, шаблон: {})...",
        params.seed, params.cells, params.template
    );
    let world: World = generate_world(&params)?;

    let summary = world.summary();
    println!("   Шаблон рельефа: {}", summary.template);
    println!(
        "   Ячеек: {}, вершин: {}, суша: {:.1}%",
        summary.cells,
        summary.vertices,
        summary.land_ratio * 100.0
    );
    println!(
        "   Температура: {:.1}..{:.1} °C, осадки: {:.2}..{:.2}",
        summary.temperature.0, summary.temperature.1, summary.precipitation.0, summary.precipitation.1
    );
    println!(
        "   Рек: {}, озёр: {}, самая длинная река: {:.1}",
        summary.rivers, summary.lakes, summary.longest_river
    );

    println!("🖼  Сохранение превью ({:?}) в {:?}", cli.layer, cli.output);
    save_png(&world, cli.layer, cli.scale, &cli.output)?;

    if let Some(path) = &cli.snapshot {
        println!("💾 Сохранение мира в {path:?}");
        world.save_json(path)?;
    }

    println!("\nГотово!");
    Ok(())
}
