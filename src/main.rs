/*
Posturómetro - análisis de golpe de golf con un IMU de muñeca

Modos:
    posturometro replay <captura.csv> [opciones]   Reproduce una captura y la clasifica
    posturometro debug <carpeta> [opciones]        Elige una captura al azar de la carpeta
    posturometro train <captura.csv> [opciones]    Añade la captura a la sesión de entrenamiento

Opciones:
    --model <modelo.json>    Modelo lineal (por defecto: media de la ventana)
    --onnx <modelo.onnx>     Modelo ONNX (requiere la feature "onnx")
    --config <config.json>   Configuración de sesión
    --store <directorio>     Guardar las sesiones en CSV en vez de en memoria

Formato de captura: cycle,sample,ax,ay,az,gx,gy,gz
*/

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, bail, Context, Result};
use rand::Rng;

use posturometro::config::SessionConfig;
use posturometro::presenter::ConsolePresenter;
use posturometro::scorer::{LinearScorer, Scorer, ScorerError};
use posturometro::sensor::ReplaySensor;
use posturometro::session::{DeviceSlot, Orchestrator, SessionReport};
use posturometro::store::{CsvStore, MemoryStore, SampleStore};

enum Mode {
    Replay(PathBuf),
    Debug(PathBuf),
    Train(PathBuf),
}

struct Options {
    mode: Mode,
    model: Option<PathBuf>,
    onnx: Option<PathBuf>,
    config: Option<PathBuf>,
    store: Option<PathBuf>,
}

/// Modelo elegido por línea de comandos
enum ModelScorer {
    Linear(LinearScorer),
    #[cfg(feature = "onnx")]
    Onnx(posturometro::scorer::OnnxScorer),
}

impl Scorer for ModelScorer {
    fn score(&mut self, window: &[f64]) -> Result<f64, ScorerError> {
        match self {
            ModelScorer::Linear(s) => s.score(window),
            #[cfg(feature = "onnx")]
            ModelScorer::Onnx(s) => s.score(window),
        }
    }
}

const USAGE: &str = "Uso: posturometro <replay|debug|train> <ruta> [--model m.json] [--onnx m.onnx] [--config c.json] [--store dir]";

fn parse_args() -> Result<Options> {
    let mut args = env::args().skip(1);
    let command = args.next().ok_or_else(|| anyhow!(USAGE))?;
    let target = args.next().map(PathBuf::from).ok_or_else(|| anyhow!(USAGE))?;

    let mode = match command.as_str() {
        "replay" => Mode::Replay(target),
        "debug" => Mode::Debug(target),
        "train" => Mode::Train(target),
        other => bail!("Modo desconocido {:?}\n{}", other, USAGE),
    };

    let mut options = Options {
        mode,
        model: None,
        onnx: None,
        config: None,
        store: None,
    };

    while let Some(flag) = args.next() {
        let value = args
            .next()
            .map(PathBuf::from)
            .ok_or_else(|| anyhow!("Falta el valor de {}", flag))?;
        match flag.as_str() {
            "--model" => options.model = Some(value),
            "--onnx" => options.onnx = Some(value),
            "--config" => options.config = Some(value),
            "--store" => options.store = Some(value),
            _ => bail!("Opción desconocida {:?}\n{}", flag, USAGE),
        }
    }

    Ok(options)
}

fn load_scorer(options: &Options, config: &SessionConfig) -> Result<ModelScorer> {
    if let Some(path) = &options.onnx {
        #[cfg(feature = "onnx")]
        {
            let path = path.to_string_lossy();
            let scorer = posturometro::scorer::OnnxScorer::new(&path, config.window_size)?;
            return Ok(ModelScorer::Onnx(scorer));
        }
        #[cfg(not(feature = "onnx"))]
        bail!("{:?}: compilado sin soporte ONNX (feature \"onnx\")", path);
    }

    let scorer = match &options.model {
        Some(path) => LinearScorer::from_json_file(path)
            .with_context(|| format!("No se pudo cargar el modelo {:?}", path))?,
        None => {
            log::info!("Sin modelo: se usa la media de la ventana");
            LinearScorer::mean(config.window_size)?
        }
    };

    if scorer.window_size() != config.window_size {
        bail!(
            "El modelo espera ventanas de {} y la configuración usa {}",
            scorer.window_size(),
            config.window_size
        );
    }
    Ok(ModelScorer::Linear(scorer))
}

/// Elige un CSV al azar dentro de la carpeta
fn pick_random_capture(folder: &Path) -> Result<PathBuf> {
    if !folder.exists() {
        bail!("La carpeta {:?} no existe", folder);
    }

    let csv_files: Vec<PathBuf> = fs::read_dir(folder)?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| {
            path.extension()
                .and_then(|ext| ext.to_str())
                .map(|ext| ext.eq_ignore_ascii_case("csv"))
                .unwrap_or(false)
        })
        .collect();

    if csv_files.is_empty() {
        bail!("No hay archivos CSV en {:?}", folder);
    }

    let random_idx = rand::thread_rng().gen_range(0..csv_files.len());
    Ok(csv_files[random_idx].clone())
}

fn run<St: SampleStore>(options: &Options, config: SessionConfig, store: St) -> Result<()> {
    let scorer = load_scorer(options, &config)?;
    let mut orchestrator = Orchestrator::new(config, store, scorer, ConsolePresenter)?;

    match &options.mode {
        Mode::Train(path) => {
            let mut device = DeviceSlot::connected(ReplaySensor::from_csv(path)?);
            let written = orchestrator.record_training(&mut device)?;
            println!("💾 {} grabaciones de entrenamiento guardadas", written);
        }
        Mode::Replay(path) | Mode::Debug(path) => {
            let capture = match &options.mode {
                Mode::Debug(_) => pick_random_capture(path)?,
                _ => path.clone(),
            };
            println!("📄 Captura: {}", capture.display());

            let mut device = DeviceSlot::connected(ReplaySensor::from_csv(&capture)?);
            let report = orchestrator.analyze(&mut device)?;
            print_report(&report);
        }
    }

    Ok(())
}

fn print_report(report: &SessionReport) {
    println!(
        "\n🎯 Postura: {} (clase {})",
        report.posture.as_str(),
        report.classification.index
    );
    for (axis, (avg, windows)) in ["x", "y", "z"].iter().zip(
        report
            .classification
            .averages
            .iter()
            .zip(report.classification.windows.iter()),
    ) {
        println!("  {}: {:>8.4} ({} ventanas)", axis, avg, windows);
    }
    println!("  Grabaciones: {}", report.recordings);
    println!("  Fuerza media: {:.2} N", report.average_force);
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let options = parse_args()?;
    let config = match &options.config {
        Some(path) => SessionConfig::from_json_file(path)
            .with_context(|| format!("No se pudo cargar la configuración {:?}", path))?,
        None => SessionConfig::default(),
    };

    match &options.store {
        Some(dir) => {
            let store = CsvStore::open(dir, config.sessions())?;
            log::info!("💾 Sesiones en {:?}", dir);
            run(&options, config, store)
        }
        None => {
            let store = MemoryStore::new(config.sessions());
            run(&options, config, store)
        }
    }
}
