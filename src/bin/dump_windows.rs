use std::env;
use std::path::PathBuf;

use anyhow::{anyhow, bail, Result};
use posturometro::classifier::WindowedClassifier;
use posturometro::config::SessionConfig;
use posturometro::normalize::{normalize_axes, AXIS_NAMES};
use posturometro::reshape::accel_series;
use posturometro::scorer::LinearScorer;
use posturometro::sensor::{decode_payload, MotionSensor, ReplaySensor};
use posturometro::types::Recording;

struct DumpOptions {
    model: Option<PathBuf>,
    dump_series: bool,
}

fn parse_args() -> Result<(PathBuf, DumpOptions)> {
    let mut model = None;
    let mut dump_series = false;
    let mut csv_path: Option<PathBuf> = None;

    let mut args = env::args().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--dump-series" => dump_series = true,
            "--model" => {
                model = Some(
                    args.next()
                        .map(PathBuf::from)
                        .ok_or_else(|| anyhow!("Falta la ruta de --model"))?,
                )
            }
            _ => {
                if csv_path.is_some() {
                    bail!("Uso: dump_windows [--model m.json] [--dump-series] <captura.csv>");
                }
                csv_path = Some(PathBuf::from(arg));
            }
        }
    }

    let csv_path = csv_path.ok_or_else(|| anyhow!("Debes especificar un archivo CSV"))?;
    Ok((csv_path, DumpOptions { model, dump_series }))
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let (csv_path, opts) = parse_args()?;
    println!("🎞️  Reproduciendo captura desde {:?}", csv_path);

    let config = SessionConfig::default();
    let mut sensor = ReplaySensor::from_csv(&csv_path)?;
    let mut recordings = Vec::with_capacity(sensor.remaining());
    let mut id = 0;
    while sensor.remaining() > 0 {
        let (accel, gyro) = decode_payload(&sensor.read_value()?)?;
        recordings.push(Recording::new(id, accel, gyro));
        id += 1;
    }

    let raw = accel_series(&recordings, config.samples_per_recording)?;
    let series = normalize_axes(&raw, config.degenerate_policy)?;

    let mut scorer = match &opts.model {
        Some(path) => LinearScorer::from_json_file(path)?,
        None => LinearScorer::mean(config.window_size)?,
    };
    let classifier = WindowedClassifier::new(config.window_size)?;

    if opts.dump_series {
        for (axis, values) in AXIS_NAMES.iter().zip(series.iter()) {
            println!("\n📈 Serie {} ({} valores):", axis, values.len());
            for (idx, value) in values.iter().enumerate() {
                println!("  {:03}: {:>10.6}", idx, value);
            }
        }
    }

    println!("\n🧱 Ventanas de {}:", classifier.window_size());
    for ws in classifier.window_scores(&series, &mut scorer)? {
        println!(
            "  eje {} @ {:>4}: {:>10.6}",
            AXIS_NAMES[ws.row], ws.start, ws.score
        );
    }

    let result = classifier.classify(&series, &mut scorer)?;
    println!("\n🥇 Clase {}, promedios {:?}", result.index, result.averages);

    Ok(())
}
