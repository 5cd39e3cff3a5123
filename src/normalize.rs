//! Normalización min-max de las series por eje.
//!
//! Cada serie se lleva a [0, 1] usando su propio mínimo y máximo. Una serie
//! vacía es un error; una serie constante (max == min) se resuelve según
//! [`DegeneratePolicy`].

use serde::Deserialize;
use thiserror::Error;

use crate::types::AxisSeries;

pub const AXIS_NAMES: [&str; 3] = ["x", "y", "z"];

#[derive(Error, Debug, PartialEq)]
pub enum NormalizeError {
    #[error("Serie vacía")]
    EmptySeries,

    #[error("Serie constante (todos los valores = {value}), no se puede normalizar")]
    DegenerateSeries { value: f64 },

    #[error("Eje {axis}: {source}")]
    Axis {
        axis: &'static str,
        #[source]
        source: Box<NormalizeError>,
    },
}

/// Qué hacer con una serie sin variación (sensor quieto)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DegeneratePolicy {
    /// Devolver `NormalizeError::DegenerateSeries`
    #[default]
    Reject,
    /// Tratarla como señal de fuerza nula: todo a 0.0
    Zero,
}

/// `(v - min) / (max - min)` para cada elemento
pub fn normalize(series: &[f64], policy: DegeneratePolicy) -> Result<Vec<f64>, NormalizeError> {
    if series.is_empty() {
        return Err(NormalizeError::EmptySeries);
    }

    let min = series.iter().fold(f64::INFINITY, |a, &b| a.min(b));
    let max = series.iter().fold(f64::NEG_INFINITY, |a, &b| a.max(b));
    let range = max - min;

    if range == 0.0 {
        return match policy {
            DegeneratePolicy::Reject => Err(NormalizeError::DegenerateSeries { value: min }),
            DegeneratePolicy::Zero => Ok(vec![0.0; series.len()]),
        };
    }

    Ok(series.iter().map(|&v| (v - min) / range).collect())
}

/// Normaliza las tres series de aceleración de forma independiente
pub fn normalize_axes(
    series: &AxisSeries,
    policy: DegeneratePolicy,
) -> Result<AxisSeries, NormalizeError> {
    let mut out: AxisSeries = Default::default();
    for (i, axis) in series.iter().enumerate() {
        out[i] = normalize(axis, policy).map_err(|e| NormalizeError::Axis {
            axis: AXIS_NAMES[i],
            source: Box::new(e),
        })?;
    }
    Ok(out)
}
