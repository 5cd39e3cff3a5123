use crate::types::{AxisSample, Recording, GRAVITY};

/// Fuerza media estimada: promedio de `mass * |a| * g` sobre las muestras.
/// Devuelve 0.0 si no hay muestras.
pub fn average_force(samples: &[AxisSample], mass: f64) -> f64 {
    if samples.is_empty() {
        return 0.0;
    }

    let sum: f64 = samples
        .iter()
        .map(|s| mass * s.magnitude() * GRAVITY)
        .sum();
    sum / samples.len() as f64
}

/// Fuerza media sobre el acelerómetro de todas las grabaciones de una sesión
pub fn session_average_force(recordings: &[Recording], mass: f64) -> f64 {
    let samples: Vec<AxisSample> = recordings
        .iter()
        .flat_map(|r| r.accelerometer.iter().copied())
        .collect();
    average_force(&samples, mass)
}
