use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

use crate::normalize::DegeneratePolicy;
use crate::presenter::Posture;
use crate::types::{SAMPLES_PER_READ, SAMPLES_PER_RECORDING, WINDOW_SIZE};

/// Tope de lecturas por sesión
pub const MAX_CAPTURE_CYCLES: usize = 10_000;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Configuración inválida: {0}")]
    Invalid(String),
}

/// Frases que se le dicen al usuario
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Messages {
    pub prompt: String,
    pub no_device: String,
    pub no_data: String,
    pub no_motion: String,
    pub correct: String,
    pub under: String,
    pub over: String,
}

impl Default for Messages {
    fn default() -> Self {
        Self {
            prompt: "Prepárate, haz un golpe de golf".to_string(),
            no_device: "¡Conecta primero el dispositivo!".to_string(),
            no_data: "No se grabó ningún movimiento".to_string(),
            no_motion: "No se detectó movimiento, inténtalo de nuevo".to_string(),
            correct: "Tu posición es correcta".to_string(),
            under: "Tu posición se queda corta, mira la animación".to_string(),
            over: "Tu posición se pasa, mira la animación".to_string(),
        }
    }
}

impl Messages {
    pub fn for_posture(&self, posture: Posture) -> &str {
        match posture {
            Posture::Correct => &self.correct,
            Posture::Under => &self.under,
            Posture::Over => &self.over,
        }
    }
}

/// Parámetros de una sesión de análisis
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Sesión del almacén donde se graba el golpe a analizar (default: "analyze")
    pub session_name: String,
    /// Sesión para grabaciones de entrenamiento (default: "imu")
    pub training_session: String,
    /// Lecturas del sensor por captura (default: 5)
    pub capture_cycles: usize,
    /// Muestras de cada grabación que entran en las series (default: 5)
    pub samples_per_recording: usize,
    /// Ancho de ventana del clasificador (default: 15)
    pub window_size: usize,
    pub degenerate_policy: DegeneratePolicy,
    /// Espera máxima por lectura antes de dar el dispositivo por perdido
    pub read_timeout_ms: u64,
    /// Masa usada para estimar la fuerza media del golpe, en kg
    pub mass_kg: f64,
    pub messages: Messages,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            session_name: "analyze".to_string(),
            training_session: "imu".to_string(),
            capture_cycles: 5,
            samples_per_recording: SAMPLES_PER_RECORDING,
            window_size: WINDOW_SIZE,
            degenerate_policy: DegeneratePolicy::default(),
            read_timeout_ms: 2000,
            mass_kg: 0.5,
            messages: Messages::default(),
        }
    }
}

impl SessionConfig {
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path.as_ref())?;
        let config: Self = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.window_size == 0 {
            return Err(ConfigError::Invalid("window_size debe ser > 0".to_string()));
        }
        if self.samples_per_recording == 0 || self.samples_per_recording > SAMPLES_PER_READ {
            return Err(ConfigError::Invalid(format!(
                "samples_per_recording debe estar entre 1 y {}",
                SAMPLES_PER_READ
            )));
        }
        if self.capture_cycles > MAX_CAPTURE_CYCLES {
            return Err(ConfigError::Invalid(format!(
                "capture_cycles no puede superar {}",
                MAX_CAPTURE_CYCLES
            )));
        }
        if !(self.mass_kg.is_finite() && self.mass_kg > 0.0) {
            return Err(ConfigError::Invalid("mass_kg debe ser positivo".to_string()));
        }
        if self.session_name.is_empty() || self.training_session.is_empty() {
            return Err(ConfigError::Invalid("nombre de sesión vacío".to_string()));
        }
        Ok(())
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }

    /// Sesiones que hay que abrir en el almacén
    pub fn sessions(&self) -> [&str; 2] {
        [self.training_session.as_str(), self.session_name.as_str()]
    }
}
