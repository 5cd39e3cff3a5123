//! Puntuadores de ventana.
//!
//! Un [`Scorer`] recibe una ventana de longitud fija y devuelve un único
//! número real: la similitud con el patrón de referencia que tenga cargado.
//! El clasificador no sabe nada del modelo que hay detrás.

use std::fs;
use std::path::Path;

use serde::Deserialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ScorerError {
    #[error("Tamaño de ventana inválido: se esperaba {expected}, llegó {actual}")]
    WindowSize { expected: usize, actual: usize },

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Modelo inválido: {0}")]
    InvalidModel(String),

    #[error("ONNX Runtime error: {0}")]
    OnnxError(String),

    #[error("Missing ONNX {kind}")]
    MissingIo { kind: &'static str },

    #[error("No output tensor found")]
    NoOutputTensor,
}

#[cfg(feature = "onnx")]
impl From<ort::Error> for ScorerError {
    fn from(e: ort::Error) -> Self {
        ScorerError::OnnxError(e.to_string())
    }
}

pub trait Scorer {
    fn score(&mut self, window: &[f64]) -> Result<f64, ScorerError>;
}

/// Cualquier closure `FnMut(&[f64]) -> f64` sirve como puntuador
impl<F> Scorer for F
where
    F: FnMut(&[f64]) -> f64,
{
    fn score(&mut self, window: &[f64]) -> Result<f64, ScorerError> {
        Ok(self(window))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Activation {
    #[default]
    Identity,
    Sigmoid,
}

/// Modelo lineal exportado a JSON: `{"weights": [...], "intercept": 0.0}`
#[derive(Debug, Clone, Deserialize)]
pub struct LinearScorer {
    weights: Vec<f64>,
    #[serde(default)]
    intercept: f64,
    #[serde(default)]
    activation: Activation,
}

impl LinearScorer {
    pub fn new(weights: Vec<f64>, intercept: f64, activation: Activation) -> Result<Self, ScorerError> {
        let scorer = Self {
            weights,
            intercept,
            activation,
        };
        scorer.validate()?;
        Ok(scorer)
    }

    /// Media de la ventana: puntúa más alto cuanto más arriba va la señal normalizada
    pub fn mean(window_size: usize) -> Result<Self, ScorerError> {
        let w = 1.0 / window_size.max(1) as f64;
        Self::new(vec![w; window_size], 0.0, Activation::Identity)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ScorerError> {
        let content = fs::read_to_string(path.as_ref())?;
        let scorer: Self = serde_json::from_str(&content)?;
        scorer.validate()?;

        log::info!(
            "[MODELO] Lineal cargado: {:?} ({} pesos, {:?})",
            path.as_ref(),
            scorer.weights.len(),
            scorer.activation
        );
        Ok(scorer)
    }

    fn validate(&self) -> Result<(), ScorerError> {
        if self.weights.is_empty() {
            return Err(ScorerError::InvalidModel("sin pesos".to_string()));
        }
        if !self.intercept.is_finite() || self.weights.iter().any(|w| !w.is_finite()) {
            return Err(ScorerError::InvalidModel("pesos no finitos".to_string()));
        }
        Ok(())
    }

    pub fn window_size(&self) -> usize {
        self.weights.len()
    }
}

impl Scorer for LinearScorer {
    fn score(&mut self, window: &[f64]) -> Result<f64, ScorerError> {
        if window.len() != self.weights.len() {
            return Err(ScorerError::WindowSize {
                expected: self.weights.len(),
                actual: window.len(),
            });
        }

        let z = self.intercept
            + self
                .weights
                .iter()
                .zip(window)
                .map(|(w, x)| w * x)
                .sum::<f64>();

        Ok(match self.activation {
            Activation::Identity => z,
            Activation::Sigmoid => 1.0 / (1.0 + (-z).exp()),
        })
    }
}

#[cfg(feature = "onnx")]
pub use onnx::OnnxScorer;

#[cfg(feature = "onnx")]
mod onnx {
    use super::{Scorer, ScorerError};
    use ort::session::Session;
    use ort::tensor::TensorElementType;
    use ort::value::ValueType;

    /// Modelo ONNX con entrada [1, W] f32 y una salida escalar f32
    pub struct OnnxScorer {
        session: Session,
        input_name: String,
        output_name: String,
        window_size: usize,
    }

    impl OnnxScorer {
        pub fn new(model_path: &str, window_size: usize) -> Result<Self, ScorerError> {
            let session = Session::builder()?.commit_from_file(model_path)?;

            let input_name = session
                .inputs
                .first()
                .map(|input| input.name.clone())
                .ok_or(ScorerError::MissingIo { kind: "input" })?;

            let output_name = session
                .outputs
                .iter()
                .find(|output| {
                    matches!(
                        output.output_type,
                        ValueType::Tensor {
                            ty: TensorElementType::Float32,
                            ..
                        }
                    )
                })
                .or_else(|| session.outputs.first())
                .map(|output| output.name.clone())
                .ok_or(ScorerError::MissingIo { kind: "output" })?;

            log::info!("[ONNX] Modelo cargado: {}", model_path);
            log::info!("[ONNX] Input: {} / Output: {}", input_name, output_name);

            Ok(Self {
                session,
                input_name,
                output_name,
                window_size,
            })
        }
    }

    impl Scorer for OnnxScorer {
        fn score(&mut self, window: &[f64]) -> Result<f64, ScorerError> {
            if window.len() != self.window_size {
                return Err(ScorerError::WindowSize {
                    expected: self.window_size,
                    actual: window.len(),
                });
            }

            let input_data: Vec<f32> = window.iter().map(|&v| v as f32).collect();
            let input_value =
                ort::value::Value::from_array((vec![1_usize, self.window_size], input_data))?;

            let outputs = self.session.run(ort::inputs![
                self.input_name.as_str() => &input_value,
            ])?;

            let (_, data) = outputs[self.output_name.as_str()].try_extract_tensor::<f32>()?;
            data.first()
                .map(|&v| v as f64)
                .ok_or(ScorerError::NoOutputTensor)
        }
    }
}
