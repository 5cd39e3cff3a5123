use thiserror::Error;

use crate::scorer::{Scorer, ScorerError};
use crate::types::{AxisSeries, NUM_AXES, WINDOW_SIZE};

#[derive(Error, Debug)]
pub enum ClassifyError {
    #[error("El tamaño de ventana debe ser mayor que cero")]
    InvalidWindow,

    #[error("Scorer error: {0}")]
    ScorerError(#[from] ScorerError),

    #[error("Puntuación no finita ({score}) en fila {row}, ventana que empieza en {start}")]
    NonFiniteScore { row: usize, start: usize, score: f64 },
}

/// Puntuación de una ventana concreta
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WindowScore {
    pub row: usize,
    pub start: usize,
    pub score: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Classification {
    /// Índice ganador (argmax de `averages`)
    pub index: usize,
    /// Puntuación acumulada de cada fila dividida entre el número de ejes
    pub averages: [f64; NUM_AXES],
    /// Ventanas completas procesadas por fila
    pub windows: [usize; NUM_AXES],
}

/// Clasificador por ventanas fijas sin solapamiento.
///
/// Recorre las series en bloques de `window_size` desde 0; las muestras finales
/// que no completan una ventana se descartan. Cada ventana se puntúa con el
/// `Scorer` inyectado y se acumula en la fila (eje) a la que pertenece.
#[derive(Debug, Clone)]
pub struct WindowedClassifier {
    window_size: usize,
}

impl WindowedClassifier {
    pub fn new(window_size: usize) -> Result<Self, ClassifyError> {
        if window_size == 0 {
            return Err(ClassifyError::InvalidWindow);
        }
        Ok(Self { window_size })
    }

    pub fn window_size(&self) -> usize {
        self.window_size
    }

    /// Puntúa todas las ventanas completas, en orden ventana → fila
    pub fn window_scores<S>(
        &self,
        series: &AxisSeries,
        scorer: &mut S,
    ) -> Result<Vec<WindowScore>, ClassifyError>
    where
        S: Scorer + ?Sized,
    {
        let w = self.window_size;
        let longest = series.iter().map(Vec::len).max().unwrap_or(0);
        let mut scores = Vec::new();

        let mut start = 0;
        while start + w <= longest {
            for (row, values) in series.iter().enumerate() {
                // Una fila más corta simplemente deja de aportar
                let Some(chunk) = values.get(start..start + w) else {
                    continue;
                };
                let score = scorer.score(chunk)?;
                if !score.is_finite() {
                    return Err(ClassifyError::NonFiniteScore { row, start, score });
                }
                scores.push(WindowScore { row, start, score });
            }
            start += w;
        }

        Ok(scores)
    }

    pub fn classify<S>(&self, series: &AxisSeries, scorer: &mut S) -> Result<Classification, ClassifyError>
    where
        S: Scorer + ?Sized,
    {
        let mut totals = [0.0f64; NUM_AXES];
        let mut windows = [0usize; NUM_AXES];

        for ws in self.window_scores(series, scorer)? {
            totals[ws.row] += ws.score;
            windows[ws.row] += 1;
        }

        let averages = totals.map(|t| t / NUM_AXES as f64);
        let index = argmax(&averages).unwrap_or(0);

        log::debug!(
            "Promedios por fila: {:?} (ventanas {:?}) -> {}",
            averages,
            windows,
            index
        );

        Ok(Classification {
            index,
            averages,
            windows,
        })
    }
}

impl Default for WindowedClassifier {
    fn default() -> Self {
        Self {
            window_size: WINDOW_SIZE,
        }
    }
}

/// Índice del máximo; en caso de empate gana el primero
pub fn argmax(values: &[f64]) -> Option<usize> {
    let mut best: Option<(usize, f64)> = None;
    for (i, &v) in values.iter().enumerate() {
        match best {
            Some((_, b)) if v <= b => {}
            _ => best = Some((i, v)),
        }
    }
    best.map(|(i, _)| i)
}
