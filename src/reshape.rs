use thiserror::Error;

use crate::types::{AxisSeries, Recording, RecordingId};

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ReshapeError {
    #[error("La grabación {id} tiene {actual} muestras de acelerómetro, se necesitan {expected}")]
    ShortRecording {
        id: RecordingId,
        expected: usize,
        actual: usize,
    },
}

/// Concatena las primeras `samples_per_recording` muestras de acelerómetro de
/// cada grabación, en orden, separadas por eje: [x, y, z]
pub fn accel_series(
    recordings: &[Recording],
    samples_per_recording: usize,
) -> Result<AxisSeries, ReshapeError> {
    let capacity = recordings.len() * samples_per_recording;
    let mut series: AxisSeries = [
        Vec::with_capacity(capacity),
        Vec::with_capacity(capacity),
        Vec::with_capacity(capacity),
    ];

    for recording in recordings {
        let accel = &recording.accelerometer;
        if accel.len() < samples_per_recording {
            return Err(ReshapeError::ShortRecording {
                id: recording.id,
                expected: samples_per_recording,
                actual: accel.len(),
            });
        }

        for sample in &accel[..samples_per_recording] {
            series[0].push(sample.x as f64);
            series[1].push(sample.y as f64);
            series[2].push(sample.z as f64);
        }
    }

    Ok(series)
}

/// true si la sesión no aportó ninguna muestra
pub fn is_empty(series: &AxisSeries) -> bool {
    series.iter().all(Vec::is_empty)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::AxisSample;

    fn recording(id: RecordingId, n: i16) -> Recording {
        let accel = (0..n).map(|i| AxisSample::new(id as i16 * 10 + i, -i, 100)).collect();
        Recording::new(id, accel, Vec::new())
    }

    #[test]
    fn test_concatenates_in_recording_order() {
        let series = accel_series(&[recording(1, 6), recording(2, 5)], 5).unwrap();
        assert_eq!(
            series[0],
            vec![10.0, 11.0, 12.0, 13.0, 14.0, 20.0, 21.0, 22.0, 23.0, 24.0]
        );
        assert_eq!(series[1][..5], [0.0, -1.0, -2.0, -3.0, -4.0]);
        assert!(series[2].iter().all(|&v| v == 100.0));
    }

    #[test]
    fn test_short_recording() {
        let err = accel_series(&[recording(1, 5), recording(2, 3)], 5).unwrap_err();
        assert_eq!(
            err,
            ReshapeError::ShortRecording {
                id: 2,
                expected: 5,
                actual: 3
            }
        );
    }

    #[test]
    fn test_empty_session() {
        let series = accel_series(&[], 5).unwrap();
        assert!(is_empty(&series));
    }
}
