use std::collections::{BTreeMap, VecDeque};
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use anyhow::{bail, Context};
use crossbeam_channel::{bounded, Receiver, RecvTimeoutError};
use csv::ReaderBuilder;
use thiserror::Error;

use crate::types::{AxisSample, BYTES_PER_SAMPLE, PAYLOAD_LEN, SAMPLES_PER_READ};

/// Lecturas en vuelo entre el hilo lector y la sesión
const READER_CHANNEL_CAPACITY: usize = 16;

#[derive(Error, Debug)]
pub enum SensorError {
    #[error("Payload demasiado corto: se esperaban {expected} bytes, llegaron {actual}")]
    ShortPayload { expected: usize, actual: usize },

    #[error("Dispositivo no disponible: {0}")]
    Unavailable(String),

    #[error("Sin respuesta del dispositivo tras {0:?}")]
    Timeout(Duration),

    #[error("El hilo lector terminó")]
    Disconnected,
}

/// Capacidad mínima que necesitamos del wearable: una lectura de la característica IMU
pub trait MotionSensor {
    fn read_value(&mut self) -> Result<Vec<u8>, SensorError>;
}

impl<S: MotionSensor + ?Sized> MotionSensor for Box<S> {
    fn read_value(&mut self) -> Result<Vec<u8>, SensorError> {
        (**self).read_value()
    }
}

/// Decodifica una lectura de 60 bytes en 5 muestras de acelerómetro y 5 de giroscopio.
/// Cada muestra ocupa 12 bytes: acc x,y,z y gyro x,y,z en i16 little-endian.
pub fn decode_payload(value: &[u8]) -> Result<(Vec<AxisSample>, Vec<AxisSample>), SensorError> {
    if value.len() < PAYLOAD_LEN {
        return Err(SensorError::ShortPayload {
            expected: PAYLOAD_LEN,
            actual: value.len(),
        });
    }

    let mut accel = Vec::with_capacity(SAMPLES_PER_READ);
    let mut gyro = Vec::with_capacity(SAMPLES_PER_READ);

    for chunk in value[..PAYLOAD_LEN].chunks_exact(BYTES_PER_SAMPLE) {
        let word = |i: usize| i16::from_le_bytes([chunk[i], chunk[i + 1]]);
        accel.push(AxisSample::new(word(0), word(2), word(4)));
        gyro.push(AxisSample::new(word(6), word(8), word(10)));
    }

    Ok((accel, gyro))
}

/// Operación inversa de `decode_payload`; la usa el sensor de reproducción
pub fn encode_payload(accel: &[AxisSample], gyro: &[AxisSample]) -> Vec<u8> {
    let mut out = Vec::with_capacity(PAYLOAD_LEN);
    for i in 0..SAMPLES_PER_READ {
        let a = accel.get(i).copied().unwrap_or_default();
        let g = gyro.get(i).copied().unwrap_or_default();
        for v in [a.x, a.y, a.z, g.x, g.y, g.z] {
            out.extend_from_slice(&v.to_le_bytes());
        }
    }
    out
}

/// Estadísticas de lectura del hilo de captura
#[derive(Debug, Default)]
pub struct ReaderStats {
    reads: AtomicU32,
    failures: AtomicU32,
}

impl ReaderStats {
    pub fn reads(&self) -> u32 {
        self.reads.load(Ordering::Relaxed)
    }

    pub fn failures(&self) -> u32 {
        self.failures.load(Ordering::Relaxed)
    }
}

/// Lector en segundo plano: hace `reads` lecturas y las envía por el canal.
/// Se detiene tras el primer error o cuando se le pide parar.
pub struct SensorReader<S> {
    rx: Receiver<Result<Vec<u8>, SensorError>>,
    handle: JoinHandle<S>,
    stats: Arc<ReaderStats>,
    stop: Arc<AtomicBool>,
}

pub fn start_reader<S>(mut sensor: S, reads: usize) -> SensorReader<S>
where
    S: MotionSensor + Send + 'static,
{
    let (tx, rx) = bounded(READER_CHANNEL_CAPACITY);
    let stats = Arc::new(ReaderStats::default());
    let thread_stats = Arc::clone(&stats);
    let stop = Arc::new(AtomicBool::new(false));
    let thread_stop = Arc::clone(&stop);

    let handle = std::thread::spawn(move || {
        for _ in 0..reads {
            if thread_stop.load(Ordering::Relaxed) {
                break;
            }
            let result = sensor.read_value();
            let failed = result.is_err();
            if failed {
                thread_stats.failures.fetch_add(1, Ordering::Relaxed);
            } else {
                thread_stats.reads.fetch_add(1, Ordering::Relaxed);
            }
            if tx.send(result).is_err() || failed {
                break;
            }
        }
        sensor
    });

    SensorReader {
        rx,
        handle,
        stats,
        stop,
    }
}

impl<S> SensorReader<S> {
    /// Espera la siguiente lectura como mucho `timeout`
    pub fn recv(&self, timeout: Duration) -> Result<Vec<u8>, SensorError> {
        match self.rx.recv_timeout(timeout) {
            Ok(result) => result,
            Err(RecvTimeoutError::Timeout) => Err(SensorError::Timeout(timeout)),
            Err(RecvTimeoutError::Disconnected) => Err(SensorError::Disconnected),
        }
    }

    pub fn stats(&self) -> &ReaderStats {
        &self.stats
    }

    /// Recupera el sensor si el hilo ya terminó; si sigue bloqueado se abandona
    pub fn finish(self) -> Option<S> {
        self.stop.store(true, Ordering::Relaxed);
        drop(self.rx);
        if self.handle.is_finished() {
            self.handle.join().ok()
        } else {
            log::warn!("⚠️  El hilo lector sigue bloqueado, se abandona el sensor");
            None
        }
    }

    /// Igual que `finish` pero esperando a que el hilo termine
    pub fn join(self) -> Option<S> {
        self.stop.store(true, Ordering::Relaxed);
        drop(self.rx);
        self.handle.join().ok()
    }
}

/// Sensor que reproduce lecturas grabadas previamente
#[derive(Debug, Clone, Default)]
pub struct ReplaySensor {
    payloads: VecDeque<Vec<u8>>,
}

impl ReplaySensor {
    pub fn from_payloads(payloads: Vec<Vec<u8>>) -> Self {
        Self {
            payloads: payloads.into(),
        }
    }

    /// Carga una captura desde CSV con formato cycle,sample,ax,ay,az,gx,gy,gz.
    /// Cada ciclo produce una lectura de 60 bytes.
    pub fn from_csv(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let mut reader = ReaderBuilder::new()
            .has_headers(true)
            .from_path(path)
            .with_context(|| format!("No se pudo abrir la captura {:?}", path))?;

        let mut cycles: BTreeMap<usize, (Vec<AxisSample>, Vec<AxisSample>)> = BTreeMap::new();

        for (row_idx, result) in reader.records().enumerate() {
            let record =
                result.with_context(|| format!("Fila {} inválida en {:?}", row_idx + 1, path))?;
            if record.len() < 8 {
                bail!("La fila {} no tiene 8 columnas", row_idx + 1);
            }

            let cycle: usize = record[0]
                .trim()
                .parse()
                .with_context(|| format!("cycle inválido en fila {}", row_idx + 1))?;
            let mut v = [0i16; 6];
            for (i, slot) in v.iter_mut().enumerate() {
                *slot = record[i + 2]
                    .trim()
                    .parse()
                    .with_context(|| format!("valor inválido en fila {}, columna {}", row_idx + 1, i + 3))?;
            }

            let entry = cycles.entry(cycle).or_default();
            entry.0.push(AxisSample::new(v[0], v[1], v[2]));
            entry.1.push(AxisSample::new(v[3], v[4], v[5]));
        }

        let payloads = cycles
            .values()
            .map(|(accel, gyro)| encode_payload(accel, gyro))
            .collect();
        Ok(Self::from_payloads(payloads))
    }

    pub fn remaining(&self) -> usize {
        self.payloads.len()
    }
}

impl MotionSensor for ReplaySensor {
    fn read_value(&mut self) -> Result<Vec<u8>, SensorError> {
        self.payloads
            .pop_front()
            .ok_or_else(|| SensorError::Unavailable("captura agotada".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_decode_little_endian_signed() {
        let mut buf = vec![0u8; PAYLOAD_LEN];
        // acc_x de la primera muestra = -2 (0xFFFE)
        buf[0] = 0xFE;
        buf[1] = 0xFF;
        // acc_y = 0x0102
        buf[2] = 0x02;
        buf[3] = 0x01;
        // gyro_z de la última muestra = i16::MIN
        buf[58] = 0x00;
        buf[59] = 0x80;

        let (accel, gyro) = decode_payload(&buf).unwrap();
        assert_eq!(accel.len(), 5);
        assert_eq!(gyro.len(), 5);
        assert_eq!(accel[0].x, -2);
        assert_eq!(accel[0].y, 258);
        assert_eq!(gyro[4].z, i16::MIN);
    }

    #[test]
    fn test_decode_rejects_short_payload() {
        let err = decode_payload(&[0u8; 59]).unwrap_err();
        assert!(matches!(
            err,
            SensorError::ShortPayload {
                expected: 60,
                actual: 59
            }
        ));
    }

    #[test]
    fn test_encode_decode_preserves_samples() {
        let accel: Vec<_> = (0..5).map(|i| AxisSample::new(i, -i, 1000 * i)).collect();
        let gyro: Vec<_> = (0..5).map(|i| AxisSample::new(-300, i, 7)).collect();
        let (a, g) = decode_payload(&encode_payload(&accel, &gyro)).unwrap();
        assert_eq!(a, accel);
        assert_eq!(g, gyro);
    }

    #[test]
    fn test_reader_stops_after_first_error() {
        let sensor = ReplaySensor::from_payloads(vec![vec![0u8; PAYLOAD_LEN]; 2]);
        let reader = start_reader(sensor, 5);

        assert!(reader.recv(Duration::from_secs(1)).is_ok());
        assert!(reader.recv(Duration::from_secs(1)).is_ok());
        assert!(matches!(
            reader.recv(Duration::from_secs(1)),
            Err(SensorError::Unavailable(_))
        ));
        assert!(matches!(
            reader.recv(Duration::from_secs(1)),
            Err(SensorError::Disconnected)
        ));
        assert_eq!(reader.stats().reads(), 2);
        assert_eq!(reader.stats().failures(), 1);

        let sensor = reader.join().unwrap();
        assert_eq!(sensor.remaining(), 0);
    }

    #[test]
    fn test_reader_with_many_reads_uses_small_channel() {
        let sensor = ReplaySensor::from_payloads(vec![vec![0u8; PAYLOAD_LEN]; 40]);
        let reader = start_reader(sensor, usize::MAX);

        for _ in 0..40 {
            assert!(reader.recv(Duration::from_secs(1)).is_ok());
        }
        assert!(matches!(
            reader.recv(Duration::from_secs(1)),
            Err(SensorError::Unavailable(_))
        ));
        assert!(reader.join().is_some());
    }

    #[test]
    fn test_replay_from_csv() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("captura.csv");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(file, "cycle,sample,ax,ay,az,gx,gy,gz").unwrap();
        for cycle in 0..2 {
            for sample in 0..5 {
                writeln!(file, "{},{},{},2,3,4,5,6", cycle, sample, cycle * 10 + sample).unwrap();
            }
        }
        drop(file);

        let mut sensor = ReplaySensor::from_csv(&path).unwrap();
        assert_eq!(sensor.remaining(), 2);

        let (accel, gyro) = decode_payload(&sensor.read_value().unwrap()).unwrap();
        assert_eq!(accel[4].x, 4);
        assert_eq!(gyro[0], AxisSample::new(4, 5, 6));

        let (accel, _) = decode_payload(&sensor.read_value().unwrap()).unwrap();
        assert_eq!(accel[0].x, 10);
        assert!(sensor.read_value().is_err());
    }
}
