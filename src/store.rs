use std::collections::{BTreeMap, HashMap};
use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};

use csv::{ReaderBuilder, WriterBuilder};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::{AxisSample, Recording, RecordingId};

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("La sesión {0:?} no existe")]
    UnknownSession(String),

    #[error("Ya existe una grabación con id {id} en {session:?}")]
    DuplicateKey { session: String, id: RecordingId },

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("Fila corrupta en {path:?}: {reason}")]
    Corrupt { path: PathBuf, reason: String },
}

/// Resultado de vaciar una sesión
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClearOutcome {
    Cleared,
    /// La sesión nunca fue creada; no es un error
    Missing,
}

/// Almacén de grabaciones indexado por sesión y por id (timestamp).
/// `read_all` devuelve las grabaciones ordenadas por id.
pub trait SampleStore {
    fn store(&mut self, session: &str, recording: Recording) -> Result<(), StoreError>;
    fn read_all(&self, session: &str) -> Result<Vec<Recording>, StoreError>;
    fn clear(&mut self, session: &str) -> Result<ClearOutcome, StoreError>;
}

/// Almacén en memoria
#[derive(Debug, Default)]
pub struct MemoryStore {
    sessions: HashMap<String, BTreeMap<RecordingId, Recording>>,
}

impl MemoryStore {
    /// Crea el almacén con las sesiones indicadas ya abiertas
    pub fn new<I, S>(sessions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            sessions: sessions
                .into_iter()
                .map(|name| (name.into(), BTreeMap::new()))
                .collect(),
        }
    }

    pub fn len(&self, session: &str) -> usize {
        self.sessions.get(session).map_or(0, BTreeMap::len)
    }
}

impl SampleStore for MemoryStore {
    fn store(&mut self, session: &str, recording: Recording) -> Result<(), StoreError> {
        let records = self
            .sessions
            .get_mut(session)
            .ok_or_else(|| StoreError::UnknownSession(session.to_string()))?;
        if records.contains_key(&recording.id) {
            return Err(StoreError::DuplicateKey {
                session: session.to_string(),
                id: recording.id,
            });
        }
        records.insert(recording.id, recording);
        Ok(())
    }

    fn read_all(&self, session: &str) -> Result<Vec<Recording>, StoreError> {
        self.sessions
            .get(session)
            .map(|records| records.values().cloned().collect())
            .ok_or_else(|| StoreError::UnknownSession(session.to_string()))
    }

    fn clear(&mut self, session: &str) -> Result<ClearOutcome, StoreError> {
        match self.sessions.get_mut(session) {
            Some(records) => {
                records.clear();
                Ok(ClearOutcome::Cleared)
            }
            None => Ok(ClearOutcome::Missing),
        }
    }
}

/// Fila del CSV: una muestra de un sensor dentro de una grabación
#[derive(Debug, Serialize, Deserialize)]
struct SampleRow {
    id: RecordingId,
    sensor: String,
    sample: usize,
    x: i16,
    y: i16,
    z: i16,
}

const ACCEL: &str = "acc";
const GYRO: &str = "gyro";

/// Almacén en disco: un CSV por sesión dentro de un directorio
#[derive(Debug)]
pub struct CsvStore {
    dir: PathBuf,
}

impl CsvStore {
    /// Abre (o crea) el directorio y las sesiones indicadas
    pub fn open<I, S>(dir: impl AsRef<Path>, sessions: I) -> Result<Self, StoreError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;
        let store = Self { dir };

        for session in sessions {
            let path = store.session_path(session.as_ref());
            if !path.exists() {
                Self::write_header(&path)?;
                log::debug!("Sesión creada en {:?}", path);
            }
        }

        Ok(store)
    }

    fn session_path(&self, session: &str) -> PathBuf {
        self.dir.join(format!("{}.csv", session))
    }

    fn write_header(path: &Path) -> Result<(), StoreError> {
        let mut writer = WriterBuilder::new().has_headers(false).from_path(path)?;
        writer.write_record(["id", "sensor", "sample", "x", "y", "z"])?;
        writer.flush()?;
        Ok(())
    }

    fn load(&self, session: &str) -> Result<BTreeMap<RecordingId, Recording>, StoreError> {
        let path = self.session_path(session);
        if !path.exists() {
            return Err(StoreError::UnknownSession(session.to_string()));
        }

        let mut reader = ReaderBuilder::new().has_headers(true).from_path(&path)?;
        let mut records: BTreeMap<RecordingId, Recording> = BTreeMap::new();

        for row in reader.deserialize::<SampleRow>() {
            let row = row?;
            let recording = records
                .entry(row.id)
                .or_insert_with(|| Recording::new(row.id, Vec::new(), Vec::new()));
            let target = match row.sensor.as_str() {
                ACCEL => &mut recording.accelerometer,
                GYRO => &mut recording.gyroscope,
                other => {
                    return Err(StoreError::Corrupt {
                        path,
                        reason: format!("sensor desconocido {:?}", other),
                    })
                }
            };
            if row.sample != target.len() {
                return Err(StoreError::Corrupt {
                    path,
                    reason: format!("muestra {} fuera de orden en id {}", row.sample, row.id),
                });
            }
            target.push(AxisSample::new(row.x, row.y, row.z));
        }

        Ok(records)
    }
}

impl SampleStore for CsvStore {
    fn store(&mut self, session: &str, recording: Recording) -> Result<(), StoreError> {
        if self.load(session)?.contains_key(&recording.id) {
            return Err(StoreError::DuplicateKey {
                session: session.to_string(),
                id: recording.id,
            });
        }

        let file = OpenOptions::new()
            .append(true)
            .open(self.session_path(session))?;
        let mut writer = WriterBuilder::new().has_headers(false).from_writer(file);

        for (sensor, samples) in [(ACCEL, &recording.accelerometer), (GYRO, &recording.gyroscope)] {
            for (sample, s) in samples.iter().enumerate() {
                writer.serialize(SampleRow {
                    id: recording.id,
                    sensor: sensor.to_string(),
                    sample,
                    x: s.x,
                    y: s.y,
                    z: s.z,
                })?;
            }
        }
        writer.flush()?;
        Ok(())
    }

    fn read_all(&self, session: &str) -> Result<Vec<Recording>, StoreError> {
        Ok(self.load(session)?.into_values().collect())
    }

    fn clear(&mut self, session: &str) -> Result<ClearOutcome, StoreError> {
        let path = self.session_path(session);
        if !path.exists() {
            return Ok(ClearOutcome::Missing);
        }
        Self::write_header(&path)?;
        Ok(ClearOutcome::Cleared)
    }
}
