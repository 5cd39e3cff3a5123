//! Orquestación de una sesión de análisis.
//!
//! Secuencia fija: vaciar la sesión → avisar al usuario → capturar →
//! reconstruir series → normalizar → clasificar → presentar. Todo el estado
//! que antes vivía en globales (dispositivo, poses actuales) está aquí.

use std::time::{SystemTime, UNIX_EPOCH};

use thiserror::Error;

use crate::classifier::{Classification, ClassifyError, WindowedClassifier};
use crate::config::SessionConfig;
use crate::force::session_average_force;
use crate::normalize::{normalize_axes, NormalizeError};
use crate::presenter::{present, AnimationTarget, Posture, PosturePresenter};
use crate::reshape::{accel_series, is_empty, ReshapeError};
use crate::scorer::Scorer;
use crate::sensor::{decode_payload, start_reader, MotionSensor, SensorError};
use crate::store::{ClearOutcome, SampleStore, StoreError};
use crate::types::{AxisSeries, Recording, RecordingId};

#[derive(Error, Debug)]
pub enum SessionError {
    #[error("No hay dispositivo conectado")]
    NoDevice,

    #[error("Captura interrumpida tras {written} grabaciones: {source}")]
    CaptureAborted {
        written: usize,
        #[source]
        source: SensorError,
    },

    #[error("La sesión {0:?} no tiene grabaciones")]
    EmptyRecording(String),

    #[error("Clase fuera de rango: {0}")]
    UnknownClass(usize),

    #[error("Store error: {0}")]
    StoreError(#[from] StoreError),

    #[error("Reshape error: {0}")]
    ReshapeError(#[from] ReshapeError),

    #[error("Normalize error: {0}")]
    NormalizeError(#[from] NormalizeError),

    #[error("Classify error: {0}")]
    ClassifyError(#[from] ClassifyError),
}

/// Hueco para el dispositivo: conectado o no
#[derive(Debug)]
pub struct DeviceSlot<S> {
    sensor: Option<S>,
}

impl<S> DeviceSlot<S> {
    pub fn empty() -> Self {
        Self { sensor: None }
    }

    pub fn connected(sensor: S) -> Self {
        Self {
            sensor: Some(sensor),
        }
    }

    pub fn connect(&mut self, sensor: S) {
        self.sensor = Some(sensor);
    }

    pub fn disconnect(&mut self) -> Option<S> {
        self.sensor.take()
    }

    pub fn is_connected(&self) -> bool {
        self.sensor.is_some()
    }
}

impl<S> Default for DeviceSlot<S> {
    fn default() -> Self {
        Self::empty()
    }
}

/// Genera ids de grabación a partir del reloj, siempre crecientes
#[derive(Debug, Default)]
pub struct RecordingIds {
    last: Option<RecordingId>,
}

impl RecordingIds {
    pub fn next_at(&mut self, now_ms: RecordingId) -> RecordingId {
        let id = match self.last {
            Some(last) if now_ms <= last => last + 1,
            _ => now_ms,
        };
        self.last = Some(id);
        id
    }

    pub fn next(&mut self) -> RecordingId {
        let now_ms = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as RecordingId)
            .unwrap_or_default();
        self.next_at(now_ms)
    }
}

/// Datos de una sesión en curso; se crea al empezar y se descarta al terminar
#[derive(Debug)]
pub struct SessionContext {
    pub session: String,
    pub written: usize,
    pub recordings: Vec<Recording>,
}

impl SessionContext {
    fn new(session: &str) -> Self {
        Self {
            session: session.to_string(),
            written: 0,
            recordings: Vec::new(),
        }
    }
}

/// Resultado de una sesión de análisis
#[derive(Debug, Clone, PartialEq)]
pub struct SessionReport {
    pub posture: Posture,
    pub classification: Classification,
    pub recordings: usize,
    pub average_force: f64,
    pub animation: AnimationTarget,
    /// Series normalizadas [x, y, z] que se clasificaron
    pub series: AxisSeries,
}

pub struct Orchestrator<St, Sc, P> {
    config: SessionConfig,
    store: St,
    scorer: Sc,
    presenter: P,
    classifier: WindowedClassifier,
    ids: RecordingIds,
    current: Option<AnimationTarget>,
}

impl<St, Sc, P> Orchestrator<St, Sc, P>
where
    St: SampleStore,
    Sc: Scorer,
    P: PosturePresenter,
{
    pub fn new(config: SessionConfig, store: St, scorer: Sc, presenter: P) -> Result<Self, ClassifyError> {
        let classifier = WindowedClassifier::new(config.window_size)?;
        Ok(Self {
            config,
            store,
            scorer,
            presenter,
            classifier,
            ids: RecordingIds::default(),
            current: None,
        })
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn store(&self) -> &St {
        &self.store
    }

    pub fn scorer(&self) -> &Sc {
        &self.scorer
    }

    pub fn presenter(&self) -> &P {
        &self.presenter
    }

    /// Poses que el avatar está mostrando ahora mismo
    pub fn current_animation(&self) -> Option<&AnimationTarget> {
        self.current.as_ref()
    }

    /// Sesión completa de análisis
    pub fn analyze<S>(&mut self, device: &mut DeviceSlot<S>) -> Result<SessionReport, SessionError>
    where
        S: MotionSensor + Send + 'static,
    {
        let session = self.config.session_name.clone();
        let mut ctx = SessionContext::new(&session);

        if self.store.clear(&session)? == ClearOutcome::Missing {
            log::warn!("⚠️  La sesión {:?} no existía", session);
        }

        self.presenter.speak(&self.config.messages.prompt);
        self.capture_into(device, &mut ctx)?;

        ctx.recordings = self.store.read_all(&session)?;
        let raw = accel_series(&ctx.recordings, self.config.samples_per_recording)?;
        if is_empty(&raw) {
            self.presenter.speak(&self.config.messages.no_data);
            return Err(SessionError::EmptyRecording(session));
        }

        let normalized = match normalize_axes(&raw, self.config.degenerate_policy) {
            Ok(series) => series,
            Err(e) => {
                self.presenter.speak(&self.config.messages.no_motion);
                return Err(e.into());
            }
        };
        let classification = self.classifier.classify(&normalized, &mut self.scorer)?;
        let posture = Posture::from_index(classification.index)
            .ok_or(SessionError::UnknownClass(classification.index))?;

        let animation = present(&mut self.presenter, posture, &self.config.messages);
        self.current = Some(animation.clone());

        let average_force = session_average_force(&ctx.recordings, self.config.mass_kg);
        log::info!(
            "🎯 Postura: {} (promedios {:?}, fuerza media {:.2} N)",
            posture.as_str(),
            classification.averages,
            average_force
        );

        Ok(SessionReport {
            posture,
            classification,
            recordings: ctx.recordings.len(),
            average_force,
            animation,
            series: normalized,
        })
    }

    /// Graba en la sesión de entrenamiento sin vaciarla ni clasificar
    pub fn record_training<S>(&mut self, device: &mut DeviceSlot<S>) -> Result<usize, SessionError>
    where
        S: MotionSensor + Send + 'static,
    {
        let mut ctx = SessionContext::new(&self.config.training_session);
        self.capture_into(device, &mut ctx)?;
        log::info!("💾 {} grabaciones añadidas a {:?}", ctx.written, ctx.session);
        Ok(ctx.written)
    }

    /// Clasifica lo que ya haya en una sesión del almacén, sin capturar ni presentar
    pub fn classify_session(&mut self, session: &str) -> Result<Classification, SessionError> {
        let recordings = self.store.read_all(session)?;
        let raw = accel_series(&recordings, self.config.samples_per_recording)?;
        if is_empty(&raw) {
            return Err(SessionError::EmptyRecording(session.to_string()));
        }
        let normalized = normalize_axes(&raw, self.config.degenerate_policy)?;
        Ok(self.classifier.classify(&normalized, &mut self.scorer)?)
    }

    /// Lee `capture_cycles` veces del sensor y guarda una grabación por lectura.
    /// Si una lectura falla se corta la captura; lo ya escrito se queda.
    fn capture_into<S>(&mut self, device: &mut DeviceSlot<S>, ctx: &mut SessionContext) -> Result<(), SessionError>
    where
        S: MotionSensor + Send + 'static,
    {
        let Some(sensor) = device.disconnect() else {
            self.presenter.speak(&self.config.messages.no_device);
            return Err(SessionError::NoDevice);
        };

        let cycles = self.config.capture_cycles;
        let timeout = self.config.read_timeout();
        log::info!("🎙️  Grabando {} lecturas en {:?}", cycles, ctx.session);

        let reader = start_reader(sensor, cycles);
        let mut failure: Option<SessionError> = None;
        // true si el propio hilo lector cortó (error del sensor o hilo caído)
        let mut reader_ended = false;

        for _ in 0..cycles {
            let decoded = reader.recv(timeout).and_then(|value| decode_payload(&value));
            let (accelerometer, gyroscope) = match decoded {
                Ok(samples) => samples,
                Err(source) => {
                    reader_ended = matches!(
                        source,
                        SensorError::Unavailable(_) | SensorError::Disconnected
                    );
                    failure = Some(SessionError::CaptureAborted {
                        written: ctx.written,
                        source,
                    });
                    break;
                }
            };

            let recording = Recording::new(self.ids.next(), accelerometer, gyroscope);
            if let Err(e) = self.store.store(&ctx.session, recording) {
                failure = Some(e.into());
                break;
            }
            ctx.written += 1;
        }

        log::debug!(
            "Lector: {} lecturas, {} fallos",
            reader.stats().reads(),
            reader.stats().failures()
        );

        // Si la captura se cortó desde aquí, el hilo puede seguir bloqueado en una lectura
        let recovered = if failure.is_none() || reader_ended {
            reader.join()
        } else {
            reader.finish()
        };
        if let Some(sensor) = recovered {
            device.connect(sensor);
        }

        match failure {
            Some(err @ SessionError::CaptureAborted { .. }) => {
                log::warn!("❌ {}", err);
                self.presenter.speak(&self.config.messages.no_device);
                Err(err)
            }
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::presenter::RecordingPresenter;
    use crate::scorer::ScorerError;
    use crate::sensor::{encode_payload, ReplaySensor};
    use crate::store::MemoryStore;
    use crate::types::AxisSample;

    /// Puntuador de prueba: media de la ventana, contando llamadas
    #[derive(Default)]
    struct MeanScorer {
        calls: usize,
    }

    impl Scorer for MeanScorer {
        fn score(&mut self, window: &[f64]) -> Result<f64, ScorerError> {
            self.calls += 1;
            Ok(window.iter().sum::<f64>() / window.len() as f64)
        }
    }

    /// Una lectura por ciclo con los valores de los tres ejes dados
    fn payloads(x: &[i16], y: &[i16], z: &[i16]) -> Vec<Vec<u8>> {
        (0..x.len() / 5)
            .map(|c| {
                let accel: Vec<_> = (0..5)
                    .map(|i| AxisSample::new(x[c * 5 + i], y[c * 5 + i], z[c * 5 + i]))
                    .collect();
                encode_payload(&accel, &[AxisSample::default(); 5])
            })
            .collect()
    }

    fn orchestrator(cycles: usize) -> Orchestrator<MemoryStore, MeanScorer, RecordingPresenter> {
        let config = SessionConfig {
            capture_cycles: cycles,
            ..Default::default()
        };
        let store = MemoryStore::new(config.sessions());
        Orchestrator::new(config, store, MeanScorer::default(), RecordingPresenter::default()).unwrap()
    }

    #[test]
    fn test_ids_strictly_increasing() {
        let mut ids = RecordingIds::default();
        assert_eq!(ids.next_at(100), 100);
        assert_eq!(ids.next_at(100), 101);
        assert_eq!(ids.next_at(99), 102);
        assert_eq!(ids.next_at(500), 500);
    }

    #[test]
    fn test_full_session_picks_highest_row() {
        // x casi todo abajo, y casi todo arriba, z alterna
        let mut x = vec![0i16; 30];
        x[29] = 100;
        let mut y = vec![100i16; 30];
        y[0] = 0;
        let z: Vec<i16> = (0..30).map(|i| if i % 2 == 0 { 0 } else { 100 }).collect();

        let mut orch = orchestrator(6);
        let mut device = DeviceSlot::connected(ReplaySensor::from_payloads(payloads(&x, &y, &z)));

        let report = orch.analyze(&mut device).unwrap();
        assert_eq!(report.posture, Posture::Under);
        assert_eq!(report.classification.index, 1);
        assert_eq!(report.classification.windows, [2, 2, 2]);
        assert_eq!(report.recordings, 6);
        assert_eq!(report.series[1][0], 0.0);
        assert!(report.series[1][1..].iter().all(|&v| v == 1.0));
        assert_eq!(orch.current_animation(), Some(&Posture::Under.animation()));

        let messages = &orch.config().messages;
        assert_eq!(
            orch.presenter().spoken,
            vec![messages.prompt.clone(), messages.under.clone()]
        );
        assert!(device.is_connected());
    }

    #[test]
    fn test_previous_session_is_cleared() {
        let mut orch = orchestrator(3);
        let stale = Recording::new(1, vec![AxisSample::new(9, 9, 9); 5], vec![]);
        orch.store.store("analyze", stale).unwrap();

        let x: Vec<i16> = (0..15).collect();
        let mut device = DeviceSlot::connected(ReplaySensor::from_payloads(payloads(&x, &x, &x)));
        let report = orch.analyze(&mut device).unwrap();

        assert_eq!(report.recordings, 3);
        assert!(orch.store().read_all("analyze").unwrap().iter().all(|r| r.id != 1));
    }

    #[test]
    fn test_no_device_aborts_with_message() {
        let mut orch = orchestrator(5);
        let mut device: DeviceSlot<ReplaySensor> = DeviceSlot::empty();

        assert!(matches!(orch.analyze(&mut device), Err(SessionError::NoDevice)));
        let messages = &orch.config().messages;
        assert_eq!(
            orch.presenter().spoken,
            vec![messages.prompt.clone(), messages.no_device.clone()]
        );
        assert_eq!(orch.scorer().calls, 0);
    }

    #[test]
    fn test_failed_read_keeps_partial_records_and_skips_scoring() {
        let x: Vec<i16> = (0..10).collect();
        let mut orch = orchestrator(5);
        let mut device = DeviceSlot::connected(ReplaySensor::from_payloads(payloads(&x, &x, &x)));

        let err = orch.analyze(&mut device).unwrap_err();
        assert!(matches!(
            err,
            SessionError::CaptureAborted {
                written: 2,
                source: SensorError::Unavailable(_)
            }
        ));
        assert_eq!(orch.store().len("analyze"), 2);
        assert_eq!(orch.scorer().calls, 0);
        assert!(orch.current_animation().is_none());
    }

    #[test]
    fn test_motionless_capture_is_rejected() {
        let x = vec![7i16; 15];
        let mut orch = orchestrator(3);
        let mut device = DeviceSlot::connected(ReplaySensor::from_payloads(payloads(&x, &x, &x)));

        assert!(matches!(
            orch.analyze(&mut device),
            Err(SessionError::NormalizeError(NormalizeError::Axis { axis: "x", .. }))
        ));
        assert_eq!(
            orch.presenter().spoken.last(),
            Some(&orch.config().messages.no_motion)
        );
    }

    #[test]
    fn test_empty_capture() {
        let mut orch = orchestrator(0);
        let mut device = DeviceSlot::connected(ReplaySensor::default());
        assert!(matches!(
            orch.analyze(&mut device),
            Err(SessionError::EmptyRecording(_))
        ));
        assert_eq!(
            orch.presenter().spoken.last(),
            Some(&orch.config().messages.no_data)
        );
    }

    #[test]
    fn test_training_appends_without_classifying() {
        let x: Vec<i16> = (0..25).collect();
        let mut orch = orchestrator(2);
        let mut device = DeviceSlot::connected(ReplaySensor::from_payloads(payloads(&x, &x, &x)));

        assert_eq!(orch.record_training(&mut device).unwrap(), 2);
        assert_eq!(orch.record_training(&mut device).unwrap(), 2);
        assert_eq!(orch.store().len("imu"), 4);
        assert_eq!(orch.store().len("analyze"), 0);
        assert_eq!(orch.scorer().calls, 0);

        // 4 grabaciones * 5 muestras = 20 → una ventana por eje
        let classification = orch.classify_session("imu").unwrap();
        assert_eq!(classification.windows, [1, 1, 1]);
        assert_eq!(orch.scorer().calls, 3);
    }

    struct StalledSensor;

    impl MotionSensor for StalledSensor {
        fn read_value(&mut self) -> Result<Vec<u8>, SensorError> {
            std::thread::sleep(std::time::Duration::from_millis(300));
            Err(SensorError::Unavailable("sin respuesta".to_string()))
        }
    }

    #[test]
    fn test_stalled_device_times_out_and_is_dropped() {
        let config = SessionConfig {
            read_timeout_ms: 20,
            ..Default::default()
        };
        let store = MemoryStore::new(config.sessions());
        let mut orch =
            Orchestrator::new(config, store, MeanScorer::default(), RecordingPresenter::default()).unwrap();
        let mut device = DeviceSlot::connected(StalledSensor);

        assert!(matches!(
            orch.analyze(&mut device),
            Err(SessionError::CaptureAborted {
                written: 0,
                source: SensorError::Timeout(_)
            })
        ));
        assert!(!device.is_connected());
    }

    /// Primera lectura corrupta, después se cuelga
    struct GarbledThenStalledSensor {
        reads: usize,
    }

    impl MotionSensor for GarbledThenStalledSensor {
        fn read_value(&mut self) -> Result<Vec<u8>, SensorError> {
            self.reads += 1;
            if self.reads > 1 {
                std::thread::sleep(std::time::Duration::from_millis(1500));
            }
            Ok(vec![0u8; 10])
        }
    }

    #[test]
    fn test_short_payload_does_not_wait_for_stalled_reader() {
        let config = SessionConfig {
            read_timeout_ms: 20,
            capture_cycles: 3,
            ..Default::default()
        };
        let store = MemoryStore::new(config.sessions());
        let mut orch =
            Orchestrator::new(config, store, MeanScorer::default(), RecordingPresenter::default()).unwrap();
        let mut device = DeviceSlot::connected(GarbledThenStalledSensor { reads: 0 });

        let started = std::time::Instant::now();
        let result = orch.analyze(&mut device);
        assert!(started.elapsed() < std::time::Duration::from_millis(1000));
        assert!(matches!(
            result,
            Err(SessionError::CaptureAborted {
                written: 0,
                source: SensorError::ShortPayload { actual: 10, .. }
            })
        ));
        assert_eq!(orch.scorer().calls, 0);
    }
}
