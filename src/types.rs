/// Una lectura de 3 ejes tal como la entrega el sensor (i16 con signo)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct AxisSample {
    pub x: i16,
    pub y: i16,
    pub z: i16,
}

impl AxisSample {
    pub fn new(x: i16, y: i16, z: i16) -> Self {
        Self { x, y, z }
    }

    /// Norma euclídea del vector
    pub fn magnitude(&self) -> f64 {
        let (x, y, z) = (self.x as f64, self.y as f64, self.z as f64);
        (x * x + y * y + z * z).sqrt()
    }
}

/// Clave de una grabación: timestamp de creación en milisegundos
pub type RecordingId = u64;

/// Una grabación: todas las muestras de un ciclo de lectura
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Recording {
    pub id: RecordingId,
    pub accelerometer: Vec<AxisSample>,
    pub gyroscope: Vec<AxisSample>,
}

impl Recording {
    pub fn new(id: RecordingId, accelerometer: Vec<AxisSample>, gyroscope: Vec<AxisSample>) -> Self {
        Self {
            id,
            accelerometer,
            gyroscope,
        }
    }
}

/// Las tres series de aceleración [x, y, z] de una sesión
pub type AxisSeries = [Vec<f64>; 3];

/// Constantes del sistema
pub const SAMPLES_PER_READ: usize = 5; // muestras por lectura BLE
pub const BYTES_PER_SAMPLE: usize = 12; // 6 valores i16: acc xyz + gyro xyz
pub const PAYLOAD_LEN: usize = SAMPLES_PER_READ * BYTES_PER_SAMPLE; // 60
pub const SAMPLES_PER_RECORDING: usize = 5; // muestras usadas por grabación al reconstruir series
pub const WINDOW_SIZE: usize = 15;
pub const NUM_AXES: usize = 3;
pub const NUM_CLASSES: usize = 3;
pub const GRAVITY: f64 = 9.81; // m/s²
