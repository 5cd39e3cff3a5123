//! Clasificación de la postura de un golpe de golf a partir de un sensor IMU
//! de muñeca: captura, almacenamiento, normalización, clasificación por
//! ventanas y presentación del resultado.

pub mod classifier;
pub mod config;
pub mod force;
pub mod normalize;
pub mod presenter;
pub mod reshape;
pub mod scorer;
pub mod sensor;
pub mod session;
pub mod store;
pub mod types;
