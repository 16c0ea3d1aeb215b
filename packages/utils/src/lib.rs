pub mod context;
pub mod serde;
pub mod telemetry;
