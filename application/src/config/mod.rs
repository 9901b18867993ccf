//! Application configuration

mod seminar_params;

pub use seminar_params::{BrokerParams, RunParams, SeminarParams, StreamingParams};
