//! Настройки брокера и логирования.

pub mod settings;

pub use settings::{BrokerConfig, Settings};
