use std::path::Path;

use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};

use crate::{error::ConfigError, logging::LoggingConfig};

/// Префикс переменных окружения, например
/// `COURIER_BROKER__MAX_SUBSCRIBERS_PER_CHANNEL=64`.
pub const ENV_PREFIX: &str = "COURIER";

/// Имя необязательного файла настроек в рабочем каталоге (без расширения).
pub const DEFAULT_CONFIG_FILE: &str = "courier";

/// Поведение брокера.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BrokerConfig {
    /// Удалять канал из таблицы, когда в нём не осталось привязок.
    pub prune_empty_channels: bool,
    /// Ограничение числа подписчиков одного канала (`None` без ограничения).
    pub max_subscribers_per_channel: Option<usize>,
}

/// Все настройки приложения.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub broker: BrokerConfig,
    pub logging: LoggingConfig,
}

impl BrokerConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_subscribers_per_channel == Some(0) {
            return Err(ConfigError::Invalid(
                "broker.max_subscribers_per_channel must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }
}

impl Settings {
    /// Загружает настройки: значения по умолчанию, файл `courier.*` (если
    /// есть) и переменные окружения с префиксом `COURIER_`.
    pub fn load() -> Result<Self, ConfigError> {
        Self::build(File::with_name(DEFAULT_CONFIG_FILE).required(false))
    }

    /// То же, что `load`, но с явным путём к файлу. Файл обязателен.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        Self::build(File::from(path.as_ref()).required(true))
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.broker.validate()?;
        self.logging.validate()
    }

    fn build<S>(file: S) -> Result<Self, ConfigError>
    where
        S: config::Source + Send + Sync + 'static,
    {
        let cfg = Config::builder()
            .add_source(file)
            // Переменные окружения с префиксом COURIER_, вложенность через "__"
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let settings: Settings = cfg.try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            prune_empty_channels: true,
            max_subscribers_per_channel: None,
        }
    }
}
