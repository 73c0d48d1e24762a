//! Логирование брокера на базе `tracing`.
//!
//! Сам брокер только эмитит события через макросы `tracing`; установка
//! подписчика остаётся за приложением (`init_logging`).

pub mod config;
mod filters;
mod formatter;
pub mod handle;

pub use self::config::{LogFormat, LoggingConfig};
pub use handle::LoggingHandle;
use tracing_subscriber::{layer::SubscriberExt, reload, util::SubscriberInitExt};

/// Инициализация логирования с конфигурацией.
///
/// Устанавливает глобальный подписчик: `EnvFilter` (через reload-слой) и
/// консольный fmt-слой. Повторный вызов возвращает ошибку.
pub fn init_logging(
    mut config: LoggingConfig
) -> Result<LoggingHandle, Box<dyn std::error::Error + Send + Sync>> {
    config.apply_env_overrides();
    config.validate()?;

    let env_filter = filters::build_filter_from_config(&config);
    let (filter_layer, reload_handle) = reload::Layer::new(env_filter);

    tracing_subscriber::registry()
        .with(filter_layer)
        .with(formatter::build_formatter_from_config(&config))
        .try_init()?;

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        log_level = %config.level,
        log_format = %config.format,
        "Logging system initialized"
    );

    Ok(LoggingHandle::new(reload_handle))
}

#[cfg(test)]
mod tests {
    use serial_test::serial;

    use super::*;

    /// Тест проверяет, что некорректная конфигурация отклоняется до установки
    /// подписчика.
    #[test]
    #[serial]
    fn test_init_logging_rejects_invalid_level() {
        std::env::remove_var("COURIER_LOG_LEVEL");
        let cfg = LoggingConfig {
            level: "chatty".into(),
            ..Default::default()
        };
        assert!(init_logging(cfg).is_err());
    }

    /// Тест проверяет установку подписчика и запрет повторной установки.
    #[test]
    #[serial]
    fn test_init_logging_once() {
        std::env::remove_var("COURIER_LOG_LEVEL");
        std::env::remove_var("COURIER_LOG_FORMAT");

        let handle = init_logging(LoggingConfig::default()).unwrap();
        assert!(handle.current_filter().is_some());
        handle.set_level("warn").unwrap();

        assert!(init_logging(LoggingConfig::default()).is_err());
    }
}
