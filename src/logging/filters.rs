use tracing_subscriber::EnvFilter;

use crate::logging::config::LoggingConfig;

/// Фильтр из конфигурации.
///
/// `RUST_LOG` имеет приоритет над директивой из конфигурации. Некорректная
/// директива заменяется на `info`.
pub fn build_filter_from_config(config: &LoggingConfig) -> EnvFilter {
    if let Ok(env_filter) = EnvFilter::try_from_default_env() {
        return env_filter;
    }

    let directive = config.build_filter_directive();
    match EnvFilter::try_new(&directive) {
        Ok(filter) => filter,
        Err(e) => {
            eprintln!(
                "Invalid log filter directive from config ('{directive}'): {e}; falling back to 'info'"
            );
            EnvFilter::new("info")
        }
    }
}

#[cfg(test)]
mod tests {
    use std::{
        env,
        sync::{Arc, Mutex},
    };

    use serial_test::serial;
    use tracing_subscriber::{fmt, prelude::*, registry::Registry};

    use super::*;

    // Мини-буферный writer для тестов
    struct VecMakeWriter(Arc<Mutex<Vec<u8>>>);

    impl<'a> fmt::MakeWriter<'a> for VecMakeWriter {
        type Writer = VecWriterGuard;

        fn make_writer(&'a self) -> Self::Writer {
            VecWriterGuard(self.0.clone())
        }
    }

    struct VecWriterGuard(Arc<Mutex<Vec<u8>>>);

    impl std::io::Write for VecWriterGuard {
        fn write(
            &mut self,
            buf: &[u8],
        ) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    #[serial]
    fn test_config_directive_without_env() {
        env::remove_var("RUST_LOG");
        let cfg = LoggingConfig {
            level: "debug".into(),
            directives: vec!["courier::pubsub=trace".into()],
            ..Default::default()
        };
        let filter = build_filter_from_config(&cfg).to_string();
        assert!(filter.contains("debug"));
        assert!(filter.contains("courier::pubsub=trace"));
    }

    /// Тест проверяет, что `RUST_LOG` важнее директивы из конфигурации.
    #[test]
    #[serial]
    fn test_rust_log_wins_over_config() {
        env::set_var("RUST_LOG", "debug");
        let cfg = LoggingConfig {
            level: "error".into(),
            ..Default::default()
        };
        let filter = build_filter_from_config(&cfg);
        env::remove_var("RUST_LOG");

        assert_eq!(filter.to_string(), "debug");
    }

    /// Тест проверяет замену некорректной директивы на `info`.
    #[test]
    #[serial]
    fn test_invalid_directive_falls_back_to_info() {
        env::remove_var("RUST_LOG");
        let cfg = LoggingConfig {
            directives: vec!["this_is_invalid=directive!!".into()],
            ..Default::default()
        };
        assert_eq!(build_filter_from_config(&cfg).to_string(), "info");
    }

    /// Тест проверяет фильтр в runtime: при уровне "warn" сообщения info
    /// отбрасываются.
    #[test]
    #[serial]
    fn test_config_filter_drops_lower_levels() {
        env::remove_var("RUST_LOG");
        let cfg = LoggingConfig {
            level: "warn".into(),
            ..Default::default()
        };

        let buffer = Arc::new(Mutex::new(Vec::new()));
        let layer = fmt::layer()
            .with_writer(VecMakeWriter(buffer.clone()))
            .with_ansi(false)
            .with_filter(build_filter_from_config(&cfg));
        let subscriber = Registry::default().with(layer);

        tracing::subscriber::with_default(subscriber, || {
            tracing::info!("info message that should be filtered out");
            tracing::warn!("warn message that should pass through");
        });

        let out = buffer.lock().unwrap();
        let s = String::from_utf8_lossy(&out);
        assert!(s.contains("warn message that should pass through"));
        assert!(!s.contains("info message that should be filtered out"));
    }
}
