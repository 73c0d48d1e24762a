use std::fmt;

use tracing_subscriber::{reload, EnvFilter, Registry};

use crate::error::ConfigError;

/// Handle установленного логирования.
///
/// Позволяет менять фильтр уровней без переустановки подписчика.
pub struct LoggingHandle {
    filter: reload::Handle<EnvFilter, Registry>,
}

impl LoggingHandle {
    pub(crate) fn new(filter: reload::Handle<EnvFilter, Registry>) -> Self {
        Self { filter }
    }

    /// Заменяет активный фильтр директивой вида `"debug"` или
    /// `"info,courier::pubsub=trace"`.
    pub fn set_level(
        &self,
        directive: &str,
    ) -> Result<(), ConfigError> {
        let filter = EnvFilter::try_new(directive).map_err(|e| {
            ConfigError::Invalid(format!("invalid log filter directive '{directive}': {e}"))
        })?;
        self.filter
            .reload(filter)
            .map_err(|e| ConfigError::Invalid(format!("failed to reload log filter: {e}")))?;

        tracing::info!(directive, "log filter updated");
        Ok(())
    }

    /// Текущая директива фильтра, если подписчик ещё жив.
    pub fn current_filter(&self) -> Option<String> {
        self.filter.with_current(|f| f.to_string()).ok()
    }
}

impl fmt::Debug for LoggingHandle {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.debug_struct("LoggingHandle")
            .field("filter", &self.current_filter())
            .finish()
    }
}
