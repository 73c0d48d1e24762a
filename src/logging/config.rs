use std::{env, fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

const VALID_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// Формат вывода консольного слоя.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Compact,
    Pretty,
    Json,
}

/// Настройки логирования.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Базовый уровень (`trace`..`error`).
    pub level: String,
    pub format: LogFormat,
    pub with_ansi: bool,
    pub with_target: bool,
    pub with_thread_ids: bool,
    pub with_line_numbers: bool,
    /// Дополнительные директивы `EnvFilter`, например `courier::pubsub=trace`.
    pub directives: Vec<String>,
}

impl LoggingConfig {
    /// Переопределяет уровень и формат из `COURIER_LOG_LEVEL` и
    /// `COURIER_LOG_FORMAT`.
    ///
    /// Нераспознанный формат игнорируется, уровень проверяется в `validate`.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(level) = env::var("COURIER_LOG_LEVEL") {
            self.level = level.trim().to_lowercase();
        }
        if let Ok(format) = env::var("COURIER_LOG_FORMAT") {
            if let Ok(format) = format.parse() {
                self.format = format;
            }
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !VALID_LEVELS.contains(&self.level.as_str()) {
            return Err(ConfigError::Invalid(format!(
                "unknown log level '{}', expected one of {}",
                self.level,
                VALID_LEVELS.join(", ")
            )));
        }
        if let Some(empty) = self.directives.iter().position(|d| d.trim().is_empty()) {
            return Err(ConfigError::Invalid(format!(
                "log directive #{empty} is empty"
            )));
        }
        Ok(())
    }

    /// Собирает строку директив для `EnvFilter`: базовый уровень и
    /// дополнительные директивы через запятую.
    pub fn build_filter_directive(&self) -> String {
        let mut parts = Vec::with_capacity(self.directives.len() + 1);
        parts.push(self.level.clone());
        parts.extend(self.directives.iter().map(|d| d.trim().to_string()));
        parts.join(",")
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Compact,
            with_ansi: true,
            with_target: true,
            with_thread_ids: false,
            with_line_numbers: false,
            directives: Vec::new(),
        }
    }
}

impl FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::Invalid(format!("unknown log format '{other}'"))),
        }
    }
}

impl fmt::Display for LogFormat {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        let s = match self {
            Self::Compact => "compact",
            Self::Pretty => "pretty",
            Self::Json => "json",
        };
        f.write_str(s)
    }
}
