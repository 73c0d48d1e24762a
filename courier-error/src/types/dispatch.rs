use std::{error::Error as StdError, fmt};

use thiserror::Error;

use crate::{ErrorExt, StatusCode};

type BoxedSource = Box<dyn StdError + Send + Sync + 'static>;

/// Ошибка, которую вернул обработчик подписчика.
///
/// Брокер её не перехватывает: она оборачивается в
/// [`DispatchError::HandlerFailure`] и возвращается издателю.
pub struct HandlerError {
    message: String,
    source: Option<BoxedSource>,
}

/// Ошибки доставки сообщения подписчикам.
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("handler '{handler}' on channel '{channel}' failed: {source}")]
    HandlerFailure {
        channel: String,
        handler: String,
        #[source]
        source: HandlerError,
    },
}

////////////////////////////////////////////////////////////////////////////////
// Собственные методы
////////////////////////////////////////////////////////////////////////////////

impl HandlerError {
    /// Создаёт ошибку с текстовым сообщением.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            source: None,
        }
    }

    /// Оборачивает произвольную ошибку обработчика.
    pub fn from_source<E>(err: E) -> Self
    where
        E: StdError + Send + Sync + 'static,
    {
        Self {
            message: err.to_string(),
            source: Some(Box::new(err)),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl DispatchError {
    /// Канал, на котором произошёл сбой.
    pub fn channel(&self) -> &str {
        match self {
            Self::HandlerFailure { channel, .. } => channel,
        }
    }

    /// Имя обработчика, вернувшего ошибку.
    pub fn handler(&self) -> &str {
        match self {
            Self::HandlerFailure { handler, .. } => handler,
        }
    }
}

////////////////////////////////////////////////////////////////////////////////
// Реализации трейтов
////////////////////////////////////////////////////////////////////////////////

impl fmt::Debug for HandlerError {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.debug_struct("HandlerError")
            .field("message", &self.message)
            .field("has_source", &self.source.is_some())
            .finish()
    }
}

impl fmt::Display for HandlerError {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl StdError for HandlerError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.source
            .as_ref()
            .map(|s| &**s as &(dyn StdError + 'static))
    }
}

impl From<String> for HandlerError {
    fn from(message: String) -> Self {
        Self::new(message)
    }
}

impl From<&str> for HandlerError {
    fn from(message: &str) -> Self {
        Self::new(message)
    }
}

/// Вложенная публикация из обработчика может вернуть ошибку через `?`.
impl From<DispatchError> for HandlerError {
    fn from(err: DispatchError) -> Self {
        Self::from_source(err)
    }
}

impl ErrorExt for HandlerError {
    fn status_code(&self) -> StatusCode {
        StatusCode::HandlerFailed
    }
}

impl ErrorExt for DispatchError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::HandlerFailure { .. } => StatusCode::HandlerFailed,
        }
    }
}
