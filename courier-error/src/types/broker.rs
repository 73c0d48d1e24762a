use std::fmt;

use thiserror::Error;

use crate::{ErrorExt, StatusCode};

/// Вид члена, на который ссылается директива.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MemberKind {
    /// Событие издателя (publication).
    Event,
    /// Метод-обработчик подписчика (subscription).
    Handler,
}

/// Ошибки регистрации: построение директив и разрешение каналов.
///
/// Такая ошибка фатальна только для одной попытки регистрации: объект не
/// подключается к каналу, остальные директивы и активации не затрагиваются.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BrokerError {
    #[error("channel name must not be empty")]
    InvalidChannelName,

    #[error("{kind} directive for channel '{channel}' has no member")]
    MissingMember { channel: String, kind: MemberKind },

    #[error("subscriber limit ({limit}) exceeded for channel {channel}")]
    SubscriberLimitExceeded { channel: String, limit: usize },
}

impl fmt::Display for MemberKind {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        match self {
            Self::Event => write!(f, "publication"),
            Self::Handler => write!(f, "subscription"),
        }
    }
}

impl ErrorExt for BrokerError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidChannelName => StatusCode::InvalidChannelName,
            Self::MissingMember { .. } => StatusCode::MissingMember,
            Self::SubscriberLimitExceeded { .. } => StatusCode::SubscriberLimitExceeded,
        }
    }
}
