use std::{fmt, sync::Arc};

use courier_error::{BrokerError, MemberKind};
use once_cell::sync::OnceCell;

use crate::pubsub::ChannelKey;

/// Описание события издателя.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EventInfo {
    name: Arc<str>,
}

/// Описание метода-обработчика подписчика.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MethodInfo {
    name: Arc<str>,
}

/// Общий интерфейс директив публикации и подписки.
pub trait Directive: fmt::Debug + Send + Sync {
    fn channel(&self) -> &str;

    /// Имя события или метода.
    fn member(&self) -> &str;

    fn kind(&self) -> MemberKind;

    /// Ключ (канал, член). Вычисляется при первом обращении и далее
    /// возвращается та же ссылка.
    fn key(&self) -> &ChannelKey;
}

/// Директива "событие объекта публикуется в канал".
pub struct PublicationDirective {
    channel: Arc<str>,
    event: EventInfo,
    key: OnceCell<ChannelKey>,
}

/// Директива "метод объекта подписан на канал".
pub struct SubscriptionDirective {
    channel: Arc<str>,
    method: MethodInfo,
    key: OnceCell<ChannelKey>,
}

////////////////////////////////////////////////////////////////////////////////
// Собственные методы
////////////////////////////////////////////////////////////////////////////////

impl EventInfo {
    pub fn new(name: impl Into<Arc<str>>) -> Self {
        Self { name: name.into() }
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl MethodInfo {
    pub fn new(name: impl Into<Arc<str>>) -> Self {
        Self { name: name.into() }
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl PublicationDirective {
    /// # Ошибки
    /// - `BrokerError::InvalidChannelName`, если канал пустой;
    /// - `BrokerError::MissingMember`, если событие не указано.
    pub fn new(
        channel: impl Into<Arc<str>>,
        event: Option<EventInfo>,
    ) -> Result<Self, BrokerError> {
        let channel = validate_channel(channel.into())?;
        let event = event.ok_or_else(|| BrokerError::MissingMember {
            channel: channel.to_string(),
            kind: MemberKind::Event,
        })?;
        Ok(Self {
            channel,
            event,
            key: OnceCell::new(),
        })
    }

    pub fn event(&self) -> &EventInfo {
        &self.event
    }
}

impl SubscriptionDirective {
    /// # Ошибки
    /// - `BrokerError::InvalidChannelName`, если канал пустой;
    /// - `BrokerError::MissingMember`, если метод не указан.
    pub fn new(
        channel: impl Into<Arc<str>>,
        method: Option<MethodInfo>,
    ) -> Result<Self, BrokerError> {
        let channel = validate_channel(channel.into())?;
        let method = method.ok_or_else(|| BrokerError::MissingMember {
            channel: channel.to_string(),
            kind: MemberKind::Handler,
        })?;
        Ok(Self {
            channel,
            method,
            key: OnceCell::new(),
        })
    }

    pub fn method(&self) -> &MethodInfo {
        &self.method
    }
}

fn validate_channel(channel: Arc<str>) -> Result<Arc<str>, BrokerError> {
    if channel.is_empty() {
        return Err(BrokerError::InvalidChannelName);
    }
    Ok(channel)
}

////////////////////////////////////////////////////////////////////////////////
// Реализации трейтов
////////////////////////////////////////////////////////////////////////////////

impl Directive for PublicationDirective {
    fn channel(&self) -> &str {
        &self.channel
    }

    fn member(&self) -> &str {
        self.event.name()
    }

    fn kind(&self) -> MemberKind {
        MemberKind::Event
    }

    fn key(&self) -> &ChannelKey {
        self.key
            .get_or_init(|| ChannelKey::new(self.channel.clone(), self.event.name.clone()))
    }
}

impl Directive for SubscriptionDirective {
    fn channel(&self) -> &str {
        &self.channel
    }

    fn member(&self) -> &str {
        self.method.name()
    }

    fn kind(&self) -> MemberKind {
        MemberKind::Handler
    }

    fn key(&self) -> &ChannelKey {
        self.key
            .get_or_init(|| ChannelKey::new(self.channel.clone(), self.method.name.clone()))
    }
}

impl fmt::Debug for PublicationDirective {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.debug_struct("PublicationDirective")
            .field("channel", &self.channel)
            .field("event", &self.event.name())
            .finish()
    }
}

impl fmt::Debug for SubscriptionDirective {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.debug_struct("SubscriptionDirective")
            .field("channel", &self.channel)
            .field("method", &self.method.name())
            .finish()
    }
}
