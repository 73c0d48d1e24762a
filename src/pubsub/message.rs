use std::{
    any::Any,
    fmt,
    sync::{Arc, Weak},
};

use bytes::Bytes;
use serde::{de::DeserializeOwned, Serialize};

/// Аргументы события, которые издатель отправляет в канал.
#[derive(Clone, Default)]
pub enum MessagePayload {
    /// Событие без аргументов.
    #[default]
    Empty,
    /// Сырые байты.
    Bytes(Bytes),
    /// UTF-8 строка.
    String(String),
    /// Структурированные данные.
    Json(serde_json::Value),
    /// Произвольный типизированный объект (downcast на стороне подписчика).
    Any(Arc<dyn Any + Send + Sync>),
}

/// Сообщение, доставляемое подписчику.
#[derive(Clone)]
pub struct Message {
    /// Канал, по которому пришло сообщение.
    pub channel: Arc<str>,
    /// Аргументы события.
    pub payload: MessagePayload,
    /// Издатель, если сообщение пришло через привязку публикации.
    sender: Option<Weak<dyn Any + Send + Sync>>,
}

////////////////////////////////////////////////////////////////////////////////
// Собственные методы
////////////////////////////////////////////////////////////////////////////////

impl MessagePayload {
    /// Сериализует значение в JSON-payload.
    pub fn json<T: Serialize>(value: &T) -> serde_json::Result<Self> {
        serde_json::to_value(value).map(Self::Json)
    }

    /// Оборачивает типизированный объект.
    pub fn any<T: Any + Send + Sync>(value: T) -> Self {
        Self::Any(Arc::new(value))
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Self::Empty)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            Self::Bytes(b) => std::str::from_utf8(b).ok(),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Self::Bytes(b) => Some(b),
            Self::String(s) => Some(s.as_bytes()),
            _ => None,
        }
    }

    pub fn as_json(&self) -> Option<&serde_json::Value> {
        match self {
            Self::Json(v) => Some(v),
            _ => None,
        }
    }

    /// Ссылка на типизированный объект из варианта `Any`.
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        match self {
            Self::Any(v) => v.downcast_ref::<T>(),
            _ => None,
        }
    }

    /// Десериализует payload из JSON, строки или байтов.
    ///
    /// # Возвращает
    /// - `None`, если вариант не содержит данных или они не разбираются в `T`.
    pub fn deserialize<T: DeserializeOwned>(&self) -> Option<T> {
        match self {
            Self::Json(v) => serde_json::from_value(v.clone()).ok(),
            Self::String(s) => serde_json::from_str(s).ok(),
            Self::Bytes(b) => serde_json::from_slice(b).ok(),
            Self::Empty | Self::Any(_) => None,
        }
    }
}

impl Message {
    /// Сообщение без издателя (прямой вызов `Broker::publish`).
    pub fn new(
        channel: impl Into<Arc<str>>,
        payload: impl Into<MessagePayload>,
    ) -> Self {
        Self {
            channel: channel.into(),
            payload: payload.into(),
            sender: None,
        }
    }

    /// Сообщение, поднятое событием издателя.
    ///
    /// Издатель хранится слабой ссылкой: сообщение, сохранённое подписчиком,
    /// не продлевает ему жизнь.
    pub fn from_sender(
        channel: impl Into<Arc<str>>,
        payload: impl Into<MessagePayload>,
        sender: Weak<dyn Any + Send + Sync>,
    ) -> Self {
        Self {
            channel: channel.into(),
            payload: payload.into(),
            sender: Some(sender),
        }
    }

    /// Возвращает издателя, если он жив и имеет тип `T`.
    pub fn sender<T: Any + Send + Sync>(&self) -> Option<Arc<T>> {
        let sender = self.sender.as_ref()?.upgrade()?;
        sender.downcast::<T>().ok()
    }

    /// Было ли сообщение поднято событием издателя.
    pub fn has_sender(&self) -> bool {
        self.sender.is_some()
    }

    /// Типизированные аргументы события из payload `Any`.
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.payload.downcast_ref()
    }
}

////////////////////////////////////////////////////////////////////////////////
// Общие реализации трейтов
////////////////////////////////////////////////////////////////////////////////

impl fmt::Debug for MessagePayload {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        match self {
            Self::Empty => write!(f, "Empty"),
            Self::Bytes(b) => f.debug_tuple("Bytes").field(b).finish(),
            Self::String(s) => f.debug_tuple("String").field(s).finish(),
            Self::Json(v) => f.debug_tuple("Json").field(v).finish(),
            Self::Any(_) => write!(f, "Any(..)"),
        }
    }
}

impl fmt::Debug for Message {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.debug_struct("Message")
            .field("channel", &self.channel)
            .field("payload", &self.payload)
            .field("has_sender", &self.has_sender())
            .finish()
    }
}

impl From<&str> for MessagePayload {
    fn from(s: &str) -> Self {
        Self::String(s.to_string())
    }
}

impl From<String> for MessagePayload {
    fn from(s: String) -> Self {
        Self::String(s)
    }
}

impl From<Bytes> for MessagePayload {
    fn from(b: Bytes) -> Self {
        Self::Bytes(b)
    }
}

impl From<Vec<u8>> for MessagePayload {
    fn from(v: Vec<u8>) -> Self {
        Self::Bytes(Bytes::from(v))
    }
}

impl From<serde_json::Value> for MessagePayload {
    fn from(v: serde_json::Value) -> Self {
        Self::Json(v)
    }
}

impl From<()> for MessagePayload {
    fn from(_: ()) -> Self {
        Self::Empty
    }
}
