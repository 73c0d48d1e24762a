//! Привязки издателей и подписчиков к каналам.
//!
//! Привязка хранит участника только слабой ссылкой (`Weak`), поэтому
//! участие в брокере никогда не продлевает жизнь объекта. Время жизни
//! объекта определяет его владелец (контейнер активации).
//!
//! Жизненный цикл привязки: `Active -> Removed`. Состояние `Removed`
//! терминально, повторная активация создаёт новую привязку.

use std::{
    any::Any,
    fmt,
    sync::{
        atomic::{AtomicBool, AtomicU64, Ordering},
        Arc, Weak,
    },
};

use courier_error::{DispatchError, HandlerError};

use super::{Channel, Message, MessagePayload};

/// Слабая ссылка на участника (издателя или подписчика).
pub type ParticipantRef = Weak<dyn Any + Send + Sync>;

type InvokeFn = dyn Fn(&(dyn Any + Send + Sync), &Message) -> Result<(), HandlerError> + Send + Sync;

static NEXT_BINDING_ID: AtomicU64 = AtomicU64::new(1);

/// Уникальный идентификатор привязки в пределах процесса.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BindingId(u64);

/// Состояние привязки.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindingState {
    Active,
    Removed,
}

/// Результат доставки одному подписчику.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// Обработчик вызван.
    Delivered,
    /// Подписчик уже уничтожен, привязку нужно удалить.
    Stale,
    /// Привязка удалена, обработчик не вызывается.
    Inactive,
}

/// Вызывает метод-обработчик подписчика.
#[derive(Clone)]
pub struct HandlerInvoker {
    name: Arc<str>,
    func: Arc<InvokeFn>,
}

/// Точка перехвата "родного" события издателя.
///
/// Брокер передаёт сюда привязку публикации при регистрации и забирает её
/// при удалении.
pub trait EventInterceptor: Send + Sync {
    /// Подключает пересыльщик к событию издателя.
    fn attach(
        &self,
        forwarder: Arc<dyn RaiseForwarder>,
    );

    /// Отключает пересыльщик. Неизвестный `id` игнорируется.
    fn detach(
        &self,
        id: BindingId,
    );
}

/// Пересылает поднятое событие издателя в канал.
pub trait RaiseForwarder: Send + Sync {
    fn id(&self) -> BindingId;

    /// Доставляет payload подписчикам канала.
    ///
    /// # Возвращает
    /// - количество подписчиков, получивших сообщение.
    fn forward(
        &self,
        payload: &MessagePayload,
    ) -> Result<usize, DispatchError>;
}

/// Привязка подписчика к каналу.
pub struct SubscriptionBinding {
    id: BindingId,
    channel_name: Arc<str>,
    channel: Weak<Channel>,
    subscriber: ParticipantRef,
    invoker: HandlerInvoker,
    removed: AtomicBool,
}

/// Привязка события издателя к каналу.
pub struct PublicationBinding {
    id: BindingId,
    channel_name: Arc<str>,
    channel: Weak<Channel>,
    publisher: ParticipantRef,
    interceptor: Arc<dyn EventInterceptor>,
    removed: AtomicBool,
}

////////////////////////////////////////////////////////////////////////////////
// Собственные методы
////////////////////////////////////////////////////////////////////////////////

/// Слабая ссылка на участника для регистрации в брокере.
pub fn participant<T: Any + Send + Sync>(instance: &Arc<T>) -> ParticipantRef {
    let weak: Weak<T> = Arc::downgrade(instance);
    weak
}

impl BindingId {
    pub(crate) fn next() -> Self {
        Self(NEXT_BINDING_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl HandlerInvoker {
    /// Обработчик над нетипизированным подписчиком.
    pub fn new<F>(
        name: impl Into<Arc<str>>,
        func: F,
    ) -> Self
    where
        F: Fn(&(dyn Any + Send + Sync), &Message) -> Result<(), HandlerError>
            + Send
            + Sync
            + 'static,
    {
        Self {
            name: name.into(),
            func: Arc::new(func),
        }
    }

    /// Обработчик-метод подписчика конкретного типа `T`.
    ///
    /// Если подписчик окажется другого типа, вызов вернёт `HandlerError`.
    pub fn typed<T, F>(
        name: impl Into<Arc<str>>,
        method: F,
    ) -> Self
    where
        T: Any + Send + Sync,
        F: Fn(&T, &Message) -> Result<(), HandlerError> + Send + Sync + 'static,
    {
        let name = name.into();
        let method_name = name.clone();
        Self::new(name, move |target, message| {
            let target = target.downcast_ref::<T>().ok_or_else(|| {
                HandlerError::new(format!(
                    "subscriber of handler '{method_name}' is not a {}",
                    std::any::type_name::<T>()
                ))
            })?;
            method(target, message)
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn invoke(
        &self,
        target: &(dyn Any + Send + Sync),
        message: &Message,
    ) -> Result<(), HandlerError> {
        (self.func)(target, message)
    }
}

impl SubscriptionBinding {
    pub(crate) fn new(
        channel: &Arc<Channel>,
        subscriber: ParticipantRef,
        invoker: HandlerInvoker,
    ) -> Self {
        Self {
            id: BindingId::next(),
            channel_name: channel.name_arc(),
            channel: Arc::downgrade(channel),
            subscriber,
            invoker,
            removed: AtomicBool::new(false),
        }
    }

    pub fn id(&self) -> BindingId {
        self.id
    }

    pub fn channel_name(&self) -> &str {
        &self.channel_name
    }

    /// Канал привязки, если он ещё существует.
    pub fn channel(&self) -> Option<Arc<Channel>> {
        self.channel.upgrade()
    }

    pub fn handler_name(&self) -> &str {
        self.invoker.name()
    }

    pub fn state(&self) -> BindingState {
        if self.removed.load(Ordering::Acquire) {
            BindingState::Removed
        } else {
            BindingState::Active
        }
    }

    /// Привязка активна и подписчик ещё жив.
    pub fn is_alive(&self) -> bool {
        self.state() == BindingState::Active && self.subscriber.strong_count() > 0
    }

    /// Вызывает обработчик подписчика.
    ///
    /// Ошибка обработчика не перехватывается и возвращается как
    /// [`DispatchError::HandlerFailure`].
    pub fn notify(
        &self,
        message: &Message,
    ) -> Result<Delivery, DispatchError> {
        if self.state() == BindingState::Removed {
            return Ok(Delivery::Inactive);
        }
        let Some(target) = self.subscriber.upgrade() else {
            return Ok(Delivery::Stale);
        };

        self.invoker
            .invoke(&*target, message)
            .map_err(|source| DispatchError::HandlerFailure {
                channel: self.channel_name.to_string(),
                handler: self.invoker.name().to_string(),
                source,
            })?;

        Ok(Delivery::Delivered)
    }

    /// Переводит привязку в `Removed`.
    ///
    /// # Возвращает
    /// - `true`, если привязка была активна (первое удаление).
    pub(crate) fn mark_removed(&self) -> bool {
        !self.removed.swap(true, Ordering::AcqRel)
    }
}

impl PublicationBinding {
    pub(crate) fn new(
        channel: &Arc<Channel>,
        publisher: ParticipantRef,
        interceptor: Arc<dyn EventInterceptor>,
    ) -> Self {
        Self {
            id: BindingId::next(),
            channel_name: channel.name_arc(),
            channel: Arc::downgrade(channel),
            publisher,
            interceptor,
            removed: AtomicBool::new(false),
        }
    }

    pub fn id(&self) -> BindingId {
        self.id
    }

    pub fn channel_name(&self) -> &str {
        &self.channel_name
    }

    pub fn channel(&self) -> Option<Arc<Channel>> {
        self.channel.upgrade()
    }

    pub fn state(&self) -> BindingState {
        if self.removed.load(Ordering::Acquire) {
            BindingState::Removed
        } else {
            BindingState::Active
        }
    }

    pub fn is_alive(&self) -> bool {
        self.state() == BindingState::Active && self.publisher.strong_count() > 0
    }

    /// Вызывается адаптером, когда издатель поднимает событие.
    ///
    /// Удалённая привязка, уничтоженный издатель или закрытый канал дают
    /// `Ok(0)`: такой вызов ничего не доставляет и не является ошибкой.
    pub fn raise(
        &self,
        payload: impl Into<MessagePayload>,
    ) -> Result<usize, DispatchError> {
        if self.state() == BindingState::Removed || self.publisher.strong_count() == 0 {
            return Ok(0);
        }
        let Some(channel) = self.channel.upgrade() else {
            return Ok(0);
        };

        let message = Message::from_sender(
            self.channel_name.clone(),
            payload.into(),
            self.publisher.clone(),
        );
        channel.publish(&message)
    }

    pub(crate) fn interceptor(&self) -> &Arc<dyn EventInterceptor> {
        &self.interceptor
    }

    pub(crate) fn mark_removed(&self) -> bool {
        !self.removed.swap(true, Ordering::AcqRel)
    }

    /// Отключает привязку от события издателя.
    pub(crate) fn detach(&self) {
        self.interceptor.detach(self.id);
    }
}

////////////////////////////////////////////////////////////////////////////////
// Реализации трейтов
////////////////////////////////////////////////////////////////////////////////

impl RaiseForwarder for PublicationBinding {
    fn id(&self) -> BindingId {
        self.id
    }

    fn forward(
        &self,
        payload: &MessagePayload,
    ) -> Result<usize, DispatchError> {
        self.raise(payload.clone())
    }
}

impl fmt::Debug for HandlerInvoker {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.debug_struct("HandlerInvoker")
            .field("name", &self.name)
            .finish()
    }
}

impl fmt::Debug for SubscriptionBinding {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.debug_struct("SubscriptionBinding")
            .field("id", &self.id)
            .field("channel", &self.channel_name)
            .field("handler", &self.invoker.name())
            .field("state", &self.state())
            .finish()
    }
}

impl fmt::Debug for PublicationBinding {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.debug_struct("PublicationBinding")
            .field("id", &self.id)
            .field("channel", &self.channel_name)
            .field("state", &self.state())
            .finish()
    }
}
