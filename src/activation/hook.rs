use std::{
    any::Any,
    fmt,
    sync::{Arc, Weak},
};

use courier_error::DispatchError;
use parking_lot::RwLock;

use crate::pubsub::{BindingId, EventInterceptor, MessagePayload, RaiseForwarder};

/// "Родное" событие издателя.
///
/// Издатель хранит `EventHook` полем и поднимает событие через `raise`.
/// Пока объект не активирован, у события нет пересыльщиков и `raise` ничего
/// не делает.
#[derive(Default)]
pub struct EventHook {
    forwarders: RwLock<Vec<Arc<dyn RaiseForwarder>>>,
}

/// Адаптер, подключающий привязку публикации к `EventHook` объекта `T`.
///
/// Хранит объект слабой ссылкой: если издатель уже уничтожен, подключение и
/// отключение ничего не делают.
pub struct HookInterceptor<T> {
    target: Weak<T>,
    accessor: fn(&T) -> &EventHook,
}

impl EventHook {
    pub fn new() -> Self {
        Self::default()
    }

    /// Поднимает событие: payload уходит во все подключённые каналы.
    ///
    /// # Возвращает
    /// - суммарное количество вызванных обработчиков;
    /// - первую ошибку обработчика. Оставшиеся каналы при этом не получают
    ///   сообщение.
    pub fn raise(
        &self,
        payload: impl Into<MessagePayload>,
    ) -> Result<usize, DispatchError> {
        let payload = payload.into();
        let snapshot = self.forwarders.read().clone();

        let mut delivered = 0;
        for forwarder in snapshot {
            delivered += forwarder.forward(&payload)?;
        }
        Ok(delivered)
    }

    pub fn forwarder_count(&self) -> usize {
        self.forwarders.read().len()
    }

    /// Подключено ли событие хотя бы к одному каналу.
    pub fn is_wired(&self) -> bool {
        !self.forwarders.read().is_empty()
    }
}

impl<T> HookInterceptor<T>
where
    T: Any + Send + Sync,
{
    pub fn new(
        target: &Arc<T>,
        accessor: fn(&T) -> &EventHook,
    ) -> Self {
        Self {
            target: Arc::downgrade(target),
            accessor,
        }
    }
}

impl EventInterceptor for EventHook {
    fn attach(
        &self,
        forwarder: Arc<dyn RaiseForwarder>,
    ) {
        let mut forwarders = self.forwarders.write();
        if forwarders.iter().all(|f| f.id() != forwarder.id()) {
            forwarders.push(forwarder);
        }
    }

    fn detach(
        &self,
        id: BindingId,
    ) {
        self.forwarders.write().retain(|f| f.id() != id);
    }
}

impl<T> EventInterceptor for HookInterceptor<T>
where
    T: Any + Send + Sync,
{
    fn attach(
        &self,
        forwarder: Arc<dyn RaiseForwarder>,
    ) {
        if let Some(target) = self.target.upgrade() {
            (self.accessor)(target.as_ref()).attach(forwarder);
        }
    }

    fn detach(
        &self,
        id: BindingId,
    ) {
        if let Some(target) = self.target.upgrade() {
            (self.accessor)(target.as_ref()).detach(id);
        }
    }
}

impl fmt::Debug for EventHook {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.debug_struct("EventHook")
            .field("forwarders", &self.forwarder_count())
            .finish()
    }
}
