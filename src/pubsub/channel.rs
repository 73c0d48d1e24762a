use std::{
    collections::HashMap,
    fmt,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
};

use courier_error::{DispatchError, ErrorExt};
use parking_lot::RwLock;
use tracing::{debug, trace, warn};

use super::{
    stats::Counters, BindingId, Delivery, Message, PublicationBinding, SubscriptionBinding,
};

/// Именованная точка раздачи сообщений.
///
/// Хранит привязки издателей и подписчиков. Число издателей и подписчиков
/// ничем не связано: канал может иметь подписчиков без издателей и
/// наоборот.
///
/// # Конкурентность
/// Каждое множество привязок защищено своим `RwLock`. `publish` берёт
/// снимок подписчиков и отпускает блокировку до вызова обработчиков, поэтому
/// обработчик может публиковать в этот же канал или отписываться без
/// взаимоблокировки.
pub struct Channel {
    name: Arc<str>,
    publishers: RwLock<HashMap<BindingId, Arc<PublicationBinding>>>,
    subscribers: RwLock<HashMap<BindingId, Arc<SubscriptionBinding>>>,
    closed: AtomicBool,
    counters: Arc<Counters>,
}

////////////////////////////////////////////////////////////////////////////////
// Собственные методы
////////////////////////////////////////////////////////////////////////////////

impl Channel {
    /// Имя уже проверено брокером и не бывает пустым.
    pub(crate) fn new(
        name: Arc<str>,
        counters: Arc<Counters>,
    ) -> Self {
        Self {
            name,
            publishers: RwLock::new(HashMap::new()),
            subscribers: RwLock::new(HashMap::new()),
            closed: AtomicBool::new(false),
            counters,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn name_arc(&self) -> Arc<str> {
        self.name.clone()
    }

    pub fn publisher_count(&self) -> usize {
        self.publishers.read().len()
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.read().len()
    }

    /// Нет ни издателей, ни подписчиков.
    pub fn is_empty(&self) -> bool {
        self.publishers.read().is_empty() && self.subscribers.read().is_empty()
    }

    /// Канал закрыт через `Broker::close_channel` или `Broker::clear`.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Снимок текущих привязок подписчиков.
    pub fn subscriptions(&self) -> Vec<Arc<SubscriptionBinding>> {
        self.subscribers.read().values().cloned().collect()
    }

    /// Снимок текущих привязок издателей.
    pub fn publications(&self) -> Vec<Arc<PublicationBinding>> {
        self.publishers.read().values().cloned().collect()
    }

    /// Доставляет сообщение каждому текущему подписчику.
    ///
    /// Порядок доставки не определён. Подписчики, которые уже уничтожены,
    /// пропускаются и удаляются из канала в этом же проходе. Привязки
    /// уничтоженных издателей удаляются перед доставкой.
    ///
    /// # Возвращает
    /// - количество вызванных обработчиков;
    /// - `DispatchError::HandlerFailure`, если обработчик вернул ошибку.
    ///   Остальные подписчики к этому моменту могли уже получить сообщение.
    pub fn publish(
        &self,
        message: &Message,
    ) -> Result<usize, DispatchError> {
        self.counters.record_publish();
        detach_all(&self.take_stale_publishers());

        let snapshot = self.subscriptions();
        if snapshot.is_empty() {
            trace!(channel = %self.name, "publish to channel without subscribers");
            return Ok(0);
        }

        let mut delivered = 0;
        let mut stale = Vec::new();

        for binding in snapshot {
            match binding.notify(message) {
                Ok(Delivery::Delivered) => delivered += 1,
                Ok(Delivery::Stale) => stale.push(binding.id()),
                Ok(Delivery::Inactive) => {}
                Err(err) => {
                    self.counters.record_deliveries(delivered);
                    self.counters.record_failure();
                    self.drop_subscribers(&stale);
                    warn!(
                        channel = %self.name,
                        handler = binding.handler_name(),
                        code = %err.status_code(),
                        error = %err,
                        "subscriber handler failed"
                    );
                    return Err(err);
                }
            }
        }

        self.counters.record_deliveries(delivered);
        self.drop_subscribers(&stale);

        trace!(channel = %self.name, delivered, "message dispatched");
        Ok(delivered)
    }

    pub(crate) fn insert_publisher(
        &self,
        binding: Arc<PublicationBinding>,
    ) {
        self.publishers.write().insert(binding.id(), binding);
    }

    pub(crate) fn insert_subscriber(
        &self,
        binding: Arc<SubscriptionBinding>,
    ) {
        self.subscribers.write().insert(binding.id(), binding);
    }

    pub(crate) fn remove_publisher(
        &self,
        id: BindingId,
    ) -> bool {
        self.publishers.write().remove(&id).is_some()
    }

    pub(crate) fn remove_subscriber(
        &self,
        id: BindingId,
    ) -> bool {
        self.subscribers.write().remove(&id).is_some()
    }

    /// Удаляет привязки, участники которых уничтожены, и отключает события
    /// уничтоженных издателей.
    ///
    /// Вызывается без удержания guard'а таблицы брокера: `detach` обращается к
    /// пользовательскому `EventInterceptor`.
    ///
    /// # Возвращает
    /// - количество удалённых привязок.
    pub(crate) fn prune_stale(&self) -> usize {
        let dead_pubs = self.take_stale_publishers();
        detach_all(&dead_pubs);
        self.prune_stale_subscribers() + dead_pubs.len()
    }

    /// Удаляет привязки уничтоженных подписчиков. Пользовательский код не
    /// вызывается.
    pub(crate) fn prune_stale_subscribers(&self) -> usize {
        let dead: Vec<BindingId> = self
            .subscribers
            .read()
            .values()
            .filter(|b| !b.is_alive())
            .map(|b| b.id())
            .collect();
        self.drop_subscribers(&dead)
    }

    /// Вынимает из канала привязки уничтоженных издателей и переводит их в
    /// `Removed`.
    ///
    /// События не отключаются: вызывающий передаёт результат в `detach_all`,
    /// когда не держит блокировок брокера.
    pub(crate) fn take_stale_publishers(&self) -> Vec<Arc<PublicationBinding>> {
        if self.publishers.read().values().all(|b| b.is_alive()) {
            return Vec::new();
        }

        let removed: Vec<_> = {
            let mut publishers = self.publishers.write();
            let ids: Vec<BindingId> = publishers
                .values()
                .filter(|b| !b.is_alive())
                .map(|b| b.id())
                .collect();
            ids.iter().filter_map(|id| publishers.remove(id)).collect()
        };
        for binding in &removed {
            binding.mark_removed();
        }

        if !removed.is_empty() {
            self.counters.record_pruned(removed.len());
            debug!(channel = %self.name, pruned = removed.len(), "stale publishers pruned");
        }
        removed
    }

    /// Закрывает канал: все привязки переходят в `Removed`, события издателей
    /// отключаются.
    pub(crate) fn close(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }

        let subscribers: Vec<_> = self.subscribers.write().drain().map(|(_, b)| b).collect();
        let publishers: Vec<_> = self.publishers.write().drain().map(|(_, b)| b).collect();

        for binding in &subscribers {
            binding.mark_removed();
        }
        for binding in &publishers {
            binding.mark_removed();
            binding.detach();
        }

        debug!(
            channel = %self.name,
            subscribers = subscribers.len(),
            publishers = publishers.len(),
            "channel closed"
        );
    }

    fn drop_subscribers(
        &self,
        ids: &[BindingId],
    ) -> usize {
        if ids.is_empty() {
            return 0;
        }

        let removed: Vec<_> = {
            let mut subscribers = self.subscribers.write();
            ids.iter().filter_map(|id| subscribers.remove(id)).collect()
        };
        for binding in &removed {
            binding.mark_removed();
        }

        if !removed.is_empty() {
            self.counters.record_pruned(removed.len());
            debug!(channel = %self.name, pruned = removed.len(), "stale subscribers pruned");
        }
        removed.len()
    }
}

/// Отключает привязки издателей от их событий.
pub(crate) fn detach_all(bindings: &[Arc<PublicationBinding>]) {
    for binding in bindings {
        binding.detach();
    }
}

impl fmt::Debug for Channel {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.debug_struct("Channel")
            .field("name", &self.name)
            .field("publishers", &self.publisher_count())
            .field("subscribers", &self.subscriber_count())
            .field("closed", &self.is_closed())
            .finish()
    }
}
