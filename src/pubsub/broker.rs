use std::sync::Arc;

use courier_error::{BrokerError, DispatchError};
use dashmap::DashMap;
use tracing::{debug, trace};

use super::{
    channel::detach_all, stats::Counters, BrokerStats, BindingState, Channel, EventInterceptor, HandlerInvoker,
    Message, MessagePayload, ParticipantRef, PublicationBinding, RaiseForwarder,
    SubscriptionBinding,
};
use crate::config::BrokerConfig;

/// Реестр каналов.
///
/// Владеет таблицей каналов; каналы владеют привязками; привязки ссылаются на
/// участников слабо. Брокер создаётся явно и разделяется через `Arc<Broker>`.
///
/// # Конкурентность
/// Таблица каналов: шардированная `DashMap`. Создание канала идёт через
/// entry API, поэтому конкурентные вызовы с одним именем видят один и тот же
/// экземпляр. Привязка вставляется в канал, пока удерживается guard записи
/// таблицы: удаление пустого канала и вставка не пересекаются. Порядок
/// блокировок всегда "шард таблицы -> блокировка канала".
pub struct Broker {
    /// Имя канала → канал
    channels: DashMap<Arc<str>, Arc<Channel>>,
    config: BrokerConfig,
    counters: Arc<Counters>,
}

////////////////////////////////////////////////////////////////////////////////
// Собственные методы
////////////////////////////////////////////////////////////////////////////////

impl Broker {
    pub fn new() -> Self {
        Self::with_config(BrokerConfig::default())
    }

    pub fn with_config(config: BrokerConfig) -> Self {
        Self {
            channels: DashMap::new(),
            config,
            counters: Arc::new(Counters::default()),
        }
    }

    pub fn config(&self) -> &BrokerConfig {
        &self.config
    }

    /// Возвращает канал по имени, создавая его при первом обращении.
    ///
    /// # Ошибки
    /// - `BrokerError::InvalidChannelName`, если имя пустое.
    pub fn resolve_channel(
        &self,
        name: &str,
    ) -> Result<Arc<Channel>, BrokerError> {
        let key = Self::validate_name(name)?;
        if let Some(existing) = self.channels.get(name) {
            return Ok(existing.value().clone());
        }
        let entry = self.channels.entry(key.clone()).or_insert_with(|| self.new_channel(key));
        Ok(entry.value().clone())
    }

    /// Канал по имени без создания.
    pub fn channel(
        &self,
        name: &str,
    ) -> Option<Arc<Channel>> {
        self.channels.get(name).map(|entry| entry.value().clone())
    }

    /// Имена всех каналов таблицы (порядок не определён).
    pub fn channel_names(&self) -> Vec<String> {
        self.channels.iter().map(|entry| entry.key().to_string()).collect()
    }

    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    /// Регистрирует событие издателя в канале.
    ///
    /// После вставки привязка подключается к событию через `interceptor`:
    /// с этого момента каждое поднятие события публикуется в канал. Привязки
    /// уничтоженных издателей этого канала удаляются заодно.
    pub fn add_publication(
        &self,
        name: &str,
        publisher: ParticipantRef,
        interceptor: Arc<dyn EventInterceptor>,
    ) -> Result<Arc<PublicationBinding>, BrokerError> {
        let key = Self::validate_name(name)?;

        let (binding, stale) = {
            let entry = self.channels.entry(key.clone()).or_insert_with(|| self.new_channel(key));
            let binding = Arc::new(PublicationBinding::new(entry.value(), publisher, interceptor));
            entry.value().insert_publisher(binding.clone());
            (binding, entry.value().take_stale_publishers())
        };

        // Подключение и отключение идут вне guard'а таблицы: адаптер может сам
        // обращаться к брокеру.
        detach_all(&stale);
        binding.interceptor().attach(binding.clone() as Arc<dyn RaiseForwarder>);
        if binding.state() == BindingState::Removed {
            // Канал закрыли между вставкой и подключением.
            binding.detach();
        }

        debug!(channel = name, binding = binding.id().as_u64(), "publication added");
        Ok(binding)
    }

    /// Регистрирует метод-обработчик подписчика в канале.
    ///
    /// # Ошибки
    /// - `BrokerError::InvalidChannelName`, если имя пустое;
    /// - `BrokerError::SubscriberLimitExceeded`, если у канала уже
    ///   `max_subscribers_per_channel` живых подписчиков.
    pub fn add_subscription(
        &self,
        name: &str,
        subscriber: ParticipantRef,
        invoker: HandlerInvoker,
    ) -> Result<Arc<SubscriptionBinding>, BrokerError> {
        let key = Self::validate_name(name)?;

        let entry = self.channels.entry(key.clone()).or_insert_with(|| self.new_channel(key));
        let channel = entry.value();

        if let Some(limit) = self.config.max_subscribers_per_channel {
            if channel.subscriber_count() >= limit {
                channel.prune_stale_subscribers();
            }
            if channel.subscriber_count() >= limit {
                return Err(BrokerError::SubscriberLimitExceeded {
                    channel: name.to_string(),
                    limit,
                });
            }
        }

        let binding = Arc::new(SubscriptionBinding::new(channel, subscriber, invoker));
        channel.insert_subscriber(binding.clone());
        drop(entry);

        debug!(
            channel = name,
            binding = binding.id().as_u64(),
            handler = binding.handler_name(),
            "subscription added"
        );
        Ok(binding)
    }

    /// Удаляет привязку издателя. Повторный вызов ничего не делает.
    ///
    /// # Возвращает
    /// - `true`, если привязка была активна.
    pub fn remove_publication(
        &self,
        binding: &PublicationBinding,
    ) -> bool {
        if !binding.mark_removed() {
            return false;
        }
        binding.detach();
        if let Some(channel) = binding.channel() {
            channel.remove_publisher(binding.id());
        }
        self.prune_if_empty(binding.channel_name());

        trace!(
            channel = binding.channel_name(),
            binding = binding.id().as_u64(),
            "publication removed"
        );
        true
    }

    /// Удаляет привязку подписчика. Повторный вызов ничего не делает.
    ///
    /// Доставка, уже начатая до удаления, может ещё вызвать обработчик,
    /// следующие публикации его не вызовут.
    pub fn remove_subscription(
        &self,
        binding: &SubscriptionBinding,
    ) -> bool {
        if !binding.mark_removed() {
            return false;
        }
        if let Some(channel) = binding.channel() {
            channel.remove_subscriber(binding.id());
        }
        self.prune_if_empty(binding.channel_name());

        trace!(
            channel = binding.channel_name(),
            binding = binding.id().as_u64(),
            "subscription removed"
        );
        true
    }

    /// Публикует сообщение в канал без издателя.
    ///
    /// Несуществующий канал не создаётся, публикация возвращает `Ok(0)`.
    /// Канал, который опустел после удаления устаревших привязок, удаляется
    /// из таблицы.
    ///
    /// # Возвращает
    /// - количество вызванных обработчиков;
    /// - `DispatchError::HandlerFailure`, если обработчик вернул ошибку.
    pub fn publish(
        &self,
        channel: &str,
        payload: impl Into<MessagePayload>,
    ) -> Result<usize, DispatchError> {
        // Guard таблицы отпускается до вызова обработчиков.
        let Some(target) = self.channel(channel) else {
            self.counters.record_publish();
            trace!(channel, "publish to unknown channel");
            return Ok(0);
        };
        let result = target.publish(&Message::new(target.name_arc(), payload));
        if target.is_empty() {
            self.prune_if_empty(target.name());
        }
        result
    }

    /// Закрывает канал и удаляет его из таблицы.
    ///
    /// Все привязки канала переходят в `Removed`, события издателей
    /// отключаются.
    pub fn close_channel(
        &self,
        name: &str,
    ) -> bool {
        match self.channels.remove(name) {
            Some((_, channel)) => {
                channel.close();
                true
            }
            None => false,
        }
    }

    /// Удаляет привязки уничтоженных участников во всех каналах.
    ///
    /// Пустые каналы удаляются, если это разрешено конфигурацией.
    ///
    /// # Возвращает
    /// - количество удалённых привязок.
    pub fn prune(&self) -> usize {
        let channels: Vec<Arc<Channel>> =
            self.channels.iter().map(|entry| entry.value().clone()).collect();

        let mut pruned = 0;
        for channel in &channels {
            pruned += channel.prune_stale();
            self.prune_if_empty(channel.name());
        }

        if pruned > 0 {
            debug!(pruned, channels = self.channels.len(), "broker pruned");
        }
        pruned
    }

    /// Закрывает все каналы.
    pub fn clear(&self) {
        let names: Vec<Arc<str>> = self.channels.iter().map(|entry| entry.key().clone()).collect();
        for name in &names {
            self.close_channel(name);
        }
        debug!(closed = names.len(), "broker cleared");
    }

    pub fn stats(&self) -> BrokerStats {
        self.counters.snapshot(self.channels.len())
    }

    fn validate_name(name: &str) -> Result<Arc<str>, BrokerError> {
        if name.is_empty() {
            return Err(BrokerError::InvalidChannelName);
        }
        Ok(Arc::from(name))
    }

    fn new_channel(
        &self,
        name: Arc<str>,
    ) -> Arc<Channel> {
        debug!(channel = %name, "channel created");
        Arc::new(Channel::new(name, self.counters.clone()))
    }

    fn prune_if_empty(
        &self,
        name: &str,
    ) {
        if !self.config.prune_empty_channels {
            return;
        }
        if self.channels.remove_if(name, |_, ch| ch.is_empty()).is_some() {
            trace!(channel = name, "empty channel pruned");
        }
    }
}

////////////////////////////////////////////////////////////////////////////////
// Общие реализации трейтов
////////////////////////////////////////////////////////////////////////////////

impl Default for Broker {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Broker {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        f.debug_struct("Broker")
            .field("channels", &self.channels.len())
            .field("config", &self.config)
            .finish()
    }
}

////////////////////////////////////////////////////////////////////////////////
// Тесты
////////////////////////////////////////////////////////////////////////////////
