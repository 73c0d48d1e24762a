use std::sync::atomic::{AtomicU64, Ordering};

/// Счётчики брокера, общие для всех его каналов.
#[derive(Debug, Default)]
pub(crate) struct Counters {
    publishes: AtomicU64,
    deliveries: AtomicU64,
    handler_failures: AtomicU64,
    pruned: AtomicU64,
}

/// Снимок статистики брокера.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BrokerStats {
    /// Количество живых каналов в таблице.
    pub channels: usize,
    /// Общее количество публикаций (включая публикации без подписчиков).
    pub publish_count: u64,
    /// Общее количество вызовов обработчиков.
    pub delivery_count: u64,
    /// Количество публикаций, прерванных ошибкой обработчика.
    pub handler_failures: u64,
    /// Количество удалённых "мёртвых" привязок.
    pub pruned_bindings: u64,
}

impl Counters {
    pub(crate) fn record_publish(&self) {
        self.publishes.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_deliveries(
        &self,
        n: usize,
    ) {
        self.deliveries.fetch_add(n as u64, Ordering::Relaxed);
    }

    pub(crate) fn record_failure(&self) {
        self.handler_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_pruned(
        &self,
        n: usize,
    ) {
        self.pruned.fetch_add(n as u64, Ordering::Relaxed);
    }

    pub(crate) fn snapshot(
        &self,
        channels: usize,
    ) -> BrokerStats {
        BrokerStats {
            channels,
            publish_count: self.publishes.load(Ordering::Relaxed),
            delivery_count: self.deliveries.load(Ordering::Relaxed),
            handler_failures: self.handler_failures.load(Ordering::Relaxed),
            pruned_bindings: self.pruned.load(Ordering::Relaxed),
        }
    }
}
