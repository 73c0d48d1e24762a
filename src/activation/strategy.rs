use std::{
    any::Any,
    fmt,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
};

use courier_error::{BrokerError, ErrorExt};
use tracing::{debug, warn};

use super::{ActivationPlan, Directive, HookInterceptor};
use crate::pubsub::{participant, Broker, PublicationBinding, SubscriptionBinding};

/// Шаг жизненного цикла активации, который подключает объект к брокеру и
/// отключает его.
pub trait ActivationStrategy {
    /// Подключает экземпляр по плану его типа.
    ///
    /// Ошибка одной директивы не мешает остальным: она записывается в
    /// `ActivationRecord::failures`.
    fn activate<T>(
        &self,
        instance: &Arc<T>,
        plan: &ActivationPlan<T>,
    ) -> ActivationRecord
    where
        T: Any + Send + Sync;

    /// Удаляет все привязки записи. Повторный вызов ничего не делает.
    ///
    /// # Возвращает
    /// - количество удалённых привязок.
    fn deactivate(
        &self,
        record: &ActivationRecord,
    ) -> usize;
}

/// Стратегия, регистрирующая директивы плана в `Broker`.
#[derive(Debug, Clone)]
pub struct MessageBrokerStrategy {
    broker: Arc<Broker>,
}

/// Привязки, созданные одной активацией.
///
/// Уничтожение записи без `deactivate` оставляет привязки в брокере: они
/// удаляются лениво, когда уничтожается сам объект.
pub struct ActivationRecord {
    publications: Vec<Arc<PublicationBinding>>,
    subscriptions: Vec<Arc<SubscriptionBinding>>,
    failures: Vec<BrokerError>,
    deactivated: AtomicBool,
}

////////////////////////////////////////////////////////////////////////////////
// Собственные методы
////////////////////////////////////////////////////////////////////////////////

impl MessageBrokerStrategy {
    pub fn new(broker: Arc<Broker>) -> Self {
        Self { broker }
    }

    pub fn broker(&self) -> &Arc<Broker> {
        &self.broker
    }
}

impl ActivationRecord {
    pub fn publications(&self) -> &[Arc<PublicationBinding>] {
        &self.publications
    }

    pub fn subscriptions(&self) -> &[Arc<SubscriptionBinding>] {
        &self.subscriptions
    }

    /// Ошибки директив плана и ошибки регистрации в брокере.
    pub fn failures(&self) -> &[BrokerError] {
        &self.failures
    }

    /// Все директивы подключены без ошибок.
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }

    pub fn is_deactivated(&self) -> bool {
        self.deactivated.load(Ordering::Acquire)
    }
}

////////////////////////////////////////////////////////////////////////////////
// Реализации трейтов
////////////////////////////////////////////////////////////////////////////////

impl ActivationStrategy for MessageBrokerStrategy {
    fn activate<T>(
        &self,
        instance: &Arc<T>,
        plan: &ActivationPlan<T>,
    ) -> ActivationRecord
    where
        T: Any + Send + Sync,
    {
        let mut failures = plan.errors().to_vec();
        let mut publications = Vec::with_capacity(plan.publications().len());
        let mut subscriptions = Vec::with_capacity(plan.subscriptions().len());

        for entry in plan.publications() {
            let directive = entry.directive();
            let interceptor = Arc::new(HookInterceptor::new(instance, entry.accessor()));
            match self
                .broker
                .add_publication(directive.channel(), participant(instance), interceptor)
            {
                Ok(binding) => publications.push(binding),
                Err(err) => {
                    warn!(
                        ?directive,
                        code = %err.status_code(),
                        error = %err,
                        "publication not registered"
                    );
                    failures.push(err);
                }
            }
        }

        for entry in plan.subscriptions() {
            let directive = entry.directive();
            match self.broker.add_subscription(
                directive.channel(),
                participant(instance),
                entry.invoker(),
            ) {
                Ok(binding) => subscriptions.push(binding),
                Err(err) => {
                    warn!(
                        ?directive,
                        code = %err.status_code(),
                        error = %err,
                        "subscription not registered"
                    );
                    failures.push(err);
                }
            }
        }

        debug!(
            target_type = std::any::type_name::<T>(),
            publications = publications.len(),
            subscriptions = subscriptions.len(),
            failures = failures.len(),
            "instance activated"
        );

        ActivationRecord {
            publications,
            subscriptions,
            failures,
            deactivated: AtomicBool::new(false),
        }
    }

    fn deactivate(
        &self,
        record: &ActivationRecord,
    ) -> usize {
        if record.deactivated.swap(true, Ordering::AcqRel) {
            return 0;
        }

        let mut removed = 0;
        for binding in &record.publications {
            if self.broker.remove_publication(binding) {
                removed += 1;
            }
        }
        for binding in &record.subscriptions {
            if self.broker.remove_subscription(binding) {
                removed += 1;
            }
        }

        debug!(removed, "instance deactivated");
        removed
    }
}

impl fmt::Debug for ActivationRecord {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.debug_struct("ActivationRecord")
            .field("publications", &self.publications.len())
            .field("subscriptions", &self.subscriptions.len())
            .field("failures", &self.failures)
            .field("deactivated", &self.is_deactivated())
            .finish()
    }
}
