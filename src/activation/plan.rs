use std::{any::Any, collections::HashSet, fmt, sync::Arc};

use courier_error::{BrokerError, ErrorExt, HandlerError};
use tracing::{debug, warn};

use super::{
    Directive, EventHook, EventInfo, MethodInfo, PublicationDirective, SubscriptionDirective,
};
use crate::pubsub::{ChannelKey, HandlerInvoker, Message};

type HandlerFn<T> = Arc<dyn Fn(&T, &Message) -> Result<(), HandlerError> + Send + Sync>;

/// Публикация события типа `T`: директива и доступ к полю-событию.
pub struct PublicationEntry<T> {
    directive: PublicationDirective,
    accessor: fn(&T) -> &EventHook,
}

/// Подписка метода типа `T`: директива и сам обработчик.
pub struct SubscriptionEntry<T> {
    directive: SubscriptionDirective,
    handler: HandlerFn<T>,
}

/// Набор директив для объектов типа `T`.
///
/// План строится один раз на тип и применяется к каждому активируемому
/// экземпляру через `ActivationStrategy`. Некорректные директивы не попадают
/// в план, а сохраняются в `errors`: остальные директивы подключаются как
/// обычно.
pub struct ActivationPlan<T> {
    publications: Vec<PublicationEntry<T>>,
    subscriptions: Vec<SubscriptionEntry<T>>,
    errors: Vec<BrokerError>,
}

/// Построитель `ActivationPlan`.
///
/// Повторы отслеживаются отдельно для публикаций и подписок: событие и
/// метод с одинаковым именем в одном канале не конфликтуют.
pub struct PlanBuilder<T> {
    plan: ActivationPlan<T>,
    seen_publications: HashSet<ChannelKey>,
    seen_subscriptions: HashSet<ChannelKey>,
}

////////////////////////////////////////////////////////////////////////////////
// Собственные методы
////////////////////////////////////////////////////////////////////////////////

impl<T> PublicationEntry<T> {
    pub fn directive(&self) -> &PublicationDirective {
        &self.directive
    }

    pub fn hook<'a>(
        &self,
        target: &'a T,
    ) -> &'a EventHook {
        (self.accessor)(target)
    }

    pub(crate) fn accessor(&self) -> fn(&T) -> &EventHook {
        self.accessor
    }
}

impl<T> SubscriptionEntry<T>
where
    T: Any + Send + Sync,
{
    pub fn directive(&self) -> &SubscriptionDirective {
        &self.directive
    }

    /// Обработчик в виде `HandlerInvoker` для регистрации в брокере.
    pub fn invoker(&self) -> HandlerInvoker {
        let handler = self.handler.clone();
        HandlerInvoker::typed(self.directive.member().to_string(), move |target: &T, message| {
            handler(target, message)
        })
    }
}

impl<T> ActivationPlan<T>
where
    T: Any + Send + Sync,
{
    pub fn builder() -> PlanBuilder<T> {
        PlanBuilder {
            plan: ActivationPlan {
                publications: Vec::new(),
                subscriptions: Vec::new(),
                errors: Vec::new(),
            },
            seen_publications: HashSet::new(),
            seen_subscriptions: HashSet::new(),
        }
    }

    pub fn publications(&self) -> &[PublicationEntry<T>] {
        &self.publications
    }

    pub fn subscriptions(&self) -> &[SubscriptionEntry<T>] {
        &self.subscriptions
    }

    /// Ошибки директив, отброшенных при построении.
    pub fn errors(&self) -> &[BrokerError] {
        &self.errors
    }

    /// В плане нет ни одной корректной директивы.
    pub fn is_empty(&self) -> bool {
        self.publications.is_empty() && self.subscriptions.is_empty()
    }
}

impl<T> PlanBuilder<T>
where
    T: Any + Send + Sync,
{
    /// Публиковать событие `event` объекта в канал `channel`.
    ///
    /// Пустое имя события означает отсутствующий член (`MissingMember`).
    pub fn publish(
        self,
        channel: &str,
        event: &str,
        accessor: fn(&T) -> &EventHook,
    ) -> Self {
        let event = (!event.is_empty()).then(|| EventInfo::new(event));
        match PublicationDirective::new(channel, event) {
            Ok(directive) => self.publish_directive(directive, accessor),
            Err(err) => self.reject(err),
        }
    }

    /// Подписать метод `method` объекта на канал `channel`.
    ///
    /// Пустое имя метода означает отсутствующий член (`MissingMember`).
    pub fn subscribe<F>(
        self,
        channel: &str,
        method: &str,
        handler: F,
    ) -> Self
    where
        F: Fn(&T, &Message) -> Result<(), HandlerError> + Send + Sync + 'static,
    {
        let method = (!method.is_empty()).then(|| MethodInfo::new(method));
        match SubscriptionDirective::new(channel, method) {
            Ok(directive) => self.subscribe_directive(directive, handler),
            Err(err) => self.reject(err),
        }
    }

    /// Добавляет готовую директиву публикации. Повтор пары (канал, событие)
    /// игнорируется.
    pub fn publish_directive(
        mut self,
        directive: PublicationDirective,
        accessor: fn(&T) -> &EventHook,
    ) -> Self {
        if self.seen_publications.insert(directive.key().clone()) {
            self.plan.publications.push(PublicationEntry {
                directive,
                accessor,
            });
        } else {
            debug!(?directive, "duplicate publication directive ignored");
        }
        self
    }

    /// Добавляет готовую директиву подписки. Повтор пары (канал, метод)
    /// игнорируется.
    pub fn subscribe_directive<F>(
        mut self,
        directive: SubscriptionDirective,
        handler: F,
    ) -> Self
    where
        F: Fn(&T, &Message) -> Result<(), HandlerError> + Send + Sync + 'static,
    {
        if self.seen_subscriptions.insert(directive.key().clone()) {
            self.plan.subscriptions.push(SubscriptionEntry {
                directive,
                handler: Arc::new(handler),
            });
        } else {
            debug!(?directive, "duplicate subscription directive ignored");
        }
        self
    }

    pub fn build(self) -> ActivationPlan<T> {
        debug!(
            target_type = std::any::type_name::<T>(),
            publications = self.plan.publications.len(),
            subscriptions = self.plan.subscriptions.len(),
            errors = self.plan.errors.len(),
            "activation plan built"
        );
        self.plan
    }

    fn reject(
        mut self,
        err: BrokerError,
    ) -> Self {
        warn!(
            target_type = std::any::type_name::<T>(),
            code = %err.status_code(),
            error = %err,
            "invalid broker directive skipped"
        );
        self.plan.errors.push(err);
        self
    }
}

impl<T> fmt::Debug for ActivationPlan<T> {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.debug_struct("ActivationPlan")
            .field(
                "publications",
                &self.publications.iter().map(|e| &e.directive).collect::<Vec<_>>(),
            )
            .field(
                "subscriptions",
                &self.subscriptions.iter().map(|e| &e.directive).collect::<Vec<_>>(),
            )
            .field("errors", &self.errors)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use courier_error::MemberKind;

    use super::*;

    #[derive(Default)]
    struct Node {
        fired: EventHook,
    }

    fn fired(node: &Node) -> &EventHook {
        &node.fired
    }

    #[test]
    fn test_builder_collects_directives() {
        let plan = ActivationPlan::<Node>::builder()
            .publish("Ping", "fired", fired)
            .subscribe("Pong", "on_pong", |_n: &Node, _m: &Message| Ok(()))
            .build();

        assert_eq!(plan.publications().len(), 1);
        assert_eq!(plan.subscriptions().len(), 1);
        assert!(plan.errors().is_empty());
        assert_eq!(plan.publications()[0].directive().key(), &ChannelKey::new("Ping", "fired"));
    }

    /// Тест проверяет, что некорректные директивы записываются как ошибки и
    /// не мешают остальным.
    #[test]
    fn test_invalid_directives_are_recorded() {
        let plan = ActivationPlan::<Node>::builder()
            .publish("", "fired", fired)
            .subscribe("Ping", "", |_n: &Node, _m: &Message| Ok(()))
            .subscribe("Ping", "on_ping", |_n: &Node, _m: &Message| Ok(()))
            .build();

        assert_eq!(plan.subscriptions().len(), 1);
        assert!(plan.publications().is_empty());
        assert_eq!(
            plan.errors(),
            &[
                BrokerError::InvalidChannelName,
                BrokerError::MissingMember {
                    channel: "Ping".to_string(),
                    kind: MemberKind::Handler,
                },
            ]
        );
    }

    #[test]
    fn test_duplicate_directive_is_ignored() {
        let plan = ActivationPlan::<Node>::builder()
            .publish("Ping", "fired", fired)
            .publish("Ping", "fired", fired)
            .build();
        assert_eq!(plan.publications().len(), 1);
    }

    /// Тест проверяет, что событие и обработчик с одним именем в одном канале
    /// попадают в план оба.
    #[test]
    fn test_same_member_name_for_event_and_handler() {
        let plan = ActivationPlan::<Node>::builder()
            .publish("Ping", "relay", fired)
            .subscribe("Ping", "relay", |_n: &Node, _m: &Message| Ok(()))
            .subscribe("Ping", "relay", |_n: &Node, _m: &Message| Ok(()))
            .build();

        assert_eq!(plan.publications().len(), 1);
        assert_eq!(plan.subscriptions().len(), 1);
        assert!(plan.errors().is_empty());
    }

    /// Тест проверяет, что invoker вызывает обработчик с конкретным типом.
    #[test]
    fn test_subscription_entry_invoker() {
        let plan = ActivationPlan::<Node>::builder()
            .subscribe("Ping", "on_ping", |_n: &Node, m: &Message| {
                if m.payload.as_str() == Some("bad") {
                    return Err(HandlerError::new("bad payload"));
                }
                Ok(())
            })
            .build();
        let invoker = plan.subscriptions()[0].invoker();
        let node = Node::default();

        assert_eq!(invoker.name(), "on_ping");
        assert!(invoker.invoke(&node, &Message::new("Ping", "ok")).is_ok());
        assert!(invoker.invoke(&node, &Message::new("Ping", "bad")).is_err());
    }

    #[test]
    fn test_publication_entry_hook_accessor() {
        let plan = ActivationPlan::<Node>::builder()
            .publish("Ping", "fired", fired)
            .build();
        let node = Node::default();
        assert!(std::ptr::eq(plan.publications()[0].hook(&node), &node.fired));
    }
}
