/// Жизненный цикл активации: директивы, события, планы и стратегии.
pub mod activation;
/// Загрузка настроек (крейт `config`): секции брокера и логирования.
pub mod config;
/// Ошибки брокера из `courier-error` и ошибки настроек.
pub mod error;
/// Настройка логирования поверх `tracing-subscriber`.
pub mod logging;
/// Ядро Pub/Sub: Broker, Channel, привязки, Message.
pub mod pubsub;

// -----------------------------------------------------------------------------
//  Часто используемые публичные типы
// -----------------------------------------------------------------------------

/// API активации.
pub use activation::{
    ActivationPlan, ActivationRecord, ActivationStrategy, Directive, EventHook, EventInfo,
    MessageBrokerStrategy, MethodInfo, PublicationDirective, SubscriptionDirective,
};
/// Настройки.
pub use self::config::{BrokerConfig, Settings};
/// Ошибки операций.
pub use error::{
    BrokerError, ConfigError, DispatchError, ErrorExt, HandlerError, MemberKind, StatusCode,
};
/// Логирование.
pub use logging::{init_logging, LogFormat, LoggingConfig, LoggingHandle};
/// API Pub/Sub.
pub use pubsub::{
    participant, BindingState, Broker, BrokerStats, Channel, ChannelKey, HandlerInvoker, Message,
    MessagePayload, PublicationBinding, SubscriptionBinding,
};
