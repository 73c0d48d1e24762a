//! Подключение активированных объектов к брокеру.
//!
//! Тип объекта описывается `ActivationPlan`: какие события публикуются в
//! какие каналы и какие методы подписаны на какие каналы. При активации
//! экземпляра `MessageBrokerStrategy` превращает план в привязки брокера, при
//! деактивации удаляет их.
//!
//! - `directive`: директивы публикации и подписки, ключ (канал, член).
//! - `hook`: событие издателя (`EventHook`) и адаптер перехвата.
//! - `plan`: план активации типа.
//! - `strategy`: шаг жизненного цикла активации.

pub mod directive;
pub mod hook;
pub mod plan;
pub mod strategy;

pub use directive::{Directive, EventInfo, MethodInfo, PublicationDirective, SubscriptionDirective};
pub use hook::{EventHook, HookInterceptor};
pub use plan::{ActivationPlan, PlanBuilder, PublicationEntry, SubscriptionEntry};
pub use strategy::{ActivationRecord, ActivationStrategy, MessageBrokerStrategy};
