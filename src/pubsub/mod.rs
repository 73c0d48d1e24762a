//! Подсистема Publish–Subscribe (pub/sub) для активированных объектов.
//!
//! - `broker`: реестр каналов, регистрация издателей и подписчиков.
//! - `channel`: именованная точка раздачи, хранит привязки.
//! - `binding`: привязки участников к каналам (слабые ссылки на участников).
//! - `key`: структурный ключ (канал, член) для директив.
//! - `message`: сообщение и аргументы события.
//! - `stats` (приватный): счётчики брокера.

pub mod binding;
pub mod broker;
pub mod channel;
pub mod key;
pub mod message;
mod stats;

pub use binding::*;
pub use broker::Broker;
pub use channel::Channel;
pub use key::ChannelKey;
pub use message::{Message, MessagePayload};
pub use stats::BrokerStats;
