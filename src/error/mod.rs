pub mod config;

pub use self::config::ConfigError;
// Ошибки брокера живут в отдельном крейте, чтобы их могли использовать
// адаптеры без зависимости от самого брокера.
pub use courier_error::{
    BrokerError, DispatchError, ErrorExt, HandlerError, MemberKind, StatusCode,
};
