pub mod broker;
pub mod dispatch;

// Публичный экспорт всех типов ошибок из вложенных модулей, чтобы упростить
// доступ к ним из внешнего кода.
pub use broker::*;
pub use dispatch::*;
