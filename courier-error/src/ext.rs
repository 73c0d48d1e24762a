use std::error::Error;

use crate::StatusCode;

/// Расширение для ошибок брокера.
///
/// Каждая ошибка крейта относится к одному [`StatusCode`]: по нему
/// вызывающая сторона различает ошибки регистрации и сбои доставки, не
/// разбирая конкретный тип.
pub trait ErrorExt: Error + Send + Sync + 'static {
    /// Статус-код ошибки.
    fn status_code(&self) -> StatusCode;
}
