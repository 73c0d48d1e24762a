use std::sync::Arc;

/// Идентичность пары (канал, член) для директив и привязок.
///
/// Ключ структурный: имя канала и имя члена хранятся раздельно, поэтому
/// пары `("AB", "C")` и `("A", "BC")` дают разные ключи. Используется только
/// для сравнения и поиска, наружу не выводится.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChannelKey {
    channel: Arc<str>,
    member: Arc<str>,
}

impl ChannelKey {
    pub fn new(
        channel: impl Into<Arc<str>>,
        member: impl Into<Arc<str>>,
    ) -> Self {
        Self {
            channel: channel.into(),
            member: member.into(),
        }
    }

    /// Имя канала, из которого построен ключ.
    pub fn channel(&self) -> &str {
        &self.channel
    }

    /// Имя события или метода-обработчика.
    pub fn member(&self) -> &str {
        &self.member
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    /// Тест проверяет детерминированность: одинаковые входы дают равные ключи.
    #[test]
    fn test_equal_inputs_equal_keys() {
        let a = ChannelKey::new("Ping", "Fired");
        let b = ChannelKey::new(String::from("Ping"), "Fired");
        assert_eq!(a, b);

        let mut set = HashSet::new();
        set.insert(a);
        assert!(set.contains(&b));
    }

    /// Тест проверяет, что склейка без разделителя не порождает коллизий.
    #[test]
    fn test_no_concatenation_collision() {
        let a = ChannelKey::new("AB", "C");
        let b = ChannelKey::new("A", "BC");
        assert_ne!(a, b);
    }

    #[test]
    fn test_accessors() {
        let key = ChannelKey::new("Ping", "on_ping");
        assert_eq!(key.channel(), "Ping");
        assert_eq!(key.member(), "on_ping");
    }
}
