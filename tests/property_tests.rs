//! Property-based tests для ключей директив и доставки сообщений.

use std::{
    collections::HashSet,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
};

use proptest::prelude::*;

use courier::{
    participant, Broker, ChannelKey, Directive, HandlerInvoker, Message, MethodInfo,
    SubscriptionDirective,
};

const PROPTEST_CASES: u32 = 256;

fn name() -> impl Strategy<Value = String> {
    "[A-Za-z0-9_.]{1,12}"
}

#[derive(Default)]
struct Counter {
    hits: AtomicUsize,
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(PROPTEST_CASES))]

    /// Равные входы дают равные ключи.
    #[test]
    fn prop_key_is_deterministic(channel in name(), member in name()) {
        let a = SubscriptionDirective::new(channel.clone(), Some(MethodInfo::new(member.clone()))).unwrap();
        let b = SubscriptionDirective::new(channel.clone(), Some(MethodInfo::new(member.clone()))).unwrap();
        prop_assert_eq!(a.key(), b.key());
        prop_assert_eq!(a.key(), &ChannelKey::new(channel, member));
    }

    /// Ключи равны тогда и только тогда, когда совпадают обе части, даже
    /// если склейка строк совпадает.
    #[test]
    fn prop_key_equality_is_structural(
        c1 in name(), m1 in name(), c2 in name(), m2 in name()
    ) {
        let k1 = ChannelKey::new(c1.clone(), m1.clone());
        let k2 = ChannelKey::new(c2.clone(), m2.clone());
        prop_assert_eq!(k1 == k2, c1 == c2 && m1 == m2);
    }

    /// Каждый живой подписчик получает публикацию ровно один раз, удалённые
    /// не получают ничего.
    #[test]
    fn prop_exactly_once_delivery(
        subscribers in 1usize..20,
        removed in proptest::collection::hash_set(0usize..20, 0..10),
    ) {
        let broker = Broker::new();
        let counters: Vec<Arc<Counter>> =
            (0..subscribers).map(|_| Arc::new(Counter::default())).collect();
        let invoker = HandlerInvoker::typed("count", |c: &Counter, _m: &Message| {
            c.hits.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });

        let bindings: Vec<_> = counters
            .iter()
            .map(|c| broker.add_subscription("Ping", participant(c), invoker.clone()).unwrap())
            .collect();

        let removed: HashSet<usize> = removed.into_iter().filter(|i| *i < subscribers).collect();
        for i in &removed {
            broker.remove_subscription(&bindings[*i]);
        }

        let delivered = broker.publish("Ping", "x").unwrap();
        prop_assert_eq!(delivered, subscribers - removed.len());

        for (i, c) in counters.iter().enumerate() {
            let expected = usize::from(!removed.contains(&i));
            prop_assert_eq!(c.hits.load(Ordering::SeqCst), expected);
        }
    }
}
