use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::json;

use courier::{
    participant, ActivationPlan, ActivationStrategy, Broker, EventHook, HandlerError,
    HandlerInvoker, Message, MessageBrokerStrategy, MessagePayload, StatusCode,
};
use courier_error::ErrorExt;

#[derive(Debug, PartialEq, Serialize, Deserialize)]
struct Ping {
    msg: String,
}

#[derive(Default)]
struct Recorder {
    received: Mutex<Vec<MessagePayload>>,
}

impl Recorder {
    fn on_message(
        &self,
        message: &Message,
    ) -> Result<(), HandlerError> {
        self.received.lock().push(message.payload.clone());
        Ok(())
    }

    fn count(&self) -> usize {
        self.received.lock().len()
    }
}

#[derive(Default)]
struct Publisher {
    fired: EventHook,
}

fn recorder_invoker() -> HandlerInvoker {
    HandlerInvoker::typed("on_message", Recorder::on_message)
}

/// Тест проверяет сценарий "Ping": доставка ровно один раз, после удаления
/// подписки обработчик не вызывается и ошибки нет.
#[test]
fn test_ping_scenario() -> Result<(), Box<dyn std::error::Error>> {
    let broker = Broker::new();
    let a = Arc::new(Recorder::default());
    let binding = broker.add_subscription("Ping", participant(&a), recorder_invoker())?;

    let delivered = broker.publish("Ping", MessagePayload::json(&Ping { msg: "x".into() })?)?;
    assert_eq!(delivered, 1);
    {
        let received = a.received.lock();
        assert_eq!(received.len(), 1);
        assert_eq!(
            received[0].deserialize::<Ping>(),
            Some(Ping { msg: "x".into() })
        );
    }

    assert!(broker.remove_subscription(&binding));
    assert_eq!(broker.publish("Ping", json!({"msg": "x"}))?, 0);
    assert_eq!(a.count(), 1);
    Ok(())
}

/// Тест проверяет сценарий "Ping/Pong": событие издателя доходит только до
/// подписчиков своего канала.
#[test]
fn test_ping_pong_isolation() {
    let broker = Arc::new(Broker::new());
    let strategy = MessageBrokerStrategy::new(broker.clone());

    let publisher_plan = ActivationPlan::<Publisher>::builder()
        .publish("Ping", "fired", |p: &Publisher| &p.fired)
        .build();
    let ping_plan = ActivationPlan::<Recorder>::builder()
        .subscribe("Ping", "on_message", Recorder::on_message)
        .build();
    let pong_plan = ActivationPlan::<Recorder>::builder()
        .subscribe("Pong", "on_message", Recorder::on_message)
        .build();

    let p = Arc::new(Publisher::default());
    let a = Arc::new(Recorder::default());
    let b = Arc::new(Recorder::default());
    let _rp = strategy.activate(&p, &publisher_plan);
    let _ra = strategy.activate(&a, &ping_plan);
    let _rb = strategy.activate(&b, &pong_plan);

    assert_eq!(p.fired.raise(json!({"msg": "x"})).unwrap(), 1);
    assert_eq!(a.count(), 1);
    assert_eq!(b.count(), 0);
}

/// Тест проверяет, что подписчик видит издателя сообщения.
#[test]
fn test_message_carries_sender() {
    let broker = Arc::new(Broker::new());
    let strategy = MessageBrokerStrategy::new(broker.clone());
    let p = Arc::new(Publisher::default());
    let plan = ActivationPlan::<Publisher>::builder()
        .publish("Ping", "fired", |p: &Publisher| &p.fired)
        .build();
    let _record = strategy.activate(&p, &plan);

    let seen_sender = Arc::new(AtomicUsize::new(0));
    let seen = seen_sender.clone();
    let listener = Arc::new(());
    broker
        .add_subscription(
            "Ping",
            participant(&listener),
            HandlerInvoker::typed("check", move |_: &(), m: &Message| {
                if m.sender::<Publisher>().is_some() {
                    seen.fetch_add(1, Ordering::SeqCst);
                }
                Ok(())
            }),
        )
        .unwrap();

    p.fired.raise(()).unwrap();
    broker.publish("Ping", ()).unwrap();

    assert_eq!(seen_sender.load(Ordering::SeqCst), 1, "прямая публикация без издателя");
}

/// Тест проверяет, что ошибка обработчика доходит до издателя.
#[test]
fn test_handler_failure_reaches_publisher() {
    let broker = Arc::new(Broker::new());
    let strategy = MessageBrokerStrategy::new(broker.clone());
    let p = Arc::new(Publisher::default());
    let plan = ActivationPlan::<Publisher>::builder()
        .publish("Ping", "fired", |p: &Publisher| &p.fired)
        .build();
    let _record = strategy.activate(&p, &plan);

    let failing = Arc::new(());
    broker
        .add_subscription(
            "Ping",
            participant(&failing),
            HandlerInvoker::typed("reject", |_: &(), _m: &Message| {
                Err(HandlerError::new("rejected"))
            }),
        )
        .unwrap();

    let err = p.fired.raise("x").unwrap_err();
    assert_eq!(err.channel(), "Ping");
    assert_eq!(err.handler(), "reject");
    assert_eq!(err.status_code(), StatusCode::HandlerFailed);
    assert!(std::error::Error::source(&err).is_some());
}

/// Тест проверяет, что обработчик может публиковать в тот же и другой канал
/// без взаимоблокировки.
#[test]
fn test_reentrant_publish() {
    struct Echo {
        broker: Arc<Broker>,
        depth: AtomicUsize,
    }

    let broker = Arc::new(Broker::new());
    let echo = Arc::new(Echo {
        broker: broker.clone(),
        depth: AtomicUsize::new(0),
    });
    let sink = Arc::new(Recorder::default());

    broker
        .add_subscription(
            "Ping",
            participant(&echo),
            HandlerInvoker::typed("echo", |e: &Echo, m: &Message| {
                if e.depth.fetch_add(1, Ordering::SeqCst) < 3 {
                    e.broker.publish("Ping", m.payload.clone())?;
                }
                e.broker.publish("Pong", "echo")?;
                Ok(())
            }),
        )
        .unwrap();
    broker
        .add_subscription("Pong", participant(&sink), recorder_invoker())
        .unwrap();

    broker.publish("Ping", "start").unwrap();
    assert_eq!(echo.depth.load(Ordering::SeqCst), 4);
    assert_eq!(sink.count(), 4);
}

/// Тест проверяет, что уничтоженный подписчик больше не получает сообщений и
/// удаляется при следующей публикации.
#[test]
fn test_dead_subscriber_is_pruned() {
    let broker = Broker::new();
    let alive = Arc::new(Recorder::default());
    let dead = Arc::new(Recorder::default());
    broker
        .add_subscription("Ping", participant(&alive), recorder_invoker())
        .unwrap();
    broker
        .add_subscription("Ping", participant(&dead), recorder_invoker())
        .unwrap();

    drop(dead);
    assert_eq!(broker.publish("Ping", "x").unwrap(), 1);
    assert_eq!(broker.channel("Ping").unwrap().subscriber_count(), 1);
    assert_eq!(broker.stats().pruned_bindings, 1);
}

/// Тест проверяет доставку типизированных аргументов события.
#[test]
fn test_typed_event_arguments() {
    #[derive(Debug, PartialEq)]
    struct Moved {
        x: i32,
        y: i32,
    }

    let broker = Broker::new();
    let got = Arc::new(Mutex::new(None));
    let got_in = got.clone();
    let listener = Arc::new(());
    broker
        .add_subscription(
            "Moves",
            participant(&listener),
            HandlerInvoker::typed("on_move", move |_: &(), m: &Message| {
                let moved = m
                    .downcast_ref::<Moved>()
                    .ok_or_else(|| HandlerError::new("unexpected payload"))?;
                *got_in.lock() = Some((moved.x, moved.y));
                Ok(())
            }),
        )
        .unwrap();

    broker
        .publish("Moves", MessagePayload::any(Moved { x: 1, y: 2 }))
        .unwrap();
    assert_eq!(*got.lock(), Some((1, 2)));
    assert!(broker.publish("Moves", "not a move").is_err());
}
