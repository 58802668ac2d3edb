use super::{Order, setup};
use crate::broker::Broker;
use crate::errors::RillError;
use crate::stream::Stream;
use crate::test_utils::MemoryBroker;
use std::sync::Arc;

fn orders(broker: &Arc<MemoryBroker>) -> Stream<Order, MemoryBroker> {
    Stream::new(Arc::clone(broker), "orders")
}

#[tokio::test]
async fn add_assigns_increasing_ids() {
    setup();
    let broker = Arc::new(MemoryBroker::new());
    let stream = orders(&broker);
    let first = stream.add(&Order::default(), None).await.unwrap();
    let second = stream.add(&Order::default(), None).await.unwrap();
    assert_eq!(first, "1-0");
    assert_eq!(second, "2-0");
    assert_eq!(stream.len().await.unwrap(), 2);
}

#[tokio::test]
async fn explicit_id_confirmed_and_kept_monotonic() {
    setup();
    let broker = Arc::new(MemoryBroker::new());
    let stream = orders(&broker);
    let id = stream.add(&Order::default(), Some("5-1")).await.unwrap();
    assert_eq!(id, "5-1");

    // 代理分配的下一个Id必须超过显式Id
    let next = stream.add(&Order::default(), None).await.unwrap();
    assert_eq!(next, "6-0");

    let err = stream.add(&Order::default(), Some("5-0")).await.unwrap_err();
    assert!(matches!(err, RillError::WriteError(_)));
}

#[tokio::test]
async fn range_decodes_in_append_order() {
    setup();
    let broker = Arc::new(MemoryBroker::new());
    let stream = orders(&broker);
    stream
        .add(
            &Order {
                amount: 10,
                ..Order::default()
            },
            None,
        )
        .await
        .unwrap();
    stream
        .add(
            &Order {
                amount: 20,
                ..Order::default()
            },
            None,
        )
        .await
        .unwrap();

    let msgs = stream.read("-", "+", None).await.unwrap();
    assert_eq!(msgs.len(), 2);
    assert_eq!(msgs[0].id, "1-0");
    assert_eq!(msgs[0].data.amount, 10);
    assert_eq!(msgs[1].id, "2-0");
    assert_eq!(msgs[1].data.amount, 20);
    assert!(msgs[0].id < msgs[1].id);
}

#[tokio::test]
async fn range_honors_count_and_bounds() {
    setup();
    let broker = Arc::new(MemoryBroker::new());
    let stream = orders(&broker);
    for amount in 1..=4 {
        stream
            .add(
                &Order {
                    amount,
                    ..Order::default()
                },
                None,
            )
            .await
            .unwrap();
    }

    let capped = stream.read("-", "+", Some(2)).await.unwrap();
    assert_eq!(capped.len(), 2);
    assert_eq!(capped[1].id, "2-0");

    let window = stream.read("2-0", "3-0", None).await.unwrap();
    assert_eq!(window.len(), 2);
    assert_eq!(window[0].data.amount, 2);
    assert_eq!(window[1].data.amount, 3);
}

#[tokio::test]
async fn undecodable_entry_still_delivered() {
    setup();
    let broker = Arc::new(MemoryBroker::new());
    broker
        .append("orders", vec![("amount", "abc".to_owned())], None)
        .await
        .unwrap();

    let stream = orders(&broker);
    let msgs = stream.read("-", "+", None).await.unwrap();
    assert_eq!(msgs.len(), 1);
    assert_eq!(msgs[0].data.amount, 0);
}

#[tokio::test]
async fn missing_stream_is_empty() {
    setup();
    let broker = Arc::new(MemoryBroker::new());
    let stream = orders(&broker);
    assert_eq!(stream.len().await.unwrap(), 0);
    assert!(stream.read("-", "+", None).await.unwrap().is_empty());
}
