//! Redis 访问集成测试
//!
//! 需要本地 Redis：`docker run --rm -p 6379:6379 redis:7`。

use rill::broker::TAIL;
use rill::consumer::{Consumer, ConsumerConfig};
use rill::macros::record;
use rill::stream::Stream;
use rill_redis::RedisBroker;
use std::sync::Arc;
use tokio::time::{Duration, sleep, timeout};
use tokio_util::sync::CancellationToken;
use tracing::Level;
use tracing_subscriber::fmt;

const URL: &str = "redis://127.0.0.1/";

#[record]
struct Order {
    amount: i64,
    note: String,
}

fn unique_key(prefix: &str) -> String {
    let nanos = std::time::SystemTime::now()
        .duration_since(std::time::SystemTime::UNIX_EPOCH)
        .unwrap()
        .as_nanos();
    format!("{prefix}-{nanos}")
}

#[tokio::test]
#[ignore = "需要本地Redis"]
async fn add_read_len_round_trip() {
    let _ = fmt().with_test_writer().with_max_level(Level::DEBUG).try_init();
    let broker = Arc::new(RedisBroker::connect(URL).await.unwrap());
    let key = unique_key("orders");
    let stream: Stream<Order, RedisBroker> = Stream::new(Arc::clone(&broker), key);

    let first = stream
        .add(
            &Order {
                amount: 10,
                note: "第一单".to_owned(),
            },
            None,
        )
        .await
        .unwrap();
    let second = stream
        .add(
            &Order {
                amount: 20,
                note: "第二单".to_owned(),
            },
            None,
        )
        .await
        .unwrap();
    assert!(first < second);
    assert_eq!(stream.len().await.unwrap(), 2);

    let msgs = stream.read("-", "+", None).await.unwrap();
    assert_eq!(msgs.len(), 2);
    assert_eq!(msgs[0].data.amount, 10);
    assert_eq!(msgs[1].data.note, "第二单");
}

#[tokio::test]
#[ignore = "需要本地Redis"]
async fn tail_consumer_receives_new_appends() {
    let _ = fmt().with_test_writer().with_max_level(Level::DEBUG).try_init();
    let broker = Arc::new(RedisBroker::connect(URL).await.unwrap());
    let key = unique_key("orders");
    let stream: Stream<Order, RedisBroker> = Stream::new(Arc::clone(&broker), key.clone());
    stream
        .add(
            &Order {
                amount: 1,
                note: "历史".to_owned(),
            },
            None,
        )
        .await
        .unwrap();

    let token = CancellationToken::new();
    // 阻塞读取独占连接，消费者使用单独的代理实例
    let consumer_broker = Arc::new(RedisBroker::connect(URL).await.unwrap());
    let mut consumer: Consumer<Order> = Consumer::launch(
        consumer_broker,
        ConsumerConfig {
            streams: vec![(key.clone(), TAIL.to_owned())],
            block: Some(Duration::from_millis(200)),
            ..ConsumerConfig::default()
        },
        token.clone(),
    )
    .unwrap();
    sleep(Duration::from_millis(100)).await;

    stream
        .add(
            &Order {
                amount: 2,
                note: "新增".to_owned(),
            },
            None,
        )
        .await
        .unwrap();

    let msg = timeout(Duration::from_secs(5), consumer.recv())
        .await
        .expect("等待消息超时")
        .expect("输出通道意外关闭");
    assert_eq!(msg.data.amount, 2);

    token.cancel();
    assert!(consumer.closed().await.is_terminal());
}
