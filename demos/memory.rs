use model::Order;
use rill::broker::TAIL;
use rill::consumer::{Consumer, ConsumerConfig};
use rill::stream::Stream;
use rill::test_utils::MemoryBroker;
use std::sync::Arc;
use tokio::time::{Duration, sleep};
use tokio_util::sync::CancellationToken;
use tracing::{Level, info};
use tracing_subscriber::fmt;

mod model {
    use rill::macros::record;

    #[record]
    pub struct Order {
        pub amount: i64,
        pub note: String,
    }
}

#[tokio::main]
async fn main() {
    fmt().with_max_level(Level::DEBUG).init();

    let broker = Arc::new(MemoryBroker::new());
    let stream: Stream<Order, MemoryBroker> = Stream::new(Arc::clone(&broker), "orders");

    let token = CancellationToken::new();
    let mut consumer: Consumer<Order> = Consumer::launch(
        Arc::clone(&broker),
        ConsumerConfig {
            streams: vec![("orders".to_string(), TAIL.to_string())],
            block: Some(Duration::from_millis(100)),
            ..ConsumerConfig::default()
        },
        token.clone(),
    )
    .expect("消费者启动失败");
    sleep(Duration::from_millis(50)).await;

    for amount in 1..=3 {
        let id = stream
            .add(
                &Order {
                    amount,
                    note: format!("第{amount}单"),
                },
                None,
            )
            .await
            .expect("追加失败");
        info!("已追加条目{id}");
    }

    for _ in 0..3 {
        let msg = consumer.recv().await.expect("输出通道意外关闭");
        info!("收到{}：{:?}", msg.id, msg.data);
    }
    info!("游标快照：{:?}", consumer.last_ids());

    token.cancel();
    info!("终止状态：{:?}", consumer.closed().await);
}
