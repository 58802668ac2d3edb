use model::Order;
use rill::broker::TAIL;
use rill::consumer::{Consumer, ConsumerConfig};
use rill::stream::Stream;
use rill_redis::RedisBroker;
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

const URL: &str = "redis://127.0.0.1/";

#[tokio::main]
async fn main() {
    fmt().with_max_level(Level::DEBUG).init();

    let producer = Arc::new(RedisBroker::connect(URL).await.expect("连接Redis失败"));
    let stream: Stream<Order, RedisBroker> = Stream::new(Arc::clone(&producer), "orders");

    // 阻塞读取独占连接，消费者使用单独的代理实例
    let consumer_broker = Arc::new(RedisBroker::connect(URL).await.expect("连接Redis失败"));
    let token = CancellationToken::new();
    let mut consumer: Consumer<Order> = Consumer::launch(
        consumer_broker,
        ConsumerConfig {
            streams: vec![("orders".to_string(), TAIL.to_string())],
            block: Some(Duration::from_millis(500)),
            ..ConsumerConfig::default()
        },
        token.clone(),
    )
    .expect("消费者启动失败");
    sleep(Duration::from_millis(100)).await;

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
    info!("流长度：{}", stream.len().await.expect("查询长度失败"));

    for _ in 0..3 {
        let msg = consumer.recv().await.expect("输出通道意外关闭");
        info!("收到{}：{:?}", msg.id, msg.data);
    }

    token.cancel();
    info!("终止状态：{:?}", consumer.closed().await);
}
