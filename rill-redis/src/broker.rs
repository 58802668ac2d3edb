//! Redis Streams 代理
//!
//! 将代理能力映射到 XADD、XRANGE、XLEN 与 XREAD。每次调用克隆
//! 多路复用连接，可被多个流句柄与消费者并发使用；但阻塞读取会
//! 占用整个连接，消费者应持有独立的 [`RedisBroker`]。

use redis::{
    AsyncCommands,
    aio::MultiplexedConnection,
    streams::{StreamId, StreamRangeReply, StreamReadOptions, StreamReadReply},
};
use rill::broker::{Broker, RawEntry, StreamBatch};
use rill::errors::RillError;
use tokio::time::Duration;
use tracing::{debug, warn};

/// Redis Streams 代理
#[derive(Clone)]
pub struct RedisBroker {
    conn: MultiplexedConnection,
}

impl RedisBroker {
    /// 以既有的多路复用连接构造代理
    pub fn new(conn: MultiplexedConnection) -> Self {
        Self { conn }
    }

    /// 连接便捷函数，连接的配置仍是调用方的职责
    pub async fn connect(url: &str) -> Result<Self, RillError> {
        let client =
            redis::Client::open(url).map_err(|e| RillError::ConfigError(e.to_string()))?;
        let conn = client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| RillError::ReadError(e.to_string()))?;
        debug!("已连接Redis代理{url}");
        Ok(Self::new(conn))
    }
}

fn to_entry(sid: StreamId) -> RawEntry {
    let mut fields = Vec::with_capacity(sid.map.len());
    for (key, value) in sid.map {
        match redis::from_redis_value::<String>(&value) {
            Ok(v) => fields.push((key, v)),
            Err(e) => warn!("条目{}的字段{key}无法转换为字符串，已跳过：{e}", sid.id),
        }
    }
    RawEntry { id: sid.id, fields }
}

impl Broker for RedisBroker {
    async fn append(
        &self,
        key: &str,
        fields: Vec<(&'static str, String)>,
        id: Option<&str>,
    ) -> Result<String, RillError> {
        let mut conn = self.conn.clone();
        conn.xadd(key, id.unwrap_or("*"), &fields)
            .await
            .map_err(|e| RillError::WriteError(e.to_string()))
    }

    async fn range(
        &self,
        key: &str,
        from: &str,
        to: &str,
        count: Option<usize>,
    ) -> Result<Vec<RawEntry>, RillError> {
        let mut conn = self.conn.clone();
        let reply: StreamRangeReply = match count {
            Some(c) => conn.xrange_count(key, from, to, c).await,
            None => conn.xrange(key, from, to).await,
        }
        .map_err(|e| RillError::ReadError(e.to_string()))?;
        Ok(reply.ids.into_iter().map(to_entry).collect())
    }

    async fn len(&self, key: &str) -> Result<u64, RillError> {
        let mut conn = self.conn.clone();
        conn.xlen(key)
            .await
            .map_err(|e| RillError::ReadError(e.to_string()))
    }

    async fn read(
        &self,
        cursors: &[(String, String)],
        block: Option<Duration>,
        count: Option<usize>,
    ) -> Result<Vec<StreamBatch>, RillError> {
        let keys: Vec<&str> = cursors.iter().map(|(k, _)| k.as_str()).collect();
        let ids: Vec<&str> = cursors.iter().map(|(_, c)| c.as_str()).collect();

        let mut opts = StreamReadOptions::default();
        if let Some(d) = block {
            // 零时长等同于未设置，立即返回；Duration::MAX 映射为 BLOCK 0
            if d == Duration::MAX {
                opts = opts.block(0);
            } else if !d.is_zero() {
                opts = opts.block(d.as_millis().max(1) as usize);
            }
        }
        if let Some(c) = count {
            opts = opts.count(c);
        }

        let mut conn = self.conn.clone();
        let reply: Option<StreamReadReply> = conn
            .xread_options(&keys, &ids, &opts)
            .await
            .map_err(|e| RillError::ReadError(e.to_string()))?;
        let Some(reply) = reply else {
            return Ok(Vec::new());
        };
        Ok(reply
            .keys
            .into_iter()
            .map(|sk| StreamBatch {
                key: sk.key,
                entries: sk.ids.into_iter().map(to_entry).collect(),
            })
            .collect())
    }
}
