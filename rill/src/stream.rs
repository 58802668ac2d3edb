//! # **rill** 流句柄
//!
//! 单个流的同步访问器：追加、区间读取、长度。除标识流之外
//! 不持有状态，可廉价克隆。

use crate::broker::Broker;
use crate::errors::RillError;
use crate::record::{Message, Record};
use std::{marker::PhantomData, sync::Arc};
use tracing::{debug, warn};

/// 流句柄，绑定记录类型 T
pub struct Stream<T, B>
where
    T: Record,
    B: Broker,
{
    broker: Arc<B>,
    key: String,
    _marker: PhantomData<fn() -> T>,
}

impl<T, B> Clone for Stream<T, B>
where
    T: Record,
    B: Broker,
{
    fn clone(&self) -> Self {
        Self {
            broker: Arc::clone(&self.broker),
            key: self.key.clone(),
            _marker: PhantomData,
        }
    }
}

impl<T, B> Stream<T, B>
where
    T: Record,
    B: Broker,
{
    /// 构造函数
    pub fn new(broker: Arc<B>, key: impl Into<String>) -> Self {
        Self {
            broker,
            key: key.into(),
            _marker: PhantomData,
        }
    }

    /// 流键
    pub fn key(&self) -> &str {
        &self.key
    }

    /// 追加一条记录，返回代理分配或确认的 Id
    ///
    /// id 为 None 时由代理分配。
    pub async fn add(&self, data: &T, id: Option<&str>) -> Result<String, RillError> {
        let fields = data.to_fields();
        let id = self.broker.append(&self.key, fields, id).await?;
        debug!("记录追加到流{}，条目{id}", self.key);
        Ok(id)
    }

    /// 闭区间读取一段流，count 限制返回条目数
    ///
    /// 每个条目经编解码器解码；解析失败的字段保持默认值并记录
    /// 诊断，消息本身不会被丢弃。
    pub async fn read(
        &self,
        from: &str,
        to: &str,
        count: Option<usize>,
    ) -> Result<Vec<Message<T>>, RillError> {
        let entries = self.broker.range(&self.key, from, to, count).await?;
        debug!("从流{}读取{}个条目", self.key, entries.len());
        let mut msgs = Vec::with_capacity(entries.len());
        for entry in entries {
            let (msg, issues) = entry.into_message();
            for issue in issues {
                warn!("流{}条目{}解码诊断：{issue}", self.key, msg.id);
            }
            msgs.push(msg);
        }
        Ok(msgs)
    }

    /// 流的当前条目数
    pub async fn len(&self) -> Result<u64, RillError> {
        self.broker.len(&self.key).await
    }
}
