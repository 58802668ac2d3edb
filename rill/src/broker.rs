//! # **rill** 代理能力特征
//!
//! 对日志流代理的抽象：追加、区间读取、长度、阻塞多流读取。
//! 连接的建立与配置由调用方负责，实现必须可被多个流句柄与
//! 消费者并发使用。

use crate::errors::RillError;
use crate::record::{FieldIssue, Message, Record};
use std::future::Future;
use tokio::time::Duration;

/// 尾部游标哨兵，表示仅消费读取开始之后追加的条目
pub const TAIL: &str = "$";

/// 原始流条目
#[derive(Debug, Clone, PartialEq)]
pub struct RawEntry {
    /// 代理分配的条目 Id
    pub id: String,
    /// 平面字段映射
    pub fields: Vec<(String, String)>,
}

impl RawEntry {
    /// 解码为类型化消息，附带解码诊断
    pub fn into_message<T>(self) -> (Message<T>, Vec<FieldIssue>)
    where
        T: Record,
    {
        let (data, issues) = T::from_fields(&self.fields);
        (Message { id: self.id, data }, issues)
    }
}

/// 单个流在一次读取中返回的条目批次
#[derive(Debug, Clone, PartialEq)]
pub struct StreamBatch {
    /// 流键
    pub key: String,
    /// 条目，按 Id 升序
    pub entries: Vec<RawEntry>,
}

/// 日志流代理特征
pub trait Broker: Send + Sync + 'static {
    /// 追加一个条目，id 为 None 时由代理分配，返回确认的 Id
    ///
    /// 每个流的 Id 单调递增。
    fn append(
        &self,
        key: &str,
        fields: Vec<(&'static str, String)>,
        id: Option<&str>,
    ) -> impl Future<Output = Result<String, RillError>> + Send;

    /// 闭区间读取，count 限制返回条目数
    fn range(
        &self,
        key: &str,
        from: &str,
        to: &str,
        count: Option<usize>,
    ) -> impl Future<Output = Result<Vec<RawEntry>, RillError>> + Send;

    /// 流的当前条目数
    fn len(&self, key: &str) -> impl Future<Output = Result<u64, RillError>> + Send;

    /// 阻塞多流读取
    ///
    /// 返回每个流严格位于给定游标之后的条目。block 为 None 时
    /// 立即返回；否则最多等待该时长，等待期间任一流出现新条目
    /// 即返回；超时返回空批次，不视为错误。count 限制每个流
    /// 返回的条目数。游标支持尾部哨兵 [`TAIL`]。
    fn read(
        &self,
        cursors: &[(String, String)],
        block: Option<Duration>,
        count: Option<usize>,
    ) -> impl Future<Output = Result<Vec<StreamBatch>, RillError>> + Send;
}
