//! # **rill** 测试专用内存代理
//!
//! 进程内实现的代理能力：尾部哨兵解析、每流单调的"毫秒-序号"
//! 形式 Id、追加唤醒的阻塞读取，外加读取计数与故障注入，供
//! 测试与演示在没有真实代理时使用。

use crate::broker::{Broker, RawEntry, StreamBatch, TAIL};
use crate::errors::RillError;
use std::collections::HashMap;
use std::sync::{
    Mutex,
    atomic::{AtomicU64, Ordering},
};
use tokio::sync::Notify;
use tokio::time::{Duration, Instant};

/// 内存代理
pub struct MemoryBroker {
    streams: Mutex<HashMap<String, Vec<RawEntry>>>,
    notify: Notify,
    reads: AtomicU64,
    fail_reads: AtomicU64,
}

impl MemoryBroker {
    /// 构造函数
    pub fn new() -> Self {
        Self {
            streams: Mutex::new(HashMap::new()),
            notify: Notify::new(),
            reads: AtomicU64::new(0),
            fail_reads: AtomicU64::new(0),
        }
    }

    /// 迄今收到的读取调用数
    pub fn reads(&self) -> u64 {
        self.reads.load(Ordering::Relaxed)
    }

    /// 令接下来 n 次读取调用失败
    pub fn fail_reads(&self, n: u64) {
        self.fail_reads.store(n, Ordering::Relaxed);
    }

    fn parse_id(id: &str) -> Option<(u64, u64)> {
        match id.split_once('-') {
            Some((ms, seq)) => Some((ms.parse().ok()?, seq.parse().ok()?)),
            None => Some((id.parse().ok()?, 0)),
        }
    }

    fn bound(raw: &str) -> Option<(u64, u64)> {
        match raw {
            "-" => Some((0, 0)),
            "+" => Some((u64::MAX, u64::MAX)),
            _ => Self::parse_id(raw),
        }
    }

    fn collect(&self, resolved: &[(String, (u64, u64))], count: Option<usize>) -> Vec<StreamBatch> {
        let streams = self.streams.lock().expect("内存代理锁中毒");
        let mut batches = Vec::new();
        for (key, pos) in resolved {
            let Some(entries) = streams.get(key) else {
                continue;
            };
            let mut fresh: Vec<RawEntry> = entries
                .iter()
                .filter(|e| Self::parse_id(&e.id).is_some_and(|id| id > *pos))
                .cloned()
                .collect();
            if let Some(c) = count {
                fresh.truncate(c);
            }
            if !fresh.is_empty() {
                batches.push(StreamBatch {
                    key: key.clone(),
                    entries: fresh,
                });
            }
        }
        batches
    }
}

impl Default for MemoryBroker {
    fn default() -> Self {
        Self::new()
    }
}

impl Broker for MemoryBroker {
    async fn append(
        &self,
        key: &str,
        fields: Vec<(&'static str, String)>,
        id: Option<&str>,
    ) -> Result<String, RillError> {
        let id = {
            let mut streams = self.streams.lock().expect("内存代理锁中毒");
            let entries = streams.entry(key.to_owned()).or_default();
            let last = entries.last().and_then(|e| Self::parse_id(&e.id));
            let id = match id {
                Some(explicit) => {
                    let eid = Self::parse_id(explicit).ok_or_else(|| {
                        RillError::WriteError(format!("条目Id'{explicit}'格式非法"))
                    })?;
                    if last.is_some_and(|last| eid <= last) {
                        return Err(RillError::WriteError(format!(
                            "条目Id'{explicit}'未超过流{key}的最后Id"
                        )));
                    }
                    explicit.to_owned()
                }
                None => format!("{}-0", last.map_or(1, |(ms, _)| ms + 1)),
            };
            entries.push(RawEntry {
                id: id.clone(),
                fields: fields.into_iter().map(|(k, v)| (k.to_owned(), v)).collect(),
            });
            id
        };
        self.notify.notify_waiters();
        Ok(id)
    }

    async fn range(
        &self,
        key: &str,
        from: &str,
        to: &str,
        count: Option<usize>,
    ) -> Result<Vec<RawEntry>, RillError> {
        let lo = Self::bound(from)
            .ok_or_else(|| RillError::ReadError(format!("区间边界'{from}'格式非法")))?;
        let hi = Self::bound(to)
            .ok_or_else(|| RillError::ReadError(format!("区间边界'{to}'格式非法")))?;
        let streams = self.streams.lock().expect("内存代理锁中毒");
        let mut out: Vec<RawEntry> = streams
            .get(key)
            .map(|entries| {
                entries
                    .iter()
                    .filter(|e| {
                        Self::parse_id(&e.id).is_some_and(|id| id >= lo && id <= hi)
                    })
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        if let Some(c) = count {
            out.truncate(c);
        }
        Ok(out)
    }

    async fn len(&self, key: &str) -> Result<u64, RillError> {
        let streams = self.streams.lock().expect("内存代理锁中毒");
        Ok(streams.get(key).map_or(0, |entries| entries.len() as u64))
    }

    async fn read(
        &self,
        cursors: &[(String, String)],
        block: Option<Duration>,
        count: Option<usize>,
    ) -> Result<Vec<StreamBatch>, RillError> {
        self.reads.fetch_add(1, Ordering::Relaxed);
        if self
            .fail_reads
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |n| n.checked_sub(1))
            .is_ok()
        {
            return Err(RillError::ReadError("注入的读取故障".to_owned()));
        }

        // 尾部哨兵在调用时解析为各流当前的最后Id
        let resolved = {
            let streams = self.streams.lock().expect("内存代理锁中毒");
            cursors
                .iter()
                .map(|(key, cursor)| {
                    let pos = if cursor == TAIL {
                        streams
                            .get(key)
                            .and_then(|entries| entries.last())
                            .and_then(|e| Self::parse_id(&e.id))
                            .unwrap_or((0, 0))
                    } else {
                        Self::parse_id(cursor).ok_or_else(|| {
                            RillError::ReadError(format!("游标'{cursor}'格式非法"))
                        })?
                    };
                    Ok((key.clone(), pos))
                })
                .collect::<Result<Vec<_>, RillError>>()?
        };

        // None → 立即返回；超出 Instant 表示范围 → 无限期等待
        let deadline = block.map(|d| Instant::now().checked_add(d));
        loop {
            let notified = self.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            let batches = self.collect(&resolved, count);
            if !batches.is_empty() {
                return Ok(batches);
            }
            match deadline {
                None => return Ok(Vec::new()),
                Some(None) => notified.await,
                Some(Some(at)) => {
                    let now = Instant::now();
                    if now >= at {
                        return Ok(Vec::new());
                    }
                    if tokio::time::timeout(at - now, notified).await.is_err() {
                        return Ok(Vec::new());
                    }
                }
            }
        }
    }
}
