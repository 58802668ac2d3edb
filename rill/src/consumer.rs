//! # **rill** 多流消费者
//!
//! 每个消费者独占一个后台任务：按稳定顺序构造多流阻塞读取
//! 请求，解码返回的条目并送入有界输出通道，随后将游标推进到
//! 各流最后投递条目的 Id。游标只前进，且仅在该流本批条目全部
//! 投递之后推进，故崩溃重启后可能重复投递（至少一次语义）。
//!
//! 取消是协作式的，每完成一批检查一次：较长的 block 会相应
//! 推迟取消生效，需要及时停机的调用方应选择有界的 block。

use crate::broker::{Broker, StreamBatch, TAIL};
use crate::errors::RillError;
use crate::record::{Message, Record};
use serde::Deserialize;
use std::collections::HashSet;
use std::sync::{
    Arc,
    atomic::{AtomicU64, Ordering},
};
use tokio::{
    sync::{mpsc, watch},
    time::Duration,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};
use validator::{Validate, ValidationError};

/// 读取重试策略
///
/// 读取失败后按指数退避重试，重试耗尽才终止消费循环。
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// 最大重试次数，0 表示不重试
    pub attempts: u32,
    /// 首次重试前的退避时长，随后逐次翻倍
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 3,
            backoff: Duration::from_millis(100),
        }
    }
}

impl RetryPolicy {
    /// 第 attempt 次重试前的退避时长
    pub fn delay(&self, attempt: u32) -> Duration {
        self.backoff.saturating_mul(1u32 << attempt.min(10))
    }
}

fn validate_streams(streams: &[(String, String)]) -> Result<(), ValidationError> {
    let mut seen = HashSet::new();
    for (key, cursor) in streams {
        if key.is_empty() || cursor.is_empty() {
            return Err(ValidationError::new("流键与游标不能为空"));
        }
        if !seen.insert(key.as_str()) {
            return Err(ValidationError::new("流键重复"));
        }
    }
    Ok(())
}

/// 消费者配置
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(default)]
pub struct ConsumerConfig {
    /// (流键, 起始游标)列表，顺序即读取请求的构造顺序
    #[validate(length(min = 1), custom(function = validate_streams))]
    pub streams: Vec<(String, String)>,
    /// 阻塞读取的最长等待时长
    ///
    /// None 表示无论有无新条目都立即返回；Duration::MAX 表示
    /// 无限期等待。
    pub block: Option<Duration>,
    /// 单次读取每个流返回的最大条目数
    pub count: Option<usize>,
    /// 输出通道容量，通道写满即构成背压
    #[validate(range(min = 1))]
    pub buffer: usize,
    /// 读取重试策略
    pub retry: RetryPolicy,
}

impl Default for ConsumerConfig {
    fn default() -> Self {
        Self {
            streams: Vec::new(),
            block: Some(Duration::from_secs(5)),
            count: None,
            buffer: 128,
            retry: RetryPolicy::default(),
        }
    }
}

impl ConsumerConfig {
    /// 以"键 游标"形式的描述构造配置
    ///
    /// 省略游标时取尾部哨兵 [`TAIL`]，格式不符的描述忽略。
    pub fn parse<I, S>(streams: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut pairs = Vec::new();
        for stream in streams {
            let parts: Vec<&str> = stream.as_ref().split(' ').collect();
            match parts.as_slice() {
                [key] => pairs.push(((*key).to_owned(), TAIL.to_owned())),
                [key, cursor] => pairs.push(((*key).to_owned(), (*cursor).to_owned())),
                _ => {}
            }
        }
        Self {
            streams: pairs,
            ..Self::default()
        }
    }
}

/// 消费者状态
#[derive(Debug, Clone, PartialEq)]
pub enum ConsumerState {
    /// 消费循环运行中
    Running,
    /// 出现解码诊断或读取重试，循环继续
    Degraded,
    /// 因取消或接收端关闭而结束，输出通道已关闭
    Closed,
    /// 读取重试耗尽而终止，输出通道已关闭
    Failed(RillError),
}

impl ConsumerState {
    /// 是否为终止状态
    pub fn is_terminal(&self) -> bool {
        matches!(self, ConsumerState::Closed | ConsumerState::Failed(_))
    }
}

/// 多流消费者，绑定记录类型 T
///
/// 构造即启动后台消费循环；通过取消令牌停止。循环结束时输出
/// 通道随之关闭，终止原因经状态通道可见，宿主进程不会因代理
/// 故障而终止。
#[derive(Debug)]
pub struct Consumer<T>
where
    T: Record,
{
    rx: mpsc::Receiver<Message<T>>,
    state_rx: watch::Receiver<ConsumerState>,
    cursor_rx: watch::Receiver<Arc<Vec<(String, String)>>>,
    issues: Arc<AtomicU64>,
}

impl<T> Consumer<T>
where
    T: Record,
{
    /// 校验配置并启动消费者
    ///
    /// 配置非法时立即失败，不启动后台任务。
    pub fn launch<B>(
        broker: Arc<B>,
        config: ConsumerConfig,
        token: CancellationToken,
    ) -> Result<Self, RillError>
    where
        B: Broker,
    {
        config
            .validate()
            .map_err(|e| RillError::ConfigError(e.to_string()))?;

        let (tx, rx) = mpsc::channel(config.buffer);
        let (state_tx, state_rx) = watch::channel(ConsumerState::Running);
        let cursors = config.streams;
        let (cursor_tx, cursor_rx) = watch::channel(Arc::new(cursors.clone()));
        let issues = Arc::new(AtomicU64::new(0));

        let worker = Worker {
            broker,
            tx,
            state_tx,
            cursor_tx,
            cursors,
            block: config.block,
            count: config.count,
            retry: config.retry,
            token,
            issues: Arc::clone(&issues),
        };
        tokio::spawn(worker.run());

        Ok(Self {
            rx,
            state_rx,
            cursor_rx,
            issues,
        })
    }

    /// 接收下一条消息
    ///
    /// 输出通道关闭后返回 None，终止原因经 [`Consumer::state`]
    /// 查询。
    pub async fn recv(&mut self) -> Option<Message<T>> {
        self.rx.recv().await
    }

    /// 当前状态
    pub fn state(&self) -> ConsumerState {
        self.state_rx.borrow().clone()
    }

    /// 等待消费循环结束，返回终止状态
    pub async fn closed(&mut self) -> ConsumerState {
        loop {
            let state = self.state_rx.borrow_and_update().clone();
            if state.is_terminal() {
                return state;
            }
            if self.state_rx.changed().await.is_err() {
                return self.state_rx.borrow().clone();
            }
        }
    }

    /// 各流最后投递条目 Id 的只读快照
    ///
    /// 快照在每批处理完成后发布，尚未投递过的流保持起始游标。
    pub fn last_ids(&self) -> Vec<(String, String)> {
        self.cursor_rx.borrow().as_ref().clone()
    }

    /// 迄今记录的解码诊断数
    pub fn issues(&self) -> u64 {
        self.issues.load(Ordering::Relaxed)
    }
}

enum LoopExit {
    Cancelled,
    Detached,
    Failed(RillError),
}

struct Worker<T, B>
where
    T: Record,
    B: Broker,
{
    broker: Arc<B>,
    tx: mpsc::Sender<Message<T>>,
    state_tx: watch::Sender<ConsumerState>,
    cursor_tx: watch::Sender<Arc<Vec<(String, String)>>>,
    cursors: Vec<(String, String)>,
    block: Option<Duration>,
    count: Option<usize>,
    retry: RetryPolicy,
    token: CancellationToken,
    issues: Arc<AtomicU64>,
}

impl<T, B> Worker<T, B>
where
    T: Record,
    B: Broker,
{
    #[instrument(name = "consume_streams", skip_all, fields(streams = self.cursors.len()))]
    async fn run(mut self) {
        info!("启动消费循环");
        match self.drive().await {
            LoopExit::Cancelled => {
                info!("收到取消信号，停止消费循环");
                let _ = self.state_tx.send(ConsumerState::Closed);
            }
            LoopExit::Detached => {
                info!("接收端均已关闭，停止消费循环");
                let _ = self.state_tx.send(ConsumerState::Closed);
            }
            LoopExit::Failed(e) => {
                error!("消费循环终止：{e}");
                let _ = self.state_tx.send(ConsumerState::Failed(e));
            }
        }
        // 输出通道随工作任务结束一并关闭
    }

    async fn drive(&mut self) -> LoopExit {
        loop {
            if self.token.is_cancelled() {
                return LoopExit::Cancelled;
            }
            let batches = match self.read_batch().await {
                Ok(batches) => batches,
                Err(exit) => return exit,
            };
            if let Some(exit) = self.deliver(batches).await {
                return exit;
            }
            if self.token.is_cancelled() {
                return LoopExit::Cancelled;
            }
        }
    }

    async fn read_batch(&mut self) -> Result<Vec<StreamBatch>, LoopExit> {
        let mut attempt = 0u32;
        loop {
            match self
                .broker
                .read(&self.cursors, self.block, self.count)
                .await
            {
                Ok(batches) => return Ok(batches),
                Err(e) if attempt < self.retry.attempts => {
                    let delay = self.retry.delay(attempt);
                    attempt += 1;
                    warn!(
                        "读取流失败，第{attempt}次重试前退避{}毫秒：{e}",
                        delay.as_millis()
                    );
                    self.degrade();
                    tokio::select! {
                        _ = self.token.cancelled() => return Err(LoopExit::Cancelled),
                        _ = tokio::time::sleep(delay) => {}
                    }
                }
                Err(e) => return Err(LoopExit::Failed(e)),
            }
        }
    }

    async fn deliver(&mut self, batches: Vec<StreamBatch>) -> Option<LoopExit> {
        for batch in batches {
            let mut last_id: Option<String> = None;
            for entry in batch.entries {
                let (msg, issues) = entry.into_message::<T>();
                if !issues.is_empty() {
                    self.issues.fetch_add(issues.len() as u64, Ordering::Relaxed);
                    for issue in &issues {
                        warn!("流{}条目{}解码诊断：{issue}", batch.key, msg.id);
                    }
                    self.degrade();
                }
                let id = msg.id.clone();
                // 背压点：通道写满时在此挂起
                if self.tx.send(msg).await.is_err() {
                    return Some(LoopExit::Detached);
                }
                last_id = Some(id);
            }
            if let Some(id) = last_id {
                if let Some(cursor) = self.cursors.iter_mut().find(|(k, _)| *k == batch.key) {
                    debug!("流{}游标推进到{id}", batch.key);
                    cursor.1 = id;
                }
            }
        }
        let _ = self.cursor_tx.send(Arc::new(self.cursors.clone()));
        None
    }

    fn degrade(&self) {
        self.state_tx.send_if_modified(|state| {
            if *state == ConsumerState::Running {
                *state = ConsumerState::Degraded;
                true
            } else {
                false
            }
        });
    }
}
