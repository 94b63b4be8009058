use crate::config::Credentials;
use async_trait::async_trait;
use flux_monitor_core::{DomainEvent, OperatorType};
use flux_monitor_filter::FilterSet;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

const SUBSCRIPTION_CAPACITY: usize = 256;

/// 扫描请求
#[derive(Debug, Clone)]
pub struct ScanRequest {
    pub domain_id: String,
    pub operator_type: OperatorType,
    pub filters: Arc<FilterSet>,
    /// 指标扫描周期，仅指标源使用
    pub scan_period: Option<Duration>,
}

/// 一次事件订阅
pub struct Subscription {
    pub id: u64,
    pub events: mpsc::Receiver<DomainEvent>,
}

/// 域连接抽象
///
/// 连接建立后，`subscribe` 返回的通道持续推送域事件，直到订阅被释放。
#[async_trait]
pub trait DomainConnector: Send + Sync {
    async fn connect(&self, credentials: &Credentials) -> anyhow::Result<()>;

    async fn subscribe(&self, request: ScanRequest) -> anyhow::Result<Subscription>;

    async fn unsubscribe(&self, subscription_id: u64) -> anyhow::Result<()>;

    async fn disconnect(&self) -> anyhow::Result<()>;
}

/// 内存连接器：事件由调用方通过 `publish` 推送，供嵌入和测试使用
#[derive(Default)]
pub struct MemoryConnector {
    subscribers: Mutex<HashMap<u64, mpsc::Sender<DomainEvent>>>,
    requests: Mutex<Vec<ScanRequest>>,
    credentials: Mutex<Option<Credentials>>,
    next_id: AtomicU64,
    connected: AtomicBool,
    fail_connect: AtomicBool,
    fail_subscribe: AtomicBool,
    fail_unsubscribe: AtomicBool,
}

impl MemoryConnector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_fail_connect(&self, fail: bool) {
        self.fail_connect.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_subscribe(&self, fail: bool) {
        self.fail_subscribe.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_unsubscribe(&self, fail: bool) {
        self.fail_unsubscribe.store(fail, Ordering::SeqCst);
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    /// 当前存活的订阅数
    pub async fn active_subscriptions(&self) -> usize {
        self.subscribers.lock().await.len()
    }

    /// 最近一次连接使用的凭据
    pub async fn last_credentials(&self) -> Option<Credentials> {
        self.credentials.lock().await.clone()
    }

    /// 历史上收到的全部扫描请求
    pub async fn requests(&self) -> Vec<ScanRequest> {
        self.requests.lock().await.clone()
    }

    /// 向所有存活订阅推送事件，返回送达的订阅数
    pub async fn publish(&self, event: DomainEvent) -> usize {
        let senders: Vec<mpsc::Sender<DomainEvent>> =
            self.subscribers.lock().await.values().cloned().collect();

        let mut delivered = 0;
        for sender in senders {
            if sender.send(event.clone()).await.is_ok() {
                delivered += 1;
            }
        }
        delivered
    }
}

#[async_trait]
impl DomainConnector for MemoryConnector {
    async fn connect(&self, credentials: &Credentials) -> anyhow::Result<()> {
        *self.credentials.lock().await = Some(credentials.clone());
        if self.fail_connect.load(Ordering::SeqCst) {
            anyhow::bail!("connection refused");
        }
        self.connected.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn subscribe(&self, request: ScanRequest) -> anyhow::Result<Subscription> {
        if self.fail_subscribe.load(Ordering::SeqCst) {
            anyhow::bail!("subscription rejected for domain {}", request.domain_id);
        }

        let id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        let (tx, rx) = mpsc::channel(SUBSCRIPTION_CAPACITY);
        self.subscribers.lock().await.insert(id, tx);
        self.requests.lock().await.push(request);

        Ok(Subscription { id, events: rx })
    }

    async fn unsubscribe(&self, subscription_id: u64) -> anyhow::Result<()> {
        // 失败时也移除订阅，保证不再推送
        let removed = self.subscribers.lock().await.remove(&subscription_id);
        if self.fail_unsubscribe.load(Ordering::SeqCst) {
            anyhow::bail!("failed to release subscription {}", subscription_id);
        }
        if removed.is_none() {
            debug!(subscription_id, "Subscription already released");
        }
        Ok(())
    }

    async fn disconnect(&self) -> anyhow::Result<()> {
        self.subscribers.lock().await.clear();
        self.connected.store(false, Ordering::SeqCst);
        Ok(())
    }
}

/// 重放连接器：从 JSON Lines 文件读取域事件并按节奏推送
///
/// 所有订阅共享同一个重放游标，重新订阅只会收到尚未送出的事件。
pub struct ReplayConnector {
    path: Option<PathBuf>,
    pacing: Duration,
    /// 下一条待送出的行号
    cursor: Arc<AtomicUsize>,
    tasks: Mutex<HashMap<u64, JoinHandle<()>>>,
    next_id: AtomicU64,
}

impl ReplayConnector {
    pub fn new(path: Option<PathBuf>) -> Self {
        Self {
            path,
            pacing: Duration::ZERO,
            cursor: Arc::new(AtomicUsize::new(0)),
            tasks: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(0),
        }
    }

    /// 相邻事件之间的间隔
    pub fn with_pacing(mut self, pacing: Duration) -> Self {
        self.pacing = pacing;
        self
    }

    /// 已经消费的行数，包括被跳过的空行和坏行
    pub fn position(&self) -> usize {
        self.cursor.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DomainConnector for ReplayConnector {
    async fn connect(&self, _credentials: &Credentials) -> anyhow::Result<()> {
        if let Some(path) = &self.path {
            if !tokio::fs::try_exists(path).await? {
                anyhow::bail!("replay file {} does not exist", path.display());
            }
        }
        Ok(())
    }

    async fn subscribe(&self, request: ScanRequest) -> anyhow::Result<Subscription> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        let (tx, rx) = mpsc::channel(SUBSCRIPTION_CAPACITY);

        let Some(path) = self.path.clone() else {
            info!(domain_id = %request.domain_id, "No replay file configured, subscription stays idle");
            // 保留发送端，订阅保持打开
            let task = tokio::spawn(async move {
                tx.closed().await;
            });
            self.tasks.lock().await.insert(id, task);
            return Ok(Subscription { id, events: rx });
        };

        let content = tokio::fs::read_to_string(&path).await?;
        let pacing = self.pacing;
        let cursor = self.cursor.clone();
        let task = tokio::spawn(async move {
            let mut replayed = 0usize;
            for (line_no, line) in content.lines().enumerate() {
                if line_no < cursor.load(Ordering::SeqCst) {
                    continue;
                }
                let line = line.trim();
                if line.is_empty() {
                    cursor.fetch_max(line_no + 1, Ordering::SeqCst);
                    continue;
                }
                let event: DomainEvent = match serde_json::from_str(line) {
                    Ok(event) => event,
                    Err(e) => {
                        warn!(line = line_no + 1, error = %e, "Skipping malformed replay event");
                        cursor.fetch_max(line_no + 1, Ordering::SeqCst);
                        continue;
                    }
                };
                if tx.send(event).await.is_err() {
                    break;
                }
                // send 完成到这里之间没有挂起点，中止任务不会漏记游标
                cursor.fetch_max(line_no + 1, Ordering::SeqCst);
                replayed += 1;
                if !pacing.is_zero() {
                    tokio::time::sleep(pacing).await;
                }
            }
            debug!(replayed, "Replay finished");
        });

        self.tasks.lock().await.insert(id, task);
        Ok(Subscription { id, events: rx })
    }

    async fn unsubscribe(&self, subscription_id: u64) -> anyhow::Result<()> {
        if let Some(task) = self.tasks.lock().await.remove(&subscription_id) {
            task.abort();
        }
        Ok(())
    }

    async fn disconnect(&self) -> anyhow::Result<()> {
        for (_, task) in self.tasks.lock().await.drain() {
            task.abort();
        }
        Ok(())
    }
}
