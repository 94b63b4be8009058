use crate::connector::{DomainConnector, ScanRequest};
use crate::error::{SourceError, TeardownError};
use flux_monitor_alert::MetricsMonitor;
use flux_monitor_core::{ConnectionNotification, DomainEvent, OperatorType, OutputPorts};
use flux_monitor_filter::FilterSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

const CLOSE_TIMEOUT: Duration = Duration::from_secs(5);

/// 扫描器共享的外部协作者
#[derive(Clone)]
pub struct ScannerContext {
    pub connector: Arc<dyn DomainConnector>,
    pub ports: OutputPorts,
    pub monitor: Option<Arc<MetricsMonitor>>,
    /// 收到连接关闭或失败通知时通知生命周期
    pub connection_lost: Option<mpsc::UnboundedSender<ConnectionNotification>>,
}

/// 转发统计
#[derive(Debug, Default)]
pub struct ForwardStats {
    forwarded: AtomicU64,
    filtered: AtomicU64,
    failed: AtomicU64,
}

impl ForwardStats {
    pub fn forwarded(&self) -> u64 {
        self.forwarded.load(Ordering::Relaxed)
    }

    pub fn filtered(&self) -> u64 {
        self.filtered.load(Ordering::Relaxed)
    }

    pub fn failed(&self) -> u64 {
        self.failed.load(Ordering::Relaxed)
    }
}

/// 域扫描器：持有一次事件订阅，按过滤集合把事件转发到输出端口
///
/// `close` 返回后不会再有该扫描器的事件被提交。
pub struct DomainScanner {
    domain_id: String,
    subscription_id: u64,
    connector: Arc<dyn DomainConnector>,
    stop: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<()>>,
    stats: Arc<ForwardStats>,
}

impl DomainScanner {
    /// 打开扫描器；非日志源要求域标识被过滤集合接受
    pub async fn open(
        context: &ScannerContext,
        domain_id: &str,
        filters: Arc<FilterSet>,
        scan_period: Option<Duration>,
    ) -> Result<Self, SourceError> {
        let operator_type = filters.operator_type();
        if operator_type.is_domain_scoped() && !filters.matches_domain_id(domain_id) {
            return Err(SourceError::DomainMismatch {
                domain_id: domain_id.to_string(),
                document: "the active filter set".to_string(),
            });
        }

        let request = ScanRequest {
            domain_id: domain_id.to_string(),
            operator_type,
            filters: filters.clone(),
            scan_period,
        };
        let subscription = context
            .connector
            .subscribe(request)
            .await
            .map_err(|e| SourceError::Scanner(e.to_string()))?;

        let stats = Arc::new(ForwardStats::default());
        let (stop_tx, stop_rx) = oneshot::channel();
        let forwarder = Forwarder {
            operator_type,
            filters,
            ports: context.ports.clone(),
            monitor: context.monitor.clone(),
            connection_lost: context.connection_lost.clone(),
            stats: stats.clone(),
        };
        let task = tokio::spawn(forwarder.run(subscription.events, stop_rx));

        info!(
            domain_id = %domain_id,
            operator_type = %operator_type,
            subscription_id = subscription.id,
            "Domain scanner opened"
        );

        Ok(Self {
            domain_id: domain_id.to_string(),
            subscription_id: subscription.id,
            connector: context.connector.clone(),
            stop: Some(stop_tx),
            task: Some(task),
            stats,
        })
    }

    pub fn domain_id(&self) -> &str {
        &self.domain_id
    }

    pub fn subscription_id(&self) -> u64 {
        self.subscription_id
    }

    pub fn stats(&self) -> &ForwardStats {
        &self.stats
    }

    pub fn is_closed(&self) -> bool {
        self.task.is_none()
    }

    /// 停止转发并释放订阅；重复调用无副作用
    pub async fn close(&mut self) -> Result<(), TeardownError> {
        let Some(mut task) = self.task.take() else {
            return Ok(());
        };

        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }

        let mut result = match tokio::time::timeout(CLOSE_TIMEOUT, &mut task).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(TeardownError::Forwarder(e.to_string())),
            Err(_) => {
                task.abort();
                let _ = task.await;
                Err(TeardownError::Timeout)
            }
        };

        if let Err(e) = self.connector.unsubscribe(self.subscription_id).await {
            if result.is_ok() {
                result = Err(TeardownError::Unsubscribe {
                    id: self.subscription_id,
                    reason: e.to_string(),
                });
            } else {
                warn!(subscription_id = self.subscription_id, error = %e, "Failed to release subscription");
            }
        }

        info!(
            domain_id = %self.domain_id,
            forwarded = self.stats.forwarded(),
            filtered = self.stats.filtered(),
            "Domain scanner closed"
        );
        result
    }
}

impl Drop for DomainScanner {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            warn!(domain_id = %self.domain_id, "Domain scanner dropped without close");
            task.abort();
        }
    }
}

struct Forwarder {
    operator_type: OperatorType,
    filters: Arc<FilterSet>,
    ports: OutputPorts,
    monitor: Option<Arc<MetricsMonitor>>,
    connection_lost: Option<mpsc::UnboundedSender<ConnectionNotification>>,
    stats: Arc<ForwardStats>,
}

impl Forwarder {
    async fn run(self, mut events: mpsc::Receiver<DomainEvent>, mut stop: oneshot::Receiver<()>) {
        loop {
            tokio::select! {
                biased;
                _ = &mut stop => break,
                event = events.recv() => match event {
                    Some(event) => self.route(event).await,
                    None => {
                        debug!("Domain event stream ended");
                        break;
                    }
                },
            }
        }
    }

    async fn route(&self, event: DomainEvent) {
        match &event {
            DomainEvent::Connection(notification) => {
                if notification.notify_type.is_connection_loss() {
                    warn!(
                        notify_type = %notification.notify_type,
                        source = %notification.source,
                        "Domain connection lost"
                    );
                    if let Some(lost) = &self.connection_lost {
                        let _ = lost.send(notification.clone());
                    }
                }
                // 连接通知不参与过滤
                let port = if self.operator_type == OperatorType::ConnectionNotification {
                    Some(self.ports.primary())
                } else {
                    self.ports.secondary()
                };
                let Some(port) = port else {
                    debug!(notify_type = %notification.notify_type, "No port for connection notification");
                    return;
                };
                self.submit(port.as_ref(), &event).await;
                return;
            }
            other if other.operator_type() != Some(self.operator_type) => {
                debug!(
                    event_type = ?other.operator_type(),
                    operator_type = %self.operator_type,
                    "Dropping event of another source type"
                );
                return;
            }
            _ => {}
        }

        let admitted = match &event {
            DomainEvent::JobStatus(notification) => self.filters.admits(&notification.entity_path()),
            DomainEvent::Metric(observation) => self.filters.admits(&observation.entity_path()),
            _ => true,
        };
        if !admitted {
            self.stats.filtered.fetch_add(1, Ordering::Relaxed);
            return;
        }

        self.submit(self.ports.primary().as_ref(), &event).await;

        if let (Some(monitor), DomainEvent::Metric(observation)) = (&self.monitor, &event) {
            monitor.process(observation).await;
        }
    }

    async fn submit(&self, port: &dyn flux_monitor_core::OutputPort, event: &DomainEvent) {
        match port.submit(event.to_record()).await {
            Ok(()) => {
                self.stats.forwarded.fetch_add(1, Ordering::Relaxed);
            }
            Err(e) => {
                self.stats.failed.fetch_add(1, Ordering::Relaxed);
                error!(port = port.name(), error = %e, "Failed to submit domain event");
            }
        }
    }
}

/// 扫描器槽位：同一时刻最多一个活动扫描器，必须先关闭旧的才能打开新的
#[derive(Default)]
pub struct ScannerSlot {
    active: Option<DomainScanner>,
}

impl ScannerSlot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_active(&self) -> bool {
        self.active.is_some()
    }

    pub fn get(&self) -> Option<&DomainScanner> {
        self.active.as_ref()
    }

    pub async fn open(
        &mut self,
        context: &ScannerContext,
        domain_id: &str,
        filters: Arc<FilterSet>,
        scan_period: Option<Duration>,
    ) -> Result<(), SourceError> {
        if self.active.is_some() {
            return Err(SourceError::InvalidState(
                "a domain scanner is already active".to_string(),
            ));
        }
        let scanner = DomainScanner::open(context, domain_id, filters, scan_period).await?;
        self.active = Some(scanner);
        Ok(())
    }

    /// 关闭并清空槽位；即使关闭出错槽位也会被清空
    pub async fn close(&mut self) -> Result<(), TeardownError> {
        match self.active.take() {
            Some(mut scanner) => scanner.close().await,
            None => Ok(()),
        }
    }
}
