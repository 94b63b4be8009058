use crate::config::{Credentials, SourceConfig, CREDENTIALS_PROPERTY};
use crate::connector::DomainConnector;
use crate::error::{SourceError, TeardownError};
use crate::health::ConnectionHealth;
use crate::scanner::{ScannerContext, ScannerSlot};
use flux_monitor_alert::MetricsMonitor;
use flux_monitor_core::{ConnectionNotification, OperatorType, OutputPorts};
use flux_monitor_filter::{has_changed, FilterDocument, FilterLoader, FilterSet, PropertySource};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// 监控源生命周期状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceState {
    Uninitialized,
    Initializing,
    Running,
    /// 旧扫描器已拆除，新扫描器尚未成功打开
    ReloadPending,
    /// 域连接已关闭或失败，等待下次轮询重连
    Disconnected,
    Closed,
}

impl fmt::Display for SourceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SourceState::Uninitialized => "uninitialized",
            SourceState::Initializing => "initializing",
            SourceState::Running => "running",
            SourceState::ReloadPending => "reload-pending",
            SourceState::Disconnected => "disconnected",
            SourceState::Closed => "closed",
        };
        f.write_str(s)
    }
}

/// 一次过滤文档检查的结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReloadOutcome {
    Unchanged,
    Reloaded,
    /// 新文档未通过校验，旧扫描器继续工作
    Rejected(String),
}

struct SourceInner {
    state: SourceState,
    filters: Option<Arc<FilterSet>>,
    document: Option<FilterDocument>,
    /// 当前生效的动态文档原文，用于变更检测
    active_dynamic: Option<String>,
    /// 最近一次被拒绝的动态文档原文
    rejected_dynamic: Option<String>,
    scanner: ScannerSlot,
}

/// 监控源
///
/// 负责初始化过滤集合和连接、打开域扫描器，并在动态配置变化时重建扫描器。
/// 初始化、重载和关闭都在同一把锁下进行，因此彼此串行。
pub struct MonitorSource {
    config: SourceConfig,
    loader: FilterLoader,
    context: ScannerContext,
    health: ConnectionHealth,
    inner: Mutex<SourceInner>,
    /// 扫描器上报的连接丢失通知，由轮询任务接收
    connection_lost: Mutex<Option<mpsc::UnboundedReceiver<ConnectionNotification>>>,
}

impl MonitorSource {
    pub fn new(
        config: SourceConfig,
        connector: Arc<dyn DomainConnector>,
        ports: OutputPorts,
    ) -> Result<Self, SourceError> {
        config.validate()?;
        let health = ConnectionHealth::new()
            .map_err(|e| SourceError::Configuration(format!("health metrics: {}", e)))?;
        let loader = FilterLoader::new(config.loader_config());
        let (lost_tx, lost_rx) = mpsc::unbounded_channel();

        Ok(Self {
            config,
            loader,
            context: ScannerContext {
                connector,
                ports,
                monitor: None,
                connection_lost: Some(lost_tx),
            },
            health,
            inner: Mutex::new(SourceInner {
                state: SourceState::Uninitialized,
                filters: None,
                document: None,
                active_dynamic: None,
                rejected_dynamic: None,
                scanner: ScannerSlot::new(),
            }),
            connection_lost: Mutex::new(Some(lost_rx)),
        })
    }

    pub fn with_property_source(mut self, source: Arc<dyn PropertySource>) -> Self {
        self.loader = FilterLoader::new(self.config.loader_config()).with_property_source(source);
        self
    }

    pub fn with_metrics_monitor(mut self, monitor: Arc<MetricsMonitor>) -> Self {
        self.context.monitor = Some(monitor);
        self
    }

    pub fn config(&self) -> &SourceConfig {
        &self.config
    }

    pub fn operator_type(&self) -> OperatorType {
        self.config.operator_type()
    }

    pub fn health(&self) -> &ConnectionHealth {
        &self.health
    }

    pub async fn state(&self) -> SourceState {
        self.inner.lock().await.state
    }

    pub async fn active_filters(&self) -> Option<Arc<FilterSet>> {
        self.inner.lock().await.filters.clone()
    }

    pub async fn active_document(&self) -> Option<FilterDocument> {
        self.inner.lock().await.document.clone()
    }

    pub async fn has_active_scanner(&self) -> bool {
        self.inner.lock().await.scanner.is_active()
    }

    /// 初始化：加载过滤集合、校验域、建立连接并打开扫描器
    ///
    /// 日志源跳过过滤文档和域校验。任何错误都会中止初始化，源进入 Closed。
    pub async fn initialize(&self) -> Result<(), SourceError> {
        let mut inner = self.inner.lock().await;
        if inner.state != SourceState::Uninitialized {
            return Err(SourceError::InvalidState(format!(
                "cannot initialize a source in state {}",
                inner.state
            )));
        }
        inner.state = SourceState::Initializing;

        match self.setup(&mut inner).await {
            Ok(()) => {
                inner.state = SourceState::Running;
                info!(
                    domain_id = %self.config.domain_id,
                    operator_type = %self.operator_type(),
                    "Monitoring source initialized"
                );
                Ok(())
            }
            Err(e) => {
                error!(domain_id = %self.config.domain_id, error = %e, "Monitoring source initialization failed");
                if let Err(teardown) = self.close_domain_handler(&mut inner).await {
                    warn!(error = %teardown, "Cleanup after failed initialization reported an error");
                }
                inner.state = SourceState::Closed;
                Err(e)
            }
        }
    }

    async fn setup(&self, inner: &mut SourceInner) -> Result<(), SourceError> {
        let operator_type = self.operator_type();

        let filters = if self.config.operator.requires_filters() {
            let (document, filters) = self.loader.load().await?;
            if !filters.matches_domain_id(&self.config.domain_id) {
                return Err(SourceError::DomainMismatch {
                    domain_id: self.config.domain_id.clone(),
                    document: document.origin().to_string(),
                });
            }
            if document.is_dynamic() {
                inner.active_dynamic = Some(document.raw().to_string());
            }
            inner.document = Some(document);
            Arc::new(filters)
        } else {
            debug!("Log sources do not use a filter document");
            Arc::new(FilterSet::empty(operator_type))
        };
        inner.filters = Some(filters.clone());

        let credentials = self.resolve_credentials().await;
        self.context
            .connector
            .connect(&credentials)
            .await
            .map_err(|e| SourceError::Connection(e.to_string()))?;
        self.health.mark_connected();

        inner
            .scanner
            .open(
                &self.context,
                &self.config.domain_id,
                filters,
                self.config.operator.scan_period(),
            )
            .await
    }

    /// 连接凭据：配置未设置时回退到应用配置的 `credentials` 属性
    async fn resolve_credentials(&self) -> Credentials {
        if !self.config.credentials.is_empty() {
            return self.config.credentials.clone();
        }

        match self.loader.fetch_property(CREDENTIALS_PROPERTY).await {
            Ok(Some(credentials)) => {
                debug!("Using credentials from application configuration");
                Credentials {
                    credentials: Some(credentials),
                    ..Credentials::default()
                }
            }
            Ok(None) => Credentials::default(),
            Err(e) => {
                warn!(error = %e, "Failed to read credentials from application configuration");
                Credentials::default()
            }
        }
    }

    /// 检查动态过滤文档是否变化，变化时重建扫描器
    ///
    /// 新文档先完成解析和域校验，通过后才拆除旧扫描器；校验失败时旧扫描器保持不变，
    /// 相同内容在后续轮询中不再重试。静态文档从不触发重载。
    pub async fn check_filter_document(&self) -> Result<ReloadOutcome, SourceError> {
        if !self.loader.tracks_dynamic_source() {
            return Ok(ReloadOutcome::Unchanged);
        }

        let raw = match self.loader.fetch_dynamic().await {
            Ok(Some(raw)) => raw,
            Ok(None) => return Ok(ReloadOutcome::Unchanged),
            Err(e) => {
                warn!(error = %e, "Failed to read application configuration");
                return Ok(ReloadOutcome::Unchanged);
            }
        };

        let mut inner = self.inner.lock().await;
        match inner.state {
            SourceState::Running | SourceState::ReloadPending => {}
            state => {
                debug!(%state, "Skipping filter document check");
                return Ok(ReloadOutcome::Unchanged);
            }
        }

        if !has_changed(inner.active_dynamic.as_deref(), &raw) {
            return Ok(ReloadOutcome::Unchanged);
        }
        if inner.rejected_dynamic.as_deref() == Some(raw.as_str()) {
            debug!("Filter document was rejected before, ignoring");
            return Ok(ReloadOutcome::Unchanged);
        }

        info!("filterDocument has changed: {}", raw);
        let name = self
            .config
            .application_configuration
            .clone()
            .unwrap_or_default();
        let document = FilterDocument::from_application_configuration(name, raw.clone());

        let filters = match self.validate(&document) {
            Ok(filters) => filters,
            Err(e) => {
                error!(error = %e, "New filter document rejected, keeping the active scanner");
                inner.rejected_dynamic = Some(raw);
                return Ok(ReloadOutcome::Rejected(e.to_string()));
            }
        };

        inner.state = SourceState::ReloadPending;
        if let Err(e) = inner.scanner.close().await {
            error!(error = %e, "Failed to close the domain scanner");
        }

        let filters = Arc::new(filters);
        inner.filters = Some(filters.clone());
        inner.document = Some(document);

        match inner
            .scanner
            .open(
                &self.context,
                &self.config.domain_id,
                filters,
                self.config.operator.scan_period(),
            )
            .await
        {
            Ok(()) => {
                inner.active_dynamic = Some(raw);
                inner.rejected_dynamic = None;
                inner.state = SourceState::Running;
                info!(domain_id = %self.config.domain_id, "Domain scanner rebuilt with new filter document");
                Ok(ReloadOutcome::Reloaded)
            }
            Err(e) => {
                error!(error = %e, "Failed to reopen the domain scanner, retrying on next check");
                Err(e)
            }
        }
    }

    fn validate(&self, document: &FilterDocument) -> Result<FilterSet, SourceError> {
        let filters = document.parse(self.operator_type())?;
        if self.config.operator.requires_filters()
            && !filters.matches_domain_id(&self.config.domain_id)
        {
            return Err(SourceError::DomainMismatch {
                domain_id: self.config.domain_id.clone(),
                document: document.origin().to_string(),
            });
        }
        Ok(filters)
    }

    /// 按固定间隔检查过滤文档
    ///
    /// 连接丢失通知到达时立即拆除扫描器和连接，下一次 tick 重连。
    pub fn start_polling(self: Arc<Self>, interval: Duration) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut lost = self.connection_lost.lock().await.take();
            if lost.is_none() {
                warn!("Connection loss notifications are already consumed by another poller");
            }

            let mut ticker = tokio::time::interval(interval);
            // 第一次 tick 立即返回，初始化时已经加载过
            ticker.tick().await;
            loop {
                tokio::select! {
                    _ = ticker.tick() => {}
                    Some(notification) = next_connection_loss(&mut lost) => {
                        self.handle_connection_lost(&notification).await;
                        continue;
                    }
                }

                match self.state().await {
                    SourceState::Closed => {
                        debug!("Source closed, stopping filter document polling");
                        break;
                    }
                    SourceState::Disconnected => {
                        if let Err(e) = self.reconnect().await {
                            warn!("Reconnect failed, retrying on next check: {}", e);
                        }
                        continue;
                    }
                    _ => {}
                }

                match self.check_filter_document().await {
                    Ok(ReloadOutcome::Reloaded) => info!("Filter document reloaded"),
                    Ok(ReloadOutcome::Rejected(reason)) => {
                        warn!("Filter document reload rejected: {}", reason)
                    }
                    Ok(ReloadOutcome::Unchanged) => {}
                    Err(e) => warn!("Filter document reload failed: {}", e),
                }
            }
        })
    }

    /// 处理连接关闭或失败：释放扫描器和连接，进入 Disconnected
    ///
    /// 返回是否真正拆除了连接；源不在运行中时忽略通知。
    pub async fn handle_connection_lost(&self, notification: &ConnectionNotification) -> bool {
        let mut inner = self.inner.lock().await;
        match inner.state {
            SourceState::Running | SourceState::ReloadPending => {}
            state => {
                debug!(%state, notify_type = %notification.notify_type, "Ignoring connection loss");
                return false;
            }
        }

        if let Err(e) = self.close_domain_handler(&mut inner).await {
            warn!(error = %e, "Cleanup after connection loss reported an error");
        }
        inner.state = SourceState::Disconnected;
        warn!(
            domain_id = %self.config.domain_id,
            notify_type = %notification.notify_type,
            "Domain connection lost, reconnecting on next check"
        );
        true
    }

    /// 重新建立连接并用当前过滤集合打开扫描器
    ///
    /// 仅在 Disconnected 状态下生效，返回是否完成重连。失败时保持 Disconnected。
    pub async fn reconnect(&self) -> Result<bool, SourceError> {
        let mut inner = self.inner.lock().await;
        if inner.state != SourceState::Disconnected {
            return Ok(false);
        }

        if !self.health.is_connected() {
            let credentials = self.resolve_credentials().await;
            self.context
                .connector
                .connect(&credentials)
                .await
                .map_err(|e| SourceError::Connection(e.to_string()))?;
            self.health.mark_connected();
        }

        let filters = inner
            .filters
            .clone()
            .unwrap_or_else(|| Arc::new(FilterSet::empty(self.operator_type())));
        inner
            .scanner
            .open(
                &self.context,
                &self.config.domain_id,
                filters,
                self.config.operator.scan_period(),
            )
            .await?;

        inner.state = SourceState::Running;
        info!(domain_id = %self.config.domain_id, "Domain connection re-established");
        Ok(true)
    }

    /// 关闭源：尽力释放扫描器和连接，错误只记录
    pub async fn shutdown(&self) {
        let mut inner = self.inner.lock().await;
        if inner.state == SourceState::Closed {
            return;
        }

        if let Err(e) = self.close_domain_handler(&mut inner).await {
            error!(error = %e, "Error while shutting down the monitoring source");
        }
        inner.filters = None;
        inner.state = SourceState::Closed;
        info!(domain_id = %self.config.domain_id, "Monitoring source closed");
    }

    async fn close_domain_handler(&self, inner: &mut SourceInner) -> Result<(), TeardownError> {
        let scanner_result = inner.scanner.close().await;

        let mut result = scanner_result;
        if self.health.is_connected() {
            if let Err(e) = self.context.connector.disconnect().await {
                let err = TeardownError::Disconnect(e.to_string());
                if result.is_ok() {
                    result = Err(err);
                } else {
                    warn!(error = %err, "Failed to disconnect");
                }
            }
        }
        self.health.mark_disconnected();
        result
    }
}

async fn next_connection_loss(
    lost: &mut Option<mpsc::UnboundedReceiver<ConnectionNotification>>,
) -> Option<ConnectionNotification> {
    match lost {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}
