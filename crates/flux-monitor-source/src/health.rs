use prometheus::{Encoder, IntCounter, IntGauge, Opts, Registry, TextEncoder};
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{info, warn};

/// 连接健康指标
///
/// - `flux_monitor_connected`：当前连接时为 1，否则为 0
/// - `flux_monitor_broken_connections_total`：已建立的连接被关闭的次数
pub struct ConnectionHealth {
    connected_flag: AtomicBool,
    connected: IntGauge,
    broken_connections: IntCounter,
    registry: Registry,
}

impl ConnectionHealth {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let connected = IntGauge::with_opts(Opts::new(
            "flux_monitor_connected",
            "Whether the monitoring source is connected to its domain",
        ))?;
        registry.register(Box::new(connected.clone()))?;

        let broken_connections = IntCounter::with_opts(Opts::new(
            "flux_monitor_broken_connections_total",
            "Number of domain connections that were closed",
        ))?;
        registry.register(Box::new(broken_connections.clone()))?;

        Ok(Self {
            connected_flag: AtomicBool::new(false),
            connected,
            broken_connections,
            registry,
        })
    }

    pub fn mark_connected(&self) {
        self.connected_flag.store(true, Ordering::SeqCst);
        self.connected.set(1);
        info!("Domain connection established");
    }

    /// 标记连接断开；仅在之前处于连接状态时累加断连计数，返回是否发生了状态变化
    pub fn mark_disconnected(&self) -> bool {
        if !self.connected_flag.swap(false, Ordering::SeqCst) {
            return false;
        }
        self.broken_connections.inc();
        self.connected.set(0);
        warn!(
            broken_connections = self.broken_connections.get(),
            "Domain connection closed"
        );
        true
    }

    pub fn is_connected(&self) -> bool {
        self.connected_flag.load(Ordering::SeqCst)
    }

    pub fn broken_connections(&self) -> u64 {
        self.broken_connections.get()
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// 以 Prometheus 文本格式导出
    pub fn export(&self) -> Result<String, prometheus::Error> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}
