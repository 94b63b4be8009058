use clap::Parser;
use flux_monitor_alert::MetricsMonitor;
use flux_monitor_core::{ChannelPort, OutputPorts, Record};
use flux_monitor_filter::FilePropertySource;
use flux_monitor_source::{init_logging, LogFormat, MonitorSource, ReplayConnector, SourceConfig};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

const PORT_CAPACITY: usize = 1024;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Config file path
    #[arg(short, long, default_value = "flux-monitor.toml")]
    config: String,

    /// Log output format
    #[arg(long, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,
}

/// 把端口上的记录逐行打印为 JSON
fn spawn_printer(port: &'static str, mut records: mpsc::Receiver<Record>) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(record) = records.recv().await {
            let line = serde_json::json!({ "port": port, "record": record });
            println!("{}", line);
        }
    })
}

fn channel_ports(primary: &'static str, secondary: &'static str) -> (OutputPorts, Vec<JoinHandle<()>>) {
    let (port0, rx0) = ChannelPort::new(primary, PORT_CAPACITY);
    let (port1, rx1) = ChannelPort::new(secondary, PORT_CAPACITY);
    let ports = OutputPorts::new(Arc::new(port0)).with_secondary(Arc::new(port1));
    (ports, vec![spawn_printer(primary, rx0), spawn_printer(secondary, rx1)])
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_logging(args.log_format)?;

    tracing::info!("Starting FLUX monitor with config: {}", args.config);
    let config = SourceConfig::load(&args.config)?;

    let connector = Arc::new(ReplayConnector::new(config.replay_file.clone()));
    let (ports, mut printers) = channel_ports("events", "connection");
    let reload_interval = config.reload_interval();
    let property_file = config.application_configuration_file.clone();

    let monitor = if config.thresholds.is_empty() {
        None
    } else {
        let (alert_ports, alert_printers) = channel_ports("alerts", "alert-values");
        printers.extend(alert_printers);
        Some(Arc::new(MetricsMonitor::new(config.thresholds.clone(), alert_ports)))
    };

    let mut source = MonitorSource::new(config, connector, ports)?;
    if let Some(path) = property_file {
        source = source.with_property_source(Arc::new(FilePropertySource::new(path)));
    }
    if let Some(monitor) = monitor {
        source = source.with_metrics_monitor(monitor);
    }
    let source = Arc::new(source);

    source.initialize().await?;
    let poller = source.clone().start_polling(reload_interval);

    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutdown signal received");

    poller.abort();
    source.shutdown().await;

    match source.health().export() {
        Ok(metrics) => tracing::debug!("Final health metrics:\n{}", metrics),
        Err(e) => tracing::warn!("Failed to export health metrics: {}", e),
    }

    drop(source);
    for printer in printers {
        printer.abort();
    }

    Ok(())
}
