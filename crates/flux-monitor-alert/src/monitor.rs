use crate::composer::{Alert, AlertComposer};
use crate::evaluator::{Evaluation, ThresholdEvaluator};
use crate::threshold::Threshold;
use flux_monitor_core::{Observation, OutputPorts};
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::Mutex;
use tracing::{debug, error, info};

/// 指标监控：逐个阈值评估观测值，超限时组装并发送告警
pub struct MetricsMonitor {
    thresholds: Vec<Threshold>,
    evaluator: Mutex<ThresholdEvaluator>,
    composer: AlertComposer,
    ports: OutputPorts,
    failed_emissions: AtomicU64,
}

impl MetricsMonitor {
    pub fn new(thresholds: Vec<Threshold>, ports: OutputPorts) -> Self {
        info!("Metrics monitor created with {} thresholds", thresholds.len());
        let evaluator = ThresholdEvaluator::new(&thresholds);
        Self {
            thresholds,
            evaluator: Mutex::new(evaluator),
            composer: AlertComposer::new(),
            ports,
            failed_emissions: AtomicU64::new(0),
        }
    }

    pub fn thresholds(&self) -> &[Threshold] {
        &self.thresholds
    }

    /// 处理一个观测值，返回本次发出的告警
    pub async fn process(&self, observation: &Observation) -> Vec<Alert> {
        let alerts: Vec<Alert> = {
            let mut evaluator = self.evaluator.lock().await;
            evaluator.observe(observation);

            self.thresholds
                .iter()
                .filter_map(|threshold| match evaluator.evaluate(observation, threshold) {
                    Evaluation::Breach(breach) => Some(self.composer.compose(
                        observation,
                        breach.current_value,
                        threshold,
                    )),
                    Evaluation::NoBreach => None,
                })
                .collect()
        };

        for alert in &alerts {
            self.emit(alert).await;
        }

        alerts
    }

    /// 发送告警；发送失败只记录日志，不影响后续评估
    pub async fn emit(&self, alert: &Alert) {
        let secondary = self.ports.secondary();
        let records = alert.to_records(secondary.map(|p| p.as_ref()));

        if let Err(e) = self.ports.primary().submit(records.primary).await {
            self.failed_emissions.fetch_add(1, Ordering::Relaxed);
            error!(error = %e, "Failed to submit alert record on port 0");
        }

        if let (Some(port), Some(record)) = (secondary, records.secondary) {
            if let Err(e) = port.submit(record).await {
                self.failed_emissions.fetch_add(1, Ordering::Relaxed);
                error!(error = %e, "Failed to submit alert record on port 1");
            }
        }

        debug!(
            metric = %alert.observation.metric_name,
            threshold_type = %alert.threshold.kind,
            "Alert emitted"
        );
    }

    pub fn failed_emissions(&self) -> u64 {
        self.failed_emissions.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::threshold::{Comparison, ThresholdType};
    use flux_monitor_core::{ChannelPort, MetricAttribute};
    use std::sync::Arc;

    #[tokio::test]
    async fn test_process_emits_on_both_ports() {
        let (p0, mut rx0) = ChannelPort::new("alerts", 8);
        let (p1, mut rx1) = ChannelPort::new("values", 8);
        let p1 = p1.with_fields(["currentValue", "thresholdValue", "jobName"]);
        let ports = OutputPorts::new(Arc::new(p0)).with_secondary(Arc::new(p1));

        let monitor = MetricsMonitor::new(
            vec![Threshold::new(ThresholdType::Value, Comparison::GreaterThan, 100.0)],
            ports,
        );

        let obs = Observation::new("cpu", 150.0).with_attribute(MetricAttribute::JobName, "j1");
        let alerts = monitor.process(&obs).await;
        assert_eq!(alerts.len(), 1);

        let primary = rx0.recv().await.unwrap();
        assert!(primary.get_str("message").unwrap().starts_with("value of cpu reached!"));

        let secondary = rx1.recv().await.unwrap();
        assert_eq!(secondary.get_f64("currentValue"), Some(150.0));
        assert_eq!(secondary.get_str("jobName"), Some("j1"));

        assert!(monitor.process(&Observation::new("cpu", 10.0)).await.is_empty());
    }

    #[test]
    fn test_emission_failure_does_not_stop_evaluation() {
        let (p0, rx0) = ChannelPort::new("alerts", 8);
        drop(rx0);

        let monitor = MetricsMonitor::new(
            vec![Threshold::new(ThresholdType::Value, Comparison::GreaterThan, 1.0)],
            OutputPorts::new(Arc::new(p0)),
        );

        tokio_test::block_on(async {
            assert_eq!(monitor.process(&Observation::new("cpu", 5.0)).await.len(), 1);
            assert_eq!(monitor.process(&Observation::new("cpu", 6.0)).await.len(), 1);
        });
        assert_eq!(monitor.failed_emissions(), 2);
    }

    #[tokio::test]
    async fn test_multiple_thresholds() {
        let (p0, mut rx0) = ChannelPort::new("alerts", 8);
        let monitor = MetricsMonitor::new(
            vec![
                Threshold::new(ThresholdType::Value, Comparison::GreaterThan, 1.0),
                Threshold::new(ThresholdType::Rate, Comparison::GreaterThan, 1.0)
                    .with_time_frame(10_000),
            ],
            OutputPorts::new(Arc::new(p0)),
        );

        // 第一个样本只能触发瞬时值阈值
        let first = monitor
            .process(&Observation::new("q", 2.0).with_timestamp(0))
            .await;
        assert_eq!(first.len(), 1);

        let second = monitor
            .process(&Observation::new("q", 10.0).with_timestamp(1000))
            .await;
        assert_eq!(second.len(), 2);
        assert!(second[1].message.starts_with("rate of q reached!"));

        for _ in 0..3 {
            assert!(rx0.recv().await.is_some());
        }
    }
}
