use crate::record::Record;
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::debug;

/// 输出错误
#[derive(Debug, Error)]
pub enum EmissionError {
    #[error("Output port {0} is closed")]
    Closed(String),

    #[error("Output port {port} rejected record: {reason}")]
    Rejected { port: String, reason: String },
}

/// 输出端口（宿主提供的输出通道）
#[async_trait]
pub trait OutputPort: Send + Sync {
    fn name(&self) -> &str;

    /// 端口声明的字段名；None 表示接受任意字段
    fn fields(&self) -> Option<&[String]> {
        None
    }

    fn accepts_field(&self, field: &str) -> bool {
        match self.fields() {
            Some(fields) => fields.iter().any(|f| f == field),
            None => true,
        }
    }

    async fn submit(&self, record: Record) -> Result<(), EmissionError>;
}

/// 基于 mpsc 通道的输出端口
pub struct ChannelPort {
    name: String,
    fields: Option<Vec<String>>,
    tx: mpsc::Sender<Record>,
}

impl ChannelPort {
    pub fn new(name: impl Into<String>, capacity: usize) -> (Self, mpsc::Receiver<Record>) {
        let (tx, rx) = mpsc::channel(capacity);
        (
            Self {
                name: name.into(),
                fields: None,
                tx,
            },
            rx,
        )
    }

    pub fn with_fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.fields = Some(fields.into_iter().map(Into::into).collect());
        self
    }
}

#[async_trait]
impl OutputPort for ChannelPort {
    fn name(&self) -> &str {
        &self.name
    }

    fn fields(&self) -> Option<&[String]> {
        self.fields.as_deref()
    }

    async fn submit(&self, record: Record) -> Result<(), EmissionError> {
        if let Some(fields) = &self.fields {
            if let Some((unknown, _)) = record.fields().find(|(k, _)| !fields.contains(k)) {
                return Err(EmissionError::Rejected {
                    port: self.name.clone(),
                    reason: format!("unknown field {}", unknown),
                });
            }
        }

        self.tx
            .send(record)
            .await
            .map_err(|_| EmissionError::Closed(self.name.clone()))?;

        debug!(port = %self.name, "Record submitted");
        Ok(())
    }
}

/// 源的输出端口集合：0 号为主端口，1 号可选
#[derive(Clone)]
pub struct OutputPorts {
    primary: Arc<dyn OutputPort>,
    secondary: Option<Arc<dyn OutputPort>>,
}

impl OutputPorts {
    pub fn new(primary: Arc<dyn OutputPort>) -> Self {
        Self {
            primary,
            secondary: None,
        }
    }

    pub fn with_secondary(mut self, port: Arc<dyn OutputPort>) -> Self {
        self.secondary = Some(port);
        self
    }

    pub fn primary(&self) -> &Arc<dyn OutputPort> {
        &self.primary
    }

    pub fn secondary(&self) -> Option<&Arc<dyn OutputPort>> {
        self.secondary.as_ref()
    }

    pub fn count(&self) -> usize {
        if self.secondary.is_some() {
            2
        } else {
            1
        }
    }
}
