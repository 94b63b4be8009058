pub mod attribute;
pub mod event;
pub mod observation;
pub mod operator;
pub mod port;
pub mod record;

pub use attribute::{AttributeValue, MetricAttribute};
pub use event::{
    ConnectionNotification, ConnectionNotificationType, DomainEvent, EntityPath,
    JobStatusNotification, LogRecord,
};
pub use observation::{Observation, SeriesKey};
pub use operator::OperatorType;
pub use port::{ChannelPort, EmissionError, OutputPort, OutputPorts};
pub use record::Record;
