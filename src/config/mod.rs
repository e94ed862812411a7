mod settings;

pub use settings::{
    LogConfig, OtelConfig, ProducerConfig, QueueSettings, ServerConfig, Settings, TransportConfig,
};
