mod settings;

pub use settings::{
    ExecutorConfig, HistoryConfig, LLMConfig, LoggingConfig, ModelsConfig, ProviderConfig,
    SessionConfig, Settings,
};
