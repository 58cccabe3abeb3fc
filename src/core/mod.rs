pub mod fallback;
pub mod llm;
pub mod mock;
pub mod transport;

pub use transport::{ModelHint, ModelSelector, StaticModelSelector, TransportError, TransportPort};
