//! Embedding providers.

#[cfg(feature = "embedding-ollama")]
mod ollama;
#[cfg(feature = "embedding-openai")]
mod openai;

mod null;

pub use null::NullEmbeddingProvider;
#[cfg(feature = "embedding-ollama")]
pub use ollama::OllamaEmbeddingProvider;
#[cfg(feature = "embedding-openai")]
pub use openai::OpenAiEmbeddingProvider;
