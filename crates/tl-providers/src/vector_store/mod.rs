//! Vector store providers.

#[cfg(feature = "vectorstore-memory")]
mod memory;
#[cfg(feature = "vectorstore-qdrant")]
mod qdrant;

#[cfg(feature = "vectorstore-memory")]
pub use memory::MemoryVectorStoreProvider;
#[cfg(feature = "vectorstore-qdrant")]
pub use qdrant::QdrantVectorStoreProvider;
