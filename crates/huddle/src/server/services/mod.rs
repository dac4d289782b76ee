pub mod chunker;
pub mod embeddings;
pub mod errors;
pub mod extract;
pub mod generation;
pub mod openai;
pub mod orchestrator;
pub mod prompt;
pub mod retriever;
pub mod similarity;
pub mod streaming;
pub mod vector_index;
