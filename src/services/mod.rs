// src/services/mod.rs
pub mod gemini;
pub mod http;
pub mod orchestrator;
pub mod pinecone;
pub mod prompt;
pub mod retrieval;
