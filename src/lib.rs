pub mod chat;
pub mod knowledge;
pub mod llm;
pub mod retriever;
pub mod utils;
pub mod vector_db;
