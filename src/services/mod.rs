pub mod export;
pub mod image;
pub mod llm;
pub mod scriptwriter;
pub mod setup;
pub mod workflow;
