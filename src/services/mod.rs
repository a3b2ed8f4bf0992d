//! Business logic services

pub mod analysis;
pub mod documents;
pub mod llm;
