//! Storage layer

pub mod database;
