//! Language-model access.

pub mod gateway;

pub use gateway::{ChatCompletionsGateway, ModelGateway};
