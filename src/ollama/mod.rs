pub mod client;
pub mod error;
pub mod types;

pub use client::{ModelClient, OllamaClient};
pub use error::OllamaError;
pub use types::{GenerateRequest, GenerateResponse};
