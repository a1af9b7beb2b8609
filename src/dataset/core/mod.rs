//! Core types: configuration, errors and the conversation record model.

pub mod config;
pub mod errors;
pub mod message;

pub use config::{
    DEFAULT_SYSTEM_MESSAGE, DatasetConfig, FormConfig, LoadPolicy, ServerConfig, StorageConfig,
    WeightPolicy,
};
pub use errors::{DatasetError, DatasetResult};
pub use message::{Conversation, DEFAULT_WEIGHT, Message, Role, Weight};
