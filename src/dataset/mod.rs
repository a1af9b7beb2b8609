//! Conversation dataset subsystem.
//!
//! This module holds everything below the HTTP layer:
//! - `core`: configuration, errors and the message/conversation model
//! - `form`: validating submitted pairs and splitting records back for editing
//! - `codec`: line-delimited JSON encoding and decoding
//! - `store`: the write-through conversation store
//! - `export`: export artifacts and pluggable save destinations
//! - `preferences`: caller-owned session preferences

pub mod codec;
pub mod core;
pub mod export;
pub mod form;
pub mod preferences;
pub mod store;

pub use self::core::{
    Conversation, DEFAULT_SYSTEM_MESSAGE, DatasetConfig, DatasetError, DatasetResult, FormConfig,
    LoadPolicy, Message, Role, ServerConfig, StorageConfig, Weight, WeightPolicy,
};
pub use export::{
    DirectoryDestination, EXPORT_FILE_NAME, ExportArtifact, FileDestination, SaveDestination,
    export_to,
};
pub use form::{
    ConversationForm, EditDraft, MessagePair, PairingAnomaly, build_conversation,
    decompose_for_edit, zip_pairs,
};
pub use preferences::SessionPreferences;
pub use store::{ConversationStore, LoadReport, SaveOutcome};
