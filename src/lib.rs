//! Draft Assist — inbox notifications to AI-generated reply drafts.

pub mod config;
pub mod error;
pub mod guard;
pub mod http;
pub mod llm;
pub mod pipeline;
pub mod records;
pub mod store;
