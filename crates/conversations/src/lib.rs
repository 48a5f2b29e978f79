//! # Conversations
//!
//! Presents GitHub issues and pull requests as chat threads between humans
//! and AI agents, and triages each thread by how urgently a human should
//! look at it.
//!
//! This crate provides:
//! - Label-history replay to work out which agent phase was active when a
//!   message was posted
//! - Message normalization with three-tier agent attribution
//! - Attention classification from labels, type and the trailing message
//! - Multi-repository conversation assembly
//! - An HTTP API and CLI over the above
//!
//! ## Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use conversations::{ConversationAssembler, GitHubClient, RepoRef};
//!
//! let client = GitHubClient::new(token, DEFAULT_API_URL, "conversations", timeout)?;
//! let assembler = ConversationAssembler::new(Arc::new(client));
//!
//! let repos = vec!["acme/widgets".parse::<RepoRef>()?];
//! let conversations = assembler.list_conversations(&repos).await?;
//! ```

// Domain types
pub mod models;

// Error types
pub mod error;

// GitHub access
pub mod github;

// Synthesis pipeline
pub mod timeline;
pub mod roles;
pub mod tags;
pub mod normalizer;
pub mod classifier;
pub mod assembler;

// Tracked repository settings
pub mod store;

// HTTP API
pub mod server;

// Terminal formatting helpers
pub mod display;

// Runtime configuration
pub mod config;

// Re-export key types for convenience
pub use assembler::{ConversationAssembler, ConversationDetail};
pub use classifier::classify;
pub use config::{Config, ConfigArgs, StoreBackend};
pub use error::{ConversationError, Result};
pub use github::{GitHubClient, GitHubProvider};
pub use models::{
    AgentType, AttentionLevel, Author, Conversation, ConversationId, ConversationKind,
    ConversationState, Label, LabelEvent, LabelEventKind, Message, MessageKind, RepoRef,
};
pub use normalizer::{normalize, RawThread};
pub use roles::resolve;
pub use store::{build_store, FileRepoStore, MemoryRepoStore, RepoStore};
pub use timeline::{fetch_label_timeline, LabelTimeline};
