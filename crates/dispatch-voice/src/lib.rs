//! Voice-call provider integration for the dispatch backend.
//!
//! Places outbound phone calls and browser web calls through the Retell v2
//! API, fetches final call details (transcript and timestamps), and builds the
//! per-call agent prompt from an agent configuration.
//!
//! Callers depend on the [`CallProvider`] trait so that tests can substitute
//! a fake for [`RetellClient`].

pub mod config;
pub mod error;
pub mod prompt;
pub mod provider;
pub mod service;

pub use config::ProviderConfig;
pub use error::VoiceError;
pub use prompt::{begin_message, build_dynamic_prompt, CallContext};
pub use provider::{CallProvider, CallRequest, CreatedCall, ProviderCall};
pub use service::RetellClient;
