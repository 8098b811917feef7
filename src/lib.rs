//! Turns customer-support conversations into tracked work items.
//!
//! The crate's core is the Integration Request Pipeline ([`pipeline::Engine`]):
//! a fixed six-step workflow that checks for an existing tracker record,
//! asks an LLM to pick or propose one, provisions a chat channel, links it
//! back to the tracker, and invites the right operators. Progress is
//! observable live through the [`coordinator::Coordinator`] subscription bus,
//! and failed steps can be retried individually or from scratch.
//!
//! A smaller, independent [`notifier`] flow watches for a tracker item being
//! marked done and posts a completion notice to its chat channel and every
//! linked helpdesk conversation.
//!
//! HTTP transport, the inbound webhook server, and CLI/config wiring are
//! intentionally outside this crate's scope. It exposes typed interfaces
//! (`adapters`) and pure decoding/decision logic (`webhook`) for a thin
//! outer layer to drive.

pub mod adapters;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod models;
pub mod notifier;
pub mod pipeline;
pub mod url_extract;
pub mod user_matcher;
pub mod webhook;

pub use adapters::{Adapters, Chat, Helpdesk, KnowledgeBase, Llm};
pub use config::Config;
pub use coordinator::{Coordinator, CoordinatorError};
pub use error::Error;
pub use models::{AIDecision, ChannelInfo, Request, RequestEvent, RequestStatus, Step, StepResult, StepStatus, StepType, Ticket};
pub use pipeline::Engine;
