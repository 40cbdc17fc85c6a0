//! PROC — Parallel Request Orchestration Core
//!
//! A research-orchestration server that exposes a small set of tools over a
//! stdio-framed JSON-RPC protocol. Each tool fans a batch of research inputs
//! out to a third-party HTTP service (a Google search proxy, the Reddit
//! OAuth API, a scraping proxy, or a chat-completion proxy) under bounded
//! concurrency with classified, policy-driven retry, then folds the results
//! into one structured Markdown reply. See SPEC_FULL.md for the full
//! component breakdown (C1-C12).

#![allow(dead_code)]

pub mod adapters;
pub mod allocator;
pub mod config;
pub mod context;
pub mod dispatch;
pub mod error;
pub mod fanout;
pub mod handlers;
pub mod ranking;
pub mod retry;
pub mod supervisor;

pub use config::{Capabilities, ProcConfig, Tunables};
pub use context::AppContext;
pub use error::{ClassifiableFailure, ClassifiedError, ErrorKind};
pub use fanout::{run_bounded, run_bounded_or};
pub use retry::{run_with_retry, RetryPolicy};
pub use supervisor::Supervisor;
