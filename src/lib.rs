//! Parley — conversation engine for terminal LLM chat.
//!
//! Keeps multi-turn dialogue state with a bounded context window and streams
//! answers from one of two backends behind a single [`ChatBackend`] trait:
//! the OpenAI chat completions API (server-sent events over HTTP) and the
//! iFlytek Spark API (a signed WebSocket).
//!
//! # Quick Start
//!
//! ```no_run
//! use parley::prelude::*;
//!
//! # async fn example() -> parley::error::Result<()> {
//! let config = ParleyConfig::default().with_env_overrides();
//! let mut session = ChatSession::new(config, BackendKind::OpenAi)?;
//!
//! let mut fragment = session.ask("Hello!").await?;
//! print!("{}", fragment.text);
//! while !fragment.is_final {
//!     fragment = session.poll().await?;
//!     print!("{}", fragment.text);
//! }
//! session.save()?;
//! # Ok(())
//! # }
//! ```
//!
//! [`ChatBackend`]: provider::ChatBackend

pub mod config;
pub mod error;
pub mod prelude;
pub mod provider;
pub mod session;
pub mod tokenizer;
pub mod types;
pub mod util;
