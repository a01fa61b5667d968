//! # KPILens
//!
//! Client library for a supplier-KPI analytics dashboard: a REST client for
//! the dashboard backend, a streaming chat driver for natural-language
//! questions, and the view logic behind the dashboard and insight panels.
//!
//! ## Modules
//!
//! - [`backend`]: REST client and wire types
//! - [`chat`]: streaming chat driver and transcript
//! - [`dashboard`]: analytics accessors, chart options and the dashboard view
//! - [`insights`]: insight list with per-item feedback
//! - [`layout`]: shared layout signals
//! - [`config`]: file and environment configuration
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use kpilens::chat::{AbortSignal, ChatDriver, ChatSession};
//! use kpilens::{BackendClient, Config, DashboardView};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::load_default();
//!     let client = BackendClient::new(&config.backend)?;
//!
//!     // Dashboard
//!     let analytics = client.dashboard().await?;
//!     if let DashboardView::Ready(panels) = DashboardView::build(&analytics) {
//!         println!("{} trend charts", panels.trends.len());
//!     }
//!
//!     // Ask a question over the streaming endpoint
//!     let driver = ChatDriver::new(Arc::new(client));
//!     let mut session = ChatSession::new(config.chat.max_transcript);
//!     session
//!         .send(&driver, "Which supplier has the best delivery rate?", AbortSignal::never())
//!         .await?;
//!
//!     if let Some(answer) = session.last() {
//!         println!("{}", answer.content);
//!     }
//!     Ok(())
//! }
//! ```

pub mod backend;
pub mod chat;
pub mod config;
pub mod dashboard;
pub mod insights;
pub mod layout;

// Re-export top-level types for convenience
pub use backend::{BackendClient, BackendError, ChartBookmark, ChatAnswer, NewChart, UploadSummary};

pub use chat::{ChatDriver, ChatError, ChatMessage, ChatSession, Progress};

pub use config::{Config, ConfigError, LoadOutcome, LoggingConfig};

pub use dashboard::{chart_from_rows, DashboardAnalytics, DashboardView};

pub use insights::{Feedback, InsightError, InsightItem, InsightList};

pub use layout::{LayoutState, LayoutStore};
