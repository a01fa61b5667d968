//! Dashboard Backend Integration
//!
//! REST client for the dashboard backend that parses uploaded workbooks,
//! computes supplier KPI analytics and answers questions with an LLM.
//!
//! ## Endpoints
//!
//! - `GET /dashboard` - aggregate analytics
//! - `GET /insights`, `POST /generate_more_insights` - insight lists
//! - `POST /chat` - synchronous question answering
//! - `POST /chat/stream` - the same, as server-sent events
//! - `POST /upload_excel/` - workbook ingestion
//! - `POST /dashboard/add-chart`, `GET /dashboard/charts/{userId}`,
//!   `DELETE /dashboard/charts/{chartId}` - chart bookmarks
//! - `GET /health` - liveness

mod client;
mod dto;
mod error;

pub use client::BackendClient;
pub use dto::{
    ChartBookmark, ChatAnswer, ChatRequest, HealthStatus, MoreInsightsResponse, NewChart,
    UploadSummary,
};
pub use error::{extract_error_message, BackendError};

use futures_util::Stream;
use std::pin::Pin;

/// Raw response body chunks of a streaming call
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Vec<u8>, BackendError>> + Send>>;
