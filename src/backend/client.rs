//! Dashboard Backend REST Client
//!
//! HTTP client for the dashboard backend. One request per call: no retries,
//! no caching.

use futures_util::StreamExt;
use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::time::Duration;

use super::dto::{
    ChartBookmark, ChartList, ChatAnswer, ChatRequest, HealthStatus, MoreInsightsResponse,
    NewChart, UploadSummary,
};
use super::error::BackendError;
use super::ByteStream;
use crate::config::BackendConfig;
use crate::dashboard::DashboardAnalytics;
use crate::insights::{parse_insight_list, InsightItem};

const XLSX_MIME: &str = "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";
const OCTET_STREAM: &str = "application/octet-stream";

/// Content type for an upload, by file extension
fn upload_mime(file_name: &str) -> &'static str {
    let is_xlsx = std::path::Path::new(file_name)
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("xlsx"));
    if is_xlsx {
        XLSX_MIME
    } else {
        OCTET_STREAM
    }
}

/// Dashboard backend client
#[derive(Clone)]
pub struct BackendClient {
    client: Client,
    base_url: String,
    request_timeout: Duration,
}

impl BackendClient {
    /// Create a client from backend configuration.
    ///
    /// Only the connect timeout is set on the underlying client; the request
    /// timeout is applied per call so streams are never cut off.
    pub fn new(config: &BackendConfig) -> Result<Self, BackendError> {
        let client = Client::builder()
            .connect_timeout(config.connect_timeout())
            .build()
            .map_err(|e| BackendError::Config(e.to_string()))?;

        Ok(Self {
            client,
            base_url: config.url.trim_end_matches('/').to_string(),
            request_timeout: config.request_timeout(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// `GET /dashboard`
    pub async fn dashboard(&self) -> Result<DashboardAnalytics, BackendError> {
        let body: Value = self.get_json("/dashboard").await?;
        Ok(DashboardAnalytics::from_response(body))
    }

    /// `GET /insights`
    pub async fn insights(&self) -> Result<Vec<InsightItem>, BackendError> {
        let body: Value = self.get_json("/insights").await?;
        Ok(parse_insight_list(&body))
    }

    /// `POST /generate_more_insights`
    pub async fn generate_more_insights(&self) -> Result<MoreInsightsResponse, BackendError> {
        let request = self.client.post(self.url("/generate_more_insights"));
        self.send_json(request, "POST /generate_more_insights").await
    }

    /// `POST /chat`, waiting for the complete answer
    pub async fn chat(&self, question: &str) -> Result<ChatAnswer, BackendError> {
        let body = ChatRequest {
            question: question.to_string(),
            stream: false,
        };
        self.post_json("/chat", &body).await
    }

    /// `POST /chat/stream`, returning the raw event-stream body.
    ///
    /// Error statuses are resolved before the stream is handed out.
    pub async fn chat_stream(&self, question: &str) -> Result<ByteStream, BackendError> {
        let body = ChatRequest {
            question: question.to_string(),
            stream: true,
        };

        tracing::debug!(question = %question, "Opening chat stream");

        let response = self
            .client
            .post(self.url("/chat/stream"))
            .header(reqwest::header::ACCEPT, "text/event-stream")
            .json(&body)
            .send()
            .await?;

        let response = check_status(response, default_failure).await?;

        let stream = response
            .bytes_stream()
            .map(|chunk| chunk.map(|bytes| bytes.to_vec()).map_err(BackendError::from));

        Ok(Box::pin(stream))
    }

    /// `POST /upload_excel/` as multipart field `file`.
    ///
    /// Rejections carry the server's `detail`, else "Upload failed".
    pub async fn upload_excel(
        &self,
        file_name: &str,
        bytes: Vec<u8>,
    ) -> Result<UploadSummary, BackendError> {
        let part = reqwest::multipart::Part::bytes(bytes)
            .file_name(file_name.to_string())
            .mime_str(upload_mime(file_name))
            .map_err(|e| BackendError::Config(e.to_string()))?;
        let form = reqwest::multipart::Form::new().part("file", part);

        tracing::info!(file = %file_name, "Uploading workbook");

        let request = self
            .client
            .post(self.url("/upload_excel/"))
            .multipart(form)
            .timeout(self.request_timeout);

        let response = request.send().await?;
        let response = check_status(response, |_| "Upload failed".to_string()).await?;
        decode(response).await
    }

    /// `POST /dashboard/add-chart`
    pub async fn add_chart(&self, chart: &NewChart) -> Result<Value, BackendError> {
        self.post_json("/dashboard/add-chart", chart).await
    }

    /// `GET /dashboard/charts/{userId}`
    pub async fn charts(&self, user_id: &str) -> Result<Vec<ChartBookmark>, BackendError> {
        let path = format!("/dashboard/charts/{}", urlencoding::encode(user_id));
        let list: ChartList = self.get_json(&path).await?;
        Ok(list.into_vec())
    }

    /// `DELETE /dashboard/charts/{chartId}`
    pub async fn delete_chart(&self, chart_id: &str) -> Result<(), BackendError> {
        let path = format!("/dashboard/charts/{}", urlencoding::encode(chart_id));
        let response = self
            .client
            .delete(self.url(&path))
            .timeout(self.request_timeout)
            .send()
            .await?;
        check_status(response, default_failure).await?;
        tracing::debug!(chart_id = %chart_id, "Chart bookmark deleted");
        Ok(())
    }

    /// `GET /health`
    pub async fn health(&self) -> Result<HealthStatus, BackendError> {
        self.get_json("/health").await
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, BackendError> {
        let request = self.client.get(self.url(path));
        self.send_json(request, path).await
    }

    async fn post_json<B, T>(&self, path: &str, body: &B) -> Result<T, BackendError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let request = self.client.post(self.url(path)).json(body);
        self.send_json(request, path).await
    }

    async fn send_json<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
        label: &str,
    ) -> Result<T, BackendError> {
        let started = std::time::Instant::now();

        let result = async {
            let response = request.timeout(self.request_timeout).send().await?;
            let response = check_status(response, default_failure).await?;
            decode(response).await
        }
        .await;

        match &result {
            Ok(_) => tracing::debug!(
                request = %label,
                elapsed_ms = started.elapsed().as_millis() as u64,
                "Backend request completed"
            ),
            Err(e) => tracing::error!(request = %label, error = %e, "Backend request failed"),
        }

        result
    }
}

fn default_failure(status: u16) -> String {
    format!("Request failed with status {}", status)
}

/// Turn an error status into `BackendError::Server`, consuming the body
async fn check_status<F>(response: Response, fallback: F) -> Result<Response, BackendError>
where
    F: FnOnce(u16) -> String,
{
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let code = status.as_u16();
    let text = response.text().await.unwrap_or_default();
    Err(BackendError::from_body(code, &text, || fallback(code)))
}

async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, BackendError> {
    let bytes = response.bytes().await?;
    serde_json::from_slice(&bytes).map_err(|e| BackendError::Decode(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trailing_slash_trimmed() {
        let config = BackendConfig {
            url: "http://localhost:8005/".to_string(),
            ..Default::default()
        };
        let client = BackendClient::new(&config).unwrap();
        assert_eq!(client.base_url(), "http://localhost:8005");
        assert_eq!(client.url("/dashboard"), "http://localhost:8005/dashboard");
    }

    #[test]
    fn test_upload_mime_by_extension() {
        assert_eq!(upload_mime("kpis_2024.xlsx"), XLSX_MIME);
        assert_eq!(upload_mime("KPIS.XLSX"), XLSX_MIME);
        assert_eq!(upload_mime("kpis.csv"), OCTET_STREAM);
        assert_eq!(upload_mime("kpis.xls"), OCTET_STREAM);
        assert_eq!(upload_mime("xlsx"), OCTET_STREAM);
    }

    #[test]
    fn test_default_failure_text() {
        assert_eq!(default_failure(502), "Request failed with status 502");
    }

    #[tokio::test]
    async fn test_connection_refused_is_network_error() {
        // Port 9 (discard) is closed on test machines
        let config = BackendConfig {
            url: "http://127.0.0.1:9".to_string(),
            connect_timeout_secs: 2,
            ..Default::default()
        };
        let client = BackendClient::new(&config).unwrap();

        let err = client.health().await.unwrap_err();
        assert!(matches!(err, BackendError::Network(_) | BackendError::Timeout));
    }
}
