use std::fs;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use reportlens_contracts::errors::AnalysisError;
use reportlens_contracts::report::{AnalysisResult, AnalyzeResponse};
use reportlens_contracts::session::SessionId;
use reportlens_contracts::view::PendingUpload;
use reqwest::blocking::multipart::{Form as MultipartForm, Part as MultipartPart};
use reqwest::blocking::Client as HttpClient;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::config::ClientConfig;
use crate::{mime_for_path, truncate_text};

const FALLBACK_MIME: &str = "application/octet-stream";
const PROBE_TIMEOUT: Duration = Duration::from_secs(10);

/// Submits one staged document and returns a normalized report.
pub trait AnalysisBackend: Send {
    fn submit(
        &self,
        upload: &PendingUpload,
        session_id: &SessionId,
    ) -> Result<AnalysisResult, AnalysisError>;
}

/// Body of `GET /`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
#[serde(default)]
pub struct HealthStatus {
    pub status: String,
    pub message: String,
}

pub struct HttpAnalysisClient {
    config: ClientConfig,
    http: HttpClient,
}

impl HttpAnalysisClient {
    pub fn new(config: ClientConfig) -> Self {
        Self {
            config,
            http: HttpClient::new(),
        }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Backend liveness check.
    pub fn probe(&self) -> Result<HealthStatus> {
        let endpoint = self.config.endpoint("/");
        let response = self
            .http
            .get(&endpoint)
            .timeout(PROBE_TIMEOUT.min(self.config.chat_timeout))
            .send()
            .with_context(|| format!("health check failed ({endpoint})"))?;
        let status = response.status();
        let body = response
            .text()
            .context("health check response body read failed")?;
        if !status.is_success() {
            bail!(
                "health check failed ({}): {}",
                status.as_u16(),
                truncate_text(&body, 512)
            );
        }
        serde_json::from_str(&body).context("health check returned invalid JSON payload")
    }

    fn build_form(
        &self,
        upload: &PendingUpload,
        session_id: &SessionId,
    ) -> Result<MultipartForm, AnalysisError> {
        let bytes = fs::read(&upload.path).map_err(|err| {
            AnalysisError::client(format!(
                "Could not read {}: {err}",
                upload.path.display()
            ))
        })?;
        let mime = mime_for_path(&upload.path).unwrap_or(FALLBACK_MIME);
        let part = MultipartPart::bytes(bytes)
            .file_name(upload.file_name.clone())
            .mime_str(mime)
            .map_err(|err| AnalysisError::client(err.to_string()))?;
        Ok(MultipartForm::new()
            .part("file", part)
            .text("session_id", session_id.to_string()))
    }
}

impl AnalysisBackend for HttpAnalysisClient {
    fn submit(
        &self,
        upload: &PendingUpload,
        session_id: &SessionId,
    ) -> Result<AnalysisResult, AnalysisError> {
        let form = self.build_form(upload, session_id)?;
        let endpoint = self.config.endpoint("/analyze");
        debug!(%endpoint, file_name = %upload.file_name, "submitting document");

        let response = self
            .http
            .post(&endpoint)
            .timeout(self.config.analysis_timeout)
            .multipart(form)
            .send()
            .map_err(classify_transport_error)?;

        let status = response.status().as_u16();
        let success = response.status().is_success();
        let body = response.text().map_err(classify_transport_error)?;
        if !success {
            warn!(status, "analysis request rejected");
            return Err(AnalysisError::Server { status, body });
        }

        let parsed = AnalyzeResponse::parse(&body).map_err(|detail| {
            AnalysisError::InvalidResponse {
                status,
                detail: truncate_text(&detail, 512),
            }
        })?;
        Ok(AnalysisResult::from_response(parsed, upload.file_name.clone()))
    }
}

fn classify_transport_error(err: reqwest::Error) -> AnalysisError {
    if err.is_builder() {
        return AnalysisError::client(err.to_string());
    }
    let detail = error_chain_text(&err);
    AnalysisError::no_response(detail, err.is_timeout())
}

fn error_chain_text(err: &(dyn std::error::Error + 'static)) -> String {
    let mut parts = Vec::new();
    let mut cause = Some(err);
    while let Some(current) = cause {
        let text = current.to_string();
        let trimmed = text.trim();
        if !trimmed.is_empty() && parts.last() != Some(&trimmed.to_string()) {
            parts.push(trimmed.to_string());
        }
        cause = current.source();
    }
    truncate_text(&parts.join(" | caused by: "), 512)
}
