use futures::future::join_all;
use geocapture_core::config::ServiceSettings;
use geocapture_core::error::{GeocaptureError, Result};
use geocapture_core::models::{
    CapturedAsset, JobId, JobResults, JobStatusReport, JobSubmission, NetworkInfo, PhotoAsset,
    SessionMetadata, UploadFailure, UploadedAsset, VideoAsset,
};
use reqwest::multipart::{Form, Part};
use reqwest::{Method, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use std::time::Duration;
use tokio::time::Instant;

use crate::dto::{ErrorBody, JobRequest, ServiceStatus, UploadMetadata, UploadResponse};

/// Header naming the submitting node
pub const NODE_ID_HEADER: &str = "X-Node-Id";

/// Polling schedule for [`ProcessingClient::wait_for_completion`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    pub interval: Duration,
    pub timeout: Duration,
    /// Transient network errors tolerated in a row before giving up
    pub max_consecutive_errors: u32,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(10),
            timeout: Duration::from_secs(4 * 60 * 60),
            max_consecutive_errors: 3,
        }
    }
}

/// Client for the distributed reconstruction service
pub struct ProcessingClient {
    /// Base URL without trailing slash (e.g., "http://localhost:8080/api/v1")
    base_url: String,

    node_id: Option<String>,

    request_timeout: Duration,

    /// Set by a successful [`initialize`](Self::initialize)
    api_key: Option<String>,

    /// Jobs accepted by the service, in submission order
    job_queue: Vec<JobId>,

    http: reqwest::Client,
}

impl ProcessingClient {
    pub fn new(settings: ServiceSettings) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(settings.request_timeout)
            .build()
            .map_err(|e| GeocaptureError::Network(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            node_id: settings.node_id,
            request_timeout: settings.request_timeout,
            api_key: None,
            job_queue: Vec::new(),
            http,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn is_initialized(&self) -> bool {
        self.api_key.is_some()
    }

    /// Jobs submitted through this client
    pub fn queued_jobs(&self) -> &[JobId] {
        &self.job_queue
    }

    /// Verify connectivity and credentials with `GET /status`.
    ///
    /// The key is kept only when the service accepts it.
    pub async fn initialize(&mut self, api_key: impl Into<String>) -> Result<ServiceStatus> {
        let api_key = api_key.into();
        let request = self.build_request(Method::GET, "/status", &api_key);
        let status: ServiceStatus = self
            .execute(request, |status, message| {
                GeocaptureError::Network(format!("Status probe failed ({}): {}", status, message))
            })
            .await?;

        tracing::info!(
            base_url = %self.base_url,
            service_status = %status.status,
            "Processing service reachable"
        );
        self.api_key = Some(api_key);
        Ok(status)
    }

    /// Upload every asset concurrently.
    ///
    /// All uploads run to completion. If any failed, the error lists each
    /// failure together with the references that did succeed.
    pub async fn upload_assets(&self, assets: &[CapturedAsset]) -> Result<Vec<UploadedAsset>> {
        let api_key = self.api_key()?;
        tracing::info!(count = assets.len(), "Uploading assets");

        let uploads = assets
            .iter()
            .enumerate()
            .map(|(index, asset)| self.upload_one(api_key, index, asset));
        let outcomes = join_all(uploads).await;

        let mut completed = Vec::with_capacity(assets.len());
        let mut failures = Vec::new();
        for ((index, asset), outcome) in assets.iter().enumerate().zip(outcomes) {
            match outcome {
                Ok(uploaded) => completed.push(uploaded),
                Err(e) => {
                    tracing::warn!(index, path = %asset.media().path.display(), "Upload failed: {}", e);
                    failures.push(UploadFailure {
                        index,
                        path: asset.media().path.clone(),
                        reason: e.to_string(),
                    });
                }
            }
        }

        if failures.is_empty() {
            Ok(completed)
        } else {
            Err(GeocaptureError::UploadFailed {
                failures,
                completed,
            })
        }
    }

    async fn upload_one(
        &self,
        api_key: &str,
        index: usize,
        asset: &CapturedAsset,
    ) -> Result<UploadedAsset> {
        let media = asset.media();
        let bytes = tokio::fs::read(&media.path)
            .await
            .map_err(|e| GeocaptureError::MediaUnreadable {
                path: media.path.clone(),
                reason: e.to_string(),
            })?;

        let file = Part::bytes(bytes)
            .file_name(media.file_name())
            .mime_str(&media.mime_type)
            .map_err(|e| GeocaptureError::MediaUnreadable {
                path: media.path.clone(),
                reason: format!("invalid MIME type '{}': {}", media.mime_type, e),
            })?;
        let metadata = serde_json::to_string(&UploadMetadata::for_asset(asset, index))?;
        let form = Form::new().part("file", file).text("metadata", metadata);

        let request = self
            .build_request(Method::POST, "/upload", api_key)
            .multipart(form);
        let response: UploadResponse = self
            .execute(request, |status, message| {
                GeocaptureError::Network(format!("Upload rejected ({}): {}", status, message))
            })
            .await?;

        tracing::debug!(index, upload_id = %response.upload_id, "Asset uploaded");
        Ok(UploadedAsset {
            index,
            uri: response.uri,
            upload_id: response.upload_id,
        })
    }

    /// Submit a reconstruction job for both splatting pipelines.
    ///
    /// The photo minimum is a readiness hint for callers and is not
    /// enforced here.
    pub async fn submit_reconstruction_job(
        &mut self,
        photos: &[PhotoAsset],
        videos: &[VideoAsset],
        session_metadata: &SessionMetadata,
    ) -> Result<JobSubmission> {
        let api_key = self.api_key()?.to_string();
        let body = JobRequest::new(photos, videos, session_metadata);

        let response = self
            .build_request(Method::POST, "/jobs/submit", &api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| GeocaptureError::Submission(format!("Failed to reach service: {}", e)))?;

        let submission: JobSubmission = self
            .read_response(response, |status, message| {
                GeocaptureError::Submission(format!("Job rejected ({}): {}", status, message))
            })
            .await?;

        tracing::info!(
            job_id = %submission.job_id,
            session_id = %session_metadata.session_id,
            photos = photos.len(),
            videos = videos.len(),
            estimated_time = ?submission.estimated_time,
            "Reconstruction job submitted"
        );
        self.job_queue.push(submission.job_id.clone());
        Ok(submission)
    }

    pub async fn check_job_status(&self, job_id: &JobId) -> Result<JobStatusReport> {
        let request = self.build_request(
            Method::GET,
            &format!("/jobs/{}/status", job_id),
            self.api_key()?,
        );
        self.execute(request, |status, message| match status {
            StatusCode::NOT_FOUND => GeocaptureError::NotFound(format!("job {}", job_id)),
            _ => GeocaptureError::Network(format!("Status request failed ({}): {}", status, message)),
        })
        .await
    }

    /// Fetch the outputs of a completed job.
    ///
    /// Fails with `JobNotComplete` while the job is still queued or running.
    pub async fn get_job_results(&self, job_id: &JobId) -> Result<JobResults> {
        let request = self.build_request(
            Method::GET,
            &format!("/jobs/{}/results", job_id),
            self.api_key()?,
        );
        self.execute(request, |status, message| match status {
            StatusCode::NOT_FOUND => GeocaptureError::NotFound(format!("job {}", job_id)),
            StatusCode::CONFLICT => GeocaptureError::JobNotComplete {
                job_id: job_id.to_string(),
            },
            _ => GeocaptureError::Network(format!("Results request failed ({}): {}", status, message)),
        })
        .await
    }

    pub async fn get_network_info(&self) -> Result<NetworkInfo> {
        let request = self.build_request(Method::GET, "/network/info", self.api_key()?);
        self.execute(request, |status, message| {
            GeocaptureError::Network(format!("Network info request failed ({}): {}", status, message))
        })
        .await
    }

    /// Poll a job until it reaches a terminal status.
    ///
    /// Up to `max_consecutive_errors` transient failures in a row are
    /// tolerated. Any other error ends the wait.
    pub async fn wait_for_completion(
        &self,
        job_id: &JobId,
        policy: &PollPolicy,
    ) -> Result<JobStatusReport> {
        let deadline = Instant::now() + policy.timeout;
        let mut consecutive_errors = 0;

        loop {
            match self.check_job_status(job_id).await {
                Ok(report) if report.status.is_terminal() => {
                    tracing::info!(job_id = %job_id, status = %report.status, "Job finished");
                    return Ok(report);
                }
                Ok(report) => {
                    consecutive_errors = 0;
                    tracing::debug!(
                        job_id = %job_id,
                        progress = report.progress,
                        stage = ?report.current_stage,
                        "Job in progress"
                    );
                }
                Err(e) if e.is_retryable() && consecutive_errors < policy.max_consecutive_errors => {
                    consecutive_errors += 1;
                    tracing::warn!(job_id = %job_id, attempt = consecutive_errors, "Status poll failed: {}", e);
                }
                Err(e) => return Err(e),
            }

            if Instant::now() + policy.interval > deadline {
                return Err(GeocaptureError::Timeout {
                    seconds: policy.timeout.as_secs(),
                });
            }
            tokio::time::sleep(policy.interval).await;
        }
    }

    fn api_key(&self) -> Result<&str> {
        self.api_key.as_deref().ok_or_else(|| {
            GeocaptureError::Authentication("client not initialized; call initialize first".into())
        })
    }

    fn build_request(&self, method: Method, path: &str, api_key: &str) -> RequestBuilder {
        let request = self
            .http
            .request(method, format!("{}{}", self.base_url, path))
            .bearer_auth(api_key);
        match &self.node_id {
            Some(node_id) => request.header(NODE_ID_HEADER, node_id),
            None => request,
        }
    }

    async fn execute<T, F>(&self, request: RequestBuilder, on_status: F) -> Result<T>
    where
        T: DeserializeOwned,
        F: FnOnce(StatusCode, String) -> GeocaptureError,
    {
        let response = request.send().await.map_err(|e| self.transport_error(e))?;
        self.read_response(response, on_status).await
    }

    /// Decode a success body, or classify the failure status.
    ///
    /// 401 and 403 always map to `Authentication`.
    async fn read_response<T, F>(&self, response: reqwest::Response, on_status: F) -> Result<T>
    where
        T: DeserializeOwned,
        F: FnOnce(StatusCode, String) -> GeocaptureError,
    {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = error_message(&body);
            return Err(match status {
                StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                    GeocaptureError::Authentication(format!("{} ({})", message, status))
                }
                _ => on_status(status, message),
            });
        }

        response
            .json::<T>()
            .await
            .map_err(|e| GeocaptureError::InvalidResponse(e.to_string()))
    }

    fn transport_error(&self, err: reqwest::Error) -> GeocaptureError {
        if err.is_timeout() {
            GeocaptureError::Network(format!(
                "Request to {} timed out after {:?}",
                self.base_url, self.request_timeout
            ))
        } else {
            GeocaptureError::Network(format!("Failed to reach {}: {}", self.base_url, err))
        }
    }
}

fn error_message(body: &str) -> String {
    match serde_json::from_str::<ErrorBody>(body) {
        Ok(ErrorBody {
            error: Some(message),
            ..
        })
        | Ok(ErrorBody {
            message: Some(message),
            ..
        }) => message,
        _ if body.trim().is_empty() => "no details".to_string(),
        _ => body.trim().to_string(),
    }
}
