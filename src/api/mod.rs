//! HTTP client for the ContractWise backend.

use std::future::Future;
use std::time::Duration;

use anyhow::Context;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::model::{
    AskRequest, AskResponse, ContractCreate, ContractDetail, ContractListBody, ContractRecord,
    Credentials, RawContract, SignupResponse, TokenResponse, UploadResponse,
};
use crate::session::Session;
use crate::upload::{FileHandle, MediaType, UploadFailure, UploadReceipt, UploadTransport};


const GENERIC_FAILURE: &str = "API request failed";

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("session expired or was rejected; run `contractwise login` again")]
    Unauthorized,
    #[error("{detail} (HTTP {status})")]
    Status { status: u16, detail: String },
    #[error("request to {url} failed")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("unexpected response body from {url}")]
    Decode {
        url: String,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    detail: Option<serde_json::Value>,
}

fn error_detail(body: &str) -> String {
    serde_json::from_str::<ErrorBody>(body)
        .ok()
        .and_then(|parsed| parsed.detail)
        .and_then(|detail| detail.as_str().map(ToOwned::to_owned))
        .filter(|detail| !detail.trim().is_empty())
        .unwrap_or_else(|| GENERIC_FAILURE.to_string())
}

#[derive(Debug, Clone)]
pub struct ApiClient {
    http: Client,
    base_url: String,
}

impl ApiClient {
    pub fn new(base_url: &str, timeout: Duration) -> anyhow::Result<Self> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .context("failed to build HTTP client")?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, endpoint: &str) -> String {
        format!("{}{}", self.base_url, endpoint)
    }

    async fn execute<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
        url: String,
        authenticated: bool,
    ) -> Result<T, ApiError> {
        let response = request
            .send()
            .await
            .map_err(|source| ApiError::Transport {
                url: url.clone(),
                source,
            })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|source| ApiError::Transport {
                url: url.clone(),
                source,
            })?;
        debug!(url = %url, status = status.as_u16(), bytes = body.len(), "api response");

        if authenticated && status == StatusCode::UNAUTHORIZED {
            return Err(ApiError::Unauthorized);
        }
        if !status.is_success() {
            return Err(ApiError::Status {
                status: status.as_u16(),
                detail: error_detail(&body),
            });
        }

        serde_json::from_str(&body).map_err(|source| ApiError::Decode { url, source })
    }

    pub async fn signup(&self, credentials: &Credentials) -> Result<SignupResponse, ApiError> {
        let url = self.url("/auth/signup");
        let request = self.http.post(&url).json(credentials);
        self.execute(request, url, false).await
    }

    pub async fn login(&self, credentials: &Credentials) -> Result<TokenResponse, ApiError> {
        let url = self.url("/auth/login");
        let request = self.http.post(&url).json(credentials);
        self.execute(request, url, false).await
    }

    pub async fn list_contracts(&self, session: &Session) -> Result<Vec<ContractRecord>, ApiError> {
        let url = self.url("/contracts/");
        let request = self.http.get(&url).bearer_auth(&session.token);
        let body: ContractListBody = self.execute(request, url, true).await?;
        Ok(body.into_records())
    }

    pub async fn get_contract(&self, session: &Session, id: &str) -> Result<ContractDetail, ApiError> {
        let url = self.url(&format!("/contracts/{}", id.trim()));
        let request = self.http.get(&url).bearer_auth(&session.token);
        let raw: RawContract = self.execute(request, url, true).await?;
        Ok(raw.into())
    }

    pub async fn create_contract(
        &self,
        session: &Session,
        body: &ContractCreate,
    ) -> Result<UploadResponse, ApiError> {
        let url = self.url("/contracts/upload");
        let request = self.http.post(&url).bearer_auth(&session.token).json(body);
        self.execute(request, url, true).await
    }

    pub async fn ask(&self, session: &Session, question: &str) -> Result<AskResponse, ApiError> {
        let url = self.url("/ask/");
        let request = self
            .http
            .post(&url)
            .bearer_auth(&session.token)
            .json(&AskRequest { question });
        self.execute(request, url, true).await
    }
}

/// Upload transport that registers each admitted file as a contract.
#[derive(Debug, Clone)]
pub struct ContractUploader {
    client: ApiClient,
    session: Session,
    expiry_date: Option<String>,
}

impl ContractUploader {
    pub fn new(client: ApiClient, session: Session, expiry_date: Option<String>) -> Self {
        Self {
            client,
            session,
            expiry_date,
        }
    }
}

impl UploadTransport for ContractUploader {
    fn send(
        &self,
        file: FileHandle,
        media_type: MediaType,
    ) -> impl Future<Output = Result<UploadReceipt, UploadFailure>> + Send {
        let uploader = self.clone();
        async move {
            debug!(file = %file.name, mime = media_type.mime(), "registering upload");
            let body = ContractCreate::for_file(&file.name, uploader.expiry_date.clone());
            let response = uploader
                .client
                .create_contract(&uploader.session, &body)
                .await
                .map_err(|err| match err {
                    ApiError::Unauthorized => UploadFailure::Unauthorized,
                    other => UploadFailure::Rejected(format!("{:#}", anyhow::Error::from(other))),
                })?;

            Ok(UploadReceipt {
                document_id: response.document.and_then(|document| document.doc_id),
                chunk_count: response.chunks.len(),
            })
        }
    }
}
