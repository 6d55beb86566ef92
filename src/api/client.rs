use reqwest::{RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;
use url::Url;

use crate::config::BackendConfig;

use super::api_types::{
  ApiCompileRequest, ApiCompileResponse, ApiCredentials, ApiJobQuestionResponse, ApiJobsResponse,
  ApiLoginResponse, ApiMessage, ApiRandomQuestionResponse, ApiRegisterResponse,
  ApiSubmissionDetailResponse, ApiSubmissionsResponse, ApiSubmitResponse,
};
use super::error::ApiError;
use super::types::{
  CompileOutcome, Job, Question, Review, Submission, SubmissionDetail, SubmitRequest,
};

const AUTH_HEADER: &str = "x-auth-token";

/// HTTP client for the code-reviewer backend.
#[derive(Clone)]
pub struct ApiClient {
  http: reqwest::Client,
  base: Url,
}

impl ApiClient {
  pub fn new(config: &BackendConfig) -> Result<Self, ApiError> {
    // A trailing slash makes `Url::join` append instead of replacing the last segment
    let mut base = Url::parse(&config.url)?;
    if !base.path().ends_with('/') {
      let path = format!("{}/", base.path());
      base.set_path(&path);
    }

    Ok(Self {
      http: reqwest::Client::new(),
      base,
    })
  }

  pub fn base_url(&self) -> &Url {
    &self.base
  }

  fn endpoint(&self, path: &str) -> Result<Url, ApiError> {
    Ok(self.base.join(path.trim_start_matches('/'))?)
  }

  /// List every open job.
  pub async fn jobs(&self) -> Result<Vec<Job>, ApiError> {
    let response: ApiJobsResponse = self.get("api/jobs", None, &[]).await?;
    Ok(response.jobs)
  }

  /// Fetch one page (1-based) of the user's submissions.
  pub async fn submissions_page(&self, token: &str, page: u32) -> Result<Vec<Submission>, ApiError> {
    let response: ApiSubmissionsResponse = self
      .get("api/submissions", Some(token), &[("page", page.to_string())])
      .await?;
    response.into_page()
  }

  pub async fn submission(&self, token: &str, id: &str) -> Result<SubmissionDetail, ApiError> {
    let response: ApiSubmissionDetailResponse = self
      .get(&format!("api/submissions/{}", id), Some(token), &[])
      .await?;
    Ok(response.submission)
  }

  pub async fn job_question(&self, token: Option<&str>, job_id: &str) -> Result<Question, ApiError> {
    let response: ApiJobQuestionResponse = self
      .get(&format!("api/jobs/{}", job_id), token, &[])
      .await?;
    response.into_question()
  }

  pub async fn random_question(&self, token: Option<&str>) -> Result<Question, ApiError> {
    let response: ApiRandomQuestionResponse = self.get("api/jobs/random", token, &[]).await?;
    response.into_question()
  }

  /// Compile and run `code` without saving anything.
  pub async fn compile(&self, code: &str, language: &str) -> Result<CompileOutcome, ApiError> {
    let response: ApiCompileResponse = self
      .post("api/code/compile", None, &ApiCompileRequest { code, language })
      .await?;
    response.into_outcome()
  }

  /// Save a submission and get its review.
  pub async fn submit(&self, token: &str, request: &SubmitRequest) -> Result<Review, ApiError> {
    let response: ApiSubmitResponse = self.post("api/code/submit", Some(token), request).await?;
    Ok(response.into())
  }

  /// Exchange credentials for a token.
  pub async fn login(&self, email: &str, password: &str) -> Result<String, ApiError> {
    let response: ApiLoginResponse = self
      .post("api/auth/login", None, &ApiCredentials { email, password })
      .await?;
    response.into_token()
  }

  pub async fn register(&self, email: &str, password: &str) -> Result<(), ApiError> {
    let response: ApiRegisterResponse = self
      .post("api/auth/register", None, &ApiCredentials { email, password })
      .await?;
    response.into_result()
  }

  async fn get<T: DeserializeOwned>(
    &self,
    path: &str,
    token: Option<&str>,
    query: &[(&str, String)],
  ) -> Result<T, ApiError> {
    let url = self.endpoint(path)?;
    let request = with_token(self.http.get(url).query(query), token);
    self.send(path, request).await
  }

  async fn post<B: Serialize + ?Sized, T: DeserializeOwned>(
    &self,
    path: &str,
    token: Option<&str>,
    body: &B,
  ) -> Result<T, ApiError> {
    let url = self.endpoint(path)?;
    let request = with_token(self.http.post(url).json(body), token);
    self.send(path, request).await
  }

  async fn send<T: DeserializeOwned>(&self, path: &str, request: RequestBuilder) -> Result<T, ApiError> {
    debug!(endpoint = path, "request");
    let response = request.send().await.map_err(|source| ApiError::Transport {
      endpoint: path.to_string(),
      source,
    })?;
    decode(path, response).await
  }
}

fn with_token(request: RequestBuilder, token: Option<&str>) -> RequestBuilder {
  match token {
    Some(token) => request.header(AUTH_HEADER, token),
    None => request,
  }
}

async fn decode<T: DeserializeOwned>(path: &str, response: Response) -> Result<T, ApiError> {
  let status = response.status();
  let body = response.text().await.map_err(|source| ApiError::Transport {
    endpoint: path.to_string(),
    source,
  })?;

  if !status.is_success() {
    let message = serde_json::from_str::<ApiMessage>(&body)
      .ok()
      .and_then(|m| m.message);
    return Err(ApiError::Status {
      endpoint: path.to_string(),
      status,
      message,
    });
  }

  serde_json::from_str(&body).map_err(|source| ApiError::Decode {
    endpoint: path.to_string(),
    source,
  })
}
