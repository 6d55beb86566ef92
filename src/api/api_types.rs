//! Serde types matching the backend's JSON bodies.
//!
//! Responses are loosely shaped (fields go missing, `success` flags instead of
//! status codes), so each one is validated here, once, into the domain types in
//! [`super::types`].

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::error::ApiError;
use super::types::{CompileOutcome, Job, Question, Review, Submission, SubmissionDetail};

// ============================================================================
// Requests
// ============================================================================

#[derive(Debug, Serialize)]
pub struct ApiCredentials<'a> {
  pub email: &'a str,
  pub password: &'a str,
}

#[derive(Debug, Serialize)]
pub struct ApiCompileRequest<'a> {
  pub code: &'a str,
  pub language: &'a str,
}

// ============================================================================
// Responses
// ============================================================================

/// Body of error responses, when the backend bothers to send one.
#[derive(Debug, Deserialize)]
pub struct ApiMessage {
  pub message: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ApiJobsResponse {
  #[serde(default)]
  pub jobs: Vec<Job>,
}

#[derive(Debug, Deserialize)]
pub struct ApiSubmissionsResponse {
  #[serde(default)]
  pub success: bool,
  #[serde(default)]
  pub data: Vec<Submission>,
  pub message: Option<String>,
}

impl ApiSubmissionsResponse {
  pub fn into_page(self) -> Result<Vec<Submission>, ApiError> {
    if !self.success {
      return Err(unsuccessful(self.message, "Failed to load submissions."));
    }
    Ok(self.data)
  }
}

#[derive(Debug, Deserialize)]
pub struct ApiQuestion {
  pub name: String,
  #[serde(default)]
  pub question: String,
}

#[derive(Debug, Deserialize)]
pub struct ApiJobQuestionResponse {
  #[serde(default)]
  pub success: bool,
  pub question: Option<ApiQuestion>,
  pub message: Option<String>,
}

impl ApiJobQuestionResponse {
  pub fn into_question(self) -> Result<Question, ApiError> {
    match (self.success, self.question) {
      (true, Some(q)) => Ok(Question {
        name: q.name,
        question: q.question,
      }),
      _ => Err(unsuccessful(self.message, "Failed to fetch Question")),
    }
  }
}

/// The random-question endpoint returns the question fields at the top level.
#[derive(Debug, Deserialize)]
pub struct ApiRandomQuestionResponse {
  #[serde(default)]
  pub success: bool,
  pub name: Option<String>,
  pub question: Option<String>,
  pub message: Option<String>,
}

impl ApiRandomQuestionResponse {
  pub fn into_question(self) -> Result<Question, ApiError> {
    match (self.success, self.name) {
      (true, Some(name)) => Ok(Question {
        name,
        question: self.question.unwrap_or_default(),
      }),
      _ => Err(unsuccessful(self.message, "Failed to fetch Question")),
    }
  }
}

#[derive(Debug, Deserialize)]
pub struct ApiSubmissionDetailResponse {
  pub submission: SubmissionDetail,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiCompileResponse {
  #[serde(default)]
  pub success: bool,
  pub compile_status: Option<String>,
  /// Program output; the backend sends strings, numbers or null here
  #[serde(default)]
  pub output: Value,
  #[serde(default)]
  pub time_used: f64,
  #[serde(default)]
  pub memory_used: f64,
  pub message: Option<String>,
}

impl ApiCompileResponse {
  pub fn into_outcome(self) -> Result<CompileOutcome, ApiError> {
    if !self.success {
      // The compile status carries the compiler's complaint
      return Err(unsuccessful(
        self.compile_status.or(self.message),
        "Compilation failed",
      ));
    }

    let output = match self.output {
      Value::Null => String::new(),
      Value::String(s) => s,
      other => other.to_string(),
    };

    Ok(CompileOutcome {
      compile_status: self.compile_status.unwrap_or_default(),
      output,
      time_used: self.time_used,
      memory_used: self.memory_used,
    })
  }
}

#[derive(Debug, Deserialize)]
pub struct ApiSubmitResponse {
  #[serde(default)]
  pub message: String,
}

impl From<ApiSubmitResponse> for Review {
  fn from(response: ApiSubmitResponse) -> Self {
    Review {
      message: response.message,
    }
  }
}

#[derive(Debug, Deserialize)]
pub struct ApiLoginResponse {
  pub token: Option<String>,
  pub message: Option<String>,
}

impl ApiLoginResponse {
  pub fn into_token(self) -> Result<String, ApiError> {
    match self.token {
      Some(token) if !token.is_empty() => Ok(token),
      _ => Err(unsuccessful(
        self.message,
        "Invalid credentials. Please try again.",
      )),
    }
  }
}

#[derive(Debug, Deserialize)]
pub struct ApiRegisterResponse {
  #[serde(default)]
  pub success: bool,
  pub message: Option<String>,
}

impl ApiRegisterResponse {
  pub fn into_result(self) -> Result<(), ApiError> {
    if self.success {
      Ok(())
    } else {
      Err(unsuccessful(self.message, "Something went wrong!"))
    }
  }
}

fn unsuccessful(message: Option<String>, fallback: &str) -> ApiError {
  ApiError::Unsuccessful(
    message
      .filter(|m| !m.is_empty())
      .unwrap_or_else(|| fallback.to_string()),
  )
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_submissions_page_parses_wire_names() {
    let body = r#"{
      "success": true,
      "data": [
        {"_id": "a1", "questionName": "Two Sum", "question": "Find two numbers", "createdAt": "2024-10-10T12:00:00.000Z"}
      ]
    }"#;
    let response: ApiSubmissionsResponse = serde_json::from_str(body).unwrap();
    let page = response.into_page().unwrap();
    assert_eq!(page.len(), 1);
    assert_eq!(page[0].id, "a1");
    assert_eq!(page[0].question_name, "Two Sum");
  }

  #[test]
  fn test_submissions_unsuccessful() {
    let response: ApiSubmissionsResponse = serde_json::from_str(r#"{"success": false}"#).unwrap();
    let err = response.into_page().unwrap_err();
    assert_eq!(err.to_string(), "Failed to load submissions.");
  }

  #[test]
  fn test_job_question() {
    let body = r#"{"success": true, "question": {"name": "Reverse", "question": "Reverse a string"}}"#;
    let response: ApiJobQuestionResponse = serde_json::from_str(body).unwrap();
    let question = response.into_question().unwrap();
    assert_eq!(question.name, "Reverse");

    let response: ApiJobQuestionResponse =
      serde_json::from_str(r#"{"success": true}"#).unwrap();
    assert!(response.into_question().is_err());
  }

  #[test]
  fn test_random_question_is_flat() {
    let body = r#"{"success": true, "name": "FizzBuzz", "question": "Print numbers"}"#;
    let response: ApiRandomQuestionResponse = serde_json::from_str(body).unwrap();
    assert_eq!(response.into_question().unwrap().name, "FizzBuzz");
  }

  #[test]
  fn test_compile_output_is_stringified() {
    let body = r#"{"success": true, "compileStatus": "OK", "output": 42, "timeUsed": 0.5, "memoryUsed": 1024}"#;
    let response: ApiCompileResponse = serde_json::from_str(body).unwrap();
    let outcome = response.into_outcome().unwrap();
    assert_eq!(outcome.output, "42");
    assert_eq!(outcome.compile_status, "OK");
  }

  #[test]
  fn test_compile_failure_reports_status() {
    let body = r#"{"success": false, "compileStatus": "Compilation Error", "message": "bad"}"#;
    let response: ApiCompileResponse = serde_json::from_str(body).unwrap();
    assert_eq!(
      response.into_outcome().unwrap_err().to_string(),
      "Compilation Error"
    );
  }

  #[test]
  fn test_login_without_token() {
    let response: ApiLoginResponse = serde_json::from_str(r#"{"message": ""}"#).unwrap();
    assert_eq!(
      response.into_token().unwrap_err().to_string(),
      "Invalid credentials. Please try again."
    );
  }

  #[test]
  fn test_register_failure_message() {
    let response: ApiRegisterResponse =
      serde_json::from_str(r#"{"success": false, "message": "User already exists"}"#).unwrap();
    assert_eq!(
      response.into_result().unwrap_err().to_string(),
      "User already exists"
    );
  }
}
