use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A job posting that leads to a mock interview question.
///
/// Also the shape stored in the jobs cache, so field names follow the wire format.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Job {
  pub id: String,
  pub title: String,
  #[serde(default)]
  pub description: String,
}

/// Summary of a past submission for the feed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Submission {
  #[serde(rename = "_id")]
  pub id: String,
  pub question_name: String,
  #[serde(default)]
  pub question: String,
  pub created_at: DateTime<Utc>,
}

/// Full submission including the code and the review it received.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionDetail {
  #[serde(rename = "_id", default)]
  pub id: String,
  pub question_name: String,
  #[serde(default)]
  pub question: String,
  #[serde(default)]
  pub review: String,
  /// The submitted source code
  #[serde(default)]
  pub prompt: String,
  pub created_at: Option<DateTime<Utc>>,
}

/// Interview question attached to a job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Question {
  pub name: String,
  pub question: String,
}

/// Result of compiling and running code on the backend.
#[derive(Debug, Clone, PartialEq)]
pub struct CompileOutcome {
  pub compile_status: String,
  pub output: String,
  pub time_used: f64,
  pub memory_used: f64,
}

/// AI review returned for a saved submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Review {
  pub message: String,
}

/// Code plus the question it answers, as sent for review.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitRequest {
  /// The source code
  pub prompt: String,
  pub language: String,
  pub question_name: String,
  pub question: String,
}
