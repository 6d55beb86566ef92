//! Canned HTTP backend for exercising the real client in tests.

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{header, HeaderMap, Method, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::Router;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

/// A request as the stub saw it.
#[derive(Debug, Clone)]
pub struct Recorded {
  /// "GET /api/jobs" including any query string
  pub target: String,
  pub headers: HashMap<String, String>,
  pub body: String,
}

#[derive(Default)]
struct Shared {
  routes: HashMap<String, (u16, String)>,
  requests: Mutex<Vec<Recorded>>,
}

/// Stops serving when dropped.
pub struct StubBackend {
  pub url: String,
  shared: Arc<Shared>,
  handle: JoinHandle<()>,
}

impl StubBackend {
  /// Serve `routes` ("METHOD /path?query" -> (status, json body)) on a random port.
  /// Unknown targets get a 404.
  pub async fn start(routes: Vec<(&str, u16, &str)>) -> Self {
    let shared = Arc::new(Shared {
      routes: routes
        .into_iter()
        .map(|(target, status, body)| (target.to_string(), (status, body.to_string())))
        .collect(),
      requests: Mutex::new(Vec::new()),
    });

    let router = Router::new().fallback(respond).with_state(shared.clone());

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("http://{}", listener.local_addr().unwrap());
    let handle = tokio::spawn(async move {
      axum::serve(listener, router).await.unwrap();
    });

    Self {
      url,
      shared,
      handle,
    }
  }

  pub fn requests(&self) -> Vec<Recorded> {
    self.shared.requests.lock().unwrap().clone()
  }

  pub fn count(&self, target: &str) -> usize {
    self
      .requests()
      .iter()
      .filter(|r| r.target == target)
      .count()
  }
}

impl Drop for StubBackend {
  fn drop(&mut self) {
    self.handle.abort();
  }
}

async fn respond(
  State(shared): State<Arc<Shared>>,
  method: Method,
  uri: Uri,
  headers: HeaderMap,
  body: Bytes,
) -> Response {
  let path = uri
    .path_and_query()
    .map(|pq| pq.as_str())
    .unwrap_or_else(|| uri.path());
  let target = format!("{} {}", method, path);

  let headers = headers
    .iter()
    .map(|(name, value)| {
      let value = String::from_utf8_lossy(value.as_bytes()).to_string();
      (name.as_str().to_string(), value)
    })
    .collect();

  let (status, response_body) = shared
    .routes
    .get(&target)
    .cloned()
    .unwrap_or((404, r#"{"message":"not found"}"#.to_string()));

  shared.requests.lock().unwrap().push(Recorded {
    target,
    headers,
    body: String::from_utf8_lossy(&body).to_string(),
  });

  let status = StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
  (
    status,
    [(header::CONTENT_TYPE, "application/json")],
    response_body,
  )
    .into_response()
}

#[cfg(test)]
mod tests {
  use super::*;
  use tokio::io::{AsyncReadExt, AsyncWriteExt};
  use tokio::net::TcpStream;

  #[tokio::test]
  async fn test_chunked_body_is_decoded() {
    let backend = StubBackend::start(vec![("POST /api/code/compile", 200, "{}")]).await;
    let addr = backend.url.trim_start_matches("http://");

    let mut stream = TcpStream::connect(addr).await.unwrap();
    stream
      .write_all(
        b"POST /api/code/compile HTTP/1.1\r\n\
          host: localhost\r\n\
          transfer-encoding: chunked\r\n\
          connection: close\r\n\
          \r\n\
          5\r\nhello\r\n0\r\n\r\n",
      )
      .await
      .unwrap();
    let mut response = String::new();
    stream.read_to_string(&mut response).await.unwrap();
    assert!(response.starts_with("HTTP/1.1 200"));

    let requests = backend.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].body, "hello");
    assert_eq!(
      requests[0].headers.get("transfer-encoding").map(String::as_str),
      Some("chunked")
    );
  }

  #[tokio::test]
  async fn test_unknown_target_is_not_found() {
    let backend = StubBackend::start(vec![("GET /api/jobs", 200, r#"{"jobs": []}"#)]).await;

    let response = reqwest::get(format!("{}/api/jobs?page=2", backend.url))
      .await
      .unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::NOT_FOUND);
    assert_eq!(backend.count("GET /api/jobs?page=2"), 1);
    assert_eq!(backend.count("GET /api/jobs"), 0);
  }
}
