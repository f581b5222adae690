use crate::schedule::normalize::classify_records;
use crate::schedule::{normalize, RawRecord, ScheduleBoard};

use std::path::PathBuf;

use chrono_tz::Tz;
use reqwest::{StatusCode, Url};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid address: {0}")]
    Url(#[from] url::ParseError),
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("server answered {0}")]
    Status(StatusCode),
    #[error("payload is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("expected a list of schedule records, got {0}")]
    NotAList(&'static str),
}

/// Where a schedule payload comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Source {
    File(PathBuf),
    Http(Url),
}

impl Source {
    /// `http(s)://` locations are fetched, anything else is read from disk.
    pub fn parse(location: &str) -> Result<Self, url::ParseError> {
        if location.starts_with("http://") || location.starts_with("https://") {
            Url::parse(location).map(Source::Http)
        } else {
            Ok(Source::File(PathBuf::from(location)))
        }
    }
}

/// Checks the top-level shape once; everything below it is read leniently.
pub fn parse_payload(bytes: &[u8]) -> Result<Vec<RawRecord>, ApiError> {
    match serde_json::from_slice(bytes)? {
        Value::Array(values) => Ok(classify_records(values)),
        other => Err(ApiError::NotAList(json_kind(&other))),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "a list",
        Value::Object(_) => "an object",
    }
}

#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
struct StatusChange<'a> {
    action_id: i64,
    action_status: &'a str,
}

#[derive(Deserialize, Debug)]
struct StatusReply {
    message: Option<String>,
}

pub struct ApiClient {
    client: reqwest::Client,
    token: Option<String>,
}

impl ApiClient {
    pub fn new(token: Option<String>) -> Self {
        ApiClient {
            client: reqwest::Client::new(),
            token,
        }
    }

    fn authorized(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    /// Single attempt, no retries.
    pub async fn fetch(&self, source: &Source) -> Result<Vec<RawRecord>, ApiError> {
        let bytes = match source {
            Source::File(path) => {
                tokio::fs::read(path)
                    .await
                    .map_err(|source| ApiError::Io {
                        path: path.clone(),
                        source,
                    })?
            }
            Source::Http(url) => {
                debug!(%url, "requesting schedule");
                let response = self.authorized(self.client.get(url.clone())).send().await?;
                if !response.status().is_success() {
                    return Err(ApiError::Status(response.status()));
                }
                response.bytes().await?.to_vec()
            }
        };

        parse_payload(&bytes)
    }

    /// Posts a new status for one action and returns the server's message.
    pub async fn update_status(
        &self,
        base: &Url,
        action_id: i64,
        status: &str,
    ) -> Result<String, ApiError> {
        let url = base.join("api/sv/editActionStatus")?;
        debug!(%url, action_id, status, "posting status change");

        let body = StatusChange {
            action_id,
            action_status: status,
        };
        let response = self
            .authorized(self.client.post(url))
            .json(&body)
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(ApiError::Status(response.status()));
        }

        let text = response.text().await?;
        let message = serde_json::from_str::<StatusReply>(&text)
            .ok()
            .and_then(|reply| reply.message)
            .unwrap_or_else(|| format!("Status changed to {status}"));

        Ok(message)
    }
}

/// Surfaces a failure to whoever is looking at the board.
pub trait Notifier {
    fn notify_error(&self, message: &str);
}

pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify_error(&self, message: &str) {
        error!("{message}");
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Refresh {
    Loaded(usize),
    Failed,
    Cancelled,
}

/// Loads `source` into `board`.
///
/// Once `cancel` fires the board is left as it was, even if the fetch already
/// finished. A failed fetch is reported through `notifier` and leaves the board
/// empty rather than half filled.
pub async fn refresh(
    board: &mut ScheduleBoard,
    client: &ApiClient,
    source: &Source,
    tz: Tz,
    cancel: &CancellationToken,
    notifier: &dyn Notifier,
) -> Refresh {
    let result = tokio::select! {
        biased;
        _ = cancel.cancelled() => return Refresh::Cancelled,
        result = client.fetch(source) => result,
    };

    if cancel.is_cancelled() {
        debug!("fetch finished after cancellation, dropping result");
        return Refresh::Cancelled;
    }

    match result {
        Ok(records) => {
            let entries = normalize(records, tz);
            let count = entries.len();
            board.replace_entries(entries);
            info!(count, "schedule loaded");
            Refresh::Loaded(count)
        }
        Err(err) => {
            notifier.notify_error(&format!("couldn't load schedule: {err}"));
            board.replace_entries(Vec::new());
            Refresh::Failed
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use chrono_tz::Europe::Warsaw;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;
    use tokio::task::JoinHandle;

    use super::*;

    #[derive(Default)]
    struct RecordingNotifier(Mutex<Vec<String>>);

    impl Notifier for RecordingNotifier {
        fn notify_error(&self, message: &str) {
            self.0.lock().unwrap().push(message.to_string());
        }
    }

    impl RecordingNotifier {
        fn messages(&self) -> Vec<String> {
            self.0.lock().unwrap().clone()
        }
    }

    // talks to the throwaway server directly even when a proxy is configured
    fn local_client(token: Option<&str>) -> ApiClient {
        ApiClient {
            client: reqwest::Client::builder().no_proxy().build().unwrap(),
            token: token.map(str::to_string),
        }
    }

    fn file(path: &str) -> Source {
        Source::File(PathBuf::from(path))
    }

    async fn loaded_board() -> ScheduleBoard {
        let mut board = ScheduleBoard::default();
        let outcome = refresh(
            &mut board,
            &ApiClient::new(None),
            &file("./test_datasets/team_week.json"),
            Warsaw,
            &CancellationToken::new(),
            &RecordingNotifier::default(),
        )
        .await;
        assert_eq!(outcome, Refresh::Loaded(7));
        board
    }

    /// Accepts one connection, answers with `status` and `body`, and hands back
    /// the raw request it received.
    async fn serve_once(status: &'static str, body: &'static str) -> (Url, JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap();

        let handle = tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            let mut request = Vec::new();
            let mut buffer = [0u8; 4096];

            loop {
                let read = stream.read(&mut buffer).await.unwrap();
                if read == 0 {
                    break;
                }
                request.extend_from_slice(&buffer[..read]);

                let text = String::from_utf8_lossy(&request).to_string();
                if let Some(header_end) = text.find("\r\n\r\n") {
                    let content_length = text[..header_end]
                        .lines()
                        .filter_map(|line| line.split_once(':'))
                        .find(|(name, _)| name.eq_ignore_ascii_case("content-length"))
                        .and_then(|(_, value)| value.trim().parse::<usize>().ok())
                        .unwrap_or(0);
                    if request.len() >= header_end + 4 + content_length {
                        break;
                    }
                }
            }

            let response = format!(
                "HTTP/1.1 {status}\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
                body.len()
            );
            stream.write_all(response.as_bytes()).await.unwrap();
            stream.shutdown().await.unwrap();

            String::from_utf8_lossy(&request).to_string()
        });

        (Url::parse(&format!("http://{address}/")).unwrap(), handle)
    }

    #[test]
    fn test_parse_payload_rejects_non_list() {
        let payload = std::fs::read("./test_datasets/not_a_list.json").unwrap();
        let err = parse_payload(&payload).unwrap_err();

        assert!(matches!(err, ApiError::NotAList("an object")));
        assert_eq!(
            err.to_string(),
            "expected a list of schedule records, got an object"
        );
    }

    #[test]
    fn test_parse_payload_rejects_invalid_json() {
        assert!(matches!(
            parse_payload(b"[{\"actionId\": 1,"),
            Err(ApiError::Json(_))
        ));
    }

    #[test]
    fn test_source_parse() {
        assert_eq!(
            Source::parse("https://example.com/api/sv/myBmsActions").unwrap(),
            Source::Http(Url::parse("https://example.com/api/sv/myBmsActions").unwrap())
        );
        assert_eq!(
            Source::parse("./test_datasets/team_week.json").unwrap(),
            file("./test_datasets/team_week.json")
        );
        assert!(Source::parse("http://").is_err());
    }

    #[tokio::test]
    async fn test_refresh_from_file() {
        let board = loaded_board().await;

        assert_eq!(board.entries().len(), 7);
        assert_eq!(board.facets().parties.len(), 3);
    }

    #[tokio::test]
    async fn test_failed_refresh_notifies_and_empties_board() {
        let mut board = loaded_board().await;
        let notifier = RecordingNotifier::default();

        let outcome = refresh(
            &mut board,
            &ApiClient::new(None),
            &file("./test_datasets/does_not_exist.json"),
            Warsaw,
            &CancellationToken::new(),
            &notifier,
        )
        .await;

        assert_eq!(outcome, Refresh::Failed);
        assert!(board.entries().is_empty());
        assert_eq!(board.facets().days.len(), 1);

        let messages = notifier.messages();
        assert_eq!(messages.len(), 1);
        assert!(messages[0].starts_with("couldn't load schedule: failed to read"));
    }

    #[tokio::test]
    async fn test_non_list_payload_yields_empty_board() {
        let mut board = loaded_board().await;
        let notifier = RecordingNotifier::default();

        let outcome = refresh(
            &mut board,
            &ApiClient::new(None),
            &file("./test_datasets/not_a_list.json"),
            Warsaw,
            &CancellationToken::new(),
            &notifier,
        )
        .await;

        assert_eq!(outcome, Refresh::Failed);
        assert!(board.entries().is_empty());
        assert_eq!(notifier.messages().len(), 1);
    }

    #[tokio::test]
    async fn test_cancelled_refresh_leaves_board_untouched() {
        let mut board = loaded_board().await;
        let notifier = RecordingNotifier::default();
        let cancel = CancellationToken::new();
        cancel.cancel();

        let outcome = refresh(
            &mut board,
            &ApiClient::new(None),
            &file("./test_datasets/two_owners.json"),
            Warsaw,
            &cancel,
            &notifier,
        )
        .await;

        assert_eq!(outcome, Refresh::Cancelled);
        assert_eq!(board.entries().len(), 7);
        assert!(notifier.messages().is_empty());
    }

    #[tokio::test]
    async fn test_refresh_over_http() {
        let body = r#"[{"brandmasterLogin":"alice","actions":[{"actionId":1,"since":"2025-03-01T10:00:00Z","status":"ACCEPTED"}]}]"#;
        let (url, server) = serve_once("200 OK", body).await;
        let mut board = ScheduleBoard::default();

        let outcome = refresh(
            &mut board,
            &local_client(Some("secret")),
            &Source::Http(url.join("api/sv/myBmsActions").unwrap()),
            Warsaw,
            &CancellationToken::new(),
            &RecordingNotifier::default(),
        )
        .await;

        assert_eq!(outcome, Refresh::Loaded(1));
        assert_eq!(board.entries()[0].status, "ACCEPTED");

        let request = server.await.unwrap();
        assert!(request.starts_with("GET /api/sv/myBmsActions "));
        assert!(request
            .to_ascii_lowercase()
            .contains("authorization: bearer secret"));
    }

    #[tokio::test]
    async fn test_http_error_status_is_reported() {
        let (url, server) = serve_once("500 Internal Server Error", "{}").await;
        let mut board = ScheduleBoard::default();
        let notifier = RecordingNotifier::default();

        let outcome = refresh(
            &mut board,
            &local_client(None),
            &Source::Http(url),
            Warsaw,
            &CancellationToken::new(),
            &notifier,
        )
        .await;
        server.await.unwrap();

        assert_eq!(outcome, Refresh::Failed);
        assert_eq!(
            notifier.messages(),
            vec!["couldn't load schedule: server answered 500 Internal Server Error".to_string()]
        );
    }

    #[tokio::test]
    async fn test_update_status_posts_change() {
        let (url, server) = serve_once("200 OK", r#"{"message":"Saved"}"#).await;

        let message = local_client(None)
            .update_status(&url, 42, "ACCEPTED")
            .await
            .unwrap();
        assert_eq!(message, "Saved");

        let request = server.await.unwrap();
        assert!(request.starts_with("POST /api/sv/editActionStatus "));
        assert!(request.ends_with(r#"{"actionId":42,"actionStatus":"ACCEPTED"}"#));
    }

    #[tokio::test]
    async fn test_update_status_default_message() {
        let (url, server) = serve_once("200 OK", "").await;

        let message = local_client(None)
            .update_status(&url, 7, "DECLINED")
            .await
            .unwrap();
        server.await.unwrap();

        assert_eq!(message, "Status changed to DECLINED");
    }
}
