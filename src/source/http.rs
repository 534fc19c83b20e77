use super::{require_extension, CheckResult, SentenceSource, SourceError, Upload};
use crate::sentence::{Sentence, SentenceId};
use reqwest::blocking::{multipart, Client, RequestBuilder, Response};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, warn};

#[derive(Deserialize)]
struct SentenceList {
    sentences: Vec<Sentence>,
}

#[derive(Deserialize)]
struct ErrorBody {
    error: String,
}

#[derive(Serialize)]
struct CheckRequest<'a> {
    sentence_id: SentenceId,
    answer: &'a str,
}

/// Sentence source backed by the practice server's JSON API
#[derive(Debug, Clone)]
pub struct HttpSentenceSource {
    client: Client,
    base_url: String,
}

impl HttpSentenceSource {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(Client::new(), base_url)
    }

    pub fn with_client(client: Client, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self { client, base_url }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn get(&self, path: &str, difficulties: &[String]) -> RequestBuilder {
        let request = self.client.get(self.url(path));
        if difficulties.is_empty() {
            request
        } else {
            request.query(&[("difficulties", difficulties.join(","))])
        }
    }

    fn send<T: DeserializeOwned>(request: RequestBuilder) -> Result<T, SourceError> {
        let response = request.send()?;
        let response = Self::ensure_success(response)?;
        Ok(response.json()?)
    }

    fn ensure_success(response: Response) -> Result<Response, SourceError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().unwrap_or_default();
        let message = serde_json::from_str::<ErrorBody>(&body)
            .map(|b| b.error)
            .unwrap_or_else(|_| status.canonical_reason().unwrap_or("error").to_string());
        warn!(status = status.as_u16(), %message, "sentence server error");
        Err(SourceError::Status {
            status: status.as_u16(),
            message,
        })
    }
}

impl SentenceSource for HttpSentenceSource {
    fn random(&self, difficulties: &[String]) -> Result<Sentence, SourceError> {
        debug!(?difficulties, "GET random sentence");
        Self::send(self.get("/api/sentence/random", difficulties))
    }

    fn list(&self, difficulties: &[String]) -> Result<Vec<Sentence>, SourceError> {
        debug!(?difficulties, "GET sentence list");
        let list: SentenceList = Self::send(self.get("/api/sentences/list", difficulties))?;
        Ok(list.sentences)
    }

    fn by_id(&self, id: SentenceId) -> Result<Sentence, SourceError> {
        debug!(%id, "GET sentence by id");
        match Self::send(self.get(&format!("/api/sentence/{id}"), &[])) {
            Err(SourceError::Status { status: 404, .. }) => Err(SourceError::NotFound(id)),
            other => other,
        }
    }

    fn check(&self, id: SentenceId, answer: &str) -> Result<CheckResult, SourceError> {
        let body = CheckRequest {
            sentence_id: id,
            answer,
        };
        Self::send(self.client.post(self.url("/api/check")).json(&body))
    }

    fn upload(&self, path: &Path) -> Result<Upload, SourceError> {
        require_extension(path, &["xlsx", "xls"], ".xlsx/.xls")?;
        let form = multipart::Form::new().file("file", path)?;
        Self::send(self.client.post(self.url("/api/upload-excel")).multipart(form))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use std::io::{BufRead, BufReader, Read, Write};
    use std::net::TcpListener;
    use std::sync::mpsc;
    use std::thread;

    /// Serves one canned response and reports the request line and body
    fn serve_once(status: &str, body: &str) -> (String, mpsc::Receiver<(String, String)>) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let (tx, rx) = mpsc::channel();
        let response = format!(
            "HTTP/1.1 {status}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
            body.len()
        );

        thread::spawn(move || {
            let (stream, _) = listener.accept().unwrap();
            let mut reader = BufReader::new(stream);
            let mut request_line = String::new();
            reader.read_line(&mut request_line).unwrap();

            let mut content_length = 0;
            loop {
                let mut line = String::new();
                reader.read_line(&mut line).unwrap();
                if line == "\r\n" || line.is_empty() {
                    break;
                }
                if let Some(v) = line.to_ascii_lowercase().strip_prefix("content-length:") {
                    content_length = v.trim().parse().unwrap();
                }
            }
            let mut request_body = vec![0; content_length];
            reader.read_exact(&mut request_body).unwrap();

            reader.get_mut().write_all(response.as_bytes()).unwrap();
            tx.send((
                request_line.trim().to_string(),
                String::from_utf8_lossy(&request_body).into_owned(),
            ))
            .unwrap();
        });

        (format!("http://{addr}/"), rx)
    }

    #[test]
    fn test_random_sends_difficulty_filter() {
        let (url, rx) = serve_once(
            "200 OK",
            r#"{"id": 3, "chinese": "我很好。", "english": "I am fine.", "difficulty": "cet4"}"#,
        );
        let source = HttpSentenceSource::new(url);

        let sentence = source
            .random(&["cet4".to_string(), "ielts".to_string()])
            .unwrap();

        assert_eq!(sentence.id, SentenceId(3));
        assert_eq!(sentence.target_text, "I am fine.");
        let (line, _) = rx.recv().unwrap();
        assert_eq!(line, "GET /api/sentence/random?difficulties=cet4%2Cielts HTTP/1.1");
    }

    #[test]
    fn test_list_without_filter_has_no_query() {
        let (url, rx) = serve_once(
            "200 OK",
            r#"{"sentences": [{"id": 1, "chinese": "a", "english": "A", "difficulty": "cet6"}]}"#,
        );
        let source = HttpSentenceSource::new(url);

        let list = source.list(&[]).unwrap();

        assert_eq!(list.len(), 1);
        let (line, _) = rx.recv().unwrap();
        assert_eq!(line, "GET /api/sentences/list HTTP/1.1");
    }

    #[test]
    fn test_by_id_not_found() {
        let (url, _rx) = serve_once("404 Not Found", r#"{"error": "no such sentence"}"#);
        let source = HttpSentenceSource::new(url);

        assert_matches!(source.by_id(SentenceId(9)), Err(SourceError::NotFound(SentenceId(9))));
    }

    #[test]
    fn test_check_posts_json_body() {
        let (url, rx) = serve_once(
            "200 OK",
            r#"{"is_correct": true, "correct_answer": "I am fine.", "user_answer": "i am fine."}"#,
        );
        let source = HttpSentenceSource::new(url);

        let result = source.check(SentenceId(3), "i am fine.").unwrap();

        assert!(result.is_correct);
        let (line, body) = rx.recv().unwrap();
        assert_eq!(line, "POST /api/check HTTP/1.1");
        let sent: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(sent["sentence_id"], 3);
        assert_eq!(sent["answer"], "i am fine.");
    }

    #[test]
    fn test_error_body_becomes_status_message() {
        let (url, _rx) = serve_once("400 Bad Request", r#"{"error": "bad difficulty"}"#);
        let source = HttpSentenceSource::new(url);

        let err = source.random(&["nope".to_string()]).unwrap_err();
        assert_matches!(err, SourceError::Status { status: 400, ref message } if message == "bad difficulty");
    }

    #[test]
    fn test_upload_rejects_wrong_extension_before_request() {
        let source = HttpSentenceSource::new("http://127.0.0.1:9");
        let result = source.upload(Path::new("deck.csv"));
        assert_matches!(result, Err(SourceError::UnsupportedFile { .. }));
    }

    #[test]
    fn test_base_url_trailing_slash_trimmed() {
        let source = HttpSentenceSource::new("http://localhost:5000/");
        assert_eq!(source.base_url(), "http://localhost:5000");
    }
}
