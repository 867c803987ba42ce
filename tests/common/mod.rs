//! Common test utilities for the smash_or_pass integration tests
//!
//! - `fake_provider`: a mockito server speaking just enough of the xAI API
//! - `scripted`: an in-process `VerdictProvider` with call counting and gates
//! - `images`: test images written to temp files

#![allow(dead_code)]

/// Mock HTTP server standing in for the provider
pub mod fake_provider {
    use std::io::Write;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use mockito::{Mock, ServerGuard};
    use serde_json::{Value, json};

    /// One request as the server saw it
    #[derive(Debug, Clone)]
    pub struct RecordedRequest {
        pub method: String,
        pub path: String,
        pub authorization: Option<String>,
        pub body: String,
    }

    impl RecordedRequest {
        fn from_mock(request: &mockito::Request) -> Self {
            Self {
                method: request.method().to_string(),
                path: request.path().to_string(),
                authorization: request
                    .header("authorization")
                    .first()
                    .and_then(|value| value.to_str().ok())
                    .map(str::to_string),
                body: request
                    .body()
                    .map(|bytes| String::from_utf8_lossy(bytes).into_owned())
                    .unwrap_or_default(),
            }
        }

        pub fn json(&self) -> Value {
            serde_json::from_str(&self.body).expect("request body is JSON")
        }
    }

    /// What to send back
    #[derive(Debug, Clone)]
    pub struct FakeResponse {
        pub status: u16,
        pub content_type: &'static str,
        pub chunks: Vec<String>,
        pub delay: Duration,
    }

    impl FakeResponse {
        pub fn json(status: u16, body: Value) -> Self {
            Self {
                status,
                content_type: "application/json",
                chunks: vec![body.to_string()],
                delay: Duration::ZERO,
            }
        }

        pub fn text(status: u16, body: &str) -> Self {
            Self {
                status,
                content_type: "text/html",
                chunks: vec![body.to_string()],
                delay: Duration::ZERO,
            }
        }

        /// SSE stream of `choices[0].delta.content` chunks, one body chunk each
        pub fn sse<S: AsRef<str>>(deltas: &[S]) -> Self {
            let mut chunks: Vec<String> = vec![sse_chunk(&json!({
                "choices": [{ "index": 0, "delta": { "role": "assistant" } }]
            }))];
            chunks.extend(deltas.iter().map(|d| {
                sse_chunk(&json!({
                    "choices": [{ "index": 0, "delta": { "content": d.as_ref() } }]
                }))
            }));
            chunks.push("data: [DONE]\n\n".to_string());
            Self {
                status: 200,
                content_type: "text/event-stream",
                chunks,
                delay: Duration::from_millis(2),
            }
        }

        /// Non-streamed chat completion carrying `content`
        pub fn completion(content: &str) -> Self {
            Self::json(
                200,
                json!({
                    "id": "cmpl-1",
                    "object": "chat.completion",
                    "choices": [{
                        "index": 0,
                        "message": { "role": "assistant", "content": content },
                        "finish_reason": "stop"
                    }]
                }),
            )
        }
    }

    fn sse_chunk(value: &Value) -> String {
        format!("data: {value}\n\n")
    }

    /// Split `text` into pieces of at most `size` characters
    pub fn split_chars(text: &str, size: usize) -> Vec<String> {
        let chars: Vec<char> = text.chars().collect();
        chars.chunks(size).map(|c| c.iter().collect()).collect()
    }

    /// A mockito server answering one endpoint under `/v1`
    pub struct FakeProvider {
        pub base_url: String,
        requests: Arc<Mutex<Vec<RecordedRequest>>>,
        _mock: Mock,
        _server: ServerGuard,
    }

    impl FakeProvider {
        /// Answer `POST /v1/chat/completions`
        pub async fn chat(response: FakeResponse) -> Self {
            Self::start("POST", "/v1/chat/completions", response).await
        }

        /// Answer `GET /v1/models`
        pub async fn models(response: FakeResponse) -> Self {
            Self::start("GET", "/v1/models", response).await
        }

        async fn start(method: &str, path: &str, response: FakeResponse) -> Self {
            let mut server = mockito::Server::new_async().await;
            let requests = Arc::new(Mutex::new(Vec::new()));

            let recorded = requests.clone();
            let FakeResponse {
                status,
                content_type,
                chunks,
                delay,
            } = response;
            let mock = server
                .mock(method, path)
                .match_request(move |request| {
                    recorded
                        .lock()
                        .unwrap()
                        .push(RecordedRequest::from_mock(request));
                    true
                })
                .with_status(usize::from(status))
                .with_header("content-type", content_type)
                .with_header("cache-control", "no-cache")
                .with_chunked_body(move |writer| {
                    for chunk in &chunks {
                        writer.write_all(chunk.as_bytes())?;
                        writer.flush()?;
                        if !delay.is_zero() {
                            std::thread::sleep(delay);
                        }
                    }
                    Ok(())
                })
                .create_async()
                .await;

            Self {
                base_url: format!("{}/v1", server.url()),
                requests,
                _mock: mock,
                _server: server,
            }
        }

        pub fn requests(&self) -> Vec<RecordedRequest> {
            self.requests.lock().unwrap().clone()
        }

        pub fn request_count(&self) -> usize {
            self.requests.lock().unwrap().len()
        }
    }
}

/// In-process provider with scripted answers
pub mod scripted {
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use futures_util::stream;
    use smash_or_pass::client::{JudgeRequest, PartialStream, VerdictProvider};
    use smash_or_pass::error::VerdictResult;
    use smash_or_pass::verdict::{PartialVerdict, Verdict};
    use tokio::sync::oneshot;

    /// Answers call `n` with `answers[n]`, optionally waiting on a gate first
    pub struct ScriptedProvider {
        answers: Vec<Verdict>,
        gates: Mutex<Vec<Option<oneshot::Receiver<()>>>>,
        calls: AtomicUsize,
        pub images: Mutex<Vec<(u32, u32)>>,
    }

    impl ScriptedProvider {
        pub fn new(answers: Vec<Verdict>) -> Self {
            let gates = answers.iter().map(|_| None).collect();
            Self {
                answers,
                gates: Mutex::new(gates),
                calls: AtomicUsize::new(0),
                images: Mutex::new(Vec::new()),
            }
        }

        /// Make call `index` wait until the returned sender fires
        pub fn gate(&self, index: usize) -> oneshot::Sender<()> {
            let (tx, rx) = oneshot::channel();
            self.gates.lock().unwrap()[index] = Some(rx);
            tx
        }

        pub fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }

        async fn answer(&self, request: &JudgeRequest) -> Verdict {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            self.images
                .lock()
                .unwrap()
                .push((request.image.size.w, request.image.size.h));
            let gate = self.gates.lock().unwrap()[n].take();
            if let Some(gate) = gate {
                let _ = gate.await;
            }
            self.answers[n].clone()
        }
    }

    #[async_trait]
    impl VerdictProvider for ScriptedProvider {
        async fn judge(&self, request: &JudgeRequest) -> VerdictResult<Verdict> {
            Ok(self.answer(request).await)
        }

        async fn judge_stream(&self, request: &JudgeRequest) -> VerdictResult<PartialStream> {
            let verdict = self.answer(request).await;
            let snapshots = vec![
                Ok(PartialVerdict {
                    verdict: Some(verdict.verdict),
                    ..Default::default()
                }),
                Ok(PartialVerdict::from(verdict)),
            ];
            Ok(Box::pin(stream::iter(snapshots)))
        }
    }
}

/// Test images on disk
pub mod images {
    use std::path::PathBuf;

    use image::{ImageFormat, Rgb, RgbImage};
    use tempfile::TempDir;

    /// Write a solid `w`x`h` PNG into `dir`
    pub fn png(dir: &TempDir, name: &str, w: u32, h: u32) -> PathBuf {
        let path = dir.path().join(name);
        RgbImage::from_pixel(w, h, Rgb([200, 120, 40]))
            .save_with_format(&path, ImageFormat::Png)
            .unwrap();
        path
    }

    pub fn garbage(dir: &TempDir, name: &str) -> PathBuf {
        let path = dir.path().join(name);
        std::fs::write(&path, b"this is not an image").unwrap();
        path
    }
}

use smash_or_pass::verdict::{Rating, Verdict, VerdictKind};

pub const VERDICT_JSON: &str =
    r#"{"verdict":"smash","rating":"8","explanation":"Great light and a confident pose."}"#;

pub fn verdict(kind: VerdictKind, rating: u8, explanation: &str) -> Verdict {
    Verdict {
        verdict: kind,
        rating: Rating::new(rating).unwrap(),
        explanation: explanation.to_string(),
    }
}
