use std::thread;
use std::time::{Duration, Instant};

use anyhow::{bail, Context, Result};
use reqwest::blocking::{Client as HttpClient, Response as HttpResponse};
use serde_json::{json, Value};

use crate::config::PipelineConfig;
use crate::model::{GenerateRequest, ImageModel};
use crate::truncate_text;

/// Replicate predictions API client.
///
/// Every HTTP call and the polling loop share one deadline equal to the invoker timeout,
/// so a call the invoker has already abandoned still winds down on its own.
pub struct ReplicateModel {
    api_base: String,
    api_token: String,
    model: String,
    deadline: Duration,
    poll_interval: Duration,
    http: HttpClient,
}

impl ReplicateModel {
    pub fn new(config: &PipelineConfig, api_token: impl Into<String>) -> Result<Self> {
        let http = HttpClient::builder()
            .build()
            .context("failed to build Replicate HTTP client")?;
        Ok(Self {
            api_base: config.api_base.trim_end_matches('/').to_string(),
            api_token: api_token.into(),
            model: config.model.clone(),
            deadline: config.timeout,
            poll_interval: config.poll_interval,
            http,
        })
    }

    fn predictions_endpoint(&self) -> String {
        format!("{}/predictions", self.api_base)
    }

    fn remaining(&self, started: Instant) -> Result<Duration> {
        let remaining = self.deadline.saturating_sub(started.elapsed());
        if remaining.is_zero() {
            bail!(
                "Replicate prediction exceeded {:.1}s",
                self.deadline.as_secs_f64()
            );
        }
        Ok(remaining)
    }

    fn poll_prediction(&self, poll_url: &str, started: Instant) -> Result<Value> {
        loop {
            let response = self
                .http
                .get(poll_url)
                .bearer_auth(&self.api_token)
                .timeout(self.remaining(started)?)
                .send()
                .with_context(|| format!("Replicate poll request failed ({poll_url})"))?;
            let payload = response_json_or_error("Replicate poll", response)?;
            match prediction_status(&payload).as_str() {
                "succeeded" => return Ok(payload),
                "failed" | "canceled" => bail!(
                    "Replicate prediction {}: {}",
                    prediction_status(&payload),
                    prediction_error(&payload)
                ),
                _ => {}
            }
            let pause = self.poll_interval.min(self.remaining(started)?);
            thread::sleep(pause);
        }
    }
}

impl ImageModel for ReplicateModel {
    fn name(&self) -> &str {
        "replicate"
    }

    fn model_id(&self) -> &str {
        &self.model
    }

    fn generate(&self, request: &GenerateRequest) -> Result<Value> {
        let started = Instant::now();
        let endpoint = self.predictions_endpoint();
        let payload = json!({
            "model": self.model,
            "input": Value::Object(request.input()),
        });
        let response = self
            .http
            .post(&endpoint)
            .bearer_auth(&self.api_token)
            .header("Prefer", "wait")
            .timeout(self.remaining(started)?)
            .json(&payload)
            .send()
            .with_context(|| format!("Replicate request failed ({endpoint})"))?;
        let mut prediction = response_json_or_error("Replicate", response)?;

        let status = prediction_status(&prediction);
        if status != "succeeded" {
            if !matches!(status.as_str(), "starting" | "processing") {
                bail!(
                    "Replicate prediction {}: {}",
                    if status.is_empty() { "unknown" } else { status.as_str() },
                    prediction_error(&prediction)
                );
            }
            let poll_url = prediction
                .get("urls")
                .and_then(Value::as_object)
                .and_then(|urls| urls.get("get"))
                .and_then(Value::as_str)
                .map(str::trim)
                .filter(|value| !value.is_empty())
                .map(str::to_string)
                .ok_or_else(|| anyhow::anyhow!("Replicate prediction missing poll URL"))?;
            prediction = self.poll_prediction(&poll_url, started)?;
        }

        Ok(prediction.get("output").cloned().unwrap_or(Value::Null))
    }
}

fn prediction_status(prediction: &Value) -> String {
    prediction
        .get("status")
        .and_then(Value::as_str)
        .map(|value| value.trim().to_ascii_lowercase())
        .unwrap_or_default()
}

fn prediction_error(prediction: &Value) -> String {
    match prediction.get("error") {
        Some(Value::String(text)) if !text.trim().is_empty() => truncate_text(text.trim(), 512),
        Some(Value::Null) | None => "no error detail".to_string(),
        Some(other) => truncate_text(&other.to_string(), 512),
    }
}

fn response_json_or_error(label: &str, response: HttpResponse) -> Result<Value> {
    let status = response.status();
    let code = status.as_u16();
    let body = response
        .text()
        .with_context(|| format!("{label} response body read failed"))?;
    if !status.is_success() {
        bail!(
            "{label} request failed ({code}): {}",
            truncate_text(&body, 512)
        );
    }
    let parsed: Value = serde_json::from_str(&body)
        .with_context(|| format!("{label} returned invalid JSON payload"))?;
    Ok(parsed)
}

#[cfg(test)]
mod tests {
    use std::io::{BufRead, BufReader, Read, Write};
    use std::net::TcpListener;
    use std::sync::mpsc;
    use std::thread;
    use std::time::Duration;

    use serde_json::{json, Value};

    use super::{prediction_error, prediction_status, ReplicateModel};
    use crate::config::{OutputSettings, PipelineConfig};
    use crate::model::{GenerateRequest, ImageModel};

    struct Captured {
        request_line: String,
        headers: Vec<String>,
        body: String,
    }

    /// Serves scripted responses in order, one connection each, and reports what it saw.
    /// The script is built from the server's base URL so replies can point back at it.
    fn serve(
        script: impl FnOnce(&str) -> Vec<(u16, String)>,
    ) -> anyhow::Result<(String, mpsc::Receiver<Captured>)> {
        let listener = TcpListener::bind("127.0.0.1:0")?;
        let base = format!("http://{}", listener.local_addr()?);
        let responses = script(&base);
        let (tx, rx) = mpsc::channel();
        thread::spawn(move || {
            for (status, body) in responses {
                let Ok((stream, _)) = listener.accept() else {
                    return;
                };
                let mut reader = BufReader::new(stream);
                let mut request_line = String::new();
                let _ = reader.read_line(&mut request_line);
                let mut headers = Vec::new();
                let mut content_length = 0usize;
                loop {
                    let mut line = String::new();
                    if reader.read_line(&mut line).unwrap_or(0) == 0 {
                        break;
                    }
                    let line = line.trim_end().to_string();
                    if line.is_empty() {
                        break;
                    }
                    if let Some((name, value)) = line.split_once(':') {
                        if name.eq_ignore_ascii_case("content-length") {
                            content_length = value.trim().parse().unwrap_or(0);
                        }
                    }
                    headers.push(line);
                }
                let mut body_bytes = vec![0u8; content_length];
                let _ = reader.read_exact(&mut body_bytes);
                let _ = tx.send(Captured {
                    request_line: request_line.trim_end().to_string(),
                    headers,
                    body: String::from_utf8_lossy(&body_bytes).to_string(),
                });
                let mut stream = reader.into_inner();
                let reply = format!(
                    "HTTP/1.1 {status} OK\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                    body.len()
                );
                let _ = stream.write_all(reply.as_bytes());
                let _ = stream.flush();
            }
        });
        Ok((base, rx))
    }

    fn client(base: &str) -> anyhow::Result<ReplicateModel> {
        let config = PipelineConfig {
            api_base: format!("{base}/v1"),
            timeout: Duration::from_secs(5),
            poll_interval: Duration::from_millis(10),
            ..PipelineConfig::default()
        };
        ReplicateModel::new(&config, "r8_test")
    }

    fn request() -> GenerateRequest {
        GenerateRequest::new(
            "https://cdn.example.com/room.jpg",
            "Redesign this room",
            &["https://cdn.example.com/inspo.jpg".to_string()],
            &OutputSettings::default(),
        )
    }

    #[test]
    fn posts_prediction_and_returns_output() -> anyhow::Result<()> {
        let (base, seen) = serve(|_| {
            vec![(
                201,
                json!({
                    "id": "p1",
                    "status": "succeeded",
                    "output": ["https://replicate.delivery/out-0.jpg"],
                })
                .to_string(),
            )]
        })?;
        let model = client(&base)?;

        let output = model.generate(&request())?;
        assert_eq!(output, json!(["https://replicate.delivery/out-0.jpg"]));

        let captured = seen.recv_timeout(Duration::from_secs(5))?;
        assert_eq!(captured.request_line, "POST /v1/predictions HTTP/1.1");
        let lowered: Vec<String> = captured
            .headers
            .iter()
            .map(|header| header.to_ascii_lowercase())
            .collect();
        assert!(lowered.contains(&"authorization: bearer r8_test".to_string()));
        assert!(lowered.contains(&"prefer: wait".to_string()));
        let body: Value = serde_json::from_str(&captured.body)?;
        assert_eq!(body["model"], json!("adirik/interior-design"));
        assert_eq!(body["input"]["image"], json!("https://cdn.example.com/room.jpg"));
        assert_eq!(
            body["input"]["reference_images"],
            json!(["https://cdn.example.com/inspo.jpg"])
        );
        Ok(())
    }

    #[test]
    fn polls_until_prediction_succeeds() -> anyhow::Result<()> {
        let (base, seen) = serve(|base| {
            let poll_url = format!("{base}/v1/predictions/p2");
            vec![
                (
                    201,
                    json!({ "id": "p2", "status": "starting", "urls": { "get": poll_url } })
                        .to_string(),
                ),
                (200, json!({ "id": "p2", "status": "processing" }).to_string()),
                (
                    200,
                    json!({
                        "id": "p2",
                        "status": "succeeded",
                        "output": ["https://replicate.delivery/p2.jpg"],
                    })
                    .to_string(),
                ),
            ]
        })?;
        let model = client(&base)?;
        let output = model.generate(&request())?;
        assert_eq!(output, json!(["https://replicate.delivery/p2.jpg"]));

        let lines: Vec<String> = seen
            .try_iter()
            .map(|captured| captured.request_line)
            .collect();
        assert_eq!(
            lines,
            vec![
                "POST /v1/predictions HTTP/1.1",
                "GET /v1/predictions/p2 HTTP/1.1",
                "GET /v1/predictions/p2 HTTP/1.1",
            ]
        );
        Ok(())
    }

    #[test]
    fn non_success_status_becomes_error_with_body() -> anyhow::Result<()> {
        let (base, _seen) = serve(|_| vec![(422, json!({ "detail": "bad input" }).to_string())])?;
        let model = client(&base)?;
        let err = model.generate(&request()).unwrap_err();
        let text = format!("{err:#}");
        assert!(text.contains("(422)"), "unexpected error: {text}");
        assert!(text.contains("bad input"));
        Ok(())
    }

    #[test]
    fn failed_prediction_surfaces_model_error() -> anyhow::Result<()> {
        let (base, _seen) = serve(|_| {
            vec![(
                201,
                json!({ "id": "p3", "status": "failed", "error": "NSFW content detected" })
                    .to_string(),
            )]
        })?;
        let model = client(&base)?;
        let err = model.generate(&request()).unwrap_err();
        assert!(err.to_string().contains("NSFW content detected"));
        Ok(())
    }

    #[test]
    fn status_and_error_helpers_normalize_payloads() {
        assert_eq!(prediction_status(&json!({ "status": " Succeeded " })), "succeeded");
        assert_eq!(prediction_status(&json!({})), "");
        assert_eq!(prediction_error(&json!({ "error": null })), "no error detail");
        assert_eq!(prediction_error(&json!({ "error": { "code": 1 } })), "{\"code\":1}");
    }
}
