//! Telegram Bot API sink.

use std::time::Duration;

use reqwest::multipart::{Form, Part};
use serde::{Deserialize, Serialize};

use fallwatch_common::config::TelegramConfig;
use fallwatch_common::error::{FallwatchError, FallwatchResult};

use crate::sink::NotificationSink;

/// Envelope of every Bot API reply.
#[derive(Debug, Deserialize)]
struct TelegramResponse {
    ok: bool,
    #[serde(default)]
    description: Option<String>,
}

#[derive(Debug, Serialize)]
struct SendMessageRequest<'a> {
    chat_id: &'a str,
    text: &'a str,
}

/// Sends alerts through a Telegram bot.
pub struct TelegramSink {
    client: reqwest::Client,
    config: TelegramConfig,
}

impl TelegramSink {
    pub fn new(config: TelegramConfig, timeout: Duration) -> FallwatchResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| FallwatchError::notification(format!("HTTP client: {e}")))?;
        Ok(Self { client, config })
    }

    fn endpoint(&self, method: &str) -> String {
        format!(
            "{}/bot{}/{}",
            self.config.api_base.trim_end_matches('/'),
            self.config.bot_token,
            method
        )
    }

    async fn post(&self, method: &str, request: reqwest::RequestBuilder) -> FallwatchResult<()> {
        // reqwest errors carry the URL, which contains the bot token.
        let response = request.send().await.map_err(|e| {
            FallwatchError::notification(format!("{method} failed: {}", e.without_url()))
        })?;
        let status = response.status().as_u16();
        let body = response.text().await.map_err(|e| {
            FallwatchError::notification(format!("{method} reply unreadable: {}", e.without_url()))
        })?;
        interpret_reply(method, status, &body)
    }
}

impl std::fmt::Debug for TelegramSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelegramSink")
            .field("api_base", &self.config.api_base)
            .field("chat_id", &self.config.chat_id)
            .field("bot_token", &"<redacted>")
            .finish()
    }
}

#[async_trait::async_trait]
impl NotificationSink for TelegramSink {
    fn name(&self) -> &str {
        "telegram"
    }

    async fn send_message(&self, text: &str) -> FallwatchResult<()> {
        let request = self
            .client
            .post(self.endpoint("sendMessage"))
            .json(&SendMessageRequest {
                chat_id: &self.config.chat_id,
                text,
            });
        self.post("sendMessage", request).await
    }

    async fn send_photo(&self, jpeg: &[u8], caption: &str) -> FallwatchResult<()> {
        let photo = Part::bytes(jpeg.to_vec())
            .file_name("fall_detected.jpg")
            .mime_str("image/jpeg")
            .map_err(|e| FallwatchError::notification(format!("photo part: {e}")))?;
        let form = Form::new()
            .text("chat_id", self.config.chat_id.clone())
            .text("caption", caption.to_string())
            .part("photo", photo);
        let request = self.client.post(self.endpoint("sendPhoto")).multipart(form);
        self.post("sendPhoto", request).await
    }
}

/// Map an HTTP status and Bot API body to a result.
fn interpret_reply(method: &str, status: u16, body: &str) -> FallwatchResult<()> {
    let reply: Option<TelegramResponse> = serde_json::from_str(body).ok();
    match reply {
        Some(TelegramResponse { ok: true, .. }) if (200..300).contains(&status) => Ok(()),
        Some(TelegramResponse { description, .. }) => Err(FallwatchError::notification(format!(
            "{method} rejected (HTTP {status}): {}",
            description.unwrap_or_else(|| "no description".to_string())
        ))),
        None => Err(FallwatchError::notification(format!(
            "{method} returned HTTP {status} with an unexpected body"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    fn config(api_base: &str) -> TelegramConfig {
        TelegramConfig {
            bot_token: "123:secret".to_string(),
            chat_id: "42".to_string(),
            api_base: api_base.to_string(),
        }
    }

    /// Accept one HTTP request, answer with `reply`, return the raw request.
    async fn serve_once(listener: TcpListener, status: &'static str, reply: &'static str) -> String {
        let (mut socket, _) = listener.accept().await.unwrap();
        let mut raw = Vec::new();
        let mut buf = [0u8; 4096];
        loop {
            let n = socket.read(&mut buf).await.unwrap();
            raw.extend_from_slice(&buf[..n]);
            let text = String::from_utf8_lossy(&raw);
            if let Some(header_end) = text.find("\r\n\r\n") {
                let content_length = text[..header_end]
                    .lines()
                    .find_map(|l| {
                        let (name, value) = l.split_once(':')?;
                        name.eq_ignore_ascii_case("content-length")
                            .then(|| value.trim().parse::<usize>().ok())
                            .flatten()
                    })
                    .unwrap_or(0);
                if raw.len() >= header_end + 4 + content_length {
                    break;
                }
            }
            if n == 0 {
                break;
            }
        }
        let response = format!(
            "HTTP/1.1 {status}\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{reply}",
            reply.len()
        );
        socket.write_all(response.as_bytes()).await.unwrap();
        String::from_utf8_lossy(&raw).into_owned()
    }

    #[test]
    fn test_endpoint_format() {
        let sink = TelegramSink::new(config("https://api.telegram.org/"), Duration::from_secs(1))
            .unwrap();
        assert_eq!(
            sink.endpoint("sendMessage"),
            "https://api.telegram.org/bot123:secret/sendMessage"
        );
        assert!(!format!("{sink:?}").contains("secret"));
    }

    #[test]
    fn test_interpret_reply() {
        assert!(interpret_reply("sendMessage", 200, r#"{"ok":true,"result":{}}"#).is_ok());

        let err = interpret_reply(
            "sendMessage",
            400,
            r#"{"ok":false,"description":"Bad Request: chat not found"}"#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("chat not found"));

        assert!(interpret_reply("sendPhoto", 502, "<html>").is_err());
        assert!(interpret_reply("sendPhoto", 200, r#"{"ok":false}"#).is_err());
    }

    #[tokio::test]
    async fn test_send_message_posts_json() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base = format!("http://{}", listener.local_addr().unwrap());
        let server = tokio::spawn(serve_once(listener, "200 OK", r#"{"ok":true}"#));

        let sink = TelegramSink::new(config(&base), Duration::from_secs(5)).unwrap();
        sink.send_message("ALERT! Fall detected at 2024-01-01 10:00:00!")
            .await
            .unwrap();

        let request = server.await.unwrap();
        assert!(request.starts_with("POST /bot123:secret/sendMessage HTTP/1.1"));
        assert!(request.contains(r#""chat_id":"42""#));
        assert!(request.contains("Fall detected at 2024-01-01 10:00:00!"));
    }

    #[tokio::test]
    async fn test_send_photo_is_multipart() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base = format!("http://{}", listener.local_addr().unwrap());
        let server = tokio::spawn(serve_once(listener, "200 OK", r#"{"ok":true}"#));

        let sink = TelegramSink::new(config(&base), Duration::from_secs(5)).unwrap();
        sink.send_photo(&[0xFF, 0xD8, 0xFF, 0xD9], "Fall detected at now")
            .await
            .unwrap();

        let request = server.await.unwrap();
        assert!(request.starts_with("POST /bot123:secret/sendPhoto HTTP/1.1"));
        assert!(request.to_ascii_lowercase().contains("multipart/form-data"));
        assert!(request.contains(r#"name="caption""#));
        assert!(request.contains(r#"name="photo"; filename="fall_detected.jpg""#));
    }

    #[tokio::test]
    async fn test_rejection_is_notification_error() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base = format!("http://{}", listener.local_addr().unwrap());
        let server = tokio::spawn(serve_once(
            listener,
            "401 Unauthorized",
            r#"{"ok":false,"description":"Unauthorized"}"#,
        ));

        let sink = TelegramSink::new(config(&base), Duration::from_secs(5)).unwrap();
        let err = sink.send_message("hi").await.unwrap_err();
        assert!(matches!(err, FallwatchError::Notification { .. }));
        assert!(!err.to_string().contains("secret"));
        server.await.unwrap();
    }
}
