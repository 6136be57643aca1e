use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use super::{Content, Profile, SourceApi};
use crate::error::{RelayError, Result};

pub struct LineClient {
    http: reqwest::Client,
    api_base: String,
    data_api_base: String,
    access_token: String,
}

impl LineClient {
    pub fn new(
        api_base: &str,
        data_api_base: &str,
        access_token: &str,
        timeout: Duration,
    ) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| RelayError::Line(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            http,
            api_base: api_base.trim_end_matches('/').to_string(),
            data_api_base: data_api_base.trim_end_matches('/').to_string(),
            access_token: access_token.to_string(),
        })
    }

    async fn get(&self, url: &str) -> Result<reqwest::Response> {
        debug!("GET {url}");

        let resp = self
            .http
            .get(url)
            .bearer_auth(&self.access_token)
            .send()
            .await?;

        if resp.status() != reqwest::StatusCode::OK {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(RelayError::Line(format!("{url} returned {status}: {body}")));
        }
        Ok(resp)
    }
}

#[async_trait]
impl SourceApi for LineClient {
    async fn profile(&self, user_id: &str) -> Result<Profile> {
        let url = format!("{}/v2/bot/profile/{user_id}", self.api_base);
        let profile: Profile = self.get(&url).await?.json().await?;
        Ok(profile)
    }

    async fn content(&self, message_id: &str, max_bytes: usize) -> Result<Content> {
        let url = format!("{}/v2/bot/message/{message_id}/content", self.data_api_base);
        let mut resp = self.get(&url).await?;

        if let Some(len) = resp.content_length() {
            if len > max_bytes as u64 {
                debug!("{url} announces {len} bytes, over the {max_bytes} byte limit");
                return Ok(Content::TooLarge);
            }
        }

        let mut buf = Vec::new();
        while let Some(chunk) = resp.chunk().await? {
            buf.extend_from_slice(&chunk);
            if buf.len() > max_bytes {
                debug!("{url} passed the {max_bytes} byte limit mid-download");
                return Ok(Content::TooLarge);
            }
        }
        Ok(Content::Bytes(buf.into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::extract::Path;
    use axum::http::{HeaderMap, StatusCode};
    use axum::routing::get;
    use axum::{Json, Router};
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    async fn serve(app: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}")
    }

    fn authorized(headers: &HeaderMap) -> bool {
        headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            == Some("Bearer secret")
    }

    async fn fake_line() -> String {
        let app = Router::new()
            .route(
                "/v2/bot/profile/{id}",
                get(|Path(id): Path<String>, headers: HeaderMap| async move {
                    if !authorized(&headers) {
                        return Err(StatusCode::UNAUTHORIZED);
                    }
                    match id.as_str() {
                        "U1234567" => Ok(Json(serde_json::json!({"displayName": "Alice"}))),
                        "Unoname" => Ok(Json(serde_json::json!({"userId": "Unoname"}))),
                        _ => Err(StatusCode::INTERNAL_SERVER_ERROR),
                    }
                }),
            )
            .route(
                "/v2/bot/message/{id}/content",
                get(|Path(id): Path<String>, headers: HeaderMap| async move {
                    if !authorized(&headers) {
                        return Err(StatusCode::UNAUTHORIZED);
                    }
                    if id == "42" {
                        Ok(vec![0xFFu8, 0xD8, 0xFF])
                    } else {
                        Err(StatusCode::NOT_FOUND)
                    }
                }),
            );
        serve(app).await
    }

    fn client(base: &str, token: &str) -> LineClient {
        LineClient::new(base, base, token, Duration::from_secs(5)).unwrap()
    }

    #[test]
    fn test_client_construction_trims_base() {
        let c = client("https://api.line.me/", "t");
        assert_eq!(c.api_base, "https://api.line.me");
        assert_eq!(c.access_token, "t");
    }

    #[tokio::test]
    async fn test_profile_lookup() {
        let base = fake_line().await;
        let c = client(&base, "secret");

        let profile = c.profile("U1234567").await.unwrap();
        assert_eq!(profile.display_name.as_deref(), Some("Alice"));

        let profile = c.profile("Unoname").await.unwrap();
        assert!(profile.display_name.is_none());
    }

    #[tokio::test]
    async fn test_profile_error_status() {
        let base = fake_line().await;
        let err = client(&base, "secret").profile("U9999999999").await.unwrap_err();
        assert!(matches!(err, RelayError::Line(ref m) if m.contains("500")));
    }

    #[tokio::test]
    async fn test_bearer_token_is_sent() {
        let base = fake_line().await;
        let err = client(&base, "wrong").profile("U1234567").await.unwrap_err();
        assert!(matches!(err, RelayError::Line(ref m) if m.contains("401")));
    }

    #[tokio::test]
    async fn test_content_download() {
        let base = fake_line().await;
        let c = client(&base, "secret");
        assert_eq!(
            c.content("42", 1024).await.unwrap(),
            Content::Bytes(vec![0xFF, 0xD8, 0xFF].into())
        );
        assert!(c.content("43", 1024).await.is_err());
    }

    #[tokio::test]
    async fn test_content_exactly_at_limit() {
        let base = fake_line().await;
        let c = client(&base, "secret");
        assert!(matches!(c.content("42", 3).await.unwrap(), Content::Bytes(_)));
        assert_eq!(c.content("42", 2).await.unwrap(), Content::TooLarge);
    }

    #[tokio::test]
    async fn test_transport_error() {
        let c = client("http://127.0.0.1:1", "secret");
        assert!(matches!(c.content("42", 1024).await, Err(RelayError::Http(_))));
    }

    /// Serves one response: `head`, then `body_len` bytes, then stalls with
    /// the connection open.
    async fn stalling_server(head: String, body_len: usize) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request = [0u8; 4096];
            let _ = socket.read(&mut request).await;
            // The client may hang up early; write errors are expected.
            let _ = socket.write_all(head.as_bytes()).await;
            let _ = socket.write_all(&vec![0u8; body_len]).await;
            let _ = socket.flush().await;
            tokio::time::sleep(Duration::from_secs(60)).await;
            drop(socket);
        });
        format!("http://{addr}")
    }

    const MIB: usize = 1024 * 1024;

    #[tokio::test]
    async fn test_announced_length_over_limit_stops_early() {
        let head = format!("HTTP/1.1 200 OK\r\ncontent-length: {}\r\n\r\n", 4 * MIB);
        let base = stalling_server(head, MIB + 64 * 1024).await;
        let c = LineClient::new(&base, &base, "secret", Duration::from_secs(2)).unwrap();

        let started = std::time::Instant::now();
        assert_eq!(c.content("9", MIB).await.unwrap(), Content::TooLarge);
        assert!(started.elapsed() < Duration::from_secs(2));
    }

    #[tokio::test]
    async fn test_unannounced_length_over_limit_stops_early() {
        let head = "HTTP/1.1 200 OK\r\nconnection: close\r\n\r\n".to_string();
        let base = stalling_server(head, MIB + 64 * 1024).await;
        let c = LineClient::new(&base, &base, "secret", Duration::from_secs(2)).unwrap();

        assert_eq!(c.content("9", MIB).await.unwrap(), Content::TooLarge);
    }
}
