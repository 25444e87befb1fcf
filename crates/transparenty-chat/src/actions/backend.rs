//! Bearer-authenticated client for the platform's data backend.

use anyhow::{anyhow, Result};
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::time::Duration;

use crate::config::BackendConfig;
use crate::llm::external::{describe_send_error, parse_json_response};

#[derive(Clone)]
pub struct BackendClient {
    base_url: String,
    api_key: String,
    client: Client,
}

impl BackendClient {
    pub fn new(config: &BackendConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .connect_timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| anyhow!("Failed to create backend HTTP client: {}", e))?;

        Ok(Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            client,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// GET `path` and decode the JSON body. Anything but HTTP 200 is an error.
    pub async fn get_value(&self, path: &str, params: &[(&str, String)]) -> Result<Value> {
        let endpoint = format!("{}{}", self.base_url, path);

        let response = self
            .client
            .get(&endpoint)
            .bearer_auth(&self.api_key)
            .query(params)
            .send()
            .await
            .map_err(|e| describe_send_error(&endpoint, e))?;

        let status = response.status();
        if status != reqwest::StatusCode::OK {
            return Err(anyhow!("Backend {} returned HTTP {}", endpoint, status));
        }

        parse_json_response(response, &endpoint).await
    }

    /// GET a list that the backend may return bare or wrapped as `{"<key>": [...]}`.
    pub async fn get_list<T: DeserializeOwned>(
        &self,
        path: &str,
        key: &str,
        params: &[(&str, String)],
    ) -> Result<Vec<T>> {
        let mut value = self.get_value(path, params).await?;
        let list = match value.get_mut(key) {
            Some(inner) => inner.take(),
            None => value,
        };
        Ok(serde_json::from_value(list)?)
    }

    pub async fn get<T: DeserializeOwned>(&self, path: &str, params: &[(&str, String)]) -> Result<T> {
        let value = self.get_value(path, params).await?;
        Ok(serde_json::from_value(value)?)
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! One-shot HTTP responder for handler tests.

    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Serve `body` with `status` to the first `requests` connections, returning the base URL.
    pub async fn serve(status: u16, body: &str, requests: usize) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let body = body.to_string();

        tokio::spawn(async move {
            for _ in 0..requests {
                let Ok((mut socket, _)) = listener.accept().await else {
                    return;
                };
                let mut buf = [0u8; 4096];
                let _ = socket.read(&mut buf).await;
                let response = format!(
                    "HTTP/1.1 {} X\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                    status,
                    body.len(),
                    body
                );
                let _ = socket.write_all(response.as_bytes()).await;
                let _ = socket.shutdown().await;
            }
        });

        format!("http://{}", addr)
    }

    /// Serve one request and report its request line (`GET /path?query HTTP/1.1`).
    pub async fn serve_recording(status: u16, body: &str) -> (String, tokio::sync::oneshot::Receiver<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let body = body.to_string();
        let (tx, rx) = tokio::sync::oneshot::channel();

        tokio::spawn(async move {
            let Ok((mut socket, _)) = listener.accept().await else {
                return;
            };
            let mut buf = [0u8; 4096];
            let n = socket.read(&mut buf).await.unwrap_or(0);
            let request = String::from_utf8_lossy(&buf[..n]);
            let _ = tx.send(request.lines().next().unwrap_or_default().to_string());

            let response = format!(
                "HTTP/1.1 {} X\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                status,
                body.len(),
                body
            );
            let _ = socket.write_all(response.as_bytes()).await;
            let _ = socket.shutdown().await;
        });

        (format!("http://{}", addr), rx)
    }

    pub fn client(base_url: &str) -> BackendClient {
        BackendClient::new(&BackendConfig {
            base_url: base_url.to_string(),
            api_key: "test-key".to_string(),
            timeout_secs: 2,
        })
        .unwrap()
    }

    /// Nothing listens on port 1, so every request fails fast.
    pub fn unreachable() -> BackendClient {
        client("http://127.0.0.1:1")
    }
}
