// 上传传输能力
//
// 以 multipart/form-data 把整个文件 POST 到指定地址

use std::time::Duration;

use async_trait::async_trait;
use reqwest::multipart;
use reqwest::Client;
use tracing::debug;

/// 上传失败原因
#[derive(Debug, thiserror::Error)]
pub enum UploadError {
    /// 客户端构建失败
    #[error("创建 HTTP 客户端失败: {0}")]
    Client(#[source] reqwest::Error),
    /// 请求发送或响应读取失败
    #[error("上传请求失败: {0}")]
    Request(#[from] reqwest::Error),
}

/// 服务端响应
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UploadResponse {
    pub status: u16,
}

impl UploadResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// 上传传输能力
#[async_trait]
pub trait FileUploader: Send + Sync {
    /// 以 `field` 为字段名、`file_name` 为附件名上传 `data`
    async fn upload(
        &self,
        url: &str,
        field: &str,
        data: Vec<u8>,
        file_name: &str,
    ) -> Result<UploadResponse, UploadError>;
}

/// 基于 reqwest 的上传实现
#[derive(Debug, Clone)]
pub struct HttpUploader {
    client: Client,
}

impl HttpUploader {
    pub fn new(timeout: Duration) -> Result<Self, UploadError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(UploadError::Client)?;
        Ok(Self { client })
    }

    pub fn with_client(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl FileUploader for HttpUploader {
    async fn upload(
        &self,
        url: &str,
        field: &str,
        data: Vec<u8>,
        file_name: &str,
    ) -> Result<UploadResponse, UploadError> {
        let size = data.len();

        // 构建 multipart form
        let part = multipart::Part::bytes(data)
            .file_name(file_name.to_string())
            .mime_str("application/octet-stream")?;

        let form = multipart::Form::new().part(field.to_string(), part);

        let response = self.client.post(url).multipart(form).send().await?;
        let status = response.status().as_u16();

        debug!(
            "上传响应: url={}, file={}, size={}, status={}",
            url, file_name, size, status
        );

        Ok(UploadResponse { status })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::extract::{Multipart, State};
    use axum::http::StatusCode;
    use axum::routing::post;
    use axum::Router;
    use std::sync::Arc;
    use tokio::sync::Mutex;

    type Received = Arc<Mutex<Vec<(String, Option<String>, Vec<u8>)>>>;

    async fn receive(State(received): State<Received>, mut multipart: Multipart) -> StatusCode {
        while let Ok(Some(field)) = multipart.next_field().await {
            let name = field.name().unwrap_or_default().to_string();
            let file_name = field.file_name().map(|s| s.to_string());
            let data = field.bytes().await.unwrap_or_default().to_vec();
            received.lock().await.push((name, file_name, data));
        }
        StatusCode::OK
    }

    async fn reject() -> StatusCode {
        StatusCode::INTERNAL_SERVER_ERROR
    }

    async fn spawn_server(received: Received) -> String {
        let app = Router::new()
            .route("/upload", post(receive))
            .route("/broken", post(reject))
            .with_state(received);

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{}", addr)
    }

    #[test]
    fn test_response_status() {
        assert!(UploadResponse { status: 200 }.is_success());
        assert!(UploadResponse { status: 204 }.is_success());
        assert!(!UploadResponse { status: 404 }.is_success());
        assert!(!UploadResponse { status: 500 }.is_success());
    }

    #[tokio::test]
    async fn test_multipart_upload() {
        let received: Received = Arc::default();
        let base = spawn_server(Arc::clone(&received)).await;
        let uploader = HttpUploader::new(Duration::from_secs(10)).unwrap();

        let response = uploader
            .upload(&format!("{}/upload", base), "file", b"v1".to_vec(), "a.txt")
            .await
            .unwrap();
        assert!(response.is_success());

        let received = received.lock().await;
        assert_eq!(received.len(), 1);
        assert_eq!(received[0].0, "file");
        assert_eq!(received[0].1.as_deref(), Some("a.txt"));
        assert_eq!(received[0].2, b"v1");
    }

    #[tokio::test]
    async fn test_non_success_status() {
        let base = spawn_server(Arc::default()).await;
        let uploader = HttpUploader::new(Duration::from_secs(10)).unwrap();

        let response = uploader
            .upload(&format!("{}/broken", base), "file", b"x".to_vec(), "a.txt")
            .await
            .unwrap();
        assert_eq!(response.status, 500);
        assert!(!response.is_success());
    }

    #[tokio::test]
    async fn test_connection_refused() {
        // 绑定后立即释放端口，保证无人监听
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let uploader = HttpUploader::new(Duration::from_secs(5)).unwrap();
        let result = uploader
            .upload(&format!("http://{}/upload", addr), "file", b"x".to_vec(), "a.txt")
            .await;
        assert!(matches!(result, Err(UploadError::Request(_))));
    }
}
