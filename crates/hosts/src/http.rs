//! Plumbing shared by the HTTP adapters.

use crate::error::{ErrorKind, Result as HostResult};
use exn::ResultExt;
use futures::SinkExt;
use futures::channel::mpsc;
use reqwest::{Body, Client, RequestBuilder, StatusCode};
use std::time::Duration;
use tokio::io::AsyncReadExt;
use tokio_util::sync::CancellationToken;
use woof_provider::UploadBody;
use woof_provider::error::{ProviderError, Result};

/// Bytes read from the upload body per chunk.
const CHUNK_SIZE: usize = 64 * 1024;
/// Chunks buffered between the body reader and the HTTP connection.
const PIPE_DEPTH: usize = 4;
/// Longest slice of a response body quoted in an error message.
const MAX_QUOTED_BODY: usize = 256;

pub(crate) fn client(provider: &str, timeout: Duration) -> HostResult<Client> {
    Client::builder()
        .timeout(timeout)
        .user_agent(concat!("woof/", env!("CARGO_PKG_VERSION")))
        .build()
        .or_raise(|| ErrorKind::Client(provider.to_string()))
}

/// Status and raw text of a completed exchange.
#[derive(Debug)]
pub(crate) struct Reply {
    pub status: StatusCode,
    pub text: String,
}

/// Send the request produced by `build`, streaming `body` into it.
///
/// The body is pumped through a small bounded pipe as the connection asks for
/// it, so memory use stays flat regardless of file size. Cancellation aborts
/// the exchange.
pub(crate) async fn send_streaming(
    cancel: &CancellationToken,
    body: &mut dyn UploadBody,
    build: impl FnOnce(Body) -> RequestBuilder,
) -> Result<Reply> {
    let (tx, rx) = mpsc::channel::<std::io::Result<Vec<u8>>>(PIPE_DEPTH);
    let request = build(Body::wrap_stream(rx));
    let exchange = async move {
        let response = request.send().await.map_err(transport_error)?;
        let status = response.status();
        let text = response.text().await.map_err(transport_error)?;
        Ok::<_, woof_provider::error::Error>(Reply { status, text })
    };
    let pump = pump(body, tx);
    tokio::pin!(exchange, pump);

    // The pump is polled ahead of the exchange so that a local read failure
    // wins over the transport error it provokes.
    let mut pumping = true;
    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(woof_provider::error::cancelled("upload cancelled")),
            pumped = &mut pump, if pumping => {
                pumping = false;
                pumped.or_raise(|| ProviderError::unknown("failed to read upload body"))?;
            },
            reply = &mut exchange => return reply,
        }
    }
}

/// Copy `body` into the pipe. A read error aborts the request body and is
/// handed back to the caller.
async fn pump(body: &mut dyn UploadBody, mut tx: mpsc::Sender<std::io::Result<Vec<u8>>>) -> std::io::Result<()> {
    let mut buffer = vec![0u8; CHUNK_SIZE];
    loop {
        let read = match body.read(&mut buffer).await {
            Ok(0) => return Ok(()),
            Ok(read) => read,
            Err(e) => {
                let _ = tx.send(Err(std::io::Error::other("upload body unreadable"))).await;
                return Err(e);
            },
        };
        // A closed pipe means the connection has given up on the body.
        if tx.send(Ok(buffer[..read].to_vec())).await.is_err() {
            return Ok(());
        }
    }
}

/// Transport-level failure: nothing usable came back from the service.
pub(crate) fn transport_error(err: reqwest::Error) -> woof_provider::error::Error {
    let message = if err.is_timeout() {
        "request timed out"
    } else if err.is_connect() {
        "connection failed"
    } else {
        "request failed"
    };
    exn::Exn::from(err).raise(ProviderError::network(message))
}

/// Map a non-success HTTP status onto the error taxonomy.
pub(crate) fn status_error(status: StatusCode, text: &str) -> ProviderError {
    let code = status.as_u16().to_string();
    let quoted: String = text.trim().chars().take(MAX_QUOTED_BODY).collect();
    let message = format!("upload failed with status {}: {quoted}", status.as_u16());
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => ProviderError::authentication(message).with_code(code),
        StatusCode::TOO_MANY_REQUESTS => ProviderError::quota(message).with_code(code),
        status if status.is_server_error() => ProviderError::temporary(message).with_code(code),
        _ => ProviderError::api(code, message),
    }
}

/// Parse a JSON reply body, reporting garbage as an API error.
pub(crate) fn parse_json<T: serde::de::DeserializeOwned>(text: &str) -> Result<T> {
    serde_json::from_str(text).or_raise(|| ProviderError::api("JSON_PARSE_ERROR", "failed to parse response"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use woof_provider::error::ErrorKind;

    #[rstest]
    #[case(401, ErrorKind::Authentication)]
    #[case(403, ErrorKind::Authentication)]
    #[case(429, ErrorKind::Quota)]
    #[case(500, ErrorKind::Temporary)]
    #[case(503, ErrorKind::Temporary)]
    #[case(400, ErrorKind::Api)]
    #[case(404, ErrorKind::Api)]
    #[case(413, ErrorKind::Api)]
    fn test_status_mapping(#[case] status: u16, #[case] expected: ErrorKind) {
        let error = status_error(StatusCode::from_u16(status).unwrap(), "nope");
        assert_eq!(error.kind(), expected);
        assert_eq!(error.code(), Some(status.to_string().as_str()));
        assert!(error.message().contains("nope"));
    }

    #[test]
    fn test_long_bodies_are_truncated() {
        let error = status_error(StatusCode::BAD_REQUEST, &"x".repeat(10_000));
        assert!(error.message().len() < 400);
    }

    /// Upload body whose reads always fail.
    struct Unreadable;

    impl tokio::io::AsyncRead for Unreadable {
        fn poll_read(
            self: std::pin::Pin<&mut Self>,
            _cx: &mut std::task::Context<'_>,
            _buf: &mut tokio::io::ReadBuf<'_>,
        ) -> std::task::Poll<std::io::Result<()>> {
            std::task::Poll::Ready(Err(std::io::Error::other("disk on fire")))
        }
    }

    impl tokio::io::AsyncSeek for Unreadable {
        fn start_seek(self: std::pin::Pin<&mut Self>, _position: std::io::SeekFrom) -> std::io::Result<()> {
            Ok(())
        }

        fn poll_complete(
            self: std::pin::Pin<&mut Self>,
            _cx: &mut std::task::Context<'_>,
        ) -> std::task::Poll<std::io::Result<u64>> {
            std::task::Poll::Ready(Ok(0))
        }
    }

    #[tokio::test]
    async fn test_body_read_error_is_not_a_network_error() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server.mock("PUT", "/upload").with_status(200).create_async().await;
        let client = client("test", Duration::from_secs(5)).unwrap();
        let url = format!("{}/upload", server.url());
        let mut body = Unreadable;
        let err = send_streaming(&CancellationToken::new(), &mut body, |body| client.put(&url).body(body))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Unknown);
        assert!(!err.should_retry());
        assert_eq!(err.frame().children()[0].to_string(), "disk on fire");
    }

    #[tokio::test]
    async fn test_cancelled_exchange() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let client = client("test", Duration::from_secs(5)).unwrap();
        let mut body = std::io::Cursor::new(b"data".to_vec());
        let err = send_streaming(&cancel, &mut body, |body| client.put("http://127.0.0.1:9/upload").body(body))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Temporary);
        assert!(err.frame().children()[0].error().is::<woof_provider::error::Cancelled>());
    }

    #[test]
    fn test_bad_json_is_api_error() {
        let err = parse_json::<serde_json::Value>("<html>").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Api);
        assert_eq!(err.code(), Some("JSON_PARSE_ERROR"));
        assert!(!err.should_retry());
    }
}
