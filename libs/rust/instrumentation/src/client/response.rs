//! Responses and their body lifecycle.
//!
//! A [`Body`] owns the network stream and, when the request had a timeout,
//! the deadline guard. Releasing the body drops the stream first and then
//! cancels the deadline, so no timer outlives the body. Closing consumes the
//! body, which makes a second close impossible; dropping an unclosed body
//! takes the same release path.

use bytes::{Bytes, BytesMut};
use reqwest::StatusCode;
use reqwest::header::HeaderMap;
use serde::de::DeserializeOwned;
use tokio_util::sync::CancellationToken;

use crate::error::ClientError;

/// Cancels a request deadline when released.
#[derive(Debug)]
pub(crate) struct DeadlineGuard {
    token: CancellationToken,
}

impl DeadlineGuard {
    pub(crate) const fn new(token: CancellationToken) -> Self {
        Self { token }
    }
}

impl Drop for DeadlineGuard {
    fn drop(&mut self) {
        self.token.cancel();
    }
}

#[derive(Debug)]
enum Source {
    Stream(reqwest::Response),
    Buffered(Bytes),
}

/// Response body handle.
#[derive(Debug)]
pub struct Body {
    source: Option<Source>,
    deadline: Option<DeadlineGuard>,
}

impl Body {
    fn stream(response: reqwest::Response) -> Self {
        Self {
            source: Some(Source::Stream(response)),
            deadline: None,
        }
    }

    /// Read the next chunk, `None` once the body is exhausted.
    ///
    /// # Errors
    ///
    /// Returns a transport error if the stream fails mid-read.
    pub async fn chunk(&mut self) -> Result<Option<Bytes>, ClientError> {
        match self.source.as_mut() {
            Some(Source::Stream(response)) => Ok(response.chunk().await?),
            Some(Source::Buffered(buffered)) if !buffered.is_empty() => {
                Ok(Some(std::mem::take(buffered)))
            }
            Some(Source::Buffered(_)) | None => Ok(None),
        }
    }

    /// Read everything that has not been read yet.
    ///
    /// # Errors
    ///
    /// Returns a transport error if the stream fails mid-read.
    pub async fn bytes(&mut self) -> Result<Bytes, ClientError> {
        let mut out = BytesMut::new();
        while let Some(chunk) = self.chunk().await? {
            out.extend_from_slice(&chunk);
        }
        Ok(out.freeze())
    }

    /// Read the remaining body and put it back so it can be read again.
    pub(crate) async fn buffer(&mut self) -> Result<Bytes, ClientError> {
        let bytes = self.bytes().await?;
        self.source = Some(Source::Buffered(bytes.clone()));
        Ok(bytes)
    }

    pub(crate) fn attach_deadline(&mut self, guard: DeadlineGuard) {
        self.deadline = Some(guard);
    }

    /// Release the stream, then the deadline.
    pub fn close(mut self) {
        self.release();
    }

    fn release(&mut self) {
        drop(self.source.take());
        drop(self.deadline.take());
    }
}

impl Drop for Body {
    fn drop(&mut self) {
        self.release();
    }
}

/// Response of an instrumented call.
#[derive(Debug)]
pub struct Response {
    status: StatusCode,
    headers: HeaderMap,
    body: Body,
}

impl Response {
    pub(crate) fn from_reqwest(response: reqwest::Response) -> Self {
        Self {
            status: response.status(),
            headers: response.headers().clone(),
            body: Body::stream(response),
        }
    }

    /// The response status.
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        self.status
    }

    /// The response status as an integer.
    #[must_use]
    pub const fn status_code(&self) -> u16 {
        self.status.as_u16()
    }

    /// The response headers.
    #[must_use]
    pub const fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Mutable access to the body for incremental reads.
    pub const fn body_mut(&mut self) -> &mut Body {
        &mut self.body
    }

    /// Take the body, dropping status and headers.
    #[must_use]
    pub fn into_body(self) -> Body {
        self.body
    }

    /// Read the full body and close the response.
    ///
    /// # Errors
    ///
    /// Returns a transport error if the stream fails mid-read.
    pub async fn bytes(mut self) -> Result<Bytes, ClientError> {
        let bytes = self.body.bytes().await;
        self.close();
        bytes
    }

    /// Read the full body as UTF-8 text (lossy) and close the response.
    ///
    /// # Errors
    ///
    /// Returns a transport error if the stream fails mid-read.
    pub async fn text(self) -> Result<String, ClientError> {
        let bytes = self.bytes().await?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    /// Decode the full body as JSON and close the response.
    ///
    /// # Errors
    ///
    /// Returns a transport error if the read fails, or
    /// [`ClientError::Decode`] if the payload does not decode.
    pub async fn json<T: DeserializeOwned>(self) -> Result<T, ClientError> {
        let bytes = self.bytes().await?;
        serde_json::from_slice(&bytes).map_err(|e| ClientError::Decode(e.to_string()))
    }

    /// Release the body and its deadline.
    pub fn close(self) {
        self.body.close();
    }

    /// Drain whatever is left of the body, then close.
    pub(crate) async fn discard(mut self) {
        while let Ok(Some(_)) = self.body.chunk().await {}
        self.close();
    }

    pub(crate) async fn buffer_body(&mut self) -> Result<Bytes, ClientError> {
        self.body.buffer().await
    }

    pub(crate) fn attach_deadline(&mut self, guard: DeadlineGuard) {
        self.body.attach_deadline(guard);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_guard_cancels_on_drop() {
        let token = CancellationToken::new();
        let guard = DeadlineGuard::new(token.clone());
        assert!(!token.is_cancelled());
        drop(guard);
        assert!(token.is_cancelled());
    }

    #[tokio::test]
    async fn test_buffered_body_reads_once() {
        let mut body = Body {
            source: Some(Source::Buffered(Bytes::from_static(b"hello"))),
            deadline: None,
        };
        assert_eq!(body.bytes().await.unwrap(), Bytes::from_static(b"hello"));
        assert_eq!(body.chunk().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_close_releases_deadline() {
        let token = CancellationToken::new();
        let mut body = Body {
            source: Some(Source::Buffered(Bytes::from_static(b"partial read"))),
            deadline: None,
        };
        body.attach_deadline(DeadlineGuard::new(token.clone()));
        body.close();
        assert!(token.is_cancelled());
    }

    #[test]
    fn test_unclosed_body_releases_on_drop() {
        let token = CancellationToken::new();
        let mut body = Body {
            source: None,
            deadline: None,
        };
        body.attach_deadline(DeadlineGuard::new(token.clone()));
        drop(body);
        assert!(token.is_cancelled());
    }
}
