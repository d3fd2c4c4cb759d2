//! Request/response seams between the agent and the hosting runtime.
//!
//! The agent never builds HTTP messages itself; it only needs to know a
//! request's identity, whether a response is "ok", how to copy a response
//! for storage, and how to synthesize a plain-text reply.

use async_trait::async_trait;

use crate::config::TEXT_PLAIN;
use crate::error::Result;
use crate::models::{RequestIdentity, ResponseSnapshot, OK_STATUS};

pub trait HttpRequest {
    fn identity(&self) -> RequestIdentity;
}

pub trait HttpResponse: Sized {
    fn status(&self) -> u16;

    fn ok(&self) -> bool {
        OK_STATUS.contains(&self.status())
    }

    /// Copy the response so one copy can be stored and the other returned.
    fn try_clone(&self) -> Result<Self>;

    fn plain_text(status: u16, body: &str) -> Result<Self>;
}

/// The real network, as reached through the host.
#[async_trait(?Send)]
pub trait Network {
    type Request: HttpRequest;
    type Response: HttpResponse;

    /// Build a plain `GET` for a manifest entry.
    fn request(&self, url: &str) -> Result<Self::Request>;

    /// Resolves with any response the server produced, ok or not. Errors
    /// mean no response was produced at all.
    async fn fetch(&self, request: &Self::Request) -> Result<Self::Response>;
}

impl HttpRequest for RequestIdentity {
    fn identity(&self) -> RequestIdentity {
        self.clone()
    }
}

impl HttpResponse for ResponseSnapshot {
    fn status(&self) -> u16 {
        self.status
    }

    fn try_clone(&self) -> Result<Self> {
        Ok(self.clone())
    }

    fn plain_text(status: u16, body: &str) -> Result<Self> {
        Ok(ResponseSnapshot::new(status, body).with_header("Content-Type", TEXT_PLAIN))
    }
}
