//! Common API utilities and shared types

use axum::{
    extract::{ConnectInfo, FromRequestParts},
    http::{header, request::Parts, HeaderMap},
};
use serde::Deserialize;
use std::convert::Infallible;
use std::net::SocketAddr;

use crate::services::RequestMeta;

/// Default page number (1-indexed)
pub fn default_page() -> u32 {
    1
}

/// Basic pagination query parameters
#[derive(Debug, Deserialize)]
pub struct PaginationQuery {
    #[serde(default = "default_page")]
    pub page: u32,
}

/// Query for the post listing; an empty search lists every post
#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    #[serde(default)]
    pub search: String,
    #[serde(default = "default_page")]
    pub page: u32,
}

/// Query for the archive; no year means the whole archive
#[derive(Debug, Deserialize)]
pub struct ArchiveQuery {
    pub year: Option<i32>,
}

/// Client address: first `X-Forwarded-For` entry, then `X-Real-Ip`, then the peer.
pub fn extract_ip(headers: &HeaderMap, peer: Option<SocketAddr>) -> String {
    headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.split(',').next())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .or_else(|| {
            headers
                .get("x-real-ip")
                .and_then(|v| v.to_str().ok())
                .map(|s| s.trim().to_string())
        })
        .or_else(|| peer.map(|addr| addr.ip().to_string()))
        .unwrap_or_default()
}

/// Header value as a string, empty when absent or not ASCII
pub fn header_str(headers: &HeaderMap, name: &str) -> String {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string()
}

/// Request details for the spam check, taken from headers and the peer address
pub struct ClientMeta(pub RequestMeta);

impl<S: Send + Sync> FromRequestParts<S> for ClientMeta {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let peer = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|info| info.0);

        Ok(Self(RequestMeta {
            remote_ip: extract_ip(&parts.headers, peer),
            user_agent: header_str(&parts.headers, header::USER_AGENT.as_str()),
            referrer: header_str(&parts.headers, header::REFERER.as_str()),
        }))
    }
}
