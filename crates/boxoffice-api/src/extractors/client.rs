//! Client address and fingerprint-signal extractors.

use std::convert::Infallible;
use std::net::SocketAddr;

use axum::extract::{ConnectInfo, FromRequestParts};
use axum::http::request::Parts;
use axum::http::{Extensions, HeaderMap};

use boxoffice_admission::RequestSignals;
use boxoffice_admission::fingerprint::SIGNAL_HEADERS;

use crate::state::AppState;

/// Resolve the client address: first hop of `X-Forwarded-For`, then
/// `X-Real-IP`, then the socket peer.
pub fn client_addr(headers: &HeaderMap, extensions: &Extensions) -> String {
    let forwarded = headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty());

    let real_ip = || {
        headers
            .get("x-real-ip")
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
    };

    forwarded
        .or_else(real_ip)
        .map(str::to_string)
        .or_else(|| {
            extensions
                .get::<ConnectInfo<SocketAddr>>()
                .map(|ConnectInfo(addr)| addr.ip().to_string())
        })
        .unwrap_or_else(|| "unknown".to_string())
}

/// The resolved client address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientAddr(pub String);

impl<S> FromRequestParts<S> for ClientAddr
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Self(client_addr(&parts.headers, &parts.extensions)))
    }
}

/// Fingerprint signals gathered from the request.
#[derive(Debug, Clone)]
pub struct ClientSignals(pub RequestSignals);

impl FromRequestParts<AppState> for ClientSignals {
    type Rejection = Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let mut signals = RequestSignals::new(client_addr(&parts.headers, &parts.extensions));

        for name in SIGNAL_HEADERS {
            if let Some(value) = parts.headers.get(name).and_then(|v| v.to_str().ok()) {
                signals = signals.with_header(name, value);
            }
        }

        let client_header = state.config.admission.fingerprint.client_header.as_str();
        if let Some(value) = parts
            .headers
            .get(client_header)
            .and_then(|v| v.to_str().ok())
        {
            signals = signals.with_client_fingerprint(value);
        }

        Ok(Self(signals))
    }
}
