//! Construction of the outbound upstream call.
//!
//! Turns a validated [`ForwardRequest`] into an [`UpstreamCall`]: target URL,
//! normalized bearer credential and serialized JSON body.

use axum::http::{header, HeaderMap, HeaderValue};
use reqwest::Url;

use super::types::{Credential, ForwardRequest};
use crate::config::{RelayPolicy, UpstreamConfig, DESTINATION_PLACEHOLDER};
use crate::error::{Error, Result};

const BEARER_PREFIX: &str = "Bearer ";

/// A single outbound POST, built once per inbound request.
#[derive(Debug)]
pub struct UpstreamCall {
    pub destination_id: String,
    pub url: Url,
    authorization: Credential,
    pub body: Vec<u8>,
}

impl UpstreamCall {
    /// Validate `request` and derive the outbound call.
    ///
    /// Fails with `MissingField` before anything touches the network.
    pub fn build(
        request: ForwardRequest,
        upstream: &UpstreamConfig,
        policy: RelayPolicy,
    ) -> Result<Self> {
        let destination_id = request
            .destination_id
            .filter(|id| !id.trim().is_empty())
            .ok_or(Error::MissingField("destinationId"))?;

        let credential = request
            .credential
            .filter(|c| !c.is_blank())
            .ok_or(Error::MissingField("credential"))?;

        if policy.require_payload && request.payload.is_none() {
            return Err(Error::MissingField("payload"));
        }

        let url = build_url(&upstream.url_template, &destination_id)?;
        let authorization = Credential::from(normalize_credential(credential.expose_secret()));

        let payload = request
            .payload
            .unwrap_or_else(|| serde_json::Value::Object(Default::default()));
        let body = serde_json::to_vec(&payload)
            .map_err(|e| Error::Internal(format!("Failed to serialize payload: {}", e)))?;

        Ok(Self {
            destination_id,
            url,
            authorization,
            body,
        })
    }

    /// Headers sent with the outbound request.
    pub fn headers(&self, upstream: &UpstreamConfig) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();

        let mut authorization = HeaderValue::from_str(self.authorization.expose_secret())
            .map_err(|_| Error::InvalidRequestBody("credential contains invalid characters".into()))?;
        authorization.set_sensitive(true);
        headers.insert(header::AUTHORIZATION, authorization);

        headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(header::CONTENT_LENGTH, HeaderValue::from(self.body.len()));
        headers.insert(header::ACCEPT, HeaderValue::from_static("*/*"));

        for (name, value, field) in [
            (header::USER_AGENT, &upstream.user_agent, "upstream.user_agent"),
            (header::ORIGIN, &upstream.origin, "upstream.origin"),
            (header::REFERER, &upstream.referer, "upstream.referer"),
        ] {
            let value = HeaderValue::from_str(value)
                .map_err(|_| Error::Internal(format!("{} is not a valid header value", field)))?;
            headers.insert(name, value);
        }

        Ok(headers)
    }
}

/// Prefix `credential` with `"Bearer "` unless it already starts with it.
pub fn normalize_credential(credential: &str) -> String {
    if credential.starts_with(BEARER_PREFIX) {
        credential.to_string()
    } else {
        format!("{}{}", BEARER_PREFIX, credential)
    }
}

/// Substitute the percent-encoded destination id into the URL template.
pub fn build_url(template: &str, destination_id: &str) -> Result<Url> {
    let encoded = urlencoding::encode(destination_id);
    let raw = template.replace(DESTINATION_PLACEHOLDER, &encoded);
    Url::parse(&raw).map_err(|e| Error::Internal(format!("Invalid upstream URL '{}': {}", raw, e)))
}
