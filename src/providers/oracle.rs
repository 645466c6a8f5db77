// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Compliance oracle collaborator.
//!
//! Turns an organization's stated purpose into plain language for the
//! owner's consent screen. The oracle is advisory: any failure falls back to
//! static text and request creation proceeds.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};
use url::Url;

/// Shown in place of an oracle rendering when the oracle is unavailable.
pub const FALLBACK_PURPOSE_TEXT: &str =
    "A plain-language summary is not available right now. Review the stated purpose before deciding.";

const SYSTEM_PROMPT: &str = "You translate a technical personal-data request into a short, \
clear and trustworthy JSON object for the data owner's consent screen. \
Respond with only a JSON object matching the provided schema.";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComplianceSummary {
    pub title: String,
    pub purpose_text: String,
    pub usage_text: String,
}

impl ComplianceSummary {
    pub fn fallback(purpose: &str, data_type: &str, org_name: &str) -> Self {
        Self {
            title: format!("{org_name} is requesting your {data_type} data"),
            purpose_text: FALLBACK_PURPOSE_TEXT.to_string(),
            usage_text: format!("Stated purpose: {purpose}"),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum OracleError {
    #[error("compliance oracle is not configured")]
    Disabled,

    #[error("compliance oracle request failed: {0}")]
    Request(String),

    #[error("compliance oracle blocked the request: {0}")]
    Blocked(String),

    #[error("compliance oracle response was invalid: {0}")]
    InvalidResponse(String),
}

#[async_trait]
pub trait ComplianceOracle: Send + Sync {
    async fn translate(
        &self,
        purpose: &str,
        data_type: &str,
        org_name: &str,
    ) -> Result<ComplianceSummary, OracleError>;
}

/// Ask the oracle, retrying once, and fall back to static text on failure.
pub async fn translate_or_fallback(
    oracle: &dyn ComplianceOracle,
    purpose: &str,
    data_type: &str,
    org_name: &str,
) -> ComplianceSummary {
    for attempt in 1..=2u8 {
        match oracle.translate(purpose, data_type, org_name).await {
            Ok(summary) => return summary,
            Err(OracleError::Disabled) => break,
            Err(e) => {
                tracing::warn!(error = %e, attempt, operation = "oracle.translate", "compliance oracle call failed");
            }
        }
    }
    ComplianceSummary::fallback(purpose, data_type, org_name)
}

/// Oracle that is never available; every request gets the fallback text.
#[derive(Debug, Clone, Default)]
pub struct DisabledOracle;

#[async_trait]
impl ComplianceOracle for DisabledOracle {
    async fn translate(&self, _: &str, _: &str, _: &str) -> Result<ComplianceSummary, OracleError> {
        Err(OracleError::Disabled)
    }
}

/// `generateContent`-style HTTP oracle.
#[derive(Debug, Clone)]
pub struct HttpOracle {
    endpoint: Url,
    api_key: String,
    http: Client,
}

#[derive(Debug, Deserialize)]
struct Translation {
    title: String,
    plain_language_purpose: String,
    data_usage_details: String,
}

impl HttpOracle {
    pub fn new(endpoint: Url, api_key: String, timeout: Duration) -> Result<Self, OracleError> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| OracleError::Request(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            endpoint,
            api_key,
            http,
        })
    }

    fn build_payload(purpose: &str, data_type: &str, org_name: &str) -> Value {
        let user_prompt = format!(
            "Organization: '{org_name}'\nData Type Requested: '{data_type}'\nStated Purpose: '{purpose}'"
        );
        json!({
            "contents": [{ "parts": [{ "text": user_prompt }] }],
            "systemInstruction": { "parts": [{ "text": SYSTEM_PROMPT }] },
            "generationConfig": {
                "temperature": 0.2,
                "maxOutputTokens": 1024,
                "responseMimeType": "application/json",
                "responseSchema": {
                    "type": "OBJECT",
                    "properties": {
                        "title": { "type": "STRING" },
                        "plain_language_purpose": { "type": "STRING" },
                        "data_usage_details": { "type": "STRING" }
                    },
                    "required": ["title", "plain_language_purpose", "data_usage_details"]
                }
            }
        })
    }
}

/// Extract the translation from a `generateContent` response body.
fn parse_response(body: &Value) -> Result<ComplianceSummary, OracleError> {
    let candidate = body
        .get("candidates")
        .and_then(|c| c.get(0))
        .ok_or_else(|| OracleError::InvalidResponse("missing candidates".to_string()))?;

    let finish_reason = candidate
        .get("finishReason")
        .and_then(Value::as_str)
        .unwrap_or("UNKNOWN");
    if finish_reason != "STOP" {
        return Err(OracleError::Blocked(finish_reason.to_string()));
    }

    let text = candidate
        .pointer("/content/parts/0/text")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or_else(|| OracleError::InvalidResponse("empty response text".to_string()))?;

    let translation: Translation = serde_json::from_str(text)
        .map_err(|e| OracleError::InvalidResponse(format!("response is not the expected JSON: {e}")))?;

    if translation.title.trim().is_empty() {
        return Err(OracleError::InvalidResponse("empty title".to_string()));
    }

    Ok(ComplianceSummary {
        title: translation.title,
        purpose_text: translation.plain_language_purpose,
        usage_text: translation.data_usage_details,
    })
}

#[async_trait]
impl ComplianceOracle for HttpOracle {
    async fn translate(
        &self,
        purpose: &str,
        data_type: &str,
        org_name: &str,
    ) -> Result<ComplianceSummary, OracleError> {
        let response = self
            .http
            .post(self.endpoint.clone())
            .query(&[("key", self.api_key.as_str())])
            .json(&Self::build_payload(purpose, data_type, org_name))
            .send()
            .await
            .map_err(|e| OracleError::Request(e.without_url().to_string()))?;

        if !response.status().is_success() {
            return Err(OracleError::Request(format!("status {}", response.status())));
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| OracleError::InvalidResponse(e.without_url().to_string()))?;
        parse_response(&body)
    }
}
