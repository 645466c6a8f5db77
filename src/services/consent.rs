// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Consent Workflow
//!
//! ```text
//!                ┌──────────▶ approved  (sealed release stored)
//! un_approved ───┤
//!                └──────────▶ rejected  (nothing decrypted)
//! ```
//!
//! A request embeds the owner's vault ciphertexts, unchanged, in a PII token
//! handed to the requesting organization. The organization can detokenize
//! at any time before expiry but only ever sees ciphertext. Plaintext is
//! produced once, on approval, while the owner's key is unwrapped; it is then
//! sealed under the platform key with the request id as associated data and
//! can only be read back by the requester through [`ConsentWorkflow::read_released`].
//!
//! Decisions are written with a compare-and-set in the ledger, so of two
//! racing decisions exactly one wins and the other gets `InvalidState`.

use std::time::Duration;

use base64ct::{Base64, Encoding};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use zeroize::Zeroizing;

use super::error::{ServiceError, ServiceResult};
use super::identity::IdentityService;
use super::organizations::OrganizationService;
use super::vault::normalize_data_types;
use crate::audit_log;
use crate::auth::{TokenError, TokenUse};
use crate::crypto::{vault_cipher, CryptoError};
use crate::providers::{notify, translate_or_fallback, Template};
use crate::state::AppState;
use crate::storage::{
    AuditEvent, AuditEventType, ConsentExplanation, ConsentRequest, ConsentStatus,
    EmbeddedEntry, OwnershipEnforcer, VaultRepository,
};

pub const DEFAULT_TTL_MINUTES: u32 = 60;
/// One week.
pub const MAX_TTL_MINUTES: u32 = 7 * 24 * 60;

#[derive(Debug, Clone)]
pub struct NewConsentRequest {
    /// Owner DID or email address
    pub owner: String,
    pub data_types: Vec<String>,
    pub purpose: String,
    pub ttl_minutes: Option<u32>,
}

pub enum Decision {
    Approve { password: String },
    Reject { reason: Option<String> },
}

impl Decision {
    fn target(&self) -> ConsentStatus {
        match self {
            Decision::Approve { .. } => ConsentStatus::Approved,
            Decision::Reject { .. } => ConsentStatus::Rejected,
        }
    }
}

impl std::fmt::Debug for Decision {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Decision::Approve { .. } => f.write_str("Approve"),
            Decision::Reject { reason } => f.debug_struct("Reject").field("reason", reason).finish(),
        }
    }
}

/// Claims carried by a PII token next to `token_use`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PiiPayload {
    pub request_id: String,
    pub owner_did: String,
    pub data_types: Vec<String>,
    pub user_data: Vec<EmbeddedEntry>,
}

/// Detokenized PII token: ciphertext only.
#[derive(Debug, Clone)]
pub struct DetokenizedBundle {
    pub payload: PiiPayload,
    pub expires_at: DateTime<Utc>,
}

/// Plaintext entry released to the requester.
pub struct ReleasedEntry {
    pub data_type: String,
    pub data: Zeroizing<Vec<u8>>,
}

impl std::fmt::Debug for ReleasedEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReleasedEntry")
            .field("data_type", &self.data_type)
            .finish_non_exhaustive()
    }
}

/// Serialized form of the sealed release.
#[derive(Serialize, Deserialize)]
struct ReleaseRecord {
    data_type: String,
    /// base64 plaintext
    data: String,
}

fn release_context(request_id: &str) -> Vec<u8> {
    format!("sde/consent/{request_id}/release").into_bytes()
}

pub struct ConsentWorkflow<'a> {
    state: &'a AppState,
}

impl<'a> ConsentWorkflow<'a> {
    pub fn new(state: &'a AppState) -> Self {
        Self { state }
    }

    /// Open a request from an approved organization for an owner's data.
    pub async fn create_request(
        &self,
        requester_id: &str,
        input: NewConsentRequest,
    ) -> ServiceResult<ConsentRequest> {
        let ttl_minutes = input.ttl_minutes.unwrap_or(DEFAULT_TTL_MINUTES);
        if !(1..=MAX_TTL_MINUTES).contains(&ttl_minutes) {
            return Err(ServiceError::Validation(format!(
                "ttl_minutes must be between 1 and {MAX_TTL_MINUTES}"
            )));
        }
        if input.data_types.is_empty() {
            return Err(ServiceError::Validation("at least one data type is required".to_string()));
        }
        let data_types = normalize_data_types(&input.data_types)?;
        let purpose = input.purpose.trim();
        if purpose.is_empty() {
            return Err(ServiceError::Validation("purpose is required".to_string()));
        }

        let org = match OrganizationService::new(self.state).require_approved(requester_id) {
            Ok(org) => org,
            Err(e) => {
                audit_log!(
                    &self.state.store,
                    AuditEvent::new(AuditEventType::PermissionDenied)
                        .with_principal(requester_id)
                        .with_resource("consent_request", "")
                        .failed(e.to_string())
                );
                return Err(e);
            }
        };

        let identities = IdentityService::new(self.state);
        let owner = identities.resolve_owner(&input.owner)?;

        // Ciphertexts are embedded as stored; nothing is decrypted here.
        let bundle: Vec<EmbeddedEntry> = VaultRepository::new(&self.state.store)
            .get_by_types(&owner.user_id, &data_types)?
            .into_iter()
            .map(|entry| EmbeddedEntry {
                data_type: entry.data_type,
                encrypted_data: entry.ciphertext,
            })
            .collect();

        let request_id = uuid::Uuid::new_v4().to_string();
        let payload = PiiPayload {
            request_id: request_id.clone(),
            owner_did: owner.did.clone(),
            data_types: data_types.clone(),
            user_data: bundle.clone(),
        };
        let claims = match serde_json::to_value(&payload) {
            Ok(Value::Object(map)) => map,
            _ => return Err(TokenError::Signing("PII payload is not an object".to_string()).into()),
        };

        let ttl = Duration::from_secs(u64::from(ttl_minutes) * 60);
        let now = Utc::now();
        let pii_token = self.state.tokens.issue_pii_token(&org.org_id, claims, ttl)?;

        let summary = translate_or_fallback(
            self.state.oracle.as_ref(),
            purpose,
            &data_types.join(", "),
            &org.name,
        )
        .await;

        let request = ConsentRequest {
            id: request_id,
            requester_id: org.org_id.clone(),
            requester_name: org.name.clone(),
            owner_id: owner.user_id.clone(),
            owner_did: owner.did.clone(),
            data_types,
            purpose: purpose.to_string(),
            explanation: ConsentExplanation {
                title: summary.title,
                purpose_text: summary.purpose_text,
                usage_text: summary.usage_text,
            },
            pii_token,
            token_expires_at: now + chrono::Duration::minutes(i64::from(ttl_minutes)),
            ttl_minutes,
            bundle,
            status: ConsentStatus::UnApproved,
            created_at: now,
            updated_at: now,
            decided_at: None,
            rejection_reason: None,
            released: None,
        };
        self.state.ledger.insert(&request)?;

        audit_log!(
            &self.state.store,
            AuditEvent::new(AuditEventType::ConsentRequested)
                .with_principal(&org.org_id)
                .with_resource("consent_request", &request.id)
                .with_details(json!({
                    "owner_id": request.owner_id,
                    "data_types": request.data_types,
                    "embedded": request.bundle.len(),
                    "ttl_minutes": ttl_minutes,
                }))
        );
        tracing::info!(
            request_id = %request.id,
            requester_id = %org.org_id,
            owner_id = %request.owner_id,
            "consent requested"
        );

        match identities.contact_email(&owner) {
            Ok(email) => {
                let mut context = Map::new();
                context.insert("request_id".into(), Value::from(request.id.clone()));
                context.insert("org_name".into(), Value::from(org.name.clone()));
                context.insert("data_types".into(), json!(request.data_types));
                context.insert("title".into(), Value::from(request.explanation.title.clone()));
                context.insert(
                    "purpose_text".into(),
                    Value::from(request.explanation.purpose_text.clone()),
                );
                context.insert(
                    "usage_text".into(),
                    Value::from(request.explanation.usage_text.clone()),
                );
                notify(
                    self.state.notifier.clone(),
                    Template::ConsentRequested,
                    email,
                    context,
                );
            }
            Err(e) => {
                tracing::warn!(error = %e, owner_id = %owner.user_id, "owner contact unavailable");
            }
        }

        Ok(request)
    }

    /// Owner's approve or reject decision.
    ///
    /// Checked in order: the request exists, the actor owns it, it is still
    /// open. Only then is the password used.
    pub async fn decide(
        &self,
        request_id: &str,
        actor_id: &str,
        decision: Decision,
    ) -> ServiceResult<ConsentRequest> {
        let request = self
            .state
            .ledger
            .get(request_id)?
            .ok_or_else(|| ServiceError::NotFound(format!("consent request {request_id}")))?;

        if request.owner_id != actor_id {
            audit_log!(
                &self.state.store,
                AuditEvent::new(AuditEventType::PermissionDenied)
                    .with_principal(actor_id)
                    .with_resource("consent_request", request_id)
                    .failed("not the owner")
            );
            return Err(ServiceError::Forbidden("not the owner of this request".to_string()));
        }

        if request.status.is_terminal() {
            return Err(ServiceError::InvalidState(format!(
                "consent request is already {}",
                request.status
            )));
        }

        let target = decision.target();
        let decided = match decision {
            Decision::Approve { password } => {
                let sealed = self.seal_release(&request, &password)?;
                self.state
                    .ledger
                    .transition(request_id, target, move |r| r.released = Some(sealed))?
            }
            Decision::Reject { reason } => {
                let reason = reason.map(|r| r.trim().to_string()).filter(|r| !r.is_empty());
                self.state
                    .ledger
                    .transition(request_id, target, move |r| r.rejection_reason = reason)?
            }
        };

        let (event_type, template) = match decided.status {
            ConsentStatus::Approved => (AuditEventType::ConsentApproved, Template::ConsentApproved),
            _ => (AuditEventType::ConsentRejected, Template::ConsentRejected),
        };
        audit_log!(
            &self.state.store,
            AuditEvent::new(event_type)
                .with_principal(actor_id)
                .with_resource("consent_request", request_id)
                .with_details(json!({ "requester_id": decided.requester_id }))
        );
        tracing::info!(request_id = %request_id, status = %decided.status, "consent decided");

        match OrganizationService::new(self.state).get(&decided.requester_id) {
            Ok(org) => {
                let mut context = Map::new();
                context.insert("request_id".into(), Value::from(decided.id.clone()));
                context.insert("status".into(), Value::from(decided.status.to_string()));
                context.insert("data_types".into(), json!(decided.data_types));
                if let Some(reason) = &decided.rejection_reason {
                    context.insert("reason".into(), Value::from(reason.clone()));
                }
                notify(self.state.notifier.clone(), template, org.contact_email, context);
            }
            Err(e) => {
                tracing::warn!(error = %e, requester_id = %decided.requester_id, "requester unavailable for notification");
            }
        }

        Ok(decided)
    }

    /// Decrypt the embedded bundle with the owner's key and seal the
    /// plaintext under the platform key. The key is dropped on return.
    fn seal_release(
        &self,
        request: &ConsentRequest,
        password: &str,
    ) -> ServiceResult<crate::crypto::SealedBox> {
        let identities = IdentityService::new(self.state);
        let owner = identities.get(&request.owner_id)?;
        let private_key = identities.unlock_private_key(&owner, password)?;

        let mut records = Vec::with_capacity(request.bundle.len());
        for entry in &request.bundle {
            let plain = Zeroizing::new(vault_cipher::decrypt_transport(
                &private_key,
                &entry.encrypted_data,
            )?);
            records.push(ReleaseRecord {
                data_type: entry.data_type.clone(),
                data: Base64::encode_string(&plain),
            });
        }
        drop(private_key);

        let plaintext = Zeroizing::new(
            serde_json::to_vec(&records)
                .map_err(|e| CryptoError::Encoding(format!("release bundle: {e}")))?,
        );
        Ok(self
            .state
            .secrets
            .platform_key
            .seal(&plaintext, &release_context(&request.id))?)
    }

    /// Verify a PII token held by `requester_id` and return its ciphertexts.
    ///
    /// The holder must still be an approved organization.
    pub fn detokenize(&self, requester_id: &str, token: &str) -> ServiceResult<DetokenizedBundle> {
        OrganizationService::new(self.state).require_approved(requester_id)?;
        let claims = self.state.tokens.verify_use(token, TokenUse::Pii)?;
        if claims.sub != requester_id {
            audit_log!(
                &self.state.store,
                AuditEvent::new(AuditEventType::PermissionDenied)
                    .with_principal(requester_id)
                    .with_resource("pii_token", &claims.jti)
                    .failed("token issued to another requester")
            );
            return Err(ServiceError::Forbidden("token was issued to another requester".to_string()));
        }

        let expires_at = DateTime::<Utc>::from_timestamp(claims.exp, 0).ok_or(TokenError::Invalid)?;
        let payload: PiiPayload = serde_json::from_value(Value::Object(claims.claims))
            .map_err(|_| TokenError::Invalid)?;

        audit_log!(
            &self.state.store,
            AuditEvent::new(AuditEventType::TokenDetokenized)
                .with_principal(requester_id)
                .with_resource("consent_request", &payload.request_id)
        );

        Ok(DetokenizedBundle { payload, expires_at })
    }

    /// Plaintext released by an approved request.
    pub fn read_released(
        &self,
        request_id: &str,
        requester_id: &str,
    ) -> ServiceResult<Vec<ReleasedEntry>> {
        let request = self
            .state
            .ledger
            .get(request_id)?
            .ok_or_else(|| ServiceError::NotFound(format!("consent request {request_id}")))?;

        if request.requester_id != requester_id {
            audit_log!(
                &self.state.store,
                AuditEvent::new(AuditEventType::PermissionDenied)
                    .with_principal(requester_id)
                    .with_resource("consent_request", request_id)
                    .failed("not the requester")
            );
            return Err(ServiceError::Forbidden("not the requester of this request".to_string()));
        }
        if request.status != ConsentStatus::Approved {
            return Err(ServiceError::InvalidState(format!(
                "consent request is {}",
                request.status
            )));
        }
        OrganizationService::new(self.state).require_approved(requester_id)?;

        let sealed = request
            .released
            .as_ref()
            .ok_or_else(|| ServiceError::InvalidState("no data was released".to_string()))?;
        let plaintext = self
            .state
            .secrets
            .platform_key
            .open(sealed, &release_context(&request.id))?;
        let records: Vec<ReleaseRecord> = serde_json::from_slice(&plaintext)
            .map_err(|e| CryptoError::Encoding(format!("release bundle: {e}")))?;

        let entries = records
            .into_iter()
            .map(|record| {
                Base64::decode_vec(&record.data)
                    .map(|data| ReleasedEntry {
                        data_type: record.data_type,
                        data: Zeroizing::new(data),
                    })
                    .map_err(|e| CryptoError::Encoding(format!("release entry: {e}")))
            })
            .collect::<Result<Vec<_>, _>>()?;

        audit_log!(
            &self.state.store,
            AuditEvent::new(AuditEventType::ReleaseRead)
                .with_principal(requester_id)
                .with_resource("consent_request", request_id)
        );

        Ok(entries)
    }

    pub fn get_for_owner(&self, request_id: &str, owner_id: &str) -> ServiceResult<ConsentRequest> {
        let request = self
            .state
            .ledger
            .get(request_id)?
            .ok_or_else(|| ServiceError::NotFound(format!("consent request {request_id}")))?;
        request.verify_ownership(owner_id)?;
        Ok(request)
    }

    pub fn list_for_owner(&self, owner_id: &str) -> ServiceResult<Vec<ConsentRequest>> {
        Ok(self.state.ledger.list_by_owner(owner_id)?)
    }

    pub fn list_for_requester(&self, requester_id: &str) -> ServiceResult<Vec<ConsentRequest>> {
        OrganizationService::new(self.state).require_approved(requester_id)?;
        Ok(self.state.ledger.list_by_requester(requester_id)?)
    }
}
