// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # API Data Models
//!
//! Request and response bodies of the REST API. All types derive `ToSchema`
//! for the OpenAPI document.
//!
//! ## Model Categories
//!
//! - **Sessions**: login and token responses shared by all principals
//! - **Users**: registration, recovery and profiles
//! - **Vault**: saving and reading owner data
//! - **Consent**: requests, decisions, detokenization and released data
//! - **Organizations**: registration, contact updates and admin status changes
//!
//! Response views never carry password hashes, key envelopes or the
//! embedded ciphertext bundle of a consent request.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::services::{ContactUpdate, DetokenizedBundle, LoginSession, ProfileRecord, UserProfile};
use crate::storage::{
    ConsentExplanation, ConsentRequest, ConsentStatus, EmbeddedEntry, OrgStatus,
    StoredOrganization, VaultEntry, VaultEntryStatus,
};

// =============================================================================
// Session Models
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Auth token issued to a user, organization or admin.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SessionResponse {
    /// User id, organization id or `admin`
    pub subject_id: String,
    pub access_token: String,
    /// Always `Bearer`.
    pub token_type: String,
    /// Lifetime in seconds.
    pub expires_in: u64,
}

impl From<LoginSession> for SessionResponse {
    fn from(session: LoginSession) -> Self {
        Self {
            subject_id: session.subject_id,
            access_token: session.token,
            token_type: "Bearer".to_string(),
            expires_in: session.expires_in,
        }
    }
}

// =============================================================================
// User Models
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct RegisterUserRequest {
    pub name: String,
    pub email: String,
    /// At least 8 characters. Wraps the private key; not recoverable by the platform.
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct RegisterUserResponse {
    pub user_id: String,
    pub did: String,
    pub address: String,
    /// Recovery phrase. Returned once and never stored; losing it is unrecoverable.
    pub mnemonic: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct RecoverIdentityRequest {
    pub email: String,
    pub mnemonic: String,
    pub new_password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct RecoverIdentityResponse {
    pub user_id: String,
    pub message: String,
}

/// Profile fields. On update, omitted fields are kept and `""` clears one.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct UserProfileRequest {
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    /// `YYYY-MM-DD`
    #[serde(default)]
    pub date_of_birth: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub phone_number: Option<String>,
    #[serde(default)]
    pub profile_picture_url: Option<String>,
}

impl From<UserProfileRequest> for UserProfile {
    fn from(req: UserProfileRequest) -> Self {
        Self {
            first_name: req.first_name,
            last_name: req.last_name,
            date_of_birth: req.date_of_birth,
            address: req.address,
            phone_number: req.phone_number,
            profile_picture_url: req.profile_picture_url,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct UserProfileResponse {
    pub user_id: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub date_of_birth: Option<String>,
    pub address: Option<String>,
    pub phone_number: Option<String>,
    pub profile_picture_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<ProfileRecord> for UserProfileResponse {
    fn from(record: ProfileRecord) -> Self {
        let profile = record.profile;
        Self {
            user_id: record.user_id,
            first_name: profile.first_name,
            last_name: profile.last_name,
            date_of_birth: profile.date_of_birth,
            address: profile.address,
            phone_number: profile.phone_number,
            profile_picture_url: profile.profile_picture_url,
            created_at: record.created_at,
            updated_at: record.updated_at,
        }
    }
}

// =============================================================================
// Vault Models
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SaveVaultEntryRequest {
    pub password: String,
    /// 1-64 characters of `[A-Za-z0-9_-]`; stored upper-cased.
    pub data_type: String,
    /// Plaintext, usually a JSON document. Encrypted for the owner before storage.
    pub data: String,
    #[serde(default)]
    pub content_hash: Option<String>,
}

/// Vault entry metadata; the ciphertext is not returned.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct VaultEntryResponse {
    pub id: String,
    pub data_type: String,
    pub status: VaultEntryStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_hash: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<VaultEntry> for VaultEntryResponse {
    fn from(entry: VaultEntry) -> Self {
        Self {
            id: entry.id,
            data_type: entry.data_type,
            status: entry.status,
            content_hash: entry.content_hash,
            created_at: entry.created_at,
            updated_at: entry.updated_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct QueryVaultRequest {
    pub password: String,
    /// Types to read; empty reads every entry.
    #[serde(default)]
    pub data_types: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct VaultDataItem {
    pub data_type: String,
    pub data: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_hash: Option<String>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct VaultDataResponse {
    pub entries: Vec<VaultDataItem>,
}

// =============================================================================
// Consent Models
// =============================================================================

/// A consent request as shown to its owner or requester.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ConsentRequestView {
    pub id: String,
    pub requester_id: String,
    pub requester_name: String,
    pub owner_did: String,
    pub data_types: Vec<String>,
    pub purpose: String,
    pub explanation: ConsentExplanation,
    pub status: ConsentStatus,
    pub ttl_minutes: u32,
    pub token_expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub decided_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rejection_reason: Option<String>,
    /// PII token; only included for the requester.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pii_token: Option<String>,
}

impl ConsentRequestView {
    pub fn for_owner(request: ConsentRequest) -> Self {
        Self::build(request, false)
    }

    pub fn for_requester(request: ConsentRequest) -> Self {
        Self::build(request, true)
    }

    fn build(request: ConsentRequest, with_token: bool) -> Self {
        Self {
            id: request.id,
            requester_id: request.requester_id,
            requester_name: request.requester_name,
            owner_did: request.owner_did,
            data_types: request.data_types,
            purpose: request.purpose,
            explanation: request.explanation,
            status: request.status,
            ttl_minutes: request.ttl_minutes,
            token_expires_at: request.token_expires_at,
            created_at: request.created_at,
            updated_at: request.updated_at,
            decided_at: request.decided_at,
            rejection_reason: request.rejection_reason,
            pii_token: with_token.then_some(request.pii_token),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ConsentRequestList {
    pub requests: Vec<ConsentRequestView>,
    pub total: usize,
}

impl ConsentRequestList {
    pub fn new(requests: Vec<ConsentRequestView>) -> Self {
        let total = requests.len();
        Self { requests, total }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum DecisionKind {
    Approve,
    Reject,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct DecideConsentRequest {
    pub decision: DecisionKind,
    /// Required to approve; unwraps the owner's key.
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CreateConsentRequest {
    /// Owner DID or email address
    pub owner: String,
    #[serde(default)]
    pub data_types: Vec<String>,
    /// Shorthand for a single type.
    #[serde(default)]
    pub data_type: Option<String>,
    pub purpose: String,
    /// Token lifetime, 1-10080 minutes. Defaults to 60.
    #[serde(default)]
    pub ttl_minutes: Option<u32>,
}

impl CreateConsentRequest {
    pub fn all_data_types(&self) -> Vec<String> {
        let mut types = self.data_types.clone();
        if let Some(single) = &self.data_type {
            types.push(single.clone());
        }
        types
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct DetokenizeRequest {
    pub token: String,
}

/// Verified PII token contents. Ciphertext only.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct DetokenizeResponse {
    pub request_id: String,
    pub owner_did: String,
    pub data_types: Vec<String>,
    pub user_data: Vec<EmbeddedEntry>,
    pub expires_at: DateTime<Utc>,
}

impl From<DetokenizedBundle> for DetokenizeResponse {
    fn from(bundle: DetokenizedBundle) -> Self {
        Self {
            request_id: bundle.payload.request_id,
            owner_did: bundle.payload.owner_did,
            data_types: bundle.payload.data_types,
            user_data: bundle.payload.user_data,
            expires_at: bundle.expires_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ReleasedDataItem {
    pub data_type: String,
    pub data: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ReleasedDataResponse {
    pub request_id: String,
    pub entries: Vec<ReleasedDataItem>,
}

// =============================================================================
// Organization Models
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct RegisterOrganizationRequest {
    pub organization_name: String,
    pub contact_name: String,
    pub contact_email: String,
    pub password: String,
    /// e.g. `company_registration`
    pub document_type: String,
    pub document_reference: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct RegisterOrganizationResponse {
    pub organization: OrganizationView,
    /// Shown once; only its digest is stored.
    pub api_key: String,
}

/// Machine login with the key issued at registration.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ApiKeySessionRequest {
    pub org_id: String,
    pub api_key: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct OrganizationView {
    pub org_id: String,
    pub public_org_id: String,
    pub name: String,
    pub contact_name: String,
    pub contact_email: String,
    pub status: OrgStatus,
    pub document_type: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<StoredOrganization> for OrganizationView {
    fn from(org: StoredOrganization) -> Self {
        Self {
            org_id: org.org_id,
            public_org_id: org.public_org_id,
            name: org.name,
            contact_name: org.contact_name,
            contact_email: org.contact_email,
            status: org.status,
            document_type: org.document_type,
            created_at: org.created_at,
            updated_at: org.updated_at,
        }
    }
}

/// Contact change requested by the organization itself.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct UpdateOrganizationRequest {
    /// 2-255 characters
    #[serde(default)]
    pub contact_name: Option<String>,
    /// Also the login email; must not belong to another organization.
    #[serde(default)]
    pub contact_email: Option<String>,
}

impl From<UpdateOrganizationRequest> for ContactUpdate {
    fn from(req: UpdateOrganizationRequest) -> Self {
        Self {
            contact_name: req.contact_name,
            contact_email: req.contact_email,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct OrganizationList {
    pub organizations: Vec<OrganizationView>,
    pub total: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AdminSessionRequest {
    pub api_key: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct UpdateOrganizationStatusRequest {
    pub status: OrgStatus,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn decision_body_parses() {
        let body: DecideConsentRequest =
            serde_json::from_value(json!({"decision": "approve", "password": "pw"})).unwrap();
        assert_eq!(body.decision, DecisionKind::Approve);
        assert_eq!(body.password.as_deref(), Some("pw"));

        let body: DecideConsentRequest = serde_json::from_value(json!({"decision": "reject"})).unwrap();
        assert_eq!(body.decision, DecisionKind::Reject);
        assert!(body.reason.is_none());

        assert!(serde_json::from_value::<DecideConsentRequest>(json!({"decision": "maybe"})).is_err());
    }

    #[test]
    fn single_data_type_is_a_list_of_one() {
        let body: CreateConsentRequest = serde_json::from_value(json!({
            "owner": "did:sde:mainnet:0xabc",
            "data_type": "CORE_PII",
            "purpose": "kyc"
        }))
        .unwrap();
        assert_eq!(body.all_data_types(), vec!["CORE_PII"]);
        assert!(body.ttl_minutes.is_none());
    }

    #[test]
    fn session_response_is_bearer() {
        let response = SessionResponse::from(LoginSession {
            subject_id: "u1".to_string(),
            token: "t".to_string(),
            expires_in: 3600,
        });
        let value = serde_json::to_value(response).unwrap();
        assert_eq!(value["token_type"], "Bearer");
        assert_eq!(value["access_token"], "t");
    }
}
