// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Organization registration, status lifecycle and sessions.

use chrono::Utc;
use serde_json::{json, Map, Value};

use super::error::{ServiceError, ServiceResult};
use super::identity::{validate_credentials, LoginSession};
use crate::audit_log;
use crate::auth::password::{hash_password, verify_login};
use crate::auth::{AuthenticatedUser, Role};
use crate::crypto::identifiers::{generate_api_key, hash_api_key, secrets_match};
use crate::crypto::CryptoError;
use crate::providers::{notify, Template};
use crate::state::AppState;
use crate::storage::{
    AuditEvent, AuditEventType, OrgStatus, OrganizationRepository, StoredOrganization,
};

/// Subject of admin auth tokens.
pub const ADMIN_SUBJECT: &str = "admin";

const MIN_CONTACT_NAME_LEN: usize = 2;
const MAX_CONTACT_NAME_LEN: usize = 255;

#[derive(Debug, Clone)]
pub struct NewOrganization {
    pub name: String,
    pub contact_name: String,
    pub contact_email: String,
    pub password: String,
    pub document_type: String,
    pub document_reference: String,
}

/// Contact fields an organization may change itself. `None` keeps a field.
#[derive(Debug, Clone, Default)]
pub struct ContactUpdate {
    pub contact_name: Option<String>,
    pub contact_email: Option<String>,
}

/// Registration result. `api_key` is shown exactly once.
#[derive(Debug)]
pub struct RegisteredOrganization {
    pub org: StoredOrganization,
    pub api_key: String,
}

pub struct OrganizationService<'a> {
    state: &'a AppState,
}

impl<'a> OrganizationService<'a> {
    pub fn new(state: &'a AppState) -> Self {
        Self { state }
    }

    pub fn register(&self, input: NewOrganization) -> ServiceResult<RegisteredOrganization> {
        validate_credentials(&input.contact_email, &input.password)?;
        for (field, value) in [
            ("organization_name", &input.name),
            ("contact_name", &input.contact_name),
            ("document_type", &input.document_type),
            ("document_reference", &input.document_reference),
        ] {
            if value.trim().is_empty() {
                return Err(ServiceError::Validation(format!("{field} is required")));
            }
        }

        let api_key = generate_api_key();
        let now = Utc::now();
        let org = StoredOrganization {
            org_id: uuid::Uuid::new_v4().to_string(),
            public_org_id: String::new(),
            name: input.name.trim().to_string(),
            contact_name: input.contact_name.trim().to_string(),
            contact_email: input.contact_email.trim().to_string(),
            email_index: self.state.secrets.email_index(&input.contact_email)?,
            password_hash: hash_password(&input.password)?,
            api_key_hash: hash_api_key(&api_key),
            status: OrgStatus::UnApproved,
            document_type: input.document_type.trim().to_string(),
            document_reference: input.document_reference.trim().to_string(),
            created_at: now,
            updated_at: now,
        };

        let org = OrganizationRepository::new(&self.state.store).create(&org)?;

        audit_log!(
            &self.state.store,
            AuditEvent::new(AuditEventType::OrganizationRegistered)
                .with_principal(&org.org_id)
                .with_resource("organization", &org.org_id)
                .with_details(json!({ "public_org_id": org.public_org_id }))
        );
        tracing::info!(org_id = %org.org_id, public_org_id = %org.public_org_id, "organization registered");

        Ok(RegisteredOrganization { org, api_key })
    }

    /// Password login. Only approved organizations receive a token.
    pub fn login(&self, email: &str, password: &str) -> ServiceResult<LoginSession> {
        let email_index = self.state.secrets.email_index(email)?;
        let org = OrganizationRepository::new(&self.state.store).find_by_email_index(&email_index)?;
        let verified = verify_login(password, org.as_ref().map(|o| o.password_hash.as_str()));

        let org = match org {
            Some(org) if verified => org,
            other => {
                audit_log!(
                    &self.state.store,
                    AuditEvent::new(AuditEventType::AuthFailure)
                        .with_resource("organization", other.map(|o| o.org_id).unwrap_or_default())
                        .failed("invalid credentials")
                );
                return Err(CryptoError::Authentication.into());
            }
        };

        if org.status != OrgStatus::Approved {
            return Err(ServiceError::Forbidden(format!(
                "organization is {}",
                org.status
            )));
        }
        self.issue_session(&org.org_id, Role::Organization)
    }

    /// Change the caller's contact details.
    ///
    /// A new contact email must not belong to another organization
    /// (`Conflict`); its lookup claim replaces the old one.
    pub fn update_contact(&self, org_id: &str, update: ContactUpdate) -> ServiceResult<StoredOrganization> {
        let mut org = self.require_approved(org_id)?;
        let previous_index = org.email_index.clone();
        let mut changed = Vec::new();

        if let Some(name) = update.contact_name {
            let name = name.trim();
            if !(MIN_CONTACT_NAME_LEN..=MAX_CONTACT_NAME_LEN).contains(&name.chars().count()) {
                return Err(ServiceError::Validation(format!(
                    "contact_name must be {MIN_CONTACT_NAME_LEN}-{MAX_CONTACT_NAME_LEN} characters"
                )));
            }
            org.contact_name = name.to_string();
            changed.push("contact_name");
        }
        if let Some(email) = update.contact_email {
            let email = email.trim();
            if !email.contains('@') {
                return Err(ServiceError::Validation("email address is invalid".to_string()));
            }
            org.email_index = self.state.secrets.email_index(email)?;
            org.contact_email = email.to_string();
            changed.push("contact_email");
        }
        if changed.is_empty() {
            return Ok(org);
        }

        org.updated_at = Utc::now();
        OrganizationRepository::new(&self.state.store)
            .update_contact(&org, &previous_index)
            .map_err(|e| match e {
                crate::storage::StorageError::AlreadyExists(_) => ServiceError::Conflict(
                    "an organization with this email already exists".to_string(),
                ),
                other => other.into(),
            })?;

        audit_log!(
            &self.state.store,
            AuditEvent::new(AuditEventType::OrganizationUpdated)
                .with_principal(&org.org_id)
                .with_resource("organization", &org.org_id)
                .with_details(json!({ "fields": changed }))
        );
        tracing::info!(org_id = %org.org_id, "organization contact updated");

        Ok(org)
    }

    /// Check a presented API key against the stored digest.
    pub fn verify_api_key(&self, org_id: &str, presented: &str) -> ServiceResult<StoredOrganization> {
        let org = self.get(org_id)?;
        if !secrets_match(&hash_api_key(presented), &org.api_key_hash) {
            return Err(CryptoError::Authentication.into());
        }
        Ok(org)
    }

    /// API-key login for machine clients. Same status rule as password login.
    pub fn api_key_session(&self, org_id: &str, presented: &str) -> ServiceResult<LoginSession> {
        let org = match self.verify_api_key(org_id, presented) {
            Ok(org) => org,
            Err(ServiceError::NotFound(_)) | Err(ServiceError::Crypto(CryptoError::Authentication)) => {
                audit_log!(
                    &self.state.store,
                    AuditEvent::new(AuditEventType::AuthFailure)
                        .with_resource("organization", org_id)
                        .failed("invalid api key")
                );
                return Err(CryptoError::Authentication.into());
            }
            Err(e) => return Err(e),
        };
        if org.status != OrgStatus::Approved {
            return Err(ServiceError::Forbidden(format!(
                "organization is {}",
                org.status
            )));
        }
        self.issue_session(&org.org_id, Role::Organization)
    }

    /// Ids are UUIDs; anything else is unknown without touching the disk.
    pub fn get(&self, org_id: &str) -> ServiceResult<StoredOrganization> {
        if uuid::Uuid::parse_str(org_id).is_err() {
            return Err(ServiceError::NotFound(format!("organization {org_id}")));
        }
        Ok(OrganizationRepository::new(&self.state.store).get(org_id)?)
    }

    pub fn list(&self) -> ServiceResult<Vec<StoredOrganization>> {
        Ok(OrganizationRepository::new(&self.state.store).list_all()?)
    }

    /// The organization, provided it is currently approved.
    pub fn require_approved(&self, org_id: &str) -> ServiceResult<StoredOrganization> {
        let org = self.get(org_id)?;
        if org.status != OrgStatus::Approved {
            return Err(ServiceError::Forbidden(format!(
                "organization is {}",
                org.status
            )));
        }
        Ok(org)
    }

    /// Admin-only status change along the organization lifecycle.
    pub async fn set_status(
        &self,
        admin: &AuthenticatedUser,
        org_id: &str,
        next: OrgStatus,
    ) -> ServiceResult<StoredOrganization> {
        if admin.role != Role::Admin {
            audit_log!(
                &self.state.store,
                AuditEvent::new(AuditEventType::PermissionDenied)
                    .with_principal(&admin.user_id)
                    .with_resource("organization", org_id)
                    .failed("status change requires admin")
            );
            return Err(ServiceError::Forbidden("admin role required".to_string()));
        }

        let repo = OrganizationRepository::new(&self.state.store);
        let mut org = repo.get(org_id)?;
        let previous = org.status;
        if !previous.can_transition_to(next) {
            return Err(ServiceError::InvalidState(format!(
                "organization cannot move from {previous} to {next}"
            )));
        }

        org.status = next;
        org.updated_at = Utc::now();
        repo.update(&org)?;

        audit_log!(
            &self.state.store,
            AuditEvent::new(AuditEventType::OrganizationStatusChanged)
                .with_principal(&admin.user_id)
                .with_resource("organization", &org.org_id)
                .with_details(json!({ "from": previous, "to": next }))
        );
        tracing::info!(org_id = %org.org_id, from = %previous, to = %next, "organization status changed");

        let mut context = Map::new();
        context.insert("org_name".into(), Value::from(org.name.clone()));
        context.insert("status".into(), Value::from(next.to_string()));
        notify(
            self.state.notifier.clone(),
            Template::OrganizationStatusChanged,
            org.contact_email.clone(),
            context,
        );

        Ok(org)
    }

    /// Exchange the configured admin key for an admin token.
    pub fn admin_session(&self, presented_key: &str) -> ServiceResult<LoginSession> {
        let Some(expected) = self.state.admin_api_key.as_deref() else {
            return Err(ServiceError::Forbidden("admin API is disabled".to_string()));
        };
        if !secrets_match(presented_key, expected) {
            audit_log!(
                &self.state.store,
                AuditEvent::new(AuditEventType::AuthFailure)
                    .with_resource("admin", ADMIN_SUBJECT)
                    .failed("invalid admin key")
            );
            return Err(CryptoError::Authentication.into());
        }
        self.issue_session(ADMIN_SUBJECT, Role::Admin)
    }

    fn issue_session(&self, subject: &str, role: Role) -> ServiceResult<LoginSession> {
        let ttl = self.state.auth_token_ttl;
        let token = self.state.tokens.issue_auth_token(subject, role, ttl)?;
        Ok(LoginSession {
            subject_id: subject.to_string(),
            token,
            expires_in: ttl.as_secs(),
        })
    }
}


#[cfg(test)]
mod tests {
    use super::test_support::*;
    use super::*;
    use crate::providers::notifier::fakes::RecordingNotifier;
    use crate::state::test_support::{test_state, test_state_with};
    use std::sync::Arc;

    #[test]
    fn register_assigns_public_id_and_hides_key() {
        let (state, _temp) = test_state();
        let service = OrganizationService::new(&state);

        let first = service.register(new_org("Acme Corp", "ops@acme.io")).unwrap();
        assert_eq!(first.org.status, OrgStatus::UnApproved);
        assert_eq!(first.org.public_org_id, "org_acme_corp");
        assert!(first.api_key.starts_with("sde_"));
        assert_ne!(first.org.api_key_hash, first.api_key);
        service.verify_api_key(&first.org.org_id, &first.api_key).unwrap();
        assert!(service.verify_api_key(&first.org.org_id, "sde_wrong").is_err());

        let second = service.register(new_org("Acme-Corp", "legal@acme.io")).unwrap();
        assert_eq!(second.org.public_org_id, "org_acme_corp_2");
    }

    #[test]
    fn duplicate_email_or_name_conflicts() {
        let (state, _temp) = test_state();
        let service = OrganizationService::new(&state);
        service.register(new_org("Acme", "ops@acme.io")).unwrap();

        assert!(matches!(
            service.register(new_org("Other", "OPS@acme.io")),
            Err(ServiceError::Conflict(_))
        ));
        assert!(matches!(
            service.register(new_org("  acme ", "new@acme.io")),
            Err(ServiceError::Conflict(_))
        ));
    }

    #[tokio::test]
    async fn login_requires_approval() {
        let notifier = Arc::new(RecordingNotifier::default());
        let (state, _temp) = test_state_with(notifier.clone());
        let service = OrganizationService::new(&state);
        let registered = service.register(new_org("Acme", "ops@acme.io")).unwrap();

        assert!(matches!(
            service.login("ops@acme.io", ORG_PASSWORD),
            Err(ServiceError::Forbidden(_))
        ));

        service
            .set_status(&admin(&state), &registered.org.org_id, OrgStatus::Approved)
            .await
            .unwrap();
        notifier.wait_for(Template::OrganizationStatusChanged).await;
        let (to, context) = notifier.last_for(Template::OrganizationStatusChanged).unwrap();
        assert_eq!(to, "ops@acme.io");
        assert_eq!(context["status"], "approved");

        let session = service.login("ops@acme.io", ORG_PASSWORD).unwrap();
        let claims = state.tokens.verify(&session.token).unwrap();
        assert_eq!(claims.sub, registered.org.org_id);
        assert_eq!(claims.role(), Some(Role::Organization));

        assert!(matches!(
            service.login("ops@acme.io", "wrong password"),
            Err(ServiceError::Crypto(CryptoError::Authentication))
        ));
    }

    #[tokio::test]
    async fn api_key_session_follows_status() {
        let (state, _temp) = test_state();
        let service = OrganizationService::new(&state);
        let registered = service.register(new_org("Acme", "ops@acme.io")).unwrap();
        let org_id = registered.org.org_id.clone();

        assert!(matches!(
            service.api_key_session(&org_id, &registered.api_key),
            Err(ServiceError::Forbidden(_))
        ));
        service
            .set_status(&admin(&state), &org_id, OrgStatus::Approved)
            .await
            .unwrap();

        let session = service.api_key_session(&org_id, &registered.api_key).unwrap();
        assert_eq!(session.subject_id, org_id);
        assert!(matches!(
            service.api_key_session(&org_id, "sde_wrong"),
            Err(ServiceError::Crypto(CryptoError::Authentication))
        ));
        assert!(matches!(
            service.api_key_session("../identities/x", &registered.api_key),
            Err(ServiceError::Crypto(CryptoError::Authentication))
        ));
    }

    #[tokio::test]
    async fn contact_update_moves_login_email() {
        let (state, _temp) = test_state();
        let service = OrganizationService::new(&state);
        let acme = approved_org(&state, "Acme", "ops@acme.io").await;
        approved_org(&state, "Other Bank", "ops@other.io").await;

        assert!(matches!(
            service.update_contact(
                &acme.org_id,
                ContactUpdate {
                    contact_email: Some("OPS@other.io".to_string()),
                    ..Default::default()
                },
            ),
            Err(ServiceError::Conflict(_))
        ));
        assert!(matches!(
            service.update_contact(
                &acme.org_id,
                ContactUpdate {
                    contact_name: Some("G".to_string()),
                    ..Default::default()
                },
            ),
            Err(ServiceError::Validation(_))
        ));

        let updated = service
            .update_contact(
                &acme.org_id,
                ContactUpdate {
                    contact_name: Some("Grace Hopper".to_string()),
                    contact_email: Some("compliance@acme.io".to_string()),
                },
            )
            .unwrap();
        assert_eq!(updated.contact_name, "Grace Hopper");
        assert_eq!(service.get(&acme.org_id).unwrap().contact_email, "compliance@acme.io");

        service.login("compliance@acme.io", ORG_PASSWORD).unwrap();
        assert!(matches!(
            service.login("ops@acme.io", ORG_PASSWORD),
            Err(ServiceError::Crypto(CryptoError::Authentication))
        ));
    }

    #[tokio::test]
    async fn status_lifecycle_is_enforced() {
        let (state, _temp) = test_state();
        let service = OrganizationService::new(&state);
        let admin = admin(&state);
        let org = service.register(new_org("Acme", "ops@acme.io")).unwrap().org;

        service.set_status(&admin, &org.org_id, OrgStatus::Approved).await.unwrap();
        service.set_status(&admin, &org.org_id, OrgStatus::Suspended).await.unwrap();
        assert!(matches!(
            service.require_approved(&org.org_id),
            Err(ServiceError::Forbidden(_))
        ));
        service.set_status(&admin, &org.org_id, OrgStatus::Approved).await.unwrap();
        service.require_approved(&org.org_id).unwrap();
        service.set_status(&admin, &org.org_id, OrgStatus::Banned).await.unwrap();

        assert!(matches!(
            service.set_status(&admin, &org.org_id, OrgStatus::Approved).await,
            Err(ServiceError::InvalidState(_))
        ));
    }

    #[tokio::test]
    async fn non_admin_cannot_change_status() {
        let (state, _temp) = test_state();
        let service = OrganizationService::new(&state);
        let org = service.register(new_org("Acme", "ops@acme.io")).unwrap().org;
        let impostor = AuthenticatedUser {
            user_id: org.org_id.clone(),
            role: Role::Organization,
            session_id: None,
            expires_at: 0,
        };

        assert!(matches!(
            service.set_status(&impostor, &org.org_id, OrgStatus::Approved).await,
            Err(ServiceError::Forbidden(_))
        ));
        assert_eq!(service.get(&org.org_id).unwrap().status, OrgStatus::UnApproved);
    }

    #[test]
    fn admin_session_checks_key() {
        let (state, _temp) = test_state();
        let service = OrganizationService::new(&state);
        assert!(matches!(
            service.admin_session("guess"),
            Err(ServiceError::Crypto(CryptoError::Authentication))
        ));

        let disabled = state.clone().with_admin_api_key(None);
        assert!(matches!(
            OrganizationService::new(&disabled).admin_session("anything"),
            Err(ServiceError::Forbidden(_))
        ));
    }
}
