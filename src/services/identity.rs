// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Identity registration, login and phrase-based recovery.
//!
//! The private key exists in plaintext only inside a single call: it is
//! generated or unwrapped, used, and dropped (zeroized) before returning.

use chrono::Utc;
use serde_json::{json, Map, Value};
use zeroize::Zeroizing;

use super::error::{ServiceError, ServiceResult};
use crate::audit_log;
use crate::auth::password::{hash_password, verify_login, MIN_PASSWORD_LEN};
use crate::auth::Role;
use crate::crypto::{CryptoError, IdentityKeyManager, PrivateKey};
use crate::providers::{notify, Template};
use crate::state::AppState;
use crate::storage::{AuditEvent, AuditEventType, IdentityRepository, StoredIdentity};

/// Returned once from registration. The phrase is never stored.
pub struct RegisteredIdentity {
    pub user_id: String,
    pub did: String,
    pub address: String,
    pub mnemonic: Zeroizing<String>,
}

impl std::fmt::Debug for RegisteredIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegisteredIdentity")
            .field("user_id", &self.user_id)
            .field("did", &self.did)
            .finish_non_exhaustive()
    }
}

/// A freshly issued auth token.
#[derive(Debug, Clone)]
pub struct LoginSession {
    pub subject_id: String,
    pub token: String,
    pub expires_in: u64,
}

fn field_context(user_id: &str, field: &str) -> Vec<u8> {
    format!("sde/identity/{user_id}/{field}").into_bytes()
}

pub(crate) fn validate_credentials(email: &str, password: &str) -> ServiceResult<()> {
    let email = email.trim();
    if email.is_empty() || !email.contains('@') {
        return Err(ServiceError::Validation("email address is invalid".to_string()));
    }
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(ServiceError::Validation(format!(
            "password must be at least {MIN_PASSWORD_LEN} characters"
        )));
    }
    Ok(())
}

pub struct IdentityService<'a> {
    state: &'a AppState,
}

impl<'a> IdentityService<'a> {
    pub fn new(state: &'a AppState) -> Self {
        Self { state }
    }

    pub async fn register(
        &self,
        name: &str,
        email: &str,
        password: &str,
    ) -> ServiceResult<RegisteredIdentity> {
        validate_credentials(email, password)?;
        let name = name.trim();
        if name.is_empty() {
            return Err(ServiceError::Validation("name is required".to_string()));
        }

        let secrets = &self.state.secrets;
        let email_index = secrets.email_index(email)?;
        let repo = IdentityRepository::new(&self.state.store);
        if repo.find_by_email_index(&email_index)?.is_some() {
            return Err(ServiceError::Conflict("identity with this email already exists".to_string()));
        }

        let generated = IdentityKeyManager::generate_identity()?;
        let user_id = uuid::Uuid::new_v4().to_string();
        let now = Utc::now();

        let identity = StoredIdentity {
            user_id: user_id.clone(),
            did: generated.did.clone(),
            address: generated.address.clone(),
            email_index,
            sealed_email: secrets
                .platform_key
                .seal(email.trim().as_bytes(), &field_context(&user_id, "email"))?,
            sealed_name: secrets
                .platform_key
                .seal(name.as_bytes(), &field_context(&user_id, "name"))?,
            password_hash: hash_password(password)?,
            key_envelope: self
                .state
                .key_envelope
                .seal(&generated.private_key, password, &secrets.platform_key)?,
            created_at: now,
            updated_at: now,
        };

        // A concurrent registration for the same email loses here.
        repo.create(&identity)?;

        audit_log!(
            &self.state.store,
            AuditEvent::new(AuditEventType::IdentityCreated)
                .with_principal(&user_id)
                .with_resource("identity", &user_id)
                .with_details(json!({ "did": identity.did }))
        );
        tracing::info!(user_id = %user_id, did = %identity.did, "identity registered");

        let mut context = Map::new();
        context.insert("name".into(), Value::from(name));
        context.insert("did".into(), Value::from(identity.did.clone()));
        notify(
            self.state.notifier.clone(),
            Template::Welcome,
            email.trim().to_string(),
            context,
        );

        Ok(RegisteredIdentity {
            user_id,
            did: generated.did,
            address: generated.address,
            mnemonic: generated.mnemonic,
        })
    }

    pub fn login(&self, email: &str, password: &str) -> ServiceResult<LoginSession> {
        let email_index = self.state.secrets.email_index(email)?;
        let identity = IdentityRepository::new(&self.state.store).find_by_email_index(&email_index)?;
        let verified = verify_login(password, identity.as_ref().map(|i| i.password_hash.as_str()));

        let identity = match identity {
            Some(identity) if verified => identity,
            other => {
                audit_log!(
                    &self.state.store,
                    AuditEvent::new(AuditEventType::AuthFailure)
                        .with_resource("identity", other.map(|i| i.user_id).unwrap_or_default())
                        .failed("invalid credentials")
                );
                return Err(CryptoError::Authentication.into());
            }
        };

        let ttl = self.state.auth_token_ttl;
        let token = self
            .state
            .tokens
            .issue_auth_token(&identity.user_id, Role::User, ttl)?;

        audit_log!(
            &self.state.store,
            AuditEvent::new(AuditEventType::IdentityLoggedIn)
                .with_principal(&identity.user_id)
                .with_resource("identity", &identity.user_id)
        );

        Ok(LoginSession {
            subject_id: identity.user_id,
            token,
            expires_in: ttl.as_secs(),
        })
    }

    /// Reset the password using the recovery phrase.
    ///
    /// The phrase must re-derive the DID on record. The key envelope is
    /// rebuilt under the new password and the login hash replaced.
    pub fn recover(&self, email: &str, mnemonic: &str, new_password: &str) -> ServiceResult<String> {
        validate_credentials(email, new_password)?;

        let email_index = self.state.secrets.email_index(email)?;
        let repo = IdentityRepository::new(&self.state.store);
        let Some(mut identity) = repo.find_by_email_index(&email_index)? else {
            return Err(CryptoError::Authentication.into());
        };

        let recovered = match IdentityKeyManager::recover_identity(mnemonic) {
            Ok(recovered) if recovered.did == identity.did => recovered,
            _ => {
                audit_log!(
                    &self.state.store,
                    AuditEvent::new(AuditEventType::IdentityRecovered)
                        .with_resource("identity", &identity.user_id)
                        .failed("phrase does not match identity")
                );
                return Err(CryptoError::Authentication.into());
            }
        };

        let secrets = &self.state.secrets;
        identity.key_envelope =
            self.state
                .key_envelope
                .seal(&recovered.private_key, new_password, &secrets.platform_key)?;
        identity.password_hash = hash_password(new_password)?;
        identity.updated_at = Utc::now();
        repo.update(&identity)?;

        audit_log!(
            &self.state.store,
            AuditEvent::new(AuditEventType::IdentityRecovered)
                .with_principal(&identity.user_id)
                .with_resource("identity", &identity.user_id)
        );
        tracing::info!(user_id = %identity.user_id, "identity recovered");

        Ok(identity.user_id)
    }

    pub fn get(&self, user_id: &str) -> ServiceResult<StoredIdentity> {
        Ok(IdentityRepository::new(&self.state.store).get(user_id)?)
    }

    /// Resolve a DID or an email address to an identity.
    pub fn resolve_owner(&self, reference: &str) -> ServiceResult<StoredIdentity> {
        let reference = reference.trim();
        let repo = IdentityRepository::new(&self.state.store);
        let found = if reference.starts_with(crate::crypto::identity::DID_PREFIX) {
            repo.find_by_did(reference)?
        } else {
            repo.find_by_email_index(&self.state.secrets.email_index(reference)?)?
        };
        found.ok_or_else(|| ServiceError::NotFound("identity".to_string()))
    }

    /// Open both envelope layers. Wrong password fails with `Authentication`.
    pub fn unlock_private_key(
        &self,
        identity: &StoredIdentity,
        password: &str,
    ) -> ServiceResult<PrivateKey> {
        Ok(self.state.key_envelope.open(
            &identity.key_envelope,
            password,
            &self.state.secrets.platform_key,
        )?)
    }

    /// Contact address for notifications.
    pub fn contact_email(&self, identity: &StoredIdentity) -> ServiceResult<String> {
        let plain = self
            .state
            .secrets
            .platform_key
            .open(&identity.sealed_email, &field_context(&identity.user_id, "email"))?;
        String::from_utf8(plain.to_vec())
            .map_err(|_| CryptoError::Encoding("sealed email is not UTF-8".to_string()).into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::notifier::fakes::RecordingNotifier;
    use crate::state::test_support::{test_state, test_state_with};
    use std::sync::Arc;

    const PASSWORD: &str = "correct horse battery";

    #[tokio::test]
    async fn register_then_login() {
        let notifier = Arc::new(RecordingNotifier::default());
        let (state, _temp) = test_state_with(notifier.clone());
        let service = IdentityService::new(&state);

        let registered = service.register("Ada", "Ada@Example.com", PASSWORD).await.unwrap();
        assert!(registered.did.starts_with("did:sde:mainnet:0x"));
        assert_eq!(
            registered.mnemonic.split_whitespace().count(),
            crate::crypto::identity::MNEMONIC_WORD_COUNT
        );

        let session = service.login("ada@example.com", PASSWORD).unwrap();
        assert_eq!(session.subject_id, registered.user_id);
        let claims = state.tokens.verify(&session.token).unwrap();
        assert_eq!(claims.role(), Some(Role::User));

        notifier.wait_for(Template::Welcome).await;
        assert_eq!(notifier.templates(), vec![Template::Welcome]);
        let (to, context) = notifier.last_for(Template::Welcome).unwrap();
        assert_eq!(to, "Ada@Example.com");
        assert_eq!(context["did"], registered.did.as_str());
    }

    #[tokio::test]
    async fn stored_identity_holds_no_plaintext() {
        let (state, _temp) = test_state();
        let service = IdentityService::new(&state);
        let registered = service.register("Ada", "ada@example.com", PASSWORD).await.unwrap();

        let raw = std::fs::read_to_string(state.store.paths().identity(&registered.user_id)).unwrap();
        assert!(!raw.contains("ada@example.com"));
        assert!(!raw.contains(PASSWORD));
        assert!(!raw.contains(registered.mnemonic.as_str()));

        let identity = service.get(&registered.user_id).unwrap();
        assert_eq!(service.contact_email(&identity).unwrap(), "ada@example.com");
        let key = service.unlock_private_key(&identity, PASSWORD).unwrap();
        let address =
            IdentityKeyManager::address_from_public_key(&IdentityKeyManager::derive_public_key(&key));
        assert_eq!(address, registered.address);
    }

    #[tokio::test]
    async fn duplicate_email_conflicts() {
        let (state, _temp) = test_state();
        let service = IdentityService::new(&state);
        service.register("Ada", "ada@example.com", PASSWORD).await.unwrap();

        let err = service
            .register("Other", " ADA@example.com ", PASSWORD)
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Conflict(_)));
    }

    #[tokio::test]
    async fn invalid_input_is_rejected() {
        let (state, _temp) = test_state();
        let service = IdentityService::new(&state);
        assert!(matches!(
            service.register("Ada", "not-an-email", PASSWORD).await,
            Err(ServiceError::Validation(_))
        ));
        assert!(matches!(
            service.register("Ada", "ada@example.com", "short").await,
            Err(ServiceError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn login_failures_are_indistinguishable() {
        let (state, _temp) = test_state();
        let service = IdentityService::new(&state);
        service.register("Ada", "ada@example.com", PASSWORD).await.unwrap();

        let unknown = service.login("nobody@example.com", PASSWORD).unwrap_err();
        let wrong = service.login("ada@example.com", "wrong password").unwrap_err();
        assert_eq!(unknown.to_string(), wrong.to_string());
        assert!(matches!(wrong, ServiceError::Crypto(CryptoError::Authentication)));
    }

    #[tokio::test]
    async fn recovery_resets_password() {
        let (state, _temp) = test_state();
        let service = IdentityService::new(&state);
        let registered = service.register("Ada", "ada@example.com", PASSWORD).await.unwrap();

        let user_id = service
            .recover("ada@example.com", &registered.mnemonic, "a new password")
            .unwrap();
        assert_eq!(user_id, registered.user_id);

        assert!(service.login("ada@example.com", PASSWORD).is_err());
        service.login("ada@example.com", "a new password").unwrap();

        let identity = service.get(&user_id).unwrap();
        assert!(matches!(
            service.unlock_private_key(&identity, PASSWORD),
            Err(ServiceError::Crypto(CryptoError::Authentication))
        ));
        service.unlock_private_key(&identity, "a new password").unwrap();
    }

    #[tokio::test]
    async fn recovery_with_foreign_phrase_fails() {
        let (state, _temp) = test_state();
        let service = IdentityService::new(&state);
        service.register("Ada", "ada@example.com", PASSWORD).await.unwrap();
        let other = service.register("Bob", "bob@example.com", PASSWORD).await.unwrap();

        let err = service
            .recover("ada@example.com", &other.mnemonic, "a new password")
            .unwrap_err();
        assert!(matches!(err, ServiceError::Crypto(CryptoError::Authentication)));
        service.login("ada@example.com", PASSWORD).unwrap();
    }

    #[tokio::test]
    async fn owners_resolve_by_did_or_email() {
        let (state, _temp) = test_state();
        let service = IdentityService::new(&state);
        let registered = service.register("Ada", "ada@example.com", PASSWORD).await.unwrap();

        assert_eq!(service.resolve_owner(&registered.did).unwrap().user_id, registered.user_id);
        assert_eq!(
            service.resolve_owner("ADA@example.com").unwrap().user_id,
            registered.user_id
        );
        assert!(matches!(
            service.resolve_owner("did:sde:mainnet:0x0000000000000000000000000000000000000000"),
            Err(ServiceError::NotFound(_))
        ));
    }
}
