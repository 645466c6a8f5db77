// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! User profile: optional display details kept next to the identity.
//!
//! The whole profile is sealed under the platform key, bound to the user
//! id, so a profile file copied to another user does not open.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use url::Url;
use zeroize::Zeroizing;

use super::error::{ServiceError, ServiceResult};
use super::identity::IdentityService;
use crate::audit_log;
use crate::crypto::CryptoError;
use crate::state::AppState;
use crate::storage::{
    AuditEvent, AuditEventType, OwnershipEnforcer, ProfileRepository, StoredProfile,
};

pub const MAX_PROFILE_FIELD_LEN: usize = 255;

/// Profile fields. On update, `None` leaves a field unchanged.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    /// `YYYY-MM-DD`
    pub date_of_birth: Option<String>,
    pub address: Option<String>,
    pub phone_number: Option<String>,
    pub profile_picture_url: Option<String>,
}

impl UserProfile {
    fn merge(&mut self, changes: UserProfile) {
        let UserProfile {
            first_name,
            last_name,
            date_of_birth,
            address,
            phone_number,
            profile_picture_url,
        } = changes;
        for (slot, value) in [
            (&mut self.first_name, first_name),
            (&mut self.last_name, last_name),
            (&mut self.date_of_birth, date_of_birth),
            (&mut self.address, address),
            (&mut self.phone_number, phone_number),
            (&mut self.profile_picture_url, profile_picture_url),
        ] {
            if value.is_some() {
                *slot = value;
            }
        }
    }

    fn clear_empty(&mut self) {
        for field in [
            &mut self.first_name,
            &mut self.last_name,
            &mut self.date_of_birth,
            &mut self.address,
            &mut self.phone_number,
            &mut self.profile_picture_url,
        ] {
            if field.as_deref() == Some("") {
                *field = None;
            }
        }
    }

    /// Trim every field and check formats.
    fn normalized(self) -> ServiceResult<Self> {
        fn clean(field: &str, value: Option<String>) -> ServiceResult<Option<String>> {
            let Some(value) = value else {
                return Ok(None);
            };
            let value = value.trim().to_string();
            if value.chars().count() > MAX_PROFILE_FIELD_LEN {
                return Err(ServiceError::Validation(format!(
                    "{field} must be at most {MAX_PROFILE_FIELD_LEN} characters"
                )));
            }
            Ok(Some(value))
        }

        let profile = UserProfile {
            first_name: clean("first_name", self.first_name)?,
            last_name: clean("last_name", self.last_name)?,
            date_of_birth: clean("date_of_birth", self.date_of_birth)?,
            address: clean("address", self.address)?,
            phone_number: clean("phone_number", self.phone_number)?,
            profile_picture_url: clean("profile_picture_url", self.profile_picture_url)?,
        };

        if let Some(dob) = profile.date_of_birth.as_deref().filter(|d| !d.is_empty()) {
            NaiveDate::parse_from_str(dob, "%Y-%m-%d").map_err(|_| {
                ServiceError::Validation("date_of_birth must be YYYY-MM-DD".to_string())
            })?;
        }
        if let Some(url) = profile.profile_picture_url.as_deref().filter(|u| !u.is_empty()) {
            let parsed = Url::parse(url).map_err(|_| {
                ServiceError::Validation("profile_picture_url is not a valid URL".to_string())
            })?;
            if !matches!(parsed.scheme(), "http" | "https") {
                return Err(ServiceError::Validation(
                    "profile_picture_url must be http or https".to_string(),
                ));
            }
        }
        Ok(profile)
    }
}

/// A decrypted profile with its timestamps.
#[derive(Debug, Clone)]
pub struct ProfileRecord {
    pub user_id: String,
    pub profile: UserProfile,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

fn profile_context(user_id: &str) -> Vec<u8> {
    format!("sde/profile/{user_id}").into_bytes()
}

pub struct ProfileService<'a> {
    state: &'a AppState,
}

impl<'a> ProfileService<'a> {
    pub fn new(state: &'a AppState) -> Self {
        Self { state }
    }

    /// Create the caller's profile. A user has at most one (`Conflict`).
    pub fn create(&self, user_id: &str, profile: UserProfile) -> ServiceResult<ProfileRecord> {
        IdentityService::new(self.state).get(user_id)?;
        let mut profile = profile.normalized()?;
        profile.clear_empty();

        let now = Utc::now();
        let stored = StoredProfile {
            user_id: user_id.to_string(),
            sealed: self.seal(user_id, &profile)?,
            created_at: now,
            updated_at: now,
        };
        ProfileRepository::new(&self.state.store).create(&stored)?;

        audit_log!(
            &self.state.store,
            AuditEvent::new(AuditEventType::ProfileCreated)
                .with_principal(user_id)
                .with_resource("profile", user_id)
        );

        Ok(ProfileRecord {
            user_id: stored.user_id,
            profile,
            created_at: stored.created_at,
            updated_at: stored.updated_at,
        })
    }

    pub fn get(&self, user_id: &str) -> ServiceResult<ProfileRecord> {
        let stored = ProfileRepository::new(&self.state.store).get(user_id)?;
        stored.verify_ownership(user_id)?;
        let profile = self.open(&stored)?;
        Ok(ProfileRecord {
            user_id: stored.user_id,
            profile,
            created_at: stored.created_at,
            updated_at: stored.updated_at,
        })
    }

    /// Apply the fields present in `changes`. An empty string clears a field.
    pub fn update(&self, user_id: &str, changes: UserProfile) -> ServiceResult<ProfileRecord> {
        let repo = ProfileRepository::new(&self.state.store);
        let mut stored = repo.get(user_id)?;
        stored.verify_ownership(user_id)?;

        let mut profile = self.open(&stored)?;
        profile.merge(changes.normalized()?);
        profile.clear_empty();

        stored.sealed = self.seal(user_id, &profile)?;
        stored.updated_at = Utc::now();
        repo.update(&stored)?;

        audit_log!(
            &self.state.store,
            AuditEvent::new(AuditEventType::ProfileUpdated)
                .with_principal(user_id)
                .with_resource("profile", user_id)
        );

        Ok(ProfileRecord {
            user_id: stored.user_id,
            profile,
            created_at: stored.created_at,
            updated_at: stored.updated_at,
        })
    }

    fn seal(&self, user_id: &str, profile: &UserProfile) -> ServiceResult<crate::crypto::SealedBox> {
        let plaintext = Zeroizing::new(
            serde_json::to_vec(profile)
                .map_err(|e| CryptoError::Encoding(format!("profile: {e}")))?,
        );
        Ok(self
            .state
            .secrets
            .platform_key
            .seal(&plaintext, &profile_context(user_id))?)
    }

    fn open(&self, stored: &StoredProfile) -> ServiceResult<UserProfile> {
        let plaintext = self
            .state
            .secrets
            .platform_key
            .open(&stored.sealed, &profile_context(&stored.user_id))?;
        serde_json::from_slice(&plaintext)
            .map_err(|e| CryptoError::Encoding(format!("profile: {e}")).into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::test_support::test_state;

    const PASSWORD: &str = "correct horse battery";

    async fn registered(state: &AppState, email: &str) -> String {
        IdentityService::new(state)
            .register("Ada", email, PASSWORD)
            .await
            .unwrap()
            .user_id
    }

    fn ada() -> UserProfile {
        UserProfile {
            first_name: Some(" Ada ".to_string()),
            last_name: Some("Lovelace".to_string()),
            date_of_birth: Some("1815-12-10".to_string()),
            phone_number: Some("+44 20 7946 0000".to_string()),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn create_get_and_update() {
        let (state, _temp) = test_state();
        let user_id = registered(&state, "ada@example.com").await;
        let service = ProfileService::new(&state);

        assert!(matches!(service.get(&user_id), Err(ServiceError::NotFound(_))));

        let created = service.create(&user_id, ada()).unwrap();
        assert_eq!(created.profile.first_name.as_deref(), Some("Ada"));
        assert!(matches!(
            service.create(&user_id, ada()),
            Err(ServiceError::Conflict(_))
        ));

        let updated = service
            .update(
                &user_id,
                UserProfile {
                    address: Some("12 St James's Square, London".to_string()),
                    phone_number: Some(String::new()),
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(updated.profile.first_name.as_deref(), Some("Ada"));
        assert_eq!(updated.profile.address.as_deref(), Some("12 St James's Square, London"));
        assert_eq!(updated.profile.phone_number, None);
        assert_eq!(updated.created_at, created.created_at);

        let read = service.get(&user_id).unwrap();
        assert_eq!(read.profile, updated.profile);
    }

    #[tokio::test]
    async fn profile_is_sealed_at_rest() {
        let (state, _temp) = test_state();
        let user_id = registered(&state, "ada@example.com").await;
        ProfileService::new(&state).create(&user_id, ada()).unwrap();

        let raw = std::fs::read_to_string(state.store.paths().profile(&user_id)).unwrap();
        assert!(!raw.contains("Lovelace"));

        // A sealed profile moved to another user does not open.
        let other = registered(&state, "bob@example.com").await;
        let mut moved = ProfileRepository::new(&state.store).get(&user_id).unwrap();
        moved.user_id = other.clone();
        ProfileRepository::new(&state.store).create(&moved).unwrap();
        assert!(matches!(
            ProfileService::new(&state).get(&other),
            Err(ServiceError::Crypto(_))
        ));
    }

    #[tokio::test]
    async fn fields_are_validated() {
        let (state, _temp) = test_state();
        let user_id = registered(&state, "ada@example.com").await;
        let service = ProfileService::new(&state);

        for bad in [
            UserProfile {
                date_of_birth: Some("10/12/1815".to_string()),
                ..Default::default()
            },
            UserProfile {
                profile_picture_url: Some("javascript:alert(1)".to_string()),
                ..Default::default()
            },
            UserProfile {
                first_name: Some("x".repeat(MAX_PROFILE_FIELD_LEN + 1)),
                ..Default::default()
            },
        ] {
            assert!(matches!(
                service.create(&user_id, bad),
                Err(ServiceError::Validation(_))
            ));
        }

        assert!(matches!(
            service.create("00000000-0000-0000-0000-000000000000", ada()),
            Err(ServiceError::NotFound(_))
        ));
    }
}
