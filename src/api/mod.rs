// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{
    routing::{get, post, put},
    Router,
};
use tower_http::{
    cors::CorsLayer,
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::{
    auth::{AuthenticatedUser, Role},
    models::{
        AdminSessionRequest, ApiKeySessionRequest, ConsentRequestList, ConsentRequestView,
        CreateConsentRequest, DecideConsentRequest, DecisionKind, DetokenizeRequest,
        DetokenizeResponse, LoginRequest, OrganizationList, OrganizationView, QueryVaultRequest,
        RecoverIdentityRequest, RecoverIdentityResponse, RegisterOrganizationRequest,
        RegisterOrganizationResponse, RegisterUserRequest, RegisterUserResponse, ReleasedDataItem,
        ReleasedDataResponse, SaveVaultEntryRequest, SessionResponse, UpdateOrganizationRequest,
        UpdateOrganizationStatusRequest, UserProfileRequest, UserProfileResponse, VaultDataItem,
        VaultDataResponse, VaultEntryResponse,
    },
    state::AppState,
    storage::{
        AuditEvent, AuditEventType, ConsentExplanation, ConsentStatus, EmbeddedEntry, OrgStatus,
        VaultEntryStatus,
    },
};

pub mod admin;
pub mod consent;
pub mod health;
pub mod organizations;
pub mod users;
pub mod vault;

pub fn router(state: AppState) -> Router {
    let v1_routes = Router::new()
        // Users
        .route("/users/register", post(users::register_user))
        .route("/users/login", post(users::login_user))
        .route("/users/recover", post(users::recover_identity))
        .route("/users/me", get(users::get_current_user))
        .route(
            "/users/me/profile",
            post(users::create_profile)
                .get(users::get_profile)
                .patch(users::update_profile),
        )
        // Vault
        .route("/vault/entries", put(vault::save_entry))
        .route("/vault/entries/query", post(vault::query_entries))
        // Consent (owner side)
        .route("/consent/requests", get(consent::list_requests))
        .route("/consent/requests/{request_id}", get(consent::get_request))
        .route(
            "/consent/requests/{request_id}/decision",
            post(consent::decide_request),
        )
        // Organizations
        .route(
            "/organizations/register",
            post(organizations::register_organization),
        )
        .route("/organizations/login", post(organizations::login_organization))
        .route("/organizations/session", post(organizations::api_key_session))
        .route(
            "/organizations/me",
            get(organizations::get_current_organization)
                .put(organizations::update_current_organization),
        )
        .route(
            "/organizations/requests",
            get(organizations::list_consent_requests).post(organizations::create_consent_request),
        )
        .route("/organizations/detokenize", post(organizations::detokenize))
        .route(
            "/organizations/requests/{request_id}/data",
            get(organizations::get_released_data),
        )
        // Admin
        .route("/admin/session", post(admin::create_session))
        .route("/admin/organizations", get(admin::list_organizations))
        .route(
            "/admin/organizations/{org_id}/status",
            put(admin::update_organization_status),
        )
        .route("/admin/audit/events", get(admin::query_audit_logs));

    let health_routes = Router::new()
        .route("/health", get(health::health))
        .route("/health/live", get(health::liveness))
        .route("/health/ready", get(health::readiness));

    Router::new()
        .nest("/v1", v1_routes)
        .merge(health_routes)
        .with_state(state)
        .merge(SwaggerUi::new("/docs").url("/api-doc/openapi.json", ApiDoc::openapi()))
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(TraceLayer::new_for_http())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
        .layer(CorsLayer::permissive())
}

#[derive(OpenApi)]
#[openapi(
    paths(
        health::health,
        health::liveness,
        health::readiness,
        users::register_user,
        users::login_user,
        users::recover_identity,
        users::get_current_user,
        users::create_profile,
        users::get_profile,
        users::update_profile,
        vault::save_entry,
        vault::query_entries,
        consent::list_requests,
        consent::get_request,
        consent::decide_request,
        organizations::register_organization,
        organizations::login_organization,
        organizations::api_key_session,
        organizations::get_current_organization,
        organizations::update_current_organization,
        organizations::create_consent_request,
        organizations::list_consent_requests,
        organizations::detokenize,
        organizations::get_released_data,
        admin::create_session,
        admin::list_organizations,
        admin::update_organization_status,
        admin::query_audit_logs
    ),
    components(
        schemas(
            health::ReadyResponse,
            health::HealthChecks,
            health::HealthResponse,
            users::UserMeResponse,
            admin::AuditLogResponse,
            AuthenticatedUser,
            Role,
            LoginRequest,
            SessionResponse,
            RegisterUserRequest,
            RegisterUserResponse,
            RecoverIdentityRequest,
            RecoverIdentityResponse,
            UserProfileRequest,
            UserProfileResponse,
            SaveVaultEntryRequest,
            VaultEntryResponse,
            VaultEntryStatus,
            QueryVaultRequest,
            VaultDataItem,
            VaultDataResponse,
            ConsentRequestView,
            ConsentRequestList,
            ConsentStatus,
            ConsentExplanation,
            EmbeddedEntry,
            DecisionKind,
            DecideConsentRequest,
            CreateConsentRequest,
            DetokenizeRequest,
            DetokenizeResponse,
            ReleasedDataItem,
            ReleasedDataResponse,
            RegisterOrganizationRequest,
            RegisterOrganizationResponse,
            ApiKeySessionRequest,
            OrganizationView,
            UpdateOrganizationRequest,
            OrganizationList,
            OrgStatus,
            AdminSessionRequest,
            UpdateOrganizationStatusRequest,
            AuditEvent,
            AuditEventType
        )
    ),
    tags(
        (name = "Health", description = "Liveness and readiness checks"),
        (name = "Users", description = "Identity registration, login, recovery and profile"),
        (name = "Vault", description = "Owner-encrypted personal data"),
        (name = "Consent", description = "Owner inbox and decisions"),
        (name = "Organizations", description = "Requester registration and consent requests"),
        (name = "Admin", description = "Organization review and audit")
    )
)]
struct ApiDoc;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::test_support::{test_state, TEST_ADMIN_KEY};
    use axum::{
        body::{to_bytes, Body},
        http::{
            header::{AUTHORIZATION, CONTENT_TYPE},
            Method, Request, StatusCode,
        },
    };
    use serde_json::{json, Value};
    use tower::ServiceExt;

    const PASSWORD: &str = "correct horse battery";
    const ORG_PASSWORD: &str = "org password 123";
    const CORE_PII: &str = r#"{"full_name":"Ada Lovelace","dob":"1815-12-10"}"#;

    async fn call(
        app: &Router,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(AUTHORIZATION, format!("Bearer {token}"));
        }
        let body = match body {
            Some(value) => {
                builder = builder.header(CONTENT_TYPE, "application/json");
                Body::from(value.to_string())
            }
            None => Body::empty(),
        };

        let response = app.clone().oneshot(builder.body(body).unwrap()).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, value)
    }

    async fn register_and_login_user(app: &Router) -> (Value, String) {
        let (status, user) = call(
            app,
            Method::POST,
            "/v1/users/register",
            None,
            Some(json!({"name": "Ada", "email": "ada@example.com", "password": PASSWORD})),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);

        let (status, session) = call(
            app,
            Method::POST,
            "/v1/users/login",
            None,
            Some(json!({"email": "ada@example.com", "password": PASSWORD})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(session["token_type"], "Bearer");
        (user, session["access_token"].as_str().unwrap().to_string())
    }

    /// Registers an organization, approves it as admin and returns its token.
    async fn approved_org_token(app: &Router) -> (String, String) {
        let (status, registered) = call(
            app,
            Method::POST,
            "/v1/organizations/register",
            None,
            Some(json!({
                "organization_name": "Acme Lending",
                "contact_name": "Grace",
                "contact_email": "ops@acme.io",
                "password": ORG_PASSWORD,
                "document_type": "company_registration",
                "document_reference": "REG-42"
            })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(registered["organization"]["status"], "un_approved");
        let org_id = registered["organization"]["org_id"].as_str().unwrap().to_string();
        let api_key = registered["api_key"].as_str().unwrap().to_string();

        let (status, _) = call(
            app,
            Method::POST,
            "/v1/organizations/login",
            None,
            Some(json!({"email": "ops@acme.io", "password": ORG_PASSWORD})),
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, admin) = call(
            app,
            Method::POST,
            "/v1/admin/session",
            None,
            Some(json!({"api_key": TEST_ADMIN_KEY})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let admin_token = admin["access_token"].as_str().unwrap().to_string();

        let (status, org) = call(
            app,
            Method::PUT,
            &format!("/v1/admin/organizations/{org_id}/status"),
            Some(&admin_token),
            Some(json!({"status": "approved"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(org["status"], "approved");

        let (status, session) = call(
            app,
            Method::POST,
            "/v1/organizations/session",
            None,
            Some(json!({"org_id": org_id, "api_key": api_key})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        (org_id, session["access_token"].as_str().unwrap().to_string())
    }

    #[tokio::test]
    async fn consent_flow_releases_data_after_approval() {
        let (state, _temp) = test_state();
        let app = router(state);

        let (user, user_token) = register_and_login_user(&app).await;
        let did = user["did"].as_str().unwrap();
        assert!(user["mnemonic"].as_str().unwrap().split_whitespace().count() > 1);

        let (status, entry) = call(
            &app,
            Method::PUT,
            "/v1/vault/entries",
            Some(&user_token),
            Some(json!({"password": PASSWORD, "data_type": "core_pii", "data": CORE_PII})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(entry["data_type"], "CORE_PII");

        let (status, data) = call(
            &app,
            Method::POST,
            "/v1/vault/entries/query",
            Some(&user_token),
            Some(json!({"password": PASSWORD})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(data["entries"][0]["data"], CORE_PII);

        let (_org_id, org_token) = approved_org_token(&app).await;

        let (status, request) = call(
            &app,
            Method::POST,
            "/v1/organizations/requests",
            Some(&org_token),
            Some(json!({"owner": did, "data_type": "core_pii", "purpose": "loan application"})),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(request["status"], "un_approved");
        let request_id = request["id"].as_str().unwrap().to_string();
        let pii_token = request["pii_token"].as_str().unwrap().to_string();

        let (status, bundle) = call(
            &app,
            Method::POST,
            "/v1/organizations/detokenize",
            Some(&org_token),
            Some(json!({"token": pii_token})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(bundle["request_id"], request_id.as_str());
        assert_eq!(bundle["user_data"][0]["data_type"], "CORE_PII");
        assert!(!bundle.to_string().contains("Lovelace"));

        let (status, _) = call(
            &app,
            Method::GET,
            &format!("/v1/organizations/requests/{request_id}/data"),
            Some(&org_token),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);

        let (status, inbox) = call(&app, Method::GET, "/v1/consent/requests", Some(&user_token), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(inbox["total"], 1);
        assert!(inbox["requests"][0].get("pii_token").is_none());

        let (status, decided) = call(
            &app,
            Method::POST,
            &format!("/v1/consent/requests/{request_id}/decision"),
            Some(&user_token),
            Some(json!({"decision": "approve", "password": PASSWORD})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(decided["status"], "approved");

        let (status, released) = call(
            &app,
            Method::GET,
            &format!("/v1/organizations/requests/{request_id}/data"),
            Some(&org_token),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(released["entries"][0]["data_type"], "CORE_PII");
        assert_eq!(released["entries"][0]["data"], CORE_PII);

        let (status, _) = call(
            &app,
            Method::POST,
            &format!("/v1/consent/requests/{request_id}/decision"),
            Some(&user_token),
            Some(json!({"decision": "reject"})),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn approve_requires_password() {
        let (state, _temp) = test_state();
        let app = router(state);
        let (user, user_token) = register_and_login_user(&app).await;
        let (_org_id, org_token) = approved_org_token(&app).await;

        let (_, request) = call(
            &app,
            Method::POST,
            "/v1/organizations/requests",
            Some(&org_token),
            Some(json!({"owner": user["did"], "data_types": ["FINANCIALS"], "purpose": "affordability"})),
        )
        .await;
        let request_id = request["id"].as_str().unwrap();

        let (status, _) = call(
            &app,
            Method::POST,
            &format!("/v1/consent/requests/{request_id}/decision"),
            Some(&user_token),
            Some(json!({"decision": "approve"})),
        )
        .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

        let (status, _) = call(
            &app,
            Method::POST,
            &format!("/v1/consent/requests/{request_id}/decision"),
            Some(&user_token),
            Some(json!({"decision": "approve", "password": "wrong password"})),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let (status, rejected) = call(
            &app,
            Method::POST,
            &format!("/v1/consent/requests/{request_id}/decision"),
            Some(&user_token),
            Some(json!({"decision": "reject", "reason": "not now"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(rejected["status"], "rejected");
        assert_eq!(rejected["rejection_reason"], "not now");
    }

    #[tokio::test]
    async fn routes_enforce_roles_and_token_use() {
        let (state, _temp) = test_state();
        let app = router(state);
        let (user, user_token) = register_and_login_user(&app).await;
        let (_org_id, org_token) = approved_org_token(&app).await;

        let (status, _) = call(&app, Method::GET, "/v1/consent/requests", None, None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let (status, _) = call(&app, Method::GET, "/v1/organizations/requests", Some(&user_token), None).await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, _) = call(&app, Method::GET, "/v1/consent/requests", Some(&org_token), None).await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, _) = call(&app, Method::GET, "/v1/admin/organizations", Some(&org_token), None).await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (_, request) = call(
            &app,
            Method::POST,
            "/v1/organizations/requests",
            Some(&org_token),
            Some(json!({"owner": "ada@example.com", "data_type": "CORE_PII", "purpose": "kyc"})),
        )
        .await;
        assert_eq!(request["owner_did"], user["did"]);
        let pii_token = request["pii_token"].as_str().unwrap();
        let (status, body) = call(&app, Method::GET, "/v1/users/me", Some(pii_token), None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error_code"], "wrong_token_use");

        let (status, me) = call(&app, Method::GET, "/v1/users/me", Some(&user_token), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(me["role"], "user");
        assert_eq!(me["user_id"], user["user_id"]);
    }

    #[tokio::test]
    async fn login_failures_are_indistinguishable() {
        let (state, _temp) = test_state();
        let app = router(state);
        register_and_login_user(&app).await;

        let (wrong_status, wrong) = call(
            &app,
            Method::POST,
            "/v1/users/login",
            None,
            Some(json!({"email": "ada@example.com", "password": "not the password"})),
        )
        .await;
        let (unknown_status, unknown) = call(
            &app,
            Method::POST,
            "/v1/users/login",
            None,
            Some(json!({"email": "nobody@example.com", "password": "not the password"})),
        )
        .await;
        assert_eq!(wrong_status, StatusCode::UNAUTHORIZED);
        assert_eq!(wrong_status, unknown_status);
        assert_eq!(wrong, unknown);
    }

    #[tokio::test]
    async fn admin_can_list_and_audit() {
        let (state, _temp) = test_state();
        let app = router(state);
        let (org_id, _org_token) = approved_org_token(&app).await;

        let (_, admin) = call(
            &app,
            Method::POST,
            "/v1/admin/session",
            None,
            Some(json!({"api_key": TEST_ADMIN_KEY})),
        )
        .await;
        let admin_token = admin["access_token"].as_str().unwrap();

        let (status, list) = call(&app, Method::GET, "/v1/admin/organizations", Some(admin_token), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(list["total"], 1);
        assert_eq!(list["organizations"][0]["org_id"], org_id.as_str());

        let (status, audit) = call(
            &app,
            Method::GET,
            "/v1/admin/audit/events?event_type=organization_status_changed",
            Some(admin_token),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(audit["total"], 1);
        assert_eq!(audit["events"][0]["resource_id"], org_id.as_str());

        let (status, _) = call(
            &app,
            Method::GET,
            "/v1/admin/audit/events?start_date=yesterday",
            Some(admin_token),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = call(
            &app,
            Method::PUT,
            &format!("/v1/admin/organizations/{org_id}/status"),
            Some(admin_token),
            Some(json!({"status": "un_approved"})),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn audit_paging_tolerates_huge_offsets() {
        let (state, _temp) = test_state();
        let app = router(state);
        approved_org_token(&app).await;

        let (_, admin) = call(
            &app,
            Method::POST,
            "/v1/admin/session",
            None,
            Some(json!({"api_key": TEST_ADMIN_KEY})),
        )
        .await;
        let admin_token = admin["access_token"].as_str().unwrap();

        let (status, audit) = call(
            &app,
            Method::GET,
            &format!("/v1/admin/audit/events?offset={}&limit=1000", usize::MAX),
            Some(admin_token),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(audit["events"].as_array().unwrap().len(), 0);
        assert_eq!(audit["has_more"], false);
        assert!(audit["total"].as_u64().unwrap() > 0);
    }

    #[tokio::test]
    async fn user_profile_lifecycle() {
        let (state, _temp) = test_state();
        let app = router(state);
        let (user, token) = register_and_login_user(&app).await;
        let uri = "/v1/users/me/profile";

        let (status, _) = call(&app, Method::GET, uri, Some(&token), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, _) = call(
            &app,
            Method::POST,
            uri,
            Some(&token),
            Some(json!({"date_of_birth": "10 December 1815"})),
        )
        .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

        let body = json!({"first_name": "Ada", "last_name": "Lovelace", "date_of_birth": "1815-12-10"});
        let (status, created) = call(&app, Method::POST, uri, Some(&token), Some(body.clone())).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(created["user_id"], user["user_id"]);
        assert_eq!(created["last_name"], "Lovelace");

        let (status, _) = call(&app, Method::POST, uri, Some(&token), Some(body)).await;
        assert_eq!(status, StatusCode::CONFLICT);

        let (status, updated) = call(
            &app,
            Method::PATCH,
            uri,
            Some(&token),
            Some(json!({"last_name": "", "address": "London"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(updated["first_name"], "Ada");
        assert_eq!(updated["last_name"], Value::Null);
        assert_eq!(updated["address"], "London");

        let (status, read) = call(&app, Method::GET, uri, Some(&token), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(read["address"], "London");

        // Organizations have no profile surface.
        let (_, org_token) = approved_org_token(&app).await;
        let (status, _) = call(&app, Method::GET, uri, Some(&org_token), None).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn organization_updates_its_contact() {
        let (state, _temp) = test_state();
        let app = router(state);
        let (_, token) = approved_org_token(&app).await;

        let (status, _) = call(
            &app,
            Method::PUT,
            "/v1/organizations/me",
            Some(&token),
            Some(json!({"contact_email": "not-an-email"})),
        )
        .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

        let (status, org) = call(
            &app,
            Method::PUT,
            "/v1/organizations/me",
            Some(&token),
            Some(json!({"contact_name": "Grace Hopper", "contact_email": "risk@acme.io"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(org["contact_name"], "Grace Hopper");
        assert_eq!(org["contact_email"], "risk@acme.io");

        let (status, _) = call(
            &app,
            Method::POST,
            "/v1/organizations/login",
            None,
            Some(json!({"email": "risk@acme.io", "password": ORG_PASSWORD})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let (status, _) = call(
            &app,
            Method::POST,
            "/v1/organizations/login",
            None,
            Some(json!({"email": "ops@acme.io", "password": ORG_PASSWORD})),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn health_and_openapi_are_served() {
        let (state, _temp) = test_state();
        let app = router(state);

        let (status, body) = call(&app, Method::GET, "/health/ready", None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["checks"]["ledger"], "ok");

        let (status, body) = call(&app, Method::GET, "/health/live", None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");

        let (status, doc) = call(&app, Method::GET, "/api-doc/openapi.json", None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert!(doc["paths"]
            .get("/v1/organizations/requests/{request_id}/data")
            .is_some());
    }
}
