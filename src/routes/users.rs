//! User profile routes
//!
//! Username/password checks, registration, password verification and
//! profile updates.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use secrecy::SecretString;
use std::sync::Arc;

use crate::api::form::ProfileForm;
use crate::api::{Created, MessageResponse};
use crate::app::AppState;
use crate::domain::password::{self, PasswordAssessment};
use crate::domain::{
    validation, CandidateProfile, CheckPasswordRequest, PasswordChange, ProfileEnvelope,
    ProfilePatch, UsernameAvailability, VerifyPasswordRequest,
};
use crate::error::{ApiError, ApiResult};
use crate::services::ServiceError;

/// GET /api/users/check-username/:username
pub async fn check_username(
    State(state): State<Arc<AppState>>,
    Path(username): Path<String>,
) -> ApiResult<(StatusCode, Json<UsernameAvailability>)> {
    if let Some(message) = validation::username_violations(&username).first() {
        return Ok((
            StatusCode::BAD_REQUEST,
            Json(UsernameAvailability {
                available: false,
                message: message.to_string(),
            }),
        ));
    }

    let taken = state
        .profiles
        .username_exists(&username)
        .await
        .map_err(ServiceError::from)?;

    let message = if taken {
        "Username is already taken"
    } else {
        "Username is available"
    };

    Ok((
        StatusCode::OK,
        Json(UsernameAvailability {
            available: !taken,
            message: message.to_string(),
        }),
    ))
}

/// POST /api/users/check-password
///
/// Always answers 200; `valid` and `errors` report the policy result.
pub async fn check_password(Json(req): Json<CheckPasswordRequest>) -> Json<PasswordAssessment> {
    Json(password::assess(&req.password))
}

/// POST /api/users/register
pub async fn register(
    State(state): State<Arc<AppState>>,
    form: ProfileForm,
) -> ApiResult<Created<ProfileEnvelope>> {
    let ProfileForm { fields, photo } = form;

    let record = state
        .registration
        .register(CandidateProfile::from_fields(fields), photo)
        .await?;

    Ok(Created(ProfileEnvelope::new(
        "User registered successfully",
        record,
    )))
}

/// POST /api/users/verify-password
pub async fn verify_password(
    State(state): State<Arc<AppState>>,
    Json(req): Json<VerifyPasswordRequest>,
) -> ApiResult<MessageResponse> {
    if req.username.is_empty() || req.current_password.is_empty() {
        return Err(ApiError::bad_request(
            "Username and current password are required",
        ));
    }

    state
        .updates
        .verify_current_password(&req.username, &SecretString::new(req.current_password))
        .await?;

    Ok(MessageResponse::new("Password verified successfully"))
}

/// PUT /api/users/:username
pub async fn update_profile(
    State(state): State<Arc<AppState>>,
    Path(username): Path<String>,
    form: ProfileForm,
) -> ApiResult<Json<ProfileEnvelope>> {
    let ProfileForm { mut fields, photo } = form;
    let password_change = PasswordChange::from_fields(&mut fields);
    let patch = ProfilePatch::from_fields(&mut fields);

    let record = state
        .updates
        .update(&username, patch, password_change, photo)
        .await?;

    Ok(Json(ProfileEnvelope::new(
        "Profile updated successfully",
        record,
    )))
}

#[cfg(test)]
mod tests {
    use axum::{
        body::{to_bytes, Body},
        http::{Method, Request, StatusCode},
        Router,
    };
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use crate::app::create_app;
    use crate::services::files::stored_files;
    use crate::test_support::TestHarness;

    const BOUNDARY: &str = "profile-test-boundary";

    fn multipart_body(fields: &[(&str, &str)], photo: Option<(&str, &[u8])>) -> Vec<u8> {
        let mut body = Vec::new();
        for (name, value) in fields {
            body.extend_from_slice(
                format!(
                    "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
                )
                .as_bytes(),
            );
        }
        if let Some((content_type, bytes)) = photo {
            body.extend_from_slice(
                format!(
                    "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"profilePhoto\"; filename=\"me.img\"\r\nContent-Type: {content_type}\r\n\r\n"
                )
                .as_bytes(),
            );
            body.extend_from_slice(bytes);
            body.extend_from_slice(b"\r\n");
        }
        body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
        body
    }

    fn multipart_request(method: Method, uri: &str, body: Vec<u8>) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .header(
                "content-type",
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .body(Body::from(body))
            .unwrap()
    }

    fn json_request(method: Method, uri: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(serde_json::to_vec(&body).unwrap()))
            .unwrap()
    }

    async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, body)
    }

    fn profile_fields(username: &str) -> Vec<(&str, &str)> {
        vec![
            ("username", username),
            ("password", "hunter2!x"),
            ("profession", "Developer"),
            ("addressLine1", "1 Main St"),
            ("country", "US"),
            ("state", "California"),
            ("city", "San Diego"),
            ("gender", "Female"),
            ("newsletter", "true"),
        ]
    }

    #[tokio::test]
    async fn register_with_photo_returns_sanitized_profile() {
        let harness = TestHarness::new().await;
        let app = create_app(harness.state.clone());

        let body = multipart_body(&profile_fields("alice"), Some(("image/png", b"\x89PNGbytes")));
        let (status, body) = send(&app, multipart_request(Method::POST, "/api/users/register", body)).await;

        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["message"], "User registered successfully");
        let user = &body["user"];
        assert_eq!(user["username"], "alice");
        assert_eq!(user["subscriptionPlan"], "Basic");
        assert_eq!(user["newsletter"], true);
        assert!(user.get("credentialHash").is_none());
        assert!(user.get("password").is_none());
        assert!(!body.to_string().contains("argon2"));

        let photo = user["profilePhoto"].as_str().unwrap();
        let served = app
            .clone()
            .oneshot(Request::builder().uri(photo).body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(served.status(), StatusCode::OK);
        let bytes = to_bytes(served.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&bytes[..], b"\x89PNGbytes");
    }

    #[tokio::test]
    async fn register_accepts_json() {
        let harness = TestHarness::new().await;
        let app = create_app(harness.state.clone());

        let request = json_request(
            Method::POST,
            "/api/users/register",
            json!({
                "username": "bob_json",
                "password": "hunter2!x",
                "profession": "Entrepreneur",
                "companyName": "Acme",
                "addressLine1": "1 Main St",
                "country": "US",
                "state": "Texas",
                "city": "Austin",
                "subscriptionPlan": "Enterprise",
                "newsletter": false,
                "gender": "Other",
                "customGender": "Agender",
            }),
        );
        let (status, body) = send(&app, request).await;

        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["user"]["companyName"], "Acme");
        assert_eq!(body["user"]["customGender"], "Agender");
        assert_eq!(body["user"]["profilePhoto"], Value::Null);
    }

    #[tokio::test]
    async fn register_reports_all_violations() {
        let harness = TestHarness::new().await;
        let app = create_app(harness.state.clone());

        let body = multipart_body(
            &[("username", "a b"), ("password", "short"), ("profession", "Entrepreneur")],
            Some(("image/jpeg", b"jpeg")),
        );
        let (status, body) = send(&app, multipart_request(Method::POST, "/api/users/register", body)).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "VALIDATION_FAILED");
        let fields: Vec<&str> = body["errors"]
            .as_array()
            .unwrap()
            .iter()
            .map(|e| e["field"].as_str().unwrap())
            .collect();
        assert!(fields.contains(&"username"));
        assert!(fields.contains(&"password"));
        assert!(fields.contains(&"companyName"));
        assert!(fields.contains(&"gender"));
        assert!(stored_files(harness.upload_dir()).is_empty());
    }

    #[tokio::test]
    async fn register_rejects_gif_with_message() {
        let harness = TestHarness::new().await;
        let app = create_app(harness.state.clone());

        let body = multipart_body(&profile_fields("alice"), Some(("image/gif", b"GIF89a")));
        let (status, body) = send(&app, multipart_request(Method::POST, "/api/users/register", body)).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["errors"][0]["field"], "profilePhoto");
        assert_eq!(body["errors"][0]["message"], "Only JPG and PNG files are allowed.");
        assert!(stored_files(harness.upload_dir()).is_empty());
    }

    #[tokio::test]
    async fn register_rejects_oversized_photo() {
        let harness = TestHarness::new().await;
        let app = create_app(harness.state.clone());
        let big = vec![0u8; harness.files.policy().max_bytes + 1];

        let body = multipart_body(&profile_fields("alice"), Some(("image/png", &big)));
        let (status, body) = send(&app, multipart_request(Method::POST, "/api/users/register", body)).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["errors"][0]["field"], "profilePhoto");
        assert!(stored_files(harness.upload_dir()).is_empty());
    }

    #[tokio::test]
    async fn duplicate_registration_is_rejected() {
        let harness = TestHarness::new().await;
        let app = create_app(harness.state.clone());

        let first = multipart_body(&profile_fields("alice"), None);
        let (status, _) = send(&app, multipart_request(Method::POST, "/api/users/register", first)).await;
        assert_eq!(status, StatusCode::CREATED);

        let second = multipart_body(&profile_fields("alice"), None);
        let (status, body) = send(&app, multipart_request(Method::POST, "/api/users/register", second)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "CONFLICT");
        assert_eq!(body["message"], "Username already taken");
    }

    #[tokio::test]
    async fn check_username_reports_format_and_availability() {
        let harness = TestHarness::new().await;
        let app = create_app(harness.state.clone());
        let body = multipart_body(&profile_fields("alice"), None);
        send(&app, multipart_request(Method::POST, "/api/users/register", body)).await;

        let get = |uri: &str| Request::builder().uri(uri).body(Body::empty()).unwrap();

        let (status, body) = send(&app, get("/api/users/check-username/abc")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["available"], false);
        assert_eq!(body["message"], "Username must be between 4 and 20 characters");

        let (status, body) = send(&app, get("/api/users/check-username/al%20ice")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], "Username cannot contain spaces");

        let (status, body) = send(&app, get("/api/users/check-username/alice")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["available"], false);

        let (status, body) = send(&app, get("/api/users/check-username/carol")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["available"], true);
        assert_eq!(body["message"], "Username is available");
    }

    #[tokio::test]
    async fn user_routes_are_mounted_under_api() {
        let harness = TestHarness::new().await;
        let app = create_app(harness.state.clone());
        let check = |uri: &str| json_request(Method::POST, uri, json!({"password": "abc"}));

        let (status, _) = send(&app, check("/api/users/check-password")).await;
        assert_eq!(status, StatusCode::OK);

        let (status, _) = send(&app, check("/users/check-password")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn check_password_scores_strength() {
        let harness = TestHarness::new().await;
        let app = create_app(harness.state.clone());

        let (status, body) = send(
            &app,
            json_request(Method::POST, "/api/users/check-password", json!({"password": "abc"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["strength"], "weak");
        assert_eq!(body["valid"], false);

        let (_, body) = send(
            &app,
            json_request(Method::POST, "/api/users/check-password", json!({"password": "Abcdef12!@#$"})),
        )
        .await;
        assert_eq!(body["strength"], "strong");
        assert_eq!(body["score"], 6);
        assert_eq!(body["valid"], true);
    }

    #[tokio::test]
    async fn verify_password_statuses() {
        let harness = TestHarness::new().await;
        let app = create_app(harness.state.clone());
        let body = multipart_body(&profile_fields("alice"), None);
        send(&app, multipart_request(Method::POST, "/api/users/register", body)).await;

        let verify = |username: &str, password: &str| {
            json_request(
                Method::POST,
                "/api/users/verify-password",
                json!({"username": username, "currentPassword": password}),
            )
        };

        let (status, body) = send(&app, verify("alice", "hunter2!x")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["message"], "Password verified successfully");

        let (status, body) = send(&app, verify("alice", "nope")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], "Current password is incorrect");

        let (status, _) = send(&app, verify("ghost", "hunter2!x")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, body) = send(&app, verify("", "")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], "Username and current password are required");
    }

    #[tokio::test]
    async fn update_replaces_photo_and_password() {
        let harness = TestHarness::new().await;
        let app = create_app(harness.state.clone());
        let body = multipart_body(&profile_fields("alice"), Some(("image/png", b"old")));
        let (_, registered) = send(&app, multipart_request(Method::POST, "/api/users/register", body)).await;
        let old_photo = registered["user"]["profilePhoto"].as_str().unwrap().to_string();

        let body = multipart_body(
            &[
                ("city", "Fresno"),
                ("currentPassword", "hunter2!x"),
                ("newPassword", "n3w!secret"),
                ("username", "mallory"),
            ],
            Some(("image/jpeg", b"new")),
        );
        let (status, body) = send(&app, multipart_request(Method::PUT, "/api/users/alice", body)).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["message"], "Profile updated successfully");
        assert_eq!(body["user"]["username"], "alice");
        assert_eq!(body["user"]["city"], "Fresno");
        let new_photo = body["user"]["profilePhoto"].as_str().unwrap();
        assert!(new_photo.ends_with(".jpg"));
        assert!(!harness.files.exists(&old_photo).await);
        assert!(harness.files.exists(new_photo).await);

        let (status, _) = send(
            &app,
            json_request(
                Method::POST,
                "/api/users/verify-password",
                json!({"username": "alice", "currentPassword": "n3w!secret"}),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn update_unknown_user_is_not_found() {
        let harness = TestHarness::new().await;
        let app = create_app(harness.state.clone());

        let body = multipart_body(&[("city", "Fresno")], Some(("image/png", b"new")));
        let (status, body) = send(&app, multipart_request(Method::PUT, "/api/users/ghost", body)).await;

        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["message"], "User not found");
        assert!(stored_files(harness.upload_dir()).is_empty());
    }

    #[tokio::test]
    async fn update_with_wrong_current_password_is_rejected() {
        let harness = TestHarness::new().await;
        let app = create_app(harness.state.clone());
        let body = multipart_body(&profile_fields("alice"), None);
        send(&app, multipart_request(Method::POST, "/api/users/register", body)).await;

        let request = json_request(
            Method::PUT,
            "/api/users/alice",
            json!({"newPassword": "n3w!secret", "currentPassword": "wrong"}),
        );
        let (status, body) = send(&app, request).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "INVALID_CREDENTIALS");
    }

    #[tokio::test]
    async fn persistence_failure_is_a_server_error_without_details() {
        let harness = TestHarness::with_failing_writes().await;
        let app = create_app(harness.state.clone());

        let body = multipart_body(&profile_fields("alice"), Some(("image/png", b"photo")));
        let (status, body) = send(&app, multipart_request(Method::POST, "/api/users/register", body)).await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["message"], "An internal error occurred");
        assert!(stored_files(harness.upload_dir()).is_empty());
    }
}
