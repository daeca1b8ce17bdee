use axum::{
    body::Body,
    http::{
        header::{ACCEPT_LANGUAGE, CONTENT_TYPE},
        Method, Request, StatusCode,
    },
};
use chrono::{Duration, Utc};
use serde_json::json;

use storefront::{
    i18n::{Locale, Phrase},
    TokenKind,
};

mod utils;

use utils::*;

#[tokio::test]
async fn test_signup_then_verify_email() {
    let setup = TestSetupBuilder::new().build();

    let response = setup.register("jane@example.com").await;
    ResponseAssertion::of(&response)
        .has_status(StatusCode::CREATED)
        .sets_no_cookies();
    assert_eq!(response.json["user"]["isEmailVerified"], false);

    let token = setup.mailed_token("jane@example.com").await;
    let response = setup
        .post_json("/api/auth/verify-email", json!({ "token": token }))
        .await;
    ResponseAssertion::of(&response)
        .has_status(StatusCode::OK)
        .has_message("Email verified successfully.");
    assert_eq!(response.json["user"]["isEmailVerified"], true);

    // The token is single use
    let response = setup
        .post_json("/api/auth/verify-email", json!({ "token": token }))
        .await;
    ResponseAssertion::of(&response).is_error(StatusCode::BAD_REQUEST, "Email verification failed");
}

#[tokio::test]
async fn test_expired_access_token_then_refresh() {
    let setup = TestSetupBuilder::new().build();
    let signin = setup.signed_in_user("jane@example.com").await;
    let user_id: uuid::Uuid = signin.json["user"]["id"].as_str().unwrap().parse().unwrap();

    // An access token issued long enough ago to be past its lifetime
    let issuer = setup.state.token_service.issuer();
    let expired = issuer
        .issue_at(
            user_id,
            TokenKind::Access,
            Utc::now() - issuer.lifetime(TokenKind::Access) - Duration::minutes(1),
        )
        .unwrap();
    let stale_cookies = format!(
        "access={}; refresh={}",
        expired.token,
        signin.cookie("refresh").unwrap()
    );

    let response = setup.send_verification_email(&stale_cookies).await;
    ResponseAssertion::of(&response).has_status(StatusCode::UNAUTHORIZED);

    let refreshed = setup
        .post_with_cookies("/api/auth/tokens", json!({}), &stale_cookies)
        .await;
    ResponseAssertion::of(&refreshed)
        .has_status(StatusCode::OK)
        .sets_auth_cookies();
    assert_ne!(refreshed.cookie("refresh"), signin.cookie("refresh"));

    let response = setup
        .send_verification_email(&refreshed.cookie_header())
        .await;
    ResponseAssertion::of(&response)
        .has_status(StatusCode::OK)
        .has_message("Verification email sent successfully.");

    // The rotated-out refresh token is gone
    let reuse = setup
        .post_with_cookies("/api/auth/tokens", json!({}), &stale_cookies)
        .await;
    ResponseAssertion::of(&reuse).is_error(StatusCode::UNAUTHORIZED, "Please authenticate");
}

#[tokio::test]
async fn test_duplicate_registration_conflicts() {
    let setup = TestSetupBuilder::new().build();

    ResponseAssertion::of(&setup.register("jane@example.com").await)
        .has_status(StatusCode::CREATED);
    ResponseAssertion::of(&setup.register("Jane@Example.com").await)
        .is_error(StatusCode::CONFLICT, "Email already taken");

    assert_eq!(setup.users.user_count().await, 1);
}

#[tokio::test]
async fn test_invalid_registration_is_rejected() {
    let setup = TestSetupBuilder::new().build();

    let response = setup.register("not-an-email").await;
    ResponseAssertion::of(&response)
        .is_error(StatusCode::BAD_REQUEST, "email: Please provide a valid email");
    assert_eq!(setup.users.user_count().await, 0);
}

#[tokio::test]
async fn test_used_reset_token_leaves_user_unchanged() {
    let setup = TestSetupBuilder::new().build();
    setup.register("jane@example.com").await;

    let response = setup
        .post_json(
            "/api/auth/forgot-password",
            json!({ "email": "jane@example.com" }),
        )
        .await;
    ResponseAssertion::of(&response).has_status(StatusCode::OK);
    let token = setup.mailed_token("jane@example.com").await;

    let response = setup
        .post_json(
            "/api/auth/reset-password",
            json!({ "token": token, "password": "newpassword2" }),
        )
        .await;
    ResponseAssertion::of(&response)
        .has_status(StatusCode::OK)
        .has_message("Password has been reset successfully.");

    let response = setup
        .post_json(
            "/api/auth/reset-password",
            json!({ "token": token, "password": "otherpassword3" }),
        )
        .await;
    ResponseAssertion::of(&response).is_error(StatusCode::BAD_REQUEST, "Password reset failed");

    ResponseAssertion::of(&setup.login("jane@example.com", "newpassword2").await)
        .has_status(StatusCode::OK);
    ResponseAssertion::of(&setup.login("jane@example.com", "otherpassword3").await)
        .is_error(StatusCode::UNAUTHORIZED, "Incorrect email or password");
}

#[tokio::test]
async fn test_forgot_password_does_not_reveal_accounts() {
    let setup = TestSetupBuilder::new().build();
    setup.register("jane@example.com").await;

    let known = setup
        .post_json(
            "/api/auth/forgot-password",
            json!({ "email": "jane@example.com" }),
        )
        .await;
    let unknown = setup
        .post_json(
            "/api/auth/forgot-password",
            json!({ "email": "nobody@example.com" }),
        )
        .await;

    assert_eq!(known.status, unknown.status);
    assert_eq!(known.json, unknown.json);
    assert!(setup.mailer.last_sent_to("nobody@example.com").await.is_none());
}

#[tokio::test]
async fn test_password_change_invalidates_old_sessions() {
    let setup = TestSetupBuilder::new().build();
    let signin = setup.signed_in_user("jane@example.com").await;
    let old_cookies = signin.cookie_header();

    let response = setup
        .change_password(&old_cookies, "wrongpassword1", "newpassword2")
        .await;
    ResponseAssertion::of(&response)
        .is_error(StatusCode::UNAUTHORIZED, "Your current password is wrong.");

    let changed = setup
        .change_password(&old_cookies, PASSWORD, "newpassword2")
        .await;
    ResponseAssertion::of(&changed)
        .has_status(StatusCode::OK)
        .sets_auth_cookies();

    let response = setup.send_verification_email(&old_cookies).await;
    ResponseAssertion::of(&response).is_error(
        StatusCode::UNAUTHORIZED,
        "User recently changed password! Please login again!",
    );

    let response = setup
        .post_with_cookies("/api/auth/tokens", json!({}), &old_cookies)
        .await;
    ResponseAssertion::of(&response).has_status(StatusCode::UNAUTHORIZED);

    let response = setup
        .send_verification_email(&changed.cookie_header())
        .await;
    ResponseAssertion::of(&response).has_status(StatusCode::OK);
}

#[tokio::test]
async fn test_logout_twice_succeeds() {
    let setup = TestSetupBuilder::new().build();
    let signin = setup.signed_in_user("jane@example.com").await;
    let cookies = signin.cookie_header();

    for _ in 0..2 {
        let response = setup
            .post_with_cookies("/api/auth/logout", json!({}), &cookies)
            .await;
        ResponseAssertion::of(&response)
            .has_status(StatusCode::OK)
            .clears_auth_cookies();
    }

    let response = setup
        .post_with_cookies("/api/auth/tokens", json!({}), &cookies)
        .await;
    ResponseAssertion::of(&response).has_status(StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_protected_route_without_cookie() {
    let setup = TestSetupBuilder::new().build();

    let response = setup.send_verification_email("").await;
    ResponseAssertion::of(&response).is_error(
        StatusCode::UNAUTHORIZED,
        "You are not logged in! Please login to get access.",
    );
}

#[tokio::test]
async fn test_verified_user_cannot_request_another_verification() {
    let setup = TestSetupBuilder::new().build();
    let signin = setup.signed_in_user("jane@example.com").await;
    let token = setup.mailed_token("jane@example.com").await;
    setup
        .post_json("/api/auth/verify-email", json!({ "token": token }))
        .await;

    let response = setup
        .send_verification_email(&signin.cookie_header())
        .await;
    ResponseAssertion::of(&response).is_error(StatusCode::BAD_REQUEST, "Email is already verified");
}

#[tokio::test]
async fn test_unknown_route_returns_404() {
    let setup = TestSetupBuilder::new().build();

    let response = setup.get("/api/products").await;
    ResponseAssertion::of(&response).is_error(
        StatusCode::NOT_FOUND,
        "Can't find /api/products on this server!",
    );
}

#[tokio::test]
async fn test_arabic_locale() {
    let setup = TestSetupBuilder::new().build();

    let response = setup
        .register_with("jane@example.com", Some("ar-EG,ar;q=0.9"))
        .await;
    ResponseAssertion::of(&response)
        .has_status(StatusCode::CREATED)
        .has_message(Locale::Ar.t(Phrase::AccountCreated));
}

#[tokio::test]
async fn test_errors_follow_the_request_locale() {
    let setup = TestSetupBuilder::new().build();
    setup.register("jane@example.com").await;

    let request = Request::builder()
        .method(Method::POST)
        .uri("/api/auth/login")
        .header(CONTENT_TYPE, "application/json")
        .header(ACCEPT_LANGUAGE, "ar")
        .body(Body::from(
            json!({ "email": "jane@example.com", "password": "wrongpassword1" }).to_string(),
        ))
        .unwrap();
    let response = setup.send(request).await;

    ResponseAssertion::of(&response).is_error(
        StatusCode::UNAUTHORIZED,
        &Locale::Ar
            .translate_error("Incorrect email or password")
            .unwrap(),
    );
}

#[tokio::test]
async fn test_stale_cookie_does_not_shadow_body_refresh_token() {
    let setup = TestSetupBuilder::new().build();
    let first = setup.signed_in_user("jane@example.com").await;
    let second = setup.login("jane@example.com", PASSWORD).await;

    // Rotate the first session away so its cookie goes stale
    setup
        .post_with_cookies("/api/auth/tokens", json!({}), &first.cookie_header())
        .await;

    let response = setup
        .post_with_cookies(
            "/api/auth/tokens",
            json!({ "refreshToken": second.cookie("refresh").unwrap() }),
            &first.cookie_header(),
        )
        .await;
    ResponseAssertion::of(&response)
        .has_status(StatusCode::OK)
        .sets_auth_cookies();
}

#[tokio::test]
async fn test_password_change_keeps_email_verification() {
    let setup = TestSetupBuilder::new().build();
    let signin = setup.signed_in_user("jane@example.com").await;
    let token = setup.mailed_token("jane@example.com").await;
    setup
        .post_json("/api/auth/verify-email", json!({ "token": token }))
        .await;

    let changed = setup
        .change_password(&signin.cookie_header(), PASSWORD, "newpassword2")
        .await;
    ResponseAssertion::of(&changed).has_status(StatusCode::OK);
    assert_eq!(changed.json["user"]["isEmailVerified"], true);
}

#[tokio::test]
async fn test_failed_requests_are_rate_limited_in_production() {
    let setup = TestSetupBuilder::new()
        .in_production()
        .with_rate_limit(3)
        .build();

    for _ in 0..3 {
        let response = setup.login("jane@example.com", "wrongpassword1").await;
        ResponseAssertion::of(&response).has_status(StatusCode::UNAUTHORIZED);
    }

    let response = setup.login("jane@example.com", "wrongpassword1").await;
    ResponseAssertion::of(&response).is_error(
        StatusCode::TOO_MANY_REQUESTS,
        "Too many requests from this IP, please try again later.",
    );
}
