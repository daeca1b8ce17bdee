#![allow(dead_code)] // Not every test file uses every helper

use axum::{
    body::Body,
    http::{
        header::{ACCEPT_LANGUAGE, CONTENT_TYPE, COOKIE, SET_COOKIE},
        Method, Request, StatusCode,
    },
};
use serde_json::{json, Value};
use std::collections::HashMap;
use tower::ServiceExt; // for `oneshot`

use super::setup::TestSetup;

pub const PASSWORD: &str = "password1";

// ============================================================================
// Response Capture
// ============================================================================

pub struct TestResponse {
    pub status: StatusCode,
    pub json: Value,
    /// Cookies set by the response, by name
    pub cookies: HashMap<String, String>,
    pub raw_cookies: Vec<String>,
}

impl TestResponse {
    pub fn cookie(&self, name: &str) -> Option<&str> {
        self.cookies.get(name).map(String::as_str)
    }

    /// `Cookie` request header carrying the auth cookies from this response
    pub fn cookie_header(&self) -> String {
        ["access", "refresh"]
            .iter()
            .filter_map(|name| self.cookie(name).map(|value| format!("{}={}", name, value)))
            .collect::<Vec<_>>()
            .join("; ")
    }
}

// ============================================================================
// Action Helpers
// ============================================================================

impl TestSetup {
    /// Send a request through the full router and capture the response
    pub async fn send(&self, request: Request<Body>) -> TestResponse {
        let response = self.app.clone().oneshot(request).await.unwrap();
        let status = response.status();

        let raw_cookies: Vec<String> = response
            .headers()
            .get_all(SET_COOKIE)
            .iter()
            .map(|value| value.to_str().unwrap().to_string())
            .collect();
        let cookies = raw_cookies
            .iter()
            .filter_map(|cookie| {
                let pair = cookie.split(';').next()?;
                let (name, value) = pair.split_once('=')?;
                Some((name.trim().to_string(), value.trim().to_string()))
            })
            .collect();

        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json = serde_json::from_slice(&body).unwrap_or(Value::Null);

        TestResponse {
            status,
            json,
            cookies,
            raw_cookies,
        }
    }

    pub async fn request_json(
        &self,
        method: Method,
        uri: &str,
        body: Value,
        cookies: Option<&str>,
    ) -> TestResponse {
        let mut builder = Request::builder()
            .method(method)
            .uri(uri)
            .header(CONTENT_TYPE, "application/json");
        if let Some(cookies) = cookies {
            builder = builder.header(COOKIE, cookies);
        }
        self.send(builder.body(Body::from(body.to_string())).unwrap())
            .await
    }

    pub async fn post_json(&self, uri: &str, body: Value) -> TestResponse {
        self.request_json(Method::POST, uri, body, None).await
    }

    pub async fn post_with_cookies(&self, uri: &str, body: Value, cookies: &str) -> TestResponse {
        self.request_json(Method::POST, uri, body, Some(cookies))
            .await
    }

    pub async fn get(&self, uri: &str) -> TestResponse {
        self.send(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
    }

    // ============================================================================
    // Convenience Action Methods
    // ============================================================================

    /// Register through the multipart endpoint
    pub async fn register(&self, email: &str) -> TestResponse {
        self.register_with(email, None).await
    }

    pub async fn register_with(&self, email: &str, locale: Option<&str>) -> TestResponse {
        let boundary = "storefront-test-boundary";
        let fields = [
            ("name", "Jane Doe"),
            ("email", email),
            ("password", PASSWORD),
            ("passwordConfirmation", PASSWORD),
        ];

        let mut body = String::new();
        for (name, value) in fields {
            body.push_str(&format!(
                "--{boundary}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
            ));
        }
        body.push_str(&format!("--{boundary}--\r\n"));

        let mut builder = Request::builder()
            .method(Method::POST)
            .uri("/api/auth/register")
            .header(
                CONTENT_TYPE,
                format!("multipart/form-data; boundary={boundary}"),
            );
        if let Some(locale) = locale {
            builder = builder.header(ACCEPT_LANGUAGE, locale);
        }
        self.send(builder.body(Body::from(body)).unwrap()).await
    }

    pub async fn login(&self, email: &str, password: &str) -> TestResponse {
        self.post_json(
            "/api/auth/login",
            json!({ "email": email, "password": password }),
        )
        .await
    }

    /// Register and sign in, returning the signin response
    pub async fn signed_in_user(&self, email: &str) -> TestResponse {
        assert_eq!(self.register(email).await.status, StatusCode::CREATED);
        let response = self.login(email, PASSWORD).await;
        assert_eq!(response.status, StatusCode::OK);
        response
    }

    pub async fn change_password(
        &self,
        cookies: &str,
        current_password: &str,
        password: &str,
    ) -> TestResponse {
        self.request_json(
            Method::PATCH,
            "/api/auth/change-password",
            json!({
                "currentPassword": current_password,
                "password": password,
                "passwordConfirmation": password,
            }),
            Some(cookies),
        )
        .await
    }

    pub async fn send_verification_email(&self, cookies: &str) -> TestResponse {
        self.post_with_cookies("/api/auth/send-verification-email", json!({}), cookies)
            .await
    }

    /// Token from the newest email sent to `to`
    pub async fn mailed_token(&self, to: &str) -> String {
        self.mailer
            .last_sent_to(to)
            .await
            .and_then(|message| message.token().map(str::to_string))
            .expect("no email with a token was sent")
    }
}
