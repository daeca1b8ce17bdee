//! Test assertion helpers - fluent API for verifying responses
#![allow(dead_code)] // Test utilities may not all be used in every test

use axum::http::StatusCode;

use super::actions::TestResponse;

// ============================================================================
// Assertion Helpers
// ============================================================================

pub struct ResponseAssertion<'a> {
    response: &'a TestResponse,
}

impl<'a> ResponseAssertion<'a> {
    pub fn of(response: &'a TestResponse) -> Self {
        Self { response }
    }

    pub fn has_status(self, expected: StatusCode) -> Self {
        assert_eq!(
            self.response.status, expected,
            "unexpected status, body: {}",
            self.response.json
        );
        self
    }

    /// Error bodies carry the numeric status next to the message
    pub fn is_error(self, expected: StatusCode, message: &str) -> Self {
        let this = self.has_status(expected);
        assert_eq!(this.response.json["status"], expected.as_u16());
        assert_eq!(this.response.json["message"], message);
        this
    }

    pub fn has_message(self, message: &str) -> Self {
        assert_eq!(self.response.json["message"], message);
        self
    }

    pub fn sets_auth_cookies(self) -> Self {
        for name in ["access", "refresh"] {
            let cookie = self
                .response
                .raw_cookies
                .iter()
                .find(|c| c.starts_with(&format!("{}=", name)))
                .unwrap_or_else(|| panic!("missing {} cookie", name));
            assert!(cookie.contains("HttpOnly"));
            assert!(cookie.contains("SameSite=Lax"));
            assert!(cookie.contains("Path=/"));
            assert!(!self.response.cookies[name].is_empty());
        }
        self
    }

    pub fn sets_no_cookies(self) -> Self {
        assert!(
            self.response.raw_cookies.is_empty(),
            "unexpected cookies: {:?}",
            self.response.raw_cookies
        );
        self
    }

    pub fn clears_auth_cookies(self) -> Self {
        for name in ["access", "refresh"] {
            assert_eq!(
                self.response.cookie(name),
                Some(""),
                "{} cookie was not cleared",
                name
            );
        }
        self
    }
}
