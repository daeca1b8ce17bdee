//! Per-request locale, response phrases and error localization.
//!
//! The locale comes from the `Accept-Language` header: a primary tag of `ar`
//! selects Arabic, anything else falls back to English. Error messages are
//! written in English and translated on the way out by [`localize_errors`].

use async_trait::async_trait;
use axum::{
    body::Body,
    extract::{FromRequestParts, Request},
    http::{
        header::{ACCEPT_LANGUAGE, CONTENT_LENGTH},
        request::Parts,
    },
    middleware::Next,
    response::Response,
};
use serde_json::json;
use std::convert::Infallible;
use tracing::debug;

use crate::shared::ErrorMessage;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Locale {
    #[default]
    En,
    Ar,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phrase {
    AccountCreated,
    SignedIn,
    LoggedOut,
    TokensRefreshed,
    ResetPasswordEmailSent,
    PasswordReset,
    EmailVerified,
    VerificationEmailSent,
    PasswordChanged,
}

impl Locale {
    pub fn from_accept_language(header: &str) -> Self {
        let primary = header
            .split(',')
            .next()
            .and_then(|tag| tag.split(';').next())
            .map(|tag| tag.trim().to_lowercase())
            .unwrap_or_default();

        if primary == "ar" || primary.starts_with("ar-") || primary.starts_with("ar_") {
            Locale::Ar
        } else {
            Locale::En
        }
    }

    pub fn t(&self, phrase: Phrase) -> &'static str {
        match self {
            Locale::En => match phrase {
                Phrase::AccountCreated => {
                    "Account created successfully. Please check your email to verify it."
                }
                Phrase::SignedIn => "Signed in successfully.",
                Phrase::LoggedOut => "Logged out successfully.",
                Phrase::TokensRefreshed => "Tokens refreshed successfully.",
                Phrase::ResetPasswordEmailSent => {
                    "If an account with that email exists, a password reset link has been sent."
                }
                Phrase::PasswordReset => "Password has been reset successfully.",
                Phrase::EmailVerified => "Email verified successfully.",
                Phrase::VerificationEmailSent => "Verification email sent successfully.",
                Phrase::PasswordChanged => "Password changed successfully.",
            },
            Locale::Ar => match phrase {
                Phrase::AccountCreated => {
                    "تم إنشاء الحساب بنجاح. يرجى التحقق من بريدك الإلكتروني لتأكيده."
                }
                Phrase::SignedIn => "تم تسجيل الدخول بنجاح.",
                Phrase::LoggedOut => "تم تسجيل الخروج بنجاح.",
                Phrase::TokensRefreshed => "تم تحديث الرموز بنجاح.",
                Phrase::ResetPasswordEmailSent => {
                    "إذا كان هناك حساب بهذا البريد الإلكتروني، فقد تم إرسال رابط إعادة تعيين كلمة المرور."
                }
                Phrase::PasswordReset => "تمت إعادة تعيين كلمة المرور بنجاح.",
                Phrase::EmailVerified => "تم التحقق من البريد الإلكتروني بنجاح.",
                Phrase::VerificationEmailSent => "تم إرسال رسالة التحقق بنجاح.",
                Phrase::PasswordChanged => "تم تغيير كلمة المرور بنجاح.",
            },
        }
    }
}

impl Locale {
    /// Translation of a client-facing error message. `None` keeps the
    /// English text, either because the locale is English or because the
    /// message is not in the table.
    pub fn translate_error(&self, message: &str) -> Option<String> {
        if *self == Locale::En {
            return None;
        }

        if let Some(uri) = message
            .strip_prefix("Can't find ")
            .and_then(|rest| rest.strip_suffix(" on this server!"))
        {
            return Some(format!("لا يمكن العثور على {} على هذا الخادم!", uri));
        }

        let translated = match message {
            "Email already taken" => "البريد الإلكتروني مستخدم بالفعل",
            "Incorrect email or password" => "البريد الإلكتروني أو كلمة المرور غير صحيحة",
            "Please authenticate" => "يرجى المصادقة",
            "Password reset failed" => "فشلت إعادة تعيين كلمة المرور",
            "Email verification failed" => "فشل التحقق من البريد الإلكتروني",
            "Email is already verified" => "تم التحقق من البريد الإلكتروني بالفعل",
            "Your current password is wrong." => "كلمة المرور الحالية غير صحيحة.",
            "You are not logged in! Please login to get access." => {
                "أنت غير مسجل الدخول! يرجى تسجيل الدخول للوصول."
            }
            "The user belonging to this token does no longer exist." => {
                "المستخدم المرتبط بهذا الرمز لم يعد موجودًا."
            }
            "User recently changed password! Please login again!" => {
                "قام المستخدم بتغيير كلمة المرور مؤخرًا! يرجى تسجيل الدخول مرة أخرى!"
            }
            "Invalid token" => "رمز غير صالح",
            "Token has expired" => "انتهت صلاحية الرمز",
            "Too many requests from this IP, please try again later." => {
                "طلبات كثيرة جدًا من عنوان IP هذا، يرجى المحاولة لاحقًا."
            }
            "Uploaded image is empty" => "الصورة المرفوعة فارغة",
            "Not an image! Please upload only images." => {
                "ليست صورة! يرجى رفع الصور فقط."
            }
            "Something went wrong!" => "حدث خطأ ما!",
            _ => return None,
        };
        Some(translated.to_string())
    }
}

/// Rewrites the message of error responses into the request's locale,
/// keeping status and headers.
pub async fn localize_errors(locale: Locale, request: Request, next: Next) -> Response {
    let response = next.run(request).await;

    let Some(translated) = response
        .extensions()
        .get::<ErrorMessage>()
        .and_then(|ErrorMessage(message)| locale.translate_error(message))
    else {
        return response;
    };

    debug!(?locale, "Localizing error response");
    let (mut parts, _) = response.into_parts();
    parts.headers.remove(CONTENT_LENGTH);
    let body = json!({
        "status": parts.status.as_u16(),
        "message": translated,
    });
    Response::from_parts(parts, Body::from(body.to_string()))
}

#[async_trait]
impl<S> FromRequestParts<S> for Locale
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(parts
            .headers
            .get(ACCEPT_LANGUAGE)
            .and_then(|value| value.to_str().ok())
            .map(Locale::from_accept_language)
            .unwrap_or_default())
    }
}
