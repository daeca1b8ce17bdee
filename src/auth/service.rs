use chrono::Utc;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};
use validator::Validate;

use super::types::{
    ChangePasswordRequest, ForgotPasswordRequest, ResetPasswordRequest, SigninRequest,
    SignupForm, VerifyEmailRequest,
};
use crate::mail::{EmailMessage, Mailer};
use crate::middleware::sanitize_text;
use crate::shared::AppError;
use crate::token::{AuthTokens, TokenKind, TokenService};
use crate::upload::FileStore;
use crate::user::{PasswordHasher, UserModel, UserRepository};

/// Orchestrates the account flows on top of the user store, token service,
/// password hasher, mailer and file store.
pub struct AuthService {
    user_repository: Arc<dyn UserRepository + Send + Sync>,
    token_service: Arc<TokenService>,
    mailer: Arc<dyn Mailer>,
    file_store: Arc<dyn FileStore>,
    hasher: PasswordHasher,
    client_url: String,
}

impl AuthService {
    pub fn new(
        user_repository: Arc<dyn UserRepository + Send + Sync>,
        token_service: Arc<TokenService>,
        mailer: Arc<dyn Mailer>,
        file_store: Arc<dyn FileStore>,
        hasher: PasswordHasher,
        client_url: String,
    ) -> Self {
        Self {
            user_repository,
            token_service,
            mailer,
            file_store,
            hasher,
            client_url,
        }
    }

    /// Creates the account and mails a verification link. Does not sign in.
    #[instrument(skip_all)]
    pub async fn signup(&self, form: SignupForm) -> Result<UserModel, AppError> {
        form.validate()?;
        if let Some(image) = &form.image {
            image.validate()?;
        }

        if self
            .user_repository
            .find_by_email(&form.email)
            .await?
            .is_some()
        {
            warn!("Signup attempted with a registered email");
            return Err(AppError::Conflict("Email already taken".to_string()));
        }

        let password_hash = self.hasher.hash(&form.password).await?;
        let mut user = UserModel::new(sanitize_text(&form.name), &form.email, password_hash);

        let stored_image = match &form.image {
            Some(image) => {
                let stored = self.file_store.upload(image).await?;
                user.set_profile_image(stored.url.clone(), stored.id.clone());
                Some(stored)
            }
            None => None,
        };

        if let Err(e) = self.user_repository.create_user(&user).await {
            // Registration lost a race on the email; drop the orphaned upload
            if let Some(stored) = stored_image {
                if let Err(cleanup) = self.file_store.delete(&stored.id).await {
                    warn!(error = %cleanup, "Failed to remove orphaned profile image");
                }
            }
            return Err(e);
        }
        info!(user_id = %user.id, "User registered");

        self.send_verification_email(&user).await?;
        Ok(user)
    }

    #[instrument(skip_all)]
    pub async fn signin(&self, request: SigninRequest) -> Result<(UserModel, AuthTokens), AppError> {
        request.validate()?;

        let incorrect = || AppError::Unauthorized("Incorrect email or password".to_string());

        let Some(user) = self.user_repository.find_by_email(&request.email).await? else {
            warn!("Signin failed: unknown email");
            return Err(incorrect());
        };
        if !self
            .hasher
            .verify(&request.password, &user.password_hash)
            .await?
        {
            warn!(user_id = %user.id, "Signin failed: wrong password");
            return Err(incorrect());
        }

        let tokens = self.token_service.generate_auth_tokens(user.id).await?;
        info!(user_id = %user.id, "User signed in");
        Ok((user, tokens))
    }

    /// Revokes the refresh token if one was presented; never fails on unknown tokens
    #[instrument(skip_all)]
    pub async fn logout(&self, refresh_token: Option<&str>) -> Result<(), AppError> {
        match refresh_token {
            Some(token) => {
                self.token_service.revoke(token).await?;
                info!("Refresh token revoked on logout");
            }
            None => debug!("Logout without refresh token"),
        }
        Ok(())
    }

    /// Rotates the refresh token and issues a new access token
    #[instrument(skip_all)]
    pub async fn refresh_tokens(
        &self,
        refresh_token: &str,
    ) -> Result<(UserModel, AuthTokens), AppError> {
        let please_authenticate = || AppError::Unauthenticated("Please authenticate".to_string());

        // Spent up front so one refresh token rotates at most once
        let claims = self
            .token_service
            .consume_stored(refresh_token, TokenKind::Refresh)
            .await
            .map_err(|e| {
                warn!(error = %e, "Refresh token rejected");
                please_authenticate()
            })?;

        let user = self
            .user_repository
            .get_user(claims.subject()?)
            .await?
            .ok_or_else(please_authenticate)?;

        if user.changed_password_after(claims.issued_at()) {
            warn!(user_id = %user.id, "Refresh token predates a password change");
            return Err(please_authenticate());
        }

        let tokens = self.token_service.generate_auth_tokens(user.id).await?;

        info!(user_id = %user.id, "Tokens refreshed");
        Ok((user, tokens))
    }

    /// Mails a reset link when the email belongs to an account. Unknown
    /// emails succeed silently.
    #[instrument(skip_all)]
    pub async fn forgot_password(&self, request: ForgotPasswordRequest) -> Result<(), AppError> {
        request.validate()?;

        let Some(user) = self.user_repository.find_by_email(&request.email).await? else {
            debug!("Password reset requested for unknown email");
            return Ok(());
        };

        let issued = self
            .token_service
            .issue_and_store(user.id, TokenKind::ResetPassword)
            .await?;
        self.mailer
            .send(EmailMessage::reset_password(
                &user.email,
                &self.client_url,
                &issued.token,
            ))
            .await?;

        info!(user_id = %user.id, "Password reset email sent");
        Ok(())
    }

    /// The reset token is spent before anything else, so a reused or
    /// concurrently replayed token fails without touching the user record.
    #[instrument(skip_all)]
    pub async fn reset_password(&self, request: ResetPasswordRequest) -> Result<(), AppError> {
        request.validate()?;
        let reset_failed = || AppError::BadRequest("Password reset failed".to_string());

        let claims = self
            .token_service
            .consume_stored(&request.token, TokenKind::ResetPassword)
            .await
            .map_err(|e| {
                warn!(error = %e, "Reset token rejected");
                reset_failed()
            })?;
        let user_id = claims.subject().map_err(|_| reset_failed())?;

        let password_hash = self.hasher.hash(&request.password).await?;
        let user = match self
            .user_repository
            .update_password(user_id, password_hash)
            .await
        {
            Err(AppError::NotFound(_)) => return Err(reset_failed()),
            result => result?,
        };
        self.token_service.revoke_all(user.id).await?;

        info!(user_id = %user.id, "Password reset");
        Ok(())
    }

    #[instrument(skip_all)]
    pub async fn verify_email(&self, request: VerifyEmailRequest) -> Result<UserModel, AppError> {
        request.validate()?;
        let verification_failed = || AppError::BadRequest("Email verification failed".to_string());

        let claims = self
            .token_service
            .consume_stored(&request.token, TokenKind::VerifyEmail)
            .await
            .map_err(|e| {
                warn!(error = %e, "Verify-email token rejected");
                verification_failed()
            })?;
        let user_id = claims.subject().map_err(|_| verification_failed())?;

        let user = match self.user_repository.set_email_verified(user_id).await {
            Err(AppError::NotFound(_)) => return Err(verification_failed()),
            result => result?,
        };

        info!(user_id = %user.id, "Email verified");
        Ok(user)
    }

    #[instrument(skip_all, fields(user_id = %user.id))]
    pub async fn send_verification_email(&self, user: &UserModel) -> Result<(), AppError> {
        if user.is_email_verified {
            return Err(AppError::BadRequest("Email is already verified".to_string()));
        }

        let issued = self
            .token_service
            .issue_and_store(user.id, TokenKind::VerifyEmail)
            .await?;
        self.mailer
            .send(EmailMessage::verify_email(
                &user.email,
                &self.client_url,
                &issued.token,
            ))
            .await?;

        info!("Verification email sent");
        Ok(())
    }

    /// Replaces the password, revokes every stored token and signs the user
    /// back in with a fresh pair. `user` only identifies the account; the
    /// current record is reloaded from the store.
    #[instrument(skip_all, fields(user_id = %user.id))]
    pub async fn change_password(
        &self,
        user: &UserModel,
        request: ChangePasswordRequest,
    ) -> Result<(UserModel, AuthTokens), AppError> {
        request.validate()?;

        let current = self
            .user_repository
            .get_user(user.id)
            .await?
            .ok_or_else(|| {
                AppError::Unauthenticated(
                    "The user belonging to this token does no longer exist.".to_string(),
                )
            })?;

        if !self
            .hasher
            .verify(&request.current_password, &current.password_hash)
            .await?
        {
            warn!("Current password did not match");
            return Err(AppError::Unauthorized(
                "Your current password is wrong.".to_string(),
            ));
        }

        let password_hash = self.hasher.hash(&request.password).await?;
        let user = self
            .user_repository
            .update_password(current.id, password_hash)
            .await?;

        self.token_service.revoke_all(user.id).await?;
        let changed_at = user.password_changed_at.unwrap_or_else(Utc::now);
        let tokens = self
            .token_service
            .generate_auth_tokens_after(user.id, changed_at)
            .await?;

        info!("Password changed");
        Ok((user, tokens))
    }

    /// Session check for protected routes: verifies the access token and
    /// loads its user, failing on the first problem found.
    #[instrument(skip_all)]
    pub async fn authenticate(&self, access_token: &str) -> Result<UserModel, AppError> {
        let claims = self.token_service.verify_access(access_token)?;

        let user = self
            .user_repository
            .get_user(claims.subject()?)
            .await?
            .ok_or_else(|| {
                AppError::Unauthenticated(
                    "The user belonging to this token does no longer exist.".to_string(),
                )
            })?;

        if user.changed_password_after(claims.issued_at()) {
            return Err(AppError::Unauthenticated(
                "User recently changed password! Please login again!".to_string(),
            ));
        }

        Ok(user)
    }
}
