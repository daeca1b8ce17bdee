use axum::Router;
use std::sync::Arc;

use storefront::{
    build_router, AppConfig, AppState, Environment, InMemoryFileStore, InMemoryMailer,
    InMemoryTokenRepository, InMemoryUserRepository,
};

// ============================================================================
// Test Setup Infrastructure
// ============================================================================

pub struct TestSetup {
    pub app: Router,
    pub state: AppState,
    pub mailer: Arc<InMemoryMailer>,
    pub users: Arc<InMemoryUserRepository>,
    pub files: Arc<InMemoryFileStore>,
}

pub struct TestSetupBuilder {
    config: AppConfig,
}

impl TestSetupBuilder {
    pub fn new() -> Self {
        Self {
            config: AppConfig {
                bcrypt_cost: 4,
                client_url: "http://client.test".to_string(),
                ..AppConfig::default()
            },
        }
    }

    pub fn in_production(mut self) -> Self {
        self.config.environment = Environment::Production;
        self
    }

    pub fn with_rate_limit(mut self, max_failures: u32) -> Self {
        self.config.rate_limit.max_failures = max_failures;
        self
    }

    pub fn build(self) -> TestSetup {
        let mailer = Arc::new(InMemoryMailer::new());
        let users = Arc::new(InMemoryUserRepository::new());
        let files = Arc::new(InMemoryFileStore::new());

        let state = AppState::new(
            self.config,
            users.clone(),
            Arc::new(InMemoryTokenRepository::new()),
            mailer.clone(),
            files.clone(),
        );
        let app = build_router(state.clone());

        TestSetup {
            app,
            state,
            mailer,
            users,
            files,
        }
    }
}

impl Default for TestSetupBuilder {
    fn default() -> Self {
        Self::new()
    }
}
