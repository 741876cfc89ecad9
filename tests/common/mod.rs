//! Shared fixtures for router-level tests
#![allow(dead_code)]

use axum::{
    body::{to_bytes, Body},
    http::{header, Method, Request, StatusCode},
    Router,
};
use chrono::Utc;
use jsonwebtoken::{encode, EncodingKey, Header};
use purge_hub::{
    account::{AccessClaims, SignupRequest},
    admin::Role,
    config::{
        AuthConfig, JobsConfig, LoggingConfig, ModerationConfig, ServerConfig, ServiceConfig,
        StorageConfig,
    },
    db, server, AppContext,
};
use serde_json::Value;
use std::path::PathBuf;
use tower::ServiceExt;

pub const SECRET: &str = "integration-secret-0123456789abcdef";

pub fn config(principal_email: Option<&str>) -> ServerConfig {
    ServerConfig {
        service: ServiceConfig {
            hostname: "127.0.0.1".to_string(),
            port: 0,
            version: "test".to_string(),
        },
        storage: StorageConfig {
            data_directory: PathBuf::from("./data"),
            database: PathBuf::from(":memory:"),
        },
        authentication: AuthConfig {
            jwt_secret: SECRET.to_string(),
            jwt_audience: None,
            principal_email: principal_email.map(str::to_string),
        },
        moderation: ModerationConfig {
            default_ban_reason: "Banned by admin".to_string(),
            default_deletion_reason: "Account deleted by admin".to_string(),
        },
        jobs: JobsConfig {
            reconcile_enabled: false,
            reconcile_interval_secs: 3600,
        },
        logging: LoggingConfig {
            level: "debug".to_string(),
            json: false,
        },
    }
}

pub struct TestHub {
    pub ctx: AppContext,
    pub app: Router,
}

pub async fn hub() -> TestHub {
    hub_with_principal_email(None).await
}

pub async fn hub_with_principal_email(principal_email: Option<&str>) -> TestHub {
    let pool = db::create_memory_pool().await.unwrap();
    let ctx = AppContext::with_pool(config(principal_email), pool);
    let app = server::build_router(ctx.clone());
    TestHub { ctx, app }
}

impl TestHub {
    /// Register an account named `name` with email `<name>@example.com`
    pub async fn signup(&self, name: &str) -> String {
        self.ctx
            .account_manager
            .create_account(SignupRequest {
                email: format!("{}@example.com", name),
                username: name.to_string(),
                display_name: Some(format!("{} display", name)),
            })
            .await
            .unwrap()
            .user_id
    }

    pub async fn admin(&self, name: &str) -> String {
        let id = self.signup(name).await;
        self.ctx.role_manager.grant_role(&id, Role::Admin).await.unwrap();
        id
    }

    pub async fn principal(&self, name: &str) -> String {
        let id = self.admin(name).await;
        self.ctx.role_manager.grant_role(&id, Role::SuperAdmin).await.unwrap();
        id
    }

    pub fn token(&self, user_id: &str) -> String {
        let claims = AccessClaims {
            sub: user_id.to_string(),
            exp: (Utc::now().timestamp() + 3600) as usize,
        };
        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(SECRET.as_bytes()),
        )
        .unwrap()
    }

    pub async fn get(&self, uri: &str, user_id: Option<&str>) -> (StatusCode, Value) {
        self.send(Method::GET, uri, user_id, None).await
    }

    pub async fn post(&self, uri: &str, user_id: Option<&str>, body: Value) -> (StatusCode, Value) {
        self.send(Method::POST, uri, user_id, Some(body)).await
    }

    pub async fn send(
        &self,
        method: Method,
        uri: &str,
        user_id: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let authorization = user_id.map(|id| format!("Bearer {}", self.token(id)));
        self.send_with_authorization(method, uri, authorization.as_deref(), body)
            .await
    }

    /// Like `send`, with the Authorization header value given verbatim
    pub async fn send_with_authorization(
        &self,
        method: Method,
        uri: &str,
        authorization: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(value) = authorization {
            builder = builder.header(header::AUTHORIZATION, value);
        }
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = self.app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };

        (status, json)
    }

    pub async fn count(&self, sql: &str, user_id: &str) -> i64 {
        sqlx::query_scalar(sql)
            .bind(user_id)
            .fetch_one(&self.ctx.db)
            .await
            .unwrap()
    }
}
