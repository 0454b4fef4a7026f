#![allow(dead_code)]

use axum::{
    body::{to_bytes, Body},
    http::{header, Request, StatusCode},
    Router,
};
use chrono::{Datelike, Duration, NaiveDate, Utc, Weekday};
use figment::{providers::{Format, Toml}, Figment};
use outreach_reservations::{
    api,
    auth::hash_password,
    booking::today_in,
    config::Config,
    controller::AppState,
    domain::{Category, Role, Slot, Subject, User},
    notify::NotificationHub,
    repo::Repositories,
};
use serde_json::{json, Value};
use std::sync::Arc;
use tempfile::TempDir;
use tower::ServiceExt;
use uuid::Uuid;

pub const ADMIN_EMAIL: &str = "admin@uni.example";
pub const STAFF_EMAIL: &str = "staff@uni.example";
pub const PASSWORD: &str = "correct-horse-battery";

pub struct TestApp {
    pub router: Router,
    pub state: AppState,
    pub uploads: TempDir,
    pub subject: Subject,
}

fn config(uploads: &TempDir) -> Config {
    let toml = format!(
        r#"
        [server]
        host = "127.0.0.1"
        port = 0
        enable_cors = false

        [auth]
        jwt_secret = "integration-test-secret-integration-test"

        [booking]
        timezone = "Asia/Bangkok"

        [uploads]
        dir = "{}"
        max_bytes = 1024
        "#,
        uploads.path().display()
    );
    Config::from_figment(Figment::new().merge(Toml::string(&toml))).expect("test config")
}

fn user(email: &str, role: Role) -> User {
    let now = Utc::now();
    User {
        id: Uuid::new_v4(),
        email: email.into(),
        name: email.split('@').next().unwrap_or_default().into(),
        password_hash: hash_password(PASSWORD).expect("hash"),
        role,
        active: true,
        last_login_at: None,
        created_at: now,
        updated_at: now,
    }
}

impl TestApp {
    /// App with one admin, one staff account and a subject offering two
    /// classrooms in both slots
    pub async fn spawn() -> Self {
        let uploads = tempfile::tempdir().expect("tempdir");
        let cfg = config(&uploads);
        let repos = Arc::new(Repositories::in_memory());
        let state = AppState::with_parts(cfg.clone(), repos.clone(), Arc::new(NotificationHub::disabled()))
            .expect("state");

        repos.users.insert(&user(ADMIN_EMAIL, Role::Admin)).await.unwrap();
        repos.users.insert(&user(STAFF_EMAIL, Role::Staff)).await.unwrap();

        let now = Utc::now();
        let category = Category {
            id: Uuid::new_v4(),
            name: "Science".into(),
            description: None,
            position: 0,
            created_at: now,
            updated_at: now,
        };
        repos.categories.insert(&category).await.unwrap();
        let subject = Subject {
            id: Uuid::new_v4(),
            code: "SCI-101".into(),
            name: "Robotics".into(),
            description: None,
            category_id: category.id,
            subcategory_id: None,
            lecturer_ids: vec![],
            slots: vec![Slot::Morning, Slot::Afternoon],
            total_classrooms: 2,
            students_per_classroom: 40,
            image: None,
            active: true,
            created_at: now,
            updated_at: now,
        };
        repos.subjects.insert(&subject).await.unwrap();

        Self {
            router: api::router(state.clone(), &cfg),
            state,
            uploads,
            subject,
        }
    }

    pub async fn send(&self, req: Request<Body>) -> (StatusCode, Value, axum::http::HeaderMap) {
        let resp = self.router.clone().oneshot(req).await.expect("request");
        let status = resp.status();
        let headers = resp.headers().clone();
        let bytes = to_bytes(resp.into_body(), usize::MAX).await.expect("body");
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into()))
        };
        (status, body, headers)
    }

    pub async fn get(&self, uri: &str, token: Option<&str>) -> (StatusCode, Value) {
        let mut req = Request::get(uri);
        if let Some(t) = token {
            req = req.header(header::AUTHORIZATION, format!("Bearer {t}"));
        }
        let (s, b, _) = self.send(req.body(Body::empty()).unwrap()).await;
        (s, b)
    }

    pub async fn json(&self, method: &str, uri: &str, token: Option<&str>, body: Value) -> (StatusCode, Value) {
        let mut req = Request::builder()
            .method(method)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json");
        if let Some(t) = token {
            req = req.header(header::AUTHORIZATION, format!("Bearer {t}"));
        }
        let (s, b, _) = self.send(req.body(Body::from(body.to_string())).unwrap()).await;
        (s, b)
    }

    pub async fn delete(&self, uri: &str, token: Option<&str>) -> StatusCode {
        let mut req = Request::delete(uri);
        if let Some(t) = token {
            req = req.header(header::AUTHORIZATION, format!("Bearer {t}"));
        }
        self.send(req.body(Body::empty()).unwrap()).await.0
    }

    /// Session token for `email`
    pub async fn login(&self, email: &str) -> String {
        let (status, body) = self
            .json("POST", "/api/auth/login", None, json!({ "email": email, "password": PASSWORD }))
            .await;
        assert_eq!(status, StatusCode::OK, "{body}");
        body["data"]["token"].as_str().expect("token").to_string()
    }
}

/// A weekday two weeks from today, inside the default booking window
pub fn training_date() -> NaiveDate {
    let mut d = today_in(chrono_tz::Asia::Bangkok) + Duration::days(14);
    while matches!(d.weekday(), Weekday::Sat | Weekday::Sun) {
        d += Duration::days(1);
    }
    d
}

pub fn booking(date: NaiveDate, subject_id: Uuid, slot: &str, classrooms: u32) -> Value {
    json!({
        "school": {
            "name": "Ban Nong Khai School",
            "province": "Khon Kaen",
            "level": "lower_secondary",
            "student_count": 80
        },
        "contact": {
            "name": "Somchai Jaidee",
            "phone": "0812345678",
            "email": "somchai@school.example"
        },
        "training_days": [{
            "date": date,
            "sessions": [{ "subject_id": subject_id, "slot": slot, "classrooms": classrooms }]
        }]
    })
}
