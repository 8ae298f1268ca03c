//! HTTP adapter tests driving the router in-process

mod common;

use std::sync::Arc;

use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use tower::ServiceExt;

use shelfkeeper_server::{api, AppState};

struct Client {
    app: Router,
}

impl Client {
    fn new(test_app: &common::TestApp) -> Self {
        let state = AppState {
            config: Arc::new(test_app.config.clone()),
            services: Arc::new(test_app.services.clone()),
        };
        Self {
            app: api::create_router(state),
        }
    }

    async fn send(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut request = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            request = request.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        let request = match body {
            Some(body) => request
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string())),
            None => request.body(Body::empty()),
        }
        .unwrap();

        let response = self.app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, value)
    }

    async fn login(&self, username: &str, role: &str) -> String {
        let (status, body) = self
            .send(
                Method::POST,
                "/api/v1/auth/login",
                None,
                Some(json!({ "username": username, "password": common::PASSWORD, "role": role })),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "{}", body);
        body["token"].as_str().unwrap().to_string()
    }
}

#[tokio::test]
async fn health_and_readiness() {
    let app = common::spawn().await;
    let client = Client::new(&app);

    let (status, body) = client.send(Method::GET, "/api/v1/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");

    let (status, body) = client.send(Method::GET, "/api/v1/ready", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ready");
    assert_eq!(body["database"], "ok");
}

#[tokio::test]
async fn login_rejects_wrong_role() {
    let app = common::spawn().await;
    app.student("alice").await;
    let client = Client::new(&app);

    let (status, body) = client
        .send(
            Method::POST,
            "/api/v1/auth/login",
            None,
            Some(json!({ "username": "alice", "password": common::PASSWORD, "role": "admin" })),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "NotAuthorized");
}

#[tokio::test]
async fn lending_flow_over_http() {
    let app = common::spawn().await;
    app.admin("librarian").await;
    let student = app.student("alice").await;
    let other = app.student("bob").await;
    let client = Client::new(&app);
    let admin = client.login("librarian", "admin").await;

    let (status, _) = client.send(Method::GET, "/api/v1/books", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, book) = client
        .send(
            Method::POST,
            "/api/v1/books",
            Some(&admin),
            Some(json!({
                "title": "Bloodchild",
                "author": "Octavia E. Butler",
                "category": "Fiction",
                "isbn": "0-941423-10-3",
                "publication_year": 1995
            })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{}", book);
    assert_eq!(book["isbn"], "0941423103");
    let book_id = book["id"].as_i64().unwrap();

    let (status, loan) = client
        .send(
            Method::POST,
            "/api/v1/loans",
            Some(&admin),
            Some(json!({ "book_id": book_id, "user_id": student.id, "period_days": 14 })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{}", loan);
    let loan_id = loan["id"].as_i64().unwrap();

    let (status, body) = client
        .send(
            Method::POST,
            "/api/v1/loans",
            Some(&admin),
            Some(json!({ "book_id": book_id, "user_id": other.id })),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], 7);

    let (status, details) = client
        .send(Method::GET, &format!("/api/v1/books/{}", book_id), Some(&admin), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(details["available"], false);
    assert_eq!(details["current_holder"]["username"], "alice");

    let (status, _) = client
        .send(Method::DELETE, &format!("/api/v1/books/{}", book_id), Some(&admin), None)
        .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, body) = client
        .send(
            Method::POST,
            &format!("/api/v1/loans/{}/return", loan_id),
            Some(&admin),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "returned");

    let (status, _) = client
        .send(
            Method::POST,
            &format!("/api/v1/loans/{}/return", loan_id),
            Some(&admin),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, summary) = client
        .send(Method::GET, "/api/v1/reports/summary", Some(&admin), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(summary["total_books"], 1);
    assert_eq!(summary["available_books"], 1);
    assert_eq!(summary["open_loans"], 0);

    let (status, activity) = client
        .send(Method::GET, "/api/v1/reports/recent-returns?limit=5", Some(&admin), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(activity[0]["title"], "Bloodchild");
}

#[tokio::test]
async fn students_only_see_their_own_records() {
    let app = common::spawn().await;
    let alice = app.student("alice").await;
    let bob = app.student("bob").await;
    let client = Client::new(&app);
    let token = client.login("alice", "student").await;

    let (status, _) = client
        .send(Method::GET, &format!("/api/v1/users/{}/issued", alice.id), Some(&token), None)
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = client
        .send(Method::GET, &format!("/api/v1/users/{}/loans", bob.id), Some(&token), None)
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = client.send(Method::GET, "/api/v1/users", Some(&token), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = client
        .send(
            Method::POST,
            "/api/v1/books",
            Some(&token),
            Some(json!({
                "title": "Sneaky",
                "author": "Nobody",
                "category": "Fiction",
                "isbn": "1234567890",
                "publication_year": 2000
            })),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, books) = client
        .send(Method::GET, "/api/v1/books/search?q=sneaky", Some(&token), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(books, json!([]));
}

#[tokio::test]
async fn validation_errors_are_bad_requests() {
    let app = common::spawn().await;
    app.admin("librarian").await;
    let client = Client::new(&app);
    let admin = client.login("librarian", "admin").await;

    let (status, body) = client
        .send(
            Method::POST,
            "/api/v1/users",
            Some(&admin),
            Some(json!({
                "username": "carol",
                "email": "carol@example.org",
                "password": "weak",
                "role": "student",
                "roll_number": "R-1"
            })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["message"].as_str().unwrap().contains("Password"));

    let (status, _) = client
        .send(
            Method::POST,
            "/api/v1/reminders/sweep",
            Some(&admin),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
}
