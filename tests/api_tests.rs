mod common;

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
};
use common::{booking, training_date, TestApp, ADMIN_EMAIL, STAFF_EMAIL};
use serde_json::json;

#[tokio::test]
async fn health_endpoints_respond() {
    let app = TestApp::spawn().await;
    let (status, _) = app.get("/healthz", None).await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = app.get("/api/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["checks"]["storage"]["backend"], "memory");
}

#[tokio::test]
async fn public_booking_and_lookup() {
    let app = TestApp::spawn().await;
    let date = training_date();

    let (status, body) = app
        .json("POST", "/api/reservations", None, booking(date, app.subject.id, "morning", 1))
        .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    let code = body["data"]["code"].as_str().unwrap().to_string();
    assert!(code.starts_with("RSV-"));
    assert_eq!(body["data"]["status"], "pending");

    let (status, body) = app
        .get(&format!("/api/reservations/lookup?code={code}&email=SOMCHAI@school.example"), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["code"], code.as_str());

    let (status, _) = app
        .get(&format!("/api/reservations/lookup?code={code}&email=other@school.example"), None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn capacity_is_enforced_across_bookings() {
    let app = TestApp::spawn().await;
    let date = training_date();

    let (status, _) = app
        .json("POST", "/api/reservations", None, booking(date, app.subject.id, "afternoon", 2))
        .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, body) = app
        .json("POST", "/api/reservations", None, booking(date, app.subject.id, "afternoon", 1))
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error"], "BookingRejected");
    assert_eq!(body["details"][0]["kind"], "capacity_exceeded");
    assert_eq!(body["details"][0]["remaining"], 0);

    // The morning slot is a separate cell
    let (status, _) = app
        .json("POST", "/api/reservations", None, booking(date, app.subject.id, "morning", 2))
        .await;
    assert_eq!(status, StatusCode::CREATED);
}

#[tokio::test]
async fn invalid_booking_payload_is_a_client_error() {
    let app = TestApp::spawn().await;
    let mut body = booking(training_date(), app.subject.id, "morning", 1);
    body["contact"]["email"] = json!("not-an-email");
    let (status, resp) = app.json("POST", "/api/reservations", None, body).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(resp["error"], "ValidationError");

    let (status, resp) = app
        .json("POST", "/api/reservations", None, json!({ "school": 1 }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(resp["error"], "BadRequest");
}

#[tokio::test]
async fn staff_manage_reservation_lifecycle() {
    let app = TestApp::spawn().await;
    let date = training_date();
    let (_, created) = app
        .json("POST", "/api/reservations", None, booking(date, app.subject.id, "morning", 2))
        .await;
    let id = created["data"]["id"].as_str().unwrap().to_string();

    let (status, _) = app.get("/api/reservations", None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let staff = app.login(STAFF_EMAIL).await;
    let (status, list) = app.get("/api/reservations?status=pending&page_size=5", Some(&staff)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(list["data"].as_array().unwrap().len(), 1);
    assert_eq!(list["metadata"]["total_count"], 1);
    assert_eq!(list["metadata"]["page_size"], 5);

    let (status, body) = app
        .json("PUT", &format!("/api/reservations/{id}/status"), Some(&staff), json!({ "status": "cancelled", "reason": "bus unavailable" }))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["history"][0]["reason"], "bus unavailable");

    // Terminal, so it cannot come back
    let (status, _) = app
        .json("PUT", &format!("/api/reservations/{id}/status"), Some(&staff), json!({ "status": "confirmed" }))
        .await;
    assert_eq!(status, StatusCode::CONFLICT);

    // Capacity was released
    let (status, _) = app
        .json("POST", "/api/reservations", None, booking(date, app.subject.id, "morning", 2))
        .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, body) = app
        .json("PUT", &format!("/api/reservations/{id}/note"), Some(&staff), json!({ "admin_note": "called school" }))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["admin_note"], "called school");

    assert_eq!(app.delete(&format!("/api/reservations/{id}"), Some(&staff)).await, StatusCode::FORBIDDEN);
    let admin = app.login(ADMIN_EMAIL).await;
    assert_eq!(app.delete(&format!("/api/reservations/{id}"), Some(&admin)).await, StatusCode::NO_CONTENT);
    let (status, _) = app.get(&format!("/api/reservations/{id}"), Some(&admin)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn closed_rule_blocks_booking_and_shows_in_availability() {
    let app = TestApp::spawn().await;
    let date = training_date();
    let staff = app.login(STAFF_EMAIL).await;

    let (status, _) = app
        .json(
            "POST",
            "/api/rules",
            Some(&staff),
            json!({ "title": "Campus maintenance", "start_date": date, "end_date": date, "slots": ["morning"] }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, body) = app
        .json("POST", "/api/reservations", None, booking(date, app.subject.id, "morning", 1))
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["details"][0]["kind"], "closed");
    assert_eq!(body["details"][0]["reason"], "Campus maintenance");

    let (status, grid) = app
        .get(&format!("/api/availability?from={date}&to={date}"), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    let cells = grid["data"].as_array().unwrap();
    assert_eq!(cells.len(), 2);
    let morning = cells.iter().find(|c| c["slot"] == "morning").unwrap();
    assert_eq!(morning["closed_reason"], "Campus maintenance");
    assert_eq!(morning["bookable"], false);
    let afternoon = cells.iter().find(|c| c["slot"] == "afternoon").unwrap();
    assert_eq!(afternoon["bookable"], true);
}

#[tokio::test]
async fn rule_with_inverted_dates_is_rejected() {
    let app = TestApp::spawn().await;
    let staff = app.login(STAFF_EMAIL).await;
    let (status, _) = app
        .json("POST", "/api/rules", Some(&staff), json!({ "title": "Oops", "start_date": "2026-12-10", "end_date": "2026-12-01" }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn availability_range_is_limited() {
    let app = TestApp::spawn().await;
    let (status, _) = app.get("/api/availability?from=2027-01-01&to=2027-06-01", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // The last date the calendar can represent
    let (status, _) = app
        .get("/api/availability?from=%2B262142-12-31&to=%2B262142-12-31", None)
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let (status, _) = app.get("/healthz", None).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn referenced_catalog_entries_cannot_be_deleted() {
    let app = TestApp::spawn().await;
    let staff = app.login(STAFF_EMAIL).await;

    let category = app.subject.category_id;
    assert_eq!(app.delete(&format!("/api/categories/{category}"), Some(&staff)).await, StatusCode::CONFLICT);

    app.json("POST", "/api/reservations", None, booking(training_date(), app.subject.id, "morning", 1))
        .await;
    let subject = app.subject.id;
    assert_eq!(app.delete(&format!("/api/subjects/{subject}"), Some(&staff)).await, StatusCode::CONFLICT);
}

#[tokio::test]
async fn subject_references_are_checked() {
    let app = TestApp::spawn().await;
    let staff = app.login(STAFF_EMAIL).await;
    let input = json!({
        "code": "ART-1",
        "name": "Ceramics",
        "category_id": uuid::Uuid::new_v4(),
        "slots": ["morning"],
        "total_classrooms": 1,
        "students_per_classroom": 30
    });
    let (status, body) = app.json("POST", "/api/subjects", Some(&staff), input.clone()).await;
    assert_eq!(status, StatusCode::BAD_REQUEST, "{body}");

    let mut ok = input;
    ok["category_id"] = json!(app.subject.category_id);
    let (status, _) = app.json("POST", "/api/subjects", Some(&staff), ok.clone()).await;
    assert_eq!(status, StatusCode::CREATED);

    // Codes are unique
    let (status, _) = app.json("POST", "/api/subjects", Some(&staff), ok).await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn login_logout_and_me() {
    let app = TestApp::spawn().await;

    let (status, body) = app
        .json("POST", "/api/auth/login", None, json!({ "email": STAFF_EMAIL, "password": "wrong-password" }))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["message"], "invalid email or password");

    let req = Request::post("/api/auth/login")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(json!({ "email": "Staff@Uni.Example", "password": common::PASSWORD }).to_string()))
        .unwrap();
    let (status, body, headers) = app.send(req).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["data"]["user"].get("password_hash").is_none());
    let cookie = headers.get(header::SET_COOKIE).unwrap().to_str().unwrap().to_string();
    assert!(cookie.starts_with("token="));
    assert!(cookie.contains("HttpOnly"));

    // The cookie alone authenticates
    let pair = cookie.split(';').next().unwrap().to_string();
    let req = Request::get("/api/auth/me").header(header::COOKIE, pair).body(Body::empty()).unwrap();
    let (status, me, _) = app.send(req).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(me["data"]["email"], STAFF_EMAIL);
    assert!(me["data"]["last_login_at"].is_string());

    let req = Request::post("/api/auth/logout")
        .header(header::COOKIE, cookie.split(';').next().unwrap())
        .body(Body::empty())
        .unwrap();
    let (status, _, headers) = app.send(req).await;
    assert_eq!(status, StatusCode::OK);
    let cleared = headers.get(header::SET_COOKIE).unwrap().to_str().unwrap();
    assert!(cleared.starts_with("token="));
    assert!(cleared.contains("Max-Age=0"));
}

#[tokio::test]
async fn unknown_email_and_wrong_password_fail_alike() {
    let app = TestApp::spawn().await;

    let (wrong_status, wrong) = app
        .json("POST", "/api/auth/login", None, json!({ "email": STAFF_EMAIL, "password": "wrong-password" }))
        .await;
    let (unknown_status, unknown) = app
        .json("POST", "/api/auth/login", None, json!({ "email": "nobody@uni.example", "password": "wrong-password" }))
        .await;
    assert_eq!(wrong_status, StatusCode::UNAUTHORIZED);
    assert_eq!(unknown_status, StatusCode::UNAUTHORIZED);
    assert_eq!(wrong["error"], unknown["error"]);
    assert_eq!(wrong["message"], unknown["message"]);
    assert_eq!(unknown["message"], "invalid email or password");
}

#[tokio::test]
async fn stale_cookie_does_not_hide_bearer_token() {
    let app = TestApp::spawn().await;
    let staff = app.login(STAFF_EMAIL).await;

    let req = Request::get("/api/auth/me")
        .header(header::COOKIE, "token=expired.or.forged")
        .header(header::AUTHORIZATION, format!("Bearer {staff}"))
        .body(Body::empty())
        .unwrap();
    let (status, me, _) = app.send(req).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(me["data"]["email"], STAFF_EMAIL);

    let req = Request::get("/api/auth/me")
        .header(header::COOKIE, "token=expired.or.forged")
        .body(Body::empty())
        .unwrap();
    let (status, _, _) = app.send(req).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn deactivated_user_loses_access_immediately() {
    let app = TestApp::spawn().await;
    let staff = app.login(STAFF_EMAIL).await;
    let admin = app.login(ADMIN_EMAIL).await;

    let (_, me) = app.get("/api/auth/me", Some(&staff)).await;
    let staff_id = me["data"]["id"].as_str().unwrap().to_string();

    let (status, _) = app
        .json("PUT", &format!("/api/users/{staff_id}"), Some(&admin), json!({ "active": false }))
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = app.get("/api/auth/me", Some(&staff)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn last_admin_is_protected() {
    let app = TestApp::spawn().await;
    let admin = app.login(ADMIN_EMAIL).await;
    let (_, me) = app.get("/api/auth/me", Some(&admin)).await;
    let admin_id = me["data"]["id"].as_str().unwrap().to_string();

    let (status, _) = app
        .json("PUT", &format!("/api/users/{admin_id}/role"), Some(&admin), json!({ "role": "staff" }))
        .await;
    assert_eq!(status, StatusCode::CONFLICT);

    assert_eq!(app.delete(&format!("/api/users/{admin_id}"), Some(&admin)).await, StatusCode::CONFLICT);

    let staff = app.login(STAFF_EMAIL).await;
    let (status, _) = app.get("/api/users", Some(&staff)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn settings_are_public_and_admin_editable() {
    let app = TestApp::spawn().await;
    let (status, body) = app.get("/api/settings", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["min_lead_days"], 7);

    let mut settings = body["data"].clone();
    settings["booking_open"] = json!(false);

    let staff = app.login(STAFF_EMAIL).await;
    let (status, _) = app.json("PUT", "/api/settings", Some(&staff), settings.clone()).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let admin = app.login(ADMIN_EMAIL).await;
    let (status, _) = app.json("PUT", "/api/settings", Some(&admin), settings).await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = app
        .json("POST", "/api/reservations", None, booking(training_date(), app.subject.id, "morning", 1))
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["details"][0]["kind"], "booking_closed");
}

fn multipart(boundary: &str, parts: &[(&str, Option<(&str, &str)>, &[u8])]) -> Vec<u8> {
    let mut body = Vec::new();
    for (name, file, data) in parts {
        body.extend_from_slice(format!("--{boundary}\r\n").as_bytes());
        match file {
            Some((filename, content_type)) => body.extend_from_slice(
                format!(
                    "Content-Disposition: form-data; name=\"{name}\"; filename=\"{filename}\"\r\nContent-Type: {content_type}\r\n\r\n"
                )
                .as_bytes(),
            ),
            None => body.extend_from_slice(
                format!("Content-Disposition: form-data; name=\"{name}\"\r\n\r\n").as_bytes(),
            ),
        }
        body.extend_from_slice(data);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{boundary}--\r\n").as_bytes());
    body
}

#[tokio::test]
async fn slide_upload_is_stored_and_served() {
    let app = TestApp::spawn().await;
    let staff = app.login(STAFF_EMAIL).await;
    let boundary = "XBOUNDARYX";

    let upload = |parts: Vec<u8>| {
        Request::post("/api/slides")
            .header(header::AUTHORIZATION, format!("Bearer {staff}"))
            .header(header::CONTENT_TYPE, format!("multipart/form-data; boundary={boundary}"))
            .body(Body::from(parts))
            .unwrap()
    };

    let body = multipart(
        boundary,
        &[
            ("title", None, b"Open house".as_slice()),
            ("position", None, b"2".as_slice()),
            ("image", Some(("banner.png", "image/png")), b"\x89PNG\r\n\x1a\nfake".as_slice()),
        ],
    );
    let (status, slide, _) = app.send(upload(body)).await;
    assert_eq!(status, StatusCode::CREATED, "{slide}");
    let image = slide["data"]["image"].as_str().unwrap().to_string();
    assert!(image.starts_with("/uploads/") && image.ends_with(".png"));
    let file = app.uploads.path().join(image.trim_start_matches("/uploads/"));
    assert!(file.exists());

    let (status, _) = app.get(&image, None).await;
    assert_eq!(status, StatusCode::OK);

    let (_, public) = app.get("/api/slides", None).await;
    assert_eq!(public["data"].as_array().unwrap().len(), 1);

    let wrong_type = multipart(
        boundary,
        &[
            ("title", None, b"Doc".as_slice()),
            ("image", Some(("doc.pdf", "application/pdf")), b"%PDF-1.4".as_slice()),
        ],
    );
    let (status, _, _) = app.send(upload(wrong_type)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let too_big = multipart(
        boundary,
        &[
            ("title", None, b"Huge".as_slice()),
            ("image", Some(("big.png", "image/png")), &[0u8; 2048][..]),
        ],
    );
    let (status, _, _) = app.send(upload(too_big)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let id = slide["data"]["id"].as_str().unwrap();
    assert_eq!(app.delete(&format!("/api/slides/{id}"), Some(&staff)).await, StatusCode::NO_CONTENT);
    assert!(!file.exists());
}

#[tokio::test]
async fn dashboard_summarises_upcoming_sessions() {
    let app = TestApp::spawn().await;
    app.json("POST", "/api/reservations", None, booking(training_date(), app.subject.id, "morning", 1))
        .await;
    let staff = app.login(STAFF_EMAIL).await;
    let (status, body) = app.get("/api/admin/dashboard", Some(&staff)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["totals"]["pending"], 1);
    assert_eq!(body["data"]["created_last_30_days"], 1);
    assert_eq!(body["data"]["upcoming"][0]["subject_name"], "Robotics");
}
