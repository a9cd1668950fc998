//! End-to-end HTTP tests: drive the router in-process with `oneshot`.
//! Covers the teacher/student walkthrough plus the role matrix edges.

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tempfile::TempDir;
use tower::ServiceExt;

use gradebook::config::Config;
use gradebook::server::{router, AppState};

const SECRET: &[u8] = b"http-flow-tests-signing-key-0123456789";
const DATASET: &str = "Student Name,Student Roll Number,Marks,Time Studied Per Day (hrs)\nAnn,R1,90,3.5\nBob,R2,40,1.0\n";

fn test_app() -> (TempDir, Router) {
    let tmp = TempDir::new().unwrap();
    let mut cfg = Config::new(SECRET.to_vec());
    cfg.db_root = tmp.path().join("data");
    cfg.static_dir = tmp.path().join("no-static");
    cfg.dataset_path = tmp.path().join("student_dataset_100_records.csv");
    let state = AppState::new(cfg).unwrap();
    (tmp, router(state))
}

struct Reply {
    status: StatusCode,
    headers: header::HeaderMap,
    bytes: Vec<u8>,
}

impl Reply {
    fn json(&self) -> Value {
        serde_json::from_slice(&self.bytes).unwrap_or(Value::Null)
    }
}

async fn send(app: &Router, req: Request<Body>) -> Reply {
    let resp = app.clone().oneshot(req).await.unwrap();
    let status = resp.status();
    let headers = resp.headers().clone();
    let bytes = resp.into_body().collect().await.unwrap().to_bytes().to_vec();
    Reply { status, headers, bytes }
}

fn get(uri: &str, token: Option<&str>) -> Request<Body> {
    let mut b = Request::builder().method("GET").uri(uri);
    if let Some(t) = token {
        b = b.header(header::AUTHORIZATION, format!("Bearer {}", t));
    }
    b.body(Body::empty()).unwrap()
}

fn post_json(uri: &str, token: Option<&str>, body: Value) -> Request<Body> {
    let mut b = Request::builder().method("POST").uri(uri).header(header::CONTENT_TYPE, "application/json");
    if let Some(t) = token {
        b = b.header(header::AUTHORIZATION, format!("Bearer {}", t));
    }
    b.body(Body::from(body.to_string())).unwrap()
}

fn upload(token: &str, filename: &str, content: &str) -> Request<Body> {
    upload_bytes(token, filename, "text/csv", content.as_bytes())
}

fn upload_bytes(token: &str, filename: &str, content_type: &str, content: &[u8]) -> Request<Body> {
    let boundary = "gradebook-test-boundary";
    let mut body = format!(
        "--{b}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{f}\"\r\nContent-Type: {t}\r\n\r\n",
        b = boundary,
        f = filename,
        t = content_type
    )
    .into_bytes();
    body.extend_from_slice(content);
    body.extend_from_slice(format!("\r\n--{}--\r\n", boundary).as_bytes());
    Request::builder()
        .method("POST")
        .uri("/marks/upload")
        .header(header::AUTHORIZATION, format!("Bearer {}", token))
        .header(header::CONTENT_TYPE, format!("multipart/form-data; boundary={}", boundary))
        .body(Body::from(body))
        .unwrap()
}

async fn login(app: &Router, username: &str, password: &str) -> Reply {
    let req = Request::builder()
        .method("POST")
        .uri("/auth/login")
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .body(Body::from(format!("username={}&password={}", username, password)))
        .unwrap();
    send(app, req).await
}

async fn token_for(app: &Router, username: &str, password: &str) -> String {
    let r = login(app, username, password).await;
    assert_eq!(r.status, StatusCode::OK, "login {} failed: {:?}", username, r.json());
    let body = r.json();
    assert_eq!(body["token_type"], "bearer");
    body["access_token"].as_str().unwrap().to_string()
}

async fn bootstrap_teacher(app: &Router) -> String {
    let r = send(
        app,
        post_json("/auth/register", None, json!({"username":"teacher","email":"t@x.com","password":"T123","role":"admin"})),
    )
    .await;
    assert_eq!(r.status, StatusCode::OK, "{:?}", r.json());
    assert_eq!(r.json()["message"], "Admin 'teacher' registered successfully");
    token_for(app, "teacher", "T123").await
}

#[tokio::test]
async fn teacher_and_student_walkthrough() {
    let (_tmp, app) = test_app();
    let admin = bootstrap_teacher(&app).await;

    let r = send(&app, upload(&admin, "marks.csv", DATASET)).await;
    assert_eq!(r.status, StatusCode::OK, "{:?}", r.json());
    let body = r.json();
    assert_eq!(body["message"], "Loaded 2 records. Created 2 student accounts.");
    assert_eq!(body["student_credentials"].as_array().unwrap().len(), 2);
    assert_eq!(body["student_credentials"][0]["username"], "Ann_R1");

    let student = token_for(&app, "Ann_R1", "R1").await;

    let r = send(&app, get("/auth/me", Some(&student))).await;
    assert_eq!(r.status, StatusCode::OK);
    let me = r.json();
    assert_eq!(me["username"], "Ann_R1");
    assert_eq!(me["role"], "student");
    assert_eq!(me["marks_details"]["marks"].as_f64(), Some(90.0));
    assert_eq!(me["marks_details"]["time_study"].as_f64(), Some(3.5));

    let r = send(&app, get("/marks/average", Some(&student))).await;
    assert_eq!(r.status, StatusCode::OK);
    let stats = r.json();
    assert_eq!(stats["average_marks"].as_f64(), Some(65.0));
    assert_eq!(stats["highest_marks"].as_f64(), Some(90.0));
    assert_eq!(stats["lowest_marks"].as_f64(), Some(40.0));

    let r = send(&app, get("/marks/", Some(&student))).await;
    assert_eq!(r.status, StatusCode::OK);
    assert_eq!(r.json().as_array().unwrap().len(), 2);

    let r = send(&app, upload(&student, "marks.csv", DATASET)).await;
    assert_eq!(r.status, StatusCode::FORBIDDEN);
    assert!(r.json()["detail"].as_str().unwrap().contains("Admin (Teacher) role required"));

    let r = send(&app, get("/auth/me", Some(&admin))).await;
    assert_eq!(r.status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn missing_or_bad_tokens_get_a_bearer_challenge() {
    let (_tmp, app) = test_app();
    bootstrap_teacher(&app).await;

    for token in [None, Some("not-a-jwt")] {
        let r = send(&app, get("/marks/average", token)).await;
        assert_eq!(r.status, StatusCode::UNAUTHORIZED);
        assert_eq!(r.headers.get(header::WWW_AUTHENTICATE).unwrap(), "Bearer");
    }

    let r = login(&app, "teacher", "wrong").await;
    assert_eq!(r.status, StatusCode::UNAUTHORIZED);
    assert_eq!(r.json()["detail"], "Invalid username or password");
}

#[tokio::test]
async fn reingestion_revokes_tokens_of_removed_students() {
    let (_tmp, app) = test_app();
    let admin = bootstrap_teacher(&app).await;
    send(&app, upload(&admin, "marks.csv", DATASET)).await;
    let ann = token_for(&app, "Ann_R1", "R1").await;
    let bob = token_for(&app, "Bob_R2", "R2").await;

    let only_bob = "Student Name,Student Roll Number,Marks,Time Studied Per Day (hrs)\nBob,R2,45,1.5\n";
    let r = send(&app, upload(&admin, "marks.csv", only_bob)).await;
    assert_eq!(r.status, StatusCode::OK);

    let r = send(&app, get("/auth/me", Some(&ann))).await;
    assert_eq!(r.status, StatusCode::UNAUTHORIZED);
    assert_eq!(login(&app, "Ann_R1", "R1").await.status, StatusCode::UNAUTHORIZED);

    // the subject is the handle, so Bob's token now names the recreated account
    let r = send(&app, get("/auth/me", Some(&bob))).await;
    assert_eq!(r.status, StatusCode::OK);
    assert_eq!(r.json()["marks_details"]["marks"].as_f64(), Some(45.0));
}

#[tokio::test]
async fn registration_closes_after_first_admin() {
    let (_tmp, app) = test_app();
    let admin = bootstrap_teacher(&app).await;
    let second = json!({"username":"teacher2","email":"t2@x.com","password":"pw"});

    let r = send(&app, post_json("/auth/register", None, second.clone())).await;
    assert_eq!(r.status, StatusCode::UNAUTHORIZED);

    let r = send(&app, post_json("/auth/register", Some(&admin), second.clone())).await;
    assert_eq!(r.status, StatusCode::OK);

    let r = send(&app, post_json("/auth/register", Some(&admin), second)).await;
    assert_eq!(r.status, StatusCode::CONFLICT);

    let req = Request::builder()
        .method("POST")
        .uri("/auth/register")
        .header(header::CONTENT_TYPE, "application/json")
        .header(header::AUTHORIZATION, format!("Bearer {}", admin))
        .body(Body::from("{not json"))
        .unwrap();
    assert_eq!(send(&app, req).await.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn empty_store_and_bad_uploads() {
    let (_tmp, app) = test_app();
    let admin = bootstrap_teacher(&app).await;

    for uri in ["/marks/highest", "/marks/lowest", "/marks/bar-chart", "/marks/histogram"] {
        let r = send(&app, get(uri, Some(&admin))).await;
        assert_eq!(r.status, StatusCode::NOT_FOUND, "{}", uri);
        assert_eq!(r.json()["detail"], "No records found. Load data first.");
    }
    let r = send(&app, get("/marks/average", Some(&admin))).await;
    assert_eq!(r.json()["average_marks"].as_f64(), Some(0.0));

    let r = send(&app, upload(&admin, "marks.txt", DATASET)).await;
    assert_eq!(r.status, StatusCode::BAD_REQUEST);

    let r = send(&app, upload(&admin, "marks.csv", "Student Name,Marks\nAnn,90\n")).await;
    assert_eq!(r.status, StatusCode::BAD_REQUEST);
    assert!(r.json()["detail"].as_str().unwrap().contains("Missing"));

    let r = send(&app, post_json("/marks/load-csv", Some(&admin), json!({}))).await;
    assert_eq!(r.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn load_local_previews_five_credentials() {
    let (tmp, app) = test_app();
    let admin = bootstrap_teacher(&app).await;
    let mut csv = String::from("Student Name,Student Roll Number,Marks,Time Studied Per Day (hrs)\n");
    for i in 1..=7 {
        csv.push_str(&format!("S{},R{},{},{}\n", i, i, 50 + i, i));
    }
    std::fs::write(tmp.path().join("student_dataset_100_records.csv"), csv).unwrap();

    let r = send(&app, post_json("/marks/load-csv", Some(&admin), json!({}))).await;
    assert_eq!(r.status, StatusCode::OK, "{:?}", r.json());
    let body = r.json();
    assert_eq!(body["message"], "Loaded 7 records. Created 7 student accounts.");
    assert_eq!(body["student_credentials"].as_array().unwrap().len(), 5);
}

#[tokio::test]
async fn extremes_charts_and_updates() {
    let (_tmp, app) = test_app();
    let admin = bootstrap_teacher(&app).await;
    send(&app, upload(&admin, "marks.csv", DATASET)).await;

    let r = send(&app, get("/marks/highest", Some(&admin))).await;
    assert_eq!(r.json()["student_id"], "R1");
    let r = send(&app, get("/marks/lowest", Some(&admin))).await;
    assert_eq!(r.json()["student_name"], "Bob");

    let r = send(&app, get("/marks/histogram", Some(&admin))).await;
    assert_eq!(r.status, StatusCode::OK);
    assert_eq!(r.headers.get(header::CONTENT_TYPE).unwrap(), "image/svg+xml");
    assert!(r.bytes.starts_with(b"<svg"));

    let patch = Request::builder()
        .method("PATCH")
        .uri("/marks/R2")
        .header(header::CONTENT_TYPE, "application/json")
        .header(header::AUTHORIZATION, format!("Bearer {}", admin))
        .body(Body::from(json!({"student_name":"Robert","marks":55}).to_string()))
        .unwrap();
    let r = send(&app, patch).await;
    assert_eq!(r.status, StatusCode::OK, "{:?}", r.json());
    assert_eq!(r.json()["marks"].as_f64(), Some(55.0));
    assert_eq!(r.json()["time_study"].as_f64(), Some(1.0));

    assert_eq!(login(&app, "Bob_R2", "R2").await.status, StatusCode::UNAUTHORIZED);
    let robert = token_for(&app, "Robert_R2", "R2").await;

    let patch = Request::builder()
        .method("PATCH")
        .uri("/marks/R1")
        .header(header::CONTENT_TYPE, "application/json")
        .header(header::AUTHORIZATION, format!("Bearer {}", robert))
        .body(Body::from(json!({"marks":100}).to_string()))
        .unwrap();
    assert_eq!(send(&app, patch).await.status, StatusCode::FORBIDDEN);

    let patch = Request::builder()
        .method("PATCH")
        .uri("/marks/R404")
        .header(header::CONTENT_TYPE, "application/json")
        .header(header::AUTHORIZATION, format!("Bearer {}", admin))
        .body(Body::from(json!({"marks":1}).to_string()))
        .unwrap();
    assert_eq!(send(&app, patch).await.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn spreadsheet_upload_provisions_students() {
    let (_tmp, app) = test_app();
    let admin = bootstrap_teacher(&app).await;
    let xlsx = "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";

    let r = send(&app, upload_bytes(&admin, "marks.xlsx", xlsx, include_bytes!("fixtures/marks.xlsx"))).await;
    assert_eq!(r.status, StatusCode::OK, "{:?}", r.json());
    let body = r.json();
    assert_eq!(body["message"], "Loaded 2 records. Created 2 student accounts.");
    assert_eq!(body["student_credentials"][0]["username"], "Ann_2210");
    assert_eq!(body["student_credentials"][0]["password"], "2210");

    let student = token_for(&app, "Ann_2210", "2210").await;
    let r = send(&app, get("/auth/me", Some(&student))).await;
    assert_eq!(r.status, StatusCode::OK);
    assert_eq!(r.json()["marks_details"]["student_id"], "2210");

    // a sheet with an empty mark is rejected and the earlier upload survives
    let r = send(&app, upload_bytes(&admin, "marks_gap.xlsx", xlsx, include_bytes!("fixtures/marks_gap.xlsx"))).await;
    assert_eq!(r.status, StatusCode::BAD_REQUEST);
    let r = send(&app, get("/marks/", Some(&admin))).await;
    assert_eq!(r.json().as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn registration_requires_an_email() {
    let (_tmp, app) = test_app();
    let r = send(&app, post_json("/auth/register", None, json!({"username":"teacher","password":"T123"}))).await;
    assert_eq!(r.status, StatusCode::BAD_REQUEST);
    let r = send(&app, post_json("/auth/register", None, json!({"username":"teacher","email":"  ","password":"T123"}))).await;
    assert_eq!(r.status, StatusCode::BAD_REQUEST);
    // nothing was created, so the bootstrap registration is still open
    bootstrap_teacher(&app).await;
}
