mod common;

use actix_web::{http::header::ContentType, test};
use serde_json::{json, Value};

use common::{bearer, registration, RecordingMailer, TestApp};
use travique_api::models::user::UserRole;

#[actix_rt::test]
async fn test_register_verify_and_login() {
    let test_app = TestApp::new().await;
    let app = test::init_service(test_app.create_app()).await;

    let req = test::TestRequest::post()
        .uri("/api/auth/register")
        .set_json(registration(" Asha@Example.com ", "9876543210"))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 201);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["emailSent"], true);
    assert_eq!(body["user"]["emailId"], "asha@example.com");
    assert_eq!(body["user"]["isEmailVerified"], false);
    assert!(body["user"].get("password").is_none());
    assert!(!body["userId"].as_str().unwrap().is_empty());
    assert_eq!(test_app.mailer.count(), 1);

    let login = json!({ "emailId": "asha@example.com", "password": "secret123" });
    let req = test::TestRequest::post()
        .uri("/api/auth/login")
        .set_json(&login)
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 403);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["error"], "email_not_verified");

    let req = test::TestRequest::post()
        .uri("/api/auth/verify-email")
        .set_json(json!({ "emailId": "asha@example.com", "otp": "000000" }))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), 400);

    let otp = test_app.mailer.last_otp().unwrap();
    let req = test::TestRequest::post()
        .uri("/api/auth/verify-email")
        .set_json(json!({ "emailId": "asha@example.com", "otp": otp }))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), 200);

    let req = test::TestRequest::post()
        .uri("/api/auth/verify-email")
        .set_json(json!({ "emailId": "asha@example.com", "otp": otp }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 400);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["error"], "invalid_or_expired_otp");

    let req = test::TestRequest::post()
        .uri("/api/auth/login")
        .set_json(&login)
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 200);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["message"], "Logged In Successfully");
    let token = body["token"].as_str().unwrap().to_string();

    let req = test::TestRequest::get()
        .uri("/api/auth/profile")
        .insert_header(bearer(&token))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 200);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["user"]["isEmailVerified"], true);
    assert_eq!(body["user"]["role"], "user");
}

#[actix_rt::test]
async fn test_register_rejects_invalid_and_duplicate() {
    let test_app = TestApp::new().await;
    let app = test::init_service(test_app.create_app()).await;

    let mut short_password = registration("a@travique.test", "1111111111");
    short_password["password"] = json!("12345");
    let no_at = registration("not-an-email", "1111111111");
    let mut no_country = registration("b@travique.test", "1111111111");
    no_country["country"] = json!("");

    for body in [short_password, no_at, no_country] {
        let req = test::TestRequest::post()
            .uri("/api/auth/register")
            .set_json(body)
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), 400);
    }

    let req = test::TestRequest::post()
        .uri("/api/auth/register")
        .set_json(registration("c@travique.test", "2222222222"))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), 201);

    for body in [
        registration("C@travique.test", "3333333333"),
        registration("d@travique.test", "2222222222"),
    ] {
        let req = test::TestRequest::post()
            .uri("/api/auth/register")
            .set_json(body)
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), 409);
    }
    assert_eq!(test_app.mailer.count(), 1);
}

#[actix_rt::test]
async fn test_register_survives_mail_failure() {
    let test_app = TestApp::with_mailer(RecordingMailer::failing()).await;
    let app = test::init_service(test_app.create_app()).await;

    let req = test::TestRequest::post()
        .uri("/api/auth/register")
        .set_json(registration("e@travique.test", "4444444444"))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 201);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["emailSent"], false);

    let req = test::TestRequest::post()
        .uri("/api/auth/resend-otp")
        .set_json(json!({ "emailId": "e@travique.test" }))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), 502);
}

#[actix_rt::test]
async fn test_resend_otp_replaces_code() {
    let test_app = TestApp::new().await;
    let app = test::init_service(test_app.create_app()).await;

    let req = test::TestRequest::post()
        .uri("/api/auth/register")
        .set_json(registration("f@travique.test", "5555555555"))
        .to_request();
    test::call_service(&app, req).await;

    let req = test::TestRequest::post()
        .uri("/api/auth/resend-otp")
        .set_json(json!({ "emailId": "nobody@travique.test" }))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), 404);

    let req = test::TestRequest::post()
        .uri("/api/auth/resend-otp")
        .set_json(json!({ "emailId": "f@travique.test" }))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), 200);
    assert_eq!(test_app.mailer.count(), 2);

    let otp = test_app.mailer.last_otp().unwrap();
    let req = test::TestRequest::post()
        .uri("/api/auth/verify-email")
        .set_json(json!({ "emailId": "f@travique.test", "otp": otp }))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), 200);

    let req = test::TestRequest::post()
        .uri("/api/auth/resend-otp")
        .set_json(json!({ "emailId": "f@travique.test" }))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), 400);
}

#[actix_rt::test]
async fn test_login_failures() {
    let test_app = TestApp::new().await;
    let app = test::init_service(test_app.create_app()).await;
    test_app.token_for(UserRole::User).await;

    let cases = [
        (json!({ "emailId": "user0@travique.test" }), 400),
        (json!({ "emailId": "user0@travique.test", "password": "wrong-pass" }), 401),
        (json!({ "emailId": "ghost@travique.test", "password": "password1" }), 401),
        (json!({ "emailId": "user0@travique.test", "password": "password1" }), 200),
    ];
    for (body, status) in cases {
        let req = test::TestRequest::post()
            .uri("/api/auth/login")
            .set_json(body)
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), status);
    }
}

#[actix_rt::test]
async fn test_profile_and_logout() {
    let test_app = TestApp::new().await;
    let app = test::init_service(test_app.create_app()).await;

    let req = test::TestRequest::get().uri("/api/auth/profile").to_request();
    assert_eq!(test::call_service(&app, req).await.status(), 401);

    let req = test::TestRequest::get()
        .uri("/api/auth/profile")
        .insert_header(bearer("garbage"))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 401);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["success"], false);

    let req = test::TestRequest::post().uri("/api/auth/logout").to_request();
    assert_eq!(test::call_service(&app, req).await.status(), 200);
}

#[actix_rt::test]
async fn test_malformed_json_is_a_validation_error() {
    let test_app = TestApp::new().await;
    let app = test::init_service(test_app.create_app()).await;

    let req = test::TestRequest::post()
        .uri("/api/auth/login")
        .insert_header(ContentType::json())
        .set_payload("{ not json")
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 400);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["error"], "validation_error");
}
