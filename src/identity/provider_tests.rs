use super::*;
use chrono::Duration;

fn provider() -> (tempfile::TempDir, LocalAuthProvider) {
    let tmp = tempfile::tempdir().unwrap();
    let store = SharedStore::new(tmp.path()).unwrap();
    let tokens = TokenIssuer::new(b"provider-tests-signing-key-0123456", Duration::minutes(30));
    (tmp, LocalAuthProvider::new(store, tokens))
}

fn teacher_request() -> RegisterRequest {
    RegisterRequest { username: "teacher".into(), email: "t@x.com".into(), password: "T123".into(), role: "admin".into() }
}

#[test]
fn first_admin_registers_without_token_then_logs_in() {
    let (_tmp, p) = provider();
    let created = p.register(None, &teacher_request()).unwrap();
    assert_eq!(created.role, Role::Admin);
    assert_ne!(created.secret_hash, "T123");

    let resp = p.login(&LoginRequest { username: "teacher".into(), password: "T123".into() }).unwrap();
    assert_eq!(resp.token_type, "bearer");
    let who = p.resolve(&resp.access_token).unwrap();
    assert_eq!(who.handle, "teacher");
}

#[test]
fn later_registrations_need_an_admin_caller() {
    let (_tmp, p) = provider();
    let teacher = p.register(None, &teacher_request()).unwrap();
    let second = RegisterRequest { username: "teacher2".into(), email: "t2@x.com".into(), password: "pw".into(), role: "admin".into() };

    let err = p.register(None, &second).unwrap_err();
    assert_eq!(err.http_status(), 401);

    let student = Identity { id: 99, handle: "Ann_R1".into(), contact: None, secret_hash: String::new(), role: Role::Student };
    let err = p.register(Some(student), &second).unwrap_err();
    assert_eq!(err.http_status(), 403);

    p.register(Some(teacher), &second).unwrap();
}

#[test]
fn duplicates_conflict_and_students_cannot_register() {
    let (_tmp, p) = provider();
    let teacher = p.register(None, &teacher_request()).unwrap();

    let err = p.register(Some(teacher.clone()), &teacher_request()).unwrap_err();
    assert_eq!(err.code_str(), "duplicate_username");

    let same_email = RegisterRequest { username: "other".into(), ..teacher_request() };
    let err = p.register(Some(teacher.clone()), &same_email).unwrap_err();
    assert_eq!(err.code_str(), "duplicate_email");

    let student = RegisterRequest { username: "kid".into(), email: "kid@x.com".into(), password: "pw".into(), role: "student".into() };
    let err = p.register(Some(teacher), &student).unwrap_err();
    assert_eq!(err.http_status(), 400);
}

#[test]
fn login_failures_are_indistinguishable() {
    let (_tmp, p) = provider();
    p.register(None, &teacher_request()).unwrap();
    let wrong_pw = p.login(&LoginRequest { username: "teacher".into(), password: "nope".into() }).unwrap_err();
    let unknown = p.login(&LoginRequest { username: "ghost".into(), password: "T123".into() }).unwrap_err();
    assert_eq!(wrong_pw, unknown);
    assert_eq!(wrong_pw.http_status(), 401);
}

#[test]
fn token_for_deleted_identity_is_rejected() {
    let (_tmp, p) = provider();
    p.store
        .transaction(|t| t.insert_identity("Ann_R1", None, hash_password("R1")?, Role::Student).map(|_| ()))
        .unwrap();
    let token = p.login(&LoginRequest { username: "Ann_R1".into(), password: "R1".into() }).unwrap().access_token;
    assert!(p.resolve(&token).is_ok());

    p.store.transaction(|t| Ok(t.delete_identities_with_role(Role::Student))).unwrap();
    let err = p.resolve(&token).unwrap_err();
    assert_eq!(err.http_status(), 401);
}

#[test]
fn registration_needs_an_email() {
    let (_tmp, p) = provider();
    let blank = RegisterRequest { email: "   ".into(), ..teacher_request() };
    let err = p.register(None, &blank).unwrap_err();
    assert_eq!(err.code_str(), "invalid_registration");
    assert_eq!(err.http_status(), 400);
    // the rejected attempt did not use up the bootstrap slot
    let created = p.register(None, &RegisterRequest { email: " t@x.com ".into(), ..teacher_request() }).unwrap();
    assert_eq!(created.contact.as_deref(), Some("t@x.com"));
}
