//! End-to-end tests of the application approval and registration workflow
//!
//! These tests run against a real PostgreSQL instance and are skipped when
//! `DATABASE_URL` is not set. Each test works with its own generated email
//! addresses so runs do not interfere with each other.

use chrono::{Duration, Utc};
use sqlx::{PgPool, Row};
use uuid::Uuid;

use portal::{
    error::PortalError,
    lifecycle::LifecycleEngine,
    models::{ApplicationStatus, NewApplication, Role},
    notifier::{Notifier, NotifierConfig},
    registration::{RegisterParams, RegistrationGate},
    repositories::{ApplicationRepository, UserRepository, VerificationCodeRepository},
};

async fn test_pool() -> Option<PgPool> {
    let url = std::env::var("DATABASE_URL").ok()?;
    let pool = PgPool::connect(&url).await.expect("connect to test database");

    // Apply the schema; ignore the error when it is already in place.
    let _ = sqlx::raw_sql(include_str!("../migrations/0001_init.sql"))
        .execute(&pool)
        .await;

    Some(pool)
}

fn engine(pool: &PgPool) -> LifecycleEngine {
    LifecycleEngine::new(
        pool.clone(),
        ApplicationRepository::new(pool.clone()),
        UserRepository::new(pool.clone()),
        Notifier::new(NotifierConfig {
            relay_url: None,
            relay_api_key: None,
            from: "noreply@volunteer-portal.org".to_string(),
        }),
    )
}

fn gate(pool: &PgPool) -> RegistrationGate {
    RegistrationGate::new(
        pool.clone(),
        UserRepository::new(pool.clone()),
        VerificationCodeRepository::new(pool.clone()),
        None,
    )
}

fn unique_email(tag: &str) -> String {
    format!("{tag}-{}@example.com", Uuid::new_v4().simple())
}

fn application_for(email: &str) -> NewApplication {
    NewApplication {
        name: "John Doe".to_string(),
        email: email.to_string(),
        phone: Some("555-0100".to_string()),
        motivation: "help".to_string(),
        experience: None,
    }
}

async fn code_count(pool: &PgPool, application_id: Uuid) -> i64 {
    sqlx::query("SELECT count(*) AS n FROM verification_codes WHERE application_id = $1")
        .bind(application_id)
        .fetch_one(pool)
        .await
        .unwrap()
        .get("n")
}

async fn user_count(pool: &PgPool, email: &str) -> i64 {
    sqlx::query("SELECT count(*) AS n FROM users WHERE email = $1")
        .bind(email)
        .fetch_one(pool)
        .await
        .unwrap()
        .get("n")
}

fn volunteer_params(email: &str, code: &str) -> RegisterParams {
    RegisterParams {
        name: "John Doe".to_string(),
        email: email.to_string(),
        password: "volunteer-password-1".to_string(),
        role: Some(Role::Volunteer),
        verification_code: Some(code.to_string()),
        setup_token: None,
    }
}

#[tokio::test]
async fn test_full_approval_and_registration_flow() {
    let Some(pool) = test_pool().await else {
        eprintln!("DATABASE_URL not set; skipping");
        return;
    };
    let engine = engine(&pool);
    let gate = gate(&pool);
    let codes = VerificationCodeRepository::new(pool.clone());
    let applications = ApplicationRepository::new(pool.clone());

    let email = unique_email("john");
    let application = engine.submit(application_for(&email)).await.unwrap();
    assert_eq!(application.status, ApplicationStatus::Pending);

    // A second application with the same email conflicts.
    let err = engine.submit(application_for(&email)).await.unwrap_err();
    assert!(matches!(err, PortalError::Conflict(_)));

    // Approve: the code comes back synchronously and is well-formed.
    let outcome = engine.approve(application.id).await.unwrap();
    assert_eq!(outcome.email, email);
    assert_eq!(outcome.verification_code.len(), 8);
    assert!(
        outcome
            .verification_code
            .chars()
            .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit())
    );

    // The persisted code is unused, linked, and expires in 7 days.
    let found = codes
        .find_by_code(&outcome.verification_code)
        .await
        .unwrap()
        .expect("code persisted");
    assert!(!found.code.used);
    assert_eq!(found.code.application_id, application.id);
    assert_eq!(found.application_status, ApplicationStatus::Approved);
    let window = found.code.expires_at - Utc::now();
    assert!(window > Duration::days(6) && window <= Duration::days(7));

    // A second decision on the same application is rejected outright.
    let err = engine.approve(application.id).await.unwrap_err();
    assert!(matches!(err, PortalError::InvalidState(_)));
    let err = engine.reject(application.id).await.unwrap_err();
    assert!(matches!(err, PortalError::InvalidState(_)));
    assert_eq!(code_count(&pool, application.id).await, 1);

    // Verification is non-destructive: checking twice still works.
    let id = gate
        .verify_code(&outcome.verification_code, &email)
        .await
        .unwrap();
    assert_eq!(id, application.id);
    gate.verify_code(&outcome.verification_code, &email.to_uppercase())
        .await
        .expect("email comparison is case-insensitive");

    // Registration consumes the code and links everything up.
    let user = gate
        .register(RegisterParams {
            name: "John Doe".to_string(),
            email: email.clone(),
            password: "volunteer-password-1".to_string(),
            role: Some(Role::Volunteer),
            verification_code: Some(outcome.verification_code.clone()),
            setup_token: None,
        })
        .await
        .unwrap();
    assert_eq!(user.role, Role::Volunteer);

    let linked = applications.find_by_id(application.id).await.unwrap().unwrap();
    assert_eq!(linked.user_id, Some(user.id));

    let found = codes
        .find_by_code(&outcome.verification_code)
        .await
        .unwrap()
        .unwrap();
    assert!(found.code.used);

    // The consumed code is dead for both verification and registration.
    let err = gate
        .verify_code(&outcome.verification_code, &email)
        .await
        .unwrap_err();
    assert!(err.to_string().contains("already been used"));

    let err = gate
        .register(RegisterParams {
            name: "Impostor".to_string(),
            email: unique_email("impostor"),
            password: "impostor-password-1".to_string(),
            role: Some(Role::Volunteer),
            verification_code: Some(outcome.verification_code.clone()),
            setup_token: None,
        })
        .await
        .unwrap_err();
    assert!(err.to_string().contains("already been used") || err.to_string().contains("match"));
}

#[tokio::test]
async fn test_reject_is_terminal() {
    let Some(pool) = test_pool().await else {
        eprintln!("DATABASE_URL not set; skipping");
        return;
    };
    let engine = engine(&pool);

    let application = engine
        .submit(application_for(&unique_email("rejected")))
        .await
        .unwrap();

    engine.reject(application.id).await.unwrap();

    let err = engine.approve(application.id).await.unwrap_err();
    assert!(matches!(err, PortalError::InvalidState(_)));
    assert_eq!(code_count(&pool, application.id).await, 0);
}

#[tokio::test]
async fn test_unknown_application_is_not_found() {
    let Some(pool) = test_pool().await else {
        eprintln!("DATABASE_URL not set; skipping");
        return;
    };
    let engine = engine(&pool);

    let err = engine.approve(Uuid::new_v4()).await.unwrap_err();
    assert!(matches!(err, PortalError::NotFound(_)));
    let err = engine.reject(Uuid::new_v4()).await.unwrap_err();
    assert!(matches!(err, PortalError::NotFound(_)));
}

#[tokio::test]
async fn test_concurrent_approvals_have_one_winner() {
    let Some(pool) = test_pool().await else {
        eprintln!("DATABASE_URL not set; skipping");
        return;
    };
    let engine = engine(&pool);

    let application = engine
        .submit(application_for(&unique_email("race")))
        .await
        .unwrap();

    let (left, right) = tokio::join!(engine.approve(application.id), engine.approve(application.id));

    let winners = [&left, &right].iter().filter(|r| r.is_ok()).count();
    assert_eq!(winners, 1, "exactly one approval must win");

    let loser = if left.is_ok() { right } else { left };
    assert!(matches!(loser.unwrap_err(), PortalError::InvalidState(_)));

    assert_eq!(code_count(&pool, application.id).await, 1);
}

#[tokio::test]
async fn test_failed_registration_leaves_no_partial_state() {
    let Some(pool) = test_pool().await else {
        eprintln!("DATABASE_URL not set; skipping");
        return;
    };
    let engine = engine(&pool);
    let gate = gate(&pool);
    let codes = VerificationCodeRepository::new(pool.clone());
    let applications = ApplicationRepository::new(pool.clone());

    let email = unique_email("atomic");
    let application = engine.submit(application_for(&email)).await.unwrap();
    let outcome = engine.approve(application.id).await.unwrap();

    // A registration that fails inside the transaction rolls everything
    // back: the code stays unused and no account or link is left behind.
    let wrong_email = unique_email("atomic-other");
    let err = gate
        .register(volunteer_params(&wrong_email, &outcome.verification_code))
        .await
        .unwrap_err();
    assert!(err.to_string().contains("does not match"));

    let found = codes
        .find_by_code(&outcome.verification_code)
        .await
        .unwrap()
        .unwrap();
    assert!(!found.code.used);
    assert_eq!(user_count(&pool, &wrong_email).await, 0);
    let unlinked = applications.find_by_id(application.id).await.unwrap().unwrap();
    assert_eq!(unlinked.user_id, None);

    // Two registrations racing on the same code: one account, one
    // consumption, and the loser's attempt leaves no stranded rows.
    let (left, right) = tokio::join!(
        gate.register(volunteer_params(&email, &outcome.verification_code)),
        gate.register(volunteer_params(&email, &outcome.verification_code))
    );

    let winners = [&left, &right].iter().filter(|r| r.is_ok()).count();
    assert_eq!(winners, 1, "exactly one registration must win");

    let (winner, loser) = if left.is_ok() {
        (left.unwrap(), right.unwrap_err())
    } else {
        (right.unwrap(), left.unwrap_err())
    };
    assert!(
        matches!(loser, PortalError::Conflict(_))
            || loser.to_string().contains("already been used"),
        "unexpected loser error: {loser}"
    );

    assert_eq!(user_count(&pool, &email).await, 1);
    let linked = applications.find_by_id(application.id).await.unwrap().unwrap();
    assert_eq!(linked.user_id, Some(winner.id));
    let found = codes
        .find_by_code(&outcome.verification_code)
        .await
        .unwrap()
        .unwrap();
    assert!(found.code.used);
}

#[tokio::test]
async fn test_concurrent_submissions_settle_as_conflict() {
    let Some(pool) = test_pool().await else {
        eprintln!("DATABASE_URL not set; skipping");
        return;
    };
    let engine = engine(&pool);

    // Both submissions can pass the email pre-checks; the unique index
    // decides, and the loser gets a conflict rather than a server error.
    let email = unique_email("dup-submit");
    let (left, right) = tokio::join!(
        engine.submit(application_for(&email)),
        engine.submit(application_for(&email))
    );

    let winners = [&left, &right].iter().filter(|r| r.is_ok()).count();
    assert_eq!(winners, 1, "exactly one submission must win");

    let loser = if left.is_ok() { right } else { left };
    assert!(matches!(loser.unwrap_err(), PortalError::Conflict(_)));
}

#[tokio::test]
async fn test_volunteer_registration_requires_code() {
    let Some(pool) = test_pool().await else {
        eprintln!("DATABASE_URL not set; skipping");
        return;
    };
    let gate = gate(&pool);

    let err = gate
        .register(RegisterParams {
            name: "No Code".to_string(),
            email: unique_email("nocode"),
            password: "volunteer-password-1".to_string(),
            role: Some(Role::Volunteer),
            verification_code: None,
            setup_token: None,
        })
        .await
        .unwrap_err();
    assert!(err.to_string().contains("Verification code is required"));
}

#[tokio::test]
async fn test_admin_self_registration_requires_setup_token() {
    let Some(pool) = test_pool().await else {
        eprintln!("DATABASE_URL not set; skipping");
        return;
    };

    let no_token_gate = gate(&pool);
    let err = no_token_gate
        .register(RegisterParams {
            name: "Wannabe Admin".to_string(),
            email: unique_email("admin"),
            password: "admin-password-12".to_string(),
            role: Some(Role::Admin),
            verification_code: None,
            setup_token: None,
        })
        .await
        .unwrap_err();
    assert!(matches!(err, PortalError::Forbidden));

    let configured_gate = RegistrationGate::new(
        pool.clone(),
        UserRepository::new(pool.clone()),
        VerificationCodeRepository::new(pool.clone()),
        Some("bootstrap-secret".to_string()),
    );
    let user = configured_gate
        .register(RegisterParams {
            name: "Real Admin".to_string(),
            email: unique_email("admin"),
            password: "admin-password-12".to_string(),
            role: Some(Role::Admin),
            verification_code: None,
            setup_token: Some("bootstrap-secret".to_string()),
        })
        .await
        .unwrap();
    assert_eq!(user.role, Role::Admin);
}

#[tokio::test]
async fn test_submission_conflicts_with_existing_user_email() {
    let Some(pool) = test_pool().await else {
        eprintln!("DATABASE_URL not set; skipping");
        return;
    };
    let engine = engine(&pool);
    let gate = gate(&pool);

    // Coordinators register without a code; their email then blocks a new
    // application.
    let email = unique_email("coordinator");
    gate.register(RegisterParams {
        name: "Coordinator".to_string(),
        email: email.clone(),
        password: "coordinator-pass-1".to_string(),
        role: Some(Role::Coordinator),
        verification_code: None,
        setup_token: None,
    })
    .await
    .unwrap();

    let err = engine.submit(application_for(&email)).await.unwrap_err();
    assert!(matches!(err, PortalError::Conflict(_)));
}

#[tokio::test]
async fn test_expired_code_is_rejected() {
    let Some(pool) = test_pool().await else {
        eprintln!("DATABASE_URL not set; skipping");
        return;
    };
    let engine = engine(&pool);
    let gate = gate(&pool);

    let email = unique_email("expired");
    let application = engine.submit(application_for(&email)).await.unwrap();
    let outcome = engine.approve(application.id).await.unwrap();

    // Age the code past its window.
    sqlx::query("UPDATE verification_codes SET expires_at = now() - interval '1 hour' WHERE application_id = $1")
        .bind(application.id)
        .execute(&pool)
        .await
        .unwrap();

    let err = gate
        .verify_code(&outcome.verification_code, &email)
        .await
        .unwrap_err();
    assert!(err.to_string().contains("expired"));

    let err = gate
        .register(RegisterParams {
            name: "Late".to_string(),
            email: email.clone(),
            password: "volunteer-password-1".to_string(),
            role: Some(Role::Volunteer),
            verification_code: Some(outcome.verification_code),
            setup_token: None,
        })
        .await
        .unwrap_err();
    assert!(err.to_string().contains("expired"));
}
