use std::time::Duration as StdDuration;

use uuid::Uuid;

use lk_qr::domain::types::{QrFormat, QrVariant};
use lk_qr::error::QrServiceError;
use lk_qr::infra::cache::QrCache;
use lk_qr::usecase::qr::{GenerateQrInput, GenerateStudentQrUseCase};
use lk_qr::usecase::token::{EnsureTokenUseCase, RotateTokenUseCase, ValidatePortalUrlUseCase};

use crate::helpers::{
    MockStudentRepo, MockTokenRepo, PORTAL_BASE_URL, Stores, test_student, test_token, token_ttl,
};

const TOKEN: &str = "q8Jf0V1l2bYwz3aR7xKc9Qab";

// ── EnsureTokenUseCase ───────────────────────────────────────────────────────

#[tokio::test]
async fn should_issue_token_once_and_reuse_it() {
    let student = test_student("Ana Souza", Uuid::new_v4());
    let stores = Stores::new(vec![student.clone()], vec![]);

    let usecase = EnsureTokenUseCase {
        students: stores.students.clone(),
        tokens: stores.tokens.clone(),
        portal_base_url: PORTAL_BASE_URL.to_owned(),
        token_ttl: token_ttl(),
    };

    let first = usecase.execute(student.id).await.unwrap();
    let second = usecase.execute(student.id).await.unwrap();

    assert!(first.created);
    assert!(!second.created);
    assert_eq!(first.token, second.token);
    assert_eq!(first.token.len(), 32);
    assert_eq!(
        first.portal_url,
        format!("{PORTAL_BASE_URL}/f/{}", first.token)
    );
    assert_eq!(stores.tokens.tokens_handle().lock().unwrap().len(), 1);
}

#[tokio::test]
async fn should_reissue_token_when_active_one_expired() {
    let student = test_student("Ana Souza", Uuid::new_v4());
    let mut expired = test_token(student.id, TOKEN);
    expired.expires_at = chrono::Utc::now() - chrono::Duration::days(1);
    let stores = Stores::new(vec![student.clone()], vec![expired]);

    let usecase = EnsureTokenUseCase {
        students: stores.students.clone(),
        tokens: stores.tokens.clone(),
        portal_base_url: PORTAL_BASE_URL.to_owned(),
        token_ttl: token_ttl(),
    };

    let out = usecase.execute(student.id).await.unwrap();
    assert!(out.created);
    assert_ne!(out.token, TOKEN);

    let tokens = stores.tokens.tokens_handle();
    let tokens = tokens.lock().unwrap();
    assert_eq!(tokens.iter().filter(|t| t.is_active).count(), 1);
    assert!(!tokens.iter().find(|t| t.token == TOKEN).unwrap().is_active);
}

#[tokio::test]
async fn should_hand_concurrent_ensure_calls_the_same_token() {
    let student = test_student("Ana Souza", Uuid::new_v4());
    let mut stores = Stores::new(vec![student.clone()], vec![]);
    stores.tokens = stores.tokens.yielding();

    let usecase = EnsureTokenUseCase {
        students: stores.students.clone(),
        tokens: stores.tokens.clone(),
        portal_base_url: PORTAL_BASE_URL.to_owned(),
        token_ttl: token_ttl(),
    };

    let (a, b) = tokio::join!(usecase.execute(student.id), usecase.execute(student.id));
    let (a, b) = (a.unwrap(), b.unwrap());

    assert_eq!(a.token, b.token);
    assert!(a.created != b.created, "exactly one caller mints the token");
    let tokens = stores.tokens.tokens_handle();
    let tokens = tokens.lock().unwrap();
    assert_eq!(tokens.len(), 1);
    assert!(tokens[0].is_valid());
}

#[tokio::test]
async fn should_return_student_not_found_when_ensuring_unknown_student() {
    let stores = Stores::new(vec![], vec![]);
    let usecase = EnsureTokenUseCase {
        students: stores.students,
        tokens: stores.tokens,
        portal_base_url: PORTAL_BASE_URL.to_owned(),
        token_ttl: token_ttl(),
    };

    let result = usecase.execute(Uuid::new_v4()).await;
    assert!(
        matches!(result, Err(QrServiceError::StudentNotFound)),
        "expected StudentNotFound, got {result:?}"
    );
}

// ── RotateTokenUseCase ───────────────────────────────────────────────────────

#[tokio::test]
async fn should_rotate_token_unpublish_codes_and_drop_cached_renderings() {
    let student = test_student("Bruno Lima", Uuid::new_v4());
    let stores = Stores::new(vec![student.clone()], vec![]);
    let cache = QrCache::new(StdDuration::from_secs(3600));

    let generate = GenerateStudentQrUseCase {
        students: stores.students.clone(),
        tokens: stores.tokens.clone(),
        codes: stores.codes.clone(),
        cache: cache.clone(),
        portal_base_url: PORTAL_BASE_URL.to_owned(),
        token_ttl: token_ttl(),
    };
    let input = GenerateQrInput {
        student_id: student.id,
        variant: QrVariant::Screen,
        format: QrFormat::Png,
    };
    let before = generate.execute(input).await.unwrap();
    assert_eq!(cache.stats().entries, 1);

    let rotate = RotateTokenUseCase {
        students: stores.students.clone(),
        tokens: stores.tokens.clone(),
        cache: cache.clone(),
        portal_base_url: PORTAL_BASE_URL.to_owned(),
        token_ttl: token_ttl(),
    };
    let rotated = rotate.execute(student.id).await.unwrap();

    assert_ne!(rotated.token, before.token);
    assert_eq!(cache.stats().entries, 0);
    {
        let tokens = stores.tokens.tokens_handle();
        let tokens = tokens.lock().unwrap();
        let old = tokens.iter().find(|t| t.token == before.token).unwrap();
        assert!(!old.is_active);
    }
    assert!(
        stores
            .codes
            .codes_handle()
            .lock()
            .unwrap()
            .iter()
            .all(|c| !c.is_published)
    );

    let after = generate.execute(input).await.unwrap();
    assert!(!after.cached);
    assert_eq!(after.token, rotated.token);
    assert_eq!(after.code_value, format!("LKSTUDENT_{}", rotated.token));
}

// ── ValidatePortalUrlUseCase ─────────────────────────────────────────────────

fn portal_usecase(stores: &Stores) -> ValidatePortalUrlUseCase<MockStudentRepo, MockTokenRepo> {
    ValidatePortalUrlUseCase {
        students: stores.students.clone(),
        tokens: stores.tokens.clone(),
        portal_base_url: PORTAL_BASE_URL.to_owned(),
    }
}

#[tokio::test]
async fn should_resolve_portal_url_to_student() {
    let student = test_student("Carla Dias", Uuid::new_v4());
    let stores = Stores::new(vec![student.clone()], vec![test_token(student.id, TOKEN)]);

    let access = portal_usecase(&stores)
        .execute(&format!("{PORTAL_BASE_URL}/f/{TOKEN}?utm=sticker"))
        .await
        .unwrap();

    assert_eq!(access.student_id, student.id);
    assert_eq!(access.student_name, "Carla Dias");
    assert_eq!(access.token, TOKEN);
}

#[tokio::test]
async fn should_accept_bare_token_and_code_value() {
    let student = test_student("Carla Dias", Uuid::new_v4());
    let stores = Stores::new(vec![student.clone()], vec![test_token(student.id, TOKEN)]);
    let usecase = portal_usecase(&stores);

    assert_eq!(usecase.execute(TOKEN).await.unwrap().student_id, student.id);
    assert_eq!(
        usecase
            .execute(&format!("LKSTUDENT_{TOKEN}"))
            .await
            .unwrap()
            .student_id,
        student.id
    );
}

#[tokio::test]
async fn should_resolve_legacy_code_through_active_token() {
    let student = test_student("Carla Dias", Uuid::new_v4());
    let stores = Stores::new(vec![student.clone()], vec![test_token(student.id, TOKEN)]);

    let legacy = format!("STUDENT:{}:carla  dias:{}", student.id, student.event_id);
    let access = portal_usecase(&stores).execute(&legacy).await.unwrap();
    assert_eq!(access.token, TOKEN);
}

#[tokio::test]
async fn should_reject_inactive_token() {
    let student = test_student("Carla Dias", Uuid::new_v4());
    let mut token = test_token(student.id, TOKEN);
    token.is_active = false;
    let stores = Stores::new(vec![student], vec![token]);

    let result = portal_usecase(&stores).execute(TOKEN).await;
    assert!(
        matches!(result, Err(QrServiceError::TokenNotFound)),
        "expected TokenNotFound, got {result:?}"
    );
}

#[tokio::test]
async fn should_reject_unrecognized_and_empty_input() {
    let stores = Stores::new(vec![], vec![]);
    let usecase = portal_usecase(&stores);

    let result = usecase.execute("https://elsewhere.example.com/").await;
    assert!(
        matches!(result, Err(QrServiceError::TokenNotFound)),
        "expected TokenNotFound, got {result:?}"
    );

    let result = usecase.execute("   ").await;
    assert!(
        matches!(result, Err(QrServiceError::Validation(_))),
        "expected Validation, got {result:?}"
    );
}
