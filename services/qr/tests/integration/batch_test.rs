use std::time::Duration as StdDuration;

use uuid::Uuid;

use lk_core::batch::{BatchProcessor, ItemStatus};
use lk_qr::domain::types::{QrFormat, QrVariant};
use lk_qr::error::QrServiceError;
use lk_qr::infra::cache::QrCache;
use lk_qr::usecase::batch::{BatchGenerateQrUseCase, BatchValidateCodesUseCase};
use lk_qr::usecase::qr::GenerateStudentQrUseCase;
use lk_qr::usecase::validate::ValidateCodeUseCase;

use crate::helpers::{PORTAL_BASE_URL, Stores, test_student, test_token, token_ttl};

#[tokio::test]
async fn should_isolate_failing_items_and_keep_input_order() {
    let event_id = Uuid::new_v4();
    let students: Vec<_> = (0..5)
        .map(|i| test_student(&format!("Student {i}"), event_id))
        .collect();
    let ids: Vec<Uuid> = students.iter().map(|s| s.id).collect();

    let mut stores = Stores::new(students, vec![]);
    stores.students = stores.students.failing_on([ids[1], ids[3]]);

    let usecase = BatchGenerateQrUseCase {
        generate: GenerateStudentQrUseCase {
            students: stores.students.clone(),
            tokens: stores.tokens.clone(),
            codes: stores.codes.clone(),
            cache: QrCache::new(StdDuration::from_secs(3600)),
            portal_base_url: PORTAL_BASE_URL.to_owned(),
            token_ttl: token_ttl(),
        },
        processor: BatchProcessor::new(10, 2),
    };

    let report = usecase
        .execute(ids.clone(), QrVariant::Print, QrFormat::Png)
        .await
        .unwrap();

    assert_eq!(report.total_requested, 5);
    assert_eq!(report.success_count, 3);
    assert_eq!(report.failure_count, 2);

    let statuses: Vec<_> = report.results.iter().map(|r| r.status).collect();
    assert_eq!(
        statuses,
        vec![
            ItemStatus::Success,
            ItemStatus::Failed,
            ItemStatus::Success,
            ItemStatus::Failed,
            ItemStatus::Success,
        ]
    );
    for (i, result) in report.results.iter().enumerate() {
        assert_eq!(result.index, i);
        assert_eq!(result.item, ids[i]);
    }
    assert!(report.results[1].data.is_none());
    assert!(report.results[1].error.is_some());
    assert_eq!(
        report.results[0].data.as_ref().unwrap().student_name,
        "Student 0"
    );
    assert_eq!(stores.codes.codes_handle().lock().unwrap().len(), 3);
}

#[tokio::test]
async fn should_generate_repeated_student_once() {
    let event_id = Uuid::new_v4();
    let ana = test_student("Ana Souza", event_id);
    let bruno = test_student("Bruno Lima", event_id);
    let mut stores = Stores::new(vec![ana.clone(), bruno.clone()], vec![]);
    stores.tokens = stores.tokens.yielding();

    let usecase = BatchGenerateQrUseCase {
        generate: GenerateStudentQrUseCase {
            students: stores.students.clone(),
            tokens: stores.tokens.clone(),
            codes: stores.codes.clone(),
            cache: QrCache::new(StdDuration::from_secs(3600)),
            portal_base_url: PORTAL_BASE_URL.to_owned(),
            token_ttl: token_ttl(),
        },
        processor: BatchProcessor::new(10, 3),
    };

    let report = usecase
        .execute(vec![ana.id, ana.id, bruno.id], QrVariant::Print, QrFormat::Png)
        .await
        .unwrap();

    assert_eq!(report.total_requested, 2);
    assert_eq!(report.success_count, 2);
    let items: Vec<Uuid> = report.results.iter().map(|r| r.item).collect();
    assert_eq!(items, vec![ana.id, bruno.id]);

    let tokens = stores.tokens.tokens_handle();
    let tokens = tokens.lock().unwrap();
    assert_eq!(tokens.iter().filter(|t| t.student_id == ana.id).count(), 1);
}

#[tokio::test]
async fn should_reject_empty_batch() {
    let stores = Stores::new(vec![], vec![]);
    let usecase = BatchGenerateQrUseCase {
        generate: GenerateStudentQrUseCase {
            students: stores.students.clone(),
            tokens: stores.tokens.clone(),
            codes: stores.codes.clone(),
            cache: QrCache::new(StdDuration::from_secs(3600)),
            portal_base_url: PORTAL_BASE_URL.to_owned(),
            token_ttl: token_ttl(),
        },
        processor: BatchProcessor::new(10, 2),
    };

    let result = usecase
        .execute(vec![], QrVariant::Screen, QrFormat::Png)
        .await;
    assert!(
        matches!(result, Err(QrServiceError::Validation(_))),
        "expected Validation, got {result:?}"
    );
}

#[tokio::test]
async fn should_report_unresolved_codes_as_failed_items() {
    let student = test_student("Ana Souza", Uuid::new_v4());
    let token = "Hk3sP9qW1eR5tY7uI2oA4sD6";
    let stores = Stores::new(vec![student.clone()], vec![test_token(student.id, token)]);

    let usecase = BatchValidateCodesUseCase {
        validate: ValidateCodeUseCase {
            students: stores.students.clone(),
            tokens: stores.tokens.clone(),
            codes: stores.codes.clone(),
        },
        processor: BatchProcessor::new(2, 2),
    };

    let report = usecase
        .execute(
            vec![
                format!("LKSTUDENT_{token}"),
                "garbage".to_owned(),
                format!("STUDENT:{}:Ana Souza:{}", student.id, student.event_id),
            ],
            None,
        )
        .await
        .unwrap();

    assert_eq!(report.success_count, 2);
    assert_eq!(report.failure_count, 1);
    assert_eq!(report.results[1].status, ItemStatus::Failed);
    assert_eq!(report.results[1].item, "garbage");
    assert_eq!(
        report.results[2].data.as_ref().unwrap().qr_type,
        "legacy_student"
    );
}
