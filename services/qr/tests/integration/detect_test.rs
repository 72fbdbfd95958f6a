use std::io::Cursor;
use std::sync::Arc;

use base64::{Engine, engine::general_purpose::STANDARD};
use chrono::Utc;
use image::{DynamicImage, ImageFormat, Rgba, RgbaImage, imageops};
use uuid::Uuid;

use lk_core::batch::{BatchProcessor, ItemStatus};
use lk_qr::domain::types::{Code, Student};
use lk_qr::error::QrServiceError;
use lk_qr::usecase::detect::{DetectQrBatchUseCase, DetectQrInPhotoUseCase, ImageUpload};
use lk_qr::usecase::validate::ValidateCodeUseCase;
use lk_vision::encoder::{EncodeOptions, render_image};
use lk_vision::scanner::{QrScanner, ScanOptions};

use crate::helpers::{MockCodeRepo, MockStudentRepo, MockTokenRepo, Stores, test_student, test_token};

const TOKEN: &str = "Pq7Rs9Tu1Vw3Xy5Za2Bc4De6";

/// White photo with each payload rendered at the given offset, PNG-encoded.
fn photo(codes: &[(&str, i64, i64)]) -> Vec<u8> {
    let mut canvas = RgbaImage::from_pixel(800, 600, Rgba([255, 255, 255, 255]));
    for (content, x, y) in codes {
        let code = render_image(content, &EncodeOptions::screen()).unwrap();
        imageops::overlay(&mut canvas, &code, *x, *y);
    }
    let mut buf = Vec::new();
    DynamicImage::ImageRgba8(canvas)
        .write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
        .unwrap();
    buf
}

fn registered() -> (Student, Stores) {
    let student = test_student("Davi Rocha", Uuid::new_v4());
    let stores = Stores::new(vec![student.clone()], vec![test_token(student.id, TOKEN)]);
    stores.codes.codes_handle().lock().unwrap().push(Code {
        id: Uuid::new_v4(),
        event_id: student.event_id,
        course_id: student.course_id,
        student_id: Some(student.id),
        code_value: format!("LKSTUDENT_{TOKEN}"),
        token: TOKEN.to_owned(),
        title: student.name.clone(),
        is_published: true,
        created_at: Utc::now(),
    });
    (student, stores)
}

fn usecase(stores: &Stores) -> DetectQrInPhotoUseCase<MockStudentRepo, MockTokenRepo, MockCodeRepo> {
    DetectQrInPhotoUseCase {
        validate: ValidateCodeUseCase {
            students: stores.students.clone(),
            tokens: stores.tokens.clone(),
            codes: stores.codes.clone(),
        },
        scanner: Arc::new(QrScanner::with_default_decoders(ScanOptions::default())),
    }
}

#[tokio::test]
async fn should_identify_student_from_photo() {
    let (student, stores) = registered();
    let code_value = format!("LKSTUDENT_{TOKEN}");

    let detections = usecase(&stores)
        .execute(photo(&[(&code_value, 120, 100)]), None)
        .await
        .unwrap();

    assert_eq!(detections.len(), 1);
    let found = &detections[0];
    assert_eq!(found.qr_code, code_value);
    assert_eq!(found.student.student_id, student.id);
    assert!(found.confidence > 0.0 && found.confidence <= 1.0);
}

#[tokio::test]
async fn should_discard_codes_that_do_not_belong_to_a_student() {
    let (student, stores) = registered();
    let code_value = format!("LKSTUDENT_{TOKEN}");

    let detections = usecase(&stores)
        .execute(
            photo(&[
                (&code_value, 40, 40),
                ("https://example.com/menu", 480, 300),
            ]),
            None,
        )
        .await
        .unwrap();

    assert!(
        detections
            .iter()
            .all(|d| d.student.student_id == student.id)
    );
    assert!(detections.iter().all(|d| d.qr_code == code_value));
}

#[tokio::test]
async fn should_keep_other_students_when_one_lookup_fails() {
    let (davi, mut stores) = registered();
    let bruno = test_student("Bruno Lima", davi.event_id);
    let bruno_token = "Fg8Hj2Kl4Mn6Pq8Rs0Tu2Vw3";
    stores.students.students_handle().lock().unwrap().push(bruno.clone());
    stores
        .tokens
        .tokens_handle()
        .lock()
        .unwrap()
        .push(test_token(bruno.id, bruno_token));
    stores.students = stores.students.failing_on([bruno.id]);

    let davi_code = format!("LKSTUDENT_{TOKEN}");
    let bruno_code = format!("LKSTUDENT_{bruno_token}");
    let detections = usecase(&stores)
        .execute(
            photo(&[(&davi_code, 40, 40), (&bruno_code, 480, 300)]),
            None,
        )
        .await
        .unwrap();

    assert_eq!(detections.len(), 1);
    assert_eq!(detections[0].student.student_id, davi.id);
    assert_eq!(detections[0].qr_code, davi_code);
}

#[tokio::test]
async fn should_return_nothing_for_other_event() {
    let (_, stores) = registered();
    let code_value = format!("LKSTUDENT_{TOKEN}");

    let detections = usecase(&stores)
        .execute(photo(&[(&code_value, 120, 100)]), Some(Uuid::new_v4()))
        .await
        .unwrap();
    assert!(detections.is_empty());
}

#[tokio::test]
async fn should_reject_empty_and_undecodable_images() {
    let (_, stores) = registered();
    let usecase = usecase(&stores);

    let result = usecase.execute(vec![], None).await;
    assert!(
        matches!(result, Err(QrServiceError::Validation(_))),
        "expected Validation, got {result:?}"
    );

    let result = usecase.execute(b"definitely not an image".to_vec(), None).await;
    assert!(
        matches!(result, Err(QrServiceError::Validation(_))),
        "expected Validation, got {result:?}"
    );
}

#[tokio::test]
async fn should_report_each_uploaded_image_separately() {
    let (student, stores) = registered();
    let code_value = format!("LKSTUDENT_{TOKEN}");
    let encoded = STANDARD.encode(photo(&[(&code_value, 120, 100)]));

    let batch = DetectQrBatchUseCase {
        detect: usecase(&stores),
        processor: BatchProcessor::new(10, 2),
    };
    let report = batch
        .execute(
            vec![
                ImageUpload {
                    filename: "front.png".to_owned(),
                    data: Arc::from(format!("data:image/png;base64,{encoded}")),
                },
                ImageUpload {
                    filename: "broken.png".to_owned(),
                    data: Arc::from("%%%not-base64%%%"),
                },
            ],
            None,
        )
        .await
        .unwrap();

    assert_eq!(report.success_count, 1);
    assert_eq!(report.failure_count, 1);
    assert_eq!(report.results[0].item.filename, "front.png");
    let found = report.results[0].data.as_ref().unwrap();
    assert_eq!(found[0].student.student_id, student.id);
    assert_eq!(report.results[1].status, ItemStatus::Failed);
}
