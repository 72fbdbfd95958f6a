use std::sync::Arc;

use sea_orm::DatabaseConnection;

use lk_core::batch::BatchProcessor;
use lk_vision::scanner::QrScanner;

use crate::config::QrConfig;
use crate::infra::cache::QrCache;
use crate::infra::db::{
    DbCodeRepository, DbNotificationRepository, DbStudentRepository, DbTokenRepository,
};
use crate::infra::whatsapp::WhatsAppClient;
use crate::usecase::batch::batch_processor;
use crate::usecase::detect::DetectQrInPhotoUseCase;
use crate::usecase::qr::GenerateStudentQrUseCase;
use crate::usecase::validate::ValidateCodeUseCase;

/// Shared application state passed to every handler via axum `State`.
#[derive(Clone)]
pub struct AppState {
    pub db: DatabaseConnection,
    pub config: Arc<QrConfig>,
    pub cache: QrCache,
    pub scanner: Arc<QrScanner>,
    pub whatsapp: WhatsAppClient,
}

impl AppState {
    pub fn student_repo(&self) -> DbStudentRepository {
        DbStudentRepository {
            db: self.db.clone(),
        }
    }

    pub fn token_repo(&self) -> DbTokenRepository {
        DbTokenRepository {
            db: self.db.clone(),
        }
    }

    pub fn code_repo(&self) -> DbCodeRepository {
        DbCodeRepository {
            db: self.db.clone(),
        }
    }

    pub fn notification_repo(&self) -> DbNotificationRepository {
        DbNotificationRepository {
            db: self.db.clone(),
        }
    }

    pub fn batch_processor(
        &self,
        size_override: Option<usize>,
        concurrency_override: Option<usize>,
    ) -> BatchProcessor {
        batch_processor(
            self.config.batch_size,
            self.config.concurrency_limit,
            size_override,
            concurrency_override,
        )
    }

    pub fn generate_qr_usecase(
        &self,
    ) -> GenerateStudentQrUseCase<DbStudentRepository, DbTokenRepository, DbCodeRepository, QrCache>
    {
        GenerateStudentQrUseCase {
            students: self.student_repo(),
            tokens: self.token_repo(),
            codes: self.code_repo(),
            cache: self.cache.clone(),
            portal_base_url: self.config.portal_base_url.clone(),
            token_ttl: self.config.token_ttl(),
        }
    }

    pub fn validate_code_usecase(
        &self,
    ) -> ValidateCodeUseCase<DbStudentRepository, DbTokenRepository, DbCodeRepository> {
        ValidateCodeUseCase {
            students: self.student_repo(),
            tokens: self.token_repo(),
            codes: self.code_repo(),
        }
    }

    pub fn detect_usecase(
        &self,
    ) -> DetectQrInPhotoUseCase<DbStudentRepository, DbTokenRepository, DbCodeRepository> {
        DetectQrInPhotoUseCase {
            validate: self.validate_code_usecase(),
            scanner: Arc::clone(&self.scanner),
        }
    }
}
