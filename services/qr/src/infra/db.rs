use anyhow::Context as _;
use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait,
    ActiveValue::Set,
    ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder,
    TransactionTrait,
    sea_query::{Expr, OnConflict},
};
use tracing::warn;
use uuid::Uuid;

use lk_qr_schema::{
    access_tokens, codes, students, whatsapp_notification_attempts, whatsapp_notifications,
};

use crate::domain::repository::{
    CodeRepository, NotificationRepository, StudentRepository, TokenRepository,
};
use crate::domain::types::{
    AccessToken, Code, Notification, NotificationAttempt, NotificationStatus, QrMetadata, Student,
};
use crate::error::QrServiceError;

/// Database failures surface to callers as `EXTERNAL_SERVICE` (502).
fn db_error<E: std::fmt::Debug>(what: &'static str) -> impl FnOnce(E) -> QrServiceError {
    move |e| {
        warn!(error = ?e, operation = what, "database call failed");
        QrServiceError::ExternalService(format!("database: {what}"))
    }
}

// ── Student repository ────────────────────────────────────────────────────────

#[derive(Clone)]
pub struct DbStudentRepository {
    pub db: DatabaseConnection,
}

impl StudentRepository for DbStudentRepository {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Student>, QrServiceError> {
        let model = students::Entity::find_by_id(id)
            .one(&self.db)
            .await
            .map_err(db_error("find student by id"))?;
        Ok(model.map(student_from_model))
    }

    async fn update_qr_metadata(&self, id: Uuid, qr: &QrMetadata) -> Result<(), QrServiceError> {
        let model = students::Entity::find_by_id(id)
            .one(&self.db)
            .await
            .map_err(db_error("load student metadata"))?
            .ok_or(QrServiceError::StudentNotFound)?;

        let metadata = merge_qr_metadata(model.metadata, qr)?;
        students::ActiveModel {
            id: Set(id),
            metadata: Set(metadata),
            ..Default::default()
        }
        .update(&self.db)
        .await
        .map_err(db_error("update student qr metadata"))?;
        Ok(())
    }
}

/// Overlay the QR keys onto an existing metadata bag. Non-object bags are replaced.
pub fn merge_qr_metadata(
    metadata: serde_json::Value,
    qr: &QrMetadata,
) -> Result<serde_json::Value, QrServiceError> {
    let mut bag = match metadata {
        serde_json::Value::Object(map) => map,
        _ => serde_json::Map::new(),
    };
    let qr = serde_json::to_value(qr).context("serialize qr metadata")?;
    if let serde_json::Value::Object(fields) = qr {
        bag.extend(fields);
    }
    Ok(serde_json::Value::Object(bag))
}

fn student_from_model(model: students::Model) -> Student {
    Student {
        id: model.id,
        name: model.name,
        event_id: model.event_id,
        course_id: model.course_id,
        metadata: model.metadata,
        created_at: model.created_at,
    }
}

// ── Token repository ──────────────────────────────────────────────────────────

#[derive(Clone)]
pub struct DbTokenRepository {
    pub db: DatabaseConnection,
}

impl TokenRepository for DbTokenRepository {
    async fn find_active_for_student(
        &self,
        student_id: Uuid,
    ) -> Result<Option<AccessToken>, QrServiceError> {
        let model = access_tokens::Entity::find()
            .filter(access_tokens::Column::StudentId.eq(student_id))
            .filter(access_tokens::Column::IsActive.eq(true))
            .filter(access_tokens::Column::ExpiresAt.gt(Utc::now()))
            .order_by_desc(access_tokens::Column::CreatedAt)
            .one(&self.db)
            .await
            .map_err(db_error("find active token for student"))?;
        Ok(model.map(token_from_model))
    }

    async fn find_by_token(&self, token: &str) -> Result<Option<AccessToken>, QrServiceError> {
        let model = access_tokens::Entity::find()
            .filter(access_tokens::Column::Token.eq(token))
            .one(&self.db)
            .await
            .map_err(db_error("find token by value"))?;
        Ok(model.map(token_from_model))
    }

    async fn claim_active(&self, candidate: &AccessToken) -> Result<AccessToken, QrServiceError> {
        let candidate = candidate.clone();
        let student_id = candidate.student_id;
        let model = self
            .db
            .transaction::<_, Option<access_tokens::Model>, sea_orm::DbErr>(|txn| {
                Box::pin(async move {
                    // An expired row still holds the one-active-per-student slot.
                    access_tokens::Entity::update_many()
                        .col_expr(access_tokens::Column::IsActive, Expr::value(false))
                        .filter(access_tokens::Column::StudentId.eq(candidate.student_id))
                        .filter(access_tokens::Column::IsActive.eq(true))
                        .filter(access_tokens::Column::ExpiresAt.lte(Utc::now()))
                        .exec(txn)
                        .await?;

                    // A concurrent claim wins through uq_access_tokens_active_student.
                    access_tokens::Entity::insert(token_active_model(&candidate))
                        .on_conflict(OnConflict::new().do_nothing().to_owned())
                        .exec_without_returning(txn)
                        .await?;

                    access_tokens::Entity::find()
                        .filter(access_tokens::Column::StudentId.eq(candidate.student_id))
                        .filter(access_tokens::Column::IsActive.eq(true))
                        .one(txn)
                        .await
                })
            })
            .await
            .map_err(db_error("claim active token"))?;
        model.map(token_from_model).ok_or_else(|| {
            anyhow::anyhow!("no active token for student {student_id} after claim").into()
        })
    }

    async fn rotate(&self, token: &AccessToken) -> Result<(), QrServiceError> {
        let token = token.clone();
        self.db
            .transaction::<_, (), sea_orm::DbErr>(|txn| {
                Box::pin(async move {
                    deactivate_tokens(txn, token.student_id).await?;
                    unpublish_codes(txn, token.student_id).await?;
                    insert_token(txn, &token).await
                })
            })
            .await
            .map_err(db_error("rotate token"))?;
        Ok(())
    }
}

async fn deactivate_tokens<C: ConnectionTrait>(
    conn: &C,
    student_id: Uuid,
) -> Result<(), sea_orm::DbErr> {
    access_tokens::Entity::update_many()
        .col_expr(access_tokens::Column::IsActive, Expr::value(false))
        .filter(access_tokens::Column::StudentId.eq(student_id))
        .filter(access_tokens::Column::IsActive.eq(true))
        .exec(conn)
        .await?;
    Ok(())
}

async fn insert_token<C: ConnectionTrait>(
    conn: &C,
    token: &AccessToken,
) -> Result<(), sea_orm::DbErr> {
    token_active_model(token).insert(conn).await?;
    Ok(())
}

fn token_active_model(token: &AccessToken) -> access_tokens::ActiveModel {
    access_tokens::ActiveModel {
        id: Set(token.id),
        student_id: Set(token.student_id),
        token: Set(token.token.clone()),
        expires_at: Set(token.expires_at),
        is_active: Set(token.is_active),
        created_at: Set(token.created_at),
    }
}

fn token_from_model(model: access_tokens::Model) -> AccessToken {
    AccessToken {
        id: model.id,
        student_id: model.student_id,
        token: model.token,
        expires_at: model.expires_at,
        is_active: model.is_active,
        created_at: model.created_at,
    }
}

// ── Code repository ───────────────────────────────────────────────────────────

#[derive(Clone)]
pub struct DbCodeRepository {
    pub db: DatabaseConnection,
}

impl CodeRepository for DbCodeRepository {
    async fn find_published_by_token(&self, token: &str) -> Result<Option<Code>, QrServiceError> {
        let model = codes::Entity::find()
            .filter(codes::Column::Token.eq(token))
            .filter(codes::Column::IsPublished.eq(true))
            .order_by_desc(codes::Column::CreatedAt)
            .one(&self.db)
            .await
            .map_err(db_error("find code by token"))?;
        Ok(model.map(code_from_model))
    }

    async fn find_primary_for_student(
        &self,
        student_id: Uuid,
    ) -> Result<Option<Code>, QrServiceError> {
        let model = codes::Entity::find()
            .filter(codes::Column::StudentId.eq(student_id))
            .filter(codes::Column::IsPublished.eq(true))
            .order_by_desc(codes::Column::CreatedAt)
            .one(&self.db)
            .await
            .map_err(db_error("find primary code for student"))?;
        Ok(model.map(code_from_model))
    }

    async fn replace_primary(&self, code: &Code) -> Result<(), QrServiceError> {
        let code = code.clone();
        self.db
            .transaction::<_, (), sea_orm::DbErr>(|txn| {
                Box::pin(async move {
                    if let Some(student_id) = code.student_id {
                        unpublish_codes(txn, student_id).await?;
                    }
                    insert_code(txn, &code).await
                })
            })
            .await
            .map_err(db_error("replace primary code"))?;
        Ok(())
    }
}

async fn unpublish_codes<C: ConnectionTrait>(
    conn: &C,
    student_id: Uuid,
) -> Result<(), sea_orm::DbErr> {
    codes::Entity::update_many()
        .col_expr(codes::Column::IsPublished, Expr::value(false))
        .filter(codes::Column::StudentId.eq(student_id))
        .filter(codes::Column::IsPublished.eq(true))
        .exec(conn)
        .await?;
    Ok(())
}

async fn insert_code<C: ConnectionTrait>(conn: &C, code: &Code) -> Result<(), sea_orm::DbErr> {
    codes::ActiveModel {
        id: Set(code.id),
        event_id: Set(code.event_id),
        course_id: Set(code.course_id),
        student_id: Set(code.student_id),
        code_value: Set(code.code_value.clone()),
        token: Set(code.token.clone()),
        title: Set(code.title.clone()),
        is_published: Set(code.is_published),
        created_at: Set(code.created_at),
    }
    .insert(conn)
    .await?;
    Ok(())
}

fn code_from_model(model: codes::Model) -> Code {
    Code {
        id: model.id,
        event_id: model.event_id,
        course_id: model.course_id,
        student_id: model.student_id,
        code_value: model.code_value,
        token: model.token,
        title: model.title,
        is_published: model.is_published,
        created_at: model.created_at,
    }
}

// ── Notification repository ───────────────────────────────────────────────────

#[derive(Clone)]
pub struct DbNotificationRepository {
    pub db: DatabaseConnection,
}

impl NotificationRepository for DbNotificationRepository {
    async fn create(&self, notification: &Notification) -> Result<(), QrServiceError> {
        whatsapp_notifications::ActiveModel {
            id: Set(notification.id),
            student_id: Set(notification.student_id),
            phone: Set(notification.phone.clone()),
            body: Set(notification.body.clone()),
            status: Set(notification.status.as_str().to_owned()),
            attempts: Set(notification.attempts),
            provider_message_id: Set(notification.provider_message_id.clone()),
            last_error: Set(notification.last_error.clone()),
            created_at: Set(notification.created_at),
            sent_at: Set(notification.sent_at),
            failed_at: Set(notification.failed_at),
        }
        .insert(&self.db)
        .await
        .map_err(db_error("create whatsapp notification"))?;
        Ok(())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Notification>, QrServiceError> {
        let model = whatsapp_notifications::Entity::find_by_id(id)
            .one(&self.db)
            .await
            .map_err(db_error("find whatsapp notification"))?;
        model.map(notification_from_model).transpose()
    }

    async fn list_attempts(
        &self,
        notification_id: Uuid,
    ) -> Result<Vec<NotificationAttempt>, QrServiceError> {
        let models = whatsapp_notification_attempts::Entity::find()
            .filter(whatsapp_notification_attempts::Column::NotificationId.eq(notification_id))
            .order_by_asc(whatsapp_notification_attempts::Column::AttemptNumber)
            .all(&self.db)
            .await
            .map_err(db_error("list whatsapp notification attempts"))?;
        models.into_iter().map(attempt_from_model).collect()
    }

    async fn record_attempt(&self, attempt: &NotificationAttempt) -> Result<(), QrServiceError> {
        let attempt = attempt.clone();
        self.db
            .transaction::<_, (), sea_orm::DbErr>(|txn| {
                Box::pin(async move {
                    whatsapp_notification_attempts::ActiveModel {
                        id: Set(attempt.id),
                        notification_id: Set(attempt.notification_id),
                        attempt_number: Set(attempt.attempt_number),
                        status: Set(attempt.status.as_str().to_owned()),
                        provider_message_id: Set(attempt.provider_message_id.clone()),
                        error: Set(attempt.error.clone()),
                        created_at: Set(attempt.created_at),
                    }
                    .insert(txn)
                    .await?;

                    whatsapp_notifications::Entity::update_many()
                        .col_expr(
                            whatsapp_notifications::Column::Attempts,
                            Expr::value(attempt.attempt_number),
                        )
                        .col_expr(
                            whatsapp_notifications::Column::LastError,
                            Expr::value(attempt.error.clone()),
                        )
                        .filter(whatsapp_notifications::Column::Id.eq(attempt.notification_id))
                        .exec(txn)
                        .await?;
                    Ok(())
                })
            })
            .await
            .map_err(db_error("record whatsapp attempt"))?;
        Ok(())
    }

    async fn mark_sent(
        &self,
        id: Uuid,
        provider_message_id: &str,
        at: DateTime<Utc>,
    ) -> Result<(), QrServiceError> {
        whatsapp_notifications::ActiveModel {
            id: Set(id),
            status: Set(NotificationStatus::Sent.as_str().to_owned()),
            provider_message_id: Set(Some(provider_message_id.to_owned())),
            last_error: Set(None),
            sent_at: Set(Some(at)),
            ..Default::default()
        }
        .update(&self.db)
        .await
        .map_err(db_error("mark whatsapp notification sent"))?;
        Ok(())
    }

    async fn mark_failed(
        &self,
        id: Uuid,
        error: &str,
        at: DateTime<Utc>,
    ) -> Result<(), QrServiceError> {
        whatsapp_notifications::ActiveModel {
            id: Set(id),
            status: Set(NotificationStatus::Failed.as_str().to_owned()),
            last_error: Set(Some(error.to_owned())),
            failed_at: Set(Some(at)),
            ..Default::default()
        }
        .update(&self.db)
        .await
        .map_err(db_error("mark whatsapp notification failed"))?;
        Ok(())
    }
}

fn parse_status(raw: &str) -> Result<NotificationStatus, QrServiceError> {
    NotificationStatus::parse(raw)
        .ok_or_else(|| anyhow::anyhow!("unknown notification status {raw:?}").into())
}

fn notification_from_model(
    model: whatsapp_notifications::Model,
) -> Result<Notification, QrServiceError> {
    Ok(Notification {
        id: model.id,
        student_id: model.student_id,
        phone: model.phone,
        body: model.body,
        status: parse_status(&model.status)?,
        attempts: model.attempts,
        provider_message_id: model.provider_message_id,
        last_error: model.last_error,
        created_at: model.created_at,
        sent_at: model.sent_at,
        failed_at: model.failed_at,
    })
}

fn attempt_from_model(
    model: whatsapp_notification_attempts::Model,
) -> Result<NotificationAttempt, QrServiceError> {
    Ok(NotificationAttempt {
        id: model.id,
        notification_id: model.notification_id,
        attempt_number: model.attempt_number,
        status: parse_status(&model.status)?,
        provider_message_id: model.provider_message_id,
        error: model.error,
        created_at: model.created_at,
    })
}
