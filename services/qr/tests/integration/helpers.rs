use std::collections::{HashSet, VecDeque};
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

use lk_qr::domain::repository::{
    CodeRepository, NotificationRepository, StudentRepository, TokenRepository, WhatsAppPort,
};
use lk_qr::domain::types::{
    AccessToken, Code, DeliveryError, Notification, NotificationAttempt, NotificationStatus,
    QrMetadata, Student,
};
use lk_qr::error::QrServiceError;

pub const PORTAL_BASE_URL: &str = "https://portal.example.com";

pub fn token_ttl() -> Duration {
    Duration::days(365)
}

pub fn test_student(name: &str, event_id: Uuid) -> Student {
    Student {
        id: Uuid::new_v4(),
        name: name.to_owned(),
        event_id,
        course_id: Some(Uuid::new_v4()),
        metadata: serde_json::json!({ "shirt_size": "M" }),
        created_at: Utc::now(),
    }
}

pub fn test_token(student_id: Uuid, token: &str) -> AccessToken {
    AccessToken {
        id: Uuid::new_v4(),
        student_id,
        token: token.to_owned(),
        expires_at: Utc::now() + Duration::days(30),
        is_active: true,
        created_at: Utc::now(),
    }
}

// ── MockStudentRepo ──────────────────────────────────────────────────────────

#[derive(Clone)]
pub struct MockStudentRepo {
    pub students: Arc<Mutex<Vec<Student>>>,
    /// Lookups of these ids fail as if the database were unreachable.
    pub failing: Arc<HashSet<Uuid>>,
}

impl MockStudentRepo {
    pub fn new(students: Vec<Student>) -> Self {
        Self {
            students: Arc::new(Mutex::new(students)),
            failing: Arc::new(HashSet::new()),
        }
    }

    pub fn failing_on(mut self, ids: impl IntoIterator<Item = Uuid>) -> Self {
        self.failing = Arc::new(ids.into_iter().collect());
        self
    }

    pub fn students_handle(&self) -> Arc<Mutex<Vec<Student>>> {
        Arc::clone(&self.students)
    }
}

impl StudentRepository for MockStudentRepo {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Student>, QrServiceError> {
        if self.failing.contains(&id) {
            return Err(QrServiceError::ExternalService(
                "database: find student by id".to_owned(),
            ));
        }
        Ok(self
            .students
            .lock()
            .unwrap()
            .iter()
            .find(|s| s.id == id)
            .cloned())
    }

    async fn update_qr_metadata(&self, id: Uuid, qr: &QrMetadata) -> Result<(), QrServiceError> {
        let mut students = self.students.lock().unwrap();
        if let Some(s) = students.iter_mut().find(|s| s.id == id) {
            let bag = s.metadata.as_object_mut().unwrap();
            bag.insert("qr_token".into(), qr.qr_token.clone().into());
            bag.insert("qr_code_value".into(), qr.qr_code_value.clone().into());
            bag.insert("qr_type".into(), qr.qr_type.clone().into());
        }
        Ok(())
    }
}

// ── MockTokenRepo ────────────────────────────────────────────────────────────

#[derive(Clone)]
pub struct MockTokenRepo {
    pub tokens: Arc<Mutex<Vec<AccessToken>>>,
    /// Shared with [`MockCodeRepo`] so rotation can unpublish codes.
    pub codes: Arc<Mutex<Vec<Code>>>,
    /// Yield to the scheduler after each active-token lookup, so concurrent
    /// callers interleave between lookup and claim.
    pub yield_after_lookup: bool,
}

impl MockTokenRepo {
    pub fn new(tokens: Vec<AccessToken>, codes: &MockCodeRepo) -> Self {
        Self {
            tokens: Arc::new(Mutex::new(tokens)),
            codes: codes.codes_handle(),
            yield_after_lookup: false,
        }
    }

    pub fn yielding(mut self) -> Self {
        self.yield_after_lookup = true;
        self
    }

    pub fn tokens_handle(&self) -> Arc<Mutex<Vec<AccessToken>>> {
        Arc::clone(&self.tokens)
    }

    fn deactivate(&self, student_id: Uuid) {
        for t in self.tokens.lock().unwrap().iter_mut() {
            if t.student_id == student_id {
                t.is_active = false;
            }
        }
    }
}

impl TokenRepository for MockTokenRepo {
    async fn find_active_for_student(
        &self,
        student_id: Uuid,
    ) -> Result<Option<AccessToken>, QrServiceError> {
        let found = self
            .tokens
            .lock()
            .unwrap()
            .iter()
            .filter(|t| t.student_id == student_id && t.is_valid())
            .max_by_key(|t| t.created_at)
            .cloned();
        if self.yield_after_lookup {
            tokio::task::yield_now().await;
        }
        Ok(found)
    }

    async fn find_by_token(&self, token: &str) -> Result<Option<AccessToken>, QrServiceError> {
        Ok(self
            .tokens
            .lock()
            .unwrap()
            .iter()
            .find(|t| t.token == token)
            .cloned())
    }

    async fn claim_active(&self, candidate: &AccessToken) -> Result<AccessToken, QrServiceError> {
        let mut tokens = self.tokens.lock().unwrap();
        for t in tokens.iter_mut() {
            if t.student_id == candidate.student_id && t.is_active && !t.is_valid() {
                t.is_active = false;
            }
        }
        if let Some(active) = tokens
            .iter()
            .find(|t| t.student_id == candidate.student_id && t.is_active)
        {
            return Ok(active.clone());
        }
        tokens.push(candidate.clone());
        Ok(candidate.clone())
    }

    async fn rotate(&self, token: &AccessToken) -> Result<(), QrServiceError> {
        self.deactivate(token.student_id);
        for c in self.codes.lock().unwrap().iter_mut() {
            if c.student_id == Some(token.student_id) {
                c.is_published = false;
            }
        }
        self.tokens.lock().unwrap().push(token.clone());
        Ok(())
    }
}

// ── MockCodeRepo ─────────────────────────────────────────────────────────────

#[derive(Clone)]
pub struct MockCodeRepo {
    pub codes: Arc<Mutex<Vec<Code>>>,
}

impl MockCodeRepo {
    pub fn new(codes: Vec<Code>) -> Self {
        Self {
            codes: Arc::new(Mutex::new(codes)),
        }
    }

    pub fn empty() -> Self {
        Self::new(vec![])
    }

    pub fn codes_handle(&self) -> Arc<Mutex<Vec<Code>>> {
        Arc::clone(&self.codes)
    }
}

impl CodeRepository for MockCodeRepo {
    async fn find_published_by_token(&self, token: &str) -> Result<Option<Code>, QrServiceError> {
        Ok(self
            .codes
            .lock()
            .unwrap()
            .iter()
            .find(|c| c.token == token && c.is_published)
            .cloned())
    }

    async fn find_primary_for_student(
        &self,
        student_id: Uuid,
    ) -> Result<Option<Code>, QrServiceError> {
        Ok(self
            .codes
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.student_id == Some(student_id) && c.is_published)
            .max_by_key(|c| c.created_at)
            .cloned())
    }

    async fn replace_primary(&self, code: &Code) -> Result<(), QrServiceError> {
        let mut codes = self.codes.lock().unwrap();
        for c in codes.iter_mut() {
            if c.student_id == code.student_id {
                c.is_published = false;
            }
        }
        codes.push(code.clone());
        Ok(())
    }
}

/// Student, token and code stores wired together over shared state.
pub struct Stores {
    pub students: MockStudentRepo,
    pub tokens: MockTokenRepo,
    pub codes: MockCodeRepo,
}

impl Stores {
    pub fn new(students: Vec<Student>, tokens: Vec<AccessToken>) -> Self {
        let codes = MockCodeRepo::empty();
        Self {
            students: MockStudentRepo::new(students),
            tokens: MockTokenRepo::new(tokens, &codes),
            codes,
        }
    }
}

// ── MockNotificationRepo ─────────────────────────────────────────────────────

#[derive(Clone, Default)]
pub struct MockNotificationRepo {
    pub jobs: Arc<Mutex<Vec<Notification>>>,
    pub attempts: Arc<Mutex<Vec<NotificationAttempt>>>,
}

impl MockNotificationRepo {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn jobs_handle(&self) -> Arc<Mutex<Vec<Notification>>> {
        Arc::clone(&self.jobs)
    }

    pub fn attempts_handle(&self) -> Arc<Mutex<Vec<NotificationAttempt>>> {
        Arc::clone(&self.attempts)
    }

    fn update(&self, id: Uuid, f: impl FnOnce(&mut Notification)) {
        if let Some(job) = self.jobs.lock().unwrap().iter_mut().find(|j| j.id == id) {
            f(job);
        }
    }
}

impl NotificationRepository for MockNotificationRepo {
    async fn create(&self, notification: &Notification) -> Result<(), QrServiceError> {
        self.jobs.lock().unwrap().push(notification.clone());
        Ok(())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Notification>, QrServiceError> {
        Ok(self
            .jobs
            .lock()
            .unwrap()
            .iter()
            .find(|j| j.id == id)
            .cloned())
    }

    async fn list_attempts(
        &self,
        notification_id: Uuid,
    ) -> Result<Vec<NotificationAttempt>, QrServiceError> {
        let mut attempts: Vec<_> = self
            .attempts
            .lock()
            .unwrap()
            .iter()
            .filter(|a| a.notification_id == notification_id)
            .cloned()
            .collect();
        attempts.sort_by_key(|a| a.attempt_number);
        Ok(attempts)
    }

    async fn record_attempt(&self, attempt: &NotificationAttempt) -> Result<(), QrServiceError> {
        self.attempts.lock().unwrap().push(attempt.clone());
        self.update(attempt.notification_id, |job| {
            job.attempts = attempt.attempt_number;
            job.last_error = attempt.error.clone();
        });
        Ok(())
    }

    async fn mark_sent(
        &self,
        id: Uuid,
        provider_message_id: &str,
        at: DateTime<Utc>,
    ) -> Result<(), QrServiceError> {
        self.update(id, |job| {
            job.status = NotificationStatus::Sent;
            job.provider_message_id = Some(provider_message_id.to_owned());
            job.sent_at = Some(at);
        });
        Ok(())
    }

    async fn mark_failed(
        &self,
        id: Uuid,
        error: &str,
        at: DateTime<Utc>,
    ) -> Result<(), QrServiceError> {
        self.update(id, |job| {
            job.status = NotificationStatus::Failed;
            job.last_error = Some(error.to_owned());
            job.failed_at = Some(at);
        });
        Ok(())
    }
}

// ── MockWhatsApp ─────────────────────────────────────────────────────────────

/// Replays scripted provider responses in order; succeeds once the script runs out.
#[derive(Clone, Default)]
pub struct MockWhatsApp {
    pub script: Arc<Mutex<VecDeque<Result<String, DeliveryError>>>>,
    pub sent: Arc<Mutex<Vec<(String, String)>>>,
}

impl MockWhatsApp {
    pub fn scripted(responses: Vec<Result<String, DeliveryError>>) -> Self {
        Self {
            script: Arc::new(Mutex::new(responses.into())),
            sent: Arc::default(),
        }
    }

    pub fn sent_handle(&self) -> Arc<Mutex<Vec<(String, String)>>> {
        Arc::clone(&self.sent)
    }
}

impl WhatsAppPort for MockWhatsApp {
    async fn send_text(&self, to: &str, body: &str) -> Result<String, DeliveryError> {
        self.sent
            .lock()
            .unwrap()
            .push((to.to_owned(), body.to_owned()));
        self.script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok("wamid.default".to_owned()))
    }
}
