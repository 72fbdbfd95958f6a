pub mod access_tokens;
pub mod codes;
pub mod students;
pub mod whatsapp_notification_attempts;
pub mod whatsapp_notifications;
