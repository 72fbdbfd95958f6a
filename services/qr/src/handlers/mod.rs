pub mod cache;
pub mod detect;
pub mod health;
pub mod notification;
pub mod qr;
pub mod token;
