pub mod batch;
pub mod detect;
pub mod notification;
pub mod qr;
pub mod token;
pub mod validate;
