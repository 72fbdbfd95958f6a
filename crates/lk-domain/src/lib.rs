//! Domain types shared across LookEscolar services.
//!
//! This crate contains only pure types with no framework dependencies.
//! Import in `usecase/` and `domain/` layers; never in `infra/` or `handlers/`.

pub mod code_value;
pub mod id;
