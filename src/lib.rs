//! Compiles MongoDB `$jsonSchema` documents into validator trees.
//!
//! A schema is compiled once with [`Schema::compile`] and then checked against
//! any number of instances with [`Schema::verify`] (first violation only) or
//! [`validate`] (collects violations).

mod compile;
mod form;
mod schema;
mod serde_schema;
mod validate;
mod value;

pub use compile::{CompileError, CompileOptions};
pub use form::*;
pub use schema::Schema;
pub use serde_schema::*;
pub use validate::*;
