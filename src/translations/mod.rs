//! Translation files and their synchronisation with the translation-management service.

mod client;
mod files;
mod sync;

pub use client::*;
pub use files::*;
pub use sync::*;
