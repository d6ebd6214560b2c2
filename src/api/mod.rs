//! Loosely-typed resource access: payload accessors and resource identities.

mod document;
mod registry;

pub use document::Document;
pub use registry::ResourceRegistry;
