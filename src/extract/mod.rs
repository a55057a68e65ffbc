//! DOM extraction primitives: selector cascades and the compiled-selector
//! cache they run on.

pub mod cascade;
pub mod compiled;

pub use cascade::{AnchorFallback, ContentCascade, ListingFields, Resolution, Strategy, resolve};
