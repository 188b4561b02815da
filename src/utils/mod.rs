//! Shared utility functions.
//!
//! - `mime`: content-type and extension classification
//! - `text`: accent folding and keyword normalization
//! - `url`: URL resolution and host helpers

pub mod mime;
pub mod text;
pub mod url;
