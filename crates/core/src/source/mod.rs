//! Acquisition of single-photo inputs.
//!
//! A source is either an image URL, downloaded with content-type and size
//! checks, or an inline `data:image/<png|jpg|jpeg>;base64,` payload. Either
//! way it lands in the service's photo input directory under a fresh UUID
//! name.

mod error;
mod fetcher;
mod inline;

pub use error::SourceError;
pub use fetcher::{AcquiredSource, SourceFetcher};
pub use inline::{extension_from_url, is_inline, parse_inline, InlineImage};
