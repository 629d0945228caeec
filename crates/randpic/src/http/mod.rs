//! multipart/form-data handling

mod content_type;
mod multipart;

pub use self::content_type::{is_multipart_form_data, parse_boundary};
pub use self::multipart::{ExtractError, ExtractLimits, ExtractMode, Extractor, extract_file};
