//! Content-Type handling for uploads

use super::ExtractError;

use mime::Mime;

/// Extracts the boundary from a `multipart/form-data` Content-Type value
///
/// Only the media type is parsed as a MIME type. The boundary is taken as written,
/// since it may contain characters such as `=`, `/` or `?` that are not valid in
/// a MIME token.
///
/// # Errors
/// Returns [`ExtractError::MalformedHeader`] if:
/// - the media type is not valid
/// - the media type is not `multipart/form-data`
/// - the `boundary` parameter is absent or empty
pub fn parse_boundary(content_type: &str) -> Result<String, ExtractError> {
    let (media_type, params) = content_type.split_once(';').unwrap_or((content_type, ""));

    let mime = media_type
        .trim()
        .parse::<Mime>()
        .map_err(|err| ExtractError::MalformedHeader(format!("invalid content type {content_type:?}: {err}")))?;

    if !is_multipart_form_data(&mime) {
        return Err(ExtractError::MalformedHeader(format!(
            "expected multipart/form-data, got {}/{}",
            mime.type_(),
            mime.subtype()
        )));
    }

    let boundary = params
        .split(';')
        .filter_map(|param| param.split_once('='))
        .find(|(name, _)| name.trim().eq_ignore_ascii_case(mime::BOUNDARY.as_str()))
        .map(|(_, value)| boundary_value(value))
        .ok_or_else(|| ExtractError::MalformedHeader("missing boundary".to_owned()))?;

    if boundary.is_empty() {
        return Err(ExtractError::MalformedHeader("empty boundary".to_owned()));
    }

    Ok(boundary.to_owned())
}

/// Unquotes a parameter value, or cuts it at the first whitespace
fn boundary_value(value: &str) -> &str {
    let value = value.trim_start();
    match value.strip_prefix('"') {
        Some(quoted) => quoted.split('"').next().unwrap_or_default(),
        None => value.split(|c: char| c.is_ascii_whitespace()).next().unwrap_or_default(),
    }
}

/// Check if a MIME type is multipart/form-data
#[inline]
#[must_use]
pub fn is_multipart_form_data(mime: &Mime) -> bool {
    mime.type_() == mime::MULTIPART && mime.subtype() == mime::FORM_DATA
}
