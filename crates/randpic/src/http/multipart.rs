//! multipart/form-data file extraction for uploads
//!
//! The body is split on the raw boundary token and the first part that carries a
//! file is returned with its headers and the closing delimiter removed.
//!
//! Two modes decide what "carries a file" means:
//!
//! - [`ExtractMode::Compat`] scans each part for the literal bytes `filename`.
//!   A plain field whose value contains that text is taken for a file.
//! - [`ExtractMode::Structured`] parses the part headers and requires a
//!   `filename` parameter in `Content-Disposition`.
//!
//! In both modes a boundary token occurring inside the file content splits the
//! file and corrupts the result.

use super::content_type::parse_boundary;

use std::collections::BTreeMap;
use std::ops::Range;

use bytes::Bytes;
use memchr::memmem;
use tracing::debug;

/// Default maximum size of a decoded request body (10 MB)
pub const DEFAULT_MAX_BODY_SIZE: usize = 10 * 1024 * 1024;

/// Default maximum number of parts in a form
pub const DEFAULT_MAX_PARTS: usize = 1000;

/// Maximum number of headers per part in structured mode
const MAX_PART_HEADERS: usize = 8;

const FILENAME_MARKER: &[u8] = b"filename";
const HEADER_TERMINATOR: &[u8] = b"\r\n\r\n";
const CLOSING_TRAILER: &[u8] = b"\r\n--";
const CRLF: &[u8] = b"\r\n";

#[derive(Debug, thiserror::Error)]
pub enum ExtractError {
    #[error("ExtractError: MalformedHeader: {0}")]
    MalformedHeader(String),
    #[error("ExtractError: NoFilePart")]
    NoFilePart,
    #[error("ExtractError: EmptyPayload")]
    EmptyPayload,
    #[error("ExtractError: InvalidBase64")]
    InvalidBase64,
    #[error("ExtractError: BodyTooLarge: body size {0} bytes exceeds limit of {1} bytes")]
    BodyTooLarge(usize, usize),
    #[error("ExtractError: TooManyParts: part count {0} exceeds limit of {1}")]
    TooManyParts(usize, usize),
}

impl ExtractError {
    /// Message shown to the uploader
    #[must_use]
    pub fn client_message(&self) -> &'static str {
        match self {
            Self::MalformedHeader(_) => "Content-Type must be multipart/form-data with a boundary",
            Self::NoFilePart => "No file was found in the upload",
            Self::EmptyPayload => "The uploaded file is empty",
            Self::InvalidBase64 => "The request body is not valid base64",
            Self::BodyTooLarge(..) => "The upload is too large",
            Self::TooManyParts(..) => "The form has too many parts",
        }
    }
}

/// How file parts are recognized
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ExtractMode {
    /// unanchored search for `filename` anywhere in the part
    #[default]
    Compat,
    /// `filename` parameter of a parsed `Content-Disposition` header
    Structured,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExtractLimits {
    /// Maximum size of the decoded body in bytes
    pub max_body_size: usize,
    /// Maximum number of non-empty parts scanned before giving up
    pub max_parts: usize,
}

impl Default for ExtractLimits {
    fn default() -> Self {
        Self {
            max_body_size: DEFAULT_MAX_BODY_SIZE,
            max_parts: DEFAULT_MAX_PARTS,
        }
    }
}

/// Extracts uploaded files from multipart bodies
#[derive(Debug, Clone, Copy, Default)]
pub struct Extractor {
    mode: ExtractMode,
    limits: ExtractLimits,
}

/// Extracts the first uploaded file with the default [`Extractor`]
///
/// # Errors
/// See [`Extractor::extract`]
pub fn extract_file(body: &[u8], content_type: &str, is_base64: bool) -> Result<Bytes, ExtractError> {
    Extractor::default().extract(body, content_type, is_base64)
}

impl Extractor {
    #[must_use]
    pub fn new(mode: ExtractMode, limits: ExtractLimits) -> Self {
        Self { mode, limits }
    }

    #[must_use]
    pub fn mode(&self) -> ExtractMode {
        self.mode
    }

    #[must_use]
    pub fn limits(&self) -> ExtractLimits {
        self.limits
    }

    /// Returns the bytes of the first file-bearing part of `body`
    ///
    /// If `is_base64` is set, the body is decoded before it is split.
    ///
    /// # Errors
    /// + [`ExtractError::MalformedHeader`] if `content_type` is not `multipart/form-data` with a boundary
    /// + [`ExtractError::InvalidBase64`] if the body cannot be decoded
    /// + [`ExtractError::NoFilePart`] if no part carries a file
    /// + [`ExtractError::EmptyPayload`] if the file part has no content
    /// + [`ExtractError::BodyTooLarge`] or [`ExtractError::TooManyParts`] if a limit is exceeded
    pub fn extract(&self, body: &[u8], content_type: &str, is_base64: bool) -> Result<Bytes, ExtractError> {
        let boundary = parse_boundary(content_type)?;

        if is_base64 {
            let decoded = decode_base64(body)?;
            let range = self.find_file(&decoded, boundary.as_bytes())?;
            Ok(Bytes::from(decoded).slice(range))
        } else {
            let range = self.find_file(body, boundary.as_bytes())?;
            #[allow(clippy::indexing_slicing)]
            let file = &body[range];
            Ok(Bytes::copy_from_slice(file))
        }
    }

    /// Locates the payload of the first file part
    fn find_file(&self, body: &[u8], boundary: &[u8]) -> Result<Range<usize>, ExtractError> {
        if body.len() > self.limits.max_body_size {
            return Err(ExtractError::BodyTooLarge(body.len(), self.limits.max_body_size));
        }

        let mut parts_count: usize = 0;

        for part in split_parts(body, boundary) {
            #[allow(clippy::indexing_slicing)]
            let bytes = &body[part.clone()];

            if is_delimiter_artifact(bytes) {
                continue;
            }

            parts_count += 1;
            if parts_count > self.limits.max_parts {
                return Err(ExtractError::TooManyParts(parts_count, self.limits.max_parts));
            }

            let payload = match self.mode {
                ExtractMode::Compat => compat_payload(bytes),
                ExtractMode::Structured => structured_payload(bytes),
            };

            if let Some(payload) = payload {
                debug!(part = parts_count, len = payload.len(), mode = ?self.mode, "found file part");
                if payload.is_empty() {
                    return Err(ExtractError::EmptyPayload);
                }
                return Ok(part.start + payload.start..part.start + payload.end);
            }
        }

        debug!(parts = parts_count, "no file part");
        Err(ExtractError::NoFilePart)
    }
}

/// Decodes a base64 body, ignoring line breaks and other ASCII whitespace
fn decode_base64(body: &[u8]) -> Result<Vec<u8>, ExtractError> {
    let compact: Vec<u8> = body.iter().copied().filter(|b| !b.is_ascii_whitespace()).collect();
    base64_simd::STANDARD
        .decode_to_vec(&compact)
        .map_err(|_| ExtractError::InvalidBase64)
}

/// Splits `body` on every occurrence of `boundary`
fn split_parts(body: &[u8], boundary: &[u8]) -> Vec<Range<usize>> {
    let mut parts = Vec::new();
    let mut start: usize = 0;
    for idx in memmem::find_iter(body, boundary) {
        parts.push(start..idx);
        start = idx + boundary.len();
    }
    parts.push(start..body.len());
    parts
}

/// Whether a part is only what is left of the delimiters, like the `--` before
/// the first boundary or the `--\r\n` after the last one
fn is_delimiter_artifact(part: &[u8]) -> bool {
    part.iter().all(|&b| matches!(b, b'\r' | b'\n' | b'-'))
}

fn compat_payload(part: &[u8]) -> Option<Range<usize>> {
    memmem::find(part, FILENAME_MARKER)?;

    let start = match memmem::find(part, HEADER_TERMINATOR) {
        Some(idx) => idx + HEADER_TERMINATOR.len(),
        None => part.len(),
    };

    Some(strip_trailer(part, start))
}

fn structured_payload(part: &[u8]) -> Option<Range<usize>> {
    let part = Part::parse(part)?;
    let filename = part.filename()?;
    debug!(filename, "file part headers");
    Some(part.body)
}

/// Strips the `\r\n--` left in front of the next boundary, or a bare CRLF
/// when the part is not followed by one
fn strip_trailer(part: &[u8], start: usize) -> Range<usize> {
    let start = start.min(part.len());
    #[allow(clippy::indexing_slicing)]
    let payload = &part[start..];

    let end = if payload.ends_with(CLOSING_TRAILER) {
        part.len() - CLOSING_TRAILER.len()
    } else if payload.ends_with(CRLF) {
        part.len() - CRLF.len()
    } else {
        part.len()
    };

    start..end
}

/// A part with parsed headers
#[derive(Debug)]
struct Part<'a> {
    /// header values by lowercase name
    headers: BTreeMap<String, &'a [u8]>,
    /// payload range in the part
    body: Range<usize>,
}

impl<'a> Part<'a> {
    fn parse(part: &'a [u8]) -> Option<Self> {
        let offset = if part.starts_with(CRLF) { CRLF.len() } else { 0 };
        #[allow(clippy::indexing_slicing)]
        let block = &part[offset..];

        let mut headers = [httparse::EMPTY_HEADER; MAX_PART_HEADERS];
        let (idx, parsed) = match httparse::parse_headers(block, &mut headers) {
            Ok(httparse::Status::Complete(ans)) => ans,
            Ok(httparse::Status::Partial) => return None,
            Err(err) => {
                debug!(?err, "skipping part with malformed headers");
                return None;
            }
        };

        let headers = parsed
            .iter()
            .map(|h| (h.name.to_ascii_lowercase(), h.value))
            .collect();

        Some(Self {
            headers,
            body: strip_trailer(part, offset + idx),
        })
    }

    fn header(&self, name: &str) -> Option<&'a [u8]> {
        self.headers.get(name).copied()
    }

    fn filename(&self) -> Option<&'a str> {
        let value = self.header("content-disposition")?;
        let (_, content_disposition) = parse_content_disposition(value).ok()?;
        content_disposition.filename.filter(|s| !s.is_empty())
    }
}

/// Content-Disposition
#[derive(Debug)]
struct ContentDisposition<'a> {
    /// name
    #[allow(dead_code)]
    name: &'a str,
    /// filename
    filename: Option<&'a str>,
}

/// parse content disposition value
fn parse_content_disposition(input: &[u8]) -> nom::IResult<&[u8], ContentDisposition<'_>> {
    use nom::Parser;
    use nom::bytes::complete::{tag, take, take_till, take_till1};
    use nom::combinator::{all_consuming, map_res, opt};
    use nom::sequence::{delimited, preceded};

    let parse_name = delimited(
        tag(&b"name=\""[..]),
        map_res(take_till1(|c| c == b'"'), std::str::from_utf8),
        take(1_usize),
    );

    let parse_filename = delimited(
        tag(&b"filename=\""[..]),
        map_res(take_till(|c| c == b'"'), std::str::from_utf8),
        take(1_usize),
    );

    let mut parse = all_consuming((
        preceded(tag(&b"form-data; "[..]), parse_name),
        opt(preceded(tag(&b"; "[..]), parse_filename)),
    ));

    let (remaining, (name, filename)) = parse.parse(input)?;

    Ok((remaining, ContentDisposition { name, filename }))
}
