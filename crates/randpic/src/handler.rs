//! Request dispatch
//!
//! [`PhotoHandler`] routes by HTTP method:
//!
//! - `GET` serves the random photo page
//! - `POST` stores the uploaded image
//! - anything else is answered with `405 Method Not Allowed`
//!
//! Failures never escape as errors. They are turned into responses whose body
//! tells the client what went wrong.

use crate::config::{Config, Selection};
use crate::error::Result;
use crate::event::{ProxyEvent, ProxyResponse};
use crate::http::{ExtractError, ExtractLimits, ExtractMode, Extractor};
use crate::image::ImageFormat;
use crate::render;
use crate::select::{self, RandomSource, ThreadRandom};
use crate::store::ObjectStore;

use std::fmt;
use std::sync::Arc;

use bytes::Bytes;
use http::header::{self, HeaderValue};
use http::{Method, Request, Response, StatusCode};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

const TEXT_HTML: &str = "text/html; charset=utf-8";
const TEXT_PLAIN: &str = "text/plain; charset=utf-8";

/// A randomly chosen photo
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Photo {
    pub image_key: String,
    pub image_url: String,
    pub attribution: String,
}

/// A stored upload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Upload {
    pub key: String,
    pub format: ImageFormat,
    pub size: usize,
}

pub struct PhotoHandlerBuilder {
    config: Config,
    store: Arc<dyn ObjectStore>,
    random: Option<Box<dyn RandomSource>>,
    extract_mode: ExtractMode,
}

impl PhotoHandlerBuilder {
    #[must_use]
    pub fn new(config: Config, store: impl ObjectStore) -> Self {
        Self {
            config,
            store: Arc::new(store),
            random: None,
            extract_mode: ExtractMode::default(),
        }
    }

    /// Replaces the default [`ThreadRandom`] source
    pub fn set_random(&mut self, random: impl RandomSource) {
        self.random = Some(Box::new(random));
    }

    pub fn set_extract_mode(&mut self, mode: ExtractMode) {
        self.extract_mode = mode;
    }

    #[must_use]
    pub fn build(self) -> PhotoHandler {
        let limits = ExtractLimits {
            max_body_size: self.config.max_upload_size,
            ..ExtractLimits::default()
        };
        PhotoHandler {
            extractor: Extractor::new(self.extract_mode, limits),
            random: self.random.unwrap_or_else(|| Box::new(ThreadRandom)),
            store: self.store,
            config: self.config,
        }
    }
}

pub struct PhotoHandler {
    config: Config,
    store: Arc<dyn ObjectStore>,
    random: Box<dyn RandomSource>,
    extractor: Extractor,
}

impl fmt::Debug for PhotoHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PhotoHandler")
            .field("config", &self.config)
            .field("extractor", &self.extractor)
            .finish_non_exhaustive()
    }
}

impl PhotoHandler {
    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    #[must_use]
    pub fn extractor(&self) -> &Extractor {
        &self.extractor
    }

    /// Chooses a photo and resolves its URL and attribution
    ///
    /// A missing attribution object yields an empty attribution.
    ///
    /// # Errors
    /// Returns an error if no image can be chosen or the store fails
    pub async fn random_photo(&self) -> Result<Photo> {
        let bucket = self.config.bucket.as_str();

        let image_key = match self.config.selection {
            Selection::Counted => select::image_key(select::pick_number(&*self.random, self.config.image_count)?),
            Selection::Listed => {
                let keys = self.store.list_objects(bucket).await?;
                select::pick_key(&*self.random, &keys)?.to_owned()
            }
        };

        let image_url = self
            .store
            .presigned_get_url(bucket, &image_key, self.config.presign_ttl())
            .await?;
        debug!(%image_url, "presigned image url");

        let attribution_key = select::attribution_key(&image_key);
        let attribution = match self.store.get_object(bucket, &attribution_key).await {
            Ok(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
            Err(err) if err.is_not_found() => {
                debug!(key = %attribution_key, "no attribution text");
                String::new()
            }
            Err(err) => return Err(err.into()),
        };

        Ok(Photo {
            image_key,
            image_url,
            attribution,
        })
    }

    /// Extracts, validates and stores an uploaded image
    ///
    /// # Errors
    /// Returns an error if the body holds no valid image or the store fails
    pub async fn upload(&self, body: &[u8], content_type: Option<&str>, is_base64: bool) -> Result<Upload> {
        let content_type =
            content_type.ok_or_else(|| ExtractError::MalformedHeader("missing Content-Type header".to_owned()))?;

        let file = self.extractor.extract(body, content_type, is_base64)?;
        let format = ImageFormat::validate(&file)?;

        let key = format!("{}{}.{}", self.config.upload_prefix, Uuid::new_v4(), format.extension());
        let size = file.len();

        self.store
            .put_object(&self.config.bucket, &key, file, Some(format.mime_type()))
            .await?;

        info!(%key, size, %format, "stored upload");
        Ok(Upload { key, format, size })
    }

    /// Routes a request by method and renders the response
    pub async fn dispatch(&self, method: &Method, content_type: Option<&str>, body: &[u8], is_base64: bool) -> Response<String> {
        match *method {
            Method::GET => match self.random_photo().await {
                Ok(photo) => {
                    info!(key = %photo.image_key, "serving random photo");
                    text_response(StatusCode::OK, TEXT_HTML, render::render_photo_page(&photo.image_url, &photo.attribution))
                }
                Err(err) => {
                    error!(%err, "failed to pick a photo");
                    text_response(err.status_code(), TEXT_PLAIN, err.client_message())
                }
            },
            Method::POST => match self.upload(body, content_type, is_base64).await {
                Ok(upload) => {
                    let message = format!("Stored {} ({} bytes)", upload.key, upload.size);
                    text_response(StatusCode::CREATED, TEXT_HTML, render::render_message("Upload complete", &message))
                }
                Err(err) => {
                    if err.is_client_error() {
                        warn!(%err, "rejected upload");
                    } else {
                        error!(%err, "failed to store upload");
                    }
                    let page = render::render_message("Upload failed", &err.client_message());
                    text_response(err.status_code(), TEXT_HTML, page)
                }
            },
            _ => method_not_allowed(),
        }
    }

    /// Serves a plain HTTP request
    pub async fn handle(&self, req: Request<Bytes>, is_base64: bool) -> Response<String> {
        let (parts, body) = req.into_parts();
        let content_type = parts.headers.get(header::CONTENT_TYPE).and_then(|v| v.to_str().ok());
        self.dispatch(&parts.method, content_type, &body, is_base64).await
    }

    /// Serves a serverless proxy event
    pub async fn handle_event(&self, event: &ProxyEvent) -> ProxyResponse {
        let res = match Method::from_bytes(event.method().as_bytes()) {
            Ok(method) => {
                self.dispatch(&method, event.header("content-type"), event.body_bytes(), event.is_base64_encoded)
                    .await
            }
            Err(_) => {
                debug!(method = %event.method(), "invalid method");
                method_not_allowed()
            }
        };
        into_proxy_response(res)
    }
}

fn text_response(status: StatusCode, content_type: &'static str, body: String) -> Response<String> {
    let mut res = Response::new(body);
    *res.status_mut() = status;
    res.headers_mut()
        .insert(header::CONTENT_TYPE, HeaderValue::from_static(content_type));
    res
}

fn method_not_allowed() -> Response<String> {
    let mut res = text_response(StatusCode::METHOD_NOT_ALLOWED, TEXT_PLAIN, "Method Not Allowed".to_owned());
    res.headers_mut().insert(header::ALLOW, HeaderValue::from_static("GET, POST"));
    res
}

fn into_proxy_response(res: Response<String>) -> ProxyResponse {
    let (parts, body) = res.into_parts();
    let headers = parts
        .headers
        .iter()
        .filter_map(|(name, value)| Some((name.as_str().to_owned(), value.to_str().ok()?.to_owned())))
        .collect();
    ProxyResponse {
        status_code: parts.status.as_u16(),
        headers,
        body,
        is_base64_encoded: false,
    }
}
