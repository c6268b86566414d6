//! `multipart/form-data` bodies, parsed with `multer`.
//!
//! The request body is already fully buffered, so the parser is driven to
//! completion on the calling thread. Parts whose `filename` is empty (a file
//! input left blank by the browser) are dropped.

use bytes::Bytes;
use std::convert::Infallible;
use tracing::debug;

/// A file received in a multipart body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadedFile {
    pub field_name: String,
    pub filename: String,
    pub content_type: Option<String>,
    pub content: Bytes,
}

impl UploadedFile {
    #[must_use]
    pub fn len(&self) -> usize {
        self.content.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.content.is_empty()
    }
}

/// Text fields and files of a multipart body, in arrival order.
#[derive(Debug, Default)]
pub struct MultipartForm {
    pub fields: Vec<(String, String)>,
    pub files: Vec<(String, UploadedFile)>,
}

#[derive(Debug, thiserror::Error)]
pub enum MultipartError {
    #[error("multipart body has no boundary")]
    MissingBoundary,
    #[error("multipart part has no name")]
    MissingName,
    #[error("malformed multipart body: {0}")]
    Malformed(#[from] multer::Error),
}

/// `boundary` parameter of a `multipart/form-data` content type.
#[must_use]
pub fn boundary_from_content_type(content_type: &str) -> Option<String> {
    multer::parse_boundary(content_type).ok()
}

async fn read_form(mut multipart: multer::Multipart<'static>) -> Result<MultipartForm, MultipartError> {
    let mut form = MultipartForm::default();
    while let Some(field) = multipart.next_field().await? {
        let name = field.name().map(str::to_string).ok_or(MultipartError::MissingName)?;
        let filename = field.file_name().map(str::to_string);
        let content_type = field.content_type().map(ToString::to_string);

        match filename {
            Some(filename) if filename.is_empty() => {
                debug!(field = %name, "Skipping multipart part with empty filename");
            }
            Some(filename) => {
                let content = field.bytes().await?;
                debug!(field = %name, filename = %filename, size = content.len(), "Multipart file part");
                form.files.push((
                    name.clone(),
                    UploadedFile {
                        field_name: name,
                        filename,
                        content_type,
                        content,
                    },
                ));
            }
            None => {
                let content = field.bytes().await?;
                form.fields.push((name, String::from_utf8_lossy(&content).into_owned()));
            }
        }
    }
    Ok(form)
}

/// Parse a complete multipart body.
pub fn parse_multipart(body: Bytes, boundary: &str) -> Result<MultipartForm, MultipartError> {
    if boundary.is_empty() {
        return Err(MultipartError::MissingBoundary);
    }
    let stream = futures::stream::once(async move { Ok::<Bytes, Infallible>(body) });
    let multipart = multer::Multipart::new(stream, boundary);
    futures::executor::block_on(read_form(multipart))
}
