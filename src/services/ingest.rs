use futures::future::join_all;
use reqwest::Client;
use std::collections::HashSet;

use crate::models::job::SourceKind;

/// Extension every staged image carries once normalized.
pub const IMAGE_EXT: &str = ".png";

/// Synthetic filename of a raw-bytes submission.
pub const RAW_BYTES_FILENAME: &str = "image.png";

/// One image of a job: a sanitized filename and its undecoded bytes.
#[derive(Debug, Clone)]
pub struct InputItem {
    pub filename: String,
    pub bytes: Vec<u8>,
}

/// Where a job's images come from.
///
/// Upload and raw-bytes sources are read into memory by the submitting
/// request; URL sources are fetched by the job itself.
#[derive(Debug, Clone)]
pub enum JobSource {
    Urls(Vec<String>),
    Upload(Vec<InputItem>),
    Bytes(Vec<u8>),
}

impl JobSource {
    pub fn kind(&self) -> SourceKind {
        match self {
            JobSource::Urls(_) => SourceKind::Urls,
            JobSource::Upload(_) => SourceKind::Upload,
            JobSource::Bytes(_) => SourceKind::Bytes,
        }
    }

    /// Produce the ordered (filename, bytes) pairs of this source.
    pub async fn into_items(self, http: &Client) -> Vec<InputItem> {
        match self {
            JobSource::Urls(urls) => fetch_urls(http, &urls).await,
            JobSource::Upload(items) => items,
            JobSource::Bytes(bytes) => vec![InputItem {
                filename: RAW_BYTES_FILENAME.to_string(),
                bytes,
            }],
        }
    }
}

/// Fetch every URL concurrently and keep the successful ones.
///
/// Item `i` is named `<i>.png` after its position in `urls`, whatever order
/// the responses arrive in. Non-2xx responses and transport errors drop the
/// item.
pub async fn fetch_urls(http: &Client, urls: &[String]) -> Vec<InputItem> {
    let fetches = urls.iter().enumerate().map(|(index, url)| async move {
        match fetch_one(http, url).await {
            Ok(bytes) => Some(InputItem {
                filename: format!("{index}{IMAGE_EXT}"),
                bytes,
            }),
            Err(e) => {
                tracing::warn!(index, url = %url, error = %e, "Dropping image URL");
                None
            }
        }
    });

    join_all(fetches).await.into_iter().flatten().collect()
}

async fn fetch_one(http: &Client, url: &str) -> Result<Vec<u8>, IngestError> {
    let response = http.get(url).send().await?;
    let status = response.status();
    if !status.is_success() {
        return Err(IngestError::Status(status.as_u16()));
    }
    Ok(response.bytes().await?.to_vec())
}

/// Turn a client-supplied name into a safe workspace filename.
///
/// Only the final path component is kept, and `.png` is appended unless the
/// name already ends with it.
pub fn sanitize_filename(raw: &str) -> Result<String, IngestError> {
    let name = raw
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or_default()
        .trim();

    if name.is_empty()
        || name == "."
        || name == ".."
        || name.chars().any(char::is_control)
    {
        return Err(IngestError::InvalidFilename(raw.to_string()));
    }

    if name.ends_with(IMAGE_EXT) {
        Ok(name.to_string())
    } else {
        Ok(format!("{name}{IMAGE_EXT}"))
    }
}

/// Collects uploaded parts, keeping filenames unique within the job.
#[derive(Debug, Default)]
pub struct UploadBuilder {
    items: Vec<InputItem>,
    seen: HashSet<String>,
}

impl UploadBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a part. A repeated name gets `-1`, `-2`, ... before the extension.
    pub fn push(&mut self, raw_name: &str, bytes: Vec<u8>) -> Result<&str, IngestError> {
        let base = sanitize_filename(raw_name)?;
        let mut filename = base.clone();
        let mut n = 1;
        while self.seen.contains(&filename) {
            let stem = base.strip_suffix(IMAGE_EXT).unwrap_or(&base);
            filename = format!("{stem}-{n}{IMAGE_EXT}");
            n += 1;
        }

        self.seen.insert(filename.clone());
        self.items.push(InputItem { filename, bytes });
        Ok(&self.items[self.items.len() - 1].filename)
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn finish(self) -> Vec<InputItem> {
        self.items
    }
}

#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("remote server answered with status {0}")]
    Status(u16),

    #[error("invalid upload filename: {0:?}")]
    InvalidFilename(String),
}
