use std::{future::Future, path::PathBuf};

use serde::Deserialize;

/// One stored image. Hosts name the link `url`, `secure_url` or `location`,
/// sometimes several at once; the first of those present wins.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(try_from = "RawUploadedImage")]
pub struct UploadedImage {
    pub url: String,
    pub key: Option<String>,
}

#[derive(Deserialize)]
struct RawUploadedImage {
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    secure_url: Option<String>,
    #[serde(default)]
    location: Option<String>,
    #[serde(default)]
    key: Option<String>,
    #[serde(default)]
    public_id: Option<String>,
}

impl TryFrom<RawUploadedImage> for UploadedImage {
    type Error = &'static str;

    fn try_from(raw: RawUploadedImage) -> Result<Self, Self::Error> {
        let url = raw
            .url
            .or(raw.secure_url)
            .or(raw.location)
            .ok_or("uploaded image has no url")?;
        Ok(Self {
            url,
            key: raw.key.or(raw.public_id),
        })
    }
}

pub trait UploadService {
    /// Upload `files` as one batch. The result corresponds to the input by
    /// position.
    fn upload_batch(
        &self,
        files: &[PathBuf],
    ) -> impl Future<Output = anyhow::Result<Vec<UploadedImage>>>;
}
