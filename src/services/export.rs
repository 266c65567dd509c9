use anyhow::{bail, Context, Result};
use base64::engine::general_purpose;
use base64::Engine as _;
use flate2::write::GzEncoder;
use flate2::Compression;
use log::{info, warn};
use url::Url;

use crate::core::error::ExportError;
use crate::core::script::Script;
use crate::core::state::{ImageRef, PanelState, PanelStateTable};

pub const ARCHIVE_FILE_NAME: &str = "comic_export.tar.gz";

pub struct Exporter {
    client: reqwest::Client,
}

impl Exporter {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }

    // Packs every successful panel, in script order, into a gzipped tar.
    // Panels whose image cannot be materialized are skipped with a warning;
    // an archive with zero entries is an error, not an empty file.
    pub async fn export_all(
        &self,
        script: &Script,
        states: &PanelStateTable,
    ) -> Result<Vec<u8>, ExportError> {
        let encoder = GzEncoder::new(Vec::new(), Compression::default());
        let mut builder = tar::Builder::new(encoder);
        let mut added = 0usize;

        for (index, panel) in script.panels().iter().enumerate() {
            let PanelState::Success(image) = states.get(panel.id) else {
                continue;
            };

            let (bytes, extension) = match self.resolve_image(&image).await {
                Ok(resolved) => resolved,
                Err(err) => {
                    warn!("Skipping panel {} during export: {:#}", panel.id, err);
                    continue;
                }
            };

            let name = entry_name(index + 1, &panel.title, extension);
            let mut header = tar::Header::new_gnu();
            header.set_size(bytes.len() as u64);
            header.set_mode(0o644);
            header.set_cksum();
            builder.append_data(&mut header, &name, bytes.as_slice())?;
            added += 1;
        }

        if added == 0 {
            return Err(ExportError::NoSuccessfulPanels);
        }

        let encoder = builder.into_inner()?;
        let bytes = encoder.finish()?;
        info!("Packed {} panel images into the archive", added);
        Ok(bytes)
    }

    async fn resolve_image(&self, image: &ImageRef) -> Result<(Vec<u8>, &'static str)> {
        match image {
            ImageRef::Inline { mime, data } => {
                let bytes = general_purpose::STANDARD
                    .decode(data.trim())
                    .context("inline image payload is not valid base64")?;
                Ok((bytes, extension_for_mime(mime)))
            }
            ImageRef::Remote { url } => {
                let parsed = Url::parse(url).context("remote image reference is not a valid URL")?;
                let resp = self.client.get(parsed).send().await?;
                if !resp.status().is_success() {
                    bail!("image fetch failed with status {}", resp.status());
                }
                let bytes = resp.bytes().await?.to_vec();
                Ok((bytes, "png"))
            }
        }
    }
}

impl Default for Exporter {
    fn default() -> Self {
        Self::new()
    }
}

fn entry_name(ordinal: usize, title: &str, extension: &str) -> String {
    let slug = sanitize_title(title);
    if slug.is_empty() {
        format!("panel_{:02}.{}", ordinal, extension)
    } else {
        format!("panel_{:02}_{}.{}", ordinal, slug, extension)
    }
}

// Entry names stay ASCII so the archive unpacks the same everywhere. Titles
// that sanitize to nothing fall back to the bare ordinal.
fn sanitize_title(title: &str) -> String {
    let mut slug = String::new();
    let mut last_was_separator = true;
    for ch in title.chars() {
        if ch.is_ascii_alphanumeric() {
            slug.push(ch);
            last_was_separator = false;
        } else if !last_was_separator {
            slug.push('_');
            last_was_separator = true;
        }
    }
    slug.trim_matches('_').chars().take(32).collect()
}

fn extension_for_mime(mime: &str) -> &'static str {
    match mime {
        "image/jpeg" | "image/jpg" => "jpg",
        _ => "png",
    }
}
