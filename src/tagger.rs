use std::io::Read;
use std::path::{Path, PathBuf};
use std::time::Duration;

use lofty::config::WriteOptions;
use lofty::file::TaggedFileExt;
use lofty::picture::{MimeType, Picture, PictureType};
use lofty::tag::{Accessor, ItemKey, Tag, TagExt};
use log::warn;
use thiserror::Error;

use crate::types::TrackMetadata;

#[derive(Debug, Error)]
pub enum TagError {
    #[error("tagging failed: {0}")]
    Lofty(#[from] lofty::error::LoftyError),
    #[error("\"{0}\" does not support tags")]
    Unsupported(PathBuf),
}

pub trait TagWriter: Send + Sync {
    /// Embed `metadata` into the audio file at `file_path`. Fields that are
    /// `None` are left unset.
    fn write(&self, file_path: &Path, metadata: &TrackMetadata) -> Result<(), TagError>;
}

/// Writes tags with lofty. Cover art is fetched from the metadata's cover
/// url; a failed cover fetch is logged and skipped rather than failing the
/// whole tag write.
pub struct LoftyTagWriter {
    agent: ureq::Agent,
}

impl LoftyTagWriter {
    pub fn new(timeout: Duration) -> Self {
        LoftyTagWriter {
            agent: ureq::AgentBuilder::new().timeout(timeout).build(),
        }
    }

    fn fetch_cover(&self, cover_url: &str) -> anyhow::Result<Vec<u8>> {
        let response = self.agent.get(cover_url).call()?;

        let mut data = Vec::new();
        // Album covers are small; 10 MiB is already generous.
        response
            .into_reader()
            .take(10 * 1024 * 1024)
            .read_to_end(&mut data)?;

        Ok(data)
    }
}

impl TagWriter for LoftyTagWriter {
    fn write(&self, file_path: &Path, metadata: &TrackMetadata) -> Result<(), TagError> {
        let mut tagged_file = lofty::read_from_path(file_path)?;

        if tagged_file.primary_tag().is_none() {
            let tag_type = tagged_file.primary_tag_type();
            tagged_file.insert_tag(Tag::new(tag_type));
        }

        let Some(tag) = tagged_file.primary_tag_mut() else {
            return Err(TagError::Unsupported(file_path.to_path_buf()));
        };

        tag.set_title(metadata.title.clone());
        tag.set_artist(metadata.artist.clone());
        // Mirror the track artist into the album artist field
        tag.insert_text(ItemKey::AlbumArtist, metadata.artist.clone());

        if let Some(album) = &metadata.album {
            tag.set_album(album.clone());
        }

        if let Some(year) = metadata.year {
            if year > 0 {
                tag.set_year(year as u32);
            }
        }

        if let Some(cover_url) = &metadata.cover_url {
            match self.fetch_cover(cover_url) {
                Ok(data) => {
                    let mime_type = sniff_mime(&data);
                    let picture =
                        Picture::new_unchecked(PictureType::CoverFront, Some(mime_type), None, data);

                    tag.push_picture(picture);
                }
                Err(e) => warn!("cannot fetch cover from \"{}\": {}", cover_url, e),
            }
        }

        tag.save_to_path(file_path, WriteOptions::default())?;

        Ok(())
    }
}

fn sniff_mime(data: &[u8]) -> MimeType {
    if data.starts_with(&[0x89, 0x50, 0x4E, 0x47]) {
        MimeType::Png
    } else {
        // JPEG magic is FF D8 FF; it is also the safe assumption
        MimeType::Jpeg
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn it_recognizes_png_covers() {
        let data = [0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A];

        assert_eq!(sniff_mime(&data), MimeType::Png);
    }

    #[test]
    fn it_assumes_jpeg_otherwise() {
        assert_eq!(sniff_mime(&[0xFF, 0xD8, 0xFF, 0xE0]), MimeType::Jpeg);
        assert_eq!(sniff_mime(&[]), MimeType::Jpeg);
    }
}
