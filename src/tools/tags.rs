use crate::error::{Result, ServerError};
use id3::frame::{Content, Frame, Picture, PictureType};
use id3::{Tag, TagLike, Version};
use std::path::Path;

/// Metadata stamped onto every rendered recording.
#[derive(Debug, Clone)]
pub struct TrackTags {
    pub artist: String,
    pub title: String,
    pub year: i32,
    pub album: String,
}

/// Embeds distribution metadata into a rendered audio file.
pub trait TagWriter: Send + Sync {
    fn stamp(&self, path: &Path, tags: &TrackTags, cover: Option<&[u8]>) -> Result<()>;
}

/// Writes ID3v2.4 tags in-process.
pub struct Id3TagWriter;

impl TagWriter for Id3TagWriter {
    fn stamp(&self, path: &Path, tags: &TrackTags, cover: Option<&[u8]>) -> Result<()> {
        let mut tag = Tag::new();
        tag.set_artist(&tags.artist);
        tag.set_title(&tags.title);
        tag.set_year(tags.year);
        tag.set_album(&tags.album);

        if let Some(artwork) = cover {
            let picture = Picture {
                mime_type: "image/png".to_string(),
                picture_type: PictureType::CoverFront,
                description: "Front cover".to_string(),
                data: artwork.to_vec(),
            };
            tag.add_frame(Frame::with_content("APIC", Content::Picture(picture)));
        }

        tag.write_to_path(path, Version::Id3v24)
            .map_err(|e| ServerError::Io(std::io::Error::other(e)))?;

        Ok(())
    }
}
