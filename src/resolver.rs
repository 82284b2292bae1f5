use thiserror::Error;

use crate::types::ParsedIdentity;

/// How a bookmark display title encodes the track identity.
///
/// The title is split on the first occurrence of `separator` into exactly two
/// fields, and the two positions pick which field is the artist and which is
/// the title. Both orderings occur in the wild ("artist - title" as well as
/// "title ; artist"), so neither role is hardcoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TitlePattern {
    pub separator: String,
    pub artist_position: usize,
    pub title_position: usize,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ResolveError {
    #[error("separator \"{separator}\" does not occur in \"{raw_title}\"")]
    MissingSeparator {
        separator: String,
        raw_title: String,
    },
    #[error("field position {position} is out of range for \"{raw_title}\"")]
    PositionOutOfRange { position: usize, raw_title: String },
    #[error("the {field} field of \"{raw_title}\" is empty")]
    EmptyField {
        field: &'static str,
        raw_title: String,
    },
}

impl TitlePattern {
    /// Parse `raw_title` into a [`ParsedIdentity`].
    ///
    /// Pure function: the same title and pattern always give the same
    /// identity or the same error.
    pub fn resolve(&self, raw_title: &str) -> Result<ParsedIdentity, ResolveError> {
        let parts: Vec<&str> = raw_title.splitn(2, &self.separator).collect();

        if parts.len() < 2 {
            return Err(ResolveError::MissingSeparator {
                separator: self.separator.clone(),
                raw_title: raw_title.to_string(),
            });
        }

        let artist = parts
            .get(self.artist_position)
            .ok_or(ResolveError::PositionOutOfRange {
                position: self.artist_position,
                raw_title: raw_title.to_string(),
            })?
            .trim();

        let title = parts
            .get(self.title_position)
            .ok_or(ResolveError::PositionOutOfRange {
                position: self.title_position,
                raw_title: raw_title.to_string(),
            })?
            .trim();

        if artist.is_empty() {
            return Err(ResolveError::EmptyField {
                field: "artist",
                raw_title: raw_title.to_string(),
            });
        }

        if title.is_empty() {
            return Err(ResolveError::EmptyField {
                field: "title",
                raw_title: raw_title.to_string(),
            });
        }

        Ok(ParsedIdentity {
            artist: artist.to_string(),
            title: title.to_string(),
        })
    }
}
