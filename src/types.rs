use std::fmt;
use std::path::PathBuf;

/// One bookmark entry selected for processing, in folder child order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackRequest {
    pub source_url: String,
    pub raw_title: String,
}

/// The (artist, title) pair parsed out of a bookmark's display title.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedIdentity {
    pub artist: String,
    pub title: String,
}

/// Canonical tags for one track, as returned by the metadata provider.
///
/// On the degraded path (no provider match) only `title` and `artist` are
/// populated, straight from the [`ParsedIdentity`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TrackMetadata {
    pub title: String,
    pub artist: String,
    pub album: Option<String>,
    pub year: Option<i32>,
    pub cover_url: Option<String>,
}

impl TrackMetadata {
    pub fn from_identity(identity: &ParsedIdentity) -> TrackMetadata {
        TrackMetadata {
            title: identity.title.clone(),
            artist: identity.artist.clone(),
            ..TrackMetadata::default()
        }
    }
}

/// The pipeline stage a per-entry failure happened in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Parse,
    Download,
    Tag,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Parse => write!(f, "parse"),
            Stage::Download => write!(f, "download"),
            Stage::Tag => write!(f, "tag"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Downloaded and tagged with full provider metadata.
    Tagged { file_path: PathBuf },
    /// Downloaded and tagged, but no provider match was found, so only the
    /// parsed identity was embedded.
    TaggedPartial { file_path: PathBuf },
    Failed { stage: Stage, reason: String },
}

/// Per-request outcome, accumulated in request order and never mutated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineResult {
    pub request: TrackRequest,
    pub outcome: Outcome,
}

impl PipelineResult {
    pub fn failed(request: TrackRequest, stage: Stage, reason: String) -> PipelineResult {
        PipelineResult {
            request,
            outcome: Outcome::Failed { stage, reason },
        }
    }
}

#[derive(Debug, PartialEq, Eq)]
pub struct RunSummary {
    pub tagged: usize,
    pub partial: usize,
    pub failures: Vec<(String, Stage, String)>,
}

impl RunSummary {
    pub fn of(results: &[PipelineResult]) -> RunSummary {
        let mut summary = RunSummary {
            tagged: 0,
            partial: 0,
            failures: Vec::new(),
        };

        for result in results {
            match &result.outcome {
                Outcome::Tagged { .. } => summary.tagged += 1,
                Outcome::TaggedPartial { .. } => summary.partial += 1,
                Outcome::Failed { stage, reason } => summary.failures.push((
                    result.request.raw_title.clone(),
                    *stage,
                    reason.clone(),
                )),
            }
        }

        summary
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} tagged, {} tagged without provider metadata, {} failed",
            self.tagged,
            self.partial,
            self.failures.len()
        )?;

        for (title, stage, reason) in &self.failures {
            write!(f, "\n  \"{}\" failed at the {} stage: {}", title, stage, reason)?;
        }

        Ok(())
    }
}
