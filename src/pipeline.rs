use std::thread;

use crossbeam_channel::unbounded;
use log::{info, warn};

use crate::downloader::MediaDownloader;
use crate::metadata::MetadataSource;
use crate::resolver::TitlePattern;
use crate::tagger::TagWriter;
use crate::types::{Outcome, PipelineResult, Stage, TrackMetadata, TrackRequest};

/// Sequences resolve, download, metadata lookup and tag write for every
/// request. Entries are fully isolated from one another: a failure is
/// recorded in that entry's result and processing moves on.
pub struct Pipeline {
    pattern: TitlePattern,
    workers: usize,
    downloader: Box<dyn MediaDownloader>,
    metadata: Box<dyn MetadataSource>,
    tag_writer: Box<dyn TagWriter>,
}

impl Pipeline {
    pub fn new(
        pattern: TitlePattern,
        workers: usize,
        downloader: Box<dyn MediaDownloader>,
        metadata: Box<dyn MetadataSource>,
        tag_writer: Box<dyn TagWriter>,
    ) -> Self {
        Pipeline {
            pattern,
            workers: workers.max(1),
            downloader,
            metadata,
            tag_writer,
        }
    }

    /// Process all requests and return one result per request, in input
    /// order regardless of how many workers ran them.
    pub fn run(&self, requests: Vec<TrackRequest>) -> Vec<PipelineResult> {
        if self.workers == 1 {
            requests
                .into_iter()
                .map(|request| self.process_one(request))
                .collect()
        } else {
            self.run_parallel(requests)
        }
    }

    fn run_parallel(&self, requests: Vec<TrackRequest>) -> Vec<PipelineResult> {
        let (work_tx, work_rx) = unbounded();
        let (result_tx, result_rx) = unbounded();

        for indexed in requests.into_iter().enumerate() {
            // the channel is unbounded, sending cannot block or fail here
            let _ = work_tx.send(indexed);
        }
        drop(work_tx);

        let mut collected: Vec<(usize, PipelineResult)> = thread::scope(|scope| {
            for _ in 0..self.workers {
                let work_rx = work_rx.clone();
                let result_tx = result_tx.clone();

                scope.spawn(move || {
                    while let Ok((index, request)) = work_rx.recv() {
                        let result = self.process_one(request);
                        let _ = result_tx.send((index, result));
                    }
                });
            }

            drop(result_tx);
            result_rx.iter().collect()
        });

        // completion order is arbitrary, the contract is input order
        collected.sort_by_key(|(index, _)| *index);

        collected.into_iter().map(|(_, result)| result).collect()
    }

    fn process_one(&self, request: TrackRequest) -> PipelineResult {
        let identity = match self.pattern.resolve(&request.raw_title) {
            Ok(identity) => identity,
            Err(e) => return PipelineResult::failed(request, Stage::Parse, e.to_string()),
        };

        info!("downloading \"{}\"", request.raw_title);

        let file_path = match self.downloader.download(&request.source_url, &identity) {
            Ok(path) => path,
            Err(e) => return PipelineResult::failed(request, Stage::Download, e.to_string()),
        };

        let metadata = match self.metadata.search(&identity.artist, &identity.title) {
            Ok(Some(metadata)) => Some(metadata),
            Ok(None) => {
                warn!(
                    "no metadata match for \"{} - {}\"",
                    identity.artist, identity.title
                );
                None
            }
            Err(e) => {
                warn!(
                    "metadata lookup for \"{}\" failed, tagging from the bookmark title: {}",
                    request.raw_title, e
                );
                None
            }
        };

        let tags = match &metadata {
            Some(metadata) => metadata.clone(),
            None => TrackMetadata::from_identity(&identity),
        };

        if let Err(e) = self.tag_writer.write(&file_path, &tags) {
            return PipelineResult::failed(request, Stage::Tag, e.to_string());
        }

        let outcome = if metadata.is_some() {
            Outcome::Tagged { file_path }
        } else {
            Outcome::TaggedPartial { file_path }
        };

        PipelineResult { request, outcome }
    }
}
