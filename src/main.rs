use std::fs;

use anyhow::{Context, Result};
use log::{info, warn};

use crate::api::cli::{Cli, CliCommand};
use crate::config::config::Config;
use crate::downloader::YtDlpDownloader;
use crate::library::{chromium_library::ChromiumLibrary, locate_folder, Library};
use crate::metadata::{MetadataSource, NoMetadataSource, SpotifyClient};
use crate::pipeline::Pipeline;
use crate::tagger::LoftyTagWriter;
use crate::types::{RunSummary, TrackRequest};

mod api;
mod config;
mod downloader;
mod library;
mod metadata;
mod pipeline;
mod resolver;
mod tagger;
mod types;

fn main() -> Result<()> {
    colog::init();

    let cli = Cli {};
    let program = cli.run();

    match program.command {
        CliCommand::List { config } => command_list(config),
        CliCommand::Run { config, workers } => command_run(config, workers),
    }
}

fn load_requests(config: &Config) -> Result<Vec<TrackRequest>> {
    // TODO: support Firefox's places.sqlite as a second library source
    let library: Box<dyn Library> = Box::new(ChromiumLibrary {});

    let tree = library.get_tree(&config.get_bookmark_file()?, config.get_root())?;
    let requests = locate_folder(&tree, &config.get_locator())?;

    Ok(requests)
}

fn command_list(config_path: Option<String>) -> Result<()> {
    let config = Config::new_from_file(config_path)?;
    let requests = load_requests(&config)?;
    let pattern = config.get_pattern();

    for request in &requests {
        match pattern.resolve(&request.raw_title) {
            Ok(identity) => println!(
                "{} - {} ({})",
                identity.artist, identity.title, request.source_url
            ),
            Err(e) => println!("[unparsable] {} ({}): {}", request.raw_title, request.source_url, e),
        }
    }

    Ok(())
}

fn command_run(config_path: Option<String>, workers: Option<usize>) -> Result<()> {
    let config = Config::new_from_file(config_path)?;
    let requests = load_requests(&config)?;

    info!("found {} tracks to download", requests.len());

    let output_dir = config.get_output_dir()?;
    fs::create_dir_all(&output_dir).with_context(|| {
        format!("cannot create output directory \"{}\"", output_dir.display())
    })?;

    let timeout = config.get_timeout();

    let downloader = YtDlpDownloader::new(output_dir, timeout, config.get_collision_policy());

    let metadata: Box<dyn MetadataSource> = match config.get_spotify_credentials() {
        Some((client_id, client_secret)) => {
            Box::new(SpotifyClient::new(client_id, client_secret, timeout))
        }
        None => {
            warn!("no spotify credentials configured, tracks will be tagged from bookmark titles only");
            Box::new(NoMetadataSource)
        }
    };

    let tag_writer = LoftyTagWriter::new(timeout);

    let pipeline = Pipeline::new(
        config.get_pattern(),
        workers.unwrap_or_else(|| config.get_workers()),
        Box::new(downloader),
        metadata,
        Box::new(tag_writer),
    );

    let results = pipeline.run(requests);
    let summary = RunSummary::of(&results);

    println!("{summary}");

    Ok(())
}
