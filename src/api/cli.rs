use clap::{Parser, Subcommand};

pub struct Cli;

impl Cli {
    pub fn run(&self) -> CliProgram {
        CliProgram::parse()
    }
}

#[derive(Parser)]
#[command(author, version, about)]
pub struct CliProgram {
    #[command(subcommand)]
    pub command: CliCommand,
}

#[derive(Subcommand)]
pub enum CliCommand {
    #[command(
        about = "Print the tracks found in the configured bookmark folder, without downloading anything"
    )]
    List {
        #[arg(
            long,
            short,
            value_name = "FILE_PATH",
            help = "Custom path to config file"
        )]
        config: Option<String>,
    },
    #[command(about = "Download, convert and tag every track in the configured bookmark folder")]
    Run {
        #[arg(
            long,
            short,
            value_name = "FILE_PATH",
            help = "Custom path to config file"
        )]
        config: Option<String>,

        #[arg(
            long,
            short,
            value_name = "COUNT",
            help = "Process this many tracks concurrently (overrides the config file)"
        )]
        workers: Option<usize>,
    },
}
