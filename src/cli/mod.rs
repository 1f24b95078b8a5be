//! Command-line front end for the two sync commands.

mod progress;

use std::path::PathBuf;

use clap::builder::BoolishValueParser;
use clap::{Args, Parser, Subcommand};

use crate::config::{Command, CommandFlags, FileConfig, RunConfig, SiteConfig};
use crate::engine::{Reporter, SyncEngine};
use crate::http::ReqwestHttpClient;
use crate::resolve::Resolver;
use crate::stats::RunResult;
use crate::store::JsonAttachmentStore;
use crate::thumbnails::{CommandImagePipeline, ImagePipeline, NoImagePipeline};

pub use progress::{ConsoleReporter, error_line, print_error};

/// Copy remote attachments of a content site into local storage.
#[derive(Parser, Debug)]
#[command(name = "attachment-sync", version, about)]
pub struct Cli {
    /// TOML config file. Defaults to `<config_dir>/attachment-sync/config.toml`.
    #[arg(long, value_name = "PATH", global = true)]
    pub config: Option<PathBuf>,

    /// JSON attachment store, overriding `[site] store`.
    #[arg(long, value_name = "PATH", global = true)]
    pub store: Option<PathBuf>,

    /// Local uploads root, overriding `[site] uploads_dir`.
    #[arg(long = "uploads-dir", value_name = "PATH", global = true)]
    pub uploads_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: TopCommand,
}

#[derive(Subcommand, Debug)]
pub enum TopCommand {
    /// Bulk download of remote attachments.
    #[command(subcommand)]
    DownloadAttachments(DownloadAttachmentsCommand),
    /// Media library maintenance.
    #[command(subcommand)]
    Media(MediaCommand),
}

#[derive(Subcommand, Debug)]
pub enum DownloadAttachmentsCommand {
    /// Download every attachment that is missing locally.
    Run(DownloadAttachmentsArgs),
}

#[derive(Subcommand, Debug)]
pub enum MediaCommand {
    /// Restore missing media files from the remote uploads URL.
    Restore(RestoreArgs),
}

#[derive(Args, Debug, Default)]
pub struct DownloadAttachmentsArgs {
    /// Regenerate image sizes after each download.
    #[arg(
        long = "generate_thumbs",
        value_name = "BOOL",
        num_args = 0..=1,
        require_equals = true,
        default_missing_value = "true",
        value_parser = BoolishValueParser::new()
    )]
    pub generate_thumbs: Option<bool>,

    /// Remote uploads URL, e.g. `https://example.com/app/uploads/`.
    #[arg(long = "uploads_url", value_name = "URL")]
    pub uploads_url: Option<String>,
}

#[derive(Args, Debug, Default)]
pub struct RestoreArgs {
    /// Regenerate image sizes after each download.
    #[arg(
        long,
        value_name = "BOOL",
        num_args = 0..=1,
        require_equals = true,
        default_missing_value = "true",
        value_parser = BoolishValueParser::new()
    )]
    pub generate: Option<bool>,

    /// Remote uploads URL, e.g. `https://example.com/app/uploads/`.
    #[arg(long = "uploads-url", alias = "uploads_url", value_name = "URL")]
    pub uploads_url: Option<String>,
}

impl TopCommand {
    /// The engine command and the flags given for it.
    #[must_use]
    pub fn flags(&self) -> (Command, CommandFlags) {
        match self {
            Self::DownloadAttachments(DownloadAttachmentsCommand::Run(args)) => (
                Command::DownloadAttachments,
                CommandFlags {
                    generate: args.generate_thumbs,
                    uploads_url: args.uploads_url.clone(),
                },
            ),
            Self::Media(MediaCommand::Restore(args)) => (
                Command::MediaRestore,
                CommandFlags {
                    generate: args.generate,
                    uploads_url: args.uploads_url.clone(),
                },
            ),
        }
    }
}

/// Picks the image pipeline configured in `[site]`.
fn image_pipeline(site: &SiteConfig) -> Box<dyn ImagePipeline> {
    match site
        .thumbnail_command
        .as_deref()
        .and_then(CommandImagePipeline::from_command)
    {
        Some(pipeline) => Box::new(pipeline),
        None => Box::new(NoImagePipeline),
    }
}

/// Parses the process arguments and runs the selected command.
///
/// # Errors
///
/// Returns configuration errors and store faults.
pub async fn run() -> crate::Result<()> {
    let cli = Cli::parse();
    run_with(cli, &ConsoleReporter::new()).await?;
    Ok(())
}

/// Runs an already parsed command line against `reporter`.
///
/// The run configuration is validated before the store is opened, so a
/// missing uploads URL fails without touching anything.
///
/// # Errors
///
/// Returns configuration errors and store faults.
pub async fn run_with(cli: Cli, reporter: &dyn Reporter) -> crate::Result<RunResult> {
    let config_path = cli.config.unwrap_or_else(FileConfig::default_path);
    let file = FileConfig::load(&config_path)?;

    let (command, flags) = cli.command.flags();
    let config = RunConfig::for_command(command, &flags, &file)?;
    let site = SiteConfig::resolve(&file.site, cli.store, cli.uploads_dir);

    log::info!(
        "{} from {} into {} (store {})",
        command.invocation(),
        config.remote_base_url,
        site.uploads_dir.display(),
        site.store.display()
    );

    let resolver = Resolver::new(
        &config.remote_base_url,
        site.uploads_dir.clone(),
        &site.content_dir,
    )?;
    let store = JsonAttachmentStore::open(&site.store)?;
    let http = ReqwestHttpClient::new()?;
    let pipeline = image_pipeline(&site);

    let mut engine = SyncEngine::new(config, resolver, store, http, pipeline);
    engine.run(reporter).await
}
