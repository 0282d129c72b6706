//! wikibatch: batch uploads of scanned media to a wiki media repository
//!
//! Drives the pipeline from institution-supplied CSV metadata to uploaded,
//! categorised files: make-info, prep, upload and the mapping-list plumbing
//! around it.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing::{warn, Level};
use tracing_subscriber::FmtSubscriber;
use wikibatch::{
    api::WikiClient,
    config::{Config, LogLevel, DEFAULT_USER_AGENT},
    makeinfo::{CsvInfoMaker, InfoMaker},
    post, prep, upload,
    upload::UploadJobOptions,
};

#[derive(Parser)]
#[command(name = "wikibatch")]
#[command(about = "Batch uploads of scanned media to a wiki media repository")]
#[command(version)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, default_value = "wikibatch.toml")]
    config: PathBuf,

    /// Verbosity level
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize a new wikibatch configuration
    Init {
        /// Output directory
        #[arg(default_value = ".")]
        path: PathBuf,
    },

    /// Generate per-file info records from a metadata CSV
    MakeInfo {
        /// Path to the metadata CSV file
        in_file: PathBuf,

        /// Base name for the output files
        #[arg(short, long)]
        base_name: Option<PathBuf>,

        /// Also render merge proposals for the local mapping mirrors
        #[arg(long)]
        update_mappings: bool,
    },

    /// Refresh the on-wiki mapping lists and render merge proposals
    UpdateMappings {
        /// Path to the metadata CSV file
        in_file: PathBuf,
    },

    /// Rename media files and write their description side-cars
    Prep {
        /// Directory holding the raw media files
        in_path: PathBuf,

        /// Directory to move the prepared files into
        out_path: PathBuf,

        /// The JSON output of make-info
        data_file: PathBuf,
    },

    /// Upload the prepared files of a directory, or from URLs
    Upload {
        /// Prepared directory, or in URL mode the JSON output of make-info
        in_path: PathBuf,

        /// Treat in_path as an info JSON keyed by URL
        #[arg(long)]
        url_mode: bool,

        /// Stop after this many upload attempts
        #[arg(long)]
        cutoff: Option<usize>,

        /// Print what would be uploaded without uploading
        #[arg(long)]
        test: bool,

        /// Echo the outcome of every attempt
        #[arg(long)]
        confirm: bool,

        /// Upload in one request instead of chunks
        #[arg(long)]
        no_chunk: bool,

        /// File listing the only URLs to upload, one per line (URL mode)
        #[arg(long)]
        only: Option<PathBuf>,

        /// File listing URLs to skip, one per line (URL mode)
        #[arg(long)]
        skip: Option<PathBuf>,

        /// Attach structured data after each successful upload (URL mode)
        #[arg(long)]
        with_sdc: bool,
    },

    /// Remove redundant categories from uploaded files
    TrimCategory {
        /// The category to work through
        category: String,

        /// Remove this category instead of the parent category
        #[arg(long)]
        second: Option<String>,

        /// Only edit files whose name contains this string
        #[arg(long)]
        in_filename: Option<String>,

        /// Edit summary to use instead of the default
        #[arg(long)]
        summary: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // init runs before any configuration exists
    if let Commands::Init { path } = &cli.command {
        setup_logging(Level::INFO)?;
        return init_config(path);
    }

    let config = Config::load(&cli.config)?;
    let log_level = match cli.verbose {
        0 => match config.logging.level {
            LogLevel::Trace => Level::TRACE,
            LogLevel::Debug => Level::DEBUG,
            LogLevel::Info => Level::INFO,
            LogLevel::Warn => Level::WARN,
            LogLevel::Error => Level::ERROR,
        },
        1 => Level::DEBUG,
        _ => Level::TRACE,
    };
    setup_logging(log_level)?;

    match cli.command {
        Commands::Init { .. } => unreachable!("handled above"),
        Commands::MakeInfo {
            in_file,
            base_name,
            update_mappings,
        } => make_info(config, in_file, base_name, update_mappings),
        Commands::UpdateMappings { in_file } => update_mappings(config, in_file).await,
        Commands::Prep {
            in_path,
            out_path,
            data_file,
        } => prep_upload(config, in_path, out_path, data_file),
        Commands::Upload {
            in_path,
            url_mode,
            cutoff,
            test,
            confirm,
            no_chunk,
            only,
            skip,
            with_sdc,
        } => {
            let verbose = confirm || cli.verbose > 0;
            if url_mode {
                upload_urls(config, in_path, cutoff, test, only, skip, with_sdc, verbose).await
            } else {
                upload_files(config, in_path, cutoff, test, no_chunk, verbose).await
            }
        }
        Commands::TrimCategory {
            category,
            second,
            in_filename,
            summary,
        } => trim_category(config, category, second, in_filename, summary).await,
    }
}

fn setup_logging(level: Level) -> Result<()> {
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;
    Ok(())
}

fn init_config(path: &Path) -> Result<()> {
    let config_path = path.join("wikibatch.toml");

    let toml_content = format!(
        r#"# wikibatch configuration

[site]
api_url = "https://commons.wikimedia.org/w/api.php"
username = ""
# the password is read from this environment variable, never from this file
password_env = "WIKIBATCH_PASSWORD"
user_agent = "{user_agent}"
request_timeout_secs = 120

[batch]
# expected CSV header, in order
header = "idno|title|description|date|photographer|keywords"
key_columns = ["idno"]
list_columns = ["keywords"]
delimiter = "|"
list_delimiter = ";"
description_column = "description"
date_column = "date"
idno_column = "idno"
people_columns = ["photographer"]
keyword_columns = ["keywords"]
institution = ""
info_template = "Photograph"
template_params = [
    {{ param = "title", column = "title" }},
    {{ param = "description", column = "description" }},
    {{ param = "date", column = "date" }},
    {{ param = "photographer", column = "photographer" }},
]
footer_templates = []
base_meta_cat = ""
batch_label = ""

[upload]
chunk_size_mb = 5
chunked = true
file_exts = [".tif", ".jpg", ".tiff", ".jpeg"]
done_dir = "Uploaded"

[mappings]
page_prefix = ""
lists = ["People", "Keywords"]
mapping_dir = "connections"
wikitext_dir = "connections"
row_template = "mapping-row"
header_template = "{{{{mapping-head}}}}"
intro_text = ""
na_value = "-"
list_delimiter = "/"

[logging]
level = "info"
"#,
        user_agent = DEFAULT_USER_AGENT,
    );

    std::fs::write(&config_path, toml_content)
        .with_context(|| format!("Failed to write {}", config_path.display()))?;

    println!("Created configuration at {}", config_path.display());
    println!("Fill in site.username, batch.* and export the password:");
    println!("  export WIKIBATCH_PASSWORD=...");
    Ok(())
}

fn make_info(
    config: Config,
    in_file: PathBuf,
    base_name: Option<PathBuf>,
    update_mappings: bool,
) -> Result<()> {
    let lists = config.mappings.lists.clone();
    let intro_text = config.mappings.intro_text.clone();
    let mut maker = CsvInfoMaker::new(config.batch, config.mappings);
    let json_file = maker
        .run(&in_file, base_name.as_deref())
        .with_context(|| format!("Failed to process {}", in_file.display()))?;

    println!("Info records written to {}", json_file.display());
    println!("Review the *.filenames.txt file before running prep.");

    // offline variant of update-mappings, merging against the local mirrors
    if update_mappings {
        let counters = maker.harvest_counters();
        for name in &lists {
            let counter = match counters.get(name.as_str()) {
                Some(counter) => counter,
                None => continue,
            };
            let list = maker.mapping_list(name)?;
            let (new_mappings, preserved) = list.mappings_merger(counter)?;
            let rendered = list.save_as_wikitext(&new_mappings, &preserved, &intro_text)?;
            println!("Created {}", rendered.display());
        }
    }
    Ok(())
}

async fn update_mappings(config: Config, in_file: PathBuf) -> Result<()> {
    let mut maker = CsvInfoMaker::new(config.batch, config.mappings.clone());
    maker
        .load_and_process(&in_file)
        .with_context(|| format!("Failed to process {}", in_file.display()))?;
    let counters = maker.harvest_counters();

    let mut client = WikiClient::new(&config.site)?;
    client.login().await?;

    for name in &config.mappings.lists {
        let list = maker.mapping_list(name)?;
        match client.get_wikitext(list.page_title()).await? {
            Some(contents) => {
                let mirror = list.store_scraped(&contents)?;
                println!("Mirrored [[{}]] to {}", list.page_title(), mirror.display());
            }
            None => {
                warn!(
                    "[[{}]] does not exist yet, merging against the local mirror",
                    list.page_title()
                );
            }
        }

        let counter = match counters.get(name.as_str()) {
            Some(counter) => counter,
            None => {
                println!("No values to map for {}, skipped", name);
                continue;
            }
        };
        let (new_mappings, preserved) = list.mappings_merger(counter)?;
        let rendered =
            list.save_as_wikitext(&new_mappings, &preserved, &config.mappings.intro_text)?;
        println!(
            "Created {} ({} rows, {} preserved)",
            rendered.display(),
            new_mappings.len(),
            preserved.len()
        );
    }
    Ok(())
}

fn prep_upload(
    config: Config,
    in_path: PathBuf,
    out_path: PathBuf,
    data_file: PathBuf,
) -> Result<()> {
    let summary = prep::run(&in_path, &out_path, &data_file, &config.upload.file_exts)
        .with_context(|| format!("Failed to prepare {}", in_path.display()))?;

    println!("\nPrepared upload in {}", out_path.display());
    println!("  Media files found:   {}", summary.found);
    println!("  Matched against data: {}", summary.matched);
    if summary.found > summary.matched {
        println!(
            "  Unmatched files stay in {}",
            in_path.display()
        );
    }
    Ok(())
}

async fn upload_files(
    config: Config,
    in_path: PathBuf,
    cutoff: Option<usize>,
    test: bool,
    no_chunk: bool,
    verbose: bool,
) -> Result<()> {
    let mut upload_cfg = config.upload.clone();
    if no_chunk {
        upload_cfg.chunked = false;
    }

    let mut client = WikiClient::new(&config.site)?;
    if !test {
        client.login().await?;
    }

    let opts = UploadJobOptions {
        cutoff,
        test,
        verbose,
        ..UploadJobOptions::default()
    };
    let stats = upload::up_all(&mut client, &in_path, &upload_cfg, &opts).await?;

    print_upload_stats(&stats);
    Ok(())
}

#[allow(clippy::too_many_arguments)]
async fn upload_urls(
    config: Config,
    info_file: PathBuf,
    cutoff: Option<usize>,
    test: bool,
    only: Option<PathBuf>,
    skip: Option<PathBuf>,
    with_sdc: bool,
    verbose: bool,
) -> Result<()> {
    let only = only.map(|path| read_url_list(&path)).transpose()?;
    let skip = skip.map(|path| read_url_list(&path)).transpose()?;

    let mut client = WikiClient::new(&config.site)?;
    if !test {
        client.login().await?;
    }

    let opts = UploadJobOptions {
        cutoff,
        test,
        verbose,
        with_sdc,
        only,
        skip,
    };
    let stats =
        upload::up_all_from_url(&mut client, &info_file, &config.upload.file_exts, &opts)
            .await?;

    print_upload_stats(&stats);
    Ok(())
}

fn print_upload_stats(stats: &upload::UploadStats) {
    println!("\nUpload finished:");
    println!("  Uploaded: {}", stats.uploaded);
    println!("  Warnings: {}", stats.warnings);
    println!("  Errors:   {}", stats.errors);
    println!("  Skipped:  {}", stats.skipped);
}

/// One URL per line, blank lines and surrounding whitespace dropped.
fn read_url_list(path: &Path) -> Result<Vec<String>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    Ok(content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(String::from)
        .collect())
}

async fn trim_category(
    config: Config,
    category: String,
    second: Option<String>,
    in_filename: Option<String>,
    summary: Option<String>,
) -> Result<()> {
    let mut client = WikiClient::new(&config.site)?;
    client.login().await?;

    let edited = match second {
        Some(del_category) => {
            post::trim_second_category(
                &mut client,
                &category,
                &del_category,
                in_filename.as_deref(),
                summary.as_deref(),
            )
            .await?
        }
        None => post::trim_parent_category(&mut client, &category, summary.as_deref()).await?,
    };

    println!("Edited {} file pages", edited);
    Ok(())
}
