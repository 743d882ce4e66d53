//! Elevator inspection command line
//!
//! Each invocation restores the session from the store directory, runs one
//! command, saves and exits. Section numbers on the command line are the
//! 1-based numbers shown in the section titles.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use inspection_core::{
    CancelToken, FileStore, InspectionConfig, InspectionSession, RawUpload, TracingNotifier,
};
use inspection_types::{label_for, FieldValue, ImageMime, PhotoId, SECTIONS};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser, Debug)]
#[command(name = "inspection")]
#[command(version, about = "Elevator inspection form with photos and PDF report")]
struct Cli {
    /// TOML configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Directory backing the session store
    #[arg(long, global = true, default_value = ".inspection")]
    store_dir: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Show progress, sections and photo counts
    Status,
    /// Set a form field
    Set {
        field: String,
        value: String,
        /// Store the value as a checkbox state (true/false, oui/non)
        #[arg(long)]
        bool: bool,
    },
    /// Jump to a section
    Goto { section: usize },
    /// Validate the current section and move on
    Next,
    /// Validate every section and list missing fields
    Validate,
    /// Manage section photos
    #[command(subcommand)]
    Photos(PhotosCommand),
    /// Render the PDF report
    Render {
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Discard the current inspection
    Reset,
}

#[derive(Subcommand, Debug)]
enum PhotosCommand {
    /// Add image files to a section
    Add {
        #[arg(short, long)]
        section: usize,
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
    /// Remove a photo by id
    Remove {
        #[arg(short, long)]
        section: usize,
        id: String,
    },
    /// List photos, optionally for one section
    List {
        #[arg(short, long)]
        section: Option<usize>,
    },
}

/// Convert a 1-based section number to an index
fn section_index(number: usize) -> Result<usize> {
    if number == 0 || number > SECTIONS.len() {
        bail!("section must be between 1 and {}", SECTIONS.len());
    }
    Ok(number - 1)
}

fn parse_bool(value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "oui" | "yes" | "1" | "on" => Ok(true),
        "false" | "non" | "no" | "0" | "off" => Ok(false),
        other => bail!("not a boolean: {}", other),
    }
}

/// MIME type as a file picker would declare it, from the extension only
fn declared_mime(path: &Path) -> String {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or_default()
        .to_ascii_lowercase();
    if let Some(mime) = ImageMime::from_extension(&ext) {
        return mime.as_str().to_string();
    }
    match ext.as_str() {
        "bmp" | "tif" | "tiff" | "heic" | "heif" | "avif" => format!("image/{}", ext),
        _ => "application/octet-stream".to_string(),
    }
}

fn load_config(path: Option<&Path>) -> Result<InspectionConfig> {
    match path {
        Some(path) => InspectionConfig::from_file(path)
            .with_context(|| format!("Failed to load config from {}", path.display())),
        None => Ok(InspectionConfig::default()),
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = load_config(cli.config.as_deref())?;
    let store = FileStore::new(&cli.store_dir)
        .with_context(|| format!("Failed to open store at {}", cli.store_dir.display()))?
        .with_quota(config.store.quota_bytes);

    let session = InspectionSession::new(config, Arc::new(store), Arc::new(TracingNotifier));
    session.restore().await;

    execute(&session, cli.command).await?;

    if !session.flush().await {
        tracing::warn!("Session could not be saved; changes from this run are lost");
    }
    Ok(())
}

async fn execute(session: &InspectionSession, command: Command) -> Result<()> {
    match command {
        Command::Status => print_status(session).await,
        Command::Set { field, value, bool } => {
            let value = if bool {
                FieldValue::Bool(parse_bool(&value)?)
            } else {
                FieldValue::Text(value)
            };
            session.set_field(&field, value).await;
        }
        Command::Goto { section } => {
            session.go_to_section(section_index(section)?).await?;
            println!("{}", SECTIONS[section - 1].title);
        }
        Command::Next => {
            let current = session.next_section().await?;
            println!("{}", SECTIONS[current].title);
        }
        Command::Validate => {
            for section in SECTIONS.iter() {
                let missing = session.validate_section(section.index).await?;
                if missing.is_empty() {
                    println!("[x] {}", section.title);
                } else {
                    let labels: Vec<&str> = missing.iter().map(|m| label_for(m)).collect();
                    println!("[ ] {} (manquant : {})", section.title, labels.join(", "));
                }
            }
        }
        Command::Photos(PhotosCommand::Add { section, files }) => {
            let index = section_index(section)?;
            let mut uploads = Vec::with_capacity(files.len());
            for path in &files {
                let bytes = std::fs::read(path)
                    .with_context(|| format!("Failed to read {}", path.display()))?;
                let name = path
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_else(|| path.display().to_string());
                uploads.push(RawUpload::new(name, declared_mime(path), bytes));
            }
            let report = session.upload_photos(index, uploads).await?;
            println!(
                "{} ajoutée(s), {} ignorée(s), {} en échec, {} refusée(s)",
                report.accepted.len(),
                report.skipped.len(),
                report.failed.len(),
                report.rejected_count
            );
            for id in &report.accepted {
                println!("  {}", id);
            }
        }
        Command::Photos(PhotosCommand::Remove { section, id }) => {
            let index = section_index(section)?;
            if !session.remove_photo(index, &PhotoId::from(id.as_str())).await {
                bail!("no photo {} in section {}", id, section);
            }
        }
        Command::Photos(PhotosCommand::List { section }) => {
            let indices = match section {
                Some(number) => vec![section_index(number)?],
                None => SECTIONS.iter().map(|s| s.index).collect(),
            };
            for index in indices {
                let photos = session.photos(index).await;
                if photos.is_empty() {
                    continue;
                }
                println!("{}", SECTIONS[index].title);
                for photo in photos {
                    println!("  {}  {}  {} octets", photo.id, photo.display_name, photo.byte_size);
                }
            }
        }
        Command::Render { output } => {
            let report = session.render_report(&CancelToken::new()).await?;
            let path = output.unwrap_or_else(|| PathBuf::from(&report.file_name));
            std::fs::write(&path, &report.pdf)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            println!(
                "{} ({} page(s), {} photo(s) en erreur)",
                path.display(),
                report.pages,
                report.failed_photos
            );
        }
        Command::Reset => session.new_inspection().await,
    }
    Ok(())
}

async fn print_status(session: &InspectionSession) {
    let snapshot = session.snapshot().await;
    println!(
        "Progression : {:.0}%  (section courante : {})",
        snapshot.progress() * 100.0,
        SECTIONS[snapshot.current_section].title
    );
    for section in SECTIONS.iter() {
        let mark = if snapshot.completed_sections.contains(&section.index) {
            "x"
        } else {
            " "
        };
        let photos = snapshot.section_photos.count(section.index);
        if section.accepts_photos() {
            println!("[{}] {}  ({} photo(s))", mark, section.title, photos);
        } else {
            println!("[{}] {}", mark, section.title);
        }
    }
    if let Some(saved) = snapshot.last_saved {
        println!("Dernière sauvegarde : {}", saved.to_rfc3339());
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    run(cli).await
}
