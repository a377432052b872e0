//! epub-merge - Merge EPUB volumes into one book

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use epub_merge::{MergeOptions, MergeReport, MetadataFields, VolumeRecord, extract_cover, merge_epubs};

#[derive(Parser)]
#[command(name = "epub-merge")]
#[command(version, about = "Merge several EPUB files into one book", long_about = None)]
#[command(after_help = "EXAMPLES:
    epub-merge saga.epub vol1.epub vol2.epub vol3.epub
    epub-merge saga.epub vol*.epub --title \"The Saga\" --author \"A//B\"
    epub-merge saga.epub vol1.epub vol2.epub --volume-label-template \"Vol.{n} {name}\"
    epub-merge saga.epub vol1.epub vol2.epub -C cover.jpg")]
struct Cli {
    /// Output EPUB file
    #[arg(value_name = "OUTPUT")]
    output: PathBuf,

    /// Input EPUB files, in reading order
    #[arg(value_name = "INPUT", required = true)]
    inputs: Vec<PathBuf>,

    /// Title of the merged book (default: output file name)
    #[arg(long)]
    title: Option<String>,

    /// Author(s), several separated by //
    #[arg(long)]
    author: Option<String>,

    /// Language code, also used for volume labels
    #[arg(long)]
    language: Option<String>,

    #[arg(long)]
    publisher: Option<String>,

    /// Publication date (YYYY-MM-DD)
    #[arg(long)]
    published: Option<String>,

    #[arg(long)]
    isbn: Option<String>,

    /// Subjects, several separated by //
    #[arg(long)]
    subject: Option<String>,

    #[arg(long)]
    description: Option<String>,

    /// Volume label template, e.g. "Vol.{n} {name}"
    #[arg(long, value_name = "TEMPLATE")]
    volume_label_template: Option<String>,

    /// Cover image, used if the first volume has none
    #[arg(short = 'c', long, value_name = "IMAGE")]
    cover: Option<PathBuf>,

    /// Cover image, replacing any existing cover
    #[arg(short = 'C', long, value_name = "IMAGE")]
    replace_cover: Option<PathBuf>,

    /// Extract the first input's cover to PATH (extension added automatically)
    #[arg(short = 'S', long, value_name = "PATH")]
    extract_cover: Option<PathBuf>,

    /// Print the merge report as JSON
    #[arg(long)]
    json: bool,

    /// Suppress output messages
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Log progress for every volume
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(&cli);

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn init_logging(cli: &Cli) {
    let level = if cli.quiet {
        "error"
    } else if cli.verbose {
        "info"
    } else {
        "warn"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();
}

fn run(cli: &Cli) -> Result<(), String> {
    if let Some(missing) = cli.inputs.iter().find(|path| !path.exists()) {
        return Err(format!("input file not found: {}", missing.display()));
    }

    let volumes: Vec<VolumeRecord> = cli.inputs.iter().map(VolumeRecord::from_path).collect();

    if let Some(ref dest) = cli.extract_cover {
        match extract_cover(&cli.inputs[0], dest) {
            Some(path) if !cli.quiet => println!("Cover extracted to: {}", path.display()),
            None if !cli.quiet => println!("No cover image found to extract."),
            _ => {}
        }
    }

    let report = merge_epubs(&cli.output, &volumes, &options(cli)).map_err(|e| e.to_string())?;

    if cli.json {
        let json = serde_json::to_string_pretty(&report).map_err(|e| e.to_string())?;
        println!("{json}");
    } else if !cli.quiet {
        print_summary(cli, &report);
    }

    Ok(())
}

fn options(cli: &Cli) -> MergeOptions {
    let metadata = MetadataFields {
        author: cli.author.clone(),
        language: cli.language.clone(),
        publisher: cli.publisher.clone(),
        published: cli.published.clone(),
        isbn: cli.isbn.clone(),
        subject: cli.subject.clone(),
        description: cli.description.clone(),
    };

    let mut options = MergeOptions::new().with_metadata(metadata);
    if let Some(ref title) = cli.title {
        options = options.with_title(title);
    }
    if let Some(ref template) = cli.volume_label_template {
        options = options.with_volume_label_template(template);
    }
    // -C wins over -c and forces replacement
    if let Some(ref cover) = cli.replace_cover {
        options = options.with_cover(cover).with_replace_cover(true);
    } else if let Some(ref cover) = cli.cover {
        options = options.with_cover(cover);
    }
    options
}

fn print_summary(cli: &Cli, report: &MergeReport) {
    println!(
        "Merged {} volumes into {}",
        report.volumes,
        cli.output.display()
    );
    println!("Manifest items: {}", report.manifest_items());
    println!("Spine items: {}", report.spine_items);
    if !report.warnings.is_empty() {
        println!("Warnings: {}", report.warnings.len());
        for warning in &report.warnings {
            println!("  {warning}");
        }
    }
}
