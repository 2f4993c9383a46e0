use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use scoresplit::{collect_scores, ClefMode, MuseScore, SplitOptions, Splitter};

/// Split MusicXML scores into single-page fragments.
#[derive(Debug, Parser)]
#[command(name = "scoresplit", version)]
struct Cli {
    /// Score file (.musicxml, .xml, .mxl) or a directory of them
    input: PathBuf,

    /// Output directory
    output: PathBuf,

    /// TOML file with split options
    #[arg(long)]
    config: Option<PathBuf>,

    /// Maximum rendered pages per padded candidate
    #[arg(long)]
    budget: Option<usize>,

    /// Renderer executable
    #[arg(long)]
    renderer: Option<PathBuf>,

    /// Track a single clef instead of one per staff
    #[arg(long)]
    single_clef: bool,

    /// Keep padded documents next to each page
    #[arg(long)]
    keep_padded: bool,

    #[arg(short, long)]
    verbose: bool,
}

fn init_logger(verbose: bool) {
    let default = if verbose { "scoresplit=debug,info" } else { "scoresplit=info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_thread_ids(false)
                .compact(),
        )
        .init();
}

fn options(cli: &Cli) -> scoresplit::Result<SplitOptions> {
    let mut options = match &cli.config {
        Some(path) => SplitOptions::from_toml_file(path)?,
        None => SplitOptions::default(),
    };
    if let Some(budget) = cli.budget {
        options.page_budget = budget;
    }
    if let Some(renderer) = &cli.renderer {
        options.renderer = renderer.clone();
    }
    if cli.single_clef {
        options.clef_mode = ClefMode::Single;
    }
    options.keep_padded |= cli.keep_padded;
    Ok(options)
}

fn run(cli: &Cli) -> scoresplit::Result<bool> {
    let options = options(cli)?;
    let renderer = MuseScore::new(options.renderer.clone());
    let splitter = Splitter::new(renderer, options)?;

    let report = if cli.input.is_dir() {
        let inputs = collect_scores(&cli.input)?;
        tracing::info!(works = inputs.len(), "splitting corpus");
        splitter.split_corpus(&inputs, &cli.output)
    } else {
        splitter.split_file(&cli.input, &cli.output)?
    };

    std::fs::create_dir_all(&cli.output)?;
    report.write_json(cli.output.join("report.json"))?;

    for flagged in &report.flagged_pages {
        tracing::warn!(
            work = %flagged.work,
            page = flagged.page,
            artifact = %flagged.artifact.display(),
            "page flagged"
        );
    }
    println!("{}", report.summary());
    Ok(!report.has_failures())
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logger(cli.verbose);

    match run(&cli) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            tracing::error!(error = %e, "split failed");
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}
