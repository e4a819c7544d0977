//! romshelf CLI
//!
//! Command-line curator for EmulationStation game libraries: browse the
//! gamelist, mark entries for deletion, translate descriptions, and
//! bulk-compress preview videos.

use std::io::Write;
use std::path::PathBuf;

use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use owo_colors::OwoColorize;
use owo_colors::Stream::Stdout;

use romshelf_lib::compress::CompressProgress;
use romshelf_lib::progress::format_eta;
use romshelf_lib::translate::{self, TranslateProgress};
use romshelf_lib::{
    CompressOptions, FfProber, FfmpegEncoder, GoogleTranslator, Library, MarkSet,
};

#[derive(Parser)]
#[command(name = "romshelf")]
#[command(about = "Curate an EmulationStation game library", long_about = None)]
struct Cli {
    /// Library root containing gamelist.xml (defaults to saved root, then cwd)
    #[arg(short, long, global = true)]
    root: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List the library grouped by system
    List {
        /// Only show entries marked for deletion
        #[arg(long)]
        marked: bool,
    },

    /// Manage deletion marks
    Mark {
        #[command(subcommand)]
        action: MarkAction,
    },

    /// Delete all marked entries (XML node, rom, image, video)
    Delete {
        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },

    /// Translate untranslated descriptions in batches
    Translate {
        /// Source language code
        #[arg(long)]
        source: Option<String>,

        /// Target language code
        #[arg(long)]
        target: Option<String>,

        /// Persist accumulated translations every N batches
        #[arg(long)]
        save_interval: Option<usize>,
    },

    /// Re-encode preview videos under a media directory
    Compress {
        /// Media directory to scan (default: <root>/media)
        #[arg(long)]
        media_dir: Option<PathBuf>,

        /// Resolution scale factor (0.1-1.0)
        #[arg(long)]
        scale: Option<f64>,

        /// x264 CRF quality (0-51, lower is better)
        #[arg(long)]
        crf: Option<u32>,

        /// Maximum output duration in seconds (longer clips are center-trimmed)
        #[arg(long)]
        max_duration: Option<f64>,

        /// Concurrent encode jobs
        #[arg(short, long)]
        jobs: Option<usize>,
    },

    /// Manage saved settings
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum MarkAction {
    /// Mark entries by id
    Add { ids: Vec<String> },

    /// Unmark entries by id
    Remove { ids: Vec<String> },

    /// Remove all marks
    Clear,

    /// Show marked entries
    Show,
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Show the saved settings
    Show,

    /// Save a library root as the default
    SetRoot { path: PathBuf },

    /// Forget the saved library root
    ClearRoot,

    /// Print the settings file path
    Path,
}

fn main() {
    env_logger::init();
    let cli = Cli::parse();
    let root = romshelf_lib::settings::resolve_library_path(cli.root);

    let result = match cli.command {
        Commands::List { marked } => run_list(&root, marked),
        Commands::Mark { action } => run_mark(&root, action),
        Commands::Delete { yes } => run_delete(&root, yes),
        Commands::Translate {
            source,
            target,
            save_interval,
        } => run_translate(&root, source, target, save_interval),
        Commands::Compress {
            media_dir,
            scale,
            crf,
            max_duration,
            jobs,
        } => run_compress(&root, media_dir, scale, crf, max_duration, jobs),
        Commands::Config { action } => run_config(action),
    };

    if let Err(e) = result {
        eprintln!(
            "{} {e}",
            "\u{2718}".if_supports_color(Stdout, |t| t.bright_red()),
        );
        std::process::exit(1);
    }
}

type CliResult = Result<(), Box<dyn std::error::Error>>;

fn load_library_and_marks(root: &PathBuf) -> Result<(Library, MarkSet), Box<dyn std::error::Error>>
{
    let library = Library::load(root)?;
    let mut marks = MarkSet::load(&library.marks_path())?;
    // Marks pointing at vanished records don't survive a load
    if marks.retain_known(&library) > 0 {
        marks.save(&library.marks_path(), &library)?;
    }
    Ok((library, marks))
}

fn run_list(root: &PathBuf, marked_only: bool) -> CliResult {
    let (library, marks) = load_library_and_marks(root)?;

    let mut shown = 0;
    for (system, records) in library.by_system() {
        let visible: Vec<_> = records
            .iter()
            .filter(|r| !marked_only || marks.contains(&r.id))
            .collect();
        if visible.is_empty() {
            continue;
        }

        println!("{}", system.if_supports_color(Stdout, |t| t.bold()));
        for record in visible {
            let flag = if marks.contains(&record.id) {
                "\u{2611}"
            } else {
                " "
            };
            println!(
                "  {flag} [{}] {}{}",
                record.id.if_supports_color(Stdout, |t| t.cyan()),
                record.name,
                record_details(record).if_supports_color(Stdout, |t| t.dimmed()),
            );
            shown += 1;
        }
        println!();
    }

    if shown == 0 {
        println!(
            "{}",
            "Nothing to show".if_supports_color(Stdout, |t| t.dimmed()),
        );
    } else {
        println!("{shown} entr(ies), {} marked", marks.len());
    }
    Ok(())
}

/// Secondary label: year, genre, players, rating — whatever the record has.
fn record_details(record: &romshelf_lib::GameRecord) -> String {
    let mut parts = Vec::new();
    if let Some(year) = record.release_year() {
        parts.push(year.to_string());
    }
    if let Some(genre) = &record.genre {
        parts.push(genre.clone());
    }
    if let Some(players) = &record.players {
        parts.push(format!("{players}P"));
    }
    if let Some(rating) = &record.rating {
        parts.push(format!("\u{2605}{rating}"));
    }
    if parts.is_empty() {
        String::new()
    } else {
        format!(" ({})", parts.join(", "))
    }
}

fn run_mark(root: &PathBuf, action: MarkAction) -> CliResult {
    let (library, mut marks) = load_library_and_marks(root)?;

    match action {
        MarkAction::Add { ids } => {
            for id in ids {
                if library.by_id(&id).is_none() {
                    eprintln!(
                        "{} no entry with id {id}",
                        "\u{26A0}".if_supports_color(Stdout, |t| t.yellow()),
                    );
                    continue;
                }
                marks.mark(id);
            }
        }
        MarkAction::Remove { ids } => {
            for id in ids {
                if !marks.unmark(&id) {
                    eprintln!(
                        "{} {id} was not marked",
                        "\u{26A0}".if_supports_color(Stdout, |t| t.yellow()),
                    );
                }
            }
        }
        MarkAction::Clear => marks.clear(),
        MarkAction::Show => {
            if marks.is_empty() {
                println!(
                    "{}",
                    "No entries marked".if_supports_color(Stdout, |t| t.dimmed()),
                );
            }
            for id in marks.iter() {
                let name = library.by_id(id).map(|r| r.name.as_str()).unwrap_or("?");
                println!("  \u{2611} [{}] {name}", id.if_supports_color(Stdout, |t| t.cyan()));
            }
            return Ok(());
        }
    }

    marks.save(&library.marks_path(), &library)?;
    println!("{} entr(ies) marked", marks.len());
    Ok(())
}

fn run_delete(root: &PathBuf, yes: bool) -> CliResult {
    let (mut library, mut marks) = load_library_and_marks(root)?;

    if marks.is_empty() {
        println!(
            "{}",
            "No entries marked for deletion".if_supports_color(Stdout, |t| t.dimmed()),
        );
        return Ok(());
    }

    println!("About to delete {} entr(ies) and their files:", marks.len());
    for id in marks.iter() {
        let name = library.by_id(id).map(|r| r.name.as_str()).unwrap_or("?");
        println!("  [{}] {name}", id.if_supports_color(Stdout, |t| t.cyan()));
    }

    if !yes && !confirm("Proceed? [y/N] ")? {
        println!("Aborted.");
        return Ok(());
    }

    let summary = library.delete_marked(&marks)?;
    marks.clear();
    marks.save(&library.marks_path(), &library)?;

    println!(
        "{} deleted {} entr(ies), removed {} file(s)",
        "\u{2714}".if_supports_color(Stdout, |t| t.green()),
        summary.deleted,
        summary.files_removed,
    );
    for error in &summary.errors {
        eprintln!(
            "  {} {error}",
            "\u{26A0}".if_supports_color(Stdout, |t| t.yellow()),
        );
    }
    Ok(())
}

fn confirm(prompt: &str) -> Result<bool, std::io::Error> {
    print!("{prompt}");
    std::io::stdout().flush()?;
    let mut answer = String::new();
    std::io::stdin().read_line(&mut answer)?;
    Ok(matches!(answer.trim(), "y" | "Y" | "yes"))
}

fn run_translate(
    root: &PathBuf,
    source: Option<String>,
    target: Option<String>,
    save_interval: Option<usize>,
) -> CliResult {
    let (mut library, _marks) = load_library_and_marks(root)?;

    let mut options = romshelf_lib::settings::load_translate_options();
    if let Some(s) = source {
        options.source_lang = s;
    }
    if let Some(t) = target {
        options.target_lang = t;
    }
    if let Some(n) = save_interval {
        options.save_interval = n.max(1);
    }

    let translator = GoogleTranslator::new()?;

    let bar = ProgressBar::hidden();
    bar.set_style(
        ProgressStyle::with_template("  {bar:30.cyan} {pos}/{len} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar()),
    );

    let summary = translate::run_translation(&mut library, &translator, &options, &|event| {
        match event {
            TranslateProgress::Started { total, batches } => {
                println!("Translating {total} description(s) in {batches} batch(es)");
                bar.set_length(total as u64);
                bar.set_draw_target(indicatif::ProgressDrawTarget::stderr());
            }
            TranslateProgress::BatchDone {
                processed,
                speed,
                eta,
                ..
            } => {
                bar.set_position(processed as u64);
                bar.set_message(format!("{speed:.2}/s ETA {}", format_eta(eta)));
            }
            TranslateProgress::FallingBack { batch_index } => {
                bar.println(format!(
                    "  batch {} failed, translating records one at a time",
                    batch_index + 1
                ));
            }
            TranslateProgress::Saved { .. } => {}
            TranslateProgress::Done => bar.finish_and_clear(),
        }
    })?;

    if summary.total == 0 {
        println!(
            "{}",
            "All descriptions are already translated or empty"
                .if_supports_color(Stdout, |t| t.dimmed()),
        );
        return Ok(());
    }

    println!(
        "{} translated {} of {} description(s)",
        "\u{2714}".if_supports_color(Stdout, |t| t.green()),
        summary.translated,
        summary.total,
    );
    for error in &summary.errors {
        eprintln!(
            "  {} {error}",
            "\u{26A0}".if_supports_color(Stdout, |t| t.yellow()),
        );
    }
    Ok(())
}

fn run_compress(
    root: &PathBuf,
    media_dir: Option<PathBuf>,
    scale: Option<f64>,
    crf: Option<u32>,
    max_duration: Option<f64>,
    jobs: Option<usize>,
) -> CliResult {
    let mut options: CompressOptions = romshelf_lib::settings::load_compress_options();
    if let Some(v) = scale {
        options.scale = v.clamp(0.1, 1.0);
    }
    if let Some(v) = crf {
        options.crf = v.min(51);
    }
    if let Some(v) = max_duration {
        options.max_duration = v;
    }
    if let Some(v) = jobs {
        options.workers = v.max(1);
    }
    let media_dir = media_dir.unwrap_or_else(|| root.join("media"));

    let bar = ProgressBar::hidden();
    bar.set_style(
        ProgressStyle::with_template("  {bar:30.cyan} {pos}/{len} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar()),
    );

    let runtime = tokio::runtime::Runtime::new()?;
    let summary = runtime.block_on(romshelf_lib::compress::run_compression(
        &media_dir,
        options,
        FfProber,
        FfmpegEncoder,
        &|event| match event {
            CompressProgress::Started { total } => {
                println!("Compressing {total} video(s) under {}", media_dir.display());
                bar.set_length(total as u64);
                bar.set_draw_target(indicatif::ProgressDrawTarget::stderr());
            }
            CompressProgress::JobDone {
                file_name,
                completed,
                ..
            } => {
                bar.set_position(completed as u64);
                bar.set_message(file_name);
            }
            CompressProgress::JobFailed {
                file_name,
                error,
                completed,
                ..
            } => {
                bar.set_position(completed as u64);
                bar.println(format!(
                    "  {} {file_name}: {error}",
                    "\u{2718}".if_supports_color(Stdout, |t| t.bright_red()),
                ));
            }
            CompressProgress::Done => bar.finish_and_clear(),
        },
    ))?;

    if summary.total == 0 {
        println!(
            "{}",
            "No video files found".if_supports_color(Stdout, |t| t.dimmed()),
        );
        return Ok(());
    }

    println!(
        "{} compressed {}/{} video(s), {} failed",
        "\u{2714}".if_supports_color(Stdout, |t| t.green()),
        summary.completed,
        summary.total,
        summary.failed,
    );
    Ok(())
}

fn run_config(action: ConfigAction) -> CliResult {
    match action {
        ConfigAction::Show => match romshelf_lib::settings::load_settings_string() {
            Some(contents) => println!("{contents}"),
            None => println!(
                "{}",
                "No settings saved yet".if_supports_color(Stdout, |t| t.dimmed()),
            ),
        },
        ConfigAction::SetRoot { path } => {
            romshelf_lib::settings::save_library_path(Some(&path))?;
            println!(
                "{} library root saved: {}",
                "\u{2714}".if_supports_color(Stdout, |t| t.green()),
                path.display(),
            );
        }
        ConfigAction::ClearRoot => {
            romshelf_lib::settings::save_library_path(None)?;
            println!("Saved library root cleared");
        }
        ConfigAction::Path => {
            println!("{}", romshelf_lib::settings::settings_path().display());
        }
    }
    Ok(())
}
