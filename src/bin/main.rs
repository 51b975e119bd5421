use clap::{Arg, ArgAction, Command};
use log::{debug, error, info, warn, LevelFilter};
use slidepress::config::{self, ConfigSource};
use slidepress::markdown::parse_presentation;
use slidepress::markup::Presentation;
use slidepress::styling::Theme;
use slidepress::{load_theme_file, resolve_theme, validation, write_notes, write_presentation, SlideError};
use std::fs;
use std::path::{Path, PathBuf};
use std::process;

const RC_FILE: &str = "slidepress.toml";
const SAMPLE_DECK_NAME: &str = "slides.md";

const SAMPLE_DECK: &str = r#"---
title: My Presentation
author: Your Name
---

---slide
# Welcome

A deck is plain markdown. Every slide starts with a `---slide` line.

- Write **bold** and *italic* text
- Use `inline code`
- [x] Check off finished items
- [ ] And leave open ones

---notes
Speaker notes go after a `---notes` line and are written with `--notes`.

---slide
# Code

```rust
fn main() {
    println!("Hello, slides!");
}
```

---slide
# Tables

| Tier   | Output |
|--------|--------|
| Local  | SVG    |
| Remote | PNG    |

---slide
# Diagrams

```mermaid
graph LR
    Markdown --> Slides --> PDF
```
"#;

#[derive(Debug)]
enum AppError {
    FileReadError(PathBuf, std::io::Error),
    ConversionError(SlideError),
    PathError(String),
    InitError(String),
    ValidationFailed(usize),
}

/// Verbosity level for output
#[derive(Debug, Clone, Copy, PartialEq)]
enum Verbosity {
    Quiet,   // No output except errors
    Normal,  // Standard output
    Verbose, // Detailed output
}

impl Verbosity {
    fn from_matches(matches: &clap::ArgMatches) -> Self {
        if matches.get_flag("quiet") {
            Verbosity::Quiet
        } else if matches.get_flag("verbose") {
            Verbosity::Verbose
        } else {
            Verbosity::Normal
        }
    }

    fn log_level(self) -> LevelFilter {
        match self {
            Verbosity::Quiet => LevelFilter::Error,
            Verbosity::Normal => LevelFilter::Warn,
            Verbosity::Verbose => LevelFilter::Debug,
        }
    }
}

fn get_markdown_input(path: &Path) -> Result<String, AppError> {
    fs::read_to_string(path).map_err(|e| AppError::FileReadError(path.to_path_buf(), e))
}

/// Theme file shared by every deck of the current user.
fn user_theme_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("slidepress").join("theme.toml"))
}

/// Get the configuration source when neither `--config` nor the deck names a theme.
///
/// Priority order:
/// 1. `slidepress.toml` in the current directory
/// 2. `slidepress/theme.toml` in the user configuration directory
/// 3. The built-in theme
fn get_config_source() -> ConfigSource<'static> {
    if Path::new(RC_FILE).exists() {
        return ConfigSource::File(RC_FILE);
    }
    if let Some(path) = user_theme_path().filter(|p| p.exists()) {
        return ConfigSource::File(Box::leak(
            path.to_string_lossy().into_owned().into_boxed_str(),
        ));
    }
    ConfigSource::Default
}

/// An explicit `--config` must exist. A `theme:` in the front matter comes
/// next, then the auto-detected files.
fn load_theme(matches: &clap::ArgMatches, presentation: &Presentation, deck_path: &Path) -> Result<Theme, AppError> {
    if let Some(config_file) = matches.get_one::<String>("config") {
        debug!("Using theme from --config {}", config_file);
        return load_theme_file(Path::new(config_file)).map_err(AppError::ConversionError);
    }
    if presentation.metadata.theme.is_some() {
        debug!("Using theme named in the front matter");
        return Ok(resolve_theme(presentation, ConfigSource::Default, deck_path.parent()));
    }
    let source = get_config_source();
    debug!("Using theme source {:?}", source);
    Ok(config::load_config_from_source(source))
}

fn get_output_path(matches: &clap::ArgMatches, input: &Path) -> Result<PathBuf, AppError> {
    let current_dir = std::env::current_dir().map_err(|e| AppError::PathError(e.to_string()))?;

    if let Some(output) = matches.get_one::<String>("output") {
        return Ok(current_dir.join(output));
    }
    let stem = input
        .file_stem()
        .and_then(|s| s.to_str())
        .ok_or_else(|| AppError::PathError(format!("Cannot derive an output name from {}", input.display())))?;
    Ok(current_dir.join(format!("{}.pdf", stem)))
}

/// `deck.pdf` becomes `deck_notes.pdf` in the same directory.
fn get_notes_path(output: &Path) -> PathBuf {
    let stem = output.file_stem().and_then(|s| s.to_str()).unwrap_or("presentation");
    output.with_file_name(format!("{}_notes.pdf", stem))
}

/// Detects whether the markdown contains a mermaid fenced code block (```mermaid)
fn has_mermaid_block(markdown: &str) -> bool {
    for line in markdown.lines() {
        let s = line.trim_start();
        if s.starts_with("```") {
            let rest = s.trim_start_matches('`').trim_start();
            if rest.to_lowercase().starts_with("mermaid") {
                return true;
            }
        }
    }
    false
}

/// Writes a sample deck and theme into `dir`. Existing files are left alone.
fn init_project(dir: &Path) -> Result<Vec<PathBuf>, AppError> {
    fs::create_dir_all(dir).map_err(|e| AppError::InitError(format!("{}: {}", dir.display(), e)))?;

    let files = [
        (dir.join(SAMPLE_DECK_NAME), SAMPLE_DECK.to_string()),
        (dir.join(RC_FILE), config::default_config_toml()),
    ];
    if let Some((existing, _)) = files.iter().find(|(path, _)| path.exists()) {
        return Err(AppError::InitError(format!(
            "{} already exists, refusing to overwrite it",
            existing.display()
        )));
    }
    for (path, content) in &files {
        fs::write(path, content).map_err(|e| AppError::InitError(format!("{}: {}", path.display(), e)))?;
    }
    Ok(files.into_iter().map(|(path, _)| path).collect())
}

fn file_size(path: &Path) -> Option<String> {
    let size_kb = fs::metadata(path).ok()?.len() as f64 / 1024.0;
    Some(if size_kb < 1024.0 {
        format!("{:.1} KB", size_kb)
    } else {
        format!("{:.2} MB", size_kb / 1024.0)
    })
}

fn run(matches: clap::ArgMatches) -> Result<(), AppError> {
    let verbosity = Verbosity::from_matches(&matches);
    let dry_run = matches.get_flag("dry-run");

    let input = matches
        .get_one::<String>("path")
        .map(PathBuf::from)
        .ok_or_else(|| AppError::PathError("No input file given".to_string()))?;
    let markdown = get_markdown_input(&input)?;
    let presentation = parse_presentation(&markdown).map_err(AppError::ConversionError)?;
    let theme = load_theme(&matches, &presentation, &input)?;
    let output_path = get_output_path(&matches, &input)?;
    info!(
        "Parsed {} slide(s) from {}",
        presentation.slides.len(),
        input.display()
    );

    let warnings = validation::validate_presentation(&presentation, &theme);
    if warnings.is_empty() {
        if verbosity == Verbosity::Verbose {
            info!("✓ Pre-flight validation passed");
        }
    } else {
        for warning in &warnings {
            warn!("{}", warning);
        }
    }

    if dry_run {
        if verbosity == Verbosity::Quiet {
            return if warnings.is_empty() {
                Ok(())
            } else {
                Err(AppError::ValidationFailed(warnings.len()))
            };
        }
        println!("✓ Dry-run validation complete. No PDF generated.");
        if warnings.is_empty() {
            println!("✓ No issues detected. Run without --dry-run to generate the PDF.");
        } else {
            println!(
                "⚠️  {} warning(s) found. Review them and run without --dry-run to generate the PDF anyway.",
                warnings.len()
            );
        }
        return Ok(());
    }

    if verbosity != Verbosity::Quiet && has_mermaid_block(&markdown) {
        println!(
            "⚠️  Mermaid blocks detected: each diagram runs '{}' and may take a few seconds.",
            theme.diagram.tool
        );
    }

    let pages = write_presentation(&presentation, &theme, &output_path).map_err(AppError::ConversionError)?;
    if verbosity != Verbosity::Quiet {
        println!("✅ Saved {} page(s) to {}", pages, output_path.display());
        if verbosity == Verbosity::Verbose {
            if let Some(size) = file_size(&output_path) {
                println!("   Size: {}", size);
            }
        }
    }

    if matches.get_flag("notes") {
        let notes_path = get_notes_path(&output_path);
        if write_notes(&presentation, &theme, &notes_path).map_err(AppError::ConversionError)? {
            if verbosity != Verbosity::Quiet {
                println!("✅ Saved speaker notes to {}", notes_path.display());
            }
        } else {
            warn!("No slide has speaker notes, skipping {}", notes_path.display());
        }
    }

    Ok(())
}

fn cli() -> Command {
    Command::new("slidepress")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Turn markdown slide decks into PDF presentations")
        .after_help(
            "EXAMPLES:\n  \
            slidepress -p talk.md\n  \
            slidepress -p talk.md -o build/talk.pdf --notes\n  \
            slidepress -p talk.md -c dark.toml --verbose --dry-run\n  \
            slidepress --init my-talk\n",
        )
        .arg(
            Arg::new("path")
                .short('p')
                .long("path")
                .value_name("FILE_PATH")
                .help("Path to the markdown deck"),
        )
        .arg(
            Arg::new("output")
                .short('o')
                .long("output")
                .value_name("OUTPUT_PATH")
                .help("Path to the output PDF file (defaults to <deck name>.pdf)"),
        )
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("CONFIG_FILE")
                .help("Path to a theme file (TOML format). Auto-detects slidepress.toml if not specified"),
        )
        .arg(
            Arg::new("notes")
                .long("notes")
                .help("Also write the speaker notes to <output name>_notes.pdf")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .help("Show detailed output including layout decisions and file size")
                .action(ArgAction::SetTrue)
                .conflicts_with("quiet"),
        )
        .arg(
            Arg::new("quiet")
                .short('q')
                .long("quiet")
                .help("Suppress all output except errors")
                .action(ArgAction::SetTrue)
                .conflicts_with("verbose"),
        )
        .arg(
            Arg::new("dry-run")
                .long("dry-run")
                .help("Validate the deck without generating a PDF")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("get-default-configuration")
                .long("get-default-configuration")
                .help("Print a default slidepress.toml to stdout and exit")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("init")
                .long("init")
                .value_name("DIR")
                .help("Write a sample deck and theme into DIR and exit")
                .conflicts_with("path"),
        )
}

fn main() {
    let mut cmd = cli();
    let matches = cmd.clone().get_matches();

    // RUST_LOG still overrides the level picked from the flags
    env_logger::Builder::new()
        .filter_level(Verbosity::from_matches(&matches).log_level())
        .parse_default_env()
        .format_timestamp_millis()
        .init();

    if matches.get_flag("get-default-configuration") {
        println!("{}", config::default_config_toml());
        process::exit(0);
    }

    if let Some(dir) = matches.get_one::<String>("init") {
        match init_project(Path::new(dir)) {
            Ok(files) => {
                for file in files {
                    println!("✅ Created {}", file.display());
                }
                process::exit(0);
            }
            Err(AppError::InitError(e)) => {
                error!("[X] Init error: {}", e);
                process::exit(1);
            }
            Err(e) => {
                error!("[X] Init error: {:?}", e);
                process::exit(1);
            }
        }
    }

    if !matches.contains_id("path") {
        let _ = cmd.print_help();
        println!();
        process::exit(1);
    }

    if let Err(e) = run(matches) {
        match e {
            AppError::FileReadError(path, e) => error!("[X] Error reading {}: {}", path.display(), e),
            AppError::ConversionError(e) => error!("[X] Conversion error: {}", e),
            AppError::PathError(e) => error!("[X] Path error: {}", e),
            AppError::InitError(e) => error!("[X] Init error: {}", e),
            AppError::ValidationFailed(n) => error!("[X] Validation failed with {} warning(s)", n),
        }
        process::exit(1);
    }
}

#[cfg(test)]
mod cli_tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn detects_mermaid_block() {
        let md = "Some text\n```mermaid\ngraph LR\nA-->B\n```";
        assert!(has_mermaid_block(md));
    }

    #[test]
    fn no_mermaid_block() {
        let md = "# Title\n```rust\nfn main() {}\n```";
        assert!(!has_mermaid_block(md));
    }

    #[test]
    fn output_path_defaults_to_deck_name() {
        let matches = cli().get_matches_from(vec!["slidepress", "-p", "talks/intro.md"]);
        let path = get_output_path(&matches, Path::new("talks/intro.md")).unwrap();
        assert!(path.ends_with("intro.pdf"));

        let matches = cli().get_matches_from(vec!["slidepress", "-p", "intro.md", "-o", "out/my.pdf"]);
        let path = get_output_path(&matches, Path::new("intro.md")).unwrap();
        assert!(path.ends_with("out/my.pdf"));
    }

    #[test]
    fn notes_path_sits_next_to_output() {
        assert_eq!(
            get_notes_path(Path::new("/tmp/build/deck.pdf")),
            PathBuf::from("/tmp/build/deck_notes.pdf")
        );
    }

    #[test]
    fn user_theme_lives_under_slidepress() {
        if let Some(path) = user_theme_path() {
            assert!(path.ends_with("slidepress/theme.toml"));
        }
    }

    #[test]
    fn verbosity_maps_to_log_levels() {
        let matches = cli().get_matches_from(vec!["slidepress", "-q"]);
        assert_eq!(Verbosity::from_matches(&matches).log_level(), LevelFilter::Error);
        let matches = cli().get_matches_from(vec!["slidepress", "-v"]);
        assert_eq!(Verbosity::from_matches(&matches).log_level(), LevelFilter::Debug);
        assert!(cli().try_get_matches_from(vec!["slidepress", "-q", "-v"]).is_err());
    }

    #[test]
    fn dry_run_writes_nothing() {
        let dir = tempdir().unwrap();
        let deck = dir.path().join("deck.md");
        fs::write(&deck, "---slide\n# Small\n").unwrap();
        let out = dir.path().join("deck.pdf");

        let matches = cli().get_matches_from(vec![
            "slidepress",
            "-p",
            deck.to_str().unwrap(),
            "-o",
            out.to_str().unwrap(),
            "--dry-run",
        ]);
        assert!(run(matches).is_ok());
        assert!(!out.exists());
    }

    #[test]
    fn missing_explicit_config_is_an_error() {
        let dir = tempdir().unwrap();
        let deck = dir.path().join("deck.md");
        fs::write(&deck, "---slide\n# Small\n").unwrap();

        let matches = cli().get_matches_from(vec![
            "slidepress",
            "-p",
            deck.to_str().unwrap(),
            "-c",
            "/definitely/missing/theme.toml",
            "--dry-run",
        ]);
        assert!(matches!(
            run(matches),
            Err(AppError::ConversionError(SlideError::ConfigError { .. }))
        ));
    }

    #[test]
    fn init_writes_sample_files_once() {
        let dir = tempdir().unwrap();
        let target = dir.path().join("talk");
        let files = init_project(&target).unwrap();
        assert_eq!(files.len(), 2);
        assert!(target.join(SAMPLE_DECK_NAME).exists());
        assert!(target.join(RC_FILE).exists());

        let deck = parse_presentation(SAMPLE_DECK).unwrap();
        assert_eq!(deck.slides.len(), 4);
        assert!(deck.has_notes());

        assert!(matches!(init_project(&target), Err(AppError::InitError(_))));
    }
}
