use std::path::{Path, PathBuf};
use std::process;

use clap::Parser;
use simplelog::{ColorChoice, Config, LevelFilter, TermLogger, TerminalMode};

use gemini_unblend::{
    default_output_path, DirectorySink, DirectorySource, GeometryConfig, ProcessOptions,
    ProcessResult, ResultSink, SizeClass, WatermarkEngine, ZipSink,
};

#[derive(Parser)]
#[command(
    name = "gemini-unblend",
    about = "Remove the visible Gemini overlay via reverse alpha blending",
    version,
    after_help = "Simple usage: gemini-unblend <image>  (writes clean_<name>.png next to it)\n\n\
                  Calibration captures bg_48.png and bg_96.png are read from --calibration.\n\
                  Without them, images pass through unchanged."
)]
#[allow(clippy::struct_excessive_bools)]
struct Cli {
    /// Input image file or directory
    input: PathBuf,

    /// Output file, or output directory for batch processing
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Pack batch results into this zip archive instead of a directory
    #[arg(short, long, conflicts_with = "output")]
    archive: Option<PathBuf>,

    /// Directory holding the bg_48.png and bg_96.png calibration captures
    #[arg(short, long, default_value = "assets")]
    calibration: PathBuf,

    /// JSON file overriding the overlay layout table
    #[arg(long)]
    layout: Option<PathBuf>,

    /// Force 48x48 overlay size (for images <= 1024px)
    #[arg(long, conflicts_with = "force_large")]
    force_small: bool,

    /// Force 96x96 overlay size (for images > 1024px)
    #[arg(long)]
    force_large: bool,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Suppress all non-error output
    #[arg(short, long)]
    quiet: bool,
}

fn main() {
    let cli = Cli::parse();

    let level = if cli.quiet {
        LevelFilter::Error
    } else if cli.verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };
    if let Err(e) = TermLogger::init(
        level,
        Config::default(),
        TerminalMode::Stderr,
        ColorChoice::Auto,
    ) {
        eprintln!("Warning: failed to initialize logging: {e}");
    }

    let force_size = if cli.force_small {
        Some(SizeClass::Small)
    } else if cli.force_large {
        Some(SizeClass::Large)
    } else {
        None
    };

    let opts = ProcessOptions {
        force_size,
        verbose: cli.verbose,
        quiet: cli.quiet,
    };

    let geometry = match &cli.layout {
        Some(path) => match GeometryConfig::from_json_file(path) {
            Ok(g) => g,
            Err(e) => {
                eprintln!("Fatal: Failed to load layout {}: {e}", path.display());
                process::exit(1);
            }
        },
        None => GeometryConfig::default(),
    };

    let engine =
        WatermarkEngine::from_source(&DirectorySource::new(&cli.calibration)).with_geometry(geometry);
    if !engine.has_assets() && !opts.quiet {
        eprintln!(
            "WARNING: calibration captures missing in {}; affected images will pass through unchanged",
            cli.calibration.display()
        );
        eprintln!();
    }

    let input_path = cli.input.as_path();
    if !input_path.exists() {
        eprintln!("Error: Input path does not exist: {}", input_path.display());
        process::exit(1);
    }
    if let Err(message) = check_args(&cli, input_path.is_dir()) {
        eprintln!("Error: {message}");
        process::exit(1);
    }

    let results = if input_path.is_dir() {
        let mut sink = open_sink(&cli);
        engine.process_directory(input_path, sink.as_mut(), &opts)
    } else {
        let output_path = cli
            .output
            .clone()
            .unwrap_or_else(|| default_output_path(input_path));
        vec![engine.process_file(input_path, &output_path, &opts)]
    };

    let mut success_count = 0u32;
    let mut skip_count = 0u32;
    let mut fail_count = 0u32;

    for r in &results {
        print_result(r, &opts);
        if r.skipped {
            skip_count += 1;
        } else if r.success {
            success_count += 1;
        } else {
            fail_count += 1;
        }
    }

    if results.len() > 1 && !opts.quiet {
        eprintln!();
        eprint!("[Summary] Processed: {success_count}");
        if skip_count > 0 {
            eprint!(", Skipped: {skip_count}");
        }
        if fail_count > 0 {
            eprint!(", Failed: {fail_count}");
        }
        eprintln!(" (Total: {})", results.len());
    }

    if fail_count > 0 {
        process::exit(1);
    }
}

/// Reject flag combinations that only make sense for one input kind.
fn check_args(cli: &Cli, input_is_dir: bool) -> Result<(), String> {
    if !input_is_dir {
        if let Some(archive) = &cli.archive {
            return Err(format!(
                "--archive {} requires a directory input; use -o for a single image",
                archive.display()
            ));
        }
    }
    Ok(())
}

fn open_sink(cli: &Cli) -> Box<dyn ResultSink> {
    if let Some(archive) = &cli.archive {
        return match ZipSink::create(archive) {
            Ok(sink) => Box::new(sink),
            Err(e) => fail_sink(archive, &e),
        };
    }
    let Some(output_dir) = &cli.output else {
        eprintln!("Error: Output directory or archive is required for batch processing");
        eprintln!("Usage: gemini-unblend <input_dir> -o <output_dir>");
        eprintln!("       gemini-unblend <input_dir> -a <archive.zip>");
        process::exit(1);
    };
    match DirectorySink::new(output_dir) {
        Ok(sink) => Box::new(sink),
        Err(e) => fail_sink(output_dir, &e),
    }
}

fn fail_sink(path: &Path, e: &gemini_unblend::Error) -> ! {
    eprintln!("Error: Cannot write to {}: {e}", path.display());
    process::exit(1);
}

fn print_result(result: &ProcessResult, opts: &ProcessOptions) {
    if opts.quiet && result.success {
        return;
    }

    let filename = result.path.file_name().map_or_else(
        || result.path.display().to_string(),
        |f| f.to_string_lossy().to_string(),
    );

    for line in result_lines(&filename, result, opts) {
        eprintln!("{line}");
    }
}

/// Status lines for one result. `[SKIP]` and `[FAIL]` carry their message
/// inline; verbose mode adds the detail line to `[OK]` only.
fn result_lines(filename: &str, result: &ProcessResult, opts: &ProcessOptions) -> Vec<String> {
    let mut lines = Vec::new();
    if result.skipped {
        if !opts.quiet {
            lines.push(format!("[SKIP] {filename}: {}", result.message));
        }
    } else if result.success {
        if !opts.quiet {
            match result.size_class {
                Some(class) => lines.push(format!("[OK] {filename} ({class:?} overlay)")),
                None => lines.push(format!("[OK] {filename}")),
            }
            if opts.verbose && !result.message.is_empty() {
                lines.push(format!("  -> {}", result.message));
            }
        }
    } else {
        lines.push(format!("[FAIL] {filename}: {}", result.message));
    }
    lines
}
