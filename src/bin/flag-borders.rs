use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::process;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use flag_border_detection::evaluation::{self, Evaluation};
use flag_border_detection::{default_output_path, BorderDetector, DetectionParams, ProcessResult};

#[derive(Parser)]
#[command(
    name = "flag-borders",
    about = "Detect frame-like borders in generated flag images",
    version,
    after_help = "Simple usage: flag-borders <image>  (prints the verdict)\n\n\
                  Use -o to write an annotated copy with the detected lines highlighted."
)]
#[allow(clippy::struct_excessive_bools)]
struct Cli {
    /// Input image file or directory
    input: PathBuf,

    /// Annotated output file or directory (default with --annotate: {name}_borders.{ext})
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Write annotated images next to the inputs
    #[arg(short, long)]
    annotate: bool,

    /// JSON file with detection parameters (missing fields use defaults)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Minimum length of a kept line component
    #[arg(long)]
    min_line_length: Option<u32>,

    /// Opening iterations
    #[arg(long)]
    iterations: Option<u32>,

    /// Length of the oriented structuring element
    #[arg(long)]
    kernel_len: Option<u32>,

    /// Fraction of each dimension counted as border strip
    #[arg(long)]
    edge_perc: Option<f64>,

    /// JSON file of `{"<file name>": <has_border>}` labels to score against
    #[arg(long)]
    labels: Option<PathBuf>,

    /// Print results as JSON on stdout
    #[arg(long)]
    json: bool,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Suppress all non-error output
    #[arg(short, long)]
    quiet: bool,
}

impl Cli {
    fn params(&self) -> flag_border_detection::Result<DetectionParams> {
        let mut params = match &self.config {
            Some(path) => DetectionParams::from_json(&std::fs::read_to_string(path)?)?,
            None => DetectionParams::default(),
        };
        if let Some(v) = self.min_line_length {
            params.min_line_length = v;
        }
        if let Some(v) = self.iterations {
            params.iterations = v;
        }
        if let Some(v) = self.kernel_len {
            params.kernel_len = v;
        }
        if let Some(v) = self.edge_perc {
            params.edge_perc = v;
        }
        Ok(params)
    }
}

fn init_tracing(cli: &Cli) {
    let default = if cli.quiet {
        "error"
    } else if cli.verbose {
        "debug"
    } else {
        "warn"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default)),
        )
        .with_writer(std::io::stderr)
        .init();
}

fn main() {
    let cli = Cli::parse();
    init_tracing(&cli);

    let params = match cli.params() {
        Ok(p) => p,
        Err(e) => {
            eprintln!("Error: {e}");
            process::exit(1);
        }
    };
    let detector = match BorderDetector::new(params) {
        Ok(d) => d,
        Err(e) => {
            eprintln!("Error: {e}");
            process::exit(1);
        }
    };

    if !cli.input.exists() {
        eprintln!("Error: Input path does not exist: {}", cli.input.display());
        process::exit(1);
    }

    let results = if cli.input.is_dir() {
        let output_dir = cli
            .output
            .clone()
            .or_else(|| cli.annotate.then(|| cli.input.join("borders")));
        detector.process_directory(&cli.input, output_dir.as_deref())
    } else {
        let output = cli
            .output
            .clone()
            .or_else(|| cli.annotate.then(|| default_output_path(&cli.input)));
        vec![detector.process_file(&cli.input, output.as_deref())]
    };

    let evaluation = match &cli.labels {
        Some(path) => match evaluation::load_labels(path) {
            Ok(labels) => Some(evaluation::evaluate(&labels, &predictions(&results))),
            Err(e) => {
                eprintln!("Error: Failed to load labels: {e}");
                process::exit(1);
            }
        },
        None => None,
    };

    let fail_count = results.iter().filter(|r| !r.success).count();

    if cli.json {
        let report = serde_json::json!({
            "results": results,
            "evaluation": evaluation,
        });
        match serde_json::to_string_pretty(&report) {
            Ok(text) => println!("{text}"),
            Err(e) => {
                eprintln!("Error: Failed to serialize results: {e}");
                process::exit(1);
            }
        }
    } else {
        for r in &results {
            print_result(r, &cli);
        }
        print_summary(&results, &cli);
        if let Some(eval) = &evaluation {
            print_evaluation(eval);
        }
    }

    if fail_count > 0 {
        process::exit(1);
    }
}

fn file_name(path: &Path) -> String {
    path.file_name().map_or_else(
        || path.display().to_string(),
        |f| f.to_string_lossy().to_string(),
    )
}

/// Successful classifications keyed by file name. Skipped images count as border-free.
fn predictions(results: &[ProcessResult]) -> BTreeMap<String, bool> {
    results
        .iter()
        .filter(|r| r.success)
        .map(|r| (file_name(&r.path), r.has_border))
        .collect()
}

fn print_result(result: &ProcessResult, cli: &Cli) {
    if cli.quiet && result.success {
        return;
    }

    let filename = file_name(&result.path);

    if result.skipped {
        eprintln!("[SKIP] {filename}: {}", result.message);
    } else if result.success {
        let tag = if result.has_border { "BORDER" } else { "CLEAN" };
        match result.line_sums {
            Some(sums) if cli.verbose => eprintln!(
                "[{tag}] {filename} (H={}, V={})",
                sums.horizontal, sums.vertical
            ),
            _ => eprintln!("[{tag}] {filename}"),
        }
    } else {
        eprintln!("[FAIL] {filename}: {}", result.message);
    }
}

fn print_summary(results: &[ProcessResult], cli: &Cli) {
    if results.len() <= 1 || cli.quiet {
        return;
    }

    let bordered = results.iter().filter(|r| r.success && r.has_border).count();
    let skipped = results.iter().filter(|r| r.skipped).count();
    let failed = results.iter().filter(|r| !r.success).count();

    eprintln!();
    eprint!("[Summary] Bordered: {bordered}");
    if skipped > 0 {
        eprint!(", Skipped: {skipped}");
    }
    if failed > 0 {
        eprint!(", Failed: {failed}");
    }
    eprintln!(" (Total: {})", results.len());
}

fn print_evaluation(eval: &Evaluation) {
    eprintln!(
        "[Accuracy] {}/{} correct ({:.1}%)",
        eval.correct,
        eval.total,
        eval.accuracy * 100.0
    );
    for m in &eval.mismatches {
        eprintln!(
            "  mismatch {}: labeled {}, predicted {}",
            m.name, m.expected, m.predicted
        );
    }
    if !eval.missing.is_empty() {
        eprintln!("  {} labeled image(s) not processed", eval.missing.len());
    }
}
