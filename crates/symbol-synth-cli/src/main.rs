use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::Context;
use clap::{ArgAction, Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Deserialize;
use symbol_synth_core::background::{BackgroundStyle, synthesize_background};
use symbol_synth_core::export::{collect_createml, read_class_names, to_createml_json};
use symbol_synth_core::label_card::{LabelCardStyle, synthesize_labeled_example};
use symbol_synth_core::library::{BackgroundLibrary, SymbolLibrary};
use symbol_synth_core::session::DatasetSession;
use symbol_synth_core::sink::{DirectorySink, Example, ExampleSink, encode_image};
use symbol_synth_core::{OutputFormat, SynthConfig};
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(
    name = "symbol-synth",
    about = "Composite symbols onto backgrounds and write YOLO-style training data",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
    /// Show progress bars (disable with --progress false or --quiet)
    #[arg(
        long,
        default_value_t = true,
        action = ArgAction::Set,
        global = true,
        help_heading = "Logging/UX"
    )]
    progress: bool,
    /// Increase verbosity (-v, -vv)
    #[arg(short, long, action=ArgAction::Count, global=true, help_heading = "Logging/UX")]
    verbose: u8,
    /// Quiet mode (overrides verbose)
    #[arg(
        short,
        long,
        default_value_t = false,
        global = true,
        help_heading = "Logging/UX"
    )]
    quiet: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Generate a dataset (images/ + labels/ + classes.txt)
    Generate(GenerateArgs),
    /// Synthesize random backgrounds (solid color + ellipses)
    Backgrounds(BackgroundArgs),
    /// Convert a labels directory to a CreateML-style JSON file
    ExportCreateml(ExportArgs),
}

#[derive(Parser, Debug, Clone)]
struct GenerateArgs {
    // Input/Output
    /// Directory of background images (png/jpg/jpeg)
    #[arg(help_heading = "Input/Output")]
    backgrounds: PathBuf,
    /// Directory of symbol images; file stems are class names
    #[arg(help_heading = "Input/Output")]
    symbols: PathBuf,
    /// Output directory
    #[arg(short, long, default_value = "out", help_heading = "Input/Output")]
    out_dir: PathBuf,
    /// YAML config file path (keys present in the file override flags)
    #[arg(long, help_heading = "Input/Output")]
    config: Option<PathBuf>,
    /// Image format: jpg | png
    #[arg(long, default_value = "jpg", help_heading = "Input/Output")]
    format: String,
    /// Example name prefix (names are <prefix><n>)
    #[arg(long, default_value = "img", help_heading = "Input/Output")]
    name_prefix: String,
    /// Number of the first example
    #[arg(long, default_value_t = 0, help_heading = "Input/Output")]
    first_index: usize,

    // Sampling
    /// How many times each class appears in the draw pool
    #[arg(long, default_value_t = 1, help_heading = "Sampling")]
    occurrences: usize,
    /// Minimum symbols per image
    #[arg(long, default_value_t = 1, help_heading = "Sampling")]
    min_per_image: usize,
    /// Maximum symbols per image
    #[arg(long, default_value_t = 5, help_heading = "Sampling")]
    max_per_image: usize,
    /// Random positions tried per symbol
    #[arg(long, default_value_t = 20, help_heading = "Sampling")]
    attempts: u32,
    /// Seed for reproducible output (random when omitted)
    #[arg(long, help_heading = "Sampling")]
    seed: Option<u64>,

    // Transforms
    /// Resize symbols relative to the background
    #[arg(long, default_value_t = false, help_heading = "Transforms")]
    resize: bool,
    /// Rotate symbols by a random quarter turn
    #[arg(long, default_value_t = false, help_heading = "Transforms")]
    rotate: bool,
    /// Back symbols with a random solid color
    #[arg(long, default_value_t = false, help_heading = "Transforms")]
    matte: bool,
    /// Resize fractions of the background's shorter side (comma separated)
    #[arg(long, value_delimiter = ',', help_heading = "Transforms")]
    resize_fractions: Option<Vec<f32>>,
    /// Rotation angles in degrees, multiples of 90 (comma separated)
    #[arg(long, value_delimiter = ',', help_heading = "Transforms")]
    rotation_angles: Option<Vec<u32>>,

    // Debug/Run
    /// Draw red outlines around placed boxes (debug)
    #[arg(long, default_value_t = false, help_heading = "Debug/Run")]
    draw_boxes: bool,
    /// Compose images in parallel (requires core feature `parallel`)
    #[arg(long, default_value_t = false, help_heading = "Debug/Run")]
    parallel: bool,
    /// Export generation stats (JSON) to this file
    #[arg(long, help_heading = "Debug/Run")]
    export_stats: Option<PathBuf>,
    /// Print the merged configuration (after CLI/YAML) and exit
    #[arg(long, default_value_t = false, help_heading = "Debug/Run")]
    print_config: bool,
    /// Output format for --print-config: json|yaml
    #[arg(
        long,
        default_value = "json",
        value_parser = ["json", "yaml"],
        help_heading = "Debug/Run"
    )]
    print_config_format: String,
    /// Dry run: plan and compose but do not write files
    #[arg(long, default_value_t = false, help_heading = "Debug/Run")]
    dry_run: bool,
}

#[derive(Parser, Debug, Clone)]
struct BackgroundArgs {
    /// Output directory
    #[arg(short, long, default_value = "backgrounds")]
    out_dir: PathBuf,
    /// Number of backgrounds
    #[arg(long, default_value_t = 10)]
    count: usize,
    #[arg(long, default_value_t = 1280)]
    width: u32,
    #[arg(long, default_value_t = 1280)]
    height: u32,
    /// Ellipses painted per background
    #[arg(long, default_value_t = 500)]
    ellipses: usize,
    /// Smallest ellipse bounding-box side
    #[arg(long, default_value_t = 100)]
    min_axis: u32,
    /// Largest ellipse bounding-box side
    #[arg(long, default_value_t = 250)]
    max_axis: u32,
    /// Median filter radius; 4 gives a 9x9 window (0 disables)
    #[arg(long, default_value_t = 4)]
    median_radius: u32,
    /// Image format: jpg | png
    #[arg(long, default_value = "jpg")]
    format: String,
    /// File name prefix (names are <prefix><n>)
    #[arg(long, default_value = "bg")]
    name_prefix: String,
    /// Seed for reproducible output (random when omitted)
    #[arg(long)]
    seed: Option<u64>,
    /// Paste a white label card carrying symbols from this directory and write
    /// images/ + labels/ + classes.txt
    #[arg(long, help_heading = "Label cards")]
    with_labels: Option<PathBuf>,
    /// Symbols per label card
    #[arg(long, default_value_t = 2, help_heading = "Label cards")]
    symbols_per_card: usize,
}

#[derive(Parser, Debug, Clone)]
struct ExportArgs {
    /// Directory of YOLO label files (*.txt)
    labels: PathBuf,
    /// Directory of the matching images
    images: PathBuf,
    /// Output JSON file
    #[arg(short, long, default_value = "create_ml_annotations.json")]
    output: PathBuf,
    /// classes.txt to turn class indices into names
    #[arg(long)]
    classes: Option<PathBuf>,
    /// Pretty-print JSON
    #[arg(long, default_value_t = false)]
    pretty: bool,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing_with_level(cli.quiet, cli.verbose);
    let show_progress = cli.progress && !cli.quiet;
    match &cli.command {
        Commands::Generate(args) => run_generate(args, show_progress),
        Commands::Backgrounds(args) => run_backgrounds(args, show_progress),
        Commands::ExportCreateml(args) => run_export(args),
    }
}

fn parse_format(s: &str) -> anyhow::Result<OutputFormat> {
    s.parse()
        .map_err(|_| anyhow::anyhow!("unknown image format: {}", s))
}

fn seeded_rng(seed: Option<u64>) -> StdRng {
    let seed = seed.unwrap_or_else(|| rand::thread_rng().r#gen());
    info!(seed, "random seed");
    StdRng::seed_from_u64(seed)
}

fn build_config(args: &GenerateArgs) -> anyhow::Result<SynthConfig> {
    let defaults = SynthConfig::default();
    let cfg = SynthConfig {
        occurrences_per_class: args.occurrences,
        min_per_image: args.min_per_image,
        max_per_image: args.max_per_image,
        attempts_per_symbol: args.attempts,
        apply_relative_resize: args.resize,
        apply_random_rotation: args.rotate,
        apply_random_matte: args.matte,
        resize_fractions: args
            .resize_fractions
            .clone()
            .unwrap_or(defaults.resize_fractions),
        rotation_angles: args
            .rotation_angles
            .clone()
            .unwrap_or(defaults.rotation_angles),
        output_format: parse_format(&args.format)?,
        name_prefix: args.name_prefix.clone(),
        first_index: args.first_index,
        draw_boxes: args.draw_boxes,
        parallel: args.parallel,
    };
    // Config file sets any option it names; flags fill in the rest
    if let Some(path) = &args.config {
        let file = fs::read_to_string(path)
            .with_context(|| format!("read config {}", path.display()))?;
        let y: YamlConfig = serde_yaml::from_str(&file)
            .with_context(|| format!("parse config {}", path.display()))?;
        return y.into_synth_config(cfg);
    }
    Ok(cfg)
}

fn run_generate(args: &GenerateArgs, show_progress: bool) -> anyhow::Result<()> {
    let cfg = build_config(args)?;
    if args.print_config {
        match args.print_config_format.as_str() {
            "yaml" => println!("{}", serde_yaml::to_string(&cfg)?),
            _ => println!("{}", serde_json::to_string_pretty(&cfg)?),
        }
        return Ok(());
    }
    // everything that does not depend on the inputs is checked before they are read
    cfg.validate()?;
    if args.parallel && !cfg!(feature = "parallel") {
        warn!("--parallel needs the `parallel` feature; running sequentially");
    }

    let symbols = SymbolLibrary::load_dir(&args.symbols)
        .with_context(|| format!("load symbols from {}", args.symbols.display()))?;
    let backgrounds = BackgroundLibrary::load_dir(&args.backgrounds)
        .with_context(|| format!("load backgrounds from {}", args.backgrounds.display()))?;
    let format = cfg.output_format;
    let session = DatasetSession::new(symbols, backgrounds, cfg)?;

    let mut rng = seeded_rng(args.seed);
    // planning a clone of the rng yields the same batches generate() will draw
    let batches = session.plan(&mut rng.clone()).len();
    let start = Instant::now();
    let stats = if args.dry_run {
        let mut sink = ProgressSink::new(DiscardSink, batches, show_progress);
        let stats = session.generate(&mut rng, &mut sink)?;
        sink.finish();
        stats
    } else {
        fs::create_dir_all(&args.out_dir)
            .with_context(|| format!("create out_dir {}", args.out_dir.display()))?;
        let dir_sink = DirectorySink::create(&args.out_dir, format)
            .with_context(|| format!("prepare output in {}", args.out_dir.display()))?;
        let mut sink = ProgressSink::new(dir_sink, batches, show_progress);
        let stats = session.generate(&mut rng, &mut sink)?;
        sink.finish();
        stats
    };

    info!(
        examples = stats.examples,
        placed = stats.placed,
        requested = stats.requested,
        oversized = stats.skipped_oversized,
        exhausted = stats.skipped_exhausted,
        rate = %format!("{:.2}%", stats.placement_rate() * 100.0),
        elapsed_ms = start.elapsed().as_millis() as u64,
        "stats"
    );

    if let Some(stats_path) = &args.export_stats {
        if args.dry_run {
            println!("{}", stats.summary());
        } else {
            fs::write(stats_path, serde_json::to_string_pretty(&stats)?)
                .with_context(|| format!("write {}", stats_path.display()))?;
            info!(?stats_path, "stats exported");
        }
    }
    Ok(())
}

fn run_backgrounds(args: &BackgroundArgs, show_progress: bool) -> anyhow::Result<()> {
    let format = parse_format(&args.format)?;
    let style = BackgroundStyle {
        width: args.width,
        height: args.height,
        ellipses: args.ellipses,
        min_axis: args.min_axis,
        max_axis: args.max_axis,
        median_radius: (args.median_radius > 0).then_some(args.median_radius),
        ..Default::default()
    };
    style.validate()?;
    let card = LabelCardStyle {
        symbols_per_card: args.symbols_per_card,
        ..Default::default()
    };
    card.validate()?;
    fs::create_dir_all(&args.out_dir)
        .with_context(|| format!("create out_dir {}", args.out_dir.display()))?;

    // label-card mode writes a dataset; plain mode writes bare images
    let mut labeled = match &args.with_labels {
        Some(dir) => {
            let symbols = SymbolLibrary::load_dir(dir)
                .with_context(|| format!("load symbols from {}", dir.display()))?;
            let mut sink = DirectorySink::create(&args.out_dir, format)
                .with_context(|| format!("prepare output in {}", args.out_dir.display()))?;
            sink.begin(&symbols.names())?;
            Some((symbols, sink))
        }
        None => None,
    };

    let mut rng = seeded_rng(args.seed);
    let bar = progress_bar(args.count, "painting", show_progress);
    for i in 0..args.count {
        let name = format!("{}{}", args.name_prefix, i);
        match &mut labeled {
            Some((symbols, sink)) => {
                let example =
                    synthesize_labeled_example(name, &style, &card, symbols, &mut rng)?;
                sink.write(&example)?;
            }
            None => {
                let img = synthesize_background(&style, &mut rng)?;
                let path = args
                    .out_dir
                    .join(format!("{}.{}", name, format.extension()));
                fs::write(&path, encode_image(&img, format)?)
                    .with_context(|| format!("write {}", path.display()))?;
            }
        }
        if let Some(b) = &bar {
            b.inc(1);
        }
    }
    if let Some(b) = &bar {
        b.finish_and_clear();
    }
    info!(
        count = args.count,
        out_dir = ?args.out_dir,
        labeled = labeled.is_some(),
        "backgrounds written"
    );
    Ok(())
}

fn run_export(args: &ExportArgs) -> anyhow::Result<()> {
    let names = match &args.classes {
        Some(p) => Some(
            read_class_names(p).with_context(|| format!("read classes {}", p.display()))?,
        ),
        None => None,
    };
    let records = collect_createml(&args.labels, &args.images, names.as_deref())
        .with_context(|| format!("convert labels in {}", args.labels.display()))?;
    let value = to_createml_json(&records)?;
    let json = if args.pretty {
        serde_json::to_string_pretty(&value)?
    } else {
        serde_json::to_string(&value)?
    };
    write_file(&args.output, json)?;
    info!(output = ?args.output, boxes = records.len(), "createml annotations written");
    Ok(())
}

fn write_file(path: &Path, contents: String) -> anyhow::Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).with_context(|| format!("create {}", parent.display()))?;
    }
    fs::write(path, contents).with_context(|| format!("write {}", path.display()))
}

fn progress_bar(len: usize, verb: &str, show: bool) -> Option<ProgressBar> {
    if !show {
        return None;
    }
    let b = ProgressBar::new(len as u64);
    let template = format!(
        "{{spinner:.green}} {} {{pos}}/{{len}} [{{elapsed_precise}}] {{wide_msg}}",
        verb
    );
    if let Ok(style) = ProgressStyle::with_template(&template) {
        b.set_style(style);
    }
    Some(b)
}

/// Accepts examples without writing them (dry run).
struct DiscardSink;

impl ExampleSink for DiscardSink {
    fn write(&mut self, _example: &Example) -> symbol_synth_core::Result<()> {
        Ok(())
    }
}

/// Forwards to an inner sink and advances a progress bar per example.
struct ProgressSink<S> {
    inner: S,
    bar: Option<ProgressBar>,
}

impl<S: ExampleSink> ProgressSink<S> {
    fn new(inner: S, len: usize, show: bool) -> Self {
        Self {
            inner,
            bar: progress_bar(len, "generating", show),
        }
    }

    fn finish(&self) {
        if let Some(b) = &self.bar {
            b.finish_and_clear();
        }
    }
}

impl<S: ExampleSink> ExampleSink for ProgressSink<S> {
    fn begin(&mut self, class_names: &[String]) -> symbol_synth_core::Result<()> {
        self.inner.begin(class_names)
    }

    fn write(&mut self, example: &Example) -> symbol_synth_core::Result<()> {
        if let Some(b) = &self.bar {
            b.set_message(example.name.clone());
        }
        self.inner.write(example)?;
        if let Some(b) = &self.bar {
            b.inc(1);
        }
        Ok(())
    }
}

fn init_tracing_with_level(quiet: bool, verbose: u8) {
    let level = if quiet {
        "error".to_string()
    } else {
        match verbose {
            0 => "info".into(),
            1 => "debug".into(),
            _ => "trace".into(),
        }
    };
    let _ = tracing_subscriber::fmt()
        .with_env_filter(level)
        .with_target(false)
        .try_init();
}

#[derive(Debug, Deserialize, Default)]
struct YamlConfig {
    occurrences_per_class: Option<usize>,
    min_per_image: Option<usize>,
    max_per_image: Option<usize>,
    attempts_per_symbol: Option<u32>,
    apply_relative_resize: Option<bool>,
    apply_random_rotation: Option<bool>,
    apply_random_matte: Option<bool>,
    resize_fractions: Option<Vec<f32>>,
    rotation_angles: Option<Vec<u32>>,
    output_format: Option<String>,
    name_prefix: Option<String>,
    first_index: Option<usize>,
    draw_boxes: Option<bool>,
    parallel: Option<bool>,
}

impl YamlConfig {
    fn into_synth_config(self, mut cfg: SynthConfig) -> anyhow::Result<SynthConfig> {
        if let Some(v) = self.occurrences_per_class {
            cfg.occurrences_per_class = v;
        }
        if let Some(v) = self.min_per_image {
            cfg.min_per_image = v;
        }
        if let Some(v) = self.max_per_image {
            cfg.max_per_image = v;
        }
        if let Some(v) = self.attempts_per_symbol {
            cfg.attempts_per_symbol = v;
        }
        if let Some(v) = self.apply_relative_resize {
            cfg.apply_relative_resize = v;
        }
        if let Some(v) = self.apply_random_rotation {
            cfg.apply_random_rotation = v;
        }
        if let Some(v) = self.apply_random_matte {
            cfg.apply_random_matte = v;
        }
        if let Some(v) = self.resize_fractions {
            cfg.resize_fractions = v;
        }
        if let Some(v) = self.rotation_angles {
            cfg.rotation_angles = v;
        }
        if let Some(v) = self.output_format {
            cfg.output_format = parse_format(&v)?;
        }
        if let Some(v) = self.name_prefix {
            cfg.name_prefix = v;
        }
        if let Some(v) = self.first_index {
            cfg.first_index = v;
        }
        if let Some(v) = self.draw_boxes {
            cfg.draw_boxes = v;
        }
        if let Some(v) = self.parallel {
            cfg.parallel = v;
        }
        Ok(cfg)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use symbol_synth_core::SynthError;

    #[test]
    fn yaml_overrides_only_present_keys() {
        let y: YamlConfig = serde_yaml::from_str(
            "occurrences_per_class: 40\napply_random_rotation: true\noutput_format: png\n",
        )
        .expect("yaml");
        let base = SynthConfig {
            max_per_image: 9,
            ..Default::default()
        };
        let cfg = y.into_synth_config(base).expect("merge");
        assert_eq!(cfg.occurrences_per_class, 40);
        assert!(cfg.apply_random_rotation);
        assert_eq!(cfg.output_format, OutputFormat::Png);
        assert_eq!(cfg.max_per_image, 9);
    }

    #[test]
    fn yaml_rejects_unknown_format() {
        let y: YamlConfig = serde_yaml::from_str("output_format: tiff\n").expect("yaml");
        assert!(y.into_synth_config(SynthConfig::default()).is_err());
    }

    #[test]
    fn invalid_bounds_fail_before_inputs_are_read() {
        let cli = Cli::try_parse_from([
            "symbol-synth",
            "generate",
            "/nonexistent/backgrounds",
            "/nonexistent/symbols",
            "--min-per-image",
            "3",
            "--max-per-image",
            "2",
        ])
        .expect("args");
        let Commands::Generate(args) = cli.command else {
            panic!("expected generate");
        };
        let err = run_generate(&args, false).expect_err("invalid bounds");
        assert!(matches!(
            err.downcast_ref::<SynthError>(),
            Some(SynthError::InvalidConfig(_))
        ));
    }

    #[test]
    fn background_flags_default_to_nine_pixel_median() {
        let cli = Cli::try_parse_from(["symbol-synth", "backgrounds", "--with-labels", "syms"])
            .expect("args");
        let Commands::Backgrounds(args) = cli.command else {
            panic!("expected backgrounds");
        };
        assert_eq!(args.median_radius, 4);
        assert_eq!(args.symbols_per_card, 2);
        assert_eq!(args.with_labels, Some(PathBuf::from("syms")));
    }
}
