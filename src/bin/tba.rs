//! tba - test bucket allocator CLI
//!
//! Thin wrapper over the `test_buckets` library: loads the configuration
//! file, applies command-line overrides, runs the allocation engine and
//! reports the result.
//!
//! Exit codes: 0 on success, 2 for configuration errors, 1 for any other
//! fatal error (for example the artifact could not be written).

// Exclude from coverage - CLI binary tested via integration tests
#![cfg_attr(tarpaulin, ignore)]

use anyhow::Context;
use clap::{Parser, ValueEnum};
use test_buckets::{AllocationEngine, AllocationPolicy, AllocatorConfig, BucketError, Framework};
use std::path::{Path, PathBuf};

/// Split a JVM test suite into balanced CI buckets.
#[derive(Parser, Debug)]
#[command(name = "tba")]
#[command(version = test_buckets::VERSION)]
#[command(about = "Split a JVM test suite into balanced CI buckets")]
#[command(after_help = "EXAMPLES:
  # Use .bucket-allocator.json in the current project
  tba

  # JUnit, fast tests only, 200 methods per bucket
  tba . --max-methods 200 --include-tags fast --parallel-methods

  # TestNG suites
  tba . --framework testng --suite src/test/resources/testng.xml --max-methods 150

  # Print the buckets without writing the artifact
  tba . --max-methods 100 --dry-run
")]
struct Cli {
    // ═══════════════════════════════════════════════════════════════════════════
    // PROJECT
    // ═══════════════════════════════════════════════════════════════════════════

    /// Project root; relative paths are resolved against it
    #[arg(value_name = "PROJECT_ROOT", help_heading = "Project")]
    project_root: Option<PathBuf>,

    /// JSON configuration file. Defaults to PROJECT_ROOT/.bucket-allocator.json
    #[arg(short = 'c', long = "config", value_name = "FILE", help_heading = "Project")]
    config: Option<PathBuf>,

    /// Compiled test classes directory
    #[arg(long = "test-output-directory", value_name = "DIR", help_heading = "Project")]
    test_output_directory: Option<PathBuf>,

    /// Java test source root (repeatable)
    #[arg(long = "source-dir", value_name = "DIR", help_heading = "Project")]
    source_dirs: Vec<PathBuf>,

    /// JSON class inventory, consulted before the sources
    #[arg(long = "inventory", value_name = "FILE", help_heading = "Project")]
    inventory: Option<PathBuf>,

    // ═══════════════════════════════════════════════════════════════════════════
    // WEIGHING
    // ═══════════════════════════════════════════════════════════════════════════

    /// Test framework whose inclusion rules apply
    #[arg(long = "framework", value_enum, help_heading = "Weighing")]
    framework: Option<FrameworkArg>,

    /// JUnit tags to include (comma separated)
    #[arg(long = "include-tags", value_name = "TAGS", value_delimiter = ',', help_heading = "Weighing")]
    include_tags: Vec<String>,

    /// JUnit tags to exclude (comma separated)
    #[arg(long = "exclude-tags", value_name = "TAGS", value_delimiter = ',', help_heading = "Weighing")]
    exclude_tags: Vec<String>,

    /// TestNG suite file (repeatable)
    #[arg(long = "suite", value_name = "FILE", help_heading = "Weighing")]
    suites: Vec<PathBuf>,

    /// Count individual test methods instead of whole classes
    #[arg(long = "parallel-methods", help_heading = "Weighing")]
    parallel_methods: bool,

    /// Count whole classes, overriding the config file
    #[arg(long = "no-parallel-methods", conflicts_with = "parallel_methods", help_heading = "Weighing")]
    no_parallel_methods: bool,

    /// Only consider class files matching this glob (repeatable)
    #[arg(long = "class-pattern", value_name = "GLOB", help_heading = "Weighing")]
    class_patterns: Vec<String>,

    /// Annotation simple name marking a test method (repeatable)
    #[arg(long = "test-annotation", value_name = "NAME", help_heading = "Weighing")]
    test_annotations: Vec<String>,

    // ═══════════════════════════════════════════════════════════════════════════
    // ALLOCATION
    // ═══════════════════════════════════════════════════════════════════════════

    /// Maximum test methods per bucket
    #[arg(short = 'm', long = "max-methods", value_name = "N", help_heading = "Allocation")]
    max_methods: Option<usize>,

    /// Bucket selection policy
    #[arg(long = "policy", value_enum, help_heading = "Allocation")]
    policy: Option<PolicyArg>,

    /// Artifact path; `.json` is appended
    #[arg(short = 'o', long = "output", value_name = "FILE", help_heading = "Allocation")]
    output: Option<PathBuf>,

    /// Print the buckets to stdout instead of writing the artifact
    #[arg(long = "dry-run", help_heading = "Allocation")]
    dry_run: bool,

    // ═══════════════════════════════════════════════════════════════════════════
    // OUTPUT
    // ═══════════════════════════════════════════════════════════════════════════

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short = 'v', long = "verbose", action = clap::ArgAction::Count, help_heading = "Output")]
    verbose: u8,

    /// Only log warnings and errors, skip the report
    #[arg(short = 'q', long = "quiet", conflicts_with = "verbose", help_heading = "Output")]
    quiet: bool,
}

/// Test framework.
#[derive(Debug, Clone, Copy, ValueEnum)]
enum FrameworkArg {
    /// Tag include/exclude filtering
    #[value(name = "junit", alias = "junit5")]
    JUnit,
    /// Suite files with include lists
    #[value(name = "testng")]
    TestNg,
}

impl From<FrameworkArg> for Framework {
    fn from(arg: FrameworkArg) -> Self {
        match arg {
            FrameworkArg::JUnit => Framework::JUnit,
            FrameworkArg::TestNg => Framework::TestNg,
        }
    }
}

/// Bucket selection policy.
#[derive(Debug, Clone, Copy, ValueEnum)]
enum PolicyArg {
    /// Least-loaded bucket that fits (default)
    #[value(name = "worst-fit", alias = "lpt")]
    WorstFit,
    /// Oldest bucket that fits
    #[value(name = "first-fit", alias = "ffd")]
    FirstFit,
}

impl From<PolicyArg> for AllocationPolicy {
    fn from(arg: PolicyArg) -> Self {
        match arg {
            PolicyArg::WorstFit => AllocationPolicy::WorstFit,
            PolicyArg::FirstFit => AllocationPolicy::FirstFit,
        }
    }
}

fn init_logging(cli: &Cli) -> anyhow::Result<()> {
    let loglevel = if cli.quiet {
        simplelog::LevelFilter::Warn
    } else {
        match cli.verbose {
            0 => simplelog::LevelFilter::Info,
            1 => simplelog::LevelFilter::Debug,
            _ => simplelog::LevelFilter::Trace,
        }
    };

    let mut lcfg = simplelog::ConfigBuilder::new();
    lcfg.set_time_level(simplelog::LevelFilter::Error)
        .set_location_level(simplelog::LevelFilter::Off)
        .set_target_level(simplelog::LevelFilter::Off)
        .set_thread_level(simplelog::LevelFilter::Off);
    simplelog::TermLogger::init(
        loglevel,
        lcfg.build(),
        simplelog::TerminalMode::Stderr,
        simplelog::ColorChoice::Auto,
    )?;
    Ok(())
}

/// Load the config file (explicit, or the project default if present)
fn load_config(cli: &Cli, project_root: &Path) -> anyhow::Result<AllocatorConfig> {
    let mut config = match &cli.config {
        Some(path) => AllocatorConfig::from_file(path)?,
        None => {
            let default_config = AllocatorConfig::default_path(project_root);
            if default_config.exists() {
                AllocatorConfig::from_file(&default_config)?
            } else {
                AllocatorConfig::default()
            }
        }
    };

    if config.project_root == Path::new(".") {
        config.project_root = project_root.to_path_buf();
    } else if config.project_root.is_relative() {
        config.project_root = project_root.join(&config.project_root);
    }
    Ok(config)
}

/// Apply CLI overrides on top of the file config
fn apply_overrides(cli: &Cli, config: &mut AllocatorConfig) {
    if let Some(dir) = &cli.test_output_directory {
        config.test_output_directory = dir.clone();
    }
    if !cli.source_dirs.is_empty() {
        config.test_source_directories = cli.source_dirs.clone();
    }
    if let Some(inventory) = &cli.inventory {
        config.class_inventory = Some(inventory.clone());
    }
    if let Some(framework) = cli.framework {
        config.framework = framework.into();
    }
    if !cli.include_tags.is_empty() {
        config.include_tags = cli.include_tags.clone();
    }
    if !cli.exclude_tags.is_empty() {
        config.exclude_tags = cli.exclude_tags.clone();
    }
    if !cli.suites.is_empty() {
        config.suites = cli.suites.clone();
    }
    if cli.parallel_methods {
        config.parallel_methods = true;
    }
    if cli.no_parallel_methods {
        config.parallel_methods = false;
    }
    if !cli.class_patterns.is_empty() {
        config.class_patterns = cli.class_patterns.clone();
    }
    if !cli.test_annotations.is_empty() {
        config.test_annotations = cli.test_annotations.clone();
    }
    if let Some(max) = cli.max_methods {
        config.max_methods_per_bucket = max;
    }
    if let Some(policy) = cli.policy {
        config.policy = policy.into();
    }
    if let Some(output) = &cli.output {
        config.json_output_file = output.clone();
    }
}

fn run(cli: Cli) -> anyhow::Result<()> {
    // Fix broken pipe panic when piping to head/tail/etc.
    #[cfg(unix)]
    {
        unsafe {
            libc::signal(libc::SIGPIPE, libc::SIG_DFL);
        }
    }

    init_logging(&cli).context("initializing logger")?;

    let project_root = cli.project_root.clone().unwrap_or_else(|| PathBuf::from("."));
    if !project_root.is_dir() {
        return Err(BucketError::DirectoryNotFound { path: project_root }.into());
    }

    let mut config = load_config(&cli, &project_root)?;
    apply_overrides(&cli, &mut config);

    let engine = AllocationEngine::new(config);
    let outcome = if cli.dry_run {
        engine.plan()?
    } else {
        engine.run()?
    };

    if !cli.quiet {
        outcome.summary.print_report();
        let report = &outcome.report;
        if report.has_failures() {
            eprintln!(
                "Skipped: {} unresolved class(es), {} unreadable suite(s)",
                report.unresolved.len(),
                report.suite_errors.len()
            );
        }
    }

    match outcome.output_path {
        Some(path) => println!("{}", path.display()),
        None => println!("{}", serde_json::to_string_pretty(&outcome.buckets)?),
    }
    Ok(())
}

fn main() {
    let cli = Cli::parse();
    if let Err(e) = run(cli) {
        eprintln!("Error: {:#}", e);
        let config_error = e
            .downcast_ref::<BucketError>()
            .is_some_and(BucketError::is_config_error);
        std::process::exit(if config_error { 2 } else { 1 });
    }
}
