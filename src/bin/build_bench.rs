use anyhow::{bail, Context};
use build_bench::harness::{self, HarnessConfig};
use build_bench::reporters::{self, ResultsFileReporter};
use build_bench::scenarios::{self, DEFAULT_CHANGE_FILES_ROOT, DEFAULT_TASKS};
use build_bench::schema::RunMeta;
use build_bench::validation;
use build_bench::{BenchmarkEvaluator, BenchmarkSelection, CommandBuildInvoker, Suite, Task};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

/// Gradle property through which the build learns where to write its metrics.
const METRICS_FILE_PROPERTY: &str = "kotlin.internal.single.build.metrics.file";

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the benchmark scenarios against the project.
    Run {
        #[arg(long, value_enum, default_value_t = BenchmarkSelection::Fast)]
        selection: BenchmarkSelection,

        /// Only run the named scenario. Can be provided multiple times.
        #[arg(long, value_name = "NAME", action = clap::ArgAction::Append)]
        scenario: Vec<String>,

        /// Build program, relative paths resolve against the project root.
        #[arg(long, default_value = "./gradlew")]
        program: PathBuf,

        /// Replace the default task set. Can be provided multiple times.
        #[arg(long, value_enum, action = clap::ArgAction::Append)]
        task: Vec<Task>,

        /// Write results as JSON instead of the compact binary format.
        #[arg(long, default_value_t = false)]
        json: bool,
    },

    /// Check change files against the project without running anything.
    Validate {
        #[arg(long, value_enum, default_value_t = BenchmarkSelection::All)]
        selection: BenchmarkSelection,
    },

    /// Print a results file written by a previous run.
    Show {
        #[arg(value_name = "FILE")]
        path: PathBuf,
    },
}

#[derive(Parser, Debug)]
#[command(name = "build-bench")]
#[command(about = "Incremental build benchmark runner")]
struct Args {
    /// Root of the benchmarked project.
    #[arg(long, value_name = "DIR", default_value = ".", global = true)]
    project_root: PathBuf,

    /// Predefined suite to use.
    #[arg(long, default_value = "kotlin", global = true)]
    project: String,

    #[arg(long, value_name = "DIR", default_value = DEFAULT_CHANGE_FILES_ROOT, global = true)]
    change_files: PathBuf,

    /// Where results and build logs are written.
    #[arg(long, value_name = "DIR", default_value = "build/benchmark-results", global = true)]
    results_dir: PathBuf,

    #[command(subcommand)]
    cmd: Command,
}

fn init_tracing() {
    let filter = EnvFilter::try_from_env("BUILD_BENCH_LOG").unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn resolve_program(project_root: &Path, program: PathBuf) -> PathBuf {
    if program.is_relative() && program.components().count() > 1 {
        project_root.join(program)
    } else {
        program
    }
}

fn only_scenarios(suite: Suite, names: &[String]) -> anyhow::Result<Suite> {
    if names.is_empty() {
        return Ok(suite);
    }
    for name in names {
        if suite.scenario(name).is_none() {
            bail!("unknown scenario '{name}'");
        }
    }
    let selected = suite
        .scenarios
        .iter()
        .filter(|s| names.contains(&s.name))
        .cloned()
        .collect();
    Ok(suite.with_scenarios(selected))
}

fn main() -> anyhow::Result<()> {
    init_tracing();
    let args = Args::parse();

    match args.cmd {
        Command::Run {
            selection,
            scenario,
            program,
            task,
            json,
        } => {
            let default_tasks = if task.is_empty() { DEFAULT_TASKS.to_vec() } else { task };
            let suite = scenarios::select(selection, &args.project, &args.change_files, &default_tasks)?;
            let suite = only_scenarios(suite, &scenario)?;

            let cfg = HarnessConfig::new(args.project_root.clone(), args.results_dir.clone(), selection);
            let mut invoker = CommandBuildInvoker::new(resolve_program(&cfg.project_root, program), &cfg.project_root);
            invoker.report_property = Some(METRICS_FILE_PROPERTY.to_string());
            invoker.jvm_arguments = harness::heap_dump_jvm_arguments();

            let results_file = if json {
                cfg.json_results_file()
            } else {
                cfg.compact_results_file()
            };
            let meta = RunMeta::new(
                &cfg.timestamp,
                cfg.git_sha.clone(),
                &cfg.project_root.display().to_string(),
            );

            let mut evaluator = BenchmarkEvaluator::new(&cfg.project_root, invoker);
            evaluator.add_listener(reporters::console_reporter(harness::is_teamcity_run()));
            evaluator.add_listener(Box::new(ResultsFileReporter::new(&results_file, meta)));
            evaluator.set_build_logs(Box::new(cfg.build_logs()));

            tracing::info!(
                scenarios = suite.scenarios.len(),
                ?selection,
                project = %cfg.project_root.display(),
                "starting benchmarks"
            );
            let summary = evaluator
                .run_benchmarks(&suite)
                .context("benchmark run aborted")?;

            eprintln!("Results: {}", results_file.display());
            if !summary.is_success() {
                for (name, iteration, failure) in &summary.failed {
                    eprintln!("  FAILED {name} #{iteration}: {failure}");
                }
                bail!(
                    "{} of {} scenario iterations failed",
                    summary.failed.len(),
                    summary.failed.len() + summary.succeeded
                );
            }
        }
        Command::Validate { selection } => {
            let suite = scenarios::select(selection, &args.project, &args.change_files, &DEFAULT_TASKS)?;
            validation::check_benchmarks(&args.project_root, &suite)?;
            eprintln!("{} scenarios are valid", suite.scenarios.len());
        }
        Command::Show { path } => {
            let results = reporters::read_results(&path)
                .with_context(|| format!("could not read {}", path.display()))?;
            let json = serde_json::to_string_pretty(&results)?;
            println!("{json}");
        }
    }

    Ok(())
}
