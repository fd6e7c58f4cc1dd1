use anyhow::{bail, Result};
use clap::Parser;
use indicatif::ProgressBar;
use optift::{
    build_cost_model, log_report, solve_baseline, solve_heuristic, FontPartition, Input,
    PartitionInstance, Request,
};
use optift_common::progress::ProgressSink;
use optift_fontops::font_info::FontFaceWrapper;
use std::{
    fmt::Write,
    io,
    path::PathBuf,
    sync::{Arc, Mutex},
};
use tracing::{error, info, warn};

/// Splits web fonts into subsets that minimize expected bytes transferred per page load.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// The path to the input JSON file.
    #[arg(short, long)]
    input: PathBuf,

    /// The directory to write the subset fonts and stylesheet to.
    #[arg(short, long)]
    output: PathBuf,

    /// The number of partitions to split each font into.
    #[arg(short, long)]
    n_partitions: usize,

    /// The RNG seed for cost model sampling.
    #[arg(long, default_value_t = 42)]
    rng: u64,

    /// The number of samples for the cost model.
    #[arg(long, default_value_t = 100)]
    samples: usize,

    /// Compare the heuristic solution to the single-subset baseline solution.
    #[arg(long)]
    compare_baseline: bool,

    /// Whether to enable verbose output
    #[arg(short, long)]
    verbose: bool,
}

/// Progress bar for the sampling phase. Ticks arrive from worker tasks.
struct CliProgress(Mutex<Option<ProgressBar>>);
impl ProgressSink for CliProgress {
    fn start(&self, total: usize) {
        *self.0.lock().unwrap() = Some(ProgressBar::new(total as u64));
    }

    fn tick(&self) {
        if let Some(bar) = &*self.0.lock().unwrap() {
            bar.inc(1);
        }
    }

    fn complete(&self) {
        if let Some(bar) = self.0.lock().unwrap().take() {
            bar.finish_and_clear();
        }
    }
}

async fn main_impl(args: Args) -> Result<()> {
    if args.n_partitions == 0 {
        bail!("`--n-partitions` must be at least 1.");
    }

    let input = Input::load(&args.input)?;

    if args.output.exists() {
        std::fs::remove_dir_all(&args.output)?;
    }
    std::fs::create_dir_all(&args.output)?;

    let progress: Arc<dyn ProgressSink> = Arc::new(CliProgress(Mutex::new(None)));

    let mut css = String::new();
    for font_path in input.unique_font_paths() {
        let codepoints = input.all_codepoints_sorted(font_path);
        info!("Font path: {} ({} codepoints used)", font_path.display(), codepoints.len());
        if codepoints.is_empty() {
            warn!("No post uses this font, skipping.");
            continue;
        }

        let face = Arc::new(FontFaceWrapper::load(std::fs::read(font_path)?)?);

        info!("Fitting cost model...");
        let cost_model = build_cost_model(
            face.clone(),
            &codepoints,
            args.rng,
            args.samples,
            progress.clone(),
        )
        .await?;

        let requests = input
            .requests_for_font(font_path, &codepoints)
            .into_iter()
            .map(|(weight, items)| Request::new(weight, items))
            .collect();
        let instance =
            PartitionInstance::new(args.n_partitions, codepoints.len(), requests, cost_model)?;

        let soln_baseline = solve_baseline(&instance);
        info!("Baseline cost: {}", instance.eval(&soln_baseline)?);
        let soln_heuristic = solve_heuristic(&instance, soln_baseline.clone())?;
        let predicted_cost = instance.eval(&soln_heuristic)?;
        info!("Heuristic cost: {predicted_cost}");

        let output_base = font_path
            .file_stem()
            .map(|x| x.to_string_lossy().to_string())
            .unwrap_or_else(|| "font".to_string());
        let styles_css: Vec<_> = input.styles_css(font_path).into_iter().cloned().collect();

        let partition = FontPartition::from_soln(
            &face,
            &soln_heuristic,
            &codepoints,
            &output_base,
            styles_css.clone(),
        )
        .await?;
        partition.write_to_store(&args.output)?;
        write!(css, "{}", partition.render_css())?;

        let baseline_partition = if args.compare_baseline {
            Some(
                FontPartition::from_soln(
                    &face,
                    &soln_baseline,
                    &codepoints,
                    &output_base,
                    styles_css,
                )
                .await?,
            )
        } else {
            None
        };
        log_report(
            &instance,
            &codepoints,
            &partition,
            predicted_cost,
            baseline_partition.as_ref(),
        )?;
    }

    std::fs::write(args.output.join("font.css"), css)?;
    Ok(())
}

#[tokio::main]
async fn main() {
    let args = Args::parse();
    tracing_subscriber::fmt()
        .with_env_filter(if args.verbose { "optift=debug,info" } else { "info" })
        .with_writer(io::stderr)
        .init();

    match main_impl(args).await {
        Ok(()) => {}
        Err(e) => error!("Error encountered: {e}"),
    }
}
