use std::{
    fs::File,
    io::BufWriter,
    path::PathBuf,
    sync::{atomic::AtomicBool, Arc},
    time::Duration,
};

use anyhow::Context;
use fpump::{
    lp::LpModel,
    mps,
    portfolio::{run_portfolio, PortfolioConfig},
    stats::InstanceStats,
    AlphaSchedule, PumpBuilder, RankingPolicy, RoundingPolicy, TieBreak,
};
use log::info;
use structopt::StructOpt;

#[derive(Debug, StructOpt)]
#[structopt(about = "Feasibility pump for MPS models")]
struct Opts {
    #[structopt(name = "INPUT", parse(from_os_str))]
    input_file: PathBuf,

    #[structopt(name = "OUTPUT", parse(from_os_str))]
    output_file: Option<PathBuf>,

    /// Independent pump runs, one thread each
    #[structopt(long, default_value = "4")]
    threads: usize,

    #[structopt(long, default_value = "0")]
    seed: u64,

    /// Wall-clock limit in seconds
    #[structopt(long)]
    time_limit: Option<f64>,

    #[structopt(long, default_value = "1000")]
    max_iterations: usize,

    #[structopt(long, default_value = "10")]
    max_restarts: usize,

    /// nearest, randomized or propagation
    #[structopt(long, default_value = "nearest")]
    rounding: RoundingPolicy,

    /// lower, upper or range
    #[structopt(long, default_value = "range")]
    tie_break: TieBreak,

    /// displacement or visits
    #[structopt(long, default_value = "visits")]
    ranking: RankingPolicy,

    #[structopt(long, default_value = "0.1")]
    visit_penalty: f64,

    #[structopt(long, default_value = "0.15")]
    perturbation_fraction: f64,

    #[structopt(long, default_value = "1")]
    perturbation_step: i64,

    #[structopt(long, default_value = "3")]
    stall_window: usize,

    #[structopt(long, default_value = "5")]
    stall_ceiling: usize,

    #[structopt(long, default_value = "1.0")]
    alpha: f64,

    /// constant, geometric:<factor> or linear:<step>
    #[structopt(long, default_value = "geometric:0.9")]
    alpha_schedule: AlphaSchedule,

    #[structopt(long, default_value = "16")]
    history: usize,

    #[structopt(long, default_value = "1e-6")]
    epsilon: f64,

    /// Keep the configured rounding policy in every run
    #[structopt(long)]
    no_diversify: bool,

    /// Deterministic rounding after restarts
    #[structopt(long)]
    no_random_restarts: bool,

    /// Only accept roundings at zero distance
    #[structopt(long)]
    no_early_acceptance: bool,
}

fn main() -> anyhow::Result<()> {
    pretty_env_logger::env_logger::Builder::from_env(
        pretty_env_logger::env_logger::Env::default().default_filter_or("info"),
    )
    .init();

    let opt = Opts::from_args();
    info!("{:?}", opt);

    let problem = {
        let _p = hprof::enter("read");
        mps::read_file(&opt.input_file)
            .with_context(|| format!("reading {}", opt.input_file.display()))?
    };
    info!(
        "instance:{}",
        opt.input_file
            .file_name()
            .map(|n| n.to_string_lossy())
            .unwrap_or_default()
    );
    InstanceStats::new(&problem).log();

    let mut builder = PumpBuilder::new()
        .max_iterations(opt.max_iterations)
        .max_restarts(opt.max_restarts)
        .rounding(opt.rounding)
        .tie_break(opt.tie_break)
        .ranking(opt.ranking)
        .visit_penalty(opt.visit_penalty)
        .perturbation(opt.perturbation_fraction, opt.perturbation_step)
        .stall(opt.stall_window, opt.stall_ceiling)
        .alpha(opt.alpha, opt.alpha_schedule)
        .seed(opt.seed)
        .randomize_restarts(!opt.no_random_restarts)
        .early_acceptance(!opt.no_early_acceptance)
        .history(opt.history)
        .epsilon(opt.epsilon);
    if let Some(limit) = opt.time_limit {
        let budget = Duration::try_from_secs_f64(limit)
            .with_context(|| format!("invalid time limit {limit}"))?;
        builder = builder.time_budget(budget);
    }
    let config = builder.build().context("invalid pump configuration")?;

    let portfolio = PortfolioConfig {
        runs: opt.threads.max(1),
        diversify: !opt.no_diversify,
        stop_on_first_success: true,
    };
    let model = LpModel::new(problem);
    let result = {
        let _p = hprof::enter("pump");
        run_portfolio(&model, &config, &portfolio, Arc::new(AtomicBool::new(false)))?
    };

    for report in &result.reports {
        info!(
            "id:{} seed:{} rounding:{:?} {}",
            report.run_id, report.seed, report.rounding_policy, report.outcome
        );
    }

    match &result.best {
        Some(best) => {
            println!("Final best objective: {}", best.objective);
            if let Some(output) = &opt.output_file {
                let file = File::create(output)
                    .with_context(|| format!("creating {}", output.display()))?;
                mps::write_solution(BufWriter::new(file), model.problem(), &best.values, best.objective)?;
                println!("Solution saved to: {}", output.display());
            }
        }
        None => println!("No feasible solution found"),
    }

    hprof::profiler().print_timing();
    Ok(())
}
