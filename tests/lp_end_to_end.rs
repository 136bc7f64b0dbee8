#![cfg(feature = "microlp")]

use std::{
    fs::File,
    io::Write,
    sync::{atomic::AtomicBool, Arc},
};

use flate2::{write::GzEncoder, Compression};
use fpump::{
    heuristic::{HeuristicBuilder, SolutionStatus},
    lp::LpModel,
    mps,
    portfolio::{run_portfolio, PortfolioConfig},
    stats::InstanceStats,
    FeasibilityPump, PumpBuilder, RoundingPolicy,
};

const COVER: &str = "\
NAME          cover
ROWS
 N  obj
 G  r1
 G  r2
 G  r3
COLUMNS
    MARKER                 'MARKER'                 'INTORG'
    a         obj          3     r1           1
    a         r3           1
    b         obj          2     r1           1
    b         r2           1
    c         obj          4     r2           1
    c         r3           1
    MARKER                 'MARKER'                 'INTEND'
    s         obj          1     r3           1
RHS
    rhs       r1           1     r2           1
    rhs       r3           1     obj          -10
BOUNDS
 UP bnd       a            1
 UP bnd       b            1
 UP bnd       c            1
 UP bnd       s            1
ENDATA
";

#[test]
fn pump_solves_parsed_cover() {
    let problem = mps::parse(COVER.as_bytes()).unwrap();
    assert_eq!(problem.num_integer_vars(), 3);
    let stats = InstanceStats::new(&problem);
    assert_eq!((stats.binary, stats.continuous), (3, 1));

    for policy in [
        RoundingPolicy::Nearest,
        RoundingPolicy::Randomized,
        RoundingPolicy::Propagation,
    ] {
        let mut model = LpModel::new(problem.clone());
        let config = PumpBuilder::new().rounding(policy).seed(5).build().unwrap();
        let outcome = FeasibilityPump::new(&mut model, config).run().unwrap();
        let found = outcome.incumbent().unwrap();
        assert!(problem.check(&found.values, 1e-6).is_ok(), "{:?}", policy);
        approx::assert_relative_eq!(
            found.objective,
            problem.objective_value(&found.values),
            epsilon = 1e-9
        );
        // the objective constant moves every solution up by 10
        assert!(found.objective >= 12.);
        // scoped fixings were undone
        assert_eq!(model.problem(), &problem);
    }
}

#[test]
fn portfolio_and_facade_agree_on_feasibility() {
    let problem = mps::parse(COVER.as_bytes()).unwrap();
    let portfolio = PortfolioConfig {
        runs: 3,
        diversify: true,
        stop_on_first_success: false,
    };
    let result = run_portfolio(
        &LpModel::new(problem.clone()),
        &PumpBuilder::new().build().unwrap(),
        &portfolio,
        Arc::new(AtomicBool::new(false)),
    )
    .unwrap();
    assert_eq!(result.reports.len(), 3);
    let best = result.best.unwrap();
    assert!(result
        .reports
        .iter()
        .filter_map(|r| r.outcome.incumbent())
        .all(|i| i.objective >= best.objective));

    let solution = HeuristicBuilder::new()
        .threads(3)
        .time_limit(10.)
        .build()
        .unwrap()
        .solve(&problem)
        .unwrap();
    assert_eq!(solution.status, SolutionStatus::Feasible);
    assert!(problem.check(&solution.variable_values, 1e-6).is_ok());
}

#[test]
fn gzipped_model_round_trips_to_solution_file() {
    let path = std::env::temp_dir().join(format!("fpump-cover-{}.mps.gz", std::process::id()));
    {
        let mut encoder = GzEncoder::new(File::create(&path).unwrap(), Compression::default());
        encoder.write_all(COVER.as_bytes()).unwrap();
        encoder.finish().unwrap();
    }
    let problem = mps::read_file(&path).unwrap();
    std::fs::remove_file(&path).unwrap();
    assert_eq!(problem, mps::parse(COVER.as_bytes()).unwrap());

    let mut model = LpModel::new(problem.clone());
    let found = fpump::run(&mut model, &PumpBuilder::new().build().unwrap())
        .unwrap()
        .incumbent()
        .unwrap();
    let mut out = Vec::new();
    mps::write_solution(&mut out, &problem, &found.values, found.objective).unwrap();
    let text = String::from_utf8(out).unwrap();
    let mut lines = text.lines();
    assert_eq!(
        lines.next().unwrap(),
        format!("# Objective value: {}", found.objective)
    );
    let names = lines
        .map(|l| l.split_whitespace().next().unwrap())
        .collect::<Vec<_>>();
    assert_eq!(names, vec!["a", "b", "c", "s"]);
}
