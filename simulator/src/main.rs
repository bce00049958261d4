// Ignore this lint otherwise many warnings are generated for common
// mathematical notation
#![allow(non_snake_case)]

use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use log::info;

use simulator::{run_simulation, History, RunConfig};

#[derive(Parser)]
#[command(about = "Closed-loop MPC / MPC-CBF simulation for a differential-drive robot")]
struct Args {
    /// Run configuration file.
    #[arg(long, default_value = "config.toml")]
    config: PathBuf,
    /// Write the run history to this CSV file.
    #[arg(long)]
    results: Option<PathBuf>,
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let args = Args::parse();

    let config = RunConfig::load(&args.config)
        .with_context(|| format!("loading {}", args.config.display()))?;
    let history = run_simulation(&config)?;

    let mut solve_stats = stats::OnlineStats::new();
    for &ms in &history.solve_millis {
        solve_stats.add(ms);
    }

    let x = history.final_state();
    info!(
        "final state ({:.4}, {:.4}, {:.4}) after {} steps",
        x[0],
        x[1],
        x[2],
        history.controls.len()
    );
    info!("total stage cost {:.4}", history.total_cost());
    if let Some(clearance) = history.min_clearance() {
        info!("minimum obstacle clearance {:.4}", clearance);
    }
    info!(
        "solve time mean {:.2} ms, stddev {:.2} ms",
        solve_stats.mean(),
        solve_stats.stddev()
    );

    if let Some(path) = &args.results {
        write_results(path, &config, &history)
            .with_context(|| format!("writing {}", path.display()))?;
    }

    if let Some(step) = history.failed_step {
        anyhow::bail!("optimisation infeasible at step {}", step);
    }
    Ok(())
}

fn write_results(path: &PathBuf, config: &RunConfig, history: &History) -> anyhow::Result<()> {
    let mut writer = csv::Writer::from_path(path)?;
    writer.write_record(["t", "x", "y", "theta", "v", "omega", "cost"])?;
    for (k, u) in history.controls.iter().enumerate() {
        let x = &history.states[k];
        let t = k as f64 * config.Ts;
        writer.write_record(&[
            t.to_string(),
            x[0].to_string(),
            x[1].to_string(),
            x[2].to_string(),
            u[0].to_string(),
            u[1].to_string(),
            history.costs[k].to_string(),
        ])?;
    }
    writer.flush()?;
    Ok(())
}
