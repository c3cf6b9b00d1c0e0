use aplace_common::util::config::Config;
use aplace_common::util::{check, generator, logger};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Residual overlap budget for the post-placement check. Global placement
/// spreads modules but does not legalize them, so some overlap remains.
const MAX_OVERLAP_RATIO: f64 = 0.25;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[arg(short, long, value_name = "FILE", default_value = "config.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate a random benchmark and run global placement on it.
    Place,
    /// Generate a random benchmark and report its statistics.
    Generate {
        #[arg(long)]
        modules: Option<usize>,
        #[arg(long)]
        nets: Option<usize>,
        #[arg(long)]
        utilization: Option<f64>,
        #[arg(long)]
        seed: Option<u64>,
    },
}

fn main() -> anyhow::Result<()> {
    logger::init();
    let args = Args::parse();

    let config = if args.config.exists() {
        log::info!("Loading configuration from {:?}", args.config);
        let config_str = std::fs::read_to_string(&args.config)
            .map_err(|e| anyhow::anyhow!("Failed to read config file: {}", e))?;
        toml::from_str(&config_str)
            .map_err(|e| anyhow::anyhow!("Failed to parse config TOML: {}", e))?
    } else {
        log::warn!(
            "Configuration file {:?} not found. Using internal defaults.",
            args.config
        );
        Config::default()
    };

    let command = args.command.unwrap_or(Commands::Place);

    match command {
        Commands::Generate {
            modules,
            nets,
            utilization,
            seed,
        } => {
            let mut bench = config.benchmark;
            if let Some(modules) = modules {
                bench.modules = modules;
            }
            if let Some(nets) = nets {
                bench.nets = nets;
            }
            if let Some(utilization) = utilization {
                let safe_util = utilization.clamp(0.05, 0.95);
                if (safe_util - utilization).abs() > f64::EPSILON {
                    log::warn!(
                        "Requested utilization {:.2} is unsafe. Clamped to {:.2}",
                        utilization,
                        safe_util
                    );
                }
                bench.utilization = safe_util;
            }
            if let Some(seed) = seed {
                bench.seed = seed;
            }

            let db = generator::generate_random_db(&bench);
            log::info!(
                "Generated benchmark: {} modules ({} movable), {} nets, region {:.0}x{:.0}",
                db.num_modules(),
                db.num_movable(),
                db.num_nets(),
                db.region.width(),
                db.region.height()
            );
        }
        Commands::Place => {
            if let Err(e) = run_placement(&config) {
                log::error!("{:#}", e);
                std::process::exit(1);
            }
        }
    }

    Ok(())
}

fn run_placement(config: &Config) -> anyhow::Result<()> {
    log::info!(
        "Generating random benchmark (Modules: {}, Nets: {}, Util: {:.0}%)...",
        config.benchmark.modules,
        config.benchmark.nets,
        config.benchmark.utilization * 100.0
    );
    let mut db = generator::generate_random_db(&config.benchmark);

    let utilization = db.total_module_area() / db.region.area();
    log::info!("Design utilization: {:.2}%", utilization * 100.0);
    log::info!("Initial HPWL: {:.0}", db.compute_hpwl());

    log::info!("Starting global placement...");
    let stats =
        aplace_placer::place(&mut db, &config.global_placement).map_err(|e| anyhow::anyhow!(e))?;

    log::info!(
        "Final HPWL: {:.0} ({} iterations, overflow {:.4})",
        stats.hpwl,
        stats.iterations,
        stats.overflow
    );

    check::run_placement_check(&db, MAX_OVERLAP_RATIO).map_err(|e| anyhow::anyhow!(e))?;

    Ok(())
}
