// scripts/benchmark.rs
use clap::Parser;
use fast_mlmc::math_utils::Timer;
use fast_mlmc::mc::mlmc::{MlmcConfig, MlmcEstimate, MlmcEstimator};
use fast_mlmc::mc::payoffs::PathOption;
use fast_mlmc::models::heston::{Heston, HestonParams};
use fast_mlmc::output;
use std::env;
use std::error::Error;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::process::Command;
use tracing::{error, info};

/// Accuracy sweep of the adaptive MLMC estimator on a Heston Asian call
#[derive(Parser, Debug)]
#[command(name = "mlmc_bench")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Target RMS errors to sweep
    #[arg(short, long, value_delimiter = ',', default_value = "0.1,0.05,0.02,0.01")]
    eps: Vec<f64>,

    /// Pilot paths per level
    #[arg(short = 'n', long, default_value = "10000")]
    pilot_paths: usize,

    /// Refinement factor M between levels
    #[arg(short = 'm', long, default_value = "2")]
    refinement: usize,

    /// Strike of the Asian call
    #[arg(short, long, default_value = "100.0")]
    strike: f64,

    /// Correlation between price and variance shocks
    #[arg(long, default_value = "0.0", allow_hyphen_values = true)]
    rho: f64,

    /// Base seed of the random streams
    #[arg(long, default_value = "12345")]
    seed: u64,

    /// Log filter used when RUST_LOG is unset
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[derive(Debug)]
struct SystemInfo {
    os: String,
    cpu_model: String,
    cpu_cores: usize,
    rust_version: String,
    rayon_threads: usize,
}

impl SystemInfo {
    fn gather() -> Self {
        Self {
            os: env::consts::OS.to_string(),
            cpu_model: Self::get_cpu_model(),
            cpu_cores: num_cpus::get(),
            rust_version: Self::get_rust_version(),
            rayon_threads: rayon::current_num_threads(),
        }
    }

    fn get_cpu_model() -> String {
        #[cfg(target_os = "linux")]
        {
            std::fs::read_to_string("/proc/cpuinfo")
                .ok()
                .and_then(|content| {
                    content
                        .lines()
                        .find(|line| line.starts_with("model name"))
                        .and_then(|line| line.split(':').nth(1))
                        .map(|s| s.trim().to_string())
                })
                .unwrap_or_else(|| "Unknown CPU".to_string())
        }

        #[cfg(target_os = "macos")]
        {
            Command::new("sysctl")
                .args(["-n", "machdep.cpu.brand_string"])
                .output()
                .map(|output| String::from_utf8_lossy(&output.stdout).trim().to_string())
                .unwrap_or_else(|_| "Unknown CPU".to_string())
        }

        #[cfg(not(any(target_os = "linux", target_os = "macos")))]
        {
            "Unknown CPU".to_string()
        }
    }

    fn get_rust_version() -> String {
        Command::new("rustc")
            .arg("--version")
            .output()
            .map(|output| String::from_utf8_lossy(&output.stdout).trim().to_string())
            .unwrap_or_else(|_| "Unknown Rust version".to_string())
    }
}

#[derive(Debug)]
struct BenchmarkResult {
    eps: f64,
    time_ms: f64,
    estimate: MlmcEstimate,
}

fn run_sweep(args: &Args) -> Result<Vec<BenchmarkResult>, Box<dyn Error>> {
    let model = Heston::new(HestonParams {
        rho: args.rho,
        ..HestonParams::default()
    })?;
    let option = PathOption::asian(0.0, 1.0, true);
    let mut results = Vec::with_capacity(args.eps.len());

    for &eps in &args.eps {
        let config = MlmcConfig {
            refinement_factor: args.refinement,
            strike: args.strike,
            target_error: eps,
            default_num_paths: args.pilot_paths,
            seed: args.seed,
            ..Default::default()
        };

        info!(eps, "running MLMC");
        let timer = Timer::new();
        let estimate = MlmcEstimator::new(&model, &option, config)?.run()?;
        let time_ms = timer.elapsed_ms();

        results.push(BenchmarkResult {
            eps,
            time_ms,
            estimate,
        });
    }

    Ok(results)
}

fn write_results_to_csv(
    results: &[BenchmarkResult],
    system_info: &SystemInfo,
    filename: &str,
) -> std::io::Result<()> {
    let mut file = BufWriter::new(File::create(filename)?);

    writeln!(file, "# System Information")?;
    writeln!(file, "# OS: {}", system_info.os)?;
    writeln!(file, "# CPU: {}", system_info.cpu_model)?;
    writeln!(file, "# CPU Cores: {}", system_info.cpu_cores)?;
    writeln!(file, "# Rust Version: {}", system_info.rust_version)?;
    writeln!(file, "# Rayon Threads: {}", system_info.rayon_threads)?;
    writeln!(
        file,
        "# Benchmark Date: {}",
        chrono::Utc::now().format("%Y-%m-%d %H:%M:%S UTC")
    )?;
    writeln!(file, "#")?;

    writeln!(
        file,
        "Eps,Price,Std_Error,Finest_Level,Iterations,Total_Samples,Cost,Time_ms"
    )?;
    for result in results {
        let est = &result.estimate;
        writeln!(
            file,
            "{},{:.6},{:.6e},{},{},{},{:.0},{:.2}",
            result.eps,
            est.price,
            est.standard_error(),
            est.finest_level,
            est.iterations,
            est.total_samples(),
            est.cost(),
            result.time_ms
        )?;
    }

    file.flush()
}

fn main() -> Result<(), Box<dyn Error>> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&args.log_level)),
        )
        .init();

    println!("fast-mlmc Accuracy Sweep");
    println!("========================\n");

    let system_info = SystemInfo::gather();
    println!("System Information:");
    println!("  OS: {}", system_info.os);
    println!("  CPU: {}", system_info.cpu_model);
    println!("  CPU Cores: {}", system_info.cpu_cores);
    println!("  Rust Version: {}", system_info.rust_version);
    println!("  Rayon Threads: {}", system_info.rayon_threads);
    println!();

    let results = match run_sweep(&args) {
        Ok(results) => results,
        Err(e) => {
            error!(error = %e, "benchmark failed");
            return Err(e);
        }
    };

    println!("\n{:=<86}", "");
    println!(
        "{:>8} {:>12} {:>12} {:>6} {:>6} {:>12} {:>14} {:>10}",
        "eps", "price", "std err", "L", "iters", "samples", "cost", "time (ms)"
    );
    println!("{:-<86}", "");
    for result in &results {
        let est = &result.estimate;
        println!(
            "{:>8} {:>12.6} {:>12.2e} {:>6} {:>6} {:>12} {:>14.0} {:>10.1}",
            result.eps,
            est.price,
            est.standard_error(),
            est.finest_level,
            est.iterations,
            est.total_samples(),
            est.cost(),
            result.time_ms
        );
    }
    println!("{:=<86}", "");

    let timestamp = chrono::Utc::now().format("%Y%m%d_%H%M%S");
    let filename = format!("mlmc_bench_{}.csv", timestamp);
    write_results_to_csv(&results, &system_info, &filename)?;
    println!("\nResults saved to: {}", filename);

    if let Some(last) = results.last() {
        let levels_file = format!("mlmc_bench_{}_levels.csv", timestamp);
        output::write_levels_to_csv(&levels_file, &last.estimate)?;
        println!("Level breakdown for eps = {} saved to: {}", last.eps, levels_file);
    }

    Ok(())
}
