// src/output.rs
use crate::mc::mlmc::MlmcEstimate;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;

pub fn write_levels_to_csv<P: AsRef<Path>>(filename: P, estimate: &MlmcEstimate) -> io::Result<()> {
    let mut file = BufWriter::new(File::create(filename)?);
    writeln!(file, "level,step_size,samples,mean,variance")?;
    for level in &estimate.levels {
        writeln!(
            file,
            "{},{},{},{},{}",
            level.level, level.step_size, level.samples, level.mean, level.variance
        )?;
    }
    file.flush()
}

pub fn write_summary_to_csv<P: AsRef<Path>>(filename: P, summary_data: &[(&str, String)]) -> io::Result<()> {
    let mut file = BufWriter::new(File::create(filename)?);
    for (key, value) in summary_data {
        writeln!(file, "{},{}", key, value)?;
    }
    file.flush()
}

/// Key/value rows describing a converged run
pub fn summarize(estimate: &MlmcEstimate) -> Vec<(&'static str, String)> {
    vec![
        ("price", format!("{:.8}", estimate.price)),
        ("variance", format!("{:.8e}", estimate.variance)),
        ("standard_error", format!("{:.8e}", estimate.standard_error())),
        ("finest_level", estimate.finest_level.to_string()),
        ("iterations", estimate.iterations.to_string()),
        ("total_samples", estimate.total_samples().to_string()),
        ("cost", format!("{:.0}", estimate.cost())),
        ("elapsed_ms", format!("{:.3}", estimate.elapsed.as_secs_f64() * 1000.0)),
    ]
}
