use crate::config::Config;
use crate::convert::convert_on_soc;
use crate::generator::{Pattern, generate_image};
use crate::stats::TickStats;
use anyhow::{Context, Result};
use rayon::prelude::*;
use std::time::Instant;

/// Converts one random image on each of `instances` independent simulated
/// SoCs in parallel and reports the aggregate cost.
///
/// Every instance owns its SoC and its register maps, so no state is shared
/// between workers. Instance `i` uses seed `seed + i`.
pub fn run_parallel(
    config: &Config,
    instances: usize,
    width: u32,
    height: u32,
    seed: u64,
) -> Result<()> {
    println!(
        "Converting {instances} images of {width}x{height} on independent SoCs (rayon, {} threads)...",
        rayon::current_num_threads()
    );
    let start = Instant::now();

    let per_instance: Vec<TickStats> = (0..instances)
        .into_par_iter()
        .map(|i| -> Result<TickStats> {
            let image = generate_image(width, height, Pattern::Noise, seed + i as u64)?;
            let (_, stats) =
                convert_on_soc(config, &image).with_context(|| format!("instance {i}"))?;
            Ok(stats)
        })
        .collect::<Result<_>>()?;

    let elapsed = start.elapsed().as_secs_f64();
    let total = per_instance
        .iter()
        .fold(TickStats::new(64), |acc, s| acc.merge(s));
    let pixels = instances as f64 * width as f64 * height as f64;

    println!("Results");
    println!("Time: {elapsed:.4} s");
    println!("Throughput: {:.2} pixels/s", pixels / elapsed.max(f64::EPSILON));
    println!("Verified: {}/{instances}", total.count);
    total.print_report();
    Ok(())
}
