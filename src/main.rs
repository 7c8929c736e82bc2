// Demo binary - runs a combiner against synthetic producers
//
// One producer thread per weight pushes tagged values as fast as its input accepts them while the
// main thread consumes with `poll_timeout`. When the run ends (duration elapsed or Ctrl+C) the
// draw share of every input is printed next to its expected share, followed by the stats snapshot.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;
use weighted_combiner::{Combiner, CombinerInput};

/// Command-line options parsed from program arguments.
struct CliOptions {
    /// How long to consume before shutting down
    duration: Duration,
    /// One producer per weight
    weights: Vec<f64>,
}

impl Default for CliOptions {
    fn default() -> Self {
        Self {
            duration: Duration::from_secs(2),
            weights: vec![8.0, 2.0],
        }
    }
}

fn parse_weights(value: &str) -> Result<Vec<f64>, String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(|item| {
            item.parse::<f64>()
                .map_err(|err| format!("invalid weight '{item}': {err}"))
        })
        .collect()
}

fn apply_option(options: &mut CliOptions, key: &str, value: &str) -> Result<(), String> {
    match key {
        "--duration" => {
            let millis = value
                .parse::<u64>()
                .map_err(|err| format!("invalid --duration '{value}': {err}"))?;
            options.duration = Duration::from_millis(millis);
        }
        "--inputs" => {
            options.weights = parse_weights(value)?;
        }
        _ => return Err(format!("unknown option {key}")),
    }
    Ok(())
}

/// Parse command-line arguments into `CliOptions`.
///
/// Accepts `--key=value` and `--key value` for:
/// - `--duration <ms>`: run length in milliseconds (default 2000)
/// - `--inputs <w1,w2,...>`: producer weights (default 8,2)
fn parse_cli_options() -> Result<CliOptions, String> {
    let mut options = CliOptions::default();
    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        if let Some((key, value)) = arg.split_once('=') {
            apply_option(&mut options, key, value)?;
        } else {
            let value = args
                .next()
                .ok_or_else(|| format!("missing value for {arg}"))?;
            apply_option(&mut options, &arg, &value)?;
        }
    }
    if options.weights.is_empty() {
        return Err("--inputs needs at least one weight".to_string());
    }
    Ok(options)
}

fn spawn_producer(
    index: usize,
    input: CombinerInput<(usize, u64)>,
) -> std::io::Result<std::thread::JoinHandle<u64>> {
    std::thread::Builder::new()
        .name(format!("Producer-{index}"))
        .spawn(move || {
            let mut sent = 0u64;
            while input.push((index, sent)).is_ok() {
                sent += 1;
            }
            sent
        })
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let options = parse_cli_options()?;
    let combiner = Combiner::new();
    combiner.start()?;

    // Producers keep their inputs busy, so the timeout only matters if one stalls.
    let idle_timeout = options.duration + Duration::from_secs(1);
    let inputs: Vec<CombinerInput<(usize, u64)>> = options
        .weights
        .iter()
        .map(|&weight| combiner.try_add_input(weight, idle_timeout))
        .collect::<Result<_, _>>()?;

    let mut producers = Vec::with_capacity(inputs.len());
    for (index, input) in inputs.iter().enumerate() {
        producers.push(spawn_producer(index, input.clone())?);
    }

    let shutdown_flag = Arc::new(AtomicBool::new(false));
    let shutdown_flag_clone = shutdown_flag.clone();
    ctrlc::set_handler(move || {
        shutdown_flag_clone.store(true, Ordering::Relaxed);
    })?;

    let mut draws = vec![0u64; inputs.len()];
    let deadline = Instant::now() + options.duration;
    while Instant::now() < deadline && !shutdown_flag.load(Ordering::Relaxed) {
        if let Some((index, _)) = combiner.poll_timeout(Duration::from_millis(10)) {
            draws[index] += 1;
        }
    }

    // Removing the inputs releases producers blocked on a full buffer.
    for input in &inputs {
        input.remove();
    }
    let mut sent = Vec::with_capacity(producers.len());
    for handle in producers {
        sent.push(handle.join().unwrap_or_default());
    }
    combiner.stop();

    let total_draws: u64 = draws.iter().sum();
    let total_weight: f64 = options.weights.iter().sum();
    println!("input  weight  pushed  drawn  share  expected");
    for (index, weight) in options.weights.iter().enumerate() {
        let share = if total_draws == 0 {
            0.0
        } else {
            draws[index] as f64 / total_draws as f64
        };
        let expected = if total_weight > 0.0 {
            weight / total_weight
        } else {
            1.0 / options.weights.len() as f64
        };
        println!(
            "{index:>5}  {weight:>6.2}  {:>6}  {:>5}  {share:>5.3}  {expected:>8.3}",
            sent[index], draws[index]
        );
    }
    println!("{}", serde_json::to_string_pretty(&combiner.stats())?);

    Ok(())
}
