use std::time::{Duration, Instant};

use ndarray::Array2;
use rand::{rngs::StdRng, Rng, SeedableRng};
use squeak::{disqueak, InvokerOptions, KernelFn, RunConfig};
use tracing_subscriber::EnvFilter;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    // Three Gaussian-ish blobs in 5 dimensions.
    let mut rng = StdRng::seed_from_u64(1);
    let n = 6000;
    let points = Array2::from_shape_fn((n, 5), |(i, j)| {
        let center = (i % 3) as f64 * 3.0 * if j % 2 == 0 { 1.0 } else { -1.0 };
        center + rng.random_range(-1.0..1.0)
    });

    let config = RunConfig::new()
        .with_max_dict_size(500)
        .with_target_copies(8)
        .with_regularization(1.0)
        .with_precision(0.1)
        .with_kernel(KernelFn::rbf_with_sigma(2.0))
        .with_invoker(InvokerOptions::pool(0))
        .with_poll_interval(Duration::from_millis(20));

    let start = Instant::now();
    let dict = disqueak(points.view(), &config, 42)?;
    println!(
        "kept {} of {} points ({} copies) in {:?}",
        dict.len(),
        n,
        dict.total_copies(),
        start.elapsed()
    );
    Ok(())
}
