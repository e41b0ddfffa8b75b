use ndarray::Array2;
use rand::{rngs::StdRng, Rng, SeedableRng};
use squeak::{squeak, KernelFn, RunConfig};
use tracing_subscriber::EnvFilter;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // RUST_LOG=squeak=debug shows every dispatched merge.
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    // 1000 points on a noisy line through the plane: a linear kernel of rank 2.
    let mut rng = StdRng::seed_from_u64(0);
    let points = Array2::from_shape_fn((1000, 2), |(i, j)| {
        let t = i as f64 / 1000.0;
        let noise = rng.random_range(-0.05..0.05);
        if j == 0 {
            t + noise
        } else {
            2.0 * t - 1.0 + noise
        }
    });

    let config = RunConfig::new()
        .with_max_dict_size(200)
        .with_target_copies(10)
        .with_regularization(0.1)
        .with_precision(0.05)
        .with_kernel(KernelFn::Linear);

    let dict = squeak(points.view(), &config, 42)?;

    println!("kept {} of {} points", dict.len(), points.nrows());
    println!("total copies: {}", dict.total_copies());
    let weights = dict.weights();
    for (i, (row, w)) in dict.points().rows().into_iter().zip(weights.iter()).enumerate().take(5) {
        println!("  atom {i}: ({:.3}, {:.3}) weight {w:.3}", row[0], row[1]);
    }
    Ok(())
}
