use clap::Args;
use ndarray::Array2;
use std::fs;
use std::path::{Path, PathBuf};

use crate::batch::Summary;
use crate::filters;
use crate::stack;

#[derive(Args, Clone)]
pub struct DenoiseArgs {
    /// Directory of multi-channel TIFF stacks
    #[arg(long)]
    pub input: String,
    /// Output directory (default: <input>/denoised); must not already exist
    #[arg(long)]
    pub output: Option<String>,
    /// Channel index of the bacterial channel
    #[arg(long, default_value_t = 1)]
    pub bacteria_channel: usize,
    /// Channel index of the recruited-protein channel
    #[arg(long, default_value_t = 2)]
    pub signal_channel: usize,
    /// Channel index of the segmentation mask
    #[arg(long, default_value_t = 4)]
    pub mask_channel: usize,
    /// Gaussian kernel size, must be odd
    #[arg(long, default_value_t = 9)]
    pub gaussian_size: usize,
    /// Gaussian sigma
    #[arg(long, default_value_t = 0.5)]
    pub sigma: f32,
    /// Mean-filter radius; the window height is 2*radius+1. Increase for
    /// larger objects.
    #[arg(long, default_value_t = 30)]
    pub mean_radius: usize,
}

pub fn run(
    args: DenoiseArgs,
    progress: impl Fn(f64, &str),
) -> Result<(), Box<dyn std::error::Error>> {
    let input = Path::new(&args.input);
    if !input.is_dir() {
        return Err(format!("Input directory not found: {}", input.display()).into());
    }
    if args.gaussian_size % 2 == 0 {
        return Err(format!("Gaussian size must be odd, got {}", args.gaussian_size).into());
    }
    if !args.sigma.is_finite() || args.sigma <= 0.0 {
        return Err(format!("Sigma must be positive, got {}", args.sigma).into());
    }
    if args.mean_radius == 0 {
        return Err("Mean radius must be at least 1".into());
    }

    let output = args
        .output
        .as_ref()
        .map(PathBuf::from)
        .unwrap_or_else(|| input.join("denoised"));
    fs::create_dir(&output)
        .map_err(|e| format!("Cannot create {}: {}", output.display(), e))?;

    let gauss = filters::gaussian_kernel(args.gaussian_size, args.sigma);
    let mean = filters::mean_kernel(args.mean_radius);

    let (files, skipped) = stack::tiff_files(input)?;
    let total = files.len();
    eprintln!("Found {} TIFF(s) in {}", total, input.display());

    let mut summary = Summary::default();
    summary.skipped = skipped;

    for (i, (name, path)) in files.iter().enumerate() {
        match denoise_one(path, &output.join(name), &args, &gauss, &mean) {
            Ok(()) => summary.ok(),
            Err(e) => summary.fail(name, e),
        }
        if total > 0 {
            progress(
                (i + 1) as f64 / total as f64,
                &format!("Denoising {}/{}", i + 1, total),
            );
        }
    }

    progress(1.0, &format!("Wrote {}", output.display()));
    summary.finish("denoise")
}

fn denoise_one(
    path: &Path,
    out_path: &Path,
    args: &DenoiseArgs,
    gauss: &Array2<f32>,
    mean: &Array2<f32>,
) -> Result<(), Box<dyn std::error::Error>> {
    let planes = stack::read_stack(path)?;
    let bacteria = pick(&planes, args.bacteria_channel, "bacteria")?;
    let signal = pick(&planes, args.signal_channel, "signal")?;
    let mask = pick(&planes, args.mask_channel, "mask")?;

    let filtered = filters::band_pass(signal, gauss, mean);
    stack::write_stack_f32(out_path, &[bacteria, &filtered, mask])?;
    Ok(())
}

fn pick<'a>(
    planes: &'a [Array2<f32>],
    idx: usize,
    role: &str,
) -> Result<&'a Array2<f32>, Box<dyn std::error::Error>> {
    planes.get(idx).ok_or_else(|| {
        format!(
            "{} channel {} out of range ({} page(s) in stack)",
            role,
            idx,
            planes.len()
        )
        .into()
    })
}
