use clap::Args;
use std::fs;
use std::path::{Path, PathBuf};

use crate::batch::Summary;
use crate::stack;

#[derive(Args, Clone)]
pub struct NormaliseArgs {
    /// Directory of 3-plane stacks produced by denoise
    #[arg(long)]
    pub input: String,
    /// Output directory (default: <input>/normalised); must not already exist
    #[arg(long)]
    pub output: Option<String>,
    /// Maximum signal value across the dataset after noise removal, used as
    /// the normalisation reference
    #[arg(long)]
    pub max_signal: f32,
}

pub fn run(
    args: NormaliseArgs,
    progress: impl Fn(f64, &str),
) -> Result<(), Box<dyn std::error::Error>> {
    let input = Path::new(&args.input);
    if !input.is_dir() {
        return Err(format!("Input directory not found: {}", input.display()).into());
    }
    if !args.max_signal.is_finite() || args.max_signal <= 0.0 {
        return Err(format!(
            "Reference maximum must be a positive finite value, got {}",
            args.max_signal
        )
        .into());
    }

    let output = args
        .output
        .as_ref()
        .map(PathBuf::from)
        .unwrap_or_else(|| input.join("normalised"));
    fs::create_dir(&output)
        .map_err(|e| format!("Cannot create {}: {}", output.display(), e))?;

    let (files, skipped) = stack::tiff_files(input)?;
    let total = files.len();
    eprintln!("Found {} TIFF(s) in {}", total, input.display());

    let mut summary = Summary::default();
    summary.skipped = skipped;

    for (i, (name, path)) in files.iter().enumerate() {
        match normalise_one(path, &output.join(name), args.max_signal) {
            Ok(()) => summary.ok(),
            Err(e) => summary.fail(name, e),
        }
        if total > 0 {
            progress(
                (i + 1) as f64 / total as f64,
                &format!("Normalising {}/{}", i + 1, total),
            );
        }
    }

    progress(1.0, &format!("Wrote {}", output.display()));
    summary.finish("normalise")
}

fn normalise_one(path: &Path, out_path: &Path, m: f32) -> Result<(), Box<dyn std::error::Error>> {
    let planes = stack::read_stack(path)?;
    if planes.len() < 3 {
        return Err(format!("Expected 3 planes, found {}", planes.len()).into());
    }
    let bacteria = &planes[0];
    let signal = &planes[1];
    let mask = &planes[2];

    let bact_max = bacteria.iter().cloned().fold(f32::NEG_INFINITY, f32::max);
    if bact_max == 0.0 {
        return Err("bacteria channel maximum is 0".into());
    }

    // bacteria truncates, signal rounds, mask is cast straight through;
    // all three casts saturate at the u8 range
    let (h, w) = bacteria.dim();
    let mut rgb = image::RgbImage::new(w as u32, h as u32);
    for y in 0..h {
        for x in 0..w {
            let r = (bacteria[[y, x]] / bact_max * 255.0) as u8;
            let g = (signal[[y, x]] / m * 255.0).round() as u8;
            let b = mask[[y, x]] as u8;
            rgb.put_pixel(x as u32, y as u32, image::Rgb([r, g, b]));
        }
    }
    rgb.save(out_path)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array2;

    fn args_for(dir: &Path, m: f32) -> NormaliseArgs {
        NormaliseArgs {
            input: dir.to_string_lossy().into_owned(),
            output: None,
            max_signal: m,
        }
    }

    fn write_input(dir: &Path, name: &str, bacteria: &Array2<f32>, signal: &Array2<f32>, mask: &Array2<f32>) {
        stack::write_stack_f32(&dir.join(name), &[bacteria, signal, mask]).unwrap();
    }

    #[test]
    fn channel_maxima_map_to_255() {
        let dir = tempfile::tempdir().unwrap();
        let bacteria = Array2::from_shape_fn((4, 4), |(y, x)| (y * 4 + x) as f32 * 50.0);
        let signal = Array2::from_shape_fn((4, 4), |(y, x)| (y * 4 + x) as f32);
        let mask = Array2::from_elem((4, 4), 1.0f32);
        write_input(dir.path(), "cell.tif", &bacteria, &signal, &mask);

        // reference equals the signal's own maximum
        run(args_for(dir.path(), 15.0), |_, _| {}).unwrap();

        let img = image::open(dir.path().join("normalised").join("cell.tif"))
            .unwrap()
            .to_rgb8();
        let r_max = img.pixels().map(|p| p.0[0]).max().unwrap();
        let g_max = img.pixels().map(|p| p.0[1]).max().unwrap();
        assert_eq!(r_max, 255);
        assert_eq!(g_max, 255);
        assert!(img.pixels().all(|p| p.0[2] == 1));
    }

    #[test]
    fn signal_rounds_but_bacteria_truncates() {
        let dir = tempfile::tempdir().unwrap();
        // 1.9 / 2.0 * 255 = 242.25 -> bacteria 242; signal max 2.0/2.0 -> 255
        let bacteria = Array2::from_shape_vec((1, 2), vec![1.9f32, 2.0]).unwrap();
        // 1.99 / 2.0 * 255 = 253.725 -> rounds to 254, truncation would give 253
        let signal = Array2::from_shape_vec((1, 2), vec![1.99f32, 2.0]).unwrap();
        let mask = Array2::from_elem((1, 2), 0.0f32);
        write_input(dir.path(), "cell.tif", &bacteria, &signal, &mask);

        run(args_for(dir.path(), 2.0), |_, _| {}).unwrap();

        let img = image::open(dir.path().join("normalised").join("cell.tif"))
            .unwrap()
            .to_rgb8();
        assert_eq!(img.get_pixel(0, 0).0[0], 242);
        assert_eq!(img.get_pixel(0, 0).0[1], 254);
    }

    #[test]
    fn all_black_bacteria_channel_is_a_reported_failure() {
        let dir = tempfile::tempdir().unwrap();
        let zeros = Array2::from_elem((4, 4), 0.0f32);
        let signal = Array2::from_elem((4, 4), 1.0f32);
        write_input(dir.path(), "black.tif", &zeros, &signal, &zeros);

        let err = run(args_for(dir.path(), 10.0), |_, _| {}).unwrap_err();
        assert_eq!(err.to_string(), "1 file(s) failed");
        assert!(!dir.path().join("normalised").join("black.tif").exists());
    }

    #[test]
    fn negative_band_pass_residues_clamp_to_zero() {
        let dir = tempfile::tempdir().unwrap();
        let bacteria = Array2::from_elem((2, 2), 5.0f32);
        let signal = Array2::from_shape_vec((2, 2), vec![-3.0f32, 0.0, 1.0, 2.0]).unwrap();
        let mask = Array2::from_elem((2, 2), 0.0f32);
        write_input(dir.path(), "cell.tif", &bacteria, &signal, &mask);

        run(args_for(dir.path(), 2.0), |_, _| {}).unwrap();

        let img = image::open(dir.path().join("normalised").join("cell.tif"))
            .unwrap()
            .to_rgb8();
        assert_eq!(img.get_pixel(0, 0).0[1], 0);
        assert_eq!(img.get_pixel(1, 1).0[1], 255);
    }

    #[test]
    fn nonpositive_reference_maximum_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let err = run(args_for(dir.path(), 0.0), |_, _| {}).unwrap_err();
        assert!(err.to_string().contains("Reference maximum"));
    }
}
