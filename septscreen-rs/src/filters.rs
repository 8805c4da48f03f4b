use ndarray::Array2;

/// Square Gaussian kernel on an integer grid centred at zero, the
/// fspecial('gaussian') discretisation: entries below eps relative to the
/// kernel maximum are zeroed, then the kernel is normalised to unit sum.
/// A raw sum of exactly zero leaves the kernel unnormalised.
/// `size` must be odd.
pub fn gaussian_kernel(size: usize, sigma: f32) -> Array2<f32> {
    let half = (size as isize - 1) / 2;
    let s2 = 2.0 * sigma * sigma;
    let mut h = Array2::<f32>::zeros((size, size));
    for y in 0..size {
        for x in 0..size {
            let dy = (y as isize - half) as f32;
            let dx = (x as isize - half) as f32;
            h[[y, x]] = (-(dx * dx + dy * dy) / s2).exp();
        }
    }
    let max = h.iter().cloned().fold(0.0f32, f32::max);
    let cutoff = f32::EPSILON * max;
    h.mapv_inplace(|v| if v < cutoff { 0.0 } else { v });
    let sum = h.sum();
    if sum != 0.0 {
        h.mapv_inplace(|v| v / sum);
    }
    h
}

/// Vertical mean kernel: a (2*radius+1) x 1 column of ones. The divisor is
/// height*height rather than height*width, reproducing the published
/// pipeline's numbers exactly.
pub fn mean_kernel(radius: usize) -> Array2<f32> {
    let height = 2 * radius + 1;
    Array2::from_elem((height, 1), 1.0 / (height * height) as f32)
}

/// Same-size 2-D correlation with zero padding outside the image. Both
/// kernels used here are symmetric, so this equals convolution.
pub fn correlate_same(data: &Array2<f32>, kernel: &Array2<f32>) -> Array2<f32> {
    let (h, w) = data.dim();
    let (kh, kw) = kernel.dim();
    let ry = (kh / 2) as isize;
    let rx = (kw / 2) as isize;

    let mut out = Array2::<f32>::zeros((h, w));
    for y in 0..h {
        for x in 0..w {
            let mut sum = 0.0f32;
            for ky in 0..kh {
                let sy = y as isize + ky as isize - ry;
                if sy < 0 || sy >= h as isize {
                    continue;
                }
                for kx in 0..kw {
                    let sx = x as isize + kx as isize - rx;
                    if sx < 0 || sx >= w as isize {
                        continue;
                    }
                    sum += data[[sy as usize, sx as usize]] * kernel[[ky, kx]];
                }
            }
            out[[y, x]] = sum;
        }
    }
    out
}

/// Band-pass: Gaussian low-pass minus the vertical-mean background
/// estimate. Output may be negative and is left unclipped.
pub fn band_pass(signal: &Array2<f32>, gauss: &Array2<f32>, mean: &Array2<f32>) -> Array2<f32> {
    let low = correlate_same(signal, gauss);
    let background = correlate_same(signal, mean);
    low - background
}
