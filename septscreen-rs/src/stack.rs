use ndarray::Array2;
use std::fs;
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use tiff::decoder::{Decoder, DecodingResult};
use tiff::encoder::{colortype::Gray32Float, TiffEncoder};

/// Decode a multi-page grayscale TIFF into f32 planes, one per page,
/// in page order. All pages must share the same dimensions.
pub fn read_stack(path: &Path) -> Result<Vec<Array2<f32>>, Box<dyn std::error::Error>> {
    let file = fs::File::open(path)?;
    let mut decoder = Decoder::new(file)?;
    let mut planes: Vec<Array2<f32>> = Vec::new();

    loop {
        let (width, height) = decoder.dimensions()?;
        let data: Vec<f32> = match decoder.read_image()? {
            DecodingResult::U8(v) => v.into_iter().map(|p| p as f32).collect(),
            DecodingResult::U16(v) => v.into_iter().map(|p| p as f32).collect(),
            DecodingResult::U32(v) => v.into_iter().map(|p| p as f32).collect(),
            DecodingResult::F32(v) => v,
            DecodingResult::F64(v) => v.into_iter().map(|p| p as f32).collect(),
            _ => return Err("Unsupported TIFF sample format (need unsigned int or float)".into()),
        };
        let plane = Array2::from_shape_vec((height as usize, width as usize), data)?;
        if let Some(first) = planes.first() {
            if first.dim() != plane.dim() {
                return Err(format!(
                    "Page {} is {}x{} but page 0 is {}x{}",
                    planes.len(),
                    plane.dim().1,
                    plane.dim().0,
                    first.dim().1,
                    first.dim().0
                )
                .into());
            }
        }
        planes.push(plane);

        if !decoder.more_images() {
            break;
        }
        decoder.next_image()?;
    }

    Ok(planes)
}

/// Write f32 planes as a multi-page Gray32Float TIFF, one page per plane.
pub fn write_stack_f32(
    path: &Path,
    planes: &[&Array2<f32>],
) -> Result<(), Box<dyn std::error::Error>> {
    let file = fs::File::create(path)?;
    let mut writer = BufWriter::new(file);
    let mut encoder = TiffEncoder::new(&mut writer)?;
    for plane in planes {
        let (height, width) = plane.dim();
        let data: Vec<f32> = plane.iter().copied().collect();
        encoder.write_image::<Gray32Float>(width as u32, height as u32, &data)?;
    }
    Ok(())
}

/// Regular files in `dir` whose name contains "tif", sorted by name.
/// The filter is a substring match, not an extension check. The second
/// value counts the entries that were filtered out.
pub fn tiff_files(dir: &Path) -> Result<(Vec<(String, PathBuf)>, usize), Box<dyn std::error::Error>> {
    let mut files = Vec::new();
    let mut skipped = 0usize;
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }
        let name = entry.file_name().to_string_lossy().into_owned();
        if name.contains("tif") {
            files.push((name, entry.path()));
        } else {
            skipped += 1;
        }
    }
    files.sort();
    Ok((files, skipped))
}
