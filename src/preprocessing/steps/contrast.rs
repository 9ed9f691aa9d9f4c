use crate::error::OcrError;
use image::{DynamicImage, GrayImage, Luma};

/// Tile grid used for local equalization (8x8, both axes)
const TILE_GRID: u32 = 8;

/// Contrast-limited adaptive histogram equalization.
///
/// The image is split into an 8x8 tile grid; each tile gets its own
/// clip-limited equalization mapping, and pixels are remapped by bilinear
/// interpolation between the four surrounding tile mappings to avoid visible
/// tile seams. `clip_limit` bounds how much any single intensity bin may
/// contribute, which keeps near-uniform paper regions from being blown up
/// into noise.
pub fn clahe(image: &DynamicImage, clip_limit: f32) -> Result<DynamicImage, OcrError> {
    let gray = image.to_luma8();
    let (width, height) = gray.dimensions();
    if width < TILE_GRID || height < TILE_GRID {
        return Err(OcrError::Internal(format!(
            "image {}x{} smaller than tile grid",
            width, height
        )));
    }

    let grid = TILE_GRID as usize;
    // Even partition: tile t spans [t*dim/8, (t+1)*dim/8), never empty for
    // dimensions of at least the grid size
    let x_bound = |t: usize| t as u32 * width / TILE_GRID;
    let y_bound = |t: usize| t as u32 * height / TILE_GRID;

    // One 256-entry lookup table per tile
    let mut luts = vec![[0u8; 256]; grid * grid];
    for ty in 0..grid {
        for tx in 0..grid {
            let x0 = x_bound(tx);
            let y0 = y_bound(ty);
            let x1 = x_bound(tx + 1);
            let y1 = y_bound(ty + 1);

            let mut hist = [0u32; 256];
            for y in y0..y1 {
                for x in x0..x1 {
                    hist[gray.get_pixel(x, y).0[0] as usize] += 1;
                }
            }

            let tile_pixels = ((x1 - x0) * (y1 - y0)) as u32;
            clip_histogram(&mut hist, clip_limit, tile_pixels);

            // Cumulative distribution scaled to the full 0-255 range
            let mut cdf = 0u32;
            let lut = &mut luts[ty * grid + tx];
            for (value, count) in hist.iter().enumerate() {
                cdf += count;
                lut[value] = ((cdf as u64 * 255) / tile_pixels as u64) as u8;
            }
        }
    }

    let last = (grid - 1) as f32;
    let enhanced = GrayImage::from_fn(width, height, |x, y| {
        let value = gray.get_pixel(x, y).0[0] as usize;

        // Position in tile-center coordinates
        let gx = ((x as f32 + 0.5) * TILE_GRID as f32 / width as f32 - 0.5).clamp(0.0, last);
        let gy = ((y as f32 + 0.5) * TILE_GRID as f32 / height as f32 - 0.5).clamp(0.0, last);

        let tx0 = gx.floor() as usize;
        let ty0 = gy.floor() as usize;
        let tx1 = (tx0 + 1).min(grid - 1);
        let ty1 = (ty0 + 1).min(grid - 1);
        let fx = gx - tx0 as f32;
        let fy = gy - ty0 as f32;

        let top = luts[ty0 * grid + tx0][value] as f32 * (1.0 - fx)
            + luts[ty0 * grid + tx1][value] as f32 * fx;
        let bottom = luts[ty1 * grid + tx0][value] as f32 * (1.0 - fx)
            + luts[ty1 * grid + tx1][value] as f32 * fx;
        let mapped = top * (1.0 - fy) + bottom * fy;

        Luma([mapped.round().clamp(0.0, 255.0) as u8])
    });

    Ok(DynamicImage::ImageLuma8(enhanced))
}

/// Clip each histogram bin at `clip_limit` times the uniform bin height and
/// spread the clipped excess evenly over all bins.
fn clip_histogram(hist: &mut [u32; 256], clip_limit: f32, tile_pixels: u32) {
    let limit = ((clip_limit * tile_pixels as f32 / 256.0) as u32).max(1);

    let mut excess = 0u32;
    for count in hist.iter_mut() {
        if *count > limit {
            excess += *count - limit;
            *count = limit;
        }
    }

    let bump = excess / 256;
    for count in hist.iter_mut() {
        *count += bump;
    }

    // Spread the residual across the whole range rather than piling it onto
    // the low bins, which would skew the CDF
    let mut residual = (excess % 256) as usize;
    if residual > 0 {
        let step = (256 / residual).max(1);
        let mut i = 0;
        while residual > 0 && i < 256 {
            hist[i] += 1;
            residual -= 1;
            i += step;
        }
    }
}
