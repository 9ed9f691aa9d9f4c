use crate::error::OcrError;
use image::{DynamicImage, GrayImage, Luma};
use imageproc::distance_transform::Norm;
use imageproc::morphology::{dilate, erode};

/// Minimum connected-component area (in pixels) kept by the speck filter
const MIN_COMPONENT_AREA: usize = 50;

/// Morphological closing of dark strokes (3x3 structuring element).
///
/// Handwriting binarization often fragments a stroke into disconnected
/// pieces; closing bridges single-pixel gaps so engines see whole letters.
pub fn close_strokes(image: &DynamicImage) -> Result<DynamicImage, OcrError> {
    let gray = image.to_luma8();
    // imageproc morphology treats white as foreground, our ink is black
    let ink = invert(&gray);
    let closed = erode(&dilate(&ink, Norm::LInf, 1), Norm::LInf, 1);
    Ok(DynamicImage::ImageLuma8(invert(&closed)))
}

/// Drop connected ink components smaller than the area threshold.
/// Specks this small are sensor noise or paper grain, not pen strokes.
pub fn remove_specks(image: &DynamicImage) -> Result<DynamicImage, OcrError> {
    let gray = image.to_luma8();
    let (width, height) = gray.dimensions();
    let w = width as usize;
    let h = height as usize;

    let mut cleaned = gray.clone();
    let mut visited = vec![false; w * h];
    let mut stack = Vec::new();
    let mut component = Vec::new();

    for start_y in 0..h {
        for start_x in 0..w {
            let start = start_y * w + start_x;
            if visited[start] || gray.get_pixel(start_x as u32, start_y as u32).0[0] != 0 {
                continue;
            }

            // Flood-fill one 8-connected dark component
            component.clear();
            visited[start] = true;
            stack.push((start_x, start_y));
            while let Some((x, y)) = stack.pop() {
                component.push((x, y));
                for dy in -1i32..=1 {
                    for dx in -1i32..=1 {
                        let nx = x as i32 + dx;
                        let ny = y as i32 + dy;
                        if nx < 0 || ny < 0 || nx >= w as i32 || ny >= h as i32 {
                            continue;
                        }
                        let idx = ny as usize * w + nx as usize;
                        if !visited[idx]
                            && gray.get_pixel(nx as u32, ny as u32).0[0] == 0
                        {
                            visited[idx] = true;
                            stack.push((nx as usize, ny as usize));
                        }
                    }
                }
            }

            if component.len() < MIN_COMPONENT_AREA {
                for &(x, y) in &component {
                    cleaned.put_pixel(x as u32, y as u32, Luma([255]));
                }
            }
        }
    }

    Ok(DynamicImage::ImageLuma8(cleaned))
}

/// Light dilate-then-erode pass over the ink to smooth ragged stroke edges
/// left behind by thresholding
pub fn refine_edges(image: &DynamicImage) -> Result<DynamicImage, OcrError> {
    let gray = image.to_luma8();
    let ink = invert(&gray);
    let refined = erode(&dilate(&ink, Norm::L1, 1), Norm::L1, 1);
    Ok(DynamicImage::ImageLuma8(invert(&refined)))
}

fn invert(img: &GrayImage) -> GrayImage {
    GrayImage::from_fn(img.width(), img.height(), |x, y| {
        Luma([255 - img.get_pixel(x, y).0[0]])
    })
}
