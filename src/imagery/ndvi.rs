use crate::error::ImageryError;
use crate::utils::style::NdviRamp;
use image::{ColorType, ImageEncoder, Rgba, RgbaImage, codecs::png::PngEncoder};
use std::io::Cursor;

/// Colourise a near-infrared / red band pair into an RGBA image. Both bands
/// are row-major `width * height` buffers.
pub fn colourise(
    ramp: &NdviRamp,
    nir: &[f32],
    red: &[f32],
    width: u32,
    height: u32,
) -> Result<RgbaImage, ImageryError> {
    let expected = width as usize * height as usize;
    if nir.len() != expected || red.len() != expected {
        return Err(ImageryError::Load {
            url: "<bands>".into(),
            reason: format!(
                "band sizes {} and {} do not match {}x{}",
                nir.len(),
                red.len(),
                width,
                height
            ),
        });
    }

    let mut img = RgbaImage::new(width, height);
    for (i, (&n, &r)) in nir.iter().zip(red).enumerate() {
        let px = Rgba(ramp.classify(n, r));
        img.put_pixel(i as u32 % width, i as u32 / width, px);
    }
    Ok(img)
}

pub fn encode_png(img: &RgbaImage) -> Result<Vec<u8>, ImageryError> {
    let mut png_data = Vec::new();
    PngEncoder::new(Cursor::new(&mut png_data)).write_image(
        img.as_raw(),
        img.width(),
        img.height(),
        ColorType::Rgba8.into(),
    )?;
    Ok(png_data)
}

pub fn render_ndvi_png(
    ramp: &NdviRamp,
    nir: &[f32],
    red: &[f32],
    width: u32,
    height: u32,
) -> Result<Vec<u8>, ImageryError> {
    encode_png(&colourise(ramp, nir, red, width, height)?)
}

/// Horizontal colourbar from NDVI -1 (left) to 1 (right).
pub fn render_legend_png(ramp: &NdviRamp, width: u32, height: u32) -> Result<Vec<u8>, ImageryError> {
    let width = width.max(2);
    let height = height.max(1);
    let mut img = RgbaImage::new(width, height);
    for x in 0..width {
        let t = x as f32 / (width - 1) as f32;
        let px = Rgba(ramp.colour_at(-1.0 + 2.0 * t));
        for y in 0..height {
            img.put_pixel(x, y, px);
        }
    }
    encode_png(&img)
}
