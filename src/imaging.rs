use anyhow::{Context, Result};
use std::io::Cursor;

/// Uncompressed 8-bit RGBA pixels as the system clipboard hands them out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawImage {
    pub width: usize,
    pub height: usize,
    pub rgba: Vec<u8>,
}

impl RawImage {
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0 || self.rgba.is_empty()
    }
}

pub fn encode_png(image: &RawImage) -> Result<Vec<u8>> {
    let expected = image
        .width
        .checked_mul(image.height)
        .and_then(|pixels| pixels.checked_mul(4))
        .with_context(|| format!("image size {}x{} overflows", image.width, image.height))?;
    anyhow::ensure!(
        image.rgba.len() == expected,
        "image buffer is {} bytes, expected {expected} for {}x{}",
        image.rgba.len(),
        image.width,
        image.height
    );
    let width = u32::try_from(image.width).context("image too wide")?;
    let height = u32::try_from(image.height).context("image too tall")?;

    let mut out = Vec::new();
    let mut encoder = png::Encoder::new(&mut out, width, height);
    encoder.set_color(png::ColorType::Rgba);
    encoder.set_depth(png::BitDepth::Eight);
    let mut writer = encoder.write_header().context("write png header")?;
    writer
        .write_image_data(&image.rgba)
        .context("encode png data")?;
    writer.finish().context("finish png")?;
    Ok(out)
}

pub fn decode_png(bytes: &[u8]) -> Result<RawImage> {
    let mut decoder = png::Decoder::new(Cursor::new(bytes));
    decoder.set_transformations(png::Transformations::EXPAND | png::Transformations::STRIP_16);
    let mut reader = decoder.read_info().context("read png header")?;
    let mut buf = vec![0u8; reader.output_buffer_size()];
    let info = reader.next_frame(&mut buf).context("decode png frame")?;
    buf.truncate(info.buffer_size());

    let rgba = match info.color_type {
        png::ColorType::Rgba => buf,
        png::ColorType::Rgb => buf
            .chunks_exact(3)
            .flat_map(|px| [px[0], px[1], px[2], 255])
            .collect(),
        png::ColorType::GrayscaleAlpha => buf
            .chunks_exact(2)
            .flat_map(|px| [px[0], px[0], px[0], px[1]])
            .collect(),
        png::ColorType::Grayscale => buf.iter().flat_map(|&v| [v, v, v, 255]).collect(),
        other => anyhow::bail!("unsupported png color type {other:?}"),
    };
    Ok(RawImage {
        width: info.width as usize,
        height: info.height as usize,
        rgba,
    })
}

/// Reads only the header.
pub fn png_dimensions(bytes: &[u8]) -> Result<(u32, u32)> {
    let decoder = png::Decoder::new(Cursor::new(bytes));
    let reader = decoder.read_info().context("read png header")?;
    let info = reader.info();
    Ok((info.width, info.height))
}
