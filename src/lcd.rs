//! LCD frame conversion for the PNG dump.

use std::{fs::File, io, io::BufWriter, path::Path};

use nc1020_core::machine::LCD_BUFFER_SIZE;

pub const LCD_WIDTH: u32 = 160;
pub const LCD_HEIGHT: u32 = 80;
const BYTES_PER_ROW: usize = LCD_WIDTH as usize / 8;

/// Expand a 1bpp frame into one byte per pixel, 0xFF for a lit dot. The
/// first column carries status icons and is blanked.
pub fn expand(frame: &[u8; LCD_BUFFER_SIZE]) -> Vec<u8> {
    let mut pixels = Vec::with_capacity(LCD_BUFFER_SIZE * 8);
    for row in frame.chunks_exact(BYTES_PER_ROW) {
        let start = pixels.len();
        for &byte in row {
            for bit in (0..8).rev() {
                pixels.push(if byte & (1 << bit) != 0 { 0xFF } else { 0x00 });
            }
        }
        pixels[start] = 0;
    }
    pixels
}

/// Write the frame as an 8-bit grayscale PNG, dark dots on a light
/// background.
pub fn write_png(path: &Path, frame: &[u8; LCD_BUFFER_SIZE]) -> io::Result<()> {
    let gray: Vec<u8> = expand(frame).into_iter().map(|p| !p).collect();
    let w = BufWriter::new(File::create(path)?);
    let mut encoder = png::Encoder::new(w, LCD_WIDTH, LCD_HEIGHT);
    encoder.set_color(png::ColorType::Grayscale);
    encoder.set_depth(png::BitDepth::Eight);
    let mut writer = encoder.write_header().map_err(io::Error::other)?;
    writer.write_image_data(&gray).map_err(io::Error::other)?;
    writer.finish().map_err(io::Error::other)
}
