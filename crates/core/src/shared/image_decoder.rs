use crate::shared::frame::Frame;

/// Decodes encoded image bytes (JPEG, PNG, ...) into an RGB [`Frame`].
///
/// Alpha and grayscale inputs are converted to 3-channel RGB so every
/// downstream consumer sees the same pixel layout.
pub fn decode_image(bytes: &[u8]) -> Result<Frame, image::ImageError> {
    let rgb = image::load_from_memory(bytes)?.to_rgb8();
    let (width, height) = rgb.dimensions();
    Ok(Frame::new(rgb.into_raw(), width, height, 3))
}

#[cfg(test)]
pub(crate) fn encode_png(width: u32, height: u32, rgb: [u8; 3]) -> Vec<u8> {
    let mut img = image::RgbImage::new(width, height);
    for pixel in img.pixels_mut() {
        *pixel = image::Rgb(rgb);
    }
    let mut bytes = Vec::new();
    img.write_to(&mut std::io::Cursor::new(&mut bytes), image::ImageFormat::Png)
        .unwrap();
    bytes
}
