use ndarray::ArrayView3;

use crate::shared::region::Region;

/// A decoded still image: contiguous RGB bytes in row-major order.
///
/// Decoding happens at the byte boundary only (see `image_decoder`); the
/// coordinators and capabilities treat pixel data as opaque.
#[derive(Clone, Debug, PartialEq)]
pub struct Frame {
    data: Vec<u8>,
    width: u32,
    height: u32,
    channels: u8,
}

impl Frame {
    pub fn new(data: Vec<u8>, width: u32, height: u32, channels: u8) -> Self {
        debug_assert_eq!(
            data.len(),
            (width as usize) * (height as usize) * (channels as usize),
            "data length must equal width * height * channels"
        );
        Self {
            data,
            width,
            height,
            channels,
        }
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn channels(&self) -> u8 {
        self.channels
    }

    pub fn as_ndarray(&self) -> ArrayView3<'_, u8> {
        ArrayView3::from_shape(self.shape(), &self.data)
            .expect("Frame data length must match dimensions")
    }

    /// Copies the pixels covered by `region`, clamped to the frame bounds.
    ///
    /// Returns `None` when the clamped region is empty.
    pub fn crop(&self, region: &Region) -> Option<Frame> {
        let clamped = region.clamped(self.width, self.height)?;
        let x = clamped.x as usize;
        let y = clamped.y as usize;
        let w = clamped.width as usize;
        let h = clamped.height as usize;
        let channels = self.channels as usize;
        let stride = self.width as usize * channels;

        let mut data = Vec::with_capacity(w * h * channels);
        for row in y..y + h {
            let start = row * stride + x * channels;
            data.extend_from_slice(&self.data[start..start + w * channels]);
        }
        Some(Frame::new(data, w as u32, h as u32, self.channels))
    }

    /// Nearest-neighbor resize sampling each target pixel at its center.
    pub fn resize(&self, width: u32, height: u32) -> Frame {
        if width == self.width && height == self.height {
            return self.clone();
        }
        let src_w = self.width as usize;
        let src_h = self.height as usize;
        let dst_w = width as usize;
        let dst_h = height as usize;
        let channels = self.channels as usize;

        let mut data = Vec::with_capacity(dst_w * dst_h * channels);
        for y in 0..dst_h {
            let src_y = (((y as f64 + 0.5) * src_h as f64 / dst_h as f64) as usize).min(src_h - 1);
            for x in 0..dst_w {
                let src_x =
                    (((x as f64 + 0.5) * src_w as f64 / dst_w as f64) as usize).min(src_w - 1);
                let offset = (src_y * src_w + src_x) * channels;
                data.extend_from_slice(&self.data[offset..offset + channels]);
            }
        }
        Frame::new(data, width, height, self.channels)
    }

    fn shape(&self) -> (usize, usize, usize) {
        (
            self.height as usize,
            self.width as usize,
            self.channels as usize,
        )
    }
}
