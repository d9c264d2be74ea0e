//! Single-shot decode over a still image, with an optional crop.
//!
//! Selections arrive in on-screen coordinates (the image as displayed), so
//! they are scaled to natural pixels before cropping. Tiny selections count
//! as "no selection" because a click without a drag still produces one.

use serde::{Deserialize, Serialize};

use crate::error::DecodeError;
use crate::payload::RawPayload;

/// Selections narrower or shorter than this (on screen) decode the whole image.
pub const MIN_SELECTION_PX: f64 = 4.0;

/// The injected pixels → text primitive.
pub trait FrameDecoder: Send + Sync {
    /// Returns the first payload found in `frame`.
    fn decode(&self, frame: &Raster) -> Result<RawPayload, DecodeError>;
}

/// An RGBA8 pixel buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Raster {
    width: u32,
    height: u32,
    pixels: Vec<u8>,
}

impl Raster {
    pub fn new(width: u32, height: u32, pixels: Vec<u8>) -> Result<Self, DecodeError> {
        let expected = (width as usize)
            .checked_mul(height as usize)
            .and_then(|n| n.checked_mul(4))
            .ok_or_else(|| DecodeError::MalformedImage("dimensions overflow".to_string()))?;
        if pixels.len() != expected {
            return Err(DecodeError::MalformedImage(format!(
                "expected {} bytes for {}x{}, got {}",
                expected,
                width,
                height,
                pixels.len()
            )));
        }
        Ok(Self {
            width,
            height,
            pixels,
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    /// Copies `rect` into a new raster. `rect` must lie inside the image.
    pub fn crop(&self, rect: PixelRect) -> Result<Raster, DecodeError> {
        if rect.width == 0 || rect.height == 0 {
            return Err(DecodeError::EmptyRegion);
        }
        let fits_x = rect.x.checked_add(rect.width).is_some_and(|end| end <= self.width);
        let fits_y = rect.y.checked_add(rect.height).is_some_and(|end| end <= self.height);
        if !fits_x || !fits_y {
            return Err(DecodeError::MalformedImage(format!(
                "crop {:?} outside {}x{}",
                rect, self.width, self.height
            )));
        }

        let stride = self.width as usize * 4;
        let row_bytes = rect.width as usize * 4;
        let mut pixels = Vec::with_capacity(row_bytes * rect.height as usize);
        for row in rect.y..rect.y + rect.height {
            let start = row as usize * stride + rect.x as usize * 4;
            pixels.extend_from_slice(&self.pixels[start..start + row_bytes]);
        }
        Raster::new(rect.width, rect.height, pixels)
    }
}

/// A rectangle in natural image pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PixelRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

/// A drag rectangle in on-screen coordinates. Width and height are negative
/// when the drag went up or left.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Selection {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Selection {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn is_meaningful(&self) -> bool {
        self.width.abs() >= MIN_SELECTION_PX && self.height.abs() >= MIN_SELECTION_PX
    }

    /// Top-left corner with positive extents.
    pub fn normalized(&self) -> Selection {
        Selection {
            x: self.x.min(self.x + self.width),
            y: self.y.min(self.y + self.height),
            width: self.width.abs(),
            height: self.height.abs(),
        }
    }
}

/// Size at which the image is currently displayed.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DisplaySize {
    pub width: f64,
    pub height: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeRegion {
    Whole,
    Crop(PixelRect),
}

/// Maps an on-screen selection onto the natural pixels of `image`.
pub fn decode_region(
    image: &Raster,
    display: DisplaySize,
    selection: Option<Selection>,
) -> Result<DecodeRegion, DecodeError> {
    let selection = match selection {
        Some(selection) if selection.is_meaningful() => selection.normalized(),
        _ => return Ok(DecodeRegion::Whole),
    };

    // An undisplayed image has no usable scale; treat it as 1:1.
    let scale_x = scale(image.width(), display.width);
    let scale_y = scale(image.height(), display.height);

    let left = clamp_px(selection.x * scale_x, image.width());
    let top = clamp_px(selection.y * scale_y, image.height());
    let right = clamp_px((selection.x + selection.width) * scale_x, image.width());
    let bottom = clamp_px((selection.y + selection.height) * scale_y, image.height());

    if right <= left || bottom <= top {
        return Err(DecodeError::EmptyRegion);
    }

    Ok(DecodeRegion::Crop(PixelRect {
        x: left,
        y: top,
        width: right - left,
        height: bottom - top,
    }))
}

fn scale(natural: u32, displayed: f64) -> f64 {
    if displayed.is_finite() && displayed > 0.0 {
        natural as f64 / displayed
    } else {
        1.0
    }
}

fn clamp_px(value: f64, limit: u32) -> u32 {
    if !value.is_finite() {
        return 0;
    }
    value.round().clamp(0.0, limit as f64) as u32
}

/// Holds one loaded image and decodes it on request.
pub struct SnapshotDecodeSession<F: FrameDecoder> {
    decoder: F,
    image: Option<(Raster, DisplaySize)>,
}

impl<F: FrameDecoder> SnapshotDecodeSession<F> {
    pub fn new(decoder: F) -> Self {
        Self {
            decoder,
            image: None,
        }
    }

    /// Replaces the current image.
    pub fn load(&mut self, image: Raster, display: DisplaySize) {
        self.image = Some((image, display));
    }

    pub fn clear(&mut self) {
        self.image = None;
    }

    pub fn has_image(&self) -> bool {
        self.image.is_some()
    }

    /// Decodes the whole image, or just the selected part of it.
    pub fn decode(&self, selection: Option<Selection>) -> Result<RawPayload, DecodeError> {
        let (image, display) = self.image.as_ref().ok_or(DecodeError::NoImage)?;

        let payload = match decode_region(image, *display, selection)? {
            DecodeRegion::Whole => self.decoder.decode(image)?,
            DecodeRegion::Crop(rect) => {
                tracing::debug!(?rect, "Decoding cropped region");
                self.decoder.decode(&image.crop(rect)?)?
            }
        };

        if payload.trim().is_empty() {
            return Err(DecodeError::NotFound);
        }
        Ok(payload)
    }
}
