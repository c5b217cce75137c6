//! Visual-code seams — turning wire text into a raster and showing it.
//!
//! The optical channel itself (a scannable symbology, a window on screen)
//! lives outside burrow. These traits are where it plugs in.

use std::sync::Arc;

use bytes::Bytes;

/// A fixed-size 8-bit grayscale image, row-major.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Raster {
    pub width: u32,
    pub height: u32,
    pub pixels: Bytes,
}

impl Raster {
    pub fn pixel(&self, x: u32, y: u32) -> Option<u8> {
        if x >= self.width || y >= self.height {
            return None;
        }
        self.pixels.get((y * self.width + x) as usize).copied()
    }
}

/// One frame ready for playback: its index, wire text, and rendered symbol.
#[derive(Debug, Clone)]
pub struct GeneratedFrame {
    pub index: u32,
    pub wire: Arc<str>,
    pub symbol: Arc<Raster>,
}

#[derive(Debug, thiserror::Error)]
pub enum SymbolError {
    #[error("{bits} bits do not fit a {size}px symbol")]
    TooLarge { bits: usize, size: u32 },
}

/// Renders wire text into a symbol image. Must be deterministic: the same
/// text always yields the same raster, so results may be cached.
pub trait SymbolEncoder: Send + Sync + 'static {
    fn encode(&self, wire: &str) -> Result<Raster, SymbolError>;
}

/// Displays a frame. Called from the playback loop on every tick that has
/// a frame available; must return promptly.
pub trait Renderer: Send + Sync + 'static {
    fn render(&self, frame: &GeneratedFrame);
}

/// Lays the wire bits out as a square grid of black/white modules scaled
/// to `size` pixels. Not a standard symbology; stands in for one in
/// headless runs.
#[derive(Debug, Clone, Copy)]
pub struct BitmapEncoder {
    pub size: u32,
}

impl BitmapEncoder {
    pub fn new(size: u32) -> Self {
        Self { size }
    }
}

impl SymbolEncoder for BitmapEncoder {
    fn encode(&self, wire: &str) -> Result<Raster, SymbolError> {
        let bits = wire.len() * 8;
        let modules = (bits as f64).sqrt().ceil().max(1.0) as u32;
        if modules > self.size {
            return Err(SymbolError::TooLarge {
                bits,
                size: self.size,
            });
        }
        let scale = self.size / modules;
        let bytes = wire.as_bytes();

        let mut pixels = vec![255u8; (self.size * self.size) as usize];
        for y in 0..self.size {
            let my = y / scale;
            if my >= modules {
                continue;
            }
            for x in 0..self.size {
                let mx = x / scale;
                if mx >= modules {
                    continue;
                }
                let bit = (my * modules + mx) as usize;
                let set = bytes
                    .get(bit / 8)
                    .is_some_and(|b| b & (0x80 >> (bit % 8)) != 0);
                if set {
                    pixels[(y * self.size + x) as usize] = 0;
                }
            }
        }

        Ok(Raster {
            width: self.size,
            height: self.size,
            pixels: Bytes::from(pixels),
        })
    }
}
