// THEORY:
// The `BorderedGrid` performs the first transformation of the decoder: it turns a
// raw, row-major colour buffer into a grid of classified cells and surrounds that
// grid with a permanent one-cell ring of background.
//
// Key architectural principles:
// 1.  **Data Transformation**: Every sample is run through `Pixel::classify`
//     exactly once. After construction the grid is immutable; the tracer only
//     ever reads it.
// 2.  **No Bounds Checks**: Because of the zero border, the four neighbours of any
//     interior cell are always addressable. Walks never leave the interior (they
//     only step onto wire cells), so every lookup they make is in range.
// 3.  **Early Rejection**: Dimensions and channel layouts that cannot be
//     interpreted are rejected here, before tracing begins.

use crate::core_modules::decode_error::DecodeError;
use crate::core_modules::pixel::pixel::{Kind, Pixel, SIGNAL_BIT, WIRE_BIT};

/// Largest pixel count that keeps every pixel index and wire id inside 31 bits.
pub const MAX_PIXELS: u64 = 0x7FFF_FFFF;

/// Occupancy of the four direct neighbours of a cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Neighbours {
    pub up: bool,
    pub down: bool,
    pub left: bool,
    pub right: bool,
}

impl Neighbours {
    /// Number of occupied neighbours, 0 to 4.
    pub fn count(&self) -> u8 {
        self.up as u8 + self.down as u8 + self.left as u8 + self.right as u8
    }
}

/// A classified `width x height` grid wrapped in a one-cell zero border.
#[derive(Debug, Clone)]
pub struct BorderedGrid {
    /// The width of the image in pixels (without border).
    width: u32,
    /// The height of the image in pixels (without border).
    height: u32,
    /// Row length of `cells`, `width + 2`.
    stride: usize,
    /// `(width + 2) * (height + 2)` packed `Kind` codes.
    cells: Vec<u8>,
    /// How many interior cells are wires. Used as a wire-count hint.
    wire_pixels: usize,
}

impl BorderedGrid {
    /// Classifies a row-major frame of `channels`-byte samples (3 = RGB,
    /// 4 = RGBA with alpha ignored).
    pub fn from_frame(
        frame_buffer: &[u8],
        width: u32,
        height: u32,
        channels: usize,
    ) -> Result<Self, DecodeError> {
        if width == 0 || height == 0 {
            return Err(DecodeError::UnsupportedInput(format!(
                "image must not be empty, got {width}x{height}"
            )));
        }
        if channels != 3 && channels != 4 {
            return Err(DecodeError::UnsupportedInput(format!(
                "expected 3 or 4 channels per pixel, got {channels}"
            )));
        }
        let pixel_count = width as u64 * height as u64;
        if pixel_count > MAX_PIXELS {
            return Err(DecodeError::UnsupportedInput(format!(
                "{width}x{height} exceeds the {MAX_PIXELS} pixel limit"
            )));
        }
        let expected = pixel_count as usize * channels;
        if frame_buffer.len() != expected {
            return Err(DecodeError::UnsupportedInput(format!(
                "buffer holds {} bytes, {width}x{height}x{channels} needs {expected}",
                frame_buffer.len()
            )));
        }

        let mut grid = Self::empty(width, height);
        for (pixel_index, sample) in frame_buffer.chunks_exact(channels).enumerate() {
            let kind = Pixel::from_sample(sample).map_or(Kind::Empty, |pixel| pixel.classify());
            let x = (pixel_index % width as usize) as i32;
            let y = (pixel_index / width as usize) as i32;
            grid.set(x, y, kind);
        }
        Ok(grid)
    }

    /// Builds a grid from already classified cells, row-major.
    pub fn from_kinds(width: u32, height: u32, kinds: &[Kind]) -> Result<Self, DecodeError> {
        if width == 0 || height == 0 || width as u64 * height as u64 > MAX_PIXELS {
            return Err(DecodeError::UnsupportedInput(format!(
                "cannot build a {width}x{height} grid"
            )));
        }
        if kinds.len() != width as usize * height as usize {
            return Err(DecodeError::UnsupportedInput(format!(
                "{} cells given for a {width}x{height} grid",
                kinds.len()
            )));
        }

        let mut grid = Self::empty(width, height);
        for (pixel_index, kind) in kinds.iter().enumerate() {
            let x = (pixel_index % width as usize) as i32;
            let y = (pixel_index / width as usize) as i32;
            grid.set(x, y, *kind);
        }
        Ok(grid)
    }

    fn empty(width: u32, height: u32) -> Self {
        let stride = width as usize + 2;
        Self {
            width,
            height,
            stride,
            cells: vec![0u8; stride * (height as usize + 2)],
            wire_pixels: 0,
        }
    }

    fn set(&mut self, x: i32, y: i32, kind: Kind) {
        let index = self.bordered_index(x, y);
        self.cells[index] = kind.bits();
        if kind.is_wire() {
            self.wire_pixels += 1;
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn wire_pixel_count(&self) -> usize {
        self.wire_pixels
    }

    /// Index of the image pixel `(x, y)` in an unbordered `width * height` map.
    #[inline]
    pub fn pixel_index(&self, x: i32, y: i32) -> usize {
        y as usize * self.width as usize + x as usize
    }

    /// Index into `cells`; `x` and `y` may be -1 or one past the last pixel.
    #[inline]
    fn bordered_index(&self, x: i32, y: i32) -> usize {
        (y + 1) as usize * self.stride + (x + 1) as usize
    }

    /// Raw 2-bit code of a cell. Border cells are always 0.
    #[inline]
    pub fn cell(&self, x: i32, y: i32) -> u8 {
        self.cells[self.bordered_index(x, y)]
    }

    #[inline]
    pub fn has_wire(&self, x: i32, y: i32) -> bool {
        self.cell(x, y) & WIRE_BIT != 0
    }

    /// The signal bit of a cell, as 0 or 1.
    #[inline]
    pub fn signal(&self, x: i32, y: i32) -> u8 {
        (self.cell(x, y) & SIGNAL_BIT) >> 1
    }

    /// Occupancy of the cells above (`y - 1`), below (`y + 1`), left and right.
    pub fn neighbours(&self, x: i32, y: i32) -> Neighbours {
        Neighbours {
            up: self.has_wire(x, y - 1),
            down: self.has_wire(x, y + 1),
            left: self.has_wire(x - 1, y),
            right: self.has_wire(x + 1, y),
        }
    }
}


#[cfg(test)]
mod tests {
    use super::fixtures;
    use super::*;

    #[test]
    fn border_is_always_empty() {
        let grid = fixtures::grid(&["**", "**"]);
        for x in -1..=2 {
            assert_eq!(grid.cell(x, -1), 0);
            assert_eq!(grid.cell(x, 2), 0);
        }
        for y in -1..=2 {
            assert_eq!(grid.cell(-1, y), 0);
            assert_eq!(grid.cell(2, y), 0);
        }
        assert_eq!(grid.wire_pixel_count(), 4);
    }

    #[test]
    fn neighbour_counts() {
        let grid = fixtures::grid(&[".#.", "###", ".#."]);
        assert_eq!(grid.neighbours(1, 1).count(), 4);
        assert_eq!(grid.neighbours(1, 0).count(), 1);
        assert!(grid.neighbours(1, 0).down);
        assert_eq!(grid.neighbours(0, 0).count(), 2);
    }

    #[test]
    fn rgb_and_rgba_frames_classify_alike() {
        let rows = [".*#", "#*."];
        let rgba = fixtures::rgba(&rows);
        let rgb: Vec<u8> = rgba
            .chunks_exact(4)
            .flat_map(|sample| sample[..3].to_vec())
            .collect();

        let from_rgba = BorderedGrid::from_frame(&rgba, 3, 2, 4).unwrap();
        let from_rgb = BorderedGrid::from_frame(&rgb, 3, 2, 3).unwrap();
        for y in 0..2 {
            for x in 0..3 {
                assert_eq!(from_rgba.cell(x, y), from_rgb.cell(x, y));
            }
        }
        assert_eq!(from_rgba.signal(1, 0), 1);
        assert_eq!(from_rgba.signal(2, 0), 0);
        assert!(from_rgba.has_wire(2, 0));
    }

    #[test]
    fn rejects_uninterpretable_frames() {
        assert!(matches!(
            BorderedGrid::from_frame(&[0; 8], 2, 1, 4),
            Ok(_)
        ));
        assert!(matches!(
            BorderedGrid::from_frame(&[0; 4], 2, 1, 2),
            Err(DecodeError::UnsupportedInput(_))
        ));
        assert!(matches!(
            BorderedGrid::from_frame(&[0; 7], 2, 1, 4),
            Err(DecodeError::UnsupportedInput(_))
        ));
        assert!(matches!(
            BorderedGrid::from_frame(&[], 0, 1, 4),
            Err(DecodeError::UnsupportedInput(_))
        ));
    }
}
