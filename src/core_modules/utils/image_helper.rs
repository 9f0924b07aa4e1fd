pub mod image_helper {
    use crate::core_modules::decode_error::DecodeError;
    use crate::core_modules::graph_assembler::{PixelOwner, WireGraph, read_bit};
    use crate::core_modules::pixel::pixel::Pixel;
    use crate::pipeline::FrameBuffer;
    use image::{ImageEncoder, Rgba, RgbaImage};
    use std::path::Path;

    pub const BACKGROUND: Rgba<u8> = Rgba([255, 255, 255, 255]);
    pub const GRID_LINE: Rgba<u8> = Rgba([230, 230, 230, 255]);
    pub const ACTIVE_WIRE: Rgba<u8> = Rgba([255, 0, 0, 255]);
    pub const INACTIVE_WIRE: Rgba<u8> = Rgba([0, 128, 255, 255]);
    /// A crossing where exactly one of the two wires is active.
    pub const MIXED_CROSSING: Rgba<u8> = Rgba([181, 89, 181, 255]);

    /// Spacing of the background grid lines.
    pub const GRID_SPACING: u32 = 32;

    /// Reads any raster format `image` understands into an RGBA frame. Returns
    /// the frame and the number of wire-coloured pixels, which is a safe wire
    /// hint. `flip_vertical` reverses the row order for hosts whose origin is
    /// the bottom-left corner.
    pub fn load_frame(
        path: impl AsRef<Path>,
        flip_vertical: bool,
    ) -> Result<(FrameBuffer, usize), DecodeError> {
        let mut rgba = image::open(path.as_ref())?.to_rgba8();
        if flip_vertical {
            image::imageops::flip_vertical_in_place(&mut rgba);
        }
        let (width, height) = rgba.dimensions();

        let wire_pixels = rgba
            .pixels()
            .filter(|sample| Pixel::new(sample[0], sample[1], sample[2]).classify().is_wire())
            .count();
        clilog::debug!(
            "loaded {} ({}x{}, {} wire pixels)",
            path.as_ref().display(),
            width,
            height,
            wire_pixels
        );

        let frame = FrameBuffer {
            data: rgba.into_raw(),
            width,
            height,
            channels: 4,
        };
        Ok((frame, wire_pixels))
    }

    /// Paints one generation of `graph`. `states` is a packed bitset in the
    /// layout of `WireGraph::wire_states`, usually `StepEngine::states`.
    pub fn render_generation(graph: &WireGraph, states: &[u8]) -> RgbaImage {
        RgbaImage::from_fn(graph.width(), graph.height(), |x, y| {
            // pixel_owner is Some for every in-bounds pixel
            match graph.pixel_owner(x, y).unwrap_or(PixelOwner::Background) {
                PixelOwner::Background => {
                    if x % GRID_SPACING == 0 || y % GRID_SPACING == 0 {
                        GRID_LINE
                    } else {
                        BACKGROUND
                    }
                }
                PixelOwner::Wire(id) => {
                    if read_bit(states, id) {
                        ACTIVE_WIRE
                    } else {
                        INACTIVE_WIRE
                    }
                }
                PixelOwner::Crossing { vertical, horizontal } => {
                    match (read_bit(states, vertical), read_bit(states, horizontal)) {
                        (true, true) => ACTIVE_WIRE,
                        (false, false) => INACTIVE_WIRE,
                        _ => MIXED_CROSSING,
                    }
                }
            }
        })
    }

    pub fn save_png(path: impl AsRef<Path>, image: &RgbaImage) -> Result<(), DecodeError> {
        let output = std::fs::File::create(path.as_ref())
            .map_err(|error| DecodeError::Image(image::ImageError::IoError(error)))?;
        let encoder = image::codecs::png::PngEncoder::new(output);

        encoder.write_image(
            image.as_raw(),
            image.width(),
            image.height(),
            image::ExtendedColorType::Rgba8,
        )?;

        Ok(())
    }
}
