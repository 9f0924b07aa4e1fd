// THEORY (Pixel Classification):
// The `Pixel` module is the most fundamental unit of the decoder. It is a "dumb"
// data container for a single colour sample plus exactly one heuristic: which
// circuit `Kind` the sample paints. Classification looks at this pixel alone,
// never at its neighbours; anything that needs neighbours (occupancy counts,
// walks, junctions) belongs to `BorderedGrid` and `WireTracer`.
//
// The palette is fixed:
// - inactive wire: a handful of exact hues (light blue, dark red, cyan),
// - active wire:   the red and yellow bands, matched under a bit mask so that
//   slightly-off anti-aliased or re-encoded colours still count,
// - anything else: background.
//
// Key principles:
// 1) Totality: every 24-bit colour maps to exactly one `Kind`; background is the
//    default and there is no failure path.
// 2) Two bits, two meanings: bit 0 says "part of a wire", bit 1 says "carries a
//    signal". A signal without a wire is never produced.
// 3) Alpha is carried along but ignored.

pub mod pixel {
    pub type Byte = u8;
    pub type Channel = Byte;
    pub type Rgb = u32;

    /// Bit 0 of a `Kind`: the cell is part of a wire.
    pub const WIRE_BIT: u8 = 0b01;
    /// Bit 1 of a `Kind`: the cell carries an active signal.
    pub const SIGNAL_BIT: u8 = 0b10;

    const INACTIVE_COLORS: [Rgb; 3] = [0x0080FF, 0x800000, 0x00FFFF];
    const ACTIVE_RED_MASK: Rgb = 0xFF7FF0;
    const ACTIVE_RED: Rgb = 0xFF0000;
    const ACTIVE_YELLOW_MASK: Rgb = 0xFFFFF0;
    const ACTIVE_YELLOW: Rgb = 0xFFFF00;

    /// The circuit meaning of a single classified cell.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    #[repr(u8)]
    pub enum Kind {
        /// Background, not part of any wire.
        #[default]
        Empty = 0b00,
        /// A wire that is carrying no signal.
        InactiveWire = 0b01,
        /// A wire that is carrying a signal.
        ActiveWire = 0b11,
    }

    impl Kind {
        /// The packed 2-bit code stored in the bordered grid.
        #[inline]
        pub fn bits(self) -> u8 {
            self as u8
        }

        #[inline]
        pub fn is_wire(self) -> bool {
            self.bits() & WIRE_BIT != 0
        }
    }

    /// A "dumb" data container representing a single colour sample.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct Pixel {
        /// The red channel value (0-255).
        pub red: Channel,
        /// The green channel value (0-255).
        pub green: Channel,
        /// The blue channel value (0-255).
        pub blue: Channel,
    }

    impl Pixel {
        pub fn new(red: Channel, green: Channel, blue: Channel) -> Self {
            Pixel { red, green, blue }
        }

        /// Builds a pixel from the first three bytes of an RGB or RGBA sample.
        /// Returns `None` when fewer than three bytes are available.
        pub fn from_sample(bytes: &[Byte]) -> Option<Self> {
            match bytes {
                [red, green, blue, ..] => Some(Pixel::new(*red, *green, *blue)),
                _ => None,
            }
        }

        /// The sample packed as `0xRRGGBB`.
        #[inline]
        pub fn rgb(&self) -> Rgb {
            ((self.red as Rgb) << 16) | ((self.green as Rgb) << 8) | self.blue as Rgb
        }

        /// Maps the colour to its circuit `Kind`.
        ///
        /// - The inactive hues are exact matches and are tested first, so the two
        ///   wire bands never overlap.
        /// - The active bands tolerate noise in the masked-out low bits.
        pub fn classify(&self) -> Kind {
            let rgb = self.rgb();

            if INACTIVE_COLORS.contains(&rgb) {
                return Kind::InactiveWire;
            }

            if rgb & ACTIVE_RED_MASK == ACTIVE_RED || rgb & ACTIVE_YELLOW_MASK == ACTIVE_YELLOW {
                return Kind::ActiveWire;
            }

            Kind::Empty
        }
    }
}

#[cfg(test)]
mod tests {
    use super::pixel::*;

    #[test]
    fn reserved_inactive_hues() {
        assert_eq!(Pixel::new(0x00, 0x80, 0xFF).classify(), Kind::InactiveWire);
        assert_eq!(Pixel::new(0x80, 0x00, 0x00).classify(), Kind::InactiveWire);
        assert_eq!(Pixel::new(0x00, 0xFF, 0xFF).classify(), Kind::InactiveWire);
    }

    #[test]
    fn active_bands_tolerate_masked_bits() {
        assert_eq!(Pixel::new(0xFF, 0x00, 0x00).classify(), Kind::ActiveWire);
        assert_eq!(Pixel::new(0xFF, 0x80, 0x0F).classify(), Kind::ActiveWire);
        assert_eq!(Pixel::new(0xFF, 0xFF, 0x00).classify(), Kind::ActiveWire);
        assert_eq!(Pixel::new(0xFF, 0xFF, 0x0A).classify(), Kind::ActiveWire);
    }

    #[test]
    fn everything_else_is_background() {
        assert_eq!(Pixel::new(0xFF, 0xFF, 0xFF).classify(), Kind::Empty);
        assert_eq!(Pixel::new(0x00, 0x00, 0x00).classify(), Kind::Empty);
        assert_eq!(Pixel::new(0xFE, 0x00, 0x00).classify(), Kind::Empty);
        assert_eq!(Pixel::new(0xFF, 0xFF, 0x10).classify(), Kind::Empty);
        assert_eq!(Pixel::new(0x00, 0x80, 0xFE).classify(), Kind::Empty);
    }

    #[test]
    fn classification_is_total_and_consistent() {
        for red in (0..=255u16).step_by(17) {
            for green in (0..=255u16).step_by(17) {
                for blue in (0..=255u16).step_by(17) {
                    let kind = Pixel::new(red as u8, green as u8, blue as u8).classify();
                    // A signal is only ever reported on a wire.
                    assert!(kind.bits() & SIGNAL_BIT == 0 || kind.is_wire());
                }
            }
        }
    }

    #[test]
    fn samples_ignore_alpha() {
        let rgba = [0xFF, 0x00, 0x00, 0x00];
        let rgb = [0xFF, 0x00, 0x00];
        assert_eq!(Pixel::from_sample(&rgba), Pixel::from_sample(&rgb));
        assert_eq!(Pixel::from_sample(&rgb[..2]), None);
    }
}
