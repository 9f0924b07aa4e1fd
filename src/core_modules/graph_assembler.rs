// THEORY:
// The `GraphAssembler` is the last stage of decoding. The tracer can only record
// *where* a T-junction feeds a wire (a pixel position), because the stem wire
// may not have been traced yet at that moment. Once both passes are done every
// pixel has an owner, and the assembler turns those positions into wire ids.
//
// Steps:
// 1.  **Resolve**: each incoming pixel position becomes the id stored in the
//     pixel map at that position (crossing flag masked off).
// 2.  **Canonicalize**: each wire's incoming list is sorted ascending, so the
//     adjacency content is independent of trace order.
// 3.  **Pad**: wire slots and the incoming table are rounded up to a whole
//     number of evaluation blocks. Padding wires are inactive sources.
// 4.  **Pack**: active bits are stored 8 per byte, bit `id & 7` of byte `id >> 3`.
//
// The resulting `WireGraph` is immutable. It is meant to be wrapped in an `Arc`
// and shared between the `StepEngine` and any display collaborator.

use crate::core_modules::wire_tracer::{
    CROSSING_FLAG, IncomingGroup, TraceOutput, WIRE_ID_MASK, WireId, crossing_slot,
};

/// Decoded view of one pixel-map entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelOwner {
    Background,
    Wire(WireId),
    /// Two wires share the cell without touching.
    Crossing { vertical: WireId, horizontal: WireId },
}

/// The decoded circuit: one immutable snapshot of wires and their fan-in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WireGraph {
    width: u32,
    height: u32,
    /// Real wires, ids `1..=wire_count`.
    wire_count: u32,
    /// Initial generation, one bit per wire slot, block padded.
    wire_states: Vec<u8>,
    /// Sorted incoming ids, sliced by `incoming_groups`, block padded.
    incoming_wires: Vec<WireId>,
    /// One `(offset, len)` per wire slot, block padded.
    incoming_groups: Vec<IncomingGroup>,
    pixel_map: Vec<u32>,
    crossing_map: Vec<u32>,
}

/// Rounds `n` up to a multiple of `block`.
pub fn round_to_block(n: usize, block: usize) -> usize {
    n.div_ceil(block) * block
}

#[inline]
pub fn read_bit(bits: &[u8], id: WireId) -> bool {
    bits[(id >> 3) as usize] & (1 << (id & 7)) != 0
}

#[inline]
pub fn write_bit(bits: &mut [u8], id: WireId, value: bool) {
    let byte = &mut bits[(id >> 3) as usize];
    if value {
        *byte |= 1 << (id & 7);
    } else {
        *byte &= !(1 << (id & 7));
    }
}

/// Turns a finished trace into a `WireGraph`. `block_size` must be a power of
/// two of at least 8 (checked by `DecoderConfig::validate`).
pub fn assemble(trace: TraceOutput, block_size: u32) -> WireGraph {
    let TraceOutput {
        width,
        height,
        wire_states,
        mut incoming_pixels,
        mut incoming_groups,
        pixel_map,
        crossing_map,
    } = trace;
    let block = block_size as usize;
    let wire_count = wire_states.len() as u32 - 1;

    // Resolve.
    for entry in incoming_pixels.iter_mut() {
        *entry = pixel_map[*entry as usize] & WIRE_ID_MASK;
    }

    // Canonicalize.
    for group in &incoming_groups {
        incoming_pixels[group.range()].sort_unstable();
    }

    // Pad.
    let slots = round_to_block(wire_states.len(), block);
    let incoming_len = incoming_pixels.len();
    incoming_pixels.resize(round_to_block(incoming_len, block), 0);
    incoming_groups.resize(
        slots,
        IncomingGroup {
            offset: incoming_len as u32,
            len: 0,
        },
    );

    // Pack.
    let mut packed = vec![0u8; slots / 8];
    for (id, &active) in wire_states.iter().enumerate() {
        if active != 0 {
            write_bit(&mut packed, id as WireId, true);
        }
    }

    clilog::debug!(
        "assembled {} wires into {} slots, {} incoming edges",
        wire_count,
        slots,
        incoming_len
    );

    WireGraph {
        width,
        height,
        wire_count,
        wire_states: packed,
        incoming_wires: incoming_pixels,
        incoming_groups,
        pixel_map,
        crossing_map,
    }
}

impl WireGraph {
    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn wire_count(&self) -> u32 {
        self.wire_count
    }

    /// Wire slots including the sentinel and padding.
    pub fn padded_wire_count(&self) -> usize {
        self.incoming_groups.len()
    }

    /// Packed initial generation.
    pub fn wire_states(&self) -> &[u8] {
        &self.wire_states
    }

    pub fn incoming_wires(&self) -> &[WireId] {
        &self.incoming_wires
    }

    pub fn incoming_groups(&self) -> &[IncomingGroup] {
        &self.incoming_groups
    }

    pub fn pixel_map(&self) -> &[u32] {
        &self.pixel_map
    }

    pub fn crossing_map(&self) -> &[u32] {
        &self.crossing_map
    }

    pub fn is_initially_active(&self, id: WireId) -> bool {
        read_bit(&self.wire_states, id)
    }

    /// Sorted incoming wire ids of `id`. Empty for sources and padding.
    pub fn incoming(&self, id: WireId) -> &[WireId] {
        &self.incoming_wires[self.incoming_groups[id as usize].range()]
    }

    /// Who owns pixel `(x, y)`, or `None` outside the image.
    pub fn pixel_owner(&self, x: u32, y: u32) -> Option<PixelOwner> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let index = (y as usize) * self.width as usize + x as usize;
        let entry = self.pixel_map[index];

        Some(if entry == 0 {
            PixelOwner::Background
        } else if entry & CROSSING_FLAG != 0 {
            PixelOwner::Crossing {
                vertical: entry & WIRE_ID_MASK,
                horizontal: self.crossing_map[crossing_slot(self.width, x, y)],
            }
        } else {
            PixelOwner::Wire(entry)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core_modules::bordered_grid::fixtures;
    use crate::core_modules::wire_tracer::trace;

    fn assembled(rows: &[&str], block_size: u32) -> WireGraph {
        assemble(trace(fixtures::grid(rows), 0, block_size).unwrap(), block_size)
    }

    #[test]
    fn t_junction_resolves_to_the_stem_id() {
        let graph = assembled(&[".#.", "##.", ".#."], 1024);
        assert_eq!(graph.wire_count(), 2);
        assert_eq!(graph.incoming(1), &[2]);
        assert!(graph.incoming(2).is_empty());
    }

    #[test]
    fn incoming_lists_are_sorted() {
        // A horizontal through-line fed by three stems.
        let graph = assembled(&[".#.#.#.", "#######"], 1024);
        let through = graph.wire_count();
        assert_eq!(through, 4);
        assert_eq!(graph.incoming(through), &[1, 2, 3]);

        // The through-line doubles back and meets stem 3 before stem 2.
        let graph = assembled(&["#####", "....#", "#####", ".#.#."], 1024);
        assert_eq!(graph.wire_count(), 3);
        assert_eq!(graph.incoming(1), &[2, 3]);
        assert!(graph.incoming_wires().iter().all(|&id| id <= graph.wire_count()));
    }

    #[test]
    fn everything_is_block_padded() {
        let graph = assembled(&["*.#", "...", "###"], 8);
        assert_eq!(graph.wire_count(), 3);
        assert_eq!(graph.padded_wire_count(), 8);
        assert_eq!(graph.wire_states().len(), 1);
        assert_eq!(graph.incoming_wires().len() % 8, 0);
        for id in 4..8 {
            assert!(!graph.is_initially_active(id));
            assert!(graph.incoming(id).is_empty());
        }

        let graph = assembled(&["*"], 1024);
        assert_eq!(graph.padded_wire_count(), 1024);
        assert_eq!(graph.wire_states().len(), 128);
    }

    #[test]
    fn active_bits_are_packed() {
        let graph = assembled(&["*.#.*"], 8);
        assert_eq!(graph.wire_states()[0], 0b0000_1010);
        assert!(graph.is_initially_active(1));
        assert!(!graph.is_initially_active(2));
        assert!(graph.is_initially_active(3));
        assert!(!graph.is_initially_active(0));
    }

    #[test]
    fn pixel_owner_decodes_crossings() {
        let graph = assembled(&[".#.", "###", ".#."], 1024);
        assert_eq!(
            graph.pixel_owner(1, 1),
            Some(PixelOwner::Crossing { vertical: 1, horizontal: 2 })
        );
        assert_eq!(graph.pixel_owner(0, 0), Some(PixelOwner::Background));
        assert_eq!(graph.pixel_owner(0, 1), Some(PixelOwner::Wire(2)));
        assert_eq!(graph.pixel_owner(3, 0), None);
    }

    #[test]
    fn crossings_in_neighbouring_rows_keep_their_wires() {
        // Width 6: the crossings at (4, 2) and (1, 3) share no overlay slot.
        let rows = ["......", "....#.", ".#.###", "###.#.", ".#...."];
        let graph = assembled(&rows, 1024);
        assert_eq!(graph.crossing_map().len(), 5 * 2);
        assert_eq!(
            graph.pixel_owner(4, 2),
            Some(PixelOwner::Crossing { vertical: 1, horizontal: 3 })
        );
        assert_eq!(graph.pixel_owner(3, 2), Some(PixelOwner::Wire(3)));
        assert_eq!(
            graph.pixel_owner(1, 3),
            Some(PixelOwner::Crossing { vertical: 2, horizontal: 4 })
        );
        assert_eq!(graph.pixel_owner(0, 3), Some(PixelOwner::Wire(4)));
    }

    #[test]
    fn bits_round_trip() {
        let mut bits = vec![0u8; 2];
        write_bit(&mut bits, 9, true);
        assert!(read_bit(&bits, 9));
        assert_eq!(bits, vec![0, 0b10]);
        write_bit(&mut bits, 9, false);
        assert_eq!(bits, vec![0, 0]);
    }
}
