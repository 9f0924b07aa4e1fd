// THEORY:
// The `WireTracer` is the engine of the decoder. It turns the classified
// `BorderedGrid` into wires: maximal runs of wire cells that share one electrical
// state, plus the list of T-junctions feeding each of them.
//
// Algorithm, in two scan passes over the image:
// 1.  **Open pass**: every unowned wire cell whose neighbour count is 0, 1 or 3 is
//     an end of something. A count-0 cell is a one-pixel wire. A count-1 cell
//     walks toward its only neighbour. A count-3 cell is the foot of a T and walks
//     away from its single empty side. Cells with count 2 or 4 are the inside of a
//     run or a crossing and are reached by some walk.
// 2.  **Loop pass**: whatever wire cells are still unowned can only sit on closed
//     loops. Each is walked until the walk comes back to where it started.
//
// A walk is a plain loop over `(position, direction)`. At each step it looks at
// the cell straight ahead and at the cells to its left and right:
// - straight, left and right all wire: a crossing. The two lines do not join;
//   vertical walks tag the pixel map, horizontal walks write the overlay.
// - straight and one side: a T-junction. The junction cell belongs to the stem,
//   and its position is recorded as an incoming contributor of this wire.
// - straight only: the run continues and its signal is OR-ed in.
// - no straight, one side: the line turns toward that side.
// - no straight, sides agree: the wire ends here (open pass only).
//
// The `InvalidTopology` returns are guards. The scan order means every end and
// T-foot is started in the open pass, so the loop pass only ever meets closed
// runs, and every walk terminates well inside the step cap. They turn a broken
// assumption into an error instead of a hang or a half-owned map.
//
// The tracer is resumable. `trace_rows` processes a bounded number of scan rows
// so a host can interleave other work; all state lives in this struct, so
// dropping it mid-way leaves nothing behind.

use crate::core_modules::bordered_grid::{BorderedGrid, Neighbours};
use crate::core_modules::decode_error::DecodeError;

/// A 1-based wire id. 0 is the background sentinel.
pub type WireId = u32;

/// Bit 31 of a pixel-map entry: the cell is a crossing, the overlay holds the
/// second wire.
pub const CROSSING_FLAG: u32 = 0x8000_0000;
/// Mask that strips `CROSSING_FLAG` from a pixel-map entry.
pub const WIRE_ID_MASK: u32 = 0x7FFF_FFFF;

/// A slice of the flattened incoming table belonging to one wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct IncomingGroup {
    pub offset: u32,
    pub len: u32,
}

impl IncomingGroup {
    pub fn range(&self) -> std::ops::Range<usize> {
        self.offset as usize..(self.offset + self.len) as usize
    }
}

/// Which scan the tracer is in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TracePass {
    Open,
    Loops,
    Done,
}

/// Progress report from `trace_rows`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TraceStatus {
    /// `rows_processed` counts both passes, so it runs from 0 to `total_rows`.
    InProgress { rows_processed: u32, total_rows: u32 },
    Complete,
}

/// Everything the tracer learned, indexed by wire id (slot 0 is the sentinel).
#[derive(Debug, Clone)]
pub struct TraceOutput {
    pub width: u32,
    pub height: u32,
    /// Initial active bit (0 or 1) per wire id.
    pub wire_states: Vec<u8>,
    /// Flattened incoming contributors as pixel indices, not yet wire ids.
    pub incoming_pixels: Vec<u32>,
    pub incoming_groups: Vec<IncomingGroup>,
    /// `width * height` entries, see `CROSSING_FLAG`.
    pub pixel_map: Vec<u32>,
    /// `height * ceil(width / 4)` entries, see `crossing_slot`.
    pub crossing_map: Vec<u32>,
}

impl TraceOutput {
    /// Number of real wires (the sentinel excluded).
    pub fn wire_count(&self) -> u32 {
        self.wire_states.len() as u32 - 1
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WalkMode {
    /// Ends at a dead end or a junction.
    Open,
    /// Ends when the walk is back on its start cell.
    Loop,
}

/// Overlay slot of pixel `(x, y)`: every row has its own `ceil(width / 4)`
/// entries, one per group of 4 columns.
#[inline]
pub fn crossing_slot(width: u32, x: u32, y: u32) -> usize {
    y as usize * width.div_ceil(4) as usize + (x / 4) as usize
}

/// Rounds a wire-count hint up to whole blocks and adds one block of headroom.
pub fn capacity_for_hint(wire_hint: usize, block_size: u32) -> usize {
    let block = block_size.max(1) as usize;
    (wire_hint / block + 2) * block
}

pub struct WireTracer {
    grid: BorderedGrid,
    pass: TracePass,
    /// Next scan row of the current pass.
    next_row: u32,
    wire_states: Vec<u8>,
    incoming_pixels: Vec<u32>,
    incoming_groups: Vec<IncomingGroup>,
    pixel_map: Vec<u32>,
    crossing_map: Vec<u32>,
    /// Upper bound on the length of a single walk.
    max_walk_steps: u64,
}

impl WireTracer {
    pub fn new(grid: BorderedGrid, wire_hint: usize, block_size: u32) -> Self {
        let pixel_count = grid.width() as usize * grid.height() as usize;
        let crossing_len = grid.height() as usize * grid.width().div_ceil(4) as usize;
        let capacity = capacity_for_hint(wire_hint, block_size);

        let mut wire_states = Vec::with_capacity(capacity);
        wire_states.push(0);
        let mut incoming_groups = Vec::with_capacity(capacity);
        incoming_groups.push(IncomingGroup::default());

        Self {
            max_walk_steps: 4 * pixel_count as u64,
            grid,
            pass: TracePass::Open,
            next_row: 0,
            wire_states,
            incoming_pixels: Vec::with_capacity(capacity * 2),
            incoming_groups,
            pixel_map: vec![0; pixel_count],
            crossing_map: vec![0; crossing_len],
        }
    }

    pub fn pass(&self) -> TracePass {
        self.pass
    }

    /// Wires finalized so far.
    pub fn wire_count(&self) -> u32 {
        self.wire_states.len() as u32 - 1
    }

    pub fn pixel_map(&self) -> &[u32] {
        &self.pixel_map
    }

    pub fn total_rows(&self) -> u32 {
        2 * self.grid.height()
    }

    pub fn rows_processed(&self) -> u32 {
        match self.pass {
            TracePass::Open => self.next_row,
            TracePass::Loops => self.grid.height() + self.next_row,
            TracePass::Done => self.total_rows(),
        }
    }

    /// Processes up to `row_budget` scan rows (at least one) of the current pass,
    /// moving on to the next pass when a pass runs out of rows.
    ///
    /// After an error the tracer is in an unspecified state and must be dropped.
    pub fn trace_rows(&mut self, row_budget: u32) -> Result<TraceStatus, DecodeError> {
        let mut rows_left = row_budget.max(1);

        while rows_left > 0 && self.pass != TracePass::Done {
            let y = self.next_row as i32;
            match self.pass {
                TracePass::Open => self.trace_open_row(y)?,
                TracePass::Loops => self.trace_loop_row(y)?,
                TracePass::Done => unreachable!(),
            }
            rows_left -= 1;
            self.next_row += 1;

            if self.next_row == self.grid.height() {
                self.next_row = 0;
                self.finish_pass()?;
            }
        }

        Ok(match self.pass {
            TracePass::Done => TraceStatus::Complete,
            _ => TraceStatus::InProgress {
                rows_processed: self.rows_processed(),
                total_rows: self.total_rows(),
            },
        })
    }

    /// Runs every remaining row and hands over the result.
    pub fn finish(mut self) -> Result<TraceOutput, DecodeError> {
        while self.trace_rows(u32::MAX)? != TraceStatus::Complete {}

        Ok(TraceOutput {
            width: self.grid.width(),
            height: self.grid.height(),
            wire_states: self.wire_states,
            incoming_pixels: self.incoming_pixels,
            incoming_groups: self.incoming_groups,
            pixel_map: self.pixel_map,
            crossing_map: self.crossing_map,
        })
    }

    fn finish_pass(&mut self) -> Result<(), DecodeError> {
        match self.pass {
            TracePass::Open => {
                clilog::debug!("open pass traced {} wires", self.wire_count());
                self.pass = TracePass::Loops;
            }
            TracePass::Loops => {
                self.verify_ownership()?;
                clilog::debug!("loop pass done, {} wires in total", self.wire_count());
                self.pass = TracePass::Done;
            }
            TracePass::Done => {}
        }
        Ok(())
    }

    fn trace_open_row(&mut self, y: i32) -> Result<(), DecodeError> {
        for x in 0..self.grid.width() as i32 {
            if !self.grid.has_wire(x, y) || self.pixel_map[self.grid.pixel_index(x, y)] != 0 {
                continue;
            }
            self.trace_from(x, y)?;
        }
        Ok(())
    }

    fn trace_loop_row(&mut self, y: i32) -> Result<(), DecodeError> {
        for x in 0..self.grid.width() as i32 {
            if !self.grid.has_wire(x, y) || self.pixel_map[self.grid.pixel_index(x, y)] != 0 {
                continue;
            }
            self.trace_loop_from(x, y)?;
        }
        Ok(())
    }

    /// Open-pass start. Only ends (count 0, 1, 3) start a wire.
    fn trace_from(&mut self, x: i32, y: i32) -> Result<(), DecodeError> {
        let neighbours = self.grid.neighbours(x, y);
        let count = neighbours.count();
        if count == 2 || count == 4 {
            return Ok(());
        }

        let id = self.next_id();
        let incoming_offset = self.incoming_pixels.len();
        // The foot of a T does not contribute its own signal.
        let active = if count == 3 { 0 } else { self.grid.signal(x, y) };
        let index = self.grid.pixel_index(x, y);
        self.pixel_map[index] = id;

        let (dx, dy) = match count {
            0 => {
                self.finalize(active, incoming_offset);
                return Ok(());
            }
            1 => toward_occupied(neighbours)
                .ok_or_else(|| topology(x, y, "end cell has no occupied neighbour"))?,
            _ => away_from_empty(neighbours)
                .ok_or_else(|| topology(x, y, "junction cell has no empty side"))?,
        };

        let active = self.walk(x, y, dx, dy, id, active, WalkMode::Open)?;
        self.finalize(active, incoming_offset);
        Ok(())
    }

    /// Loop-pass start. Anything still unowned must be on a closed loop.
    fn trace_loop_from(&mut self, x: i32, y: i32) -> Result<(), DecodeError> {
        let neighbours = self.grid.neighbours(x, y);
        match neighbours.count() {
            // A crossing on a loop that has not been walked yet.
            4 => return Ok(()),
            2 => {}
            _ => return Err(topology(x, y, "unowned cell is not on a loop")),
        }

        let id = self.next_id();
        let incoming_offset = self.incoming_pixels.len();
        let active = self.grid.signal(x, y);
        let index = self.grid.pixel_index(x, y);
        self.pixel_map[index] = id;

        let (dx, dy) = toward_occupied(neighbours)
            .ok_or_else(|| topology(x, y, "loop cell has no occupied neighbour"))?;

        let active = self.walk(x, y, dx, dy, id, active, WalkMode::Loop)?;
        self.finalize(active, incoming_offset);
        Ok(())
    }

    /// Follows a wire from `(start_x, start_y)` heading `(dx, dy)` and returns its
    /// accumulated active bit.
    #[allow(clippy::too_many_arguments)]
    fn walk(
        &mut self,
        start_x: i32,
        start_y: i32,
        mut dx: i32,
        mut dy: i32,
        id: WireId,
        mut active: u8,
        mode: WalkMode,
    ) -> Result<u8, DecodeError> {
        let (mut x, mut y) = (start_x, start_y);
        let mut steps = 0u64;

        loop {
            x += dx;
            y += dy;
            steps += 1;
            if steps > self.max_walk_steps {
                return Err(topology(x, y, "walk does not terminate"));
            }
            if mode == WalkMode::Loop && x == start_x && y == start_y {
                return Ok(active);
            }

            let straight = self.grid.has_wire(x + dx, y + dy);
            let left = self.grid.has_wire(x - dy, y + dx);
            let right = self.grid.has_wire(x + dy, y - dx);
            let index = self.grid.pixel_index(x, y);

            if straight {
                if left && right {
                    self.record_crossing(x, y, id, dx != 0);
                } else if left || right {
                    self.incoming_pixels.push(index as u32);
                } else {
                    active |= self.grid.signal(x, y);
                    self.pixel_map[index] = id;
                }
            } else if left == right {
                if mode == WalkMode::Loop {
                    return Err(topology(x, y, "loop reaches a cell with no turn direction"));
                }
                // Ending on a junction leaves the junction's signal to the stem.
                if !left {
                    active |= self.grid.signal(x, y);
                }
                self.pixel_map[index] = id;
                return Ok(active);
            } else {
                active |= self.grid.signal(x, y);
                self.pixel_map[index] = id;
                (dx, dy) = if left { (-dy, dx) } else { (dy, -dx) };
            }
        }
    }

    fn record_crossing(&mut self, x: i32, y: i32, id: WireId, horizontal: bool) {
        if horizontal {
            self.crossing_map[crossing_slot(self.grid.width(), x as u32, y as u32)] = id;
        } else {
            self.pixel_map[self.grid.pixel_index(x, y)] = CROSSING_FLAG | id;
        }
    }

    fn next_id(&self) -> WireId {
        self.wire_states.len() as WireId
    }

    fn finalize(&mut self, active: u8, incoming_offset: usize) {
        let len = self.incoming_pixels.len() - incoming_offset;
        self.incoming_groups.push(IncomingGroup {
            offset: incoming_offset as u32,
            len: len as u32,
        });
        self.wire_states.push(active);
    }

    /// Every wire cell must have an owner once both passes ran.
    fn verify_ownership(&self) -> Result<(), DecodeError> {
        for y in 0..self.grid.height() as i32 {
            for x in 0..self.grid.width() as i32 {
                if self.grid.has_wire(x, y) && self.pixel_map[self.grid.pixel_index(x, y)] == 0 {
                    return Err(topology(x, y, "wire cell left without an owner"));
                }
            }
        }
        Ok(())
    }
}

/// Direction toward the first occupied neighbour, priority up, down, left, right.
fn toward_occupied(neighbours: Neighbours) -> Option<(i32, i32)> {
    if neighbours.up {
        Some((0, -1))
    } else if neighbours.down {
        Some((0, 1))
    } else if neighbours.left {
        Some((-1, 0))
    } else if neighbours.right {
        Some((1, 0))
    } else {
        None
    }
}

/// Direction away from the first empty neighbour, priority up, down, left, right.
fn away_from_empty(neighbours: Neighbours) -> Option<(i32, i32)> {
    if !neighbours.up {
        Some((0, 1))
    } else if !neighbours.down {
        Some((0, -1))
    } else if !neighbours.left {
        Some((1, 0))
    } else if !neighbours.right {
        Some((-1, 0))
    } else {
        None
    }
}

fn topology(x: i32, y: i32, reason: &'static str) -> DecodeError {
    DecodeError::topology(x.max(0) as u32, y.max(0) as u32, reason)
}

/// Traces a grid in one go.
pub fn trace(grid: BorderedGrid, wire_hint: usize, block_size: u32) -> Result<TraceOutput, DecodeError> {
    WireTracer::new(grid, wire_hint, block_size).finish()
}
