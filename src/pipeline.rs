// THEORY:
// The `pipeline` module is the top-level API of the crate. It wires the decoder
// stages into one resumable session and pairs a decoded graph with a running
// `StepEngine`.
//
// - `DecodeSession` is the decode-and-assemble pass as an explicit state
//   machine. Every call to `advance` traces a bounded number of scan rows and
//   returns, so a host can interleave other work, report progress, or stop
//   calling and drop the session to cancel. All scratch buffers live inside the
//   session; a graph only exists once `finish` succeeds.
// - `decode` runs a session to completion in one call.
// - `Simulation` owns the immutable graph (behind an `Arc`, so display code can
//   share it) and the engine that steps it.

use crate::core_modules::bordered_grid::BorderedGrid;
use crate::core_modules::graph_assembler::assemble;
use crate::core_modules::wire_tracer::{TraceStatus, WireTracer};
use std::sync::Arc;

// Re-export key data structures for the public API.
pub use crate::core_modules::decode_error::DecodeError;
pub use crate::core_modules::graph_assembler::{PixelOwner, WireGraph};
pub use crate::core_modules::step_engine::{EvaluationConfig, StepEngine};
pub use crate::core_modules::wire_tracer::{
    CROSSING_FLAG, IncomingGroup, WIRE_ID_MASK, WireId, crossing_slot,
};

/// Configuration for decoding, allowing for tunable behavior.
#[derive(Debug, Clone)]
pub struct DecoderConfig {
    /// Padding granularity of every output array. Must be a power of two, at
    /// least 8, and match the batch size of whatever evaluates the graph.
    pub block_size: u32,
    /// Scan rows traced per `DecodeSession::advance` call.
    pub yield_every_rows: u32,
}

impl Default for DecoderConfig {
    fn default() -> Self {
        Self {
            block_size: 1024,
            yield_every_rows: 10,
        }
    }
}

impl DecoderConfig {
    pub fn validate(&self) -> Result<(), DecodeError> {
        if self.block_size < 8 || !self.block_size.is_power_of_two() {
            return Err(DecodeError::InvalidConfig(format!(
                "block_size must be a power of two >= 8, got {}",
                self.block_size
            )));
        }
        if self.yield_every_rows == 0 {
            return Err(DecodeError::InvalidConfig(
                "yield_every_rows must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// An owned, row-major frame of 3- or 4-byte samples.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameBuffer {
    pub data: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub channels: usize,
}

impl FrameBuffer {
    /// Starts a decode session over this frame.
    pub fn session(
        &self,
        wire_hint: Option<usize>,
        config: DecoderConfig,
    ) -> Result<DecodeSession, DecodeError> {
        DecodeSession::new(&self.data, self.width, self.height, self.channels, wire_hint, config)
    }
}

/// How far a decode has come. Rows of both trace passes are counted, so
/// `total_rows` is twice the image height.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DecodeProgress {
    pub rows_processed: u32,
    pub total_rows: u32,
}

impl DecodeProgress {
    pub fn is_complete(&self) -> bool {
        self.rows_processed >= self.total_rows
    }
}

/// Result of one `DecodeSession::advance` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeStatus {
    InProgress(DecodeProgress),
    /// Tracing is done; `finish` will assemble the graph.
    Traced,
}

/// A decode in progress. Dropping it cancels the decode.
pub struct DecodeSession {
    tracer: WireTracer,
    config: DecoderConfig,
}

impl DecodeSession {
    /// Classifies a row-major frame of 3- or 4-byte samples and prepares the
    /// trace. `wire_hint` sizes the wire buffers; `None` uses the number of
    /// wire-coloured pixels, which can never be exceeded.
    pub fn new(
        frame_buffer: &[u8],
        width: u32,
        height: u32,
        channels: usize,
        wire_hint: Option<usize>,
        config: DecoderConfig,
    ) -> Result<Self, DecodeError> {
        config.validate()?;
        let grid = BorderedGrid::from_frame(frame_buffer, width, height, channels)?;
        Self::from_grid(grid, wire_hint, config)
    }

    /// Starts a session on an already classified grid.
    pub fn from_grid(
        grid: BorderedGrid,
        wire_hint: Option<usize>,
        config: DecoderConfig,
    ) -> Result<Self, DecodeError> {
        config.validate()?;
        let wire_hint = wire_hint.unwrap_or_else(|| grid.wire_pixel_count());
        clilog::debug!(
            "decoding {}x{} image, {} wire pixels",
            grid.width(),
            grid.height(),
            grid.wire_pixel_count()
        );

        Ok(Self {
            tracer: WireTracer::new(grid, wire_hint, config.block_size),
            config,
        })
    }

    /// Traces the next `yield_every_rows` scan rows.
    pub fn advance(&mut self) -> Result<DecodeStatus, DecodeError> {
        Ok(match self.tracer.trace_rows(self.config.yield_every_rows)? {
            TraceStatus::InProgress { rows_processed, total_rows } => {
                DecodeStatus::InProgress(DecodeProgress { rows_processed, total_rows })
            }
            TraceStatus::Complete => DecodeStatus::Traced,
        })
    }

    pub fn progress(&self) -> DecodeProgress {
        DecodeProgress {
            rows_processed: self.tracer.rows_processed(),
            total_rows: self.tracer.total_rows(),
        }
    }

    /// Traces whatever is left and assembles the graph.
    pub fn finish(self) -> Result<WireGraph, DecodeError> {
        let block_size = self.config.block_size;
        let trace = self.tracer.finish()?;
        let graph = assemble(trace, block_size);
        clilog::info!(
            "decoded {} wires from a {}x{} image",
            graph.wire_count(),
            graph.width(),
            graph.height()
        );
        Ok(graph)
    }
}

/// Decodes a frame in one blocking call.
pub fn decode(
    frame_buffer: &[u8],
    width: u32,
    height: u32,
    channels: usize,
    config: DecoderConfig,
) -> Result<WireGraph, DecodeError> {
    DecodeSession::new(frame_buffer, width, height, channels, None, config)?.finish()
}

/// What a single pixel shows in the current generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelSignal {
    Background,
    Wire { active: bool },
    Crossing { vertical_active: bool, horizontal_active: bool },
}

/// A decoded circuit together with the engine that runs it.
pub struct Simulation {
    engine: StepEngine,
}

impl Simulation {
    pub fn new(graph: WireGraph, config: &EvaluationConfig) -> Self {
        Self::from_shared(Arc::new(graph), config)
    }

    pub fn from_shared(graph: Arc<WireGraph>, config: &EvaluationConfig) -> Self {
        Self {
            engine: StepEngine::new(graph, config),
        }
    }

    /// Decodes `frame_buffer` and prepares it for stepping.
    pub fn from_frame(
        frame_buffer: &[u8],
        width: u32,
        height: u32,
        channels: usize,
        decoder: DecoderConfig,
        evaluation: &EvaluationConfig,
    ) -> Result<Self, DecodeError> {
        let graph = decode(frame_buffer, width, height, channels, decoder)?;
        Ok(Self::new(graph, evaluation))
    }

    pub fn step(&mut self) {
        self.engine.step();
    }

    pub fn run(&mut self, ticks: u64) {
        self.engine.run(ticks);
    }

    pub fn graph(&self) -> &Arc<WireGraph> {
        self.engine.graph()
    }

    pub fn engine(&self) -> &StepEngine {
        &self.engine
    }

    pub fn generation(&self) -> u64 {
        self.engine.generation()
    }

    pub fn is_active(&self, id: WireId) -> bool {
        self.engine.is_active(id)
    }

    /// The state shown at pixel `(x, y)`, or `None` outside the image.
    pub fn pixel_signal(&self, x: u32, y: u32) -> Option<PixelSignal> {
        Some(match self.graph().pixel_owner(x, y)? {
            PixelOwner::Background => PixelSignal::Background,
            PixelOwner::Wire(id) => PixelSignal::Wire {
                active: self.is_active(id),
            },
            PixelOwner::Crossing { vertical, horizontal } => PixelSignal::Crossing {
                vertical_active: self.is_active(vertical),
                horizontal_active: self.is_active(horizontal),
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core_modules::bordered_grid::fixtures;

    #[test]
    fn rejects_bad_config() {
        let frame = fixtures::rgba(&["*"]);
        for config in [
            DecoderConfig { block_size: 1000, ..Default::default() },
            DecoderConfig { block_size: 4, ..Default::default() },
            DecoderConfig { yield_every_rows: 0, ..Default::default() },
        ] {
            assert!(matches!(
                decode(&frame, 1, 1, 4, config),
                Err(DecodeError::InvalidConfig(_))
            ));
        }
    }

    #[test]
    fn session_advances_in_row_chunks() {
        let rows = ["#", "#", "#", ".", "*", ".", "#"];
        let frame = fixtures::rgba(&rows);
        let config = DecoderConfig { yield_every_rows: 3, ..Default::default() };
        let mut session = DecodeSession::new(&frame, 1, 7, 4, None, config).unwrap();

        let mut seen = Vec::new();
        while let DecodeStatus::InProgress(progress) = session.advance().unwrap() {
            assert_eq!(progress.total_rows, 14);
            seen.push(progress.rows_processed);
        }
        assert_eq!(seen, vec![3, 6, 9, 12]);
        assert!(session.progress().is_complete());

        let graph = session.finish().unwrap();
        assert_eq!(graph.wire_count(), 3);
    }

    #[test]
    fn crossing_pixels_show_both_wires() {
        let frame = fixtures::rgba(&[".*.", "###", ".*."]);
        let simulation =
            Simulation::from_frame(&frame, 3, 3, 4, DecoderConfig::default(), &EvaluationConfig::default())
                .unwrap();
        assert_eq!(
            simulation.pixel_signal(1, 1),
            Some(PixelSignal::Crossing { vertical_active: true, horizontal_active: false })
        );
        assert_eq!(simulation.pixel_signal(0, 1), Some(PixelSignal::Wire { active: false }));
        assert_eq!(simulation.pixel_signal(0, 0), Some(PixelSignal::Background));
        assert_eq!(simulation.pixel_signal(9, 9), None);
    }
}
