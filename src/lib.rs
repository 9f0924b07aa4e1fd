// THEORY:
// This file is the main entry point for the `wire_logic` library crate.
//
// A picture drawn with a handful of wire colours is a circuit: straight and
// bent runs of wire pixels are wires, a wire that ends against the side of
// another feeds it, and two wires that pass straight through each other cross
// without touching. The crate decodes such a picture once into an immutable
// `WireGraph` and then steps it one generation at a time with the `StepEngine`.
//
// `pipeline` is the high-level, synchronous interface (`decode`,
// `DecodeSession`, `Simulation`). `parallel_pipeline` runs a decode on a
// background `tokio` task with progress and cancellation. The stages themselves
// live in `core_modules`.

pub mod core_modules;
pub mod parallel_pipeline;
pub mod pipeline;

pub use parallel_pipeline::{DecodeHandle, DecodeWorker, spawn_decode};
pub use pipeline::{
    DecodeError, DecodeProgress, DecodeSession, DecoderConfig, EvaluationConfig, FrameBuffer,
    Simulation, WireGraph, decode,
};
