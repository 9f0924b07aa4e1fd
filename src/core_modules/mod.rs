pub mod bordered_grid;
pub mod decode_error;
pub mod graph_assembler;
pub mod pixel;
pub mod step_engine;
pub mod utils;
pub mod wire_tracer;
