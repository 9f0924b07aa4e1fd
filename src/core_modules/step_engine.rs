// THEORY:
// The `StepEngine` advances a decoded circuit by one global tick at a time.
//
// Transition rule, for every wire `w`:
// - with incoming wires `{i1..ik}`: `next[w] = current[i1] | ... | current[ik]`,
// - without incoming wires (a source): `next[w] = current[w]`.
//
// Key architectural principles:
// 1.  **Ping-Pong Generations**: Two packed bitsets, `current` and `next`. A tick
//     reads only `current` and writes only `next`, then the two are swapped. The
//     swap is the single mutation visible across tick boundaries.
// 2.  **Byte-Wide Work Items**: Eight wires share a byte, so one work item computes
//     one whole output byte. No two work items ever write the same byte, which
//     makes the fan-out lock free.
// 3.  **Data Parallelism**: Work items are split into contiguous runs of bytes and
//     handed to `rayon`. Run length is sized from the CPU count so large graphs
//     spread over every core while small graphs stay on one.

use crate::core_modules::graph_assembler::{WireGraph, read_bit};
use crate::core_modules::wire_tracer::WireId;
use rayon::prelude::*;
use std::sync::Arc;

/// Work items per CPU the parallel evaluator aims for.
const TASKS_PER_CPU: usize = 4;

/// Configuration for evaluation, allowing for tunable behavior.
#[derive(Debug, Clone)]
pub struct EvaluationConfig {
    /// Fan each tick out over the `rayon` pool. The serial path computes the
    /// exact same generation.
    pub parallel: bool,
    /// Lower bound on bytes (8 wires each) handed to one parallel work item.
    pub min_bytes_per_task: usize,
}

impl Default for EvaluationConfig {
    fn default() -> Self {
        Self {
            parallel: true,
            min_bytes_per_task: 16,
        }
    }
}

/// Holds the two generations of a running circuit.
pub struct StepEngine {
    graph: Arc<WireGraph>,
    /// The generation every reader observes.
    current: Vec<u8>,
    /// Scratch for the generation being computed.
    next: Vec<u8>,
    generation: u64,
    parallel: bool,
    bytes_per_task: usize,
}

impl StepEngine {
    pub fn new(graph: Arc<WireGraph>, config: &EvaluationConfig) -> Self {
        let current = graph.wire_states().to_vec();
        let next = vec![0u8; current.len()];
        let tasks = num_cpus::get().max(1) * TASKS_PER_CPU;
        let bytes_per_task = (current.len() / tasks).max(config.min_bytes_per_task).max(1);

        Self {
            graph,
            current,
            next,
            generation: 0,
            parallel: config.parallel,
            bytes_per_task,
        }
    }

    /// Computes the next generation and makes it current.
    pub fn step(&mut self) {
        let graph = &*self.graph;
        let current = &self.current;

        if self.parallel {
            let bytes_per_task = self.bytes_per_task;
            self.next
                .par_chunks_mut(bytes_per_task)
                .enumerate()
                .for_each(|(task_index, bytes)| {
                    let first_byte = task_index * bytes_per_task;
                    for (offset, byte) in bytes.iter_mut().enumerate() {
                        *byte = evaluate_byte(graph, current, first_byte + offset);
                    }
                });
        } else {
            for (byte_index, byte) in self.next.iter_mut().enumerate() {
                *byte = evaluate_byte(graph, current, byte_index);
            }
        }

        std::mem::swap(&mut self.current, &mut self.next);
        self.generation += 1;
    }

    /// Advances `ticks` generations.
    pub fn run(&mut self, ticks: u64) {
        for _ in 0..ticks {
            self.step();
        }
    }

    pub fn graph(&self) -> &Arc<WireGraph> {
        &self.graph
    }

    /// Ticks completed since construction.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// The packed current generation, one bit per wire slot.
    pub fn states(&self) -> &[u8] {
        &self.current
    }

    pub fn is_active(&self, id: WireId) -> bool {
        read_bit(&self.current, id)
    }

    /// Real wires (padding excluded) that are active in the current generation.
    pub fn active_count(&self) -> usize {
        (1..=self.graph.wire_count())
            .filter(|&id| self.is_active(id))
            .count()
    }
}

/// Next-generation value of the eight wires packed into `byte_index`.
fn evaluate_byte(graph: &WireGraph, current: &[u8], byte_index: usize) -> u8 {
    let mut byte = 0u8;
    for bit in 0..8 {
        let id = (byte_index * 8 + bit) as WireId;
        let incoming = graph.incoming(id);
        let active = if incoming.is_empty() {
            read_bit(current, id)
        } else {
            incoming.iter().any(|&source| read_bit(current, source))
        };
        byte |= (active as u8) << bit;
    }
    byte
}
