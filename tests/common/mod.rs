//! Helpers shared by the integration tests.
//!
//! Pictures are written as rows of characters: `#` is an inactive wire pixel,
//! `*` an active one, anything else background.

#![allow(dead_code)]

use wire_logic::{DecodeError, DecoderConfig, WireGraph, decode};

pub const INACTIVE: [u8; 3] = [0x00, 0x80, 0xFF];
pub const ACTIVE: [u8; 3] = [0xFF, 0x00, 0x00];
pub const WHITE: [u8; 3] = [0xFF, 0xFF, 0xFF];

fn colour(c: char) -> [u8; 3] {
    match c {
        '#' => INACTIVE,
        '*' => ACTIVE,
        _ => WHITE,
    }
}

pub fn rgb(rows: &[&str]) -> Vec<u8> {
    rows.iter().flat_map(|row| row.chars()).flat_map(colour).collect()
}

pub fn rgba(rows: &[&str]) -> Vec<u8> {
    rows.iter()
        .flat_map(|row| row.chars())
        .flat_map(|c| {
            let [r, g, b] = colour(c);
            [r, g, b, 0xFF]
        })
        .collect()
}

pub fn decode_rows(rows: &[&str]) -> Result<WireGraph, DecodeError> {
    decode_rows_with(rows, DecoderConfig::default())
}

pub fn decode_rows_with(rows: &[&str], config: DecoderConfig) -> Result<WireGraph, DecodeError> {
    decode(&rgba(rows), rows[0].len() as u32, rows.len() as u32, 4, config)
}

/// The wire id owning a non-crossing pixel.
pub fn wire_at(graph: &WireGraph, x: u32, y: u32) -> u32 {
    match graph.pixel_owner(x, y) {
        Some(wire_logic::pipeline::PixelOwner::Wire(id)) => id,
        other => panic!("pixel ({x}, {y}) is not a plain wire pixel: {other:?}"),
    }
}
