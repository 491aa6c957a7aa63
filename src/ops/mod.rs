pub mod flood_fill;
pub mod strokes;
