//! Risk-colored annotation of the normalized radiograph.

mod draw;
mod glyphs;

pub use draw::{RiskVisualizer, Visualizer, GRAY_ZONE_COLOR};
