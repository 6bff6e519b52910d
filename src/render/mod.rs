//! Output generation: the PNG heatmap and the optional JSON matrix export.

pub mod export;
pub mod heatmap;

pub use export::{build_export, write_json_export};
pub use heatmap::{HeatmapRenderer, RenderOptions};
