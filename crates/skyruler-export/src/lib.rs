//! skyruler-export: Pure overlay serializers (sans-IO)
//!
//! Renders finalized measurements (and an unfinished preview) into
//! output formats. Currently supports SVG.

pub mod svg;

pub use svg::{SvgMetadata, to_svg};
