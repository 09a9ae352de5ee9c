//! Chart rendering.
//!
//! Only SVG output is supported; the server inlines it in the dashboard page
//! and serves it standalone from `/api/charts/:chart.svg`.

pub mod svg;

pub use svg::{render_chart_svg, DEFAULT_HEIGHT, DEFAULT_WIDTH};
