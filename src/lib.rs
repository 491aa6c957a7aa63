//! Raster annotation engine: brush strokes, scan-line fills and
//! service-backed paint fill over a source image, with a bounded undo
//! history and a pan/zoom view.

#![allow(clippy::too_many_arguments)]
#![allow(clippy::large_enum_variant)]

#[macro_use]
pub mod logger;
pub mod api;
pub mod canvas;
pub mod cli;
pub mod components;
pub mod controller;
pub mod io;
pub mod ops;
pub mod project;
pub mod raster;
pub mod render;
pub mod settings;
