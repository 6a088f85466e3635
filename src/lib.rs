//! Horde Viewer Library
//!
//! Live viewer for the horde simulation debug server: a TCP client that
//! decodes the server's binary packet stream into a shared world snapshot,
//! and a renderer-agnostic transform/scene layer for drawing it.

pub mod config;
pub mod net;
pub mod render;
pub mod util;
pub mod world;
