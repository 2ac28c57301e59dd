//! # Voxel World Entry Point
//!
//! Runs the headless demo: opens a world, streams terrain around a walking
//! player for a few seconds, edits a block and saves on exit.
//!
//! ## Usage
//!
//! ```bash
//! RUST_LOG=info cargo run --release -- settings.json
//! ```

fn main() {
    voxel_world::run();
}
