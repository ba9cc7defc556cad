//! Terminal git repository viewer with stable branch topology
//! reconstruction.
//!
//! Binary crate entry point. All CLI logic is in the `cli` module; the
//! engine lives in the `grove` library crate.

// mimalloc aggressively returns freed pages to the OS; graph rebuilds on
// every refresh otherwise fragment the default allocator's heap.
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

mod cli;

fn main() {
    cli::run();
}
