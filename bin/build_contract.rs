//! Binary for building WASM contracts from odra modules.
#![doc = "Binary for building WASM contracts from odra modules."]

#[allow(unused_imports)]
use pluto_lending;

fn main() {
    // Compilation to WASM is driven by odra-build; this entry point only links the crate.
}
