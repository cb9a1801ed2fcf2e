//! Command-line surface: one struct, one `clap` derive, no on-disk config file — every toggle is
//! CLI-driven.

use clap::Parser;
use std::path::PathBuf;

/// `cruciblec`: compiles already name-resolved, type-checked translation units to native
/// x86-64 object code.
#[derive(Parser, Debug)]
#[command(name = "cruciblec", version, about)]
pub struct Options {
    /// Input source files.
    pub inputs: Vec<PathBuf>,

    /// Output binary name (only meaningful together with `--link`).
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Optimization level. Level 0 skips SSA construction and trivial DCE entirely.
    #[arg(short = 'O', long = "opt-level", default_value_t = 1, value_parser = clap::value_parser!(u8).range(0..=3))]
    pub opt_level: u8,

    /// Keep source-level debug info. Accepted for CLI-surface completeness; no debug info is
    /// emitted by this backend.
    #[arg(long)]
    pub debug: bool,

    /// Enable developer diagnostics (verbose pass tracing beyond `RUST_LOG`).
    #[arg(long)]
    pub devel: bool,

    /// Dump the parsed syntax tree. Accepted for CLI-surface completeness; the front end that
    /// would produce an AST is an external collaborator this crate does not implement.
    #[arg(long)]
    pub dump_ast: bool,

    /// Dump LLVM IR. Accepted but inert: no LLVM backend is implemented.
    #[arg(long)]
    pub dump_llvm_ir: bool,

    /// Dump the selected machine IR for each function before register allocation.
    #[arg(long)]
    pub dump_machine_ir: bool,

    /// Dump the SSA-form IR after construction and DCE.
    #[arg(long)]
    pub dump_siir: bool,

    /// Keep the intermediate `.s` file instead of deleting it after assembly.
    #[arg(long)]
    pub keep_asm: bool,

    /// Keep the `.o` file even when `--link` also runs the linker.
    #[arg(long)]
    pub keep_obj: bool,

    /// Invoke the linker after assembling every input.
    #[arg(long)]
    pub link: bool,

    /// Route code generation through an alternate LLVM backend. Accepted but inert: no such
    /// backend exists in this crate.
    #[arg(long)]
    pub llvm: bool,

    /// Omit the standard runtime object from the final link.
    #[arg(long)]
    pub nostd: bool,

    /// Print wall-clock time spent in each pass.
    #[arg(long)]
    pub time: bool,
}
