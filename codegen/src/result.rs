//! Errors the codegen pipeline can report.
//!
//! Every one of these is fatal: there is no partial build or recovery path. The driver's job is
//! to print one of these (with its source location prefix) and terminate with a non-zero exit
//! code.

use thiserror::Error;

pub type CodegenResult<T> = Result<T, CodegenError>;

#[derive(Error, Debug)]
pub enum CodegenError {
    #[error("call to `{callee}` has {got} arguments, but no more than 6 are supported")]
    TooManyCallArguments { callee: String, got: usize },

    #[error("register allocation failed for `{function}`: no free {class} register available for v{value} over [{start}, {end}); spilling is not implemented")]
    RegisterAllocationFailed {
        function: String,
        class: &'static str,
        value: u32,
        start: u32,
        end: u32,
    },

    #[error("inline assembly constraint `{constraint}` is not supported")]
    UnsupportedAsmConstraint { constraint: String },

    #[error("broken invariant in `{function}`: {detail}")]
    BrokenInvariant { function: String, detail: String },

    #[error("assembler exited with status {status}: {stderr}")]
    AssemblerFailed { status: i32, stderr: String },

    #[error("linker exited with status {status}: {stderr}")]
    LinkerFailed { status: i32, stderr: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
