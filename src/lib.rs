// Parsing
mod parser;
pub use parser::{is_label, parse_number, AsmParser};
mod air;
pub use air::{Air, Program};
mod opcode;
pub use opcode::Opcode;

// Running
mod memory;
pub use memory::{Memory, MemoryError, MEMORY_SIZE};
mod cpu;
pub use cpu::{check_operation, Cpu, Evaluated, Fault, FaultKind, MAX_PRINT_LEN, MAX_SP, MIN_SP};
mod runtime;
pub use runtime::{Event, Machine, Output, RunError};
pub mod output;

mod symbol;
pub use symbol::{Register, Span, GPR_COUNT};

mod error;
pub use error::{AsmError, AsmErrorKind, OperandKind};
mod lexer;

pub mod env;

/// Amount of lines to show as context, each side of focus line (line containing span).
pub const DIAGNOSTIC_CONTEXT_LINES: usize = 8;

/// Assemble source text into a loadable program image.
pub fn assemble(src: &str) -> Result<Program, AsmError> {
    AsmParser::new(src).parse()?.backpatch()
}
