use std::{error::Error, fmt};

use miette::{Diagnostic, LabeledSpan};

use crate::symbol::Span;

/// Kind of value an out-of-range literal was meant to be.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum OperandKind {
    Number,
    Address,
}

impl fmt::Display for OperandKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OperandKind::Number => f.write_str("number"),
            OperandKind::Address => f.write_str("address"),
        }
    }
}

#[derive(Clone, PartialEq, Eq, Debug)]
pub enum AsmErrorKind {
    Syntax,
    InvalidInstruction(String),
    /// Operand types (or count) do not match any encoding of the instruction.
    UnsupportedOperands { instr: &'static str, binary: bool },
    TooManyArguments(&'static str),
    InvalidNumber,
    OutOfRange(OperandKind),
    MultiCharLiteral,
    NonByteChar(char),
    DuplicateLabel(String),
    UndefinedLabel(String),
    LabelOutOfRange(String),
    ProgramTooLarge,
}

/// Failure to assemble a program. No partial program survives an error.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct AsmError {
    pub kind: AsmErrorKind,
    /// Zero-based source line
    pub line: usize,
    pub span: Span,
}

impl AsmError {
    pub fn new(kind: AsmErrorKind, line: usize, span: Span) -> Self {
        AsmError { kind, line, span }
    }

    fn code_str(&self) -> &'static str {
        match self.kind {
            AsmErrorKind::Syntax => "parse::syntax",
            AsmErrorKind::InvalidInstruction(_) => "parse::instruction",
            AsmErrorKind::UnsupportedOperands { .. } | AsmErrorKind::TooManyArguments(_) => {
                "parse::operands"
            }
            AsmErrorKind::InvalidNumber
            | AsmErrorKind::OutOfRange(_)
            | AsmErrorKind::MultiCharLiteral
            | AsmErrorKind::NonByteChar(_) => "parse::bad_lit",
            AsmErrorKind::DuplicateLabel(_) => "parse::duplicate_label",
            AsmErrorKind::UndefinedLabel(_) | AsmErrorKind::LabelOutOfRange(_) => {
                "backpatch::label"
            }
            AsmErrorKind::ProgramTooLarge => "emit::too_large",
        }
    }

    fn help_text(&self) -> &'static str {
        match self.kind {
            AsmErrorKind::Syntax => {
                "lines hold an optional `label:`, a mnemonic and up to two comma-separated operands"
            }
            AsmErrorKind::InvalidInstruction(_) => {
                "available instructions: DB CP ADD SUB INC DEC CMP JP JC JNC JZ JNZ PRND PRNS"
            }
            AsmErrorKind::UnsupportedOperands { .. } | AsmErrorKind::TooManyArguments(_) => {
                "check the operands allowed for this instruction"
            }
            AsmErrorKind::InvalidNumber => "allowed formats: 200, 200d, 0xA4, 0o48, 101b",
            AsmErrorKind::OutOfRange(_) => "values must fit into a single byte",
            AsmErrorKind::MultiCharLiteral | AsmErrorKind::NonByteChar(_) => {
                "use a string literal in double quotes for text"
            }
            AsmErrorKind::DuplicateLabel(_) => {
                "labels may only be declared once per file, regardless of case"
            }
            AsmErrorKind::UndefinedLabel(_) => "declare the label with `name:` somewhere in the file",
            AsmErrorKind::LabelOutOfRange(_) | AsmErrorKind::ProgramTooLarge => {
                "the whole program must fit into 256 bytes of memory"
            }
        }
    }

    fn label_text(&self) -> &'static str {
        match self.kind {
            AsmErrorKind::Syntax => "unexpected token",
            AsmErrorKind::InvalidInstruction(_) => "unknown instruction",
            AsmErrorKind::UnsupportedOperands { .. } => "invalid operands",
            AsmErrorKind::TooManyArguments(_) => "extra operand",
            AsmErrorKind::InvalidNumber
            | AsmErrorKind::OutOfRange(_)
            | AsmErrorKind::MultiCharLiteral
            | AsmErrorKind::NonByteChar(_) => "incorrect literal",
            AsmErrorKind::DuplicateLabel(_) => "duplicate label",
            AsmErrorKind::UndefinedLabel(_) | AsmErrorKind::LabelOutOfRange(_) => "label used here",
            AsmErrorKind::ProgramTooLarge => "overflowing instruction",
        }
    }
}

impl fmt::Display for AsmErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Syntax => write!(f, "Syntax error"),
            Self::InvalidInstruction(instr) => write!(f, "Invalid instruction: {}", instr),
            Self::UnsupportedOperands {
                instr,
                binary: true,
            } => write!(f, "{} does not support these operands", instr),
            Self::UnsupportedOperands {
                instr,
                binary: false,
            } => write!(f, "{} does not support this operand", instr),
            Self::TooManyArguments(instr) => write!(f, "{}: too many arguments", instr),
            Self::InvalidNumber => write!(f, "Invalid number format"),
            Self::OutOfRange(kind) => write!(f, "{} must have a value between 0-255", kind),
            Self::MultiCharLiteral => {
                write!(f, "Only one character is allowed. Use String instead")
            }
            Self::NonByteChar(ch) => write!(f, "Character '{}' does not fit into a byte", ch),
            Self::DuplicateLabel(label) => write!(f, "Duplicate label: {}", label),
            Self::UndefinedLabel(label) => write!(f, "Undefined label: {}", label),
            Self::LabelOutOfRange(label) => write!(f, "Label points outside of memory: {}", label),
            Self::ProgramTooLarge => write!(f, "Program does not fit into memory"),
        }
    }
}

impl fmt::Display for AsmError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.kind)
    }
}

impl Error for AsmError {}

impl Diagnostic for AsmError {
    fn code<'a>(&'a self) -> Option<Box<dyn fmt::Display + 'a>> {
        Some(Box::new(self.code_str()))
    }

    fn help<'a>(&'a self) -> Option<Box<dyn fmt::Display + 'a>> {
        Some(Box::new(self.help_text()))
    }

    fn labels(&self) -> Option<Box<dyn Iterator<Item = LabeledSpan> + '_>> {
        let label = LabeledSpan::at(self.span, self.label_text());
        Some(Box::new(std::iter::once(label)))
    }
}
