use fxhash::FxHashSet;

use crate::error::{AsmError, AsmErrorKind};
use crate::memory::MEMORY_SIZE;
use crate::opcode::Opcode;
use crate::symbol::{new_map, FxMap, Label, Span};

/// A label reference waiting for its declaration to be known.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct PendingLabel {
    pub label: Label,
    /// Line of the reference, for error reporting
    pub line: usize,
    pub span: Span,
}

/// One cell of the program image before backpatching.
#[derive(Clone, PartialEq, Eq, Debug)]
pub enum Cell {
    Byte(u8),
    Pending(PendingLabel),
}

impl From<u8> for Cell {
    fn from(value: u8) -> Self {
        Cell::Byte(value)
    }
}

/// Assembly intermediate representation: the program image with unresolved labels, the line
/// mapping and the label table as built by the single forward pass.
#[derive(Debug, Default)]
pub struct Air {
    code: Vec<Cell>,
    /// Offset of an instruction's first byte -> source line
    mapping: FxMap<usize, usize>,
    /// Label -> offset of declaration
    labels: FxMap<String, usize>,
    /// Case-folded label names, to detect duplicates
    normalized: FxHashSet<String>,
}

impl Air {
    pub fn new() -> Self {
        Air {
            code: Vec::new(),
            mapping: new_map(),
            labels: new_map(),
            normalized: FxHashSet::default(),
        }
    }

    /// Bind `label` to the current end of the image. Error if declared before, ignoring case.
    pub fn add_label(&mut self, label: &Label, line: usize, span: Span) -> Result<(), AsmError> {
        if !self.normalized.insert(label.normalized()) {
            return Err(AsmError::new(
                AsmErrorKind::DuplicateLabel(label.name().to_string()),
                line,
                span,
            ));
        }
        self.labels.insert(label.name().to_string(), self.code.len());
        Ok(())
    }

    /// Append an instruction and record which line it came from.
    pub fn add_instr(&mut self, op: Opcode, operands: Vec<Cell>, line: usize) {
        debug_assert_eq!(operands.len(), op.operand_count());
        self.mapping.insert(self.code.len(), line);
        self.code.push(Cell::Byte(op.into()));
        self.code.extend(operands);
    }

    /// Append raw data. Data is not an instruction, so no mapping is recorded.
    pub fn add_data(&mut self, data: impl IntoIterator<Item = Cell>) {
        self.code.extend(data);
    }

    /// Whether the image still fits into memory.
    pub fn fits(&self) -> bool {
        self.code.len() <= MEMORY_SIZE
    }

    /// Use labels filled during parsing to resolve every pending reference.
    pub fn backpatch(self) -> Result<Program, AsmError> {
        let mut code = Vec::with_capacity(self.code.len());
        for cell in self.code {
            let byte = match cell {
                Cell::Byte(byte) => byte,
                Cell::Pending(pending) => {
                    let Some(&offs) = self.labels.get(pending.label.name()) else {
                        return Err(AsmError::new(
                            AsmErrorKind::UndefinedLabel(pending.label.name().to_string()),
                            pending.line,
                            pending.span,
                        ));
                    };
                    u8::try_from(offs).map_err(|_| {
                        AsmError::new(
                            AsmErrorKind::LabelOutOfRange(pending.label.name().to_string()),
                            pending.line,
                            pending.span,
                        )
                    })?
                }
            };
            code.push(byte);
        }
        Ok(Program {
            code,
            mapping: self.mapping,
            labels: self.labels,
        })
    }
}

/// A fully resolved program image, ready to be loaded at address 0.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct Program {
    code: Vec<u8>,
    mapping: FxMap<usize, usize>,
    labels: FxMap<String, usize>,
}

impl Program {
    /// Wrap a raw image, e.g. one read back from disk. No source information is attached.
    pub fn from_raw(code: Vec<u8>) -> Self {
        Program {
            code,
            mapping: new_map(),
            labels: new_map(),
        }
    }

    pub fn code(&self) -> &[u8] {
        &self.code
    }

    pub fn mapping(&self) -> &FxMap<usize, usize> {
        &self.mapping
    }

    pub fn labels(&self) -> &FxMap<String, usize> {
        &self.labels
    }

    /// Source line of the instruction starting at `offs`, if any.
    pub fn line_of(&self, offs: usize) -> Option<usize> {
        self.mapping.get(&offs).copied()
    }

    pub fn len(&self) -> usize {
        self.code.len()
    }

    pub fn is_empty(&self) -> bool {
        self.code.is_empty()
    }
}
