use fxhash::FxBuildHasher;
use indexmap::IndexMap;
use miette::SourceSpan;

/// Insertion-ordered map, used for the label table and line mapping.
pub type FxMap<K, V> = IndexMap<K, V, FxBuildHasher>;

pub fn new_map<K, V>() -> FxMap<K, V> {
    IndexMap::with_hasher(FxBuildHasher::default())
}

/// Used to refer to offsets from the start of a source file.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Debug)]
pub struct SrcOffset(pub usize);

/// Location within source
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct Span {
    offs: SrcOffset,
    len: usize,
}

impl Span {
    pub fn new(offs: SrcOffset, len: usize) -> Self {
        Span { offs, len }
    }

    pub fn dummy() -> Self {
        Span {
            offs: SrcOffset(0),
            len: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn offs(&self) -> usize {
        self.offs.0
    }

    pub fn end(&self) -> usize {
        self.offs.0 + self.len
    }
}

impl From<Span> for SourceSpan {
    fn from(value: Span) -> Self {
        SourceSpan::new(value.offs().into(), value.len())
    }
}

/// Number of general purpose registers.
pub const GPR_COUNT: usize = 4;

/// A register-class operand, as encoded in an instruction byte.
///
/// Indices `0..=3` select a general purpose register, index `4` selects the
/// stack pointer.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Debug)]
pub enum Register {
    Gpr(usize),
    Sp,
}

impl TryFrom<u8> for Register {
    type Error = u8;

    fn try_from(index: u8) -> Result<Self, Self::Error> {
        match index as usize {
            i if i < GPR_COUNT => Ok(Register::Gpr(i)),
            GPR_COUNT => Ok(Register::Sp),
            _ => Err(index),
        }
    }
}

/// Label as written in source. Lookup is case-sensitive.
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub struct Label(String);

impl Label {
    pub fn new(name: &str) -> Self {
        Label(name.to_string())
    }

    pub fn name(&self) -> &str {
        &self.0
    }

    /// Key used to detect duplicates; labels differing only in case collide.
    pub fn normalized(&self) -> String {
        self.0.to_uppercase()
    }
}
