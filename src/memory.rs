use std::{error::Error, fmt};

/// The whole address space: one byte per address.
pub const MEMORY_SIZE: usize = 256;

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum MemoryError {
    /// Address outside of `[0, MEMORY_SIZE)`
    AccessViolation { address: usize },
    /// Source and destination of a copy share at least one cell
    OverlappingCopy { to: usize, from: usize, count: usize },
}

impl Error for MemoryError {}

impl fmt::Display for MemoryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AccessViolation { address } => {
                write!(f, "Memory access violation at {}", address)
            }
            Self::OverlappingCopy { to, from, count } => write!(
                f,
                "Memory access violation at {}: cannot copy {} bytes from overlapping address {}",
                to, count, from
            ),
        }
    }
}

/// Flat, bounds-checked byte memory.
#[derive(Clone, Debug)]
pub struct Memory {
    data: [u8; MEMORY_SIZE],
    /// Most recently touched address. Diagnostic only.
    last_access: Option<usize>,
}

impl Default for Memory {
    fn default() -> Self {
        Self::new()
    }
}

impl Memory {
    pub fn new() -> Self {
        Memory {
            data: [0; MEMORY_SIZE],
            last_access: None,
        }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Read-only view of every cell, for inspection.
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn last_access(&self) -> Option<usize> {
        self.last_access
    }

    fn check(&self, address: usize) -> Result<(), MemoryError> {
        if address < self.data.len() {
            Ok(())
        } else {
            Err(MemoryError::AccessViolation { address })
        }
    }

    /// Check that `count` cells starting at `address` are all addressable.
    fn check_range(&self, address: usize, count: usize) -> Result<(), MemoryError> {
        self.check(address)?;
        match address.checked_add(count) {
            Some(end) if end <= self.data.len() => Ok(()),
            _ => Err(MemoryError::AccessViolation { address }),
        }
    }

    pub fn load(&mut self, address: usize) -> Result<u8, MemoryError> {
        self.check(address)?;
        self.last_access = Some(address);
        Ok(self.data[address])
    }

    pub fn store(&mut self, address: usize, value: u8) -> Result<(), MemoryError> {
        self.check(address)?;
        self.last_access = Some(address);
        self.data[address] = value;
        Ok(())
    }

    /// Copy `count` bytes from `from` to `to`. Overlapping ranges are rejected.
    pub fn copy(&mut self, to: usize, from: usize, count: usize) -> Result<(), MemoryError> {
        self.check_range(to, count)?;
        self.check_range(from, count)?;
        if count > 0 && from < to + count && to < from + count {
            return Err(MemoryError::OverlappingCopy { to, from, count });
        }
        self.data.copy_within(from..from + count, to);
        if count > 0 {
            self.last_access = Some(to + count - 1);
        }
        Ok(())
    }

    /// Copy a program image to the start of memory. Cells past the image are left untouched.
    pub fn load_program(&mut self, code: &[u8]) -> Result<(), MemoryError> {
        if code.len() > self.data.len() {
            return Err(MemoryError::AccessViolation {
                address: code.len() - 1,
            });
        }
        self.data[..code.len()].copy_from_slice(code);
        Ok(())
    }

    /// Zero every cell and forget the last access.
    pub fn reset(&mut self) {
        self.data = [0; MEMORY_SIZE];
        self.last_access = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_store() {
        let mut mem = Memory::new();
        mem.store(10, 42).unwrap();
        assert_eq!(mem.load(10), Ok(42));
        assert_eq!(mem.last_access(), Some(10));
        mem.store(255, 1).unwrap();
        assert_eq!(mem.load(255), Ok(1));
    }

    #[test]
    fn out_of_bounds() {
        let mut mem = Memory::new();
        assert_eq!(
            mem.load(256),
            Err(MemoryError::AccessViolation { address: 256 })
        );
        assert_eq!(
            mem.store(300, 1),
            Err(MemoryError::AccessViolation { address: 300 })
        );
        assert_eq!(mem.last_access(), None);
    }

    #[test]
    fn copy_disjoint() {
        let mut mem = Memory::new();
        mem.load_program(b"hello").unwrap();
        mem.copy(232, 0, 5).unwrap();
        assert_eq!(&mem.data()[232..237], b"hello");
        assert_eq!(mem.last_access(), Some(236));
    }

    #[test]
    fn copy_to_end_of_memory() {
        let mut mem = Memory::new();
        mem.copy(232, 0, 24).unwrap();
        assert!(mem.copy(233, 0, 24).is_err());
        assert!(mem.copy(0, 240, 17).is_err());
    }

    #[test]
    fn copy_rejects_overlap() {
        let mut mem = Memory::new();
        // Source after destination
        assert_eq!(
            mem.copy(10, 12, 4),
            Err(MemoryError::OverlappingCopy {
                to: 10,
                from: 12,
                count: 4
            })
        );
        // Source before destination
        assert!(mem.copy(12, 10, 4).is_err());
        assert!(mem.copy(10, 10, 1).is_err());
        // Adjacent ranges do not overlap
        assert!(mem.copy(10, 14, 4).is_ok());
        // Nothing to copy
        assert!(mem.copy(10, 10, 0).is_ok());
    }

    #[test]
    fn reset_clears_everything() {
        let mut mem = Memory::new();
        mem.load_program(&[1, 2, 3]).unwrap();
        mem.load(1).unwrap();
        mem.reset();
        assert!(mem.data().iter().all(|&cell| cell == 0));
        assert_eq!(mem.last_access(), None);
    }

    #[test]
    fn program_too_large() {
        let mut mem = Memory::new();
        assert!(mem.load_program(&[0; 257]).is_err());
        assert!(mem.load_program(&[7; 256]).is_ok());
    }
}
