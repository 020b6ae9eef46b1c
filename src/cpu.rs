use std::{error::Error, fmt};

use miette::Diagnostic;

use crate::memory::{Memory, MemoryError};
use crate::opcode::Opcode;
use crate::symbol::{Register, GPR_COUNT};

/// Highest value the stack pointer may hold; also its value after reset.
pub const MAX_SP: u8 = 231;
/// Lowest value the stack pointer may hold.
pub const MIN_SP: u8 = 0;
/// Longest run of bytes a single `PRNS` will print.
pub const MAX_PRINT_LEN: usize = 24;

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum FaultKind {
    /// `step` was called while the CPU is latched in a fault.
    Latched,
    InvalidOpcode(u8),
    InvalidRegister(u8),
    IpOutOfBounds(usize),
    JumpOutOfBounds(usize),
    StackOverflow,
    StackUnderflow,
    /// Reserved for division instructions.
    DivisionByZero,
    Memory(MemoryError),
}

/// Runtime error raised by [`Cpu::step`]. Raising one latches the CPU until reset.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct Fault {
    pub kind: FaultKind,
    /// Instruction pointer at the start of the faulting step
    pub ip: usize,
}

impl fmt::Display for FaultKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Latched => write!(f, "FAULT. Reset to continue."),
            Self::InvalidOpcode(op) => write!(f, "Invalid op code: {}", op),
            Self::InvalidRegister(reg) => write!(f, "Invalid register: {}", reg),
            Self::IpOutOfBounds(_) => write!(f, "Instruction pointer is outside of memory"),
            Self::JumpOutOfBounds(target) => write!(f, "IP outside memory: {}", target),
            Self::StackOverflow => write!(f, "Stack overflow"),
            Self::StackUnderflow => write!(f, "Stack underflow"),
            Self::DivisionByZero => write!(f, "Division by 0"),
            Self::Memory(err) => write!(f, "{}", err),
        }
    }
}

impl fmt::Display for Fault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (IP = {})", self.kind, self.ip)
    }
}

impl Error for Fault {}

impl Diagnostic for Fault {
    fn code<'a>(&'a self) -> Option<Box<dyn fmt::Display + 'a>> {
        let code = match self.kind {
            FaultKind::Latched => "run::latched",
            FaultKind::InvalidOpcode(_) => "run::opcode",
            FaultKind::InvalidRegister(_) => "run::register",
            FaultKind::IpOutOfBounds(_) | FaultKind::JumpOutOfBounds(_) => "run::ip",
            FaultKind::StackOverflow | FaultKind::StackUnderflow => "run::stack",
            FaultKind::DivisionByZero => "run::division",
            FaultKind::Memory(_) => "run::memory",
        };
        Some(Box::new(code))
    }

    fn help<'a>(&'a self) -> Option<Box<dyn fmt::Display + 'a>> {
        let help = match self.kind {
            FaultKind::Latched => "reset the machine to run again",
            FaultKind::InvalidOpcode(_) => {
                "execution reached data; make sure data is placed after the last instruction"
            }
            FaultKind::InvalidRegister(_) => "registers 0-3 are general purpose, 4 is the stack pointer",
            FaultKind::StackOverflow | FaultKind::StackUnderflow => {
                "the stack pointer must stay between 0 and 231"
            }
            _ => return None,
        };
        Some(Box::new(help))
    }
}

impl From<MemoryError> for FaultKind {
    fn from(err: MemoryError) -> Self {
        FaultKind::Memory(err)
    }
}

/// Outcome of the flag evaluation applied to every arithmetic result.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct Evaluated {
    pub value: u8,
    pub zero: bool,
    pub carry: bool,
}

/// Reduce a raw arithmetic result to a byte and derive the flags for it.
///
/// Results of 256 and above set carry without recomputing zero against the wrapped value.
pub fn check_operation(raw: i32) -> Evaluated {
    if raw >= 256 {
        Evaluated {
            value: (raw % 256) as u8,
            zero: false,
            carry: true,
        }
    } else if raw == 0 {
        Evaluated {
            value: 0,
            zero: true,
            carry: false,
        }
    } else if raw < 0 {
        Evaluated {
            value: raw.rem_euclid(256) as u8,
            zero: false,
            carry: true,
        }
    } else {
        Evaluated {
            value: raw as u8,
            zero: false,
            carry: false,
        }
    }
}

/// The register file. Mutated only through [`Cpu::step`] and [`Cpu::reset`].
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct Cpu {
    gpr: [u8; GPR_COUNT],
    sp: u8,
    ip: usize,
    zero: bool,
    carry: bool,
    fault: bool,
    /// Bytes written above the stack pointer by the last print instruction
    print_len: usize,
}

impl Default for Cpu {
    fn default() -> Self {
        Self::new()
    }
}

impl Cpu {
    pub fn new() -> Self {
        Cpu {
            gpr: [0; GPR_COUNT],
            sp: MAX_SP,
            ip: 0,
            zero: false,
            carry: false,
            fault: false,
            print_len: 0,
        }
    }

    /// Return to the power-on state, clearing any fault.
    pub fn reset(&mut self) {
        *self = Self::new();
    }

    pub fn gpr(&self) -> &[u8; GPR_COUNT] {
        &self.gpr
    }

    pub fn sp(&self) -> u8 {
        self.sp
    }

    pub fn ip(&self) -> usize {
        self.ip
    }

    pub fn zero(&self) -> bool {
        self.zero
    }

    pub fn carry(&self) -> bool {
        self.carry
    }

    pub fn fault(&self) -> bool {
        self.fault
    }

    /// Length of the run copied to [`Cpu::output_address`] by the last `PRND` or `PRNS`.
    pub fn print_len(&self) -> usize {
        self.print_len
    }

    /// Execute one instruction.
    ///
    /// Returns `Ok(false)` when the halt marker is fetched; the instruction pointer stays on it.
    /// Any error latches the fault flag, after which every call fails until [`Cpu::reset`].
    pub fn step(&mut self, mem: &mut Memory) -> Result<bool, Fault> {
        let ip = self.ip;
        if self.fault {
            return Err(Fault {
                kind: FaultKind::Latched,
                ip,
            });
        }
        self.execute(mem).map_err(|kind| {
            self.fault = true;
            Fault { kind, ip }
        })
    }

    fn execute(&mut self, mem: &mut Memory) -> Result<bool, FaultKind> {
        if self.ip >= mem.len() {
            return Err(FaultKind::IpOutOfBounds(self.ip));
        }
        let byte = mem.load(self.ip)?;
        let op = Opcode::try_from(byte).map_err(FaultKind::InvalidOpcode)?;
        if op == Opcode::None {
            return Ok(false);
        }

        // Operands are decoded up front; IP is only committed on success
        let mut operands = [0u8; 2];
        for (i, operand) in operands.iter_mut().take(op.operand_count()).enumerate() {
            *operand = mem.load(self.ip + 1 + i)?;
        }
        let [a, b] = operands;
        let mut next_ip = self.ip + op.width();

        match op {
            Opcode::None => unreachable!(),
            Opcode::CpNumberToAddress => mem.store(a as usize, b)?,
            Opcode::CpAddressToAddress => {
                let value = mem.load(b as usize)?;
                mem.store(a as usize, value)?;
            }
            Opcode::AddNumberToRegister => self.arithmetic(a, |reg| reg + b as i32)?,
            Opcode::AddAddressToRegister => {
                let value = mem.load(b as usize)? as i32;
                self.arithmetic(a, |reg| reg + value)?;
            }
            Opcode::SubNumberFromRegister => self.arithmetic(a, |reg| reg - b as i32)?,
            Opcode::SubAddressFromRegister => {
                let value = mem.load(b as usize)? as i32;
                self.arithmetic(a, |reg| reg - value)?;
            }
            Opcode::IncRegister => self.arithmetic(a, |reg| reg + 1)?,
            Opcode::DecRegister => self.arithmetic(a, |reg| reg - 1)?,
            Opcode::CmpNumberWithRegister => {
                let reg = self.register(a)? as i32;
                self.set_flags(check_operation(reg - b as i32));
            }
            Opcode::CmpAddressWithRegister => {
                let reg = self.register(a)? as i32;
                let value = mem.load(b as usize)? as i32;
                self.set_flags(check_operation(reg - value));
            }
            Opcode::Jp => next_ip = Self::jump_target(a as usize, mem)?,
            Opcode::Jc if self.carry => next_ip = Self::jump_target(a as usize, mem)?,
            Opcode::Jnc if !self.carry => next_ip = Self::jump_target(a as usize, mem)?,
            Opcode::Jz if self.zero => next_ip = Self::jump_target(a as usize, mem)?,
            Opcode::Jnz if !self.zero => next_ip = Self::jump_target(a as usize, mem)?,
            Opcode::Jc | Opcode::Jnc | Opcode::Jz | Opcode::Jnz => {}
            Opcode::PrintDecimal => {
                let value = mem.load(a as usize)?;
                mem.store(self.output_address(), value)?;
                self.print_len = 1;
            }
            Opcode::PrintString => {
                let from = a as usize;
                let mut count = 0;
                while count < MAX_PRINT_LEN && from + count < mem.len() {
                    count += 1;
                    if mem.load(from + count - 1)? == 0 {
                        break;
                    }
                }
                mem.copy(self.output_address(), from, count)?;
                self.print_len = count;
            }
        }

        self.ip = next_ip;
        Ok(true)
    }

    /// Where print instructions leave their output for the driver to pick up.
    pub fn output_address(&self) -> usize {
        self.sp as usize + 1
    }

    /// Apply `op` to a register slot, storing the normalized result and updating the flags.
    ///
    /// Nothing is modified if the slot or the stack bounds check fails.
    fn arithmetic(&mut self, reg: u8, op: impl FnOnce(i32) -> i32) -> Result<(), FaultKind> {
        let slot = Register::try_from(reg).map_err(FaultKind::InvalidRegister)?;
        let raw = op(self.register(reg)? as i32);
        if slot == Register::Sp {
            if raw < MIN_SP as i32 {
                return Err(FaultKind::StackOverflow);
            } else if raw > MAX_SP as i32 {
                return Err(FaultKind::StackUnderflow);
            }
        }
        let result = check_operation(raw);
        self.set_flags(result);
        match slot {
            Register::Gpr(i) => self.gpr[i] = result.value,
            Register::Sp => self.sp = result.value,
        }
        Ok(())
    }

    fn register(&self, reg: u8) -> Result<u8, FaultKind> {
        match Register::try_from(reg).map_err(FaultKind::InvalidRegister)? {
            Register::Gpr(i) => Ok(self.gpr[i]),
            Register::Sp => Ok(self.sp),
        }
    }

    fn set_flags(&mut self, result: Evaluated) {
        self.zero = result.zero;
        self.carry = result.carry;
    }

    fn jump_target(target: usize, mem: &Memory) -> Result<usize, FaultKind> {
        if target < mem.len() {
            Ok(target)
        } else {
            Err(FaultKind::JumpOutOfBounds(target))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(code: &[u8], steps: usize) -> (Cpu, Memory) {
        let mut mem = Memory::new();
        mem.load_program(code).unwrap();
        let mut cpu = Cpu::new();
        for _ in 0..steps {
            cpu.step(&mut mem).unwrap();
        }
        (cpu, mem)
    }

    #[test]
    fn flag_evaluation() {
        assert_eq!(
            check_operation(260),
            Evaluated {
                value: 4,
                zero: false,
                carry: true
            }
        );
        assert_eq!(
            check_operation(256),
            Evaluated {
                value: 0,
                zero: false,
                carry: true
            }
        );
        assert_eq!(
            check_operation(0),
            Evaluated {
                value: 0,
                zero: true,
                carry: false
            }
        );
        assert_eq!(
            check_operation(-2),
            Evaluated {
                value: 254,
                zero: false,
                carry: true
            }
        );
        assert_eq!(
            check_operation(-255),
            Evaluated {
                value: 1,
                zero: false,
                carry: true
            }
        );
        assert_eq!(
            check_operation(77),
            Evaluated {
                value: 77,
                zero: false,
                carry: false
            }
        );
    }

    #[test]
    fn copy_number_to_address() {
        // CP [0], 5 overwrites its own opcode byte
        let (cpu, mem) = run(&[2, 0, 5], 1);
        assert_eq!(mem.data()[0], 5);
        assert_eq!(cpu.ip(), 3);
    }

    #[test]
    fn copy_address_to_address() {
        let (cpu, mem) = run(&[1, 10, 4, 0, 99], 1);
        assert_eq!(mem.data()[10], 99);
        assert_eq!(cpu.ip(), 3);
    }

    #[test]
    fn add_sets_carry_on_overflow() {
        let (cpu, _) = run(&[4, 0, 250, 4, 0, 10], 2);
        assert_eq!(cpu.gpr()[0], 4);
        assert!(cpu.carry());
        assert!(!cpu.zero());
    }

    #[test]
    fn add_from_address_dereferences() {
        let (cpu, _) = run(&[3, 1, 4, 0, 7], 1);
        assert_eq!(cpu.gpr()[1], 7);
    }

    #[test]
    fn sub_wraps_below_zero() {
        let (cpu, _) = run(&[4, 2, 3, 6, 2, 5], 2);
        assert_eq!(cpu.gpr()[2], 254);
        assert!(cpu.carry());
    }

    #[test]
    fn inc_full_cycle() {
        let mut mem = Memory::new();
        // INC [0]; JP 0
        mem.load_program(&[7, 0, 11, 0]).unwrap();
        let mut cpu = Cpu::new();
        for i in 1..=256 {
            cpu.step(&mut mem).unwrap();
            let expected = (i % 256) as u8;
            assert_eq!(cpu.gpr()[0], expected);
            assert_eq!(cpu.carry(), i == 256);
            assert!(!cpu.zero());
            cpu.step(&mut mem).unwrap();
        }
        assert_eq!(cpu.gpr()[0], 0);
    }

    #[test]
    fn dec_to_zero_sets_zero() {
        let (cpu, _) = run(&[4, 3, 1, 8, 3], 2);
        assert_eq!(cpu.gpr()[3], 0);
        assert!(cpu.zero());
        assert!(!cpu.carry());
    }

    #[test]
    fn cmp_only_sets_flags() {
        let (cpu, _) = run(&[4, 0, 9, 10, 0, 9], 2);
        assert_eq!(cpu.gpr()[0], 9);
        assert!(cpu.zero());
        let (cpu, _) = run(&[10, 0, 1], 1);
        assert!(cpu.carry());
        assert_eq!(cpu.gpr()[0], 0);
    }

    #[test]
    fn cmp_with_address() {
        let (cpu, _) = run(&[4, 1, 5, 9, 1, 7, 0, 5], 2);
        assert!(cpu.zero());
        assert_eq!(cpu.ip(), 6);
    }

    #[test]
    fn conditional_jumps() {
        // CMP [0], 0 sets zero; JZ 10
        let (cpu, _) = run(&[10, 0, 0, 13, 10], 2);
        assert_eq!(cpu.ip(), 10);
        // JNZ falls through
        let (cpu, _) = run(&[10, 0, 0, 17, 10], 2);
        assert_eq!(cpu.ip(), 5);
        // JC falls through without carry, JNC jumps
        let (cpu, _) = run(&[12, 40, 16, 50], 2);
        assert_eq!(cpu.ip(), 50);
    }

    #[test]
    fn halt_does_not_advance() {
        let mut mem = Memory::new();
        let mut cpu = Cpu::new();
        assert_eq!(cpu.step(&mut mem), Ok(false));
        assert_eq!(cpu.step(&mut mem), Ok(false));
        assert_eq!(cpu.ip(), 0);
        assert!(!cpu.fault());
    }

    #[test]
    fn invalid_opcode_latches() {
        let mut mem = Memory::new();
        mem.load_program(&[4, 0, 1, 200]).unwrap();
        let mut cpu = Cpu::new();
        cpu.step(&mut mem).unwrap();
        let err = cpu.step(&mut mem).unwrap_err();
        assert_eq!(
            err,
            Fault {
                kind: FaultKind::InvalidOpcode(200),
                ip: 3
            }
        );
        assert!(cpu.fault());

        let before = cpu.clone();
        let err = cpu.step(&mut mem).unwrap_err();
        assert_eq!(err.kind, FaultKind::Latched);
        assert_eq!(cpu, before);
    }

    #[test]
    fn invalid_register() {
        let mut mem = Memory::new();
        mem.load_program(&[7, 5]).unwrap();
        let mut cpu = Cpu::new();
        assert_eq!(
            cpu.step(&mut mem).unwrap_err().kind,
            FaultKind::InvalidRegister(5)
        );
        assert_eq!(cpu.ip(), 0);
    }

    #[test]
    fn stack_pointer_bounds() {
        // INC SP from 231
        let mut mem = Memory::new();
        mem.load_program(&[7, 4]).unwrap();
        let mut cpu = Cpu::new();
        assert_eq!(
            cpu.step(&mut mem).unwrap_err().kind,
            FaultKind::StackUnderflow
        );
        assert_eq!(cpu.sp(), MAX_SP);

        // SUB SP, 231 reaches 0, DEC SP overflows
        let mut mem = Memory::new();
        mem.load_program(&[6, 4, 231, 8, 4]).unwrap();
        let mut cpu = Cpu::new();
        cpu.step(&mut mem).unwrap();
        assert_eq!(cpu.sp(), 0);
        assert!(cpu.zero());
        assert_eq!(
            cpu.step(&mut mem).unwrap_err().kind,
            FaultKind::StackOverflow
        );
        assert_eq!(cpu.sp(), 0);
        assert!(cpu.zero());
    }

    #[test]
    fn jump_target_out_of_bounds() {
        let mem = Memory::new();
        assert_eq!(Cpu::jump_target(255, &mem), Ok(255));
        assert_eq!(
            Cpu::jump_target(256, &mem),
            Err(FaultKind::JumpOutOfBounds(256))
        );
    }

    #[test]
    fn ip_past_memory_faults() {
        let mut mem = Memory::new();
        // INC [0] as the last two bytes of memory leaves IP at 256
        mem.store(254, 7).unwrap();
        mem.store(255, 0).unwrap();
        let mut cpu = Cpu::new();
        mem.load_program(&[11, 254]).unwrap();
        cpu.step(&mut mem).unwrap();
        cpu.step(&mut mem).unwrap();
        assert_eq!(cpu.ip(), 256);
        let before = cpu.gpr().to_owned();
        let err = cpu.step(&mut mem).unwrap_err();
        assert_eq!(err.kind, FaultKind::IpOutOfBounds(256));
        assert_eq!(cpu.step(&mut mem).unwrap_err().kind, FaultKind::Latched);
        assert_eq!(cpu.gpr(), &before);
    }

    #[test]
    fn truncated_instruction_faults() {
        let mut mem = Memory::new();
        mem.store(255, 4).unwrap();
        mem.load_program(&[11, 255]).unwrap();
        let mut cpu = Cpu::new();
        cpu.step(&mut mem).unwrap();
        assert_eq!(
            cpu.step(&mut mem).unwrap_err().kind,
            FaultKind::Memory(MemoryError::AccessViolation { address: 256 })
        );
        assert_eq!(cpu.ip(), 255);
    }

    #[test]
    fn reset_clears_fault() {
        let mut mem = Memory::new();
        mem.load_program(&[4, 1, 9, 7, 9]).unwrap();
        let mut cpu = Cpu::new();
        cpu.step(&mut mem).unwrap();
        assert!(cpu.step(&mut mem).is_err());
        cpu.reset();
        assert_eq!(cpu, Cpu::new());
        assert_eq!(cpu.gpr(), &[0; 4]);
        assert_eq!(cpu.sp(), 231);
        assert_eq!(cpu.ip(), 0);
        assert!(!cpu.zero() && !cpu.carry() && !cpu.fault());
        // Memory keeps the program
        assert_eq!(mem.data()[1], 1);
    }

    #[test]
    fn print_decimal() {
        let (cpu, mem) = run(&[15, 3, 0, 42], 1);
        assert_eq!(mem.data()[232], 42);
        assert_eq!(cpu.print_len(), 1);
        assert_eq!(cpu.ip(), 2);
    }

    #[test]
    fn print_string_includes_terminator() {
        let mut code = vec![14, 2];
        code.extend_from_slice(b"hi\0");
        let (cpu, mut mem) = run(&code, 1);
        assert_eq!(&mem.data()[232..235], b"hi\0");
        assert_eq!(mem.last_access(), Some(234));
        assert_eq!(cpu.print_len(), 3);
        assert_eq!(mem.load(235), Ok(0));
    }

    #[test]
    fn print_string_stops_at_cap() {
        let mut code = vec![14, 2];
        code.extend_from_slice(&[b'x'; 30]);
        let (cpu, mem) = run(&code, 1);
        assert_eq!(&mem.data()[232..256], &[b'x'; 24]);
        assert_eq!(mem.last_access(), Some(255));
        assert_eq!(cpu.print_len(), 24);
    }

    #[test]
    fn print_string_stops_at_end_of_memory() {
        let mut mem = Memory::new();
        // SUB SP, 131; PRNS [250]
        mem.load_program(&[6, 4, 131, 14, 250]).unwrap();
        for (i, &byte) in b"abcdef".iter().enumerate() {
            mem.store(250 + i, byte).unwrap();
        }
        let mut cpu = Cpu::new();
        cpu.step(&mut mem).unwrap();
        cpu.step(&mut mem).unwrap();
        assert_eq!(cpu.print_len(), 6);
        assert_eq!(&mem.data()[101..107], b"abcdef");
    }

    #[test]
    fn print_string_overlapping_faults() {
        let mut mem = Memory::new();
        mem.load_program(&[14, 230]).unwrap();
        mem.store(230, b'a').unwrap();
        mem.store(231, b'b').unwrap();
        mem.store(232, b'c').unwrap();
        let mut cpu = Cpu::new();
        assert!(matches!(
            cpu.step(&mut mem).unwrap_err().kind,
            FaultKind::Memory(MemoryError::OverlappingCopy { .. })
        ));
    }
}
