use std::fmt;

/// Every instruction the CPU understands, by the byte that encodes it.
///
/// Widths count the opcode byte itself. The assembler and the CPU both read
/// widths from here, so the two can never disagree on instruction length.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[repr(u8)]
pub enum Opcode {
    /// Halt marker. Zeroed memory halts the CPU.
    None = 0,
    CpAddressToAddress = 1,
    CpNumberToAddress = 2,
    AddAddressToRegister = 3,
    AddNumberToRegister = 4,
    SubAddressFromRegister = 5,
    SubNumberFromRegister = 6,
    IncRegister = 7,
    DecRegister = 8,
    CmpAddressWithRegister = 9,
    CmpNumberWithRegister = 10,
    Jp = 11,
    Jc = 12,
    Jz = 13,
    PrintString = 14,
    PrintDecimal = 15,
    Jnc = 16,
    Jnz = 17,
}

impl Opcode {
    /// Total instruction width in bytes, including the opcode.
    pub const fn width(self) -> usize {
        match self {
            Opcode::None => 1,
            Opcode::IncRegister
            | Opcode::DecRegister
            | Opcode::Jp
            | Opcode::Jc
            | Opcode::Jnc
            | Opcode::Jz
            | Opcode::Jnz
            | Opcode::PrintString
            | Opcode::PrintDecimal => 2,
            Opcode::CpAddressToAddress
            | Opcode::CpNumberToAddress
            | Opcode::AddAddressToRegister
            | Opcode::AddNumberToRegister
            | Opcode::SubAddressFromRegister
            | Opcode::SubNumberFromRegister
            | Opcode::CmpAddressWithRegister
            | Opcode::CmpNumberWithRegister => 3,
        }
    }

    /// Number of operand bytes following the opcode.
    pub const fn operand_count(self) -> usize {
        self.width() - 1
    }

    /// Assembly mnemonic this opcode is written as.
    pub const fn mnemonic(self) -> &'static str {
        match self {
            Opcode::None => "NONE",
            Opcode::CpAddressToAddress | Opcode::CpNumberToAddress => "CP",
            Opcode::AddAddressToRegister | Opcode::AddNumberToRegister => "ADD",
            Opcode::SubAddressFromRegister | Opcode::SubNumberFromRegister => "SUB",
            Opcode::IncRegister => "INC",
            Opcode::DecRegister => "DEC",
            Opcode::CmpAddressWithRegister | Opcode::CmpNumberWithRegister => "CMP",
            Opcode::Jp => "JP",
            Opcode::Jc => "JC",
            Opcode::Jnc => "JNC",
            Opcode::Jz => "JZ",
            Opcode::Jnz => "JNZ",
            Opcode::PrintString => "PRNS",
            Opcode::PrintDecimal => "PRND",
        }
    }
}

impl From<Opcode> for u8 {
    fn from(op: Opcode) -> Self {
        op as u8
    }
}

impl TryFrom<u8> for Opcode {
    type Error = u8;

    fn try_from(byte: u8) -> Result<Self, Self::Error> {
        let op = match byte {
            0 => Opcode::None,
            1 => Opcode::CpAddressToAddress,
            2 => Opcode::CpNumberToAddress,
            3 => Opcode::AddAddressToRegister,
            4 => Opcode::AddNumberToRegister,
            5 => Opcode::SubAddressFromRegister,
            6 => Opcode::SubNumberFromRegister,
            7 => Opcode::IncRegister,
            8 => Opcode::DecRegister,
            9 => Opcode::CmpAddressWithRegister,
            10 => Opcode::CmpNumberWithRegister,
            11 => Opcode::Jp,
            12 => Opcode::Jc,
            13 => Opcode::Jz,
            14 => Opcode::PrintString,
            15 => Opcode::PrintDecimal,
            16 => Opcode::Jnc,
            17 => Opcode::Jnz,
            invalid => return Err(invalid),
        };
        Ok(op)
    }
}

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.mnemonic())
    }
}
