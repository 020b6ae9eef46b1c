use crate::{
    air::{Air, Cell, PendingLabel},
    error::{AsmError, AsmErrorKind, OperandKind},
    lexer::{tokenize, LiteralKind, Token, TokenKind},
    opcode::Opcode,
    symbol::{Label, Span},
};

/// Value of a classified operand.
#[derive(Clone, PartialEq, Eq, Debug)]
enum Operand {
    /// Bare number, label or character literal
    Number(Cell),
    /// `[x]`, where x is itself a number or label
    Address(Cell),
    /// String literal
    Numbers(Vec<u8>),
}

/// Transforms source lines into AIR, one line at a time.
pub struct AsmParser<'a> {
    /// Reference to the source file
    src: &'a str,
    /// Assembly intermediate representation
    air: Air,
    /// Tracker for current line, zero-based
    line: usize,
}

impl<'a> AsmParser<'a> {
    pub fn new(src: &'a str) -> Self {
        AsmParser {
            src,
            air: Air::new(),
            line: 0,
        }
    }

    fn get_span(&self, span: Span) -> &'a str {
        &self.src[span.offs()..span.end()]
    }

    fn error(&self, kind: AsmErrorKind, span: Span) -> AsmError {
        AsmError::new(kind, self.line, span)
    }

    /// Create AIR out of the source. Stops at the first error.
    pub fn parse(mut self) -> Result<Air, AsmError> {
        let mut offs = 0;
        for line in self.src.split('\n') {
            let toks: Vec<Token> = tokenize(line, offs)
                .filter(|tok| !matches!(tok.kind, TokenKind::Whitespace | TokenKind::Comment))
                .collect();
            self.parse_line(&toks)?;
            offs += line.len() + 1;
            self.line += 1;
        }
        // Consume self to return AIR
        Ok(self.air)
    }

    fn parse_line(&mut self, toks: &[Token]) -> Result<(), AsmError> {
        let mut toks = toks;

        // Add prefix label to table if exists
        if let [label, colon, rest @ ..] = toks {
            if label.kind == TokenKind::Ident && colon.kind == TokenKind::Colon {
                let name = self.get_span(label.span);
                if !is_label(name) {
                    return Err(self.error(AsmErrorKind::Syntax, label.span));
                }
                self.air
                    .add_label(&Label::new(name), self.line, label.span)?;
                toks = rest;
            }
        }

        let Some((instr, operands)) = toks.split_first() else {
            return Ok(());
        };
        let mnemonic = self.get_span(instr.span);
        if instr.kind != TokenKind::Ident || !is_mnemonic(mnemonic) {
            return Err(self.error(AsmErrorKind::Syntax, instr.span));
        }

        let operands = self.split_operands(operands)?;
        self.parse_instr(&mnemonic.to_uppercase(), instr.span, &operands)?;

        if !self.air.fits() {
            return Err(self.error(AsmErrorKind::ProgramTooLarge, instr.span));
        }
        Ok(())
    }

    /// Split operand tokens on commas. Every operand is exactly one token.
    fn split_operands(&self, toks: &[Token]) -> Result<Vec<Token>, AsmError> {
        let mut operands = Vec::new();
        let mut iter = toks.iter();
        while let Some(tok) = iter.next() {
            if !is_operand(tok.kind) {
                return Err(self.error(AsmErrorKind::Syntax, tok.span));
            }
            operands.push(*tok);
            match iter.next() {
                None => break,
                Some(sep) if sep.kind == TokenKind::Comma => {
                    if iter.as_slice().is_empty() {
                        return Err(self.error(AsmErrorKind::Syntax, sep.span));
                    }
                }
                Some(unexpected) => {
                    return Err(self.error(AsmErrorKind::Syntax, unexpected.span));
                }
            }
        }
        Ok(operands)
    }

    /// Validate operands against the instruction's accepted forms and emit it.
    fn parse_instr(&mut self, instr: &str, span: Span, toks: &[Token]) -> Result<(), AsmError> {
        match instr {
            "DB" => {
                let [tok] = self.expect_arity::<1>("DB", span, toks)?;
                match self.operand(&tok)? {
                    Operand::Number(cell) => self.air.add_data([cell]),
                    Operand::Numbers(bytes) => self.air.add_data(bytes.into_iter().map(Cell::Byte)),
                    Operand::Address(_) => return Err(self.unsupported("DB", false, span)),
                }
            }
            "CP" => self.binary(
                "CP",
                span,
                toks,
                Opcode::CpNumberToAddress,
                Opcode::CpAddressToAddress,
            )?,
            "ADD" => self.binary(
                "ADD",
                span,
                toks,
                Opcode::AddNumberToRegister,
                Opcode::AddAddressToRegister,
            )?,
            "SUB" => self.binary(
                "SUB",
                span,
                toks,
                Opcode::SubNumberFromRegister,
                Opcode::SubAddressFromRegister,
            )?,
            "CMP" => self.binary(
                "CMP",
                span,
                toks,
                Opcode::CmpNumberWithRegister,
                Opcode::CmpAddressWithRegister,
            )?,
            "INC" => self.unary_address("INC", span, toks, Opcode::IncRegister)?,
            "DEC" => self.unary_address("DEC", span, toks, Opcode::DecRegister)?,
            "PRND" => self.unary_address("PRND", span, toks, Opcode::PrintDecimal)?,
            "PRNS" => self.unary_address("PRNS", span, toks, Opcode::PrintString)?,
            "JP" => self.unary_number("JP", span, toks, Opcode::Jp)?,
            "JC" => self.unary_number("JC", span, toks, Opcode::Jc)?,
            "JNC" => self.unary_number("JNC", span, toks, Opcode::Jnc)?,
            "JZ" => self.unary_number("JZ", span, toks, Opcode::Jz)?,
            "JNZ" => self.unary_number("JNZ", span, toks, Opcode::Jnz)?,
            _ => {
                let name = self.get_span(span).to_string();
                return Err(self.error(AsmErrorKind::InvalidInstruction(name), span));
            }
        }
        Ok(())
    }

    /// `instr [address], number` or `instr [address], [address]`.
    fn binary(
        &mut self,
        instr: &'static str,
        span: Span,
        toks: &[Token],
        on_number: Opcode,
        on_address: Opcode,
    ) -> Result<(), AsmError> {
        let [dest, src] = self.expect_arity::<2>(instr, span, toks)?;
        let (dest, src) = (self.operand(&dest)?, self.operand(&src)?);
        let (op, dest, src) = match (dest, src) {
            (Operand::Address(dest), Operand::Number(src)) => (on_number, dest, src),
            (Operand::Address(dest), Operand::Address(src)) => (on_address, dest, src),
            _ => return Err(self.unsupported(instr, true, span)),
        };
        self.air.add_instr(op, vec![dest, src], self.line);
        Ok(())
    }

    /// `instr [address]`
    fn unary_address(
        &mut self,
        instr: &'static str,
        span: Span,
        toks: &[Token],
        op: Opcode,
    ) -> Result<(), AsmError> {
        let [tok] = self.expect_arity::<1>(instr, span, toks)?;
        match self.operand(&tok)? {
            Operand::Address(cell) => {
                self.air.add_instr(op, vec![cell], self.line);
                Ok(())
            }
            _ => Err(self.unsupported(instr, false, span)),
        }
    }

    /// `instr number`, where number is usually a label.
    fn unary_number(
        &mut self,
        instr: &'static str,
        span: Span,
        toks: &[Token],
        op: Opcode,
    ) -> Result<(), AsmError> {
        let [tok] = self.expect_arity::<1>(instr, span, toks)?;
        match self.operand(&tok)? {
            Operand::Number(cell) => {
                self.air.add_instr(op, vec![cell], self.line);
                Ok(())
            }
            _ => Err(self.unsupported(instr, false, span)),
        }
    }

    /// Exactly `N` operand tokens. Missing operands count as unsupported operand types.
    fn expect_arity<const N: usize>(
        &self,
        instr: &'static str,
        span: Span,
        toks: &[Token],
    ) -> Result<[Token; N], AsmError> {
        if let Some(extra) = toks.get(N) {
            return Err(self.error(AsmErrorKind::TooManyArguments(instr), extra.span));
        }
        if toks.len() < N {
            return Err(self.unsupported(instr, N > 1, span));
        }
        Ok(std::array::from_fn(|i| toks[i]))
    }

    fn unsupported(&self, instr: &'static str, binary: bool, span: Span) -> AsmError {
        self.error(AsmErrorKind::UnsupportedOperands { instr, binary }, span)
    }

    /// Classify an operand token.
    fn operand(&self, tok: &Token) -> Result<Operand, AsmError> {
        let raw = self.get_span(tok.span);
        let operand = match tok.kind {
            TokenKind::Address { terminated: true } => {
                let inner = &raw[1..raw.len() - 1];
                Operand::Address(self.value(inner, OperandKind::Address, tok.span)?)
            }
            TokenKind::Lit(LiteralKind::Str { terminated: true }) => {
                let text = &raw[1..raw.len() - 1];
                let bytes = text
                    .chars()
                    .map(|ch| self.char_byte(ch, tok.span))
                    .collect::<Result<Vec<u8>, AsmError>>()?;
                Operand::Numbers(bytes)
            }
            TokenKind::Lit(LiteralKind::Char { terminated: true }) => {
                let mut chars = raw[1..raw.len() - 1].chars();
                match (chars.next(), chars.next()) {
                    (Some(ch), None) => Operand::Number(Cell::Byte(self.char_byte(ch, tok.span)?)),
                    _ => return Err(self.error(AsmErrorKind::MultiCharLiteral, tok.span)),
                }
            }
            TokenKind::Ident => Operand::Number(self.value(raw, OperandKind::Number, tok.span)?),
            _ => return Err(self.error(AsmErrorKind::Syntax, tok.span)),
        };
        Ok(operand)
    }

    /// A label reference or a numeric literal in `0..=255`.
    fn value(&self, raw: &str, kind: OperandKind, span: Span) -> Result<Cell, AsmError> {
        if is_label(raw) {
            return Ok(Cell::Pending(PendingLabel {
                label: Label::new(raw),
                line: self.line,
                span,
            }));
        }
        let value = parse_number(raw).ok_or_else(|| self.error(AsmErrorKind::InvalidNumber, span))?;
        u8::try_from(value)
            .map(Cell::Byte)
            .map_err(|_| self.error(AsmErrorKind::OutOfRange(kind), span))
    }

    fn char_byte(&self, ch: char, span: Span) -> Result<u8, AsmError> {
        u8::try_from(ch as u32).map_err(|_| self.error(AsmErrorKind::NonByteChar(ch), span))
    }
}

/// Tokens that can stand on their own as an operand.
fn is_operand(kind: TokenKind) -> bool {
    matches!(
        kind,
        TokenKind::Ident
            | TokenKind::Address { terminated: true }
            | TokenKind::Lit(LiteralKind::Str { terminated: true })
            | TokenKind::Lit(LiteralKind::Char { terminated: true })
    )
}

/// `[.A-Za-z][A-Za-z0-9_]*`
pub fn is_label(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c == '.' || c.is_ascii_alphabetic() => {
            chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        _ => false,
    }
}

/// Two to four letters.
fn is_mnemonic(s: &str) -> bool {
    (2..=4).contains(&s.len()) && s.chars().all(|c| c.is_ascii_alphabetic())
}

/// Parse a numeric literal.
///
/// Allowed formats: 200, 200d, 0xA4, 0o48, 101b. After the base marker, the longest run of
/// digits valid in that base is used, so `0o48` is octal `4`. Returns `None` if there are no
/// valid digits at all. Range is not checked here.
pub fn parse_number(s: &str) -> Option<i64> {
    if let Some(digits) = s.strip_prefix("0x") {
        parse_digits(digits, 16)
    } else if let Some(digits) = s.strip_prefix("0o") {
        parse_digits(digits, 8)
    } else if let Some(digits) = s.strip_suffix('b') {
        parse_digits(digits, 2)
    } else if let Some(digits) = s.strip_suffix('d') {
        parse_digits(digits, 10)
    } else if is_decimal(s) {
        parse_digits(s, 10)
    } else {
        None
    }
}

/// `[-+]?[0-9]+`
fn is_decimal(s: &str) -> bool {
    let digits = s.strip_prefix(['+', '-']).unwrap_or(s);
    !digits.is_empty() && digits.chars().all(|c| c.is_ascii_digit())
}

/// Optional sign followed by the leading digits valid in `radix`.
fn parse_digits(s: &str, radix: u32) -> Option<i64> {
    let (sign, digits) = match s.strip_prefix('-') {
        Some(rest) => (-1, rest),
        None => (1, s.strip_prefix('+').unwrap_or(s)),
    };
    let mut value: i64 = 0;
    let mut any = false;
    for digit in digits.chars().map_while(|c| c.to_digit(radix)) {
        any = true;
        // Saturate, anything this large is out of range anyway
        value = value
            .saturating_mul(radix as i64)
            .saturating_add(digit as i64);
    }
    any.then_some(sign * value)
}
