use std::cell::RefCell;
use std::str::Chars;

use colored::{ColoredString, Colorize};

use crate::cpu::Cpu;
use crate::runtime::Output;
use crate::symbol::GPR_COUNT;

/// Where a piece of terminal output goes.
#[derive(Clone, Copy, Debug)]
pub enum Stream {
    /// Program output, on stdout
    Normal,
    /// Traces and machine state, on stderr
    Trace(Condition),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Condition {
    /// Printed even if `--minimal`, without color
    Always,
    /// Dropped if `--minimal`
    Sometimes,
}

struct Decolored<'a> {
    chars: Chars<'a>,
}

impl Stream {
    thread_local! {
        static IS_LINE_START: RefCell<bool> = const { RefCell::new(true) };
        static IS_MINIMAL: RefCell<bool> = const { RefCell::new(false) };
    }

    pub fn set_line_start(new_value: bool) -> bool {
        Self::IS_LINE_START.with(|value| value.replace(new_value))
    }
    /// Private. Use [`Stream::start_new_line`].
    fn is_line_start() -> bool {
        Self::IS_LINE_START.with(|value| *value.borrow())
    }
    pub fn set_minimal(new_value: bool) -> bool {
        Self::IS_MINIMAL.with(|value| value.replace(new_value))
    }
    pub fn is_minimal() -> bool {
        Self::IS_MINIMAL.with(|value| *value.borrow())
    }

    fn set_line_start_from_str(string: &str) {
        if let Some(ch) = Decolored::new(string).last() {
            Stream::set_line_start(ch == '\n');
        }
    }

    pub fn print_str(&self, string: &str) {
        match self {
            Self::Normal => {
                print!("{}", string);
                Self::set_line_start_from_str(string);
            }
            Self::Trace(condition) => match (Self::is_minimal(), *condition) {
                (false, _) => {
                    eprint!("{}", ColoredString::from(string).blue());
                    Self::set_line_start_from_str(string);
                }
                (true, Condition::Always) => {
                    eprint_colorless(string);
                    Self::set_line_start_from_str(string);
                }
                (true, Condition::Sometimes) => (),
            },
        }
    }

    pub fn start_new_line(&self) {
        if !Self::is_line_start() {
            self.print_str("\n");
        }
    }

    /// One printed value per line.
    pub fn print_output(&self, output: &Output) {
        self.start_new_line();
        self.print_str(&format!("{}\n", output));
    }

    pub fn print_registers(&self, cpu: &Cpu) {
        self.start_new_line();
        if Self::is_minimal() {
            for (i, value) in cpu.gpr().iter().enumerate() {
                self.print_str(&format!("R{} {}\n", i, value));
            }
            self.print_str(&format!("SP {}\n", cpu.sp()));
            self.print_str(&format!("IP {}\n", cpu.ip()));
            self.print_str(&format!("ZC {}{}\n", cpu.zero() as u8, cpu.carry() as u8));
            return;
        }

        self.print_str("\x1b[2m┌───────────────────────────┐\x1b[0m\n");
        self.print_str("\x1b[2m│        \x1b[3mhex  uint  char\x1b[0m\x1b[2m    │\x1b[0m\n");
        for i in 0..GPR_COUNT {
            self.print_str("\x1b[2m│\x1b[0m");
            self.print_str(&format!(" \x1b[1mR{}\x1b[0m  ", i));
            self.print_integer(cpu.gpr()[i]);
            self.print_str(" \x1b[2m│\x1b[0m\n");
        }
        self.print_str("\x1b[2m│\x1b[0m");
        self.print_str(" \x1b[1mSP\x1b[0m  ");
        self.print_integer(cpu.sp());
        self.print_str(" \x1b[2m│\x1b[0m\n");
        self.print_str("\x1b[2m│\x1b[0m");
        self.print_str(&format!(" \x1b[1mIP\x1b[0m  0x{:02x}", cpu.ip()));
        self.print_str(&format!(
            "      \x1b[1mZ\x1b[0m {} \x1b[1mC\x1b[0m {}",
            cpu.zero() as u8,
            cpu.carry() as u8
        ));
        self.print_str("  \x1b[2m│\x1b[0m\n");
        self.print_str("\x1b[2m└───────────────────────────┘\x1b[0m\n");
    }

    pub fn print_integer(&self, value: u8) {
        if Self::is_minimal() {
            self.print_str(&format!("{}", value));
            return;
        }
        self.print_str(&format!("0x{:02x}  ", value));
        self.print_str(&format!("{:-4}  ", value));
        self.print_char_display(value);
    }

    fn print_char_display(&self, value: u8) {
        debug_assert!(
            !Self::is_minimal(),
            "`print_char_display` should not be called if `--minimal`"
        );
        // Print 3 characters
        match value {
            0x00 => self.print_str("NUL"),
            0x09 => self.print_str("HT "),
            0x0a => self.print_str("LF "),
            0x0d => self.print_str("CR "),
            0x7f => self.print_str("DEL"),
            0x20 => self.print_str("[_]"),
            0x21..=0x7e => self.print_str(&format!("{:<3}", value as char)),
            // Remaining control characters
            0x00..=0x7f => self.print_str("\x1b[2m───\x1b[0m"),
            0x80.. => self.print_str("\x1b[2m┄┄┄\x1b[0m"),
        }
    }
}

impl<'a> Decolored<'a> {
    pub fn new(string: &'a str) -> Self {
        Self {
            chars: string.chars(),
        }
    }
}

impl Iterator for Decolored<'_> {
    type Item = char;
    fn next(&mut self) -> Option<Self::Item> {
        while let Some(ch) = self.chars.next() {
            // Skip everything between '\x1b' and 'm' (inclusive)
            if ch == '\x1b' {
                while self.chars.next().is_some_and(|ch| ch != 'm') {}
                continue;
            }
            return Some(ch);
        }
        None
    }
}

fn eprint_colorless(string: &str) {
    for ch in Decolored::new(string) {
        eprint!("{}", ch);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decolored() {
        assert_eq!(Decolored::new("abcdef").collect::<String>(), "abcdef");
        assert_eq!(
            Decolored::new("R0\x1b[0;2m 42\x1b[0m").collect::<String>(),
            "R0 42"
        );
        assert_eq!(Decolored::new("abc\x1b[0xyz").collect::<String>(), "abc");
    }

    #[test]
    fn minimal_flag_round_trip() {
        let old = Stream::set_minimal(true);
        assert!(Stream::is_minimal());
        Stream::set_minimal(old);
        assert_eq!(Stream::is_minimal(), old);
    }

    #[test]
    fn line_start_tracks_last_char() {
        Stream::set_line_start(true);
        Stream::set_line_start_from_str("abc\x1b[0m");
        assert!(!Stream::is_line_start());
        Stream::set_line_start_from_str("x\n\x1b[1m");
        assert!(Stream::is_line_start());
    }
}
