use std::{error::Error, fmt};

use miette::Diagnostic;

use crate::air::Program;
use crate::cpu::{Cpu, Fault, FaultKind};
use crate::memory::Memory;
use crate::opcode::Opcode;

/// Value produced by a print instruction, read back from just above the stack pointer.
#[derive(Clone, PartialEq, Eq, Debug)]
pub enum Output {
    Decimal(u8),
    Text(String),
}

impl fmt::Display for Output {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Output::Decimal(value) => write!(f, "{}", value),
            Output::Text(text) => f.write_str(text),
        }
    }
}

/// What a single step did.
#[derive(Clone, PartialEq, Eq, Debug)]
pub enum Event {
    Stepped,
    Printed(Output),
    Halted,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum RunError {
    Fault(Fault),
    /// Program was still running after the given amount of steps.
    StepLimit(usize),
}

impl fmt::Display for RunError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunError::Fault(fault) => write!(f, "{}", fault),
            RunError::StepLimit(limit) => {
                write!(f, "Program did not halt within {} steps", limit)
            }
        }
    }
}

impl Error for RunError {}

impl Diagnostic for RunError {
    fn code<'a>(&'a self) -> Option<Box<dyn fmt::Display + 'a>> {
        match self {
            RunError::Fault(fault) => fault.code(),
            RunError::StepLimit(_) => Some(Box::new("run::step_limit")),
        }
    }

    fn help<'a>(&'a self) -> Option<Box<dyn fmt::Display + 'a>> {
        match self {
            RunError::Fault(fault) => fault.help(),
            RunError::StepLimit(_) => Some(Box::new(
                "the program may loop forever; raise the limit with `--max-steps`",
            )),
        }
    }
}

impl From<Fault> for RunError {
    fn from(fault: Fault) -> Self {
        RunError::Fault(fault)
    }
}

/// One memory and one CPU, driven one instruction at a time.
#[derive(Clone, Debug, Default)]
pub struct Machine {
    mem: Memory,
    cpu: Cpu,
    /// Instructions executed since the last reset
    steps: usize,
}

impl Machine {
    pub fn new() -> Self {
        Machine::default()
    }

    /// Reset everything, then copy the program image to address 0.
    pub fn load(&mut self, program: &Program) -> Result<(), RunError> {
        self.reset();
        self.mem.load_program(program.code()).map_err(|err| {
            RunError::Fault(Fault {
                kind: FaultKind::Memory(err),
                ip: 0,
            })
        })
    }

    /// Zero memory and return the CPU to its power-on state.
    pub fn reset(&mut self) {
        self.mem.reset();
        self.cpu.reset();
        self.steps = 0;
    }

    pub fn memory(&self) -> &Memory {
        &self.mem
    }

    pub fn cpu(&self) -> &Cpu {
        &self.cpu
    }

    pub fn steps(&self) -> usize {
        self.steps
    }

    /// Execute one instruction and pick up anything it printed.
    pub fn step(&mut self) -> Result<Event, Fault> {
        // Peek without touching the last-access marker
        let op = self
            .mem
            .data()
            .get(self.cpu.ip())
            .and_then(|&byte| Opcode::try_from(byte).ok());

        if !self.cpu.step(&mut self.mem)? {
            return Ok(Event::Halted);
        }
        self.steps += 1;

        let event = match op {
            Some(Opcode::PrintDecimal) => {
                let value = self.read_output().first().copied().unwrap_or(0);
                Event::Printed(Output::Decimal(value))
            }
            Some(Opcode::PrintString) => {
                let text = self
                    .read_output()
                    .iter()
                    .take_while(|&&byte| byte != 0)
                    .map(|&byte| byte as char)
                    .collect();
                Event::Printed(Output::Text(text))
            }
            _ => Event::Stepped,
        };
        Ok(event)
    }

    /// Cells written by the last print instruction.
    fn read_output(&self) -> &[u8] {
        let start = self.cpu.output_address();
        let end = (start + self.cpu.print_len()).min(self.mem.len());
        &self.mem.data()[start..end]
    }

    /// Whether the next fetch is the halt marker.
    fn at_halt(&self) -> bool {
        self.mem.data().get(self.cpu.ip()) == Some(&u8::from(Opcode::None))
    }

    /// Step until halt, calling `on_event` after every instruction.
    pub fn run_with(
        &mut self,
        max_steps: usize,
        mut on_event: impl FnMut(&Machine, &Event),
    ) -> Result<(), RunError> {
        loop {
            // Reaching the limit right before the halt marker still counts as halting
            if self.steps >= max_steps && !self.at_halt() {
                return Err(RunError::StepLimit(max_steps));
            }
            let event = self.step()?;
            on_event(self, &event);
            if event == Event::Halted {
                return Ok(());
            }
        }
    }

    /// Step until halt and collect everything printed.
    pub fn run(&mut self, max_steps: usize) -> Result<Vec<Output>, RunError> {
        let mut outputs = Vec::new();
        self.run_with(max_steps, |_, event| {
            if let Event::Printed(output) = event {
                outputs.push(output.clone());
            }
        })?;
        Ok(outputs)
    }
}
