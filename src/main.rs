use std::fs;
use std::path::{Path, PathBuf};
use std::thread::sleep;
use std::time::Duration;

use clap::{Parser, Subcommand};
use colored::Colorize;
use hotwatch::notify::Event as WatchEvent;
use hotwatch::{
    blocking::{Flow, Hotwatch},
    EventKind,
};
use miette::{bail, IntoDiagnostic, NamedSource, Report, Result};

use bytesim::output::{Condition, Stream};
use bytesim::{Event, Machine, Opcode, Program, RunError, MEMORY_SIZE};

/// Bytesim assembles and runs programs for a tiny 8-bit machine with 256 bytes of memory.
#[derive(Parser)]
#[command(version)]
struct Args {
    #[command(subcommand)]
    command: Option<Command>,

    /// Quickly provide a `.asm` file to run
    path: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Command {
    /// Run text `.asm` or binary `.bin` file directly and output to terminal
    Run {
        /// `.asm` or `.bin` file to run
        name: PathBuf,
        /// Produce minimal output, suited for blackbox tests
        #[arg(short, long)]
        minimal: bool,
        /// Print registers after every instruction
        #[arg(short, long)]
        trace: bool,
        /// Stop with an error after this many instructions
        #[arg(long)]
        max_steps: Option<usize>,
    },
    /// Create binary `.bin` memory image to run later
    Compile {
        /// `.asm` file to compile
        name: PathBuf,
        /// Destination to output .bin file
        dest: Option<PathBuf>,
    },
    /// Check a `.asm` file without running or outputting binary
    Check {
        /// File to check
        name: PathBuf,
    },
    /// Print the label table and instruction line mapping of a `.asm` file
    Labels {
        /// File to inspect
        name: PathBuf,
    },
    /// Place a watch on a `.asm` file to receive constant assembler updates
    Watch {
        /// `.asm` file to watch
        name: PathBuf,
    },
}

fn main() -> miette::Result<()> {
    use MsgColor::*;
    let args = Args::parse();
    bytesim::env::init();

    miette::set_hook(Box::new(|_| {
        Box::new(
            miette::MietteHandlerOpts::new() //
                .context_lines(bytesim::DIAGNOSTIC_CONTEXT_LINES)
                .build(),
        )
    }))?;

    let Some(command) = args.command else {
        let Some(path) = args.path else {
            println!("\n~ bytesim v{VERSION} ~");
            println!("{SHORT_INFO}");
            return Ok(());
        };
        return run(&path, RunOptions::default());
    };

    match command {
        Command::Run {
            name,
            minimal,
            trace,
            max_steps,
        } => run(
            &name,
            RunOptions {
                minimal,
                trace,
                max_steps,
            },
        ),
        Command::Compile { name, dest } => {
            file_message(Green, "Assembling", &name);
            let program = assemble(&name)?;

            let out_file_name = match dest {
                Some(dest) => dest,
                None => name.with_extension("bin"),
            };
            fs::write(&out_file_name, program.code()).into_diagnostic()?;

            message(Green, "Finished", &format!("emit {} bytes", program.len()));
            file_message(Green, "Saved", &out_file_name);
            Ok(())
        }
        Command::Check { name } => {
            file_message(Green, "Checking", &name);
            let _ = assemble(&name)?;
            message(Green, "Success", "no errors found!");
            Ok(())
        }
        Command::Labels { name } => {
            file_message(Green, "Assembling", &name);
            let program = assemble(&name)?;
            message(Cyan, "Labels", &format!("{} declared", program.labels().len()));
            for (label, offs) in program.labels() {
                println!("{:>12} {:<16} 0x{:02x}", "", label, offs);
            }
            message(Cyan, "Mapping", "offset -> line");
            for (offs, line) in program.mapping() {
                let op = program.code().get(*offs).and_then(|&byte| Opcode::try_from(byte).ok());
                match op {
                    Some(op) => println!("{:>12} 0x{:02x} -> {:<4} {}", "", offs, line + 1, op),
                    None => println!("{:>12} 0x{:02x} -> {}", "", offs, line + 1),
                }
            }
            Ok(())
        }
        Command::Watch { name } => {
            if !name.exists() {
                bail!("File does not exist. Exiting...")
            }
            // Vim breaks if watching a single file
            let folder_path = match name.parent() {
                Some(pth) if pth.is_dir() => pth.to_path_buf(),
                _ => Path::new(".").to_path_buf(),
            };

            // Clear screen and move cursor to top left
            print!("\x1B[2J\x1B[2;1H");
            file_message(Green, "Watching", &name);
            message(Cyan, "Help", "press CTRL+C to exit");

            let mut watcher =
                Hotwatch::new_with_custom_delay(Duration::from_millis(500)).into_diagnostic()?;

            watcher
                .watch(folder_path, move |event: WatchEvent| match event.kind {
                    // Watch remove for vim changes
                    EventKind::Modify(_) | EventKind::Remove(_) => {
                        print!("\x1B[2J\x1B[2;1H");
                        file_message(Green, "Watching", &name);
                        message(Green, "Re-checking", "file change detected");
                        message(Cyan, "Help", "press CTRL+C to exit");

                        // Makes reruns more obvious
                        sleep(Duration::from_millis(50));

                        match assemble(&name) {
                            Ok(_) => message(Green, "Success", "no errors found!"),
                            Err(e) => println!("\n{:?}", e),
                        }
                        Flow::Continue
                    }
                    _ => Flow::Continue,
                })
                .into_diagnostic()?;
            watcher.run();
            Ok(())
        }
    }
}

#[derive(Default)]
struct RunOptions {
    minimal: bool,
    trace: bool,
    max_steps: Option<usize>,
}

#[allow(unused)]
enum MsgColor {
    Green,
    Cyan,
    Red,
}

fn file_message(color: MsgColor, left: &str, right: &Path) {
    let right = format!("target {}", right.display());
    message(color, left, &right);
}

fn message(color: MsgColor, left: &str, right: &str) {
    let left = match color {
        MsgColor::Green => left.green(),
        MsgColor::Cyan => left.cyan(),
        MsgColor::Red => left.red(),
    };
    println!("{left:>12} {right}");
}

fn run(name: &Path, opts: RunOptions) -> Result<()> {
    Stream::set_minimal(opts.minimal);
    let trace = opts.trace || bytesim::env::is_trace_enabled();
    let max_steps = opts.max_steps.unwrap_or_else(bytesim::env::max_steps);

    file_message(MsgColor::Green, "Assembling", name);
    let (program, src) = match name.extension().and_then(|ext| ext.to_str()) {
        Some("bin") => {
            let image = fs::read(name).into_diagnostic()?;
            if image.len() > MEMORY_SIZE {
                bail!(
                    "Image is {} bytes, memory only holds {}",
                    image.len(),
                    MEMORY_SIZE
                );
            }
            (Program::from_raw(image), None)
        }
        Some("asm") => {
            let src = read_source(name)?;
            let program = bytesim::assemble(&src)
                .map_err(|e| Report::new(e).with_source_code(named(name, src.clone())))?;
            (program, Some(src))
        }
        Some(_) => bail!("File has unknown extension. Exiting..."),
        None => bail!("File has no extension. Exiting..."),
    };

    let mut machine = Machine::new();
    machine.load(&program)?;

    message(MsgColor::Green, "Running", "emitted binary");
    let result = machine.run_with(max_steps, |machine, event| {
        if let Event::Printed(output) = event {
            Stream::Normal.print_output(output);
        }
        if trace && *event != Event::Halted {
            Stream::Trace(Condition::Sometimes).print_str(&format!(
                "step {} -> IP 0x{:02x}\n",
                machine.steps(),
                machine.cpu().ip()
            ));
            Stream::Trace(Condition::Always).print_registers(machine.cpu());
        }
    });
    Stream::Normal.start_new_line();

    match result {
        Ok(()) => {
            message(
                MsgColor::Green,
                "Halted",
                &format!("after {} steps", machine.steps()),
            );
            file_message(MsgColor::Green, "Completed", name);
            Ok(())
        }
        Err(err) => {
            message(MsgColor::Red, "Fault", &err.to_string());
            Err(fault_report(err, &program, src))
        }
    }
}

/// Point the report at the source line of the faulting instruction, if known.
fn fault_report(err: RunError, program: &Program, src: Option<String>) -> Report {
    let line = match err {
        RunError::Fault(fault) => program.line_of(fault.ip),
        RunError::StepLimit(_) => None,
    };
    match (line, src) {
        (Some(line), Some(src)) => {
            let text = src.lines().nth(line).unwrap_or_default().trim().to_string();
            Report::new(err).wrap_err(format!("at line {}: {}", line + 1, text))
        }
        _ => Report::new(err),
    }
}

fn read_source(name: &Path) -> Result<String> {
    fs::read_to_string(name).into_diagnostic()
}

fn named(name: &Path, src: String) -> NamedSource<String> {
    NamedSource::new(name.display().to_string(), src)
}

/// Assemble a source file, attaching the source to any error for rendering.
fn assemble(name: &Path) -> Result<Program> {
    let src = read_source(name)?;
    bytesim::assemble(&src).map_err(|e| Report::new(e).with_source_code(named(name, src)))
}

const SHORT_INFO: &str = r"
Welcome to bytesim, an assembler and simulator for a tiny 8-bit machine:
four registers, a stack pointer, zero and carry flags, and 256 bytes of memory.
Please use `-h` or `--help` to access the usage instructions and documentation.
";

const VERSION: &str = env!("CARGO_PKG_VERSION");
