//! vcpu - CLI Entry Point
//!
//! Commands:
//! - `vcpu run <program>` - Run an image or assembler source
//! - `vcpu step <program>` - Step a few instructions, dumping registers each time
//! - `vcpu debug <program>` - Interactive debugger
//! - `vcpu asm <source>` - Assemble to an image
//! - `vcpu disasm <image>` - Disassemble an image
//! - `vcpu demo` - Run the built-in counting loop

use clap::{Args, Parser, Subcommand};
use vcpu::{Cpu, MachineConfig, ProgramImage, Step};

#[derive(Parser)]
#[command(name = "vcpu")]
#[command(version)]
#[command(about = "A minimal 16-bit virtual CPU emulator")]
struct Cli {
    /// Log debug output (RUST_LOG overrides)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

/// Machine settings shared by the commands that execute code.
#[derive(Args)]
struct MachineArgs {
    /// JSON machine config file
    #[arg(short, long)]
    config: Option<String>,
    /// Memory size in bytes
    #[arg(long)]
    memory_size: Option<usize>,
    /// Load address and initial ip
    #[arg(long, value_parser = parse_u16)]
    entry: Option<u16>,
    /// Fail on unrecognised opcodes instead of skipping them
    #[arg(long)]
    strict: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a program until it leaves its image or hits the step limit
    Run {
        /// Path to the .bin, .hex or .asm file to execute
        program: String,
        #[command(flatten)]
        machine: MachineArgs,
        /// Maximum number of steps to run
        #[arg(short, long)]
        max_steps: Option<u64>,
        /// Show trace output
        #[arg(short, long)]
        trace: bool,
        /// Print final registers as JSON
        #[arg(long)]
        json: bool,
    },
    /// Execute a fixed number of steps, dumping registers after each
    Step {
        /// Path to the .bin, .hex or .asm file to execute
        program: String,
        #[command(flatten)]
        machine: MachineArgs,
        /// Number of steps
        #[arg(short = 'n', long, default_value = "1")]
        count: u64,
        /// Also dump this many bytes of memory from --from
        #[arg(long, default_value = "0")]
        dump: usize,
        /// Start address of the memory dump
        #[arg(long, value_parser = parse_u16, default_value = "0")]
        from: u16,
    },
    /// Interactive debugger
    #[cfg(feature = "tui")]
    Debug {
        /// Path to the .bin, .hex or .asm file to debug
        program: String,
        #[command(flatten)]
        machine: MachineArgs,
    },
    /// Assemble source to an image
    Asm {
        /// Path to the source file
        source: String,
        /// Output file (.hex for text, anything else raw binary)
        #[arg(short, long)]
        output: Option<String>,
    },
    /// Disassemble an image to readable text
    Disasm {
        /// Path to the image
        image: String,
        /// Address the image is loaded at
        #[arg(long, value_parser = parse_u16, default_value = "0")]
        origin: u16,
    },
    /// Run the built-in counting loop
    Demo,
}

fn main() {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .init();

    match cli.command {
        Some(Commands::Run { program, machine, max_steps, trace, json }) => {
            run_program(&program, &machine, max_steps, trace, json);
        }
        Some(Commands::Step { program, machine, count, dump, from }) => {
            step_program(&program, &machine, count, dump, from);
        }
        #[cfg(feature = "tui")]
        Some(Commands::Debug { program, machine }) => {
            debug_program(&program, &machine);
        }
        Some(Commands::Asm { source, output }) => {
            assemble_file(&source, output);
        }
        Some(Commands::Disasm { image, origin }) => {
            disassemble_file(&image, origin);
        }
        Some(Commands::Demo) => {
            run_demo();
        }
        None => {
            println!("vcpu v{}", env!("CARGO_PKG_VERSION"));
            println!("A minimal 16-bit virtual CPU emulator");
            println!();
            println!("Use --help for available commands");
        }
    }
}

/// Accepts decimal, `0x` hex or `$` hex.
fn parse_u16(text: &str) -> Result<u16, String> {
    let parsed = if let Some(hex) = text.strip_prefix("0x").or_else(|| text.strip_prefix('$')) {
        u16::from_str_radix(hex, 16)
    } else {
        text.parse::<u16>()
    };
    parsed.map_err(|e| format!("invalid 16-bit value '{}': {}", text, e))
}

fn fail(message: impl std::fmt::Display) -> ! {
    eprintln!("❌ {}", message);
    std::process::exit(1);
}

/// Defaults, then the config file, then flags.
fn machine_config(args: &MachineArgs) -> MachineConfig {
    let mut config = match &args.config {
        Some(path) => MachineConfig::from_file(path)
            .unwrap_or_else(|e| fail(format!("Failed to load config: {}", e))),
        None => MachineConfig::default(),
    };

    if let Some(size) = args.memory_size {
        config.memory_size = size;
    }
    if let Some(entry) = args.entry {
        config.entry = entry;
    }
    if args.strict {
        config.strict_opcodes = true;
    }

    if let Err(e) = config.validate() {
        fail(format!("Invalid machine config: {}", e));
    }
    config
}

fn load_program(path: &str) -> ProgramImage {
    let image = vcpu::load_image(path)
        .unwrap_or_else(|e| fail(format!("Failed to load {}: {}", path, e)));

    if image.is_empty() {
        fail("No bytes to execute");
    }
    println!("📂 Loaded {} bytes", image.len());
    image
}

fn build_cpu(config: &MachineConfig, image: &ProgramImage) -> Cpu {
    config.build(&image.bytes)
        .unwrap_or_else(|e| fail(format!("Failed to load program: {}", e)))
}

fn print_registers(cpu: &Cpu) {
    for reg in cpu.dump_registers() {
        println!("{:>4}: 0x{:04X}", reg.name, reg.value);
    }
}

fn run_program(path: &str, machine: &MachineArgs, max_steps: Option<u64>, trace: bool, json: bool) {
    use vcpu::asm::disasm::format_instruction;

    let mut config = machine_config(machine);
    if let Some(max) = max_steps {
        config.max_steps = max;
    }

    println!("🔧 Running: {}", path);
    let image = load_program(path);
    let mut cpu = build_cpu(&config, &image);

    println!();
    println!("━━━ Execution ━━━");

    while !config.left_image(image.len(), cpu.ip()) && cpu.steps < config.max_steps {
        let ip = cpu.ip();

        match cpu.step() {
            Ok(step) => {
                if trace {
                    let text = match step {
                        Step::Executed(instr) => format_instruction(&instr),
                        Step::Ignored(byte) => format!("DB 0x{:02X} (skipped)", byte),
                    };
                    let acc = cpu.get_register("acc").unwrap_or_default();
                    println!("{:04X}: {:<28} acc=0x{:04X}", ip, text, acc);
                }
            }
            Err(e) => fail(format!("CPU error at ip=0x{:04X}: {}", ip, e)),
        }
    }

    println!();
    println!("━━━ Result ━━━");
    println!("Steps: {}", cpu.steps);
    if json {
        match serde_json::to_string_pretty(&cpu.dump_registers()) {
            Ok(text) => println!("{}", text),
            Err(e) => fail(format!("Failed to encode registers: {}", e)),
        }
    } else {
        print_registers(&cpu);
    }

    if cpu.steps >= config.max_steps && !config.left_image(image.len(), cpu.ip()) {
        println!();
        println!("⚠️  Reached step limit ({}). Use --max-steps to increase.", config.max_steps);
    }
}

fn step_program(path: &str, machine: &MachineArgs, count: u64, dump: usize, from: u16) {
    let config = machine_config(machine);
    let image = load_program(path);
    let mut cpu = build_cpu(&config, &image);

    print_registers(&cpu);
    println!();

    for _ in 0..count {
        if let Err(e) = cpu.step() {
            fail(format!("CPU error at ip=0x{:04X}: {}", cpu.ip(), e));
        }
        print_registers(&cpu);
        for line in cpu.memory().hex_dump(from as usize, dump) {
            println!("{}", line);
        }
        println!();
    }
}

#[cfg(feature = "tui")]
fn debug_program(path: &str, machine: &MachineArgs) {
    let config = machine_config(machine);

    println!("🔍 Loading: {}", path);
    let image = load_program(path);

    println!("🚀 Launching debugger...");
    println!();

    if let Err(e) = vcpu::run_debugger(image, config) {
        fail(format!("Debugger error: {}", e));
    }
}

fn assemble_file(source_path: &str, output: Option<String>) {
    use vcpu::{assemble, save_image};

    let out_path = output.unwrap_or_else(|| {
        std::path::Path::new(source_path)
            .with_extension("bin")
            .display()
            .to_string()
    });

    println!("📝 Assembling: {} → {}", source_path, out_path);

    let source = std::fs::read_to_string(source_path)
        .unwrap_or_else(|e| fail(format!("Failed to read file: {}", e)));

    let bytes = assemble(&source)
        .unwrap_or_else(|e| fail(format!("Assembly error: {}", e)));

    println!("✓ Assembled {} bytes", bytes.len());

    if let Err(e) = save_image(&out_path, &ProgramImage::new(bytes)) {
        fail(format!("Failed to save image: {}", e));
    }

    println!("✓ Saved to {}", out_path);
}

fn disassemble_file(path: &str, origin: u16) {
    use vcpu::disassemble;

    println!("📖 Disassembling: {}", path);
    println!();

    let image = vcpu::load_image(path)
        .unwrap_or_else(|e| fail(format!("Failed to load image: {}", e)));

    println!("{}", disassemble(&image.bytes, origin));
}

/// Add 1 to the word at 0x0100 until it reaches 3.
const DEMO_SOURCE: &str = r#"
start:
    MOV_LIT_REG 0x0001, r2
    MOV_MEM_REG $0100, r1
    ADD_REG_REG r1, r2
    MOV_REG_MEM acc, $0100
    JMP_NOT_EQ 0x0003, start
"#;

fn run_demo() {
    use vcpu::{assemble, Memory};

    println!("━━━ Counting loop ━━━");
    println!("{}", DEMO_SOURCE.trim_matches('\n'));
    println!();

    let bytes = assemble(DEMO_SOURCE)
        .unwrap_or_else(|e| fail(format!("Assembly error: {}", e)));

    let mut memory = Memory::new(512);
    if let Err(e) = memory.load(0, &bytes) {
        fail(e);
    }

    // The CPU borrows memory; we read the counter back afterwards.
    {
        let mut cpu = Cpu::new(&mut memory);
        let end = bytes.len() as u16;

        while cpu.ip() < end {
            if let Err(e) = cpu.step() {
                fail(format!("CPU error: {}", e));
            }
        }

        println!("Steps: {}", cpu.steps);
        for reg in cpu.dump_registers() {
            println!("{:>4}: 0x{:04X}", reg.name, reg.value);
        }
    }

    println!();
    println!("0x0100 = {}", memory.read_u16(0x0100));
    for line in memory.hex_dump(0x0100, 16) {
        println!("{}", line);
    }
}
