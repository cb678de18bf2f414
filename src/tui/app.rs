//! Debugger application state and logic.

use crate::{Cpu, MachineConfig, ProgramImage, Step};
use crate::asm::disasm::{disassemble_at, format_instruction};
use std::collections::HashSet;

/// Debugger application state.
pub struct DebuggerApp {
    /// The CPU being debugged.
    pub cpu: Cpu,
    /// Original program for reference.
    pub program: ProgramImage,
    /// How the machine was built.
    pub config: MachineConfig,
    /// Breakpoints (by address).
    pub breakpoints: HashSet<u16>,
    /// Is the debugger running continuously?
    pub running: bool,
    /// Should we quit?
    pub should_quit: bool,
    /// Status message to display.
    pub status: String,
    /// Memory view scroll offset, in 8-byte rows.
    pub mem_scroll: usize,
    /// Breakpoint to step over when a run resumes from it.
    resume_from: Option<u16>,
}

impl DebuggerApp {
    /// Create a new debugger with a loaded program.
    pub fn new(program: ProgramImage, config: MachineConfig) -> Result<Self, crate::ConfigError> {
        let cpu = config.build(&program.bytes)?;

        Ok(Self {
            cpu,
            program,
            config,
            breakpoints: HashSet::new(),
            running: false,
            should_quit: false,
            status: "Ready. Press 's' to step, 'r' to run, 'q' to quit.".into(),
            mem_scroll: 0,
            resume_from: None,
        })
    }

    /// Has execution run off the end of the program?
    pub fn finished(&self) -> bool {
        self.config.left_image(self.program.len(), self.cpu.ip())
    }

    /// Step one instruction.
    pub fn step(&mut self) {
        if self.finished() {
            self.status = format!("Program finished at ip=0x{:04X}", self.cpu.ip());
            self.running = false;
            return;
        }

        let ip = self.cpu.ip();
        match self.cpu.step() {
            Ok(Step::Executed(instr)) => {
                self.status = format!("0x{:04X}: {}", ip, format_instruction(&instr));
            }
            Ok(Step::Ignored(byte)) => {
                self.status = format!("0x{:04X}: skipped unknown opcode 0x{:02X}", ip, byte);
            }
            Err(e) => {
                self.status = format!("Error: {}", e);
                self.running = false;
            }
        }
    }

    /// Run until the program ends, a breakpoint, or an error.
    pub fn run(&mut self) {
        self.running = true;
        self.resume_from = Some(self.cpu.ip());
        self.status = "Running...".into();
    }

    /// Run one iteration of continuous execution.
    pub fn tick(&mut self) {
        if !self.running {
            return;
        }

        if self.finished() {
            self.running = false;
            self.status = format!("Finished after {} steps", self.cpu.steps);
            return;
        }

        if self.cpu.steps >= self.config.max_steps {
            self.running = false;
            self.status = format!("Step limit ({}) reached", self.config.max_steps);
            return;
        }

        // Check for breakpoint
        let ip = self.cpu.ip();
        let resuming = self.resume_from.take() == Some(ip);
        if self.breakpoints.contains(&ip) && !resuming {
            self.running = false;
            self.status = format!("Breakpoint at ip=0x{:04X}", ip);
            return;
        }

        self.step();
    }

    /// Toggle breakpoint at the current ip.
    pub fn toggle_breakpoint(&mut self) {
        let ip = self.cpu.ip();
        if self.breakpoints.remove(&ip) {
            self.status = format!("Removed breakpoint at 0x{:04X}", ip);
        } else {
            self.breakpoints.insert(ip);
            self.status = format!("Set breakpoint at 0x{:04X}", ip);
        }
    }

    /// Reload the program and reset the CPU.
    pub fn reset(&mut self) {
        match self.config.build(&self.program.bytes) {
            Ok(cpu) => {
                self.cpu = cpu;
                self.status = "Reset. Ready.".into();
            }
            Err(e) => self.status = format!("Reset failed: {}", e),
        }
        self.running = false;
    }

    /// Disassembly from the current ip onwards.
    pub fn get_disassembly(&self, lines: usize) -> Vec<(u16, String, bool)> {
        let mem = self.cpu.memory().as_bytes();
        let ip = self.cpu.ip();
        let mut offset = ip as usize;
        let mut out = Vec::with_capacity(lines);

        while out.len() < lines && offset < mem.len() {
            let (text, len) = disassemble_at(mem, offset);
            out.push((offset as u16, text, offset == ip as usize));
            offset += len.max(1);
        }

        out
    }
}

/// Run the debugger with a program.
pub fn run_debugger(program: ProgramImage, config: MachineConfig) -> std::io::Result<()> {
    use crossterm::{
        event::{self, Event, KeyCode, KeyEventKind},
        terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
        ExecutableCommand,
    };
    use ratatui::prelude::*;
    use std::io::stdout;
    use std::time::Duration;

    let mut app = DebuggerApp::new(program, config)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidInput, e))?;

    // Setup terminal
    enable_raw_mode()?;
    stdout().execute(EnterAlternateScreen)?;
    let mut terminal = Terminal::new(CrosstermBackend::new(stdout()))?;

    // Main loop
    loop {
        terminal.draw(|frame| {
            super::ui::draw(frame, &app);
        })?;

        if event::poll(Duration::from_millis(50))? {
            if let Event::Key(key) = event::read()? {
                if key.kind == KeyEventKind::Press {
                    match key.code {
                        KeyCode::Char('q') => app.should_quit = true,
                        KeyCode::Char('s') => {
                            app.running = false;
                            app.step();
                        }
                        KeyCode::Char('r') => app.run(),
                        KeyCode::Char('p') => {
                            app.running = false;
                            app.status = "Paused.".into();
                        }
                        KeyCode::Char('b') => app.toggle_breakpoint(),
                        KeyCode::Char('x') => app.reset(),
                        KeyCode::Up => {
                            app.mem_scroll = app.mem_scroll.saturating_sub(1);
                        }
                        KeyCode::Down => {
                            let rows = app.cpu.memory().len().div_ceil(8);
                            if app.mem_scroll + 1 < rows {
                                app.mem_scroll += 1;
                            }
                        }
                        _ => {}
                    }
                }
            }
        }

        if app.running {
            app.tick();
        }

        if app.should_quit {
            break;
        }
    }

    // Restore terminal
    disable_raw_mode()?;
    stdout().execute(LeaveAlternateScreen)?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assemble;

    fn app(source: &str) -> DebuggerApp {
        let image = ProgramImage::new(assemble(source).unwrap());
        DebuggerApp::new(image, MachineConfig::default()).unwrap()
    }

    #[test]
    fn test_step_and_finish() {
        let mut app = app("MOV_LIT_REG 5, r1\nADD_REG_REG r1, r1\n");

        app.step();
        assert!(app.status.contains("MOV_LIT_REG"));
        app.step();
        assert_eq!(app.cpu.get_register("acc").unwrap(), 10);
        assert!(app.finished());

        app.step();
        assert!(app.status.contains("finished"));
    }

    #[test]
    fn test_breakpoint_stops_run() {
        let mut app = app("MOV_LIT_REG 1, r1\nMOV_LIT_REG 2, r2\n");
        app.cpu.set_register("ip", 4).unwrap();
        app.toggle_breakpoint();
        app.reset();

        app.run();
        for _ in 0..10 {
            app.tick();
        }

        assert!(!app.running);
        assert_eq!(app.cpu.ip(), 4);
        assert!(app.status.contains("Breakpoint"));
    }

    #[test]
    fn test_run_resumes_past_breakpoint() {
        let mut app = app("MOV_LIT_REG 1, r1\nMOV_LIT_REG 2, r2\nMOV_LIT_REG 3, r3\n");
        app.breakpoints.insert(4);

        app.run();
        for _ in 0..10 {
            app.tick();
        }
        assert_eq!(app.cpu.ip(), 4);
        assert!(app.status.contains("Breakpoint"));

        // Running again leaves the breakpoint and finishes the program
        app.run();
        for _ in 0..10 {
            app.tick();
        }
        assert!(!app.running);
        assert_eq!(app.cpu.get_register("r3").unwrap(), 3);
        assert!(app.status.contains("Finished"));
    }

    #[test]
    fn test_disassembly_marks_ip() {
        let app = app("ADD_REG_REG r1, r2\nMOV_REG_REG r1, r2\n");
        let lines = app.get_disassembly(2);
        assert_eq!(lines[0], (0, "ADD_REG_REG r1, r2".to_string(), true));
        assert_eq!(lines[1].0, 3);
        assert!(!lines[1].2);
    }
}
