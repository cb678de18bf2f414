//! CPU execution engine.
//!
//! Implements the fetch-decode-execute cycle and all instruction behaviors.
//! The CPU owns its register file and holds a memory handle for its whole
//! lifetime: either an owned [`Memory`] or a `&mut Memory` lent by the driver.

use crate::cpu::decode::{Instruction, Opcode};
use crate::cpu::memory::{AddressSpace, Memory, MemoryError};
use crate::cpu::registers::{RegisterError, RegisterValue, Registers, ACC, ACC_INDEX, IP, IP_INDEX};
use serde::{Serialize, Deserialize};
use thiserror::Error;

/// What a single step did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Step {
    /// A recognised instruction ran.
    Executed(Instruction),
    /// The byte was not an opcode; only it was consumed.
    Ignored(u8),
}

/// The virtual CPU.
pub struct Cpu<M: AddressSpace = Memory> {
    /// CPU registers.
    regs: Registers,
    /// Memory the program lives in.
    mem: M,
    /// Fault on unknown opcodes instead of skipping them.
    strict: bool,
    /// Instructions stepped so far.
    pub steps: u64,
}

impl<M: AddressSpace> Cpu<M> {
    /// Create a CPU over `mem` with zeroed registers.
    pub fn new(mem: M) -> Self {
        Self {
            regs: Registers::new(),
            mem,
            strict: false,
            steps: 0,
        }
    }

    /// Treat unrecognised opcodes as [`CpuError::InvalidOpcode`].
    pub fn with_strict_opcodes(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    /// Read a register by name.
    pub fn get_register(&self, name: &str) -> Result<u16, CpuError> {
        Ok(self.regs.get(name)?)
    }

    /// Write a register by name.
    pub fn set_register(&mut self, name: &str, value: u16) -> Result<(), CpuError> {
        Ok(self.regs.set(name, value)?)
    }

    /// Current instruction pointer.
    pub fn ip(&self) -> u16 {
        self.regs.get_by_index(IP_INDEX)
    }

    pub fn registers(&self) -> &Registers {
        &self.regs
    }

    pub fn memory(&self) -> &M {
        &self.mem
    }

    pub fn memory_mut(&mut self) -> &mut M {
        &mut self.mem
    }

    /// Give the memory back to the driver.
    pub fn into_memory(self) -> M {
        self.mem
    }

    /// All registers as (name, value) pairs.
    pub fn dump_registers(&self) -> Vec<RegisterValue> {
        self.regs.iter().collect()
    }

    /// Zero the registers and the step counter. Memory is left alone.
    pub fn reset(&mut self) {
        self.regs.reset();
        self.steps = 0;
    }

    /// Read the byte at `ip` and advance `ip` by one.
    pub fn fetch(&mut self) -> Result<u8, CpuError> {
        let ip = self.regs.get(IP)?;
        let byte = self.mem.get_u8(ip)?;
        self.regs.set(IP, ip.wrapping_add(1))?;
        Ok(byte)
    }

    /// Read the big-endian word at `ip` and advance `ip` by two.
    pub fn fetch16(&mut self) -> Result<u16, CpuError> {
        let ip = self.regs.get(IP)?;
        let word = self.mem.get_u16(ip)?;
        self.regs.set(IP, ip.wrapping_add(2))?;
        Ok(word)
    }

    /// Execute a single instruction.
    ///
    /// Returns what was executed, or an error.
    pub fn step(&mut self) -> Result<Step, CpuError> {
        let opcode = self.fetch()?;
        let step = self.execute(opcode)?;
        self.steps += 1;
        Ok(step)
    }

    /// Step until `stop` says so, an error occurs, or `max_steps` have run.
    ///
    /// Returns the number of steps executed.
    pub fn run_limited<F>(&mut self, max_steps: u64, mut stop: F) -> Result<u64, CpuError>
    where
        F: FnMut(&Self) -> bool,
    {
        let start = self.steps;
        while self.steps - start < max_steps && !stop(self) {
            self.step()?;
        }
        Ok(self.steps - start)
    }

    /// Decode the operands for `opcode` from the instruction stream and run it.
    pub fn execute(&mut self, opcode: u8) -> Result<Step, CpuError> {
        let Some(op) = Opcode::from_byte(opcode) else {
            let addr = self.regs.get(IP)?.wrapping_sub(1);
            if self.strict {
                return Err(CpuError::InvalidOpcode { opcode, addr });
            }
            log::warn!("unrecognised opcode 0x{:02X} at 0x{:04X}, skipping", opcode, addr);
            return Ok(Step::Ignored(opcode));
        };

        let instr = self.read_operands(op)?;
        self.apply(instr)?;
        log::trace!("{:?} -> ip=0x{:04X} acc=0x{:04X}", instr, self.ip(), self.regs.get_by_index(ACC_INDEX));
        Ok(Step::Executed(instr))
    }

    /// Pull operands off the stream in declared order.
    fn read_operands(&mut self, op: Opcode) -> Result<Instruction, CpuError> {
        let instr = match op {
            Opcode::MovLitReg => {
                let literal = self.fetch16()?;
                let reg = self.fetch()?;
                Instruction::MovLitReg { literal, reg }
            }
            Opcode::MovRegReg => {
                let src = self.fetch()?;
                let dst = self.fetch()?;
                Instruction::MovRegReg { src, dst }
            }
            Opcode::MovRegMem => {
                let src = self.fetch()?;
                let addr = self.fetch16()?;
                Instruction::MovRegMem { src, addr }
            }
            Opcode::MovMemReg => {
                let addr = self.fetch16()?;
                let dst = self.fetch()?;
                Instruction::MovMemReg { addr, dst }
            }
            Opcode::AddRegReg => {
                let a = self.fetch()?;
                let b = self.fetch()?;
                Instruction::AddRegReg { a, b }
            }
            Opcode::JmpNotEq => {
                let literal = self.fetch16()?;
                let addr = self.fetch16()?;
                Instruction::JmpNotEq { literal, addr }
            }
        };
        Ok(instr)
    }

    fn apply(&mut self, instr: Instruction) -> Result<(), CpuError> {
        match instr {
            Instruction::MovLitReg { literal, reg } => {
                self.regs.set_by_index(reg, literal);
            }

            Instruction::MovRegReg { src, dst } => {
                let value = self.regs.get_by_index(src);
                self.regs.set_by_index(dst, value);
            }

            Instruction::MovRegMem { src, addr } => {
                let value = self.regs.get_by_index(src);
                self.mem.set_u16(addr, value)?;
            }

            Instruction::MovMemReg { addr, dst } => {
                let value = self.mem.get_u16(addr)?;
                self.regs.set_by_index(dst, value);
            }

            Instruction::AddRegReg { a, b } => {
                let sum = self.regs.get_by_index(a).wrapping_add(self.regs.get_by_index(b));
                self.regs.set(ACC, sum)?;
            }

            Instruction::JmpNotEq { literal, addr } => {
                if literal != self.regs.get(ACC)? {
                    self.regs.set(IP, addr)?;
                }
            }
        }

        Ok(())
    }
}

impl<M: AddressSpace> std::fmt::Debug for Cpu<M> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Cpu")
            .field("steps", &self.steps)
            .field("strict", &self.strict)
            .field("regs", &self.regs)
            .finish()
    }
}

/// Errors that can occur during CPU execution.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CpuError {
    #[error("register error: {0}")]
    Register(#[from] RegisterError),

    #[error("memory error: {0}")]
    Memory(#[from] MemoryError),

    #[error("invalid opcode 0x{opcode:02X} at 0x{addr:04X}")]
    InvalidOpcode { opcode: u8, addr: u16 },
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cpu::decode::encode_all;

    fn cpu_with(program: &[Instruction]) -> Cpu {
        let mut mem = Memory::new(256);
        mem.load(0, &encode_all(program)).unwrap();
        Cpu::new(mem)
    }

    #[test]
    fn test_fetch_advances_ip() {
        let mut mem = Memory::new(16);
        mem.load(0, &[0xAB, 0x12, 0x34]).unwrap();
        let mut cpu = Cpu::new(mem);

        assert_eq!(cpu.fetch().unwrap(), 0xAB);
        assert_eq!(cpu.get_register("ip").unwrap(), 1);
        assert_eq!(cpu.fetch16().unwrap(), 0x1234);
        assert_eq!(cpu.get_register("ip").unwrap(), 3);
    }

    #[test]
    fn test_add_reg_reg() {
        let mut cpu = cpu_with(&[
            Instruction::MovLitReg { literal: 0x1234, reg: 2 },
            Instruction::MovLitReg { literal: 0xABCD, reg: 3 },
            Instruction::AddRegReg { a: 2, b: 3 },
        ]);

        for _ in 0..3 {
            cpu.step().unwrap();
        }

        assert_eq!(cpu.get_register("r1").unwrap(), 0x1234);
        assert_eq!(cpu.get_register("r2").unwrap(), 0xABCD);
        assert_eq!(cpu.get_register("acc").unwrap(), 0xBE01);
        assert_eq!(cpu.get_register("ip").unwrap(), 11);
    }

    #[test]
    fn test_mov_reg_reg_wraps_index() {
        let mut cpu = cpu_with(&[
            Instruction::MovLitReg { literal: 0x0042, reg: 4 },
            // 14 % 10 == 4 (r3), 19 % 10 == 9 (r8)
            Instruction::MovRegReg { src: 14, dst: 19 },
        ]);

        cpu.step().unwrap();
        cpu.step().unwrap();

        assert_eq!(cpu.get_register("r8").unwrap(), 0x0042);
    }

    #[test]
    fn test_memory_round_trip() {
        let mut cpu = cpu_with(&[
            Instruction::MovLitReg { literal: 0x00FF, reg: 2 },
            Instruction::MovRegMem { src: 2, addr: 0x0080 },
            Instruction::MovMemReg { addr: 0x0080, dst: 5 },
        ]);

        for _ in 0..3 {
            cpu.step().unwrap();
        }

        assert_eq!(cpu.memory().read_u16(0x80), 0x00FF);
        assert_eq!(cpu.get_register("r4").unwrap(), 0x00FF);
    }

    #[test]
    fn test_jmp_not_eq_taken() {
        let mut cpu = cpu_with(&[Instruction::JmpNotEq { literal: 7, addr: 0x0040 }]);
        cpu.set_register("acc", 5).unwrap();

        cpu.step().unwrap();

        assert_eq!(cpu.get_register("ip").unwrap(), 0x0040);
    }

    #[test]
    fn test_jmp_not_eq_falls_through() {
        let mut cpu = cpu_with(&[Instruction::JmpNotEq { literal: 7, addr: 0x0040 }]);
        cpu.set_register("acc", 7).unwrap();

        cpu.step().unwrap();

        assert_eq!(cpu.get_register("ip").unwrap(), 5);
    }

    #[test]
    fn test_unknown_opcode_is_skipped() {
        let mut mem = Memory::new(16);
        mem.load(0, &[0xEE, 0x14, 0x02, 0x03]).unwrap();
        let mut cpu = Cpu::new(mem);

        assert_eq!(cpu.step().unwrap(), Step::Ignored(0xEE));
        assert_eq!(cpu.get_register("ip").unwrap(), 1);
        assert!(matches!(cpu.step().unwrap(), Step::Executed(Instruction::AddRegReg { .. })));
        assert_eq!(cpu.steps, 2);
    }

    #[test]
    fn test_unknown_opcode_strict() {
        let mut mem = Memory::new(16);
        mem.load(0, &[0xEE]).unwrap();
        let mut cpu = Cpu::new(mem).with_strict_opcodes(true);

        assert_eq!(
            cpu.step(),
            Err(CpuError::InvalidOpcode { opcode: 0xEE, addr: 0 })
        );
    }

    #[test]
    fn test_out_of_range_fetch() {
        let mut cpu = Cpu::new(Memory::new(4));
        cpu.set_register("ip", 4).unwrap();

        assert!(matches!(cpu.step(), Err(CpuError::Memory(_))));
    }

    #[test]
    fn test_unknown_register_surfaces() {
        let mut cpu = Cpu::new(Memory::new(4));
        assert_eq!(
            cpu.get_register("pc"),
            Err(CpuError::Register(RegisterError::UnknownRegister("pc".into())))
        );
        assert!(cpu.set_register("pc", 1).is_err());
        assert!(cpu.dump_registers().iter().all(|r| r.value == 0));
    }

    #[test]
    fn test_borrowed_memory() {
        let mut mem = Memory::new(64);
        mem.load(0, &encode_all(&[Instruction::MovRegMem { src: 0, addr: 0x20 }])).unwrap();

        {
            let mut cpu = Cpu::new(&mut mem);
            cpu.step().unwrap();
        }

        // ip was 4 after the fetch when the store happened
        assert_eq!(mem.read_u16(0x20), 4);
    }

    #[test]
    fn test_run_limited() {
        let mut cpu = Cpu::new(Memory::new(64));
        let ran = cpu.run_limited(10, |_| false).unwrap();
        assert_eq!(ran, 10);

        cpu.reset();
        let ran = cpu.run_limited(10, |c| c.get_register("ip").unwrap_or(0) >= 3).unwrap();
        assert_eq!(ran, 3);
    }
}
