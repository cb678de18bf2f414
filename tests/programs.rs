//! Whole programs driven through the public API.

use vcpu::{assemble, Cpu, CpuError, Instruction, MachineConfig, Memory, RegisterError, Step};

const COUNTER: &str = r#"
start:
    MOV_LIT_REG 0x0001, r2
    MOV_MEM_REG $0100, r1
    ADD_REG_REG r1, r2
    MOV_REG_MEM acc, $0100
    JMP_NOT_EQ 0x0003, start
"#;

#[test]
fn counting_loop_stops_at_three() {
    let bytes = assemble(COUNTER).unwrap();
    assert_eq!(bytes.len(), 4 + 4 + 3 + 4 + 5);

    let mut memory = Memory::new(512);
    memory.load(0, &bytes).unwrap();
    let end = bytes.len() as u16;

    let mut cpu = Cpu::new(&mut memory);
    let mut passes = Vec::new();
    while cpu.ip() < end {
        if let Step::Executed(Instruction::MovRegMem { .. }) = cpu.step().unwrap() {
            passes.push(cpu.memory().read_u16(0x0100));
        }
        assert!(cpu.steps < 100, "loop did not terminate");
    }

    assert_eq!(passes, vec![1, 2, 3]);
    assert_eq!(cpu.steps, 15);
    drop(cpu);

    assert_eq!(memory.read_u16(0x0100), 3);
}

#[test]
fn add_then_fall_through_scenario() {
    // r1 := 0x1234, r2 := 0xABCD, acc := r1 + r2, one step at a time
    let bytes = assemble("MOV_LIT_REG 0x1234, r1\nMOV_LIT_REG 0xABCD, r2\nADD_REG_REG r1, r2").unwrap();
    let mut cpu = MachineConfig::default().build(&bytes).unwrap();

    cpu.step().unwrap();
    assert_eq!(cpu.get_register("r1").unwrap(), 0x1234);
    cpu.step().unwrap();
    assert_eq!(cpu.get_register("r2").unwrap(), 0xABCD);
    cpu.step().unwrap();
    assert_eq!(cpu.get_register("acc").unwrap(), 0xBE01);
    assert_eq!(cpu.ip(), 11);
}

#[test]
fn memory_round_trip_through_instructions() {
    let source = r#"
        MOV_LIT_REG 0x00FF, r3
        MOV_REG_MEM r3, $0100
        MOV_MEM_REG $0100, r7
    "#;
    // 0x0100 is past the default 256 bytes
    let config = MachineConfig { memory_size: 512, ..MachineConfig::default() };
    let mut cpu = config.build(&assemble(source).unwrap()).unwrap();
    cpu.run_limited(3, |_| false).unwrap();

    assert_eq!(cpu.get_register("r7").unwrap(), 0x00FF);
    assert_eq!(cpu.memory().dump(0x0100, 2), &[0x00, 0xFF]);
}

#[test]
fn jump_taken_and_not_taken() {
    let bytes = assemble("JMP_NOT_EQ 7, $0040").unwrap();

    let mut cpu = MachineConfig::default().build(&bytes).unwrap();
    cpu.set_register("acc", 5).unwrap();
    cpu.step().unwrap();
    assert_eq!(cpu.ip(), 0x0040);

    let mut cpu = MachineConfig::default().build(&bytes).unwrap();
    cpu.set_register("acc", 7).unwrap();
    cpu.step().unwrap();
    assert_eq!(cpu.ip(), 5);
}

#[test]
fn strict_config_faults_on_unknown_opcode() {
    let config = MachineConfig { strict_opcodes: true, ..MachineConfig::default() };
    let mut cpu = config.build(&[0x00]).unwrap();

    assert_eq!(cpu.step(), Err(CpuError::InvalidOpcode { opcode: 0x00, addr: 0 }));
}

#[test]
fn store_past_end_of_memory_is_an_error() {
    let mut memory = Memory::new(64);
    memory.load(0, &assemble("MOV_REG_MEM r1, $00FF").unwrap()).unwrap();
    let mut cpu = Cpu::new(memory);

    assert!(matches!(cpu.step(), Err(CpuError::Memory(_))));
}

#[test]
fn unknown_register_is_distinct_from_values() {
    let cpu = Cpu::new(Memory::new(16));
    let err = cpu.get_register("rX").unwrap_err();
    assert_eq!(err, CpuError::Register(RegisterError::UnknownRegister("rX".into())));
    assert_eq!(err.to_string(), "register error: no such register 'rX'");
}

#[test]
fn register_dump_serialises() {
    let mut cpu = Cpu::new(Memory::new(16));
    cpu.set_register("r8", 0x00AB).unwrap();

    let json = serde_json::to_value(cpu.dump_registers()).unwrap();
    assert_eq!(json[9]["name"], "r8");
    assert_eq!(json[9]["value"], 0xAB);
    assert_eq!(json.as_array().unwrap().len(), 10);
}
