//! End-to-end runs of small programs on the DMG machine

use dmg_core::memory::Memory;
use dmg_core::registers::{Flag, Reg8};
use dmg_core::{EngineState, RunBudget};
use dmg_gb::bootrom::{sha256_hex, BOOTROM_SIZE};
use dmg_gb::{BootMode, DmgError, DmgSystem, MachineConfig};

/// 32KB image starting with `program`; the bus places byte 0 at $0100
fn cartridge(program: &[u8]) -> Vec<u8> {
    let mut rom = vec![0u8; 0x8000];
    rom[..program.len()].copy_from_slice(program);
    rom
}

/// Boot program that only hands over to the cartridge: NOPs, then
/// LD A,1 ; LDH ($50),A at the very end so PC falls through to $0100
fn handover_bootrom() -> Vec<u8> {
    let mut boot = vec![0u8; BOOTROM_SIZE];
    boot[0xFC..].copy_from_slice(&[0x3E, 0x01, 0xE0, 0x50]);
    boot
}

/// Config that accepts `bootrom` in place of the retail image
fn trusting(bootrom: &[u8]) -> MachineConfig {
    MachineConfig {
        bootrom_sha256: Some(sha256_hex(bootrom)),
        ..MachineConfig::default()
    }
}

fn machine(program: &[u8]) -> DmgSystem {
    let mut sys = DmgSystem::new(MachineConfig::default()).expect("machine");
    sys.mount_cartridge(cartridge(program)).expect("cartridge");
    sys
}

#[test]
fn test_bootrom_hands_over_to_cartridge() {
    let boot = handover_bootrom();
    let mut sys = DmgSystem::new(trusting(&boot)).expect("machine");
    sys.mount_cartridge(cartridge(&[0x76])).expect("cartridge");
    sys.mount_bootrom(&boot).expect("bootrom");
    assert_eq!(sys.memory().read(0x00FC), 0x3E);
    assert_eq!(sys.memory().read(0x0100), 0x76);

    // 252 NOPs, LD A,1, LDH ($50),A
    let report = sys.run(RunBudget::Instructions(254)).expect("run");
    assert_eq!(report.cycles, 252 * 4 + 8 + 12);

    let engine = sys.engine();
    assert_eq!(engine.regs.pc, 0x0100);
    assert!(!engine.memory.bootrom_mapped());
    assert_eq!(sys.memory().read(0x00FC), 0x00);
    assert_eq!(sys.memory().read(0x0100), 0x76);

    sys.run(RunBudget::Instructions(1)).expect("run");
    assert_eq!(*sys.engine().state(), EngineState::LowPower);
}

#[test]
fn test_default_config_only_accepts_retail_bootrom() {
    let mut sys = machine(&[]);
    let err = sys.mount_bootrom(&[0x42; BOOTROM_SIZE]).unwrap_err();
    assert!(matches!(err, DmgError::BootromDigest { .. }));
    assert!(err.to_string().contains("32fbbd84168d3482956eb3c5051637f5"));
    assert!(!sys.engine().memory.bootrom_mapped());
    assert_eq!(sys.engine().regs.pc, 0x0100);
}

#[test]
fn test_bootrom_digest_from_config_file() {
    let dir = std::env::temp_dir().join(format!("dmg-config-{}", std::process::id()));
    std::fs::create_dir_all(&dir).expect("temp dir");
    let path = dir.join("machine.json");

    let wrong = sha256_hex(b"not the boot rom");
    std::fs::write(
        &path,
        format!(r#"{{"boot": "bootrom", "bootrom_sha256": "{}"}}"#, wrong),
    )
    .expect("write config");

    let config = MachineConfig::load(&path).expect("config");
    assert_eq!(config.boot, BootMode::Bootrom);
    let mut sys = DmgSystem::new(config).expect("machine");
    sys.mount_cartridge(cartridge(&[])).expect("cartridge");

    let boot = handover_bootrom();
    let err = sys.mount_bootrom(&boot).unwrap_err();
    assert!(matches!(err, DmgError::BootromDigest { .. }));
    assert!(!sys.engine().memory.bootrom_mapped());

    let right = sha256_hex(&boot);
    let config = MachineConfig {
        bootrom_sha256: Some(right.to_uppercase()),
        ..MachineConfig::default()
    };
    let mut sys = DmgSystem::new(config).expect("machine");
    sys.mount_cartridge(cartridge(&[])).expect("cartridge");
    assert!(sys.mount_bootrom(&boot).is_ok());
    assert_eq!(sys.engine().regs.pc, 0x0000);

    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn test_multiply_loop_into_wram() {
    // B = 7, C = 6; A += C, B times; store A at $C000; HALT
    let program = [
        0x06, 0x07, //       LD B,7
        0x0E, 0x06, //       LD C,6
        0xAF, //             XOR A
        0x81, //       loop: ADD A,C
        0x05, //             DEC B
        0x20, 0xFC, //       JR NZ,loop
        0xEA, 0x00, 0xC0, // LD ($C000),A
        0x76, //             HALT
    ];
    let mut sys = machine(&program);
    sys.run(RunBudget::Instructions(3 + 7 * 3 + 2)).expect("run");

    assert_eq!(sys.memory().read(0xC000), 42);
    assert_eq!(sys.engine().regs.a(), 42);
    assert_eq!(sys.engine().regs.get8(Reg8::B), 0);
    assert!(sys.engine().regs.flag(Flag::Zero));
    assert_eq!(*sys.engine().state(), EngineState::LowPower);
}

#[test]
fn test_halt_wakes_on_enabled_interrupt() {
    // HALT ; INC A ; HALT
    let mut sys = machine(&[0x76, 0x3C, 0x76]);
    sys.step_frame().expect("frame");
    assert_eq!(*sys.engine().state(), EngineState::LowPower);
    assert_eq!(sys.engine().regs.pc, 0x0101);
    let a = sys.engine().regs.a();

    // Between slices: raise and enable VBlank
    let bus = &mut sys.engine_mut().memory;
    bus.write(0xFFFF, 0x01);
    bus.write(0xFF0F, 0x01);

    sys.run(RunBudget::Instructions(2)).expect("run");
    assert_eq!(sys.engine().regs.a(), a.wrapping_add(1));
    assert_eq!(sys.engine().regs.pc, 0x0103);
}

#[test]
fn test_program_cannot_patch_rom() {
    // LD HL,$0150 ; LD (HL),$FF ; LD A,(HL) ; HALT
    let mut program = vec![0x21, 0x50, 0x01, 0x36, 0xFF, 0x7E, 0x76];
    program.resize(0x60, 0x00);
    program[0x50] = 0x12;
    let mut sys = machine(&program);
    sys.run(RunBudget::Instructions(4)).expect("run");
    assert_eq!(sys.engine().regs.a(), 0x12);
}

#[test]
fn test_call_ret_through_stack_in_hram() {
    // LD SP,$FFFE ; CALL $0110 ; HALT ... $0110: LD A,$55 ; RET
    let mut program = vec![0x31, 0xFE, 0xFF, 0xCD, 0x10, 0x01, 0x76];
    program.resize(0x10, 0x00);
    program.extend_from_slice(&[0x3E, 0x55, 0xC9]);
    let mut sys = machine(&program);
    let report = sys.run(RunBudget::Instructions(5)).expect("run");

    assert_eq!(report.cycles, 12 + 24 + 8 + 16 + 4);
    assert_eq!(sys.engine().regs.a(), 0x55);
    assert_eq!(sys.engine().regs.sp, 0xFFFE);
    assert_eq!(sys.memory().read(0xFFFC), 0x06);
    assert_eq!(sys.memory().read(0xFFFD), 0x01);
}

#[test]
fn test_frame_budget_overshoots_to_boundary() {
    // LD BC,d16 forever: 12 cycles each
    let mut program = Vec::new();
    for _ in 0..0x2000 {
        program.extend_from_slice(&[0x01, 0x00, 0x00]);
    }
    let config = MachineConfig {
        slice_cycles: 100,
        ..MachineConfig::default()
    };
    let mut sys = DmgSystem::new(config).expect("machine");
    let mut rom = vec![0u8; 0x8000];
    rom[..0x6000].copy_from_slice(&program[..0x6000]);
    sys.mount_cartridge(rom).expect("cartridge");

    let report = sys.step_frame().expect("frame");
    assert_eq!(report.instructions, 9);
    assert_eq!(report.cycles, 108);
}
