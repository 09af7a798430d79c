//! Game Boy (DMG) machine: an LR35902 engine wired to a cartridge and an
//! optional boot ROM.

use dmg_core::logging::{log, LogCategory, LogLevel};
use dmg_core::memory::AddressSpace;
use dmg_core::registers::{BOOTROM_ENTRY, CARTRIDGE_ENTRY};
use dmg_core::{EngineError, ExecutionEngine, RunBudget, SliceReport};

pub mod bootrom;
pub mod bus;
pub mod cartridge;
pub mod config;

pub use bootrom::Bootrom;
pub use bus::DmgBus;
pub use cartridge::{Cartridge, CartridgeHeader};
pub use config::{BootMode, MachineConfig};

#[derive(thiserror::Error, Debug)]
pub enum DmgError {
    #[error("No cartridge loaded")]
    NoCartridge,
    #[error("ROM is {0} bytes; at least 32768 are required")]
    RomTooSmall(usize),
    #[error("ROM is {0} bytes; at most 2097152 are supported")]
    RomTooLarge(usize),
    #[error("boot ROM is {0} bytes; expected 256")]
    BootromSize(usize),
    #[error("boot ROM digest mismatch: expected {expected}, got {actual}")]
    BootromDigest { expected: String, actual: String },
    #[error("not a SHA-256 hex digest: {0:?}")]
    InvalidDigest(String),
    #[error(transparent)]
    Engine(#[from] EngineError),
    #[error("invalid configuration: {0}")]
    Config(#[from] serde_json::Error),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub struct DmgSystem {
    engine: ExecutionEngine<DmgBus>,
    config: MachineConfig,
    cartridge: Option<Cartridge>,
    bootrom: Option<Bootrom>,
}

impl DmgSystem {
    pub fn new(config: MachineConfig) -> Result<Self, DmgError> {
        let engine = ExecutionEngine::new(DmgBus::new())?;
        Ok(Self {
            engine,
            config,
            cartridge: None,
            bootrom: None,
        })
    }

    /// Validate and insert a cartridge, then reset
    pub fn mount_cartridge(&mut self, rom: Vec<u8>) -> Result<&Cartridge, DmgError> {
        let cart = Cartridge::from_bytes(rom)?;
        log(LogCategory::Loader, LogLevel::Info, || {
            format!(
                "cartridge \"{}\" type {:02X}, {} bytes",
                cart.title(),
                cart.cartridge_type(),
                cart.rom().len()
            )
        });
        self.cartridge = Some(cart);
        self.reset();
        self.cartridge.as_ref().ok_or(DmgError::NoCartridge)
    }

    /// Load a boot ROM, checking it against `bootrom_sha256` when configured
    /// and against the retail DMG digest otherwise, and switch to booting from it
    pub fn mount_bootrom(&mut self, data: &[u8]) -> Result<(), DmgError> {
        let bootrom = Bootrom::verified(data, self.config.bootrom_sha256.as_deref())?;
        log(LogCategory::Loader, LogLevel::Info, || {
            format!("boot ROM sha256 {}", bootrom.sha256())
        });
        self.bootrom = Some(bootrom);
        self.config.boot = BootMode::Bootrom;
        self.reset();
        Ok(())
    }

    pub fn unmount_cartridge(&mut self) {
        self.cartridge = None;
        self.reset();
    }

    /// Rebuild memory from the mounted media and restart the CPU
    pub fn reset(&mut self) {
        let bus = &mut self.engine.memory;
        bus.clear();
        if let Some(cart) = &self.cartridge {
            bus.map_cartridge(cart, self.config.ignore_rom_writes);
        }

        let entry = match (self.config.boot, &self.bootrom) {
            (BootMode::Bootrom, Some(bootrom)) => {
                bus.map_bootrom(bootrom);
                BOOTROM_ENTRY
            }
            (BootMode::Bootrom, None) => {
                log(LogCategory::Loader, LogLevel::Warn, || {
                    "boot ROM requested but none mounted; starting at the cartridge entry"
                        .to_string()
                });
                CARTRIDGE_ENTRY
            }
            (BootMode::Cartridge, _) => CARTRIDGE_ENTRY,
        };
        self.engine.reset(entry);
    }

    /// Run one slice of `slice_cycles`
    pub fn step_frame(&mut self) -> Result<SliceReport, DmgError> {
        self.run(RunBudget::Cycles(self.config.slice_cycles))
    }

    pub fn run(&mut self, budget: RunBudget) -> Result<SliceReport, DmgError> {
        if self.cartridge.is_none() {
            return Err(DmgError::NoCartridge);
        }
        Ok(self.engine.run(budget)?)
    }

    pub fn engine(&self) -> &ExecutionEngine<DmgBus> {
        &self.engine
    }

    pub fn engine_mut(&mut self) -> &mut ExecutionEngine<DmgBus> {
        &mut self.engine
    }

    pub fn memory(&self) -> &AddressSpace {
        self.engine.memory.space()
    }

    pub fn cartridge(&self) -> Option<&Cartridge> {
        self.cartridge.as_ref()
    }

    pub fn config(&self) -> &MachineConfig {
        &self.config
    }
}
