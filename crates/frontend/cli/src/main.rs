use anyhow::{bail, Context, Result};
use clap::Parser;
use dmg_core::logging::{LogCategory, LogConfig, LogLevel, UNLIMITED};
use dmg_core::{RunBudget, SliceReport};
use dmg_gb::{DmgSystem, MachineConfig};
use serde_json::json;
use std::fs::{self, File};
use std::io::Write;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "dmg", about = "Run a Game Boy ROM on the LR35902 core headlessly")]
struct Args {
    /// Path to the cartridge ROM
    rom: PathBuf,

    /// Boot from this 256-byte boot ROM instead of the cartridge entry
    #[arg(long)]
    bootrom: Option<PathBuf>,

    /// Expected SHA-256 of the boot ROM (hex)
    #[arg(long)]
    bootrom_sha256: Option<String>,

    /// Machine configuration (JSON)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Number of frames (run-slices) to run
    #[arg(long, default_value_t = 60, conflicts_with = "instructions")]
    frames: u32,

    /// Run exactly this many instructions instead of whole frames
    #[arg(long)]
    instructions: Option<u64>,

    /// Global core log level (off, error, warn, info, debug, trace)
    #[arg(long, default_value = "off")]
    log_level: String,

    /// CPU log level; "trace" prints every executed instruction
    #[arg(long)]
    log_cpu: Option<String>,

    /// Maximum log messages per second per category (0 = unlimited).
    /// Defaults to unlimited with `--log-cpu trace` and to 60 otherwise
    #[arg(long)]
    log_rate_limit: Option<usize>,

    /// Write core logs to this file instead of stderr
    #[arg(long)]
    log_file: Option<PathBuf>,

    /// Dump the final machine state to this file as JSON
    #[arg(long)]
    save: Option<PathBuf>,

    /// Only print errors
    #[arg(long, default_value_t = false)]
    quiet: bool,
}

fn parse_level(name: &str) -> Result<LogLevel> {
    match LogLevel::from_str(name) {
        Some(level) => Ok(level),
        None => bail!("Unknown log level: {}", name),
    }
}

/// Explicit `--log-rate-limit`, else unlimited when tracing the CPU
fn rate_limit(args: &Args, cpu_level: Option<LogLevel>) -> Option<usize> {
    match (args.log_rate_limit, cpu_level) {
        (Some(limit), _) => Some(limit),
        (None, Some(LogLevel::Trace)) => Some(UNLIMITED),
        _ => None,
    }
}

fn configure_logging(args: &Args) -> Result<()> {
    let config = LogConfig::global();
    config.set_global_level(parse_level(&args.log_level)?);
    let cpu_level = match args.log_cpu.as_deref() {
        Some(level) => Some(parse_level(level)?),
        None => None,
    };
    if let Some(level) = cpu_level {
        config.set_level(LogCategory::Cpu, level);
    }
    if let Some(limit) = rate_limit(args, cpu_level) {
        config.set_rate_limit(limit);
    }
    if let Some(path) = args.log_file.as_ref() {
        config
            .set_log_file(path.clone())
            .with_context(|| format!("opening log file {}", path.display()))?;
    }
    Ok(())
}

fn machine_config(args: &Args) -> Result<MachineConfig> {
    let mut config = match args.config.as_ref() {
        Some(path) => MachineConfig::load(path)
            .with_context(|| format!("reading config {}", path.display()))?,
        None => MachineConfig::default(),
    };
    if let Some(digest) = args.bootrom_sha256.as_ref() {
        config.bootrom_sha256 = Some(digest.clone());
    }
    Ok(config)
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();
    configure_logging(&args)?;

    let mut sys = DmgSystem::new(machine_config(&args)?)?;

    let rom = fs::read(&args.rom).with_context(|| format!("reading {}", args.rom.display()))?;
    let header = sys.mount_cartridge(rom)?.header();
    log::info!("Loaded {} ({} bytes)", args.rom.display(), header.rom_size);

    if let Some(path) = args.bootrom.as_ref() {
        let data = fs::read(path).with_context(|| format!("reading {}", path.display()))?;
        sys.mount_bootrom(&data)?;
        log::info!("Booting from {}", path.display());
    }

    if !args.quiet {
        println!("{}", serde_json::to_string_pretty(&header)?);
    }

    let mut total = SliceReport::default();
    let outcome = match args.instructions {
        Some(n) => sys.run(RunBudget::Instructions(n)).map(|report| {
            total = report;
        }),
        None => (0..args.frames).try_for_each(|_| {
            let report = sys.step_frame()?;
            total.instructions += report.instructions;
            total.cycles += report.cycles;
            Ok(())
        }),
    };

    let engine = sys.engine();
    let state = json!({
        "registers": engine.regs,
        "ime": engine.ime(),
        "state": format!("{:?}", engine.state()),
        "instructions": total.instructions,
        "cycles": engine.cycles(),
    });

    if !args.quiet {
        println!("{}", serde_json::to_string_pretty(&state)?);
    }
    if let Some(path) = args.save.as_ref() {
        let mut f = File::create(path)?;
        write!(f, "{}", serde_json::to_string_pretty(&state)?)?;
    }

    outcome?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(extra: &[&str]) -> Args {
        let mut argv = vec!["dmg", "game.gb"];
        argv.extend_from_slice(extra);
        Args::try_parse_from(argv).unwrap()
    }

    #[test]
    fn test_cpu_trace_lifts_rate_limit() {
        let a = args(&["--log-cpu", "trace"]);
        assert_eq!(rate_limit(&a, Some(LogLevel::Trace)), Some(UNLIMITED));
    }

    #[test]
    fn test_explicit_rate_limit_wins() {
        let a = args(&["--log-cpu", "trace", "--log-rate-limit", "500"]);
        assert_eq!(rate_limit(&a, Some(LogLevel::Trace)), Some(500));
        let a = args(&["--log-rate-limit", "0"]);
        assert_eq!(rate_limit(&a, None), Some(UNLIMITED));
    }

    #[test]
    fn test_default_rate_limit_kept() {
        let a = args(&["--log-cpu", "debug"]);
        assert_eq!(rate_limit(&a, Some(LogLevel::Debug)), None);
        assert_eq!(rate_limit(&args(&[]), None), None);
    }

    #[test]
    fn test_bootrom_digest_flag_overrides_config() {
        let a = args(&["--bootrom-sha256", "ab"]);
        let config = machine_config(&a).unwrap();
        assert_eq!(config.bootrom_sha256.as_deref(), Some("ab"));
        assert!(machine_config(&args(&[])).unwrap().bootrom_sha256.is_none());
    }
}
