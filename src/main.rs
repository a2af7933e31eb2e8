mod config;
mod lcd;

use std::{error::Error, path::PathBuf, process::ExitCode};

use chrono::{Datelike, Local, Timelike};
use clap::Parser;
use log::{error, info};
use nc1020_core::{Nc1020, StoragePaths, WallClock, machine::LCD_BUFFER_SIZE};

use config::FrontendConfig;

#[derive(Parser, Debug)]
#[command(name = "nc1020", about = "Headless WQX NC1020 emulator")]
struct Args {
    /// Directory holding obj_lu.bin, nc1020.fls and nc1020.sts
    dir: Option<PathBuf>,

    /// Frontend config file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Start from power-on state instead of the saved snapshot
    #[arg(long)]
    reset: bool,

    /// Milliseconds of emulated time to run
    #[arg(long, default_value_t = 1000)]
    ms: u64,

    /// Milliseconds per time slice
    #[arg(long)]
    slice: Option<u64>,

    /// Shorten the timer1 period
    #[arg(long)]
    speed_up: bool,

    /// Hold key ID (0-63) during the first slice; may be repeated
    #[arg(long = "key", value_parser = clap::value_parser!(u8).range(0..64))]
    keys: Vec<u8>,

    /// Write the final LCD frame to a PNG file
    #[arg(long)]
    lcd_png: Option<PathBuf>,

    /// Copy the host clock into the firmware before running
    #[arg(long)]
    sync_time: bool,

    /// Do not write NOR and snapshot back to disk
    #[arg(long)]
    no_save: bool,
}

fn wall_clock_now() -> WallClock {
    let now = Local::now();
    WallClock {
        year: now.year(),
        month: now.month() as u8,
        day: now.day() as u8,
        weekday: now.weekday().num_days_from_sunday() as u8,
        hour: now.hour() as u8,
        minute: now.minute() as u8,
        second: now.second() as u8,
    }
}

fn run(args: &Args, cfg: &FrontendConfig, dir: PathBuf) -> Result<(), Box<dyn Error>> {
    let mut machine = Nc1020::initialize(StoragePaths::from_dir(&dir))?;
    if args.reset {
        machine.reset()?;
    } else {
        machine.load()?;
    }
    info!("machine ready at PC {:04X}", machine.cpu.pc);

    if args.sync_time || cfg.sync_time {
        machine.sync_time(&wall_clock_now());
    }

    let slice = args.slice.unwrap_or(cfg.slice_ms).max(1);
    let speed_up = args.speed_up || cfg.speed_up;
    for &key in &args.keys {
        machine.set_key(key, true);
    }

    let mut remaining = args.ms;
    let mut first = true;
    while remaining > 0 {
        let ms = remaining.min(slice);
        machine.run_time_slice(ms, speed_up);
        remaining -= ms;
        if first {
            for &key in &args.keys {
                machine.set_key(key, false);
            }
            first = false;
        }
    }
    info!(
        "ran {} ms, {} cycles total, {} illegal opcodes",
        args.ms,
        machine.cycles(),
        machine.cpu.illegal_opcodes
    );

    if let Some(path) = &args.lcd_png {
        let mut frame = [0u8; LCD_BUFFER_SIZE];
        if machine.copy_lcd_buffer(&mut frame) {
            lcd::write_png(path, &frame)?;
            info!("wrote LCD frame to {}", path.display());
        } else {
            info!("LCD address not latched yet; no frame written");
        }
    }

    if !args.no_save {
        machine.save()?;
    }
    Ok(())
}

fn main() -> ExitCode {
    env_logger::init();
    let args = Args::parse();

    let config_path = args.config.clone().unwrap_or_else(config::default_config_path);
    let cfg = config::load_from_file(&config_path);

    let Some(dir) = args.dir.clone().or_else(|| cfg.storage_dir.clone()) else {
        error!("No storage directory supplied");
        return ExitCode::FAILURE;
    };

    match run(&args, &cfg, dir) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e}");
            ExitCode::FAILURE
        }
    }
}
