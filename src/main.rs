mod bridge;
mod channel;
mod cli;
mod errors;
mod fan;
mod platform;
mod registers;
mod speed;
mod table;
#[cfg(test)]
mod test_support;

use std::fs::File;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use log::info;
use simplelog::{ConfigBuilder, LevelFilter, WriteLogger};

use bridge::{SensorAttr, SensorBridge, DEVICE_NAME, PWM_ENABLE_AUTOMATIC, PWM_ENABLE_MANUAL};
use channel::EcChannel;
use cli::{Cli, Commands, FanArg};
use fan::FanChannel;

fn level_from_verbosity(verbosity: u8) -> LevelFilter {
    match verbosity {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        2 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Log to uwfanctl.log next to the executable.
    let log_path = std::env::current_exe()
        .unwrap_or_default()
        .parent()
        .unwrap_or(std::path::Path::new("."))
        .join("uwfanctl.log");
    let log_config = ConfigBuilder::new().set_time_format_rfc3339().build();
    let log_level = level_from_verbosity(cli.verbose);
    if let Ok(file) = File::create(&log_path) {
        let _ = WriteLogger::init(log_level, log_config, file);
    }
    info!("{} started (log level: {})", DEVICE_NAME, log_level);

    let transport = platform::create_transport()
        .context("EC management interface not available on this machine")?;
    let ec = Arc::new(EcChannel::new(Arc::from(transport)));
    let bridge = SensorBridge::new(ec);

    match cli.command {
        Commands::Status => cmd_status(&bridge),
        Commands::Temp => cmd_temp(&bridge),
        Commands::Get { fan } => cmd_get(&bridge, fan),
        Commands::Set { fan, duty } => cmd_set(&bridge, fan, duty),
        Commands::Manual => cmd_enable(&bridge, PWM_ENABLE_MANUAL),
        Commands::Auto => cmd_enable(&bridge, PWM_ENABLE_AUTOMATIC),
        Commands::Monitor { interval } => cmd_monitor(&bridge, interval),
    }
}

fn cmd_status(bridge: &SensorBridge) -> Result<()> {
    let temp = bridge.read(SensorAttr::TempInput, 0)?;
    let mode = bridge.read(SensorAttr::PwmEnable, 0)?;
    let mode_label = if mode == PWM_ENABLE_MANUAL {
        "manual (custom table)"
    } else {
        "automatic (firmware)"
    };

    println!(
        "{}: {} °C — {}",
        bridge.read_label(SensorAttr::TempLabel, 0)?,
        temp / 1000,
        mode_label
    );
    for channel in FanChannel::ALL {
        let duty = bridge.read(SensorAttr::PwmInput, channel.index())?;
        println!("{:<8} duty {:>3}/255", channel.label(), duty);
    }
    Ok(())
}

fn cmd_temp(bridge: &SensorBridge) -> Result<()> {
    let temp = bridge.read(SensorAttr::TempInput, 0)?;
    println!("{} °C", temp / 1000);
    Ok(())
}

fn cmd_get(bridge: &SensorBridge, fan: FanArg) -> Result<()> {
    let channel = FanChannel::from(fan);
    let duty = bridge.read(SensorAttr::PwmInput, channel.index())?;
    println!("{}: duty {}/255", channel.label(), duty);
    Ok(())
}

fn cmd_set(bridge: &SensorBridge, fan: FanArg, duty: u8) -> Result<()> {
    let channel = FanChannel::from(fan);
    bridge.write(SensorAttr::PwmInput, channel.index(), duty as i64)?;
    println!("Set {} duty to {}", channel.label(), duty);
    Ok(())
}

fn cmd_enable(bridge: &SensorBridge, value: i64) -> Result<()> {
    bridge.write(SensorAttr::PwmEnable, 0, value)?;
    if value == PWM_ENABLE_AUTOMATIC {
        println!("Fan control returned to firmware.");
    } else {
        println!("Custom fan table active; fans accept manual speeds.");
    }
    Ok(())
}

fn cmd_monitor(bridge: &SensorBridge, interval_secs: u64) -> Result<()> {
    println!("Monitoring fans (Ctrl+C to stop)...\n");
    loop {
        // Clear screen with ANSI escape
        print!("\x1B[2J\x1B[H");
        println!("Fan Monitor (every {}s) — Ctrl+C to stop\n", interval_secs);

        let temp = bridge.read(SensorAttr::TempInput, 0)?;
        println!("CPU temperature: {} °C\n", temp / 1000);

        println!("{:<10} {:>9}", "FAN", "DUTY");
        println!("{}", "-".repeat(22));
        for channel in FanChannel::ALL {
            let duty = bridge.read(SensorAttr::PwmInput, channel.index())?;
            println!("{:<10} {:>5}/255", channel.label(), duty);
        }

        thread::sleep(Duration::from_secs(interval_secs));
    }
}
