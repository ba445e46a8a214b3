use clap::{ArgAction, Parser, Subcommand, ValueEnum};

use crate::fan::FanChannel;

#[derive(Parser)]
#[command(name = "uwfanctl")]
#[command(about = "Manual fan control for Uniwill/TUXEDO InfinityBook Gen10 laptops")]
#[command(version)]
pub struct Cli {
    /// Increase log verbosity (-v = info, -vv = debug, -vvv = trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Show temperature, fan speeds and control mode
    Status,

    /// Print the CPU temperature
    Temp,

    /// Get the current speed of a fan
    Get {
        /// Which fan to query
        fan: FanArg,
    },

    /// Set a fan's duty cycle (0–255); switches the EC to manual control
    Set {
        /// Which fan to drive
        fan: FanArg,

        /// Duty value (0 = minimum, 255 = full speed)
        #[arg(value_parser = clap::value_parser!(u8))]
        duty: u8,
    },

    /// Switch the EC to host-manual control without changing speeds
    Manual,

    /// Hand fan control back to the EC firmware curve
    Auto,

    /// Monitor temperature and fan speeds in real-time
    Monitor {
        /// Refresh interval in seconds
        #[arg(short, long, default_value = "1")]
        interval: u64,
    },
}

#[derive(Clone, Copy, ValueEnum)]
pub enum FanArg {
    /// Primary fan (CPU)
    Cpu,
    /// Secondary fan (GPU)
    Gpu,
}

impl From<FanArg> for FanChannel {
    fn from(arg: FanArg) -> Self {
        match arg {
            FanArg::Cpu => FanChannel::Primary,
            FanArg::Gpu => FanChannel::Secondary,
        }
    }
}
