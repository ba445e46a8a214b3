use std::fmt;

use crate::registers::*;

/// One of the two fans driven by the EC. Primary is conventionally the CPU
/// fan, Secondary the GPU fan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FanChannel {
    Primary,
    Secondary,
}

impl FanChannel {
    pub const ALL: [FanChannel; 2] = [FanChannel::Primary, FanChannel::Secondary];

    /// Direct speed register — writes take effect immediately.
    pub fn direct_speed_reg(self) -> u16 {
        match self {
            FanChannel::Primary => REG_FAN1_SPEED,
            FanChannel::Secondary => REG_FAN2_SPEED,
        }
    }

    /// Base of the 16-zone end-temperature block for this channel.
    pub fn table_end_temp_base(self) -> u16 {
        match self {
            FanChannel::Primary => REG_CPU_TABLE_END_TEMP,
            FanChannel::Secondary => REG_GPU_TABLE_END_TEMP,
        }
    }

    /// Base of the 16-zone start-temperature block for this channel.
    pub fn table_start_temp_base(self) -> u16 {
        match self {
            FanChannel::Primary => REG_CPU_TABLE_START_TEMP,
            FanChannel::Secondary => REG_GPU_TABLE_START_TEMP,
        }
    }

    /// Base of the 16-zone speed block; zone 0's slot doubles as the
    /// channel's table-speed register during manual control.
    pub fn table_speed_base(self) -> u16 {
        match self {
            FanChannel::Primary => REG_CPU_TABLE_FAN_SPEED,
            FanChannel::Secondary => REG_GPU_TABLE_FAN_SPEED,
        }
    }

    /// End temperature of zone 0 (the "fan off" zone).
    pub fn zone0_end_temp(self) -> u8 {
        match self {
            FanChannel::Primary => 115,
            FanChannel::Secondary => 120,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            FanChannel::Primary => "CPU Fan",
            FanChannel::Secondary => "GPU Fan",
        }
    }

    pub fn index(self) -> usize {
        match self {
            FanChannel::Primary => 0,
            FanChannel::Secondary => 1,
        }
    }
}

impl fmt::Display for FanChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}
