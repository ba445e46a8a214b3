//! EC register map for the Uniwill IBG10 fan subsystem.
//!
//! Addresses come from the vendor firmware; only the registers used by fan
//! control and temperature readout are listed here. All registers are 8-bit
//! values behind 16-bit addresses, accessed one at a time through the WMI
//! management method.

/// Vendor WMI management GUID (Uniwill "BC" interface).
pub const UNIWILL_WMI_MGMT_GUID: &str = "ABBC0F6F-8EA1-11D1-00A0-C90629100000";

/// Custom-fan-table enable registers.
pub const REG_USE_CUSTOM_FAN_TABLE_0: u16 = 0x07c5;
pub const REG_USE_CUSTOM_FAN_TABLE_1: u16 = 0x07c6;
/// Bit in `REG_USE_CUSTOM_FAN_TABLE_0`.
pub const CUSTOM_FAN_TABLE_0_BIT: u8 = 1 << 7;
/// Bit in `REG_USE_CUSTOM_FAN_TABLE_1`.
pub const CUSTOM_FAN_TABLE_1_BIT: u8 = 1 << 2;

/// Per-zone fan table blocks. Each block is 16 consecutive registers, one
/// per zone; zone `i` lives at `base + i`.
pub const REG_CPU_TABLE_END_TEMP: u16 = 0x0f00;
pub const REG_CPU_TABLE_START_TEMP: u16 = 0x0f10;
pub const REG_CPU_TABLE_FAN_SPEED: u16 = 0x0f20;
pub const REG_GPU_TABLE_END_TEMP: u16 = 0x0f30;
pub const REG_GPU_TABLE_START_TEMP: u16 = 0x0f40;
pub const REG_GPU_TABLE_FAN_SPEED: u16 = 0x0f50;

/// Direct fan speed registers (immediate effect, EC scale 0–200).
pub const REG_FAN1_SPEED: u16 = 0x1804;
pub const REG_FAN2_SPEED: u16 = 0x1809;

/// CPU temperature sensor, degrees Celsius.
pub const REG_FAN1_TEMP: u16 = 0x043e;

/// Fan mode register; bit 6 forces full fan speed.
pub const REG_FAN_MODE: u16 = 0x0751;
pub const FAN_MODE_FULL_BIT: u8 = 1 << 6;

/// Manual mode control: 0x01 = host-controlled, 0x00 = firmware-controlled.
pub const REG_MANUAL_MODE: u16 = 0x0741;

/// Custom profile mode; bit 6 enables the host-programmed profile.
pub const REG_CUSTOM_PROFILE: u16 = 0x0727;
pub const CUSTOM_PROFILE_BIT: u8 = 1 << 6;

/// Maximum fan speed on the EC scale.
pub const FAN_SPEED_MAX: u8 = 200;
/// Lowest commanded speed the EC will hold without fighting the host
/// (~12.5%). Empirical, not a physical stall limit.
pub const FAN_ON_MIN_SPEED: u8 = 25;

/// Number of zones in a custom fan table.
pub const FAN_TABLE_ZONES: usize = 16;
/// Zones 1..15 cover 1 °C bands starting at this temperature.
pub const FAN_TABLE_TEMP_OFFSET: u8 = 115;
