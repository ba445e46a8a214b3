//! Linux transport for the Uniwill EC management method.
//!
//! The kernel exposes vendor WMI devices on the WMI bus but does not offer a
//! generic userspace method-invocation interface, so the call goes through
//! the `acpi_call` debugfs module: the command is written to
//! `/proc/acpi/call` and the reply is read back from the same file as a
//! printed byte buffer.

use std::fs;
use std::path::{Path, PathBuf};

use crate::errors::FanControlError;
use crate::registers::UNIWILL_WMI_MGMT_GUID;
use super::{EcTransport, ARG_BUF_LEN};

const WMI_BUS_PATH: &str = "/sys/bus/wmi/devices";
const ACPI_CALL_PATH: &str = "/proc/acpi/call";

/// ACPI method backing the Uniwill "BC" management GUID, instance 0.
const MGMT_METHOD: &str = r"\_SB.AMW0.WMBC";
/// WMI method id of the register-access call.
const MGMT_METHOD_ID: u8 = 4;

/// EC transport backed by the `acpi_call` kernel module.
pub struct AcpiCallTransport {
    call_path: PathBuf,
}

impl AcpiCallTransport {
    /// Probe for the vendor interface and the acpi_call module.
    pub fn probe() -> Result<Self, FanControlError> {
        let wmi_device = Path::new(WMI_BUS_PATH).join(UNIWILL_WMI_MGMT_GUID);
        if !wmi_device.exists() {
            return Err(FanControlError::InterfaceMissing(format!(
                "WMI device {} not found under {}",
                UNIWILL_WMI_MGMT_GUID, WMI_BUS_PATH
            )));
        }

        let call_path = PathBuf::from(ACPI_CALL_PATH);
        if !call_path.exists() {
            return Err(FanControlError::InterfaceMissing(format!(
                "{} not found (is the acpi_call module loaded?)",
                ACPI_CALL_PATH
            )));
        }

        Ok(Self { call_path })
    }
}

impl EcTransport for AcpiCallTransport {
    fn evaluate(&self, args: &[u8; ARG_BUF_LEN]) -> Result<Vec<u8>, FanControlError> {
        let command = encode_command(args);
        fs::write(&self.call_path, &command)?;
        let reply = fs::read_to_string(&self.call_path)?;
        parse_reply(&reply)
    }
}

/// Build the acpi_call command line: method path, instance, method id and
/// the argument buffer as a hex-encoded `b...` literal.
fn encode_command(args: &[u8; ARG_BUF_LEN]) -> String {
    let mut hex = String::with_capacity(ARG_BUF_LEN * 2);
    for byte in args {
        hex.push_str(&format!("{:02x}", byte));
    }
    format!("{} 0x00 {:#04x} b{}", MGMT_METHOD, MGMT_METHOD_ID, hex)
}

/// Parse the printed reply read back from `/proc/acpi/call`.
///
/// Buffers come back as `{0x41, 0x00, ...}`, plain integers as `0x...`;
/// evaluation failures start with `Error`. The file pads the reply with a
/// trailing NUL.
fn parse_reply(reply: &str) -> Result<Vec<u8>, FanControlError> {
    let reply = reply.trim_end_matches('\0').trim();

    if reply.starts_with("Error") || reply.starts_with("not called") {
        return Err(FanControlError::Platform(format!(
            "acpi_call evaluation failed: {}",
            reply
        )));
    }

    if let Some(inner) = reply.strip_prefix('{').and_then(|r| r.strip_suffix('}')) {
        let mut bytes = Vec::new();
        for item in inner.split(',') {
            let item = item.trim();
            let value = item
                .strip_prefix("0x")
                .and_then(|hex| u8::from_str_radix(hex, 16).ok())
                .ok_or_else(|| {
                    FanControlError::Platform(format!("malformed acpi_call buffer element: {item}"))
                })?;
            bytes.push(value);
        }
        return Ok(bytes);
    }

    if let Some(hex) = reply.strip_prefix("0x") {
        let value = u64::from_str_radix(hex, 16).map_err(|_| {
            FanControlError::Platform(format!("malformed acpi_call integer reply: {reply}"))
        })?;
        return Ok(value.to_le_bytes().to_vec());
    }

    Err(FanControlError::Platform(format!(
        "unrecognized acpi_call reply: {reply}"
    )))
}
