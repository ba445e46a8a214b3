//! Windows transport for the Uniwill EC management method.
//!
//! The vendor publishes its management class in `root\wmi`, identified by
//! the fixed GUID qualifier. WMI method calls are performed via PowerShell
//! subprocess since the `wmi` crate only supports queries, not method
//! invocation; the crate is still used for the manufacturer presence check.

use std::process::Command;

use serde::Deserialize;
use wmi::{COMLibrary, WMIConnection};

use crate::errors::FanControlError;
use crate::registers::UNIWILL_WMI_MGMT_GUID;
use super::{EcTransport, ARG_BUF_LEN};

/// Manufacturer strings used by Uniwill-built machines.
const UNIWILL_VENDORS: [&str; 3] = ["TUXEDO", "SCHENKER", "UNIWILL"];

/// EC transport backed by the vendor WMI management class.
pub struct WmiMethodTransport {
    /// MOF class name resolved from the management GUID at probe time.
    class_name: String,
}

impl WmiMethodTransport {
    /// Probe for a Uniwill-family machine and resolve the management class.
    pub fn probe() -> Result<Self, FanControlError> {
        if !is_uniwill_family() {
            return Err(FanControlError::InterfaceMissing(
                "system manufacturer is not a Uniwill-family vendor".into(),
            ));
        }

        let script = format!(
            "(Get-CimClass -Namespace root/wmi | Where-Object {{ \
             $_.CimClassQualifiers['guid'].Value -eq '{{{UNIWILL_WMI_MGMT_GUID}}}' }} | \
             Select-Object -First 1).CimClassName"
        );
        let class_name = ps_command(&script)?;
        if class_name.is_empty() {
            return Err(FanControlError::InterfaceMissing(format!(
                "no WMI class with GUID {} in root\\wmi",
                UNIWILL_WMI_MGMT_GUID
            )));
        }

        Ok(Self { class_name })
    }
}

impl EcTransport for WmiMethodTransport {
    fn evaluate(&self, args: &[u8; ARG_BUF_LEN]) -> Result<Vec<u8>, FanControlError> {
        let arg_list = args
            .iter()
            .map(|b| b.to_string())
            .collect::<Vec<_>>()
            .join(",");
        // The management method's output buffer is named Data in the vendor
        // MOF; print it one byte per line for parsing.
        let script = format!(
            "$inst = Get-WmiObject -Namespace root/wmi -Class {cls}; \
             $result = $inst.GetBC([byte[]]({args})); \
             $result.Data | ForEach-Object {{ $_ }}",
            cls = self.class_name,
            args = arg_list,
        );
        let output = ps_command(&script)?;

        let mut bytes = Vec::new();
        for line in output.lines() {
            let value: u8 = line.trim().parse().map_err(|_| {
                FanControlError::Platform(format!("malformed WMI method output: {line}"))
            })?;
            bytes.push(value);
        }
        Ok(bytes)
    }
}

/// Call a WMI script via PowerShell and return the trimmed stdout.
fn ps_command(script: &str) -> Result<String, FanControlError> {
    let output = Command::new("powershell.exe")
        .args(["-NoProfile", "-NonInteractive", "-Command", script])
        .output()
        .map_err(|e| FanControlError::Platform(format!("failed to run powershell: {e}")))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(FanControlError::Platform(format!(
            "powershell error: {}",
            stderr.trim()
        )));
    }

    Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
}

/// Detect whether this machine was built by a Uniwill-family vendor.
fn is_uniwill_family() -> bool {
    let com = match COMLibrary::new() {
        Ok(c) => c,
        Err(_) => return false,
    };
    let wmi = match WMIConnection::new(com) {
        Ok(w) => w,
        Err(_) => return false,
    };

    #[derive(Deserialize)]
    #[serde(rename = "Win32_ComputerSystem")]
    #[serde(rename_all = "PascalCase")]
    struct ComputerSystem {
        manufacturer: String,
    }

    let results: Vec<ComputerSystem> = wmi
        .raw_query("SELECT Manufacturer FROM Win32_ComputerSystem")
        .unwrap_or_default();

    results
        .first()
        .map(|cs| {
            let upper = cs.manufacturer.to_uppercase();
            UNIWILL_VENDORS.iter().any(|vendor| upper.contains(vendor))
        })
        .unwrap_or(false)
}
