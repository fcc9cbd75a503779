//! Environment signals: data-saving preference, connection type, device memory.
//!
//! Signals arrive as client hint headers on the intercepted request:
//! `Save-Data: on`, `ECT: 2g`, `Device-Memory: 0.5`. A missing or
//! unparseable hint is treated as "not constrained".

use serde::{Deserialize, Serialize};

use crate::types::InterceptedRequest;

pub const SAVE_DATA_HEADER: &str = "save-data";
pub const ECT_HEADER: &str = "ect";
pub const DEVICE_MEMORY_HEADER: &str = "device-memory";

/// Read-only snapshot of the client's network and device conditions.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EnvironmentSignals {
    pub save_data: bool,
    /// Effective connection type, e.g. `slow-2g`, `2g`, `3g`, `4g`.
    pub effective_type: Option<String>,
    /// Approximate device memory in gigabytes.
    pub device_memory: Option<f64>,
}

impl EnvironmentSignals {
    /// Parse signals from the request's client hint headers.
    pub fn from_request(request: &InterceptedRequest) -> Self {
        let save_data = request
            .header(SAVE_DATA_HEADER)
            .map(parse_save_data)
            .unwrap_or(false);

        let effective_type = request
            .header(ECT_HEADER)
            .map(|v| v.trim().to_ascii_lowercase())
            .filter(|v| !v.is_empty());

        let device_memory = request
            .header(DEVICE_MEMORY_HEADER)
            .and_then(|v| v.trim().parse::<f64>().ok())
            .filter(|m| m.is_finite() && *m >= 0.0);

        Self {
            save_data,
            effective_type,
            device_memory,
        }
    }

    /// True when the effective connection type is 2G-class (`2g`, `slow-2g`).
    pub fn is_2g(&self) -> bool {
        self.effective_type
            .as_deref()
            .is_some_and(|ect| ect.contains("2g"))
    }

    /// True when the device reports less than 1 GB of memory.
    pub fn is_low_memory(&self) -> bool {
        self.device_memory.is_some_and(|m| m < 1.0)
    }

    /// Any signal asking for lighter assets.
    pub fn is_constrained(&self) -> bool {
        self.save_data || self.is_2g() || self.is_low_memory()
    }
}

/// `Save-Data` counts as on for any non-empty value other than `off`/`0`.
fn parse_save_data(value: &str) -> bool {
    let v = value.trim();
    !(v.is_empty() || v.eq_ignore_ascii_case("off") || v == "0")
}
