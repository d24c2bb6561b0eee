//! Process priority classes selectable by name.

use serde::{Deserialize, Serialize};

use crate::error::{Result, WardenError};

/// Scheduling priority class for the supervised process.
///
/// Selected by a case-insensitive name from a fixed set; mapped to a unix
/// nice value when applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PriorityClass {
    /// Lowest scheduling priority.
    Idle,
    /// Below the default priority.
    BelowNormal,
    /// Default priority.
    #[default]
    Normal,
    /// Above the default priority.
    AboveNormal,
    /// High priority.
    High,
    /// Highest priority the engine will request.
    Realtime,
}

impl PriorityClass {
    /// Look up a priority class by its accepted name, case-insensitively.
    ///
    /// Accepted names: `idle`, `belownormal`, `normal`, `abovenormal`,
    /// `high`, `realtime`.
    pub fn from_name(name: &str) -> Result<Self> {
        match name.to_ascii_lowercase().as_str() {
            "idle" => Ok(Self::Idle),
            "belownormal" => Ok(Self::BelowNormal),
            "normal" => Ok(Self::Normal),
            "abovenormal" => Ok(Self::AboveNormal),
            "high" => Ok(Self::High),
            "realtime" => Ok(Self::Realtime),
            _ => Err(WardenError::UnsupportedValue {
                kind: "priority class",
                value: name.to_string(),
            }),
        }
    }

    /// The canonical accepted name for this class.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::BelowNormal => "belownormal",
            Self::Normal => "normal",
            Self::AboveNormal => "abovenormal",
            Self::High => "high",
            Self::Realtime => "realtime",
        }
    }

    /// The unix nice value this class maps to.
    pub fn nice_value(&self) -> i32 {
        match self {
            Self::Idle => 19,
            Self::BelowNormal => 10,
            Self::Normal => 0,
            Self::AboveNormal => -5,
            Self::High => -10,
            Self::Realtime => -20,
        }
    }

    /// Apply this priority class to a live process.
    ///
    /// Raising priority (negative nice) requires privilege; the OS error is
    /// surfaced as-is.
    #[cfg(unix)]
    pub fn apply_to(&self, pid: u32) -> Result<()> {
        let rc = unsafe {
            libc::setpriority(libc::PRIO_PROCESS, pid as libc::id_t, self.nice_value())
        };
        if rc == -1 {
            return Err(WardenError::Io(std::io::Error::last_os_error()));
        }
        Ok(())
    }

    /// Apply this priority class to a live process.
    #[cfg(not(unix))]
    pub fn apply_to(&self, _pid: u32) -> Result<()> {
        Ok(())
    }
}
