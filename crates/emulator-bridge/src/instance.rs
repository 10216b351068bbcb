//! Emulator instances as reported by the manager console.

use std::fmt;
use std::str::FromStr;
use serde::{Deserialize, Serialize};

use crate::console::ConsoleError;

/// Runtime status of an instance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InstanceStatus {
    Stopped,
    Launching,
    Running,
    Unknown,
}

impl InstanceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            InstanceStatus::Stopped => "stopped",
            InstanceStatus::Launching => "launching",
            InstanceStatus::Running => "running",
            InstanceStatus::Unknown => "unknown",
        }
    }
}

impl fmt::Display for InstanceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A configured emulator instance
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Instance {
    /// Stable manager index
    pub id: u32,
    /// Display name, also used in the window title
    pub name: String,
    /// Top-level window handle reported by the manager (0 when not running)
    pub top_window: isize,
    /// Render surface handle reported by the manager
    pub bind_window: isize,
    /// Runtime status
    pub status: InstanceStatus,
    /// Emulator process id
    pub pid: Option<u32>,
    /// Screen width
    pub width: Option<u32>,
    /// Screen height
    pub height: Option<u32>,
    /// Screen density
    pub dpi: Option<u32>,
}

impl Instance {
    /// Create an instance with only identity known
    pub fn new(id: u32, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            top_window: 0,
            bind_window: 0,
            status: InstanceStatus::Unknown,
            pid: None,
            width: None,
            height: None,
            dpi: None,
        }
    }

    /// Parse one row of `list2`:
    /// `index,title,top_hwnd,bind_hwnd,android_started,pid,vbox_pid[,width,height,dpi]`
    pub fn parse_list2_row(line: &str) -> Option<Self> {
        let parts: Vec<&str> = line.split(',').map(str::trim).collect();
        if parts.len() < 2 {
            return None;
        }

        let id = parts[0].parse().ok()?;
        let name = parts[1];
        if name.is_empty() {
            return None;
        }

        let field = |i: usize| parts.get(i).copied();
        let number = |i: usize| field(i).and_then(|v| v.parse::<i64>().ok());

        let mut instance = Instance::new(id, name);
        instance.top_window = number(2).unwrap_or(0) as isize;
        instance.bind_window = number(3).unwrap_or(0) as isize;
        instance.pid = number(5).filter(|pid| *pid > 0).map(|pid| pid as u32);
        instance.width = number(7).and_then(|v| u32::try_from(v).ok());
        instance.height = number(8).and_then(|v| u32::try_from(v).ok());
        instance.dpi = number(9).and_then(|v| u32::try_from(v).ok());

        instance.status = match (field(4), instance.pid) {
            (Some("1"), _) => InstanceStatus::Running,
            (Some(_), Some(_)) => InstanceStatus::Launching,
            (Some(_), None) => InstanceStatus::Stopped,
            (None, _) => InstanceStatus::Unknown,
        };

        Some(instance)
    }

    pub fn is_running(&self) -> bool {
        self.status == InstanceStatus::Running
    }

    /// Console port the instance's bridge device is expected on
    pub fn console_port(&self) -> Option<u16> {
        crate::console_port_for(self.id)
    }
}

/// Parse the full output of `list2`, skipping rows that don't parse.
pub fn parse_list2(output: &str) -> Vec<Instance> {
    output
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .filter_map(Instance::parse_list2_row)
        .collect()
}

/// Screen resolution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

impl FromStr for Resolution {
    type Err = String;

    /// Accepts `540x960` or `540,960`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (w, h) = s
            .split_once(|c: char| c == 'x' || c == 'X' || c == ',')
            .ok_or_else(|| format!("invalid resolution '{}', expected WIDTHxHEIGHT", s))?;
        let width = w.trim().parse().map_err(|_| format!("invalid width in '{}'", s))?;
        let height = h.trim().parse().map_err(|_| format!("invalid height in '{}'", s))?;
        Ok(Self { width, height })
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Per-instance resource settings. `None` fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstanceSettings {
    pub cpu: Option<u32>,
    pub memory_mb: Option<u32>,
    pub resolution: Option<Resolution>,
    pub dpi: Option<u32>,
    pub fps: Option<u32>,
    pub title: Option<String>,
}

impl InstanceSettings {
    pub fn is_empty(&self) -> bool {
        *self == InstanceSettings::default()
    }

    /// Rejects combinations the console cannot apply. Density only
    /// travels with a screen size.
    pub fn check(&self) -> Result<(), ConsoleError> {
        if self.dpi.is_some() && self.resolution.is_none() {
            return Err(ConsoleError::InvalidSettings(
                "dpi can only be changed together with the resolution".into(),
            ));
        }
        Ok(())
    }

    /// Console invocations that apply these settings to instance `id`,
    /// one per changed field.
    pub fn to_commands(&self, id: u32) -> Result<Vec<Vec<String>>, ConsoleError> {
        self.check()?;
        let index = id.to_string();
        let modify = |flag: &str, value: String| {
            vec!["modify".into(), "--index".into(), index.clone(), flag.into(), value]
        };

        let mut commands = Vec::new();
        if let Some(cpu) = self.cpu {
            commands.push(modify("--cpu", cpu.to_string()));
        }
        if let Some(memory) = self.memory_mb {
            commands.push(modify("--memory", memory.to_string()));
        }
        if let Some(res) = self.resolution {
            // The manager wants density alongside the size
            let dpi = self.dpi.unwrap_or(240);
            commands.push(modify("--resolution", format!("{},{},{}", res.width, res.height, dpi)));
        }
        if let Some(fps) = self.fps {
            commands.push(modify("--fps", fps.to_string()));
        }
        if let Some(ref title) = self.title {
            commands.push(vec![
                "rename".into(),
                "--index".into(),
                index.clone(),
                "--title".into(),
                title.clone(),
            ]);
        }
        Ok(commands)
    }
}
