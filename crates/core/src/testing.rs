//! In-memory emulator manager and bridge for tests.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use async_trait::async_trait;
use parking_lot::Mutex;

use ld_dock_emulator_bridge::{
    console_port_for, AdbError, ConsoleError, Device, DeviceBridge, DeviceState, EmulatorConsole,
    Instance, InstanceSettings,
};

/// A recorded external call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    ListInstances,
    Launch(String),
    Modify(u32),
    ListDevices,
    Shell(String, String),
    Tap(String, u32, u32),
}

#[derive(Default)]
struct FakeState {
    calls: Vec<Call>,
    /// Instance id -> device-list polls seen since launch
    launched: HashMap<u32, u32>,
    /// Serial -> home checks seen
    home_checks: HashMap<String, u32>,
}

/// Scriptable emulator manager and bridge
pub struct FakeEmulator {
    instances: Vec<Instance>,
    state: Mutex<FakeState>,
    /// Polls after launch before an instance's device shows up
    pub connect_after: u32,
    /// Home checks before the launcher appears
    pub home_after: u32,
    /// Instances whose device never connects
    pub never_connect: HashSet<String>,
    /// Instances whose launcher never appears
    pub never_home: HashSet<String>,
    /// Instances the console refuses to launch
    pub launch_fails: HashSet<String>,
    /// Target app is not installed
    pub app_missing: bool,
    /// Report devices in reverse order
    pub reverse_devices: bool,
    /// Time each launch / list-devices call takes
    pub call_duration: Duration,
    /// Time each instance listing takes
    pub listing_duration: Duration,
    launch_in_flight: AtomicUsize,
    list_in_flight: AtomicUsize,
    max_launch_in_flight: AtomicUsize,
    max_list_in_flight: AtomicUsize,
}

impl FakeEmulator {
    pub fn with_instances(names: &[&str]) -> Self {
        let instances = names
            .iter()
            .enumerate()
            .map(|(id, name)| Instance::new(id as u32, *name))
            .collect();

        Self {
            instances,
            state: Mutex::new(FakeState::default()),
            connect_after: 0,
            home_after: 0,
            never_connect: HashSet::new(),
            never_home: HashSet::new(),
            launch_fails: HashSet::new(),
            app_missing: false,
            reverse_devices: false,
            call_duration: Duration::ZERO,
            listing_duration: Duration::ZERO,
            launch_in_flight: AtomicUsize::new(0),
            list_in_flight: AtomicUsize::new(0),
            max_launch_in_flight: AtomicUsize::new(0),
            max_list_in_flight: AtomicUsize::new(0),
        }
    }

    pub fn instances(&self) -> &[Instance] {
        &self.instances
    }

    pub fn calls(&self) -> Vec<Call> {
        self.state.lock().calls.clone()
    }

    pub fn launches(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::Launch(name) => Some(name),
                _ => None,
            })
            .collect()
    }

    /// Number of calls that touched one device serial
    pub fn calls_for(&self, serial: &str) -> usize {
        self.calls()
            .iter()
            .filter(|c| matches!(c, Call::Shell(s, _) | Call::Tap(s, _, _) if s == serial))
            .count()
    }

    pub fn max_concurrent_launches(&self) -> usize {
        self.max_launch_in_flight.load(Ordering::SeqCst)
    }

    pub fn max_concurrent_listings(&self) -> usize {
        self.max_list_in_flight.load(Ordering::SeqCst)
    }

    pub fn serial_of(id: u32) -> String {
        format!("emulator-{}", console_port_for(id).unwrap_or(0))
    }

    fn record(&self, call: Call) {
        self.state.lock().calls.push(call);
    }

    async fn timed(&self, in_flight: &AtomicUsize, max: &AtomicUsize) {
        let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        max.fetch_max(now, Ordering::SeqCst);
        if !self.call_duration.is_zero() {
            tokio::time::sleep(self.call_duration).await;
        }
        in_flight.fetch_sub(1, Ordering::SeqCst);
    }

    fn name_of_serial(&self, serial: &str) -> Option<&str> {
        self.instances
            .iter()
            .find(|i| Self::serial_of(i.id) == serial)
            .map(|i| i.name.as_str())
    }
}

#[async_trait]
impl EmulatorConsole for FakeEmulator {
    async fn list_instances(&self) -> Result<Vec<Instance>, ConsoleError> {
        self.record(Call::ListInstances);
        if !self.listing_duration.is_zero() {
            tokio::time::sleep(self.listing_duration).await;
        }
        Ok(self.instances.clone())
    }

    async fn launch(&self, name: &str) -> Result<(), ConsoleError> {
        self.record(Call::Launch(name.to_string()));
        self.timed(&self.launch_in_flight, &self.max_launch_in_flight).await;

        if self.launch_fails.contains(name) {
            return Err(ConsoleError::CommandFailed(format!("cannot start {}", name)));
        }
        let instance = self
            .instances
            .iter()
            .find(|i| i.name == name)
            .ok_or_else(|| ConsoleError::InstanceNotFound(name.to_string()))?;
        self.state.lock().launched.insert(instance.id, 0);
        Ok(())
    }

    async fn modify(&self, id: u32, _settings: &InstanceSettings) -> Result<(), ConsoleError> {
        self.record(Call::Modify(id));
        Ok(())
    }
}

#[async_trait]
impl DeviceBridge for FakeEmulator {
    async fn list_devices(&self) -> Result<Vec<Device>, AdbError> {
        self.record(Call::ListDevices);
        self.timed(&self.list_in_flight, &self.max_list_in_flight).await;

        let mut state = self.state.lock();
        let mut devices = Vec::new();
        for instance in &self.instances {
            if self.never_connect.contains(&instance.name) {
                continue;
            }
            if let Some(polls) = state.launched.get_mut(&instance.id) {
                *polls += 1;
                if *polls > self.connect_after {
                    devices.push(Device::new(Self::serial_of(instance.id), DeviceState::Online));
                }
            }
        }
        if self.reverse_devices {
            devices.reverse();
        }
        Ok(devices)
    }

    async fn shell(&self, serial: &str, command: &str) -> Result<String, AdbError> {
        self.record(Call::Shell(serial.to_string(), command.to_string()));
        let name = self
            .name_of_serial(serial)
            .ok_or_else(|| AdbError::DeviceNotFound(serial.to_string()))?
            .to_string();

        if command.starts_with("dumpsys activity") {
            let mut state = self.state.lock();
            let checks = state.home_checks.entry(serial.to_string()).or_insert(0);
            *checks += 1;
            if !self.never_home.contains(&name) && *checks > self.home_after {
                return Ok("  * ActivityRecord{1f0 u0 com.android.launcher3/.Launcher t2}".into());
            }
            return Ok("  * ActivityRecord{1e2 u0 com.android.systemui/.FallbackHome t1}".into());
        }

        if command.starts_with("monkey") {
            if self.app_missing {
                return Ok("  bash arg: -p\n** No activities found to run, monkey aborted.".into());
            }
            return Ok("  bash arg: -p\nEvents injected: 1".into());
        }

        Ok(String::new())
    }

    async fn tap(&self, serial: &str, x: u32, y: u32) -> Result<(), AdbError> {
        self.record(Call::Tap(serial.to_string(), x, y));
        self.name_of_serial(serial)
            .ok_or_else(|| AdbError::DeviceNotFound(serial.to_string()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_tap_recorded_per_device() {
        let fake = FakeEmulator::with_instances(&["LDPlayer"]);
        let bridge: &dyn DeviceBridge = &fake;
        let serial = FakeEmulator::serial_of(0);

        bridge.tap(&serial, 120, 845).await.unwrap();
        assert!(bridge.tap("emulator-9999", 1, 1).await.is_err());

        assert_eq!(fake.calls()[0], Call::Tap(serial.clone(), 120, 845));
        assert_eq!(fake.calls_for(&serial), 1);
    }
}
