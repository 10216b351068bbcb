//! CLI commands for ld-dock
//!
//! Each command owns its options and runs against a loaded [`AppConfig`].
//! The long-running commands act as the coordinator: they own the event
//! subscription, the slot grid and the keep-visible timer.

use std::pin::pin;
use std::sync::Arc;
use std::time::Duration;
use anyhow::{bail, Context, Result};
use chrono::Local;
use tokio::sync::mpsc::{unbounded_channel, UnboundedSender};
use tracing::{info, warn};

use ld_dock_core::config::DockConfig;
use ld_dock_core::{AppConfig, Event, Orchestrator};
use ld_dock_emulator_bridge::{AdbClient, ConsoleClient, InstanceSettings};
use ld_dock_window_dock::{
    spawn_batch_embed, BatchRequest, DockEvent, SlotGeometry, SlotGrid, WindowId, WindowLocator,
    WindowSystem,
};

/// How often queued progress events are printed
const EVENT_POLL_INTERVAL: Duration = Duration::from_millis(100);

fn console_client(config: &AppConfig) -> Result<ConsoleClient> {
    let path = config
        .console_path()
        .context("console.install_dir is not set in the configuration")?;
    let client = ConsoleClient::new(path, config.console.command_timeout());
    if !client.is_available() {
        bail!("Emulator console not found at {:?}", client.console_path());
    }
    Ok(client)
}

fn adb_client(config: &AppConfig) -> Result<AdbClient> {
    let path = config
        .adb_path()
        .context("console.install_dir is not set in the configuration")?;
    let client = AdbClient::new(path, config.console.command_timeout());
    if !client.is_available() {
        bail!("Device bridge not found at {:?}", client.adb_path());
    }
    Ok(client)
}

fn print_line(line: &str) {
    println!("[{}] {}", Local::now().format("%H:%M:%S"), line);
}

/// Instance list command
pub struct InstancesCommand {
    pub json: bool,
}

impl InstancesCommand {
    pub async fn execute(&self, config: &AppConfig) -> Result<()> {
        let console = console_client(config)?;
        let instances = console.list_instances().await?;

        if self.json {
            println!("{}", serde_json::to_string_pretty(&instances)?);
            return Ok(());
        }

        if instances.is_empty() {
            println!("No instances configured");
        } else {
            println!("{:>3}  {:<24} {:<10} {:>8}", "ID", "NAME", "STATUS", "PID");
            for instance in instances {
                let pid = instance.pid.map(|p| p.to_string()).unwrap_or_else(|| "-".into());
                println!(
                    "{:>3}  {:<24} {:<10} {:>8}",
                    instance.id, instance.name, instance.status, pid
                );
            }
        }
        Ok(())
    }
}

/// Device list command
pub struct DevicesCommand;

impl DevicesCommand {
    pub async fn execute(&self, config: &AppConfig) -> Result<()> {
        let adb = adb_client(config)?;
        let devices = adb.list_devices().await?;

        if devices.is_empty() {
            println!("No devices connected");
        } else {
            println!("Connected devices:");
            for device in devices {
                println!("  {} - {} ({})", device.serial, device.state.as_str(), device.display_name());
            }
        }
        Ok(())
    }
}

/// Instance settings command
pub struct ModifyCommand {
    pub id: u32,
    pub settings: InstanceSettings,
}

impl ModifyCommand {
    pub async fn execute(&self, config: &AppConfig) -> Result<()> {
        if self.settings.is_empty() {
            bail!("Nothing to modify: pass at least one setting");
        }
        self.settings.check()?;
        let console = console_client(config)?;
        console.modify(self.id, &self.settings).await?;
        info!("Instance {} updated", self.id);
        Ok(())
    }
}

/// Workflow run command
pub struct RunCommand {
    pub threads: Option<usize>,
    pub package: Option<String>,
    pub containers: Vec<WindowId>,
}

impl RunCommand {
    pub async fn execute(&self, mut config: AppConfig) -> Result<()> {
        if let Some(threads) = self.threads {
            config.workflow.threads = threads;
        }
        if let Some(package) = &self.package {
            config.workflow.target_package = package.clone();
        }
        config.validate()?;

        let console = Arc::new(console_client(&config)?);
        let adb = Arc::new(adb_client(&config)?);
        if let Err(e) = adb.start_server().await {
            warn!("Could not start the bridge server: {}", e);
        }

        let mut dock = if self.containers.is_empty() {
            None
        } else {
            Some(DockSession::open(&config.dock, &self.containers)?)
        };

        let orchestrator = Orchestrator::new(config.clone(), console, adb);
        let events = orchestrator.event_bus().subscribe();

        let handle = orchestrator.start().await?;
        for event in events.drain() {
            print_line(&event.log_line());
        }
        if handle.is_empty() {
            return Ok(());
        }

        let names = handle.instance_names();
        let (dock_tx, mut dock_rx) = unbounded_channel();
        let mut embed_pending = dock.is_some();
        let mut all_complete = false;

        let mut auto_embed = pin!(tokio::time::sleep(config.dock.auto_embed_delay()));
        let mut ctrl_c = pin!(tokio::signal::ctrl_c());
        let mut event_tick = tokio::time::interval(EVENT_POLL_INTERVAL);
        let mut keep_tick = tokio::time::interval(config.dock.keep_visible_interval());

        loop {
            tokio::select! {
                _ = event_tick.tick() => {
                    for event in events.drain() {
                        print_line(&event.log_line());
                        if matches!(event, Event::AllComplete { .. }) {
                            all_complete = true;
                        }
                    }
                    if all_complete && dock.is_none() {
                        break;
                    }
                }
                _ = &mut auto_embed, if embed_pending => {
                    embed_pending = false;
                    if let Some(dock) = &dock {
                        print_line("Embedding instance windows...");
                        dock.embed(names.clone(), dock_tx.clone());
                    }
                }
                Some(event) = dock_rx.recv() => {
                    if let Some(dock) = dock.as_mut() {
                        dock.apply(&event);
                    }
                }
                _ = keep_tick.tick(), if dock.is_some() => {
                    if let Some(dock) = &dock {
                        dock.grid.keep_all_visible();
                    }
                }
                result = &mut ctrl_c => {
                    result?;
                    print_line("Stopping all jobs...");
                    if let Some(summary) = orchestrator.stop_all().await {
                        info!("Stopped: {:?}", summary);
                    }
                    for event in events.drain() {
                        print_line(&event.log_line());
                    }
                    break;
                }
            }
        }

        if let Some(dock) = dock.as_mut() {
            dock.grid.clear_all();
        }
        Ok(())
    }
}

/// Window scan command
pub struct ScanCommand {
    pub names: Vec<String>,
}

impl ScanCommand {
    pub async fn execute(&self, config: &AppConfig) -> Result<()> {
        let system = ld_dock_window_dock::native()?;
        let names = resolve_names(config, &self.names).await?;
        let locator = WindowLocator::new(config.dock.host_marker.clone());

        let matches = locator.locate(system.as_ref(), &names)?;
        if matches.is_empty() {
            println!("No instance windows found");
        } else {
            println!("Instance windows:");
            for found in matches {
                println!("  {} - {}", found.window, found.title);
            }
        }
        Ok(())
    }
}

/// Standalone docking command
pub struct DockCommand {
    pub containers: Vec<WindowId>,
    pub names: Vec<String>,
}

impl DockCommand {
    pub async fn execute(&self, config: &AppConfig) -> Result<()> {
        if self.containers.is_empty() {
            bail!("At least one container handle is required");
        }
        let names = resolve_names(config, &self.names).await?;
        let mut dock = DockSession::open(&config.dock, &self.containers)?;

        let (dock_tx, mut dock_rx) = unbounded_channel();
        dock.embed(names, dock_tx);

        let mut ctrl_c = pin!(tokio::signal::ctrl_c());
        let mut keep_tick = tokio::time::interval(config.dock.keep_visible_interval());
        print_line("Docking windows, press Ctrl-C to release them");

        loop {
            tokio::select! {
                Some(event) = dock_rx.recv() => dock.apply(&event),
                _ = keep_tick.tick() => {
                    dock.grid.keep_all_visible();
                }
                result = &mut ctrl_c => {
                    result?;
                    break;
                }
            }
        }

        let released = dock.grid.clear_all();
        print_line(&format!("Released {} window(s)", released));
        Ok(())
    }
}

/// Explicit names, or the running instances reported by the console
async fn resolve_names(config: &AppConfig, explicit: &[String]) -> Result<Vec<String>> {
    if !explicit.is_empty() {
        return Ok(explicit.to_vec());
    }

    let console = console_client(config)?;
    let instances = console.list_instances().await?;
    let running: Vec<String> = instances
        .iter()
        .filter(|i| i.is_running())
        .map(|i| i.name.clone())
        .collect();

    if running.is_empty() {
        Ok(instances.into_iter().map(|i| i.name).collect())
    } else {
        Ok(running)
    }
}

/// Slot grid plus what batch embedding needs
struct DockSession {
    system: Arc<dyn WindowSystem>,
    grid: SlotGrid,
    locator: WindowLocator,
    interval: Duration,
}

impl DockSession {
    fn open(config: &DockConfig, containers: &[WindowId]) -> Result<Self> {
        let system = ld_dock_window_dock::native()?;

        if containers.len() > config.slot_count {
            warn!(
                "{} containers given, only the first {} are used",
                containers.len(),
                config.slot_count
            );
        }
        let containers = &containers[..containers.len().min(config.slot_count)];
        let geometry = SlotGeometry {
            width: config.slot_width as i32,
            height: config.slot_height as i32,
            header_height: config.header_height as i32,
        };
        let grid = SlotGrid::new(Arc::clone(&system), containers, geometry, config.slots_per_row);

        Ok(Self {
            system,
            grid,
            locator: WindowLocator::new(config.host_marker.clone()),
            interval: config.embed_interval(),
        })
    }

    fn embed(&self, names: Vec<String>, events: UnboundedSender<DockEvent>) {
        spawn_batch_embed(
            Arc::clone(&self.system),
            self.locator.clone(),
            BatchRequest {
                names,
                slot_count: self.grid.len(),
                interval: self.interval,
            },
            events,
        );
    }

    fn apply(&mut self, event: &DockEvent) {
        match event {
            DockEvent::Bind { slot, title, .. } => match self.grid.apply(event) {
                Ok(()) => print_line(&format!("Embedded {} into slot {}", title, slot + 1)),
                Err(e) => print_line(&format!("Slot {}: embedding {} failed: {}", slot + 1, title, e)),
            },
            DockEvent::Finished { embedded } => {
                let _ = self.grid.apply(event);
                if *embedded == 0 {
                    print_line("Warning: no instance windows found to embed");
                } else {
                    print_line(&format!("Embedded {} window(s)", embedded));
                }
            }
        }
    }
}
