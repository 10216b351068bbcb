//! Slot Grid
//!
//! The fixed pool of slots owned by the coordinator. Worker tasks never
//! touch slots; they send [`DockEvent`]s that the coordinator applies here.

use std::sync::Arc;
use serde::Serialize;
use tracing::{info, warn};

use crate::desktop::{WindowError, WindowId, WindowSystem};
use crate::slot::{Slot, SlotStatus, SlotSurface};

/// Largest supported row width
pub const MAX_SLOTS_PER_ROW: usize = 6;

/// Messages from batch embedding to the coordinator
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum DockEvent {
    /// Embed `window` into `slot`
    Bind {
        slot: usize,
        window: WindowId,
        title: String,
    },
    /// Batch finished after dispatching `embedded` binds
    Finished { embedded: usize },
}

/// Size shared by every slot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlotGeometry {
    pub width: i32,
    pub height: i32,
    pub header_height: i32,
}

pub struct SlotGrid {
    system: Arc<dyn WindowSystem>,
    slots: Vec<Slot>,
    slots_per_row: usize,
}

impl SlotGrid {
    /// One slot per container handle, in order
    pub fn new(
        system: Arc<dyn WindowSystem>,
        containers: &[WindowId],
        geometry: SlotGeometry,
        slots_per_row: usize,
    ) -> Self {
        let slots = containers
            .iter()
            .enumerate()
            .map(|(index, container)| {
                Slot::new(
                    index,
                    SlotSurface {
                        container: *container,
                        width: geometry.width,
                        height: geometry.height,
                        header_height: geometry.header_height,
                    },
                )
            })
            .collect();

        Self {
            system,
            slots,
            slots_per_row: slots_per_row.clamp(1, MAX_SLOTS_PER_ROW),
        }
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn slots(&self) -> &[Slot] {
        &self.slots
    }

    pub fn slot(&self, index: usize) -> Option<&Slot> {
        self.slots.get(index)
    }

    pub fn embedded_count(&self) -> usize {
        self.slots
            .iter()
            .filter(|s| s.status() == SlotStatus::Embedded)
            .count()
    }

    /// Embed `window` into slot `index`
    ///
    /// A window lives in at most one slot: if another slot already hosts
    /// it, that slot is released first.
    pub fn bind(&mut self, index: usize, window: WindowId, title: &str) -> Result<(), WindowError> {
        if index >= self.slots.len() {
            return Err(WindowError::api(
                "bind",
                format!("slot {} out of range ({} slots)", index + 1, self.slots.len()),
            ));
        }

        let system = Arc::clone(&self.system);
        for other in self.slots.iter_mut() {
            if other.index() != index && other.window() == Some(window) {
                other.release(system.as_ref());
            }
        }

        self.slots[index].bind(system.as_ref(), window, title)
    }

    /// Apply one coordinator event
    pub fn apply(&mut self, event: &DockEvent) -> Result<(), WindowError> {
        match event {
            DockEvent::Bind { slot, window, title } => self.bind(*slot, *window, title),
            DockEvent::Finished { embedded } => {
                info!(
                    "Batch embedding finished: {} dispatched, {} slot(s) embedded",
                    embedded,
                    self.embedded_count()
                );
                Ok(())
            }
        }
    }

    /// Periodic liveness pass over every slot; returns how many were repaired
    pub fn keep_all_visible(&self) -> usize {
        let mut repaired = 0;
        for slot in &self.slots {
            match slot.keep_visible(self.system.as_ref()) {
                Ok(true) => repaired += 1,
                Ok(false) => {}
                Err(e) => warn!("Slot {}: keep visible failed: {}", slot.index() + 1, e),
            }
        }
        repaired
    }

    /// Release every hosted window; returns how many were released
    pub fn clear_all(&mut self) -> usize {
        let system = Arc::clone(&self.system);
        let released = self
            .slots
            .iter_mut()
            .filter_map(|slot| slot.release(system.as_ref()))
            .count();
        info!("Cleared {} slot(s)", released);
        released
    }

    pub fn slots_per_row(&self) -> usize {
        self.slots_per_row
    }

    /// Clamped to `1..=MAX_SLOTS_PER_ROW`; returns the applied value
    pub fn set_slots_per_row(&mut self, per_row: usize) -> usize {
        self.slots_per_row = per_row.clamp(1, MAX_SLOTS_PER_ROW);
        self.slots_per_row
    }

    /// (row, column) of a slot in the host layout
    pub fn cell_of(&self, index: usize) -> Option<(usize, usize)> {
        (index < self.slots.len()).then(|| (index / self.slots_per_row, index % self.slots_per_row))
    }
}
