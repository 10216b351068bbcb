//! Batch embedding
//!
//! Discovery runs off the coordinator; matches are handed back one at a
//! time with a fixed gap so consecutive reparents do not race.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::UnboundedSender;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::desktop::WindowSystem;
use crate::grid::DockEvent;
use crate::locator::WindowLocator;

/// What to embed and where
#[derive(Debug, Clone)]
pub struct BatchRequest {
    pub names: Vec<String>,
    pub slot_count: usize,
    pub interval: Duration,
}

/// Locate instance windows and dispatch one `Bind` per slot
///
/// Slot `i` receives the `i`-th match in title order. The task ends with a
/// `Finished` event and resolves to the number of binds dispatched.
pub fn spawn_batch_embed(
    system: Arc<dyn WindowSystem>,
    locator: WindowLocator,
    request: BatchRequest,
    events: UnboundedSender<DockEvent>,
) -> JoinHandle<usize> {
    tokio::spawn(async move {
        let BatchRequest {
            names,
            slot_count,
            interval,
        } = request;

        info!("Batch embedding {} instance(s)", names.len());
        let located =
            tokio::task::spawn_blocking(move || locator.locate(system.as_ref(), &names)).await;

        let matches = match located {
            Ok(Ok(matches)) => matches,
            Ok(Err(e)) => {
                warn!("Window scan failed: {}", e);
                Vec::new()
            }
            Err(e) => {
                error!("Window scan task failed: {}", e);
                Vec::new()
            }
        };

        let mut dispatched = 0;
        for (slot, found) in matches.into_iter().take(slot_count).enumerate() {
            if slot > 0 {
                tokio::time::sleep(interval).await;
            }
            let event = DockEvent::Bind {
                slot,
                window: found.window,
                title: found.title,
            };
            if events.send(event).is_err() {
                warn!("Coordinator went away, stopping batch embedding");
                return dispatched;
            }
            dispatched += 1;
        }

        let _ = events.send(DockEvent::Finished {
            embedded: dispatched,
        });
        dispatched
    })
}
