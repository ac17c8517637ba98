//! Work extraction between the two phases.

use std::collections::HashMap;

use crate::config::ExtractionPolicy;
use crate::device::Device;
use crate::wire::{Manifest, WorkItem};

use super::WorkAssignment;

fn collect_items(manifest: &Manifest, policy: ExtractionPolicy) -> Vec<WorkItem> {
    let non_empty = manifest.batches().iter().filter(|b| !b.is_empty());
    let items: Vec<WorkItem> = match policy {
        ExtractionPolicy::Concatenate => non_empty.flat_map(|b| b.items().iter().cloned()).collect(),
        ExtractionPolicy::LastBatch => non_empty
            .last()
            .map(|b| b.items().to_vec())
            .unwrap_or_default(),
    };

    items
        .into_iter()
        .filter(|item| item.addressable_id().is_some())
        .collect()
}

/// Collect per-device work from the state left by Phase A.
///
/// Pure function of the devices: devices without a manifest or with only
/// empty batches contribute nothing. Assignments are keyed by auth token and
/// keep device order; devices sharing a token merge under the same policy.
/// Under `LastBatch` the later device replaces both the items and the
/// identity, so outcomes name the device whose items are sent.
pub fn extract_work(devices: &[Device], policy: ExtractionPolicy) -> Vec<WorkAssignment> {
    let mut assignments: Vec<WorkAssignment> = Vec::new();
    let mut by_token: HashMap<&str, usize> = HashMap::new();

    for device in devices {
        let Some(manifest) = device.manifest() else {
            continue;
        };
        let items = collect_items(manifest, policy);
        if items.is_empty() {
            continue;
        }

        match by_token.get(device.auth_token()) {
            Some(&idx) => match policy {
                ExtractionPolicy::Concatenate => assignments[idx].items.extend(items),
                ExtractionPolicy::LastBatch => {
                    assignments[idx] = WorkAssignment {
                        identity: device.identity().clone(),
                        items,
                    }
                }
            },
            None => {
                by_token.insert(device.auth_token(), assignments.len());
                assignments.push(WorkAssignment {
                    identity: device.identity().clone(),
                    items,
                });
            }
        }
    }

    assignments
}
