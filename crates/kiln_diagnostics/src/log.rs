//! Per-resource marker accumulator.

use std::collections::BTreeMap;

use kiln_common::Location;

use crate::marker::Marker;

/// Markers grouped by the resource they were reported against.
///
/// The engine owns one log and is its only writer, so no locking is done.
#[derive(Debug, Clone, Default)]
pub struct MarkerLog {
    markers: BTreeMap<Location, Vec<Marker>>,
}

impl MarkerLog {
    /// Creates an empty log.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a marker.
    pub fn report(&mut self, marker: Marker) {
        self.markers
            .entry(marker.resource.clone())
            .or_default()
            .push(marker);
    }

    /// Removes every marker of `resource`, returning how many there were.
    pub fn clear(&mut self, resource: &Location) -> usize {
        self.markers.remove(resource).map_or(0, |m| m.len())
    }

    /// Returns the markers of `resource`.
    pub fn for_resource(&self, resource: &Location) -> &[Marker] {
        self.markers
            .get(resource)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Iterates all markers, grouped by resource in location order.
    pub fn iter(&self) -> impl Iterator<Item = &Marker> {
        self.markers.values().flatten()
    }

    /// Returns the total number of markers.
    pub fn len(&self) -> usize {
        self.markers.values().map(Vec::len).sum()
    }

    /// Returns `true` if no markers are recorded.
    pub fn is_empty(&self) -> bool {
        self.markers.is_empty()
    }

    /// Returns the number of error markers.
    pub fn error_count(&self) -> usize {
        self.iter().filter(|m| m.severity.is_error()).count()
    }

    /// Returns `true` if any error marker is recorded.
    pub fn has_errors(&self) -> bool {
        self.iter().any(|m| m.severity.is_error())
    }

    /// Takes all markers, leaving the log empty.
    pub fn take_all(&mut self) -> Vec<Marker> {
        std::mem::take(&mut self.markers)
            .into_values()
            .flatten()
            .collect()
    }
}
