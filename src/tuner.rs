//! Tuner descriptors and the transient per-resolution occupancy state.

use serde::{Deserialize, Serialize};

use crate::interval::Interval;
use crate::program::{ChannelType, Program};

/// Immutable descriptor of one physical tuner: its position in the inventory
/// and the channel families it can receive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TunerDevice {
    pub index: u32,
    pub types: Vec<ChannelType>,
}

impl TunerDevice {
    pub fn new(index: u32, types: Vec<ChannelType>) -> Self {
        Self { index, types }
    }

    /// Returns true if this tuner can receive the channel family.
    pub fn accepts(&self, channel_type: ChannelType) -> bool {
        self.types.contains(&channel_type)
    }
}

/// Allocation state of one tuner during a single resolution: the airtimes it
/// tentatively holds, kept non-overlapping. Owned by the resolver, never
/// observed externally.
#[derive(Debug, Clone)]
pub struct TunerSlot {
    device: TunerDevice,
    held: Vec<Interval>,
}

impl TunerSlot {
    pub fn new(device: TunerDevice) -> Self {
        Self {
            device,
            held: Vec::new(),
        }
    }

    /// Accepts the program iff the tuner can receive its channel family and
    /// its airtime overlaps none of the held airtimes. The slot is unchanged
    /// on rejection.
    pub fn try_add(&mut self, program: &Program) -> bool {
        if !self.device.accepts(program.channel_type) {
            return false;
        }
        let airtime = program.airtime();
        if self.held.iter().any(|held| held.overlaps(&airtime)) {
            return false;
        }
        self.held.push(airtime);
        true
    }

    /// Discards all held airtimes.
    pub fn clear(&mut self) {
        self.held.clear();
    }

    pub fn device(&self) -> &TunerDevice {
        &self.device
    }
}
