use super::LaneStorage;
use crate::{Position, VehicleId};
use std::collections::BTreeMap;
use std::ops::Bound::{Excluded, Unbounded};

/// Occupancy stored as one ordered map per sub-lane.
/// Suited to light traffic.
#[derive(Clone, Debug)]
pub(crate) struct SparseLanes {
    lanes: Vec<BTreeMap<i32, VehicleId>>,
}

impl SparseLanes {
    pub fn new(sublanes: i32) -> Self {
        Self {
            lanes: vec![BTreeMap::new(); sublanes as usize],
        }
    }

    fn lane(&self, lane: i32) -> &BTreeMap<i32, VehicleId> {
        &self.lanes[lane as usize]
    }
}

impl LaneStorage for SparseLanes {
    fn get(&self, position: Position) -> Option<VehicleId> {
        self.lane(position.lane).get(&position.x).copied()
    }

    fn insert(&mut self, position: Position, id: VehicleId) {
        self.lanes[position.lane as usize].insert(position.x, id);
    }

    fn next(&self, position: Position) -> Option<(i32, VehicleId)> {
        self.lane(position.lane)
            .range((Excluded(position.x), Unbounded))
            .next()
            .map(|(x, id)| (*x, *id))
    }

    fn previous(&self, position: Position) -> Option<(i32, VehicleId)> {
        self.lane(position.lane)
            .range(..position.x)
            .next_back()
            .map(|(x, id)| (*x, *id))
    }

    fn clear(&mut self) {
        self.lanes.iter_mut().for_each(BTreeMap::clear);
    }

    fn is_empty(&self) -> bool {
        self.lanes.iter().all(BTreeMap::is_empty)
    }
}
