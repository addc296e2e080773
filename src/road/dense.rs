use super::LaneStorage;
use crate::{Position, VehicleId};

/// Occupancy stored as one fixed-size array per sub-lane.
/// Suited to congested roads.
#[derive(Clone, Debug)]
pub(crate) struct DenseLanes {
    lanes: Vec<Vec<Option<VehicleId>>>,
    occupied: usize,
}

impl DenseLanes {
    pub fn new(length: i32, sublanes: i32) -> Self {
        Self {
            lanes: vec![vec![None; length as usize]; sublanes as usize],
            occupied: 0,
        }
    }

    fn lane(&self, lane: i32) -> &[Option<VehicleId>] {
        &self.lanes[lane as usize]
    }
}

impl LaneStorage for DenseLanes {
    fn get(&self, position: Position) -> Option<VehicleId> {
        self.lane(position.lane)[position.x as usize]
    }

    fn insert(&mut self, position: Position, id: VehicleId) {
        let cell = &mut self.lanes[position.lane as usize][position.x as usize];
        if cell.replace(id).is_none() {
            self.occupied += 1;
        }
    }

    fn next(&self, position: Position) -> Option<(i32, VehicleId)> {
        let lane = self.lane(position.lane);
        let start = position.x as usize + 1;
        lane.iter()
            .enumerate()
            .skip(start)
            .find_map(|(x, cell)| cell.map(|id| (x as i32, id)))
    }

    fn previous(&self, position: Position) -> Option<(i32, VehicleId)> {
        let lane = self.lane(position.lane);
        lane[..position.x as usize]
            .iter()
            .enumerate()
            .rev()
            .find_map(|(x, cell)| cell.map(|id| (x as i32, id)))
    }

    fn clear(&mut self) {
        if self.occupied == 0 {
            return;
        }
        for lane in &mut self.lanes {
            lane.fill(None);
        }
        self.occupied = 0;
    }

    fn is_empty(&self) -> bool {
        self.occupied == 0
    }
}
