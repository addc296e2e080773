use crate::{Position, VehicleId};
use serde_json::json;
use slotmap::Key;

thread_local!(
    static DEBUG_FRAME: std::cell::RefCell<Vec<serde_json::Value>> = Default::default();
);

pub fn debug_lane_change(id: VehicleId, from: Position, to: Position) {
    DEBUG_FRAME.with(|frame| {
        frame.borrow_mut().push(json!({
            "type": "lane_change",
            "vehicle": id.data().as_ffi(),
            "from": [from.x, from.lane],
            "to": [to.x, to.lane],
        }))
    })
}

pub fn debug_zip(follower: VehicleId, vehicle: VehicleId, obstacle: VehicleId) {
    DEBUG_FRAME.with(|frame| {
        frame.borrow_mut().push(json!({
            "type": "zip",
            "follower": follower.data().as_ffi(),
            "vehicle": vehicle.data().as_ffi(),
            "obstacle": obstacle.data().as_ffi(),
        }))
    })
}

pub fn debug_corridor(id: VehicleId, position: Position) {
    DEBUG_FRAME.with(|frame| {
        frame.borrow_mut().push(json!({
            "type": "corridor",
            "vehicle": id.data().as_ffi(),
            "position": [position.x, position.lane],
        }))
    })
}

pub fn take_debug_frame() -> serde_json::Value {
    json!(DEBUG_FRAME.with(|frame| frame.take()))
}
