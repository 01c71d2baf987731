//! Motion command formatting
//!
//! Builds the linear-move lines used by the link's convenience moves.

/// Target of a linear move, relative to the job datum
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct MoveTarget {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    /// Amount to extrude into the material
    pub extrude: f64,
}

impl MoveTarget {
    pub fn new(x: f64, y: f64, z: f64, extrude: f64) -> Self {
        Self { x, y, z, extrude }
    }
}

/// Coordinated move at `feed_rate` units/minute, all axes arriving together.
///
/// `MoveTarget::new(10.0, 0.0, 0.0, 1.0)` at feed 100 gives
/// `G0 F100 E1 X10 Y0 Z0`.
pub fn linear_move(target: &MoveTarget, feed_rate: f64) -> String {
    format!(
        "G0 F{} E{} X{} Y{} Z{}",
        feed_rate, target.extrude, target.x, target.y, target.z
    )
}

/// Move every axis to the target as fast as it can, regardless of arrival time.
pub fn rapid_move(target: &MoveTarget) -> String {
    format!(
        "G1 E{} X{} Y{} Z{}",
        target.extrude, target.x, target.y, target.z
    )
}
