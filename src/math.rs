//! Angle helpers for turning runtime poses into yaw samples.

use crate::types::Radians;
use std::f64::consts::{PI, TAU};

/// Unit quaternion as reported by the Oculus runtime (Y up)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Quaternion {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub w: f64,
}

impl Quaternion {
    pub const IDENTITY: Quaternion = Quaternion {
        x: 0.0,
        y: 0.0,
        z: 0.0,
        w: 1.0,
    };

    /// Pure rotation about the vertical axis
    pub fn from_yaw(yaw: Radians) -> Self {
        let half = yaw / 2.0;
        Self {
            x: 0.0,
            y: half.sin(),
            z: 0.0,
            w: half.cos(),
        }
    }
}

/// Row-major 3×4 tracking matrix as reported by OpenVR
pub type PoseMatrix = [[f32; 4]; 3];

/// Yaw of a Y-up quaternion in (−π, π]
pub fn yaw_from_quaternion(q: &Quaternion) -> Radians {
    let sin_yaw = 2.0 * (q.w * q.y + q.x * q.z);
    let cos_yaw = 1.0 - 2.0 * (q.x * q.x + q.y * q.y);
    sin_yaw.atan2(cos_yaw)
}

/// Yaw of a row-major pose matrix in (−π, π]
pub fn yaw_from_pose_matrix(m: &PoseMatrix) -> Radians {
    f64::from(m[0][2]).atan2(f64::from(m[2][2]))
}

/// Pose matrix with only a yaw rotation and the given translation
pub fn pose_matrix_from_yaw(yaw: Radians, translation: [f32; 3]) -> PoseMatrix {
    let (s, c) = (yaw.sin() as f32, yaw.cos() as f32);
    [
        [c, 0.0, s, translation[0]],
        [0.0, 1.0, 0.0, translation[1]],
        [-s, 0.0, c, translation[2]],
    ]
}

/// Shortest signed step between two consecutive bounded yaw samples.
///
/// Steps larger than π in magnitude are taken to cross the ±π branch cut.
pub fn wrap_delta(delta: Radians) -> Radians {
    if delta > PI {
        delta - TAU
    } else if delta < -PI {
        delta + TAU
    } else {
        delta
    }
}

pub fn rad_to_deg(rad: Radians) -> f64 {
    rad * 180.0 / PI
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn quaternion_yaw_matches_construction() {
        for yaw in [-3.0, -1.2, 0.0, 0.7, 2.9] {
            assert_abs_diff_eq!(yaw_from_quaternion(&Quaternion::from_yaw(yaw)), yaw, epsilon = 1e-9);
        }
        assert_abs_diff_eq!(yaw_from_quaternion(&Quaternion::IDENTITY), 0.0);
    }

    #[test]
    fn quaternion_yaw_ignores_pitch() {
        // 30° pitch about X, then 60° yaw about Y
        let (p, y) = (30f64.to_radians() / 2.0, 60f64.to_radians() / 2.0);
        let q = Quaternion {
            x: y.cos() * p.sin(),
            y: y.sin() * p.cos(),
            z: -y.sin() * p.sin(),
            w: y.cos() * p.cos(),
        };
        assert_abs_diff_eq!(rad_to_deg(yaw_from_quaternion(&q)), 60.0, epsilon = 1e-6);
    }

    #[test]
    fn matrix_yaw_matches_construction() {
        for yaw in [-2.5, 0.0, 1.0, 3.1] {
            let m = pose_matrix_from_yaw(yaw, [0.1, 1.7, -0.3]);
            assert_abs_diff_eq!(yaw_from_pose_matrix(&m), yaw, epsilon = 1e-6);
        }
    }

    #[test]
    fn wrap_delta_crosses_branch_cut() {
        assert_abs_diff_eq!(wrap_delta(-3.0 - 3.0), TAU - 6.0);
        assert_abs_diff_eq!(wrap_delta(3.0 - -3.0), 6.0 - TAU);
        assert_abs_diff_eq!(wrap_delta(1.0), 1.0);
        assert_abs_diff_eq!(wrap_delta(PI), PI);
    }
}
