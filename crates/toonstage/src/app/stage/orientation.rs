use engine::{Quat, Vec3};

use super::state::StageState;

/// Yaw-only rotation turning local +Z toward `to`. `None` when the points
/// coincide horizontally.
pub(crate) fn yaw_look_at(from: Vec3, to: Vec3) -> Option<Quat> {
    let offset = to - from;
    if offset.x * offset.x + offset.z * offset.z <= 1.0e-8 {
        return None;
    }
    Some(Quat::from_rotation_y(offset.x.atan2(offset.z)))
}

/// Angle of the shortest rotation between two orientations.
pub(crate) fn rotation_angle(from: Quat, to: Quat) -> f32 {
    let mut delta = to * from.conjugate();
    if delta.w < 0.0 {
        delta = -delta;
    }
    2.0 * delta.xyz().length().atan2(delta.w)
}

/// Rotates `current` toward `target` by at most `max_step_radians`, snapping
/// once within `epsilon_radians`.
pub(crate) fn step_orientation(
    current: Quat,
    target: Quat,
    max_step_radians: f32,
    epsilon_radians: f32,
) -> Quat {
    let angle = rotation_angle(current, target);
    if angle <= epsilon_radians {
        return target;
    }
    if !max_step_radians.is_finite() || max_step_radians <= 0.0 {
        return current;
    }
    if max_step_radians >= angle {
        return target;
    }
    current.slerp(target, max_step_radians / angle).normalize()
}

/// Advances every ready actor's orientation for one frame.
pub(crate) fn follow_orientations(state: &mut StageState, dt_seconds: f32) {
    let max_step = state.config.turn_speed_radians_per_second * dt_seconds.max(0.0);
    let epsilon = state.config.orientation_epsilon_radians;
    for actor in state.roster.ready_mut() {
        if actor.orientation == actor.target_orientation {
            continue;
        }
        actor.orientation =
            step_orientation(actor.orientation, actor.target_orientation, max_step, epsilon);
    }
}

#[cfg(test)]
mod tests {
    use std::f32::consts::{FRAC_PI_2, FRAC_PI_4, PI};

    use super::*;

    const EPSILON: f32 = 1.0e-3;

    #[test]
    fn look_at_faces_target_along_local_z() {
        let rotation = yaw_look_at(Vec3::ZERO, Vec3::new(5.0, 0.0, 5.0)).expect("rotation");
        let forward = rotation * Vec3::Z;
        assert!((forward - Vec3::new(1.0, 0.0, 1.0).normalize()).length() < 1e-5);

        let behind = yaw_look_at(Vec3::new(1.0, 0.0, 1.0), Vec3::new(1.0, 3.0, -4.0))
            .expect("rotation");
        assert!((behind * Vec3::Z - Vec3::NEG_Z).length() < 1e-5);
    }

    #[test]
    fn look_at_ignores_height_and_coincident_points() {
        assert!(yaw_look_at(Vec3::ZERO, Vec3::new(0.0, 4.0, 0.0)).is_none());
        let flat = yaw_look_at(Vec3::ZERO, Vec3::new(0.0, 10.0, 2.0)).expect("rotation");
        assert!((flat * Vec3::Z - Vec3::Z).length() < 1e-5);
    }

    #[test]
    fn rotation_angle_is_symmetric_and_shortest() {
        let a = Quat::from_rotation_y(0.1);
        let b = Quat::from_rotation_y(-0.1);
        assert!((rotation_angle(a, b) - 0.2).abs() < 1e-5);
        assert!((rotation_angle(b, a) - 0.2).abs() < 1e-5);

        let near_wrap = Quat::from_rotation_y(PI - 0.05);
        let other_side = Quat::from_rotation_y(-PI + 0.05);
        assert!((rotation_angle(near_wrap, other_side) - 0.1).abs() < 1e-4);
        assert!(rotation_angle(a, -a) < 1e-5);
    }

    #[test]
    fn large_step_lands_exactly_on_target() {
        let target = Quat::from_rotation_y(FRAC_PI_4);
        let next = step_orientation(Quat::IDENTITY, target, 10.0, EPSILON);
        assert_eq!(next, target);
    }

    #[test]
    fn residual_within_epsilon_snaps() {
        let target = Quat::from_rotation_y(1.0);
        let current = Quat::from_rotation_y(1.0 - EPSILON * 0.5);
        assert_eq!(step_orientation(current, target, 0.0, EPSILON), target);
    }

    #[test]
    fn zero_step_holds_orientation() {
        let current = Quat::from_rotation_y(0.3);
        let target = Quat::from_rotation_y(2.0);
        assert_eq!(step_orientation(current, target, 0.0, EPSILON), current);
    }

    #[test]
    fn tiny_steps_converge_without_overshoot() {
        let target = Quat::from_rotation_y(-FRAC_PI_2 - 0.7);
        let mut current = Quat::from_rotation_y(1.1);
        let mut previous_angle = rotation_angle(current, target);
        let step = 1.0e-3;
        let mut iterations = 0;

        while current != target {
            current = step_orientation(current, target, step, EPSILON);
            let angle = rotation_angle(current, target);
            assert!(
                angle <= previous_angle + 1.0e-5,
                "angle grew from {previous_angle} to {angle}"
            );
            previous_angle = angle;
            iterations += 1;
            assert!(iterations < 10_000, "did not converge");
        }
        assert_eq!(current, target);
    }
}
