//! Pure sight-line math for the orbit camera: angle clamping and the
//! collision-avoidance distance resolution. Kept free of ECS and physics
//! query types so the behavior can be tested without a world.

use bevy::prelude::*;

use crate::camera::controller::CameraConfig;

/// Results of the three sight-line probes for one frame. A probe that found
/// nothing reports the unobstructed camera position unchanged.
#[derive(Clone, Copy, Debug)]
pub struct ProbeSample {
    /// Thin sphere probe, pushed off the surface to a sphere-center position.
    pub thin: Vec3,
    /// Thick sphere probe, raw hit point on the surface.
    pub thick: Vec3,
    /// Straight raycast, nudged along the hit normal by the skin offset.
    pub ray: Vec3,
}

impl ProbeSample {
    /// A frame where every probe came back clear.
    pub fn clear(camera_pos: Vec3) -> Self {
        Self {
            thin: camera_pos,
            thick: camera_pos,
            ray: camera_pos,
        }
    }
}

/// Wrap `angle` once into [-360, 360], then clamp it into [min, max].
///
/// A single correction step is enough: orbit input moves the angle by small
/// per-frame deltas, so it can only leave the window by less than a full turn.
pub fn clamp_angle(angle: f32, min: f32, max: f32) -> f32 {
    let mut angle = angle;
    if angle < -360.0 {
        angle += 360.0;
    }
    if angle > 360.0 {
        angle -= 360.0;
    }
    angle.clamp(min, max)
}

/// Resolve the camera position and orbit distance for one frame from the
/// probe results.
///
/// Zooming in on an obstruction is instant so geometry never occludes the
/// target, zooming back out is eased. Returns the corrected camera position
/// and the updated distance; nothing else persists between frames.
pub fn avoid_collisions(
    target: Vec3,
    rotation: Quat,
    camera_pos: Vec3,
    sample: &ProbeSample,
    distance: f32,
    dt: f32,
    config: &CameraConfig,
) -> (Vec3, f32) {
    let ray = camera_pos - target;
    let Some(ray_dir) = ray.try_normalize() else {
        return (camera_pos, distance);
    };

    // Project the thick hit onto the sight line, then measure how far the
    // projected point sits from the raw hit relative to the thin radius.
    // That ratio blends the two probe distances: grazing contacts follow the
    // thin probe, deep corner hits lean on the thick one.
    let thick_on_ray = target + (sample.thick - target).project_onto_normalized(ray_dir);
    let push_dir = (thick_on_ray - sample.thick).normalize_or_zero();
    let thick_on_thin = thick_on_ray - push_dir * config.thin_radius;
    let blend =
        thick_on_thin.distance(sample.thick) / (config.thick_radius - config.thin_radius);

    let thin_distance = target.distance(sample.thin);
    let thick_distance = target.distance(thick_on_ray);
    let mut collision_distance = thick_distance.lerp(thin_distance, blend.clamp(0.0, 1.0));

    // The double projection can land the thick point on the far side of the
    // target, where it would pull the camera the wrong way. A thick distance
    // above the thin one is just as wrong. Both cases fall back to the thin
    // probe alone.
    let view = rotation * Vec3::NEG_Z;
    if (sample.thick - target).dot(view) > 0.0 || thin_distance < thick_distance {
        collision_distance = thin_distance;
    }

    let new_distance = if collision_distance < distance {
        // Obstruction closer than the camera: snap in, never clip for a frame.
        collision_distance
    } else {
        smooth_step(
            distance,
            collision_distance,
            dt * 100.0 * (distance * 0.1).max(0.1),
        )
    }
    .clamp(config.distance_min, config.distance_max);

    let mut position = target + ray_dir * new_distance;

    // A raycast hit closer than the thin probe means the sight line itself is
    // broken; raw visibility wins over the smoothed sphere-probe position.
    if target.distance(sample.thin) > target.distance(sample.ray) {
        position = sample.ray;
    }

    (position, new_distance)
}

/// Hermite-eased interpolation between `from` and `to`.
fn smooth_step(from: f32, to: f32, t: f32) -> f32 {
    let t = t.clamp(0.0, 1.0);
    let t = t * t * (3.0 - 2.0 * t);
    from + (to - from) * t
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f32 = 1e-4;

    fn config() -> CameraConfig {
        CameraConfig::default()
    }

    /// Camera ten units behind a target at the origin, no orbit rotation.
    fn straight_view() -> (Vec3, Quat, Vec3) {
        (Vec3::ZERO, Quat::IDENTITY, Vec3::new(0.0, 0.0, 10.0))
    }

    #[test]
    fn clamp_angle_wraps_once_then_clamps() {
        assert_eq!(clamp_angle(370.0, -360.0, 360.0), 10.0);
        assert_eq!(clamp_angle(-400.0, -360.0, 360.0), -40.0);
        assert_eq!(clamp_angle(45.0, 10.0, 80.0), 45.0);
        assert_eq!(clamp_angle(5.0, 10.0, 80.0), 10.0);
        assert_eq!(clamp_angle(95.0, 10.0, 80.0), 80.0);
    }

    #[test]
    fn clamp_angle_is_idempotent() {
        for angle in [-720.0, -400.0, -15.0, 0.0, 42.0, 359.0, 400.0, 720.0] {
            let once = clamp_angle(angle, -360.0, 360.0);
            assert_eq!(clamp_angle(once, -360.0, 360.0), once);
        }
    }

    #[test]
    fn clear_probes_pass_the_camera_through() {
        let (target, rotation, camera) = straight_view();
        let sample = ProbeSample::clear(camera);

        let (position, distance) =
            avoid_collisions(target, rotation, camera, &sample, 10.0, 1.0 / 60.0, &config());

        assert_eq!(position, camera);
        assert_eq!(distance, 10.0);
    }

    #[test]
    fn thin_hit_snaps_in_immediately() {
        let (target, rotation, camera) = straight_view();
        // Thin probe stopped three units out, thick probe and raycast clear.
        let sample = ProbeSample {
            thin: Vec3::new(0.0, 0.0, 3.0),
            thick: camera,
            ray: camera,
        };

        let (position, distance) =
            avoid_collisions(target, rotation, camera, &sample, 10.0, 1.0 / 60.0, &config());

        assert!((distance - 3.0).abs() < EPS);
        assert!(position.distance(Vec3::new(0.0, 0.0, 3.0)) < EPS);
    }

    #[test]
    fn blends_thick_and_thin_distances() {
        let (target, rotation, camera) = straight_view();
        // Thick hit 0.225 off the sight line at z=5, thin pushed out to z=6:
        // the off-axis offset is half the radius gap, so the blend is 0.5.
        let sample = ProbeSample {
            thin: Vec3::new(0.0, 0.0, 6.0),
            thick: Vec3::new(0.225, 0.0, 5.0),
            ray: camera,
        };

        let (_, distance) =
            avoid_collisions(target, rotation, camera, &sample, 10.0, 1.0 / 60.0, &config());

        assert!((distance - 5.5).abs() < EPS);
    }

    #[test]
    fn thick_point_behind_target_falls_back_to_thin() {
        let (target, rotation, camera) = straight_view();
        // Double projection pushed the thick point past the target, into the
        // camera's view direction.
        let sample = ProbeSample {
            thin: Vec3::new(0.0, 0.0, 4.0),
            thick: Vec3::new(0.0, 0.0, -2.0),
            ray: camera,
        };

        let (_, distance) =
            avoid_collisions(target, rotation, camera, &sample, 10.0, 1.0 / 60.0, &config());

        assert!((distance - 4.0).abs() < EPS);
    }

    #[test]
    fn zoom_out_is_bounded_by_the_clear_distance() {
        let (target, rotation, _) = straight_view();
        // Previously pulled in to 3; the sight line is clear out to 5.
        let camera = Vec3::new(0.0, 0.0, 5.0);
        let sample = ProbeSample::clear(camera);

        let (_, eased) =
            avoid_collisions(target, rotation, camera, &sample, 3.0, 1.0 / 240.0, &config());
        assert!(eased > 3.0);
        assert!(eased < 5.0);

        // A large step saturates the smoothing instead of overshooting.
        let (_, saturated) =
            avoid_collisions(target, rotation, camera, &sample, 3.0, 1.0, &config());
        assert!((saturated - 5.0).abs() < EPS);
    }

    #[test]
    fn distance_stays_within_configured_bounds() {
        let (target, rotation, camera) = straight_view();
        // Obstruction closer than distance_min.
        let sample = ProbeSample {
            thin: Vec3::new(0.0, 0.0, 0.2),
            thick: camera,
            ray: camera,
        };

        let (_, distance) =
            avoid_collisions(target, rotation, camera, &sample, 10.0, 1.0 / 60.0, &config());

        assert_eq!(distance, config().distance_min);
    }

    #[test]
    fn closer_raycast_overrides_the_sphere_probes() {
        let (target, rotation, camera) = straight_view();
        let ray_point = Vec3::new(0.0, 0.0, 2.15);
        let sample = ProbeSample {
            thin: camera,
            thick: camera,
            ray: ray_point,
        };

        let (position, _) =
            avoid_collisions(target, rotation, camera, &sample, 10.0, 1.0 / 60.0, &config());

        assert_eq!(position, ray_point);
    }

    #[test]
    fn coincident_camera_and_target_is_a_no_op() {
        let sample = ProbeSample::clear(Vec3::ZERO);
        let (position, distance) = avoid_collisions(
            Vec3::ZERO,
            Quat::IDENTITY,
            Vec3::ZERO,
            &sample,
            5.0,
            1.0 / 60.0,
            &config(),
        );
        assert_eq!(position, Vec3::ZERO);
        assert_eq!(distance, 5.0);
    }
}
