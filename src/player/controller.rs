use avian3d::prelude::*;
use bevy::prelude::*;
use thiserror::Error;

use crate::camera::OrbitCamera;

/// Immutable movement and jump tunables.
#[derive(Clone, Debug)]
pub struct CharacterConfig {
    /// Planar movement speed in units per second
    pub speed: f32,
    /// Radius of the ground overlap check at the body's position
    pub ground_radius: f32,
    /// Vertical velocity set when a jump is consumed
    pub jump_velocity: f32,
    /// Vertical velocity an early release cuts the jump down to
    pub jump_reduction: f32,
    /// Per-axis velocity cap, applied symmetrically around zero
    pub max_velocity: Vec3,
    /// Which colliders count as ground
    pub ground_filter: SpatialQueryFilter,
}

impl Default for CharacterConfig {
    fn default() -> Self {
        Self {
            speed: 10.0,
            ground_radius: 1.0,
            jump_velocity: 20.0,
            jump_reduction: 10.0,
            max_velocity: Vec3::new(15.0, 30.0, 15.0),
            ground_filter: SpatialQueryFilter::default(),
        }
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum CharacterConfigError {
    #[error("speed must not be negative, got {0}")]
    Speed(f32),
    #[error("ground_radius must be positive, got {0}")]
    GroundRadius(f32),
    #[error("max_velocity components must not be negative, got {0}")]
    MaxVelocity(Vec3),
}

/// Kinematic character controller.
///
/// The per-frame system updates the movement intent and the one-shot jump
/// flags; the fixed-tick systems consume them against the rigid body. The
/// flags are mailboxes: set on an input edge, cleared exactly once by the
/// next physics tick.
#[derive(Component)]
pub struct CharacterController {
    pub config: CharacterConfig,
    /// Planar movement applied this frame, world space
    pub movement: Vec3,
    pub is_grounded: bool,
    /// One-shot: jump on the next fixed tick
    pub wants_to_jump: bool,
    /// One-shot: cut the jump short on the next fixed tick
    pub wants_to_cut_jump: bool,
    /// Gate for cutscenes and external control; when false, movement and
    /// jump input are ignored
    pub is_handling_input: bool,
}

impl CharacterController {
    /// Build a controller from a config, rejecting out-of-range tunables.
    pub fn new(config: CharacterConfig) -> Result<Self, CharacterConfigError> {
        if config.speed < 0.0 {
            return Err(CharacterConfigError::Speed(config.speed));
        }
        if config.ground_radius <= 0.0 {
            return Err(CharacterConfigError::GroundRadius(config.ground_radius));
        }
        if config.max_velocity.min_element() < 0.0 {
            return Err(CharacterConfigError::MaxVelocity(config.max_velocity));
        }

        Ok(Self {
            config,
            movement: Vec3::ZERO,
            is_grounded: false,
            wants_to_jump: false,
            wants_to_cut_jump: false,
            is_handling_input: true,
        })
    }

    /// Record jump input edges for the next fixed tick. A rising edge only
    /// queues a jump while grounded; a falling edge only queues a cut while
    /// airborne. A held button produces no edges and re-triggers nothing.
    pub fn observe_jump_input(&mut self, just_pressed: bool, just_released: bool) {
        if just_pressed && self.is_grounded {
            self.wants_to_jump = true;
        }
        if just_released && !self.is_grounded {
            self.wants_to_cut_jump = true;
        }
    }

    /// Consume the one-shot jump flags against the body's velocity.
    ///
    /// A queued jump sets the vertical axis to the jump velocity and leaves
    /// the lateral axes untouched. A queued cut clamps the vertical axis down
    /// to the reduction threshold, never up; the flag clears whether or not
    /// the clamp applied.
    pub fn consume_jump(&mut self, velocity: &mut Vec3) {
        if self.wants_to_jump {
            velocity.y = self.config.jump_velocity;
            self.wants_to_jump = false;
        }

        if self.wants_to_cut_jump {
            if velocity.y > self.config.jump_reduction {
                velocity.y = self.config.jump_reduction;
            }
            self.wants_to_cut_jump = false;
        }
    }

    /// Clamp each velocity component independently into the configured cap.
    pub fn cap_velocity(&self, velocity: &mut Vec3) {
        let cap = self.config.max_velocity;
        velocity.x = velocity.x.clamp(-cap.x, cap.x);
        velocity.y = velocity.y.clamp(-cap.y, cap.y);
        velocity.z = velocity.z.clamp(-cap.z, cap.z);
    }
}

/// Compose the camera-relative planar movement for one frame.
///
/// `camera_right` is the camera's world-space right axis; forward is its
/// planar complement, so movement follows the camera no matter which way the
/// character faces. The result is normalized and scaled, so diagonals are no
/// faster than cardinal moves.
pub fn camera_relative_movement(camera_right: Vec3, h: f32, v: f32, speed: f32, dt: f32) -> Vec3 {
    let forward = Vec3::Y.cross(camera_right);
    let lateral = camera_right;
    (forward * v + lateral * h).normalize_or_zero() * speed * dt
}

fn axis(keyboard: &ButtonInput<KeyCode>, negative: KeyCode, positive: KeyCode) -> f32 {
    let mut value = 0.0;
    if keyboard.pressed(negative) {
        value -= 1.0;
    }
    if keyboard.pressed(positive) {
        value += 1.0;
    }
    value
}

/// Per-frame control: facing, ground check, camera-relative movement and
/// jump edge detection.
pub fn apply_controls(
    spatial: SpatialQuery,
    mut query: Query<(&mut Transform, &mut CharacterController)>,
    camera_query: Query<&Transform, (With<OrbitCamera>, Without<CharacterController>)>,
    keyboard: Res<ButtonInput<KeyCode>>,
    time: Res<Time>,
) {
    let Ok((mut transform, mut controller)) = query.single_mut() else {
        return;
    };

    // Face the direction of travel. Zero intent keeps the current facing.
    if controller.movement != Vec3::ZERO {
        transform.rotation =
            Quat::from_rotation_y(controller.movement.x.atan2(controller.movement.z));
    }

    controller.is_grounded = !spatial
        .shape_intersections(
            &Collider::sphere(controller.config.ground_radius),
            transform.translation,
            Quat::IDENTITY,
            &controller.config.ground_filter,
        )
        .is_empty();

    if !controller.is_handling_input {
        // External control owns the character; leave the intent alone and
        // consume no input.
        return;
    }

    // Without a camera there is no frame of reference for movement: fail
    // closed rather than move in stale or world space.
    let Ok(camera_transform) = camera_query.single() else {
        warn_once!("no orbit camera to derive movement axes from, ignoring input");
        controller.movement = Vec3::ZERO;
        return;
    };

    let h = axis(&keyboard, KeyCode::KeyA, KeyCode::KeyD);
    let v = axis(&keyboard, KeyCode::KeyS, KeyCode::KeyW);

    controller.movement = camera_relative_movement(
        camera_transform.rotation * Vec3::X,
        h,
        v,
        controller.config.speed,
        time.delta_secs(),
    );
    transform.translation += controller.movement;

    controller.observe_jump_input(
        keyboard.just_pressed(KeyCode::Space),
        keyboard.just_released(KeyCode::Space),
    );
}

/// Fixed tick: consume queued jump and jump-cut requests.
pub fn apply_jump_physics(mut query: Query<(&mut LinearVelocity, &mut CharacterController)>) {
    for (mut velocity, mut controller) in query.iter_mut() {
        controller.consume_jump(&mut velocity.0);
    }
}

/// Fixed tick: per-axis velocity cap so falls and pushes stay bounded.
pub fn cap_velocity(mut query: Query<(&mut LinearVelocity, &CharacterController)>) {
    for (mut velocity, controller) in query.iter_mut() {
        controller.cap_velocity(&mut velocity.0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn controller() -> CharacterController {
        CharacterController::new(CharacterConfig::default()).unwrap()
    }

    #[test]
    fn grounded_rising_edge_queues_exactly_one_jump() {
        let mut c = controller();
        c.is_grounded = true;
        c.observe_jump_input(true, false);
        assert!(c.wants_to_jump);

        let mut velocity = Vec3::new(1.0, -2.0, 3.0);
        c.consume_jump(&mut velocity);
        assert_eq!(velocity, Vec3::new(1.0, 20.0, 3.0));
        assert!(!c.wants_to_jump);

        // The held button produces no further edges; nothing re-triggers.
        c.observe_jump_input(false, false);
        c.consume_jump(&mut velocity);
        assert_eq!(velocity.y, 20.0);
    }

    #[test]
    fn airborne_press_does_not_queue_a_jump() {
        let mut c = controller();
        c.is_grounded = false;
        c.observe_jump_input(true, false);
        assert!(!c.wants_to_jump);
    }

    #[test]
    fn grounded_release_does_not_queue_a_cut() {
        let mut c = controller();
        c.is_grounded = true;
        c.observe_jump_input(false, true);
        assert!(!c.wants_to_cut_jump);
    }

    #[test]
    fn airborne_release_queues_a_cut() {
        let mut c = controller();
        c.is_grounded = false;
        c.observe_jump_input(false, true);
        assert!(c.wants_to_cut_jump);
        assert!(!c.wants_to_jump);
    }

    #[test]
    fn jump_cut_only_reduces_vertical_velocity() {
        let mut c = controller();
        c.wants_to_cut_jump = true;
        let mut rising = Vec3::new(0.0, 15.0, 0.0);
        c.consume_jump(&mut rising);
        assert_eq!(rising.y, 10.0);
        assert!(!c.wants_to_cut_jump);

        // Below the threshold the cut is a no-op, but the flag still clears.
        c.wants_to_cut_jump = true;
        let mut falling = Vec3::new(0.0, 4.0, 0.0);
        c.consume_jump(&mut falling);
        assert_eq!(falling.y, 4.0);
        assert!(!c.wants_to_cut_jump);
    }

    #[test]
    fn velocity_cap_clamps_each_axis_independently() {
        let c = controller();
        let mut velocity = Vec3::new(100.0, -100.0, 5.0);
        c.cap_velocity(&mut velocity);
        assert_eq!(velocity, Vec3::new(15.0, -30.0, 5.0));

        // Idempotent: capping a capped velocity changes nothing.
        let again = velocity;
        c.cap_velocity(&mut velocity);
        assert_eq!(velocity, again);
    }

    #[test]
    fn movement_follows_the_camera_axes() {
        // Camera right along +X means planar forward is -Z.
        let step = camera_relative_movement(Vec3::X, 0.0, 1.0, 10.0, 0.1);
        assert!(step.distance(Vec3::new(0.0, 0.0, -1.0)) < 1e-5);

        let strafe = camera_relative_movement(Vec3::X, 1.0, 0.0, 10.0, 0.1);
        assert!(strafe.distance(Vec3::new(1.0, 0.0, 0.0)) < 1e-5);

        // Diagonals are normalized, not faster.
        let diagonal = camera_relative_movement(Vec3::X, 1.0, 1.0, 10.0, 0.1);
        assert!((diagonal.length() - 1.0).abs() < 1e-5);
    }

    #[test]
    fn zero_input_composes_zero_movement() {
        assert_eq!(camera_relative_movement(Vec3::X, 0.0, 0.0, 10.0, 0.1), Vec3::ZERO);
    }

    #[test]
    fn rejects_negative_tunables() {
        let bad_speed = CharacterConfig {
            speed: -1.0,
            ..default()
        };
        assert_eq!(
            CharacterController::new(bad_speed).err(),
            Some(CharacterConfigError::Speed(-1.0))
        );

        let bad_cap = CharacterConfig {
            max_velocity: Vec3::new(1.0, -1.0, 1.0),
            ..default()
        };
        assert!(matches!(
            CharacterController::new(bad_cap),
            Err(CharacterConfigError::MaxVelocity(_))
        ));
    }
}
