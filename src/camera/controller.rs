use avian3d::prelude::*;
use bevy::prelude::*;
use bevy::window::CursorOptions;
use thiserror::Error;

use crate::camera::collision::{self, ProbeSample};

/// Marks the entity the camera orbits around. The rig only ever reads the
/// target's transform; with no target in the world it idles.
#[derive(Component)]
pub struct CameraTarget;

/// Immutable orbit and collision tunables. Angles are in degrees.
#[derive(Clone, Debug)]
pub struct CameraConfig {
    /// Horizontal orbit speed, degrees per pixel of mouse motion
    pub x_speed: f32,
    /// Vertical orbit speed, degrees per pixel of mouse motion
    pub y_speed: f32,
    /// Minimum yaw angle
    pub x_min_limit: f32,
    /// Maximum yaw angle
    pub x_max_limit: f32,
    /// Minimum pitch angle
    pub y_min_limit: f32,
    /// Maximum pitch angle
    pub y_max_limit: f32,
    /// Minimum allowed distance between camera and target
    pub distance_min: f32,
    /// Maximum allowed distance between camera and target
    pub distance_max: f32,
    /// Radius of the thin probe, used to detect grazing contacts
    pub thin_radius: f32,
    /// Radius of the thick probe, used to pad the camera away from corners
    pub thick_radius: f32,
    /// Length of the outward clearance sweep before the probe sweeps back
    pub probe_length: f32,
    /// Outward nudge applied to raycast hits so the camera never rests
    /// exactly on a surface
    pub skin_offset: f32,
    /// Which colliders can block the camera
    pub filter: SpatialQueryFilter,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            x_speed: 0.25,
            y_speed: 0.25,
            x_min_limit: -360.0,
            x_max_limit: 360.0,
            y_min_limit: 10.0,
            y_max_limit: 80.0,
            distance_min: 0.5,
            distance_max: 10.0,
            thin_radius: 0.15,
            thick_radius: 0.3,
            probe_length: 1.0,
            skin_offset: 0.15,
            filter: SpatialQueryFilter::default(),
        }
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum CameraConfigError {
    #[error("distance_min ({min}) must not exceed distance_max ({max})")]
    DistanceRange { min: f32, max: f32 },
    #[error("thin_radius ({thin}) must be positive and smaller than thick_radius ({thick})")]
    ProbeRadii { thin: f32, thick: f32 },
    #[error("angle limits are inverted")]
    AngleRange,
    #[error("probe_length must be positive, got {0}")]
    ProbeLength(f32),
    #[error("skin_offset must not be negative, got {0}")]
    SkinOffset(f32),
}

/// Component for the third-person orbit camera rig.
///
/// The mutable orbit state lives here; the tunables are validated once at
/// construction and read-only afterwards.
#[derive(Component)]
pub struct OrbitCamera {
    pub config: CameraConfig,
    /// Horizontal orbit angle in degrees
    pub yaw: f32,
    /// Vertical orbit angle in degrees
    pub pitch: f32,
    /// Current distance between camera and target
    pub distance: f32,
}

impl OrbitCamera {
    /// Build a rig from a config, rejecting out-of-range tunables instead of
    /// clamping them silently.
    pub fn new(config: CameraConfig) -> Result<Self, CameraConfigError> {
        if config.distance_min > config.distance_max {
            return Err(CameraConfigError::DistanceRange {
                min: config.distance_min,
                max: config.distance_max,
            });
        }
        if config.thin_radius <= 0.0 || config.thin_radius >= config.thick_radius {
            return Err(CameraConfigError::ProbeRadii {
                thin: config.thin_radius,
                thick: config.thick_radius,
            });
        }
        if config.x_min_limit > config.x_max_limit || config.y_min_limit > config.y_max_limit {
            return Err(CameraConfigError::AngleRange);
        }
        if config.probe_length <= 0.0 {
            return Err(CameraConfigError::ProbeLength(config.probe_length));
        }
        if config.skin_offset < 0.0 {
            return Err(CameraConfigError::SkinOffset(config.skin_offset));
        }

        let pitch = collision::clamp_angle(0.0, config.y_min_limit, config.y_max_limit);
        let distance = config.distance_max;
        Ok(Self {
            config,
            yaw: 0.0,
            pitch,
            distance,
        })
    }

    /// Orbit rotation for the current angles. Positive pitch looks down at
    /// the target from above.
    pub fn rotation(&self) -> Quat {
        Quat::from_euler(
            EulerRot::YXZ,
            self.yaw.to_radians(),
            -self.pitch.to_radians(),
            0.0,
        )
    }
}

/// Handle mouse input for camera rotation
pub fn handle_mouse_look(
    mut cursor_options: Single<&mut CursorOptions>,
    mut camera_query: Query<&mut OrbitCamera>,
    mut cursor_events: MessageReader<bevy::input::mouse::MouseMotion>,
    keyboard: Res<ButtonInput<KeyCode>>,
    mouse: Res<ButtonInput<MouseButton>>,
) {
    let Ok(mut camera) = camera_query.single_mut() else {
        return;
    };

    // Collect mouse delta from events
    let mut delta = Vec2::ZERO;
    for event in cursor_events.read() {
        delta += event.delta;
    }

    // Lock cursor for better camera control
    if mouse.just_pressed(MouseButton::Left) {
        cursor_options.grab_mode = bevy::window::CursorGrabMode::Locked;
        cursor_options.visible = false;
    }

    if keyboard.just_pressed(KeyCode::Escape) {
        cursor_options.grab_mode = bevy::window::CursorGrabMode::None;
        cursor_options.visible = true;
    }

    // Update camera rotation when cursor is locked
    if cursor_options.grab_mode == bevy::window::CursorGrabMode::Locked {
        let yaw = camera.yaw + delta.x * camera.config.x_speed;
        let pitch = camera.pitch - delta.y * camera.config.y_speed;
        camera.yaw = collision::clamp_angle(yaw, camera.config.x_min_limit, camera.config.x_max_limit);
        camera.pitch =
            collision::clamp_angle(pitch, camera.config.y_min_limit, camera.config.y_max_limit);
    }
}

/// Follow the target and pull the camera in whenever geometry intrudes on
/// the sight line.
///
/// Runs in `PostUpdate` so it reads the target pose after all movement for
/// the frame has been applied.
pub fn update_camera_position(
    spatial: SpatialQuery,
    mut camera_query: Query<(&mut Transform, &mut OrbitCamera)>,
    target_query: Query<&Transform, (With<CameraTarget>, Without<OrbitCamera>)>,
    time: Res<Time>,
) {
    let Ok((mut camera_transform, mut camera)) = camera_query.single_mut() else {
        return;
    };

    // No target bound: the rig idles this frame.
    let Ok(target_transform) = target_query.single() else {
        return;
    };

    let dt = time.delta_secs();
    let target = target_transform.translation;

    // Ease back out toward the preferred distance. Collision avoidance below
    // pulls it straight back in if something is still in the way.
    if camera.distance < camera.config.distance_max {
        camera.distance = camera
            .distance
            .lerp(camera.config.distance_max, (dt * 2.0).min(1.0));
    }

    let rotation = camera.rotation();
    let desired = target + rotation * Vec3::new(0.0, 0.0, camera.distance);
    camera_transform.rotation = rotation;
    camera_transform.translation = desired;

    // Probe the sight line three ways and let the blended result reposition
    // the camera.
    let view = rotation * Vec3::NEG_Z;
    let sample = ProbeSample {
        thin: double_sphere_probe(
            &spatial,
            target,
            desired,
            view,
            camera.config.thin_radius,
            &camera.config,
            true,
        ),
        thick: double_sphere_probe(
            &spatial,
            target,
            desired,
            view,
            camera.config.thick_radius,
            &camera.config,
            false,
        ),
        ray: ray_probe(&spatial, target, desired, &camera.config),
    };

    let (position, distance) = collision::avoid_collisions(
        target,
        rotation,
        desired,
        &sample,
        camera.distance,
        dt,
        &camera.config,
    );
    camera.distance = distance;
    camera_transform.translation = position;
}

/// Double sphere cast along the sight line.
///
/// The first sweep pushes the origin away from the camera to buy clearance,
/// the second sweeps back toward the camera from there and reports the first
/// obstruction. Returns the camera position unchanged when nothing is hit.
fn double_sphere_probe(
    spatial: &SpatialQuery,
    target: Vec3,
    camera_pos: Vec3,
    view: Vec3,
    radius: f32,
    config: &CameraConfig,
    push_along_normal: bool,
) -> Vec3 {
    let sphere = Collider::sphere(radius);

    let mut ray = target - camera_pos;
    if view.dot(ray) < 0.0 {
        ray = -ray;
    }
    let Ok(dir) = Dir3::new(ray) else {
        return camera_pos;
    };

    let mut origin = target;
    let clearance = ShapeCastConfig::from_max_distance(config.probe_length);
    match spatial.cast_shape(&sphere, origin, Quat::IDENTITY, dir, &clearance, &config.filter) {
        Some(hit) => origin += dir * hit.distance,
        None => origin += dir * config.probe_length,
    }

    let back = camera_pos - origin;
    let Ok(back_dir) = Dir3::new(back) else {
        return camera_pos;
    };
    let cast = ShapeCastConfig::from_max_distance(back.length());
    match spatial.cast_shape(&sphere, origin, Quat::IDENTITY, back_dir, &cast, &config.filter) {
        // Pushing along the normal turns the surface contact into the
        // position a sphere of this radius can actually occupy.
        Some(hit) if push_along_normal => hit.point1 + hit.normal1 * radius,
        Some(hit) => hit.point1,
        None => camera_pos,
    }
}

/// Straight line-of-sight check from the target to the camera. A hit is
/// nudged off the surface by the skin offset.
fn ray_probe(
    spatial: &SpatialQuery,
    target: Vec3,
    camera_pos: Vec3,
    config: &CameraConfig,
) -> Vec3 {
    let ray = camera_pos - target;
    let Ok(dir) = Dir3::new(ray) else {
        return camera_pos;
    };
    match spatial.cast_ray(target, dir, ray.length(), true, &config.filter) {
        Some(hit) => target + dir * hit.distance + hit.normal * config.skin_offset,
        None => camera_pos,
    }
}
