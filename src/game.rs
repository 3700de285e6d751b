use std::f32::consts::{PI, TAU};

use avian3d::prelude::*;
use bevy::light::CascadeShadowConfigBuilder;
use bevy::post_process::bloom::Bloom;
use bevy::prelude::*;
use bevy_inspector_egui::bevy_egui::EguiPlugin;
use rand::Rng;

use crate::camera::{CameraConfig, CameraTarget, OrbitCamera, OrbitCameraPlugin};
use crate::player::{CharacterConfig, CharacterController, PlayerPlugin};

pub struct GamePlugin;

/// Collision layers for the sandbox. Camera probes and ground checks only
/// look at `World`, so the player's own capsule never blocks its camera.
#[derive(PhysicsLayer, Clone, Copy, Debug, Default)]
pub enum GameLayer {
    #[default]
    Default,
    World,
    Player,
}

impl Plugin for GamePlugin {
    fn build(&self, app: &mut App) {
        app.add_plugins(avian3d::prelude::PhysicsPlugins::default());
        app.insert_resource(avian3d::prelude::Gravity(Vec3::NEG_Y * 20.0));
        //app.add_plugins(avian3d::prelude::PhysicsDebugPlugin::default())
        app.add_plugins(EguiPlugin::default());

        #[cfg(not(target_arch = "wasm32"))]
        app.add_plugins(bevy_inspector_egui::quick::WorldInspectorPlugin::new());

        app.add_plugins(OrbitCameraPlugin);
        app.add_plugins(PlayerPlugin);
        app.insert_resource(ClearColor(Color::srgb(0.02, 0.02, 0.03)));
        app.add_systems(Startup, setup);
    }
}

/// set up the arena: a lit floor with walls and scattered pillars, the
/// orbit camera and the player capsule
fn setup(
    mut commands: Commands,
    mut meshes: ResMut<Assets<Mesh>>,
    mut materials: ResMut<Assets<StandardMaterial>>,
    mut ambient_light: ResMut<AmbientLight>,
) -> Result {
    ambient_light.brightness = 150.0;

    commands.spawn((
        DirectionalLight {
            illuminance: light_consts::lux::OVERCAST_DAY,
            shadows_enabled: true,
            ..default()
        },
        Transform {
            translation: Vec3::new(0.0, 2.0, 0.0),
            rotation: Quat::from_rotation_x(-PI / 4.),
            ..default()
        },
        // The arena is small, so tight shadow bounds keep the quality up.
        CascadeShadowConfigBuilder {
            first_cascade_far_bound: 8.0,
            maximum_distance: 100.0,
            ..default()
        }
        .build(),
    ));

    let stone = materials.add(StandardMaterial {
        base_color: Color::srgb(0.55, 0.55, 0.6),
        perceptual_roughness: 1.0,
        ..default()
    });

    // floor
    commands.spawn((
        Mesh3d(meshes.add(Cuboid::new(40.0, 0.1, 40.0))),
        MeshMaterial3d(stone.clone()),
        RigidBody::Static,
        Collider::cuboid(40.0, 0.1, 40.0),
        CollisionLayers::new(GameLayer::World, LayerMask::ALL),
    ));

    // perimeter walls so the camera always has something to squeeze against
    for (pos, size) in [
        (Vec3::new(0.0, 2.0, -20.0), Vec3::new(40.0, 4.0, 0.5)),
        (Vec3::new(0.0, 2.0, 20.0), Vec3::new(40.0, 4.0, 0.5)),
        (Vec3::new(-20.0, 2.0, 0.0), Vec3::new(0.5, 4.0, 40.0)),
        (Vec3::new(20.0, 2.0, 0.0), Vec3::new(0.5, 4.0, 40.0)),
    ] {
        commands.spawn((
            Mesh3d(meshes.add(Cuboid::new(size.x, size.y, size.z))),
            MeshMaterial3d(stone.clone()),
            Transform::from_translation(pos),
            Name::new("Wall"),
            RigidBody::Static,
            Collider::cuboid(size.x, size.y, size.z),
            CollisionLayers::new(GameLayer::World, LayerMask::ALL),
        ));
    }

    // scattered pillars, kept out of the spawn point
    let mut rng = rand::rng();
    let pillar_mesh = meshes.add(Cuboid::new(1.2, 5.0, 1.2));
    for _ in 0..14 {
        let angle = rng.random_range(0.0..TAU);
        let radius = rng.random_range(4.0..17.0);
        commands.spawn((
            Mesh3d(pillar_mesh.clone()),
            MeshMaterial3d(stone.clone()),
            Transform::from_xyz(angle.cos() * radius, 2.5, angle.sin() * radius),
            Name::new("Pillar"),
            RigidBody::Static,
            Collider::cuboid(1.2, 5.0, 1.2),
            CollisionLayers::new(GameLayer::World, LayerMask::ALL),
        ));
    }

    // Player-following camera
    commands.spawn((
        Camera3d::default(),
        Bloom::NATURAL,
        OrbitCamera::new(CameraConfig {
            filter: SpatialQueryFilter::from_mask(GameLayer::World),
            ..default()
        })?,
        Transform::from_xyz(0.0, 4.0, 10.0).looking_at(Vec3::new(0.0, 1.0, 0.0), Vec3::Y),
    ));

    commands.spawn((
        Name::new("Player"),
        CameraTarget,
        CharacterController::new(CharacterConfig {
            ground_filter: SpatialQueryFilter::from_mask(GameLayer::World),
            ..default()
        })?,
        Mesh3d(meshes.add(Capsule3d::new(0.4, 1.0))),
        MeshMaterial3d(materials.add(StandardMaterial {
            base_color: Color::srgb(0.8, 0.5, 0.2),
            perceptual_roughness: 0.8,
            ..default()
        })),
        Transform::from_xyz(0.0, 1.0, 0.0),
        RigidBody::Dynamic,
        Collider::capsule(0.4, 1.0),
        CollisionLayers::new(GameLayer::Player, LayerMask::ALL),
        // The facing snap owns orientation; physics must not torque the body.
        LockedAxes::ROTATION_LOCKED,
    ));

    Ok(())
}
