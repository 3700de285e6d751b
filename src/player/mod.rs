use bevy::prelude::*;

pub mod controller;

pub use controller::*;

pub struct PlayerPlugin;

impl Plugin for PlayerPlugin {
    fn build(&self, app: &mut App) {
        app.add_systems(Update, controller::apply_controls);
        // Physics-rate work: jump impulses are consumed before the velocity
        // cap so a fresh jump is clamped on the same tick it is applied.
        app.add_systems(
            FixedUpdate,
            (controller::apply_jump_physics, controller::cap_velocity).chain(),
        );
    }
}
