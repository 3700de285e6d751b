pub mod collision;
pub mod controller;

pub use controller::*;

use bevy::prelude::*;

/// Plugin for the third-person orbit camera system
pub struct OrbitCameraPlugin;

impl Plugin for OrbitCameraPlugin {
    fn build(&self, app: &mut App) {
        app.add_systems(Update, controller::handle_mouse_look);
        // Late-frame: the rig has to see the target pose after movement and
        // the physics step have run.
        app.add_systems(PostUpdate, controller::update_camera_position);
    }
}
