use crate::assets::{AssetResolver, ImageKey};
use crate::rendering::{DrawList, Viewport};

use super::input::{ActionStates, InputAction};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SceneCommand {
    None,
    Quit,
}

/// What the scene sees of the keyboard for one fixed tick.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InputSnapshot {
    quit_requested: bool,
    actions: ActionStates,
}

impl InputSnapshot {
    pub fn empty() -> Self {
        Self::default()
    }

    pub(crate) fn new(quit_requested: bool, actions: ActionStates) -> Self {
        Self {
            quit_requested,
            actions,
        }
    }

    pub fn quit_requested(&self) -> bool {
        self.quit_requested
    }

    pub fn is_down(&self, action: InputAction) -> bool {
        self.actions.is_down(action)
    }

    /// True only on the tick the key went down.
    pub fn just_pressed(&self, action: InputAction) -> bool {
        self.actions.was_pressed(action)
    }

    pub fn with_action_down(mut self, action: InputAction, is_down: bool) -> Self {
        self.actions.set(action, is_down);
        self
    }

    pub fn with_action_pressed(mut self, action: InputAction) -> Self {
        self.actions.set(action, true);
        self.actions.set_pressed(action, true);
        self
    }

    pub fn with_quit_requested(mut self, quit_requested: bool) -> Self {
        self.quit_requested = quit_requested;
        self
    }
}

pub trait Scene {
    /// One-time blocking setup. May read files through `assets`.
    fn load(&mut self, assets: &AssetResolver);
    fn update(&mut self, fixed_dt_seconds: f32, input: &InputSnapshot) -> SceneCommand;
    fn render(&self, viewport: Viewport, out: &mut DrawList);
    /// Every image the scene can draw, so the renderer can decode them before the first frame.
    fn image_manifest(&self) -> Vec<ImageKey>;
    fn unload(&mut self) {}
    fn debug_title(&self) -> Option<String> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_sets_held_and_pressed_state() {
        let snapshot = InputSnapshot::empty()
            .with_action_down(InputAction::MoveLeft, true)
            .with_action_pressed(InputAction::Interact);

        assert!(snapshot.is_down(InputAction::MoveLeft));
        assert!(!snapshot.just_pressed(InputAction::MoveLeft));
        assert!(snapshot.is_down(InputAction::Interact));
        assert!(snapshot.just_pressed(InputAction::Interact));
        assert!(!snapshot.quit_requested());
    }

    #[test]
    fn quit_flag_is_carried_by_the_snapshot() {
        let snapshot = InputSnapshot::empty().with_quit_requested(true);
        assert!(snapshot.quit_requested());
        assert!(!snapshot.is_down(InputAction::Quit));
    }
}
