use winit::event::ElementState;
use winit::keyboard::{KeyCode, PhysicalKey};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InputAction {
    MoveUp,
    MoveDown,
    MoveLeft,
    MoveRight,
    UseTool,
    SwitchTool,
    UseSeed,
    SwitchSeed,
    Interact,
    Quit,
}

const ACTION_COUNT: usize = 10;

impl InputAction {
    pub const ALL: [InputAction; ACTION_COUNT] = [
        InputAction::MoveUp,
        InputAction::MoveDown,
        InputAction::MoveLeft,
        InputAction::MoveRight,
        InputAction::UseTool,
        InputAction::SwitchTool,
        InputAction::UseSeed,
        InputAction::SwitchSeed,
        InputAction::Interact,
        InputAction::Quit,
    ];

    const fn index(self) -> usize {
        match self {
            InputAction::MoveUp => 0,
            InputAction::MoveDown => 1,
            InputAction::MoveLeft => 2,
            InputAction::MoveRight => 3,
            InputAction::UseTool => 4,
            InputAction::SwitchTool => 5,
            InputAction::UseSeed => 6,
            InputAction::SwitchSeed => 7,
            InputAction::Interact => 8,
            InputAction::Quit => 9,
        }
    }

    pub fn from_physical_key(key: PhysicalKey) -> Option<Self> {
        let PhysicalKey::Code(code) = key else {
            return None;
        };
        let action = match code {
            KeyCode::KeyW | KeyCode::ArrowUp => InputAction::MoveUp,
            KeyCode::KeyS | KeyCode::ArrowDown => InputAction::MoveDown,
            KeyCode::KeyA | KeyCode::ArrowLeft => InputAction::MoveLeft,
            KeyCode::KeyD | KeyCode::ArrowRight => InputAction::MoveRight,
            KeyCode::Space => InputAction::UseTool,
            KeyCode::KeyQ => InputAction::SwitchTool,
            KeyCode::ControlLeft | KeyCode::KeyF => InputAction::UseSeed,
            KeyCode::KeyE => InputAction::SwitchSeed,
            KeyCode::Enter | KeyCode::KeyR => InputAction::Interact,
            KeyCode::Escape => InputAction::Quit,
            _ => return None,
        };
        Some(action)
    }
}

/// Held state plus a press edge per action. Edges are consumed once per tick.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct ActionStates {
    down: [bool; ACTION_COUNT],
    pressed: [bool; ACTION_COUNT],
}

impl ActionStates {
    pub(crate) fn set(&mut self, action: InputAction, is_down: bool) {
        self.down[action.index()] = is_down;
    }

    pub(crate) fn is_down(&self, action: InputAction) -> bool {
        self.down[action.index()]
    }

    pub(crate) fn set_pressed(&mut self, action: InputAction, pressed: bool) {
        self.pressed[action.index()] = pressed;
    }

    pub(crate) fn was_pressed(&self, action: InputAction) -> bool {
        self.pressed[action.index()]
    }

    /// Records a key transition. A repeat press while already down is not a new edge.
    pub(crate) fn apply(&mut self, action: InputAction, state: ElementState) {
        match state {
            ElementState::Pressed => {
                if !self.is_down(action) {
                    self.set_pressed(action, true);
                }
                self.set(action, true);
            }
            ElementState::Released => self.set(action, false),
        }
    }

    pub(crate) fn clear_edges(&mut self) {
        self.pressed = [false; ACTION_COUNT];
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn indices_are_unique_and_dense() {
        for (position, action) in InputAction::ALL.iter().enumerate() {
            assert_eq!(action.index(), position);
        }
    }

    #[test]
    fn gameplay_keys_map_to_actions() {
        let cases = [
            (KeyCode::KeyW, InputAction::MoveUp),
            (KeyCode::ArrowRight, InputAction::MoveRight),
            (KeyCode::Space, InputAction::UseTool),
            (KeyCode::KeyQ, InputAction::SwitchTool),
            (KeyCode::ControlLeft, InputAction::UseSeed),
            (KeyCode::KeyE, InputAction::SwitchSeed),
            (KeyCode::Enter, InputAction::Interact),
            (KeyCode::Escape, InputAction::Quit),
        ];
        for (code, action) in cases {
            assert_eq!(
                InputAction::from_physical_key(PhysicalKey::Code(code)),
                Some(action)
            );
        }
        assert_eq!(
            InputAction::from_physical_key(PhysicalKey::Code(KeyCode::F3)),
            None
        );
    }

    #[test]
    fn held_key_produces_one_edge() {
        let mut states = ActionStates::default();
        states.apply(InputAction::Interact, ElementState::Pressed);
        assert!(states.was_pressed(InputAction::Interact));
        states.clear_edges();

        states.apply(InputAction::Interact, ElementState::Pressed);
        assert!(!states.was_pressed(InputAction::Interact));
        assert!(states.is_down(InputAction::Interact));

        states.apply(InputAction::Interact, ElementState::Released);
        states.apply(InputAction::Interact, ElementState::Pressed);
        assert!(states.was_pressed(InputAction::Interact));
    }
}
