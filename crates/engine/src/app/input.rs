#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InputAction {
    OrbitLeft,
    OrbitRight,
    OrbitUp,
    OrbitDown,
    Quit,
}

const ACTION_COUNT: usize = 5;

#[derive(Debug, Clone, Copy, Default)]
pub struct ActionStates {
    down: [bool; ACTION_COUNT],
}

impl ActionStates {
    pub fn set(&mut self, action: InputAction, is_down: bool) {
        self.down[action.index()] = is_down;
    }

    pub fn is_down(&self, action: InputAction) -> bool {
        self.down[action.index()]
    }
}

impl InputAction {
    const fn index(self) -> usize {
        match self {
            InputAction::OrbitLeft => 0,
            InputAction::OrbitRight => 1,
            InputAction::OrbitUp => 2,
            InputAction::OrbitDown => 3,
            InputAction::Quit => 4,
        }
    }
}
