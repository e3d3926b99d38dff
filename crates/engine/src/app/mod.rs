mod input;
mod loop_runner;
mod scene;

pub use input::InputAction;
pub use loop_runner::{run_app, AppError, LoopConfig};
pub use scene::{InputSnapshot, Scene, SceneCommand};
