pub(crate) mod bootstrap;
pub(crate) mod loop_runner;

mod level;
mod player;
mod settings;
mod shop;
mod sky;
mod transition;
