pub mod authorization;
pub mod config;
pub mod error;
pub mod events;
pub mod playlist;
pub mod scan;
pub mod trigger;
pub mod platform {
    pub mod permissions;
    pub mod renderer;
    pub mod settings;
}
pub mod tasks {
    pub mod display;
    pub mod sequencer;
    pub mod watch;
}
