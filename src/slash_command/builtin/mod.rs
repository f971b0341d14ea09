pub mod toggle_visibility;

pub use toggle_visibility::ToggleVisibilityCommand;
