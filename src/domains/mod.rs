pub mod git;
pub mod rules;
pub mod sessions;
pub mod settings;
