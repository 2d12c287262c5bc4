pub mod interview;
pub mod preference;
pub mod profile;
pub mod resume;
pub mod task;
