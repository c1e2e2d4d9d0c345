pub mod filter;
pub mod note;
pub mod pitch;
