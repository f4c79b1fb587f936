pub mod controls;
pub mod picker;
pub mod summary;
