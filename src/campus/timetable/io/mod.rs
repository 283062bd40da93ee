pub mod excel_write;
pub mod grid_read;
pub mod store;
