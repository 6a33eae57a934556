pub mod create;
pub mod upload;
