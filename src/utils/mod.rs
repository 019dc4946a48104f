pub mod header;
pub mod method;
pub mod status;
