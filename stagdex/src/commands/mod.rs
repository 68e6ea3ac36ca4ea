pub mod info;
pub mod var;
