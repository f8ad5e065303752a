pub mod grade;
pub mod init;
pub mod render;
pub mod take;
pub mod validate;
