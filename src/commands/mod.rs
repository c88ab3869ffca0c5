pub mod count;
pub mod dump;
pub mod header;
pub mod init;
pub mod status;
