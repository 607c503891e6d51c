pub mod init;
pub mod relay;
pub mod serve;
pub mod template;
pub mod validate;
