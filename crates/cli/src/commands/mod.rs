pub mod chat;
pub mod init;
pub mod parse;
pub mod serve;
