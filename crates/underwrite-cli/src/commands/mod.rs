pub mod scenarios;
pub mod underwrite;
