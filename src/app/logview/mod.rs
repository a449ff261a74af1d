pub mod collect;
pub mod export;
pub mod merge;
pub mod parse;
pub mod session;
