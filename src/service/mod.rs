pub mod export;
pub mod submissions;
