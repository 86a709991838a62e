pub mod compute;
pub mod prepare;
