pub mod failure;
pub mod pre_start;
