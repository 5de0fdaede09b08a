pub mod mlmc;
pub mod payoffs;
pub mod stats;
