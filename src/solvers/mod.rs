pub mod brownian;
pub mod discretization;
pub mod euler_maruyama;
