pub mod companies;
pub mod health;
pub mod indicators;
pub mod portfolios;
