pub mod auth;
pub mod csfs;
pub mod dashboard;
pub mod departments;
pub mod health;
pub mod indicators;
pub mod kpis;
pub mod permissions;
pub mod success_factors;
pub mod users;
