pub mod csf;
pub mod dashboard;
pub mod department;
pub mod indicator;
pub mod kpi;
pub mod permission;
pub mod success_factor;
pub mod user;
