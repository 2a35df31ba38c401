//! Core rust implementation of StoNED.rs, a crate for formulating convex quantile and expectile
//! regression models.

pub mod cnls;
pub mod configuration;
pub mod data;
pub mod optimize;
