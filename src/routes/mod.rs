pub mod health;
pub mod nowcast;
pub mod refresher;
pub mod series;
pub mod session;
