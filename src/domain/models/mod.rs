pub mod asset;
pub mod identity;
pub mod outcome;
pub mod profile;
pub mod registration;
