pub mod clock;
pub mod identity_provider;
pub mod object_store;
