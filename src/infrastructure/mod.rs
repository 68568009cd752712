pub mod entity;
pub mod profile_repository;
pub mod supabase_client;
pub mod supabase_identity_provider;
pub mod supabase_object_store;
pub mod system_clock;
