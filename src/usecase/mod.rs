pub mod avatar_preview;
pub mod provision_account_usecase;
pub mod registration_form;
