pub mod kerberos;
pub mod proc_loader;
pub mod proc_validator;
pub mod providers;
pub mod publishers;
pub mod renewal;
pub mod runtime;
pub mod settings;
pub mod types;

