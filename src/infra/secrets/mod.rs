pub mod env_secrets;

pub use env_secrets::EnvSecretStore;
