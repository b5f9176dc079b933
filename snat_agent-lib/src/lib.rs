pub mod config;
pub mod dump;
pub mod logging;
pub mod matcher;
pub mod metadata;
pub mod reconcile;
pub mod repair;
pub mod rule_store;
pub mod rules;
pub mod shell_command_ext;
pub mod validator;
pub mod version;
