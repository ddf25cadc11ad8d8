pub mod aad_app_proxy_connector;
pub mod clr_security;

use crate::registry::RegistryBuilder;

/// Registers every built-in collector, in the order they are listed.
pub fn register_all(registry: &mut RegistryBuilder) {
    aad_app_proxy_connector::register(registry);
    clr_security::register(registry);
}
