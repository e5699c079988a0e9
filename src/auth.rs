//! Shared-secret access gate.

/// Request header carrying the dashboard pin.
pub const PIN_HEADER: &str = "x-dashboard-pin";

/// Access policy for the gated endpoints.
///
/// An unset or empty configured pin disables the gate entirely; there is
/// no separate "present but inactive" state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthPolicy {
    Disabled,
    Pin(String),
}

impl AuthPolicy {
    /// Build a policy from the configured pin.
    pub fn from_pin(pin: Option<String>) -> Self {
        match pin {
            Some(p) if !p.is_empty() => AuthPolicy::Pin(p),
            _ => AuthPolicy::Disabled,
        }
    }

    /// Whether requests need a credential at all.
    pub fn is_enabled(&self) -> bool {
        matches!(self, AuthPolicy::Pin(_))
    }

    /// Decide whether a presented credential is admitted. Stateless; the
    /// check is exact string equality per request.
    pub fn authorize(&self, presented: Option<&str>) -> bool {
        match self {
            AuthPolicy::Disabled => true,
            AuthPolicy::Pin(secret) => presented == Some(secret.as_str()),
        }
    }
}
