//! Installation method selection.

use crate::errors::{Error, Result};
use crate::models::{InstallationMethod, McpServerDescriptor, MethodKind, NetworkTransport};

/// Explicit selection hints translated from CLI flags.
#[derive(Debug, Clone, Default)]
pub struct Hints {
    /// `--provider docker|claude-cli|...`
    pub provider: Option<MethodKind>,
    /// `--transport sse|http`, together with `--url`.
    pub transport: Option<NetworkTransport>,
    pub url: Option<String>,
}

impl Hints {
    pub fn is_empty(&self) -> bool {
        self.provider.is_none() && self.transport.is_none() && self.url.is_none()
    }
}

/// Outcome of selection: either a declared registry method or a direct
/// network connection synthesized from transport+url flags.
#[derive(Debug)]
pub enum SelectedMethod<'a> {
    Declared(&'a InstallationMethod),
    DirectNetwork {
        transport: NetworkTransport,
        url: String,
    },
}

/// Pick one installation method for `descriptor`.
///
/// Explicit hints short-circuit the ranking and must match deterministically;
/// a hint with no matching method is an error, never a silent fallback.
pub fn select_method<'a>(
    descriptor: &'a McpServerDescriptor,
    hints: &Hints,
) -> Result<SelectedMethod<'a>> {
    if let (Some(transport), Some(url)) = (hints.transport, hints.url.as_deref()) {
        return Ok(SelectedMethod::DirectNetwork {
            transport,
            url: url.to_string(),
        });
    }

    if let Some(kind) = hints.provider {
        return descriptor
            .installation_methods
            .iter()
            .find(|m| m.kind == kind)
            .map(SelectedMethod::Declared)
            .ok_or_else(|| Error::NoInstallationMethod(descriptor.name.clone()));
    }

    rank(descriptor)
        .map(SelectedMethod::Declared)
        .ok_or_else(|| Error::NoInstallationMethod(descriptor.name.clone()))
}

/// Ranking policy when no hint is given:
/// (a) a recommended `claude-cli` method;
/// (b) with declared user inputs, the first recommended non-`bwc` method,
///     else the first non-`bwc` method;
/// (c) the first recommended method, else the first in declaration order.
fn rank(descriptor: &McpServerDescriptor) -> Option<&InstallationMethod> {
    let methods = &descriptor.installation_methods;

    if let Some(m) = methods
        .iter()
        .find(|m| m.kind == MethodKind::ClaudeCli && m.recommended)
    {
        return Some(m);
    }

    if !descriptor.user_inputs.is_empty() {
        let non_bwc = || methods.iter().filter(|m| m.kind != MethodKind::Bwc);
        if let Some(m) = non_bwc()
            .find(|m| m.recommended)
            .or_else(|| non_bwc().next())
        {
            return Some(m);
        }
    }

    methods
        .iter()
        .find(|m| m.recommended)
        .or_else(|| methods.first())
}
