//! Environment-variable injection
//!
//! Variables are set in the invoked interpreter's environment, never in the
//! enclosing session.

use oprelay_api::EnvVars;
use oprelay_exec::sh_quote;

/// Render `export NAME='value'; ` prefixes for a POSIX shell invocation
#[must_use]
pub fn unix_prefix(vars: &EnvVars) -> String {
    let mut prefix = String::new();
    for (name, value) in vars.iter() {
        prefix.push_str("export ");
        prefix.push_str(name);
        prefix.push('=');
        prefix.push_str(&sh_quote(value));
        prefix.push_str("; ");
    }
    prefix
}

/// Render `$env:NAME = 'value'; ` prefixes for a PowerShell script
#[must_use]
pub fn powershell_prefix(vars: &EnvVars) -> String {
    let mut prefix = String::new();
    for (name, value) in vars.iter() {
        prefix.push_str("$env:");
        prefix.push_str(name);
        prefix.push_str(" = ");
        prefix.push_str(&ps_quote(value));
        prefix.push_str("; ");
    }
    prefix
}

/// Quote a value as a PowerShell single-quoted literal
#[must_use]
pub fn ps_quote(value: &str) -> String {
    let mut quoted = String::with_capacity(value.len() + 2);
    quoted.push('\'');
    for ch in value.chars() {
        if ch == '\'' {
            quoted.push_str("''");
        } else {
            quoted.push(ch);
        }
    }
    quoted.push('\'');
    quoted
}
