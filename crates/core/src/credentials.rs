//! Layered credential resolution.
//!
//! Order: explicit override → settings store → environment. There is no
//! embedded last-resort secret; when every layer is empty or malformed
//! the chain fails with a configuration error naming the sources it
//! consulted.

use tracing::{debug, warn};

use crate::config::{ENV_API_CREDENTIAL, SETTING_API_CREDENTIAL, SettingsStore};
use crate::error::{LiveError, Result};

/// Minimum plausible secret length; anything shorter is treated as unset.
const MIN_SECRET_LEN: usize = 8;

/// Where the effective credential came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialSource {
	Override,
	Settings,
	Environment,
}

impl CredentialSource {
	/// Source name safe to show operators.
	pub fn name(self) -> &'static str {
		match self {
			CredentialSource::Override => "override",
			CredentialSource::Settings => "settings",
			CredentialSource::Environment => "environment",
		}
	}
}

/// A validated secret plus its provenance. `Debug` and display paths
/// only ever see the masked form.
#[derive(Clone)]
pub struct Credential {
	secret: String,
	source: CredentialSource,
}

impl Credential {
	pub fn source(&self) -> CredentialSource {
		self.source
	}

	/// The raw secret, for transport authentication only.
	pub fn expose(&self) -> &str {
		&self.secret
	}

	/// Truncated form for logs and UI: first four characters plus length.
	pub fn masked(&self) -> String {
		let head: String = self.secret.chars().take(4).collect();
		format!("{head}…({} chars)", self.secret.chars().count())
	}
}

impl std::fmt::Debug for Credential {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("Credential")
			.field("source", &self.source.name())
			.field("secret", &self.masked())
			.finish()
	}
}

/// Resolves the effective credential through the layered source order.
///
/// Layers with a present-but-malformed value are skipped with a warning
/// rather than failing the whole chain, so a stale environment variable
/// cannot mask a valid settings entry below it — the order still wins
/// when multiple layers are valid.
pub fn resolve_credential(explicit: Option<&str>, settings: &dyn SettingsStore) -> Result<Credential> {
	let layers: [(CredentialSource, Option<String>); 3] = [
		(CredentialSource::Override, explicit.map(str::to_string)),
		(CredentialSource::Settings, settings.get(SETTING_API_CREDENTIAL)),
		(CredentialSource::Environment, std::env::var(ENV_API_CREDENTIAL).ok()),
	];

	for (source, value) in layers {
		let Some(value) = value else { continue };
		let trimmed = value.trim();
		if trimmed.is_empty() {
			continue;
		}
		if trimmed.len() < MIN_SECRET_LEN {
			warn!(
				target = "livelink.config",
				source = source.name(),
				"credential layer present but shorter than {MIN_SECRET_LEN} chars; skipping"
			);
			continue;
		}
		debug!(target = "livelink.config", source = source.name(), "credential resolved");
		return Ok(Credential {
			secret: trimmed.to_string(),
			source,
		});
	}

	Err(LiveError::Config(format!(
		"no valid credential found (consulted: override, settings[{SETTING_API_CREDENTIAL}], env[{ENV_API_CREDENTIAL}])"
	)))
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::config::InMemorySettings;

	#[test]
	fn override_wins_over_settings() {
		let settings = InMemorySettings::new();
		settings.set(SETTING_API_CREDENTIAL, "settings-secret");
		let credential = resolve_credential(Some("override-secret"), &settings).unwrap();
		assert_eq!(credential.source(), CredentialSource::Override);
		assert_eq!(credential.expose(), "override-secret");
	}

	#[test]
	fn settings_layer_used_when_no_override() {
		let settings = InMemorySettings::new();
		settings.set(SETTING_API_CREDENTIAL, "settings-secret");
		let credential = resolve_credential(None, &settings).unwrap();
		assert_eq!(credential.source(), CredentialSource::Settings);
	}

	#[test]
	fn short_override_falls_through() {
		let settings = InMemorySettings::new();
		settings.set(SETTING_API_CREDENTIAL, "long-enough-secret");
		let credential = resolve_credential(Some("tiny"), &settings).unwrap();
		assert_eq!(credential.source(), CredentialSource::Settings);
	}

	#[test]
	fn empty_chain_is_a_config_error() {
		let settings = InMemorySettings::new();
		let err = resolve_credential(None, &settings).unwrap_err();
		assert!(matches!(err, LiveError::Config(_)));
		assert!(err.to_string().contains(ENV_API_CREDENTIAL));
	}

	#[test]
	fn masked_form_never_contains_tail() {
		let settings = InMemorySettings::new();
		let credential = resolve_credential(Some("abcd1234efgh5678"), &settings).unwrap();
		let masked = credential.masked();
		assert!(masked.starts_with("abcd"));
		assert!(!masked.contains("5678"));
		let debug = format!("{credential:?}");
		assert!(!debug.contains("5678"));
	}
}
