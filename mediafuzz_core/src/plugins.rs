use serde::Deserialize;

/// Plugins the type-detection harness needs.
pub const TYPEFIND_PLUGINS: &[&str] = &["coreelements", "typefindfunctions", "app"];

/// Plugins the discovery harness needs: playback helpers plus one container
/// format and its codecs.
pub const DISCOVERER_PLUGINS: &[&str] = &[
    "coreelements",
    "playback",
    "typefindfunctions",
    "app",
    "ogg",
    "theora",
    "vorbis",
];

/// Where plugin code comes from.
#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum Registration {
    /// Linked into the binary; the harness registers each plugin itself.
    Static,
    /// Already known to the framework's registry (local builds).
    Registry,
}

impl Registration {
    /// Registration selected by the `static-plugins` feature.
    pub const fn from_build() -> Self {
        if cfg!(feature = "static-plugins") {
            Registration::Static
        } else {
            Registration::Registry
        }
    }
}

impl Default for Registration {
    fn default() -> Self {
        Self::from_build()
    }
}

/// Resolves a configured plugin list, falling back to `fixed` when the
/// configuration leaves it empty.
pub fn resolve<'a>(configured: Option<&'a [String]>, fixed: &'a [&'a str]) -> Vec<&'a str> {
    match configured {
        Some(names) if !names.is_empty() => names.iter().map(String::as_str).collect(),
        _ => fixed.to_vec(),
    }
}
