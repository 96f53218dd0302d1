//! Connection profiles: load/save simple JSON mapping of profile name -> { url, tls_ca, password }
//! Stored under XDG config dir: $XDG_CONFIG_HOME/relaywatch/profiles.json (fallback ~/.config/relaywatch/profiles.json)

use serde::{Deserialize, Serialize};
use std::{collections::BTreeMap, fs, io, path::PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct ProfileEntry {
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tls_ca: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ProfilesFile {
    #[serde(default)]
    pub profiles: BTreeMap<String, ProfileEntry>,
    #[serde(default)]
    pub version: u32,
}

pub fn config_dir() -> PathBuf {
    if let Some(xdg) = std::env::var_os("XDG_CONFIG_HOME") {
        PathBuf::from(xdg).join("relaywatch")
    } else {
        dirs_next::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("relaywatch")
    }
}

pub fn profiles_path() -> PathBuf {
    config_dir().join("profiles.json")
}

pub fn load_profiles() -> ProfilesFile {
    let path = profiles_path();
    match fs::read_to_string(&path) {
        Ok(s) => serde_json::from_str(&s).unwrap_or_else(|e| {
            tracing::warn!(path = %path.display(), error = %e, "ignoring unreadable profiles file");
            ProfilesFile::default()
        }),
        Err(_) => ProfilesFile::default(),
    }
}

pub fn save_profiles(p: &ProfilesFile) -> io::Result<()> {
    let path = profiles_path();
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let data = serde_json::to_vec_pretty(p).map_err(io::Error::other)?;
    fs::write(path, data)
}

pub enum ResolveProfile {
    /// Use the provided runtime inputs (maybe persisted by the caller).
    Direct(ProfileEntry),
    /// Loaded from an existing profile entry.
    Loaded(ProfileEntry),
    /// Should prompt user to select among profile names
    PromptSelect(Vec<String>),
    /// Should prompt user to create a new profile (name)
    PromptCreate(String),
    /// No profile could be resolved (e.g., missing arguments)
    None,
}

pub struct ProfileRequest {
    pub profile_name: Option<String>,
    pub url: Option<String>,
    pub tls_ca: Option<String>,
    pub password: Option<String>,
}

impl ProfileRequest {
    pub fn resolve(self, pf: &ProfilesFile) -> ResolveProfile {
        match (self.url, self.profile_name) {
            // Only a profile name -> load it, overlaying any flags given alongside
            (None, Some(name)) => match pf.profiles.get(&name) {
                Some(entry) => ResolveProfile::Loaded(ProfileEntry {
                    url: entry.url.clone(),
                    tls_ca: self.tls_ca.or_else(|| entry.tls_ca.clone()),
                    password: self.password.or_else(|| entry.password.clone()),
                }),
                None => ResolveProfile::PromptCreate(name),
            },
            (Some(url), _) => ResolveProfile::Direct(ProfileEntry {
                url,
                tls_ca: self.tls_ca,
                password: self.password,
            }),
            (None, None) if pf.profiles.is_empty() => ResolveProfile::None,
            (None, None) => ResolveProfile::PromptSelect(pf.profiles.keys().cloned().collect()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn file_with(name: &str, url: &str) -> ProfilesFile {
        let mut pf = ProfilesFile::default();
        pf.profiles.insert(
            name.into(),
            ProfileEntry {
                url: url.into(),
                tls_ca: None,
                password: Some("secret".into()),
            },
        );
        pf
    }

    #[test]
    fn name_only_loads_entry_with_flag_overlay() {
        let pf = file_with("prod", "http://relay:2333");
        let req = ProfileRequest {
            profile_name: Some("prod".into()),
            url: None,
            tls_ca: Some("/tmp/ca.pem".into()),
            password: None,
        };
        match req.resolve(&pf) {
            ResolveProfile::Loaded(e) => {
                assert_eq!(e.url, "http://relay:2333");
                assert_eq!(e.tls_ca.as_deref(), Some("/tmp/ca.pem"));
                assert_eq!(e.password.as_deref(), Some("secret"));
            }
            _ => panic!("expected Loaded"),
        }
    }

    #[test]
    fn unknown_name_prompts_and_empty_file_resolves_none() {
        let pf = ProfilesFile::default();
        let req = ProfileRequest {
            profile_name: Some("new".into()),
            url: None,
            tls_ca: None,
            password: None,
        };
        assert!(matches!(req.resolve(&pf), ResolveProfile::PromptCreate(n) if n == "new"));
        let req = ProfileRequest {
            profile_name: None,
            url: None,
            tls_ca: None,
            password: None,
        };
        assert!(matches!(req.resolve(&pf), ResolveProfile::None));
        let req = ProfileRequest {
            profile_name: None,
            url: None,
            tls_ca: None,
            password: None,
        };
        assert!(matches!(
            req.resolve(&file_with("a", "ws://x/ws")),
            ResolveProfile::PromptSelect(names) if names == vec!["a".to_string()]
        ));
    }

    #[test]
    fn password_is_omitted_from_json_when_absent() {
        let entry = ProfileEntry {
            url: "ws://h/ws".into(),
            tls_ca: None,
            password: None,
        };
        let js = serde_json::to_string(&entry).unwrap();
        assert_eq!(js, r#"{"url":"ws://h/ws"}"#);
    }
}
