//! Entry point for the relaywatch monitor. Parses args, resolves the feed config and runs the TUI or log mode.

mod app;
mod history;
mod logging;
mod logmode;
mod profiles;
mod settings;
mod ui;

use anyhow::{Context, Result};
use app::App;
use logging::{init_logging, log_file_path, LogTarget};
use profiles::{load_profiles, save_profiles, ProfileEntry, ProfileRequest, ResolveProfile};
use relayfeed::FeedConfig;
use std::env;
use std::io::{self, Write};
use std::path::PathBuf;

const USAGE_ARGS: &str = "[--tls-ca CERT_PEM|-t CERT_PEM] [--profile NAME|-P NAME] [--save] [--password PW|-p PW] [--interval MS|-i MS] [--config FILE|-c FILE] [--log] [--dry-run] [URL]";

#[derive(Debug, Default)]
struct ParsedArgs {
    url: Option<String>,
    tls_ca: Option<String>,
    profile: Option<String>,
    save: bool,
    password: Option<String>,
    interval_ms: Option<u64>,
    config: Option<String>,
    log: bool,
    dry_run: bool,
}

fn parse_args<I: IntoIterator<Item = String>>(args: I) -> Result<ParsedArgs, String> {
    let mut it = args.into_iter();
    let prog = it.next().unwrap_or_else(|| "relaywatch".into());
    let usage = format!("Usage: {prog} {USAGE_ARGS}");
    let mut parsed = ParsedArgs::default();

    while let Some(arg) = it.next() {
        // --flag=value is accepted for every flag that takes a value
        let (flag, inline) = match arg.split_once('=') {
            Some((f, v)) if f.starts_with("--") => (f.to_string(), Some(v.to_string())),
            _ => (arg.clone(), None),
        };
        let mut value = |name: &str| -> Result<String, String> {
            inline
                .clone()
                .or_else(|| it.next())
                .filter(|v| !v.is_empty())
                .ok_or_else(|| format!("{name} needs a value. {usage}"))
        };
        match flag.as_str() {
            "-h" | "--help" => return Err(usage.clone()),
            "--tls-ca" | "-t" => parsed.tls_ca = Some(value("--tls-ca")?),
            "--profile" | "-P" => parsed.profile = Some(value("--profile")?),
            "--password" | "-p" => parsed.password = Some(value("--password")?),
            "--config" | "-c" => parsed.config = Some(value("--config")?),
            "--interval" | "-i" => {
                let raw = value("--interval")?;
                let ms = raw
                    .parse::<u64>()
                    .ok()
                    .filter(|ms| *ms > 0)
                    .ok_or_else(|| format!("invalid --interval '{raw}'. {usage}"))?;
                parsed.interval_ms = Some(ms);
            }
            "--save" => parsed.save = true,
            "--log" => parsed.log = true,
            "--dry-run" => parsed.dry_run = true,
            _ if flag.starts_with('-') && flag.len() > 1 => {
                return Err(format!("Unknown option '{flag}'. {usage}"))
            }
            _ => {
                if parsed.url.is_none() {
                    parsed.url = Some(arg);
                } else {
                    return Err(format!("Unexpected argument. {usage}"));
                }
            }
        }
    }
    Ok(parsed)
}

#[tokio::main]
async fn main() -> Result<()> {
    let parsed = match parse_args(env::args()) {
        Ok(v) => v,
        Err(msg) => {
            eprintln!("{msg}");
            return Ok(());
        }
    };

    let headless = parsed.log || parsed.dry_run;
    init_logging(if headless {
        LogTarget::Stderr
    } else {
        LogTarget::File(log_file_path())
    })?;

    let Some(config) = resolve_config(&parsed)? else {
        return Ok(());
    };

    if parsed.dry_run {
        println!("{} {}", config.mode.as_str(), config.endpoint);
        return Ok(());
    }
    if parsed.log {
        return logmode::run(config).await;
    }
    let mut app = App::new(&config.endpoint);
    app.run(config).await
}

/// Profile/URL resolution (with persistence), then file, env and flag layers.
/// `None` means the user aborted or there was nothing to connect to.
fn resolve_config(parsed: &ParsedArgs) -> Result<Option<FeedConfig>> {
    let base = match parsed.config.as_deref() {
        Some(path) => settings::load_file(path.as_ref())?,
        None => FeedConfig::default(),
    };

    let entry = if parsed.config.is_some() && parsed.url.is_none() && parsed.profile.is_none() {
        None
    } else {
        match resolve_profile(parsed)? {
            Some(entry) => Some(entry),
            None => return Ok(None),
        }
    };

    let mut config = match &entry {
        Some(e) => settings::with_url(base, &e.url)?,
        None => base,
    };
    if let Some(e) = entry {
        if let Some(ca) = e.tls_ca {
            config.tls_ca = Some(PathBuf::from(ca));
        }
        if e.password.is_some() {
            config.password = e.password;
        }
    }
    settings::apply_env_overrides(&mut config);
    if let Some(pw) = parsed.password.clone() {
        config.password = Some(pw);
    }
    if let Some(ms) = parsed.interval_ms {
        config.poll_interval_ms = ms;
    }
    config.validate().context("invalid feed configuration")?;
    Ok(Some(config))
}

fn resolve_profile(parsed: &ParsedArgs) -> Result<Option<ProfileEntry>> {
    let profiles_file = load_profiles();
    let req = ProfileRequest {
        profile_name: parsed.profile.clone(),
        url: parsed.url.clone(),
        tls_ca: parsed.tls_ca.clone(),
        password: parsed.password.clone(),
    };
    let mut profiles_mut = profiles_file.clone();

    let entry = match req.resolve(&profiles_file) {
        ResolveProfile::Direct(entry) => {
            // Possibly save if profile specified and --save or new entry
            if let Some(name) = parsed.profile.as_ref() {
                match profiles_mut.profiles.get(name) {
                    None => {
                        // New profile: auto-save immediately
                        profiles_mut.profiles.insert(name.clone(), entry.clone());
                        persist(&profiles_mut);
                    }
                    Some(existing) if *existing != entry => {
                        let overwrite = parsed.save
                            || prompt_yes_no(&format!("Overwrite existing profile '{name}'? [y/N]: "));
                        if overwrite {
                            profiles_mut.profiles.insert(name.clone(), entry.clone());
                            persist(&profiles_mut);
                        }
                    }
                    Some(_) => {}
                }
            }
            entry
        }
        ResolveProfile::Loaded(entry) => entry,
        ResolveProfile::PromptSelect(names) => {
            eprintln!("Select profile:");
            for (i, n) in names.iter().enumerate() {
                eprintln!("  {}. {}", i + 1, n);
            }
            let line = prompt_string("Enter number (or blank to abort): ")?;
            let picked = line
                .trim()
                .parse::<usize>()
                .ok()
                .and_then(|idx| idx.checked_sub(1))
                .and_then(|idx| names.get(idx))
                .and_then(|name| profiles_mut.profiles.get(name));
            match picked {
                Some(entry) => entry.clone(),
                None => return Ok(None),
            }
        }
        ResolveProfile::PromptCreate(name) => {
            eprintln!("Profile '{name}' does not exist yet.");
            let url = prompt_string("Enter URL (http://HOST:PORT, ws://HOST:PORT/ws or wss://...): ")?;
            if url.trim().is_empty() {
                return Ok(None);
            }
            let ca = prompt_string("Enter TLS CA path (or leave blank): ")?;
            let pw = prompt_string("Enter password (or leave blank): ")?;
            let entry = ProfileEntry {
                url: url.trim().to_string(),
                tls_ca: Some(ca.trim().to_string()).filter(|s| !s.is_empty()),
                password: Some(pw.trim().to_string()).filter(|s| !s.is_empty()),
            };
            profiles_mut.profiles.insert(name, entry.clone());
            persist(&profiles_mut);
            entry
        }
        ResolveProfile::None => {
            eprintln!("No URL provided and no profiles to select.");
            return Ok(None);
        }
    };
    Ok(Some(entry))
}

fn persist(pf: &profiles::ProfilesFile) {
    if let Err(e) = save_profiles(pf) {
        eprintln!("warning: could not save profiles: {e}");
    }
}

fn prompt_yes_no(prompt: &str) -> bool {
    eprint!("{prompt}");
    let _ = io::stderr().flush();
    let mut line = String::new();
    if io::stdin().read_line(&mut line).is_ok() {
        matches!(line.trim().to_ascii_lowercase().as_str(), "y" | "yes")
    } else {
        false
    }
}

fn prompt_string(prompt: &str) -> io::Result<String> {
    eprint!("{prompt}");
    let _ = io::stderr().flush();
    let mut line = String::new();
    io::stdin().read_line(&mut line)?;
    Ok(line)
}
