use anyhow::{Context, Result, bail};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::client::ClientConfig;

pub(crate) const DEFAULT_URL: &str = "https://openet-api.org";
pub(crate) const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Debug, Default)]
struct RcConfig {
    url: Option<String>,
    key: Option<String>,
    verify: Option<bool>,
    timeout: Option<Duration>,
}

pub(crate) fn load_config(
    url: Option<String>,
    key: Option<String>,
    verify: Option<bool>,
) -> Result<ClientConfig> {
    let env = |name: &str| std::env::var(name).ok();
    let candidates = rc_candidates(&env);
    resolve(url, key, verify, &env, &candidates)
}

fn resolve(
    url: Option<String>,
    key: Option<String>,
    verify: Option<bool>,
    env: &dyn Fn(&str) -> Option<String>,
    rc_candidates: &[PathBuf],
) -> Result<ClientConfig> {
    let mut url = url.or_else(|| env("OPENET_API_URL"));
    let mut key = key.or_else(|| env("OPENET_API_KEY"));
    let env_verify = match env("OPENET_VERIFY") {
        Some(v) => Some(parse_verify(&v).with_context(|| format!("invalid OPENET_VERIFY value `{}`", v))?),
        None => None,
    };
    let mut verify = verify.or(env_verify);
    let mut timeout: Option<Duration> = None;

    for rc_path in rc_candidates {
        if rc_path.exists() {
            let cfg = read_rc(rc_path).with_context(|| {
                format!("failed to read configuration file {}", rc_path.display())
            })?;

            if url.is_none() {
                url = cfg.url;
            }
            if key.is_none() {
                key = cfg.key;
            }
            if verify.is_none() {
                verify = cfg.verify;
            }
            timeout = cfg.timeout;
            break;
        }
    }

    let key = match key.filter(|k| !k.trim().is_empty()) {
        Some(v) => v.trim().to_string(),
        None => {
            if !rc_candidates.is_empty() {
                bail!(
                    "Missing configuration: key (set OPENET_API_KEY or put `key:` in one of: {})",
                    rc_candidates
                        .iter()
                        .map(|p| p.display().to_string())
                        .collect::<Vec<_>>()
                        .join(", ")
                );
            }
            bail!("Missing configuration: key (set OPENET_API_KEY or create .openetrc)");
        }
    };

    Ok(ClientConfig {
        url: url.unwrap_or_else(|| DEFAULT_URL.to_string()),
        key,
        verify: verify.unwrap_or(true),
        timeout: timeout.unwrap_or(DEFAULT_TIMEOUT),
    })
}

fn parse_verify(v: &str) -> Result<bool> {
    match v.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => bail!("expected 0/1 or true/false"),
    }
}

fn read_rc(path: &Path) -> Result<RcConfig> {
    let text = std::fs::read_to_string(path)?;
    let mut cfg = RcConfig::default();

    // `key:` may be on one line with the token on the next.
    let mut pending_key: Option<&str> = None;

    for raw in text.lines() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        if let Some(pk) = pending_key.take() {
            if !line.contains(':') || line.contains("://") {
                apply(&mut cfg, pk, strip_quotes(line))?;
                continue;
            }
        }

        if let Some((k, v)) = line.split_once(':') {
            let k = k.trim();
            let v = strip_quotes(v.trim());
            if v.is_empty() {
                pending_key = Some(k);
            } else {
                apply(&mut cfg, k, v)?;
            }
        }
    }

    Ok(cfg)
}

fn apply(cfg: &mut RcConfig, key: &str, value: &str) -> Result<()> {
    match key {
        "url" => cfg.url = Some(value.to_string()),
        "key" => cfg.key = Some(value.to_string()),
        "verify" => cfg.verify = Some(parse_verify(value).context("invalid `verify`")?),
        "timeout" => {
            let secs: u64 = value
                .parse()
                .with_context(|| format!("invalid `timeout` `{}` (expected seconds)", value))?;
            if secs == 0 {
                bail!("invalid `timeout` `0` (must be at least one second)");
            }
            cfg.timeout = Some(Duration::from_secs(secs));
        }
        _ => {}
    }
    Ok(())
}

fn strip_quotes(s: &str) -> &str {
    let s = s.trim();
    if (s.starts_with('"') && s.ends_with('"') && s.len() >= 2)
        || (s.starts_with('\'') && s.ends_with('\'') && s.len() >= 2)
    {
        &s[1..s.len() - 1]
    } else {
        s
    }
}

fn rc_candidates(env: &dyn Fn(&str) -> Option<String>) -> Vec<PathBuf> {
    // 1) OPENET_RC (explicit)
    // 2) ./.openetrc
    // 3) ~/.openetrc
    if let Some(p) = env("OPENET_RC") {
        return vec![PathBuf::from(p)];
    }

    let mut v = Vec::new();
    if let Ok(cwd) = std::env::current_dir() {
        v.push(cwd.join(".openetrc"));
    }
    if let Some(home) = dirs::home_dir() {
        v.push(home.join(".openetrc"));
    }
    v
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    fn env_of(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name: &str| map.get(name).cloned()
    }

    fn rc_file(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn explicit_arguments_win() {
        let env = env_of(&[("OPENET_API_KEY", "from-env"), ("OPENET_API_URL", "https://env.example")]);
        let cfg = resolve(
            Some("https://arg.example".into()),
            Some("from-arg".into()),
            Some(false),
            &env,
            &[],
        )
        .unwrap();
        assert_eq!(cfg.url, "https://arg.example");
        assert_eq!(cfg.key, "from-arg");
        assert!(!cfg.verify);
    }

    #[test]
    fn env_then_defaults() {
        let env = env_of(&[("OPENET_API_KEY", "from-env")]);
        let cfg = resolve(None, None, None, &env, &[]).unwrap();
        assert_eq!(cfg.url, DEFAULT_URL);
        assert_eq!(cfg.key, "from-env");
        assert!(cfg.verify);
        assert_eq!(cfg.timeout, DEFAULT_TIMEOUT);
    }

    #[test]
    fn verification_is_opt_out_only_explicitly() {
        let env = env_of(&[("OPENET_API_KEY", "k"), ("OPENET_VERIFY", "0")]);
        assert!(!resolve(None, None, None, &env, &[]).unwrap().verify);

        let env = env_of(&[("OPENET_API_KEY", "k"), ("OPENET_VERIFY", "maybe")]);
        assert!(resolve(None, None, None, &env, &[]).is_err());
    }

    #[test]
    fn rc_file_fills_gaps() {
        let rc = rc_file(
            "# OpenET\nurl: https://rc.example\nkey:\n  'token-on-next-line'\nverify: 0\ntimeout: 15\n",
        );
        let env = env_of(&[]);
        let cfg = resolve(None, None, None, &env, &[rc.path().to_path_buf()]).unwrap();
        assert_eq!(cfg.url, "https://rc.example");
        assert_eq!(cfg.key, "token-on-next-line");
        assert!(!cfg.verify);
        assert_eq!(cfg.timeout, Duration::from_secs(15));
    }

    #[test]
    fn zero_timeout_is_rejected() {
        let rc = rc_file("key: k\ntimeout: 0\n");
        let env = env_of(&[]);
        let err = resolve(None, None, None, &env, &[rc.path().to_path_buf()]).unwrap_err();
        assert!(format!("{:#}", err).contains("at least one second"));
    }

    #[test]
    fn env_key_beats_rc_key() {
        let rc = rc_file("key: rc-key\n");
        let env = env_of(&[("OPENET_API_KEY", "env-key")]);
        let cfg = resolve(None, None, None, &env, &[rc.path().to_path_buf()]).unwrap();
        assert_eq!(cfg.key, "env-key");
    }

    #[test]
    fn missing_key_names_search_paths() {
        let env = env_of(&[]);
        let err = resolve(None, None, None, &env, &[PathBuf::from("/nonexistent/.openetrc")])
            .unwrap_err()
            .to_string();
        assert!(err.contains("OPENET_API_KEY"));
        assert!(err.contains("/nonexistent/.openetrc"));
    }

    #[test]
    fn rc_candidates_honor_override() {
        let env = env_of(&[("OPENET_RC", "/tmp/custom-rc")]);
        assert_eq!(rc_candidates(&env), vec![PathBuf::from("/tmp/custom-rc")]);
    }
}
