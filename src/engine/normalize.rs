//! Path normalization into an unambiguous, long-path form.
//!
//! Windows-style paths become `\\?\C:\...` or `\\?\UNC\server\share\...`; components that the
//! Win32 API cannot address (empty, trailing space or period, reserved characters) are rejected.
//! POSIX paths become absolute, `.`/`..`-resolved, slash-collapsed strings. Both styles reject
//! paths that are not valid Unicode, since the canonical form is also the state-store key.

use std::fmt;
use std::path::Path;

use anyhow::{Context, Result};

const EXTENDED_PREFIX: &str = r"\\?\";
const EXTENDED_UNC: &str = r"\\?\UNC\";
const WINDOWS_ILLEGAL: &[char] = &['<', '>', '"', '|', '?', '*'];

/// Why a path could not be normalized.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Rejection {
    NotUnicode,
    EmptyComponent,
    TrailingSpaceOrPeriod(String),
    IllegalChar { component: String, ch: char },
    /// UNC path without both server and share.
    IncompleteUnc,
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Rejection::NotUnicode => write!(f, "path is not valid Unicode"),
            Rejection::EmptyComponent => write!(f, "path has an empty component"),
            Rejection::TrailingSpaceOrPeriod(c) => {
                write!(f, "component {c:?} ends with a space or period")
            }
            Rejection::IllegalChar { component, ch } => {
                write!(f, "component {component:?} contains illegal character {ch:?}")
            }
            Rejection::IncompleteUnc => write!(f, "UNC path needs a server and a share"),
        }
    }
}

impl std::error::Error for Rejection {}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PathStyle {
    Windows,
    Posix,
}

impl PathStyle {
    pub fn native() -> Self {
        if cfg!(windows) {
            PathStyle::Windows
        } else {
            PathStyle::Posix
        }
    }
}

/// Deterministic normalizer. Relative inputs are resolved against `base`, captured once.
#[derive(Clone, Debug)]
pub struct PathNormalizer {
    style: PathStyle,
    base: String,
}

impl PathNormalizer {
    /// Native style, relative paths resolved against the current directory.
    pub fn native() -> Result<Self> {
        let cwd = std::env::current_dir().context("read current directory")?;
        let base = cwd
            .to_str()
            .context("current directory is not valid Unicode")?
            .to_string();
        Ok(Self::with_base(PathStyle::native(), base))
    }

    pub fn with_base(style: PathStyle, base: impl Into<String>) -> Self {
        Self {
            style,
            base: base.into(),
        }
    }

    pub fn normalize(&self, raw: &Path) -> Result<String, Rejection> {
        let s = raw.to_str().ok_or(Rejection::NotUnicode)?;
        self.normalize_str(s)
    }

    pub fn normalize_str(&self, raw: &str) -> Result<String, Rejection> {
        match self.style {
            PathStyle::Windows => normalize_windows(raw, &self.base),
            PathStyle::Posix => Ok(normalize_posix(raw, &self.base)),
        }
    }
}

fn collapse_backslashes(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut prev_sep = false;
    for c in s.chars() {
        if c == '\\' {
            if !prev_sep {
                out.push(c);
            }
            prev_sep = true;
        } else {
            out.push(c);
            prev_sep = false;
        }
    }
    out
}

fn is_drive(component: &str) -> bool {
    let b = component.as_bytes();
    b.len() == 2 && b[0].is_ascii_alphabetic() && b[1] == b':'
}

fn is_drive_absolute(s: &str) -> bool {
    s.get(..2).is_some_and(is_drive) && s.as_bytes().get(2) == Some(&b'\\')
}

/// Drop `.` and resolve `..` lexically; the first `keep` components are never popped.
fn resolve_dots<'a>(parts: impl Iterator<Item = &'a str>, keep: usize) -> Vec<&'a str> {
    let mut out: Vec<&str> = Vec::new();
    for p in parts {
        match p {
            "." => {}
            ".." => {
                if out.len() > keep {
                    out.pop();
                }
            }
            _ => out.push(p),
        }
    }
    out
}

fn check_windows_components(parts: &[&str], drive_first: bool) -> Result<(), Rejection> {
    for (i, p) in parts.iter().enumerate() {
        if p.is_empty() {
            return Err(Rejection::EmptyComponent);
        }
        if drive_first && i == 0 && is_drive(p) {
            continue;
        }
        if p.ends_with(' ') || p.ends_with('.') {
            return Err(Rejection::TrailingSpaceOrPeriod(p.to_string()));
        }
        if let Some(ch) = p
            .chars()
            .find(|c| (*c as u32) < 0x20 || *c == ':' || WINDOWS_ILLEGAL.contains(c))
        {
            return Err(Rejection::IllegalChar {
                component: p.to_string(),
                ch,
            });
        }
    }
    Ok(())
}

fn join_local(parts: &[&str]) -> String {
    let mut joined = parts.join("\\");
    if parts.len() == 1 {
        // Bare drive: keep it a directory, not a device.
        joined.push('\\');
    }
    format!("{EXTENDED_PREFIX}{joined}")
}

fn normalize_windows(raw: &str, base: &str) -> Result<String, Rejection> {
    if let Some(rest) = raw.strip_prefix(EXTENDED_UNC) {
        let rest = collapse_backslashes(rest);
        let parts: Vec<&str> = rest.trim_end_matches('\\').split('\\').collect();
        if parts.len() < 2 {
            return Err(Rejection::IncompleteUnc);
        }
        check_windows_components(&parts, false)?;
        return Ok(format!("{EXTENDED_UNC}{}", parts.join("\\")));
    }
    if let Some(rest) = raw.strip_prefix(EXTENDED_PREFIX) {
        // Verbatim paths are taken literally: no `/` translation, no `.`/`..` resolution.
        let rest = collapse_backslashes(rest);
        let parts: Vec<&str> = rest.trim_end_matches('\\').split('\\').collect();
        check_windows_components(&parts, true)?;
        return Ok(join_local(&parts));
    }

    let raw = raw.replace('/', "\\");
    if let Some(rest) = raw.strip_prefix(r"\\") {
        let rest = collapse_backslashes(rest);
        let parts = resolve_dots(rest.trim_end_matches('\\').split('\\'), 2);
        if parts.len() < 2 {
            return Err(Rejection::IncompleteUnc);
        }
        check_windows_components(&parts, false)?;
        return Ok(format!("{EXTENDED_UNC}{}", parts.join("\\")));
    }

    let base = base.replace('/', "\\");
    let absolute = if is_drive_absolute(&raw) {
        raw
    } else if raw.starts_with('\\') {
        // Rooted on the base's drive.
        format!("{}{}", base.get(..2).unwrap_or_default(), raw)
    } else {
        format!("{}\\{}", base.trim_end_matches('\\'), raw)
    };
    let absolute = collapse_backslashes(&absolute);
    let parts = resolve_dots(absolute.trim_end_matches('\\').split('\\'), 1);
    check_windows_components(&parts, true)?;
    Ok(join_local(&parts))
}

fn normalize_posix(raw: &str, base: &str) -> String {
    let absolute = if raw.starts_with('/') {
        raw.to_string()
    } else {
        format!("{}/{}", base.trim_end_matches('/'), raw)
    };
    let parts = resolve_dots(absolute.split('/').filter(|p| !p.is_empty()), 0);
    format!("/{}", parts.join("/"))
}
