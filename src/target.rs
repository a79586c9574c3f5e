use reqwest::Url;

use crate::errors::Error;

/// Where a call goes: an absolute URL used as-is, or a path joined onto the
/// service base address when the call is made.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ServiceTarget {
    Absolute(String),
    Relative { base: String, path: String },
}

impl ServiceTarget {
    pub fn new(base: &str, path: &str) -> Self {
        if is_valid_schemed_url(path) {
            ServiceTarget::Absolute(path.to_string())
        } else {
            ServiceTarget::Relative {
                base: base.to_string(),
                path: path.to_string(),
            }
        }
    }

    pub fn as_url_string(&self) -> Result<String, Error> {
        let candidate = match self {
            ServiceTarget::Absolute(url) => return Ok(url.clone()),
            ServiceTarget::Relative { base, path } => format!("{base}{path}"),
        };
        Url::parse(&candidate).map_err(|_| Error::MalformedTarget(candidate.clone()))?;
        Ok(candidate)
    }
}

fn is_valid_schemed_url(candidate: &str) -> bool {
    Url::parse(candidate).is_ok_and(|url| url.has_host())
}

/// Resolves `path` against `base`. Absolute paths pass through unchanged.
pub fn resolve(base: &str, path: &str) -> Result<String, Error> {
    ServiceTarget::new(base, path).as_url_string()
}
