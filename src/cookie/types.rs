use crate::error::StoreError;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::SystemTime;

/// The `SameSite` cookie attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SameSite {
    Strict,
    Lax,
    None,
}

impl fmt::Display for SameSite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SameSite::Strict => "Strict",
            SameSite::Lax => "Lax",
            SameSite::None => "None",
        };
        f.write_str(name)
    }
}

impl FromStr for SameSite {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "strict" => Ok(SameSite::Strict),
            "lax" => Ok(SameSite::Lax),
            "none" => Ok(SameSite::None),
            other => Err(StoreError::InvalidCookie(format!("unknown SameSite value '{other}'"))),
        }
    }
}

/// A cookie as reported by a [`CookieMechanism`](super::CookieMechanism).
///
/// Mechanisms that read from a `document.cookie`-style string only see the
/// name and value; the remaining attributes are `None`/`false` there.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Cookie {
    pub name: String,
    pub value: String,
    pub domain: Option<String>,
    pub path: Option<String>,
    pub expires: Option<SystemTime>,
    pub same_site: Option<SameSite>,
    pub secure: bool,
    pub partitioned: bool,
}

impl Cookie {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            ..Default::default()
        }
    }
}

/// Everything needed to write a cookie.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CookieInit {
    pub name: String,
    pub value: String,
    pub expires: Option<SystemTime>,
    pub path: Option<String>,
    pub domain: Option<String>,
    pub same_site: Option<SameSite>,
    pub partitioned: bool,
}

/// Cookie write arguments without the name, which the store supplies.
///
/// # Examples
///
/// ```
/// use keysync::cookie::{CookieAttributes, SameSite};
///
/// let attrs = CookieAttributes::new("dark").path("/").same_site(SameSite::Lax);
/// let init = attrs.into_init("theme");
/// assert_eq!(init.name, "theme");
/// assert_eq!(init.path.as_deref(), Some("/"));
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CookieAttributes {
    pub value: String,
    pub expires: Option<SystemTime>,
    pub path: Option<String>,
    pub domain: Option<String>,
    pub same_site: Option<SameSite>,
    pub partitioned: bool,
}

impl CookieAttributes {
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            ..Default::default()
        }
    }

    pub fn expires(mut self, at: SystemTime) -> Self {
        self.expires = Some(at);
        self
    }

    pub fn path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    pub fn domain(mut self, domain: impl Into<String>) -> Self {
        self.domain = Some(domain.into());
        self
    }

    pub fn same_site(mut self, same_site: SameSite) -> Self {
        self.same_site = Some(same_site);
        self
    }

    pub fn partitioned(mut self, partitioned: bool) -> Self {
        self.partitioned = partitioned;
        self
    }

    pub fn into_init(self, name: impl Into<String>) -> CookieInit {
        CookieInit {
            name: name.into(),
            value: self.value,
            expires: self.expires,
            path: self.path,
            domain: self.domain,
            same_site: self.same_site,
            partitioned: self.partitioned,
        }
    }
}

/// Arguments for removing a cookie. Path and domain must match the write.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CookieDeleteOptions {
    pub name: String,
    pub path: Option<String>,
    pub domain: Option<String>,
    pub partitioned: bool,
}

/// Cookie delete arguments without the name.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CookieDeleteAttributes {
    pub path: Option<String>,
    pub domain: Option<String>,
    pub partitioned: bool,
}

impl CookieDeleteAttributes {
    pub fn path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    pub fn domain(mut self, domain: impl Into<String>) -> Self {
        self.domain = Some(domain.into());
        self
    }

    pub fn into_options(self, name: impl Into<String>) -> CookieDeleteOptions {
        CookieDeleteOptions {
            name: name.into(),
            path: self.path,
            domain: self.domain,
            partitioned: self.partitioned,
        }
    }
}

/// A batch of cookie mutations reported by a mechanism.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CookieChangeEvent {
    pub changed: Vec<Cookie>,
    pub deleted: Vec<Cookie>,
}

impl CookieChangeEvent {
    pub fn is_empty(&self) -> bool {
        self.changed.is_empty() && self.deleted.is_empty()
    }
}

/// Listener registered for [`CookieChangeEvent`]s.
pub type CookieChangeListener = Arc<dyn Fn(&CookieChangeEvent) + Send + Sync>;
