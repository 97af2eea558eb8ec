//! Declarative route table.
//!
//! Responsibility:
//! - bind `method + path pattern` to an auth requirement and a backend
//! - first match wins, in declaration order (no specificity ranking)
//! - reject rules that can never match because an earlier rule covers them
//!
//! Pattern syntax:
//! - `literal` segments match exactly
//! - `:name` binds one non-empty segment
//! - a trailing `*` matches the prefix itself and anything below it

use std::fmt;

use axum::http::Method;
use thiserror::Error;
use url::Url;

use crate::services::auth::policy::AuthRequirement;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RouteTableError {
    #[error("invalid route pattern `{pattern}`: {reason}")]
    InvalidPattern {
        pattern: String,
        reason: &'static str,
    },
    #[error("route `{later}` is unreachable: shadowed by earlier route `{earlier}`")]
    ShadowedRule { earlier: String, later: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MethodPattern {
    Any,
    Only(Method),
}

impl MethodPattern {
    fn matches(&self, method: &Method) -> bool {
        match self {
            Self::Any => true,
            Self::Only(m) => m == method,
        }
    }

    fn covers(&self, other: &MethodPattern) -> bool {
        match (self, other) {
            (Self::Any, _) => true,
            (Self::Only(a), Self::Only(b)) => a == b,
            (Self::Only(_), Self::Any) => false,
        }
    }
}

impl fmt::Display for MethodPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Any => f.write_str("*"),
            Self::Only(m) => f.write_str(m.as_str()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Param(String),
    Rest,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathPattern {
    raw: String,
    segments: Vec<Segment>,
}

impl PathPattern {
    pub fn parse(raw: &str) -> Result<Self, RouteTableError> {
        let invalid = |reason| RouteTableError::InvalidPattern {
            pattern: raw.to_string(),
            reason,
        };

        let rest = raw.strip_prefix('/').ok_or_else(|| invalid("must start with '/'"))?;

        let mut segments = Vec::new();
        if !rest.is_empty() {
            let parts: Vec<&str> = rest.split('/').collect();
            for (i, part) in parts.iter().enumerate() {
                let segment = match *part {
                    "" => return Err(invalid("empty segment")),
                    "*" if i + 1 == parts.len() => Segment::Rest,
                    "*" => return Err(invalid("'*' is only allowed as the last segment")),
                    p if p.starts_with(':') => {
                        let name = &p[1..];
                        if name.is_empty() {
                            return Err(invalid("parameter without a name"));
                        }
                        if segments
                            .iter()
                            .any(|s| matches!(s, Segment::Param(n) if n == name))
                        {
                            return Err(invalid("duplicate parameter name"));
                        }
                        Segment::Param(name.to_string())
                    }
                    p => Segment::Literal(p.to_string()),
                };
                segments.push(segment);
            }
        }

        Ok(Self {
            raw: raw.to_string(),
            segments,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    fn matches(&self, path: &str) -> Option<PathParams> {
        let path = path.strip_prefix('/')?;
        let path = path.strip_suffix('/').unwrap_or(path);
        let parts: Vec<&str> = if path.is_empty() {
            Vec::new()
        } else {
            path.split('/').collect()
        };

        let mut params = PathParams::default();
        for (i, segment) in self.segments.iter().enumerate() {
            match segment {
                Segment::Rest => return Some(params),
                Segment::Literal(lit) => {
                    if parts.get(i) != Some(&lit.as_str()) {
                        return None;
                    }
                }
                Segment::Param(name) => match parts.get(i) {
                    Some(value) if !value.is_empty() => params.push(name, value),
                    _ => return None,
                },
            }
        }

        (parts.len() == self.segments.len()).then_some(params)
    }

    /// True when every path matched by `other` is also matched by `self`.
    fn covers(&self, other: &PathPattern) -> bool {
        for (i, segment) in self.segments.iter().enumerate() {
            let theirs = match other.segments.get(i) {
                Some(s) => s,
                None => return matches!(segment, Segment::Rest),
            };
            match (segment, theirs) {
                (Segment::Rest, _) => return true,
                (_, Segment::Rest) => return false,
                (Segment::Literal(a), Segment::Literal(b)) if a == b => {}
                (Segment::Literal(_), _) => return false,
                (Segment::Param(_), _) => {}
            }
        }
        self.segments.len() == other.segments.len()
    }
}

/// Positional parameters bound by a match, in pattern order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PathParams(Vec<(String, String)>);

impl PathParams {
    fn push(&mut self, name: &str, value: &str) {
        self.0.push((name.to_string(), value.to_string()));
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// A downstream service the gateway forwards to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendTarget {
    pub name: String,
    pub base_url: Url,
}

impl BackendTarget {
    pub fn new(name: impl Into<String>, base_url: Url) -> Self {
        Self {
            name: name.into(),
            base_url,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathRewrite {
    StripPrefix(String),
    ReplacePrefix { from: String, to: String },
}

impl PathRewrite {
    pub fn apply(&self, path: &str) -> String {
        // only whole segments: "/svc" strips "/svc/x" but not "/svcx"
        let strip = |prefix: &str| {
            path.strip_prefix(prefix)
                .filter(|rest| rest.is_empty() || rest.starts_with('/'))
        };
        let rewritten = match self {
            Self::StripPrefix(prefix) => strip(prefix).map(str::to_string),
            Self::ReplacePrefix { from, to } => strip(from).map(|rest| format!("{to}{rest}")),
        };

        match rewritten {
            Some(p) if p.starts_with('/') => p,
            Some(p) => format!("/{p}"),
            None => path.to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct RouteRule {
    pub method: MethodPattern,
    pub path: PathPattern,
    pub requirement: AuthRequirement,
    pub backend: BackendTarget,
    pub rewrite: Option<PathRewrite>,
}

impl RouteRule {
    pub fn new(
        method: MethodPattern,
        pattern: &str,
        requirement: AuthRequirement,
        backend: &BackendTarget,
    ) -> Result<Self, RouteTableError> {
        Ok(Self {
            method,
            path: PathPattern::parse(pattern)?,
            requirement,
            backend: backend.clone(),
            rewrite: None,
        })
    }

    pub fn with_rewrite(mut self, rewrite: PathRewrite) -> Self {
        self.rewrite = Some(rewrite);
        self
    }

    /// Path sent to the backend.
    pub fn upstream_path(&self, path: &str) -> String {
        match &self.rewrite {
            Some(rewrite) => rewrite.apply(path),
            None => path.to_string(),
        }
    }

    fn shadows(&self, later: &RouteRule) -> bool {
        self.method.covers(&later.method) && self.path.covers(&later.path)
    }
}

impl fmt::Display for RouteRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.method, self.path.as_str())
    }
}

#[derive(Debug)]
pub struct RouteMatch<'a> {
    pub rule: &'a RouteRule,
    pub params: PathParams,
}

/// Built once at startup, read-only afterwards.
#[derive(Debug, Clone)]
pub struct RouteTable {
    rules: Vec<RouteRule>,
}

impl RouteTable {
    pub fn new(rules: Vec<RouteRule>) -> Result<Self, RouteTableError> {
        for (j, later) in rules.iter().enumerate() {
            if let Some(earlier) = rules[..j].iter().find(|earlier| earlier.shadows(later)) {
                return Err(RouteTableError::ShadowedRule {
                    earlier: earlier.to_string(),
                    later: later.to_string(),
                });
            }
        }
        Ok(Self { rules })
    }

    pub fn match_route(&self, method: &Method, path: &str) -> Option<RouteMatch<'_>> {
        self.rules.iter().find_map(|rule| {
            if !rule.method.matches(method) {
                return None;
            }
            rule.path
                .matches(path)
                .map(|params| RouteMatch { rule, params })
        })
    }

    pub fn describe(&self) -> Vec<String> {
        self.rules.iter().map(ToString::to_string).collect()
    }
}

/// False when `path` would be rewritten by URL parsing before it reaches a backend:
/// a `.` or `..` segment (raw or `%2e`-encoded, any case) or a backslash separator.
/// Such paths must never be matched, since the rule would not describe the
/// upstream path actually requested.
pub fn is_canonical_path(path: &str) -> bool {
    !path.contains('\\')
        && path.split('/').all(|segment| {
            let decoded = segment.to_ascii_lowercase().replace("%2e", ".");
            decoded != "." && decoded != ".."
        })
}

/// The gateway's production route table.
pub fn default_rules(
    auth: &BackendTarget,
    task: &BackendTarget,
) -> Result<Vec<RouteRule>, RouteTableError> {
    use AuthRequirement::{AnyAuthenticated, Public};
    use MethodPattern::{Any, Only};

    let admin = AuthRequirement::admin;

    Ok(vec![
        // auth service
        RouteRule::new(Only(Method::POST), "/api/auth/login", Public, auth)?,
        RouteRule::new(Only(Method::POST), "/api/auth/forgot-password", Public, auth)?,
        RouteRule::new(Only(Method::POST), "/api/auth/reset-password/:token", Public, auth)?,
        RouteRule::new(Only(Method::POST), "/api/auth/register", admin(), auth)?,
        RouteRule::new(Only(Method::GET), "/api/auth/me", AnyAuthenticated, auth)?,
        RouteRule::new(Only(Method::POST), "/api/auth/validate", AnyAuthenticated, auth)?,
        RouteRule::new(Only(Method::GET), "/api/auth/users", admin(), auth)?,
        RouteRule::new(Only(Method::GET), "/api/auth/users/:userId", AnyAuthenticated, auth)?,
        RouteRule::new(Only(Method::PUT), "/api/auth/change-password", AnyAuthenticated, auth)?,
        // project members: admin only
        RouteRule::new(Any, "/api/projects/:projectId/members/*", admin(), task)?,
        // tasks, task members, notes under tasks; deleting a task is admin only
        RouteRule::new(Only(Method::DELETE), "/api/projects/:projectId/tasks/:taskId", admin(), task)?,
        RouteRule::new(Any, "/api/projects/:projectId/tasks/*", AnyAuthenticated, task)?,
        // projects
        RouteRule::new(Only(Method::GET), "/api/projects", AnyAuthenticated, task)?,
        RouteRule::new(Only(Method::POST), "/api/projects", admin(), task)?,
        RouteRule::new(Only(Method::GET), "/api/projects/:id", AnyAuthenticated, task)?,
        RouteRule::new(Only(Method::PUT), "/api/projects/:id", admin(), task)?,
        RouteRule::new(Only(Method::DELETE), "/api/projects/:id", admin(), task)?,
        // notes
        RouteRule::new(Any, "/api/notes/*", AnyAuthenticated, task)?,
    ])
}
