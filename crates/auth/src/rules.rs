//! Static, ordered route rule table.
//!
//! Each rule pairs a path pattern and a method set with the authority it
//! requires. Rules are evaluated in declared order and the first match wins,
//! so broad catch-alls belong at the end.

use core::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{Permission, Role};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RuleError {
    #[error("rule {index}: path pattern '{pattern}' must start with '/'")]
    RelativePath { index: usize, pattern: String },

    #[error("rule {index}: wildcard in '{pattern}' is only allowed as a trailing '/**'")]
    MisplacedWildcard { index: usize, pattern: String },

    #[error("rule {index}: has_any_role needs at least one role")]
    EmptyRoleList { index: usize },

    #[error("unknown HTTP method '{0}'")]
    UnknownMethod(String),
}

/// HTTP methods a rule can name.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    Get,
    Head,
    Post,
    Put,
    Patch,
    Delete,
    Options,
}

impl FromStr for HttpMethod {
    type Err = RuleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "GET" => Ok(Self::Get),
            "HEAD" => Ok(Self::Head),
            "POST" => Ok(Self::Post),
            "PUT" => Ok(Self::Put),
            "PATCH" => Ok(Self::Patch),
            "DELETE" => Ok(Self::Delete),
            "OPTIONS" => Ok(Self::Options),
            other => Err(RuleError::UnknownMethod(other.to_string())),
        }
    }
}

/// Literal path or `prefix/**` wildcard.
///
/// `/api/products/**` matches `/api/products` and anything below it, but not
/// `/api/productsX`. `/**` matches every path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathPattern {
    Exact(String),
    Prefix(String),
}

impl PathPattern {
    fn parse(index: usize, pattern: &str) -> Result<Self, RuleError> {
        if !pattern.starts_with('/') {
            return Err(RuleError::RelativePath {
                index,
                pattern: pattern.to_string(),
            });
        }

        let (base, wildcard) = match pattern.strip_suffix("/**") {
            Some(base) => (base, true),
            None => (pattern, false),
        };
        if base.contains('*') {
            return Err(RuleError::MisplacedWildcard {
                index,
                pattern: pattern.to_string(),
            });
        }

        Ok(if wildcard {
            Self::Prefix(base.to_string())
        } else {
            Self::Exact(base.to_string())
        })
    }

    pub fn matches(&self, path: &str) -> bool {
        match self {
            Self::Exact(p) => path == p,
            Self::Prefix(p) => match path.strip_prefix(p.as_str()) {
                Some(rest) => rest.is_empty() || rest.starts_with('/'),
                None => false,
            },
        }
    }
}

/// Authority a route requires.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthorityExpression {
    /// No authority required, anonymous callers allowed.
    Public,
    /// Any resolved principal.
    Authenticated,
    HasRole(Role),
    HasAnyRole(Vec<Role>),
    HasPermission(Permission),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteRule {
    pattern: PathPattern,
    /// Empty means every method.
    methods: Vec<HttpMethod>,
    requirement: AuthorityExpression,
}

impl RouteRule {
    pub fn new(
        pattern: PathPattern,
        methods: impl IntoIterator<Item = HttpMethod>,
        requirement: AuthorityExpression,
    ) -> Self {
        Self {
            pattern,
            methods: methods.into_iter().collect(),
            requirement,
        }
    }

    pub fn pattern(&self) -> &PathPattern {
        &self.pattern
    }

    pub fn requirement(&self) -> &AuthorityExpression {
        &self.requirement
    }

    pub fn matches(&self, method: HttpMethod, path: &str) -> bool {
        (self.methods.is_empty() || self.methods.contains(&method)) && self.pattern.matches(path)
    }
}

/// Serialized form of one rule (e.g. a `[[rule]]` table in TOML).
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RouteRuleSpec {
    pub path: String,
    #[serde(default)]
    pub methods: Vec<HttpMethod>,
    pub require: AuthorityExpression,
}

/// Serialized form of a whole table.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RouteTableSpec {
    #[serde(default, rename = "rule")]
    pub rules: Vec<RouteRuleSpec>,
}

/// Ordered rule list. Built once at startup, read-only afterwards.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RouteTable {
    rules: Vec<RouteRule>,
}

impl RouteTable {
    pub fn new(rules: Vec<RouteRule>) -> Self {
        Self { rules }
    }

    pub fn rules(&self) -> &[RouteRule] {
        &self.rules
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// First rule matching `method` + `path`, in declared order.
    pub fn match_rule(&self, method: HttpMethod, path: &str) -> Option<&RouteRule> {
        self.rules.iter().find(|rule| rule.matches(method, path))
    }
}

impl TryFrom<RouteTableSpec> for RouteTable {
    type Error = RuleError;

    fn try_from(spec: RouteTableSpec) -> Result<Self, Self::Error> {
        let rules = spec
            .rules
            .into_iter()
            .enumerate()
            .map(|(index, rule)| {
                if let AuthorityExpression::HasAnyRole(roles) = &rule.require {
                    if roles.is_empty() {
                        return Err(RuleError::EmptyRoleList { index });
                    }
                }
                let pattern = PathPattern::parse(index, &rule.path)?;
                Ok(RouteRule::new(pattern, rule.methods, rule.require))
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self { rules })
    }
}
