use std::{fmt, sync::Arc};

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::{domain::normalize_domain, error::FilterError};

// ─────────────────────────────────────────────────────────────────────────────
// Capability shared by every domain filter
// ─────────────────────────────────────────────────────────────────────────────

/// Anything that can decide whether a domain is in scope.
///
/// An unconfigured matcher is the identity: it matches every domain, and a
/// composite filter skips it instead of letting it veto.
pub trait DomainMatcher: fmt::Debug + Send + Sync {
    fn matches(&self, domain: &str) -> bool;
    fn is_configured(&self) -> bool;
}

/// An absent filter matches everything and is not configured.
impl<T: DomainMatcher> DomainMatcher for Option<T> {
    fn matches(&self, domain: &str) -> bool {
        self.as_ref().map_or(true, |f| f.matches(domain))
    }

    fn is_configured(&self) -> bool {
        self.as_ref().is_some_and(|f| f.is_configured())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// DomainFilter
// ─────────────────────────────────────────────────────────────────────────────

/// Inclusion / exclusion rules over domain names, either as literal suffix
/// rules or as a pair of regular expressions. The two forms can never be
/// mixed in one filter.
///
/// Literal rules:
///   - `.example.com` matches `foo.example.com` but not `example.com`
///   - `example.com` matches `example.com` and `foo.example.com`, not
///     `anexample.com`
///
/// The default filter has no rules and matches every domain.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(try_from = "DomainFilterSerde", into = "DomainFilterSerde")]
pub struct DomainFilter {
    rules: Rules,
}

#[derive(Debug, Clone)]
enum Rules {
    Literal {
        include: Vec<String>,
        exclude: Vec<String>,
    },
    Regex {
        include: Option<Regex>,
        exclude: Option<Regex>,
    },
}

impl Default for Rules {
    fn default() -> Self {
        Rules::Literal {
            include: Vec::new(),
            exclude: Vec::new(),
        }
    }
}

impl DomainFilter {
    /// Literal filter with inclusion rules only.
    pub fn new<I, S>(include: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self::with_exclusions(include, std::iter::empty::<&str>())
    }

    /// Literal filter. Rules are trimmed, normalized, and dropped when empty.
    pub fn with_exclusions<I, S, E, T>(include: I, exclude: E) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
        E: IntoIterator<Item = T>,
        T: AsRef<str>,
    {
        Self {
            rules: Rules::Literal {
                include: prepare_filters(include),
                exclude: prepare_filters(exclude),
            },
        }
    }

    /// Regex filter. Empty patterns count as absent; with both absent the
    /// result is the empty literal filter.
    pub fn regex(include: Option<Regex>, exclude: Option<Regex>) -> Self {
        let include = include.filter(|r| !r.as_str().is_empty());
        let exclude = exclude.filter(|r| !r.as_str().is_empty());
        if include.is_none() && exclude.is_none() {
            return Self::default();
        }
        Self { rules: Rules::Regex { include, exclude } }
    }

    /// Compile both patterns; an empty pattern means "not set".
    pub fn from_regex_patterns(include: &str, exclude: &str) -> Result<Self, FilterError> {
        Ok(Self::regex(
            compile_pattern(include, "regexInclude")?,
            compile_pattern(exclude, "regexExclude")?,
        ))
    }

    pub fn is_regex(&self) -> bool {
        matches!(self.rules, Rules::Regex { .. })
    }

    /// Normalized literal inclusion rules; empty in regex mode.
    pub fn include_rules(&self) -> &[String] {
        match &self.rules {
            Rules::Literal { include, .. } => include,
            Rules::Regex { .. } => &[],
        }
    }

    /// Normalized literal exclusion rules; empty in regex mode.
    pub fn exclude_rules(&self) -> &[String] {
        match &self.rules {
            Rules::Literal { exclude, .. } => exclude,
            Rules::Regex { .. } => &[],
        }
    }

    pub fn regex_include(&self) -> Option<&str> {
        match &self.rules {
            Rules::Regex { include, .. } => include.as_ref().map(Regex::as_str),
            Rules::Literal { .. } => None,
        }
    }

    pub fn regex_exclude(&self) -> Option<&str> {
        match &self.rules {
            Rules::Regex { exclude, .. } => exclude.as_ref().map(Regex::as_str),
            Rules::Literal { .. } => None,
        }
    }

    /// Whether `domain` is in scope. In regex mode the exclusion pattern is
    /// checked first and always wins.
    pub fn matches(&self, domain: &str) -> bool {
        match &self.rules {
            Rules::Regex { include, exclude } => {
                match_regex(include.as_ref(), exclude.as_ref(), domain)
            }
            Rules::Literal { include, exclude } => {
                match_filter(include, domain, true) && !match_filter(exclude, domain, false)
            }
        }
    }

    /// Whether `domain` is a strict ancestor of one of the inclusion rules,
    /// e.g. `example.com` for the rule `api.example.com`. Used to decide if a
    /// parent zone is in scope. Rules starting with "." only ever match
    /// subdomains and take no part here. Exclusion rules still veto.
    pub fn match_parent(&self, domain: &str) -> bool {
        let (include, exclude) = match &self.rules {
            Rules::Literal { include, exclude } => (include, exclude),
            Rules::Regex { .. } => return true,
        };
        if match_filter(exclude, domain, false) {
            return false;
        }
        if include.is_empty() {
            return true;
        }

        let stripped = normalize_domain(domain);
        let suffix = format!(".{stripped}");
        include
            .iter()
            .filter(|rule| !rule.is_empty() && !rule.starts_with('.'))
            .any(|rule| rule.ends_with(&suffix))
    }

    /// True iff any non-empty rule or pattern is present.
    pub fn is_configured(&self) -> bool {
        match &self.rules {
            Rules::Regex { include, exclude } => include.is_some() || exclude.is_some(),
            Rules::Literal { include, exclude } => !include.is_empty() || !exclude.is_empty(),
        }
    }
}

impl DomainMatcher for DomainFilter {
    fn matches(&self, domain: &str) -> bool {
        DomainFilter::matches(self, domain)
    }

    fn is_configured(&self) -> bool {
        DomainFilter::is_configured(self)
    }
}

impl PartialEq for DomainFilter {
    fn eq(&self, other: &Self) -> bool {
        match (&self.rules, &other.rules) {
            (
                Rules::Literal { include: a, exclude: b },
                Rules::Literal { include: c, exclude: d },
            ) => a == c && b == d,
            (Rules::Regex { .. }, Rules::Regex { .. }) => {
                self.regex_include() == other.regex_include()
                    && self.regex_exclude() == other.regex_exclude()
            }
            _ => false,
        }
    }
}

impl fmt::Display for DomainFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.is_configured() {
            return f.write_str("(all domains)");
        }
        match &self.rules {
            Rules::Literal { include, exclude } => {
                write!(f, "include={include:?} exclude={exclude:?}")
            }
            Rules::Regex { .. } => write!(
                f,
                "regexInclude={:?} regexExclude={:?}",
                self.regex_include().unwrap_or(""),
                self.regex_exclude().unwrap_or("")
            ),
        }
    }
}

// ── matching ──────────────────────────────────────────────────────────────────

/// Trim whitespace, normalize, drop what ends up empty (" ", ".", "").
fn prepare_filters<I, S>(filters: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    filters
        .into_iter()
        .map(|f| normalize_domain(f.as_ref().trim()))
        .filter(|f| !f.is_empty())
        .collect()
}

/// Whether any rule matches `domain`. An empty rule list yields `empty_val`:
/// no inclusion rules include everything, no exclusion rules exclude nothing.
fn match_filter(filters: &[String], domain: &str, empty_val: bool) -> bool {
    if filters.is_empty() {
        return empty_val;
    }

    let stripped = normalize_domain(domain);
    filters
        .iter()
        .filter(|rule| !rule.is_empty())
        .any(|rule| match_rule(rule, &stripped))
}

fn match_rule(rule: &str, domain: &str) -> bool {
    if rule.starts_with('.') {
        return domain.ends_with(rule);
    }
    domain == rule
        || domain
            .strip_suffix(rule)
            .is_some_and(|head| head.ends_with('.'))
}

fn match_regex(include: Option<&Regex>, exclude: Option<&Regex>, domain: &str) -> bool {
    let stripped = normalize_domain(domain);

    if exclude.is_some_and(|re| re.is_match(&stripped)) {
        return false;
    }
    // exclusion-only filters accept whatever was not excluded
    include.map_or(true, |re| re.is_match(&stripped))
}

fn compile_pattern(pattern: &str, field: &'static str) -> Result<Option<Regex>, FilterError> {
    if pattern.is_empty() {
        return Ok(None);
    }
    Regex::new(pattern)
        .map(Some)
        .map_err(|source| FilterError::InvalidRegex { field, source })
}

// ── serde ─────────────────────────────────────────────────────────────────────

/// Wire form: `{"include": [...], "exclude": [...]}` or
/// `{"regexInclude": "...", "regexExclude": "..."}`.
#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DomainFilterSerde {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    include: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    exclude: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    regex_include: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    regex_exclude: Option<String>,
}

impl TryFrom<DomainFilterSerde> for DomainFilter {
    type Error = FilterError;

    fn try_from(s: DomainFilterSerde) -> Result<Self, Self::Error> {
        let include = s.include.unwrap_or_default();
        let exclude = s.exclude.unwrap_or_default();
        let regex_include = s.regex_include.unwrap_or_default();
        let regex_exclude = s.regex_exclude.unwrap_or_default();

        if regex_include.is_empty() && regex_exclude.is_empty() {
            return Ok(Self::with_exclusions(include, exclude));
        }
        if !include.is_empty() || !exclude.is_empty() {
            return Err(FilterError::BothLiteralAndRegex);
        }
        Self::from_regex_patterns(&regex_include, &regex_exclude)
    }
}

impl From<DomainFilter> for DomainFilterSerde {
    fn from(df: DomainFilter) -> Self {
        let non_empty = |mut v: Vec<String>| {
            v.sort();
            (!v.is_empty()).then_some(v)
        };
        match df.rules {
            Rules::Literal { include, exclude } => Self {
                include: non_empty(include),
                exclude: non_empty(exclude),
                ..Default::default()
            },
            Rules::Regex { include, exclude } => Self {
                regex_include: include.map(|r| r.as_str().to_string()),
                regex_exclude: exclude.map(|r| r.as_str().to_string()),
                ..Default::default()
            },
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// MatchAllDomainFilters
// ─────────────────────────────────────────────────────────────────────────────

/// AND-combination of domain filters from independent sources, e.g. the
/// operator's flags and a provider's own zone list. Absent and unconfigured
/// members are skipped, so neither source vetoes when the other is unset.
/// With no configured member at all the composite matches everything.
#[derive(Debug, Clone, Default)]
pub struct MatchAllDomainFilters {
    filters: Vec<Option<Arc<dyn DomainMatcher>>>,
}

impl MatchAllDomainFilters {
    pub fn new(filters: Vec<Option<Arc<dyn DomainMatcher>>>) -> Self {
        Self { filters }
    }

    pub fn push(&mut self, filter: Option<Arc<dyn DomainMatcher>>) {
        self.filters.push(filter);
    }

    pub fn len(&self) -> usize {
        self.filters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }

    fn configured(&self) -> impl Iterator<Item = &Arc<dyn DomainMatcher>> {
        self.filters
            .iter()
            .flatten()
            .filter(|f| f.is_configured())
    }
}

impl DomainMatcher for MatchAllDomainFilters {
    fn matches(&self, domain: &str) -> bool {
        if !self.is_configured() {
            return true;
        }
        self.configured().all(|f| f.matches(domain))
    }

    fn is_configured(&self) -> bool {
        self.configured().next().is_some()
    }
}

impl FromIterator<Option<Arc<dyn DomainMatcher>>> for MatchAllDomainFilters {
    fn from_iter<I: IntoIterator<Item = Option<Arc<dyn DomainMatcher>>>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}
