//! Matcher over package names provided by the host at runtime. Rules are
//! tagged at construction (`Literal | Regex`); the matcher never sniffs a
//! string's shape at match time.

use regex::Regex;

#[derive(Debug, Clone)]
pub enum Matcher {
    Literal(String),
    Regex(Regex),
}

impl Matcher {
    pub fn matches(&self, name: &str) -> bool {
        match self {
            Matcher::Literal(literal) => literal == name,
            Matcher::Regex(re) => re.is_match(name),
        }
    }
}

impl PartialEq for Matcher {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Matcher::Literal(a), Matcher::Literal(b)) => a == b,
            (Matcher::Regex(a), Matcher::Regex(b)) => a.as_str() == b.as_str(),
            _ => false,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SharedPackagesRules {
    pub include: Vec<Matcher>,
    pub exclude: Vec<Matcher>,
}

impl SharedPackagesRules {
    /// Parses `--shared-package` CLI values: a leading `!` makes it an exclude
    /// rule, `/.../` delimiters make it a regex, otherwise literal. When no
    /// rules are supplied at all, the default include is `/@backstage\//`.
    pub fn from_cli(values: &[String]) -> Result<Self, regex::Error> {
        if values.is_empty() {
            return Ok(SharedPackagesRules {
                include: vec![Matcher::Regex(Regex::new(r"@backstage/")?)],
                exclude: Vec::new(),
            });
        }

        let mut rules = SharedPackagesRules::default();
        for value in values {
            let (is_exclude, body) = match value.strip_prefix('!') {
                Some(rest) => (true, rest),
                None => (false, value.as_str()),
            };
            let matcher = parse_matcher(body)?;
            if is_exclude {
                rules.exclude.push(matcher);
            } else {
                rules.include.push(matcher);
            }
        }
        Ok(rules)
    }

    pub fn is_shared(&self, name: &str) -> bool {
        let included = self.include.iter().any(|m| m.matches(name));
        let excluded = self.exclude.iter().any(|m| m.matches(name));
        included && !excluded
    }
}

fn parse_matcher(body: &str) -> Result<Matcher, regex::Error> {
    if body.len() >= 2 && body.starts_with('/') && body.ends_with('/') {
        let pattern = &body[1..body.len() - 1];
        Ok(Matcher::Regex(Regex::new(pattern)?))
    } else {
        Ok(Matcher::Literal(body.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_rule_matches_backstage_scope() {
        let rules = SharedPackagesRules::from_cli(&[]).unwrap();
        assert!(rules.is_shared("@backstage/core-plugin-api"));
        assert!(!rules.is_shared("lodash"));
    }

    #[test]
    fn literal_include_matches_exact_name_only() {
        let rules = SharedPackagesRules::from_cli(&["react".to_string()]).unwrap();
        assert!(rules.is_shared("react"));
        assert!(!rules.is_shared("react-dom"));
    }

    #[test]
    fn exclude_overrides_include() {
        let rules = SharedPackagesRules::from_cli(&[
            "/@backstage\\//".to_string(),
            "!@backstage/core-app-api".to_string(),
        ])
        .unwrap();
        assert!(rules.is_shared("@backstage/core-plugin-api"));
        assert!(!rules.is_shared("@backstage/core-app-api"));
    }
}
