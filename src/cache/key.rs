use uuid::Uuid;

/// Closed vocabulary of cache key prefixes. Every key is built through this
/// enum so an ad hoc key string cannot leave out the tenant segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CachePrefix {
    Company,
    User,
    Job,
    Client,
    Vendor,
    Settings,
    Session,
    RateLimit,
}

impl CachePrefix {
    pub fn as_str(&self) -> &'static str {
        match self {
            CachePrefix::Company => "company",
            CachePrefix::User => "user",
            CachePrefix::Job => "job",
            CachePrefix::Client => "client",
            CachePrefix::Vendor => "vendor",
            CachePrefix::Settings => "settings",
            CachePrefix::Session => "session",
            CachePrefix::RateLimit => "rate_limit",
        }
    }
}

/// A fully-built cache key.
///
/// Tenant keys are laid out `prefix:company_id:segments...` so the owning
/// company id always sits in the second position; company-wide invalidation
/// relies on that layout. Global keys start with a literal `global` marker,
/// which is not in the prefix vocabulary, so the two namespaces cannot
/// collide. Segments are escaped so that no two distinct
/// (prefix, company, segments) tuples produce the same string.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey(String);

impl CacheKey {
    pub fn tenant(prefix: CachePrefix, company_id: Uuid, segments: &[&str]) -> Self {
        let mut key = format!("{}:{}", prefix.as_str(), company_id);
        for segment in segments {
            key.push(':');
            key.push_str(&escape_segment(segment));
        }
        CacheKey(key)
    }

    pub fn global(prefix: CachePrefix, segments: &[&str]) -> Self {
        let mut key = format!("global:{}", prefix.as_str());
        for segment in segments {
            key.push(':');
            key.push_str(&escape_segment(segment));
        }
        CacheKey(key)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for CacheKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Escape the separator and wildcard characters inside a segment. `%` is
/// escaped first so the encoding round-trips unambiguously.
fn escape_segment(segment: &str) -> String {
    segment
        .replace('%', "%25")
        .replace(':', "%3a")
        .replace('*', "%2a")
}

/// Anchored `*`-wildcard match. `*` spans any run of characters, including
/// separators; everything else matches literally.
pub fn glob_match(pattern: &str, candidate: &str) -> bool {
    let pattern: Vec<char> = pattern.chars().collect();
    let candidate: Vec<char> = candidate.chars().collect();

    let mut pi = 0;
    let mut ci = 0;
    let mut star: Option<usize> = None;
    let mut mark = 0;

    while ci < candidate.len() {
        if pi < pattern.len() && pattern[pi] == '*' {
            star = Some(pi);
            mark = ci;
            pi += 1;
        } else if pi < pattern.len() && pattern[pi] == candidate[ci] {
            pi += 1;
            ci += 1;
        } else if let Some(star_pos) = star {
            // Backtrack: let the last star absorb one more character.
            pi = star_pos + 1;
            mark += 1;
            ci = mark;
        } else {
            return false;
        }
    }

    while pi < pattern.len() && pattern[pi] == '*' {
        pi += 1;
    }
    pi == pattern.len()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tenant_keys_are_deterministic() {
        let company = Uuid::new_v4();
        let a = CacheKey::tenant(CachePrefix::Settings, company, &["config", "resolved"]);
        let b = CacheKey::tenant(CachePrefix::Settings, company, &["config", "resolved"]);
        assert_eq!(a, b);
    }

    #[test]
    fn tenant_keys_partition_by_company() {
        let a = CacheKey::tenant(CachePrefix::Settings, Uuid::new_v4(), &["config"]);
        let b = CacheKey::tenant(CachePrefix::Settings, Uuid::new_v4(), &["config"]);
        assert_ne!(a, b);
    }

    #[test]
    fn segment_escaping_prevents_aliasing() {
        let company = Uuid::new_v4();
        let joined = CacheKey::tenant(CachePrefix::Job, company, &["a:b"]);
        let split = CacheKey::tenant(CachePrefix::Job, company, &["a", "b"]);
        assert_ne!(joined, split);

        let literal_escape = CacheKey::tenant(CachePrefix::Job, company, &["a%3ab"]);
        assert_ne!(joined, literal_escape);
    }

    #[test]
    fn global_keys_never_collide_with_tenant_keys() {
        let key = CacheKey::global(CachePrefix::Settings, &["platform_defaults"]);
        assert!(key.as_str().starts_with("global:"));
    }

    #[test]
    fn glob_matches_anchored_wildcards() {
        assert!(glob_match("*", "anything"));
        assert!(glob_match("settings:*", "settings:abc:def"));
        assert!(glob_match("*:abc:*", "settings:abc:config"));
        assert!(glob_match("*:abc:*", "settings:abc:"));
        assert!(!glob_match("*:abc:*", "settings:xyz:config"));
        assert!(!glob_match("settings:*", "session:abc"));
        assert!(glob_match("a*b*c", "a-x-b-y-c"));
        assert!(!glob_match("a*b*c", "a-x-b-y"));
    }

    #[test]
    fn company_pattern_never_matches_other_company() {
        let c1 = Uuid::new_v4();
        let c2 = Uuid::new_v4();
        let key = CacheKey::tenant(CachePrefix::Settings, c2, &["config"]);
        assert!(!glob_match(&format!("*:{}:*", c1), key.as_str()));
        assert!(glob_match(&format!("*:{}:*", c2), key.as_str()));
    }
}
