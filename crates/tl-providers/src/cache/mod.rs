//! Cache providers.

#[cfg(feature = "cache-moka")]
mod moka;
#[cfg(feature = "cache-redis")]
mod redis;

#[cfg(feature = "cache-moka")]
pub use moka::MokaCacheProvider;
#[cfg(feature = "cache-redis")]
pub use redis::RedisCacheProvider;

/// Translate a `*`/`?` glob into an anchored regex. Shared by backends that
/// have to scan for `delete_pattern`.
pub(crate) fn glob_to_regex(pattern: &str) -> Option<regex::Regex> {
    let mut expr = String::with_capacity(pattern.len() + 8);
    expr.push('^');
    for c in pattern.chars() {
        match c {
            '*' => expr.push_str(".*"),
            '?' => expr.push('.'),
            c => expr.push_str(&regex::escape(&c.to_string())),
        }
    }
    expr.push('$');
    regex::Regex::new(&expr).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn glob_translation_matches_key_families() {
        let re = glob_to_regex("trends:*").map_or_else(|| panic!("regex"), |r| r);
        assert!(re.is_match("trends:list:abc"));
        assert!(re.is_match("trends:detail:123"));
        assert!(!re.is_match("topics:items:123"));
    }

    #[test]
    fn glob_escapes_regex_metacharacters() {
        let re = glob_to_regex("emb:a+b*").map_or_else(|| panic!("regex"), |r| r);
        assert!(re.is_match("emb:a+b:suffix"));
        assert!(!re.is_match("emb:aab"));
    }
}
