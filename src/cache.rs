//! An LRU cache of compiled patterns keyed on `(pattern, flags)`, so hot
//! call sites can pass pattern strings around without paying for
//! recompilation. The cache is an injected component, not a global:
//! callers own a `PatternCache` and hand it to whatever needs one.

use std::{
    collections::{HashMap, VecDeque},
    sync::{Arc, Mutex},
};

use crate::{
    compiler::{compile, CompiledPattern},
    matching::Match,
    parser::run_parse,
    regex::{Error, Regex},
    utils::RegexFlags,
};

pub const DEFAULT_CAPACITY: usize = 64;

type Key = (String, RegexFlags);

#[derive(Debug, Default)]
struct Inner {
    map: HashMap<Key, Arc<CompiledPattern>>,
    // least recently used at the front
    order: VecDeque<Key>,
}

impl Inner {
    fn touch(&mut self, key: &Key) {
        if let Some(at) = self.order.iter().position(|k| k == key) {
            self.order.remove(at);
        }
        self.order.push_back(key.clone());
    }
}

#[derive(Debug)]
pub struct PatternCache {
    capacity: usize,
    inner: Mutex<Inner>,
}

impl Default for PatternCache {
    fn default() -> PatternCache {
        PatternCache::new(DEFAULT_CAPACITY)
    }
}

impl PatternCache {
    pub fn new(capacity: usize) -> PatternCache {
        PatternCache {
            capacity,
            inner: Mutex::new(Inner::default()),
        }
    }

    /// The cached `Regex` for `(pattern, flags)`, compiling on a miss.
    /// Compilation runs outside the lock; if two threads race on the same
    /// key both compile, one result is kept, and either is fine since
    /// identical keys always compile to behaviorally identical programs.
    pub fn regex(&self, pattern: &str, flags: RegexFlags) -> Result<Regex, Error> {
        let key = (pattern.to_string(), flags);
        {
            let mut inner = self.inner.lock().unwrap();
            if let Some(compiled) = inner.map.get(&key).cloned() {
                inner.touch(&key);
                return Ok(Regex::from_compiled(compiled));
            }
        }

        let (ast, groups) = run_parse(pattern)?;
        let compiled = Arc::new(compile(pattern, &ast, groups, flags)?);

        if self.capacity > 0 {
            let mut inner = self.inner.lock().unwrap();
            if let Some(existing) = inner.map.get(&key).cloned() {
                inner.touch(&key);
                return Ok(Regex::from_compiled(existing));
            }
            while inner.map.len() >= self.capacity {
                match inner.order.pop_front() {
                    Some(oldest) => {
                        inner.map.remove(&oldest);
                    }
                    None => break,
                }
            }
            inner.map.insert(key.clone(), Arc::clone(&compiled));
            inner.order.push_back(key);
        }
        Ok(Regex::from_compiled(compiled))
    }

    pub fn len(&self) -> usize {
        self.inner.lock().unwrap().map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        let mut inner = self.inner.lock().unwrap();
        inner.map.clear();
        inner.order.clear();
    }

    // cache-backed counterparts of the Regex operations, all with NO_FLAG

    pub fn is_match(&self, text: &str, pattern: &str) -> Result<bool, Error> {
        Ok(self.regex(pattern, RegexFlags::NO_FLAG)?.is_match(text))
    }

    pub fn match_at(&self, text: &str, pattern: &str) -> Result<Option<Match>, Error> {
        Ok(self.regex(pattern, RegexFlags::NO_FLAG)?.match_at(text, 0))
    }

    pub fn find(&self, text: &str, pattern: &str) -> Result<Option<Match>, Error> {
        Ok(self.regex(pattern, RegexFlags::NO_FLAG)?.find(text))
    }

    pub fn find_all(&self, text: &str, pattern: &str) -> Result<Vec<String>, Error> {
        Ok(self.regex(pattern, RegexFlags::NO_FLAG)?.find_all(text))
    }

    pub fn split(&self, text: &str, pattern: &str) -> Result<Vec<String>, Error> {
        Ok(self.regex(pattern, RegexFlags::NO_FLAG)?.split(text))
    }

    pub fn substitute(
        &self,
        text: &str,
        pattern: &str,
        replacement: &str,
    ) -> Result<String, Error> {
        self.regex(pattern, RegexFlags::NO_FLAG)?
            .substitute(text, replacement)
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn hits_share_the_compiled_pattern() {
        let cache = PatternCache::default();
        let first = cache.regex("a+", RegexFlags::NO_FLAG).unwrap();
        let second = cache.regex("a+", RegexFlags::NO_FLAG).unwrap();
        assert!(Arc::ptr_eq(first.compiled_arc(), second.compiled_arc()));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn flags_are_part_of_the_key() {
        let cache = PatternCache::default();
        let plain = cache.regex("a+", RegexFlags::NO_FLAG).unwrap();
        let folded = cache.regex("a+", RegexFlags::IGNORECASE).unwrap();
        assert!(!Arc::ptr_eq(plain.compiled_arc(), folded.compiled_arc()));
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn least_recently_used_entry_is_evicted() {
        let cache = PatternCache::new(2);
        let a = cache.regex("a", RegexFlags::NO_FLAG).unwrap();
        cache.regex("b", RegexFlags::NO_FLAG).unwrap();
        // touch "a" so "b" becomes the eviction candidate
        cache.regex("a", RegexFlags::NO_FLAG).unwrap();
        cache.regex("c", RegexFlags::NO_FLAG).unwrap();
        assert_eq!(cache.len(), 2);

        let again = cache.regex("a", RegexFlags::NO_FLAG).unwrap();
        assert!(Arc::ptr_eq(a.compiled_arc(), again.compiled_arc()));
    }

    #[test]
    fn zero_capacity_disables_caching() {
        let cache = PatternCache::new(0);
        let first = cache.regex("a+", RegexFlags::NO_FLAG).unwrap();
        let second = cache.regex("a+", RegexFlags::NO_FLAG).unwrap();
        assert!(!Arc::ptr_eq(first.compiled_arc(), second.compiled_arc()));
        assert!(cache.is_empty());
    }

    #[test]
    fn clear_empties_the_cache() {
        let cache = PatternCache::default();
        cache.regex("a", RegexFlags::NO_FLAG).unwrap();
        cache.regex("b", RegexFlags::NO_FLAG).unwrap();
        cache.clear();
        assert!(cache.is_empty());
    }

    #[test]
    fn errors_do_not_populate_the_cache() {
        let cache = PatternCache::default();
        assert!(cache.regex("(ab", RegexFlags::NO_FLAG).is_err());
        assert!(cache.is_empty());
    }

    #[test]
    fn convenience_operations_use_the_cache() {
        let cache = PatternCache::default();
        assert!(cache.is_match("Hello World", "^Hello").unwrap());
        assert_eq!(
            cache.find_all("aaabbcdeeeffg", "a+").unwrap(),
            vec!["aaa"]
        );
        assert_eq!(
            cache
                .split("apple,banana;cherry-date", "[,;-]")
                .unwrap(),
            vec!["apple", "banana", "cherry", "date"]
        );
        assert_eq!(
            cache
                .substitute("The color is red.", "red", "blue")
                .unwrap(),
            "The color is blue."
        );
        assert_eq!(cache.len(), 4);
    }

    #[test]
    fn shared_across_threads() {
        let cache = Arc::new(PatternCache::default());
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let cache = Arc::clone(&cache);
                std::thread::spawn(move || {
                    cache.find_all("aa bb aa", "a+").unwrap()
                })
            })
            .collect();
        for handle in handles {
            assert_eq!(handle.join().unwrap(), vec!["aa", "aa"]);
        }
        assert_eq!(cache.len(), 1);
    }
}
