//! Token-sequence trie for longest-phrase dictionary lookup

use std::collections::HashMap;

/// Trie node keyed by whole tokens
#[derive(Debug)]
pub struct TrieNode<T> {
    /// Child nodes (token -> node)
    children: HashMap<String, TrieNode<T>>,
    /// Data attached when a phrase ends at this node
    value: Option<T>,
}

impl<T> Default for TrieNode<T> {
    fn default() -> Self {
        Self {
            children: HashMap::new(),
            value: None,
        }
    }
}

/// Phrase trie: each edge is one normalized token, so `["p", "o", "box"]`
/// and `["po", "box"]` are distinct phrases.
#[derive(Debug)]
pub struct Trie<T> {
    root: TrieNode<T>,
    len: usize,
}

impl<T> Default for Trie<T> {
    fn default() -> Self {
        Self {
            root: TrieNode::default(),
            len: 0,
        }
    }
}

impl<T> Trie<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of phrases stored
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Returns the value for `phrase`, inserting `T::default()` first if absent.
    pub fn entry<S: AsRef<str>>(&mut self, phrase: &[S]) -> &mut T
    where
        T: Default,
    {
        let mut node = &mut self.root;
        for word in phrase {
            node = node.children.entry(word.as_ref().to_string()).or_default();
        }
        if node.value.is_none() {
            self.len += 1;
        }
        node.value.get_or_insert_with(T::default)
    }

    /// Exact lookup
    pub fn get<S: AsRef<str>>(&self, phrase: &[S]) -> Option<&T> {
        let mut node = &self.root;
        for word in phrase {
            node = node.children.get(word.as_ref())?;
        }
        node.value.as_ref()
    }

    /// Longest phrase that is a prefix of `words`.
    ///
    /// Returns (value, number of words matched).
    pub fn find_longest_prefix<S: AsRef<str>>(&self, words: &[S]) -> Option<(&T, usize)> {
        let mut node = &self.root;
        let mut last_match = None;

        for (i, word) in words.iter().enumerate() {
            match node.children.get(word.as_ref()) {
                Some(n) => {
                    node = n;
                    if let Some(ref value) = node.value {
                        last_match = Some((value, i + 1));
                    }
                }
                None => break,
            }
        }

        last_match
    }

    /// Every phrase that is a prefix of `words`, shortest first.
    ///
    /// Returns Vec<(value, number of words matched)>
    pub fn find_prefixes<S: AsRef<str>>(&self, words: &[S]) -> Vec<(&T, usize)> {
        let mut results = Vec::new();
        let mut node = &self.root;

        for (i, word) in words.iter().enumerate() {
            match node.children.get(word.as_ref()) {
                Some(n) => {
                    node = n;
                    if let Some(ref value) = node.value {
                        results.push((value, i + 1));
                    }
                }
                None => break,
            }
        }

        results
    }
}
