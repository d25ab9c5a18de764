/// One level of the completion tree: a set of interchangeable words, each of which may be
/// followed by any word of the child nodes.
#[derive(Debug, Clone)]
pub struct CompletionNode {
    words: Vec<&'static str>,
    children: Vec<CompletionNode>,
}

/// A node completing a single word with no continuation.
pub fn leaf(word: &'static str) -> CompletionNode {
    node(&[word], Vec::new())
}

/// A node completing any of `words`, followed by the words of `children`.
pub fn node(words: &[&'static str], children: Vec<CompletionNode>) -> CompletionNode {
    CompletionNode {
        words: words.to_vec(),
        children,
    }
}

/// Word-by-word completion tree.
#[derive(Debug, Clone, Default)]
pub struct CompletionTree {
    roots: Vec<CompletionNode>,
}

impl CompletionTree {
    pub fn new(roots: Vec<CompletionNode>) -> Self {
        Self { roots }
    }

    /// Returns the byte offset where the word under the cursor starts and the candidate
    /// words that extend it.
    ///
    /// Words already typed before the cursor select the branch; an unknown word yields
    /// no candidates.
    pub fn candidates(&self, line: &str, pos: usize) -> (usize, Vec<&'static str>) {
        let before = line.get(..pos).unwrap_or(line);
        let start = before
            .char_indices()
            .rev()
            .find(|(_, c)| c.is_whitespace())
            .map(|(i, c)| i + c.len_utf8())
            .unwrap_or(0);
        let partial = &before[start..];

        let mut level = &self.roots;
        for word in before[..start].split_whitespace() {
            match level.iter().find(|n| n.words.contains(&word)) {
                Some(n) => level = &n.children,
                None => return (start, Vec::new()),
            }
        }

        let mut found: Vec<&'static str> = Vec::new();
        for word in level.iter().flat_map(|n| n.words.iter().copied()) {
            if word.starts_with(partial) && !found.contains(&word) {
                found.push(word);
            }
        }
        (start, found)
    }
}
