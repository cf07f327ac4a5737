//! Penn-bracket treebank reading
//!
//! Parses bracketed constituency trees, `(S (NP (NNP John)) (VP (VBD ran)))`,
//! from strings or files. Gzipped files are detected by their magic number
//! and decompressed transparently. A reader yields one tree per top-level
//! bracketing; parse errors report the line they were found on, and a
//! malformed tree ends the stream (no resynchronization is attempted).

use std::io::{self, Read};
use std::path::Path;

use bstr::ByteSlice;
use flate2::read::GzDecoder;
use memchr::{memchr2, memchr_iter};

use crate::tree::{NodeId, Tree};

/// Error during treebank parsing
#[derive(Debug)]
pub struct ParseError {
    pub line: usize,
    pub message: String,
}

impl std::fmt::Display for ParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "parse error at line {}: {}", self.line, self.message)
    }
}

impl std::error::Error for ParseError {}

/// Reader that iterates over the trees in a treebank
pub struct TreeReader {
    buf: Vec<u8>,
    pos: usize,
    line: usize,
}

impl TreeReader {
    /// Create a reader from a string
    pub fn from_str(text: &str) -> Self {
        Self {
            buf: text.as_bytes().to_vec(),
            pos: 0,
            line: 1,
        }
    }

    /// Create a reader over raw bytes, decompressing gzip input
    pub fn from_bytes(buf: Vec<u8>) -> io::Result<Self> {
        let buf = if buf.starts_with(&[0x1f, 0x8b]) {
            let mut out = Vec::new();
            GzDecoder::new(&buf[..]).read_to_end(&mut out)?;
            out
        } else {
            buf
        };
        Ok(Self {
            buf,
            pos: 0,
            line: 1,
        })
    }

    /// Create a reader from a file path (plain or gzipped)
    pub fn from_file(path: impl AsRef<Path>) -> io::Result<Self> {
        Self::from_bytes(std::fs::read(path)?)
    }

    fn err(&self, message: &str) -> ParseError {
        ParseError {
            line: self.line,
            message: message.to_string(),
        }
    }

    fn skip_whitespace(&mut self) {
        while let Some(&b) = self.buf.get(self.pos) {
            if !b.is_ascii_whitespace() {
                break;
            }
            if b == b'\n' {
                self.line += 1;
            }
            self.pos += 1;
        }
    }

    /// Open a node, attaching it to the node on top of the stack
    fn open_node(tree: &mut Tree, stack: &mut Vec<NodeId>, label: &str) {
        let id = tree.add_node(label);
        if let Some(&parent) = stack.last() {
            tree.add_child(parent, id);
        }
        stack.push(id);
    }

    fn parse_tree(&mut self) -> Result<Tree, ParseError> {
        let mut tree = Tree::new();
        let mut stack: Vec<NodeId> = Vec::new();
        let mut pending_open = false;
        loop {
            let rest = &self.buf[self.pos..];
            let stop = memchr2(b'(', b')', rest);
            let chunk = &rest[..stop.unwrap_or(rest.len())];

            for atom in chunk.fields() {
                let label = atom
                    .to_str()
                    .map_err(|_| self.err("label is not valid UTF-8"))?;
                if pending_open {
                    Self::open_node(&mut tree, &mut stack, label);
                    pending_open = false;
                } else if let Some(&parent) = stack.last() {
                    let id = tree.add_node(label);
                    tree.add_child(parent, id);
                } else {
                    return Err(self.err(&format!("unexpected token \"{label}\" outside a tree")));
                }
            }
            self.line += memchr_iter(b'\n', chunk).count();

            let Some(i) = stop else {
                self.pos = self.buf.len();
                return Err(self.err("unexpected end of input inside a tree"));
            };
            let paren = rest[i];
            self.pos += i + 1;

            if paren == b'(' {
                if pending_open {
                    // the previous '(' had no label
                    Self::open_node(&mut tree, &mut stack, "");
                }
                pending_open = true;
            } else {
                if pending_open {
                    Self::open_node(&mut tree, &mut stack, "");
                    pending_open = false;
                }
                if stack.pop().is_none() {
                    return Err(self.err("unbalanced \")\""));
                }
                if stack.is_empty() {
                    return Ok(tree);
                }
            }
        }
    }
}

impl Iterator for TreeReader {
    type Item = Result<Tree, ParseError>;

    fn next(&mut self) -> Option<Self::Item> {
        self.skip_whitespace();
        if self.pos >= self.buf.len() {
            return None;
        }
        let result = self.parse_tree();
        if result.is_err() {
            // malformed input ends the stream
            self.pos = self.buf.len();
        }
        Some(result)
    }
}

/// Parse a single bracketed tree from a string
pub fn read_tree(text: &str) -> Result<Tree, ParseError> {
    match TreeReader::from_str(text).next() {
        Some(result) => result,
        None => Err(ParseError {
            line: 1,
            message: "empty input".to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn labels(tree: &Tree) -> Vec<&str> {
        tree.preorder(0).map(|n| tree.label(n)).collect()
    }

    #[test]
    fn test_parse_simple_tree() {
        let tree = read_tree("(S (NP (NNP John)) (VP (VBD ran)))").unwrap();

        assert_eq!(tree.len(), 7);
        assert_eq!(
            labels(&tree),
            vec!["S", "NP", "NNP", "John", "VP", "VBD", "ran"]
        );
        // node 0 is the root; structure is preorder
        assert_eq!(tree.num_children(0), 2);
        assert!(tree.is_leaf(3));
    }

    #[test]
    fn test_parse_handles_arbitrary_whitespace() {
        let tree = read_tree("( S\n  (NP (NNP John))\n  (VP (VBD ran)) )").unwrap();
        assert_eq!(
            labels(&tree),
            vec!["S", "NP", "NNP", "John", "VP", "VBD", "ran"]
        );
    }

    #[test]
    fn test_parse_empty_root_label() {
        // treebank files often wrap each sentence in an unlabeled bracket
        let tree = read_tree("( (S (NP (NNP John)) (VP (VBD ran))) )").unwrap();
        assert_eq!(tree.label(0), "");
        assert_eq!(tree.num_children(0), 1);
        assert_eq!(tree.label(tree.children(0)[0]), "S");
    }

    #[test]
    fn test_multiple_trees() {
        let text = "(S (X a))\n(S (Y b))\n\n(S (Z c))\n";
        let trees: Vec<Tree> = TreeReader::from_str(text).map(|r| r.unwrap()).collect();
        assert_eq!(trees.len(), 3);
        assert_eq!(labels(&trees[1]), vec!["S", "Y", "b"]);
    }

    #[test]
    fn test_unbalanced_close() {
        let mut reader = TreeReader::from_str("(S (X a)))");
        assert!(reader.next().unwrap().is_ok());
        // the stray ')' is a token-level error on the next read
        assert!(reader.next().unwrap().is_err());
        assert!(reader.next().is_none());
    }

    #[test]
    fn test_unexpected_eof() {
        let err = read_tree("(S (NP (NNP John)").unwrap_err();
        assert!(err.message.contains("end of input"));
    }

    #[test]
    fn test_token_outside_tree() {
        let err = read_tree("John (S (X a))").unwrap_err();
        assert!(err.message.contains("outside a tree"));
    }

    #[test]
    fn test_error_reports_line() {
        let text = "(S (X a))\n(S (Y\nb)";
        let mut reader = TreeReader::from_str(text);
        assert!(reader.next().unwrap().is_ok());
        let err = reader.next().unwrap().unwrap_err();
        assert_eq!(err.line, 3);
    }

    #[test]
    fn test_empty_input() {
        assert!(read_tree("").is_err());
        assert!(TreeReader::from_str("  \n ").next().is_none());
    }

    #[test]
    fn test_gzip_roundtrip() {
        use flate2::Compression;
        use flate2::write::GzEncoder;
        use std::io::Write;

        let text = "(S (NP (NNP John)) (VP (VBD ran)))";
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(text.as_bytes()).unwrap();
        let compressed = encoder.finish().unwrap();

        let trees: Vec<Tree> = TreeReader::from_bytes(compressed)
            .unwrap()
            .map(|r| r.unwrap())
            .collect();
        assert_eq!(trees.len(), 1);
        assert_eq!(trees[0].len(), 7);
    }
}
