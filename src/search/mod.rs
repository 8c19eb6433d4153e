//! Retrieval: exact cosine scans, BM25 lexical index, and the hybrid matcher.

pub mod bm25;
pub mod hybrid;
pub mod lexical;
pub mod vector;
