//! Open Synthesis Retrieval
//!
//! Hybrid retrieval over a domain-partitioned vector index:
//! - Dense nearest-neighbour search (vector store)
//! - BM25 re-scoring of the dense candidates
//! - Weighted reciprocal rank fusion
//! - Pluggable reranking

pub mod retrieval;

pub use retrieval::{
    Bm25Index, Bm25Params, DenseRetriever, HybridRetriever, IdentityReranker, RRFusion, Reranker,
    Retriever,
};
