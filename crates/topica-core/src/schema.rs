//! Names of the node and edge types of the academic graph.

use crate::hetero::{EdgeType, NodeType};

pub const AUTHOR: &str = "author";
pub const PAPER: &str = "paper";
pub const TOPIC: &str = "topic";

pub const WRITES: &str = "writes";
pub const CITES: &str = "cites";
pub const ABOUT: &str = "about";
pub const NEXT_TOPIC: &str = "next_topic";

pub const INFOSPHERE_WRITES: &str = "infosphere_writes";
pub const INFOSPHERE_CITES: &str = "infosphere_cites";
pub const INFOSPHERE_ABOUT: &str = "infosphere_about";

pub fn author() -> NodeType {
    NodeType::new(AUTHOR)
}

pub fn paper() -> NodeType {
    NodeType::new(PAPER)
}

pub fn topic() -> NodeType {
    NodeType::new(TOPIC)
}

/// `author -[writes]-> paper`
pub fn writes() -> EdgeType {
    EdgeType::new(AUTHOR, WRITES, PAPER)
}

/// `paper -[cites]-> paper`
pub fn cites() -> EdgeType {
    EdgeType::new(PAPER, CITES, PAPER)
}

/// `paper -[about]-> topic`
pub fn about() -> EdgeType {
    EdgeType::new(PAPER, ABOUT, TOPIC)
}

/// The prediction target, `author -[next_topic]-> topic`.
pub fn next_topic() -> EdgeType {
    EdgeType::new(AUTHOR, NEXT_TOPIC, TOPIC)
}
