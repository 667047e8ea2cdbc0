pub mod builder;
pub mod config;
pub mod dialect;
pub mod er_ast;
pub mod er_parser;
pub mod error;
pub mod graph_ast;
pub mod graph_layout;
pub mod graph_parser;
pub mod label;
pub mod layout;
pub mod mindmap_ast;
pub mod mindmap_parser;
pub mod model;
pub mod pie_ast;
pub mod pie_parser;
pub mod reduce;
pub mod sequence_ast;
pub mod sequence_layout;
pub mod sequence_parser;
pub mod serializer;
pub mod sidecar;
pub mod state_ast;
pub mod state_parser;
pub mod style;
pub mod tree_layout;

use tracing::{debug, warn};

pub use config::LayoutConfig;
pub use error::{MadrawError, Result};
pub use model::{Dialect, Edge, Graph, Node};

use sidecar::Sidecar;

/// Parse DSL text into a positioned graph with the default layout settings.
pub fn parse(input: &str) -> Graph {
    Converter::default().parse(input)
}

/// Write a graph back as DSL text, sidecar lines included.
pub fn serialize(graph: &Graph) -> String {
    serializer::serialize(graph)
}

/// Both conversion directions bound to one layout configuration.
#[derive(Debug, Clone, Default)]
pub struct Converter {
    config: LayoutConfig,
}

impl Converter {
    pub fn new(config: LayoutConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &LayoutConfig {
        &self.config
    }

    pub fn parse(&self, input: &str) -> Graph {
        let dialect = dialect::detect(input);
        let mut graph = reduce::reduce(dialect, input);

        let sidecar = Sidecar::extract(input, dialect.comment_marker());
        let positioned = sidecar.apply(&mut graph);
        layout::apply_layout(&mut graph, &positioned, &self.config);

        for node in &mut graph.nodes {
            node.style = style::node_override(dialect, node);
        }
        for edge in &mut graph.edges {
            edge.style = style::edge_override(dialect, edge.arrow, &edge.style);
        }

        for problem in graph.invariant_violations() {
            warn!(dialect = dialect.as_str(), %problem, "parsed graph breaks an invariant");
        }
        debug!(
            dialect = dialect.as_str(),
            nodes = graph.nodes.len(),
            edges = graph.edges.len(),
            "parsed"
        );
        graph
    }

    pub fn serialize(&self, graph: &Graph) -> String {
        serializer::serialize(graph)
    }
}
