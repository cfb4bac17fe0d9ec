//! Tree Walker
//!
//! Pre-order, document-order traversal. Every node is offered to every detector
//! in catalogue order; results are kept in that order without deduplication.

use std::panic::{catch_unwind, AssertUnwindSafe};
use tracing::error;

use super::syntax::{Node, SyntaxTree};
use super::{Catalogue, Finding};

/// Walk one tree and collect every finding (no file tag yet).
pub fn walk(tree: &SyntaxTree, catalogue: &Catalogue) -> Vec<Finding> {
    let mut findings = Vec::new();
    let mut stack: Vec<&Node> = vec![&tree.root];

    while let Some(node) = stack.pop() {
        evaluate(node, catalogue, &mut findings);

        let children = node.children();
        stack.extend(children.into_iter().rev());
    }

    findings
}

/// Run every detector on one node. A panicking detector is isolated so that
/// the remaining detectors and nodes are still evaluated.
fn evaluate(node: &Node, catalogue: &Catalogue, out: &mut Vec<Finding>) {
    for detector in catalogue.detectors() {
        match catch_unwind(AssertUnwindSafe(|| detector.check(node))) {
            Ok(Some(finding)) => out.push(finding),
            Ok(None) => {}
            Err(_) => {
                error!(rule = detector.id(), line = node.line, "detector panicked, skipping");
            }
        }
    }
}
