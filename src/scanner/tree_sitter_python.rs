use super::syntax::{BinOperator, Call, Constant, DictEntry, Keyword, Node, NodeKind, SyntaxTree};
use super::SourceParser;
use crate::error::ParseError;
use std::cell::RefCell;
use tracing::debug;
use tree_sitter::{Node as TsNode, Parser};

// ============================================================================
// thread_local Parser 复用
// ============================================================================
//
// Parser::new() 和 set_language() 涉及 native 层初始化和内存分配。
// 每个 rayon worker 只初始化一次 Parser。
//
// ============================================================================

thread_local! {
    static PYTHON_PARSER: RefCell<Option<Parser>> = const { RefCell::new(None) };
}

fn new_parser() -> Result<Parser, ParseError> {
    let mut parser = Parser::new();
    parser
        .set_language(&tree_sitter_python::language())
        .map_err(|e| ParseError::Language(e.to_string()))?;
    Ok(parser)
}

/// 获取或初始化线程本地 Parser
fn with_parser<F, R>(f: F) -> Result<R, ParseError>
where
    F: FnOnce(&mut Parser) -> Result<R, ParseError>,
{
    PYTHON_PARSER.with(|cell| {
        let mut slot = cell.borrow_mut();
        let parser = match slot.take() {
            Some(parser) => parser,
            None => new_parser()?,
        };
        f(slot.insert(parser))
    })
}

/// Python front end backed by tree-sitter-python.
#[derive(Debug, Default, Clone, Copy)]
pub struct PythonParser;

impl PythonParser {
    pub fn new() -> Self {
        Self
    }
}

impl SourceParser for PythonParser {
    fn supported_extension(&self) -> &str {
        "py"
    }

    fn parse(&self, code: &str) -> Result<SyntaxTree, ParseError> {
        parse_source(code)
    }
}

/// CST nesting limit; deeper files are rejected before lowering (CPython
/// stops at a similar depth). Lowering and dropping `Node` both recurse.
pub const MAX_NESTING_DEPTH: usize = 200;

/// Parse Python source into the lowered syntax tree.
///
/// tree-sitter recovers from malformed input instead of failing, so any ERROR
/// or MISSING node in the result is reported as a syntax error at the position
/// of the first one. Python 2 `print` / `exec` statements are syntax errors too.
pub fn parse_source(code: &str) -> Result<SyntaxTree, ParseError> {
    with_parser(|parser| {
        let tree = parser.parse(code, None).ok_or(ParseError::NoTree)?;
        let root = tree.root_node();

        if root.has_error() {
            let at = first_error(root).unwrap_or(root).start_position();
            debug!(line = at.row + 1, column = at.column + 1, "syntax error");
            return Err(ParseError::Syntax {
                line: at.row + 1,
                column: at.column + 1,
            });
        }

        check_structure(root, MAX_NESTING_DEPTH)?;

        let lowering = Lowering { src: code.as_bytes() };
        Ok(SyntaxTree {
            root: lowering.lower(root),
        })
    })
}

/// Pre-order search for the first ERROR / MISSING node, descending only into
/// subtrees that contain one.
fn first_error(root: TsNode<'_>) -> Option<TsNode<'_>> {
    let mut cursor = root.walk();
    loop {
        let node = cursor.node();
        if node.is_error() || node.is_missing() {
            return Some(node);
        }
        if !cursor.goto_first_child() {
            return None;
        }
        while !cursor.node().has_error() {
            if !cursor.goto_next_sibling() {
                return None;
            }
        }
    }
}

/// `print(x)` is a call in Python 3; only the bare / chevron forms are Python 2.
fn is_python2_print(node: TsNode<'_>) -> bool {
    let mut cursor = node.walk();
    let args: Vec<_> = node.named_children(&mut cursor).collect();
    !matches!(
        args.as_slice(),
        [only] if matches!(only.kind(), "parenthesized_expression" | "tuple")
    )
}

/// Iterative walk over the whole CST: rejects Python 2 statements and
/// nesting deeper than `limit`.
fn check_structure(root: TsNode<'_>, limit: usize) -> Result<(), ParseError> {
    let mut cursor = root.walk();
    let mut depth = 0usize;

    loop {
        let node = cursor.node();
        let python2 = match node.kind() {
            "exec_statement" => true,
            "print_statement" => is_python2_print(node),
            _ => false,
        };
        if python2 {
            let at = node.start_position();
            debug!(line = at.row + 1, kind = node.kind(), "python 2 statement");
            return Err(ParseError::Syntax {
                line: at.row + 1,
                column: at.column + 1,
            });
        }
        if depth > limit {
            return Err(ParseError::TooDeep {
                line: line_of(node),
                limit,
            });
        }

        if cursor.goto_first_child() {
            depth += 1;
            continue;
        }
        while !cursor.goto_next_sibling() {
            if !cursor.goto_parent() {
                return Ok(());
            }
            depth -= 1;
        }
    }
}

fn line_of(node: TsNode<'_>) -> usize {
    node.start_position().row + 1
}

// ============================================================================
// CST -> Node lowering
// ============================================================================

struct Lowering<'a> {
    src: &'a [u8],
}

impl<'a> Lowering<'a> {
    fn text(&self, node: TsNode<'_>) -> &'a str {
        node.utf8_text(self.src).unwrap_or("")
    }

    /// Named children without comments and line continuations
    fn named_children<'t>(&self, node: TsNode<'t>) -> Vec<TsNode<'t>> {
        let mut cursor = node.walk();
        node.named_children(&mut cursor)
            .filter(|c| !c.is_extra() && c.kind() != "comment")
            .collect()
    }

    fn lower(&self, node: TsNode<'_>) -> Node {
        let kind = match node.kind() {
            "call" => return self.lower_call(node),
            "assignment" => return self.lower_assignment(node),
            "parenthesized_expression" => {
                let inner = self.named_children(node);
                if let [only] = inner.as_slice() {
                    return self.lower(*only);
                }
                self.other(node)
            }
            "attribute" => self.lower_attribute(node),
            "identifier" => NodeKind::Name(self.text(node).to_string()),
            "string" => self.lower_string(node),
            "concatenated_string" => self.lower_concatenated_string(node),
            "true" => NodeKind::Constant(Constant::Bool(true)),
            "false" => NodeKind::Constant(Constant::Bool(false)),
            "none" => NodeKind::Constant(Constant::None),
            "integer" | "float" => NodeKind::Constant(Constant::Number(self.text(node).to_string())),
            "binary_operator" => self.lower_binary_operator(node),
            "dictionary" => self.lower_dictionary(node),
            _ => self.other(node),
        };
        Node::new(line_of(node), kind)
    }

    fn other(&self, node: TsNode<'_>) -> NodeKind {
        NodeKind::Other {
            kind: node.kind(),
            children: self
                .named_children(node)
                .into_iter()
                .map(|c| self.lower(c))
                .collect(),
        }
    }

    fn lower_call(&self, node: TsNode<'_>) -> Node {
        let line = line_of(node);
        let Some(function) = node.child_by_field_name("function") else {
            return Node::new(line, self.other(node));
        };

        let mut args = Vec::new();
        let mut keywords = Vec::new();

        if let Some(arguments) = node.child_by_field_name("arguments") {
            if arguments.kind() == "argument_list" {
                for arg in self.named_children(arguments) {
                    match arg.kind() {
                        "keyword_argument" => {
                            let name = arg.child_by_field_name("name");
                            let value = arg.child_by_field_name("value");
                            if let (Some(name), Some(value)) = (name, value) {
                                keywords.push(Keyword {
                                    arg: Some(self.text(name).to_string()),
                                    value: self.lower(value),
                                });
                            }
                        }
                        "dictionary_splat" => {
                            if let Some(inner) = self.named_children(arg).into_iter().next() {
                                keywords.push(Keyword {
                                    arg: None,
                                    value: self.lower(inner),
                                });
                            }
                        }
                        _ => args.push(self.lower(arg)),
                    }
                }
            } else {
                // f(x for x in xs)
                args.push(self.lower(arguments));
            }
        }

        Node::new(
            line,
            NodeKind::Call(Call {
                func: Box::new(self.lower(function)),
                args,
                keywords,
            }),
        )
    }

    /// `a = b = value` flattens into one Assign with two targets.
    fn lower_assignment(&self, node: TsNode<'_>) -> Node {
        let line = line_of(node);
        let (Some(left), Some(mut value), None) = (
            node.child_by_field_name("left"),
            node.child_by_field_name("right"),
            node.child_by_field_name("type"),
        ) else {
            return Node::new(line, self.other(node));
        };

        let mut targets = vec![self.lower(left)];
        while value.kind() == "assignment" && value.child_by_field_name("type").is_none() {
            match (
                value.child_by_field_name("left"),
                value.child_by_field_name("right"),
            ) {
                (Some(next_left), Some(next_right)) => {
                    targets.push(self.lower(next_left));
                    value = next_right;
                }
                _ => break,
            }
        }

        Node::new(
            line,
            NodeKind::Assign {
                targets,
                value: Box::new(self.lower(value)),
            },
        )
    }

    fn lower_attribute(&self, node: TsNode<'_>) -> NodeKind {
        match (
            node.child_by_field_name("object"),
            node.child_by_field_name("attribute"),
        ) {
            (Some(object), Some(attr)) => NodeKind::Attribute {
                value: Box::new(self.lower(object)),
                attr: self.text(attr).to_string(),
            },
            _ => self.other(node),
        }
    }

    fn lower_binary_operator(&self, node: TsNode<'_>) -> NodeKind {
        let parts = (
            node.child_by_field_name("left"),
            node.child_by_field_name("operator"),
            node.child_by_field_name("right"),
        );
        if let (Some(left), Some(op), Some(right)) = parts {
            if let Some(op) = BinOperator::from_token(self.text(op)) {
                return NodeKind::BinOp {
                    left: Box::new(self.lower(left)),
                    op,
                    right: Box::new(self.lower(right)),
                };
            }
        }
        self.other(node)
    }

    fn lower_dictionary(&self, node: TsNode<'_>) -> NodeKind {
        let mut entries = Vec::new();
        for child in self.named_children(node) {
            match child.kind() {
                "pair" => {
                    let key = child.child_by_field_name("key");
                    let value = child.child_by_field_name("value");
                    if let (Some(key), Some(value)) = (key, value) {
                        entries.push(DictEntry {
                            key: Some(self.lower(key)),
                            value: self.lower(value),
                        });
                    }
                }
                "dictionary_splat" => {
                    if let Some(inner) = self.named_children(child).into_iter().next() {
                        entries.push(DictEntry {
                            key: None,
                            value: self.lower(inner),
                        });
                    }
                }
                _ => {}
            }
        }
        NodeKind::Dict { entries }
    }

    fn lower_string(&self, node: TsNode<'_>) -> NodeKind {
        let children = self.named_children(node);
        let start = children.iter().find(|c| c.kind() == "string_start");
        let end = children.iter().rev().find(|c| c.kind() == "string_end");

        let prefix: String = start
            .map(|s| self.text(*s))
            .unwrap_or_else(|| self.text(node))
            .chars()
            .take_while(|c| *c != '"' && *c != '\'')
            .collect::<String>()
            .to_ascii_lowercase();

        let interpolations: Vec<Node> = children
            .iter()
            .filter(|c| c.kind() == "interpolation")
            .filter_map(|c| c.child_by_field_name("expression"))
            .map(|e| self.lower(e))
            .collect();

        if prefix.contains('f') || !interpolations.is_empty() {
            return NodeKind::JoinedStr {
                values: interpolations,
            };
        }

        let body = match (start, end) {
            (Some(s), Some(e)) if s.end_byte() <= e.start_byte() => {
                String::from_utf8_lossy(&self.src[s.end_byte()..e.start_byte()]).into_owned()
            }
            _ => self
                .text(node)
                .trim_start_matches(|c: char| c.is_ascii_alphabetic())
                .trim_matches(|c| c == '"' || c == '\'')
                .to_string(),
        };

        if prefix.contains('b') {
            NodeKind::Constant(Constant::Bytes(body))
        } else {
            NodeKind::Constant(Constant::Str(body))
        }
    }

    /// `"a" "b"` is a single constant; any f-string part makes the whole a JoinedStr.
    fn lower_concatenated_string(&self, node: TsNode<'_>) -> NodeKind {
        let parts: Vec<NodeKind> = self
            .named_children(node)
            .into_iter()
            .filter(|c| c.kind() == "string")
            .map(|c| self.lower_string(c))
            .collect();

        if parts.iter().any(|p| matches!(p, NodeKind::JoinedStr { .. })) {
            let values = parts
                .into_iter()
                .flat_map(|p| match p {
                    NodeKind::JoinedStr { values } => values,
                    _ => Vec::new(),
                })
                .collect();
            return NodeKind::JoinedStr { values };
        }

        let mut text = String::new();
        let mut all_bytes = !parts.is_empty();
        for part in &parts {
            match part {
                NodeKind::Constant(Constant::Str(s)) => {
                    all_bytes = false;
                    text.push_str(s);
                }
                NodeKind::Constant(Constant::Bytes(s)) => text.push_str(s),
                _ => {}
            }
        }

        if all_bytes {
            NodeKind::Constant(Constant::Bytes(text))
        } else {
            NodeKind::Constant(Constant::Str(text))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// First statement's expression (unwraps module / expression_statement)
    fn first_expr(code: &str) -> Node {
        let tree = parse_source(code).unwrap();
        let NodeKind::Other { kind: "module", children } = tree.root.kind else {
            panic!("root should be a module");
        };
        let stmt = children.into_iter().next().expect("one statement");
        match stmt.kind {
            NodeKind::Other {
                kind: "expression_statement",
                children,
            } => children.into_iter().next().expect("expression"),
            _ => stmt,
        }
    }

    #[test]
    fn test_lower_attribute_call_with_keywords() {
        let node = first_expr("subprocess.run(cmd, shell=True, **extra)\n");
        let call = node.as_call().expect("call");

        assert_eq!(call.attr_name(), Some("run"));
        assert_eq!(call.args.len(), 1);
        assert_eq!(call.keywords.len(), 2);
        assert_eq!(call.keywords[0].arg.as_deref(), Some("shell"));
        assert!(call.keywords[0].value.is_bool(true));
        assert_eq!(call.keywords[1].arg, None);
    }

    #[test]
    fn test_lower_chained_assignment() {
        let node = first_expr("a = b = 'x'\n");
        let NodeKind::Assign { targets, value } = node.kind else {
            panic!("expected assignment");
        };
        let names: Vec<_> = targets.iter().filter_map(|t| t.as_name()).collect();
        assert_eq!(names, vec!["a", "b"]);
        assert_eq!(value.as_str_constant(), Some("x"));
    }

    #[test]
    fn test_annotated_assignment_is_not_assign() {
        let node = first_expr("password: str = 'x'\n");
        assert!(matches!(node.kind, NodeKind::Other { .. }));
    }

    #[test]
    fn test_lower_string_kinds() {
        assert_eq!(
            first_expr("'abc'\n").kind,
            NodeKind::Constant(Constant::Str("abc".into()))
        );
        assert_eq!(
            first_expr("b'abc'\n").kind,
            NodeKind::Constant(Constant::Bytes("abc".into()))
        );
        assert_eq!(
            first_expr("'ab' 'cd'\n").kind,
            NodeKind::Constant(Constant::Str("abcd".into()))
        );

        let NodeKind::JoinedStr { values } = first_expr("f'id={user}'\n").kind else {
            panic!("expected f-string");
        };
        assert_eq!(values.len(), 1);
        assert_eq!(values[0].as_name(), Some("user"));
    }

    #[test]
    fn test_parentheses_are_transparent() {
        let node = first_expr("(\"q %s\" % x)\n");
        assert!(matches!(
            node.kind,
            NodeKind::BinOp {
                op: BinOperator::Mod,
                ..
            }
        ));
    }

    #[test]
    fn test_dictionary_entries() {
        let node = first_expr("{'verify_signature': False, **rest}\n");
        let NodeKind::Dict { entries } = node.kind else {
            panic!("expected dict");
        };
        assert_eq!(entries.len(), 2);
        assert_eq!(
            entries[0].key.as_ref().and_then(|k| k.as_str_constant()),
            Some("verify_signature")
        );
        assert!(entries[0].value.is_bool(false));
        assert!(entries[1].key.is_none());
    }

    #[test]
    fn test_line_numbers_are_one_based() {
        let node = first_expr("\n\n\neval('1+1')\n");
        assert_eq!(node.line, 4);
    }

    #[test]
    fn test_comments_are_not_nodes() {
        let tree = parse_source("# just a comment\nx = 1  # trailing\n").unwrap();
        let NodeKind::Other { children, .. } = tree.root.kind else {
            panic!("root should be a module");
        };
        assert_eq!(children.len(), 1);
    }

    #[test]
    fn test_syntax_error_reports_position() {
        let err = parse_source("def broken(:\n    pass\n").unwrap_err();
        match err {
            ParseError::Syntax { line, .. } => assert_eq!(line, 1),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_python2_statements_are_syntax_errors() {
        for code in ["print 'py2'\neval(x)\n", "exec 'code'\n", "x = 1\nprint >>sys.stderr, x\n"] {
            assert!(
                matches!(parse_source(code), Err(ParseError::Syntax { .. })),
                "accepted: {code:?}"
            );
        }
        assert!(parse_source("print('py3')\nprint(a, b)\n").is_ok());
        assert!(parse_source("exec(code)\n").is_ok());
    }

    fn nested_list(depth: usize) -> String {
        format!("x = {}1{}\n", "[".repeat(depth), "]".repeat(depth))
    }

    #[test]
    fn test_deep_nesting_is_rejected_before_lowering() {
        match parse_source(&nested_list(5000)) {
            Err(ParseError::TooDeep { line, limit }) => {
                assert_eq!(line, 1);
                assert_eq!(limit, MAX_NESTING_DEPTH);
            }
            other => panic!("expected TooDeep, got {other:?}"),
        }
        assert!(parse_source(&nested_list(50)).is_ok());
    }

    #[test]
    fn test_parser_is_reused_across_calls() {
        for _ in 0..3 {
            assert!(parse_source("print('ok')\n").is_ok());
        }
    }
}
