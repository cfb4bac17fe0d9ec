//! 语法树模型 (Syntax Tree)
//!
//! Detectors never see tree-sitter nodes directly. The Python front end lowers
//! the concrete syntax tree into this closed set of shapes, and every rule is an
//! exhaustive match over [`NodeKind`].

/// One parsed source file.
#[derive(Debug, Clone, PartialEq)]
pub struct SyntaxTree {
    pub root: Node,
}

/// A syntax node with its 1-based source line.
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub line: usize,
    pub kind: NodeKind,
}

#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind {
    /// `func(args..., name=value, **extra)`
    Call(Call),
    /// `value.attr`
    Attribute { value: Box<Node>, attr: String },
    /// Bare identifier reference
    Name(String),
    /// `t1 = t2 = value` (annotated and augmented assignments are `Other`)
    Assign { targets: Vec<Node>, value: Box<Node> },
    Constant(Constant),
    BinOp {
        left: Box<Node>,
        op: BinOperator,
        right: Box<Node>,
    },
    /// f-string; `values` holds the interpolated expressions
    JoinedStr { values: Vec<Node> },
    Dict { entries: Vec<DictEntry> },
    /// Every shape no rule inspects, kept so the walker still reaches its children
    Other {
        kind: &'static str,
        children: Vec<Node>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Call {
    pub func: Box<Node>,
    pub args: Vec<Node>,
    pub keywords: Vec<Keyword>,
}

/// Keyword argument; `arg` is `None` for `**mapping`.
#[derive(Debug, Clone, PartialEq)]
pub struct Keyword {
    pub arg: Option<String>,
    pub value: Node,
}

/// Dict literal entry; `key` is `None` for `**mapping`.
#[derive(Debug, Clone, PartialEq)]
pub struct DictEntry {
    pub key: Option<Node>,
    pub value: Node,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Constant {
    Str(String),
    Bytes(String),
    Bool(bool),
    Number(String),
    None,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOperator {
    Add,
    Sub,
    Mult,
    MatMult,
    Div,
    FloorDiv,
    Mod,
    Pow,
    LShift,
    RShift,
    BitOr,
    BitXor,
    BitAnd,
}

impl BinOperator {
    pub fn from_token(token: &str) -> Option<Self> {
        let op = match token {
            "+" => Self::Add,
            "-" => Self::Sub,
            "*" => Self::Mult,
            "@" => Self::MatMult,
            "/" => Self::Div,
            "//" => Self::FloorDiv,
            "%" => Self::Mod,
            "**" => Self::Pow,
            "<<" => Self::LShift,
            ">>" => Self::RShift,
            "|" => Self::BitOr,
            "^" => Self::BitXor,
            "&" => Self::BitAnd,
            _ => return None,
        };
        Some(op)
    }
}

impl Node {
    pub fn new(line: usize, kind: NodeKind) -> Self {
        Self { line, kind }
    }

    pub fn as_call(&self) -> Option<&Call> {
        match &self.kind {
            NodeKind::Call(call) => Some(call),
            _ => None,
        }
    }

    pub fn as_name(&self) -> Option<&str> {
        match &self.kind {
            NodeKind::Name(id) => Some(id),
            _ => None,
        }
    }

    /// `(receiver, attribute name)` for an attribute access
    pub fn as_attribute(&self) -> Option<(&Node, &str)> {
        match &self.kind {
            NodeKind::Attribute { value, attr } => Some((value, attr)),
            _ => None,
        }
    }

    pub fn as_constant(&self) -> Option<&Constant> {
        match &self.kind {
            NodeKind::Constant(c) => Some(c),
            _ => None,
        }
    }

    /// Literal `True` / `False` only; truthy expressions do not count.
    pub fn is_bool(&self, expected: bool) -> bool {
        matches!(self.as_constant(), Some(Constant::Bool(b)) if *b == expected)
    }

    /// Text of a `str` constant (bytes literals are excluded)
    pub fn as_str_constant(&self) -> Option<&str> {
        match self.as_constant() {
            Some(Constant::Str(s)) => Some(s),
            _ => None,
        }
    }

    /// Direct children in field order.
    pub fn children(&self) -> Vec<&Node> {
        match &self.kind {
            NodeKind::Call(call) => {
                let mut out = Vec::with_capacity(1 + call.args.len() + call.keywords.len());
                out.push(call.func.as_ref());
                out.extend(call.args.iter());
                out.extend(call.keywords.iter().map(|kw| &kw.value));
                out
            }
            NodeKind::Attribute { value, .. } => vec![value.as_ref()],
            NodeKind::Assign { targets, value } => {
                let mut out: Vec<&Node> = targets.iter().collect();
                out.push(value.as_ref());
                out
            }
            NodeKind::BinOp { left, right, .. } => vec![left.as_ref(), right.as_ref()],
            NodeKind::JoinedStr { values } => values.iter().collect(),
            NodeKind::Dict { entries } => entries
                .iter()
                .flat_map(|e| e.key.iter().chain(std::iter::once(&e.value)))
                .collect(),
            NodeKind::Other { children, .. } => children.iter().collect(),
            NodeKind::Name(_) | NodeKind::Constant(_) => Vec::new(),
        }
    }
}

impl Call {
    /// Attribute name of the call target, e.g. `load` for `pickle.load(...)`
    pub fn attr_name(&self) -> Option<&str> {
        self.func.as_attribute().map(|(_, attr)| attr)
    }

    /// Bare function name, e.g. `eval` for `eval(...)`
    pub fn func_name(&self) -> Option<&str> {
        self.func.as_name()
    }

    /// True when any keyword `name` is the literal boolean `expected`.
    pub fn has_bool_keyword(&self, name: &str, expected: bool) -> bool {
        self.keywords
            .iter()
            .any(|kw| kw.arg.as_deref() == Some(name) && kw.value.is_bool(expected))
    }
}
