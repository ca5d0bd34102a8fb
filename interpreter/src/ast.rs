use std::rc::Rc;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum UnaryOperator {
    /// Arithmetic negation: -x
    Negation,
    /// Unary plus: +x
    Identity,
    /// Logical not: not x
    LogicalNot,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BinaryOperator {
    Addition,
    Subtraction,
    Multiplication,
    Division,
    FloorDivision,
    Modulo,
    Power,
    LeftShift,
    RightShift,
}

impl BinaryOperator {
    pub fn symbol(self) -> &'static str {
        match self {
            BinaryOperator::Addition => "+",
            BinaryOperator::Subtraction => "-",
            BinaryOperator::Multiplication => "*",
            BinaryOperator::Division => "/",
            BinaryOperator::FloorDivision => "//",
            BinaryOperator::Modulo => "%",
            BinaryOperator::Power => "** or pow()",
            BinaryOperator::LeftShift => "<<",
            BinaryOperator::RightShift => ">>",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BooleanOperator {
    And,
    Or,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CompareOperator {
    Equal,
    NotEqual,
    Less,
    LessEqual,
    Greater,
    GreaterEqual,
    In,
    NotIn,
    Is,
    IsNot,
}

impl CompareOperator {
    pub fn symbol(self) -> &'static str {
        match self {
            CompareOperator::Equal => "==",
            CompareOperator::NotEqual => "!=",
            CompareOperator::Less => "<",
            CompareOperator::LessEqual => "<=",
            CompareOperator::Greater => ">",
            CompareOperator::GreaterEqual => ">=",
            CompareOperator::In => "in",
            CompareOperator::NotIn => "not in",
            CompareOperator::Is => "is",
            CompareOperator::IsNot => "is not",
        }
    }
}

/// One piece of an f-string.
#[derive(Debug, Clone)]
pub enum FStringPart {
    Literal(String),
    Field {
        expr: Expr,
        /// `!r` / `!s` conversion.
        conversion: Option<char>,
        /// Format spec after `:`, empty when absent.
        spec: String,
    },
}

/// An expression AST node.
#[derive(Debug, Clone)]
pub enum Expr {
    // Literals
    None,
    Boolean(bool),
    Integer(i64),
    Float(f64),
    Str(String),
    FString(Vec<FStringPart>),

    Name(String),

    // Displays
    List(Vec<Expr>),
    Tuple(Vec<Expr>),
    Dict(Vec<(Expr, Expr)>),
    /// `[element for target in iter if condition]`
    ListComprehension {
        element: Box<Expr>,
        target: Box<Target>,
        iter: Box<Expr>,
        condition: Option<Box<Expr>>,
    },

    // Operations
    Unary {
        operator: UnaryOperator,
        operand: Box<Expr>,
    },
    Binary {
        operator: BinaryOperator,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Logical {
        operator: BooleanOperator,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    /// Chained comparison: `a < b <= c`.
    Compare {
        left: Box<Expr>,
        comparisons: Vec<(CompareOperator, Expr)>,
    },
    /// `body if condition else orelse`
    Conditional {
        condition: Box<Expr>,
        body: Box<Expr>,
        orelse: Box<Expr>,
    },

    // Trailers
    Call {
        function: Box<Expr>,
        arguments: Vec<Expr>,
        keywords: Vec<(String, Expr)>,
    },
    Attribute {
        value: Box<Expr>,
        name: String,
    },
    Subscript {
        value: Box<Expr>,
        index: Box<Expr>,
    },
    /// Only appears as the index of a subscript.
    Slice {
        start: Option<Box<Expr>>,
        stop: Option<Box<Expr>>,
        step: Option<Box<Expr>>,
    },
}

/// The left-hand side of an assignment, `for` loop or `del`.
#[derive(Debug, Clone)]
pub enum Target {
    Name(String),
    Subscript { value: Expr, index: Expr },
    Tuple(Vec<Target>),
}

impl Target {
    /// Every name bound by this target, in order.
    pub fn names(&self) -> Vec<&str> {
        match self {
            Target::Name(name) => vec![name.as_str()],
            Target::Subscript { .. } => Vec::new(),
            Target::Tuple(items) => items.iter().flat_map(|t| t.names()).collect(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Parameter {
    pub name: String,
    pub default: Option<Expr>,
}

#[derive(Debug)]
pub struct FunctionDef {
    pub name: String,
    pub parameters: Vec<Parameter>,
    pub body: Vec<Stmt>,
}

#[derive(Debug, Clone)]
pub struct ExceptHandler {
    /// Exception class (or tuple of classes) to match; `None` catches everything.
    pub class: Option<Expr>,
    pub binding: Option<String>,
    pub body: Vec<Stmt>,
}

/// A statement AST node.
#[derive(Debug, Clone)]
pub enum Stmt {
    Expression(Expr),
    /// `a = b = value`
    Assignment {
        targets: Vec<Target>,
        value: Expr,
    },
    AugmentedAssignment {
        target: Target,
        operator: BinaryOperator,
        value: Expr,
    },
    Pass,
    Break,
    Continue,
    Return(Option<Expr>),
    Raise(Option<Expr>),
    Delete(Vec<Target>),
    Global(Vec<String>),
    Assert {
        test: Expr,
        message: Option<Expr>,
    },
    If {
        branches: Vec<(Expr, Vec<Stmt>)>,
        orelse: Vec<Stmt>,
    },
    While {
        condition: Expr,
        body: Vec<Stmt>,
    },
    For {
        target: Target,
        iter: Expr,
        body: Vec<Stmt>,
    },
    FunctionDef(Rc<FunctionDef>),
    Try {
        body: Vec<Stmt>,
        handlers: Vec<ExceptHandler>,
        orelse: Vec<Stmt>,
        finalbody: Vec<Stmt>,
    },
}
