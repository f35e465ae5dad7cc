use crate::span::Location;

#[derive(Debug, Clone, PartialEq)]
pub struct Program {
    pub statements: Vec<Statement>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    /// echo x + 1
    Print {
        expression: Expression,
        location: Location,
    },
    /// export proc name ... end
    ProcDecl {
        name: String,
        export: bool,
        body: Vec<Statement>,
        location: Location,
    },
    /// let x = 10
    VarDeclAssign {
        name: String,
        value: Expression,
        location: Location,
    },
    /// x = x + 1
    VarAssign {
        name: String,
        value: Expression,
        location: Location,
    },
    /// while (cond) ... end
    While {
        condition: Expression,
        body: Vec<Statement>,
        location: Location,
    },
    /// if (cond) ... [else ...] end
    If {
        condition: Expression,
        then_branch: Vec<Statement>,
        else_branch: Option<Vec<Statement>>,
        location: Location,
    },
}

impl Statement {
    pub fn location(&self) -> Location {
        match self {
            Statement::Print { location, .. }
            | Statement::ProcDecl { location, .. }
            | Statement::VarDeclAssign { location, .. }
            | Statement::VarAssign { location, .. }
            | Statement::While { location, .. }
            | Statement::If { location, .. } => *location,
        }
    }

    pub fn is_proc(&self) -> bool {
        matches!(self, Statement::ProcDecl { .. })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expression {
    /// 10, -2.5, 1e3
    NumberLiteral { value: f32, location: Location },
    /// x
    Identifier { name: String, location: Location },
    /// a + b, where `b` holds everything to the right of the operator
    BinaryExpr {
        left: Box<Expression>,
        op: BinaryOperator,
        right: Box<Expression>,
        location: Location,
    },
    /// (a + b)
    SubExpr {
        expression: Box<Expression>,
        location: Location,
    },
}

impl Expression {
    pub fn location(&self) -> Location {
        match self {
            Expression::NumberLiteral { location, .. }
            | Expression::Identifier { location, .. }
            | Expression::BinaryExpr { location, .. }
            | Expression::SubExpr { location, .. } => *location,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOperator {
    Add,          // +
    Subtract,     // -
    Multiply,     // *
    Divide,       // /
    Remainder,    // %
    Less,         // <
    Greater,      // >
    LessEqual,    // <=
    GreaterEqual, // >=
    Equal,        // ==
    ShiftLeft,    // <<
    ShiftRight,   // >>
    And,          // &&
    Or,           // ||
}

impl BinaryOperator {
    pub fn from_symbol(symbol: &str) -> Option<Self> {
        let op = match symbol {
            "+" => Self::Add,
            "-" => Self::Subtract,
            "*" => Self::Multiply,
            "/" => Self::Divide,
            "%" => Self::Remainder,
            "<" => Self::Less,
            ">" => Self::Greater,
            "<=" => Self::LessEqual,
            ">=" => Self::GreaterEqual,
            "==" => Self::Equal,
            "<<" => Self::ShiftLeft,
            ">>" => Self::ShiftRight,
            "&&" => Self::And,
            "||" => Self::Or,
            _ => return None,
        };
        Some(op)
    }

    pub fn symbol(&self) -> &'static str {
        match self {
            Self::Add => "+",
            Self::Subtract => "-",
            Self::Multiply => "*",
            Self::Divide => "/",
            Self::Remainder => "%",
            Self::Less => "<",
            Self::Greater => ">",
            Self::LessEqual => "<=",
            Self::GreaterEqual => ">=",
            Self::Equal => "==",
            Self::ShiftLeft => "<<",
            Self::ShiftRight => ">>",
            Self::And => "&&",
            Self::Or => "||",
        }
    }
}
