//! Abstract Syntax Tree definitions for Moo.
//!
//! Every statement and expression carries a [`NodeId`] and a [`Span`].
//! Identifiers carry a [`Role`] which starts out `Unresolved` and is filled
//! in exactly once by the binder before code generation.

use moo_common::ErrorKind;

use crate::token::Span;

/// Unique id of a statement or expression within one parse.
pub type NodeId = u32;

/// Dense variable slot index.
pub type VarId = u32;

/// What an identifier refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Unresolved,
    /// A local variable slot.
    Var(VarId),
    /// A call to a builtin function.
    Builtin,
    /// A property name after `.`.
    Prop,
    /// A verb name after `.` and before `(`.
    Verb,
    /// A trait name after `$`.
    Trait,
}

/// An identifier occurrence.
#[derive(Debug, Clone, PartialEq)]
pub struct Ident {
    pub name: String,
    pub role: Role,
    pub span: Span,
}

impl Ident {
    pub fn new(name: impl Into<String>, span: Span) -> Self {
        Self {
            name: name.into(),
            role: Role::Unresolved,
            span,
        }
    }

    /// The variable slot, if the binder made this a variable.
    pub fn var_id(&self) -> Option<VarId> {
        match self.role {
            Role::Var(id) => Some(id),
            _ => None,
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Statements
// ═══════════════════════════════════════════════════════════════════════════

/// A `{ ... }` statement list. A program is one top-level block.
#[derive(Debug, Clone, PartialEq)]
pub struct Block {
    pub stmts: Vec<Stmt>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Stmt {
    pub id: NodeId,
    pub kind: StmtKind,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub enum StmtKind {
    Block(Block),
    If(Box<IfStmt>),
    While {
        cond: Expr,
        body: Block,
    },
    /// `for (value in expr)` / `for (value, key in expr)`
    ForIn {
        value: Ident,
        key: Option<Ident>,
        iter: Expr,
        body: Block,
    },
    /// `for (var in from..to)`, inclusive of both ends.
    ForRange {
        var: Ident,
        from: Expr,
        to: Expr,
        body: Block,
    },
    /// `for (init; check; incr)`
    ForClassic(Box<ForClassic>),
    Try(Box<TryStmt>),
    Return(Option<Expr>),
    Throw(Expr),
    Break,
    Continue,
    /// `[a, b, c] = expr;`
    Destructure {
        targets: Vec<Ident>,
        value: Expr,
    },
    Assign {
        target: Expr,
        op: AssignOp,
        value: Expr,
    },
    /// `x++` / `x--`
    IncDec {
        target: Expr,
        increment: bool,
    },
    Expr(Expr),
}

#[derive(Debug, Clone, PartialEq)]
pub struct IfStmt {
    pub cond: Expr,
    pub then_block: Block,
    /// Either a block or another `if` statement.
    pub else_branch: Option<Stmt>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ForClassic {
    pub init: Option<Stmt>,
    pub check: Option<Expr>,
    pub incr: Option<Stmt>,
    pub body: Block,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TryStmt {
    pub body: Block,
    pub catch: CatchClause,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CatchClause {
    /// Error kinds handled; empty means any.
    pub kinds: Vec<ErrorKind>,
    pub name: Option<Ident>,
    pub body: Block,
    pub span: Span,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssignOp {
    Assign,
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Pow,
}

impl AssignOp {
    /// The binary operator a compound assignment applies.
    pub fn binary_op(self) -> Option<BinaryOp> {
        match self {
            AssignOp::Assign => None,
            AssignOp::Add => Some(BinaryOp::Add),
            AssignOp::Sub => Some(BinaryOp::Sub),
            AssignOp::Mul => Some(BinaryOp::Mul),
            AssignOp::Div => Some(BinaryOp::Div),
            AssignOp::Mod => Some(BinaryOp::Mod),
            AssignOp::Pow => Some(BinaryOp::Pow),
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Expressions
// ═══════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq)]
pub struct Expr {
    pub id: NodeId,
    pub kind: ExprKind,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    Obj(i64),
    Err(ErrorKind),
}

#[derive(Debug, Clone, PartialEq)]
pub enum InterpPart {
    Text(String),
    Expr(Expr),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Pow,
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
    In,
}

impl BinaryOp {
    pub fn symbol(self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Mod => "%",
            BinaryOp::Pow => "^",
            BinaryOp::Eq => "==",
            BinaryOp::NotEq => "!=",
            BinaryOp::Lt => "<",
            BinaryOp::LtEq => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::GtEq => ">=",
            BinaryOp::In => "in",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Neg,
    Not,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogicalOp {
    And,
    Or,
}

/// Type names accepted after `is`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeName {
    Int,
    Float,
    Str,
    Bool,
    List,
    Map,
    Obj,
    Trait,
    Fn,
    Task,
    Err,
    Null,
}

impl TypeName {
    pub fn from_name(name: &str) -> Option<TypeName> {
        Some(match name {
            "int" => TypeName::Int,
            "float" => TypeName::Float,
            "str" => TypeName::Str,
            "bool" => TypeName::Bool,
            "list" => TypeName::List,
            "map" => TypeName::Map,
            "obj" => TypeName::Obj,
            "trait" => TypeName::Trait,
            "fn" => TypeName::Fn,
            "task" => TypeName::Task,
            "err" => TypeName::Err,
            "null" => TypeName::Null,
            _ => return None,
        })
    }

    pub fn name(self) -> &'static str {
        match self {
            TypeName::Int => "int",
            TypeName::Float => "float",
            TypeName::Str => "str",
            TypeName::Bool => "bool",
            TypeName::List => "list",
            TypeName::Map => "map",
            TypeName::Obj => "obj",
            TypeName::Trait => "trait",
            TypeName::Fn => "fn",
            TypeName::Task => "task",
            TypeName::Err => "err",
            TypeName::Null => "null",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExprKind {
    Literal(Literal),
    /// A string with `${...}` substitutions.
    Interp(Vec<InterpPart>),
    Ident(Ident),
    List(Vec<Expr>),
    Map(Vec<(Expr, Expr)>),
    /// `$name`
    TraitRef(Ident),
    /// `E_RANGE("message")`
    ErrorMsg {
        kind: ErrorKind,
        message: Box<Expr>,
    },
    Unary {
        op: UnaryOp,
        expr: Box<Expr>,
    },
    Binary {
        op: BinaryOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    Logical {
        op: LogicalOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    /// `a ?: b`
    Elvis {
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    /// `c ? a : b`
    Cond {
        cond: Box<Expr>,
        then_expr: Box<Expr>,
        else_expr: Box<Expr>,
    },
    Index {
        target: Box<Expr>,
        index: Box<Expr>,
    },
    /// `a[from..to]`
    Slice {
        target: Box<Expr>,
        from: Box<Expr>,
        to: Box<Expr>,
    },
    Prop {
        target: Box<Expr>,
        name: Ident,
    },
    VerbCall {
        target: Box<Expr>,
        name: Ident,
        args: Vec<Expr>,
    },
    /// `obj.$trait`
    TraitOf {
        target: Box<Expr>,
        name: Ident,
    },
    Call {
        callee: Box<Expr>,
        args: Vec<Expr>,
    },
    Func(Box<FuncLit>),
    Fork(Box<ForkExpr>),
    TryExpr(Box<TryExpr>),
    When(Box<WhenExpr>),
    IsType {
        expr: Box<Expr>,
        ty: TypeName,
    },
    IsTrait {
        expr: Box<Expr>,
        trait_expr: Box<Expr>,
    },
    /// `suspend(secs)` / `suspend()`
    Suspend(Option<Box<Expr>>),
}

/// `fn (a, b) { ... }` or `fn (a) -> expr`.
#[derive(Debug, Clone, PartialEq)]
pub struct FuncLit {
    pub params: Vec<Ident>,
    pub body: Block,
    /// Free variables of the body, filled in by the binder.
    pub captured: Vec<VarId>,
}

/// `fork (delay) { ... }`
#[derive(Debug, Clone, PartialEq)]
pub struct ForkExpr {
    pub delay: Expr,
    pub body: Block,
    /// Variables the body reads from the forking scope, filled in by the binder.
    pub captured: Vec<VarId>,
}

/// `try expr catch (KINDS) as e -> fallback`
#[derive(Debug, Clone, PartialEq)]
pub struct TryExpr {
    pub expr: Expr,
    pub kinds: Vec<ErrorKind>,
    pub name: Option<Ident>,
    pub fallback: Expr,
}

#[derive(Debug, Clone, PartialEq)]
pub struct WhenExpr {
    pub subject: Option<Expr>,
    pub arms: Vec<WhenArm>,
    pub else_arm: Option<Expr>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct WhenArm {
    /// Values compared to the subject, or conditions when there is none.
    pub conds: Vec<Expr>,
    pub result: Expr,
}

impl Expr {
    /// Whether the expression can appear on the left of `=`.
    pub fn is_assignable(&self) -> bool {
        matches!(
            self.kind,
            ExprKind::Ident(_) | ExprKind::Index { .. } | ExprKind::Prop { .. }
        )
    }

    pub fn as_ident(&self) -> Option<&Ident> {
        match &self.kind {
            ExprKind::Ident(ident) => Some(ident),
            _ => None,
        }
    }
}
