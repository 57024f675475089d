// ABOUTME: AST node definitions and the arena that owns them
//
// Process symbols need to reach the body they declare, and process-call
// expressions need to reach the symbol's signature and body; stored as
// owning trees this is a reference cycle. Instead statements and
// expressions live in flat arenas and every cross-reference (a block's
// children, a call's target) is an integer id, per the design note on
// cyclic process references.

use crate::error::Pos;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StmtId(pub usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ExprId(pub usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Type {
    Num,
    Bool,
    Str,
    Nil,
    Arr,
}

impl Type {
    pub fn name(&self) -> &'static str {
        match self {
            Type::Num => "num",
            Type::Bool => "bool",
            Type::Str => "str",
            Type::Nil => "nil",
            Type::Arr => "arr",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOpKind {
    Neg,
    Pos,
    Not,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOpKind {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    FloorDiv,
    Eq,
    NotEq,
    Gt,
    Lt,
    Ge,
    Le,
    And,
    Or,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum NumberLit {
    Int(i64),
    Float(f64),
}

#[derive(Debug, Clone)]
pub struct Param {
    pub name: String,
    pub ty: Type,
}

/// The left-hand side of an assignment: a fresh declaration, an existing
/// variable, or one or more levels of array indexing.
#[derive(Debug, Clone)]
pub enum AssignTarget {
    Declaration { name: String, ty: Type },
    Variable { name: String },
    ArrayElement { name: String, indices: Vec<ExprId> },
}

#[derive(Debug, Clone)]
pub enum Expr {
    Number(NumberLit, Pos),
    Boolean(bool, Pos),
    StringLit(String, Pos),
    Nothing(Pos),
    /// A variable read; `declared_type` is resolved once by the parser
    /// (invariant a) so the evaluator never re-resolves it.
    Variable {
        name: String,
        declared_type: Type,
        pos: Pos,
    },
    UnaryOp {
        op: UnaryOpKind,
        child: ExprId,
        pos: Pos,
    },
    BinaryOp {
        op: BinaryOpKind,
        left: ExprId,
        right: ExprId,
        pos: Pos,
    },
    ArrayInitialization {
        size: ExprId,
        pos: Pos,
    },
    ArrayElement {
        name: String,
        indices: Vec<ExprId>,
        pos: Pos,
    },
    /// Carries a direct reference (`proc`) to the resolved process's
    /// `Stmt::Process` node; arity against `proc`'s params is checked once
    /// at parse time (invariant b).
    ProcessCall {
        name: String,
        args: Vec<ExprId>,
        proc: StmtId,
        pos: Pos,
    },
}

impl Expr {
    pub fn pos(&self) -> Pos {
        match self {
            Expr::Number(_, p)
            | Expr::Boolean(_, p)
            | Expr::StringLit(_, p)
            | Expr::Nothing(p)
            | Expr::Variable { pos: p, .. }
            | Expr::UnaryOp { pos: p, .. }
            | Expr::BinaryOp { pos: p, .. }
            | Expr::ArrayInitialization { pos: p, .. }
            | Expr::ArrayElement { pos: p, .. }
            | Expr::ProcessCall { pos: p, .. } => *p,
        }
    }
}

#[derive(Debug, Clone)]
pub enum Stmt {
    /// `rhs` is `None` only for a bare declaration without an initializer
    /// (`i: num;`), which per the evaluator's semantics binds the name to
    /// `nothing` in the current frame.
    Assignment {
        target: AssignTarget,
        rhs: Option<ExprId>,
        pos: Pos,
    },
    Say {
        expr: ExprId,
        pos: Pos,
    },
    Return {
        expr: Option<ExprId>,
        pos: Pos,
    },
    /// If/elif/else chain; `else` is encoded as a trailing `(true, block)`
    /// arm by the parser.
    Conditions {
        arms: Vec<(ExprId, StmtId)>,
        pos: Pos,
    },
    As {
        init: Option<StmtId>,
        condition: ExprId,
        step: Option<StmtId>,
        body: StmtId,
        pos: Pos,
    },
    /// An expression evaluated for its side effects and discarded: a bare
    /// process call (`f();`), a bare array access, or any other `expr`
    /// used as a statement.
    ExprStmt {
        expr: ExprId,
        pos: Pos,
    },
    /// Declaration plus body; symbols store the `StmtId` of this node as
    /// their `body_ref`, and `Expr::ProcessCall` carries the same id.
    /// `scope_level` mirrors `Symbol::Process::scope_level` so the
    /// evaluator can resolve the callee's lexical enclosing frame without
    /// needing the (parse-time-only) symbol table.
    Process {
        name: String,
        return_type: Type,
        params: Vec<Param>,
        scope_level: usize,
        body: StmtId,
        pos: Pos,
    },
    Block(Vec<StmtId>),
    Program(Vec<StmtId>),
    Empty,
}

/// Owns every statement and expression node produced by the parser. Kept
/// append-only so ids handed out earlier stay valid for the whole parse.
#[derive(Debug, Default)]
pub struct Ast {
    stmts: Vec<Stmt>,
    exprs: Vec<Expr>,
}

impl Ast {
    pub fn new() -> Self {
        Ast::default()
    }

    /// Reserves a slot for a node whose id must be known before its
    /// content is built (a process symbol needs its body's `StmtId`
    /// before the body has been parsed, to support recursive calls).
    pub fn reserve_stmt(&mut self) -> StmtId {
        self.stmts.push(Stmt::Empty);
        StmtId(self.stmts.len() - 1)
    }

    pub fn fill_stmt(&mut self, id: StmtId, stmt: Stmt) {
        self.stmts[id.0] = stmt;
    }

    pub fn push_stmt(&mut self, stmt: Stmt) -> StmtId {
        self.stmts.push(stmt);
        StmtId(self.stmts.len() - 1)
    }

    pub fn push_expr(&mut self, expr: Expr) -> ExprId {
        self.exprs.push(expr);
        ExprId(self.exprs.len() - 1)
    }

    pub fn stmt(&self, id: StmtId) -> &Stmt {
        &self.stmts[id.0]
    }

    pub fn expr(&self, id: ExprId) -> &Expr {
        &self.exprs[id.0]
    }
}
