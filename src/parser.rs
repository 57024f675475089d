// ABOUTME: Recursive-descent parser building a typed AST against a scoped symbol table

use crate::ast::{AssignTarget, Ast, BinaryOpKind, Expr, ExprId, NumberLit, Param, Stmt, StmtId, Type, UnaryOpKind};
use crate::error::{CouError, ParseError, ScopeError};
use crate::error::Pos;
use crate::lexer::Lexer;
use crate::symbol::{Symbol, SymbolTable};
use crate::token::{Token, TokenKind, TokenValue};

pub fn parse(source: &str) -> Result<(Ast, StmtId), CouError> {
    Parser::new(source)?.parse_program()
}

pub struct Parser {
    lexer: Lexer,
    current: Token,
    ast: Ast,
    symtab: SymbolTable,
}

impl Parser {
    pub fn new(source: &str) -> Result<Self, CouError> {
        let mut lexer = Lexer::new(source);
        let current = lexer.produce()?;
        Ok(Parser {
            lexer,
            current,
            ast: Ast::new(),
            symtab: SymbolTable::root(),
        })
    }

    pub fn parse_program(mut self) -> Result<(Ast, StmtId), CouError> {
        let program = self.program()?;
        Ok((self.ast, program))
    }

    fn pos(&self) -> Pos {
        Pos::new(self.current.line, self.current.column)
    }

    fn check(&self, kind: TokenKind) -> bool {
        self.current.kind == kind
    }

    fn advance(&mut self) -> Result<Token, CouError> {
        let next = self.lexer.produce()?;
        Ok(std::mem::replace(&mut self.current, next))
    }

    fn expect(&mut self, kind: TokenKind) -> Result<Token, CouError> {
        if self.current.kind != kind {
            return Err(ParseError::new(
                format!("expected {}, found {}", kind, self.current.kind),
                self.pos(),
            )
            .into());
        }
        self.advance()
    }

    // ---- top level ----

    fn program(&mut self) -> Result<StmtId, CouError> {
        let mut stmts = Vec::new();
        while !self.check(TokenKind::Eof) {
            stmts.push(self.statement()?);
        }
        Ok(self.ast.push_stmt(Stmt::Program(stmts)))
    }

    fn block(&mut self) -> Result<StmtId, CouError> {
        self.expect(TokenKind::LBrace)?;
        let mut stmts = Vec::new();
        while !self.check(TokenKind::RBrace) {
            stmts.push(self.statement()?);
        }
        self.expect(TokenKind::RBrace)?;
        Ok(self.ast.push_stmt(Stmt::Block(stmts)))
    }

    /// Runs `self.block()` inside a fresh child scope, restoring the
    /// parent scope on the way out whether parsing succeeded or failed.
    fn scoped_block(&mut self) -> Result<StmtId, CouError> {
        let child = self.symtab.child();
        let outer = std::mem::replace(&mut self.symtab, child);
        let result = self.block();
        self.symtab = outer;
        result
    }

    // ---- statements ----

    fn statement(&mut self) -> Result<StmtId, CouError> {
        match self.current.kind {
            TokenKind::Proc => self.process(),
            TokenKind::If => self.condition(),
            TokenKind::As => self.as_loop(),
            _ => {
                let stmt = self.simple_statement()?;
                self.expect(TokenKind::Semi)?;
                Ok(stmt)
            }
        }
    }

    fn simple_statement(&mut self) -> Result<StmtId, CouError> {
        match self.current.kind {
            TokenKind::Say => self.say_stmt(),
            TokenKind::Return => self.return_stmt(),
            TokenKind::Id => self.id_led_statement(),
            TokenKind::Semi => Ok(self.ast.push_stmt(Stmt::Empty)),
            _ => self.expr_stmt(),
        }
    }

    fn expr_stmt(&mut self) -> Result<StmtId, CouError> {
        let pos = self.pos();
        let expr = self.expr()?;
        Ok(self.ast.push_stmt(Stmt::ExprStmt { expr, pos }))
    }

    fn say_stmt(&mut self) -> Result<StmtId, CouError> {
        let pos = self.pos();
        self.advance()?;
        let expr = self.expr()?;
        Ok(self.ast.push_stmt(Stmt::Say { expr, pos }))
    }

    fn return_stmt(&mut self) -> Result<StmtId, CouError> {
        let pos = self.pos();
        self.advance()?;
        let expr = if self.check(TokenKind::Semi) {
            None
        } else {
            Some(self.expr()?)
        };
        Ok(self.ast.push_stmt(Stmt::Return { expr, pos }))
    }

    /// Statement-level dispatch on an identifier uses one-char raw
    /// lookahead (`id:` declaration, `id=` assignment, `id(` call, `id[`
    /// array access) rather than a second token of buffering.
    fn id_led_statement(&mut self) -> Result<StmtId, CouError> {
        let name = self.current.ident_name().to_string();
        let pos = self.pos();

        match self.lexer.peek() {
            Some(':') => self.declaration_statement(name, pos),
            Some('=') => self.var_assignment_statement(name, pos),
            Some('[') => self.array_assignment_statement(name, pos),
            Some('(') => {
                self.advance()?;
                let call = self.process_call(name, pos)?;
                Ok(self.ast.push_stmt(Stmt::ExprStmt { expr: call, pos }))
            }
            _ => {
                self.advance()?;
                let expr = self.variable_ref(name, pos)?;
                Ok(self.ast.push_stmt(Stmt::ExprStmt { expr, pos }))
            }
        }
    }

    fn declaration_statement(&mut self, name: String, pos: Pos) -> Result<StmtId, CouError> {
        self.advance()?; // consume id
        self.expect(TokenKind::Colon)?;
        let ty = self.parse_type()?;
        self.declare_variable(&name, ty, pos)?;

        let rhs = if self.check(TokenKind::Assign) {
            self.advance()?;
            Some(self.expr()?)
        } else {
            None
        };

        Ok(self.ast.push_stmt(Stmt::Assignment {
            target: AssignTarget::Declaration { name, ty },
            rhs,
            pos,
        }))
    }

    fn var_assignment_statement(&mut self, name: String, pos: Pos) -> Result<StmtId, CouError> {
        self.advance()?; // consume id
        self.lookup_variable(&name, pos)?;
        self.expect(TokenKind::Assign)?;
        let rhs = self.expr()?;
        Ok(self.ast.push_stmt(Stmt::Assignment {
            target: AssignTarget::Variable { name },
            rhs: Some(rhs),
            pos,
        }))
    }

    fn array_assignment_statement(&mut self, name: String, pos: Pos) -> Result<StmtId, CouError> {
        self.advance()?; // consume id
        self.symtab
            .lookup(&name)
            .ok_or_else(|| ScopeError::new(format!("undeclared reference '{}'", name), pos))?;
        let indices = self.index_chain()?;
        self.expect(TokenKind::Assign)?;
        let rhs = self.expr()?;
        Ok(self.ast.push_stmt(Stmt::Assignment {
            target: AssignTarget::ArrayElement { name, indices },
            rhs: Some(rhs),
            pos,
        }))
    }

    /// Used by `as`'s init/step clauses, which always require an
    /// initializer (unlike a standalone declaration statement, which may
    /// omit one).
    fn assignment_clause(&mut self) -> Result<StmtId, CouError> {
        let name = self.current.ident_name().to_string();
        let pos = self.pos();

        match self.lexer.peek() {
            Some(':') => {
                self.advance()?;
                self.expect(TokenKind::Colon)?;
                let ty = self.parse_type()?;
                self.declare_variable(&name, ty, pos)?;
                self.expect(TokenKind::Assign)?;
                let rhs = self.expr()?;
                Ok(self.ast.push_stmt(Stmt::Assignment {
                    target: AssignTarget::Declaration { name, ty },
                    rhs: Some(rhs),
                    pos,
                }))
            }
            Some('[') => {
                self.advance()?;
                self.symtab
                    .lookup(&name)
                    .ok_or_else(|| ScopeError::new(format!("undeclared reference '{}'", name), pos))?;
                let indices = self.index_chain()?;
                self.expect(TokenKind::Assign)?;
                let rhs = self.expr()?;
                Ok(self.ast.push_stmt(Stmt::Assignment {
                    target: AssignTarget::ArrayElement { name, indices },
                    rhs: Some(rhs),
                    pos,
                }))
            }
            _ => {
                self.advance()?;
                self.lookup_variable(&name, pos)?;
                self.expect(TokenKind::Assign)?;
                let rhs = self.expr()?;
                Ok(self.ast.push_stmt(Stmt::Assignment {
                    target: AssignTarget::Variable { name },
                    rhs: Some(rhs),
                    pos,
                }))
            }
        }
    }

    /// The process's own name is declared in the *enclosing* scope (so
    /// recursive calls resolve) before its body is parsed, using a
    /// reserved `StmtId` that is filled in once the body exists. Its
    /// parameter list can't be known until the body's own scope is
    /// entered, so the declared symbol starts with an empty arity and is
    /// overwritten once params are parsed but before the body is, so a
    /// recursive call inside the body sees the real signature.
    fn process(&mut self) -> Result<StmtId, CouError> {
        let pos = self.pos();
        self.advance()?; // consume 'proc'
        let name = self.expect(TokenKind::Id)?.ident_name().to_string();
        self.expect(TokenKind::Colon)?;
        let return_type = self.parse_type()?;
        self.expect(TokenKind::LParen)?;

        let proc_id = self.ast.reserve_stmt();
        // `call_depth`, not lexical block `level`: an enclosing `if`/`as`
        // block shares its call depth with the process it's nested in, so
        // a process declared inside one still gets the runtime-matching
        // scope level (see `SymbolTable::proc_child`).
        let declared_level = self.symtab.call_depth() + 1;

        if !self.symtab.declare(
            &name,
            Symbol::Process {
                name: name.clone(),
                return_type,
                params: Vec::new(),
                scope_level: declared_level,
                body: proc_id,
            },
        ) {
            return Err(ScopeError::new(
                format!("'{}' declared more than once in accessible scope", name),
                pos,
            )
            .into());
        }

        let proc_scope = self.symtab.proc_child();
        let outer = std::mem::replace(&mut self.symtab, proc_scope);

        let params_result = (|| -> Result<Vec<Param>, CouError> {
            let mut params = Vec::new();
            if !self.check(TokenKind::RParen) {
                params.push(self.param()?);
                while self.check(TokenKind::Comma) {
                    self.advance()?;
                    params.push(self.param()?);
                }
            }
            self.expect(TokenKind::RParen)?;
            Ok(params)
        })();

        let params = match params_result {
            Ok(p) => p,
            Err(e) => {
                self.symtab = outer;
                return Err(e);
            }
        };

        outer.overwrite(
            &name,
            Symbol::Process {
                name: name.clone(),
                return_type,
                params: params.clone(),
                scope_level: declared_level,
                body: proc_id,
            },
        );

        let body_result = self.block();
        self.symtab = outer;
        let body = body_result?;

        self.ast.fill_stmt(
            proc_id,
            Stmt::Process {
                name,
                return_type,
                params,
                scope_level: declared_level,
                body,
                pos,
            },
        );

        Ok(proc_id)
    }

    fn param(&mut self) -> Result<Param, CouError> {
        let pos = self.pos();
        let name = self.expect(TokenKind::Id)?.ident_name().to_string();
        self.expect(TokenKind::Colon)?;
        let ty = self.parse_type()?;
        self.declare_variable(&name, ty, pos)?;
        Ok(Param { name, ty })
    }

    fn condition(&mut self) -> Result<StmtId, CouError> {
        let pos = self.pos();
        let mut arms = Vec::new();

        self.advance()?; // consume 'if'
        self.expect(TokenKind::LParen)?;
        let cond = self.expr()?;
        self.expect(TokenKind::RParen)?;
        let block = self.scoped_block()?;
        arms.push((cond, block));

        while self.check(TokenKind::Elif) {
            self.advance()?;
            self.expect(TokenKind::LParen)?;
            let cond = self.expr()?;
            self.expect(TokenKind::RParen)?;
            let block = self.scoped_block()?;
            arms.push((cond, block));
        }

        if self.check(TokenKind::Else) {
            self.advance()?;
            let block = self.scoped_block()?;
            let true_pos = self.pos();
            let true_expr = self.ast.push_expr(Expr::Boolean(true, true_pos));
            arms.push((true_expr, block));
        }

        Ok(self.ast.push_stmt(Stmt::Conditions { arms, pos }))
    }

    fn as_loop(&mut self) -> Result<StmtId, CouError> {
        let pos = self.pos();
        self.advance()?; // consume 'as'
        self.expect(TokenKind::LParen)?;

        let child = self.symtab.child();
        let outer = std::mem::replace(&mut self.symtab, child);

        let result = (|| -> Result<StmtId, CouError> {
            let init = if self.check(TokenKind::Id)
                && matches!(self.lexer.peek(), Some(':') | Some('='))
            {
                Some(self.assignment_clause()?)
            } else {
                None
            };
            if init.is_some() {
                self.expect(TokenKind::Semi)?;
            }

            let condition = self.expr()?;

            let step = if self.check(TokenKind::Semi) {
                self.advance()?;
                Some(self.assignment_clause()?)
            } else {
                None
            };

            self.expect(TokenKind::RParen)?;
            let body = self.block()?;

            Ok(self.ast.push_stmt(Stmt::As {
                init,
                condition,
                step,
                body,
                pos,
            }))
        })();

        self.symtab = outer;
        result
    }

    fn parse_type(&mut self) -> Result<Type, CouError> {
        let ty = match self.current.kind {
            TokenKind::Num => Type::Num,
            TokenKind::Bool => Type::Bool,
            TokenKind::Str => Type::Str,
            TokenKind::Nil => Type::Nil,
            TokenKind::Arr => Type::Arr,
            _ => {
                return Err(ParseError::new(
                    format!("expected a type keyword, found {}", self.current.kind),
                    self.pos(),
                )
                .into())
            }
        };
        self.advance()?;
        Ok(ty)
    }

    fn declare_variable(&mut self, name: &str, ty: Type, pos: Pos) -> Result<(), CouError> {
        if !self.symtab.declare(name, Symbol::Variable { name: name.to_string(), ty }) {
            return Err(ScopeError::new(
                format!("'{}' declared more than once in accessible scope", name),
                pos,
            )
            .into());
        }
        Ok(())
    }

    fn lookup_variable(&self, name: &str, pos: Pos) -> Result<Type, CouError> {
        match self.symtab.lookup(name) {
            Some(Symbol::Variable { ty, .. }) => Ok(ty),
            Some(_) => Err(ScopeError::new(format!("'{}' is not a variable", name), pos).into()),
            None => Err(ScopeError::new(format!("undeclared reference '{}'", name), pos).into()),
        }
    }

    fn index_chain(&mut self) -> Result<Vec<ExprId>, CouError> {
        let mut indices = Vec::new();
        while self.check(TokenKind::LBracket) {
            self.advance()?;
            indices.push(self.expr()?);
            self.expect(TokenKind::RBracket)?;
        }
        Ok(indices)
    }

    fn process_call(&mut self, name: String, pos: Pos) -> Result<ExprId, CouError> {
        self.expect(TokenKind::LParen)?;
        let mut args = Vec::new();
        if !self.check(TokenKind::RParen) {
            args.push(self.expr()?);
            while self.check(TokenKind::Comma) {
                self.advance()?;
                args.push(self.expr()?);
            }
        }
        self.expect(TokenKind::RParen)?;

        let sym = self
            .symtab
            .lookup(&name)
            .ok_or_else(|| ScopeError::new(format!("undeclared reference '{}'", name), pos))?;

        let (arity, body) = match sym {
            Symbol::Process { params, body, .. } => (params.len(), body),
            _ => return Err(ScopeError::new(format!("'{}' is not a process", name), pos).into()),
        };

        if arity != args.len() {
            return Err(ScopeError::new(
                format!("process '{}' expects {} argument(s), got {}", name, arity, args.len()),
                pos,
            )
            .into());
        }

        Ok(self.ast.push_expr(Expr::ProcessCall { name, args, proc: body, pos }))
    }

    fn variable_ref(&mut self, name: String, pos: Pos) -> Result<ExprId, CouError> {
        let declared_type = self.lookup_variable(&name, pos)?;
        Ok(self.ast.push_expr(Expr::Variable { name, declared_type, pos }))
    }

    fn array_access(&mut self, name: String, pos: Pos) -> Result<ExprId, CouError> {
        self.symtab
            .lookup(&name)
            .ok_or_else(|| ScopeError::new(format!("undeclared reference '{}'", name), pos))?;
        let indices = self.index_chain()?;
        Ok(self.ast.push_expr(Expr::ArrayElement { name, indices, pos }))
    }

    // ---- expressions (precedence climbing) ----

    fn expr(&mut self) -> Result<ExprId, CouError> {
        self.disjunction()
    }

    fn disjunction(&mut self) -> Result<ExprId, CouError> {
        let mut node = self.conjunction()?;
        while self.check(TokenKind::Or) {
            let pos = self.pos();
            self.advance()?;
            let right = self.conjunction()?;
            node = self
                .ast
                .push_expr(Expr::BinaryOp { op: BinaryOpKind::Or, left: node, right, pos });
        }
        Ok(node)
    }

    fn conjunction(&mut self) -> Result<ExprId, CouError> {
        let mut node = self.comparison()?;
        while self.check(TokenKind::And) {
            let pos = self.pos();
            self.advance()?;
            let right = self.comparison()?;
            node = self
                .ast
                .push_expr(Expr::BinaryOp { op: BinaryOpKind::And, left: node, right, pos });
        }
        Ok(node)
    }

    fn comparison(&mut self) -> Result<ExprId, CouError> {
        let mut node = self.sum()?;
        loop {
            let op = match self.current.kind {
                TokenKind::Eq => BinaryOpKind::Eq,
                TokenKind::NotEq => BinaryOpKind::NotEq,
                TokenKind::Le => BinaryOpKind::Le,
                TokenKind::Ge => BinaryOpKind::Ge,
                TokenKind::Less => BinaryOpKind::Lt,
                TokenKind::Greater => BinaryOpKind::Gt,
                _ => break,
            };
            let pos = self.pos();
            self.advance()?;
            let right = self.sum()?;
            node = self.ast.push_expr(Expr::BinaryOp { op, left: node, right, pos });
        }
        Ok(node)
    }

    fn sum(&mut self) -> Result<ExprId, CouError> {
        let mut node = self.term()?;
        loop {
            let op = match self.current.kind {
                TokenKind::Plus => BinaryOpKind::Add,
                TokenKind::Minus => BinaryOpKind::Sub,
                _ => break,
            };
            let pos = self.pos();
            self.advance()?;
            let right = self.term()?;
            node = self.ast.push_expr(Expr::BinaryOp { op, left: node, right, pos });
        }
        Ok(node)
    }

    fn term(&mut self) -> Result<ExprId, CouError> {
        let mut node = self.factor()?;
        loop {
            let op = match self.current.kind {
                TokenKind::Star => BinaryOpKind::Mul,
                TokenKind::Slash => BinaryOpKind::Div,
                TokenKind::Percent => BinaryOpKind::Mod,
                TokenKind::FloorDiv => BinaryOpKind::FloorDiv,
                _ => break,
            };
            let pos = self.pos();
            self.advance()?;
            let right = self.factor()?;
            node = self.ast.push_expr(Expr::BinaryOp { op, left: node, right, pos });
        }
        Ok(node)
    }

    fn factor(&mut self) -> Result<ExprId, CouError> {
        let pos = self.pos();
        match self.current.kind {
            TokenKind::Number => {
                let lit = match &self.current.value {
                    TokenValue::Int(n) => NumberLit::Int(*n),
                    TokenValue::Float(n) => NumberLit::Float(*n),
                    _ => unreachable!("number token without numeric value"),
                };
                self.advance()?;
                Ok(self.ast.push_expr(Expr::Number(lit, pos)))
            }
            TokenKind::String => {
                let s = match &self.current.value {
                    TokenValue::Str(s) => s.clone(),
                    _ => unreachable!("string token without string value"),
                };
                self.advance()?;
                Ok(self.ast.push_expr(Expr::StringLit(s, pos)))
            }
            TokenKind::True => {
                self.advance()?;
                Ok(self.ast.push_expr(Expr::Boolean(true, pos)))
            }
            TokenKind::False => {
                self.advance()?;
                Ok(self.ast.push_expr(Expr::Boolean(false, pos)))
            }
            TokenKind::Nothing => {
                self.advance()?;
                Ok(self.ast.push_expr(Expr::Nothing(pos)))
            }
            TokenKind::Plus | TokenKind::Minus | TokenKind::Bang => {
                let op = match self.current.kind {
                    TokenKind::Plus => UnaryOpKind::Pos,
                    TokenKind::Minus => UnaryOpKind::Neg,
                    TokenKind::Bang => UnaryOpKind::Not,
                    _ => unreachable!(),
                };
                self.advance()?;
                let child = self.factor()?;
                Ok(self.ast.push_expr(Expr::UnaryOp { op, child, pos }))
            }
            TokenKind::LParen => {
                self.advance()?;
                let node = self.expr()?;
                self.expect(TokenKind::RParen)?;
                Ok(node)
            }
            TokenKind::Arr => {
                self.advance()?;
                self.expect(TokenKind::LBracket)?;
                let size = self.expr()?;
                self.expect(TokenKind::RBracket)?;
                Ok(self.ast.push_expr(Expr::ArrayInitialization { size, pos }))
            }
            TokenKind::Id => {
                let name = self.current.ident_name().to_string();
                self.advance()?;
                match self.current.kind {
                    TokenKind::LParen => self.process_call(name, pos),
                    TokenKind::LBracket => self.array_access(name, pos),
                    _ => self.variable_ref(name, pos),
                }
            }
            _ => Err(ParseError::new(
                format!("unexpected token {}", self.current.kind),
                pos,
            )
            .into()),
        }
    }
}
