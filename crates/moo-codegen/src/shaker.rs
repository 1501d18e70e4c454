//! The variable binder.
//!
//! Two walks over the tree. The first collects every name that is bound
//! somewhere (assignment, destructuring, loop variables, catch names and
//! function parameters). The second gives each identifier its [`Role`]:
//!
//! - `this`, `user` and `args` are always variables 0, 1 and 2;
//! - a bound name, or any name outside callee position, is a variable;
//! - an unbound name in callee position is a builtin call;
//! - names after `.` are properties or verbs, names after `$` are traits.
//!
//! There is one symbol table per program, shared by the function literals
//! and fork bodies coded inside it. The second walk also records which
//! variables each of those bodies reads from the enclosing frame.

use hashbrown::HashSet;
use indexmap::IndexMap;
use moo_syntax::ast::{
    Block, Expr, ExprKind, Ident, InterpPart, Role, Stmt, StmtKind, VarId,
};
use moo_vm::executable::{VAR_ARGS, VAR_THIS, VAR_USER};

/// Resolve every identifier under `block`. Returns the symbol table.
pub fn shake(block: &mut Block) -> IndexMap<String, VarId> {
    let mut bound = HashSet::new();
    collect_block(block, &mut bound);

    let mut shaker = Shaker::new(bound);
    shaker.block(block);
    shaker.symbols
}

// ═══════════════════════════════════════════════════════════════════════════
// Pass 1: bound names
// ═══════════════════════════════════════════════════════════════════════════

fn collect_block(block: &Block, bound: &mut HashSet<String>) {
    for stmt in &block.stmts {
        collect_stmt(stmt, bound);
    }
}

fn bind_name(ident: &Ident, bound: &mut HashSet<String>) {
    bound.insert(ident.name.clone());
}

fn collect_stmt(stmt: &Stmt, bound: &mut HashSet<String>) {
    match &stmt.kind {
        StmtKind::Block(block) => collect_block(block, bound),
        StmtKind::If(s) => {
            collect_expr(&s.cond, bound);
            collect_block(&s.then_block, bound);
            if let Some(other) = &s.else_branch {
                collect_stmt(other, bound);
            }
        }
        StmtKind::While { cond, body } => {
            collect_expr(cond, bound);
            collect_block(body, bound);
        }
        StmtKind::ForIn { value, key, iter, body } => {
            bind_name(value, bound);
            if let Some(key) = key {
                bind_name(key, bound);
            }
            collect_expr(iter, bound);
            collect_block(body, bound);
        }
        StmtKind::ForRange { var, from, to, body } => {
            bind_name(var, bound);
            collect_expr(from, bound);
            collect_expr(to, bound);
            collect_block(body, bound);
        }
        StmtKind::ForClassic(f) => {
            if let Some(init) = &f.init {
                collect_stmt(init, bound);
            }
            if let Some(check) = &f.check {
                collect_expr(check, bound);
            }
            if let Some(incr) = &f.incr {
                collect_stmt(incr, bound);
            }
            collect_block(&f.body, bound);
        }
        StmtKind::Try(t) => {
            collect_block(&t.body, bound);
            if let Some(name) = &t.catch.name {
                bind_name(name, bound);
            }
            collect_block(&t.catch.body, bound);
        }
        StmtKind::Return(value) => {
            if let Some(value) = value {
                collect_expr(value, bound);
            }
        }
        StmtKind::Throw(e) | StmtKind::Expr(e) => collect_expr(e, bound),
        StmtKind::Break | StmtKind::Continue => {}
        StmtKind::Destructure { targets, value } => {
            for t in targets {
                bind_name(t, bound);
            }
            collect_expr(value, bound);
        }
        StmtKind::Assign { target, value, .. } => {
            if let Some(ident) = target.as_ident() {
                bind_name(ident, bound);
            }
            collect_expr(target, bound);
            collect_expr(value, bound);
        }
        StmtKind::IncDec { target, .. } => {
            if let Some(ident) = target.as_ident() {
                bind_name(ident, bound);
            }
            collect_expr(target, bound);
        }
    }
}

fn collect_expr(expr: &Expr, bound: &mut HashSet<String>) {
    match &expr.kind {
        ExprKind::Literal(_) | ExprKind::Ident(_) | ExprKind::TraitRef(_) => {}
        ExprKind::Interp(parts) => {
            for part in parts {
                if let InterpPart::Expr(e) = part {
                    collect_expr(e, bound);
                }
            }
        }
        ExprKind::List(items) => items.iter().for_each(|e| collect_expr(e, bound)),
        ExprKind::Map(entries) => {
            for (k, v) in entries {
                collect_expr(k, bound);
                collect_expr(v, bound);
            }
        }
        ExprKind::ErrorMsg { message, .. } => collect_expr(message, bound),
        ExprKind::Unary { expr, .. } => collect_expr(expr, bound),
        ExprKind::Binary { lhs, rhs, .. }
        | ExprKind::Logical { lhs, rhs, .. }
        | ExprKind::Elvis { lhs, rhs } => {
            collect_expr(lhs, bound);
            collect_expr(rhs, bound);
        }
        ExprKind::Cond { cond, then_expr, else_expr } => {
            collect_expr(cond, bound);
            collect_expr(then_expr, bound);
            collect_expr(else_expr, bound);
        }
        ExprKind::Index { target, index } => {
            collect_expr(target, bound);
            collect_expr(index, bound);
        }
        ExprKind::Slice { target, from, to } => {
            collect_expr(target, bound);
            collect_expr(from, bound);
            collect_expr(to, bound);
        }
        ExprKind::Prop { target, .. } | ExprKind::TraitOf { target, .. } => collect_expr(target, bound),
        ExprKind::VerbCall { target, args, .. } => {
            collect_expr(target, bound);
            args.iter().for_each(|e| collect_expr(e, bound));
        }
        ExprKind::Call { callee, args } => {
            collect_expr(callee, bound);
            args.iter().for_each(|e| collect_expr(e, bound));
        }
        ExprKind::Func(f) => {
            for p in &f.params {
                bind_name(p, bound);
            }
            collect_block(&f.body, bound);
        }
        ExprKind::Fork(f) => {
            collect_expr(&f.delay, bound);
            collect_block(&f.body, bound);
        }
        ExprKind::TryExpr(t) => {
            collect_expr(&t.expr, bound);
            if let Some(name) = &t.name {
                bind_name(name, bound);
            }
            collect_expr(&t.fallback, bound);
        }
        ExprKind::When(w) => {
            if let Some(subject) = &w.subject {
                collect_expr(subject, bound);
            }
            for arm in &w.arms {
                arm.conds.iter().for_each(|e| collect_expr(e, bound));
                collect_expr(&arm.result, bound);
            }
            if let Some(e) = &w.else_arm {
                collect_expr(e, bound);
            }
        }
        ExprKind::IsType { expr, .. } => collect_expr(expr, bound),
        ExprKind::IsTrait { expr, trait_expr } => {
            collect_expr(expr, bound);
            collect_expr(trait_expr, bound);
        }
        ExprKind::Suspend(secs) => {
            if let Some(e) = secs {
                collect_expr(e, bound);
            }
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Pass 2: roles and captures
// ═══════════════════════════════════════════════════════════════════════════

struct Shaker {
    bound: HashSet<String>,
    symbols: IndexMap<String, VarId>,
    /// Variables referenced by each enclosing function or fork body, innermost last.
    scopes: Vec<HashSet<VarId>>,
}

impl Shaker {
    fn new(bound: HashSet<String>) -> Self {
        let mut symbols = IndexMap::new();
        symbols.insert("this".to_string(), VAR_THIS);
        symbols.insert("user".to_string(), VAR_USER);
        symbols.insert("args".to_string(), VAR_ARGS);
        Self {
            bound,
            symbols,
            scopes: Vec::new(),
        }
    }

    fn var_id(&mut self, name: &str) -> VarId {
        if let Some(id) = self.symbols.get(name) {
            return *id;
        }
        let id = self.symbols.len() as VarId;
        self.symbols.insert(name.to_string(), id);
        id
    }

    fn var(&mut self, ident: &mut Ident) {
        let id = self.var_id(&ident.name);
        ident.role = Role::Var(id);
        if let Some(scope) = self.scopes.last_mut() {
            scope.insert(id);
        }
    }

    /// Close a function or fork scope, passing its free variables outward.
    fn close_scope(&mut self, excluded: &[VarId]) -> Vec<VarId> {
        let referenced = self.scopes.pop().unwrap_or_default();
        let mut captured: Vec<VarId> = referenced
            .into_iter()
            .filter(|id| !excluded.contains(id))
            .collect();
        captured.sort_unstable();
        if let Some(outer) = self.scopes.last_mut() {
            outer.extend(captured.iter().copied());
        }
        captured
    }

    fn block(&mut self, block: &mut Block) {
        for stmt in &mut block.stmts {
            self.stmt(stmt);
        }
    }

    fn stmt(&mut self, stmt: &mut Stmt) {
        match &mut stmt.kind {
            StmtKind::Block(block) => self.block(block),
            StmtKind::If(s) => {
                self.expr(&mut s.cond);
                self.block(&mut s.then_block);
                if let Some(other) = &mut s.else_branch {
                    self.stmt(other);
                }
            }
            StmtKind::While { cond, body } => {
                self.expr(cond);
                self.block(body);
            }
            StmtKind::ForIn { value, key, iter, body } => {
                self.expr(iter);
                self.var(value);
                if let Some(key) = key {
                    self.var(key);
                }
                self.block(body);
            }
            StmtKind::ForRange { var, from, to, body } => {
                self.expr(from);
                self.expr(to);
                self.var(var);
                self.block(body);
            }
            StmtKind::ForClassic(f) => {
                if let Some(init) = &mut f.init {
                    self.stmt(init);
                }
                if let Some(check) = &mut f.check {
                    self.expr(check);
                }
                if let Some(incr) = &mut f.incr {
                    self.stmt(incr);
                }
                self.block(&mut f.body);
            }
            StmtKind::Try(t) => {
                self.block(&mut t.body);
                if let Some(name) = &mut t.catch.name {
                    self.var(name);
                }
                self.block(&mut t.catch.body);
            }
            StmtKind::Return(value) => {
                if let Some(value) = value {
                    self.expr(value);
                }
            }
            StmtKind::Throw(e) | StmtKind::Expr(e) => self.expr(e),
            StmtKind::Break | StmtKind::Continue => {}
            StmtKind::Destructure { targets, value } => {
                self.expr(value);
                for t in targets {
                    self.var(t);
                }
            }
            StmtKind::Assign { target, value, .. } => {
                self.expr(value);
                self.expr(target);
            }
            StmtKind::IncDec { target, .. } => self.expr(target),
        }
    }

    fn expr(&mut self, expr: &mut Expr) {
        match &mut expr.kind {
            ExprKind::Literal(_) => {}
            ExprKind::Ident(ident) => self.var(ident),
            ExprKind::TraitRef(name) => name.role = Role::Trait,
            ExprKind::Interp(parts) => {
                for part in parts {
                    if let InterpPart::Expr(e) = part {
                        self.expr(e);
                    }
                }
            }
            ExprKind::List(items) => items.iter_mut().for_each(|e| self.expr(e)),
            ExprKind::Map(entries) => {
                for (k, v) in entries {
                    self.expr(k);
                    self.expr(v);
                }
            }
            ExprKind::ErrorMsg { message, .. } => self.expr(message),
            ExprKind::Unary { expr, .. } => self.expr(expr),
            ExprKind::Binary { lhs, rhs, .. }
            | ExprKind::Logical { lhs, rhs, .. }
            | ExprKind::Elvis { lhs, rhs } => {
                self.expr(lhs);
                self.expr(rhs);
            }
            ExprKind::Cond { cond, then_expr, else_expr } => {
                self.expr(cond);
                self.expr(then_expr);
                self.expr(else_expr);
            }
            ExprKind::Index { target, index } => {
                self.expr(target);
                self.expr(index);
            }
            ExprKind::Slice { target, from, to } => {
                self.expr(target);
                self.expr(from);
                self.expr(to);
            }
            ExprKind::Prop { target, name } => {
                self.expr(target);
                name.role = Role::Prop;
            }
            ExprKind::TraitOf { target, name } => {
                self.expr(target);
                name.role = Role::Trait;
            }
            ExprKind::VerbCall { target, name, args } => {
                self.expr(target);
                name.role = Role::Verb;
                args.iter_mut().for_each(|e| self.expr(e));
            }
            ExprKind::Call { callee, args } => {
                let builtin = matches!(
                    &callee.kind,
                    ExprKind::Ident(i) if !self.bound.contains(&i.name) && !is_predeclared(&i.name)
                );
                match &mut callee.kind {
                    ExprKind::Ident(ident) if builtin => ident.role = Role::Builtin,
                    _ => self.expr(callee),
                }
                args.iter_mut().for_each(|e| self.expr(e));
            }
            ExprKind::Func(f) => {
                self.scopes.push(HashSet::new());
                let mut params = Vec::with_capacity(f.params.len());
                for p in &mut f.params {
                    let id = self.var_id(&p.name);
                    p.role = Role::Var(id);
                    params.push(id);
                }
                self.block(&mut f.body);
                params.extend([VAR_THIS, VAR_USER, VAR_ARGS]);
                f.captured = self.close_scope(&params);
            }
            ExprKind::Fork(f) => {
                self.expr(&mut f.delay);
                self.scopes.push(HashSet::new());
                self.block(&mut f.body);
                f.captured = self.close_scope(&[VAR_THIS, VAR_USER]);
            }
            ExprKind::TryExpr(t) => {
                self.expr(&mut t.expr);
                if let Some(name) = &mut t.name {
                    self.var(name);
                }
                self.expr(&mut t.fallback);
            }
            ExprKind::When(w) => {
                if let Some(subject) = &mut w.subject {
                    self.expr(subject);
                }
                for arm in &mut w.arms {
                    arm.conds.iter_mut().for_each(|e| self.expr(e));
                    self.expr(&mut arm.result);
                }
                if let Some(e) = &mut w.else_arm {
                    self.expr(e);
                }
            }
            ExprKind::IsType { expr, .. } => self.expr(expr),
            ExprKind::IsTrait { expr, trait_expr } => {
                self.expr(expr);
                self.expr(trait_expr);
            }
            ExprKind::Suspend(secs) => {
                if let Some(e) = secs {
                    self.expr(e);
                }
            }
        }
    }
}

fn is_predeclared(name: &str) -> bool {
    matches!(name, "this" | "user" | "args")
}
