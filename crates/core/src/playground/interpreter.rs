//! Tree-walking evaluator for parsed snippets.
//!
//! Every run gets a fresh [`Machine`]: its own heap, scopes and built-ins. The
//! only observable effect is the text of the last `console.log` call.

use std::collections::HashMap;
use std::rc::Rc;

use super::ast::{
    AssignOp, BinaryOp, ClassDef, DeclKind, Expr, FunctionBody, FunctionDef, LogicalOp,
    MethodKind, Param, PropKey, Property, Stmt, UnaryOp,
};
use super::builtins;
use super::heap::{ClassData, Closure, Heap, HeapObject, ObjectKind, ScopeId, Slot};
use super::outcome::{ExecutionOutcome, FailureKind, SUCCESS_SENTINEL};
use super::parser::parse;
use super::value::{ObjId, Value, array_index, number_to_string, string_to_number};
use super::Sandbox;

pub type Completion<T> = Result<T, Abrupt>;

/// Non-local exits. `StepLimit` cannot be caught by `try`.
#[derive(Debug, Clone, PartialEq)]
pub enum Abrupt {
    Throw(Value),
    Return(Value),
    Break,
    Continue,
    StepLimit,
}

/// Bounds on a single run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SandboxLimits {
    /// Statements, loop iterations and calls allowed before the run is stopped.
    pub max_steps: u64,
    pub max_call_depth: u32,
}

impl SandboxLimits {
    pub const DEFAULT_MAX_STEPS: u64 = 1_000_000;
    pub const DEFAULT_MAX_CALL_DEPTH: u32 = 1_000;
}

impl Default for SandboxLimits {
    fn default() -> Self {
        Self {
            max_steps: Self::DEFAULT_MAX_STEPS,
            max_call_depth: Self::DEFAULT_MAX_CALL_DEPTH,
        }
    }
}

/// Largest array or string a snippet may build.
pub(crate) const MAX_COLLECTION_LENGTH: usize = 1 << 24;

/// Room for `DEFAULT_MAX_CALL_DEPTH` nested calls in unoptimized builds.
const SANDBOX_STACK_BYTES: usize = 256 * 1024 * 1024;

const BUILTIN_SCOPE: ScopeId = ScopeId(0);
const GLOBAL_SCOPE: ScopeId = ScopeId(1);

//
// ─── SANDBOX ──────────────────────────────────────────────────────────────────
//

/// The bundled executor: parses and interprets a snippet in a fresh machine.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Interpreter {
    limits: SandboxLimits,
}

impl Interpreter {
    #[must_use]
    pub fn new(limits: SandboxLimits) -> Self {
        Self { limits }
    }

    #[must_use]
    pub fn limits(&self) -> SandboxLimits {
        self.limits
    }

    /// Runs on the calling thread.
    #[must_use]
    pub fn run(&self, source: &str) -> ExecutionOutcome {
        match parse(source) {
            Ok(program) => Machine::new(self.limits).run(&program),
            Err(err) => ExecutionOutcome::failed(FailureKind::Syntax, err.to_string()),
        }
    }
}

impl Sandbox for Interpreter {
    /// Runs on a dedicated thread with a large stack so deeply nested
    /// snippets cannot exhaust the caller's stack.
    fn execute(&self, source: &str) -> ExecutionOutcome {
        std::thread::scope(|scope| {
            let spawned = std::thread::Builder::new()
                .name("snippet-sandbox".into())
                .stack_size(SANDBOX_STACK_BYTES)
                .spawn_scoped(scope, || self.run(source));
            match spawned {
                Ok(handle) => handle.join().unwrap_or_else(|_| {
                    ExecutionOutcome::failed(
                        FailureKind::Runtime,
                        "InternalError: the interpreter stopped unexpectedly",
                    )
                }),
                Err(_) => self.run(source),
            }
        })
    }
}

//
// ─── MACHINE STATE ────────────────────────────────────────────────────────────
//

/// Prototype objects shared by every value of a kind.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Intrinsics {
    pub object_proto: ObjId,
    pub function_proto: ObjId,
    pub array_proto: ObjId,
    pub string_proto: ObjId,
    pub number_proto: ObjId,
    pub boolean_proto: ObjId,
    pub error_proto: ObjId,
    pub type_error_proto: ObjId,
    pub range_error_proto: ObjId,
    pub reference_error_proto: ObjId,
    pub syntax_error_proto: ObjId,
}

#[derive(Debug, Clone)]
struct Binding {
    value: Value,
    mutable: bool,
    /// `false` between scope entry and the `let`/`const`/`class` statement.
    initialized: bool,
}

#[derive(Debug, Default)]
struct Scope {
    vars: HashMap<Rc<str>, Binding>,
    parent: Option<ScopeId>,
}

#[derive(Debug, Clone)]
struct Ctx {
    scope: ScopeId,
    this: Value,
    /// Object whose prototype `super.x` resolves against.
    home: Option<ObjId>,
    /// Class whose constructor is running, for `super(...)`.
    class: Option<ObjId>,
}

impl Ctx {
    fn with_scope(&self, scope: ScopeId) -> Self {
        Self {
            scope,
            ..self.clone()
        }
    }
}

enum Place<'e> {
    Var(&'e str),
    Property { base: Value, key: Rc<str> },
}

pub struct Machine {
    pub(crate) heap: Heap,
    scopes: Vec<Scope>,
    pub(crate) intrinsics: Intrinsics,
    limits: SandboxLimits,
    steps: u64,
    depth: u32,
    last_log: Option<String>,
    /// Objects being stringified, to cut cycles.
    pub(crate) visiting: Vec<ObjId>,
    /// One entry per running class constructor: whether `this` is initialized.
    super_calls: Vec<bool>,
}

impl Machine {
    pub(crate) fn new(limits: SandboxLimits) -> Self {
        let mut heap = Heap::default();
        let object_proto = heap.alloc(HeapObject::new(ObjectKind::Plain, None));
        let mut plain = |proto| heap.alloc(HeapObject::new(ObjectKind::Plain, Some(proto)));
        let function_proto = plain(object_proto);
        let array_proto = plain(object_proto);
        let string_proto = plain(object_proto);
        let number_proto = plain(object_proto);
        let boolean_proto = plain(object_proto);
        let error_proto = plain(object_proto);
        let type_error_proto = plain(error_proto);
        let range_error_proto = plain(error_proto);
        let reference_error_proto = plain(error_proto);
        let syntax_error_proto = plain(error_proto);
        let intrinsics = Intrinsics {
            object_proto,
            function_proto,
            array_proto,
            string_proto,
            number_proto,
            boolean_proto,
            error_proto,
            type_error_proto,
            range_error_proto,
            reference_error_proto,
            syntax_error_proto,
        };
        let mut machine = Self {
            heap,
            scopes: vec![
                Scope::default(),
                Scope {
                    vars: HashMap::new(),
                    parent: Some(BUILTIN_SCOPE),
                },
            ],
            intrinsics,
            limits,
            steps: 0,
            depth: 0,
            last_log: None,
            visiting: Vec::new(),
            super_calls: Vec::new(),
        };
        builtins::install(&mut machine);
        machine
    }

    pub(crate) fn run(&mut self, program: &[Stmt]) -> ExecutionOutcome {
        let ctx = Ctx {
            scope: GLOBAL_SCOPE,
            this: Value::Undefined,
            home: None,
            class: None,
        };
        self.hoist_vars(program, GLOBAL_SCOPE);
        match self.exec_body(program, &ctx) {
            Ok(()) | Err(Abrupt::Return(_) | Abrupt::Break | Abrupt::Continue) => {
                ExecutionOutcome::Captured(
                    self.last_log
                        .take()
                        .unwrap_or_else(|| SUCCESS_SENTINEL.to_string()),
                )
            }
            Err(Abrupt::Throw(value)) => {
                let message = self.describe_uncaught(value);
                ExecutionOutcome::failed(FailureKind::Runtime, message)
            }
            Err(Abrupt::StepLimit) => ExecutionOutcome::failed(
                FailureKind::StepLimit,
                format!(
                    "RangeError: Execution stopped after {} steps. Is there a loop that never ends?",
                    self.limits.max_steps
                ),
            ),
        }
    }

    fn describe_uncaught(&mut self, value: Value) -> String {
        self.limits.max_steps = self.limits.max_steps.saturating_add(1_000);
        if let Value::Object(id) = value {
            if self.heap.inherits(id, self.intrinsics.error_proto) {
                let name = self
                    .get_property(&value, "name")
                    .and_then(|v| self.to_string(&v))
                    .map_or_else(|_| "Error".to_string(), |s| s.to_string());
                let message = self
                    .get_property(&value, "message")
                    .and_then(|v| self.to_string(&v))
                    .map_or_else(|_| String::new(), |s| s.to_string());
                return if message.is_empty() {
                    name
                } else {
                    format!("{name}: {message}")
                };
            }
        }
        match self.to_string(&value) {
            Ok(text) => format!("Uncaught {text}"),
            Err(_) => "Uncaught exception".to_string(),
        }
    }

    //
    // ─── BUDGET ───────────────────────────────────────────────────────────────
    //

    fn tick(&mut self) -> Completion<()> {
        self.charge(1)
    }

    /// Spends `steps` of the run's budget.
    pub(crate) fn charge(&mut self, steps: u64) -> Completion<()> {
        self.steps = self.steps.saturating_add(steps);
        if self.steps > self.limits.max_steps {
            Err(Abrupt::StepLimit)
        } else {
            Ok(())
        }
    }

    fn enter_call(&mut self) -> Completion<()> {
        self.tick()?;
        if self.depth >= self.limits.max_call_depth {
            return Err(self.range_error("Maximum call stack size exceeded"));
        }
        self.depth += 1;
        Ok(())
    }

    fn leave_call(&mut self) {
        self.depth = self.depth.saturating_sub(1);
    }

    pub(crate) fn record_log(&mut self, line: String) {
        self.last_log = Some(line);
    }

    //
    // ─── SCOPES ───────────────────────────────────────────────────────────────
    //

    fn new_scope(&mut self, parent: ScopeId) -> ScopeId {
        self.scopes.push(Scope {
            vars: HashMap::new(),
            parent: Some(parent),
        });
        ScopeId(self.scopes.len() - 1)
    }

    pub(crate) fn define_builtin(&mut self, name: &str, value: Value) {
        self.scopes[BUILTIN_SCOPE.0].vars.insert(
            name.into(),
            Binding {
                value,
                mutable: true,
                initialized: true,
            },
        );
    }

    fn find_binding(&self, mut scope: ScopeId, name: &str) -> Option<ScopeId> {
        loop {
            let current = &self.scopes[scope.0];
            if current.vars.contains_key(name) {
                return Some(scope);
            }
            scope = current.parent?;
        }
    }

    fn lookup(&mut self, name: &str, ctx: &Ctx) -> Completion<Value> {
        let binding = self
            .find_binding(ctx.scope, name)
            .and_then(|scope| self.scopes[scope.0].vars.get(name))
            .map(|binding| binding.initialized.then(|| binding.value.clone()));
        match binding {
            Some(Some(value)) => Ok(value),
            Some(None) => Err(self.reference_error(format!(
                "Cannot access '{name}' before initialization"
            ))),
            None => Err(self.reference_error(format!("{name} is not defined"))),
        }
    }

    fn assign(&mut self, name: &str, value: Value, ctx: &Ctx) -> Completion<()> {
        let Some(scope) = self.find_binding(ctx.scope, name) else {
            // Sloppy mode: assigning an undeclared name creates a global.
            self.scopes[GLOBAL_SCOPE.0].vars.insert(
                name.into(),
                Binding {
                    value,
                    mutable: true,
                    initialized: true,
                },
            );
            return Ok(());
        };
        let (initialized, mutable) = match self.scopes[scope.0].vars.get(name) {
            Some(binding) => (binding.initialized, binding.mutable),
            None => return Ok(()),
        };
        if !initialized {
            return Err(self.reference_error(format!(
                "Cannot access '{name}' before initialization"
            )));
        }
        if !mutable {
            return Err(self.type_error("Assignment to constant variable."));
        }
        if let Some(binding) = self.scopes[scope.0].vars.get_mut(name) {
            binding.value = value;
        }
        Ok(())
    }

    fn declare(&mut self, scope: ScopeId, name: &str, mutable: bool) -> Completion<()> {
        if self.scopes[scope.0].vars.contains_key(name) {
            return Err(self.syntax_error(format!(
                "Identifier '{name}' has already been declared"
            )));
        }
        self.scopes[scope.0].vars.insert(
            name.into(),
            Binding {
                value: Value::Undefined,
                mutable,
                initialized: false,
            },
        );
        Ok(())
    }

    /// Sets a binding's value and ends its temporal dead zone.
    fn initialize(&mut self, scope: ScopeId, name: &str, value: Value, mutable: bool) {
        let binding = Binding {
            value,
            mutable,
            initialized: true,
        };
        match self.scopes[scope.0].vars.get_mut(name) {
            Some(existing) => {
                existing.value = binding.value;
                existing.initialized = true;
            }
            None => {
                self.scopes[scope.0].vars.insert(name.into(), binding);
            }
        }
    }

    fn hoist_vars(&mut self, stmts: &[Stmt], scope: ScopeId) {
        for stmt in stmts {
            self.hoist_stmt(stmt, scope);
        }
    }

    fn hoist_stmt(&mut self, stmt: &Stmt, scope: ScopeId) {
        match stmt {
            Stmt::Decl {
                kind: DeclKind::Var,
                declarators,
            } => {
                for declarator in declarators {
                    self.hoist_var(scope, &declarator.name);
                }
            }
            Stmt::Block(body) => self.hoist_vars(body, scope),
            Stmt::If {
                consequent,
                alternate,
                ..
            } => {
                self.hoist_stmt(consequent, scope);
                if let Some(alternate) = alternate {
                    self.hoist_stmt(alternate, scope);
                }
            }
            Stmt::While { body, .. } | Stmt::DoWhile { body, .. } => self.hoist_stmt(body, scope),
            Stmt::For { init, body, .. } => {
                if let Some(init) = init {
                    self.hoist_stmt(init, scope);
                }
                self.hoist_stmt(body, scope);
            }
            Stmt::ForOf {
                kind, name, body, ..
            }
            | Stmt::ForIn {
                kind, name, body, ..
            } => {
                if *kind == Some(DeclKind::Var) {
                    self.hoist_var(scope, name);
                }
                self.hoist_stmt(body, scope);
            }
            Stmt::Switch { cases, .. } => {
                for case in cases {
                    self.hoist_vars(&case.body, scope);
                }
            }
            Stmt::Try {
                block,
                handler,
                finalizer,
            } => {
                self.hoist_vars(block, scope);
                if let Some(handler) = handler {
                    self.hoist_vars(&handler.body, scope);
                }
                if let Some(finalizer) = finalizer {
                    self.hoist_vars(finalizer, scope);
                }
            }
            _ => {}
        }
    }

    fn hoist_var(&mut self, scope: ScopeId, name: &str) {
        self.scopes[scope.0]
            .vars
            .entry(name.into())
            .or_insert(Binding {
                value: Value::Undefined,
                mutable: true,
                initialized: true,
            });
    }

    /// Creates the block's `let`/`const`/`class` bindings and hoisted functions.
    fn declare_lexical(&mut self, stmts: &[Stmt], ctx: &Ctx) -> Completion<()> {
        for stmt in stmts {
            match stmt {
                Stmt::Decl { kind, declarators } if *kind != DeclKind::Var => {
                    for declarator in declarators {
                        self.declare(ctx.scope, &declarator.name, *kind == DeclKind::Let)?;
                    }
                }
                Stmt::Class(def) => {
                    if let Some(name) = &def.name {
                        self.declare(ctx.scope, name, true)?;
                    }
                }
                Stmt::Function(def) => {
                    let function = self.make_function(def, ctx, None);
                    if let Some(name) = &def.name {
                        self.initialize(ctx.scope, name, function, true);
                    }
                }
                _ => {}
            }
        }
        Ok(())
    }

    //
    // ─── STATEMENTS ───────────────────────────────────────────────────────────
    //

    fn exec_body(&mut self, stmts: &[Stmt], ctx: &Ctx) -> Completion<()> {
        self.declare_lexical(stmts, ctx)?;
        for stmt in stmts {
            self.exec(stmt, ctx)?;
        }
        Ok(())
    }

    fn exec_block(&mut self, stmts: &[Stmt], ctx: &Ctx) -> Completion<()> {
        let scope = self.new_scope(ctx.scope);
        self.exec_body(stmts, &ctx.with_scope(scope))
    }

    /// Runs one loop body; `Ok(false)` means the loop should stop.
    fn loop_iteration(&mut self, body: &Stmt, ctx: &Ctx) -> Completion<bool> {
        match self.exec(body, ctx) {
            Ok(()) | Err(Abrupt::Continue) => Ok(true),
            Err(Abrupt::Break) => Ok(false),
            Err(other) => Err(other),
        }
    }

    fn exec(&mut self, stmt: &Stmt, ctx: &Ctx) -> Completion<()> {
        self.tick()?;
        match stmt {
            Stmt::Empty | Stmt::Function(_) => Ok(()),
            Stmt::Expr(expr) => self.eval(expr, ctx).map(drop),
            Stmt::Decl { kind, declarators } => {
                for declarator in declarators {
                    match (kind, &declarator.init) {
                        (DeclKind::Var, None) => {}
                        (DeclKind::Var, Some(init)) => {
                            let value = self.eval(init, ctx)?;
                            self.assign(&declarator.name, value, ctx)?;
                        }
                        (_, init) => {
                            let value = match init {
                                Some(init) => self.eval(init, ctx)?,
                                None => Value::Undefined,
                            };
                            let mutable = *kind == DeclKind::Let;
                            self.initialize(ctx.scope, &declarator.name, value, mutable);
                        }
                    }
                }
                Ok(())
            }
            Stmt::Class(def) => {
                let class = self.make_class(def, ctx)?;
                if let Some(name) = &def.name {
                    self.initialize(ctx.scope, name, class, true);
                }
                Ok(())
            }
            Stmt::Block(body) => self.exec_block(body, ctx),
            Stmt::If {
                test,
                consequent,
                alternate,
            } => {
                if self.eval(test, ctx)?.truthy() {
                    self.exec(consequent, ctx)
                } else if let Some(alternate) = alternate {
                    self.exec(alternate, ctx)
                } else {
                    Ok(())
                }
            }
            Stmt::While { test, body } => {
                while self.eval(test, ctx)?.truthy() {
                    if !self.loop_iteration(body, ctx)? {
                        break;
                    }
                }
                Ok(())
            }
            Stmt::DoWhile { body, test } => {
                while self.loop_iteration(body, ctx)? && self.eval(test, ctx)?.truthy() {
                    self.tick()?;
                }
                Ok(())
            }
            Stmt::For {
                init,
                test,
                update,
                body,
            } => self.exec_for(init.as_deref(), test.as_ref(), update.as_ref(), body, ctx),
            Stmt::ForOf {
                kind,
                name,
                iterable,
                body,
            } => {
                let subject = self.eval(iterable, ctx)?;
                let items = self.iterate(&subject, iterable)?;
                self.exec_for_each(*kind, name, items, body, ctx)
            }
            Stmt::ForIn {
                kind,
                name,
                object,
                body,
            } => {
                let subject = self.eval(object, ctx)?;
                let keys = self
                    .enumerable_keys(&subject)?
                    .into_iter()
                    .map(Value::Str)
                    .collect();
                self.exec_for_each(*kind, name, keys, body, ctx)
            }
            Stmt::Switch {
                discriminant,
                cases,
            } => {
                let subject = self.eval(discriminant, ctx)?;
                let scope = self.new_scope(ctx.scope);
                let inner = ctx.with_scope(scope);
                for case in cases {
                    self.declare_lexical(&case.body, &inner)?;
                }
                let mut start = None;
                for (index, case) in cases.iter().enumerate() {
                    if let Some(test) = &case.test {
                        if self.eval(test, &inner)?.strict_equals(&subject) {
                            start = Some(index);
                            break;
                        }
                    }
                }
                let start = start.or_else(|| cases.iter().position(|case| case.test.is_none()));
                let Some(start) = start else {
                    return Ok(());
                };
                for case in &cases[start..] {
                    for stmt in &case.body {
                        match self.exec(stmt, &inner) {
                            Ok(()) => {}
                            Err(Abrupt::Break) => return Ok(()),
                            Err(other) => return Err(other),
                        }
                    }
                }
                Ok(())
            }
            Stmt::Return(argument) => {
                let value = match argument {
                    Some(argument) => self.eval(argument, ctx)?,
                    None => Value::Undefined,
                };
                Err(Abrupt::Return(value))
            }
            Stmt::Break => Err(Abrupt::Break),
            Stmt::Continue => Err(Abrupt::Continue),
            Stmt::Throw(argument) => {
                let value = self.eval(argument, ctx)?;
                Err(Abrupt::Throw(value))
            }
            Stmt::Try {
                block,
                handler,
                finalizer,
            } => {
                let mut result = self.exec_block(block, ctx);
                let thrown = match &result {
                    Err(Abrupt::Throw(value)) => Some(value.clone()),
                    _ => None,
                };
                if let (Some(thrown), Some(handler)) = (thrown, handler) {
                    let scope = self.new_scope(ctx.scope);
                    if let Some(param) = &handler.param {
                        self.initialize(scope, param, thrown, true);
                    }
                    result = self.exec_block(&handler.body, &ctx.with_scope(scope));
                }
                if let Some(finalizer) = finalizer {
                    self.exec_block(finalizer, ctx)?;
                }
                result
            }
        }
    }

    fn exec_for(
        &mut self,
        init: Option<&Stmt>,
        test: Option<&Expr>,
        update: Option<&Expr>,
        body: &Stmt,
        ctx: &Ctx,
    ) -> Completion<()> {
        let scope = self.new_scope(ctx.scope);
        let mut iteration = ctx.with_scope(scope);
        // `let` bindings are copied per iteration so closures see that iteration's values.
        let per_iteration = matches!(
            init,
            Some(Stmt::Decl {
                kind: DeclKind::Let,
                ..
            })
        );
        if let Some(init) = init {
            self.declare_lexical(std::slice::from_ref(init), &iteration)?;
            self.exec(init, &iteration)?;
        }
        if per_iteration {
            iteration = self.copy_iteration_scope(&iteration, ctx);
        }
        loop {
            self.tick()?;
            if let Some(test) = test {
                if !self.eval(test, &iteration)?.truthy() {
                    break;
                }
            }
            if !self.loop_iteration(body, &iteration)? {
                break;
            }
            if per_iteration {
                iteration = self.copy_iteration_scope(&iteration, ctx);
            }
            if let Some(update) = update {
                self.eval(update, &iteration)?;
            }
        }
        Ok(())
    }

    fn copy_iteration_scope(&mut self, iteration: &Ctx, outer: &Ctx) -> Ctx {
        let vars = self.scopes[iteration.scope.0].vars.clone();
        self.scopes.push(Scope {
            vars,
            parent: Some(outer.scope),
        });
        outer.with_scope(ScopeId(self.scopes.len() - 1))
    }

    fn exec_for_each(
        &mut self,
        kind: Option<DeclKind>,
        name: &str,
        items: Vec<Value>,
        body: &Stmt,
        ctx: &Ctx,
    ) -> Completion<()> {
        for item in items {
            self.tick()?;
            let scope = self.new_scope(ctx.scope);
            let iteration = ctx.with_scope(scope);
            match kind {
                Some(DeclKind::Let) => self.initialize(scope, name, item, true),
                Some(DeclKind::Const) => self.initialize(scope, name, item, false),
                Some(DeclKind::Var) | None => self.assign(name, item, ctx)?,
            }
            if !self.loop_iteration(body, &iteration)? {
                break;
            }
        }
        Ok(())
    }

    //
    // ─── EXPRESSIONS ──────────────────────────────────────────────────────────
    //

    fn eval(&mut self, expr: &Expr, ctx: &Ctx) -> Completion<Value> {
        match expr {
            Expr::Number(n) => Ok(Value::Number(*n)),
            Expr::Str(s) => Ok(Value::str(s.as_str())),
            Expr::Template { quasis, exprs } => {
                let mut text = String::new();
                for (index, quasi) in quasis.iter().enumerate() {
                    text.push_str(quasi);
                    if let Some(expr) = exprs.get(index) {
                        let value = self.eval(expr, ctx)?;
                        text.push_str(&self.to_string(&value)?);
                    }
                }
                Ok(Value::from(text))
            }
            Expr::Bool(b) => Ok(Value::Bool(*b)),
            Expr::Null => Ok(Value::Null),
            Expr::Undefined => Ok(Value::Undefined),
            Expr::This => Ok(ctx.this.clone()),
            Expr::Ident(name) => self.lookup(name, ctx),
            Expr::Array(items) => {
                let values = self.eval_list(items, ctx)?;
                self.new_array(values)
            }
            Expr::Object(props) => self.eval_object(props, ctx),
            Expr::Function(def) => Ok(self.make_function(def, ctx, None)),
            Expr::Class(def) => self.make_class(def, ctx),
            Expr::Unary { op, arg } => self.eval_unary(*op, arg, ctx),
            Expr::Update {
                increment,
                prefix,
                target,
            } => {
                let place = self.place(target, ctx)?;
                let old = self.read_place(&place, ctx)?;
                let old = self.to_number(&old)?;
                let new = if *increment { old + 1.0 } else { old - 1.0 };
                self.write_place(&place, Value::Number(new), ctx)?;
                Ok(Value::Number(if *prefix { new } else { old }))
            }
            Expr::Binary { op, left, right } => {
                let left_value = self.eval(left, ctx)?;
                let right_value = self.eval(right, ctx)?;
                self.binary(*op, left_value, right_value, right)
            }
            Expr::Logical { op, left, right } => {
                let left = self.eval(left, ctx)?;
                if short_circuits(*op, &left) {
                    Ok(left)
                } else {
                    self.eval(right, ctx)
                }
            }
            Expr::Conditional {
                test,
                consequent,
                alternate,
            } => {
                if self.eval(test, ctx)?.truthy() {
                    self.eval(consequent, ctx)
                } else {
                    self.eval(alternate, ctx)
                }
            }
            Expr::Assign { op, target, value } => self.eval_assign(*op, target, value, ctx),
            Expr::Sequence(exprs) => {
                let mut last = Value::Undefined;
                for expr in exprs {
                    last = self.eval(expr, ctx)?;
                }
                Ok(last)
            }
            Expr::Member { .. } | Expr::Index { .. } | Expr::Call { .. } => {
                Ok(self.eval_chain(expr, ctx)?.unwrap_or_default())
            }
            Expr::New { callee, args } => {
                let constructor = self.eval(callee, ctx)?;
                let args = self.eval_list(args, ctx)?;
                self.construct(&constructor, args, &label(callee))
            }
            Expr::Spread(inner) => self.eval(inner, ctx),
            Expr::SuperCall(args) => self.eval_super_call(args, ctx),
            Expr::SuperMember(name) => self.super_property(name, ctx),
        }
    }

    /// Evaluates array items or call arguments, expanding spreads.
    fn eval_list(&mut self, items: &[Expr], ctx: &Ctx) -> Completion<Vec<Value>> {
        let mut values = Vec::with_capacity(items.len());
        for item in items {
            if let Expr::Spread(inner) = item {
                let spread = self.eval(inner, ctx)?;
                values.extend(self.iterate(&spread, inner)?);
            } else {
                values.push(self.eval(item, ctx)?);
            }
        }
        Ok(values)
    }

    fn eval_unary(&mut self, op: UnaryOp, arg: &Expr, ctx: &Ctx) -> Completion<Value> {
        if op == UnaryOp::TypeOf {
            if let Expr::Ident(name) = arg {
                if self.find_binding(ctx.scope, name).is_none() {
                    return Ok(Value::from("undefined"));
                }
            }
        }
        let value = self.eval(arg, ctx)?;
        Ok(match op {
            UnaryOp::Not => Value::Bool(!value.truthy()),
            UnaryOp::Neg => Value::Number(-self.to_number(&value)?),
            UnaryOp::Plus => Value::Number(self.to_number(&value)?),
            UnaryOp::TypeOf => Value::from(self.type_of(&value)),
            UnaryOp::Void => Value::Undefined,
        })
    }

    fn eval_assign(
        &mut self,
        op: AssignOp,
        target: &Expr,
        value: &Expr,
        ctx: &Ctx,
    ) -> Completion<Value> {
        let place = self.place(target, ctx)?;
        let result = match op {
            AssignOp::Assign => self.eval(value, ctx)?,
            AssignOp::Binary(binary) => {
                let current = self.read_place(&place, ctx)?;
                let operand = self.eval(value, ctx)?;
                self.binary(binary, current, operand, value)?
            }
            AssignOp::Logical(logical) => {
                let current = self.read_place(&place, ctx)?;
                if short_circuits(logical, &current) {
                    return Ok(current);
                }
                self.eval(value, ctx)?
            }
        };
        self.write_place(&place, result.clone(), ctx)?;
        Ok(result)
    }

    fn place<'e>(&mut self, target: &'e Expr, ctx: &Ctx) -> Completion<Place<'e>> {
        match target {
            Expr::Ident(name) => Ok(Place::Var(name)),
            Expr::Member {
                object, property, ..
            } => {
                let base = self.eval(object, ctx)?;
                Ok(Place::Property {
                    base,
                    key: property.as_str().into(),
                })
            }
            Expr::Index { object, index, .. } => {
                let base = self.eval(object, ctx)?;
                let index = self.eval(index, ctx)?;
                let key = self.property_key(&index)?;
                Ok(Place::Property { base, key })
            }
            _ => Err(self.syntax_error("Invalid left-hand side in assignment")),
        }
    }

    fn read_place(&mut self, place: &Place<'_>, ctx: &Ctx) -> Completion<Value> {
        match place {
            Place::Var(name) => self.lookup(name, ctx),
            Place::Property { base, key } => self.get_property(base, key),
        }
    }

    fn write_place(&mut self, place: &Place<'_>, value: Value, ctx: &Ctx) -> Completion<()> {
        match place {
            Place::Var(name) => self.assign(name, value, ctx),
            Place::Property { base, key } => self.set_property(base, key, value),
        }
    }

    /// Member, index and call chains. `None` means an optional link
    /// short-circuited the rest of the chain.
    fn eval_chain(&mut self, expr: &Expr, ctx: &Ctx) -> Completion<Option<Value>> {
        match expr {
            Expr::Member {
                object,
                property,
                optional,
            } => {
                let Some(base) = self.eval_chain(object, ctx)? else {
                    return Ok(None);
                };
                if *optional && base.is_nullish() {
                    return Ok(None);
                }
                self.get_property(&base, property).map(Some)
            }
            Expr::Index {
                object,
                index,
                optional,
            } => {
                let Some(base) = self.eval_chain(object, ctx)? else {
                    return Ok(None);
                };
                if *optional && base.is_nullish() {
                    return Ok(None);
                }
                let index = self.eval(index, ctx)?;
                let key = self.property_key(&index)?;
                self.get_property(&base, &key).map(Some)
            }
            Expr::Call {
                callee,
                args,
                optional,
            } => self.eval_call(callee, args, *optional, ctx),
            other => self.eval(other, ctx).map(Some),
        }
    }

    fn eval_call(
        &mut self,
        callee: &Expr,
        args: &[Expr],
        optional: bool,
        ctx: &Ctx,
    ) -> Completion<Option<Value>> {
        let (function, this) = match callee {
            Expr::Member {
                object,
                property,
                optional: optional_base,
            } => {
                let Some(base) = self.eval_chain(object, ctx)? else {
                    return Ok(None);
                };
                if *optional_base && base.is_nullish() {
                    return Ok(None);
                }
                (self.get_property(&base, property)?, base)
            }
            Expr::Index {
                object,
                index,
                optional: optional_base,
            } => {
                let Some(base) = self.eval_chain(object, ctx)? else {
                    return Ok(None);
                };
                if *optional_base && base.is_nullish() {
                    return Ok(None);
                }
                let index = self.eval(index, ctx)?;
                let key = self.property_key(&index)?;
                (self.get_property(&base, &key)?, base)
            }
            Expr::SuperMember(name) => (self.super_property(name, ctx)?, ctx.this.clone()),
            other => {
                let Some(function) = self.eval_chain(other, ctx)? else {
                    return Ok(None);
                };
                (function, Value::Undefined)
            }
        };
        if optional && function.is_nullish() {
            return Ok(None);
        }
        if !self.is_callable(&function) {
            return Err(self.type_error(format!("{} is not a function", label(callee))));
        }
        let args = self.eval_list(args, ctx)?;
        self.call(&function, this, args).map(Some)
    }

    fn eval_object(&mut self, props: &[Property], ctx: &Ctx) -> Completion<Value> {
        let id = self.new_object_id();
        for prop in props {
            match prop {
                Property::Value { key, value } => {
                    let key = self.prop_key(key, ctx)?;
                    let value = self.eval(value, ctx)?;
                    self.heap.get_mut(id).define(&key, value);
                }
                Property::Method { key, kind, func } => {
                    let key = self.prop_key(key, ctx)?;
                    let function = self.make_function(func, ctx, Some(id));
                    self.define_method(id, &key, *kind, function);
                }
                Property::Spread(source) => {
                    let source = self.eval(source, ctx)?;
                    if source.is_nullish() {
                        continue;
                    }
                    for key in self.enumerable_keys(&source)? {
                        let value = self.get_property(&source, &key)?;
                        self.heap.get_mut(id).define(&key, value);
                    }
                }
            }
        }
        Ok(Value::Object(id))
    }

    fn prop_key(&mut self, key: &PropKey, ctx: &Ctx) -> Completion<Rc<str>> {
        match key {
            PropKey::Named(name) => Ok(name.as_str().into()),
            PropKey::Computed(expr) => {
                let value = self.eval(expr, ctx)?;
                self.property_key(&value)
            }
        }
    }

    fn define_method(&mut self, target: ObjId, key: &str, kind: MethodKind, function: Value) {
        let Value::Object(function) = function else {
            return;
        };
        let object = self.heap.get_mut(target);
        let (mut get, mut set) = match object.own(key) {
            Some(Slot::Accessor { get, set }) => (*get, *set),
            _ => (None, None),
        };
        match kind {
            MethodKind::Method => object.define(key, Value::Object(function)),
            MethodKind::Getter => {
                get = Some(function);
                object.define_slot(key, Slot::Accessor { get, set });
            }
            MethodKind::Setter => {
                set = Some(function);
                object.define_slot(key, Slot::Accessor { get, set });
            }
        }
    }

    //
    // ─── FUNCTIONS AND CLASSES ────────────────────────────────────────────────
    //

    fn make_function(&mut self, def: &Rc<FunctionDef>, ctx: &Ctx, home: Option<ObjId>) -> Value {
        let closure = Closure {
            def: Rc::clone(def),
            scope: ctx.scope,
            this: def.arrow.then(|| ctx.this.clone()),
            home: if def.arrow { ctx.home } else { home },
        };
        let id = self.heap.alloc(HeapObject::new(
            ObjectKind::Closure(closure),
            Some(self.intrinsics.function_proto),
        ));
        if let Some(name) = &def.name {
            self.heap.get_mut(id).define("name", Value::str(name.as_str()));
        }
        if !def.arrow && home.is_none() {
            let prototype = self.new_object_id();
            self.heap
                .get_mut(prototype)
                .define("constructor", Value::Object(id));
            self.heap
                .get_mut(id)
                .define("prototype", Value::Object(prototype));
        }
        Value::Object(id)
    }

    fn make_class(&mut self, def: &Rc<ClassDef>, ctx: &Ctx) -> Completion<Value> {
        let parent = match &def.parent {
            Some(expr) => {
                let value = self.eval(expr, ctx)?;
                match value {
                    Value::Object(id) if self.heap.get(id).kind.is_callable() => Some(id),
                    other => {
                        let text = self.to_string(&other)?;
                        return Err(self.type_error(format!(
                            "Class extends value {text} is not a constructor or null"
                        )));
                    }
                }
            }
            None => None,
        };
        let parent_prototype = match parent {
            Some(parent) => self
                .get_property(&Value::Object(parent), "prototype")?
                .as_object(),
            None => Some(self.intrinsics.object_proto),
        };
        let prototype = self
            .heap
            .alloc(HeapObject::new(ObjectKind::Plain, parent_prototype));
        let scope = self.new_scope(ctx.scope);
        let class_id = self.heap.alloc(HeapObject::new(
            ObjectKind::Class(ClassData {
                def: Rc::clone(def),
                scope,
                parent,
            }),
            Some(parent.unwrap_or(self.intrinsics.function_proto)),
        ));
        let class = Value::Object(class_id);
        if let Some(name) = &def.name {
            self.heap.get_mut(class_id).define("name", Value::str(name.as_str()));
            self.initialize(scope, name, class.clone(), false);
        }
        self.heap
            .get_mut(class_id)
            .define("prototype", Value::Object(prototype));
        self.heap
            .get_mut(prototype)
            .define("constructor", class.clone());

        let class_ctx = Ctx {
            scope,
            this: class.clone(),
            home: Some(class_id),
            class: None,
        };
        for method in &def.methods {
            let key = self.prop_key(&method.key, &class_ctx)?;
            let (target, home) = if method.is_static {
                (class_id, class_id)
            } else {
                (prototype, prototype)
            };
            let function = self.make_function(&method.func, &class_ctx, Some(home));
            self.define_method(target, &key, method.kind, function);
        }
        for field in def.fields.iter().filter(|field| field.is_static) {
            let key = self.prop_key(&field.key, &class_ctx)?;
            let value = match &field.init {
                Some(init) => self.eval(init, &class_ctx)?,
                None => Value::Undefined,
            };
            self.heap.get_mut(class_id).define(&key, value);
        }
        Ok(class)
    }

    fn bind_params(&mut self, params: &[Param], mut args: Vec<Value>, ctx: &Ctx) -> Completion<()> {
        for (index, param) in params.iter().enumerate() {
            let value = if param.rest {
                let rest = if index < args.len() {
                    args.split_off(index)
                } else {
                    Vec::new()
                };
                self.new_array(rest)?
            } else {
                let value = args.get(index).cloned().unwrap_or_default();
                match (&value, &param.default) {
                    (Value::Undefined, Some(default)) => self.eval(default, ctx)?,
                    _ => value,
                }
            };
            self.initialize(ctx.scope, &param.name, value, true);
        }
        Ok(())
    }

    fn run_body(&mut self, def: &FunctionDef, ctx: &Ctx) -> Completion<Value> {
        match &def.body {
            FunctionBody::Expr(expr) => self.eval(expr, ctx),
            FunctionBody::Block(body) => {
                self.hoist_vars(body, ctx.scope);
                match self.exec_body(body, ctx) {
                    Ok(()) => Ok(Value::Undefined),
                    Err(Abrupt::Return(value)) => Ok(value),
                    Err(other) => Err(other),
                }
            }
        }
    }

    fn call_closure(&mut self, closure: &Closure, this: Value, args: Vec<Value>) -> Completion<Value> {
        self.enter_call()?;
        let scope = self.new_scope(closure.scope);
        let ctx = Ctx {
            scope,
            this: closure.this.clone().unwrap_or(this),
            home: closure.home,
            class: None,
        };
        let result = self
            .bind_params(&closure.def.params, args, &ctx)
            .and_then(|()| self.run_body(&closure.def, &ctx));
        self.leave_call();
        result
    }

    /// Calls any callable value.
    pub(crate) fn call(&mut self, function: &Value, this: Value, args: Vec<Value>) -> Completion<Value> {
        let Some(id) = function.as_object() else {
            let text = self.to_string(function)?;
            return Err(self.type_error(format!("{text} is not a function")));
        };
        match &self.heap.get(id).kind {
            ObjectKind::Native(native) => {
                let native = *native;
                (native.func)(self, this, args)
            }
            ObjectKind::Closure(closure) => {
                let closure = closure.clone();
                self.call_closure(&closure, this, args)
            }
            ObjectKind::Class(data) => {
                let name = data.def.name.clone().unwrap_or_default();
                Err(self.type_error(format!(
                    "Class constructor {name} cannot be invoked without 'new'"
                )))
            }
            ObjectKind::Plain | ObjectKind::Array(_) => {
                Err(self.type_error("object is not a function"))
            }
        }
    }

    /// `new callee(...args)`.
    pub(crate) fn construct(&mut self, callee: &Value, args: Vec<Value>, label: &str) -> Completion<Value> {
        let constructible = callee.as_object().is_some_and(|id| match &self.heap.get(id).kind {
            ObjectKind::Class(_) => true,
            ObjectKind::Closure(closure) => !closure.def.arrow && closure.home.is_none(),
            ObjectKind::Native(native) => native.constructor,
            ObjectKind::Plain | ObjectKind::Array(_) => false,
        });
        let Some(id) = callee.as_object().filter(|_| constructible) else {
            return Err(self.type_error(format!("{label} is not a constructor")));
        };
        let prototype = self
            .get_property(callee, "prototype")?
            .as_object()
            .unwrap_or(self.intrinsics.object_proto);
        let instance = self
            .heap
            .alloc(HeapObject::new(ObjectKind::Plain, Some(prototype)));
        let result = self.initialize_instance(id, instance, args)?;
        Ok(match result {
            Value::Object(_) => result,
            _ => Value::Object(instance),
        })
    }

    /// Runs `constructor`'s initialization on an already allocated instance.
    fn initialize_instance(&mut self, constructor: ObjId, instance: ObjId, args: Vec<Value>) -> Completion<Value> {
        match &self.heap.get(constructor).kind {
            ObjectKind::Native(native) => {
                let native = *native;
                (native.func)(self, Value::Object(instance), args)
            }
            ObjectKind::Closure(closure) => {
                let closure = closure.clone();
                self.call_closure(&closure, Value::Object(instance), args)
            }
            ObjectKind::Class(data) => {
                let data = data.clone();
                self.initialize_class(constructor, &data, instance, args)
            }
            ObjectKind::Plain | ObjectKind::Array(_) => Ok(Value::Undefined),
        }
    }

    fn initialize_class(
        &mut self,
        class_id: ObjId,
        data: &ClassData,
        instance: ObjId,
        args: Vec<Value>,
    ) -> Completion<Value> {
        let Some(constructor) = data.def.constructor.clone() else {
            if let Some(parent) = data.parent {
                self.initialize_instance(parent, instance, args)?;
            }
            let ctx = self.constructor_ctx(class_id, data, instance);
            self.init_fields(data, None, instance, &ctx)?;
            return Ok(Value::Undefined);
        };
        self.enter_call()?;
        let ctx = self.constructor_ctx(class_id, data, instance);
        self.super_calls.push(data.parent.is_none());
        let result = self.run_constructor(data, &constructor, instance, args, &ctx);
        let initialized = self.super_calls.pop().unwrap_or(true);
        self.leave_call();
        let value = result?;
        if !initialized {
            return Err(self.reference_error(
                "Must call super constructor in derived class before accessing 'this' or returning from derived constructor",
            ));
        }
        Ok(value)
    }

    fn constructor_ctx(&mut self, class_id: ObjId, data: &ClassData, instance: ObjId) -> Ctx {
        let scope = self.new_scope(data.scope);
        let home = self
            .heap
            .get(class_id)
            .own("prototype")
            .and_then(|slot| match slot {
                Slot::Data(value) => value.as_object(),
                Slot::Accessor { .. } => None,
            });
        Ctx {
            scope,
            this: Value::Object(instance),
            home,
            class: Some(class_id),
        }
    }

    fn run_constructor(
        &mut self,
        data: &ClassData,
        constructor: &FunctionDef,
        instance: ObjId,
        args: Vec<Value>,
        ctx: &Ctx,
    ) -> Completion<Value> {
        self.bind_params(&constructor.params, args, ctx)?;
        if data.parent.is_none() {
            self.init_fields(data, Some(constructor), instance, ctx)?;
        }
        self.run_body(constructor, ctx)
    }

    /// Parameter properties, then field initializers.
    fn init_fields(
        &mut self,
        data: &ClassData,
        constructor: Option<&FunctionDef>,
        instance: ObjId,
        ctx: &Ctx,
    ) -> Completion<()> {
        if let Some(constructor) = constructor {
            for param in constructor.params.iter().filter(|param| param.field) {
                let value = self.lookup(&param.name, ctx)?;
                self.heap.get_mut(instance).define(&param.name, value);
            }
        }
        let field_scope = self.new_scope(data.scope);
        let field_ctx = Ctx {
            scope: field_scope,
            class: None,
            ..ctx.clone()
        };
        for field in data.def.fields.iter().filter(|field| !field.is_static) {
            let key = self.prop_key(&field.key, &field_ctx)?;
            let value = match &field.init {
                Some(init) => self.eval(init, &field_ctx)?,
                None => Value::Undefined,
            };
            self.heap.get_mut(instance).define(&key, value);
        }
        Ok(())
    }

    fn eval_super_call(&mut self, args: &[Expr], ctx: &Ctx) -> Completion<Value> {
        let data = ctx
            .class
            .and_then(|class_id| match &self.heap.get(class_id).kind {
                ObjectKind::Class(data) => Some(data.clone()),
                _ => None,
            });
        let (Some(data), Value::Object(instance)) = (data, ctx.this.clone()) else {
            return Err(self.syntax_error("'super' keyword unexpected here"));
        };
        let Some(parent) = data.parent else {
            return Err(self.syntax_error("'super' keyword unexpected here"));
        };
        if self.super_calls.last().copied().unwrap_or(false) {
            return Err(self.reference_error("Super constructor may only be called once"));
        }
        let args = self.eval_list(args, ctx)?;
        self.initialize_instance(parent, instance, args)?;
        if let Some(initialized) = self.super_calls.last_mut() {
            *initialized = true;
        }
        self.init_fields(&data, data.def.constructor.as_deref(), instance, ctx)?;
        Ok(Value::Undefined)
    }

    fn super_property(&mut self, name: &str, ctx: &Ctx) -> Completion<Value> {
        let Some(home) = ctx.home else {
            return Err(self.syntax_error("'super' keyword unexpected here"));
        };
        match self.heap.get(home).proto {
            Some(proto) => self.lookup_from(proto, name, ctx.this.clone()),
            None => Ok(Value::Undefined),
        }
    }

    //
    // ─── PROPERTIES ───────────────────────────────────────────────────────────
    //

    pub(crate) fn new_object_id(&mut self) -> ObjId {
        self.heap.alloc(HeapObject::new(
            ObjectKind::Plain,
            Some(self.intrinsics.object_proto),
        ))
    }

    /// # Errors
    ///
    /// Throws a `RangeError` past the collection size limit.
    pub(crate) fn new_array(&mut self, items: Vec<Value>) -> Completion<Value> {
        if items.len() > MAX_COLLECTION_LENGTH {
            return Err(self.range_error("Invalid array length"));
        }
        Ok(Value::Object(self.heap.alloc(HeapObject::new(
            ObjectKind::Array(items),
            Some(self.intrinsics.array_proto),
        ))))
    }

    pub(crate) fn is_callable(&self, value: &Value) -> bool {
        value
            .as_object()
            .is_some_and(|id| self.heap.get(id).kind.is_callable())
    }

    pub(crate) fn is_array(&self, value: &Value) -> bool {
        value
            .as_object()
            .is_some_and(|id| matches!(self.heap.get(id).kind, ObjectKind::Array(_)))
    }

    pub(crate) fn type_of(&self, value: &Value) -> &'static str {
        value.primitive_type().unwrap_or_else(|| {
            if self.is_callable(value) {
                "function"
            } else {
                "object"
            }
        })
    }

    /// Converts a value used as a property name to its key string.
    pub(crate) fn property_key(&mut self, value: &Value) -> Completion<Rc<str>> {
        match value {
            Value::Str(s) => Ok(Rc::clone(s)),
            Value::Number(n) => Ok(number_to_string(*n).into()),
            other => self.to_string(other),
        }
    }

    pub(crate) fn get_property(&mut self, base: &Value, key: &str) -> Completion<Value> {
        match base {
            Value::Undefined | Value::Null => {
                let kind = if *base == Value::Null { "null" } else { "undefined" };
                Err(self.type_error(format!(
                    "Cannot read properties of {kind} (reading '{key}')"
                )))
            }
            Value::Str(text) => {
                if key == "length" {
                    #[allow(clippy::cast_precision_loss)]
                    return Ok(Value::Number(text.chars().count() as f64));
                }
                if let Some(index) = array_index(key) {
                    return Ok(text
                        .chars()
                        .nth(index)
                        .map_or(Value::Undefined, |c| Value::from(c.to_string())));
                }
                self.lookup_from(self.intrinsics.string_proto, key, base.clone())
            }
            Value::Number(_) => self.lookup_from(self.intrinsics.number_proto, key, base.clone()),
            Value::Bool(_) => self.lookup_from(self.intrinsics.boolean_proto, key, base.clone()),
            Value::Object(id) => {
                if let ObjectKind::Array(items) = &self.heap.get(*id).kind {
                    if key == "length" {
                        #[allow(clippy::cast_precision_loss)]
                        return Ok(Value::Number(items.len() as f64));
                    }
                    if let Some(index) = array_index(key) {
                        return Ok(items.get(index).cloned().unwrap_or_default());
                    }
                }
                self.lookup_from(*id, key, base.clone())
            }
        }
    }

    fn lookup_from(&mut self, start: ObjId, key: &str, receiver: Value) -> Completion<Value> {
        let mut current = Some(start);
        while let Some(id) = current {
            let object = self.heap.get(id);
            match object.own(key) {
                Some(Slot::Data(value)) => return Ok(value.clone()),
                Some(Slot::Accessor { get, .. }) => {
                    let getter = *get;
                    return match getter {
                        Some(getter) => self.call(&Value::Object(getter), receiver, Vec::new()),
                        None => Ok(Value::Undefined),
                    };
                }
                None => current = object.proto,
            }
        }
        Ok(Value::Undefined)
    }

    pub(crate) fn set_property(&mut self, base: &Value, key: &str, value: Value) -> Completion<()> {
        let id = match base {
            Value::Undefined | Value::Null => {
                let kind = if *base == Value::Null { "null" } else { "undefined" };
                return Err(self.type_error(format!(
                    "Cannot set properties of {kind} (setting '{key}')"
                )));
            }
            Value::Object(id) => *id,
            _ => return Ok(()),
        };
        if matches!(self.heap.get(id).kind, ObjectKind::Array(_)) {
            if key == "length" {
                let length = self.to_number(&value)?;
                let valid = length >= 0.0 && length.fract() == 0.0;
                #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
                let length = length as usize;
                if !valid || length > MAX_COLLECTION_LENGTH {
                    return Err(self.range_error("Invalid array length"));
                }
                if let ObjectKind::Array(items) = &mut self.heap.get_mut(id).kind {
                    items.resize(length, Value::Undefined);
                }
                return Ok(());
            }
            if let Some(index) = array_index(key) {
                if index >= MAX_COLLECTION_LENGTH {
                    return Err(self.range_error("Invalid array length"));
                }
                if let ObjectKind::Array(items) = &mut self.heap.get_mut(id).kind {
                    if index >= items.len() {
                        items.resize(index + 1, Value::Undefined);
                    }
                    items[index] = value;
                }
                return Ok(());
            }
        }
        if let Some(setter) = self.find_setter(id, key) {
            if let Some(setter) = setter {
                self.call(&Value::Object(setter), base.clone(), vec![value])?;
            }
            return Ok(());
        }
        self.heap.get_mut(id).define(key, value);
        Ok(())
    }

    /// The accessor governing assignment to `key`, if the chain has one.
    fn find_setter(&self, start: ObjId, key: &str) -> Option<Option<ObjId>> {
        let mut current = Some(start);
        while let Some(id) = current {
            let object = self.heap.get(id);
            match object.own(key) {
                Some(Slot::Accessor { set, .. }) => return Some(*set),
                Some(Slot::Data(_)) => return None,
                None => current = object.proto,
            }
        }
        None
    }

    fn has_property(&self, id: ObjId, key: &str) -> bool {
        if let ObjectKind::Array(items) = &self.heap.get(id).kind {
            if key == "length" || array_index(key).is_some_and(|index| index < items.len()) {
                return true;
            }
        }
        let mut current = Some(id);
        while let Some(id) = current {
            let object = self.heap.get(id);
            if object.own(key).is_some() {
                return true;
            }
            current = object.proto;
        }
        false
    }

    /// Own enumerable keys, as `Object.keys` and `for...in` see them.
    pub(crate) fn enumerable_keys(&mut self, value: &Value) -> Completion<Vec<Rc<str>>> {
        Ok(match value {
            Value::Undefined | Value::Null => Vec::new(),
            Value::Str(text) => (0..text.chars().count())
                .map(|index| index.to_string().into())
                .collect(),
            Value::Object(id) => self.heap.get(*id).keys(),
            Value::Bool(_) | Value::Number(_) => Vec::new(),
        })
    }

    /// Items produced by `for...of` and spread.
    fn iterate(&mut self, value: &Value, source: &Expr) -> Completion<Vec<Value>> {
        if let Value::Str(text) = value {
            return Ok(text.chars().map(|c| Value::from(c.to_string())).collect());
        }
        if let Some(id) = value.as_object() {
            if let ObjectKind::Array(items) = &self.heap.get(id).kind {
                return Ok(items.clone());
            }
        }
        Err(self.type_error(format!("{} is not iterable", label(source))))
    }

    //
    // ─── CONVERSIONS ──────────────────────────────────────────────────────────
    //

    pub(crate) fn to_primitive(&mut self, value: &Value, prefer_string: bool) -> Completion<Value> {
        if !matches!(value, Value::Object(_)) {
            return Ok(value.clone());
        }
        let order = if prefer_string {
            ["toString", "valueOf"]
        } else {
            ["valueOf", "toString"]
        };
        for name in order {
            let method = self.get_property(value, name)?;
            if self.is_callable(&method) {
                let result = self.call(&method, value.clone(), Vec::new())?;
                if !matches!(result, Value::Object(_)) {
                    return Ok(result);
                }
            }
        }
        Err(self.type_error("Cannot convert object to primitive value"))
    }

    pub(crate) fn to_string(&mut self, value: &Value) -> Completion<Rc<str>> {
        Ok(match value {
            Value::Undefined => "undefined".into(),
            Value::Null => "null".into(),
            Value::Bool(b) => if *b { "true" } else { "false" }.into(),
            Value::Number(n) => number_to_string(*n).into(),
            Value::Str(s) => Rc::clone(s),
            Value::Object(_) => {
                let primitive = self.to_primitive(value, true)?;
                return self.to_string(&primitive);
            }
        })
    }

    pub(crate) fn to_number(&mut self, value: &Value) -> Completion<f64> {
        Ok(match value {
            Value::Undefined => f64::NAN,
            Value::Null => 0.0,
            Value::Bool(b) => f64::from(u8::from(*b)),
            Value::Number(n) => *n,
            Value::Str(s) => string_to_number(s),
            Value::Object(_) => {
                let primitive = self.to_primitive(value, false)?;
                return self.to_number(&primitive);
            }
        })
    }

    fn loose_equals(&mut self, left: &Value, right: &Value) -> Completion<bool> {
        Ok(match (left, right) {
            (Value::Undefined | Value::Null, Value::Undefined | Value::Null) => true,
            (Value::Undefined | Value::Null, _) | (_, Value::Undefined | Value::Null) => false,
            (Value::Number(a), Value::Str(_)) => *a == self.to_number(right)?,
            (Value::Str(_), Value::Number(b)) => self.to_number(left)? == *b,
            (Value::Bool(_), _) => {
                let number = Value::Number(self.to_number(left)?);
                return self.loose_equals(&number, right);
            }
            (_, Value::Bool(_)) => {
                let number = Value::Number(self.to_number(right)?);
                return self.loose_equals(left, &number);
            }
            (Value::Object(_), Value::Object(_)) => left == right,
            (Value::Object(_), _) => {
                let primitive = self.to_primitive(left, false)?;
                return self.loose_equals(&primitive, right);
            }
            (_, Value::Object(_)) => {
                let primitive = self.to_primitive(right, false)?;
                return self.loose_equals(left, &primitive);
            }
            _ => left.strict_equals(right),
        })
    }

    /// `left < right`, or `None` when either side is NaN.
    fn less_than(&mut self, left: &Value, right: &Value) -> Completion<Option<bool>> {
        let left = self.to_primitive(left, false)?;
        let right = self.to_primitive(right, false)?;
        if let (Value::Str(a), Value::Str(b)) = (&left, &right) {
            return Ok(Some(a < b));
        }
        let a = self.to_number(&left)?;
        let b = self.to_number(&right)?;
        Ok(if a.is_nan() || b.is_nan() {
            None
        } else {
            Some(a < b)
        })
    }

    fn binary(&mut self, op: BinaryOp, left: Value, right: Value, right_expr: &Expr) -> Completion<Value> {
        let number = |machine: &mut Self, f: fn(f64, f64) -> f64| -> Completion<Value> {
            let a = machine.to_number(&left)?;
            let b = machine.to_number(&right)?;
            Ok(Value::Number(f(a, b)))
        };
        match op {
            BinaryOp::Add => {
                let left = self.to_primitive(&left, false)?;
                let right = self.to_primitive(&right, false)?;
                if matches!(left, Value::Str(_)) || matches!(right, Value::Str(_)) {
                    let mut text = self.to_string(&left)?.to_string();
                    text.push_str(&self.to_string(&right)?);
                    if text.len() > MAX_COLLECTION_LENGTH {
                        return Err(self.range_error("Invalid string length"));
                    }
                    Ok(Value::from(text))
                } else {
                    let a = self.to_number(&left)?;
                    let b = self.to_number(&right)?;
                    Ok(Value::Number(a + b))
                }
            }
            BinaryOp::Sub => number(self, |a, b| a - b),
            BinaryOp::Mul => number(self, |a, b| a * b),
            BinaryOp::Div => number(self, |a, b| a / b),
            BinaryOp::Rem => number(self, |a, b| a % b),
            BinaryOp::Pow => number(self, |a, b| {
                if b.is_nan() || (a.abs() == 1.0 && b.is_infinite()) {
                    f64::NAN
                } else {
                    a.powf(b)
                }
            }),
            BinaryOp::Eq => Ok(Value::Bool(self.loose_equals(&left, &right)?)),
            BinaryOp::NotEq => Ok(Value::Bool(!self.loose_equals(&left, &right)?)),
            BinaryOp::StrictEq => Ok(Value::Bool(left.strict_equals(&right))),
            BinaryOp::StrictNotEq => Ok(Value::Bool(!left.strict_equals(&right))),
            BinaryOp::Lt => Ok(Value::Bool(self.less_than(&left, &right)? == Some(true))),
            BinaryOp::Gt => Ok(Value::Bool(self.less_than(&right, &left)? == Some(true))),
            BinaryOp::LtEq => Ok(Value::Bool(self.less_than(&right, &left)? == Some(false))),
            BinaryOp::GtEq => Ok(Value::Bool(self.less_than(&left, &right)? == Some(false))),
            BinaryOp::InstanceOf => {
                if !self.is_callable(&right) {
                    return Err(self.type_error("Right-hand side of 'instanceof' is not callable"));
                }
                let Value::Object(instance) = left else {
                    return Ok(Value::Bool(false));
                };
                let prototype = self.get_property(&right, "prototype")?;
                Ok(Value::Bool(
                    prototype
                        .as_object()
                        .is_some_and(|proto| self.heap.inherits(instance, proto)),
                ))
            }
            BinaryOp::In => {
                let key = self.property_key(&left)?;
                let Value::Object(id) = right else {
                    let target = label(right_expr);
                    return Err(self.type_error(format!(
                        "Cannot use 'in' operator to search for '{key}' in {target}"
                    )));
                };
                Ok(Value::Bool(self.has_property(id, &key)))
            }
        }
    }

    //
    // ─── ERRORS ───────────────────────────────────────────────────────────────
    //

    pub(crate) fn make_error(&mut self, proto: ObjId, message: &str) -> Value {
        let id = self.heap.alloc(HeapObject::new(ObjectKind::Plain, Some(proto)));
        self.heap.get_mut(id).define("message", Value::str(message));
        Value::Object(id)
    }

    fn throw(&mut self, proto: ObjId, message: &str) -> Abrupt {
        Abrupt::Throw(self.make_error(proto, message))
    }

    pub(crate) fn type_error(&mut self, message: impl AsRef<str>) -> Abrupt {
        self.throw(self.intrinsics.type_error_proto, message.as_ref())
    }

    pub(crate) fn range_error(&mut self, message: impl AsRef<str>) -> Abrupt {
        self.throw(self.intrinsics.range_error_proto, message.as_ref())
    }

    pub(crate) fn reference_error(&mut self, message: impl AsRef<str>) -> Abrupt {
        self.throw(self.intrinsics.reference_error_proto, message.as_ref())
    }

    pub(crate) fn syntax_error(&mut self, message: impl AsRef<str>) -> Abrupt {
        self.throw(self.intrinsics.syntax_error_proto, message.as_ref())
    }
}

fn short_circuits(op: LogicalOp, left: &Value) -> bool {
    match op {
        LogicalOp::And => !left.truthy(),
        LogicalOp::Or => left.truthy(),
        LogicalOp::Nullish => !left.is_nullish(),
    }
}

/// Source-like description of an expression for error messages.
fn label(expr: &Expr) -> String {
    match expr {
        Expr::Ident(name) => name.clone(),
        Expr::This => "this".to_string(),
        Expr::Member {
            object, property, ..
        } => format!("{}.{property}", label(object)),
        Expr::Index { object, .. } => format!("{}[...]", label(object)),
        Expr::Call { callee, .. } => format!("{}(...)", label(callee)),
        Expr::SuperMember(property) => format!("super.{property}"),
        _ => "(intermediate value)".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(source: &str) -> ExecutionOutcome {
        Interpreter::default().execute(source)
    }

    fn captured(source: &str) -> String {
        match run(source) {
            ExecutionOutcome::Captured(text) => text,
            ExecutionOutcome::Failed(failure) => {
                panic!("expected captured output for {source:?}, got {failure:?}")
            }
        }
    }

    fn failure(source: &str) -> (FailureKind, String) {
        match run(source) {
            ExecutionOutcome::Failed(failure) => (failure.kind, failure.message),
            ExecutionOutcome::Captured(text) => {
                panic!("expected a failure for {source:?}, got captured {text:?}")
            }
        }
    }

    #[test]
    fn last_log_wins() {
        assert_eq!(
            captured("console.log(\"first\");\nconsole.log(\"second\");"),
            "second"
        );
    }

    #[test]
    fn no_log_yields_sentinel() {
        assert_eq!(captured("let x = 1 + 2;"), SUCCESS_SENTINEL);
        assert_eq!(captured(""), SUCCESS_SENTINEL);
    }

    #[test]
    fn log_joins_arguments_with_array_join_rules() {
        assert_eq!(
            captured("console.log(\"a\", 1, true, null, undefined, [1, 2], {})"),
            "a 1 true   1,2 [object Object]"
        );
    }

    #[test]
    fn log_returns_its_line() {
        assert_eq!(captured("const line = console.log(\"x\", 2); console.log(line + \"!\")"), "x 2!");
    }

    #[test]
    fn runtime_errors_use_javascript_wording() {
        assert_eq!(
            failure("console.log(missing)"),
            (FailureKind::Runtime, "ReferenceError: missing is not defined".to_string())
        );
        assert_eq!(
            failure("const x = 1; x = 2;").1,
            "TypeError: Assignment to constant variable."
        );
        assert_eq!(
            failure("let ship; ship.name").1,
            "TypeError: Cannot read properties of undefined (reading 'name')"
        );
        assert_eq!(
            failure("const ship = {}; ship.launch()").1,
            "TypeError: ship.launch is not a function"
        );
        assert_eq!(failure("throw new Error(\"boom\")").1, "Error: boom");
        assert_eq!(failure("throw \"boom\"").1, "Uncaught boom");
    }

    #[test]
    fn error_after_log_discards_output() {
        let (kind, _) = failure("console.log(\"ok\"); undefinedFunction();");
        assert_eq!(kind, FailureKind::Runtime);
    }

    #[test]
    fn syntax_errors_are_reported_with_position() {
        let (kind, message) = failure("let = 5;");
        assert_eq!(kind, FailureKind::Syntax);
        assert!(message.starts_with("SyntaxError: "), "{message}");
        assert!(message.contains("line 1"), "{message}");
    }

    #[test]
    fn infinite_loop_hits_step_limit() {
        let interpreter = Interpreter::new(SandboxLimits {
            max_steps: 1_000,
            ..SandboxLimits::default()
        });
        let ExecutionOutcome::Failed(failure) = interpreter.execute("while (true) {}") else {
            panic!("expected the step limit to stop the loop");
        };
        assert_eq!(failure.kind, FailureKind::StepLimit);
    }

    #[test]
    fn step_limit_cannot_be_caught() {
        let interpreter = Interpreter::new(SandboxLimits {
            max_steps: 500,
            ..SandboxLimits::default()
        });
        let outcome = interpreter.execute("try { for (;;) {} } catch (e) { console.log(\"caught\") }");
        assert_eq!(outcome.failure().map(|f| f.kind), Some(FailureKind::StepLimit));
    }

    #[test]
    fn runaway_recursion_is_a_range_error() {
        let (_, message) = failure("function dive(n) { return dive(n + 1) } dive(0)");
        assert_eq!(message, "RangeError: Maximum call stack size exceeded");
    }

    #[test]
    fn long_terminating_loop_finishes() {
        assert_eq!(
            captured("let s = 0; for (let i = 0; i < 100000; i++) { s += i; } console.log(s);"),
            "4999950000"
        );
    }

    #[test]
    fn deep_recursion_within_default_depth_works() {
        assert_eq!(
            captured("function depth(n) { return n === 0 ? 0 : 1 + depth(n - 1); } console.log(depth(500));"),
            "500"
        );
    }

    #[test]
    fn recursion_within_limit_works() {
        assert_eq!(
            captured("function fact(n) { return n <= 1 ? 1 : n * fact(n - 1) } console.log(fact(10))"),
            "3628800"
        );
    }

    #[test]
    fn closures_capture_per_iteration_bindings() {
        assert_eq!(
            captured(
                "const fns = [];\n\
                 for (let i = 0; i < 3; i++) { fns.push(() => i) }\n\
                 console.log(fns.map(f => f()).join(\",\"))"
            ),
            "0,1,2"
        );
    }

    #[test]
    fn classes_support_inheritance_and_super() {
        let source = r#"
            class Vehicle {
              constructor(public name: string) {}
              describe() { return `${this.name} moves`; }
            }
            class Rocket extends Vehicle {
              fuel = 100;
              constructor(name: string, private stages: number) { super(name); }
              describe() { return super.describe() + ` with ${this.stages} stages and ${this.fuel} fuel`; }
            }
            const r = new Rocket("Falcon", 2);
            console.log(r.describe(), r instanceof Vehicle);
        "#;
        assert_eq!(captured(source), "Falcon moves with 2 stages and 100 fuel true");
    }

    #[test]
    fn derived_constructor_must_call_super() {
        let (_, message) = failure(
            "class A {} class B extends A { constructor() { } } new B()",
        );
        assert!(message.starts_with("ReferenceError: Must call super constructor"), "{message}");
    }

    #[test]
    fn getters_and_setters() {
        let source = "class Tank { private level = 0;\n\
                      get percent() { return this.level + '%' }\n\
                      set percent(v) { this.level = Math.min(v, 100) } }\n\
                      const t = new Tank(); t.percent = 140; console.log(t.percent)";
        assert_eq!(captured(source), "100%");
    }

    #[test]
    fn custom_errors_extend_error() {
        let source = "class FuelError extends Error {\n\
                        constructor(message) { super(message); this.name = 'FuelError'; }\n\
                      }\n\
                      try { throw new FuelError('empty tank') }\n\
                      catch (e) { console.log(e instanceof Error, e.name, e.message, String(e)) }";
        assert_eq!(captured(source), "true FuelError empty tank FuelError: empty tank");
    }

    #[test]
    fn try_finally_runs_on_every_path() {
        let source = "let log = [];\n\
                      function f() { try { return 'body' } finally { log.push('cleanup') } }\n\
                      const r = f(); console.log(r, log.join())";
        assert_eq!(captured(source), "body cleanup");
    }

    #[test]
    fn optional_chaining_short_circuits() {
        assert_eq!(
            captured("const crew = null; console.log(crew?.captain.name ?? 'nobody')"),
            "nobody"
        );
    }

    #[test]
    fn let_is_block_scoped_and_in_tdz() {
        assert_eq!(
            failure("console.log(x); let x = 1;").1,
            "ReferenceError: Cannot access 'x' before initialization"
        );
        assert_eq!(captured("let x = 1; { let x = 2; } console.log(x)"), "1");
    }

    #[test]
    fn var_and_functions_are_hoisted() {
        assert_eq!(
            captured("console.log(greet(), typeof later); function greet() { return 'hi' } var later = 1;"),
            "hi undefined"
        );
    }

    #[test]
    fn switch_falls_through_until_break() {
        let source = "let out = '';\n\
                      switch (2) { case 1: out += 'a'; case 2: out += 'b'; case 3: out += 'c'; break; default: out += 'd' }\n\
                      console.log(out)";
        assert_eq!(captured(source), "bc");
    }

    #[test]
    fn loose_and_strict_equality() {
        assert_eq!(
            captured("console.log(1 == '1', 1 === '1', null == undefined, NaN === NaN, '' == 0)"),
            "true false true false true"
        );
    }

    #[test]
    fn top_level_return_ends_the_run() {
        assert_eq!(captured("console.log('a'); return; console.log('b')"), "a");
    }

    #[test]
    fn runs_are_isolated() {
        let interpreter = Interpreter::default();
        assert_eq!(
            interpreter.execute("var shared = 1; console.log(shared)").captured_text(),
            Some("1")
        );
        assert_eq!(
            interpreter.execute("console.log(typeof shared)").captured_text(),
            Some("undefined")
        );
    }
}
