//! Lowers the syntax tree into the structured IR.
//!
//! The lowering context owns all mutable compilation state for one run:
//! the scope stack, the function table, and the unit-scoped counters that
//! name temporaries, storage slots, and control-flow labels. Nothing here
//! is ambient, so repeated compilations never observe stale state.

use hashbrown::HashMap;

use crate::{
    frontend::{
        ast::{
            Block, BlockItem, BinaryOperatorKind, CompilationUnit, Declaration, DeclarationKind,
            Definition, Expression, ExpressionKind, FunctionDefinition, Identifier, Initializer,
            InitializerKind, Item, ItemKind, LValue, Parameter, ParameterKind, ReturnKind,
            Statement, StatementKind, UnaryOperatorKind,
        },
        intern::InternedSymbol,
        lexer::Span,
        SourceFile,
    },
    middle::{
        const_eval,
        ir::{
            BinaryOp, BlockId, FunctionData, FunctionId, GlobalData, GlobalInit, Program, Type,
            ValueId, ValueKind,
        },
        scope::{Binding, Location, ScopeStack},
    },
};

/// Whether a lowered statement allows control to reach the statement after
/// it. A statement that ended in `return`, `break`, or `continue` (on
/// every path) reports itself as diverging so the enclosing code skips the
/// fallthrough jump it would otherwise append.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    FallsThrough,
    Diverges,
}

impl Termination {
    pub fn diverges(self) -> bool {
        matches!(self, Termination::Diverges)
    }
}

/// The `entry` and `end` blocks of the innermost enclosing loop, consulted
/// by `continue` and `break`
struct LoopLabels {
    entry: BlockId,
    end: BlockId,
}

pub fn lower_to_ir(unit: &CompilationUnit) -> Program {
    let mut context = LoweringContext {
        unit,
        program: Program::new(),
        scopes: ScopeStack::new(),
        function_table: HashMap::new(),
        next_temp: 0,
        next_storage: 0,
        next_label: 0,
        current_function: None,
        current_block: None,
        loop_stack: Vec::new(),
    };

    context.register_runtime_library();

    for item in &unit.items {
        context.lower_item(item);
    }

    context.program
}

struct LoweringContext<'unit, 'source> {
    unit: &'unit CompilationUnit<'source>,
    program: Program,
    scopes: ScopeStack<Binding>,
    function_table: HashMap<InternedSymbol, FunctionId>,

    /* Unit-scoped name counters */
    next_temp: u32,
    next_storage: u32,
    next_label: u32,

    /* State for the function currently being lowered */
    current_function: Option<FunctionId>,
    current_block: Option<BlockId>,
    loop_stack: Vec<LoopLabels>,
}

impl<'unit, 'source> LoweringContext<'unit, 'source> {
    fn source_file(&self) -> &SourceFile {
        self.unit.source_file
    }

    fn report_fatal_error(&self, span: Span, message: &str) -> ! {
        self.source_file().report_fatal_error(span, message)
    }

    fn fresh_temp(&mut self) -> String {
        let name = format!("%{}", self.next_temp);
        self.next_temp += 1;
        name
    }

    fn fresh_storage_name(&mut self, base: &str) -> String {
        let name = format!("@{base}_{}", self.next_storage);
        self.next_storage += 1;
        name
    }

    fn fresh_label(&mut self) -> u32 {
        let label = self.next_label;
        self.next_label += 1;
        label
    }

    fn func_mut(&mut self) -> &mut FunctionData {
        let id = self.current_function.expect("no function is being lowered");
        &mut self.program.functions[id]
    }

    /// Appends a block to the function's layout and makes it current
    fn enter_block(&mut self, block: BlockId) {
        self.func_mut().layout.push(block);
        self.current_block = Some(block);
    }

    /// Creates a value and appends it to the current block
    fn emit(&mut self, name: Option<String>, ty: Type, kind: ValueKind) -> ValueId {
        let block = self.current_block.expect("no active block");
        let function = self.func_mut();
        let value = function.new_value(name, ty, kind);
        function.push_inst(block, value);
        value
    }

    /// Creates an integer literal value (rendered inline, never an
    /// instruction)
    fn integer(&mut self, value: i32) -> ValueId {
        self.func_mut()
            .new_value(None, Type::Int32, ValueKind::Integer(value))
    }

    /// Appends an unconditional jump to an arbitrary (possibly not
    /// current) block
    fn jump_from(&mut self, block: BlockId, target: BlockId) {
        let function = self.func_mut();
        let jump = function.new_value(None, Type::Unit, ValueKind::Jump { target });
        function.push_inst(block, jump);
    }

    fn lookup(&self, identifier: &Identifier) -> Binding {
        match self.scopes.get_binding(identifier.symbol) {
            Some(binding) => *binding,
            None => self.report_fatal_error(
                identifier.span,
                &format!("Unresolved identifier `{}`", identifier.symbol),
            ),
        }
    }

    fn check_redeclaration(&self, identifier: &Identifier) {
        if self.scopes.get_shallow_binding(identifier.symbol).is_some() {
            self.report_fatal_error(
                identifier.span,
                &format!(
                    "Conflicting definition for identifier `{}` in this scope",
                    identifier.symbol
                ),
            );
        }
    }

    fn require_constant(&self, expression: &Expression) -> i32 {
        match const_eval::evaluate(expression, &self.scopes) {
            Ok(value) => value,
            Err(error) => self.report_fatal_error(error.span(), error.message()),
        }
    }

    /// Evaluates array extents to lengths, rejecting non-positive ones
    fn evaluate_extents(&self, extents: &[Expression]) -> Vec<usize> {
        extents
            .iter()
            .map(|extent| {
                let length = self.require_constant(extent);

                if length <= 0 {
                    self.report_fatal_error(
                        extent.span,
                        "An array extent must be a positive constant",
                    );
                }

                length as usize
            })
            .collect()
    }

    /// Builds the (possibly nested) array type for a list of extents;
    /// an empty list yields a scalar
    fn array_type(extents: &[usize]) -> Type {
        let mut ty = Type::Int32;

        for extent in extents.iter().rev() {
            ty = Type::Array(Box::new(ty), *extent);
        }

        ty
    }

    /* Program-level lowering */

    /// The runtime library functions every program may call without
    /// declaring them
    fn register_runtime_library(&mut self) {
        let declarations: &[(&str, Vec<Type>, Type)] = &[
            ("getint", vec![], Type::Int32),
            ("getch", vec![], Type::Int32),
            ("getarray", vec![Type::Int32.pointer_to()], Type::Int32),
            ("putint", vec![Type::Int32], Type::Unit),
            ("putch", vec![Type::Int32], Type::Unit),
            (
                "putarray",
                vec![Type::Int32, Type::Int32.pointer_to()],
                Type::Unit,
            ),
            ("starttime", vec![], Type::Unit),
            ("stoptime", vec![], Type::Unit),
        ];

        for (name, param_types, return_type) in declarations {
            let symbol = InternedSymbol::new(name);
            let function = FunctionData::new_declaration(
                symbol,
                param_types.clone(),
                return_type.clone(),
            );

            let id = self.program.functions.push(function);
            self.function_table.insert(symbol, id);
        }
    }

    fn lower_item(&mut self, item: &Item) {
        match &item.kind {
            ItemKind::Declaration(declaration) => self.lower_global_declaration(declaration),
            ItemKind::FunctionDefinition(function) => self.lower_function_definition(function),
        }
    }

    fn lower_global_declaration(&mut self, declaration: &Declaration) {
        for definition in &declaration.definitions {
            self.check_redeclaration(&definition.name);

            if declaration.kind == DeclarationKind::Const && definition.extents.is_empty() {
                let value = self.constant_scalar_initializer(definition);
                self.scopes
                    .add_global_binding(definition.name.symbol, Binding::Constant(value));
                continue;
            }

            let extents = self.evaluate_extents(&definition.extents);
            let ty = Self::array_type(&extents);

            let init = match &definition.initializer {
                // Globals without an initializer are zero-filled
                None => GlobalInit::ZeroInit,
                Some(initializer) => self.build_global_init(&extents, initializer),
            };

            let id = self.program.globals.push(GlobalData {
                name: definition.name.symbol,
                ty,
                init,
            });

            self.scopes.add_global_binding(
                definition.name.symbol,
                Binding::Location(Location::Global(id)),
            );
        }
    }

    /// The folded value of a scalar `const` definition, which must reduce
    /// to a literal integer at declaration time
    fn constant_scalar_initializer(&self, definition: &Definition) -> i32 {
        let Some(initializer) = &definition.initializer else {
            self.report_fatal_error(
                definition.span,
                "A constant declaration requires an initializer",
            );
        };

        let InitializerKind::Expression(expression) = &initializer.kind else {
            self.report_fatal_error(
                initializer.span,
                "Expected a single expression to initialize a scalar",
            );
        };

        self.require_constant(expression)
    }

    /// Builds the static initializer record for a global definition:
    /// a literal word, a zero fill, or a nested aggregate
    fn build_global_init(&mut self, extents: &[usize], initializer: &Initializer) -> GlobalInit {
        if extents.is_empty() {
            let InitializerKind::Expression(expression) = &initializer.kind else {
                self.report_fatal_error(
                    initializer.span,
                    "Expected a single expression to initialize a scalar",
                );
            };

            return GlobalInit::Word(self.require_constant(expression));
        }

        let InitializerKind::List(elements) = &initializer.kind else {
            self.report_fatal_error(
                initializer.span,
                "Expected a brace-enclosed initializer for an array",
            );
        };

        let flat = flatten_initializer(elements, extents, self.source_file());
        let words: Vec<i32> = flat
            .iter()
            .map(|slot| slot.map(|e| self.require_constant(e)).unwrap_or(0))
            .collect();

        if words.iter().all(|word| *word == 0) {
            GlobalInit::ZeroInit
        } else {
            renest_words(&words, extents)
        }
    }

    /* Function lowering */

    fn parameter_type(&self, parameter: &Parameter) -> Type {
        match &parameter.kind {
            ParameterKind::Scalar => Type::Int32,
            ParameterKind::Array { extents } => {
                let extents = self.evaluate_extents(extents);
                Self::array_type(&extents).pointer_to()
            }
        }
    }

    fn lower_function_definition(&mut self, definition: &FunctionDefinition) {
        if self.function_table.contains_key(&definition.name.symbol) {
            self.report_fatal_error(
                definition.name.span,
                &format!(
                    "Conflicting definition for function `{}`",
                    definition.name.symbol
                ),
            );
        }

        let param_types: Vec<Type> = definition
            .parameters
            .iter()
            .map(|parameter| self.parameter_type(parameter))
            .collect();

        let return_type = match definition.return_kind {
            ReturnKind::Int => Type::Int32,
            ReturnKind::Void => Type::Unit,
        };

        let function = FunctionData {
            name: definition.name.symbol,
            param_types: param_types.clone(),
            return_type,
            params: Vec::new(),
            values: Default::default(),
            blocks: Default::default(),
            layout: Vec::new(),
            is_declaration: false,
        };

        let id = self.program.functions.push(function);
        self.function_table.insert(definition.name.symbol, id);

        self.current_function = Some(id);
        debug_assert!(self.loop_stack.is_empty());

        for (index, parameter) in definition.parameters.iter().enumerate() {
            let name = format!("@{}", parameter.name.symbol);
            let ty = param_types[index].clone();
            let value = self
                .func_mut()
                .new_value(Some(name), ty, ValueKind::FuncArgRef(index));
            self.func_mut().params.push(value);
        }

        let entry = self.func_mut().new_block("entry");
        self.enter_block(entry);

        self.scopes.push_shallow_scope();

        // Copy every parameter into local storage immediately; the raw
        // parameter registers are scratch once the prologue is done
        for (index, parameter) in definition.parameters.iter().enumerate() {
            self.check_redeclaration(&parameter.name);

            let param_value = self.func_mut().params[index];
            let ty = param_types[index].clone();
            let storage_name = self.fresh_storage_name(parameter.name.symbol.value());

            let alloc = self.emit(Some(storage_name), ty.pointer_to(), ValueKind::Alloc);
            self.emit(
                None,
                Type::Unit,
                ValueKind::Store {
                    value: param_value,
                    target: alloc,
                },
            );

            self.scopes.add_shallow_binding(
                parameter.name.symbol,
                Binding::Location(Location::Stack(alloc)),
            );
        }

        let termination = self.lower_block(&definition.body);

        if !termination.diverges() {
            let value = match definition.return_kind {
                ReturnKind::Int => {
                    let zero = self.integer(0);
                    Some(zero)
                }
                ReturnKind::Void => None,
            };

            self.emit(None, Type::Unit, ValueKind::Return { value });
        }

        self.scopes.pop_shallow_scope();

        self.current_function = None;
        self.current_block = None;
    }

    /* Statement lowering */

    fn lower_block(&mut self, block: &Block) -> Termination {
        self.scopes.push_shallow_scope();

        let mut termination = Termination::FallsThrough;

        for item in &block.items {
            match item {
                BlockItem::Declaration(declaration) => self.lower_local_declaration(declaration),
                BlockItem::Statement(statement) => {
                    termination = self.lower_statement(statement);

                    // Anything after a diverging statement in the same
                    // block is unreachable and must not be emitted
                    if termination.diverges() {
                        break;
                    }
                }
            }
        }

        self.scopes.pop_shallow_scope();

        termination
    }

    fn lower_statement(&mut self, statement: &Statement) -> Termination {
        match &statement.kind {
            StatementKind::Assign { target, value } => {
                let value = self.lower_expression(value);
                let address = self.lower_assignment_target(target);

                self.emit(
                    None,
                    Type::Unit,
                    ValueKind::Store {
                        value,
                        target: address,
                    },
                );

                Termination::FallsThrough
            }
            StatementKind::Expression(expression) => {
                if let Some(expression) = expression {
                    self.lower_expression(expression);
                }

                Termination::FallsThrough
            }
            StatementKind::Block(block) => self.lower_block(block),
            StatementKind::If {
                condition,
                then_branch,
                else_branch,
            } => self.lower_if_statement(condition, then_branch, else_branch.as_deref()),
            StatementKind::While { condition, body } => self.lower_while_statement(condition, body),
            StatementKind::Break => {
                let Some(labels) = self.loop_stack.last() else {
                    self.report_fatal_error(statement.span, "`break` outside of a loop");
                };
                let end = labels.end;

                self.emit(None, Type::Unit, ValueKind::Jump { target: end });

                Termination::Diverges
            }
            StatementKind::Continue => {
                let Some(labels) = self.loop_stack.last() else {
                    self.report_fatal_error(statement.span, "`continue` outside of a loop");
                };
                let entry = labels.entry;

                self.emit(None, Type::Unit, ValueKind::Jump { target: entry });

                Termination::Diverges
            }
            StatementKind::Return(value) => {
                let return_type = self.func_mut().return_type.clone();

                let value = match (value, return_type.is_unit()) {
                    (Some(expression), false) => Some(self.lower_expression(expression)),
                    (None, true) => None,
                    (Some(expression), true) => self.report_fatal_error(
                        expression.span,
                        "Cannot return a value from a void function",
                    ),
                    (None, false) => self
                        .report_fatal_error(statement.span, "Expected a return value"),
                };

                self.emit(None, Type::Unit, ValueKind::Return { value });

                Termination::Diverges
            }
        }
    }

    fn lower_if_statement(
        &mut self,
        condition: &Expression,
        then_branch: &Statement,
        else_branch: Option<&Statement>,
    ) -> Termination {
        let condition = self.lower_expression(condition);
        let branch_block = self.current_block.unwrap();
        let label = self.fresh_label();

        let then_block = self.func_mut().new_block(format!("then_{label}"));

        let Some(else_branch) = else_branch else {
            // Without an else, the merge block doubles as the negative
            // fallthrough
            let end_block = self.func_mut().new_block(format!("end_{label}"));

            let function = self.func_mut();
            let branch = function.new_value(
                None,
                Type::Unit,
                ValueKind::Branch {
                    condition,
                    then_block,
                    else_block: end_block,
                },
            );
            function.push_inst(branch_block, branch);

            self.enter_block(then_block);
            let termination = self.lower_statement(then_branch);

            if !termination.diverges() {
                let exit = self.current_block.unwrap();
                self.jump_from(exit, end_block);
            }

            self.enter_block(end_block);

            return Termination::FallsThrough;
        };

        let else_block = self.func_mut().new_block(format!("else_{label}"));

        let function = self.func_mut();
        let branch = function.new_value(
            None,
            Type::Unit,
            ValueKind::Branch {
                condition,
                then_block,
                else_block,
            },
        );
        function.push_inst(branch_block, branch);

        self.enter_block(then_block);
        let then_termination = self.lower_statement(then_branch);
        let then_exit = self.current_block.unwrap();

        self.enter_block(else_block);
        let else_termination = self.lower_statement(else_branch);
        let else_exit = self.current_block.unwrap();

        // When both arms already ended in a control transfer there is no
        // merge point to create, and the whole statement reports itself as
        // terminated
        if then_termination.diverges() && else_termination.diverges() {
            return Termination::Diverges;
        }

        let end_block = self.func_mut().new_block(format!("end_{label}"));

        if !then_termination.diverges() {
            self.jump_from(then_exit, end_block);
        }
        if !else_termination.diverges() {
            self.jump_from(else_exit, end_block);
        }

        self.enter_block(end_block);

        Termination::FallsThrough
    }

    fn lower_while_statement(&mut self, condition: &Expression, body: &Statement) -> Termination {
        let label = self.fresh_label();

        let entry_block = self.func_mut().new_block(format!("while_entry_{label}"));
        let from = self.current_block.unwrap();
        self.jump_from(from, entry_block);

        self.enter_block(entry_block);
        let condition = self.lower_expression(condition);
        let condition_exit = self.current_block.unwrap();

        let body_block = self.func_mut().new_block(format!("while_body_{label}"));
        let end_block = self.func_mut().new_block(format!("while_end_{label}"));

        let function = self.func_mut();
        let branch = function.new_value(
            None,
            Type::Unit,
            ValueKind::Branch {
                condition,
                then_block: body_block,
                else_block: end_block,
            },
        );
        function.push_inst(condition_exit, branch);

        self.loop_stack.push(LoopLabels {
            entry: entry_block,
            end: end_block,
        });

        self.enter_block(body_block);
        let termination = self.lower_statement(body);

        if !termination.diverges() {
            let exit = self.current_block.unwrap();
            self.jump_from(exit, entry_block);
        }

        self.loop_stack.pop();

        self.enter_block(end_block);

        Termination::FallsThrough
    }

    /* Declaration lowering */

    fn lower_local_declaration(&mut self, declaration: &Declaration) {
        for definition in &declaration.definitions {
            self.check_redeclaration(&definition.name);

            // Scalar constants fold to literal integers and are never
            // materialized as storage
            if declaration.kind == DeclarationKind::Const && definition.extents.is_empty() {
                let value = self.constant_scalar_initializer(definition);
                self.scopes
                    .add_shallow_binding(definition.name.symbol, Binding::Constant(value));
                continue;
            }

            let extents = self.evaluate_extents(&definition.extents);
            let ty = Self::array_type(&extents);
            let storage_name = self.fresh_storage_name(definition.name.symbol.value());

            let alloc = self.emit(Some(storage_name), ty.pointer_to(), ValueKind::Alloc);

            self.scopes.add_shallow_binding(
                definition.name.symbol,
                Binding::Location(Location::Stack(alloc)),
            );

            if let Some(initializer) = &definition.initializer {
                self.lower_local_initializer(alloc, &extents, initializer, declaration.kind);
            }
        }
    }

    fn lower_local_initializer(
        &mut self,
        alloc: ValueId,
        extents: &[usize],
        initializer: &Initializer,
        declaration_kind: DeclarationKind,
    ) {
        if extents.is_empty() {
            let InitializerKind::Expression(expression) = &initializer.kind else {
                self.report_fatal_error(
                    initializer.span,
                    "Expected a single expression to initialize a scalar",
                );
            };

            let value = self.lower_expression(expression);
            self.emit(
                None,
                Type::Unit,
                ValueKind::Store {
                    value,
                    target: alloc,
                },
            );

            return;
        }

        let InitializerKind::List(elements) = &initializer.kind else {
            self.report_fatal_error(
                initializer.span,
                "Expected a brace-enclosed initializer for an array",
            );
        };

        let flat = flatten_initializer(elements, extents, self.source_file());

        // Every element is stored, including the zero padding for omitted
        // trailing positions
        for (position, slot) in flat.iter().enumerate() {
            let mut address = alloc;

            for index in unflatten_position(position, extents) {
                let element_ty = match self.func_mut().value(address).ty.pointee() {
                    Type::Array(element, _) => (**element).clone(),
                    other => unreachable!("indexed into non-array type {other:?}"),
                };

                let index_value = self.integer(index as i32);
                let name = self.fresh_temp();
                address = self.emit(
                    Some(name),
                    element_ty.pointer_to(),
                    ValueKind::GetElemPtr {
                        source: address,
                        index: index_value,
                    },
                );
            }

            let value = match (slot, declaration_kind) {
                // Constant arrays require compile-time constant elements
                (Some(expression), DeclarationKind::Const) => {
                    let folded = self.require_constant(expression);
                    self.integer(folded)
                }
                (Some(expression), DeclarationKind::Variable) => {
                    self.lower_expression(expression)
                }
                (None, _) => self.integer(0),
            };

            self.emit(
                None,
                Type::Unit,
                ValueKind::Store {
                    value,
                    target: address,
                },
            );
        }
    }

    /* Expression lowering */

    fn lower_expression(&mut self, expression: &Expression) -> ValueId {
        match &expression.kind {
            ExpressionKind::Literal(value) => self.integer(*value),
            ExpressionKind::LValue(lvalue) => self.lower_lvalue_read(lvalue),
            ExpressionKind::Call { callee, arguments } => {
                self.lower_call(expression.span, callee, arguments)
            }
            ExpressionKind::Unary { operator, operand } => match operator {
                UnaryOperatorKind::Plus => self.lower_expression(operand),
                UnaryOperatorKind::Negate => {
                    let zero = self.integer(0);
                    let operand = self.lower_expression(operand);
                    let name = self.fresh_temp();

                    self.emit(
                        Some(name),
                        Type::Int32,
                        ValueKind::Binary {
                            op: BinaryOp::Sub,
                            lhs: zero,
                            rhs: operand,
                        },
                    )
                }
                UnaryOperatorKind::LogicalNot => {
                    let operand = self.lower_expression(operand);
                    let zero = self.integer(0);
                    let name = self.fresh_temp();

                    self.emit(
                        Some(name),
                        Type::Int32,
                        ValueKind::Binary {
                            op: BinaryOp::Eq,
                            lhs: operand,
                            rhs: zero,
                        },
                    )
                }
            },
            ExpressionKind::Binary { lhs, operator, rhs } => match operator {
                BinaryOperatorKind::LogicalAnd => self.lower_logical_and(lhs, rhs),
                BinaryOperatorKind::LogicalOr => self.lower_logical_or(lhs, rhs),
                _ => {
                    let op = match operator {
                        BinaryOperatorKind::Add => BinaryOp::Add,
                        BinaryOperatorKind::Subtract => BinaryOp::Sub,
                        BinaryOperatorKind::Multiply => BinaryOp::Mul,
                        BinaryOperatorKind::Divide => BinaryOp::Div,
                        BinaryOperatorKind::Modulus => BinaryOp::Mod,
                        BinaryOperatorKind::Equals => BinaryOp::Eq,
                        BinaryOperatorKind::NotEquals => BinaryOp::NotEq,
                        BinaryOperatorKind::LessThan => BinaryOp::Lt,
                        BinaryOperatorKind::LessThanOrEqualTo => BinaryOp::Le,
                        BinaryOperatorKind::GreaterThan => BinaryOp::Gt,
                        BinaryOperatorKind::GreaterThanOrEqualTo => BinaryOp::Ge,
                        BinaryOperatorKind::LogicalAnd | BinaryOperatorKind::LogicalOr => {
                            unreachable!()
                        }
                    };

                    let lhs = self.lower_expression(lhs);
                    let rhs = self.lower_expression(rhs);
                    let name = self.fresh_temp();

                    self.emit(Some(name), Type::Int32, ValueKind::Binary { op, lhs, rhs })
                }
            },
        }
    }

    /// `a && b` lowers to a boolean temporary plus a three-block diamond:
    /// the right operand is evaluated only when the left was nonzero, the
    /// other path stores 0, and the merge point reloads the temporary.
    /// Control flow, not dataflow, is what encodes the short-circuit.
    fn lower_logical_and(&mut self, lhs: &Expression, rhs: &Expression) -> ValueId {
        let result_name = self.fresh_storage_name("land");
        let result = self.emit(
            Some(result_name),
            Type::Int32.pointer_to(),
            ValueKind::Alloc,
        );

        let lhs = self.lower_expression(lhs);
        let branch_block = self.current_block.unwrap();
        let label = self.fresh_label();

        let then_block = self.func_mut().new_block(format!("then_{label}"));
        let else_block = self.func_mut().new_block(format!("else_{label}"));

        let function = self.func_mut();
        let branch = function.new_value(
            None,
            Type::Unit,
            ValueKind::Branch {
                condition: lhs,
                then_block,
                else_block,
            },
        );
        function.push_inst(branch_block, branch);

        self.enter_block(then_block);
        let rhs = self.lower_expression(rhs);
        let zero = self.integer(0);
        let name = self.fresh_temp();
        let normalized = self.emit(
            Some(name),
            Type::Int32,
            ValueKind::Binary {
                op: BinaryOp::NotEq,
                lhs: rhs,
                rhs: zero,
            },
        );
        self.emit(
            None,
            Type::Unit,
            ValueKind::Store {
                value: normalized,
                target: result,
            },
        );
        let then_exit = self.current_block.unwrap();

        self.enter_block(else_block);
        let zero = self.integer(0);
        self.emit(
            None,
            Type::Unit,
            ValueKind::Store {
                value: zero,
                target: result,
            },
        );
        let else_exit = self.current_block.unwrap();

        let end_block = self.func_mut().new_block(format!("end_{label}"));
        self.jump_from(then_exit, end_block);
        self.jump_from(else_exit, end_block);

        self.enter_block(end_block);

        let name = self.fresh_temp();
        self.emit(Some(name), Type::Int32, ValueKind::Load { source: result })
    }

    /// `a || b`: the mirror image of `&&` — the true path stores 1 and the
    /// right operand is evaluated only when the left was zero
    fn lower_logical_or(&mut self, lhs: &Expression, rhs: &Expression) -> ValueId {
        let result_name = self.fresh_storage_name("lor");
        let result = self.emit(
            Some(result_name),
            Type::Int32.pointer_to(),
            ValueKind::Alloc,
        );

        let lhs = self.lower_expression(lhs);
        let branch_block = self.current_block.unwrap();
        let label = self.fresh_label();

        let then_block = self.func_mut().new_block(format!("then_{label}"));
        let else_block = self.func_mut().new_block(format!("else_{label}"));

        let function = self.func_mut();
        let branch = function.new_value(
            None,
            Type::Unit,
            ValueKind::Branch {
                condition: lhs,
                then_block,
                else_block,
            },
        );
        function.push_inst(branch_block, branch);

        self.enter_block(then_block);
        let one = self.integer(1);
        self.emit(
            None,
            Type::Unit,
            ValueKind::Store {
                value: one,
                target: result,
            },
        );
        let then_exit = self.current_block.unwrap();

        self.enter_block(else_block);
        let rhs = self.lower_expression(rhs);
        let zero = self.integer(0);
        let name = self.fresh_temp();
        let normalized = self.emit(
            Some(name),
            Type::Int32,
            ValueKind::Binary {
                op: BinaryOp::NotEq,
                lhs: rhs,
                rhs: zero,
            },
        );
        self.emit(
            None,
            Type::Unit,
            ValueKind::Store {
                value: normalized,
                target: result,
            },
        );
        let else_exit = self.current_block.unwrap();

        let end_block = self.func_mut().new_block(format!("end_{label}"));
        self.jump_from(then_exit, end_block);
        self.jump_from(else_exit, end_block);

        self.enter_block(end_block);

        let name = self.fresh_temp();
        self.emit(Some(name), Type::Int32, ValueKind::Load { source: result })
    }

    fn lower_call(
        &mut self,
        span: Span,
        callee: &Identifier,
        arguments: &[Expression],
    ) -> ValueId {
        let Some(function_id) = self.function_table.get(&callee.symbol).copied() else {
            self.report_fatal_error(
                callee.span,
                &format!("Call to undeclared function `{}`", callee.symbol),
            );
        };

        let (param_count, return_type) = {
            let callee_data = &self.program.functions[function_id];
            (callee_data.param_types.len(), callee_data.return_type.clone())
        };

        if arguments.len() != param_count {
            self.report_fatal_error(
                span,
                &format!(
                    "Function `{}` expects {} argument(s) but {} were provided",
                    callee.symbol,
                    param_count,
                    arguments.len()
                ),
            );
        }

        let arguments: Vec<ValueId> = arguments
            .iter()
            .map(|argument| self.lower_expression(argument))
            .collect();

        let name = (!return_type.is_unit()).then(|| self.fresh_temp());

        self.emit(
            name,
            return_type,
            ValueKind::Call {
                callee: function_id,
                arguments,
            },
        )
    }

    /* LValue lowering */

    fn lower_lvalue_read(&mut self, lvalue: &LValue) -> ValueId {
        if let Binding::Constant(value) = self.lookup(&lvalue.name) {
            if !lvalue.indices.is_empty() {
                self.report_fatal_error(lvalue.span, "Cannot index a constant");
            }

            return self.integer(value);
        }

        let address = self.lower_location_address(lvalue);
        let pointee = self.func_mut().value(address).ty.pointee().clone();

        match pointee {
            // A not-fully-indexed array decays to a pointer to its first
            // element, for passing as a call argument
            Type::Array(element, _) => {
                let zero = self.integer(0);
                let name = self.fresh_temp();

                self.emit(
                    Some(name),
                    (*element).clone().pointer_to(),
                    ValueKind::GetElemPtr {
                        source: address,
                        index: zero,
                    },
                )
            }
            pointee => {
                let name = self.fresh_temp();
                self.emit(Some(name), pointee, ValueKind::Load { source: address })
            }
        }
    }

    fn lower_assignment_target(&mut self, lvalue: &LValue) -> ValueId {
        if let Binding::Constant(_) = self.lookup(&lvalue.name) {
            self.report_fatal_error(lvalue.span, "Cannot assign to a constant");
        }

        let address = self.lower_location_address(lvalue);

        if let Type::Array(..) = self.func_mut().value(address).ty.pointee() {
            self.report_fatal_error(lvalue.span, "Cannot assign to an array");
        }

        address
    }

    /// Chains address computations from the storage binding through the
    /// index expressions. Each step multiplies the remaining per-element
    /// stride by the index and adds it to the base address; indexing a
    /// parameter that is itself a reference to an array first loads the
    /// pointer it holds.
    fn lower_location_address(&mut self, lvalue: &LValue) -> ValueId {
        let Binding::Location(location) = self.lookup(&lvalue.name) else {
            unreachable!("constants are handled by the callers")
        };

        let mut address = match location {
            Location::Stack(value) => value,
            Location::Global(id) => {
                let global = &self.program.globals[id];
                let name = format!("@{}", global.name);
                let ty = global.ty.clone().pointer_to();

                self.func_mut()
                    .new_value(Some(name), ty, ValueKind::GlobalRef(id))
            }
        };

        for index in &lvalue.indices {
            let pointee = self.func_mut().value(address).ty.pointee().clone();

            address = match pointee {
                Type::Array(element, _) => {
                    let index_value = self.lower_expression(index);
                    let name = self.fresh_temp();

                    self.emit(
                        Some(name),
                        (*element).clone().pointer_to(),
                        ValueKind::GetElemPtr {
                            source: address,
                            index: index_value,
                        },
                    )
                }
                Type::Pointer(_) => {
                    let name = self.fresh_temp();
                    let loaded = self.emit(
                        Some(name),
                        pointee.clone(),
                        ValueKind::Load { source: address },
                    );

                    let index_value = self.lower_expression(index);
                    let name = self.fresh_temp();

                    self.emit(
                        Some(name),
                        pointee,
                        ValueKind::GetPtr {
                            source: loaded,
                            index: index_value,
                        },
                    )
                }
                _ => self.report_fatal_error(index.span, "Cannot index a scalar value"),
            };
        }

        address
    }
}

/// Flattens a brace initializer against the declared extents into a flat
/// element list of `product(extents)` positions, padding omitted trailing
/// positions with `None`. A nested list initializes the largest trailing
/// sub-array whose boundary the cursor is aligned to.
pub fn flatten_initializer<'a>(
    elements: &'a [Initializer],
    extents: &[usize],
    source_file: &SourceFile,
) -> Vec<Option<&'a Expression>> {
    let total: usize = extents.iter().product();
    let mut flat: Vec<Option<&'a Expression>> = Vec::with_capacity(total);

    for element in elements {
        if flat.len() >= total {
            source_file
                .report_fatal_error(element.span, "Too many elements in an array initializer");
        }

        match &element.kind {
            InitializerKind::Expression(expression) => flat.push(Some(expression)),
            InitializerKind::List(sub_elements) => {
                let mut dimension = 1;

                while dimension < extents.len() {
                    let stride: usize = extents[dimension..].iter().product();

                    if flat.len() % stride == 0 {
                        break;
                    }

                    dimension += 1;
                }

                if dimension >= extents.len() {
                    source_file.report_fatal_error(
                        element.span,
                        "A nested brace initializer must start on a sub-array boundary",
                    );
                }

                flat.extend(flatten_initializer(
                    sub_elements,
                    &extents[dimension..],
                    source_file,
                ));
            }
        }
    }

    flat.resize(total, None);
    flat
}

/// Converts a flat element position back into per-dimension indices
pub fn unflatten_position(mut position: usize, extents: &[usize]) -> Vec<usize> {
    let mut indices = vec![0; extents.len()];

    for (slot, extent) in indices.iter_mut().zip(extents.iter()).rev() {
        *slot = position % extent;
        position /= extent;
    }

    indices
}

/// Rebuilds the nested aggregate structure of a flat word sequence
fn renest_words(words: &[i32], extents: &[usize]) -> GlobalInit {
    if extents.len() <= 1 {
        return GlobalInit::Aggregate(words.iter().map(|word| GlobalInit::Word(*word)).collect());
    }

    let stride: usize = extents[1..].iter().product();

    GlobalInit::Aggregate(
        words
            .chunks(stride)
            .map(|chunk| renest_words(chunk, &extents[1..]))
            .collect(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frontend::parser::Parser;

    /// Parses `int a<extents> = <init>;` and returns the pieces the
    /// flattening helpers need
    fn parse_definition(source: &SourceFile) -> (Vec<Initializer>, Vec<usize>) {
        let unit = Parser::parse_compilation_unit(source);

        let ItemKind::Declaration(declaration) = unit.items.into_iter().next().unwrap().kind
        else {
            panic!("expected a declaration");
        };

        let definition = declaration.definitions.into_iter().next().unwrap();

        let extents = definition
            .extents
            .iter()
            .map(|extent| match extent.kind {
                ExpressionKind::Literal(value) => value as usize,
                _ => panic!("expected literal extents"),
            })
            .collect();

        let Some(Initializer {
            kind: InitializerKind::List(elements),
            ..
        }) = definition.initializer
        else {
            panic!("expected a list initializer");
        };

        (elements, extents)
    }

    fn literal(expression: Option<&Expression>) -> i32 {
        match expression {
            None => 0,
            Some(Expression {
                kind: ExpressionKind::Literal(value),
                ..
            }) => *value,
            Some(other) => panic!("expected a literal, found {other:?}"),
        }
    }

    #[test]
    fn flattening_pads_trailing_positions_with_zero() {
        let source = SourceFile::new_in_memory("int a[2][3] = {1, 2};");
        let (elements, extents) = parse_definition(&source);

        let flat = flatten_initializer(&elements, &extents, &source);
        let values: Vec<i32> = flat.iter().map(|slot| literal(*slot)).collect();

        assert_eq!(values, vec![1, 2, 0, 0, 0, 0]);
    }

    #[test]
    fn nested_lists_align_to_sub_array_boundaries() {
        let source = SourceFile::new_in_memory("int a[2][3] = {{1}, {2, 3}};");
        let (elements, extents) = parse_definition(&source);

        let flat = flatten_initializer(&elements, &extents, &source);
        let values: Vec<i32> = flat.iter().map(|slot| literal(*slot)).collect();

        assert_eq!(values, vec![1, 0, 0, 2, 3, 0]);
    }

    #[test]
    fn scalars_fill_across_sub_array_boundaries() {
        let source = SourceFile::new_in_memory("int a[2][3] = {1, 2, 3, 4};");
        let (elements, extents) = parse_definition(&source);

        let flat = flatten_initializer(&elements, &extents, &source);
        let values: Vec<i32> = flat.iter().map(|slot| literal(*slot)).collect();

        assert_eq!(values, vec![1, 2, 3, 4, 0, 0]);
    }

    #[test]
    fn unflattening_recovers_per_dimension_indices() {
        let extents = [2, 3];

        assert_eq!(unflatten_position(0, &extents), vec![0, 0]);
        assert_eq!(unflatten_position(2, &extents), vec![0, 2]);
        assert_eq!(unflatten_position(3, &extents), vec![1, 0]);
        assert_eq!(unflatten_position(5, &extents), vec![1, 2]);
    }

    #[test]
    fn renesting_round_trips_through_flat_words() {
        let extents = [2, 3];
        let words = vec![1, 2, 0, 0, 5, 0];

        let init = renest_words(&words, &extents);

        let ty = Type::Array(Box::new(Type::Array(Box::new(Type::Int32), 3)), 2);
        let mut round_tripped = Vec::new();
        init.flatten_words(&ty, &mut round_tripped);

        assert_eq!(round_tripped, words);
    }
}
