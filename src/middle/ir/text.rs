//! Renders the structured IR as its line-oriented text form: function and
//! global declarations, labeled basic blocks, and one instruction per
//! line, with `%n` naming local temporaries and `@name` naming
//! source-level symbols.

use core::fmt::Write;

use itertools::Itertools;

use crate::middle::ir::{FunctionData, GlobalInit, Program, Type, ValueId, ValueKind};

pub fn render_program(program: &Program) -> String {
    let mut output = String::new();

    for function in program.functions.iter().filter(|f| f.is_declaration) {
        let params = function.param_types.iter().map(Type::to_string).join(", ");

        write!(&mut output, "decl @{}({})", function.name, params).unwrap();
        if !function.return_type.is_unit() {
            write!(&mut output, ": {}", function.return_type).unwrap();
        }
        writeln!(&mut output).unwrap();
    }

    if !program.globals.is_empty() {
        writeln!(&mut output).unwrap();
    }

    for global in program.globals.iter() {
        writeln!(
            &mut output,
            "global @{} = alloc {}, {}",
            global.name,
            global.ty,
            render_init(&global.init)
        )
        .unwrap();
    }

    for function in program.functions.iter().filter(|f| !f.is_declaration) {
        writeln!(&mut output).unwrap();
        render_function(&mut output, program, function);
    }

    output
}

fn render_function(output: &mut String, program: &Program, function: &FunctionData) {
    let params = function
        .params
        .iter()
        .map(|param| {
            let value = function.value(*param);
            format!("{}: {}", value.name.as_deref().unwrap(), value.ty)
        })
        .join(", ");

    write!(output, "fun @{}({})", function.name, params).unwrap();
    if !function.return_type.is_unit() {
        write!(output, ": {}", function.return_type).unwrap();
    }
    writeln!(output, " {{").unwrap();

    for block_id in &function.layout {
        let block = function.block(*block_id);

        writeln!(output, "%{}:", block.name).unwrap();

        for inst in &block.insts {
            writeln!(output, "  {}", render_inst(program, function, *inst)).unwrap();
        }
    }

    writeln!(output, "}}").unwrap();
}

/// Renders a value as an instruction operand: integer literals appear
/// inline, everything else by name
fn operand(function: &FunctionData, value: ValueId) -> String {
    let value = function.value(value);

    match &value.kind {
        ValueKind::Integer(literal) => literal.to_string(),
        _ => value
            .name
            .clone()
            .expect("every named value should have a display name"),
    }
}

pub(crate) fn render_inst(program: &Program, function: &FunctionData, inst: ValueId) -> String {
    let value = function.value(inst);
    let name = value.name.as_deref();

    match &value.kind {
        ValueKind::Alloc => {
            format!("{} = alloc {}", name.unwrap(), value.ty.pointee())
        }
        ValueKind::Load { source } => {
            format!("{} = load {}", name.unwrap(), operand(function, *source))
        }
        ValueKind::Store { value, target } => {
            format!(
                "store {}, {}",
                operand(function, *value),
                operand(function, *target)
            )
        }
        ValueKind::Binary { op, lhs, rhs } => {
            format!(
                "{} = {} {}, {}",
                name.unwrap(),
                op,
                operand(function, *lhs),
                operand(function, *rhs)
            )
        }
        ValueKind::Branch {
            condition,
            then_block,
            else_block,
        } => {
            format!(
                "br {}, %{}, %{}",
                operand(function, *condition),
                function.block(*then_block).name,
                function.block(*else_block).name
            )
        }
        ValueKind::Jump { target } => {
            format!("jump %{}", function.block(*target).name)
        }
        ValueKind::Call { callee, arguments } => {
            let callee = &program.functions[*callee];
            let arguments = arguments
                .iter()
                .map(|argument| operand(function, *argument))
                .join(", ");

            match name {
                Some(name) => format!("{name} = call @{}({arguments})", callee.name),
                None => format!("call @{}({arguments})", callee.name),
            }
        }
        ValueKind::GetElemPtr { source, index } => {
            format!(
                "{} = getelemptr {}, {}",
                name.unwrap(),
                operand(function, *source),
                operand(function, *index)
            )
        }
        ValueKind::GetPtr { source, index } => {
            format!(
                "{} = getptr {}, {}",
                name.unwrap(),
                operand(function, *source),
                operand(function, *index)
            )
        }
        ValueKind::Return { value: Some(value) } => {
            format!("ret {}", operand(function, *value))
        }
        ValueKind::Return { value: None } => "ret".to_string(),
        ValueKind::Integer(_) | ValueKind::FuncArgRef(_) | ValueKind::GlobalRef(_) => {
            unreachable!("inline values are never instructions")
        }
    }
}

fn render_init(init: &GlobalInit) -> String {
    match init {
        GlobalInit::ZeroInit => "zeroinit".to_string(),
        GlobalInit::Word(value) => value.to_string(),
        GlobalInit::Aggregate(elements) => {
            format!("{{{}}}", elements.iter().map(render_init).join(", "))
        }
    }
}

impl core::fmt::Display for Type {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Type::Int32 => write!(f, "i32"),
            Type::Unit => write!(f, "unit"),
            Type::Array(element, length) => write!(f, "[{element}, {length}]"),
            Type::Pointer(pointee) => write!(f, "*{pointee}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use indoc::indoc;

    use super::*;
    use crate::{
        frontend::intern::InternedSymbol,
        middle::ir::{BinaryOp, ValueData},
    };

    #[test]
    fn renders_a_minimal_function() {
        let mut program = Program::new();

        let mut function = FunctionData {
            name: InternedSymbol::new("main"),
            param_types: Vec::new(),
            return_type: Type::Int32,
            params: Vec::new(),
            values: Default::default(),
            blocks: Default::default(),
            layout: Vec::new(),
            is_declaration: false,
        };

        let entry = function.new_block("entry");
        function.layout.push(entry);

        let four = function.new_value(None, Type::Int32, ValueKind::Integer(4));
        let two = function.new_value(None, Type::Int32, ValueKind::Integer(2));
        let product = function.new_value(
            Some("%0".to_string()),
            Type::Int32,
            ValueKind::Binary {
                op: BinaryOp::Mul,
                lhs: four,
                rhs: two,
            },
        );
        let ret = function.new_value(
            None,
            Type::Unit,
            ValueKind::Return {
                value: Some(product),
            },
        );

        function.push_inst(entry, product);
        function.push_inst(entry, ret);

        program.functions.push(function);

        assert_eq!(
            render_program(&program),
            indoc! {"

                fun @main(): i32 {
                %entry:
                  %0 = mul 4, 2
                  ret %0
                }
            "}
        );
    }

    #[test]
    fn renders_global_initializers() {
        let mut program = Program::new();

        program.globals.push(crate::middle::ir::GlobalData {
            name: InternedSymbol::new("g"),
            ty: Type::Array(Box::new(Type::Int32), 3),
            init: GlobalInit::Aggregate(vec![
                GlobalInit::Word(1),
                GlobalInit::Word(2),
                GlobalInit::Word(0),
            ]),
        });
        program.globals.push(crate::middle::ir::GlobalData {
            name: InternedSymbol::new("z"),
            ty: Type::Int32,
            init: GlobalInit::ZeroInit,
        });

        let text = render_program(&program);

        assert!(text.contains("global @g = alloc [i32, 3], {1, 2, 0}"));
        assert!(text.contains("global @z = alloc i32, zeroinit"));
    }

    #[test]
    fn value_data_is_constructed_through_the_arena() {
        let mut function = FunctionData::new_declaration(
            InternedSymbol::new("getint"),
            Vec::new(),
            Type::Int32,
        );

        // Declarations never hold values; pushing into one is still a
        // plain arena append
        let value = function.new_value(None, Type::Int32, ValueKind::Integer(1));
        let ValueData { ty, .. } = function.value(value);
        assert_eq!(*ty, Type::Int32);
    }
}
