//! End-to-end tests driving full source programs through the compiler,
//! asserting on the produced IR text and RV32 assembly.

use indoc::indoc;
use minicc::frontend::SourceFile;

fn ir_for(source: &str) -> String {
    minicc::emit_ir(&SourceFile::new_in_memory(source))
}

fn asm_for(source: &str) -> String {
    minicc::emit_assembly(&SourceFile::new_in_memory(source))
}

/// Collects the instruction lines of every labeled basic block in the IR
/// text, in order
fn blocks_of(ir: &str) -> Vec<Vec<String>> {
    let mut blocks: Vec<Vec<String>> = Vec::new();
    let mut in_function = false;

    for line in ir.lines() {
        if line.starts_with("fun ") {
            in_function = true;
        } else if line == "}" {
            in_function = false;
        } else if in_function && line.starts_with('%') && line.ends_with(':') {
            blocks.push(Vec::new());
        } else if in_function && !line.trim().is_empty() {
            blocks
                .last_mut()
                .expect("instruction before the first block label")
                .push(line.trim().to_string());
        }
    }

    blocks
}

fn is_terminator(inst: &str) -> bool {
    inst.starts_with("br ") || inst.starts_with("jump ") || inst == "ret" || inst.starts_with("ret ")
}

#[test]
fn multiply_add_scenario_lowers_as_written() {
    let ir = ir_for("int main() { int a = 3; int b = a + 4 * 2; return b; }");

    // 4 * 2 is a runtime expression and is not folded
    let muls: Vec<&str> = ir.lines().filter(|line| line.contains(" = mul ")).collect();
    let adds: Vec<&str> = ir.lines().filter(|line| line.contains(" = add ")).collect();

    assert_eq!(muls.len(), 1, "expected exactly one multiply in:\n{ir}");
    assert_eq!(adds.len(), 1, "expected exactly one add in:\n{ir}");
    assert!(muls[0].contains("mul 4, 2"));

    // The function returns the loaded value of b
    let load_of_b = ir
        .lines()
        .find(|line| line.contains(" = load @b_"))
        .unwrap_or_else(|| panic!("no load of b in:\n{ir}"));
    let loaded_name = load_of_b.trim().split(' ').next().unwrap();

    assert!(
        ir.contains(&format!("ret {loaded_name}")),
        "expected a return of {loaded_name} in:\n{ir}"
    );
}

#[test]
fn fully_terminated_if_else_emits_no_merge_jump() {
    let ir = ir_for("int f(int a) { if (a > 0) return 1; else return 0; }");

    assert!(
        !ir.contains("jump"),
        "no arm should jump to a merge label in:\n{ir}"
    );
    assert_eq!(
        ir.lines().filter(|line| line.trim().starts_with("ret")).count(),
        2,
        "both returns survive and no synthetic return is appended in:\n{ir}"
    );
}

#[test]
fn every_block_has_exactly_one_trailing_terminator() {
    let ir = ir_for(indoc! {"
        int pick(int limit, int flag) {
            int total = 0;
            int i = 0;
            while (i < limit) {
                if (i == 7 && flag) break;
                if (i % 2 == 0 || flag) {
                    i = i + 1;
                    continue;
                }
                total = total + i;
                i = i + 1;
            }
            return total;
        }

        int main() {
            return pick(10, 0);
        }
    "});

    let blocks = blocks_of(&ir);
    assert!(blocks.len() > 5, "expected a real control-flow graph in:\n{ir}");

    for block in &blocks {
        let terminators = block.iter().filter(|inst| is_terminator(inst)).count();

        assert_eq!(terminators, 1, "block {block:?} must have one terminator");
        assert!(
            is_terminator(block.last().unwrap()),
            "the terminator must come last in {block:?}"
        );
    }
}

#[test]
fn ninth_argument_goes_through_the_outgoing_stack_slot() {
    let asm = asm_for(indoc! {"
        int f(int a1, int a2, int a3, int a4, int a5, int a6, int a7, int a8, int a9) {
            return a9;
        }

        int main() {
            return f(1, 2, 3, 4, 5, 6, 7, 8, 9);
        }
    "});

    // First eight arguments ride in a0-a7
    assert!(asm.contains("li a0, 1"), "missing a0 staging in:\n{asm}");
    assert!(asm.contains("li a7, 8"), "missing a7 staging in:\n{asm}");

    // The ninth is written to offset 0 of the caller's outgoing area
    let staged = asm
        .lines()
        .position(|line| line.trim() == "li t0, 9")
        .unwrap_or_else(|| panic!("ninth argument never materialized in:\n{asm}"));
    assert_eq!(
        asm.lines().nth(staged + 1).map(str::trim),
        Some("sw t0, 0(sp)"),
        "ninth argument must land at 0(sp) in:\n{asm}"
    );

    assert!(asm.contains("call f"));
}

#[test]
fn frame_sizes_are_multiples_of_sixteen() {
    let sources = [
        "int main() { return 0; }",
        "int main() { int a = 1; int b = 2; return a + b; }",
        "int f(int x) { return x; } int main() { return f(3); }",
        "int main() { int a[10]; a[0] = 1; return a[0]; }",
    ];

    for source in sources {
        let asm = asm_for(source);

        for line in asm.lines() {
            let line = line.trim();

            if let Some(rest) = line.strip_prefix("addi sp, sp, -") {
                let frame: u32 = rest.parse().unwrap();
                assert_eq!(frame % 16, 0, "unaligned frame in:\n{asm}");
            }
        }
    }
}

#[test]
fn oversized_frames_use_a_scratch_register_adjustment() {
    let asm = asm_for("int main() { int a[1000]; a[999] = 5; return a[999]; }");

    // 4000 bytes of array storage cannot be a single addi immediate
    assert!(
        asm.contains("sub sp, sp, t0"),
        "expected a synthesized stack adjustment in:\n{asm}"
    );

    let li = asm
        .lines()
        .map(str::trim)
        .find_map(|line| line.strip_prefix("li t0, "))
        .expect("the frame size must be loaded into the scratch register");
    let frame: i32 = li.parse().unwrap();

    assert!(frame > 2047);
    assert_eq!(frame % 16, 0);
}

#[test]
fn sibling_blocks_may_declare_the_same_name() {
    let ir = ir_for("int main() { { int x = 1; } { int x = 2; } return 0; }");

    assert!(ir.contains("@x_0 = alloc i32"));
    assert!(ir.contains("@x_1 = alloc i32"));
    assert!(ir.contains("store 1, @x_0"));
    assert!(ir.contains("store 2, @x_1"));
}

#[test]
fn same_block_redeclaration_is_a_reported_fault() {
    let dir = std::env::temp_dir();
    let input = dir.join("minicc_redeclaration_input.c");
    let output = dir.join("minicc_redeclaration_output.txt");

    std::fs::write(&input, "int main() { int x = 1; int x = 2; return 0; }").unwrap();

    let result = std::process::Command::new(env!("CARGO_BIN_EXE_minicc"))
        .args([
            "-koopa",
            input.to_str().unwrap(),
            "-o",
            output.to_str().unwrap(),
        ])
        .output()
        .expect("failed to run the compiler binary");

    assert_eq!(result.status.code(), Some(1));

    let stderr = String::from_utf8_lossy(&result.stderr);
    assert!(
        stderr.contains("Conflicting definition"),
        "unexpected diagnostic: {stderr}"
    );

    let _ = std::fs::remove_file(&input);
    let _ = std::fs::remove_file(&output);
}

#[test]
fn constant_contexts_fold_with_c_semantics() {
    // 7 / -2 truncates toward zero; the short-circuit never divides
    let ir = ir_for(indoc! {"
        const int q = 7 / -2;
        const int guarded = 1 || 1 / 0;

        int main() {
            return q + guarded;
        }
    "});

    assert!(ir.contains("add -3, 1"), "constants must fold in:\n{ir}");
    assert!(!ir.contains("div"), "no division may survive in:\n{ir}");
}

#[test]
fn logical_operators_lower_to_control_flow_diamonds() {
    let ir = ir_for("int main() { return 1 || 1 / 0; }");

    // The right operand exists but only on the dead path
    assert!(ir.contains("@lor_0 = alloc i32"));
    assert!(ir.contains("br 1, %then_0, %else_0"));
    assert!(ir.contains(" = div 1, 0"));
    assert!(ir.contains(" = load @lor_0"));
}

#[test]
fn loops_carry_entry_body_and_end_labels() {
    let ir = ir_for(indoc! {"
        int main() {
            int i = 0;
            while (i < 10) {
                if (i == 5) break;
                if (i == 3) continue;
                i = i + 1;
            }
            return i;
        }
    "});

    assert!(ir.contains("%while_entry_0:"));
    assert!(ir.contains("%while_body_0:"));
    assert!(ir.contains("%while_end_0:"));

    // break jumps to the end label, continue back to the entry label
    assert!(ir.contains("jump %while_end_0"));
    assert!(ir.contains("jump %while_entry_0"));
}

#[test]
fn global_data_renders_compactly() {
    let asm = asm_for(indoc! {"
        int blank[100];
        int sparse[4] = {0, 0, 0, 5};
        int scalar = 7;

        int main() {
            return blank[0] + sparse[3] + scalar;
        }
    "});

    assert!(asm.contains(".zero 400"), "all-zero data compresses in:\n{asm}");
    assert!(asm.contains(".zero 12"), "leading zeros compress in:\n{asm}");
    assert!(asm.contains(".word 5"));
    assert!(asm.contains(".word 7"));
    assert!(asm.contains(".globl sparse"));
}

#[test]
fn array_parameters_take_an_extra_indirection() {
    let ir = ir_for(indoc! {"
        int f(int a[][3]) {
            return a[1][2];
        }

        int main() {
            int grid[2][3] = {{1, 2, 3}, {4, 5, 6}};
            return f(grid);
        }
    "});

    // Indexing the parameter loads the pointer it holds, advances it with
    // getptr, then steps into the row with getelemptr
    assert!(ir.contains("fun @f(@a: *[i32, 3]): i32"));
    assert!(ir.contains("getptr"));
    assert!(ir.contains("getelemptr"));

    // Passing the local array decays it to a pointer to its first row
    // (the parameter storage of f claimed the first storage name)
    assert!(ir.contains("getelemptr @grid_1, 0"));
}

#[test]
fn void_functions_have_no_return_value() {
    let ir = ir_for(indoc! {"
        void noop() {
            return;
        }

        int main() {
            noop();
            return 0;
        }
    "});

    assert!(ir.contains("fun @noop() {"));
    assert!(ir.contains("\n  call @noop()\n"));
    assert!(!ir.contains("= call @noop"));
}

#[test]
fn runtime_library_is_predeclared() {
    let ir = ir_for("int main() { putint(getint()); return 0; }");

    assert!(ir.contains("decl @getint(): i32"));
    assert!(ir.contains("decl @putint(i32)"));
    assert!(ir.contains("call @getint()"));
    assert!(ir.contains("call @putint("));
}

#[test]
fn returned_constants_reach_the_return_register() {
    let asm = asm_for("int main() { return 7; }");

    assert!(asm.contains(".globl main"));
    assert!(asm.contains("li t0, 7"));
    assert!(asm.contains("mv a0, t0"));
    assert!(asm.trim_end().ends_with("ret"));
}
