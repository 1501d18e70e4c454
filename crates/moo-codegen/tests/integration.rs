//! Integration tests: source → compile → schedule → run.
//!
//! Every program runs twice, with and without the peephole optimizer, and
//! both runs must print the same lines.

use std::rc::Rc;

use moo_codegen::{compile_with, CompileOptions};
use moo_vm::{
    BufferConnection, Connection, Executable, InputMode, ManualClock, Mcp, MemoryWorld, Opcode,
    TaskState, Value, VmConfig, Word,
};
use pretty_assertions::assert_eq;

const PLAYER: i64 = 2;

fn compile_source(source: &str, optimize: bool) -> Executable {
    let options = CompileOptions {
        optimize,
        ..Default::default()
    };
    compile_with(source, &options).unwrap_or_else(|err| panic!("compile failed: {}", err))
}

struct Harness {
    mcp: Mcp<ManualClock>,
    world: MemoryWorld,
    out: Rc<BufferConnection>,
}

impl Harness {
    fn new(config: VmConfig) -> Self {
        let mut world = MemoryWorld::new();
        world.create(PLAYER);
        Self {
            mcp: Mcp::new(ManualClock::new(1_000_000), config),
            world,
            out: Rc::new(BufferConnection::new()),
        }
    }

    fn spawn(&mut self, exe: Executable) -> u64 {
        let conn = Some(self.out.clone() as Rc<dyn Connection>);
        self.mcp
            .spawn(Rc::new(exe), Value::Obj(PLAYER), Value::Obj(PLAYER), conn, 0.0)
    }

    fn run(&mut self) -> Vec<String> {
        self.mcp.run_until_idle(&mut self.world);
        self.out.output()
    }
}

fn run_with(source: &str, config: VmConfig, optimize: bool) -> Vec<String> {
    let mut h = Harness::new(config);
    h.spawn(compile_source(source, optimize));
    h.run()
}

/// Run with and without the optimizer; the output must agree.
fn run_config(source: &str, config: VmConfig) -> Vec<String> {
    let optimized = run_with(source, config, true);
    let plain = run_with(source, config, false);
    assert_eq!(optimized, plain, "optimizer changed behavior of:\n{}", source);
    optimized
}

fn run(source: &str) -> Vec<String> {
    run_config(source, VmConfig::default())
}

// ═══════════════════════════════════════════════════════════════════════════
// Expressions
// ═══════════════════════════════════════════════════════════════════════════

#[test]
fn test_arithmetic_precedence() {
    assert_eq!(run("print(14 * 10 + 71 / 3 ^ 3);"), vec!["142"]);
    assert_eq!(
        run("a = 14; b = 10; c = 71; d = 3; print(a * b + c / d ^ d);"),
        vec!["142"]
    );
}

#[test]
fn test_short_circuit() {
    let source = r#"
        hits = [];
        f = fn (x) { hits.push(x); return x; };
        r1 = false && f(1);
        r2 = true || f(2);
        r3 = null ?: f(3);
        r4 = 0 && f(4);
        print(hits, " ", r1, " ", r2, " ", r3, " ", r4);
    "#;
    // Only `?:` and `&&` on a truthy 0 evaluate their right side.
    assert_eq!(run(source), vec!["[3, 4] false true 3 4"]);
}

#[test]
fn test_interpolation_and_ternary() {
    let source = r#"
        name = "world";
        n = 3;
        print("hello ${name}, ${n * 2} times");
        print(n > 2 ? "big" : "small");
    "#;
    assert_eq!(run(source), vec!["hello world, 6 times", "big"]);
}

#[test]
fn test_type_tests_and_slices() {
    let source = r#"
        print(1 is int, " ", "a" is list, " ", null is null);
        print([1, 2, 3, 4][1..2]);
        print("hello"[1..3]);
    "#;
    assert_eq!(run(source), vec!["true false true", "[2, 3]", "ell"]);
}

#[test]
fn test_when_expression() {
    let source = r#"
        describe = fn (v) -> when (v) { 1, 2 -> "small", 3 -> "three", else -> "big" };
        print(describe(1), describe(3), describe(9));
        x = 5;
        print(when { x < 0 -> "negative", x > 3 -> "large" });
        print(when { x < 0 -> "negative" });
    "#;
    assert_eq!(run(source), vec!["smallthreebig", "large", "null"]);
}

// ═══════════════════════════════════════════════════════════════════════════
// Statements
// ═══════════════════════════════════════════════════════════════════════════

#[test]
fn test_nested_loops_with_break_and_continue() {
    let source = r#"
        out = [];
        for (i in 1..3) {
            for (j in 1..3) {
                if (j == 2) { continue; }
                if (i == 3) { break; }
                out.push(i * 10 + j);
            }
        }
        print(out);
    "#;
    assert_eq!(run(source), vec!["[11, 13, 21, 23]"]);
}

#[test]
fn test_classic_for_and_while() {
    let source = r#"
        total = 0;
        for (i = 0; i < 5; i++) {
            if (i == 1) { continue; }
            total += i;
        }
        n = 0;
        while (n < 10) { n += 3; }
        print(total, " ", n);
    "#;
    assert_eq!(run(source), vec!["9 12"]);
}

#[test]
fn test_map_iteration_and_compound_index_assignment() {
    let source = r#"
        m = ["a": 1, "b": 2];
        m["c"] = 3;
        m["a"] += 10;
        for (v, k in m) { print(k, "=", v); }
        l = [1, 2];
        l[0]--;
        print(l);
    "#;
    assert_eq!(run(source), vec!["a=11", "b=2", "c=3", "[0, 2]"]);
}

#[test]
fn test_destructuring() {
    assert_eq!(run(r#"[a, b, c] = [1, "two", 3.5]; print(a, b, c);"#), vec!["1two3.5"]);
}

#[test]
fn test_break_out_of_try_leaves_no_handler_behind() {
    let source = r#"
        i = 0;
        while (true) {
            try {
                i++;
                if (i == 3) { break; }
            } catch { }
        }
        print(i);
        y = [1][5];
    "#;
    let output = run(source);
    assert_eq!(output[0], "3");
    assert!(output[1].starts_with("E_RANGE"), "got {:?}", output);
}

// ═══════════════════════════════════════════════════════════════════════════
// Functions
// ═══════════════════════════════════════════════════════════════════════════

#[test]
fn test_closures_map_and_filter() {
    let source = r#"
        n = 3;
        add = fn (x) -> x + n;
        print([1, 2, 3].map(add));
        print([1, 2, 3, 4].filter(fn (x) -> x % 2 == 0));
        print(add(4));
    "#;
    assert_eq!(run(source), vec!["[4, 5, 6]", "[2, 4]", "7"]);
}

#[test]
fn test_function_scope_is_isolated() {
    let source = r#"
        x = 1;
        f = fn (x) { x = x + 100; return x; };
        print(f(5), " ", x);
        g = fn () -> x;
        x = 2;
        print(g());
    "#;
    // Parameters shadow; captures are taken when the literal is evaluated.
    assert_eq!(run(source), vec!["105 1", "1"]);
}

#[test]
fn test_nested_closures() {
    let source = r#"
        make = fn (base) -> fn (x) -> base + x;
        add10 = make(10);
        print(add10(5));
    "#;
    assert_eq!(run(source), vec!["15"]);
}

#[test]
fn test_wrong_arity_raises_invarg() {
    let source = r#"
        f = fn (a, b) -> a;
        r = try f(1) catch (E_INVARG) -> "bad arity";
        print(r);
    "#;
    assert_eq!(run(source), vec!["bad arity"]);
}

#[test]
fn test_verbs_and_properties_on_objects() {
    let mut h = Harness::new(VmConfig::default());
    let greet = CompileOptions {
        name: "greet".into(),
        ..Default::default()
    };
    let verb = compile_with(r#"return "hi " + args[0] + " from " + this.name;"#, &greet).unwrap();
    h.world.create(5).props.insert("name".into(), Value::str("box"));
    h.world.add_verb(5, "greet", verb);

    h.spawn(compile_source(
        r#"
        print(#5.greet("bob"));
        #5.name = #5.name + "!";
        print(#5.name);
        notify(user, "done");
        "#,
        true,
    ));
    assert_eq!(h.run(), vec!["hi bob from box", "box!"]);
    assert_eq!(h.world.notifications_for(PLAYER), vec!["done"]);
}

// ═══════════════════════════════════════════════════════════════════════════
// Errors
// ═══════════════════════════════════════════════════════════════════════════

#[test]
fn test_catch_selectivity() {
    let source = r#"
        try {
            try {
                x = 1 + "a";
            } catch (E_RANGE, E_INVARG) {
                print("inner");
            }
        } catch (E_TYPE) as e {
            print("outer ", typeof(e));
        }
    "#;
    assert_eq!(run(source), vec!["outer err"]);
}

#[test]
fn test_list_bounds_error_names_index() {
    let source = r#"
        l = [1, 2, 3];
        r = try l[666] catch (E_RANGE) as e -> e;
        print(r);
    "#;
    assert_eq!(run(source), vec!["E_RANGE: index 666 out of range"]);

    let output = run("print([1, 2, 3][666]);");
    assert_eq!(output[0], "E_RANGE: index 666 out of range (line 1)");
}

#[test]
fn test_throw_and_raise_carry_messages() {
    let source = r#"
        try { throw E_INVARG("bad input"); } catch (E_INVARG) as e { print(e); }
        try { raise(E_USER1, "boom"); } catch (ANY) as e { print(e); }
    "#;
    assert_eq!(run(source), vec!["E_INVARG: bad input", "E_USER1: boom"]);
}

#[test]
fn test_division_by_zero_is_catchable() {
    let source = r#"
        x = 0;
        a = try 1 / x catch (E_DIV) -> "caught";
        b = try 7 % x catch (E_DIV) -> "mod";
        c = try 1.5 / x catch (E_DIV) -> "float";
        print(a, " ", b, " ", c);
    "#;
    assert_eq!(run(source), vec!["caught mod float"]);
    assert_eq!(run("print(1 / 0);")[0], "E_DIV: division by zero (line 1)");
}

#[test]
fn test_huge_string_repetition_is_catchable() {
    let source = r#"
        y = try "ab" * 9223372036854775807 catch (E_RESOURCE) -> "caught";
        print(y, " ", "ab" * 3);
    "#;
    assert_eq!(run(source), vec!["caught ababab"]);
}

#[test]
fn test_uncaught_error_reports_frames() {
    let source = "f = fn () -> 1 / 0;\nf();";
    let output = run(source);
    assert_eq!(
        output,
        vec![
            "E_DIV: division by zero (line 1)",
            "  in fn at line 1: f = fn () -> 1 / 0;",
            "  in program at line 2: f();",
        ]
    );
}

#[test]
fn test_tick_exhaustion_is_catchable() {
    let source = r#"
        try { while (true) { } } catch (E_RESOURCE) { print("stopped"); }
    "#;
    let config = VmConfig::default().with_max_ticks(1_000);
    assert_eq!(run_config(source, config), vec!["stopped"]);
}

// ═══════════════════════════════════════════════════════════════════════════
// Tasks
// ═══════════════════════════════════════════════════════════════════════════

#[test]
fn test_fork_runs_after_parent_yields() {
    let source = r#"
        print("a");
        t = fork (0) { print("c"); };
        print("b");
    "#;
    assert_eq!(run(source), vec!["a", "b", "c"]);
}

#[test]
fn test_forks_run_in_due_order_with_captures() {
    let source = r#"
        x = 41;
        fork (2) { print("two"); };
        fork (1) { print("one ", x + 1, " ", args); };
        third = fork (1) { print("never"); };
        cancel(third);
        print("zero");
    "#;
    assert_eq!(run(source), vec!["zero", "one 42 []", "two"]);
}

#[test]
fn test_cancelled_fork_never_runs() {
    let source = r#"
        t = fork (5) { print("never"); };
        print(t is task);
        cancel(t);
        print("done");
    "#;
    let mut h = Harness::new(VmConfig::default());
    h.spawn(compile_source(source, true));
    assert_eq!(h.run(), vec!["true", "done"]);
    assert!(h.mcp.is_empty());
}

#[test]
fn test_suspend_resumes_after_delay() {
    let mut h = Harness::new(VmConfig::default());
    let id = h.spawn(compile_source(
        r#"
        print("before");
        v = suspend(1.5);
        print("after ", v);
        "#,
        true,
    ));
    h.mcp.run_due(&mut h.world);
    assert_eq!(h.out.take_output(), vec!["before"]);
    assert_eq!(h.mcp.task_state(id), Some(TaskState::Pending));

    h.mcp.clock().advance(1_000);
    assert_eq!(h.mcp.run_due(&mut h.world), 0);
    h.mcp.clock().advance(500);
    assert_eq!(h.mcp.run_due(&mut h.world), 1);
    assert_eq!(h.out.take_output(), vec!["after null"]);
}

#[test]
fn test_suspend_deep_in_a_call_chain_keeps_every_frame() {
    let mut h = Harness::new(VmConfig::default());
    let down = compile_with(
        r#"
        n = args[0];
        if (n == 0) { suspend(1); return 0; }
        local = n * 10;
        return local + this.down(n - 1);
        "#,
        &CompileOptions {
            name: "down".into(),
            ..Default::default()
        },
    )
    .unwrap();
    h.world.add_verb(5, "down", down);
    h.spawn(compile_source(r#"print("total ", #5.down(3));"#, true));

    assert_eq!(h.mcp.run_due(&mut h.world), 1);
    assert!(h.out.output().is_empty());
    h.mcp.clock().advance(1_000);
    assert_eq!(h.mcp.run_due(&mut h.world), 1);
    assert_eq!(h.out.take_output(), vec!["total 60"]);
    assert!(h.mcp.is_empty());
}

#[test]
fn test_resume_with_result_and_read_line() {
    let mut h = Harness::new(VmConfig::default());
    let id = h.spawn(compile_source(
        r#"
        v = suspend();
        print("got ", v);
        line = read_line();
        print("echo ", line);
        "#,
        true,
    ));
    h.run();
    assert_eq!(h.mcp.task_state(id), Some(TaskState::Suspended));

    assert!(h.mcp.resume_with_result(id, Value::Int(7)));
    h.run();
    assert_eq!(h.out.take_output(), vec!["got 7"]);
    assert_eq!(h.out.pending_reads(), vec![(id, InputMode::Line)]);

    assert!(h.mcp.resume_with_result(id, Value::str("hello")));
    h.run();
    assert_eq!(h.out.take_output(), vec!["echo hello"]);
    assert!(!h.mcp.is_valid_task(id));
}

#[test]
fn test_suspend_inside_map_callback_is_rejected() {
    let source = r#"
        r = try [1].map(fn (x) -> suspend(1)) catch (E_INVARG) -> "no";
        print(r);
    "#;
    assert_eq!(run(source), vec!["no"]);
}

// ═══════════════════════════════════════════════════════════════════════════
// Code shape
// ═══════════════════════════════════════════════════════════════════════════

const SAMPLES: &[&str] = &[
    "x = 1; while (x < 10) { if (x % 2 == 0) { x += 3; } else { x++; } }",
    "for (v, k in [\"a\": 1]) { try { print(k); } catch (E_TYPE) { break; } }",
    "f = fn (a) { g = fn (b) -> a + b; return g(1); }; print(f(2));",
    "t = fork (1) { for (i in 1..3) { if (i == 2) { continue; } print(i); } };",
    "r = when (3) { 1 -> \"a\", 3 -> \"c\" }; s = try r[9] catch -> 0;",
    "for (i = 0; i < 3; i++) { if (!(i == 1)) { print(i); } }",
    // Fusable pairs whose second half is a branch target.
    "c = false; x = 0; if (c) { x = 1; } print(x);",
    "c = true; x = 1; print(x == (c ? 1 : 0), x != (c ? 1 : 0));",
    "a = true; b = true; c = true; if (c ? b : !a) { print(\"yes\"); } else { print(\"no\"); }",
];

fn assert_well_formed(exe: &Executable) {
    exe.verify().unwrap_or_else(|err| panic!("{}\n{}", err, exe.disassemble()));
    let len = exe.len();
    for w in &exe.code {
        if let Word::Addr(a) = w.word {
            assert!(a <= len, "address {} beyond {}", a, len);
        }
    }
    // Each block is skipped by the jump right before it.
    for block in &exe.blocks {
        assert!(block.start >= 2);
        assert_eq!(exe.code[block.start - 2].opcode(), Some(Opcode::Jump));
        let over = exe.code[block.start - 1].as_addr().unwrap_or(0);
        assert!(over >= block.end, "jump over block lands at {} inside {}..{}", over, block.start, block.end);
    }
}

#[test]
fn test_jump_integrity() {
    for source in SAMPLES {
        assert_well_formed(&compile_source(source, false));
        assert_well_formed(&compile_source(source, true));
    }
}

#[test]
fn test_samples_behave_the_same_optimized() {
    for source in SAMPLES {
        run(source);
    }
}

#[test]
fn test_optimizer_shrinks_code() {
    let source = "x = 1; y = x; print(x); if (!y) { print(0); }";
    let plain = compile_source(source, false);
    let optimized = compile_source(source, true);
    assert!(optimized.len() < plain.len());
    let ops: Vec<Opcode> = optimized.code.iter().filter_map(|w| w.opcode()).collect();
    assert!(ops.contains(&Opcode::TeeVar));
    assert!(ops.contains(&Opcode::CallBuiltinDiscard));
    assert!(ops.contains(&Opcode::JumpIfTrue));
}

#[test]
fn test_branch_targets_are_not_fused() {
    assert_eq!(run(SAMPLES[6]), vec!["0"]);
    assert_eq!(run(SAMPLES[7]), vec!["truefalse"]);
    assert_eq!(run(SAMPLES[8]), vec!["yes"]);
    assert_eq!(run("c = true; x = 0; if (c) { x = 1; } print(x);"), vec!["1"]);
}

#[test]
fn test_compilation_is_deterministic() {
    for source in SAMPLES {
        let a = compile_source(source, true).disassemble();
        let b = compile_source(source, true).disassemble();
        assert_eq!(a, b);
    }
}
