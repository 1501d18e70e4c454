//! Scheduler tests over hand-assembled bytecode.

use std::rc::Rc;

use moo_common::{ErrorKind, SourcePos};
use moo_vm::{
    BufferConnection, Connection, Executable, InputMode, ManualClock, Mcp, MemoryWorld, Opcode,
    TaskState, Value, VmConfig, VmWord,
};

fn op(o: Opcode) -> VmWord {
    VmWord::op(o, SourcePos::new(1, 1))
}

fn lit(v: impl Into<Value>) -> VmWord {
    VmWord::lit(v.into(), SourcePos::NONE)
}

fn addr(a: usize) -> VmWord {
    VmWord::addr(a, SourcePos::NONE)
}

fn program(name: &str, code: Vec<VmWord>) -> Rc<Executable> {
    let mut exe = Executable::new(name);
    exe.code = code;
    exe.verify().expect("hand-assembled program is well formed");
    Rc::new(exe)
}

fn print(text: &str) -> Vec<VmWord> {
    vec![op(Opcode::Push), lit(text), op(Opcode::CallBuiltinDiscard), lit("print"), lit(1i64)]
}

fn setup(config: VmConfig) -> (Mcp<ManualClock>, MemoryWorld, Rc<BufferConnection>) {
    let clock = ManualClock::new(1_000_000);
    (Mcp::new(clock, config), MemoryWorld::new(), Rc::new(BufferConnection::new()))
}

fn conn(c: &Rc<BufferConnection>) -> Option<Rc<dyn Connection>> {
    Some(c.clone() as Rc<dyn Connection>)
}

#[test]
fn test_suspend_resumes_after_delay() {
    let (mut mcp, mut world, out) = setup(VmConfig::default());
    let mut code = print("before");
    code.extend([op(Opcode::Push), lit(2i64), op(Opcode::Suspend), op(Opcode::Pop)]);
    code.extend(print("after"));
    let id = mcp.spawn(program("sleepy", code), Value::Obj(1), Value::Obj(1), conn(&out), 0.0);

    assert_eq!(mcp.run_due(&mut world), 1);
    assert_eq!(out.take_output(), vec!["before"]);
    assert_eq!(mcp.task_state(id), Some(TaskState::Pending));

    mcp.clock().advance(1_000);
    assert_eq!(mcp.run_due(&mut world), 0);

    mcp.clock().advance(1_000);
    assert_eq!(mcp.run_due(&mut world), 1);
    assert_eq!(out.take_output(), vec!["after"]);
    assert!(!mcp.is_valid_task(id));
}

#[test]
fn test_resume_with_result_feeds_suspend_expression() {
    let (mut mcp, mut world, out) = setup(VmConfig::default());
    let code = vec![
        op(Opcode::Push),
        lit(Value::Null),
        op(Opcode::Suspend),
        op(Opcode::CallBuiltinDiscard),
        lit("print"),
        lit(1i64),
    ];
    let id = mcp.spawn(program("waiter", code), Value::Obj(1), Value::Obj(1), conn(&out), 0.0);

    mcp.run_until_idle(&mut world);
    assert_eq!(mcp.task_state(id), Some(TaskState::Suspended));
    assert_eq!(mcp.next_due(), None);

    assert!(mcp.resume_with_result(id, Value::Int(5)));
    mcp.run_until_idle(&mut world);
    assert_eq!(out.output(), vec!["5"]);
    assert!(!mcp.is_valid_task(id));
}

#[test]
fn test_same_instant_runs_in_creation_order() {
    let (mut mcp, mut world, out) = setup(VmConfig::default());
    for name in ["a", "b", "c"] {
        mcp.spawn(program(name, print(name)), Value::Obj(1), Value::Obj(1), conn(&out), 1.0);
    }
    mcp.run_until_idle(&mut world);
    assert_eq!(out.output(), vec!["a", "b", "c"]);
}

#[test]
fn test_cancel_withdraws_read_request() {
    let (mut mcp, mut world, out) = setup(VmConfig::default());
    let code = vec![op(Opcode::CallBuiltin), lit("read_line"), lit(0i64), op(Opcode::Return)];
    let id = mcp.spawn(program("reader", code), Value::Obj(1), Value::Obj(1), conn(&out), 0.0);

    mcp.run_due(&mut world);
    assert_eq!(out.pending_reads(), vec![(id, InputMode::Line)]);

    assert!(mcp.cancel(id));
    assert!(out.pending_reads().is_empty());
    assert!(!mcp.is_valid_task(id));
    assert!(!mcp.resume_with_result(id, Value::str("late")));
}

#[test]
fn test_resume_withdraws_read_request() {
    let (mut mcp, mut world, out) = setup(VmConfig::default());
    let mut code = vec![op(Opcode::CallBuiltin), lit("read_line"), lit(0i64), op(Opcode::Pop)];
    code.extend([op(Opcode::Push), lit(Value::Null), op(Opcode::Suspend), op(Opcode::Return)]);
    let id = mcp.spawn(program("reader", code), Value::Obj(1), Value::Obj(1), conn(&out), 0.0);

    mcp.run_due(&mut world);
    assert_eq!(out.pending_reads(), vec![(id, InputMode::Line)]);

    assert!(mcp.resume(id));
    assert!(out.pending_reads().is_empty());
    mcp.run_until_idle(&mut world);
    assert_eq!(mcp.task_state(id), Some(TaskState::Suspended));
    assert!(out.pending_reads().is_empty());
}

#[test]
fn test_uncaught_error_is_reported_to_connection() {
    let (mut mcp, mut world, out) = setup(VmConfig::default());
    let code = vec![op(Opcode::Push), lit(1i64), op(Opcode::Push), lit(0i64), op(Opcode::Div)];
    mcp.spawn(program("divide", code), Value::Obj(1), Value::Obj(1), conn(&out), 0.0);
    mcp.run_until_idle(&mut world);

    let output = out.output();
    assert_eq!(output[0], "E_DIV: division by zero (line 1)");
    assert_eq!(output[1], "  in divide at line 1");
    assert!(mcp.is_empty());
}

#[test]
fn test_runaway_loop_runs_out_of_ticks() {
    let (mut mcp, mut world, out) = setup(VmConfig::default().with_max_ticks(100));
    let code = vec![op(Opcode::Jump), addr(0)];
    mcp.spawn(program("spin", code), Value::Obj(1), Value::Obj(1), conn(&out), 0.0);
    mcp.run_until_idle(&mut world);
    assert!(out.output()[0].starts_with(ErrorKind::Resource.name()));
}

#[test]
fn test_recursion_hits_call_depth_limit() {
    let (mut mcp, mut world, out) = setup(VmConfig::default().with_max_call_depth(5));
    let recurse = vec![
        op(Opcode::Push),
        lit(Value::Obj(1)),
        op(Opcode::CallVerb),
        lit("recurse"),
        lit(0i64),
        op(Opcode::Return),
    ];
    let mut verb = Executable::new("recurse");
    verb.code = recurse.clone();
    world.add_verb(1, "recurse", verb);

    mcp.spawn(program("start", recurse), Value::Obj(1), Value::Obj(1), conn(&out), 0.0);
    mcp.run_until_idle(&mut world);

    let output = out.output();
    assert!(output[0].starts_with("E_MAXREC"));
    // The root frame plus four verb frames.
    assert_eq!(output.len(), 6);
    assert_eq!(output[1], "  in #1:recurse at line 1");
}

#[test]
fn test_headless_failure_does_not_panic() {
    let (mut mcp, mut world, _) = setup(VmConfig::default());
    let code = vec![op(Opcode::GetVar), lit(7i64)];
    let id = mcp.spawn(program("missing", code), Value::Obj(1), Value::Obj(1), None, 0.0);
    assert_eq!(mcp.run_due(&mut world), 1);
    assert!(!mcp.is_valid_task(id));
}
