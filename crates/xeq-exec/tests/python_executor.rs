use std::process::Command;
use std::time::Duration;

use xeq_core::Value;
use xeq_exec::{Bindings, Executor, ModuleSet, PythonExecutor, ResultSelector};

fn python_available() -> bool {
    Command::new("python3")
        .arg("--version")
        .output()
        .is_ok_and(|output| output.status.success())
}

fn builtins_executor() -> PythonExecutor {
    PythonExecutor::new("python3").with_modules(ModuleSet::builtins_only())
}

#[test]
fn scalar_result_is_selected() {
    if !python_available() {
        return;
    }
    let value = builtins_executor()
        .execute("print('ignored')\nresult = 1.0")
        .expect("snippet should run");
    assert_eq!(value, Value::Real(1.0));
}

#[test]
fn exceptions_become_messages() {
    if !python_available() {
        return;
    }
    let error = builtins_executor()
        .execute("x = 1 / 0")
        .expect_err("division should fail");
    assert_eq!(error, "division by zero");
}

#[test]
fn random_is_prebound() {
    if !python_available() {
        return;
    }
    let value = builtins_executor()
        .execute("random.seed(0)\nx = random.random()\nresult = 0.0 <= x < 1.0")
        .expect("random should be bound without an import");
    assert_eq!(value, Value::Bool(true));
}

#[test]
fn disabled_modules_cannot_be_imported() {
    if !python_available() {
        return;
    }
    let error = builtins_executor()
        .execute("import numpy as np\nresult = np.zeros(3)")
        .expect_err("numpy is disabled");
    assert_eq!(error, "No module named 'numpy'");
}

#[test]
fn special_values_survive_the_wire() {
    if !python_available() {
        return;
    }
    let executor = builtins_executor();
    let nan = executor
        .execute("result = float('nan')")
        .expect("snippet should run");
    assert!(matches!(nan, Value::Real(value) if value.is_nan()));

    let big = executor
        .execute("result = 2 ** 70")
        .expect("snippet should run");
    assert_eq!(big, Value::Real(2f64.powi(70)));

    let nested = executor
        .execute("x = (1, [2.5, None], 'a')")
        .expect("snippet should run");
    assert_eq!(
        nested,
        Value::Tuple(vec![
            Value::Int(1),
            Value::List(vec![Value::Real(2.5), Value::None]),
            Value::Str("a".to_string()),
        ])
    );
}

#[test]
fn bindings_arrive_in_first_binding_order() {
    if !python_available() {
        return;
    }
    struct Names;
    impl ResultSelector for Names {
        fn select(&self, bindings: Bindings) -> Value {
            Value::List(
                bindings
                    .into_iter()
                    .map(|(name, _)| Value::Str(name))
                    .collect(),
            )
        }
    }

    let value = builtins_executor()
        .with_selector(Names)
        .execute("b = 1\na = 2\nb = 3")
        .expect("snippet should run");
    assert_eq!(
        value,
        Value::List(vec![Value::Str("b".to_string()), Value::Str("a".to_string())])
    );
}

#[test]
fn timeout_kills_the_child() {
    if !python_available() {
        return;
    }
    let error = builtins_executor()
        .with_timeout(Some(Duration::from_millis(500)))
        .execute("import time\ntime.sleep(30)")
        .expect_err("snippet should time out");
    assert!(error.contains("timed out after 500ms"), "{error}");
}

#[test]
fn missing_interpreter_is_reported() {
    let error = PythonExecutor::new("/nonexistent/python3-for-xeq")
        .execute("result = 1")
        .expect_err("spawn should fail");
    assert!(error.contains("failed to spawn python harness"), "{error}");
}
