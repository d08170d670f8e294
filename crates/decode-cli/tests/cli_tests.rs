/*!
# CLI Integration Tests

Runs the decode pipeline against files on disk.
*/

use std::fs;
use std::path::Path;

use decode_cli::{run, DecodeRequest};
use decode_core::ast::AuxDispatcher;
use decode_core::{ClassId, Clazz, Expression, Method, MethodId, Param, Program, Registry, Statement, Template};
use pretty_assertions::assert_eq;

const AUX: &str = "AuxObserverClickEvent";

fn method(name: &str, clazz: usize, params: Vec<Param>) -> Method {
    Method {
        name: name.to_string(),
        clazz: ClassId(clazz),
        params,
        ret_ty: "void".to_string(),
        is_init: false,
        body: vec![],
    }
}

// classes: 0 Aux, 1 ClickEvent, 2 Button, 3 Handler
// methods: 0 Aux.handleCode, 1 Button.add, 2 Button.remove, 3 Button.click, 4 Handler.onClick
fn click_program() -> Program {
    let mut registry = Registry::new();
    registry.add_class(Clazz {
        aux: Some(AuxDispatcher {
            event: ClassId(1),
            handle: MethodId(0),
        }),
        ..Clazz::new(AUX)
    });
    registry.add_class(Clazz::new("ClickEvent"));
    registry.add_class(Clazz::new("Button"));
    registry.add_class(Clazz::new("Handler"));

    registry.add_method(Method {
        body: vec![Statement::For {
            ty: "Object".to_string(),
            var: "o".to_string(),
            iter: Expression::id("_obs"),
            body: vec![Statement::Expr(Expression::method_call(
                Expression::id(AUX),
                "reflect",
                vec![
                    Expression::id(format!("update_{AUX}")),
                    Expression::id("o"),
                    Expression::id(format!("rcv_{AUX}")),
                    Expression::id("evt"),
                ],
            ))],
        }],
        ..method(
            &format!("handleCode_{AUX}"),
            0,
            vec![Param::new(AUX, "rcv"), Param::new("ClickEvent", "evt")],
        )
    });
    registry.add_method(method("add", 2, vec![Param::new("Handler", "h")]));
    registry.add_method(method("remove", 2, vec![Param::new("Handler", "h")]));
    registry.add_method(method("click", 2, vec![Param::new("ClickEvent", "ev")]));
    registry.add_method(method("onClick", 3, vec![Param::new("ClickEvent", "ev")]));

    Program {
        template: Template {
            classes: (0..4).map(ClassId).collect(),
            obs_auxs: vec![AUX.to_string()],
        },
        registry,
    }
}

fn write_inputs(dir: &Path) -> anyhow::Result<DecodeRequest> {
    let program = dir.join("program.json");
    fs::write(&program, serde_json::to_string(&click_program())?)?;

    let trace = dir.join("out.trace");
    let holes = [("subject", 2), ("observer", 3), ("attach", 1), ("detach", 2), ("handle", 3), ("update", 4)];
    let lines: Vec<String> = holes
        .iter()
        .map(|(role, index)| format!("glblInit_{role}_{AUX},StmtAssign,{role}_{AUX}_x = {index}"))
        .collect();
    fs::write(&trace, lines.join("\n"))?;

    Ok(DecodeRequest {
        program,
        trace,
        ..DecodeRequest::default()
    })
}

#[test]
fn test_run_emits_source() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let request = DecodeRequest {
        emit_source: true,
        ..write_inputs(dir.path())?
    };

    let (report, rendered) = run(&request)?;
    assert_eq!(report.auxs_decoded, vec![AUX.to_string()]);
    assert_eq!(report.subjects, vec![(AUX.to_string(), "Button".to_string())]);

    let source = rendered.expect("no output file given");
    assert!(source.contains("_obs_Handler.add(h);"));
    // single ClickEvent parameter: the receiver argument is dropped
    assert!(source.contains("o.onClick(ev);"));
    assert!(!source.contains(AUX));
    Ok(())
}

#[test]
fn test_run_writes_json_output() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let output = dir.path().join("decoded.json");
    let request = DecodeRequest {
        output: Some(output.clone()),
        ..write_inputs(dir.path())?
    };

    let (_, rendered) = run(&request)?;
    assert!(rendered.is_none());

    let decoded: Program = serde_json::from_str(&fs::read_to_string(&output)?)?;
    assert_eq!(decoded.template.classes, (1..4).map(ClassId).collect::<Vec<_>>());
    assert_eq!(
        decoded.registry.class(ClassId(2)).collection_field.as_deref(),
        Some("_obs_Handler")
    );
    Ok(())
}

#[test]
fn test_event_config_zero_counts() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let events = dir.path().join("events.json");
    fs::write(&events, r#"{ "ClickEvent": { "handle": 1, "attach": 0, "detach": 0 } }"#)?;
    let request = DecodeRequest {
        events: Some(events),
        emit_source: true,
        ..write_inputs(dir.path())?
    };

    let (_, rendered) = run(&request)?;
    let source = rendered.expect("no output file given");
    assert!(!source.contains(".add("));
    assert!(!source.contains(".remove("));
    Ok(())
}

#[test]
fn test_missing_trace_reports_path() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let request = DecodeRequest {
        trace: dir.path().join("absent.trace"),
        ..write_inputs(dir.path())?
    };
    let err = run(&request).expect_err("trace file is absent");
    assert!(format!("{err:#}").contains("absent.trace"));
    Ok(())
}

#[test]
fn test_dangling_event_id_is_rejected() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let request = write_inputs(dir.path())?;

    let mut program = click_program();
    program.registry.class_mut(ClassId(0)).aux = Some(AuxDispatcher {
        event: ClassId(42),
        handle: MethodId(0),
    });
    fs::write(&request.program, serde_json::to_string(&program)?)?;

    let err = run(&request).expect_err("event id is out of range");
    let cause = err
        .downcast_ref::<decode_core::DecodeError>()
        .expect("decode error in the chain");
    assert!(matches!(cause, decode_core::DecodeError::StructuralContract { .. }));
    assert!(format!("{err:#}").contains("dangling event class#42"));
    Ok(())
}
