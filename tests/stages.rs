//! Tests driving built-in stages directly through a detached context.

use rowpipe::assembler::FieldSpec;
use rowpipe::queue::RowQueue;
use rowpipe::row::{FieldMeta, Row, RowShape, Value, ValueType};
use rowpipe::stage::{Stage, StageContext, StageStatus};
use rowpipe::stages::{
    AddConstants, ConstantField, ConstantsConfig, CsvInput, CsvInputConfig, RowCollector,
    RowsInput,
};
use rowpipe::testing::{assert_rows_equal, collect_rows, text_row};
use rowpipe::validation::ErrorMode;

/// Run `stage` to completion with one output queue and return what it sent.
fn drain(stage: &mut dyn Stage, input: &RowShape) -> anyhow::Result<(RowShape, Vec<Row>, StageContext)> {
    let shape = stage.init(input)?;
    let out = RowQueue::unbounded();
    let mut ctx = StageContext::detached("under-test");
    ctx.router_mut().add_output(out.clone());
    while stage.process(&mut ctx)? == StageStatus::Continue {}
    stage.dispose(&mut ctx)?;
    ctx.router().mark_outputs_done();
    Ok((shape, collect_rows(&out)?, ctx))
}

fn people_config() -> CsvInputConfig {
    CsvInputConfig {
        path: "people.csv".into(),
        header: true,
        fields: vec![
            FieldSpec::string("name"),
            FieldSpec::new("age", ValueType::Integer),
        ],
        ..Default::default()
    }
}

#[test]
fn test_csv_input_from_text() -> anyhow::Result<()> {
    let mut stage = CsvInput::from_text("name;age\nann;31\n\"o;neil\";\n", people_config());
    let (shape, rows, ctx) = drain(&mut stage, &RowShape::default())?;

    assert_eq!(shape.names().collect::<Vec<_>>(), vec!["name", "age"]);
    assert_rows_equal(
        &rows,
        &[
            vec![Value::text("ann"), Value::Integer(31)],
            vec![Value::text("o;neil"), Value::Null],
        ],
    );
    let m = ctx.metrics().snapshot();
    assert_eq!(m.read, 3);
    assert_eq!(m.output, 2);
    Ok(())
}

#[test]
fn test_csv_input_extra_fields() -> anyhow::Result<()> {
    let config = CsvInputConfig {
        filename_field: Some("file".into()),
        row_number_field: Some("rownum".into()),
        ..people_config()
    };
    let mut stage = CsvInput::from_text("name;age\nann;31\nbo;7\n", config);
    let (shape, rows, _) = drain(&mut stage, &RowShape::default())?;
    assert_eq!(shape.len(), 4);
    assert_eq!(
        rows[1],
        vec![Value::text("bo"), Value::Integer(7), Value::text("people.csv"), Value::Integer(2)]
    );
    Ok(())
}

#[test]
fn test_csv_input_skips_bad_rows() -> anyhow::Result<()> {
    let config = CsvInputConfig {
        error_mode: ErrorMode::LogAndContinue,
        ..people_config()
    };
    let mut stage = CsvInput::from_text("name;age\nann;x\nbo;7\n", config);
    let (_, rows, ctx) = drain(&mut stage, &RowShape::default())?;
    assert_eq!(rows, vec![vec![Value::text("bo"), Value::Integer(7)]]);

    let errors = ctx.errors().errors();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].line, 2);
    assert_eq!(errors[0].field, "age");
    assert_eq!(ctx.metrics().snapshot().rejected, 1);
    Ok(())
}

#[test]
fn test_csv_input_fail_fast() {
    let config = CsvInputConfig {
        error_mode: ErrorMode::FailFast,
        ..people_config()
    };
    let mut stage = CsvInput::from_text("name;age\nann;x\n", config);
    let err = drain(&mut stage, &RowShape::default())
        .err()
        .expect("bad row must fail the stage");
    assert!(format!("{err:#}").contains("field #1 (age)"));
}

#[test]
fn test_csv_input_rejects_empty_delimiter() {
    let mut config = people_config();
    config.tokens.delimiter.clear();
    let mut stage = CsvInput::from_text("a", config);
    assert!(stage.init(&RowShape::default()).is_err());
}

#[test]
fn test_add_constants() -> anyhow::Result<()> {
    let mut stage = AddConstants::new(ConstantsConfig {
        fields: vec![
            ConstantField::new(FieldSpec::string("source"), "batch-7"),
            ConstantField::new(FieldSpec::new("weight", ValueType::Number), "1.5"),
            ConstantField::new(FieldSpec::new("missing", ValueType::Integer), ""),
        ],
    });
    let input_shape = RowShape::new(vec![FieldMeta::new("v", ValueType::String)]);
    let shape = stage.init(&input_shape)?;
    assert_eq!(shape.names().collect::<Vec<_>>(), vec!["v", "source", "weight", "missing"]);

    let inbound = RowQueue::unbounded();
    inbound.put(text_row(&["a"]))?;
    inbound.put(text_row(&["b"]))?;
    inbound.mark_done();
    let out = RowQueue::unbounded();
    let mut ctx = StageContext::detached("constants");
    ctx.router_mut().add_input(inbound);
    ctx.router_mut().add_output(out.clone());
    while stage.process(&mut ctx)? == StageStatus::Continue {}
    out.mark_done();

    let expected_tail = [Value::text("batch-7"), Value::from(1.5), Value::Null];
    let rows = collect_rows(&out)?;
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0][0], Value::text("a"));
    assert_eq!(&rows[1][1..], &expected_tail);
    Ok(())
}

#[test]
fn test_add_constants_rejects_unconvertible_value() {
    let mut stage = AddConstants::new(ConstantsConfig {
        fields: vec![ConstantField::new(FieldSpec::new("n", ValueType::Integer), "seven")],
    });
    let err = stage.init(&RowShape::default()).expect_err("seven is not an integer");
    assert!(err.to_string().starts_with("constant n = \"seven\""));
}

#[test]
fn test_rows_input_and_collector() -> anyhow::Result<()> {
    let shape = RowShape::new(vec![FieldMeta::new("k", ValueType::String)]);
    let mut source = RowsInput::new(shape.clone(), vec![text_row(&["x"]), text_row(&["y"])]);
    let (out_shape, rows, _) = drain(&mut source, &RowShape::default())?;
    assert_eq!(out_shape, shape);

    let (mut collector, collected) = RowCollector::new();
    let inbound = RowQueue::unbounded();
    for row in rows {
        inbound.put(row)?;
    }
    inbound.mark_done();
    collector.init(&shape)?;
    let mut ctx = StageContext::detached("collect");
    ctx.router_mut().add_input(inbound);
    while collector.process(&mut ctx)? == StageStatus::Continue {}

    assert_eq!(collected.shape(), shape);
    assert_eq!(collected.rows(), vec![text_row(&["x"]), text_row(&["y"])]);
    assert_eq!(collected.take().len(), 2);
    assert!(collected.is_empty());
    Ok(())
}

#[test]
fn test_rows_input_checks_width() {
    let shape = RowShape::new(vec![FieldMeta::new("k", ValueType::String)]);
    let mut source = RowsInput::new(shape, vec![text_row(&["x", "extra"])]);
    assert!(source.init(&RowShape::default()).is_err());
}
